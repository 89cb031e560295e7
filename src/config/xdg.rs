//! XDG Base Directory helpers for the global config file.

use std::path::PathBuf;

/// `$XDG_CONFIG_HOME`, falling back to `$HOME/.config`
pub fn config_home() -> Option<PathBuf> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config_home.is_empty() {
            return Some(PathBuf::from(xdg_config_home));
        }
    }

    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config"))
}

/// `$XDG_CONFIG_HOME/notionbackup/config.toml`
pub fn global_config_path() -> Option<PathBuf> {
    config_home().map(|home| home.join("notionbackup").join("config.toml"))
}
