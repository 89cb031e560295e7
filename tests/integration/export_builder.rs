use crate::integration::support::{FakeService, MemoryStore};
use notionbackup::error::EngineError;
use notionbackup::remote::Parent;
use notionbackup::tree::builder::{ExportRequest, ExportTreeBuilder};
use notionbackup::tree::{NodeIndex, NodeKind, Tree};
use std::collections::HashSet;

fn remote_children(tree: &Tree, idx: NodeIndex) -> Vec<String> {
    tree.children(idx)
        .map(|child| tree.node(child).remote_object_id().to_string())
        .collect()
}

fn find(tree: &Tree, remote_id: &str) -> NodeIndex {
    tree.subtree(tree.root())
        .find(|idx| tree.node(*idx).remote_object_id() == remote_id)
        .unwrap_or_else(|| panic!("{} not in tree", remote_id))
}

/// Two workspace pages (the first holding two blocks) and a workspace
/// database with three member pages
fn workspace_fixture() -> FakeService {
    let service = FakeService::new();
    service.add_page("p1", Parent::workspace(), "First");
    service.add_block("p1", "b1", "paragraph", "one");
    service.add_block("p1", "b2", "paragraph", "two");
    service.add_page("p2", Parent::workspace(), "Second");
    service.add_database("db", Parent::workspace(), "Tracker");
    service.add_page("r1", Parent::database("db"), "Row 1");
    service.add_page("r2", Parent::database("db"), "Row 2");
    service.add_page("r3", Parent::database("db"), "Row 3");
    service
}

#[tokio::test]
async fn workspace_export_places_database_pages_under_their_database() {
    let service = workspace_fixture();
    let store = MemoryStore::new();

    let mut builder = ExportTreeBuilder::new(&service, &store, ExportRequest::Workspace);
    let tree = builder.build().await.unwrap();

    assert_eq!(remote_children(tree, tree.root()), vec!["p1", "p2", "db"]);

    let db = find(tree, "db");
    assert_eq!(tree.node(db).kind(), NodeKind::Database);
    assert_eq!(remote_children(tree, db), vec!["r1", "r2", "r3"]);
    let expected_ids: Vec<_> = ["r1", "r2", "r3"]
        .iter()
        .map(|id| tree.node(find(tree, id)).id())
        .collect();
    assert_eq!(tree.children_ids(db), expected_ids);

    let p1 = find(tree, "p1");
    assert_eq!(remote_children(tree, p1), vec!["b1", "b2"]);
    assert_eq!(tree.node(find(tree, "b1")).kind(), NodeKind::Block);

    // Member pages come from the listing cache, not a database query
    assert_eq!(service.count_calls("query_database"), 0);
}

#[tokio::test]
async fn explicit_ids_move_root_attached_page_under_its_owner() {
    let service = FakeService::new();
    service.add_page("p1", Parent::workspace(), "P1");
    service.add_page("p2", Parent::page("p1"), "P2");
    service.add_page("p3", Parent::page("p2"), "P3");
    let store = MemoryStore::new();

    let request = ExportRequest::objects(vec!["p1".to_string(), "p3".to_string()], vec![]);
    let mut builder = ExportTreeBuilder::new(&service, &store, request);
    let tree = builder.build().await.unwrap();

    assert_eq!(remote_children(tree, tree.root()), vec!["p1"]);
    let p1 = find(tree, "p1");
    let p2 = find(tree, "p2");
    let p3 = find(tree, "p3");
    assert_eq!(tree.parent(p2), Some(p1));
    assert_eq!(tree.parent(p3), Some(p2));
    assert_eq!(tree.reachable_count(), 3);
    assert_eq!(store.content_count(), 3);
}

#[tokio::test]
async fn explicit_ids_expand_requested_database() {
    let service = FakeService::new();
    service.add_database("db", Parent::workspace(), "Tracker");
    service.add_page("r1", Parent::database("db"), "Row 1");
    service.add_page("r2", Parent::database("db"), "Row 2");
    service.add_page("r3", Parent::database("db"), "Row 3");
    service.add_block("r2", "r2b", "paragraph", "details");
    let store = MemoryStore::new();

    let request = ExportRequest::objects(vec![], vec!["db".to_string()]);
    let mut builder = ExportTreeBuilder::new(&service, &store, request);
    let tree = builder.build().await.unwrap();

    let db = find(tree, "db");
    assert_eq!(remote_children(tree, db), vec!["r1", "r2", "r3"]);
    assert_eq!(remote_children(tree, find(tree, "r2")), vec!["r2b"]);
    // Three members over pages of two
    assert_eq!(service.count_calls("query_database db"), 2);
}

#[tokio::test]
async fn duplicate_requested_ids_produce_one_node() {
    let service = FakeService::new();
    service.add_page("p1", Parent::workspace(), "P1");
    let store = MemoryStore::new();

    let request = ExportRequest::objects(
        vec!["p1".to_string(), "p1".to_string(), "p1".to_string()],
        vec![],
    );
    let mut builder = ExportTreeBuilder::new(&service, &store, request);
    let tree = builder.build().await.unwrap();

    assert_eq!(remote_children(tree, tree.root()), vec!["p1"]);
    assert_eq!(service.count_calls("get_page"), 1);
}

#[tokio::test]
async fn empty_explicit_request_is_rejected() {
    let service = FakeService::new();
    let store = MemoryStore::new();

    let mut builder =
        ExportTreeBuilder::new(&service, &store, ExportRequest::objects(vec![], vec![]));
    let result = builder.build().await;
    assert!(matches!(result, Err(EngineError::Validation(_))));
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn second_build_returns_cached_tree() {
    let service = workspace_fixture();
    let store = MemoryStore::new();

    let mut builder = ExportTreeBuilder::new(&service, &store, ExportRequest::Workspace);
    let first_count = builder.build().await.unwrap().reachable_count();
    let calls = service.calls().len();

    let second_count = builder.build().await.unwrap().reachable_count();
    assert_eq!(first_count, second_count);
    assert_eq!(service.calls().len(), calls);
    assert!(builder.tree().is_some());
}

#[tokio::test]
async fn failed_discovery_cleans_up_persisted_content() {
    let service = workspace_fixture();
    service.fail_on("p1");
    let store = MemoryStore::new();

    let mut builder = ExportTreeBuilder::new(&service, &store, ExportRequest::Workspace);
    let result = builder.build().await;

    match result {
        Err(EngineError::Discovery { object_id, .. }) => assert_eq!(object_id, "p1"),
        other => panic!("expected discovery error, got {:?}", other.map(|t| t.len())),
    }
    assert_eq!(store.cleanups(), 1);
    assert_eq!(store.content_count(), 0);
    assert!(builder.tree().is_none());
}

#[tokio::test]
async fn nested_blocks_are_expanded_in_order() {
    let service = FakeService::new();
    service.add_page("p1", Parent::workspace(), "P1");
    service.add_block("p1", "toggle", "toggle", "More");
    service.add_block("toggle", "inner1", "paragraph", "a");
    service.add_block("toggle", "inner2", "paragraph", "b");
    service.add_block("toggle", "inner3", "paragraph", "c");
    service.add_block("inner2", "deep", "paragraph", "d");
    let store = MemoryStore::new();

    let mut builder = ExportTreeBuilder::new(&service, &store, ExportRequest::Workspace);
    let tree = builder.build().await.unwrap();

    let toggle = find(tree, "toggle");
    assert_eq!(remote_children(tree, toggle), vec!["inner1", "inner2", "inner3"]);
    assert_eq!(remote_children(tree, find(tree, "inner2")), vec!["deep"]);
}

#[tokio::test]
async fn page_with_unshared_owner_is_kept_under_root() {
    let service = FakeService::new();
    service.add_page("p1", Parent::workspace(), "P1");
    service.add_page("orphan", Parent::page("not-shared"), "Orphan");
    service.add_block("orphan", "ob", "paragraph", "kept");
    let store = MemoryStore::new();

    let mut builder = ExportTreeBuilder::new(&service, &store, ExportRequest::Workspace);
    let tree = builder.build().await.unwrap();

    assert_eq!(remote_children(tree, tree.root()), vec!["p1", "orphan"]);
    assert_eq!(remote_children(tree, find(tree, "orphan")), vec!["ob"]);
}

#[tokio::test]
async fn subtree_visits_every_persisted_node_once() {
    let service = workspace_fixture();
    service.add_page("child", Parent::page("p2"), "Child");
    service.add_block("child", "cb", "quote", "deep");
    let store = MemoryStore::new();

    let mut builder = ExportTreeBuilder::new(&service, &store, ExportRequest::Workspace);
    let tree = builder.build().await.unwrap();

    let visited: Vec<_> = tree.subtree(tree.root()).collect();
    let unique: HashSet<_> = visited.iter().map(|idx| tree.node(*idx).id()).collect();
    assert_eq!(visited.len(), unique.len());
    assert_eq!(visited.len(), store.content_count());
    assert!(visited
        .iter()
        .all(|idx| tree.node(*idx).kind() != NodeKind::Root));
}
