//! Sync operations end to end: mock transport in, memory store out


use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};

use github_sync::query::DiscoveredNode;
use github_sync::services::{ServerConnection, SyncEngine, SyncSettings, SyncStep, SyncSteps};
use github_sync::store::{LocalStore, MemoryStore};
use github_sync::types::{ApiServer, DisplayPolicy, ItemKind, TrackedItem, TrackedRepository};
use test_util::{MockTransport, object, page, with_fields};

const LABEL: &str = "GitHub";

fn engine(
    transport: MockTransport,
    settings: SyncSettings,
) -> (SyncEngine<MemoryStore, MockTransport>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = SyncEngine::new(
        Arc::clone(&store),
        vec![ServerConnection::new(ApiServer::github(None), transport)],
        settings,
    );
    (engine, store)
}

fn item(typename: &str, id: &str, updated_at: &str, repository: Option<&str>) -> Value {
    let mut fields = json!({"updatedAt": updated_at, "title": format!("{} title", id)});
    if let Some(repo) = repository {
        fields["repository"] = object("Repository", repo);
    }
    with_fields(object(typename, id), fields)
}

fn tracked(ids: &[&str]) -> Vec<TrackedItem> {
    ids.iter().map(|id| TrackedItem::new(*id, LABEL)).collect()
}

#[tokio::test]
async fn test_authored_items_store_repositories_before_items() {
    let transport = MockTransport::new().when(
        &["viewer"],
        json!({
            "viewer": {
                "__typename": "User",
                "id": "U_1",
                "pullRequests": page(
                    vec![item("PullRequest", "PR_1", "2024-03-01T10:00:00Z", Some("R_1"))],
                    &["p1"],
                    false
                ),
                "issues": page(
                    vec![item("Issue", "I_1", "2024-03-02T10:00:00Z", Some("R_2"))],
                    &["i1"],
                    false
                )
            }
        }),
    );
    let (engine, store) = engine(transport, SyncSettings::default());

    let report = engine.fetch_authored_items().await;

    assert!(report.succeeded(), "{:?}", report.first_error());
    assert_eq!(
        store.upsert_order(),
        vec!["sync_repositories", "sync_issues", "sync_pull_requests"]
    );
    assert_eq!(store.nodes_of_type("Repository").len(), 2);
    assert_eq!(
        store.node("PR_1").and_then(|n| n.parent().map(|p| p.id().to_string())),
        Some("U_1".to_string())
    );
    assert_eq!(
        store.most_recent_item_update("R_1", ItemKind::PullRequest),
        Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
    );
    assert_eq!(store.last_sync_succeeded(LABEL), Some(true));
    assert_eq!(report.server(LABEL).map(|s| s.nodes_ingested), Some(4));
}

#[tokio::test]
async fn test_authored_items_page_through_the_viewer_node() {
    let transport = MockTransport::new()
        .when(
            &["after: \"p1\""],
            json!({
                "node": {
                    "__typename": "User",
                    "pullRequests": page(
                        vec![item("PullRequest", "PR_2", "2024-03-03T10:00:00Z", Some("R_1"))],
                        &["p2"],
                        false
                    )
                }
            }),
        )
        .when(
            &["viewer"],
            json!({
                "viewer": {
                    "__typename": "User",
                    "id": "U_1",
                    "pullRequests": page(
                        vec![item("PullRequest", "PR_1", "2024-03-01T10:00:00Z", Some("R_1"))],
                        &["p1"],
                        true
                    ),
                    "issues": page(vec![], &[], false)
                }
            }),
        );
    let (engine, store) = engine(transport, SyncSettings::default());

    let report = engine.fetch_authored_items().await;

    assert!(report.succeeded(), "{:?}", report.first_error());
    let documents = engine.servers()[0].transport.documents();
    assert_eq!(documents.len(), 2);
    assert!(documents[0].contains("viewer { __typename id pullRequests(first: 100, states: OPEN)"));
    assert!(
        documents[1].starts_with(
            "query GitHubAuthoredItems { node(id: \"U_1\") { ... on User { pullRequests(first: 100, after: \"p1\", states: OPEN) {"
        ),
        "{}",
        documents[1]
    );
    assert!(!documents[1].contains("viewer"));
    assert!(store.node("PR_1").is_some());
    assert!(store.node("PR_2").is_some());
}

#[tokio::test]
async fn test_disabled_authored_kind_hides_repositories() {
    let transport = MockTransport::new().when(
        &["viewer"],
        json!({"viewer": {"__typename": "User", "id": "U_1", "pullRequests": page(vec![], &[], false)}}),
    );
    let settings = SyncSettings {
        query_authored_issues: false,
        ..SyncSettings::default()
    };
    let (engine, store) = engine(transport, settings);

    let report = engine.fetch_authored_items().await;

    assert!(report.succeeded());
    assert!(store.is_hidden(LABEL, ItemKind::Issue));
    assert!(!store.is_hidden(LABEL, ItemKind::PullRequest));
    let document = &engine.servers()[0].transport.documents()[0];
    assert!(document.contains("pullRequests(first: 100, states: OPEN)"));
    assert!(!document.contains("issues("));
}

#[tokio::test]
async fn test_no_authored_kinds_sends_nothing() {
    let settings = SyncSettings {
        query_authored_prs: false,
        query_authored_issues: false,
        ..SyncSettings::default()
    };
    let (engine, store) = engine(MockTransport::new(), settings);

    let report = engine.fetch_authored_items().await;

    assert!(report.succeeded());
    assert_eq!(engine.servers()[0].transport.request_count(), 0);
    assert!(store.is_hidden(LABEL, ItemKind::PullRequest));
    assert!(store.is_hidden(LABEL, ItemKind::Issue));
}

#[tokio::test]
async fn test_subscribed_items_stop_at_known_updates() {
    let transport = MockTransport::new()
        .when(
            &["pullRequests(first: 10"],
            json!({
                "nodes": [{
                    "__typename": "Repository",
                    "id": "R_1",
                    "pullRequests": page(
                        vec![
                            item("PullRequest", "PR_3", "2024-01-12T00:00:00Z", None),
                            item("PullRequest", "PR_2", "2024-01-05T00:00:00Z", None),
                            item("PullRequest", "PR_1", "2024-01-01T00:00:00Z", None),
                        ],
                        &["c3", "c2", "c1"],
                        true
                    )
                }]
            }),
        )
        .when(
            &["issues(first: 50, states: OPEN)"],
            json!({
                "nodes": [{
                    "__typename": "Repository",
                    "id": "R_1",
                    "issues": page(vec![item("Issue", "I_1", "2023-12-01T00:00:00Z", None)], &["i1"], false)
                }]
            }),
        );
    let (engine, store) = engine(transport, SyncSettings::default());
    store.set_most_recent_item_update(
        "R_1",
        ItemKind::PullRequest,
        Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap(),
    );

    let report = engine
        .fetch_subscribed_items(&[TrackedRepository::new("R_1", LABEL)])
        .await;

    assert!(report.succeeded(), "{:?}", report.first_error());
    // the first stale item is stored, everything after it is not requested
    assert!(store.node("PR_3").is_some());
    assert!(store.node("PR_2").is_some());
    assert!(store.node("PR_1").is_none());
    assert!(store.node("I_1").is_some());

    let documents = engine.servers()[0].transport.documents();
    assert_eq!(documents.len(), 2);
    assert!(documents.iter().all(|d| !d.contains("after:")));
    assert!(documents[0].starts_with("query GitHubOpenIssues"));
    assert!(documents[1].starts_with("query GitHubUpdatedPRs"));
    assert_eq!(
        store.most_recent_item_update("R_1", ItemKind::PullRequest),
        Some(Utc.with_ymd_and_hms(2024, 1, 12, 0, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn test_hidden_kinds_and_unknown_servers_are_skipped() {
    let transport = MockTransport::new().when(
        &["issues(first: 50, states: OPEN)"],
        json!({"nodes": [{"__typename": "Repository", "id": "R_1", "issues": page(vec![], &[], false)}]}),
    );
    let (engine, _store) = engine(transport, SyncSettings::default());

    let repositories = [
        TrackedRepository::new("R_1", LABEL).with_policies(DisplayPolicy::Hide, DisplayPolicy::All),
        TrackedRepository::new("R_2", LABEL)
            .with_policies(DisplayPolicy::AuthoredOnly, DisplayPolicy::Hide),
        TrackedRepository::new("R_9", "Enterprise"),
    ];
    let report = engine.fetch_subscribed_items(&repositories).await;

    assert!(report.succeeded());
    assert_eq!(report.servers.len(), 1);
    let documents = engine.servers()[0].transport.documents();
    assert_eq!(documents.len(), 1);
    assert!(!documents[0].contains("pullRequests("));
    assert!(!documents[0].contains("R_2"));
    assert!(!documents[0].contains("R_9"));
}

#[tokio::test]
async fn test_update_items_replaces_selected_children_only() {
    let transport = MockTransport::new().when(
        &["nodes(ids: [\"PR_1\",\"PR_2\"])"],
        json!({
            "nodes": [
                {
                    "__typename": "PullRequest",
                    "id": "PR_1",
                    "reviews": page(
                        vec![with_fields(
                            object("PullRequestReview", "PRR_1"),
                            json!({"state": "APPROVED", "author": object("User", "U_1")})
                        )],
                        &["r1"],
                        false
                    ),
                    "comments": page(vec![object("IssueComment", "IC_1")], &["ic1"], false)
                },
                null
            ]
        }),
    );
    let (engine, store) = engine(transport, SyncSettings::default());
    let steps = SyncSteps::new()
        .with(SyncStep::Comments)
        .with(SyncStep::Reviews);

    let report = engine
        .update_items(&tracked(&["PR_1", "PR_2"]), ItemKind::PullRequest, &steps)
        .await;

    assert!(report.succeeded(), "{:?}", report.first_error());
    let calls = store.calls();
    assert_eq!(calls[0].method, "begin_child_sync:reviews");
    assert_eq!(calls[0].ids, vec!["PR_1", "PR_2"]);
    assert_eq!(calls[1].method, "begin_child_sync:comments");
    assert_eq!(store.upsert_order(), vec!["sync_comments", "sync_reviews"]);

    // parents and authors come along in the response but are not replaced
    assert!(store.node("PR_1").is_none());
    assert!(store.node("U_1").is_none());
    assert_eq!(
        store.node("PRR_1").and_then(|n| n.parent().map(|p| p.id().to_string())),
        Some("PR_1".to_string())
    );
    assert!(store.node("IC_1").is_some());
}

fn stored_comment(store: &MemoryStore, id: &str, parent_id: &str) {
    let parent = Arc::new(DiscoveredNode::new(parent_id, "PullRequest", json!({}), None));
    let comment = DiscoveredNode::new(
        id,
        "IssueComment",
        json!({"id": id, "body": "old"}),
        Some(parent),
    );
    store
        .sync_comments(&[Arc::new(comment)], &ApiServer::github(None))
        .unwrap();
}

#[tokio::test]
async fn test_update_items_removes_comments_missing_from_the_response() {
    let transport = MockTransport::new().when(
        &["nodes(ids: [\"PR_1\"])"],
        json!({
            "nodes": [{
                "__typename": "PullRequest",
                "id": "PR_1",
                "comments": page(vec![object("IssueComment", "IC_1")], &["ic1"], false)
            }]
        }),
    );
    let (engine, store) = engine(transport, SyncSettings::default());
    stored_comment(&store, "IC_OLD", "PR_1");
    stored_comment(&store, "IC_OTHER", "PR_2");
    let steps = SyncSteps::new().with(SyncStep::Comments);

    let report = engine
        .update_items(&tracked(&["PR_1"]), ItemKind::PullRequest, &steps)
        .await;

    assert!(report.succeeded(), "{:?}", report.first_error());
    assert!(store.node("IC_OLD").is_none());
    assert!(store.node("IC_1").is_some());
    assert!(store.node("IC_OTHER").is_some());
    assert_eq!(store.flagged_since("IC_OLD"), None);
    assert_eq!(store.calls().last().unwrap().method, "end_child_sync:comments");
}

#[tokio::test]
async fn test_failed_update_keeps_stored_comments() {
    let transport = MockTransport::new().fail_when(&["nodes(ids: [\"PR_1\"])"], "bad gateway");
    let (engine, store) = engine(transport, SyncSettings::default());
    stored_comment(&store, "IC_OLD", "PR_1");
    let steps = SyncSteps::new().with(SyncStep::Comments);

    let report = engine
        .update_items(&tracked(&["PR_1"]), ItemKind::PullRequest, &steps)
        .await;

    assert!(!report.succeeded());
    assert!(store.node("IC_OLD").is_some());
    assert_eq!(store.flagged_since("IC_OLD"), None);
}

#[tokio::test]
async fn test_pull_request_steps_do_not_apply_to_issues() {
    let (engine, store) = engine(MockTransport::new(), SyncSettings::default());
    let steps = SyncSteps::new().with(SyncStep::Statuses);

    let report = engine
        .update_items(&tracked(&["I_1"]), ItemKind::Issue, &steps)
        .await;

    assert!(report.succeeded());
    assert!(report.servers.is_empty());
    assert!(store.calls().is_empty());
    assert_eq!(engine.servers()[0].transport.request_count(), 0);
}

#[tokio::test]
async fn test_failed_batch_does_not_discard_sibling_results() {
    let status_page = json!({
        "nodes": [{
            "__typename": "PullRequest",
            "id": "PR_0",
            "commits": {
                "edges": [{
                    "node": {"commit": {"status": {"contexts": [
                        with_fields(object("StatusContext", "SC_1"), json!({"state": "SUCCESS"}))
                    ]}}},
                    "cursor": "x"
                }],
                "pageInfo": {"hasNextPage": false}
            }
        }]
    });
    let transport = MockTransport::new()
        .fail_when(&["\"PR_100\""], "502 Bad Gateway")
        .when(&["\"PR_0\""], status_page);
    let (engine, store) = engine(transport, SyncSettings::default());

    let ids: Vec<String> = (0..150).map(|i| format!("PR_{}", i)).collect();
    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
    let report = engine
        .update_items(
            &tracked(&ids),
            ItemKind::PullRequest,
            &SyncSteps::new().with(SyncStep::Statuses),
        )
        .await;

    assert!(!report.succeeded());
    assert!(report.first_error().is_some_and(|e| e.contains("Bad Gateway")));
    assert_eq!(engine.servers()[0].transport.request_count(), 2);
    assert_eq!(
        store.node("SC_1").and_then(|n| n.parent().map(|p| p.id().to_string())),
        Some("PR_0".to_string())
    );
    assert_eq!(store.last_sync_succeeded(LABEL), Some(false));
}

#[tokio::test]
async fn test_store_failure_is_reported() {
    let transport = MockTransport::new().when(
        &["reactions("],
        json!({
            "nodes": [{
                "__typename": "IssueComment",
                "id": "IC_1",
                "reactions": page(vec![object("Reaction", "RE_1")], &["r"], false)
            }]
        }),
    );
    let (engine, store) = engine(transport, SyncSettings::default());
    store.fail_method("sync_reactions");

    let report = engine.update_comment_reactions(&tracked(&["IC_1"])).await;

    assert!(!report.succeeded());
    assert!(report.first_error().is_some_and(|e| e.contains("sync_reactions")));
    assert_eq!(store.last_sync_succeeded(LABEL), Some(false));
}

#[tokio::test]
async fn test_small_flush_threshold_flushes_during_the_pass() {
    let comments: Vec<Value> = (0..5)
        .map(|i| object("PullRequestReviewComment", &format!("RC_{}", i)))
        .collect();
    let cursors: Vec<String> = (0..5).map(|i| format!("c{}", i)).collect();
    let cursors: Vec<&str> = cursors.iter().map(String::as_str).collect();
    let transport = MockTransport::new().when(
        &["PullRequestReviewComment"],
        json!({
            "nodes": [{
                "__typename": "PullRequestReview",
                "id": "PRR_1",
                "comments": page(comments, &cursors, false)
            }]
        }),
    );
    let settings = SyncSettings {
        flush_threshold: 2,
        ..SyncSettings::default()
    };
    let (engine, store) = engine(transport, settings);

    let report = engine.update_review_comments(&tracked(&["PRR_1"])).await;

    assert!(report.succeeded());
    assert_eq!(report.nodes_ingested(), 5);
    assert_eq!(store.upsert_order().len(), 3);
    assert_eq!(store.nodes_of_type("PullRequestReviewComment").len(), 5);
    assert!(store.node("PRR_1").is_none());
}

#[tokio::test]
async fn test_api_reports_authenticated_user() {
    let transport = MockTransport::new().when(
        &["viewer"],
        json!({"viewer": {"__typename": "User", "id": "U_1", "login": "octocat"}}),
    );
    let (engine, _store) = engine(transport, SyncSettings::default());

    assert!(engine.test_api(LABEL).await.unwrap());
    assert!(engine.test_api("Enterprise").await.is_err());
}

#[tokio::test]
async fn test_api_without_user_is_not_ok() {
    let transport = MockTransport::new().when(&["viewer"], json!({"viewer": null}));
    let (engine, _store) = engine(transport, SyncSettings::default());

    assert!(!engine.test_api(LABEL).await.unwrap());
}
