//! In-memory [`LocalStore`]
//!
//! Keeps the latest copy of every ingested node and a log of the calls it
//! received. Used by the CLI and by tests that check ingestion order.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::LocalStore;
use crate::query::DiscoveredNode;
use crate::services::sync::SyncStep;
use crate::types::{ApiServer, ItemKind};

/// One call received by a [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreCall {
    pub method: String,
    pub server: String,
    /// Node ids passed to a bulk upsert, or parent ids of `begin_child_sync`
    pub ids: Vec<String>,
}

#[derive(Default)]
struct MemoryState {
    nodes: HashMap<String, Arc<DiscoveredNode>>,
    latest_updates: HashMap<(String, ItemKind), DateTime<Utc>>,
    calls: Vec<StoreCall>,
    hidden: HashSet<(String, ItemKind)>,
    last_sync: HashMap<String, bool>,
    failing_methods: HashSet<String>,
    /// Children awaiting deletion, with the start of the sync that flagged them
    flagged: HashMap<String, DateTime<Utc>>,
}

impl MemoryState {
    /// Ids of stored children `step` replaces below any of `parent_ids`
    fn replaced_children(&self, parent_ids: &[String], step: SyncStep) -> Vec<String> {
        let parents: HashSet<&str> = parent_ids.iter().map(String::as_str).collect();
        let types = step.element_types();
        self.nodes
            .values()
            .filter(|n| types.contains(&n.element_type()) && has_ancestor_in(n, &parents))
            .map(|n| n.id().to_string())
            .collect()
    }
}

fn has_ancestor_in(node: &DiscoveredNode, ids: &HashSet<&str>) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if ids.contains(parent.id()) {
            return true;
        }
        current = parent.parent();
    }
    false
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pretend a repository already holds items of `kind` updated at `updated_at`
    pub fn set_most_recent_item_update(
        &self,
        repository_id: impl Into<String>,
        kind: ItemKind,
        updated_at: DateTime<Utc>,
    ) {
        self.state()
            .latest_updates
            .insert((repository_id.into(), kind), updated_at);
    }

    /// Make every later call of `method` fail
    pub fn fail_method(&self, method: &str) {
        self.state().failing_methods.insert(method.to_string());
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    /// Names of the bulk upserts received, in call order
    pub fn upsert_order(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.method.starts_with("sync_"))
            .map(|c| c.method.clone())
            .collect()
    }

    pub fn node(&self, id: &str) -> Option<Arc<DiscoveredNode>> {
        self.state().nodes.get(id).cloned()
    }

    pub fn node_count(&self) -> usize {
        self.state().nodes.len()
    }

    /// Stored nodes of one type, sorted by id
    pub fn nodes_of_type(&self, element_type: &str) -> Vec<Arc<DiscoveredNode>> {
        let mut nodes: Vec<_> = self
            .state()
            .nodes
            .values()
            .filter(|n| n.element_type() == element_type)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.id().cmp(b.id()));
        nodes
    }

    pub fn is_hidden(&self, server_label: &str, kind: ItemKind) -> bool {
        self.state()
            .hidden
            .contains(&(server_label.to_string(), kind))
    }

    /// When the child sync that flagged `id` for deletion started
    pub fn flagged_since(&self, id: &str) -> Option<DateTime<Utc>> {
        self.state().flagged.get(id).copied()
    }

    pub fn last_sync_succeeded(&self, server_label: &str) -> Option<bool> {
        self.state().last_sync.get(server_label).copied()
    }

    fn record(&self, method: &str, server: &str, ids: Vec<String>) -> Result<MutexGuard<'_, MemoryState>> {
        let mut state = self.state();
        if state.failing_methods.contains(method) {
            bail!("{} failed for server {}", method, server);
        }
        state.calls.push(StoreCall {
            method: method.to_string(),
            server: server.to_string(),
            ids,
        });
        Ok(state)
    }

    fn upsert(&self, method: &str, nodes: &[Arc<DiscoveredNode>], server: &ApiServer) -> Result<()> {
        let ids = nodes.iter().map(|n| n.id().to_string()).collect();
        let mut state = self.record(method, &server.label, ids)?;
        debug!("{}: storing {} nodes from {}", method, nodes.len(), server.label);
        for node in nodes {
            state.flagged.remove(node.id());
            state.nodes.insert(node.id().to_string(), Arc::clone(node));
        }
        Ok(())
    }

    fn upsert_items(&self, method: &str, nodes: &[Arc<DiscoveredNode>], server: &ApiServer) -> Result<()> {
        self.upsert(method, nodes, server)?;
        let mut state = self.state();
        for node in nodes {
            let Some(kind) = ItemKind::from_type_name(node.element_type()) else {
                continue;
            };
            let Some(repository_id) = item_repository_id(node) else {
                continue;
            };
            let Some(updated_at) = node
                .str_field("updatedAt")
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&Utc))
            else {
                continue;
            };
            let latest = state
                .latest_updates
                .entry((repository_id.to_string(), kind))
                .or_insert(updated_at);
            if *latest < updated_at {
                *latest = updated_at;
            }
        }
        Ok(())
    }
}

/// Repository of a pull request or issue, from its payload or its parent node
pub(crate) fn item_repository_id(node: &DiscoveredNode) -> Option<&str> {
    node.nested_id("repository").or_else(|| {
        node.parent()
            .filter(|p| p.element_type() == "Repository")
            .map(|p| p.id())
    })
}

impl LocalStore for MemoryStore {
    fn most_recent_item_update(
        &self,
        repository_id: &str,
        kind: ItemKind,
    ) -> Option<DateTime<Utc>> {
        self.state()
            .latest_updates
            .get(&(repository_id.to_string(), kind))
            .copied()
    }

    fn begin_child_sync(
        &self,
        parent_ids: &[String],
        step: SyncStep,
        started_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.record(&format!("begin_child_sync:{}", step), "", parent_ids.to_vec())?;
        let children = state.replaced_children(parent_ids, step);
        debug!("Flagged {} {} children for deletion", children.len(), step);
        for id in children {
            state.flagged.insert(id, started_at);
        }
        Ok(())
    }

    fn end_child_sync(
        &self,
        parent_ids: &[String],
        step: SyncStep,
        succeeded: bool,
    ) -> Result<usize> {
        let mut state = self.record(&format!("end_child_sync:{}", step), "", parent_ids.to_vec())?;
        let stale: Vec<String> = state
            .replaced_children(parent_ids, step)
            .into_iter()
            .filter(|id| state.flagged.contains_key(id))
            .collect();
        let mut removed = 0;
        for id in &stale {
            state.flagged.remove(id);
            if succeeded && state.nodes.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn hide_authored_only_repositories(&self, server: &ApiServer, kind: ItemKind) -> Result<()> {
        let mut state = self.record("hide_authored_only_repositories", &server.label, Vec::new())?;
        state.hidden.insert((server.label.clone(), kind));
        Ok(())
    }

    fn set_last_sync_succeeded(&self, server: &ApiServer, succeeded: bool) -> Result<()> {
        let mut state = self.record("set_last_sync_succeeded", &server.label, Vec::new())?;
        state.last_sync.insert(server.label.clone(), succeeded);
        Ok(())
    }

    fn sync_repositories(&self, nodes: &[Arc<DiscoveredNode>], server: &ApiServer) -> Result<()> {
        self.upsert("sync_repositories", nodes, server)
    }

    fn sync_issues(&self, nodes: &[Arc<DiscoveredNode>], server: &ApiServer) -> Result<()> {
        self.upsert_items("sync_issues", nodes, server)
    }

    fn sync_pull_requests(&self, nodes: &[Arc<DiscoveredNode>], server: &ApiServer) -> Result<()> {
        self.upsert_items("sync_pull_requests", nodes, server)
    }

    fn sync_labels(&self, nodes: &[Arc<DiscoveredNode>], server: &ApiServer) -> Result<()> {
        self.upsert("sync_labels", nodes, server)
    }

    fn sync_reactions(&self, nodes: &[Arc<DiscoveredNode>], server: &ApiServer) -> Result<()> {
        self.upsert("sync_reactions", nodes, server)
    }

    fn sync_comments(&self, nodes: &[Arc<DiscoveredNode>], server: &ApiServer) -> Result<()> {
        self.upsert("sync_comments", nodes, server)
    }

    fn sync_review_requests(
        &self,
        nodes: &[Arc<DiscoveredNode>],
        server: &ApiServer,
    ) -> Result<()> {
        self.upsert("sync_review_requests", nodes, server)
    }

    fn sync_reviews(&self, nodes: &[Arc<DiscoveredNode>], server: &ApiServer) -> Result<()> {
        self.upsert("sync_reviews", nodes, server)
    }

    fn sync_statuses(&self, nodes: &[Arc<DiscoveredNode>], server: &ApiServer) -> Result<()> {
        self.upsert("sync_statuses", nodes, server)
    }
}
