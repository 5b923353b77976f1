//! Ordered hand-off of node buckets to the local store

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::query::DiscoveredNode;
use crate::store::LocalStore;
use crate::types::ApiServer;

/// Nodes of one flush, keyed by element type
pub type NodeBuckets = HashMap<String, Vec<Arc<DiscoveredNode>>>;

type Handler<S> = fn(&S, &[Arc<DiscoveredNode>], &ApiServer) -> Result<()>;

/// Element type to store handler mapping, in ingestion order.
///
/// Containers come before the items they hold and items before the objects
/// referencing them, so every handler can resolve the ids it refers to.
pub struct IngestionPipeline<S> {
    handlers: Vec<(&'static str, Handler<S>)>,
}

impl<S: LocalStore> IngestionPipeline<S> {
    pub fn new() -> Self {
        Self {
            handlers: vec![
                ("Repository", S::sync_repositories as Handler<S>),
                ("Issue", S::sync_issues as Handler<S>),
                ("PullRequest", S::sync_pull_requests as Handler<S>),
                ("Label", S::sync_labels as Handler<S>),
                ("Reaction", S::sync_reactions as Handler<S>),
                ("IssueComment", S::sync_comments as Handler<S>),
                ("PullRequestReviewComment", S::sync_comments as Handler<S>),
                ("ReviewRequest", S::sync_review_requests as Handler<S>),
                ("PullRequestReview", S::sync_reviews as Handler<S>),
                ("StatusContext", S::sync_statuses as Handler<S>),
            ],
        }
    }

    /// Element types with a handler, in ingestion order
    pub fn element_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.iter().map(|(element_type, _)| *element_type)
    }

    /// Hand every bucket with a handler to the store and return the number of
    /// nodes stored. Stops at the first failing handler.
    pub fn ingest(&self, store: &S, buckets: &NodeBuckets, server: &ApiServer) -> Result<usize> {
        let mut stored = 0;
        for (element_type, handler) in &self.handlers {
            let Some(nodes) = buckets.get(*element_type).filter(|n| !n.is_empty()) else {
                continue;
            };
            handler(store, nodes, server).with_context(|| {
                format!(
                    "Failed to store {} {} nodes from {}",
                    nodes.len(),
                    element_type,
                    server.label
                )
            })?;
            stored += nodes.len();
        }

        for (element_type, nodes) in buckets {
            if !self.handlers.iter().any(|(t, _)| t == element_type) {
                debug!(
                    "Ignoring {} '{}' nodes from {}, nothing stores them",
                    nodes.len(),
                    element_type,
                    server.label
                );
            }
        }
        Ok(stored)
    }
}

impl<S: LocalStore> Default for IngestionPipeline<S> {
    fn default() -> Self {
        Self::new()
    }
}
