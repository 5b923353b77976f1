//! Per-pass node accumulation
//!
//! One [`NodeAccumulator`] receives every node of one server's sync pass. It
//! buckets nodes by element type and hands them to the store whenever enough
//! are pending, and once more when the pass ends.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use super::ingest::{IngestionPipeline, NodeBuckets};
use crate::query::{DiscoveredNode, NodeSink};
use crate::store::LocalStore;
use crate::types::{ApiServer, ItemKind};

/// Default number of pending nodes that triggers a flush
pub const DEFAULT_FLUSH_THRESHOLD: usize = 2000;

/// Outcome of a finished accumulation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccumulatorSummary {
    /// Nodes handed to the store
    pub ingested: usize,
    pub flushes: usize,
    /// First store error, if any
    pub error: Option<String>,
}

pub struct NodeAccumulator<S: LocalStore> {
    store: Arc<S>,
    server: ApiServer,
    pipeline: Arc<IngestionPipeline<S>>,
    flush_threshold: usize,
    accepted_types: Option<HashSet<String>>,
    cutoffs: HashMap<(String, ItemKind), DateTime<Utc>>,
    buckets: NodeBuckets,
    pending: usize,
    summary: AccumulatorSummary,
}

impl<S: LocalStore> NodeAccumulator<S> {
    pub fn new(
        store: Arc<S>,
        server: ApiServer,
        pipeline: Arc<IngestionPipeline<S>>,
        flush_threshold: usize,
    ) -> Self {
        Self {
            store,
            server,
            pipeline,
            flush_threshold: flush_threshold.max(1),
            accepted_types: None,
            cutoffs: HashMap::new(),
            buckets: NodeBuckets::new(),
            pending: 0,
            summary: AccumulatorSummary::default(),
        }
    }

    /// Only keep nodes of these element types; others are passed over but
    /// scanning continues below them
    pub fn accepting<I, T>(mut self, element_types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.accepted_types = Some(element_types.into_iter().map(Into::into).collect());
        self
    }

    /// Stop paging a repository's items of a kind once an item updated
    /// before the given time shows up
    pub fn with_cutoffs(mut self, cutoffs: HashMap<(String, ItemKind), DateTime<Utc>>) -> Self {
        self.cutoffs = cutoffs;
        self
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    fn is_accepted(&self, node: &DiscoveredNode) -> bool {
        self.accepted_types
            .as_ref()
            .is_none_or(|types| types.contains(node.element_type()))
    }

    /// Whether `node` is an item older than what the store already holds for
    /// its repository
    fn is_known(&self, node: &DiscoveredNode) -> bool {
        let Some(kind) = ItemKind::from_type_name(node.element_type()) else {
            return false;
        };
        let Some(repository) = node.parent().filter(|p| p.element_type() == "Repository") else {
            return false;
        };
        let Some(cutoff) = self.cutoffs.get(&(repository.id().to_string(), kind)) else {
            return false;
        };
        node.str_field("updatedAt")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .is_some_and(|updated_at| updated_at.with_timezone(&Utc) < *cutoff)
    }

    /// Store everything pending
    pub fn flush(&mut self) {
        self.pending = 0;
        if self.buckets.is_empty() {
            return;
        }
        let buckets = std::mem::take(&mut self.buckets);
        self.summary.flushes += 1;
        match self.pipeline.ingest(&self.store, &buckets, &self.server) {
            Ok(stored) => {
                debug!("Flushed {} nodes from {}", stored, self.server.label);
                self.summary.ingested += stored;
            }
            Err(e) => {
                error!("{:#}", e);
                if self.summary.error.is_none() {
                    self.summary.error = Some(format!("{:#}", e));
                }
            }
        }
    }

    /// Flush the remainder and report what was stored
    pub fn finish(&mut self) -> AccumulatorSummary {
        self.flush();
        info!(
            "{}: stored {} nodes in {} flushes",
            self.server.label, self.summary.ingested, self.summary.flushes
        );
        std::mem::take(&mut self.summary)
    }
}

impl<S: LocalStore> NodeSink for NodeAccumulator<S> {
    fn accept(&mut self, node: &Arc<DiscoveredNode>) -> bool {
        if !self.is_accepted(node) {
            return true;
        }

        self.buckets
            .entry(node.element_type().to_string())
            .or_default()
            .push(Arc::clone(node));

        if self.is_known(node) {
            debug!(
                "Don't need further '{}' items for parent ID {}, got all the updated ones already",
                node.element_type(),
                node.parent().map(|p| p.id()).unwrap_or_default()
            );
            return false;
        }

        self.pending += 1;
        if self.pending >= self.flush_threshold {
            self.flush();
        }
        true
    }
}
