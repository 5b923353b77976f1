//! Local store collaborator
//!
//! The sync engine hands every discovered object to a [`LocalStore`], one
//! bulk call per type bucket, and reads back the few facts it needs to shape
//! its queries.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::query::DiscoveredNode;
use crate::services::sync::SyncStep;
use crate::types::{ApiServer, ItemKind};

pub mod memory;

pub use memory::{MemoryStore, StoreCall};

/// Persistent replica of remote objects.
///
/// Bulk upserts receive the nodes of one type bucket in discovery order
/// together with the server they came from. They are always called in
/// dependency order (repositories before items before their children), so an
/// implementation can resolve references to earlier buckets immediately.
pub trait LocalStore: Send + Sync {
    /// Most recent `updatedAt` of the locally stored items of `kind` in a
    /// repository, `None` when no such item is stored
    fn most_recent_item_update(&self, repository_id: &str, kind: ItemKind)
    -> Option<DateTime<Utc>>;

    /// Flag the children that `step` is about to re-fetch for deletion.
    ///
    /// Children that reappear in the response are un-flagged by the following
    /// upserts; the rest are removed by [`LocalStore::end_child_sync`].
    fn begin_child_sync(
        &self,
        parent_ids: &[String],
        step: SyncStep,
        started_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Close a child sync opened with [`LocalStore::begin_child_sync`].
    ///
    /// After a successful pass children still flagged are deleted; after a
    /// failed one the flags are dropped and the children kept, since the
    /// response may have been incomplete. Returns the number deleted.
    fn end_child_sync(&self, parent_ids: &[String], step: SyncStep, succeeded: bool)
    -> Result<usize>;

    /// Hide repositories whose `kind` policy is authored-only, used when the
    /// authored items of that kind are no longer fetched
    fn hide_authored_only_repositories(&self, server: &ApiServer, kind: ItemKind) -> Result<()>;

    fn set_last_sync_succeeded(&self, server: &ApiServer, succeeded: bool) -> Result<()>;

    fn sync_repositories(&self, nodes: &[Arc<DiscoveredNode>], server: &ApiServer) -> Result<()>;

    fn sync_issues(&self, nodes: &[Arc<DiscoveredNode>], server: &ApiServer) -> Result<()>;

    fn sync_pull_requests(&self, nodes: &[Arc<DiscoveredNode>], server: &ApiServer) -> Result<()>;

    fn sync_labels(&self, nodes: &[Arc<DiscoveredNode>], server: &ApiServer) -> Result<()>;

    fn sync_reactions(&self, nodes: &[Arc<DiscoveredNode>], server: &ApiServer) -> Result<()>;

    /// Issue comments and review comments; tell them apart by element type
    fn sync_comments(&self, nodes: &[Arc<DiscoveredNode>], server: &ApiServer) -> Result<()>;

    fn sync_review_requests(&self, nodes: &[Arc<DiscoveredNode>], server: &ApiServer)
    -> Result<()>;

    fn sync_reviews(&self, nodes: &[Arc<DiscoveredNode>], server: &ApiServer) -> Result<()>;

    fn sync_statuses(&self, nodes: &[Arc<DiscoveredNode>], server: &ApiServer) -> Result<()>;
}
