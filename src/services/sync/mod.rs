//! Sync orchestration
//!
//! Decides per server which selections and paging strategy each operation
//! uses, runs the resulting queries and funnels discovered objects into the
//! local store in dependency order.

pub mod accumulator;
pub mod engine;
pub mod fields;
pub mod ingest;
pub mod report;
pub mod steps;

pub use accumulator::{AccumulatorSummary, DEFAULT_FLUSH_THRESHOLD, NodeAccumulator};
pub use engine::{
    ITEM_BATCH_SIZE, ItemUpdatePlan, LATEST_ITEMS_BATCH_SIZE, OPEN_ITEMS_BATCH_SIZE,
    REVIEW_COMMENTS_BATCH_SIZE, ServerConnection, SyncEngine,
};
pub use ingest::{IngestionPipeline, NodeBuckets};
pub use report::{ServerSyncResult, SyncReport};
pub use steps::{SyncStep, SyncSteps};
