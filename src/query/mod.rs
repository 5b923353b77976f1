//! Query construction and incremental paging engine
//!
//! Builds GraphQL documents from a declarative selection model, walks the
//! responses to report discovered objects, and chains follow-up queries until
//! every connection is exhausted or the node callback signals that older pages
//! are already known locally.

pub mod batch;
mod callback;
pub mod element;
mod error;
mod node;
mod operation;
mod scan;
mod usage;

pub use batch::{BulkLookup, batch, batch_with_lookup};
pub use callback::{NodeCallback, NodeSink};
pub use element::{Field, Fragment, Group, QueryElement};
pub use error::QueryError;
pub use node::{DiscoveredNode, ID_KEY, TYPENAME_KEY};
pub use operation::{FOLLOW_UP_CONCURRENCY, Query, QueryState};
pub use usage::{RATE_LIMIT_SELECTION, UsageStats};
