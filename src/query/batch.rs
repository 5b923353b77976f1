//! Bulk lookup batching
//!
//! Splits a long list of node identifiers into provider-sized chunks, one
//! [`Query`] per chunk, all feeding the same node callback.

use std::sync::Arc;

use super::{Group, NodeCallback, Query, QueryElement, QueryError};

/// Root field used to fetch several objects by identifier in one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkLookup {
    /// Name of the top level field, e.g. `nodes`
    pub field: &'static str,
    /// Name of its identifier list argument, e.g. `ids`
    pub argument: &'static str,
}

impl BulkLookup {
    /// GitHub's `nodes(ids: [...])` lookup
    pub const GITHUB_NODES: BulkLookup = BulkLookup {
        field: "nodes",
        argument: "ids",
    };
}

impl Default for BulkLookup {
    fn default() -> Self {
        Self::GITHUB_NODES
    }
}

/// Split `ids` into chunks of at most `batch_size` identifiers using GitHub's
/// `nodes` lookup. See [`batch_with_lookup`].
pub fn batch(
    name: &str,
    fields: Vec<QueryElement>,
    ids: &[String],
    batch_size: usize,
    callback: &NodeCallback,
) -> Result<Vec<Query>, QueryError> {
    batch_with_lookup(BulkLookup::GITHUB_NODES, name, fields, ids, batch_size, callback)
}

/// Build one query per chunk of `ids`, preserving their order.
///
/// An empty id list yields no queries.
///
/// # Errors
///
/// Returns [`QueryError::InvalidConfiguration`] when `batch_size` is zero.
pub fn batch_with_lookup(
    lookup: BulkLookup,
    name: &str,
    fields: Vec<QueryElement>,
    ids: &[String],
    batch_size: usize,
    callback: &NodeCallback,
) -> Result<Vec<Query>, QueryError> {
    if batch_size == 0 {
        return Err(QueryError::invalid_configuration(format!(
            "batch size for '{}' must be greater than zero",
            name
        )));
    }

    let fields: Arc<[QueryElement]> = fields.into();
    ids.chunks(batch_size)
        .map(|chunk| {
            let id_list = serde_json::to_string(chunk).map_err(|e| {
                QueryError::invalid_configuration(format!("cannot encode id list: {}", e))
            })?;
            let root = Group::with_shared_fields(lookup.field, Arc::clone(&fields))
                .with_extra_param(lookup.argument, id_list);
            Ok(Query::new(name, root, callback.clone()))
        })
        .collect()
}
