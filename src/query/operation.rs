use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt, TryStreamExt};
use futures::FutureExt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::element::graphql_string;
use super::usage::RATE_LIMIT_SELECTION;
use super::{DiscoveredNode, Group, NodeCallback, QueryError, UsageStats};
use crate::github::GraphQLTransport;
use crate::github::graphql_types::QueryDocument;

/// Maximum number of follow-up queries of one query running at the same time
pub const FOLLOW_UP_CONCURRENCY: usize = 4;

static OPERATION_NAME_INVALID_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("Failed to compile operation name regex"));

/// Lifecycle of a [`Query`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl QueryState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Completed,
            3 => Self::Failed,
            _ => Self::Pending,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Completed => 2,
            Self::Failed => 3,
        }
    }
}

/// A root selection plus everything needed to execute it and page through
/// its results.
///
/// When a parent node is set the selection is evaluated on that node
/// (`node(id: ...) { ... on Type { ... } }`); this is how the next page of a
/// nested connection is requested.
#[derive(Debug)]
pub struct Query {
    name: String,
    root: Group,
    parent: Option<Arc<DiscoveredNode>>,
    callback: NodeCallback,
    state: AtomicU8,
}

impl Query {
    pub fn new(name: impl Into<String>, root: Group, callback: NodeCallback) -> Self {
        Self {
            name: name.into(),
            root,
            parent: None,
            callback,
            state: AtomicU8::new(QueryState::Pending.as_u8()),
        }
    }

    pub fn with_parent(
        name: impl Into<String>,
        root: Group,
        parent: Option<Arc<DiscoveredNode>>,
        callback: NodeCallback,
    ) -> Self {
        Self {
            parent,
            ..Self::new(name, root, callback)
        }
    }

    /// Query for the next page of `root`, sharing this query's name and callback
    pub(crate) fn continuation(&self, root: Group, parent: Option<Arc<DiscoveredNode>>) -> Self {
        Self::with_parent(self.name.clone(), root, parent, self.callback.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    pub fn parent(&self) -> Option<&Arc<DiscoveredNode>> {
        self.parent.as_ref()
    }

    pub fn callback(&self) -> &NodeCallback {
        &self.callback
    }

    pub fn state(&self) -> QueryState {
        QueryState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: QueryState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub(crate) fn log_prefix(&self) -> String {
        format!("({}) ", self.name)
    }

    /// GraphQL operation name derived from the query name
    pub fn operation_name(&self) -> String {
        let name = OPERATION_NAME_INVALID_CHARS.replace_all(&self.name, "");
        match name.chars().next() {
            None => "Sync".to_string(),
            Some(first) if first.is_ascii_digit() => format!("Q{}", name),
            Some(_) => name.into_owned(),
        }
    }

    /// Complete request document for this query
    pub fn build_document(&self) -> QueryDocument {
        let selection = self.root.render_selection();
        let body = match &self.parent {
            Some(parent) => format!(
                "node(id: {}) {{ ... on {} {{ {} }} }}",
                graphql_string(parent.id()),
                parent.element_type(),
                selection
            ),
            None => selection,
        };
        QueryDocument(format!(
            "query {} {{ {} {} }}",
            self.operation_name(),
            body,
            RATE_LIMIT_SELECTION
        ))
    }

    /// Scan a response's `data` object and return the follow-up queries
    pub fn scan_response(&self, data: &Value) -> Vec<Query> {
        let container = match &self.parent {
            Some(_) => data.get("node"),
            None => Some(data),
        };
        match container.and_then(|c| c.get(self.root.name())) {
            Some(payload) => self.root.scan(self, payload, self.parent.as_ref()),
            None => {
                debug!(
                    "{}No '{}' entry in response, nothing to scan",
                    self.log_prefix(),
                    self.root.name()
                );
                Vec::new()
            }
        }
    }

    /// Execute this query and every follow-up page it leads to.
    ///
    /// `attempt` is forwarded to the transport, which owns retry policy.
    /// The first failing follow-up aborts the remaining ones of this query;
    /// other queries are unaffected.
    pub fn run<'a, T>(
        &'a self,
        transport: &'a T,
        attempt: u32,
    ) -> BoxFuture<'a, Result<UsageStats, QueryError>>
    where
        T: GraphQLTransport + Sync,
    {
        async move {
            self.set_state(QueryState::Running);
            let result = self.run_pages(transport, attempt).await;
            match &result {
                Ok(_) => self.set_state(QueryState::Completed),
                Err(e) => {
                    warn!("{}Failed: {}", self.log_prefix(), e);
                    self.set_state(QueryState::Failed);
                }
            }
            result
        }
        .boxed()
    }

    async fn run_pages<T>(&self, transport: &T, attempt: u32) -> Result<UsageStats, QueryError>
    where
        T: GraphQLTransport + Sync,
    {
        let document = self.build_document();
        debug!("{}Sending: {}", self.log_prefix(), document.0);

        let data = transport
            .execute(&self.name, &document, attempt)
            .await
            .map_err(|e| QueryError::transport(&self.name, &e))?;
        if !data.is_object() {
            return Err(QueryError::MissingData {
                query: self.name.clone(),
            });
        }

        let usage = UsageStats::from_response_data(&data);
        if let Some(remaining) = usage.remaining {
            info!(
                "{}Cost {}, remaining API budget {}",
                self.log_prefix(),
                usage.cost,
                remaining
            );
        }

        let follow_ups = self.scan_response(&data);
        if follow_ups.is_empty() {
            return Ok(usage);
        }

        debug!(
            "{}Running {} follow-up queries",
            self.log_prefix(),
            follow_ups.len()
        );
        let pages: Vec<_> = follow_ups.iter().map(|q| q.run(transport, attempt)).collect();
        stream::iter(pages)
            .buffer_unordered(FOLLOW_UP_CONCURRENCY)
            .try_fold(usage, |mut total, page_usage| async move {
                total.merge(&page_usage);
                Ok(total)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Fragment, QueryElement};
    use serde_json::json;

    fn noop() -> NodeCallback {
        NodeCallback::new(|_| true)
    }

    #[test]
    fn test_document_without_parent() {
        let query = Query::new(
            "GitHub: Authored Items",
            Group::new("viewer", vec![QueryElement::field("login")]),
            noop(),
        );
        assert_eq!(
            query.build_document().0,
            "query GitHubAuthoredItems { viewer { __typename login } rateLimit { limit cost remaining resetAt nodeCount } }"
        );
    }

    #[test]
    fn test_document_with_parent_wraps_node_lookup() {
        let parent = Arc::new(DiscoveredNode::new("R_1", "Repository", json!({}), None));
        let root = Group::new(
            "pullRequests",
            vec![Fragment::new("PullRequest", vec![QueryElement::field("id")]).into()],
        )
        .with_page_size(50)
        .with_continuation("abc")
        .unwrap();
        let query = Query::with_parent("Open PRs", root, Some(parent), noop());
        let document = query.build_document().0;

        assert!(document.starts_with(
            "query OpenPRs { node(id: \"R_1\") { ... on Repository { pullRequests(first: 50, after: \"abc\") {"
        ));
        assert!(document.ends_with("rateLimit { limit cost remaining resetAt nodeCount } }"));
        assert_eq!(document.matches('{').count(), document.matches('}').count());
    }

    #[test]
    fn test_operation_name_sanitised() {
        let query = Query::new("2 servers: PRs/Issues", Group::new("viewer", vec![]), noop());
        assert_eq!(query.operation_name(), "Q2serversPRsIssues");
        let query = Query::new("::", Group::new("viewer", vec![]), noop());
        assert_eq!(query.operation_name(), "Sync");
    }

    #[test]
    fn test_scan_response_with_parent_reads_node_entry() {
        let parent = Arc::new(DiscoveredNode::new("R_1", "Repository", json!({}), None));
        let root = Group::new("issues", vec![QueryElement::field("id")]).with_page_size(2);
        let query = Query::with_parent("Issues", root, Some(parent), noop());
        let data = json!({
            "node": {
                "issues": {
                    "edges": [{"node": {"__typename": "Issue", "id": "I_9"}, "cursor": "z"}],
                    "pageInfo": {"hasNextPage": true}
                }
            }
        });
        let follow_ups = query.scan_response(&data);

        assert_eq!(follow_ups.len(), 1);
        assert_eq!(follow_ups[0].parent().map(|p| p.id()), Some("R_1"));
        assert_eq!(follow_ups[0].root().last_cursor(), Some("z"));
        assert_eq!(follow_ups[0].state(), QueryState::Pending);
    }
}
