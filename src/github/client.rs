use crate::github::error::ApiRetryableError;
use crate::types::ApiServer;

use super::graphql::error::{classify_graphql_errors, only_missing_nodes};
use super::graphql::graphql_types::{GraphQLPayload, GraphQLResponse, QueryDocument};

use anyhow::{Context, Result};
use octocrab::Octocrab;
use serde_json::Value;
use std::future::Future;
use tokio::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Default maximum number of retry attempts for API operations
pub const DEFAULT_MAX_RETRY_COUNT: u32 = 5;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes GraphQL documents against one API server.
///
/// Implementations own authentication, HTTP framing and retry/backoff; the
/// `attempt` number threaded in by the caller is where their retry count
/// starts.
pub trait GraphQLTransport {
    /// Execute `document` and return the response's `data` object
    fn execute(
        &self,
        query_name: &str,
        document: &QueryDocument,
        attempt: u32,
    ) -> impl Future<Output = Result<Value>> + Send;
}

/// octocrab backed transport for one GitHub (or GitHub Enterprise) server
#[derive(Clone)]
pub struct GitHubClient {
    pub(crate) client: octocrab::Octocrab,
    server_label: String,
    request_timeout: Duration,
    max_retry_count: u32,
}

impl GitHubClient {
    pub fn new(server: &ApiServer, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Octocrab::builder()
            .base_uri(server.api_base_uri.as_str())
            .with_context(|| format!("Invalid API base URI for {}", server.label))?;

        if let Some(token) = &server.auth_token {
            builder = builder.personal_token(token.clone());
        }

        let timeout_duration = timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let connection_timeout = if timeout_duration < Duration::from_secs(10) {
            std::cmp::max(timeout_duration, Duration::from_secs(1))
        } else {
            Duration::from_secs(30)
        };

        let read_write_timeout = std::cmp::max(timeout_duration, Duration::from_secs(1));

        builder = builder
            .set_connect_timeout(Some(connection_timeout))
            .set_read_timeout(Some(read_write_timeout))
            .set_write_timeout(Some(read_write_timeout));

        let client = builder.build().context("Failed to build GitHub client")?;

        Ok(Self {
            client,
            server_label: server.label.clone(),
            request_timeout: read_write_timeout,
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
        })
    }

    pub fn with_max_retry_count(mut self, max_retry_count: u32) -> Self {
        self.max_retry_count = max_retry_count;
        self
    }

    pub fn server_label(&self) -> &str {
        &self.server_label
    }

    async fn post_document(
        &self,
        payload: &GraphQLPayload<Value>,
    ) -> std::result::Result<Value, ApiRetryableError> {
        let start_time = std::time::Instant::now();

        let response: GraphQLResponse<Value> =
            tokio::time::timeout(self.request_timeout, self.client.graphql(payload))
                .await
                .map_err(|_| {
                    let duration = start_time.elapsed();
                    error!("GraphQL request timed out after {:?}", duration);
                    ApiRetryableError::Retryable(format!(
                        "GraphQL request timed out after {:?}",
                        duration
                    ))
                })?
                .map_err(ApiRetryableError::from_octocrab_error)?;

        debug!("GraphQL request completed in {:?}", start_time.elapsed());

        if let Some(errors) = response.errors.as_ref().filter(|e| !e.is_empty()) {
            if response.data.is_some() && only_missing_nodes(errors) {
                warn!(
                    "{}: {} requested nodes no longer exist, continuing with the rest",
                    self.server_label,
                    errors.len()
                );
            } else {
                return Err(classify_graphql_errors(errors));
            }
        }

        response
            .data
            .filter(|data| !data.is_null())
            .ok_or_else(|| ApiRetryableError::NonRetryable("No data in GraphQL response".into()))
    }
}

impl GraphQLTransport for GitHubClient {
    fn execute(
        &self,
        query_name: &str,
        document: &QueryDocument,
        attempt: u32,
    ) -> impl Future<Output = Result<Value>> + Send {
        let payload = GraphQLPayload::<Value> {
            query: document.clone(),
            variables: None,
        };
        let operation_name = format!("{}: {}", self.server_label, query_name);

        async move {
            info!("Starting GraphQL request {}", operation_name);
            retry_with_backoff(&operation_name, attempt, Some(self.max_retry_count), || {
                self.post_document(&payload)
            })
            .await
        }
    }
}

/// Runs `execute_operation` until it succeeds, fails permanently, or the
/// retry budget is spent. Counting starts at `first_attempt` so callers that
/// already retried at a higher level do not get a fresh budget.
pub(crate) async fn retry_with_backoff<F, Fut, T>(
    operation_name: &str,
    first_attempt: u32,
    max_retry_count: Option<u32>,
    execute_operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, ApiRetryableError>>,
{
    let mut attempt = first_attempt;
    let max_retries = max_retry_count.unwrap_or(DEFAULT_MAX_RETRY_COUNT);

    loop {
        let e = match execute_operation().await {
            Ok(result) => {
                debug!(
                    "Operation {} succeeded on attempt {}",
                    operation_name,
                    attempt + 1
                );
                return Ok(result);
            }
            Err(e) => e,
        };

        warn!(
            "Operation {} failed on attempt {}: {}",
            operation_name,
            attempt + 1,
            e,
        );

        let base_delay_ms: u64 = match &e {
            ApiRetryableError::NonRetryable(_) => {
                return Err(anyhow::anyhow!(e))
                    .with_context(|| format!("{} failed permanently", operation_name));
            }
            ApiRetryableError::RateLimit => 1000,
            ApiRetryableError::Retryable(_) => 500,
        };

        if attempt >= max_retries {
            warn!(
                "Retries exhausted for {} after {} attempts",
                operation_name,
                attempt + 1
            );
            return Err(anyhow::anyhow!(e))
                .with_context(|| format!("{} failed after {} attempts", operation_name, attempt + 1));
        }

        attempt += 1;
        let backoff_delay =
            Duration::from_millis(base_delay_ms.saturating_mul(2_u64.saturating_pow(attempt - 1)));
        warn!(
            "Backing off {:?} before attempt {}/{} of {}",
            backoff_delay,
            attempt + 1,
            max_retries + 1,
            operation_name
        );
        sleep(backoff_delay).await;
    }
}
