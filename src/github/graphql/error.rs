use crate::github::error::ApiRetryableError;
use crate::github::graphql::graphql_types::GraphQLError;

/// GitHub error type reported for ids that no longer resolve to a node
pub const NOT_FOUND_ERROR_TYPE: &str = "NOT_FOUND";

/// Whether the response can still be scanned despite its errors.
///
/// Bulk `nodes(ids: ...)` lookups return `null` plus a `NOT_FOUND` error for
/// deleted objects; the remaining data is still valid.
pub fn only_missing_nodes(errors: &[GraphQLError]) -> bool {
    !errors.is_empty()
        && errors
            .iter()
            .all(|e| e.error_type.as_deref() == Some(NOT_FOUND_ERROR_TYPE))
}

/// Classifies GraphQL errors for retry handling.
///
/// # Arguments
///
/// * `errors` - The `errors` entries of a GraphQL response
///
/// # Returns
///
/// Returns an ApiRetryableError with appropriate classification.
pub fn classify_graphql_errors(errors: &[GraphQLError]) -> ApiRetryableError {
    let error_msg = errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    if errors
        .iter()
        .any(|e| e.error_type.as_deref() == Some("RATE_LIMITED"))
        || error_msg.contains("rate limit")
    {
        tracing::warn!("GraphQL rate limit error - will retry: {}", error_msg);
        ApiRetryableError::RateLimit
    } else if error_msg.contains("timeout")
        || error_msg.contains("timedout")
        || error_msg.contains("server error")
        || error_msg.contains("Something went wrong")
    {
        tracing::warn!("GraphQL server error - will retry: {}", error_msg);
        ApiRetryableError::Retryable(format!("GraphQL server error: {}", error_msg))
    } else if errors.iter().any(|e| {
        matches!(
            e.error_type.as_deref(),
            Some(NOT_FOUND_ERROR_TYPE) | Some("FORBIDDEN") | Some("INSUFFICIENT_SCOPES")
        )
    }) {
        tracing::info!("GraphQL access error - not retryable: {}", error_msg);
        ApiRetryableError::NonRetryable(format!("GraphQL access error: {}", error_msg))
    } else if error_msg.contains("Parse error")
        || error_msg.contains("syntax")
        || error_msg.contains("doesn't exist on type")
    {
        // the document itself is wrong, retrying sends the same text again
        tracing::error!("GraphQL validation error - not retryable: {}", error_msg);
        ApiRetryableError::NonRetryable(format!("GraphQL validation error: {}", error_msg))
    } else {
        tracing::warn!("Unknown GraphQL error - treating as retryable: {}", error_msg);
        ApiRetryableError::Retryable(format!("GraphQL error: {}", error_msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(message: &str, error_type: Option<&str>) -> GraphQLError {
        GraphQLError {
            message: message.to_string(),
            error_type: error_type.map(str::to_string),
            locations: Vec::new(),
            path: Vec::new(),
        }
    }

    #[test]
    fn test_missing_nodes_are_tolerated() {
        let errors = vec![
            error("Could not resolve to a node with the global id of 'X'", Some("NOT_FOUND")),
            error("Could not resolve to a node with the global id of 'Y'", Some("NOT_FOUND")),
        ];
        assert!(only_missing_nodes(&errors));
        assert!(!only_missing_nodes(&[]));
        assert!(!only_missing_nodes(&[error("boom", None)]));
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            classify_graphql_errors(&[error("API rate limit exceeded", Some("RATE_LIMITED"))]),
            ApiRetryableError::RateLimit
        );
        assert!(matches!(
            classify_graphql_errors(&[error(
                "Field 'foo' doesn't exist on type 'Issue'",
                None
            )]),
            ApiRetryableError::NonRetryable(_)
        ));
        assert!(matches!(
            classify_graphql_errors(&[error("Something went wrong while executing your query", None)]),
            ApiRetryableError::Retryable(_)
        ));
    }
}
