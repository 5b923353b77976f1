//! Error taxonomy for query construction and execution

/// Errors surfaced by query construction, batching and execution.
///
/// Values of this type are returned (never panicked) so the orchestration
/// layer can decide per server whether to continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The query tree or batching parameters are unusable (zero batch size,
    /// continuation of a group that cannot page, ...)
    InvalidConfiguration(String),
    /// The transport collaborator failed to execute a query
    Transport { query: String, message: String },
    /// The response carried no `data` object to scan
    MissingData { query: String },
}

impl QueryError {
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    pub fn transport(query: &str, error: &anyhow::Error) -> Self {
        Self::Transport {
            query: query.to_string(),
            message: format!("{:#}", error),
        }
    }
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfiguration(msg) => write!(f, "Invalid query configuration: {}", msg),
            Self::Transport { query, message } => {
                write!(f, "Query '{}' failed: {}", query, message)
            }
            Self::MissingData { query } => write!(f, "Query '{}' returned no data", query),
        }
    }
}

impl std::error::Error for QueryError {}
