/// Classification of API errors for retry logic
#[derive(Debug, Clone, PartialEq)]
pub enum ApiRetryableError {
    /// Errors that should be retried (5xx server errors, network issues, timeouts)
    Retryable(String),
    /// Rate limiting errors (429, or 403 mentioning the rate limit) - retryable with backoff
    RateLimit,
    /// Errors that should not be retried (authentication, bad queries, missing data)
    NonRetryable(String),
}

impl ApiRetryableError {
    /// Classify an HTTP status code returned by the GraphQL endpoint
    pub fn from_status(status: u16, message: &str) -> Self {
        let detail = format!("GraphQL endpoint returned {}: {}", status, message);
        match status {
            429 => Self::RateLimit,
            403 if message.to_lowercase().contains("rate limit") => Self::RateLimit,
            500..=599 => Self::Retryable(detail),
            _ => Self::NonRetryable(detail),
        }
    }

    /// Convert octocrab error to appropriate retry category
    pub fn from_octocrab_error(error: octocrab::Error) -> Self {
        tracing::debug!("Raw octocrab error: {:?}", error);

        let result = match &error {
            octocrab::Error::GitHub { source, .. } => {
                Self::from_status(source.status_code.as_u16(), &source.message)
            }
            octocrab::Error::Http { .. } | octocrab::Error::Hyper { .. } => {
                Self::Retryable(format!("HTTP transport error: {}", error))
            }
            octocrab::Error::Json { .. } => {
                Self::NonRetryable(format!("Malformed GraphQL response: {}", error))
            }
            _ => Self::NonRetryable(format!("GitHub client error: {}", error)),
        };

        match &result {
            Self::RateLimit => tracing::warn!("Rate limit detected: {}", error),
            Self::Retryable(msg) => tracing::warn!("Retryable transport error: {}", msg),
            Self::NonRetryable(msg) => tracing::error!("Non-retryable transport error: {}", msg),
        }
        result
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NonRetryable(_))
    }
}

impl std::fmt::Display for ApiRetryableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retryable(msg) => write!(f, "Retryable error: {}", msg),
            Self::RateLimit => write!(f, "Rate limit error"),
            Self::NonRetryable(msg) => write!(f, "Non-retryable error: {}", msg),
        }
    }
}

impl std::error::Error for ApiRetryableError {}
