//! API server identification

use serde::{Deserialize, Serialize};

/// Default public GitHub API endpoint
pub const GITHUB_API_BASE_URI: &str = "https://api.github.com";

/// Label of the public server when none is configured
pub const GITHUB_SERVER_LABEL: &str = "GitHub";

/// One GitHub or GitHub Enterprise API endpoint with its credentials
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiServer {
    /// Unique, user chosen name of the server
    pub label: String,
    pub api_base_uri: String,
    #[serde(default, skip_serializing)]
    pub auth_token: Option<String>,
}

impl ApiServer {
    pub fn new(
        label: impl Into<String>,
        api_base_uri: impl Into<String>,
        auth_token: Option<String>,
    ) -> Self {
        Self {
            label: label.into(),
            api_base_uri: api_base_uri.into(),
            auth_token,
        }
    }

    /// The public github.com server
    pub fn github(auth_token: Option<String>) -> Self {
        Self::new(GITHUB_SERVER_LABEL, GITHUB_API_BASE_URI, auth_token)
    }
}

impl std::fmt::Debug for ApiServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiServer")
            .field("label", &self.label)
            .field("api_base_uri", &self.api_base_uri)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl std::fmt::Display for ApiServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.label, self.api_base_uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_token() {
        let server = ApiServer::github(Some("ghp_secret".to_string()));
        let debug = format!("{:?}", server);
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_token_is_never_serialized() {
        let server = ApiServer::github(Some("ghp_secret".to_string()));
        let json = serde_json::to_string(&server).unwrap();
        assert!(!json.contains("ghp_secret"));
    }
}
