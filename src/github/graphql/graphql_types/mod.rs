use serde::{Deserialize, Serialize};

/// Complete GraphQL request document text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryDocument(pub String);

impl std::fmt::Display for QueryDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphQLPayload<T: serde::Serialize> {
    pub query: QueryDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    /// GitHub specific error classification such as `NOT_FOUND` or `RATE_LIMITED`
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub locations: Vec<serde_json::Value>,
    #[serde(default)]
    pub path: Vec<serde_json::Value>,
}
