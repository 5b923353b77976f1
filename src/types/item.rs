//! Pull request and issue identification

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Kind of tracked item. Displays as its GraphQL type name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    #[strum(to_string = "PullRequest", serialize = "pull-request", serialize = "pr")]
    PullRequest,
    #[strum(to_string = "Issue", serialize = "issue")]
    Issue,
}

impl ItemKind {
    /// Connection name of this kind on `Repository` and `User`
    pub fn connection_name(&self) -> &'static str {
        match self {
            ItemKind::PullRequest => "pullRequests",
            ItemKind::Issue => "issues",
        }
    }

    /// GraphQL type name of this kind
    pub fn type_name(&self) -> &'static str {
        match self {
            ItemKind::PullRequest => "PullRequest",
            ItemKind::Issue => "Issue",
        }
    }

    pub fn from_type_name(type_name: &str) -> Option<Self> {
        match type_name {
            "PullRequest" => Some(ItemKind::PullRequest),
            "Issue" => Some(ItemKind::Issue),
            _ => None,
        }
    }
}

/// A locally known pull request or issue, addressed by its global node id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackedItem {
    pub node_id: String,
    /// Label of the server the item lives on
    pub server_label: String,
}

impl TrackedItem {
    pub fn new(node_id: impl Into<String>, server_label: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            server_label: server_label.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_item_kind_names() {
        assert_eq!(ItemKind::PullRequest.to_string(), "PullRequest");
        assert_eq!(ItemKind::from_str("pull-request").unwrap(), ItemKind::PullRequest);
        assert_eq!(ItemKind::from_str("issue").unwrap(), ItemKind::Issue);
        assert_eq!(ItemKind::from_type_name("Issue"), Some(ItemKind::Issue));
        assert_eq!(ItemKind::from_type_name("User"), None);
        assert_eq!(ItemKind::Issue.connection_name(), "issues");
    }
}
