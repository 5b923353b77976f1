//! Repository subscription types

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ItemKind;

/// Which items of a repository are kept in sync
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DisplayPolicy {
    Hide,
    /// Only items the user authored, fetched through the viewer query
    AuthoredOnly,
    #[default]
    All,
}

impl DisplayPolicy {
    /// Whether the repository's items are fetched through the repository itself
    pub fn syncs_repository(&self) -> bool {
        matches!(self, DisplayPolicy::All)
    }
}

/// A repository the user subscribed to on one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedRepository {
    pub node_id: String,
    /// Label of the server the repository lives on
    pub server: String,
    #[serde(default)]
    pub pr_policy: DisplayPolicy,
    #[serde(default)]
    pub issue_policy: DisplayPolicy,
}

impl TrackedRepository {
    pub fn new(node_id: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            server: server.into(),
            pr_policy: DisplayPolicy::default(),
            issue_policy: DisplayPolicy::default(),
        }
    }

    pub fn with_policies(mut self, pr_policy: DisplayPolicy, issue_policy: DisplayPolicy) -> Self {
        self.pr_policy = pr_policy;
        self.issue_policy = issue_policy;
        self
    }

    pub fn policy(&self, kind: ItemKind) -> DisplayPolicy {
        match kind {
            ItemKind::PullRequest => self.pr_policy,
            ItemKind::Issue => self.issue_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_deserialization() {
        let repo: TrackedRepository = serde_json::from_str(
            r#"{"node_id":"R_1","server":"GitHub","pr_policy":"authored_only"}"#,
        )
        .unwrap();
        assert_eq!(repo.policy(ItemKind::PullRequest), DisplayPolicy::AuthoredOnly);
        assert_eq!(repo.policy(ItemKind::Issue), DisplayPolicy::All);
        assert!(!DisplayPolicy::Hide.syncs_repository());
    }
}
