use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Optional augmentation of an item update
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SyncStep {
    ReviewRequests,
    Reviews,
    /// Comments of each review; implies fetching the reviews themselves
    ReviewComments,
    Statuses,
    Reactions,
    Comments,
}

impl SyncStep {
    /// Whether the step only applies to pull requests
    pub fn pull_request_only(&self) -> bool {
        !matches!(self, SyncStep::Reactions | SyncStep::Comments)
    }

    /// Element types whose nodes this step delivers
    pub fn element_types(&self) -> &'static [&'static str] {
        match self {
            SyncStep::ReviewRequests => &["ReviewRequest"],
            SyncStep::Reviews => &["PullRequestReview"],
            SyncStep::ReviewComments => &["PullRequestReview", "PullRequestReviewComment"],
            SyncStep::Statuses => &["StatusContext"],
            SyncStep::Reactions => &["Reaction"],
            SyncStep::Comments => &["IssueComment"],
        }
    }
}

/// Set of independent, combinable sync steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSteps(BTreeSet<SyncStep>);

impl SyncSteps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, step: SyncStep) -> Self {
        self.0.insert(step);
        self
    }

    pub fn insert(&mut self, step: SyncStep) {
        self.0.insert(step);
    }

    pub fn contains(&self, step: SyncStep) -> bool {
        self.0.contains(&step)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = SyncStep> + '_ {
        self.0.iter().copied()
    }

    /// Human readable name, used as the query name of an update
    pub fn label(&self) -> String {
        if self.0.is_empty() {
            return "Items".to_string();
        }
        self.0
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromIterator<SyncStep> for SyncSteps {
    fn from_iter<I: IntoIterator<Item = SyncStep>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_steps_are_ordered_and_combinable() {
        let steps: SyncSteps = [SyncStep::Comments, SyncStep::Reviews, SyncStep::Comments]
            .into_iter()
            .collect();
        assert_eq!(steps.label(), "reviews, comments");
        assert!(steps.contains(SyncStep::Reviews));
        assert!(!steps.contains(SyncStep::Statuses));
        assert_eq!(SyncSteps::new().label(), "Items");
    }

    #[test]
    fn test_step_names() {
        for step in SyncStep::iter() {
            assert_eq!(SyncStep::from_str(&step.to_string()).unwrap(), step);
        }
        assert_eq!(SyncStep::ReviewComments.to_string(), "review-comments");
        assert!(SyncStep::Statuses.pull_request_only());
        assert!(!SyncStep::Reactions.pull_request_only());
    }
}
