use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Selection appended to every query document to report API budget usage
pub const RATE_LIMIT_SELECTION: &str = "rateLimit { limit cost remaining resetAt nodeCount }";

/// API budget usage reported by the server, accumulated across requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    /// Number of requests that returned data
    pub requests: u32,
    /// Summed query cost
    pub cost: u64,
    /// Summed node count
    pub node_count: u64,
    /// Budget limit of the most constrained response seen
    pub limit: Option<u64>,
    /// Lowest remaining budget seen
    pub remaining: Option<u64>,
    /// Reset time reported with the lowest remaining budget
    pub reset_at: Option<DateTime<Utc>>,
}

impl UsageStats {
    /// Parse the `rateLimit` object of a response's `data`.
    /// A missing or `null` rate limit still counts as one request.
    pub fn from_response_data(data: &Value) -> Self {
        let mut stats = Self {
            requests: 1,
            ..Self::default()
        };
        let Some(rate_limit) = data.get("rateLimit").filter(|v| v.is_object()) else {
            return stats;
        };
        stats.cost = rate_limit.get("cost").and_then(Value::as_u64).unwrap_or(0);
        stats.node_count = rate_limit
            .get("nodeCount")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        stats.limit = rate_limit.get("limit").and_then(Value::as_u64);
        stats.remaining = rate_limit.get("remaining").and_then(Value::as_u64);
        stats.reset_at = rate_limit
            .get("resetAt")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc));
        stats
    }

    pub fn merge(&mut self, other: &UsageStats) {
        self.requests += other.requests;
        self.cost += other.cost;
        self.node_count += other.node_count;

        let other_is_lower = match (self.remaining, other.remaining) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(mine), Some(theirs)) => theirs < mine,
        };
        if other_is_lower {
            self.remaining = other.remaining;
            self.limit = other.limit;
            self.reset_at = other.reset_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rate_limit() {
        let data = json!({
            "rateLimit": {
                "limit": 5000,
                "cost": 2,
                "remaining": 4990,
                "resetAt": "2024-05-01T10:00:00Z",
                "nodeCount": 120
            }
        });
        let stats = UsageStats::from_response_data(&data);
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.cost, 2);
        assert_eq!(stats.node_count, 120);
        assert_eq!(stats.limit, Some(5000));
        assert_eq!(stats.remaining, Some(4990));
        assert!(stats.reset_at.is_some());
    }

    #[test]
    fn test_null_rate_limit() {
        let stats = UsageStats::from_response_data(&json!({"rateLimit": null}));
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.remaining, None);
    }

    #[test]
    fn test_merge_keeps_lowest_remaining() {
        let mut total = UsageStats::from_response_data(
            &json!({"rateLimit": {"limit": 5000, "cost": 1, "remaining": 4000, "nodeCount": 1}}),
        );
        let later = UsageStats::from_response_data(
            &json!({"rateLimit": {"limit": 5000, "cost": 3, "remaining": 3990, "nodeCount": 4}}),
        );
        let stale = UsageStats::from_response_data(
            &json!({"rateLimit": {"limit": 5000, "cost": 1, "remaining": 4500, "nodeCount": 1}}),
        );
        total.merge(&later);
        total.merge(&stale);

        assert_eq!(total.requests, 3);
        assert_eq!(total.cost, 5);
        assert_eq!(total.node_count, 6);
        assert_eq!(total.remaining, Some(3990));
    }
}
