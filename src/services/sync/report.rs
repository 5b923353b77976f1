use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::query::UsageStats;

/// Outcome of one sync operation on one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSyncResult {
    pub label: String,
    pub succeeded: bool,
    /// Representative (first) error of the server's pass
    pub error: Option<String>,
    pub usage: UsageStats,
    pub nodes_ingested: usize,
}

/// Outcome of one sync operation across all servers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub pass_id: Uuid,
    pub operation: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub servers: Vec<ServerSyncResult>,
}

impl SyncReport {
    pub fn new(operation: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            pass_id: Uuid::new_v4(),
            operation: operation.into(),
            started_at: now,
            finished_at: now,
            servers: Vec::new(),
        }
    }

    pub fn finish(mut self, servers: Vec<ServerSyncResult>) -> Self {
        self.servers = servers;
        self.finished_at = Utc::now();
        self
    }

    pub fn succeeded(&self) -> bool {
        self.servers.iter().all(|s| s.succeeded)
    }

    pub fn nodes_ingested(&self) -> usize {
        self.servers.iter().map(|s| s.nodes_ingested).sum()
    }

    pub fn first_error(&self) -> Option<&str> {
        self.servers.iter().find_map(|s| s.error.as_deref())
    }

    pub fn server(&self, label: &str) -> Option<&ServerSyncResult> {
        self.servers.iter().find(|s| s.label == label)
    }

    /// Usage of all servers merged
    pub fn usage(&self) -> UsageStats {
        let mut total = UsageStats::default();
        for server in &self.servers {
            total.merge(&server.usage);
        }
        total
    }
}
