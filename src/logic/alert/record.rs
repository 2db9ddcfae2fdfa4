use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted alert. Append-only: never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Store-assigned row id, `None` until inserted
    pub id: Option<i64>,
    /// Evaluation time (not packet time)
    pub ts: DateTime<Utc>,
    pub src: String,
    pub dst: String,
    pub proto: String,
    pub score: f64,
    /// Flow and feature attributes plus the score
    pub metadata: serde_json::Value,
}

impl AlertRecord {
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}
