use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;
use uuid::Uuid;

use super::user::UserProfile;

/// Append-only audit row. Written by the backend, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct CardHistory {
    pub id: Uuid,
    pub card_id: Uuid,
    pub user_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    /// `{"action": "...", "changes": {...}}`
    pub change: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CardHistoryWithUser {
    #[serde(flatten)]
    #[ts(flatten)]
    pub entry: CardHistory,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

impl std::ops::Deref for CardHistoryWithUser {
    type Target = CardHistory;
    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}

impl CardHistory {
    pub fn action(&self) -> Option<&str> {
        self.change.get("action").and_then(Value::as_str)
    }
}
