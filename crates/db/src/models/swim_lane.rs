use std::ops::Deref;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use super::card::CardWithAssignee;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct SwimLane {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Ordering key, unique within the board.
    pub position: f64,
    pub board_id: Uuid,
    /// Optimistic locking version, bumped on every write.
    #[ts(type = "number")]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateSwimLane {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub position: f64,
    pub board_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateSwimLane {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
}

/// Lane embedded in a board detail query, cards ordered by position.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SwimLaneWithCards {
    #[serde(flatten)]
    #[ts(flatten)]
    pub lane: SwimLane,
    #[serde(default)]
    pub cards: Vec<CardWithAssignee>,
}

impl Deref for SwimLaneWithCards {
    type Target = SwimLane;
    fn deref(&self) -> &Self::Target {
        &self.lane
    }
}
