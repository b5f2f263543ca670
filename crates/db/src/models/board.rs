use std::ops::Deref;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    board_member::BoardMemberWithUser, swim_lane::SwimLaneWithCards, user::UserProfile,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Board {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create a board. The owner is always the signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateBoard {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateBoard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Board as listed on the dashboard, with owner and members embedded.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct BoardSummary {
    #[serde(flatten)]
    #[ts(flatten)]
    pub board: Board,
    pub owner: Option<UserProfile>,
    #[serde(default)]
    pub members: Vec<BoardMemberWithUser>,
}

impl Deref for BoardSummary {
    type Target = Board;
    fn deref(&self) -> &Self::Target {
        &self.board
    }
}

/// Board with everything the detail view needs: lanes ordered by position,
/// each lane's cards ordered by position.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct BoardDetail {
    #[serde(flatten)]
    #[ts(flatten)]
    pub board: Board,
    pub owner: Option<UserProfile>,
    #[serde(default)]
    pub members: Vec<BoardMemberWithUser>,
    #[serde(default)]
    pub swim_lanes: Vec<SwimLaneWithCards>,
}

impl Deref for BoardDetail {
    type Target = Board;
    fn deref(&self) -> &Self::Target {
        &self.board
    }
}

impl BoardDetail {
    pub fn card_count(&self) -> usize {
        self.swim_lanes.iter().map(|lane| lane.cards.len()).sum()
    }
}
