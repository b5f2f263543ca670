use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::user::UserProfile;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MemberRole {
    #[default]
    Member,
    Admin,
    /// Implicit for the board's creator; never stored for anyone else.
    Owner,
}

impl MemberRole {
    /// Admins and the owner may manage membership and delete the board.
    pub fn can_manage(self) -> bool {
        matches!(self, MemberRole::Admin | MemberRole::Owner)
    }
}

/// Row of `board_members`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct BoardMember {
    pub board_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
}

/// Membership as embedded in board queries: `members:board_members(role, user:user_id(...))`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct BoardMemberWithUser {
    pub role: MemberRole,
    pub user: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AddBoardMember {
    pub user_id: Uuid,
    #[serde(default)]
    pub role: MemberRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateMemberRole {
    pub role: MemberRole,
}
