use async_trait::async_trait;
use db::models::{
    board::{Board, BoardDetail, BoardSummary, CreateBoard, UpdateBoard},
    board_member::{BoardMember, MemberRole},
    card::{CardWithAssignee, CreateCard, UpdateCard},
    card_history::CardHistoryWithUser,
    position::{PositionAck, PositionTable, PositionUpdate},
    swim_lane::{CreateSwimLane, SwimLane, UpdateSwimLane},
    user::{UpdateUserProfile, UserProfile},
};
use uuid::Uuid;

use crate::{auth::AuthProvider, error::DataError};

/// Typed data access, one method per backend call. Visibility and
/// permissions are decided by the backend's row-level security.
#[async_trait]
pub trait KanbanApi: Send + Sync {
    async fn get_user_profile(&self, user_id: Uuid) -> Result<UserProfile, DataError>;

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        updates: &UpdateUserProfile,
    ) -> Result<UserProfile, DataError>;

    /// Boards visible to the caller, with owner and members embedded.
    async fn get_boards(&self) -> Result<Vec<BoardSummary>, DataError>;

    /// Board with lanes ordered by position and each lane's cards ordered
    /// by position.
    async fn get_board_by_id(&self, board_id: Uuid) -> Result<BoardDetail, DataError>;

    /// The owner is the signed-in user.
    async fn create_board(&self, data: &CreateBoard) -> Result<Board, DataError>;

    async fn update_board(&self, board_id: Uuid, updates: &UpdateBoard) -> Result<Board, DataError>;

    /// Removes the board together with its lanes, cards, memberships and
    /// card history.
    async fn delete_board(&self, board_id: Uuid) -> Result<(), DataError>;

    async fn get_swim_lane_by_id(&self, lane_id: Uuid) -> Result<SwimLane, DataError>;

    async fn get_swim_lanes_for_board(&self, board_id: Uuid) -> Result<Vec<SwimLane>, DataError>;

    async fn create_swim_lane(&self, data: &CreateSwimLane) -> Result<SwimLane, DataError>;

    async fn update_swim_lane(
        &self,
        lane_id: Uuid,
        updates: &UpdateSwimLane,
    ) -> Result<SwimLane, DataError>;

    async fn delete_swim_lane(&self, lane_id: Uuid) -> Result<(), DataError>;

    async fn get_cards_for_swim_lane(&self, lane_id: Uuid)
    -> Result<Vec<CardWithAssignee>, DataError>;

    async fn get_card_by_id(&self, card_id: Uuid) -> Result<CardWithAssignee, DataError>;

    async fn create_card(&self, data: &CreateCard) -> Result<CardWithAssignee, DataError>;

    async fn update_card(
        &self,
        card_id: Uuid,
        updates: &UpdateCard,
    ) -> Result<CardWithAssignee, DataError>;

    async fn delete_card(&self, card_id: Uuid) -> Result<(), DataError>;

    async fn add_board_member(
        &self,
        board_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<BoardMember, DataError>;

    async fn remove_board_member(&self, board_id: Uuid, user_id: Uuid) -> Result<(), DataError>;

    async fn update_board_member_role(
        &self,
        board_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<BoardMember, DataError>;

    /// Newest first, acting user embedded.
    async fn get_card_history(&self, card_id: Uuid) -> Result<Vec<CardHistoryWithUser>, DataError>;

    /// Applies every position in one transaction. Any per-item failure
    /// rejects the whole batch with [`DataError::BatchRejected`].
    async fn apply_positions(
        &self,
        table: PositionTable,
        items: &[PositionUpdate],
    ) -> Result<Vec<PositionAck>, DataError>;
}

/// Everything the services and the view layer need from the hosted backend.
pub trait Backend: AuthProvider + KanbanApi {}

impl<T: AuthProvider + KanbanApi + ?Sized> Backend for T {}
