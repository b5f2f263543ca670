//! [`Backend`](crate::Backend) over a hosted Supabase project.

use std::sync::Arc;

use async_trait::async_trait;
use db::{
    models::{
        board::{Board, BoardDetail, BoardSummary, CreateBoard, UpdateBoard},
        board_member::{BoardMember, MemberRole},
        card::{CardWithAssignee, CreateCard, UpdateCard},
        card_history::CardHistoryWithUser,
        position::{PositionAck, PositionTable, PositionUpdate},
        swim_lane::{CreateSwimLane, SwimLane, UpdateSwimLane},
        user::{UpdateUserProfile, UserProfile},
    },
    validation::{validate_position, validate_title},
};
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    api::KanbanApi,
    auth::{
        AuthProvider, AuthSubscription, AuthUser, Credentials, GoTrueClient, Session,
        SignUpCredentials, SignUpOutcome,
    },
    config::{ConfigError, RemoteConfig},
    error::{AuthError, DataError},
    rest::{Query, RestClient},
};

const USER_COLUMNS: &str = "id, name, email, avatar";
const BOARD_SUMMARY_SELECT: &str = "*, owner:owner_id(id, name, email, avatar), \
     members:board_members(role, user:user_id(id, name, email, avatar))";
const BOARD_DETAIL_SELECT: &str = "*, owner:owner_id(id, name, email, avatar), \
     members:board_members(role, user:user_id(id, name, email, avatar)), \
     swim_lanes(*, cards(*, assigned_user:assigned_user_id(id, name, email, avatar)))";
const CARD_SELECT: &str = "*, assigned_user:assigned_user_id(id, name, email, avatar)";
const HISTORY_SELECT: &str = "*, user:user_id(id, name, email, avatar)";

#[derive(Debug, Clone)]
pub struct SupabaseClient {
    auth: GoTrueClient,
    rest: RestClient,
}

impl SupabaseClient {
    pub fn new(config: RemoteConfig) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("stroflo/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let config = Arc::new(config);
        let auth = GoTrueClient::new(config.clone(), http.clone());
        let rest = RestClient::new(config, http, auth.clone());
        Ok(Self { auth, rest })
    }

    pub fn auth(&self) -> &GoTrueClient {
        &self.auth
    }

    async fn require_user(&self) -> Result<Uuid, DataError> {
        self.auth
            .get_session()
            .await?
            .map(|s| s.user_id())
            .ok_or(DataError::NotAuthenticated)
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, DataError> {
    serde_json::to_value(value).map_err(|e| DataError::Parse(e.to_string()))
}

fn check_title(title: &str) -> Result<(), DataError> {
    validate_title(title).map_err(|e| DataError::Validation(e.to_string()))
}

fn check_position(id: Uuid, position: f64) -> Result<(), DataError> {
    validate_position(id, position).map_err(|e| DataError::Validation(e.to_string()))
}

#[async_trait]
impl AuthProvider for SupabaseClient {
    async fn sign_up(&self, credentials: &SignUpCredentials) -> Result<SignUpOutcome, AuthError> {
        self.auth.sign_up(credentials).await
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        self.auth.sign_in(credentials).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.auth.sign_out().await
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        self.auth.get_session().await
    }

    async fn get_user(&self) -> Result<Option<AuthUser>, AuthError> {
        self.auth.get_user().await
    }

    async fn refresh_session(&self) -> Result<Session, AuthError> {
        self.auth.refresh_session().await
    }

    fn subscribe(&self) -> AuthSubscription {
        self.auth.subscribe()
    }
}

#[async_trait]
impl KanbanApi for SupabaseClient {
    async fn get_user_profile(&self, user_id: Uuid) -> Result<UserProfile, DataError> {
        let query = Query::from("users")
            .select(USER_COLUMNS)
            .eq("id", user_id)
            .single();
        self.rest.fetch(&query).await
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        updates: &UpdateUserProfile,
    ) -> Result<UserProfile, DataError> {
        if updates.is_empty() {
            return self.get_user_profile(user_id).await;
        }
        let query = Query::from("users")
            .update(to_json(updates)?)
            .eq("id", user_id)
            .select(USER_COLUMNS)
            .single();
        self.rest.fetch(&query).await
    }

    async fn get_boards(&self) -> Result<Vec<BoardSummary>, DataError> {
        let query = Query::from("boards")
            .select(BOARD_SUMMARY_SELECT)
            .order("created_at", true);
        self.rest.fetch(&query).await
    }

    async fn get_board_by_id(&self, board_id: Uuid) -> Result<BoardDetail, DataError> {
        let query = Query::from("boards")
            .select(BOARD_DETAIL_SELECT)
            .eq("id", board_id)
            .order_foreign("swim_lanes", "position", true)
            .order_foreign("swim_lanes.cards", "position", true)
            .single();
        self.rest.fetch(&query).await
    }

    async fn create_board(&self, data: &CreateBoard) -> Result<Board, DataError> {
        check_title(&data.title)?;
        let owner_id = self.require_user().await?;
        let row = json!({
            "title": data.title,
            "description": data.description,
            "owner_id": owner_id,
        });
        let query = Query::from("boards").insert(row).select("*").single();
        self.rest.fetch(&query).await
    }

    async fn update_board(&self, board_id: Uuid, updates: &UpdateBoard) -> Result<Board, DataError> {
        if let Some(title) = &updates.title {
            check_title(title)?;
        }
        let query = Query::from("boards")
            .update(to_json(updates)?)
            .eq("id", board_id)
            .select("*")
            .single();
        self.rest.fetch(&query).await
    }

    async fn delete_board(&self, board_id: Uuid) -> Result<(), DataError> {
        let query = Query::from("boards").eq("id", board_id).select("id").delete();
        self.rest.delete(&query).await
    }

    async fn get_swim_lane_by_id(&self, lane_id: Uuid) -> Result<SwimLane, DataError> {
        let query = Query::from("swim_lanes")
            .select("*")
            .eq("id", lane_id)
            .single();
        self.rest.fetch(&query).await
    }

    async fn get_swim_lanes_for_board(&self, board_id: Uuid) -> Result<Vec<SwimLane>, DataError> {
        let query = Query::from("swim_lanes")
            .select("*")
            .eq("board_id", board_id)
            .order("position", true);
        self.rest.fetch(&query).await
    }

    async fn create_swim_lane(&self, data: &CreateSwimLane) -> Result<SwimLane, DataError> {
        check_title(&data.title)?;
        check_position(data.board_id, data.position)?;
        let query = Query::from("swim_lanes")
            .insert(to_json(data)?)
            .select("*")
            .single();
        self.rest.fetch(&query).await
    }

    async fn update_swim_lane(
        &self,
        lane_id: Uuid,
        updates: &UpdateSwimLane,
    ) -> Result<SwimLane, DataError> {
        if let Some(title) = &updates.title {
            check_title(title)?;
        }
        if let Some(position) = updates.position {
            check_position(lane_id, position)?;
        }
        let query = Query::from("swim_lanes")
            .update(to_json(updates)?)
            .eq("id", lane_id)
            .select("*")
            .single();
        self.rest.fetch(&query).await
    }

    async fn delete_swim_lane(&self, lane_id: Uuid) -> Result<(), DataError> {
        let query = Query::from("swim_lanes")
            .eq("id", lane_id)
            .select("id")
            .delete();
        self.rest.delete(&query).await
    }

    async fn get_cards_for_swim_lane(
        &self,
        lane_id: Uuid,
    ) -> Result<Vec<CardWithAssignee>, DataError> {
        let query = Query::from("cards")
            .select(CARD_SELECT)
            .eq("swim_lane_id", lane_id)
            .order("position", true);
        self.rest.fetch(&query).await
    }

    async fn get_card_by_id(&self, card_id: Uuid) -> Result<CardWithAssignee, DataError> {
        let query = Query::from("cards")
            .select(CARD_SELECT)
            .eq("id", card_id)
            .single();
        self.rest.fetch(&query).await
    }

    async fn create_card(&self, data: &CreateCard) -> Result<CardWithAssignee, DataError> {
        check_title(&data.title)?;
        check_position(data.swim_lane_id, data.position)?;
        let query = Query::from("cards")
            .insert(to_json(data)?)
            .select(CARD_SELECT)
            .single();
        self.rest.fetch(&query).await
    }

    async fn update_card(
        &self,
        card_id: Uuid,
        updates: &UpdateCard,
    ) -> Result<CardWithAssignee, DataError> {
        if let Some(title) = &updates.title {
            check_title(title)?;
        }
        if let Some(position) = updates.position {
            check_position(card_id, position)?;
        }
        let query = Query::from("cards")
            .update(to_json(updates)?)
            .eq("id", card_id)
            .select(CARD_SELECT)
            .single();
        self.rest.fetch(&query).await
    }

    async fn delete_card(&self, card_id: Uuid) -> Result<(), DataError> {
        let query = Query::from("cards").eq("id", card_id).select("id").delete();
        self.rest.delete(&query).await
    }

    async fn add_board_member(
        &self,
        board_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<BoardMember, DataError> {
        let row = json!({ "board_id": board_id, "user_id": user_id, "role": role });
        let query = Query::from("board_members")
            .insert(row)
            .select("*")
            .single();
        self.rest.fetch(&query).await
    }

    async fn remove_board_member(&self, board_id: Uuid, user_id: Uuid) -> Result<(), DataError> {
        let query = Query::from("board_members")
            .eq("board_id", board_id)
            .eq("user_id", user_id)
            .select("user_id")
            .delete();
        self.rest.delete(&query).await
    }

    async fn update_board_member_role(
        &self,
        board_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<BoardMember, DataError> {
        let query = Query::from("board_members")
            .update(json!({ "role": role }))
            .eq("board_id", board_id)
            .eq("user_id", user_id)
            .select("*")
            .single();
        self.rest.fetch(&query).await
    }

    async fn get_card_history(&self, card_id: Uuid) -> Result<Vec<CardHistoryWithUser>, DataError> {
        let query = Query::from("card_history")
            .select(HISTORY_SELECT)
            .eq("card_id", card_id)
            .order("timestamp", false);
        self.rest.fetch(&query).await
    }

    async fn apply_positions(
        &self,
        table: PositionTable,
        items: &[PositionUpdate],
    ) -> Result<Vec<PositionAck>, DataError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let args = json!({ "p_table": table, "p_items": items });
        let mut acks: Vec<PositionAck> = self.rest.rpc("apply_positions", &args).await?;

        // Report in request order
        acks.sort_by_key(|ack| {
            items
                .iter()
                .position(|item| item.id == ack.id)
                .unwrap_or(usize::MAX)
        });
        tracing::debug!(table = %table, rows = acks.len(), "Applied position batch");
        Ok(acks)
    }
}
