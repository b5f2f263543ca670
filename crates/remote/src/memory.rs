//! In-process [`Backend`](crate::Backend) for tests.
//!
//! Mirrors what the hosted schema enforces: a board is visible to its owner
//! and members, lanes/cards/history inherit that visibility, deletes
//! cascade, sibling positions are unique, card writes append history and
//! `apply_positions` is all-or-nothing.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::Utc;
use db::{
    models::{
        board::{Board, BoardDetail, BoardSummary, CreateBoard, UpdateBoard},
        board_member::{BoardMember, BoardMemberWithUser, MemberRole},
        card::{Card, CardWithAssignee, CreateCard, UpdateCard},
        card_history::{CardHistory, CardHistoryWithUser},
        position::{FailureReason, PositionAck, PositionFailure, PositionTable, PositionUpdate},
        swim_lane::{CreateSwimLane, SwimLane, SwimLaneWithCards, UpdateSwimLane},
        user::{UpdateUserProfile, UserProfile},
    },
    validation::{validate_position, validate_title},
};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::{
    api::KanbanApi,
    auth::{
        AuthEventKind, AuthEvents, AuthProvider, AuthSubscription, AuthUser, Credentials,
        Session, SignUpCredentials, SignUpOutcome,
    },
    error::{AuthError, DataError},
};

const MIN_PASSWORD_LEN: usize = 6;
const HISTORY_IGNORED_FIELDS: &[&str] = &["id", "version", "created_at", "updated_at"];

struct Account {
    user: AuthUser,
    password: String,
    confirmed: bool,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    profiles: HashMap<Uuid, UserProfile>,
    boards: HashMap<Uuid, Board>,
    members: Vec<BoardMember>,
    lanes: HashMap<Uuid, SwimLane>,
    cards: HashMap<Uuid, Card>,
    history: Vec<CardHistory>,
    rejected_ids: HashSet<Uuid>,
    pending_bumps: VecDeque<(PositionTable, Uuid)>,
    require_confirmation: bool,
    position_batches: usize,
    token_counter: u64,
}

#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<State>>,
    events: AuthEvents,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Registers a confirmed account with a profile row, without signing in.
    pub fn register_user(&self, email: &str, password: &str, name: Option<&str>) -> Uuid {
        let mut state = self.lock();
        state
            .create_account(email, password, name.map(str::to_string), true)
            .id
    }

    /// When on, sign-ups return no session until [`Self::confirm_email`].
    pub fn require_email_confirmation(&self, required: bool) {
        self.lock().require_confirmation = required;
    }

    pub fn confirm_email(&self, email: &str) {
        if let Some(account) = self.lock().accounts.get_mut(&email.to_lowercase()) {
            account.confirmed = true;
        }
    }

    /// Makes `apply_positions` report `Forbidden` for this row.
    pub fn reject_positions_for(&self, id: Uuid) {
        self.lock().rejected_ids.insert(id);
    }

    /// Simulates a concurrent edit by another client.
    pub fn bump_version(&self, table: PositionTable, id: Uuid) -> Option<i64> {
        self.lock().bump(table, id)
    }

    /// Queues a concurrent edit that lands just before the next position
    /// batch is checked. One queued edit is consumed per batch.
    pub fn bump_before_next_batch(&self, table: PositionTable, id: Uuid) {
        self.lock().pending_bumps.push_back((table, id));
    }

    /// Number of `apply_positions` calls that reached the backend.
    pub fn position_batches(&self) -> usize {
        self.lock().position_batches
    }

    pub fn auth_subscriber_count(&self) -> usize {
        self.events.subscriber_count()
    }

    pub fn card_count(&self) -> usize {
        self.lock().cards.len()
    }

    pub fn history_count(&self) -> usize {
        self.lock().history.len()
    }

    pub fn member_count(&self) -> usize {
        self.lock().members.len()
    }

    pub fn lane_count(&self) -> usize {
        self.lock().lanes.len()
    }
}

impl State {
    fn bump(&mut self, table: PositionTable, id: Uuid) -> Option<i64> {
        match table {
            PositionTable::Cards => self.cards.get_mut(&id).map(|c| {
                c.version += 1;
                c.version
            }),
            PositionTable::SwimLanes => self.lanes.get_mut(&id).map(|l| {
                l.version += 1;
                l.version
            }),
        }
    }

    fn create_account(
        &mut self,
        email: &str,
        password: &str,
        name: Option<String>,
        confirmed: bool,
    ) -> AuthUser {
        let id = Uuid::new_v4();
        let user = AuthUser {
            id,
            email: Some(email.to_string()),
            user_metadata: json!({ "name": name }),
        };
        self.accounts.insert(
            email.to_lowercase(),
            Account {
                user: user.clone(),
                password: password.to_string(),
                confirmed,
            },
        );
        self.profiles.insert(
            id,
            UserProfile {
                id,
                email: Some(email.to_string()),
                name,
                avatar: None,
            },
        );
        user
    }

    fn new_session(&mut self, user: AuthUser) -> Session {
        self.token_counter += 1;
        let session = Session {
            access_token: format!("access-{}", self.token_counter),
            refresh_token: format!("refresh-{}", self.token_counter),
            expires_at: Utc::now() + chrono::Duration::hours(1),
            user,
        };
        self.session = Some(session.clone());
        session
    }

    fn uid(&self) -> Result<Uuid, DataError> {
        self.session
            .as_ref()
            .map(|s| s.user_id())
            .ok_or(DataError::NotAuthenticated)
    }

    fn role_on(&self, board_id: Uuid, user_id: Uuid) -> Option<MemberRole> {
        let board = self.boards.get(&board_id)?;
        if board.owner_id == user_id {
            return Some(MemberRole::Owner);
        }
        self.members
            .iter()
            .find(|m| m.board_id == board_id && m.user_id == user_id)
            .map(|m| m.role)
    }

    fn can_view(&self, board_id: Uuid, user_id: Uuid) -> bool {
        self.role_on(board_id, user_id).is_some()
    }

    fn can_manage(&self, board_id: Uuid, user_id: Uuid) -> bool {
        self.role_on(board_id, user_id)
            .is_some_and(MemberRole::can_manage)
    }

    fn visible_board(&self, board_id: Uuid, user_id: Uuid) -> Result<&Board, DataError> {
        self.boards
            .get(&board_id)
            .filter(|b| self.can_view(b.id, user_id))
            .ok_or(DataError::NotFound)
    }

    fn visible_lane(&self, lane_id: Uuid, user_id: Uuid) -> Result<&SwimLane, DataError> {
        self.lanes
            .get(&lane_id)
            .filter(|l| self.can_view(l.board_id, user_id))
            .ok_or(DataError::NotFound)
    }

    fn visible_card(&self, card_id: Uuid, user_id: Uuid) -> Result<&Card, DataError> {
        self.cards
            .get(&card_id)
            .filter(|c| {
                self.lanes
                    .get(&c.swim_lane_id)
                    .is_some_and(|l| self.can_view(l.board_id, user_id))
            })
            .ok_or(DataError::NotFound)
    }

    fn profile(&self, id: Option<Uuid>) -> Option<UserProfile> {
        id.and_then(|id| self.profiles.get(&id).cloned())
    }

    fn with_assignee(&self, card: &Card) -> CardWithAssignee {
        CardWithAssignee {
            card: card.clone(),
            assigned_user: self.profile(card.assigned_user_id),
        }
    }

    fn members_of(&self, board_id: Uuid) -> Vec<BoardMemberWithUser> {
        self.members
            .iter()
            .filter(|m| m.board_id == board_id)
            .map(|m| BoardMemberWithUser {
                role: m.role,
                user: self.profile(Some(m.user_id)),
            })
            .collect()
    }

    fn lanes_of(&self, board_id: Uuid) -> Vec<SwimLane> {
        let mut lanes: Vec<SwimLane> = self
            .lanes
            .values()
            .filter(|l| l.board_id == board_id)
            .cloned()
            .collect();
        lanes.sort_by(|a, b| a.position.total_cmp(&b.position));
        lanes
    }

    fn cards_of(&self, lane_id: Uuid) -> Vec<CardWithAssignee> {
        let mut cards: Vec<&Card> = self
            .cards
            .values()
            .filter(|c| c.swim_lane_id == lane_id)
            .collect();
        cards.sort_by(|a, b| a.position.total_cmp(&b.position));
        cards.into_iter().map(|c| self.with_assignee(c)).collect()
    }

    fn lane_position_taken(&self, board_id: Uuid, position: f64, except: Option<Uuid>) -> bool {
        self.lanes
            .values()
            .any(|l| l.board_id == board_id && l.position == position && Some(l.id) != except)
    }

    fn card_position_taken(&self, lane_id: Uuid, position: f64, except: Option<Uuid>) -> bool {
        self.cards
            .values()
            .any(|c| c.swim_lane_id == lane_id && c.position == position && Some(c.id) != except)
    }

    fn record_history(&mut self, card_id: Uuid, user_id: Uuid, action: &str, changes: Value) {
        self.history.push(CardHistory {
            id: Uuid::new_v4(),
            card_id,
            user_id: Some(user_id),
            timestamp: Utc::now(),
            change: json!({ "action": action, "changes": changes }),
        });
    }

    fn remove_card(&mut self, card_id: Uuid) {
        self.cards.remove(&card_id);
        self.history.retain(|h| h.card_id != card_id);
    }

    fn remove_lane(&mut self, lane_id: Uuid) {
        self.lanes.remove(&lane_id);
        let card_ids: Vec<Uuid> = self
            .cards
            .values()
            .filter(|c| c.swim_lane_id == lane_id)
            .map(|c| c.id)
            .collect();
        for card_id in card_ids {
            self.remove_card(card_id);
        }
    }

    fn remove_board(&mut self, board_id: Uuid) {
        self.boards.remove(&board_id);
        self.members.retain(|m| m.board_id != board_id);
        let lane_ids: Vec<Uuid> = self
            .lanes
            .values()
            .filter(|l| l.board_id == board_id)
            .map(|l| l.id)
            .collect();
        for lane_id in lane_ids {
            self.remove_lane(lane_id);
        }
    }

    /// Rows of `table` under `parent` after staging `staged` (id -> (parent, position)).
    fn sibling_positions(
        &self,
        table: PositionTable,
        parent: Uuid,
        staged: &HashMap<Uuid, (Uuid, f64)>,
    ) -> Vec<(Uuid, f64)> {
        let current: Vec<(Uuid, Uuid, f64)> = match table {
            PositionTable::Cards => self
                .cards
                .values()
                .map(|c| (c.id, c.swim_lane_id, c.position))
                .collect(),
            PositionTable::SwimLanes => self
                .lanes
                .values()
                .map(|l| (l.id, l.board_id, l.position))
                .collect(),
        };
        current
            .into_iter()
            .map(|(id, p, pos)| match staged.get(&id) {
                Some(&(new_parent, new_pos)) => (id, new_parent, new_pos),
                None => (id, p, pos),
            })
            .filter(|(_, p, _)| *p == parent)
            .map(|(id, _, pos)| (id, pos))
            .collect()
    }
}

fn invalid(err: db::validation::ValidationError) -> DataError {
    DataError::Validation(err.to_string())
}

fn unique_violation(constraint: &str) -> DataError {
    DataError::Conflict(format!(
        "duplicate key value violates unique constraint \"{constraint}\""
    ))
}

fn row_violation(table: &str) -> DataError {
    DataError::Forbidden(format!(
        "new row violates row-level security policy for table \"{table}\""
    ))
}

fn card_snapshot(card: &Card) -> Map<String, Value> {
    match serde_json::to_value(card) {
        Ok(Value::Object(mut map)) => {
            for field in HISTORY_IGNORED_FIELDS {
                map.remove(*field);
            }
            map
        }
        _ => Map::new(),
    }
}

fn card_changes(old: &Card, new: &Card) -> Map<String, Value> {
    let before = card_snapshot(old);
    card_snapshot(new)
        .into_iter()
        .filter(|(key, value)| before.get(key) != Some(value))
        .collect()
}

#[async_trait]
impl AuthProvider for InMemoryBackend {
    async fn sign_up(&self, credentials: &SignUpCredentials) -> Result<SignUpOutcome, AuthError> {
        let outcome = {
            let mut state = self.lock();
            if !credentials.email.contains('@') {
                return Err(AuthError::Rejected {
                    status: 422,
                    message: "Unable to validate email address: invalid format".into(),
                });
            }
            if credentials.password.len() < MIN_PASSWORD_LEN {
                return Err(AuthError::Rejected {
                    status: 422,
                    message: "Password should be at least 6 characters".into(),
                });
            }
            if state
                .accounts
                .contains_key(&credentials.email.to_lowercase())
            {
                return Err(AuthError::Rejected {
                    status: 422,
                    message: "User already registered".into(),
                });
            }

            let confirmed = !state.require_confirmation;
            let name = credentials
                .name
                .clone()
                .filter(|n| !n.trim().is_empty());
            let user =
                state.create_account(&credentials.email, &credentials.password, name, confirmed);

            let session = confirmed.then(|| state.new_session(user.clone()));
            SignUpOutcome { user, session }
        };

        if let Some(session) = &outcome.session {
            self.events
                .emit(AuthEventKind::SignedIn, Some(session.clone()));
        }
        Ok(outcome)
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let session = {
            let mut state = self.lock();
            let user = match state.accounts.get(&credentials.email.to_lowercase()) {
                Some(account) if account.password == credentials.password && account.confirmed => {
                    account.user.clone()
                }
                _ => return Err(AuthError::InvalidCredentials),
            };
            state.new_session(user)
        };
        self.events
            .emit(AuthEventKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.lock().session = None;
        self.events.emit(AuthEventKind::SignedOut, None);
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.lock().session.clone())
    }

    async fn get_user(&self) -> Result<Option<AuthUser>, AuthError> {
        Ok(self.lock().session.as_ref().map(|s| s.user.clone()))
    }

    async fn refresh_session(&self) -> Result<Session, AuthError> {
        let session = {
            let mut state = self.lock();
            let user = state
                .session
                .as_ref()
                .map(|s| s.user.clone())
                .ok_or(AuthError::NotAuthenticated)?;
            state.new_session(user)
        };
        self.events
            .emit(AuthEventKind::TokenRefreshed, Some(session.clone()));
        Ok(session)
    }

    fn subscribe(&self) -> AuthSubscription {
        self.events.subscribe()
    }
}

#[async_trait]
impl KanbanApi for InMemoryBackend {
    async fn get_user_profile(&self, user_id: Uuid) -> Result<UserProfile, DataError> {
        let state = self.lock();
        state.uid()?;
        state.profile(Some(user_id)).ok_or(DataError::NotFound)
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        updates: &UpdateUserProfile,
    ) -> Result<UserProfile, DataError> {
        let mut state = self.lock();
        if state.uid()? != user_id {
            return Err(DataError::NotFound);
        }
        let profile = state.profiles.get_mut(&user_id).ok_or(DataError::NotFound)?;
        if let Some(name) = &updates.name {
            profile.name = Some(name.clone());
        }
        if let Some(email) = &updates.email {
            profile.email = Some(email.clone());
        }
        if let Some(avatar) = &updates.avatar {
            profile.avatar = Some(avatar.clone());
        }
        Ok(profile.clone())
    }

    async fn get_boards(&self) -> Result<Vec<BoardSummary>, DataError> {
        let state = self.lock();
        let uid = state.uid()?;
        let mut boards: Vec<BoardSummary> = state
            .boards
            .values()
            .filter(|b| state.can_view(b.id, uid))
            .map(|b| BoardSummary {
                board: b.clone(),
                owner: state.profile(Some(b.owner_id)),
                members: state.members_of(b.id),
            })
            .collect();
        boards.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(boards)
    }

    async fn get_board_by_id(&self, board_id: Uuid) -> Result<BoardDetail, DataError> {
        let state = self.lock();
        let uid = state.uid()?;
        let board = state.visible_board(board_id, uid)?;
        let swim_lanes = state
            .lanes_of(board_id)
            .into_iter()
            .map(|lane| SwimLaneWithCards {
                cards: state.cards_of(lane.id),
                lane,
            })
            .collect();
        Ok(BoardDetail {
            board: board.clone(),
            owner: state.profile(Some(board.owner_id)),
            members: state.members_of(board_id),
            swim_lanes,
        })
    }

    async fn create_board(&self, data: &CreateBoard) -> Result<Board, DataError> {
        validate_title(&data.title).map_err(invalid)?;
        let mut state = self.lock();
        let uid = state.uid()?;
        let now = Utc::now();
        let board = Board {
            id: Uuid::new_v4(),
            title: data.title.clone(),
            description: data.description.clone(),
            owner_id: uid,
            created_at: now,
            updated_at: now,
        };
        state.boards.insert(board.id, board.clone());
        Ok(board)
    }

    async fn update_board(&self, board_id: Uuid, updates: &UpdateBoard) -> Result<Board, DataError> {
        if let Some(title) = &updates.title {
            validate_title(title).map_err(invalid)?;
        }
        let mut state = self.lock();
        let uid = state.uid()?;
        state.visible_board(board_id, uid)?;
        if !state.can_manage(board_id, uid) {
            return Err(DataError::Forbidden("only board admins can edit the board".into()));
        }
        let board = state.boards.get_mut(&board_id).ok_or(DataError::NotFound)?;
        if let Some(title) = &updates.title {
            board.title = title.clone();
        }
        if let Some(description) = &updates.description {
            board.description = Some(description.clone());
        }
        board.updated_at = Utc::now();
        Ok(board.clone())
    }

    async fn delete_board(&self, board_id: Uuid) -> Result<(), DataError> {
        let mut state = self.lock();
        let uid = state.uid()?;
        state.visible_board(board_id, uid)?;
        if !state.can_manage(board_id, uid) {
            return Err(DataError::Forbidden("only board admins can delete the board".into()));
        }
        state.remove_board(board_id);
        Ok(())
    }

    async fn get_swim_lane_by_id(&self, lane_id: Uuid) -> Result<SwimLane, DataError> {
        let state = self.lock();
        let uid = state.uid()?;
        state.visible_lane(lane_id, uid).cloned()
    }

    async fn get_swim_lanes_for_board(&self, board_id: Uuid) -> Result<Vec<SwimLane>, DataError> {
        let state = self.lock();
        let uid = state.uid()?;
        if !state.can_view(board_id, uid) {
            return Ok(Vec::new());
        }
        Ok(state.lanes_of(board_id))
    }

    async fn create_swim_lane(&self, data: &CreateSwimLane) -> Result<SwimLane, DataError> {
        validate_title(&data.title).map_err(invalid)?;
        validate_position(data.board_id, data.position).map_err(invalid)?;
        let mut state = self.lock();
        let uid = state.uid()?;
        if !state.can_view(data.board_id, uid) {
            return Err(row_violation("swim_lanes"));
        }
        if state.lane_position_taken(data.board_id, data.position, None) {
            return Err(unique_violation("swim_lanes_board_position_key"));
        }
        let now = Utc::now();
        let lane = SwimLane {
            id: Uuid::new_v4(),
            title: data.title.clone(),
            description: data.description.clone(),
            position: data.position,
            board_id: data.board_id,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        state.lanes.insert(lane.id, lane.clone());
        Ok(lane)
    }

    async fn update_swim_lane(
        &self,
        lane_id: Uuid,
        updates: &UpdateSwimLane,
    ) -> Result<SwimLane, DataError> {
        if let Some(title) = &updates.title {
            validate_title(title).map_err(invalid)?;
        }
        if let Some(position) = updates.position {
            validate_position(lane_id, position).map_err(invalid)?;
        }
        let mut state = self.lock();
        let uid = state.uid()?;
        let board_id = state.visible_lane(lane_id, uid)?.board_id;
        if let Some(position) = updates.position
            && state.lane_position_taken(board_id, position, Some(lane_id))
        {
            return Err(unique_violation("swim_lanes_board_position_key"));
        }
        let lane = state.lanes.get_mut(&lane_id).ok_or(DataError::NotFound)?;
        if let Some(title) = &updates.title {
            lane.title = title.clone();
        }
        if let Some(description) = &updates.description {
            lane.description = Some(description.clone());
        }
        if let Some(position) = updates.position {
            lane.position = position;
        }
        lane.version += 1;
        lane.updated_at = Utc::now();
        Ok(lane.clone())
    }

    async fn delete_swim_lane(&self, lane_id: Uuid) -> Result<(), DataError> {
        let mut state = self.lock();
        let uid = state.uid()?;
        state.visible_lane(lane_id, uid)?;
        state.remove_lane(lane_id);
        Ok(())
    }

    async fn get_cards_for_swim_lane(
        &self,
        lane_id: Uuid,
    ) -> Result<Vec<CardWithAssignee>, DataError> {
        let state = self.lock();
        let uid = state.uid()?;
        if state.visible_lane(lane_id, uid).is_err() {
            return Ok(Vec::new());
        }
        Ok(state.cards_of(lane_id))
    }

    async fn get_card_by_id(&self, card_id: Uuid) -> Result<CardWithAssignee, DataError> {
        let state = self.lock();
        let uid = state.uid()?;
        let card = state.visible_card(card_id, uid)?;
        Ok(state.with_assignee(card))
    }

    async fn create_card(&self, data: &CreateCard) -> Result<CardWithAssignee, DataError> {
        validate_title(&data.title).map_err(invalid)?;
        validate_position(data.swim_lane_id, data.position).map_err(invalid)?;
        let mut state = self.lock();
        let uid = state.uid()?;
        if state.visible_lane(data.swim_lane_id, uid).is_err() {
            return Err(row_violation("cards"));
        }
        if let Some(assignee) = data.assigned_user_id
            && !state.profiles.contains_key(&assignee)
        {
            return Err(DataError::Validation(
                "insert or update on table \"cards\" violates foreign key constraint".into(),
            ));
        }
        if state.card_position_taken(data.swim_lane_id, data.position, None) {
            return Err(unique_violation("cards_lane_position_key"));
        }
        let now = Utc::now();
        let card = Card {
            id: Uuid::new_v4(),
            title: data.title.clone(),
            description: data.description.clone(),
            need_by_date: data.need_by_date,
            priority: data.priority,
            assigned_user_id: data.assigned_user_id,
            swim_lane_id: data.swim_lane_id,
            position: data.position,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        state.cards.insert(card.id, card.clone());
        state.record_history(card.id, uid, "created", Value::Object(card_snapshot(&card)));
        Ok(state.with_assignee(&card))
    }

    async fn update_card(
        &self,
        card_id: Uuid,
        updates: &UpdateCard,
    ) -> Result<CardWithAssignee, DataError> {
        if let Some(title) = &updates.title {
            validate_title(title).map_err(invalid)?;
        }
        if let Some(position) = updates.position {
            validate_position(card_id, position).map_err(invalid)?;
        }
        let mut state = self.lock();
        let uid = state.uid()?;
        let before = state.visible_card(card_id, uid)?.clone();

        let mut after = before.clone();
        if let Some(title) = &updates.title {
            after.title = title.clone();
        }
        if let Some(description) = &updates.description {
            after.description = Some(description.clone());
        }
        if let Some(need_by_date) = updates.need_by_date {
            after.need_by_date = need_by_date;
        }
        if let Some(priority) = updates.priority {
            after.priority = priority;
        }
        if let Some(assignee) = updates.assigned_user_id {
            if let Some(id) = assignee
                && !state.profiles.contains_key(&id)
            {
                return Err(DataError::Validation(
                    "insert or update on table \"cards\" violates foreign key constraint".into(),
                ));
            }
            after.assigned_user_id = assignee;
        }
        if let Some(lane_id) = updates.swim_lane_id {
            if state.visible_lane(lane_id, uid).is_err() {
                return Err(row_violation("cards"));
            }
            after.swim_lane_id = lane_id;
        }
        if let Some(position) = updates.position {
            after.position = position;
        }
        if state.card_position_taken(after.swim_lane_id, after.position, Some(card_id)) {
            return Err(unique_violation("cards_lane_position_key"));
        }

        after.version += 1;
        after.updated_at = Utc::now();
        let changes = card_changes(&before, &after);
        if !changes.is_empty() {
            let action = if changes.contains_key("swim_lane_id") || changes.contains_key("position")
            {
                "moved"
            } else {
                "updated"
            };
            state.record_history(card_id, uid, action, Value::Object(changes));
        }
        state.cards.insert(card_id, after.clone());
        Ok(state.with_assignee(&after))
    }

    async fn delete_card(&self, card_id: Uuid) -> Result<(), DataError> {
        let mut state = self.lock();
        let uid = state.uid()?;
        state.visible_card(card_id, uid)?;
        state.remove_card(card_id);
        Ok(())
    }

    async fn add_board_member(
        &self,
        board_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<BoardMember, DataError> {
        let mut state = self.lock();
        let uid = state.uid()?;
        if !state.can_manage(board_id, uid) {
            return Err(row_violation("board_members"));
        }
        if !state.profiles.contains_key(&user_id) {
            return Err(DataError::Validation(
                "insert or update on table \"board_members\" violates foreign key constraint"
                    .into(),
            ));
        }
        if state
            .members
            .iter()
            .any(|m| m.board_id == board_id && m.user_id == user_id)
        {
            return Err(unique_violation("board_members_pkey"));
        }
        let member = BoardMember {
            board_id,
            user_id,
            role,
        };
        state.members.push(member.clone());
        Ok(member)
    }

    async fn remove_board_member(&self, board_id: Uuid, user_id: Uuid) -> Result<(), DataError> {
        let mut state = self.lock();
        let uid = state.uid()?;
        state.visible_board(board_id, uid)?;
        let index = state
            .members
            .iter()
            .position(|m| m.board_id == board_id && m.user_id == user_id)
            .ok_or(DataError::NotFound)?;
        if user_id != uid && !state.can_manage(board_id, uid) {
            return Err(DataError::Forbidden("only board admins can remove members".into()));
        }
        state.members.remove(index);
        Ok(())
    }

    async fn update_board_member_role(
        &self,
        board_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<BoardMember, DataError> {
        let mut state = self.lock();
        let uid = state.uid()?;
        state.visible_board(board_id, uid)?;
        if !state.can_manage(board_id, uid) {
            return Err(DataError::Forbidden("only board admins can change roles".into()));
        }
        let member = state
            .members
            .iter_mut()
            .find(|m| m.board_id == board_id && m.user_id == user_id)
            .ok_or(DataError::NotFound)?;
        member.role = role;
        Ok(member.clone())
    }

    async fn get_card_history(&self, card_id: Uuid) -> Result<Vec<CardHistoryWithUser>, DataError> {
        let state = self.lock();
        let uid = state.uid()?;
        if state.visible_card(card_id, uid).is_err() {
            return Ok(Vec::new());
        }
        Ok(state
            .history
            .iter()
            .rev()
            .filter(|h| h.card_id == card_id)
            .map(|h| CardHistoryWithUser {
                entry: h.clone(),
                user: state.profile(h.user_id),
            })
            .collect())
    }

    async fn apply_positions(
        &self,
        table: PositionTable,
        items: &[PositionUpdate],
    ) -> Result<Vec<PositionAck>, DataError> {
        let mut state = self.lock();
        let uid = state.uid()?;
        if items.is_empty() {
            return Ok(Vec::new());
        }
        for item in items {
            validate_position(item.id, item.position).map_err(invalid)?;
        }
        state.position_batches += 1;
        if let Some((bump_table, id)) = state.pending_bumps.pop_front() {
            state.bump(bump_table, id);
        }

        let mut failures = Vec::new();
        let mut staged: HashMap<Uuid, (Uuid, f64)> = HashMap::new();

        for item in items {
            let current = match table {
                PositionTable::Cards => state
                    .visible_card(item.id, uid)
                    .map(|c| (c.swim_lane_id, c.version)),
                PositionTable::SwimLanes => state
                    .visible_lane(item.id, uid)
                    .map(|l| (l.board_id, l.version)),
            };
            let Ok((parent, actual)) = current else {
                failures.push(PositionFailure {
                    id: item.id,
                    reason: FailureReason::NotFound,
                });
                continue;
            };
            if state.rejected_ids.contains(&item.id) {
                failures.push(PositionFailure {
                    id: item.id,
                    reason: FailureReason::Forbidden,
                });
                continue;
            }
            if let Some(expected) = item.expected_version
                && expected != actual
            {
                failures.push(PositionFailure {
                    id: item.id,
                    reason: FailureReason::VersionMismatch { expected, actual },
                });
                continue;
            }

            let parent = match (table, item.parent_id) {
                (PositionTable::Cards, Some(lane_id)) => {
                    let target = state.visible_lane(lane_id, uid).ok();
                    let same_board = match (target, state.lanes.get(&parent)) {
                        (Some(target), Some(current)) => target.board_id == current.board_id,
                        _ => false,
                    };
                    if !same_board {
                        failures.push(PositionFailure {
                            id: item.id,
                            reason: FailureReason::Forbidden,
                        });
                        continue;
                    }
                    lane_id
                }
                _ => parent,
            };
            staged.insert(item.id, (parent, item.position));
        }

        if failures.is_empty() {
            let parents: HashSet<Uuid> = staged.values().map(|(parent, _)| *parent).collect();
            let mut colliding = HashSet::new();
            for parent in parents {
                let siblings = state.sibling_positions(table, parent, &staged);
                for (i, (id, pos)) in siblings.iter().enumerate() {
                    for (other_id, other_pos) in &siblings[i + 1..] {
                        if pos == other_pos {
                            colliding.insert(*id);
                            colliding.insert(*other_id);
                        }
                    }
                }
            }
            failures.extend(
                items
                    .iter()
                    .filter(|item| colliding.contains(&item.id))
                    .map(|item| PositionFailure {
                        id: item.id,
                        reason: FailureReason::DuplicatePosition,
                    }),
            );
        }

        if !failures.is_empty() {
            return Err(DataError::BatchRejected { failures });
        }

        let now = Utc::now();
        let mut acks = Vec::with_capacity(items.len());
        for item in items {
            let Some(&(parent, position)) = staged.get(&item.id) else {
                continue;
            };
            match table {
                PositionTable::SwimLanes => {
                    if let Some(lane) = state.lanes.get_mut(&item.id) {
                        lane.position = position;
                        lane.version += 1;
                        lane.updated_at = now;
                        acks.push(PositionAck {
                            id: lane.id,
                            position,
                            version: lane.version,
                        });
                    }
                }
                PositionTable::Cards => {
                    let Some(before) = state.cards.get(&item.id).cloned() else {
                        continue;
                    };
                    let mut after = before.clone();
                    after.position = position;
                    after.swim_lane_id = parent;
                    after.version += 1;
                    after.updated_at = now;
                    let changes = card_changes(&before, &after);
                    if !changes.is_empty() {
                        state.record_history(item.id, uid, "moved", Value::Object(changes));
                    }
                    acks.push(PositionAck {
                        id: after.id,
                        position,
                        version: after.version,
                    });
                    state.cards.insert(after.id, after);
                }
            }
        }
        Ok(acks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn signed_in() -> (InMemoryBackend, Uuid) {
        let backend = InMemoryBackend::new();
        let uid = backend.register_user("owner@example.com", "password1", Some("Owner"));
        backend
            .sign_in(&Credentials {
                email: "owner@example.com".into(),
                password: "password1".into(),
            })
            .await
            .unwrap();
        (backend, uid)
    }

    #[tokio::test]
    async fn test_data_calls_require_session() {
        let backend = InMemoryBackend::new();
        assert_eq!(
            backend.get_boards().await.unwrap_err(),
            DataError::NotAuthenticated
        );
    }

    #[tokio::test]
    async fn test_duplicate_lane_position_conflicts() {
        let (backend, _) = signed_in().await;
        let board = backend
            .create_board(&CreateBoard {
                title: "B".into(),
                description: None,
            })
            .await
            .unwrap();
        let lane = CreateSwimLane {
            title: "Todo".into(),
            description: None,
            position: 1.0,
            board_id: board.id,
        };
        backend.create_swim_lane(&lane).await.unwrap();
        assert!(matches!(
            backend.create_swim_lane(&lane).await,
            Err(DataError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_other_users_boards_are_invisible() {
        let (backend, _) = signed_in().await;
        let board = backend
            .create_board(&CreateBoard {
                title: "Private".into(),
                description: None,
            })
            .await
            .unwrap();

        backend.register_user("other@example.com", "password2", None);
        backend
            .sign_in(&Credentials {
                email: "other@example.com".into(),
                password: "password2".into(),
            })
            .await
            .unwrap();

        assert!(backend.get_boards().await.unwrap().is_empty());
        assert_eq!(
            backend.get_board_by_id(board.id).await.unwrap_err(),
            DataError::NotFound
        );
        assert!(
            backend
                .get_swim_lanes_for_board(board.id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_card_updates_append_history() {
        let (backend, uid) = signed_in().await;
        let board = backend
            .create_board(&CreateBoard {
                title: "B".into(),
                description: None,
            })
            .await
            .unwrap();
        let lane = backend
            .create_swim_lane(&CreateSwimLane {
                title: "L".into(),
                description: None,
                position: 1.0,
                board_id: board.id,
            })
            .await
            .unwrap();
        let card = backend
            .create_card(&CreateCard {
                title: "C".into(),
                description: None,
                need_by_date: None,
                priority: None,
                assigned_user_id: None,
                swim_lane_id: lane.id,
                position: 1.0,
            })
            .await
            .unwrap();
        backend
            .update_card(
                card.id,
                &UpdateCard {
                    assigned_user_id: Some(Some(uid)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let history = backend.get_card_history(card.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action(), Some("updated"));
        assert_eq!(history[0].change["changes"]["assigned_user_id"], json!(uid));
        assert_eq!(history[1].action(), Some("created"));
        assert_eq!(history[0].user.as_ref().map(|u| u.id), Some(uid));
    }
}
