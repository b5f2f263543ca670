//! Ordering of swim lanes and cards.
//!
//! Every reorder goes through one atomic position batch. A batch rejected
//! only because siblings moved underneath us is re-planned against fresh
//! data a bounded number of times; any other rejection is surfaced with
//! the per-item failures and nothing is written.

pub mod optimistic;
pub mod plan;

use std::sync::Arc;

use db::{
    models::position::{PositionAck, PositionFailure, PositionTable, PositionUpdate},
    validation::{ValidationError, validate_position_batch},
};
use remote::{Backend, DataError};
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

pub use optimistic::OptimisticOrder;
pub use plan::{ReorderPlan, Sibling, plan_move, plan_move_into, plan_order, position_between};

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum ReorderError {
    #[error("Item {0} is not part of this sibling set")]
    UnknownItem(Uuid),
    #[error("Requested order must list every sibling exactly once")]
    IncompleteOrder,
    #[error(transparent)]
    InvalidBatch(#[from] ValidationError),
    #[error("Position batch rejected: {} of {attempted} item(s) failed", .failures.len())]
    Rejected {
        attempted: usize,
        failures: Vec<PositionFailure>,
    },
    #[error("Siblings kept changing; gave up after {attempts} attempts")]
    Conflict {
        attempts: usize,
        attempted: usize,
        failures: Vec<PositionFailure>,
    },
    #[error(transparent)]
    Data(DataError),
}

impl ReorderError {
    fn from_data(err: DataError, attempted: usize) -> Self {
        match err {
            DataError::BatchRejected { failures } => ReorderError::Rejected {
                attempted,
                failures,
            },
            other => ReorderError::Data(other),
        }
    }

    pub fn failures(&self) -> &[PositionFailure] {
        match self {
            ReorderError::Rejected { failures, .. } | ReorderError::Conflict { failures, .. } => {
                failures
            }
            _ => &[],
        }
    }

    /// Some items failed while others were valid. The batch was still
    /// rolled back as a whole.
    pub fn is_partial(&self) -> bool {
        match self {
            ReorderError::Rejected {
                attempted,
                failures,
            }
            | ReorderError::Conflict {
                attempted,
                failures,
                ..
            } => !failures.is_empty() && failures.len() < *attempted,
            _ => false,
        }
    }

    pub fn failed_ids(&self) -> Vec<Uuid> {
        self.failures().iter().map(|f| f.id).collect()
    }
}

impl From<DataError> for ReorderError {
    fn from(err: DataError) -> Self {
        ReorderError::Data(err)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
pub struct ReorderOutcome {
    pub table: PositionTable,
    /// Sibling ids in their final order.
    pub order: Vec<Uuid>,
    pub acks: Vec<PositionAck>,
    pub attempts: usize,
    pub renumbered: bool,
}

#[derive(Debug, Clone)]
enum ReorderRequest {
    MoveLane {
        board_id: Uuid,
        lane_id: Uuid,
        to_index: usize,
    },
    MoveCard {
        card_id: Uuid,
        to_lane: Uuid,
        to_index: usize,
    },
    OrderLanes {
        board_id: Uuid,
        order: Vec<Uuid>,
    },
    OrderCards {
        lane_id: Uuid,
        order: Vec<Uuid>,
    },
}

impl ReorderRequest {
    fn table(&self) -> PositionTable {
        match self {
            ReorderRequest::MoveLane { .. } | ReorderRequest::OrderLanes { .. } => {
                PositionTable::SwimLanes
            }
            ReorderRequest::MoveCard { .. } | ReorderRequest::OrderCards { .. } => {
                PositionTable::Cards
            }
        }
    }
}

#[derive(Clone)]
pub struct PositionReconciler {
    backend: Arc<dyn Backend>,
    max_attempts: usize,
}

impl std::fmt::Debug for PositionReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionReconciler")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl PositionReconciler {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Submits one batch. Empty input is accepted without a round trip;
    /// malformed input is rejected before any call is made.
    pub async fn update_item_positions(
        &self,
        items: &[PositionUpdate],
        table: PositionTable,
    ) -> Result<Vec<PositionAck>, ReorderError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        validate_position_batch(items)?;

        tracing::debug!(%table, items = items.len(), "Applying position batch");
        self.backend
            .apply_positions(table, items)
            .await
            .map_err(|e| ReorderError::from_data(e, items.len()))
    }

    /// Shows `plan` on `order` right away and keeps it only if the server
    /// accepts the batch.
    pub async fn commit_optimistic(
        &self,
        order: &mut OptimisticOrder,
        table: PositionTable,
        plan: &ReorderPlan,
    ) -> Result<Vec<PositionAck>, ReorderError> {
        order.apply(plan);
        match self.update_item_positions(&plan.updates, table).await {
            Ok(acks) => {
                order.commit(&acks);
                Ok(acks)
            }
            Err(e) => {
                order.rollback();
                Err(e)
            }
        }
    }

    pub async fn move_swim_lane(
        &self,
        board_id: Uuid,
        lane_id: Uuid,
        to_index: usize,
    ) -> Result<ReorderOutcome, ReorderError> {
        self.execute(ReorderRequest::MoveLane {
            board_id,
            lane_id,
            to_index,
        })
        .await
    }

    /// Moves a card within its lane or into `to_lane`.
    pub async fn move_card(
        &self,
        card_id: Uuid,
        to_lane: Uuid,
        to_index: usize,
    ) -> Result<ReorderOutcome, ReorderError> {
        self.execute(ReorderRequest::MoveCard {
            card_id,
            to_lane,
            to_index,
        })
        .await
    }

    pub async fn reorder_swim_lanes(
        &self,
        board_id: Uuid,
        order: Vec<Uuid>,
    ) -> Result<ReorderOutcome, ReorderError> {
        self.execute(ReorderRequest::OrderLanes { board_id, order })
            .await
    }

    pub async fn reorder_cards(
        &self,
        lane_id: Uuid,
        order: Vec<Uuid>,
    ) -> Result<ReorderOutcome, ReorderError> {
        self.execute(ReorderRequest::OrderCards { lane_id, order })
            .await
    }

    async fn execute(&self, request: ReorderRequest) -> Result<ReorderOutcome, ReorderError> {
        let table = request.table();
        let mut attempted = 0;
        let mut failures = Vec::new();

        for attempt in 1..=self.max_attempts {
            let (mut order, plan) = self.load_and_plan(&request).await?;
            if plan.is_noop() {
                return Ok(ReorderOutcome {
                    table,
                    order: plan.order,
                    acks: Vec::new(),
                    attempts: attempt,
                    renumbered: false,
                });
            }

            match self.commit_optimistic(&mut order, table, &plan).await {
                Ok(acks) => {
                    return Ok(ReorderOutcome {
                        table,
                        order: plan.order,
                        acks,
                        attempts: attempt,
                        renumbered: plan.renumbered,
                    });
                }
                Err(ReorderError::Rejected {
                    attempted: n,
                    failures: rejected,
                }) if rejected.iter().all(PositionFailure::is_version_mismatch) => {
                    tracing::info!(
                        %table,
                        attempt,
                        "Siblings changed concurrently, re-planning"
                    );
                    attempted = n;
                    failures = rejected;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::warn!(%table, attempts = self.max_attempts, "Giving up on reorder");
        Err(ReorderError::Conflict {
            attempts: self.max_attempts,
            attempted,
            failures,
        })
    }

    async fn load_and_plan(
        &self,
        request: &ReorderRequest,
    ) -> Result<(OptimisticOrder, ReorderPlan), ReorderError> {
        match request {
            ReorderRequest::MoveLane {
                board_id,
                lane_id,
                to_index,
            } => {
                let siblings = self.lane_siblings(*board_id).await?;
                let plan = plan_move(&siblings, *lane_id, *to_index)?;
                Ok((OptimisticOrder::new(siblings), plan))
            }
            ReorderRequest::MoveCard {
                card_id,
                to_lane,
                to_index,
            } => {
                let card = self.backend.get_card_by_id(*card_id).await?;
                if card.swim_lane_id != *to_lane {
                    self.ensure_same_board(card.swim_lane_id, *to_lane).await?;
                }
                let siblings = self.card_siblings(*to_lane).await?;
                let plan = if card.swim_lane_id == *to_lane {
                    plan_move(&siblings, *card_id, *to_index)?
                } else {
                    plan_move_into(&siblings, Sibling::from(&card.card), *to_lane, *to_index)
                };
                Ok((OptimisticOrder::new(siblings), plan))
            }
            ReorderRequest::OrderLanes { board_id, order } => {
                let siblings = self.lane_siblings(*board_id).await?;
                let plan = plan_order(&siblings, order)?;
                Ok((OptimisticOrder::new(siblings), plan))
            }
            ReorderRequest::OrderCards { lane_id, order } => {
                let siblings = self.card_siblings(*lane_id).await?;
                let plan = plan_order(&siblings, order)?;
                Ok((OptimisticOrder::new(siblings), plan))
            }
        }
    }

    /// Cards only move between lanes of one board.
    async fn ensure_same_board(&self, from_lane: Uuid, to_lane: Uuid) -> Result<(), ReorderError> {
        let from = self.backend.get_swim_lane_by_id(from_lane).await?;
        let to = self.backend.get_swim_lane_by_id(to_lane).await?;
        if from.board_id != to.board_id {
            tracing::warn!(
                from_board = %from.board_id,
                to_board = %to.board_id,
                lane_id = %to_lane,
                "Rejected card move across boards"
            );
            return Err(ReorderError::UnknownItem(to_lane));
        }
        Ok(())
    }

    async fn lane_siblings(&self, board_id: Uuid) -> Result<Vec<Sibling>, DataError> {
        let lanes = self.backend.get_swim_lanes_for_board(board_id).await?;
        Ok(lanes.iter().map(Sibling::from).collect())
    }

    async fn card_siblings(&self, lane_id: Uuid) -> Result<Vec<Sibling>, DataError> {
        let cards = self.backend.get_cards_for_swim_lane(lane_id).await?;
        Ok(cards.iter().map(|c| Sibling::from(&c.card)).collect())
    }
}

#[cfg(test)]
mod tests {
    use db::models::position::FailureReason;

    use super::*;

    fn mismatch(n: u128) -> PositionFailure {
        PositionFailure {
            id: Uuid::from_u128(n),
            reason: FailureReason::VersionMismatch {
                expected: 1,
                actual: 2,
            },
        }
    }

    #[test]
    fn test_partial_rejection() {
        let err = ReorderError::from_data(
            DataError::BatchRejected {
                failures: vec![mismatch(1)],
            },
            3,
        );
        assert!(err.is_partial());
        assert_eq!(err.failed_ids(), vec![Uuid::from_u128(1)]);

        let whole = ReorderError::Rejected {
            attempted: 1,
            failures: vec![mismatch(1)],
        };
        assert!(!whole.is_partial());
    }

    #[test]
    fn test_other_data_errors_pass_through() {
        let err = ReorderError::from_data(DataError::NotAuthenticated, 2);
        assert!(matches!(err, ReorderError::Data(DataError::NotAuthenticated)));
        assert!(err.failures().is_empty());
    }
}
