use db::models::position::PositionAck;
use uuid::Uuid;

use super::plan::{ReorderPlan, Sibling, sort_siblings};

/// Client-side view of one sibling set that can run ahead of the server.
///
/// `apply` shows a plan immediately; `commit` folds confirmed versions in
/// and `rollback` restores the last confirmed order after a rejection.
#[derive(Debug, Clone)]
pub struct OptimisticOrder {
    confirmed: Vec<Sibling>,
    current: Vec<Sibling>,
}

impl OptimisticOrder {
    pub fn new(siblings: impl IntoIterator<Item = Sibling>) -> Self {
        let mut confirmed: Vec<Sibling> = siblings.into_iter().collect();
        sort_siblings(&mut confirmed);
        Self {
            current: confirmed.clone(),
            confirmed,
        }
    }

    pub fn siblings(&self) -> &[Sibling] {
        &self.current
    }

    pub fn order(&self) -> Vec<Uuid> {
        self.current.iter().map(|s| s.id).collect()
    }

    pub fn confirmed_order(&self) -> Vec<Uuid> {
        self.confirmed.iter().map(|s| s.id).collect()
    }

    pub fn is_pending(&self) -> bool {
        self.current != self.confirmed
    }

    pub fn apply(&mut self, plan: &ReorderPlan) {
        for update in &plan.updates {
            match self.current.iter_mut().find(|s| s.id == update.id) {
                Some(sibling) => sibling.position = update.position,
                // Arriving from another parent
                None => self.current.push(Sibling {
                    id: update.id,
                    position: update.position,
                    version: update.expected_version.unwrap_or_default(),
                }),
            }
        }
        sort_siblings(&mut self.current);
    }

    pub fn commit(&mut self, acks: &[PositionAck]) {
        for ack in acks {
            if let Some(sibling) = self.current.iter_mut().find(|s| s.id == ack.id) {
                sibling.position = ack.position;
                sibling.version = ack.version;
            }
        }
        sort_siblings(&mut self.current);
        self.confirmed = self.current.clone();
    }

    pub fn rollback(&mut self) {
        self.current = self.confirmed.clone();
    }
}
