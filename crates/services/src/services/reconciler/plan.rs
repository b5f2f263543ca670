//! Pure position planning. Nothing here talks to the backend.
//!
//! Positions are `f64`. A move takes the midpoint between its new
//! neighbours; when no value strictly between them exists (equal
//! neighbours, exhausted precision, pre-existing duplicates) the whole
//! sibling set is renumbered `1.0, 2.0, ...` in `(position, id)` order.

use db::models::{card::Card, position::PositionUpdate, swim_lane::SwimLane};
use serde::Serialize;
use ts_rs::TS;
use uuid::Uuid;

use super::ReorderError;

/// One row of a sibling set as the planner sees it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, TS)]
pub struct Sibling {
    pub id: Uuid,
    pub position: f64,
    #[ts(type = "number")]
    pub version: i64,
}

impl From<&SwimLane> for Sibling {
    fn from(lane: &SwimLane) -> Self {
        Self {
            id: lane.id,
            position: lane.position,
            version: lane.version,
        }
    }
}

impl From<&Card> for Sibling {
    fn from(card: &Card) -> Self {
        Self {
            id: card.id,
            position: card.position,
            version: card.version,
        }
    }
}

/// Total order used everywhere: position, then id as tie-break.
pub fn sort_siblings(siblings: &mut [Sibling]) {
    siblings.sort_by(|a, b| a.position.total_cmp(&b.position).then(a.id.cmp(&b.id)));
}

fn strictly_increasing(siblings: &[Sibling]) -> bool {
    siblings.windows(2).all(|w| w[0].position < w[1].position)
}

/// A finite position strictly between the neighbours, if one exists.
pub fn position_between(before: Option<f64>, after: Option<f64>) -> Option<f64> {
    let candidate = match (before, after) {
        (None, None) => 1.0,
        (Some(b), None) => b + 1.0,
        (None, Some(a)) => a - 1.0,
        (Some(b), Some(a)) => b + (a - b) / 2.0,
    };
    let above = before.is_none_or(|b| candidate > b);
    let below = after.is_none_or(|a| candidate < a);
    (candidate.is_finite() && above && below).then_some(candidate)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReorderPlan {
    /// Rows whose position (or parent) changes, each carrying the version
    /// it was planned against.
    pub updates: Vec<PositionUpdate>,
    /// Sibling ids in their final order.
    pub order: Vec<Uuid>,
    /// True when the whole set had to be renumbered.
    pub renumbered: bool,
}

impl ReorderPlan {
    pub fn is_noop(&self) -> bool {
        self.updates.is_empty()
    }
}

fn update_for(sibling: &Sibling, position: f64, parent: Option<Uuid>) -> PositionUpdate {
    let update = PositionUpdate::new(sibling.id, position).with_version(sibling.version);
    match parent {
        Some(parent) => update.with_parent(parent),
        None => update,
    }
}

/// Every sibling gets `index + 1.0`; only rows that actually change are
/// emitted, plus the moving row when it changes parent.
fn renumber(ordered: &[Sibling], moving: Option<(Uuid, Uuid)>) -> Vec<PositionUpdate> {
    ordered
        .iter()
        .enumerate()
        .filter_map(|(index, sibling)| {
            let position = (index + 1) as f64;
            let parent = moving
                .filter(|(id, _)| *id == sibling.id)
                .map(|(_, parent)| parent);
            (parent.is_some() || sibling.position != position)
                .then(|| update_for(sibling, position, parent))
        })
        .collect()
}

fn place(mut others: Vec<Sibling>, moving: Sibling, to: usize, parent: Option<Uuid>) -> ReorderPlan {
    let to = to.min(others.len());
    let before = to.checked_sub(1).and_then(|i| others.get(i)).map(|s| s.position);
    let after = others.get(to).map(|s| s.position);
    let consistent = strictly_increasing(&others);

    let midpoint = if consistent {
        position_between(before, after)
    } else {
        None
    };

    others.insert(to, moving);
    let order = others.iter().map(|s| s.id).collect();

    match midpoint {
        Some(position) => ReorderPlan {
            updates: vec![update_for(&moving, position, parent)],
            order,
            renumbered: false,
        },
        None => ReorderPlan {
            updates: renumber(&others, parent.map(|p| (moving.id, p))),
            order,
            renumbered: true,
        },
    }
}

/// Moves `item` to `to_index` within its own sibling set. Indexes past the
/// end clamp to the end.
pub fn plan_move(
    siblings: &[Sibling],
    item: Uuid,
    to_index: usize,
) -> Result<ReorderPlan, ReorderError> {
    let mut ordered = siblings.to_vec();
    sort_siblings(&mut ordered);

    let from = ordered
        .iter()
        .position(|s| s.id == item)
        .ok_or(ReorderError::UnknownItem(item))?;

    if from == to_index.min(ordered.len() - 1) && strictly_increasing(&ordered) {
        return Ok(ReorderPlan {
            updates: Vec::new(),
            order: ordered.iter().map(|s| s.id).collect(),
            renumbered: false,
        });
    }

    let moving = ordered.remove(from);
    Ok(place(ordered, moving, to_index, None))
}

/// Moves `item` from another parent into `targets` at `to_index`.
pub fn plan_move_into(
    targets: &[Sibling],
    item: Sibling,
    parent: Uuid,
    to_index: usize,
) -> ReorderPlan {
    let mut ordered: Vec<Sibling> = targets.iter().filter(|s| s.id != item.id).copied().collect();
    sort_siblings(&mut ordered);
    place(ordered, item, to_index, Some(parent))
}

/// Rearranges the set into `desired`, which must list every sibling once.
/// Existing position values are reused as slots when they are distinct,
/// so applying the same order twice changes nothing the second time.
pub fn plan_order(siblings: &[Sibling], desired: &[Uuid]) -> Result<ReorderPlan, ReorderError> {
    let mut ordered = siblings.to_vec();
    sort_siblings(&mut ordered);

    if desired.len() != ordered.len() {
        return Err(ReorderError::IncompleteOrder);
    }
    let mut seen = std::collections::HashSet::with_capacity(desired.len());
    for id in desired {
        if !ordered.iter().any(|s| s.id == *id) {
            return Err(ReorderError::UnknownItem(*id));
        }
        if !seen.insert(*id) {
            return Err(ReorderError::IncompleteOrder);
        }
    }

    let renumbered = !strictly_increasing(&ordered);
    let slots: Vec<f64> = if renumbered {
        (1..=ordered.len()).map(|i| i as f64).collect()
    } else {
        ordered.iter().map(|s| s.position).collect()
    };

    let updates = desired
        .iter()
        .zip(slots)
        .filter_map(|(id, slot)| {
            let sibling = ordered.iter().find(|s| s.id == *id)?;
            (sibling.position != slot).then(|| update_for(sibling, slot, None))
        })
        .collect();

    Ok(ReorderPlan {
        updates,
        order: desired.to_vec(),
        renumbered,
    })
}
