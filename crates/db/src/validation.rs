//! Client-side checks run before a request leaves the process.
//!
//! The hosted schema enforces the same rules with NOT NULL / CHECK
//! constraints; validating locally gives a typed error instead of a
//! round trip.

use std::collections::HashSet;

use thiserror::Error;
use uuid::Uuid;

use crate::models::position::PositionUpdate;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("Position for {0} is not a finite number")]
    NonFinitePosition(Uuid),

    #[error("Item {0} appears more than once in the batch")]
    DuplicateId(Uuid),

    #[error("Position {position} is assigned to more than one item")]
    DuplicatePosition { position: f64 },

    #[error("Invalid member role: '{0}'. Valid values: member, admin, owner")]
    InvalidRole(String),
}

pub const VALID_MEMBER_ROLES: &[&str] = &["member", "admin", "owner"];

/// Rejects titles that are empty after trimming.
///
/// # Examples
/// ```
/// use db::validation::validate_title;
///
/// assert!(validate_title("Backlog").is_ok());
/// assert!(validate_title("   ").is_err());
/// ```
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        Err(ValidationError::EmptyField("title"))
    } else {
        Ok(())
    }
}

pub fn validate_member_role(role: &str) -> Result<(), ValidationError> {
    if VALID_MEMBER_ROLES.contains(&role) {
        Ok(())
    } else {
        Err(ValidationError::InvalidRole(role.to_string()))
    }
}

pub fn validate_position(id: Uuid, position: f64) -> Result<(), ValidationError> {
    if position.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFinitePosition(id))
    }
}

/// A batch must name each item once, give each a finite position, and
/// never assign the same position twice within one parent.
pub fn validate_position_batch(items: &[PositionUpdate]) -> Result<(), ValidationError> {
    let mut ids = HashSet::with_capacity(items.len());
    let mut slots = HashSet::with_capacity(items.len());

    for item in items {
        validate_position(item.id, item.position)?;
        if !ids.insert(item.id) {
            return Err(ValidationError::DuplicateId(item.id));
        }
        // -0.0 and 0.0 share a slot
        let key = (item.parent_id, (item.position + 0.0).to_bits());
        if !slots.insert(key) {
            return Err(ValidationError::DuplicatePosition {
                position: item.position,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_member_role() {
        for role in VALID_MEMBER_ROLES {
            assert!(validate_member_role(role).is_ok());
        }
        assert_eq!(
            validate_member_role("viewer"),
            Err(ValidationError::InvalidRole("viewer".to_string()))
        );
    }

    #[test]
    fn test_batch_rejects_non_finite() {
        let id = Uuid::new_v4();
        let batch = [PositionUpdate::new(id, f64::NAN)];
        assert_eq!(
            validate_position_batch(&batch),
            Err(ValidationError::NonFinitePosition(id))
        );
        let batch = [PositionUpdate::new(id, f64::INFINITY)];
        assert!(validate_position_batch(&batch).is_err());
    }

    #[test]
    fn test_batch_rejects_duplicate_ids() {
        let id = Uuid::new_v4();
        let batch = [PositionUpdate::new(id, 1.0), PositionUpdate::new(id, 2.0)];
        assert_eq!(
            validate_position_batch(&batch),
            Err(ValidationError::DuplicateId(id))
        );
    }

    #[test]
    fn test_batch_rejects_duplicate_positions() {
        let batch = [
            PositionUpdate::new(Uuid::new_v4(), 0.0),
            PositionUpdate::new(Uuid::new_v4(), -0.0),
        ];
        assert!(matches!(
            validate_position_batch(&batch),
            Err(ValidationError::DuplicatePosition { .. })
        ));
    }

    #[test]
    fn test_same_position_under_different_parents_is_fine() {
        let batch = [
            PositionUpdate::new(Uuid::new_v4(), 1.0).with_parent(Uuid::new_v4()),
            PositionUpdate::new(Uuid::new_v4(), 1.0).with_parent(Uuid::new_v4()),
        ];
        assert!(validate_position_batch(&batch).is_ok());
    }

    #[test]
    fn test_empty_batch_is_valid() {
        assert!(validate_position_batch(&[]).is_ok());
    }
}
