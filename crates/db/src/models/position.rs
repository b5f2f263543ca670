use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Tables whose rows carry an ordering `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PositionTable {
    Cards,
    SwimLanes,
}

/// One row of a position batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
pub struct PositionUpdate {
    pub id: Uuid,
    pub position: f64,
    /// New parent for a card moving between lanes. Ignored for swim lanes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    /// Version the caller last saw; `None` skips the check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "number | null")]
    pub expected_version: Option<i64>,
}

impl PositionUpdate {
    pub fn new(id: Uuid, position: f64) -> Self {
        Self {
            id,
            position,
            parent_id: None,
            expected_version: None,
        }
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Row confirmed by a successful batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
pub struct PositionAck {
    pub id: Uuid,
    pub position: f64,
    #[ts(type = "number")]
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    NotFound,
    Forbidden,
    VersionMismatch {
        #[ts(type = "number")]
        expected: i64,
        #[ts(type = "number")]
        actual: i64,
    },
    DuplicatePosition,
}

/// Per-item failure reported when a batch is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct PositionFailure {
    pub id: Uuid,
    pub reason: FailureReason,
}

impl PositionFailure {
    pub fn is_version_mismatch(&self) -> bool {
        matches!(self.reason, FailureReason::VersionMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_names_match_schema() {
        assert_eq!(PositionTable::SwimLanes.to_string(), "swim_lanes");
        assert_eq!(
            serde_json::to_value(PositionTable::Cards).unwrap(),
            json!("cards")
        );
    }

    #[test]
    fn failure_reason_is_tagged() {
        let failure: PositionFailure = serde_json::from_value(json!({
            "id": Uuid::nil(),
            "reason": { "kind": "version_mismatch", "expected": 2, "actual": 3 }
        }))
        .unwrap();
        assert!(failure.is_version_mismatch());
        assert_eq!(
            failure.reason,
            FailureReason::VersionMismatch {
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn update_omits_unset_fields() {
        let update = PositionUpdate::new(Uuid::nil(), 1.5);
        assert_eq!(
            serde_json::to_value(update).unwrap(),
            json!({ "id": Uuid::nil(), "position": 1.5 })
        );
    }
}
