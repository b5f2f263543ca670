use std::ops::Deref;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use super::user::UserProfile;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Card {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub need_by_date: Option<NaiveDate>,
    pub priority: Option<i32>,
    pub assigned_user_id: Option<Uuid>,
    pub swim_lane_id: Uuid,
    /// Ordering key, unique within the lane.
    pub position: f64,
    /// Optimistic locking version, bumped on every write.
    #[ts(type = "number")]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateCard {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub need_by_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub assigned_user_id: Option<Uuid>,
    pub swim_lane_id: Uuid,
    pub position: f64,
}

/// Partial card update. Nullable columns use a double option so that
/// `{"assigned_user_id": null}` clears the assignee while an absent key
/// leaves it alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateCard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    #[ts(type = "string | null")]
    pub need_by_date: Option<Option<NaiveDate>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    #[ts(type = "number | null")]
    pub priority: Option<Option<i32>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    #[ts(type = "string | null")]
    pub assigned_user_id: Option<Option<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swim_lane_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
}

/// Card with its assignee embedded (`assigned_user:assigned_user_id(...)`).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CardWithAssignee {
    #[serde(flatten)]
    #[ts(flatten)]
    pub card: Card,
    #[serde(default)]
    pub assigned_user: Option<UserProfile>,
}

impl Deref for CardWithAssignee {
    type Target = Card;
    fn deref(&self) -> &Self::Target {
        &self.card
    }
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn update_card_distinguishes_null_from_absent() {
        let clear: UpdateCard = serde_json::from_value(json!({ "assigned_user_id": null })).unwrap();
        assert_eq!(clear.assigned_user_id, Some(None));

        let untouched: UpdateCard = serde_json::from_value(json!({ "title": "x" })).unwrap();
        assert_eq!(untouched.assigned_user_id, None);
    }

    #[test]
    fn update_card_serializes_only_present_fields() {
        let update = UpdateCard {
            priority: Some(None),
            position: Some(3.5),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, json!({ "priority": null, "position": 3.5 }));
    }
}
