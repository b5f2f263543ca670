use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Row of the public `users` table. Mirrors the auth user by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

impl UserProfile {
    /// Name if set, otherwise the email address.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or(self.email.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateUserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl UpdateUserProfile {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.avatar.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: Option<&str>, email: Option<&str>) -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            email: email.map(str::to_string),
            name: name.map(str::to_string),
            avatar: None,
        }
    }

    #[test]
    fn display_name_prefers_name() {
        let p = profile(Some("Ada"), Some("ada@example.com"));
        assert_eq!(p.display_name(), Some("Ada"));
    }

    #[test]
    fn display_name_falls_back_to_email() {
        assert_eq!(
            profile(None, Some("ada@example.com")).display_name(),
            Some("ada@example.com")
        );
        assert_eq!(
            profile(Some("  "), Some("ada@example.com")).display_name(),
            Some("ada@example.com")
        );
    }

    #[test]
    fn update_skips_unset_fields() {
        let update = UpdateUserProfile {
            name: Some("Grace".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "Grace" }));
    }
}
