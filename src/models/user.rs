//! Directory user reference.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A directory user as held by the breakout workflow.
///
/// Only the stable directory id and the display name are kept; two users are
/// the same user when their ids match.
#[derive(Debug, Clone, Serialize, Deserialize, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
}

impl User {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_by_id() {
        assert_eq!(User::new("u1", "Ada"), User::new("u1", "Ada Lovelace"));
        assert_ne!(User::new("u1", "Ada"), User::new("u2", "Ada"));
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(User::new("u1", "Ada")).unwrap();
        assert_eq!(json, serde_json::json!({ "id": "u1", "displayName": "Ada" }));
    }
}
