use serde::{Deserialize, Serialize};

use super::role::Role;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    pub role: Option<Role>,
    pub is_alive: bool,
    pub is_host: bool,
}

/// Serializes as `null`. The public projection has no way to carry a role.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redacted;

/// A roster entry as every session member sees it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPlayer {
    pub id: String,
    pub name: String,
    pub role: Redacted,
    pub is_alive: bool,
    pub is_host: bool,
}

impl Player {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            role: None,
            is_alive: true,
            is_host: false,
        }
    }

    pub fn host(id: String, name: String) -> Self {
        Self {
            is_host: true,
            ..Self::new(id, name)
        }
    }

    pub fn is_evil(&self) -> bool {
        self.role.is_some_and(Role::is_evil)
    }

    pub fn to_public(&self, host_id: &str) -> PublicPlayer {
        PublicPlayer {
            id: self.id.clone(),
            name: self.name.clone(),
            role: Redacted,
            is_alive: self.is_alive,
            is_host: self.id == host_id,
        }
    }
}
