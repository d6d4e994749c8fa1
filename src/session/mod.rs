//! Session state: tokens, the cached user descriptor and the role model.
//!
//! This module provides:
//! - The persisted [`Session`] and [`UserDescriptor`] types
//! - A token store over pluggable key-value storage
//! - Access token claim decoding
//! - Role resolution with cached, probed and decoded sources

pub mod claims;
pub mod resolver;
pub mod store;

pub use resolver::{ResolutionState, RoleProbe, RoleResolver};
pub use store::{FileStorage, KeyValueStorage, MemoryStorage, StoreError, TokenStore};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marketplace role of the signed-in user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Vendor,
    /// Logged in, but no source could tell which side of the marketplace.
    User,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Role {
    /// Parse a role as reported by the backend or a token claim.
    pub fn parse(value: &str) -> Role {
        match value.trim().to_ascii_lowercase().as_str() {
            "client" => Role::Client,
            "vendor" => Role::Vendor,
            "user" => Role::User,
            _ => Role::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Vendor => "vendor",
            Role::User => "user",
            Role::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Role::Unknown)
    }

    /// Combine a stored role with a newly discovered one.
    ///
    /// A known role is never replaced by `Unknown`.
    pub fn merge(self, discovered: Role) -> Role {
        if discovered.is_known() {
            discovered
        } else {
            self
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend user id, which arrives as either a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl UserId {
    pub fn from_json(value: &serde_json::Value) -> Option<UserId> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(UserId::Number),
            serde_json::Value::String(s) if !s.is_empty() => Some(UserId::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{}", n),
            UserId::Text(s) => f.write_str(s),
        }
    }
}

/// Cached description of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDescriptor {
    pub username: String,
    #[serde(default, rename = "userId", alias = "user_id")]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub role: Role,
}

impl UserDescriptor {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            user_id: None,
            role: Role::Unknown,
        }
    }
}

/// Persisted session. `None` fields are absent from storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<UserDescriptor>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }

    pub fn role(&self) -> Role {
        self.user.as_ref().map(|u| u.role).unwrap_or_default()
    }
}
