//! Session store: who is logged in, and as what role.
//!
//! The session lives in memory for the lifetime of the process and is
//! mirrored to a [`KeyValueStore`] under fixed keys so the next run starts
//! logged in. Values are stored as plain strings; JSON-quoted values written
//! by older clients are unwrapped on load and rewritten in plain form.
//!
//! Tokens are opaque. Nothing here checks expiry; an access token is trusted
//! until a request using it fails.

mod auth;
mod store;

pub use auth::{login, signup, LoginForm, SignupForm, SignupResult};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub(crate) use store::write_json_atomic;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::api::AuthData;
use crate::error::ClientError;

pub const KEY_ACCESS_TOKEN: &str = "access_token";
pub const KEY_REFRESH_TOKEN: &str = "refresh_token";
pub const KEY_USER_ID: &str = "user_id";
pub const KEY_USER_ROLE: &str = "user_role";
pub const KEY_USER_NAME: &str = "user_name";
pub const KEY_USER_EMAIL: &str = "user_email";

const ALL_KEYS: [&str; 6] = [
    KEY_ACCESS_TOKEN,
    KEY_REFRESH_TOKEN,
    KEY_USER_ID,
    KEY_USER_ROLE,
    KEY_USER_NAME,
    KEY_USER_EMAIL,
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Parse a stored or server-supplied role. Anything unrecognised is a
    /// regular user.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// The authenticated identity and its credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl Session {
    /// Build a session from a login or signup response. Returns `None` when
    /// the response carries no access token.
    pub fn from_auth(auth: &AuthData) -> Option<Self> {
        let access_token = auth.access_token.as_deref().filter(|t| !t.is_empty())?;
        Some(Self {
            user_id: auth.user.id.clone(),
            email: auth.user.email.clone(),
            display_name: auth.user.display_name(),
            role: auth
                .user
                .role
                .as_deref()
                .map(Role::parse_lenient)
                .unwrap_or_default(),
            access_token: access_token.to_string(),
            refresh_token: auth.refresh_token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Single source of truth for the current session.
pub struct SessionStore {
    store: Box<dyn KeyValueStore>,
    current: Option<Session>,
}

impl SessionStore {
    /// Create a session store and rehydrate from durable storage.
    pub fn new(store: Box<dyn KeyValueStore>) -> Result<Self, ClientError> {
        let mut this = Self {
            store,
            current: None,
        };
        this.rehydrate()?;
        Ok(this)
    }

    /// A store with no durable backing.
    pub fn in_memory() -> Self {
        Self {
            store: Box::new(MemoryStore::new()),
            current: None,
        }
    }

    fn rehydrate(&mut self) -> Result<(), ClientError> {
        let mut legacy = Vec::new();
        let mut read = |key: &str| -> Option<String> {
            let raw = self.store.get(key)?;
            let value = decode_value(&raw);
            if value != raw {
                legacy.push((key.to_string(), value.clone()));
            }
            Some(value).filter(|v| !v.is_empty())
        };

        let access_token = read(KEY_ACCESS_TOKEN);
        let user_id = read(KEY_USER_ID);
        let refresh_token = read(KEY_REFRESH_TOKEN);
        let role = read(KEY_USER_ROLE);
        let display_name = read(KEY_USER_NAME);
        let email = read(KEY_USER_EMAIL);

        self.current = match (access_token, user_id) {
            (Some(access_token), Some(user_id)) => Some(Session {
                user_id,
                email: email.unwrap_or_default(),
                display_name: display_name.unwrap_or_default(),
                role: role.as_deref().map(Role::parse_lenient).unwrap_or_default(),
                access_token,
                refresh_token,
            }),
            _ => None,
        };

        if !legacy.is_empty() {
            debug!(keys = legacy.len(), "Rewriting JSON-quoted session values");
            let entries: Vec<(&str, &str)> = legacy
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            self.store.set_all(&entries)?;
        }

        if let Some(session) = &self.current {
            debug!(user_id = %session.user_id, role = %session.role, "Restored session");
        }
        Ok(())
    }

    /// Store the identity and its tokens, and mark the session authenticated.
    pub fn login(&mut self, session: Session) -> Result<(), ClientError> {
        let mut entries = vec![
            (KEY_ACCESS_TOKEN, session.access_token.as_str()),
            (KEY_USER_ID, session.user_id.as_str()),
            (KEY_USER_ROLE, session.role.as_str()),
            (KEY_USER_NAME, session.display_name.as_str()),
            (KEY_USER_EMAIL, session.email.as_str()),
        ];
        if let Some(refresh) = &session.refresh_token {
            entries.push((KEY_REFRESH_TOKEN, refresh.as_str()));
        }
        self.store.set_all(&entries)?;
        if session.refresh_token.is_none() {
            self.store.remove(KEY_REFRESH_TOKEN)?;
        }

        info!(user_id = %session.user_id, role = %session.role, "Logged in");
        self.current = Some(session);
        Ok(())
    }

    /// Clear the in-memory session and every durable key.
    pub fn logout(&mut self) -> Result<(), ClientError> {
        self.current = None;
        self.store.remove_all(&ALL_KEYS)?;
        info!("Logged out");
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.current.as_ref().map(|s| s.role)
    }

    pub fn is_admin(&self) -> bool {
        self.current.as_ref().is_some_and(Session::is_admin)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.access_token.as_str())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.user_id.as_str())
    }

    /// Give back the durable store, e.g. to reopen it as a fresh session.
    pub fn into_store(self) -> Box<dyn KeyValueStore> {
        self.store
    }
}

/// Unwrap a value that an older client stored JSON-encoded (`"\"42\""`).
fn decode_value(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        if let Ok(inner) = serde_json::from_str::<String>(trimmed) {
            return inner;
        }
    }
    raw.to_string()
}
