//! Session types and the user resolution contract.

use serde::{Deserialize, Serialize};

use crate::common::error::SyncResult;

/// Profile returned by the application API for the current token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: String,
}

/// Authentication state. `token` and `authenticated` always change together.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<User>,
    pub token: Option<String>,
    pub authenticated: bool,
    /// Bumped on every login/logout transition; identifies one session.
    pub generation: u64,
}

impl Session {
    pub(crate) fn restored(token: Option<String>) -> Self {
        Self {
            user: None,
            authenticated: token.is_some(),
            token,
            generation: 0,
        }
    }

    /// Resolved user id, if the session is authenticated and the user is known.
    pub fn user_id(&self) -> Option<&str> {
        if !self.authenticated {
            return None;
        }
        self.user
            .as_ref()
            .map(|user| user.id.as_str())
            .filter(|id| !id.is_empty())
    }
}

/// Resolves the user behind a token (the `/auth/me` call).
#[async_trait::async_trait]
pub trait UserResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> SyncResult<User>;
}
