//! Session state: durable token, lazy user resolution, observable transitions.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::store::domain::LocalStorage;

use super::domain::{Session, User, UserResolver};

/// Local storage key holding the auth token.
pub const TOKEN_KEY: &str = "token";

struct SessionInner {
    storage: Arc<dyn LocalStorage>,
    resolver: Arc<dyn UserResolver>,
    tx: watch::Sender<Session>,
}

#[derive(Clone)]
pub struct SessionState {
    inner: Arc<SessionInner>,
}

impl SessionState {
    /// Build the session from whatever token was persisted by a previous run.
    pub fn open(storage: Arc<dyn LocalStorage>, resolver: Arc<dyn UserResolver>) -> Self {
        let token = match storage.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(err) => {
                warn!("cannot read persisted token: {err}");
                None
            }
        };
        let (tx, _rx) = watch::channel(Session::restored(token));
        Self {
            inner: Arc::new(SessionInner {
                storage,
                resolver,
                tx,
            }),
        }
    }

    pub fn snapshot(&self) -> Session {
        self.inner.tx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.tx.borrow().authenticated
    }

    pub fn user_id(&self) -> Option<String> {
        self.inner.tx.borrow().user_id().map(str::to_string)
    }

    /// Receiver that observes every login/logout transition.
    pub fn watch(&self) -> watch::Receiver<Session> {
        self.inner.tx.subscribe()
    }

    /// Store the token and mark the session authenticated. No network I/O.
    pub fn login(&self, token: &str) {
        if let Err(err) = self.inner.storage.set(TOKEN_KEY, token) {
            warn!("failed to persist token: {err}");
        }
        self.inner.tx.send_modify(|session| {
            session.token = Some(token.to_string());
            session.user = None;
            session.authenticated = true;
            session.generation += 1;
        });
        info!("session authenticated");
    }

    /// Clear the token and user; completes without network I/O.
    pub fn logout(&self) {
        if let Err(err) = self.inner.storage.remove(TOKEN_KEY) {
            warn!("failed to clear persisted token: {err}");
        }
        self.inner.tx.send_modify(|session| {
            session.token = None;
            session.user = None;
            session.authenticated = false;
            session.generation += 1;
        });
        info!("session cleared");
    }

    /// Resolve the user behind the current token. A rejected token logs the
    /// session out instead of surfacing an error.
    pub async fn fetch_user(&self) -> Option<User> {
        let (token, generation) = {
            let session = self.inner.tx.borrow();
            (session.token.clone()?, session.generation)
        };

        match self.inner.resolver.resolve(&token).await {
            Ok(user) => {
                let mut applied = false;
                self.inner.tx.send_if_modified(|session| {
                    applied = session.generation == generation;
                    if applied {
                        session.user = Some(user.clone());
                    }
                    applied
                });
                applied.then_some(user)
            }
            Err(err) => {
                warn!(code = err.code() as u32, "failed to fetch user, clearing session: {err}");
                let current = self.inner.tx.borrow().generation;
                if current == generation {
                    self.logout();
                }
                None
            }
        }
    }
}
