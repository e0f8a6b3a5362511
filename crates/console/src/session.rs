// =============================================================================
// Defo Console - Session & Credentials
// =============================================================================
// Table of Contents:
// 1. Credential Storage
// 2. Session Events
// 3. Session Handle
// =============================================================================

use std::cell::RefCell;
use std::rc::Rc;

use gloo_storage::Storage;

use crate::store::subscribers::{Subscribers, Subscription};

// -----------------------------------------------------------------------------
// 1. Credential Storage
// -----------------------------------------------------------------------------

/// Holder of the bearer token attached to every API call.
pub trait CredentialStore {
    /// Current token, if any.
    fn token(&self) -> Option<String>;

    /// Replace the stored token.
    fn store(&self, token: &str);

    /// Forget the stored token.
    fn clear(&self);
}

/// Token persisted in the browser's localStorage.
#[derive(Debug, Clone)]
pub struct LocalStorageCredentials {
    key: String,
}

impl LocalStorageCredentials {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl CredentialStore for LocalStorageCredentials {
    fn token(&self) -> Option<String> {
        gloo_storage::LocalStorage::get::<String>(&self.key)
            .ok()
            .filter(|token| !token.is_empty())
    }

    fn store(&self, token: &str) {
        if let Err(e) = gloo_storage::LocalStorage::set(&self.key, token) {
            log::warn!("Failed to persist credential: {}", e);
        }
    }

    fn clear(&self) {
        gloo_storage::LocalStorage::delete(&self.key);
    }
}

/// Token held in memory only; used off-browser and in tests.
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    token: RefCell<Option<String>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RefCell::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentials {
    fn token(&self) -> Option<String> {
        self.token.borrow().clone()
    }

    fn store(&self, token: &str) {
        *self.token.borrow_mut() = Some(token.to_string());
    }

    fn clear(&self) {
        self.token.borrow_mut().take();
    }
}

// -----------------------------------------------------------------------------
// 2. Session Events
// -----------------------------------------------------------------------------

/// Transitions broadcast to session observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A fresh credential was stored.
    SignedIn,
    /// The user logged out.
    SignedOut,
    /// The server rejected the credential; re-authentication is required.
    Invalidated,
}

impl SessionEvent {
    /// Whether cached, session-scoped data must be dropped.
    pub fn ends_session(&self) -> bool {
        matches!(self, Self::SignedOut | Self::Invalidated)
    }
}

// -----------------------------------------------------------------------------
// 3. Session Handle
// -----------------------------------------------------------------------------

/// Shared handle to the credential plus its invalidation hook.
#[derive(Clone)]
pub struct Session {
    credentials: Rc<dyn CredentialStore>,
    events: Subscribers<SessionEvent>,
}

impl Session {
    pub fn new(credentials: Rc<dyn CredentialStore>) -> Self {
        Self {
            credentials,
            events: Subscribers::new(),
        }
    }

    /// The underlying credential store, shared with the API client.
    pub fn credentials(&self) -> Rc<dyn CredentialStore> {
        Rc::clone(&self.credentials)
    }

    pub fn token(&self) -> Option<String> {
        self.credentials.token()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Store a token obtained out of band and announce it.
    pub fn sign_in(&self, token: &str) {
        self.credentials.store(token);
        log::info!("Session established");
        self.events.publish(&SessionEvent::SignedIn);
    }

    /// Explicit logout.
    pub fn sign_out(&self) {
        self.credentials.clear();
        log::info!("Session closed");
        self.events.publish(&SessionEvent::SignedOut);
    }

    /// Drop a credential the server no longer accepts.
    pub fn invalidate(&self) {
        self.credentials.clear();
        log::warn!("Session invalidated, re-authentication required");
        self.events.publish(&SessionEvent::Invalidated);
    }

    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&SessionEvent) + 'static) -> Subscription {
        self.events.subscribe(callback)
    }

    pub fn observer_count(&self) -> usize {
        self.events.len()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("observers", &self.observer_count())
            .finish()
    }
}
