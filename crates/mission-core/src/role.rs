//! Maps an authenticated identity to a permission level.
//!
//! The role lives in `users/{identity}` and is watched for as long as the
//! identity stays signed in, so promotions and demotions apply live.

use std::sync::Arc;

use mission_model::Role;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{DashboardError, Result};
use crate::store::{DocPath, Document, DocumentStore, Fields};

pub const USERS_COLLECTION: &str = "users";
pub const ROLE_FIELD: &str = "role";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPhase {
    Unauthenticated,
    ResolvingRole { identity: String },
    Authenticated { identity: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { identity: String },
    SignedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleState {
    phase: AuthPhase,
    role: Role,
    loading: bool,
}

impl Default for RoleState {
    fn default() -> Self {
        Self {
            phase: AuthPhase::Unauthenticated,
            role: Role::Guest,
            loading: true,
        }
    }
}

impl RoleState {
    pub fn phase(&self) -> &AuthPhase {
        &self.phase
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn can_edit(&self) -> bool {
        self.role.can_edit()
    }

    pub fn identity(&self) -> Option<&str> {
        match &self.phase {
            AuthPhase::Unauthenticated => None,
            AuthPhase::ResolvingRole { identity } | AuthPhase::Authenticated { identity } => {
                Some(identity)
            }
        }
    }

    pub fn signed_in(&mut self, identity: String) {
        self.phase = AuthPhase::ResolvingRole { identity };
        self.role = Role::Guest;
        self.loading = true;
    }

    pub fn signed_out(&mut self) {
        self.phase = AuthPhase::Unauthenticated;
        self.role = Role::Guest;
        self.loading = false;
    }

    /// Applies a snapshot of `users/{identity}`. Snapshots for anyone but
    /// the current identity are ignored and `false` is returned.
    pub fn role_document(&mut self, identity: &str, fields: Option<&Fields>) -> bool {
        if self.identity() != Some(identity) {
            return false;
        }

        self.role = fields
            .and_then(|fields| fields.get(ROLE_FIELD))
            .and_then(Value::as_str)
            .map(Role::parse)
            .unwrap_or(Role::Guest);
        self.phase = AuthPhase::Authenticated {
            identity: identity.to_string(),
        };
        self.loading = false;
        true
    }
}

pub struct RoleResolver {
    store: Arc<dyn DocumentStore>,
    state: Arc<watch::Sender<RoleState>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    runtime: Handle,
}

impl RoleResolver {
    /// Must be called from inside a tokio runtime; role listeners are
    /// spawned on it.
    pub fn new(store: Arc<dyn DocumentStore>) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|err| DashboardError::RemoteUnavailable(format!("no async runtime: {err}")))?;
        let (state, _) = watch::channel(RoleState::default());
        Ok(Self {
            store,
            state: Arc::new(state),
            listener: Mutex::new(None),
            runtime,
        })
    }

    pub fn state(&self) -> RoleState {
        self.state.borrow().clone()
    }

    pub fn role(&self) -> Role {
        self.state.borrow().role()
    }

    pub fn can_edit(&self) -> bool {
        self.state.borrow().can_edit()
    }

    pub fn subscribe(&self) -> watch::Receiver<RoleState> {
        self.state.subscribe()
    }

    /// Waits until the current identity's role has been resolved.
    pub async fn resolved(&self) -> RoleState {
        let mut rx = self.subscribe();
        let settled = rx.wait_for(|state| !state.loading()).await.map(|state| (*state).clone());
        settled.unwrap_or_else(|_| self.state())
    }

    #[tracing::instrument(skip(self))]
    pub fn handle(&self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn { identity } => {
                info!(identity = %identity, "signed in; resolving role");
                self.state.send_modify(|state| state.signed_in(identity.clone()));

                let feed = self
                    .store
                    .subscribe_document(&DocPath::new(USERS_COLLECTION, identity.clone()));
                let task = self
                    .runtime
                    .spawn(watch_role(feed, identity, Arc::clone(&self.state)));
                if let Some(previous) = self.listener.lock().replace(task) {
                    previous.abort();
                }
            }
            AuthEvent::SignedOut => {
                info!("signed out");
                if let Some(previous) = self.listener.lock().take() {
                    previous.abort();
                }
                self.state.send_modify(RoleState::signed_out);
            }
        }
    }
}

impl Drop for RoleResolver {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}

async fn watch_role(
    mut feed: watch::Receiver<Option<Document>>,
    identity: String,
    state: Arc<watch::Sender<RoleState>>,
) {
    loop {
        let snapshot = feed.borrow_and_update().clone();
        let applied = state.send_if_modified(|current| {
            current.role_document(&identity, snapshot.as_ref().map(|doc| &doc.fields))
        });
        debug!(identity = %identity, applied, "role document snapshot");

        if feed.changed().await.is_err() {
            break;
        }
    }
}
