use log::warn;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::api::{
    ApiClient, ApiError, AuthEvent, AuthUser, NewProfile, Profile, ProfileLookup, ProfileUpdate,
    Session,
};

/// Where the auth flow currently stands, derived from the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Unknown,
    SignedOut,
    SignedInPendingProfile,
    SignedInWithProfile,
}

/// Process-wide session/profile pair. The store is the only writer; every
/// other component reads the published value.
#[derive(Debug, Clone)]
pub struct AuthSnapshot {
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    pub loading: bool,
}

impl AuthSnapshot {
    fn initial() -> Self {
        Self {
            session: None,
            profile: None,
            loading: true,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn phase(&self) -> AuthPhase {
        match (&self.session, &self.profile) {
            (None, _) if self.loading => AuthPhase::Unknown,
            (None, _) => AuthPhase::SignedOut,
            (Some(_), None) => AuthPhase::SignedInPendingProfile,
            (Some(_), Some(_)) => AuthPhase::SignedInWithProfile,
        }
    }
}

/// Session/profile synchronizer. Listens on the client's auth events for the
/// lifetime of the process and keeps the published snapshot consistent with
/// the `profiles` table without ever touching an existing row's role.
pub struct AuthStore {
    api: Arc<ApiClient>,
    tx: Arc<watch::Sender<AuthSnapshot>>,
    listener: JoinHandle<()>,
}

impl AuthStore {
    /// Builds the store, publishes the state of any already-installed
    /// session, and spawns the event listener. Must run inside a tokio
    /// runtime.
    pub fn new(api: Arc<ApiClient>) -> Self {
        let (tx, _rx) = watch::channel(AuthSnapshot::initial());
        let tx = Arc::new(tx);

        match api.current_session() {
            Some(session) => {
                publish_session(&tx, session.clone());
                tokio::spawn(reconcile(api.clone(), tx.clone(), session.user));
            }
            None => publish_signed_out(&tx),
        }

        let listener = tokio::spawn(listen(api.clone(), api.subscribe(), tx.clone()));
        Self { api, tx, listener }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.tx.borrow().clone()
    }

    /// Re-reads the client's current session and runs a reconciliation pass
    /// inline. Unlike the event-driven path this awaits completion, for
    /// callers that must not navigate before the profile is settled.
    pub async fn refresh(&self) {
        match self.api.current_session() {
            Some(session) => {
                publish_session(&self.tx, session.clone());
                reconcile(self.api.clone(), self.tx.clone(), session.user).await;
            }
            None => publish_signed_out(&self.tx),
        }
    }

    /// Signs out remotely and clears the local pair no matter what the
    /// remote call returned; the user asked to leave. The remote result is
    /// handed back for callers that present failures.
    pub async fn sign_out(&self) -> Result<(), ApiError> {
        let result = self.api.sign_out().await;
        publish_signed_out(&self.tx);
        result
    }

    /// Stops the event listener. Also happens on drop.
    pub fn shutdown(&self) {
        self.listener.abort();
    }
}

impl Drop for AuthStore {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn listen(
    api: Arc<ApiClient>,
    mut events: broadcast::Receiver<AuthEvent>,
    tx: Arc<watch::Sender<AuthSnapshot>>,
) {
    loop {
        match events.recv().await {
            Ok(AuthEvent::SignedIn(session)) | Ok(AuthEvent::Refreshed(session)) => {
                // Session shows up immediately; the profile pass runs after
                // this handler returns and must not block it.
                publish_session(&tx, session.clone());
                tokio::spawn(reconcile(api.clone(), tx.clone(), session.user));
            }
            Ok(AuthEvent::SignedOut) => publish_signed_out(&tx),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                // Dropped events can no longer be replayed; the client's
                // current session is the authority now.
                warn!("auth event stream lagged, {} events dropped", missed);
                match api.current_session() {
                    Some(session) => {
                        publish_session(&tx, session.clone());
                        tokio::spawn(reconcile(api.clone(), tx.clone(), session.user));
                    }
                    None => publish_signed_out(&tx),
                }
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn publish_session(tx: &watch::Sender<AuthSnapshot>, session: Session) {
    tx.send_modify(|state| {
        state.session = Some(session);
        state.loading = true;
    });
}

fn publish_signed_out(tx: &watch::Sender<AuthSnapshot>) {
    tx.send_modify(|state| {
        state.session = None;
        state.profile = None;
        state.loading = false;
    });
}

/// One reconciliation pass: read the row, patch identity fields or insert a
/// fresh row with the default role, then re-read and publish. Each step is
/// caught independently; a transient write failure degrades to stale data
/// instead of surfacing anywhere.
async fn reconcile(
    api: Arc<ApiClient>,
    tx: Arc<watch::Sender<AuthSnapshot>>,
    user: AuthUser,
) {
    match api.get_profile(&user.id).await {
        Ok(ProfileLookup::Found(_)) => {
            if let Err(err) = api
                .update_profile(&user.id, &ProfileUpdate::from_user(&user))
                .await
            {
                warn!("profile update for {} failed: {}", user.id, err);
            }
        }
        Ok(ProfileLookup::NotFound) => {
            if let Err(err) = api.insert_profile(&NewProfile::from_user(&user)).await {
                warn!("profile insert for {} failed: {}", user.id, err);
            }
        }
        Err(err) => warn!("profile lookup for {} failed: {}", user.id, err),
    }

    let loaded = match api.get_profile(&user.id).await {
        Ok(ProfileLookup::Found(profile)) => Some(Some(profile)),
        Ok(ProfileLookup::NotFound) => Some(None),
        Err(err) => {
            // Keep whatever profile was published before.
            warn!("profile load for {} failed: {}", user.id, err);
            None
        }
    };

    tx.send_modify(|state| {
        // A sign-out or a different sign-in may have landed while this pass
        // was in flight; only publish into a matching session.
        let current_user = state.session.as_ref().map(|s| s.user.id.as_str());
        if current_user == Some(user.id.as_str()) {
            if let Some(profile) = loaded {
                state.profile = profile;
            }
            state.loading = false;
        }
    });
}
