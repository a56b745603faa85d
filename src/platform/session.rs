//! Session state for UI layers.
//!
//! Two distinct capabilities over the same [`AuthGateway`] seam:
//!
//! - [`SessionObserver`] — passive. Follows the provider's session-change
//!   notifications and republishes a [`Session`] (user, decoded claims,
//!   derived active-plugin list) through a `watch` channel.
//! - [`CredentialSession`] — the credential shape. Tracks only user +
//!   loading and exposes explicit `login`/`logout` operations.
//!
//! They are intentionally separate types: one decodes claims, the other
//! drives credentials, and consumers rarely want both.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::platform::auth::{AuthGateway, Claims, UserInfo};

/// Continuously-updated session value for a UI layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: Option<UserInfo>,
    pub claims: Option<Claims>,
    pub active_plugins: Option<Vec<String>>,
    pub loading: bool,
}

impl Default for Session {
    /// Subscription just started: nothing known yet, still loading.
    fn default() -> Self {
        Self {
            user: None,
            claims: None,
            active_plugins: None,
            loading: true,
        }
    }
}

impl Session {
    #[must_use]
    pub fn signed_out() -> Self {
        Self {
            user: None,
            claims: None,
            active_plugins: None,
            loading: false,
        }
    }
}

/// Plugin entitlements derived from claims; absent or malformed means none.
fn active_plugins(claims: &Claims) -> Vec<String> {
    claims
        .get("activePlugins")
        .and_then(|value| value.as_array())
        .map(|values| {
            values
                .iter()
                .filter_map(|value| value.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Passive observer: republishes the provider's session changes.
///
/// Dropping the observer deregisters from the provider; late notifications
/// are no-ops.
pub struct SessionObserver {
    state: Arc<watch::Sender<Session>>,
    task: JoinHandle<()>,
}

impl SessionObserver {
    #[must_use]
    pub fn spawn(gateway: Arc<dyn AuthGateway>) -> Self {
        let (state, _) = watch::channel(Session::default());
        let state = Arc::new(state);

        // subscribe before the task runs so no notification can slip past
        let mut events = gateway.subscribe();

        let task_state = state.clone();
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(Some(user)) => match gateway.token_claims(&user).await {
                        Ok(claims) => {
                            let plugins = active_plugins(&claims);
                            task_state.send_replace(Session {
                                user: Some(user),
                                claims: Some(claims),
                                active_plugins: Some(plugins),
                                loading: false,
                            });
                        }
                        Err(err) => {
                            // an unreadable token must not present as signed in
                            error!(uid = %user.uid, error = %err, "token claims fetch failed");
                            task_state.send_replace(Session::signed_out());
                        }
                    },
                    Ok(None) => {
                        task_state.send_replace(Session::signed_out());
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "session notifications lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Self { state, task }
    }

    /// Receiver for the continuously-updated session value.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Latest published session value.
    #[must_use]
    pub fn current(&self) -> Session {
        self.state.borrow().clone()
    }
}

impl Drop for SessionObserver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Credential-shape state: user identity and loading flag only.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialState {
    pub user: Option<UserInfo>,
    pub loading: bool,
}

impl Default for CredentialState {
    fn default() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }
}

/// Session capability with explicit login/logout operations.
pub struct CredentialSession {
    gateway: Arc<dyn AuthGateway>,
    state: Arc<watch::Sender<CredentialState>>,
    task: JoinHandle<()>,
}

impl CredentialSession {
    #[must_use]
    pub fn spawn(gateway: Arc<dyn AuthGateway>) -> Self {
        let (state, _) = watch::channel(CredentialState::default());
        let state = Arc::new(state);

        // subscribe before the task runs so no notification can slip past
        let mut events = gateway.subscribe();

        let task_state = state.clone();
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(user) => {
                        task_state.send_replace(CredentialState {
                            user,
                            loading: false,
                        });
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "session notifications lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Self {
            gateway,
            state,
            task,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CredentialState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn current(&self) -> CredentialState {
        self.state.borrow().clone()
    }

    /// Signs in with email/password. The loading flag is raised for the
    /// duration of the call and always lowered again before returning; a
    /// sign-in failure surfaces after the reset.
    ///
    /// # Errors
    /// Returns the provider error as-is.
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        self.state.send_modify(|state| state.loading = true);

        let result = self.gateway.sign_in(email, password).await;

        self.state.send_modify(|state| state.loading = false);

        result.map(|_| ())
    }

    /// Signs out. Same loading discipline as [`Self::login`].
    ///
    /// # Errors
    /// Returns the provider error as-is.
    pub async fn logout(&self) -> Result<()> {
        self.state.send_modify(|state| state.loading = true);

        let result = self.gateway.sign_out().await;

        self.state.send_modify(|state| state.loading = false);

        result
    }
}

impl Drop for CredentialSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}
