// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session store: who is signed in, with which token.
//!
//! Authentication is two-phase. The federated provider is signed in first,
//! then the backend issues the bearer token and profile:
//!
//! ```text
//! Unauthenticated ──federated ok──▶ FederatedOnly ──backend ok──▶ FullySynced
//!        ▲                               │
//!        └──── compensating sign-out ◀───┘ backend failed
//! ```
//!
//! A passive observer follows provider identity changes for the life of the
//! process and is what restores a session on startup. Observer results are
//! tagged with a generation; any imperative transition (login, register,
//! logout) bumps it, and an observer fetch that started under an older
//! generation is dropped when it resolves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{Identity, Role, SessionUser};
use crate::notify::Notifier;
use crate::realtime::RealtimeChannel;
use crate::services::{AuthApi, AuthGrant, CredentialGateway, LocalStorage};

/// Where the two-phase authentication currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Unauthenticated,
    /// Signed in with the provider but no backend session.
    FederatedOnly,
    FullySynced,
}

/// Published session state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub user: Option<SessionUser>,
    pub token: Option<String>,
    /// True until the observer has handled the first identity notification.
    pub loading: bool,
    pub phase: AuthPhase,
}

impl SessionSnapshot {
    fn initial(token: Option<String>) -> Self {
        Self {
            user: None,
            token,
            loading: true,
            phase: AuthPhase::Unauthenticated,
        }
    }
}

pub struct SessionStore {
    gateway: Arc<dyn CredentialGateway>,
    auth: AuthApi,
    storage: LocalStorage,
    channel: Arc<RealtimeChannel>,
    notifier: Notifier,
    state: watch::Sender<SessionSnapshot>,
    generation: AtomicU64,
    shutdown: CancellationToken,
}

impl SessionStore {
    pub fn new(
        gateway: Arc<dyn CredentialGateway>,
        auth: AuthApi,
        storage: LocalStorage,
        channel: Arc<RealtimeChannel>,
        notifier: Notifier,
    ) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::initial(storage.token()));
        Self {
            gateway,
            auth,
            storage,
            channel,
            notifier,
            state,
            generation: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        }
    }

    // ─── Reads ───────────────────────────────────────────────────

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn current_user(&self) -> Option<SessionUser> {
        self.state.borrow().user.clone()
    }

    pub fn phase(&self) -> AuthPhase {
        self.state.borrow().phase
    }

    /// Team of the signed-in user, or a validation error naming `purpose`.
    pub fn require_team(&self, purpose: &str) -> Result<String> {
        self.current_user()
            .and_then(|u| u.team_id)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Validation(format!("You must be part of a team to {purpose}")))
    }

    /// Wait until the observer has handled the first identity notification.
    pub async fn wait_until_loaded(&self) -> SessionSnapshot {
        let mut rx = self.state.subscribe();
        let snapshot = match rx.wait_for(|s| !s.loading).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        };
        snapshot
    }

    // ─── Imperative Transitions ──────────────────────────────────

    /// Federated sign-in, then backend login.
    ///
    /// A provider failure leaves the current session untouched.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionUser> {
        tracing::info!(email = %email, "Login started");

        if let Err(e) = self.gateway.sign_in(email, password).await {
            return Err(self.surface(e.into_auth()));
        }
        self.set_phase(AuthPhase::FederatedOnly);

        let grant = self.auth.login(email, password).await;
        self.establish(grant, "Login successful!").await
    }

    /// Federated account creation, then backend registration.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: Option<Role>,
    ) -> Result<SessionUser> {
        tracing::info!(email = %email, role = ?role, "Registration started");

        if let Err(e) = self.gateway.create_account(email, password).await {
            return Err(self.surface(e.into_auth()));
        }
        self.set_phase(AuthPhase::FederatedOnly);

        let grant = self.auth.register(email, password, name, role).await;
        self.establish(grant, "Registration successful!").await
    }

    /// Sign out everywhere. Token, user and channel are always cleared; a
    /// federated sign-out failure is returned afterwards.
    pub async fn logout(&self) -> Result<()> {
        self.bump_generation();

        let signed_out = self.gateway.sign_out().await;
        if let Err(e) = &signed_out {
            tracing::warn!(error = %e, "Federated sign-out failed; clearing local session anyway");
        }

        if let Err(e) = self.storage.clear_token() {
            tracing::warn!(error = %e, "Failed to clear stored token");
        }

        self.state.send_modify(|s| {
            s.user = None;
            s.token = None;
            s.phase = AuthPhase::Unauthenticated;
            s.loading = false;
        });

        self.channel.disconnect().await;

        match signed_out {
            Ok(()) => {
                tracing::info!("Logged out");
                self.notifier.success("Logged out successfully");
                Ok(())
            }
            Err(e) => {
                let e = e.into_auth();
                self.notifier.error(e.to_string());
                Err(e)
            }
        }
    }

    /// Finish phase two of login/register.
    async fn establish(
        &self,
        grant: Result<AuthGrant>,
        success: &str,
    ) -> Result<SessionUser> {
        let grant = grant.and_then(|g| self.storage.set_token(&g.token).map(|_| g));

        let grant = match grant {
            Ok(grant) => grant,
            Err(e) => {
                tracing::warn!(error = %e, "Backend authentication failed; rolling back federated session");
                if let Err(e) = self.gateway.sign_out().await {
                    tracing::error!(error = %e, "Compensating federated sign-out failed");
                }
                if let Err(e) = self.storage.clear_token() {
                    tracing::warn!(error = %e, "Failed to clear stored token");
                }
                self.bump_generation();
                self.state.send_modify(|s| {
                    s.user = None;
                    s.token = None;
                    s.phase = AuthPhase::Unauthenticated;
                    s.loading = false;
                });
                self.channel.disconnect().await;
                return Err(self.surface(e.into_auth()));
            }
        };
        self.bump_generation();

        let AuthGrant { token, user } = grant;
        self.state.send_modify(|s| {
            s.user = Some(user.clone());
            s.token = Some(token.clone());
            s.phase = AuthPhase::FullySynced;
            s.loading = false;
        });
        tracing::info!(user_id = %user.id, role = ?user.role, "Session established");

        if let Err(e) = self.channel.connect(&token).await {
            tracing::warn!(error = %e, "Realtime channel unavailable after login");
        }

        self.notifier.success(success);
        Ok(user)
    }

    /// Notify and hand back `err`.
    fn surface(&self, err: AppError) -> AppError {
        self.notifier.error(err.to_string());
        err
    }

    fn set_phase(&self, phase: AuthPhase) {
        self.state.send_modify(|s| s.phase = phase);
    }

    fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    // ─── Passive Observer ────────────────────────────────────────

    /// Follow provider identity changes until [`shutdown`](Self::shutdown).
    ///
    /// Handles the current identity immediately, like a page load.
    pub fn start_observer(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let mut identities = self.gateway.subscribe();
        let cancel = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                let identity = identities.borrow_and_update().clone();
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = store.on_identity(identity) => {}
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = identities.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Identity observer stopped");
        })
    }

    /// Stop the observer.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn on_identity(&self, identity: Option<Identity>) {
        let generation = self.generation.load(Ordering::SeqCst);

        let Some(identity) = identity else {
            tracing::debug!("No federated identity");
            if self.generation.load(Ordering::SeqCst) != generation {
                self.state.send_modify(|s| s.loading = false);
                return;
            }
            self.state.send_modify(|s| {
                s.user = None;
                s.phase = AuthPhase::Unauthenticated;
                s.loading = false;
            });
            self.channel.disconnect().await;
            return;
        };

        tracing::debug!(uid = %identity.uid, "Federated identity present; fetching profile");
        let token_at_start = self.storage.token();
        let profile = self.auth.me().await;

        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Discarding profile fetched under a superseded session");
            self.state.send_modify(|s| s.loading = false);
            return;
        }

        let token = self.storage.token();
        match (profile, token) {
            (Ok(user), Some(token)) => {
                tracing::info!(user_id = %user.id, "Session restored from identity");
                self.state.send_modify(|s| {
                    s.user = Some(user);
                    s.token = Some(token.clone());
                    s.phase = AuthPhase::FullySynced;
                    s.loading = false;
                });
                if let Err(e) = self.channel.connect(&token).await {
                    tracing::warn!(error = %e, "Realtime channel unavailable after restore");
                }
            }
            (Ok(_), None) => {
                tracing::warn!("Profile fetched without a stored token; ignoring");
                self.state.send_modify(|s| {
                    s.user = None;
                    s.phase = AuthPhase::FederatedOnly;
                    s.loading = false;
                });
            }
            (Err(e), _) => {
                tracing::warn!(error = %e, "Failed to fetch profile");
                if e.requires_reauth() && token_at_start.is_some() && self.storage.token() == token_at_start {
                    if let Err(e) = self.storage.clear_token() {
                        tracing::warn!(error = %e, "Failed to clear stale token");
                    }
                    self.notifier.error("Session expired, please sign in again");
                }
                let token = self.storage.token();
                self.state.send_modify(|s| {
                    s.user = None;
                    s.token = token;
                    s.phase = AuthPhase::FederatedOnly;
                    s.loading = false;
                });
            }
        }
    }
}
