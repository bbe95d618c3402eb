// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One tab's session: wires the store, refresh coordinator, request client
//! and route guard together and owns login/logout.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::credential::persist::TabStorage;
use crate::credential::refresh::{RefreshClient, RefreshCoordinator};
use crate::credential::store::TokenStore;
use crate::credential::{epoch_ms, IdentityProjection, SessionEvent, TokenResponse};
use crate::error::SessionError;
use crate::guard::{spawn_guard, GuardState, Navigator, RouteGuard};
use crate::transport::authorize::AuthorizedClient;

/// Credentials posted to the login endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Point-in-time view of the session for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    /// Negative once the access token has expired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityProjection>,
    pub refresh_in_flight: bool,
}

pub struct Session {
    config: SessionConfig,
    http: reqwest::Client,
    store: Arc<TokenStore>,
    refresh: RefreshCoordinator,
    client: AuthorizedClient,
    guard: Arc<RouteGuard>,
    navigator: Navigator,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    /// Build the session for `config`, restoring any mirrored credentials.
    pub fn open(config: SessionConfig, storage: Arc<dyn TabStorage>) -> Result<Self, SessionError> {
        config.validate().map_err(|e| SessionError::InvalidConfig(format!("{e:#}")))?;
        crate::ensure_crypto_provider();
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SessionError::Transport(format!("build HTTP client: {e}")))?;

        let store = TokenStore::new(storage);
        if store.rehydrate() {
            debug!(tab = %config.tab_id, "session restored from storage");
        }

        let (events, _) = broadcast::channel(64);
        let refresh = RefreshCoordinator::new(
            Arc::clone(&store),
            RefreshClient::new(http.clone(), config.endpoint(&config.refresh_path)),
            events.clone(),
        );
        let client = AuthorizedClient::new(
            http.clone(),
            config.api_url.clone(),
            Arc::clone(&store),
            refresh.clone(),
            config.refresh_threshold(),
        );
        let navigator = Navigator::new(config.entry_path.clone());
        let guard = Arc::new(RouteGuard::new(
            Arc::clone(&store),
            navigator.clone(),
            config.public(),
            config.entry_path.clone(),
        )?);

        Ok(Self { config, http, store, refresh, client, guard, navigator, events })
    }

    /// Exchange credentials for a new triple. On failure the store is left
    /// as it was.
    pub async fn login(
        &self,
        request: &LoginRequest,
    ) -> Result<Option<Arc<IdentityProjection>>, SessionError> {
        let url = self.config.endpoint(&self.config.login_path);
        let resp = self.http.post(&url).json(request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            warn!(%status, email = %request.email, "login rejected");
            return Err(SessionError::Unauthenticated);
        }

        let token: TokenResponse = resp.json().await.map_err(|e| {
            warn!(err = %e, "unreadable login response");
            SessionError::Unauthenticated
        })?;
        let triple = token.into_triple(None, epoch_ms()).ok_or_else(|| {
            warn!("login response missing refresh token or expiry");
            SessionError::Unauthenticated
        })?;

        self.store.set(triple)?;
        info!(email = %request.email, "logged in");
        let _ = self.events.send(SessionEvent::Established);
        Ok(self.store.identity())
    }

    /// End the session. The server is notified on a best-effort basis; the
    /// local session is always cleared.
    pub async fn logout(&self) {
        if let Some(triple) = self.store.get() {
            let url = self.config.endpoint(&self.config.logout_path);
            match self.http.post(&url).bearer_auth(&triple.access_token).send().await {
                Ok(resp) if resp.status().is_success() => debug!("server logout acknowledged"),
                Ok(resp) => warn!(status = %resp.status(), "server logout rejected"),
                Err(e) => warn!(err = %e, "server logout failed"),
            }
        }

        self.store.clear();
        info!("logged out");
        let _ = self.events.send(SessionEvent::LoggedOut);
        self.navigator.navigate(self.guard.entry_path());
    }

    pub fn status(&self) -> SessionStatus {
        let snapshot = self.store.snapshot();
        let now = epoch_ms();
        SessionStatus {
            authenticated: snapshot.triple.is_some(),
            expires_in_ms: snapshot.triple.as_ref().map(|t| clamp_ms(t.remaining_ms(now))),
            identity: snapshot.identity.as_deref().cloned(),
            refresh_in_flight: self.refresh.in_flight(),
        }
    }

    /// Keep a guard decision current until `shutdown`.
    pub fn watch_guard(&self, shutdown: CancellationToken) -> watch::Receiver<GuardState> {
        spawn_guard(Arc::clone(&self.guard), self.navigator.clone(), shutdown)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn refresh(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    pub fn client(&self) -> &AuthorizedClient {
        &self.client
    }

    pub fn guard(&self) -> &Arc<RouteGuard> {
        &self.guard
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

fn clamp_ms(ms: i128) -> i64 {
    i64::try_from(ms).unwrap_or(if ms < 0 { i64::MIN } else { i64::MAX })
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
