// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refresh coordination: decides when to exchange the refresh token and
//! collapses concurrent demands into one exchange.
//!
//! At most one exchange is in flight. Every caller that needs a refresh while
//! one is running awaits that same outcome, so a rotated refresh token is
//! never presented twice. The exchange runs on its own task and completes
//! even if every waiter goes away.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::credential::store::TokenStore;
use crate::credential::{epoch_ms, CredentialTriple, SessionEvent, TokenResponse};
use crate::error::SessionError;

type RefreshOutcome = Result<CredentialTriple, SessionError>;
type InFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Body sent to the refresh endpoint.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    access_token: &'a str,
    refresh_token: &'a str,
}

/// HTTP client for the identity provider's refresh endpoint.
#[derive(Clone)]
pub struct RefreshClient {
    http: reqwest::Client,
    url: String,
}

impl RefreshClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self { http, url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Perform a single exchange. Any failure, including transport errors,
    /// is reported as `RefreshFailed`.
    pub async fn exchange(&self, current: &CredentialTriple) -> RefreshOutcome {
        let body = RefreshRequest {
            access_token: &current.access_token,
            refresh_token: &current.refresh_token,
        };
        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SessionError::RefreshFailed(format!("HTTP error: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SessionError::RefreshFailed(format!("HTTP {status}: {text}")));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| SessionError::RefreshFailed(format!("parse response: {e}")))?;
        token.into_triple(Some(&current.refresh_token), epoch_ms()).ok_or_else(|| {
            SessionError::RefreshFailed("response missing expiry or refresh token".into())
        })
    }
}

struct Inner {
    store: Arc<TokenStore>,
    client: RefreshClient,
    events: broadcast::Sender<SessionEvent>,
    in_flight: Mutex<Option<InFlight>>,
}

/// Keeps the store's triple fresh. Cheap to clone; clones share the single
/// in-flight slot.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<TokenStore>,
        client: RefreshClient,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self { inner: Arc::new(Inner { store, client, events, in_flight: Mutex::new(None) }) }
    }

    /// Return a triple that outlives `threshold`, exchanging first if needed.
    pub async fn ensure_fresh(&self, threshold: Duration) -> RefreshOutcome {
        let current = self.inner.store.get().ok_or(SessionError::Unauthenticated)?;
        if current.is_fresh(threshold, epoch_ms()) {
            return Ok(current);
        }
        debug!(
            remaining_ms = current.remaining_ms(epoch_ms()) as i64,
            threshold_ms = threshold.as_millis() as u64,
            "access token inside refresh window"
        );
        self.join_or_start(|t| !t.is_fresh(threshold, epoch_ms())).await
    }

    /// Reactive refresh after the server rejected `rejected_access_token`.
    ///
    /// Always exchanges unless the store already holds a different token,
    /// meaning another caller rotated it after this request was sent.
    pub async fn refresh_rejected(&self, rejected_access_token: &str) -> RefreshOutcome {
        debug!("access token rejected upstream");
        self.join_or_start(|t| t.access_token == rejected_access_token).await
    }

    /// Whether an exchange is currently running.
    pub fn in_flight(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    /// Attach to the running exchange, or start one if `needs_exchange` still
    /// holds for the current triple once the slot is locked.
    async fn join_or_start(
        &self,
        needs_exchange: impl Fn(&CredentialTriple) -> bool,
    ) -> RefreshOutcome {
        let shared = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some(running) => {
                    debug!("joining in-flight refresh");
                    running.clone()
                }
                None => {
                    // Re-read under the slot lock: an exchange may have landed
                    // between the caller's first read and now.
                    let snapshot = self.inner.store.snapshot();
                    let current = snapshot.triple.ok_or(SessionError::Unauthenticated)?;
                    if !needs_exchange(&current) {
                        return Ok(current);
                    }
                    let started = self.start(current, snapshot.generation);
                    *slot = Some(started.clone());
                    started
                }
            }
        };
        shared.await
    }

    /// Spawn the exchange. Must be called with the in-flight slot locked.
    fn start(&self, current: CredentialTriple, generation: u64) -> InFlight {
        info!("refreshing access token");
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let outcome = inner.settle(&current, generation).await;
            *inner.in_flight.lock() = None;
            outcome
        });
        async move {
            task.await.unwrap_or_else(|e| {
                Err(SessionError::RefreshFailed(format!("refresh task aborted: {e}")))
            })
        }
        .boxed()
        .shared()
    }
}

impl Inner {
    /// Run one exchange and apply its result to the store.
    async fn settle(&self, current: &CredentialTriple, generation: u64) -> RefreshOutcome {
        match self.client.exchange(current).await {
            Ok(next) => match self.store.compare_and_set(generation, next.clone()) {
                Ok(true) => {
                    info!(expires_at = next.expires_at, "access token refreshed");
                    let _ = self.events.send(SessionEvent::Refreshed { expires_at: next.expires_at });
                    Ok(next)
                }
                Ok(false) => {
                    // Logout or a new login happened while exchanging; theirs wins.
                    debug!("discarding refresh result for a superseded session");
                    self.store.get().ok_or(SessionError::Unauthenticated)
                }
                Err(e) => {
                    self.terminate(generation, &e.to_string());
                    Err(SessionError::RefreshFailed(e.to_string()))
                }
            },
            Err(e) => {
                warn!(err = %e, "credential refresh failed");
                self.terminate(generation, &e.to_string());
                Err(e)
            }
        }
    }

    /// Refresh failure ends the session: wipe it and tell the route guard.
    fn terminate(&self, generation: u64, reason: &str) {
        if self.store.clear_if(generation) {
            info!("session terminated after refresh failure");
            let _ = self.events.send(SessionEvent::Terminated { reason: reason.to_owned() });
        }
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
