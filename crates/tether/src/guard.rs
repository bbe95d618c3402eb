// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Route guard: decides whether the current location may render, and sends
//! sessions without a valid token back to the public entry point.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::credential::epoch_ms;
use crate::credential::store::TokenStore;
use crate::error::SessionError;

/// Outcome of one route evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GuardState {
    Checking,
    Allowed,
    Redirecting { to: String },
}

/// Paths reachable without a session. Matching is exact on the normalized
/// path.
#[derive(Debug, Clone)]
pub struct PublicRoutes {
    routes: HashSet<String>,
}

impl PublicRoutes {
    pub fn new<I, S>(routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self { routes: routes.into_iter().map(|r| normalize(r.as_ref())).collect() }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.routes.contains(&normalize(path))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(String::as_str)
    }
}

impl Default for PublicRoutes {
    fn default() -> Self {
        Self::new(["/", "/login", "/signup"])
    }
}

/// Strip query and fragment, and a trailing slash unless the path is `/`.
pub fn normalize(path: &str) -> String {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = path[..end].trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Current location of the tab. Cheap to clone; clones share the location.
#[derive(Clone)]
pub struct Navigator {
    location: Arc<watch::Sender<String>>,
}

impl Navigator {
    pub fn new(initial: impl Into<String>) -> Self {
        let (tx, _) = watch::channel(initial.into());
        Self { location: Arc::new(tx) }
    }

    /// Move to `path`. Navigating to the current location is a no-op.
    pub fn navigate(&self, path: &str) {
        self.location.send_if_modified(|current| {
            if current == path {
                return false;
            }
            debug!(from = %current, to = %path, "navigate");
            *current = path.to_owned();
            true
        });
    }

    pub fn current(&self) -> String {
        self.location.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.location.subscribe()
    }
}

pub struct RouteGuard {
    store: Arc<TokenStore>,
    navigator: Navigator,
    public: PublicRoutes,
    entry_path: String,
}

impl RouteGuard {
    /// The entry path must itself be public, or a redirect would land on
    /// another protected path.
    pub fn new(
        store: Arc<TokenStore>,
        navigator: Navigator,
        public: PublicRoutes,
        entry_path: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let entry_path = entry_path.into();
        if !public.contains(&entry_path) {
            return Err(SessionError::InvalidConfig(format!(
                "entry path {entry_path} is not a public route"
            )));
        }
        Ok(Self { store, navigator, public, entry_path })
    }

    pub fn entry_path(&self) -> &str {
        &self.entry_path
    }

    /// Evaluate `path` against the current token. A protected path without
    /// an unexpired triple clears the store and navigates to the entry path.
    pub fn evaluate(&self, path: &str) -> GuardState {
        debug!(path, state = ?GuardState::Checking, "evaluating route");
        if self.public.contains(path) {
            return GuardState::Allowed;
        }

        let valid = self.store.get().is_some_and(|t| !t.is_expired(epoch_ms()));
        if valid {
            return GuardState::Allowed;
        }

        info!(path, to = %self.entry_path, "no valid session, redirecting");
        self.store.clear();
        self.navigator.navigate(&self.entry_path);
        GuardState::Redirecting { to: self.entry_path.clone() }
    }
}

/// Re-evaluate the guard whenever the location or the stored token changes.
///
/// The returned receiver carries decisions only (`Allowed` or
/// `Redirecting`); `Checking` is never published because each evaluation
/// completes synchronously. The task ends on `shutdown`.
pub fn spawn_guard(
    guard: Arc<RouteGuard>,
    navigator: Navigator,
    shutdown: CancellationToken,
) -> watch::Receiver<GuardState> {
    let mut location_rx = navigator.subscribe();
    let mut generation_rx = guard.store.subscribe();
    // Release the watch borrow before evaluating: a redirect navigates.
    let path = location_rx.borrow_and_update().clone();
    generation_rx.borrow_and_update();
    let first = guard.evaluate(&path);
    let (state_tx, state_rx) = watch::channel(first);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                changed = location_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = generation_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            let path = location_rx.borrow_and_update().clone();
            generation_rx.borrow_and_update();
            let state = guard.evaluate(&path);
            state_tx.send_replace(state);
        }
        debug!("route guard stopped");
    });

    state_rx
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
