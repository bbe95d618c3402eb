// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token record store: the single owner of the session's credential triple.
//!
//! Every write replaces the triple, the identity projection, and the durable
//! mirror under one synchronous write lock, so a reader sees either the
//! previous record or the next one, never a mix.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::credential::persist::TabStorage;
use crate::credential::{claims, CredentialTriple, IdentityProjection};
use crate::error::SessionError;

/// The triple plus everything derived from it.
#[derive(Debug, Clone)]
struct Record {
    triple: CredentialTriple,
    identity: Option<Arc<IdentityProjection>>,
}

#[derive(Debug, Default)]
struct Inner {
    record: Option<Record>,
    /// Bumped on every set/clear; identifies the current token.
    generation: u64,
}

/// One consistent read of the store.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub triple: Option<CredentialTriple>,
    pub identity: Option<Arc<IdentityProjection>>,
    pub generation: u64,
}

/// Session-wide credential state. Injected by reference into the refresh
/// coordinator, the request interceptor, and the route guard.
pub struct TokenStore {
    inner: RwLock<Inner>,
    storage: Arc<dyn TabStorage>,
    generation_tx: watch::Sender<u64>,
}

impl TokenStore {
    /// Create an empty store backed by `storage`. Call [`rehydrate`](Self::rehydrate)
    /// once at startup to pick up a previously mirrored session.
    pub fn new(storage: Arc<dyn TabStorage>) -> Arc<Self> {
        let (generation_tx, _) = watch::channel(0);
        Arc::new(Self { inner: RwLock::new(Inner::default()), storage, generation_tx })
    }

    /// Load the durable mirror into memory. A corrupt or partial record is
    /// discarded and wiped. Returns whether a session was restored.
    pub fn rehydrate(&self) -> bool {
        let triple = match self.storage.load() {
            Ok(Some(triple)) if triple.is_complete() => triple,
            Ok(Some(_)) => {
                warn!("discarding partial mirrored session");
                if let Err(e) = self.storage.wipe() {
                    warn!(err = %e, "failed to wipe mirrored session");
                }
                return false;
            }
            Ok(None) => {
                debug!("no mirrored session to restore");
                return false;
            }
            Err(e) => {
                warn!(err = %e, "discarding unreadable mirrored session");
                if let Err(e) = self.storage.wipe() {
                    warn!(err = %e, "failed to wipe mirrored session");
                }
                return false;
            }
        };

        let identity = claims::decode(&triple.access_token).map(Arc::new);
        let expires_at = triple.expires_at;
        let mut inner = self.inner.write();
        inner.record = Some(Record { triple, identity });
        inner.generation += 1;
        self.generation_tx.send_replace(inner.generation);
        info!(expires_at, "restored mirrored session");
        true
    }

    /// Replace the whole triple and recompute the identity projection.
    pub fn set(&self, triple: CredentialTriple) -> Result<(), SessionError> {
        if !triple.is_complete() {
            warn!("refusing to store an incomplete credential triple");
            return Err(SessionError::Unauthenticated);
        }
        let identity = claims::decode(&triple.access_token).map(Arc::new);

        let mut inner = self.inner.write();
        self.store_locked(&mut inner, triple, identity);
        Ok(())
    }

    /// Like [`set`](Self::set), but only if no other write landed since
    /// `expected_generation` was read. Returns whether the write happened.
    pub fn compare_and_set(
        &self,
        expected_generation: u64,
        triple: CredentialTriple,
    ) -> Result<bool, SessionError> {
        if !triple.is_complete() {
            warn!("refusing to store an incomplete credential triple");
            return Err(SessionError::Unauthenticated);
        }
        let identity = claims::decode(&triple.access_token).map(Arc::new);

        let mut inner = self.inner.write();
        if inner.generation != expected_generation {
            debug!(expected_generation, current = inner.generation, "credential write superseded");
            return Ok(false);
        }
        self.store_locked(&mut inner, triple, identity);
        Ok(true)
    }

    /// Remove the triple, its projection, and the durable mirror. Clearing an
    /// empty store changes nothing and wakes no watcher.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        self.clear_locked(&mut inner);
    }

    /// Clear only if no other write landed since `expected_generation`.
    /// Returns whether a record was removed.
    pub fn clear_if(&self, expected_generation: u64) -> bool {
        let mut inner = self.inner.write();
        if inner.generation != expected_generation {
            return false;
        }
        self.clear_locked(&mut inner)
    }

    fn store_locked(
        &self,
        inner: &mut Inner,
        triple: CredentialTriple,
        identity: Option<Arc<IdentityProjection>>,
    ) {
        if let Err(e) = self.storage.save(&triple) {
            // Memory stays authoritative; the mirror catches up on the next write.
            warn!(err = %e, "failed to mirror credentials");
        }
        debug!(expires_at = triple.expires_at, "credentials stored");
        inner.record = Some(Record { triple, identity });
        inner.generation += 1;
        self.generation_tx.send_replace(inner.generation);
    }

    fn clear_locked(&self, inner: &mut Inner) -> bool {
        if inner.record.is_none() {
            return false;
        }
        if let Err(e) = self.storage.wipe() {
            warn!(err = %e, "failed to wipe mirrored credentials");
        }
        inner.record = None;
        inner.generation += 1;
        self.generation_tx.send_replace(inner.generation);
        debug!("credentials cleared");
        true
    }

    /// Current triple, if authenticated.
    pub fn get(&self) -> Option<CredentialTriple> {
        self.inner.read().record.as_ref().map(|r| r.triple.clone())
    }

    /// Display-only identity for the current token.
    pub fn identity(&self) -> Option<Arc<IdentityProjection>> {
        self.inner.read().record.as_ref().and_then(|r| r.identity.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.read().record.is_some()
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.read();
        Snapshot {
            triple: inner.record.as_ref().map(|r| r.triple.clone()),
            identity: inner.record.as_ref().and_then(|r| r.identity.clone()),
            generation: inner.generation,
        }
    }

    /// Token identity generation; changes on every set/clear.
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Watch the token identity generation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation_tx.subscribe()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
