// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable per-tab mirror of the credential triple.
//!
//! One storage scope only: a tab's slot survives reloads of that tab and is
//! wiped on `clear`. Every write replaces the whole record.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::credential::CredentialTriple;
use crate::error::SessionError;

/// Key/value mirror of a single tab's credential triple.
pub trait TabStorage: Send + Sync {
    /// Read the mirrored record, if any. A record that does not parse is
    /// reported as an error so the caller can wipe it. Completeness is
    /// checked again by the store.
    fn load(&self) -> Result<Option<CredentialTriple>, SessionError>;

    /// Replace the mirrored record.
    fn save(&self, triple: &CredentialTriple) -> Result<(), SessionError>;

    /// Remove the mirrored record. Removing an absent record is not an error.
    fn wipe(&self) -> Result<(), SessionError>;
}

/// JSON file per tab under `<state_dir>/sessions/<tab_id>.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(state_dir: &Path, tab_id: &str) -> Self {
        Self { path: state_dir.join("sessions").join(format!("{}.json", sanitize(tab_id))) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TabStorage for FileStorage {
    fn load(&self) -> Result<Option<CredentialTriple>, SessionError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SessionError::Storage(format!("{}: {e}", self.path.display()))),
        };
        let triple: CredentialTriple = serde_json::from_str(&contents)
            .map_err(|e| SessionError::Storage(format!("{}: {e}", self.path.display())))?;
        if !triple.is_complete() {
            return Err(SessionError::Storage(format!(
                "{}: incomplete credential record",
                self.path.display()
            )));
        }
        Ok(Some(triple))
    }

    /// Atomic write: unique tmp file (PID + counter) then rename, so two
    /// concurrent saves never interleave bytes in one tmp file.
    fn save(&self, triple: &CredentialTriple) -> Result<(), SessionError> {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let storage_err =
            |e: std::io::Error| SessionError::Storage(format!("{}: {e}", self.path.display()));

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(storage_err)?;
        }
        let json =
            serde_json::to_string_pretty(triple).map_err(|e| SessionError::Storage(e.to_string()))?;
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_name = format!(
            "{}.{}.{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
            seq,
        );
        let tmp_path = self.path.with_file_name(tmp_name);
        std::fs::write(&tmp_path, json).map_err(storage_err)?;
        std::fs::rename(&tmp_path, &self.path).map_err(storage_err)?;
        Ok(())
    }

    fn wipe(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Storage(format!("{}: {e}", self.path.display()))),
        }
    }
}

/// In-process storage for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<String, CredentialTriple>>,
    tab_id: String,
}

impl MemoryStorage {
    pub fn new(tab_id: impl Into<String>) -> Self {
        Self { slots: Mutex::new(HashMap::new()), tab_id: tab_id.into() }
    }

    /// Pre-populate the slot, as if a previous page load had written it.
    pub fn with_triple(tab_id: impl Into<String>, triple: CredentialTriple) -> Self {
        let storage = Self::new(tab_id);
        storage.slots.lock().insert(storage.tab_id.clone(), triple);
        storage
    }

    pub fn peek(&self) -> Option<CredentialTriple> {
        self.slots.lock().get(&self.tab_id).cloned()
    }
}

impl TabStorage for MemoryStorage {
    fn load(&self) -> Result<Option<CredentialTriple>, SessionError> {
        Ok(self.peek())
    }

    fn save(&self, triple: &CredentialTriple) -> Result<(), SessionError> {
        self.slots.lock().insert(self.tab_id.clone(), triple.clone());
        Ok(())
    }

    fn wipe(&self) -> Result<(), SessionError> {
        self.slots.lock().remove(&self.tab_id);
        Ok(())
    }
}

/// Keep tab ids usable as file names.
fn sanitize(tab_id: &str) -> String {
    let cleaned: String = tab_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "default".to_owned()
    } else {
        cleaned
    }
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
