// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-resident session layer: keeps a tab's bearer credentials valid
//! across API calls and navigations.

pub mod config;
pub mod credential;
pub mod error;
pub mod guard;
pub mod session;
pub mod transport;

use std::sync::Once;

/// Install the rustls `ring` provider. reqwest is built without one and
/// needs it even for plain HTTP.
pub fn ensure_crypto_provider() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
