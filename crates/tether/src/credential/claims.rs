// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unverified claim decoding for display purposes.
//!
//! Nothing here checks a signature. Expiry decisions use the triple's
//! `expires_at`, never these claims.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use crate::credential::IdentityProjection;
use crate::error::SessionError;

/// Claim names accepted in the access token payload.
#[derive(Debug, Default, Deserialize)]
struct RawClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default, alias = "organization_id")]
    org_id: Option<String>,
    #[serde(default, alias = "organization_name")]
    org_name: Option<String>,
}

/// Decode the identity projection from an access token, or `None` when the
/// token is not a decodable compact JWS. Never fails loudly.
pub fn decode(access_token: &str) -> Option<IdentityProjection> {
    match try_decode(access_token) {
        Ok(identity) => Some(identity),
        Err(e) => {
            tracing::debug!(err = %e, "identity projection unavailable");
            None
        }
    }
}

/// Strict variant of [`decode`] reporting why decoding failed.
pub fn try_decode(access_token: &str) -> Result<IdentityProjection, SessionError> {
    let mut segments = access_token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return Err(SessionError::DecodeFailed("expected three dot-separated segments".into()));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| SessionError::DecodeFailed(format!("payload is not base64url: {e}")))?;
    let raw: RawClaims = serde_json::from_slice(&bytes)
        .map_err(|e| SessionError::DecodeFailed(format!("payload is not a claims object: {e}")))?;

    let subject = raw
        .sub
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SessionError::DecodeFailed("missing sub claim".into()))?;

    Ok(IdentityProjection {
        subject,
        display_name: raw.name.or(raw.preferred_username),
        email: raw.email,
        role: raw.role.or_else(|| raw.roles.into_iter().next()),
        organization_id: raw.org_id,
        organization_name: raw.org_name,
    })
}

#[cfg(test)]
#[path = "claims_tests.rs"]
mod tests;
