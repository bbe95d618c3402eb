// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn token_with(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}

#[test]
fn decodes_full_projection() -> anyhow::Result<()> {
    let token = token_with(serde_json::json!({
        "sub": "user-1",
        "name": "Ada",
        "email": "ada@example.com",
        "role": "admin",
        "org_id": "org-9",
        "org_name": "Engines Ltd",
        "exp": 1
    }));
    let identity = try_decode(&token)?;
    assert_eq!(
        identity,
        IdentityProjection {
            subject: "user-1".into(),
            display_name: Some("Ada".into()),
            email: Some("ada@example.com".into()),
            role: Some("admin".into()),
            organization_id: Some("org-9".into()),
            organization_name: Some("Engines Ltd".into()),
        }
    );
    Ok(())
}

#[test]
fn falls_back_to_alternate_claim_names() -> anyhow::Result<()> {
    let token = token_with(serde_json::json!({
        "sub": "u",
        "preferred_username": "ada.l",
        "roles": ["viewer", "editor"],
        "organization_id": "o1",
        "organization_name": "Org"
    }));
    let identity = try_decode(&token)?;
    assert_eq!(identity.display_name.as_deref(), Some("ada.l"));
    assert_eq!(identity.role.as_deref(), Some("viewer"));
    assert_eq!(identity.organization_id.as_deref(), Some("o1"));
    assert_eq!(identity.organization_name.as_deref(), Some("Org"));
    Ok(())
}

#[test]
fn tolerates_padded_payload() -> anyhow::Result<()> {
    let payload = base64::engine::general_purpose::URL_SAFE.encode(br#"{"sub":"abc"}"#);
    assert!(payload.ends_with('='), "fixture should carry padding: {payload}");
    let identity = try_decode(&format!("h.{payload}.s"))?;
    assert_eq!(identity.subject, "abc");
    Ok(())
}

#[yare::parameterized(
    opaque = { "not-a-jwt" },
    two_segments = { "a.b" },
    four_segments = { "a.b.c.d" },
    bad_base64 = { "h.@@@.s" },
    not_json = { "h.bm90IGpzb24.s" },
    empty = { "" },
)]
fn malformed_tokens_decode_to_none(token: &str) {
    assert_eq!(decode(token), None);
    assert!(matches!(try_decode(token), Err(SessionError::DecodeFailed(_))));
}

#[test]
fn missing_subject_is_absent() {
    let token = token_with(serde_json::json!({"name": "nobody"}));
    assert_eq!(decode(&token), None);
}

#[test]
fn opaque_bearer_string_is_absent() {
    assert_eq!(decode("A1"), None);
}
