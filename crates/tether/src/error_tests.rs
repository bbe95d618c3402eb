// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::SessionError;

#[yare::parameterized(
    unauthenticated = { SessionError::Unauthenticated, "UNAUTHENTICATED", true },
    refresh_failed = { SessionError::RefreshFailed("HTTP 401".into()), "REFRESH_FAILED", true },
    decode_failed = { SessionError::DecodeFailed("bad segment".into()), "DECODE_FAILED", false },
    upstream = { SessionError::UpstreamAuthRejected { status: 401 }, "UPSTREAM_AUTH_REJECTED", false },
    transport = { SessionError::Transport("connection refused".into()), "TRANSPORT", false },
    storage = { SessionError::Storage("read-only fs".into()), "STORAGE", false },
    invalid_config = { SessionError::InvalidConfig("entry path".into()), "INVALID_CONFIG", false },
)]
fn codes_and_login_hint(err: SessionError, code: &str, login: bool) {
    assert_eq!(err.code(), code);
    assert_eq!(err.requires_login(), login);
}

#[test]
fn display_carries_detail() {
    assert_eq!(
        SessionError::UpstreamAuthRejected { status: 401 }.to_string(),
        "request rejected after refresh (HTTP 401)"
    );
    assert_eq!(SessionError::RefreshFailed("HTTP 500".into()).to_string(), "refresh failed: HTTP 500");
}
