// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use yare::parameterized;

use super::*;
use crate::credential::persist::MemoryStorage;
use crate::credential::CredentialTriple;

#[tokio::test]
async fn open_rejects_private_entry_path() {
    let mut config = SessionConfig::test("http://127.0.0.1:1");
    config.entry_path = "/home".to_owned();
    let result = Session::open(config, Arc::new(MemoryStorage::new("tab")));
    assert!(matches!(result.err(), Some(SessionError::InvalidConfig(_))));
}

#[tokio::test]
async fn status_saturates_far_future_expiry() -> anyhow::Result<()> {
    let storage = MemoryStorage::with_triple("tab", CredentialTriple::new("A1", "R1", u64::MAX));
    let session = Session::open(SessionConfig::test("http://127.0.0.1:1"), Arc::new(storage))?;

    let status = session.status();
    assert!(status.authenticated);
    assert_eq!(status.expires_in_ms, Some(i64::MAX));
    Ok(())
}

#[parameterized(
    positive = { 1_500, 1_500 },
    negative = { -1_500, -1_500 },
    above_range = { i64::MAX as i128 + 1, i64::MAX },
    below_range = { i64::MIN as i128 - 1, i64::MIN },
    u64_max = { u64::MAX as i128, i64::MAX },
)]
fn clamps_remaining_ms(input: i128, expected: i64) {
    assert_eq!(clamp_ms(input), expected);
}
