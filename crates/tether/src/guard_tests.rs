// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use yare::parameterized;

use super::*;
use crate::credential::persist::MemoryStorage;
use crate::credential::CredentialTriple;

fn setup(initial: Option<CredentialTriple>) -> (Arc<RouteGuard>, Arc<TokenStore>, Navigator) {
    let store = TokenStore::new(Arc::new(MemoryStorage::new("tab")));
    if let Some(triple) = initial {
        store.set(triple).expect("seed store");
    }
    let navigator = Navigator::new("/");
    let guard = Arc::new(
        RouteGuard::new(Arc::clone(&store), navigator.clone(), PublicRoutes::default(), "/")
            .expect("entry path is public"),
    );
    (guard, store, navigator)
}

fn valid() -> CredentialTriple {
    CredentialTriple::new("A1", "R1", epoch_ms() + 3_600_000)
}

fn expired() -> CredentialTriple {
    CredentialTriple::new("A1", "R1", epoch_ms().saturating_sub(1))
}

#[parameterized(
    root = { "/", "/" },
    trailing_slash = { "/login/", "/login" },
    query = { "/login?next=/dashboard", "/login" },
    fragment = { "/signup#form", "/signup" },
    query_on_root = { "/?x=1", "/" },
    many_slashes = { "///", "/" },
    nested = { "/projects/42/", "/projects/42" },
)]
fn normalizes_paths(input: &str, expected: &str) {
    assert_eq!(normalize(input), expected);
}

#[parameterized(
    entry = { "/", true },
    login = { "/login", true },
    login_with_query = { "/login?next=%2Fdashboard", true },
    signup = { "/signup/", true },
    dashboard = { "/dashboard", false },
    login_prefix = { "/login/reset", false },
    case_sensitive = { "/Login", false },
)]
fn public_routes_match_exactly(path: &str, public: bool) {
    assert_eq!(PublicRoutes::default().contains(path), public);
}

#[test]
fn valid_session_is_allowed_on_protected_path() {
    let (guard, store, _) = setup(Some(valid()));
    assert_eq!(guard.evaluate("/dashboard"), GuardState::Allowed);
    assert!(store.is_authenticated());
}

#[test]
fn missing_session_redirects_to_entry() {
    let (guard, store, navigator) = setup(None);
    navigator.navigate("/dashboard");

    assert_eq!(guard.evaluate("/dashboard"), GuardState::Redirecting { to: "/".to_owned() });
    assert!(!store.is_authenticated());
    assert_eq!(navigator.current(), "/");
}

#[test]
fn expired_session_redirects_and_clears() {
    let (guard, store, _) = setup(Some(expired()));
    assert_eq!(guard.evaluate("/dashboard"), GuardState::Redirecting { to: "/".to_owned() });
    assert!(store.get().is_none());
}

#[parameterized(
    with_valid = { Some(valid()) },
    with_expired = { Some(expired()) },
    without_session = { None },
)]
fn public_path_never_redirects(initial: Option<CredentialTriple>) {
    let had_session = initial.is_some();
    let (guard, store, _) = setup(initial);
    for path in ["/", "/login", "/signup?ref=x"] {
        assert_eq!(guard.evaluate(path), GuardState::Allowed);
    }
    // Public evaluation never touches the store.
    assert_eq!(store.is_authenticated(), had_session);
}

#[test]
fn custom_entry_path() -> anyhow::Result<()> {
    let store = TokenStore::new(Arc::new(MemoryStorage::new("tab")));
    let navigator = Navigator::new("/app");
    let guard = RouteGuard::new(
        Arc::clone(&store),
        navigator.clone(),
        PublicRoutes::new(["/welcome"]),
        "/welcome",
    )?;
    assert_eq!(guard.entry_path(), "/welcome");
    assert_eq!(guard.evaluate("/app"), GuardState::Redirecting { to: "/welcome".to_owned() });
    assert_eq!(navigator.current(), "/welcome");
    Ok(())
}

#[test]
fn private_entry_path_is_rejected() {
    let store = TokenStore::new(Arc::new(MemoryStorage::new("tab")));
    let result = RouteGuard::new(store, Navigator::new("/"), PublicRoutes::new(["/login"]), "/home");
    assert!(matches!(result, Err(SessionError::InvalidConfig(_))));
}

#[test]
fn guard_state_serializes_with_tag() -> anyhow::Result<()> {
    let json = serde_json::to_value(GuardState::Redirecting { to: "/".to_owned() })?;
    assert_eq!(json, serde_json::json!({"state": "redirecting", "to": "/"}));
    assert_eq!(serde_json::to_value(GuardState::Allowed)?, serde_json::json!({"state": "allowed"}));
    Ok(())
}

#[test]
fn navigating_to_same_location_is_silent() {
    let navigator = Navigator::new("/");
    let mut rx = navigator.subscribe();
    rx.borrow_and_update();
    navigator.navigate("/");
    assert!(!rx.has_changed().unwrap_or(true));
    navigator.navigate("/login");
    assert!(rx.has_changed().unwrap_or(false));
}

async fn wait_for_state(
    rx: &mut watch::Receiver<GuardState>,
    want: GuardState,
) -> anyhow::Result<()> {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == want)).await??;
    Ok(())
}

#[tokio::test]
async fn watcher_reevaluates_on_navigation() -> anyhow::Result<()> {
    let (guard, _, navigator) = setup(Some(valid()));
    let shutdown = CancellationToken::new();
    let mut states = spawn_guard(guard, navigator.clone(), shutdown.clone());
    assert_eq!(*states.borrow(), GuardState::Allowed);

    navigator.navigate("/dashboard");
    wait_for_state(&mut states, GuardState::Allowed).await?;
    assert_eq!(navigator.current(), "/dashboard");
    shutdown.cancel();
    Ok(())
}

#[tokio::test]
async fn watcher_redirects_when_session_ends() -> anyhow::Result<()> {
    let (guard, store, navigator) = setup(Some(valid()));
    navigator.navigate("/dashboard");
    let shutdown = CancellationToken::new();
    let mut states = spawn_guard(guard, navigator.clone(), shutdown.clone());
    assert_eq!(*states.borrow_and_update(), GuardState::Allowed);

    // A refresh failure elsewhere clears the store.
    store.clear();

    let mut location = navigator.subscribe();
    tokio::time::timeout(Duration::from_secs(5), location.wait_for(|p| p == "/")).await??;
    // The entry path itself is public, so the guard settles on Allowed.
    wait_for_state(&mut states, GuardState::Allowed).await?;
    assert!(!store.is_authenticated());
    shutdown.cancel();
    Ok(())
}

#[tokio::test]
async fn watcher_redirects_unauthenticated_navigation() -> anyhow::Result<()> {
    let (guard, store, navigator) = setup(None);
    let shutdown = CancellationToken::new();
    let _states = spawn_guard(guard, navigator.clone(), shutdown.clone());

    navigator.navigate("/settings");
    let mut location = navigator.subscribe();
    tokio::time::timeout(Duration::from_secs(5), location.wait_for(|p| p == "/")).await??;
    assert!(!store.is_authenticated());
    shutdown.cancel();
    Ok(())
}

#[tokio::test]
async fn watcher_stops_on_shutdown() -> anyhow::Result<()> {
    let (guard, _, navigator) = setup(None);
    let shutdown = CancellationToken::new();
    let mut states = spawn_guard(guard, navigator, shutdown.clone());

    shutdown.cancel();
    // Sender is dropped once the task exits.
    tokio::time::timeout(Duration::from_secs(5), async {
        while states.changed().await.is_ok() {}
    })
    .await?;
    Ok(())
}

#[tokio::test]
async fn watcher_goes_quiet_after_redirect() -> anyhow::Result<()> {
    let (guard, store, navigator) = setup(None);
    navigator.navigate("/dashboard");
    let shutdown = CancellationToken::new();
    let mut states = spawn_guard(guard, navigator.clone(), shutdown.clone());

    let mut location = navigator.subscribe();
    tokio::time::timeout(Duration::from_secs(5), location.wait_for(|p| p == "/")).await??;
    wait_for_state(&mut states, GuardState::Allowed).await?;
    let settled = store.generation();
    states.borrow_and_update();

    tokio::time::sleep(Duration::from_millis(100)).await;
    // Nothing changed, so nothing was re-evaluated.
    assert_eq!(store.generation(), settled);
    assert!(!states.has_changed()?);
    shutdown.cancel();
    Ok(())
}

#[tokio::test]
async fn watcher_publishes_only_decisions() -> anyhow::Result<()> {
    let (guard, store, navigator) = setup(Some(valid()));
    let shutdown = CancellationToken::new();
    let mut states = spawn_guard(guard, navigator.clone(), shutdown.clone());
    assert_ne!(*states.borrow_and_update(), GuardState::Checking);

    for path in ["/dashboard", "/settings", "/login"] {
        navigator.navigate(path);
        states.changed().await?;
        assert_ne!(*states.borrow_and_update(), GuardState::Checking);
    }
    store.clear();
    states.changed().await?;
    assert_ne!(*states.borrow_and_update(), GuardState::Checking);
    shutdown.cancel();
    Ok(())
}
