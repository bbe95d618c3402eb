// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::guard::PublicRoutes;

/// Session layer settings. Flattened into the CLI; every field can also be
/// set through its `TETHER_*` environment variable.
#[derive(Debug, Clone, Args)]
pub struct SessionConfig {
    /// Base URL of the protected API.
    #[arg(long, env = "TETHER_API_URL", default_value = "http://127.0.0.1:8080")]
    pub api_url: String,

    /// Refresh endpoint, relative to the API URL.
    #[arg(long, env = "TETHER_REFRESH_PATH", default_value = "/auth/refresh")]
    pub refresh_path: String,

    /// Login endpoint, relative to the API URL.
    #[arg(long, env = "TETHER_LOGIN_PATH", default_value = "/auth/login")]
    pub login_path: String,

    /// Server logout endpoint, relative to the API URL.
    #[arg(long, env = "TETHER_LOGOUT_PATH", default_value = "/auth/logout")]
    pub logout_path: String,

    /// Refresh proactively when the access token expires within this window.
    #[arg(long, env = "TETHER_REFRESH_THRESHOLD_MS", default_value = "60000")]
    pub refresh_threshold_ms: u64,

    /// Transport timeout for every outbound call.
    #[arg(long, env = "TETHER_REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Identifies this tab's durable storage slot.
    #[arg(long, env = "TETHER_TAB_ID", default_value = "default")]
    pub tab_id: String,

    /// Storage root (defaults to the XDG state directory).
    #[arg(long, env = "TETHER_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Comma-separated paths reachable without a session.
    #[arg(long, env = "TETHER_PUBLIC_ROUTES", default_value = "/,/login,/signup", value_delimiter = ',')]
    pub public_routes: Vec<String>,

    /// Public entry point unauthenticated sessions are sent to.
    #[arg(long, env = "TETHER_ENTRY_PATH", default_value = "/")]
    pub entry_path: String,
}

impl SessionConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_url.trim().is_empty() {
            anyhow::bail!("--api-url must not be empty");
        }
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            anyhow::bail!("--api-url must be an http(s) URL: {}", self.api_url);
        }

        for (flag, path) in [
            ("--refresh-path", &self.refresh_path),
            ("--login-path", &self.login_path),
            ("--logout-path", &self.logout_path),
            ("--entry-path", &self.entry_path),
        ] {
            if !path.starts_with('/') {
                anyhow::bail!("{flag} must be absolute: {path}");
            }
        }
        if let Some(route) = self.public_routes.iter().find(|r| !r.starts_with('/')) {
            anyhow::bail!("public route must be absolute: {route}");
        }

        // The redirect target has to be reachable without a session.
        if !self.public().contains(&self.entry_path) {
            anyhow::bail!("entry path {} is not a public route", self.entry_path);
        }
        if self.tab_id.trim().is_empty() {
            anyhow::bail!("--tab-id must not be empty");
        }
        Ok(())
    }

    pub fn refresh_threshold(&self) -> Duration {
        Duration::from_millis(self.refresh_threshold_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn public(&self) -> PublicRoutes {
        PublicRoutes::new(&self.public_routes)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(crate::credential::state_dir)
    }

    /// Absolute URL for an endpoint path.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.api_url.trim_end_matches('/'))
    }

    /// Defaults pointed at `api_url`, for tests and embedding.
    pub fn test(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            refresh_path: "/auth/refresh".into(),
            login_path: "/auth/login".into(),
            logout_path: "/auth/logout".into(),
            refresh_threshold_ms: 60_000,
            request_timeout_ms: 5_000,
            tab_id: "test".into(),
            state_dir: None,
            public_routes: vec!["/".into(), "/login".into(), "/signup".into()],
            entry_path: "/".into(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
