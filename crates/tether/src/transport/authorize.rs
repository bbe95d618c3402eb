// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request authorization: attach a fresh bearer token to every call and
//! recover once from a stale-token rejection.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::credential::refresh::RefreshCoordinator;
use crate::credential::store::TokenStore;
use crate::error::SessionError;
use crate::transport::{ApiRequest, ApiResponse};

/// Status the API uses to signal an unusable bearer token.
const AUTH_FAILURE: StatusCode = StatusCode::UNAUTHORIZED;

/// HTTP client for the protected API.
#[derive(Clone)]
pub struct AuthorizedClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<TokenStore>,
    refresh: RefreshCoordinator,
    /// Proactive refresh window.
    threshold: Duration,
}

impl AuthorizedClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        store: Arc<TokenStore>,
        refresh: RefreshCoordinator,
        threshold: Duration,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { http, base_url, store, refresh, threshold }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send `request`, refreshing first if the token is near expiry and once
    /// more if the API rejects it. Responses other than an auth failure are
    /// returned untouched, whatever their status.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, SessionError> {
        let bearer = self.authorize().await?;
        let response = self.dispatch(&request, bearer.as_deref()).await?;
        if response.status != AUTH_FAILURE.as_u16() {
            return Ok(response);
        }

        let Some(rejected) = bearer else {
            debug!(path = %request.path, "unauthenticated call rejected");
            return Err(SessionError::Unauthenticated);
        };
        if request.is_retry() {
            return Err(SessionError::UpstreamAuthRejected { status: response.status });
        }

        debug!(path = %request.path, "bearer token rejected, refreshing");
        let fresh = self.refresh.refresh_rejected(&rejected).await.map_err(|e| {
            warn!(path = %request.path, err = %e, "reactive refresh failed");
            SessionError::Unauthenticated
        })?;

        let retry = request.into_retry();
        let response = self.dispatch(&retry, Some(&fresh.access_token)).await?;
        if response.status == AUTH_FAILURE.as_u16() {
            warn!(path = %retry.path, "fresh token rejected, giving up");
            return Err(SessionError::UpstreamAuthRejected { status: response.status });
        }
        Ok(response)
    }

    /// Token for the outgoing call, or `None` when there is no session.
    async fn authorize(&self) -> Result<Option<String>, SessionError> {
        if !self.store.is_authenticated() {
            return Ok(None);
        }
        match self.refresh.ensure_fresh(self.threshold).await {
            Ok(triple) => Ok(Some(triple.access_token)),
            Err(e) => {
                debug!(err = %e, "no usable token for outgoing call");
                Err(SessionError::Unauthenticated)
            }
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, SessionError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut req = self.http.request(request.method.clone(), url);
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(ref body) = request.body {
            req = req.json(body);
        }
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        debug!(method = %request.method, path = %request.path, status, retry = request.is_retry(), "api call");
        Ok(ApiResponse { status, headers, body })
    }
}

#[cfg(test)]
#[path = "authorize_tests.rs"]
mod tests;
