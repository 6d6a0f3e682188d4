//! HTTP Basic authentication.
//!
//! Every route except `/health` and `/metrics` requires the configured
//! username and password. Both halves are compared in constant time.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::net::SocketAddr;
use subtle::ConstantTimeEq;

use super::AppState;
use crate::constants::AUTH_REALM;
use crate::metrics;

/// Paths served without credentials.
const PUBLIC_PATHS: &[&str] = &["/health", "/metrics"];

/// The single accepted username/password pair.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Constant-time check of both halves.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let user_ok = self.username.as_bytes().ct_eq(username.as_bytes());
        let pass_ok = self.password.as_bytes().ct_eq(password.as_bytes());
        bool::from(user_ok & pass_ok)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// Decodes an `Authorization: Basic ...` header into `(username, password)`.
///
/// Returns `None` for a missing header, another scheme, bad base64, non-UTF-8
/// content or a payload without a colon.
pub fn parse_basic_auth(value: &HeaderValue) -> Option<(String, String)> {
    let value = value.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn client_ip(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |ConnectInfo(addr)| addr.to_string())
}

fn provided_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(parse_basic_auth)
}

/// Rejects requests that do not carry the configured credentials.
pub(crate) async fn basic_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let provided = provided_credentials(request.headers());
    let authorized = provided
        .as_ref()
        .is_some_and(|(username, password)| state.credentials.verify(username, password));
    if authorized {
        return next.run(request).await;
    }

    let username = provided.map(|(username, _)| username).unwrap_or_default();
    metrics::record_auth_failure();
    tracing::warn!(
        username = %username,
        ip = %client_ip(&request),
        path = %request.uri().path(),
        "Failed login attempt"
    );

    unauthorized()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(
            header::WWW_AUTHENTICATE,
            format!("Basic realm=\"{AUTH_REALM}\""),
        )],
        "Unauthorized\n",
    )
        .into_response()
}
