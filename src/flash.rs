//! One-shot notices carried across a redirect.
//!
//! A redirect stores its flashes in the `warbler_flash` cookie. The next
//! rendered page reads them through the [`Flashes`] extractor, and the
//! [`consume`] middleware expires the cookie once a page has been produced.

use std::convert::Infallible;

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::extractors::{append_set_cookie, cookie_value};

pub const FLASH_COOKIE: &str = "warbler_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Danger,
    Info,
    Warning,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Danger => "danger",
            FlashKind::Info => "info",
            FlashKind::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn new(kind: FlashKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(FlashKind::Success, message)
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self::new(FlashKind::Danger, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(FlashKind::Info, message)
    }
}

/// Hex-encoded JSON, so the cookie value never needs quoting.
pub fn encode(flashes: &[Flash]) -> String {
    match serde_json::to_vec(flashes) {
        Ok(json) => hex::encode(json),
        Err(e) => {
            tracing::error!("Failed to encode flash messages: {}", e);
            String::new()
        }
    }
}

/// Decode a cookie value. Tampered or stale values decode to nothing.
pub fn decode(value: &str) -> Vec<Flash> {
    hex::decode(value)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}

fn flash_cookie(flashes: &[Flash]) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/",
        FLASH_COOKIE,
        encode(flashes)
    )
}

fn clear_flash_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", FLASH_COOKIE)
}

/// `302 Found` to `to`.
pub fn found(to: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, to.to_string())]).into_response()
}

/// `302 Found` to `to`, showing `flash` on the next rendered page.
pub fn found_with(to: &str, flash: Flash) -> Response {
    let mut response = found(to);
    append_set_cookie(&mut response, &flash_cookie(&[flash]));
    response
}

/// Flashes delivered with the current request.
#[derive(Debug, Default)]
pub struct Flashes(pub Vec<Flash>);

impl Flashes {
    pub fn into_inner(self) -> Vec<Flash> {
        self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Flashes {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Flashes(
            cookie_value(&parts.headers, FLASH_COOKIE)
                .map(decode)
                .unwrap_or_default(),
        ))
    }
}

/// Expire the flash cookie after it has been shown.
///
/// Redirects keep it alive so the flash survives until the page the
/// redirect lands on. Responses that set a fresh flash are left alone.
pub async fn consume(request: Request, next: Next) -> Response {
    let carried = cookie_value(request.headers(), FLASH_COOKIE)
        .map(|v| !v.is_empty())
        .unwrap_or(false);

    let mut response = next.run(request).await;

    if carried && !response.status().is_redirection() {
        let sets_flash = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.starts_with(&format!("{}=", FLASH_COOKIE)));
        if !sets_flash {
            append_set_cookie(&mut response, &clear_flash_cookie());
        }
    }

    response
}
