use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::Response;
use rusqlite::{params, OptionalExtension};

use crate::db::models::{User, USER_COLUMNS};
use crate::error::AppError;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    /// Session token the request was authenticated with.
    pub token: String,
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }
}

/// Extractor that requires authentication.
/// Rejects with [`AppError::Unauthorized`], which redirects home with
/// "Access unauthorized.".
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = cookie_value(&parts.headers, &state.config.auth.cookie_name)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthorized)?
            .to_string();

        let conn = state.db.get()?;
        let user = conn
            .query_row(
                &format!(
                    "SELECT {USER_COLUMNS}
                     FROM sessions s
                     JOIN users u ON u.id = s.user_id
                     WHERE s.token = ?1 AND s.expires_at > datetime('now')"
                ),
                params![token],
                User::from_row,
            )
            .optional()?
            .ok_or(AppError::Unauthorized)?;

        Ok(CurrentUser { user, token })
    }
}

/// Optional user extractor — returns None instead of redirecting when not
/// authenticated.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(AppError::Unauthorized) => Ok(MaybeUser(None)),
            Err(e) => Err(e),
        }
    }
}

/// Value of the cookie `name`, if the request carries one.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val)
            } else {
                None
            }
        })
}

/// Add a `Set-Cookie` header without replacing ones already present.
pub fn append_set_cookie(response: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!("Invalid Set-Cookie value: {}", e),
    }
}
