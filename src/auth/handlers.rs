use askama::Template;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::session;
use crate::db;
use crate::db::models::{NewUser, User};
use crate::error::AppResult;
use crate::extractors::{append_set_cookie, cookie_value, MaybeUser};
use crate::flash::{self, Flash, Flashes};
use crate::routes::home::Html;
use crate::routes::views::Layout;
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/signup.html")]
pub struct SignupTemplate {
    pub layout: Layout,
    pub username: String,
    pub email: String,
    pub image_url: String,
}

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub username: String,
}

// -- Request types --

#[derive(Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub image_url: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Start a session for `user_id` and redirect to `to` with its cookie set.
/// The session the request arrived with, if any, is ended first.
fn login_redirect(
    state: &AppState,
    headers: &HeaderMap,
    user_id: i64,
    to: &str,
    flash: Option<Flash>,
) -> AppResult<Response> {
    let token = {
        let conn = state.db.get()?;
        if let Some(previous) = cookie_value(headers, &state.config.auth.cookie_name) {
            session::delete_session(&conn, previous)?;
        }
        session::create_session(&conn, user_id, state.config.auth.session_hours)?
    };

    let mut response = match flash {
        Some(flash) => flash::found_with(to, flash),
        None => flash::found(to),
    };
    append_set_cookie(
        &mut response,
        &session::session_cookie(
            &state.config.auth.cookie_name,
            &token,
            state.config.auth.session_hours,
        ),
    );
    Ok(response)
}

// -- Signup handlers --

/// GET /signup — render signup form
pub async fn signup_page(MaybeUser(user): MaybeUser, flashes: Flashes) -> Response {
    if user.is_some() {
        return flash::found("/");
    }

    Html(SignupTemplate {
        layout: Layout::new(None, flashes.into_inner()),
        username: String::new(),
        email: String::new(),
        image_url: String::new(),
    })
    .into_response()
}

/// POST /signup — create the account and log it in
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    let new_user = NewUser {
        username: form.username,
        email: form.email,
        password: form.password,
        image_url: form.image_url,
    };

    let cost = state.config.auth.bcrypt_cost;
    let (new_user, result) = db::with_conn(&state.db, move |conn| {
        let result = User::signup(conn, &new_user, cost);
        (new_user, result)
    })
    .await?;

    match result {
        Ok(user) => login_redirect(&state, &headers, user.id, "/", None),
        Err(e) if e.is_validation() => {
            tracing::info!("Signup rejected: {}", e);
            Ok(Html(SignupTemplate {
                layout: Layout::new(None, vec![Flash::danger(e.to_string())]),
                username: new_user.username,
                email: new_user.email,
                image_url: new_user.image_url.unwrap_or_default(),
            })
            .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

// -- Login handlers --

/// GET /login — render login form
pub async fn login_page(MaybeUser(user): MaybeUser, flashes: Flashes) -> Response {
    if user.is_some() {
        return flash::found("/");
    }

    Html(LoginTemplate {
        layout: Layout::new(None, flashes.into_inner()),
        username: String::new(),
    })
    .into_response()
}

/// POST /login — check credentials and start a session
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let username = form.username.clone();
    let user = db::with_conn(&state.db, move |conn| {
        User::authenticate(conn, &form.username, &form.password)
    })
    .await??;

    match user {
        Some(user) => {
            tracing::info!("User {} logged in", user.id);
            login_redirect(
                &state,
                &headers,
                user.id,
                "/",
                Some(Flash::success(format!("Hello, {}!", user.username))),
            )
        }
        None => Ok(Html(LoginTemplate {
            layout: Layout::new(None, vec![Flash::danger("Invalid credentials.")]),
            username,
        })
        .into_response()),
    }
}

// -- Logout handler --

/// GET|POST /logout — delete session and redirect to the login form
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if let Some(token) = cookie_value(&headers, &state.config.auth.cookie_name) {
        let conn = state.db.get()?;
        session::delete_session(&conn, token)?;
    }

    let mut response = flash::found_with("/login", Flash::success("You have been logged out."));
    append_set_cookie(
        &mut response,
        &session::clear_session_cookie(&state.config.auth.cookie_name),
    );
    Ok(response)
}
