use askama::Template;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::db::models::Message;
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::flash::Flashes;
use crate::routes::views::{message_cards, Layout, MessageCard, ProfileHeader};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/home_anon.html")]
pub struct HomeAnonTemplate {
    pub layout: Layout,
}

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub profile: ProfileHeader,
    pub messages: Vec<MessageCard>,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// Landing page for visitors, timeline for logged-in users.
pub async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    flashes: Flashes,
) -> AppResult<Response> {
    let Some(current) = user else {
        return Ok(Html(HomeAnonTemplate {
            layout: Layout::new(None, flashes.into_inner()),
        })
        .into_response());
    };

    let conn = state.db.get()?;
    let timeline = Message::timeline(&conn, current.id(), state.config.timeline.limit)?;
    let messages = message_cards(&conn, timeline, Some(&current))?;
    let profile = ProfileHeader::load(&conn, &current.user, Some(&current))?;

    Ok(Html(HomeTemplate {
        layout: Layout::new(Some(&current), flashes.into_inner()),
        profile,
        messages,
    })
    .into_response())
}
