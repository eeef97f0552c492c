use askama::Template;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::db::models::Message;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::flash::{self, Flash, Flashes};
use crate::routes::home::Html;
use crate::routes::views::{message_cards, Layout, MessageCard};
use crate::state::AppState;

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/new_message.html")]
pub struct NewMessageTemplate {
    pub layout: Layout,
    pub text: String,
}

#[derive(Template)]
#[template(path = "pages/message.html")]
pub struct MessageShowTemplate {
    pub layout: Layout,
    pub msg: MessageCard,
}

// --- Forms ---

#[derive(Deserialize)]
pub struct MessageForm {
    #[serde(default)]
    pub text: String,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages/new", get(new_message_page).post(create_message))
        .route("/messages/{id}", get(show_message))
        .route("/messages/{id}/delete", post(delete_message))
}

// --- Handlers ---

async fn new_message_page(current: CurrentUser, flashes: Flashes) -> Html<NewMessageTemplate> {
    Html(NewMessageTemplate {
        layout: Layout::new(Some(&current), flashes.into_inner()),
        text: String::new(),
    })
}

async fn create_message(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<MessageForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;

    match Message::create(&conn, current.id(), &form.text) {
        Ok(message) => {
            tracing::info!("User {} posted message {}", current.id(), message.id);
            Ok(flash::found(&format!("/users/{}", current.id())))
        }
        Err(e) if e.is_validation() => Ok(Html(NewMessageTemplate {
            layout: Layout::new(Some(&current), vec![Flash::danger(e.to_string())]),
            text: form.text,
        })
        .into_response()),
        Err(e) => Err(e.into()),
    }
}

async fn show_message(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    flashes: Flashes,
    Path(id): Path<i64>,
) -> AppResult<Html<MessageShowTemplate>> {
    let conn = state.db.get()?;
    let message = Message::find_authored(&conn, id)?.ok_or(AppError::NotFound)?;
    let msg = message_cards(&conn, vec![message], viewer.as_ref())?
        .pop()
        .ok_or(AppError::NotFound)?;

    Ok(Html(MessageShowTemplate {
        layout: Layout::new(viewer.as_ref(), flashes.into_inner()),
        msg,
    }))
}

/// Only the author may delete a message.
async fn delete_message(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let message = Message::find(&conn, id)?.ok_or(AppError::NotFound)?;

    if message.user_id != current.id() {
        return Err(AppError::Unauthorized);
    }

    message.delete(&conn)?;
    tracing::info!("User {} deleted message {}", current.id(), id);
    Ok(flash::found(&format!("/users/{}", current.id())))
}
