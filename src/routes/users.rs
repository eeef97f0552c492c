use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::auth::session;
use crate::db;
use crate::db::models::{LikeError, Message, ProfileUpdate, User};
use crate::error::{AppError, AppResult};
use crate::extractors::{append_set_cookie, CurrentUser, MaybeUser};
use crate::flash::{self, Flash, Flashes};
use crate::routes::home::Html;
use crate::routes::views::{
    message_cards, user_cards, Layout, MessageCard, ProfileHeader, UserCard,
};
use crate::state::AppState;

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/users.html")]
pub struct UsersIndexTemplate {
    pub layout: Layout,
    pub users: Vec<UserCard>,
    pub search: String,
}

#[derive(Template)]
#[template(path = "pages/user.html")]
pub struct UserShowTemplate {
    pub layout: Layout,
    pub profile: ProfileHeader,
    pub messages: Vec<MessageCard>,
}

#[derive(Template)]
#[template(path = "pages/connections.html")]
pub struct ConnectionsTemplate {
    pub layout: Layout,
    pub profile: ProfileHeader,
    pub title: &'static str,
    pub empty_text: &'static str,
    pub users: Vec<UserCard>,
}

#[derive(Template)]
#[template(path = "pages/likes.html")]
pub struct LikesTemplate {
    pub layout: Layout,
    pub profile: ProfileHeader,
    pub messages: Vec<MessageCard>,
}

#[derive(Template)]
#[template(path = "pages/edit_profile.html")]
pub struct EditProfileTemplate {
    pub layout: Layout,
    pub form: ProfileFields,
}

/// Values shown in the profile form.
pub struct ProfileFields {
    pub username: String,
    pub email: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: String,
    pub location: String,
}

impl From<&User> for ProfileFields {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            image_url: user.image_url.clone(),
            header_image_url: user.header_image_url.clone(),
            bio: user.bio.clone().unwrap_or_default(),
            location: user.location.clone().unwrap_or_default(),
        }
    }
}

// --- Forms ---

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub image_url: Option<String>,
    pub header_image_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub password: String,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/profile", get(edit_profile).post(update_profile))
        .route("/users/delete", post(delete_user))
        .route("/users/{id}", get(show_user))
        .route("/users/{id}/following", get(show_following))
        .route("/users/{id}/followers", get(show_followers))
        .route("/users/{id}/likes", get(show_likes).post(show_likes))
        .route("/users/follow/{id}", post(follow))
        .route("/users/stop-following/{id}", post(stop_following))
        .route("/users/add_like/{message_id}", post(add_like))
        .route("/users/remove_like/{message_id}", post(remove_like))
}

// --- Handlers ---

/// GET /users — everyone, or a username search with `?q=`
async fn list_users(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    flashes: Flashes,
    Query(query): Query<SearchQuery>,
) -> AppResult<Html<UsersIndexTemplate>> {
    let conn = state.db.get()?;
    let users = User::all(&conn, query.q.as_deref())?;
    let users = user_cards(&conn, users, viewer.as_ref())?;

    Ok(Html(UsersIndexTemplate {
        layout: Layout::new(viewer.as_ref(), flashes.into_inner()),
        users,
        search: query.q.unwrap_or_default(),
    }))
}

/// GET /users/{id} — profile and messages
async fn show_user(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    flashes: Flashes,
    Path(id): Path<i64>,
) -> AppResult<Html<UserShowTemplate>> {
    let conn = state.db.get()?;
    let user = User::find(&conn, id)?.ok_or(AppError::NotFound)?;
    let profile = ProfileHeader::load(&conn, &user, viewer.as_ref())?;
    let messages = message_cards(&conn, Message::by_user(&conn, user.id)?, viewer.as_ref())?;

    Ok(Html(UserShowTemplate {
        layout: Layout::new(viewer.as_ref(), flashes.into_inner()),
        profile,
        messages,
    }))
}

/// GET /users/{id}/following
async fn show_following(
    State(state): State<AppState>,
    viewer: CurrentUser,
    flashes: Flashes,
    Path(id): Path<i64>,
) -> AppResult<Html<ConnectionsTemplate>> {
    let conn = state.db.get()?;
    let user = User::find(&conn, id)?.ok_or(AppError::NotFound)?;
    let users = user_cards(&conn, user.following(&conn)?, Some(&viewer))?;

    Ok(Html(ConnectionsTemplate {
        profile: ProfileHeader::load(&conn, &user, Some(&viewer))?,
        layout: Layout::new(Some(&viewer), flashes.into_inner()),
        title: "Following",
        empty_text: "Not following anyone yet.",
        users,
    }))
}

/// GET /users/{id}/followers
async fn show_followers(
    State(state): State<AppState>,
    viewer: CurrentUser,
    flashes: Flashes,
    Path(id): Path<i64>,
) -> AppResult<Html<ConnectionsTemplate>> {
    let conn = state.db.get()?;
    let user = User::find(&conn, id)?.ok_or(AppError::NotFound)?;
    let users = user_cards(&conn, user.followers(&conn)?, Some(&viewer))?;

    Ok(Html(ConnectionsTemplate {
        profile: ProfileHeader::load(&conn, &user, Some(&viewer))?,
        layout: Layout::new(Some(&viewer), flashes.into_inner()),
        title: "Followers",
        empty_text: "No followers yet.",
        users,
    }))
}

/// GET|POST /users/{id}/likes — messages the user liked
async fn show_likes(
    State(state): State<AppState>,
    viewer: CurrentUser,
    flashes: Flashes,
    Path(id): Path<i64>,
) -> AppResult<Html<LikesTemplate>> {
    let conn = state.db.get()?;
    let user = User::find(&conn, id)?.ok_or(AppError::NotFound)?;
    let messages = message_cards(&conn, Message::liked_by(&conn, user.id)?, Some(&viewer))?;

    Ok(Html(LikesTemplate {
        profile: ProfileHeader::load(&conn, &user, Some(&viewer))?,
        layout: Layout::new(Some(&viewer), flashes.into_inner()),
        messages,
    }))
}

/// POST /users/follow/{id}
async fn follow(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let target = User::find(&conn, id)?.ok_or(AppError::NotFound)?;

    if target.id == current.id() {
        return Ok(flash::found_with(
            &format!("/users/{}", target.id),
            Flash::danger("You cannot follow yourself."),
        ));
    }

    if current.user.follow(&conn, target.id)? {
        tracing::info!("User {} followed {}", current.id(), target.id);
    }
    Ok(flash::found(&format!("/users/{}/following", current.id())))
}

/// POST /users/stop-following/{id}
async fn stop_following(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    if current.user.stop_following(&conn, id)? {
        tracing::info!("User {} stopped following {}", current.id(), id);
    }
    Ok(flash::found(&format!("/users/{}/following", current.id())))
}

/// POST /users/add_like/{message_id}
async fn add_like(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(message_id): Path<i64>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let message = Message::find(&conn, message_id)?.ok_or(AppError::NotFound)?;

    match current.user.like(&conn, &message) {
        Ok(created) => {
            if created {
                tracing::info!("User {} liked message {}", current.id(), message.id);
            }
            Ok(flash::found(&format!("/users/{}/likes", current.id())))
        }
        Err(e @ LikeError::OwnMessage) => Ok(flash::found_with("/", Flash::danger(e.to_string()))),
        Err(e) => Err(e.into()),
    }
}

/// POST /users/remove_like/{message_id}
async fn remove_like(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(message_id): Path<i64>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    if current.user.remove_like(&conn, message_id)? {
        tracing::info!("User {} unliked message {}", current.id(), message_id);
    }
    Ok(flash::found(&format!("/users/{}/likes", current.id())))
}

/// GET /users/profile — edit form
async fn edit_profile(current: CurrentUser, flashes: Flashes) -> Html<EditProfileTemplate> {
    Html(EditProfileTemplate {
        form: ProfileFields::from(&current.user),
        layout: Layout::new(Some(&current), flashes.into_inner()),
    })
}

/// POST /users/profile — apply edits after re-checking the password
async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<ProfileForm>,
) -> AppResult<Response> {
    let username = current.user.username.clone();
    let password = form.password.clone();
    let confirmed = db::with_conn(&state.db, move |conn| {
        User::authenticate(conn, &username, &password)
    })
    .await??
    .is_some_and(|u| u.id == current.id());
    if !confirmed {
        return Ok(flash::found_with("/", Flash::danger("Incorrect password.")));
    }

    let conn = state.db.get()?;

    let update = ProfileUpdate {
        username: form.username,
        email: form.email,
        image_url: form.image_url,
        header_image_url: form.header_image_url,
        bio: form.bio,
        location: form.location,
    };

    match current.user.update_profile(&conn, &update) {
        Ok(user) => {
            tracing::info!("User {} updated their profile", user.id);
            Ok(flash::found_with(
                &format!("/users/{}", user.id),
                Flash::success("Profile updated."),
            ))
        }
        Err(e) if e.is_validation() => Ok(Html(EditProfileTemplate {
            layout: Layout::new(Some(&current), vec![Flash::danger(e.to_string())]),
            form: ProfileFields {
                username: update.username,
                email: update.email,
                image_url: update.image_url.unwrap_or_default(),
                header_image_url: update.header_image_url.unwrap_or_default(),
                bio: update.bio.unwrap_or_default(),
                location: update.location.unwrap_or_default(),
            },
        })
        .into_response()),
        Err(e) => Err(e.into()),
    }
}

/// POST /users/delete — remove the account and log out
async fn delete_user(State(state): State<AppState>, current: CurrentUser) -> AppResult<Response> {
    {
        let conn = state.db.get()?;
        current.user.delete(&conn)?;
    }
    tracing::info!("Deleted user {}", current.user);

    let mut response = flash::found_with("/signup", Flash::info("Your account has been deleted."));
    append_set_cookie(
        &mut response,
        &session::clear_session_cookie(&state.config.auth.cookie_name),
    );
    Ok(response)
}
