//! View structs shared by the page templates.

use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;

use crate::db::models::{AuthoredMessage, User, UserStats};
use crate::extractors::CurrentUser;
use crate::flash::Flash;

/// Everything `base.html` needs: the nav bar user and pending flashes.
pub struct Layout {
    pub current_user: Option<NavUser>,
    pub flashes: Vec<Flash>,
}

pub struct NavUser {
    pub id: i64,
    pub username: String,
    pub image_url: String,
}

impl Layout {
    pub fn new(current: Option<&CurrentUser>, flashes: Vec<Flash>) -> Self {
        Self {
            current_user: current.map(|c| NavUser {
                id: c.user.id,
                username: c.user.username.clone(),
                image_url: c.user.image_url.clone(),
            }),
            flashes,
        }
    }
}

pub struct MessageCard {
    pub id: i64,
    pub text: String,
    pub timestamp: String,
    pub author_id: i64,
    pub author_username: String,
    pub author_image_url: String,
    /// Viewer may like or unlike this message
    pub can_like: bool,
    pub liked: bool,
    /// Viewer wrote this message
    pub own: bool,
}

/// Build cards for `viewer`, marking which messages they have liked.
pub fn message_cards(
    conn: &Connection,
    messages: Vec<AuthoredMessage>,
    viewer: Option<&CurrentUser>,
) -> rusqlite::Result<Vec<MessageCard>> {
    let liked = match viewer {
        Some(v) => v.user.liked_message_ids(conn)?,
        None => Vec::new(),
    };
    let viewer_id = viewer.map(|v| v.user.id);

    Ok(messages
        .into_iter()
        .map(|m| {
            let own = viewer_id == Some(m.message.user_id);
            MessageCard {
                id: m.message.id,
                liked: liked.contains(&m.message.id),
                can_like: viewer_id.is_some() && !own,
                own,
                text: m.message.text,
                timestamp: parse_and_format_time(&m.message.timestamp),
                author_id: m.message.user_id,
                author_username: m.username,
                author_image_url: m.image_url,
            }
        })
        .collect())
}

pub struct UserCard {
    pub id: i64,
    pub username: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: String,
    /// Viewer is logged in and this is someone else
    pub can_follow: bool,
    pub is_following: bool,
}

pub fn user_cards(
    conn: &Connection,
    users: Vec<User>,
    viewer: Option<&CurrentUser>,
) -> rusqlite::Result<Vec<UserCard>> {
    let following: Vec<i64> = match viewer {
        Some(v) => v.user.following(conn)?.into_iter().map(|u| u.id).collect(),
        None => Vec::new(),
    };
    let viewer_id = viewer.map(|v| v.user.id);

    Ok(users
        .into_iter()
        .map(|u| UserCard {
            can_follow: viewer_id.is_some() && viewer_id != Some(u.id),
            is_following: following.contains(&u.id),
            id: u.id,
            username: u.username,
            image_url: u.image_url,
            header_image_url: u.header_image_url,
            bio: u.bio.unwrap_or_default(),
        })
        .collect())
}

/// Profile banner shown above a user's messages, follows and likes.
pub struct ProfileHeader {
    pub id: i64,
    pub username: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: String,
    pub location: String,
    pub stats: UserStats,
    pub logged_in: bool,
    pub is_self: bool,
    pub is_following: bool,
}

impl ProfileHeader {
    pub fn load(
        conn: &Connection,
        user: &User,
        viewer: Option<&CurrentUser>,
    ) -> rusqlite::Result<Self> {
        let is_following = match viewer {
            Some(v) => v.user.is_following(conn, user)?,
            None => false,
        };

        Ok(Self {
            id: user.id,
            username: user.username.clone(),
            image_url: user.image_url.clone(),
            header_image_url: user.header_image_url.clone(),
            bio: user.bio.clone().unwrap_or_default(),
            location: user.location.clone().unwrap_or_default(),
            stats: user.stats(conn)?,
            logged_in: viewer.is_some(),
            is_self: viewer.map(|v| v.user.id) == Some(user.id),
            is_following,
        })
    }
}

// --- Time formatting ---

pub fn parse_and_format_time(db_time: &str) -> String {
    NaiveDateTime::parse_from_str(db_time, "%Y-%m-%d %H:%M:%S")
        .map(|dt| format_relative_time(&dt))
        .unwrap_or_else(|_| db_time.to_string())
}

pub fn format_relative_time(dt: &NaiveDateTime) -> String {
    let now = Utc::now().naive_utc();
    let diff = now.signed_duration_since(*dt);

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }

    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }

    dt.format("%d %B %Y").to_string()
}
