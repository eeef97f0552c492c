use std::fmt;

use rusqlite::Row;

pub const DEFAULT_IMAGE_URL: &str = "/static/images/default-pic.svg";
pub const DEFAULT_HEADER_IMAGE_URL: &str = "/static/images/warbler-hero.svg";

/// Longest message the schema accepts, in characters.
pub const MAX_MESSAGE_LEN: usize = 140;
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    /// bcrypt hash
    pub password: String,
}

pub(crate) const USER_COLUMNS: &str =
    "u.id, u.email, u.username, u.image_url, u.header_image_url, u.bio, u.location, u.password";

impl User {
    /// Build from a row selected with [`USER_COLUMNS`].
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            username: row.get(2)?,
            image_url: row.get(3)?,
            header_image_url: row.get(4)?,
            bio: row.get(5)?,
            location: row.get(6)?,
            password: row.get(7)?,
        })
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<User #{}: {}, {}>", self.id, self.username, self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: i64,
    pub text: String,
    /// `YYYY-MM-DD HH:MM:SS`, UTC
    pub timestamp: String,
    pub user_id: i64,
}

pub(crate) const MESSAGE_COLUMNS: &str = "m.id, m.text, m.timestamp, m.user_id";

impl Message {
    /// Build from a row selected with [`MESSAGE_COLUMNS`].
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Message {
            id: row.get(0)?,
            text: row.get(1)?,
            timestamp: row.get(2)?,
            user_id: row.get(3)?,
        })
    }
}

/// A message joined with the author fields a message card shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoredMessage {
    pub message: Message,
    pub username: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: String,
    pub email: String,
    pub image_url: Option<String>,
    pub header_image_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub messages: i64,
    pub following: i64,
    pub followers: i64,
    pub likes: i64,
}

/// Rejections from signup and profile edits. The display text is shown to
/// the user as is.
#[derive(Debug, thiserror::Error)]
pub enum SignupError {
    #[error("Username cannot be empty")]
    EmptyUsername,

    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("Email '{0}' is already registered")]
    EmailTaken(String),

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Password must be at least 6 characters")]
    PasswordTooShort,

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Hash(#[from] bcrypt::BcryptError),
}

impl SignupError {
    /// True for rejections the user can fix by editing the form.
    pub fn is_validation(&self) -> bool {
        !matches!(self, SignupError::Database(_) | SignupError::Hash(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LikeError {
    #[error("You cannot like your own post")]
    OwnMessage,

    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Message cannot be empty")]
    Empty,

    #[error("Messages are limited to 140 characters")]
    TooLong,

    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

impl MessageError {
    pub fn is_validation(&self) -> bool {
        !matches!(self, MessageError::Database(_))
    }
}
