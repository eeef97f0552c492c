//! User queries and the follow/like graph.

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior};

use crate::db::models::{
    LikeError, Message, NewUser, ProfileUpdate, SignupError, User, UserStats,
    DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL, MESSAGE_COLUMNS, MIN_PASSWORD_LEN, USER_COLUMNS,
};

/// Trimmed value, or `None` when blank.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl User {
    /// Register a new account with a bcrypt-hashed password.
    ///
    /// Uniqueness is checked under the write lock, so collisions surface as
    /// [`SignupError`] variants instead of constraint failures even when two
    /// signups race for the same name.
    pub fn signup(conn: &Connection, new: &NewUser, bcrypt_cost: u32) -> Result<User, SignupError> {
        let username = new.username.trim();
        let email = new.email.trim();
        validate_identity(username, email)?;
        if new.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(SignupError::PasswordTooShort);
        }

        let hashed = bcrypt::hash(&new.password, bcrypt_cost)?;
        let image_url = non_blank(new.image_url.as_deref()).unwrap_or(DEFAULT_IMAGE_URL);

        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        ensure_available(&tx, username, email, None)?;
        tx.execute(
            "INSERT INTO users (email, username, image_url, password) VALUES (?1, ?2, ?3, ?4)",
            params![email, username, image_url, hashed],
        )
        .map_err(|e| unique_violation(e, username, email))?;
        let user = Self::get(&tx, tx.last_insert_rowid())?;
        tx.commit()?;

        tracing::info!("New user signed up: {}", user);
        Ok(user)
    }

    /// Insert a user row as given, without validation or hashing.
    pub fn create(
        conn: &Connection,
        email: &str,
        username: &str,
        password: &str,
    ) -> rusqlite::Result<User> {
        conn.execute(
            "INSERT INTO users (email, username, password) VALUES (?1, ?2, ?3)",
            params![email, username, password],
        )?;
        Self::get(conn, conn.last_insert_rowid())
    }

    /// The user with `username` if `password` matches their hash.
    pub fn authenticate(
        conn: &Connection,
        username: &str,
        password: &str,
    ) -> rusqlite::Result<Option<User>> {
        let Some(user) = Self::find_by_username(conn, username.trim())? else {
            return Ok(None);
        };

        // A stored value that is not a bcrypt hash never matches
        let valid = bcrypt::verify(password, &user.password).unwrap_or(false);
        Ok(valid.then_some(user))
    }

    pub fn find(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1"),
            params![id],
            User::from_row,
        )
        .optional()
    }

    fn get(conn: &Connection, id: i64) -> rusqlite::Result<User> {
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1"),
            params![id],
            User::from_row,
        )
    }

    pub fn find_by_username(conn: &Connection, username: &str) -> rusqlite::Result<Option<User>> {
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.username = ?1"),
            params![username],
            User::from_row,
        )
        .optional()
    }

    /// Every user, or those whose username contains `search`
    /// (case-insensitive), ordered by username.
    pub fn all(conn: &Connection, search: Option<&str>) -> rusqlite::Result<Vec<User>> {
        match non_blank(search) {
            Some(term) => query_users(
                conn,
                &format!(
                    "SELECT {USER_COLUMNS} FROM users u
                     WHERE u.username LIKE ?1 ESCAPE '\\'
                     ORDER BY u.username"
                ),
                params![like_pattern(term)],
            ),
            None => query_users(
                conn,
                &format!("SELECT {USER_COLUMNS} FROM users u ORDER BY u.username"),
                [],
            ),
        }
    }

    pub fn count(conn: &Connection) -> rusqlite::Result<i64> {
        conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
    }

    /// Messages authored by this user, newest first.
    pub fn messages(&self, conn: &Connection) -> rusqlite::Result<Vec<Message>> {
        query_messages(
            conn,
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages m
                 WHERE m.user_id = ?1
                 ORDER BY m.timestamp DESC, m.id DESC"
            ),
            self.id,
        )
    }

    /// Users this user follows.
    pub fn following(&self, conn: &Connection) -> rusqlite::Result<Vec<User>> {
        query_users(
            conn,
            &format!(
                "SELECT {USER_COLUMNS} FROM follows f
                 JOIN users u ON u.id = f.followed_id
                 WHERE f.follower_id = ?1
                 ORDER BY u.username"
            ),
            params![self.id],
        )
    }

    /// Users following this user.
    pub fn followers(&self, conn: &Connection) -> rusqlite::Result<Vec<User>> {
        query_users(
            conn,
            &format!(
                "SELECT {USER_COLUMNS} FROM follows f
                 JOIN users u ON u.id = f.follower_id
                 WHERE f.followed_id = ?1
                 ORDER BY u.username"
            ),
            params![self.id],
        )
    }

    /// Messages this user has liked, newest first.
    pub fn likes(&self, conn: &Connection) -> rusqlite::Result<Vec<Message>> {
        query_messages(
            conn,
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM likes l
                 JOIN messages m ON m.id = l.message_id
                 WHERE l.user_id = ?1
                 ORDER BY m.timestamp DESC, m.id DESC"
            ),
            self.id,
        )
    }

    pub fn liked_message_ids(&self, conn: &Connection) -> rusqlite::Result<Vec<i64>> {
        let mut stmt = conn.prepare("SELECT message_id FROM likes WHERE user_id = ?1")?;
        let ids = stmt
            .query_map(params![self.id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    pub fn stats(&self, conn: &Connection) -> rusqlite::Result<UserStats> {
        conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM messages WHERE user_id = ?1),
                (SELECT COUNT(*) FROM follows WHERE follower_id = ?1),
                (SELECT COUNT(*) FROM follows WHERE followed_id = ?1),
                (SELECT COUNT(*) FROM likes WHERE user_id = ?1)",
            params![self.id],
            |row| {
                Ok(UserStats {
                    messages: row.get(0)?,
                    following: row.get(1)?,
                    followers: row.get(2)?,
                    likes: row.get(3)?,
                })
            },
        )
    }

    /// Is there a follow edge from this user to `other`?
    pub fn is_following(&self, conn: &Connection, other: &User) -> rusqlite::Result<bool> {
        follow_edge_exists(conn, self.id, other.id)
    }

    /// Is there a follow edge from `other` to this user?
    pub fn is_followed_by(&self, conn: &Connection, other: &User) -> rusqlite::Result<bool> {
        follow_edge_exists(conn, other.id, self.id)
    }

    /// Follow `other_id`. Returns whether a new edge was created; following
    /// an already followed user, or yourself, changes nothing.
    pub fn follow(&self, conn: &Connection, other_id: i64) -> rusqlite::Result<bool> {
        if other_id == self.id {
            return Ok(false);
        }
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO follows (followed_id, follower_id) VALUES (?1, ?2)",
            params![other_id, self.id],
        )?;
        Ok(inserted > 0)
    }

    /// Remove the follow edge to `other_id`. Returns whether one existed.
    pub fn stop_following(&self, conn: &Connection, other_id: i64) -> rusqlite::Result<bool> {
        let deleted = conn.execute(
            "DELETE FROM follows WHERE followed_id = ?1 AND follower_id = ?2",
            params![other_id, self.id],
        )?;
        Ok(deleted > 0)
    }

    /// Like `message`. Liking your own message is refused; liking twice is
    /// a no-op. Returns whether a new like was recorded.
    pub fn like(&self, conn: &Connection, message: &Message) -> Result<bool, LikeError> {
        if message.user_id == self.id {
            return Err(LikeError::OwnMessage);
        }
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO likes (user_id, message_id) VALUES (?1, ?2)",
            params![self.id, message.id],
        )?;
        Ok(inserted > 0)
    }

    /// Remove a like. Returns whether one existed.
    pub fn remove_like(&self, conn: &Connection, message_id: i64) -> rusqlite::Result<bool> {
        let deleted = conn.execute(
            "DELETE FROM likes WHERE user_id = ?1 AND message_id = ?2",
            params![self.id, message_id],
        )?;
        Ok(deleted > 0)
    }

    /// Apply profile edits. Username and email get the same checks as at
    /// signup; blank image URLs fall back to the defaults.
    pub fn update_profile(
        &self,
        conn: &Connection,
        update: &ProfileUpdate,
    ) -> Result<User, SignupError> {
        let username = update.username.trim();
        let email = update.email.trim();
        validate_identity(username, email)?;
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        ensure_available(&tx, username, email, Some(self.id))?;
        tx.execute(
            "UPDATE users
             SET username = ?1, email = ?2, image_url = ?3, header_image_url = ?4,
                 bio = ?5, location = ?6
             WHERE id = ?7",
            params![
                username,
                email,
                non_blank(update.image_url.as_deref()).unwrap_or(DEFAULT_IMAGE_URL),
                non_blank(update.header_image_url.as_deref()).unwrap_or(DEFAULT_HEADER_IMAGE_URL),
                non_blank(update.bio.as_deref()),
                non_blank(update.location.as_deref()),
                self.id,
            ],
        )
        .map_err(|e| unique_violation(e, username, email))?;
        let user = Self::get(&tx, self.id)?;
        tx.commit()?;

        Ok(user)
    }

    /// Delete the account. Messages, follow edges in both directions,
    /// likes and sessions go with it through the schema's cascades.
    pub fn delete(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute("DELETE FROM users WHERE id = ?1", params![self.id])?;
        Ok(())
    }
}

fn validate_identity(username: &str, email: &str) -> Result<(), SignupError> {
    if username.is_empty() {
        return Err(SignupError::EmptyUsername);
    }
    if !email.contains('@') {
        return Err(SignupError::InvalidEmail);
    }
    Ok(())
}

/// Fail if `username` or `email` belongs to someone other than `except`.
fn ensure_available(
    conn: &Connection,
    username: &str,
    email: &str,
    except: Option<i64>,
) -> Result<(), SignupError> {
    let except = except.unwrap_or(-1);

    let username_taken: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE username = ?1 AND id != ?2",
        params![username, except],
        |row| row.get(0),
    )?;
    if username_taken {
        return Err(SignupError::UsernameTaken(username.to_string()));
    }

    let email_taken: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE email = ?1 AND id != ?2",
        params![email, except],
        |row| row.get(0),
    )?;
    if email_taken {
        return Err(SignupError::EmailTaken(email.to_string()));
    }

    Ok(())
}

/// Map a UNIQUE failure on `users` back to the column that collided.
fn unique_violation(err: rusqlite::Error, username: &str, email: &str) -> SignupError {
    if let rusqlite::Error::SqliteFailure(e, Some(msg)) = &err {
        if e.code == ErrorCode::ConstraintViolation {
            if msg.contains("users.username") {
                return SignupError::UsernameTaken(username.to_string());
            }
            if msg.contains("users.email") {
                return SignupError::EmailTaken(email.to_string());
            }
        }
    }
    SignupError::Database(err)
}

fn follow_edge_exists(conn: &Connection, follower: i64, followed: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
        params![follower, followed],
        |row| row.get(0),
    )
}

fn query_users<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> rusqlite::Result<Vec<User>> {
    let mut stmt = conn.prepare(sql)?;
    let users = stmt
        .query_map(params, User::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

fn query_messages(conn: &Connection, sql: &str, user_id: i64) -> rusqlite::Result<Vec<Message>> {
    let mut stmt = conn.prepare(sql)?;
    let messages = stmt
        .query_map(params![user_id], Message::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(messages)
}
