use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{AuthoredMessage, Message, MessageError, User, MAX_MESSAGE_LEN, MESSAGE_COLUMNS};

impl Message {
    /// Post `text` as `user_id`. Fails with a database error if the user
    /// does not exist.
    pub fn create(conn: &Connection, user_id: i64, text: &str) -> Result<Message, MessageError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(MessageError::Empty);
        }
        if text.chars().count() > MAX_MESSAGE_LEN {
            return Err(MessageError::TooLong);
        }

        conn.execute(
            "INSERT INTO messages (text, user_id) VALUES (?1, ?2)",
            params![text, user_id],
        )?;

        let id = conn.last_insert_rowid();
        Ok(conn.query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.id = ?1"),
            params![id],
            Message::from_row,
        )?)
    }

    pub fn find(conn: &Connection, id: i64) -> rusqlite::Result<Option<Message>> {
        conn.query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.id = ?1"),
            params![id],
            Message::from_row,
        )
        .optional()
    }

    /// The author. Always present while the foreign key holds.
    pub fn user(&self, conn: &Connection) -> rusqlite::Result<User> {
        User::find(conn, self.user_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    pub fn delete(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute("DELETE FROM messages WHERE id = ?1", params![self.id])?;
        Ok(())
    }

    /// Home timeline for `user_id`: their own messages and those of everyone
    /// they follow, newest first.
    pub fn timeline(
        conn: &Connection,
        user_id: i64,
        limit: u32,
    ) -> rusqlite::Result<Vec<AuthoredMessage>> {
        query_authored(
            conn,
            "WHERE m.user_id = ?1
                OR m.user_id IN (SELECT followed_id FROM follows WHERE follower_id = ?1)
             ORDER BY m.timestamp DESC, m.id DESC
             LIMIT ?2",
            params![user_id, limit],
        )
    }

    /// Messages written by `user_id`, newest first.
    pub fn by_user(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<AuthoredMessage>> {
        query_authored(
            conn,
            "WHERE m.user_id = ?1 ORDER BY m.timestamp DESC, m.id DESC",
            params![user_id],
        )
    }

    /// Messages liked by `user_id`, newest first.
    pub fn liked_by(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<AuthoredMessage>> {
        query_authored(
            conn,
            "WHERE m.id IN (SELECT message_id FROM likes WHERE user_id = ?1)
             ORDER BY m.timestamp DESC, m.id DESC",
            params![user_id],
        )
    }

    pub fn find_authored(conn: &Connection, id: i64) -> rusqlite::Result<Option<AuthoredMessage>> {
        Ok(query_authored(conn, "WHERE m.id = ?1", params![id])?
            .into_iter()
            .next())
    }
}

fn query_authored<P: rusqlite::Params>(
    conn: &Connection,
    filter: &str,
    params: P,
) -> rusqlite::Result<Vec<AuthoredMessage>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS}, u.username, u.image_url
         FROM messages m
         JOIN users u ON u.id = m.user_id
         {filter}"
    ))?;

    let messages = stmt
        .query_map(params, |row| {
            Ok(AuthoredMessage {
                message: Message::from_row(row)?,
                username: row.get(4)?,
                image_url: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(messages)
}
