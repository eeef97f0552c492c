use rand::Rng;
use rusqlite::{params, Connection};

/// Create a new session for a user. Returns the session token.
pub fn create_session(conn: &Connection, user_id: i64, hours: u64) -> Result<String, rusqlite::Error> {
    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Delete a session by token.
pub fn delete_session(conn: &Connection, token: &str) -> Result<(), rusqlite::Error> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Drop sessions past their expiry. Returns how many were removed.
pub fn purge_expired(conn: &Connection) -> Result<usize, rusqlite::Error> {
    conn.execute(
        "DELETE FROM sessions WHERE expires_at <= datetime('now')",
        [],
    )
}

pub fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

pub fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", name)
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::User;
    use crate::db::test_pool;

    fn session_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
    }

    #[test]
    fn create_and_delete_session() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let user = User::create(&conn, "a@test.com", "a", "x").unwrap();

        let token = create_session(&conn, user.id, 1).unwrap();
        assert_eq!(session_count(&conn), 1);

        delete_session(&conn, &token).unwrap();
        assert_eq!(session_count(&conn), 0);
    }

    #[test]
    fn purge_expired_keeps_live_sessions() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let user = User::create(&conn, "a@test.com", "a", "x").unwrap();

        create_session(&conn, user.id, 1).unwrap();
        create_session(&conn, user.id, 0).unwrap();

        assert_eq!(purge_expired(&conn).unwrap(), 1);
        assert_eq!(session_count(&conn), 1);
    }

    #[test]
    fn sessions_removed_with_user() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let user = User::create(&conn, "a@test.com", "a", "x").unwrap();
        create_session(&conn, user.id, 1).unwrap();

        user.delete(&conn).unwrap();
        assert_eq!(session_count(&conn), 0);
    }

    #[test]
    fn cookies_carry_name_and_lifetime() {
        let set = session_cookie("warbler_session", "abc", 2);
        assert!(set.starts_with("warbler_session=abc;"));
        assert!(set.contains("Max-Age=7200"));
        assert!(set.contains("HttpOnly"));

        let clear = clear_session_cookie("warbler_session");
        assert!(clear.starts_with("warbler_session=;"));
        assert!(clear.ends_with("Max-Age=0"));
    }
}
