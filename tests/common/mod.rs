//! Shared harness: a real server on an ephemeral port backed by a temp
//! database, plus a cookie-keeping client that follows redirects only when
//! asked to.
#![allow(dead_code)]

use reqwest::{Client, Response, StatusCode};
use tempfile::TempDir;

use warbler::config::Config;
use warbler::db;
use warbler::db::models::{Message, User};
use warbler::routes;
use warbler::state::{AppState, DbPool};

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub base_url: String,
    pub pool: DbPool,
    _temp_dir: TempDir,
}

pub async fn spawn_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("warbler-test.db");
    let pool = db::create_pool(&db_path).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");

    let mut config = Config::default();
    config.database.path = Some(db_path);
    config.auth.bcrypt_cost = 4;

    let state = AppState {
        db: pool.clone(),
        config,
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, routes::app(state)).await.unwrap();
    });

    TestApp {
        base_url: format!("http://{}", addr),
        pool,
        _temp_dir: temp_dir,
    }
}

impl TestApp {
    pub fn client(&self) -> TestClient {
        TestClient {
            client: Client::builder()
                .cookie_store(true)
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .unwrap(),
            base_url: self.base_url.clone(),
        }
    }

    pub fn user(&self, username: &str) -> Option<User> {
        let conn = self.pool.get().unwrap();
        User::find_by_username(&conn, username).unwrap()
    }

    /// Insert a user directly, bypassing signup.
    pub fn add_user(&self) -> User {
        let conn = self.pool.get().unwrap();
        User::create(&conn, "testing@test.com", "testuser", "HASHED_PASSWORD").unwrap()
    }

    pub fn add_message(&self, user_id: i64) -> Message {
        let conn = self.pool.get().unwrap();
        Message::create(&conn, user_id, "test message").unwrap()
    }

    /// Sign up testuser1 and testuser2 from `client`, then log in as
    /// testuser1.
    pub async fn sign_up_users_login(&self, client: &TestClient) -> (User, User) {
        for (username, email) in [("testuser1", "test@test.com"), ("testuser2", "test2@test.com")] {
            let signup = client
                .post(
                    "/signup",
                    &[
                        ("username", username),
                        ("password", PASSWORD),
                        ("email", email),
                        ("image_url", ""),
                    ],
                )
                .await;
            assert_eq!(signup.status(), StatusCode::FOUND, "signup {username}");
        }

        let login = client
            .post("/login", &[("username", "testuser1"), ("password", PASSWORD)])
            .await;
        assert_eq!(login.status(), StatusCode::FOUND);

        (
            self.user("testuser1").expect("testuser1 exists"),
            self.user("testuser2").expect("testuser2 exists"),
        )
    }

    pub fn session_count(&self) -> i64 {
        let conn = self.pool.get().unwrap();
        conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap()
    }
}

pub struct TestClient {
    client: Client,
    base_url: String,
}

impl TestClient {
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap()
    }

    pub async fn post(&self, path: &str, form: &[(&str, &str)]) -> Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .form(form)
            .send()
            .await
            .unwrap()
    }

    /// GET `path`, following redirects; returns the final status and body.
    pub async fn get_follow(&self, path: &str) -> (StatusCode, String) {
        let response = self.get(path).await;
        self.follow(response).await
    }

    /// POST `form` to `path`, following redirects; returns the final status
    /// and body.
    pub async fn post_follow(&self, path: &str, form: &[(&str, &str)]) -> (StatusCode, String) {
        let response = self.post(path, form).await;
        self.follow(response).await
    }

    async fn follow(&self, mut response: Response) -> (StatusCode, String) {
        for _ in 0..10 {
            if !response.status().is_redirection() {
                break;
            }
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .expect("redirect without Location")
                .to_string();
            response = self.get(&location).await;
        }
        let status = response.status();
        (status, response.text().await.unwrap())
    }
}
