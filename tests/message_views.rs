//! Posting, viewing and deleting messages over HTTP.

mod common;

use common::spawn_app;
use reqwest::StatusCode;
use warbler::db::models::Message;

#[tokio::test]
async fn new_message_form_renders() {
    let app = spawn_app().await;
    let client = app.client();
    app.sign_up_users_login(&client).await;

    let response = client.get("/messages/new").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn post_message_shows_on_profile_and_timeline() {
    let app = spawn_app().await;
    let client = app.client();
    let (user1, _) = app.sign_up_users_login(&client).await;

    let response = client
        .post("/messages/new", &[("text", "Hello warblers")])
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[reqwest::header::LOCATION],
        format!("/users/{}", user1.id).as_str()
    );

    let (_, profile) = client.get_follow(&format!("/users/{}", user1.id)).await;
    assert!(profile.contains("Hello warblers"));

    let (_, home) = client.get_follow("/").await;
    assert!(home.contains("Hello warblers"));
}

#[tokio::test]
async fn timeline_includes_followed_users_only() {
    let app = spawn_app().await;
    let client = app.client();
    let (_, user2) = app.sign_up_users_login(&client).await;
    let stranger = app.add_user();
    {
        let conn = app.pool.get().unwrap();
        Message::create(&conn, user2.id, "from a friend").unwrap();
        Message::create(&conn, stranger.id, "from a stranger").unwrap();
    }

    let (_, home) = client.get_follow("/").await;
    assert!(!home.contains("from a friend"));

    client.post(&format!("/users/follow/{}", user2.id), &[]).await;

    let (_, home) = client.get_follow("/").await;
    assert!(home.contains("from a friend"));
    assert!(!home.contains("from a stranger"));
}

#[tokio::test]
async fn overlong_message_is_rejected() {
    let app = spawn_app().await;
    let client = app.client();
    let (user1, _) = app.sign_up_users_login(&client).await;

    let text = "x".repeat(141);
    let response = client.post("/messages/new", &[("text", text.as_str())]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .text()
        .await
        .unwrap()
        .contains("Messages are limited to 140 characters"));

    let conn = app.pool.get().unwrap();
    assert!(user1.messages(&conn).unwrap().is_empty());
}

#[tokio::test]
async fn show_message_is_public() {
    let app = spawn_app().await;
    let user = app.add_user();
    let message = app.add_message(user.id);

    let anon = app.client();
    let (status, body) = anon.get_follow(&format!("/messages/{}", message.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("test message"));
    assert!(body.contains("@testuser"));

    let response = anon.get("/messages/9999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn author_can_delete_message() {
    let app = spawn_app().await;
    let client = app.client();
    let (user1, _) = app.sign_up_users_login(&client).await;
    let message = app.add_message(user1.id);

    let response = client
        .post(&format!("/messages/{}/delete", message.id), &[])
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let conn = app.pool.get().unwrap();
    assert!(Message::find(&conn, message.id).unwrap().is_none());
}

#[tokio::test]
async fn others_cannot_delete_message() {
    let app = spawn_app().await;
    let client = app.client();
    let (_, user2) = app.sign_up_users_login(&client).await;
    let message = app.add_message(user2.id);

    let (status, body) = client
        .post_follow(&format!("/messages/{}/delete", message.id), &[])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Access unauthorized."));

    let conn = app.pool.get().unwrap();
    assert!(Message::find(&conn, message.id).unwrap().is_some());
}

#[tokio::test]
async fn deleting_user_removes_their_messages() {
    let app = spawn_app().await;
    let client = app.client();
    let (user1, _) = app.sign_up_users_login(&client).await;
    let message = app.add_message(user1.id);

    client.post("/users/delete", &[]).await;

    let conn = app.pool.get().unwrap();
    assert!(Message::find(&conn, message.id).unwrap().is_none());
}
