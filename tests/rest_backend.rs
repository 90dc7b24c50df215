//! `RestBackend` request shapes and error mapping against a mock server.

use quickchat::client::backend::{Backend, RestBackend};
use quickchat::client::config::BackendConfig;
use quickchat::common::error::ChatError;
use quickchat::common::models::*;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ANON: &str = "anon-key";

fn backend(server: &MockServer) -> RestBackend {
    RestBackend::new(BackendConfig::new(server.uri(), ANON)).unwrap()
}

fn user_json(id: Uuid) -> serde_json::Value {
    json!({
        "id": id,
        "display_name": "Alice",
        "avatar_url": null,
        "color": "#667eea",
        "friend_code": "ABC234"
    })
}

#[tokio::test]
async fn anonymous_reads_use_the_anon_key() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", id)))
        .and(query_param("limit", "1"))
        .and(header("apikey", ANON))
        .and(header("authorization", format!("Bearer {}", ANON).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([user_json(id)])))
        .expect(1)
        .mount(&server)
        .await;

    let user = backend(&server).fetch_user(id).await.unwrap();
    assert_eq!(user.friend_code, "ABC234");
}

#[tokio::test]
async fn sign_in_token_is_used_afterwards() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(body_json(json!({ "email": "a@b.c", "password": "secret1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "user-token",
            "user": { "id": id, "email": "a@b.c" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(header("authorization", "Bearer user-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([user_json(id)])))
        .expect(1)
        .mount(&server)
        .await;

    let rest = backend(&server);
    let auth = rest.sign_in("a@b.c", "secret1").await.unwrap();
    assert_eq!(auth.user_id, id);
    assert_eq!(auth.email.as_deref(), Some("a@b.c"));
    rest.fetch_user(id).await.unwrap();
}

#[tokio::test]
async fn sign_up_without_session_asks_for_confirmation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": Uuid::new_v4() })))
        .mount(&server)
        .await;

    let err = backend(&server).sign_up("a@b.c", "secret1").await.unwrap_err();
    assert!(matches!(err, ChatError::Validation(ref m) if m.contains("confirm your email")));
}

#[tokio::test]
async fn bad_credentials_keep_the_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .mount(&server)
        .await;

    let err = backend(&server).sign_in("a@b.c", "wrong").await.unwrap_err();
    match err {
        ChatError::Backend { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid login credentials");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn unique_violations_become_conflicts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/group_members"))
        .and(header("prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/groups"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "23505",
            "message": "groups_group_code_key"
        })))
        .mount(&server)
        .await;

    let rest = backend(&server);
    let err = rest.insert_member(Uuid::new_v4(), Uuid::new_v4(), Role::Admin).await.unwrap_err();
    assert!(matches!(err, ChatError::Conflict(_)));
    let err = rest
        .insert_group(&NewGroup {
            name: "g".into(),
            description: String::new(),
            group_code: "ABC234".into(),
            color: "#112233".into(),
            created_by: Uuid::new_v4(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Conflict(ref m) if m == "groups_group_code_key"));
}

#[tokio::test]
async fn direct_history_filters_the_pair() {
    let server = MockServer::start().await;
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let pair = format!("(and(sender_id.eq.{a},receiver_id.eq.{b}),and(sender_id.eq.{b},receiver_id.eq.{a}))");
    Mock::given(method("GET"))
        .and(path("/rest/v1/messages"))
        .and(query_param("or", pair.as_str()))
        .and(query_param("group_id", "is.null"))
        .and(query_param("order", "created_at.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "sender_id": b,
            "receiver_id": a,
            "group_id": null,
            "message_type": "text",
            "content": "ciao",
            "image_url": null,
            "created_at": "2024-05-01T10:00:00Z",
            "sender": null
        }])))
        .mount(&server)
        .await;

    let history = backend(&server).direct_history(a, b).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].row.text(), "ciao");
    // a missing profile falls back to a placeholder
    assert_eq!(history[0].sender.display_name, "Unknown");
    assert_eq!(history[0].sender.id, b);
}

#[tokio::test]
async fn uploads_go_to_the_bucket_without_upsert() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/chat-images/u1/photo.png"))
        .and(header("x-upsert", "false"))
        .and(header("content-type", "image/png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "chat-images/u1/photo.png" })))
        .expect(1)
        .mount(&server)
        .await;

    let rest = backend(&server);
    rest.upload_object("u1/photo.png", vec![1, 2, 3], "image/png").await.unwrap();
    assert_eq!(
        rest.public_url("u1/photo.png"),
        format!("{}/storage/v1/object/public/chat-images/u1/photo.png", server.uri())
    );
}

#[tokio::test]
async fn credentials_go_through_the_procedure() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/update_user_api_keys"))
        .and(body_json(json!({ "user_id": id, "gemini_key": "sealed", "openai_key": null })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let creds = StoredCredentials {
        gemini_api_key: Some("sealed".into()),
        ..Default::default()
    };
    backend(&server).update_credentials(id, &creds).await.unwrap();
}

#[tokio::test]
async fn server_errors_carry_status() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/groups"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "boom" })))
        .mount(&server)
        .await;

    let err = backend(&server).delete_group(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.to_string(), "Backend error (500): boom");
}
