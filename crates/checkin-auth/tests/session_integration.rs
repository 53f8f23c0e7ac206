//! Integration tests for AuthSession against a mocked auth API.

use checkin_auth::{AuthClient, AuthError, AuthSession, Identity, Session, SessionStorage};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER_ID: &str = "0b7e3c52-9a1d-4f6e-8c2b-5d4a3e2f1b0c";

fn token_body(access_token: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": 3600,
        "expires_at": chrono::Utc::now().timestamp() + 3600,
        "refresh_token": "refresh-2",
        "user": { "id": USER_ID, "email": "ada@example.com" }
    })
}

fn provider(server: &MockServer, dir: &std::path::Path) -> AuthSession {
    let client = AuthClient::new(&format!("{}/auth/v1/", server.uri()), "anon-key").unwrap();
    AuthSession::new(client, SessionStorage::new(dir))
}

fn stored_session(expires_at: i64) -> Session {
    Session {
        access_token: "access-1".to_string(),
        refresh_token: "refresh-1".to_string(),
        expires_at,
        user: Identity::new(USER_ID.parse().unwrap(), Some("ada@example.com".to_string())),
    }
}

#[tokio::test]
async fn test_starts_loading_without_identity() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let auth = provider(&mock_server, dir.path());

    assert!(auth.is_loading());
    assert!(auth.identity().is_none());

    assert!(auth.restore().await.is_none());
    assert!(!auth.is_loading());
}

#[tokio::test]
async fn test_sign_in_persists_and_publishes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(header("apikey", "anon-key"))
        .and(body_partial_json(serde_json::json!({ "email": "ada@example.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-1")))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let auth = provider(&mock_server, dir.path());
    let mut rx = auth.subscribe();

    let identity = auth.sign_in("ada@example.com", "hunter2").await.unwrap();
    assert_eq!(identity.id.to_string(), USER_ID);
    assert_eq!(auth.access_token().as_deref(), Some("access-1"));

    rx.changed().await.unwrap();
    assert_eq!(rx.borrow().identity.as_ref().map(|i| i.id), Some(identity.id));
    assert!(SessionStorage::new(dir.path()).has_session());
}

#[tokio::test]
async fn test_sign_in_bad_password() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let auth = provider(&mock_server, dir.path());

    let err = auth.sign_in("ada@example.com", "wrong").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert!(auth.identity().is_none());
}

#[tokio::test]
async fn test_restore_valid_session_without_network() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    SessionStorage::new(dir.path())
        .store(&stored_session(chrono::Utc::now().timestamp() + 3600))
        .unwrap();

    let auth = provider(&mock_server, dir.path());
    let identity = auth.restore().await.unwrap();

    assert_eq!(identity.display_name(), "ada");
    assert_eq!(auth.access_token().as_deref(), Some("access-1"));
}

#[tokio::test]
async fn test_restore_refreshes_expiring_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_partial_json(serde_json::json!({ "refresh_token": "refresh-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-2")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let storage = SessionStorage::new(dir.path());
    storage
        .store(&stored_session(chrono::Utc::now().timestamp() + 60))
        .unwrap();

    let auth = provider(&mock_server, dir.path());
    assert!(auth.restore().await.is_some());
    assert_eq!(auth.access_token().as_deref(), Some("access-2"));
    assert_eq!(storage.load().unwrap().unwrap().refresh_token, "refresh-2");
}

#[tokio::test]
async fn test_restore_drops_revoked_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Invalid Refresh Token: Refresh Token Not Found"
        })))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let storage = SessionStorage::new(dir.path());
    storage
        .store(&stored_session(chrono::Utc::now().timestamp() - 10))
        .unwrap();

    let auth = provider(&mock_server, dir.path());
    assert!(auth.restore().await.is_none());
    assert!(!storage.has_session());
}

#[tokio::test]
async fn test_sign_out_clears_even_when_remote_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let storage = SessionStorage::new(dir.path());
    storage
        .store(&stored_session(chrono::Utc::now().timestamp() + 3600))
        .unwrap();

    let auth = provider(&mock_server, dir.path());
    auth.restore().await.unwrap();

    auth.sign_out().await.unwrap();
    assert!(auth.identity().is_none());
    assert!(auth.access_token().is_none());
    assert!(!storage.has_session());
}

#[tokio::test]
async fn test_identity_is_opaque_uuid() {
    let identity = Identity::new(Uuid::new_v4(), None);
    assert_eq!(identity.display_name(), "Anonymous");
}
