use clinic_booking_auth::{Auth, AuthError, AuthOptions};
use reqwest::Client;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session_json() -> serde_json::Value {
    json!({
        "access_token": "test_access_token",
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": "test_refresh_token",
        "user": {
            "id": "test_user_id",
            "email": "test@example.com",
            "user_metadata": { "first_name": "Grace", "last_name": "Hopper" }
        }
    })
}

#[tokio::test]
async fn sign_in_then_get_user() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json()))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("Authorization", "Bearer test_access_token"))
        .and(header("apikey", "test_anon_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "test_user_id",
            "email": "test@example.com",
            "user_metadata": { "first_name": "Grace", "last_name": "Hopper" }
        })))
        .mount(&mock_server)
        .await;

    let auth = Auth::new(
        &mock_server.uri(),
        "test_anon_key",
        Client::new(),
        AuthOptions::default(),
    );

    auth.sign_in_with_password("test@example.com", "Password1")
        .await
        .unwrap();
    let user = auth.get_user().await.unwrap();

    assert_eq!(user.id, "test_user_id");
    assert_eq!(user.metadata_str("last_name"), Some("Hopper"));
}

#[tokio::test]
async fn get_user_without_session() {
    let auth = Auth::new(
        "http://localhost:9",
        "test_anon_key",
        Client::new(),
        AuthOptions::default(),
    );

    let result = auth.get_user().await;
    assert!(matches!(result, Err(AuthError::MissingSession)));
}

#[tokio::test]
async fn sign_up_with_session_keeps_it() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json()))
        .mount(&mock_server)
        .await;

    let auth = Auth::new(
        &mock_server.uri(),
        "test_anon_key",
        Client::new(),
        AuthOptions::default(),
    );

    let user = auth
        .sign_up("test@example.com", "Password1", None)
        .await
        .unwrap();

    assert_eq!(user.id, "test_user_id");
    assert!(auth.get_session().is_some());
}

#[tokio::test]
async fn session_not_kept_when_persistence_is_off() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json()))
        .mount(&mock_server)
        .await;

    let options = AuthOptions {
        persist_session: false,
        ..Default::default()
    };
    let auth = Auth::new(&mock_server.uri(), "test_anon_key", Client::new(), options);

    let session = auth
        .sign_in_with_password("test@example.com", "Password1")
        .await
        .unwrap();

    assert_eq!(session.user.email.as_deref(), Some("test@example.com"));
    assert!(auth.get_session().is_none());
}
