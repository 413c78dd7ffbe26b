use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
};
use seeksy_gate::{
    AppState, InMemoryRepository,
    auth::{AuthUser, Claims, Session},
    config::{AppConfig, Env},
    models::{Capability, PrimaryRole},
    pipeline::RouteTable,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{sync::Arc, time::SystemTime};
use uuid::Uuid;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const TEST_USER_ID: Uuid = Uuid::from_u128(1);

fn create_token(user_id: Uuid, secret: &str, exp_offset: i64) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };

    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

fn create_app_state(env: Env, repo: InMemoryRepository) -> AppState {
    let config = AppConfig {
        env,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };
    AppState::new(Arc::new(repo), config, RouteTable::default())
}

fn known_user_repo() -> InMemoryRepository {
    InMemoryRepository::new().with_user(TEST_USER_ID, Some(PrimaryRole::Creator), &[])
}

fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_bearer(parts: &mut Parts, token: &str) {
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
}

// --- Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let app_state = create_app_state(Env::Production, known_user_repo());
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &create_token(TEST_USER_ID, TEST_JWT_SECRET, 3600));

    let user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .expect("valid token should authenticate");

    assert_eq!(user.id, TEST_USER_ID);
    assert_eq!(user.email, format!("{}@seeksy.test", TEST_USER_ID.simple()));
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let app_state = create_app_state(Env::Production, known_user_repo());
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    let app_state = create_app_state(Env::Production, known_user_repo());
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    // Well past the default 60s leeway.
    with_bearer(&mut parts, &create_token(TEST_USER_ID, TEST_JWT_SECRET, -3600));

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_wrong_secret() {
    let app_state = create_app_state(Env::Production, known_user_repo());
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &create_token(TEST_USER_ID, "some-other-secret", 3600));

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_for_unknown_profile() {
    let app_state = create_app_state(Env::Production, InMemoryRepository::new());
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &create_token(TEST_USER_ID, TEST_JWT_SECRET, 3600));

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_local_bypass_success() {
    let local_id = Uuid::new_v4();
    let repo = InMemoryRepository::new().with_user(local_id, None, &[Capability::Admin]);
    let app_state = create_app_state(Env::Local, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(&local_id.to_string()).unwrap(),
    );

    let user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .expect("local bypass should authenticate a known user");
    assert_eq!(user.id, local_id);
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let local_id = Uuid::new_v4();
    let repo = InMemoryRepository::new().with_user(local_id, None, &[]);
    let app_state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(&local_id.to_string()).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_is_anonymous_without_credentials() {
    let app_state = create_app_state(Env::Production, known_user_repo());
    let mut parts = get_request_parts(Method::POST, "/gate/evaluate".parse().unwrap());
    with_bearer(&mut parts, "not-a-jwt");

    let session = Session::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();

    assert!(session.user.is_none());
    assert_eq!(session.user_id(), None);
}

#[tokio::test]
async fn test_session_carries_authenticated_user() {
    let app_state = create_app_state(Env::Production, known_user_repo());
    let mut parts = get_request_parts(Method::POST, "/gate/evaluate".parse().unwrap());
    with_bearer(&mut parts, &create_token(TEST_USER_ID, TEST_JWT_SECRET, 3600));

    let session = Session::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();

    assert_eq!(session.user_id(), Some(TEST_USER_ID));
}
