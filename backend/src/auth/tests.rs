use super::*;
use crate::axum_http::error_responses::ApiErrorCode;
use axum::http::{HeaderValue, header::AUTHORIZATION};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;

const SECRET: &str = "supersecretjwtsecretforunittesting123";
const USER_ID: &str = "123e4567-e89b-12d3-a456-426614174000";

fn token(secret: &str, aud: &str, role: &str, exp: usize, app_role: Option<&str>) -> String {
    let claims = json!({
        "sub": USER_ID,
        "aud": aud,
        "role": role,
        "email": "test@example.com",
        "exp": exp,
        "app_metadata": { "role": app_role },
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[test]
fn test_validate_session_jwt_success() {
    let jwt = token(SECRET, "authenticated", "authenticated", 9999999999, None);

    let claims = validate_session_jwt(&jwt, SECRET).expect("Valid token should pass");
    assert_eq!(claims.sub, USER_ID);
    assert_eq!(claims.email.as_deref(), Some("test@example.com"));
}

#[test]
fn test_validate_session_jwt_expired() {
    let jwt = token(SECRET, "authenticated", "authenticated", 1, None);

    let err = validate_session_jwt(&jwt, SECRET).unwrap_err();
    assert_eq!(err.code, ApiErrorCode::Unauthorized);
}

#[test]
fn test_validate_session_jwt_invalid_signature() {
    let jwt = token("wrongsecret", "authenticated", "authenticated", 9999999999, None);

    assert!(validate_session_jwt(&jwt, SECRET).is_err());
}

#[test]
fn test_validate_session_jwt_wrong_audience() {
    let jwt = token(SECRET, "anon", "anon", 9999999999, None);

    assert!(validate_session_jwt(&jwt, SECRET).is_err());
}

#[test]
fn test_verifier_resolves_admin_roles() {
    let verifier = SessionVerifier::new(SECRET.to_string());

    let service = verifier
        .verify(&token(SECRET, "service_role", "service_role", 9999999999, None))
        .unwrap();
    assert!(service.is_admin());

    let app_admin = verifier
        .verify(&token(SECRET, "authenticated", "authenticated", 9999999999, Some("admin")))
        .unwrap();
    assert!(app_admin.is_admin());
    assert_eq!(app_admin.user_id.to_string(), USER_ID);

    let regular = verifier
        .verify(&token(SECRET, "authenticated", "authenticated", 9999999999, None))
        .unwrap();
    assert!(!regular.is_admin());
}

#[test]
fn test_bearer_token_parsing() {
    let mut headers = HeaderMap::new();
    assert!(bearer_token(&headers).is_err());

    headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
    assert!(bearer_token(&headers).is_err());

    headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer sk_abc"));
    assert_eq!(bearer_token(&headers).unwrap(), "sk_abc");
}
