use axum::extract::{Extension, Json};
use axum::http::{header, HeaderMap, StatusCode};

use crate::auth::SignupForm;
use crate::entities::{AuthSession, Credentials, User};
use crate::error::{authentication_error, Error};
use crate::server::DynAPI;

/// The token from an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Result<&str, Error> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| authentication_error("Missing bearer token".into()))
}

pub async fn login(
    Extension(api): Extension<DynAPI>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<AuthSession>, Error> {
    let session = api.login(credentials).await?;

    Ok(session.into())
}

pub async fn register(
    Extension(api): Extension<DynAPI>,
    Json(form): Json<SignupForm>,
) -> Result<Json<User>, Error> {
    let registration = form.validate()?;
    let user = api.register(registration).await?;

    Ok(user.into())
}

pub async fn logout(
    Extension(api): Extension<DynAPI>,
    headers: HeaderMap,
) -> Result<StatusCode, Error> {
    api.logout(bearer_token(&headers)?).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(
    Extension(api): Extension<DynAPI>,
    headers: HeaderMap,
) -> Result<Json<Option<User>>, Error> {
    let user = api.current_user(bearer_token(&headers)?).await?;

    Ok(user.into())
}

#[test]
fn bearer_token_test() {
    use axum::http::HeaderValue;

    let mut headers = HeaderMap::new();
    assert_eq!(bearer_token(&headers).unwrap_err().code, 104);

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
    assert!(bearer_token(&headers).is_err());

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
    assert!(bearer_token(&headers).is_err());

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer token-a"));
    assert_eq!(bearer_token(&headers).unwrap(), "token-a");
}
