use axum::{
    extract::{Json, State, rejection::JsonRejection},
    http::StatusCode,
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use super::{ApiError, AppState};
use crate::auth::{Credentials, REFRESH_COOKIE_NAME, REFRESH_COOKIE_PATH};
use crate::storage::ArtifactKind;

pub(super) async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<(CookieJar, Json<String>), ApiError> {
    let Json(credentials) = payload.map_err(|e| {
        debug!("Malformed login body: {}", e);
        ApiError::BadRequest(None)
    })?;

    let outcome = state.gateway.login(&credentials).await?;

    for kind in [ArtifactKind::Rom, ArtifactKind::Save] {
        state.gate.provision(kind, &outcome.identity).await?;
    }

    let max_age = Duration::seconds(state.gateway.tokens().refresh_ttl().as_secs() as i64);
    let jar = jar.add(refresh_cookie(outcome.refresh_token, max_age));

    Ok((jar, Json(outcome.access_token)))
}

pub(super) async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<String>, ApiError> {
    let token = jar.get(REFRESH_COOKIE_NAME).map(|cookie| cookie.value());
    let access_token = state.gateway.refresh(token).await?;
    Ok(Json(access_token))
}

/// Clear the refresh cookie. The stored refresh pair is left untouched.
pub(super) async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    (jar.add(expired_refresh_cookie()), StatusCode::OK)
}

fn refresh_cookie(token: String, max_age: Duration) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE_NAME, token))
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .max_age(max_age)
        .build()
}

fn expired_refresh_cookie() -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE_NAME, ""))
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .max_age(Duration::ZERO)
        .expires(OffsetDateTime::now_utc() - Duration::days(1))
        .build()
}
