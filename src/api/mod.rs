// REST API endpoints for the locker

use axum::{
    Router,
    extract::{DefaultBodyLimit, Extension, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::auth::{AuthError, AuthGateway, StorageIdentity};
use crate::storage::{ArtifactKind, FileRepository, MAX_UPLOAD_BYTES, StorageError, StorageGate};

mod account;
mod files;

const GREETING: &str = "Hello World! This is a GBA file/auth server, written in Rust.";

/// Everything a request handler needs, shared across requests.
pub struct LockerState {
    pub gateway: AuthGateway,
    pub gate: StorageGate,
    pub files: FileRepository,
}

pub type AppState = Arc<LockerState>;

pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/", get(index))
        .route("/api/account/logout", post(account::logout))
        .nest("/api/rom", artifact_routes(ArtifactKind::Rom))
        .nest("/api/save", artifact_routes(ArtifactKind::Save))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_access_token,
        ));

    let public = Router::new()
        .route("/api/account/login", post(account::login))
        .route("/api/tokens/refresh", post(account::refresh));

    public
        .merge(protected)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn artifact_routes(kind: ArtifactKind) -> Router<AppState> {
    Router::new()
        .route("/download", get(files::download))
        .route("/upload", post(files::upload))
        .route("/list", get(files::list))
        .layer(Extension(kind))
}

async fn index() -> &'static str {
    GREETING
}

/// Validate the bearer token and attach the caller's [`StorageIdentity`].
async fn require_access_token(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let identity: StorageIdentity = state.gateway.authorize(authorization)?;
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

/// Errors surfaced at the HTTP boundary.
///
/// Only `BadRequest` may carry a body; every other rejection is bare so
/// callers learn nothing about why authentication failed.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    BadRequest(Option<String>),
    Conflict,
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            ApiError::BadRequest(Some(reason)) => (StatusCode::BAD_REQUEST, reason).into_response(),
            ApiError::BadRequest(None) => StatusCode::BAD_REQUEST.into_response(),
            ApiError::Conflict => StatusCode::CONFLICT.into_response(),
            ApiError::Internal(msg) => {
                error!("Request failed: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MalformedRequest => ApiError::BadRequest(None),
            AuthError::Unauthenticated | AuthError::InvalidCredentials => {
                debug!("Rejected request: {}", e);
                ApiError::Unauthorized
            }
            AuthError::Conflict => ApiError::Conflict,
            AuthError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidFileName(_) => ApiError::BadRequest(None),
            StorageError::DisallowedExtension { .. } => ApiError::BadRequest(Some(e.to_string())),
            StorageError::InvalidNamespace | StorageError::NotFound(_) | StorageError::Io(_) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}
