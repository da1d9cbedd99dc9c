//! Login endpoint: root against the configured argon2id hash, contacts
//! against their stored password hash. Issues a JWT on success.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use jsonwebtoken::{encode, EncodingKey, Header};
use kpc_core::{Claims, ServiceError, ROOT_SUBJECT};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bootstrap::verify_root_password;
use crate::routes::AppState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response body.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/auth/login", post(login_handler))
}

/// Handle POST /auth/login.
async fn login_handler(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<LoginRequest>,
) -> Response {
    let claims = if body.username == ROOT_SUBJECT {
        root_claims(&state, &body.password)
    } else {
        contact_claims(&state, &body.username, &body.password)
    };

    match claims.and_then(|c| issue_token(&state, &c)) {
        Ok(resp) => (StatusCode::OK, axum::Json(resp)).into_response(),
        Err(e) => e.into_response(),
    }
}

fn root_claims(state: &AppState, password: &str) -> Result<Claims, ServiceError> {
    if !verify_root_password(password, &state.server_config.root.password_hash) {
        warn!("failed root login");
        return Err(ServiceError::Unauthorized("invalid credentials".into()));
    }
    info!("root logged in");
    Ok(Claims::issue(
        ROOT_SUBJECT,
        "Root",
        state.server_config.jwt.expire_secs,
    ))
}

fn contact_claims(state: &AppState, username: &str, password: &str) -> Result<Claims, ServiceError> {
    let contact = state.service.authenticate(username, password)?;
    info!(username, "contact logged in");
    Ok(Claims::issue(
        &contact.id,
        &contact.display_name(),
        state.server_config.jwt.expire_secs,
    ))
}

fn issue_token(state: &AppState, claims: &Claims) -> Result<LoginResponse, ServiceError> {
    let key = EncodingKey::from_secret(state.server_config.jwt.secret.as_bytes());
    let token = encode(&Header::default(), claims, &key).map_err(|e| {
        tracing::error!("Failed to encode JWT: {}", e);
        ServiceError::Internal("internal server error".into())
    })?;
    Ok(LoginResponse {
        access_token: token,
        token_type: "Bearer".to_string(),
        expires_in: state.server_config.jwt.expire_secs,
    })
}
