use axum::{
    Extension, Json, Router,
    extract::State,
    routing::get,
};

use kpc_core::{Claims, ServiceError};

use crate::model::CertificateConfig;
use super::{AppState, ok_json, principal};

pub fn routes() -> Router<AppState> {
    Router::new().route("/config", get(get_config).put(update_config))
}

async fn get_config(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<CertificateConfig>, ServiceError> {
    let p = principal(&svc, &claims)?;
    ok_json(svc.get_config(&p))
}

async fn update_config(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<CertificateConfig>,
) -> Result<Json<CertificateConfig>, ServiceError> {
    let p = principal(&svc, &claims)?;
    ok_json(svc.update_config(&p, body))
}
