use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};

use kpc_core::{Claims, ListResult, ServiceError};

use crate::model::KpcAddress;
use super::{AppState, list_params, ok_json, principal};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/addresses", get(list_addresses).post(create_address))
        .route(
            "/addresses/{id}",
            get(get_address).patch(update_address).delete(delete_address),
        )
}

async fn create_address(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<KpcAddress>,
) -> Result<(StatusCode, Json<KpcAddress>), ServiceError> {
    let p = principal(&svc, &claims)?;
    let created = svc.create_address(&p, body)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `?licensee=<id>` narrows to one address book.
async fn list_addresses(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<ListResult<KpcAddress>>, ServiceError> {
    let p = principal(&svc, &claims)?;
    let licensee = pairs
        .iter()
        .find(|(k, _)| k == "licensee")
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty());
    ok_json(svc.list_addresses(&p, licensee, &list_params(&pairs)))
}

async fn get_address(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<KpcAddress>, ServiceError> {
    let p = principal(&svc, &claims)?;
    ok_json(svc.get_address(&p, &id))
}

async fn update_address(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<KpcAddress>, ServiceError> {
    let p = principal(&svc, &claims)?;
    ok_json(svc.update_address(&p, &id, patch))
}

async fn delete_address(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    let p = principal(&svc, &claims)?;
    svc.delete_address(&p, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
