use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;

use kpc_core::{Claims, ListResult, ServiceError};

use crate::model::Licensee;
use crate::service::licensee::ContactChoice;
use super::{AppState, list_params, ok_json, principal};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/licensees", get(list_licensees).post(create_licensee))
        .route("/licensees/{id}", get(get_licensee).patch(update_licensee))
        .route("/licensees/{id}/contacts", get(licensee_contacts))
        .route("/licensee-contacts", get(contacts_for_form))
}

#[derive(Deserialize)]
struct ContactsQuery {
    #[serde(default)]
    licensee: Option<String>,
}

async fn create_licensee(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<Licensee>,
) -> Result<(StatusCode, Json<Licensee>), ServiceError> {
    let p = principal(&svc, &claims)?;
    let created = svc.create_licensee(&p, body)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_licensees(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<ListResult<Licensee>>, ServiceError> {
    let p = principal(&svc, &claims)?;
    ok_json(svc.list_licensees(&p, &list_params(&pairs)))
}

async fn get_licensee(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Licensee>, ServiceError> {
    let p = principal(&svc, &claims)?;
    ok_json(svc.get_licensee(&p, &id))
}

async fn update_licensee(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<Licensee>, ServiceError> {
    let p = principal(&svc, &claims)?;
    ok_json(svc.update_licensee(&p, &id, patch))
}

async fn licensee_contacts(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ContactChoice>>, ServiceError> {
    let p = principal(&svc, &claims)?;
    ok_json(svc.licensee_contacts(&p, &id))
}

/// Registration form helper: `?licensee=<id>`; no licensee, no choices.
async fn contacts_for_form(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(q): Query<ContactsQuery>,
) -> Result<Json<Vec<ContactChoice>>, ServiceError> {
    let p = principal(&svc, &claims)?;
    match q.licensee.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(id) => ok_json(svc.licensee_contacts(&p, id)),
        None => Ok(Json(Vec::new())),
    }
}
