use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};

use kpc_core::{Claims, ListResult, ServiceError};

use crate::model::Contact;
use crate::service::contact::NewContact;
use super::{AppState, list_params, ok_json, principal};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/contacts", get(list_contacts).post(create_contact))
        .route("/contacts/{id}", get(get_contact).patch(update_contact))
}

async fn create_contact(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<NewContact>,
) -> Result<(StatusCode, Json<Contact>), ServiceError> {
    let p = principal(&svc, &claims)?;
    let created = svc.create_contact(&p, body)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_contacts(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<ListResult<Contact>>, ServiceError> {
    let p = principal(&svc, &claims)?;
    ok_json(svc.list_contacts(&p, &list_params(&pairs)))
}

async fn get_contact(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Contact>, ServiceError> {
    let p = principal(&svc, &claims)?;
    ok_json(svc.get_contact(&p, &id))
}

async fn update_contact(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<Contact>, ServiceError> {
    let p = principal(&svc, &claims)?;
    ok_json(svc.update_contact(&p, &id, patch))
}
