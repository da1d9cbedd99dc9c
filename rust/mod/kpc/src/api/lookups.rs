//! Staff-managed choice lists: void reasons, HS codes and ports of export.
//! Each list gets the same four routes under its own path segment.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
};

use kpc_core::{Claims, ListResult, ServiceError};

use crate::model::{LookupEntry, LookupKind};
use super::{AppState, list_params, ok_json, principal};

pub fn routes() -> Router<AppState> {
    LookupKind::ALL
        .into_iter()
        .fold(Router::new(), |router, kind| router.merge(kind_routes(kind)))
}

fn kind_routes(kind: LookupKind) -> Router<AppState> {
    let collection = format!("/{}", kind.segment());
    let item = format!("/{}/{{id}}", kind.segment());
    Router::new()
        .route(
            &collection,
            get(
                move |State(svc): State<AppState>,
                      Extension(claims): Extension<Claims>,
                      Query(pairs): Query<Vec<(String, String)>>| async move {
                    list_entries(kind, svc, claims, pairs)
                },
            )
            .post(
                move |State(svc): State<AppState>,
                      Extension(claims): Extension<Claims>,
                      Json(body): Json<LookupEntry>| async move {
                    create_entry(kind, svc, claims, body)
                },
            ),
        )
        .route(
            &item,
            patch(
                move |State(svc): State<AppState>,
                      Extension(claims): Extension<Claims>,
                      Path(id): Path<String>,
                      Json(body): Json<serde_json::Value>| async move {
                    update_entry(kind, svc, claims, id, body)
                },
            )
            .delete(
                move |State(svc): State<AppState>,
                      Extension(claims): Extension<Claims>,
                      Path(id): Path<String>| async move {
                    delete_entry(kind, svc, claims, id)
                },
            ),
        )
}

fn list_entries(
    kind: LookupKind,
    svc: AppState,
    claims: Claims,
    pairs: Vec<(String, String)>,
) -> Result<Json<ListResult<LookupEntry>>, ServiceError> {
    let p = principal(&svc, &claims)?;
    ok_json(svc.list_lookups(&p, kind, &list_params(&pairs)))
}

fn create_entry(
    kind: LookupKind,
    svc: AppState,
    claims: Claims,
    body: LookupEntry,
) -> Result<(StatusCode, Json<LookupEntry>), ServiceError> {
    let p = principal(&svc, &claims)?;
    let created = svc.create_lookup(&p, kind, body)?;
    Ok((StatusCode::CREATED, Json(created)))
}

fn update_entry(
    kind: LookupKind,
    svc: AppState,
    claims: Claims,
    id: String,
    body: serde_json::Value,
) -> Result<Json<LookupEntry>, ServiceError> {
    let p = principal(&svc, &claims)?;
    ok_json(svc.update_lookup(&p, kind, &id, body))
}

fn delete_entry(
    kind: LookupKind,
    svc: AppState,
    claims: Claims,
    id: String,
) -> Result<StatusCode, ServiceError> {
    let p = principal(&svc, &claims)?;
    svc.delete_lookup(&p, kind, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
