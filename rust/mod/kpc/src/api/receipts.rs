use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    routing::get,
};

use kpc_core::{Claims, ListResult, ServiceError};

use crate::model::Receipt;
use super::{AppState, list_params, ok_json, principal};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/receipts", get(list_receipts))
        .route("/receipts/{id}", get(get_receipt))
}

async fn list_receipts(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<ListResult<Receipt>>, ServiceError> {
    let p = principal(&svc, &claims)?;
    ok_json(svc.list_receipts(&p, &list_params(&pairs)))
}

async fn get_receipt(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Receipt>, ServiceError> {
    let p = principal(&svc, &claims)?;
    ok_json(svc.get_receipt(&p, &id))
}
