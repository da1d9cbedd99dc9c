pub mod certificates;
pub mod licensees;
pub mod contacts;
pub mod receipts;
pub mod config;
pub mod lookups;
pub mod addresses;


use std::sync::Arc;

use axum::{Json, Router};
use serde::Serialize;

use kpc_core::{Claims, ListParams, ServiceError};

use crate::access::Principal;
use crate::service::KpcService;

/// Shared application state.
pub type AppState = Arc<KpcService>;

/// Build the registry API router. The binary nests it under `/kpc`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/v1", api_routes())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(certificates::routes())
        .merge(licensees::routes())
        .merge(contacts::routes())
        .merge(receipts::routes())
        .merge(config::routes())
        .merge(lookups::routes())
        .merge(addresses::routes())
}

/// Wrap a Result<T, ServiceError> into an API response.
pub(crate) fn ok_json<T: Serialize>(result: Result<T, ServiceError>) -> Result<Json<T>, ServiceError> {
    result.map(Json)
}

pub(crate) fn principal(svc: &KpcService, claims: &Claims) -> Result<Principal, ServiceError> {
    svc.principal(claims)
}

/// Paging keys from a raw query; bad numbers fall back to defaults.
pub(crate) fn list_params(pairs: &[(String, String)]) -> ListParams {
    let mut params = ListParams::default();
    for (key, value) in pairs {
        match key.as_str() {
            "limit" => params.limit = value.trim().parse().unwrap_or(params.limit),
            "offset" => params.offset = value.trim().parse().unwrap_or(0),
            _ => {}
        }
    }
    params
}
