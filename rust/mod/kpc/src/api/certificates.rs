use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Deserialize;

use kpc_core::{Claims, ListResult, ServiceError};

use crate::datatable::DatatableResponse;
use crate::lifecycle::CertificateDetails;
use crate::model::{Certificate, MAX_CERTIFICATE_NUMBER};
use crate::registration::RegistrationRequest;
use crate::search::{strip_us_prefix, CertificateFilter};
use crate::service::registration::{RegistrationDefaults, RegistrationOutcome};
use super::{AppState, list_params, ok_json, principal};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/certificates", get(list_certificates))
        .route("/certificates/datatable", get(datatable))
        .route("/certificates/register", post(register))
        .route("/certificates/register/defaults", get(register_defaults))
        .route("/certificates/{number}", get(get_certificate))
        .route("/certificates/{number}/details", put(submit_details))
        .route("/certificates/{number}/advance", post(advance))
        .route("/certificates/{number}/void", post(void))
}

#[derive(Deserialize)]
struct VoidBody {
    #[serde(default)]
    reason: String,
}

/// Accepts `1042` or `US1042`. Numbers that cannot be stored are not found.
fn parse_number(raw: &str) -> Result<u64, ServiceError> {
    strip_us_prefix(raw.trim())
        .parse::<u64>()
        .ok()
        .filter(|n| (1..=MAX_CERTIFICATE_NUMBER).contains(n))
        .ok_or_else(|| ServiceError::NotFound(format!("certificate {} not found", raw)))
}

async fn list_certificates(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<ListResult<Certificate>>, ServiceError> {
    let p = principal(&svc, &claims)?;
    let filter = CertificateFilter::from_pairs(&pairs)?;
    ok_json(svc.search_certificates(&p, filter, &list_params(&pairs)))
}

async fn datatable(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<DatatableResponse>, ServiceError> {
    let p = principal(&svc, &claims)?;
    ok_json(svc.certificate_datatable(&p, &pairs))
}

async fn register(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<RegistrationRequest>,
) -> Result<(StatusCode, Json<RegistrationOutcome>), ServiceError> {
    let p = principal(&svc, &claims)?;
    let outcome = svc.register_certificates(&p, body)?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn register_defaults(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<RegistrationDefaults>, ServiceError> {
    let p = principal(&svc, &claims)?;
    ok_json(svc.registration_defaults(&p))
}

async fn get_certificate(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(number): Path<String>,
) -> Result<Json<Certificate>, ServiceError> {
    let p = principal(&svc, &claims)?;
    ok_json(svc.get_certificate(&p, parse_number(&number)?))
}

async fn submit_details(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(number): Path<String>,
    Json(details): Json<CertificateDetails>,
) -> Result<Json<Certificate>, ServiceError> {
    let p = principal(&svc, &claims)?;
    ok_json(svc.submit_details(&p, parse_number(&number)?, details))
}

async fn advance(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(number): Path<String>,
) -> Result<Json<Certificate>, ServiceError> {
    let p = principal(&svc, &claims)?;
    ok_json(svc.advance_status(&p, parse_number(&number)?))
}

async fn void(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(number): Path<String>,
    body: Option<Json<VoidBody>>,
) -> Result<Json<Certificate>, ServiceError> {
    let p = principal(&svc, &claims)?;
    let reason = body.map(|Json(b)| b.reason).unwrap_or_default();
    ok_json(svc.void_certificate(&p, parse_number(&number)?, &reason))
}
