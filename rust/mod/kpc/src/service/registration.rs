use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use kpc_core::{ServiceError, now};
use kpc_sql::{Executor, SQLError, Value};

use crate::access::{authorize, Action, Principal};
use crate::generator::build_certificates;
use crate::model::{Certificate, Receipt, MAX_CERTIFICATE_NUMBER};
use crate::receipt::compose_receipt;
use crate::registration::{self, References, RegistrationError, RegistrationRequest};
use super::certificate::{certificate_indexes, number_value};
use super::{insert_statement, placeholders, storage_err, to_json, KpcService};

/// Result of a successful registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOutcome {
    /// Display identifiers of the created certificates.
    pub certificates: Vec<String>,
    pub receipt: Receipt,
}

/// Initial values for the registration form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDefaults {
    pub cert_from: u64,
    pub date_of_sale: NaiveDate,
    pub unit_price: Decimal,
}

impl KpcService {
    /// One past the highest registered number, or 1 for an empty registry.
    pub fn next_available_number(&self) -> Result<u64, ServiceError> {
        let rows = self.sql
            .query("SELECT MAX(number) AS max FROM certificates", &[])
            .map_err(storage_err)?;
        let Some(max) = rows.first().and_then(|r| r.get_i64("max")) else {
            return Ok(1);
        };
        u64::try_from(max)
            .ok()
            .and_then(|max| max.checked_add(1))
            .filter(|next| *next <= MAX_CERTIFICATE_NUMBER)
            .ok_or_else(|| {
                ServiceError::Validation(format!("no certificate numbers remain after US{}", max))
            })
    }

    pub fn registration_defaults(
        &self,
        principal: &Principal,
    ) -> Result<RegistrationDefaults, ServiceError> {
        authorize(principal, Action::RegisterCertificates)?;
        let config = self.load_config()?;
        Ok(RegistrationDefaults {
            cert_from: self.next_available_number()?,
            date_of_sale: now().date_naive(),
            unit_price: config.price,
        })
    }

    /// Validate, build and persist a bulk registration with its receipt.
    pub fn register_certificates(
        &self,
        principal: &Principal,
        request: RegistrationRequest,
    ) -> Result<RegistrationOutcome, ServiceError> {
        authorize(principal, Action::RegisterCertificates)?;
        let config = self.load_config()?;

        let refs = self.resolve_references(&request)?;
        let plan = registration::validate(&request, &refs)?;

        let ts = now();
        let certificates = build_certificates(&plan, &principal.user_id, ts);
        let mut receipt = compose_receipt(&plan, &config, ts);

        self.insert_registration(&certificates, &mut receipt)?;

        info!(
            licensee = %plan.licensee.name,
            count = certificates.len(),
            receipt = receipt.number,
            "certificates registered"
        );

        Ok(RegistrationOutcome {
            certificates: plan.display_numbers(),
            receipt,
        })
    }

    fn resolve_references(&self, request: &RegistrationRequest) -> Result<References, ServiceError> {
        let licensee = match non_blank(request.licensee.as_deref()) {
            Some(id) => found(self.get_licensee_record(id))?,
            None => None,
        };
        let contact = match non_blank(request.contact.as_deref()) {
            Some(id) => found(self.get_contact_record(id))?,
            None => None,
        };
        let licensee_contacts = match licensee {
            Some(ref lic) => self.contacts_of_licensee(&lic.id)?,
            None => Vec::new(),
        };
        Ok(References {
            licensee,
            contact,
            licensee_contacts,
        })
    }

    /// Insert every certificate and the receipt in one transaction. The
    /// receipt number is assigned here.
    fn insert_registration(
        &self,
        certificates: &[Certificate],
        receipt: &mut Receipt,
    ) -> Result<(), ServiceError> {
        let statements = certificates
            .iter()
            .map(|cert| {
                Ok(insert_statement("certificates", &cert.id, to_json(cert)?, &certificate_indexes(cert)?))
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;
        let seed = self.receipt_seed;

        let result = self.sql.transaction(&mut |tx: &dyn Executor| {
            for (sql, params) in &statements {
                tx.exec(sql, params)?;
            }
            receipt.number = next_receipt_number(tx, seed)?;
            let json = serde_json::to_string(&*receipt).map_err(|e| SQLError::Aborted(e.to_string()))?;
            let (sql, params) = insert_statement(
                "receipts",
                &receipt.id,
                json,
                &[
                    ("number", Value::Integer(receipt.number)),
                    ("create_at", Value::opt_text(receipt.created_at.map(|t| t.to_rfc3339()))),
                ],
            );
            tx.exec(&sql, &params)?;
            Ok(())
        });

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_constraint() => {
                let numbers: Vec<u64> = certificates.iter().map(|c| c.number).collect();
                let existing = self.existing_numbers(&numbers)?;
                if existing.is_empty() {
                    // Lost a race on the receipt number.
                    Err(ServiceError::Conflict(e.to_string()))
                } else {
                    warn!(count = existing.len(), "registration rejected: numbers already registered");
                    Err(RegistrationError::DuplicateIdentifier { numbers: existing }.into())
                }
            }
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Which of `numbers` are already registered, ascending.
    fn existing_numbers(&self, numbers: &[u64]) -> Result<Vec<u64>, ServiceError> {
        let mut existing = Vec::new();
        for chunk in numbers.chunks(500) {
            let sql = format!(
                "SELECT number FROM certificates WHERE number IN ({}) ORDER BY number",
                placeholders(1, chunk.len())
            );
            let params = chunk
                .iter()
                .map(|n| number_value(*n))
                .collect::<Result<Vec<_>, _>>()?;
            let rows = self.sql.query(&sql, &params).map_err(storage_err)?;
            existing.extend(
                rows.iter()
                    .filter_map(|r| r.get_i64("number"))
                    .filter_map(|n| u64::try_from(n).ok()),
            );
        }
        existing.sort_unstable();
        Ok(existing)
    }
}

fn next_receipt_number(tx: &dyn Executor, seed: i64) -> Result<i64, SQLError> {
    let rows = tx.query("SELECT MAX(number) AS max FROM receipts", &[])?;
    Ok(rows
        .first()
        .and_then(|r| r.get_i64("max"))
        .map(|max| max + 1)
        .unwrap_or(seed))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Missing references become `None` so validation can report them.
fn found<T>(result: Result<T, ServiceError>) -> Result<Option<T>, ServiceError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(ServiceError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
