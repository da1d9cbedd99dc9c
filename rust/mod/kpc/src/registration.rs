//! Bulk certificate registration: request validation and plan building.
//!
//! Validation is pure. The service resolves the licensee, the contact and
//! the licensee's contact set from storage, then hands them here together
//! with the raw request. A valid request becomes a [`RegistrationPlan`]
//! carrying the exact certificate numbers to create.
//!
//! Numbers are not checked against existing certificates. Collisions are
//! reported by the insert as [`RegistrationError::DuplicateIdentifier`].

use std::collections::HashSet;

use chrono::NaiveDate;
use kpc_core::{FormErrors, ServiceError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{display_number, Contact, Licensee, PaymentMethod, MAX_CERTIFICATE_NUMBER};
use crate::validate;

/// Upper bound on certificates created by one registration.
pub const MAX_CERTIFICATES_PER_REGISTRATION: usize = 10_000;

const REQUIRED: &str = "This field is required.";
const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";
const MIN_ONE: &str = "Ensure this value is greater than or equal to 1.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationMethod {
    /// Every number in `[cert_from, cert_to]`.
    Sequential,
    /// Numbers given explicitly in `cert_list`.
    List,
}

/// Registration input exactly as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    #[serde(default)]
    pub licensee: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub date_of_sale: Option<NaiveDate>,
    #[serde(default)]
    pub registration_method: Option<RegistrationMethod>,
    #[serde(default)]
    pub cert_from: Option<i64>,
    #[serde(default)]
    pub cert_to: Option<i64>,
    /// Comma or whitespace separated numbers, optionally `US`-prefixed.
    #[serde(default)]
    pub cert_list: Option<String>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub payment_amount: Option<Decimal>,
}

/// Records the request refers to, looked up by the caller.
#[derive(Debug, Clone, Default)]
pub struct References {
    /// The chosen licensee, if the id resolved.
    pub licensee: Option<Licensee>,
    /// The chosen contact, if the id resolved.
    pub contact: Option<Contact>,
    /// Contacts of the chosen licensee. Empty when no licensee is chosen.
    pub licensee_contacts: Vec<Contact>,
}

/// Validated registration, ready for the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationPlan {
    pub licensee: Licensee,
    pub contact: Contact,
    pub date_of_sale: NaiveDate,
    pub method: RegistrationMethod,
    /// Ordered, distinct certificate numbers.
    pub numbers: Vec<u64>,
    pub payment_method: PaymentMethod,
    pub payment_amount: Decimal,
}

impl RegistrationPlan {
    pub fn display_numbers(&self) -> Vec<String> {
        self.numbers.iter().copied().map(display_number).collect()
    }
}

/// Error categories exposed to callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingField,
    CrossReference,
    Range,
    InvalidValue,
    DuplicateIdentifier,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("{field}: This field is required.")]
    Required { field: &'static str },

    #[error("Certificate List must be provided when List method is selected.")]
    MissingList,

    #[error("Certificate To and From must be provided when Sequential method is selected.")]
    MissingBounds { from: bool, to: bool },

    #[error("Contact is not associated with selected Licensee")]
    CrossReference,

    #[error("Certificate 'To' value must be greater than or equal to 'From' value.")]
    Range { from: u64, to: u64 },

    #[error("{field}: {message}")]
    InvalidValue { field: &'static str, message: String },

    #[error("certificates already exist: {}", render_numbers(.numbers))]
    DuplicateIdentifier { numbers: Vec<u64> },
}

fn render_numbers(numbers: &[u64]) -> String {
    numbers
        .iter()
        .copied()
        .map(display_number)
        .collect::<Vec<_>>()
        .join(", ")
}

impl RegistrationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Required { .. } | Self::MissingList | Self::MissingBounds { .. } => {
                ErrorKind::MissingField
            }
            Self::CrossReference => ErrorKind::CrossReference,
            Self::Range { .. } => ErrorKind::Range,
            Self::InvalidValue { .. } => ErrorKind::InvalidValue,
            Self::DuplicateIdentifier { .. } => ErrorKind::DuplicateIdentifier,
        }
    }

    fn record(&self, errors: &mut FormErrors) {
        match self {
            Self::Required { field } => errors.add(field, REQUIRED),
            Self::MissingList => {
                errors.add("certList", "List of ID values required.");
                errors.add_non_field(self.to_string());
            }
            Self::MissingBounds { from, to } => {
                if *from {
                    errors.add("certFrom", REQUIRED);
                }
                if *to {
                    errors.add("certTo", REQUIRED);
                }
                errors.add_non_field(self.to_string());
            }
            Self::CrossReference => {
                errors.add("contact", "Select a contact of the chosen licensee.");
                errors.add_non_field(self.to_string());
            }
            Self::Range { .. } => {
                errors.add("certFrom", "Value must be less than \"To\"");
                errors.add("certTo", "Value must be greater than or equal to \"From\"");
                errors.add_non_field(self.to_string());
            }
            Self::InvalidValue { field, message } => errors.add(field, message.clone()),
            Self::DuplicateIdentifier { .. } => errors.add_non_field(self.to_string()),
        }
    }
}

impl From<RegistrationError> for ServiceError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::DuplicateIdentifier { .. } => ServiceError::Conflict(err.to_string()),
            other => {
                let mut errors = FormErrors::new();
                other.record(&mut errors);
                ServiceError::Form(errors)
            }
        }
    }
}

/// Every problem found in one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationFailure {
    pub errors: Vec<RegistrationError>,
}

impl RegistrationFailure {
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind() == kind)
    }

    pub fn to_form_errors(&self) -> FormErrors {
        let mut form = FormErrors::new();
        for err in &self.errors {
            err.record(&mut form);
        }
        form
    }
}

impl From<RegistrationFailure> for ServiceError {
    fn from(failure: RegistrationFailure) -> Self {
        ServiceError::Form(failure.to_form_errors())
    }
}

/// Contacts eligible for the chosen licensee.
pub fn contact_candidates<'a>(licensee: Option<&Licensee>, contacts: &'a [Contact]) -> Vec<&'a Contact> {
    match licensee {
        Some(lic) => contacts.iter().filter(|c| c.belongs_to(&lic.id)).collect(),
        None => Vec::new(),
    }
}

/// Validate a registration request against its resolved references.
///
/// All problems are collected; the plan is returned only when none exist.
pub fn validate(
    request: &RegistrationRequest,
    refs: &References,
) -> Result<RegistrationPlan, RegistrationFailure> {
    let mut errors = Vec::new();

    let licensee = resolve_choice(
        "licensee",
        request.licensee.as_deref(),
        refs.licensee.as_ref(),
        &mut errors,
    );
    if let Some(lic) = licensee {
        if !lic.is_active {
            errors.push(RegistrationError::InvalidValue {
                field: "licensee",
                message: format!("Licensee {} is not active.", lic.name),
            });
        }
    }
    let contact = resolve_choice(
        "contact",
        request.contact.as_deref(),
        refs.contact.as_ref(),
        &mut errors,
    );

    if let (Some(lic), Some(contact)) = (licensee, contact) {
        let candidates = contact_candidates(Some(lic), &refs.licensee_contacts);
        if !candidates.iter().any(|c| c.id == contact.id) {
            errors.push(RegistrationError::CrossReference);
        }
    }

    if request.date_of_sale.is_none() {
        errors.push(RegistrationError::Required { field: "dateOfSale" });
    }
    if request.registration_method.is_none() {
        errors.push(RegistrationError::Required { field: "registrationMethod" });
    }
    if request.payment_method.is_none() {
        errors.push(RegistrationError::Required { field: "paymentMethod" });
    }
    match request.payment_amount {
        None => errors.push(RegistrationError::Required { field: "paymentAmount" }),
        Some(amount) if amount <= Decimal::ZERO => errors.push(RegistrationError::InvalidValue {
            field: "paymentAmount",
            message: "Payment amount must be greater than 0.".into(),
        }),
        Some(amount) if !validate::fits_decimal(amount, 10, 2) => {
            errors.push(RegistrationError::InvalidValue {
                field: "paymentAmount",
                message: "Ensure that there are no more than 10 digits and 2 decimal places.".into(),
            })
        }
        Some(_) => {}
    }

    let cert_from = positive_bound("certFrom", request.cert_from, &mut errors);
    let cert_to = positive_bound("certTo", request.cert_to, &mut errors);

    let mut numbers = Vec::new();
    match request.registration_method {
        Some(RegistrationMethod::List) => {
            let raw = request.cert_list.as_deref().unwrap_or("").trim();
            if raw.is_empty() {
                errors.push(RegistrationError::MissingList);
            } else {
                match parse_cert_list(raw) {
                    Ok(parsed) if parsed.is_empty() => errors.push(RegistrationError::MissingList),
                    Ok(parsed) => numbers = parsed,
                    Err(bad) => errors.push(RegistrationError::InvalidValue {
                        field: "certList",
                        message: format!("Not valid certificate IDs: {}", bad.join(", ")),
                    }),
                }
            }
        }
        Some(RegistrationMethod::Sequential) => {
            if request.cert_from.is_none() || request.cert_to.is_none() {
                errors.push(RegistrationError::MissingBounds {
                    from: request.cert_from.is_none(),
                    to: request.cert_to.is_none(),
                });
            }
        }
        None => {}
    }

    if let (Some(from), Some(to)) = (cert_from, cert_to) {
        if from > to {
            errors.push(RegistrationError::Range { from, to });
        } else if request.registration_method == Some(RegistrationMethod::Sequential) {
            if to - from >= MAX_CERTIFICATES_PER_REGISTRATION as u64 {
                errors.push(too_many("certTo"));
            } else {
                numbers = (from..=to).collect();
            }
        }
    }

    if numbers.len() > MAX_CERTIFICATES_PER_REGISTRATION {
        errors.push(too_many("certList"));
    }

    if !errors.is_empty() {
        return Err(RegistrationFailure { errors });
    }

    match (
        licensee,
        contact,
        request.date_of_sale,
        request.registration_method,
        request.payment_method,
        request.payment_amount,
    ) {
        (Some(licensee), Some(contact), Some(date_of_sale), Some(method), Some(payment_method), Some(payment_amount)) => {
            Ok(RegistrationPlan {
                licensee: licensee.clone(),
                contact: contact.clone(),
                date_of_sale,
                method,
                numbers,
                payment_method,
                payment_amount,
            })
        }
        // Every None above already produced an error.
        _ => Err(RegistrationFailure { errors }),
    }
}

fn too_many(field: &'static str) -> RegistrationError {
    RegistrationError::InvalidValue {
        field,
        message: format!(
            "A registration may create at most {} certificates.",
            MAX_CERTIFICATES_PER_REGISTRATION
        ),
    }
}

fn resolve_choice<'a, T>(
    field: &'static str,
    requested: Option<&str>,
    resolved: Option<&'a T>,
    errors: &mut Vec<RegistrationError>,
) -> Option<&'a T> {
    match requested.map(str::trim) {
        None | Some("") => {
            errors.push(RegistrationError::Required { field });
            None
        }
        Some(_) => {
            if resolved.is_none() {
                errors.push(RegistrationError::InvalidValue {
                    field,
                    message: INVALID_CHOICE.into(),
                });
            }
            resolved
        }
    }
}

fn positive_bound(
    field: &'static str,
    value: Option<i64>,
    errors: &mut Vec<RegistrationError>,
) -> Option<u64> {
    match value {
        Some(v) if v >= 1 => Some(v as u64),
        Some(_) => {
            errors.push(RegistrationError::InvalidValue {
                field,
                message: MIN_ONE.into(),
            });
            None
        }
        None => None,
    }
}

/// Parse a delimited certificate list into distinct numbers, keeping the
/// order of first appearance. Returns the offending tokens on failure.
pub fn parse_cert_list(raw: &str) -> Result<Vec<u64>, Vec<String>> {
    let mut seen = HashSet::new();
    let mut numbers = Vec::new();
    let mut bad = Vec::new();

    for token in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        let digits = token
            .strip_prefix("US")
            .or_else(|| token.strip_prefix("us"))
            .unwrap_or(token);
        match digits.parse::<u64>() {
            Ok(n) if (1..=MAX_CERTIFICATE_NUMBER).contains(&n) => {
                if seen.insert(n) {
                    numbers.push(n);
                }
            }
            _ => bad.push(token.to_string()),
        }
    }

    if bad.is_empty() { Ok(numbers) } else { Err(bad) }
}
