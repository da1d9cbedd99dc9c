use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Certificate lifecycle status.
///
/// Stored as its integer code; serialized by name in API bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateStatus {
    Available,
    Prepared,
    Shipped,
    Delivered,
    Void,
}

impl Default for CertificateStatus {
    fn default() -> Self {
        Self::Available
    }
}

impl CertificateStatus {
    pub const ALL: [CertificateStatus; 5] = [
        Self::Available,
        Self::Prepared,
        Self::Shipped,
        Self::Delivered,
        Self::Void,
    ];

    /// Statuses shown to licensee contacts when no filter is given.
    pub const DEFAULT_SEARCH: [CertificateStatus; 3] =
        [Self::Available, Self::Prepared, Self::Shipped];

    /// Statuses shown to auditors when no filter is given.
    pub const DEFAULT_AUDITOR_SEARCH: [CertificateStatus; 3] =
        [Self::Prepared, Self::Shipped, Self::Delivered];

    /// Integer code persisted in the `status` column.
    pub fn code(self) -> i64 {
        match self {
            Self::Available => 0,
            Self::Prepared => 1,
            Self::Shipped => 2,
            Self::Delivered => 3,
            Self::Void => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Prepared => "Prepared",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Void => "Void",
        }
    }

    /// Parse a query value: either the integer code or the label
    /// (case-insensitive).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(code) = raw.parse::<i64>() {
            return Self::from_code(code);
        }
        Self::ALL
            .into_iter()
            .find(|s| s.label().eq_ignore_ascii_case(raw))
    }

    /// Statuses that users move forward with an explicit action.
    pub fn is_modifiable(self) -> bool {
        matches!(self, Self::Prepared | Self::Shipped)
    }

    /// Status reached by the next explicit transition, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Prepared => Some(Self::Shipped),
            Self::Shipped => Some(Self::Delivered),
            _ => None,
        }
    }
}

/// How a licensee paid for its certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Check,
}

impl PaymentMethod {
    pub fn label(self) -> &'static str {
        match self {
            Self::Cash => "Cash",
            Self::Check => "Check",
        }
    }
}

/// Rejected lifecycle transition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("certificate {0} has already been voided")]
    AlreadyVoid(String),

    #[error("certificate {number} cannot advance from {status:?}")]
    NotAdvanceable {
        number: String,
        status: CertificateStatus,
    },

    #[error("certificate {number} details are locked in {status:?} status")]
    DetailsLocked {
        number: String,
        status: CertificateStatus,
    },
}

/// A Kimberley Process export certificate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// UUID primary key.
    #[serde(default)]
    pub id: String,

    /// Registry number; displayed as `US{number}`.
    pub number: u64,

    #[serde(default)]
    pub status: CertificateStatus,

    // ── Fields printed on the physical certificate ──
    /// ISO 3166-1 alpha-2 codes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub country_of_origin: Vec<String>,

    /// AES confirmation number (ITN): `X` followed by 14 digits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_issue: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_expiry: Option<NaiveDate>,

    /// Value in USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipped_value: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exporter: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exporter_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_parcels: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consignee: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consignee_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carat_weight: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harmonized_code: Option<String>,

    // ── Registry bookkeeping ──
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_of_export: Option<String>,

    /// User who registered the certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignor: Option<String>,

    /// Owning licensee id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub licensee: Option<String>,

    /// Date of sale to the licensee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_sale: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,

    #[serde(default)]
    pub void: bool,

    #[serde(default)]
    pub notes: String,

    /// Licensee attested the shipment did not fund conflict.
    #[serde(default)]
    pub attested: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_shipment: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_delivery: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_voided: Option<NaiveDate>,

    pub last_modified: DateTime<Utc>,
}

impl Certificate {
    /// A freshly registered, unassigned-details certificate.
    pub fn new_available(number: u64, now: DateTime<Utc>) -> Self {
        Self {
            id: String::new(),
            number,
            status: CertificateStatus::Available,
            country_of_origin: Vec::new(),
            aes: None,
            date_of_issue: None,
            date_of_expiry: None,
            shipped_value: None,
            exporter: None,
            exporter_address: None,
            number_of_parcels: None,
            consignee: None,
            consignee_address: None,
            carat_weight: None,
            harmonized_code: None,
            port_of_export: None,
            assignor: None,
            licensee: None,
            date_of_sale: None,
            payment_method: None,
            void: false,
            notes: String::new(),
            attested: false,
            date_of_shipment: None,
            date_of_delivery: None,
            date_voided: None,
            last_modified: now,
        }
    }

    pub fn display_name(&self) -> String {
        display_number(self.number)
    }

    /// Licensees may fill in shipment details only while Available.
    pub fn licensee_editable(&self) -> bool {
        self.status == CertificateStatus::Available && !self.void
    }

    pub fn status_can_be_updated(&self) -> bool {
        self.status.is_modifiable() && !self.void
    }

    /// Move Prepared → Shipped or Shipped → Delivered, stamping the
    /// matching date.
    pub fn advance(
        &mut self,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<CertificateStatus, TransitionError> {
        if self.void {
            return Err(TransitionError::AlreadyVoid(self.display_name()));
        }
        let next = self
            .status
            .next()
            .ok_or_else(|| TransitionError::NotAdvanceable {
                number: self.display_name(),
                status: self.status,
            })?;
        match next {
            CertificateStatus::Shipped => self.date_of_shipment = Some(today),
            CertificateStatus::Delivered => self.date_of_delivery = Some(today),
            _ => {}
        }
        self.status = next;
        self.last_modified = now;
        Ok(next)
    }

    /// Void the certificate. Terminal.
    pub fn mark_void(
        &mut self,
        reason: &str,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.void || self.status == CertificateStatus::Void {
            return Err(TransitionError::AlreadyVoid(self.display_name()));
        }
        self.void = true;
        self.status = CertificateStatus::Void;
        self.date_voided = Some(today);
        let reason = reason.trim();
        if !reason.is_empty() {
            if !self.notes.is_empty() {
                self.notes.push('\n');
            }
            self.notes.push_str(&format!("Voided: {}", reason));
        }
        self.last_modified = now;
        Ok(())
    }

    /// Guard for detail edits; details may change only while Available.
    pub fn ensure_details_editable(&self) -> Result<(), TransitionError> {
        if self.void {
            return Err(TransitionError::AlreadyVoid(self.display_name()));
        }
        if !self.licensee_editable() {
            return Err(TransitionError::DetailsLocked {
                number: self.display_name(),
                status: self.status,
            });
        }
        Ok(())
    }
}

/// Largest certificate number; the `number` column is a signed 64-bit integer.
pub const MAX_CERTIFICATE_NUMBER: u64 = i64::MAX as u64;

/// Render a registry number with the country prefix.
pub fn display_number(number: u64) -> String {
    format!("US{}", number)
}
