use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PaymentMethod;

/// Payment record captured once per registration. Never updated.
///
/// Licensee and contact details are copied in, so later edits to either
/// do not change what was sold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    #[serde(default)]
    pub id: String,

    /// Sequential receipt number, assigned on insert.
    #[serde(default)]
    pub number: i64,

    pub licensee_name: String,

    pub licensee_address: String,

    /// Display identifiers, e.g. `US1042`.
    pub certificates: Vec<String>,

    pub total_paid: Decimal,

    pub certificates_sold: u32,

    pub unit_price: Decimal,

    pub payment_method: PaymentMethod,

    /// Contact display name.
    pub contact: String,

    pub date_sold: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Receipt {
    pub fn certificates_text(&self) -> String {
        self.certificates.join(", ")
    }
}
