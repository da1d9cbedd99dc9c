use chrono::{Days, NaiveDate};
use kpc_core::FormErrors;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::validate;

/// Registry-wide certificate settings. A single row exists; handlers load
/// it once per request and pass it down.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateConfig {
    /// Price of one certificate.
    pub price: Decimal,

    /// Days between date of issue and date of expiry.
    pub days_to_expiry: u32,

    /// Countries available for selection as country of origin.
    #[serde(default)]
    pub kp_countries: Vec<String>,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            price: Decimal::new(2000, 2),
            days_to_expiry: 60,
            kp_countries: Vec::new(),
        }
    }
}

impl CertificateConfig {
    pub fn expiry_for(&self, issued: NaiveDate) -> Option<NaiveDate> {
        issued.checked_add_days(Days::new(u64::from(self.days_to_expiry)))
    }

    /// Whether `code` may be chosen as a country of origin. An empty list
    /// allows any well-formed code.
    pub fn allows_country(&self, code: &str) -> bool {
        self.kp_countries.is_empty() || self.kp_countries.iter().any(|c| c == code)
    }

    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        if self.price.is_sign_negative() || !validate::fits_decimal(self.price, 10, 2) {
            errors.add("price", "Enter a non-negative amount with at most 10 digits and 2 decimal places.");
        }
        for code in &self.kp_countries {
            if !validate::is_country_code(code) {
                errors.add("kpCountries", format!("{} is not a valid country code.", code));
            }
        }
        errors.into_result()
    }
}
