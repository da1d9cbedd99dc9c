//! Field-format validators shared by licensee, certificate and config input.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

static AES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^X\d{14}$").expect("static regex"));

static TAX_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}-\d{7}$").expect("static regex"));

static ZIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("static regex"));

static COUNTRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}$").expect("static regex"));

/// USPS codes for states, DC and territories.
const US_STATES: &[&str] = &[
    "AL", "AK", "AS", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "GU", "HI",
    "ID", "IL", "IN", "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO",
    "MP", "MT", "NE", "NV", "NH", "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA",
    "PR", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VI", "VA", "WA", "WV", "WI", "WY",
];

pub const AES_FORMAT_MSG: &str =
    "AES Confirmation (ITN) format is 14 digits prepended by X: X##############";
pub const TAX_ID_FORMAT_MSG: &str = "TIN format: ##-#######";

/// AES / ITN confirmation: `X` followed by 14 digits.
pub fn is_aes(value: &str) -> bool {
    AES_RE.is_match(value)
}

/// Tax identification number: `##-#######`.
pub fn is_tax_id(value: &str) -> bool {
    TAX_ID_RE.is_match(value)
}

pub fn is_zip_code(value: &str) -> bool {
    ZIP_RE.is_match(value)
}

pub fn is_us_state(value: &str) -> bool {
    US_STATES.contains(&value)
}

/// ISO 3166-1 alpha-2 shape (upper-case letters).
pub fn is_country_code(value: &str) -> bool {
    COUNTRY_RE.is_match(value)
}

/// Smallest accepted monetary value or carat weight.
pub fn min_positive_amount() -> Decimal {
    Decimal::new(1, 2)
}

/// True when `value` has at most `max_digits` digits, `places` of them
/// after the decimal point.
pub fn fits_decimal(value: Decimal, max_digits: u32, places: u32) -> bool {
    let normalized = value.normalize();
    if normalized.scale() > places {
        return false;
    }
    let integer_digits = normalized.trunc().abs().to_string().trim_start_matches('0').len() as u32;
    integer_digits + places <= max_digits
}
