use chrono::{DateTime, Utc};
use kpc_core::FormErrors;
use serde::{Deserialize, Serialize};

use crate::validate;

/// Saved exporter or consignee address in a licensee's address book.
/// Names are unique per licensee.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KpcAddress {
    #[serde(default)]
    pub id: String,

    /// Owning licensee id.
    pub licensee: String,

    pub name: String,

    pub address: String,

    /// ISO 3166-1 alpha-2 country code.
    pub country: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl KpcAddress {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        for (field, value) in [("licensee", &self.licensee), ("name", &self.name), ("address", &self.address)] {
            if value.trim().is_empty() {
                errors.add(field, "This field is required.");
            }
        }
        if self.name.chars().count() > 256 {
            errors.add("name", "Ensure this value has at most 256 characters.");
        }
        if !validate::is_country_code(&self.country) {
            errors.add(
                "country",
                format!("Select a valid choice. {} is not one of the available choices.", self.country),
            );
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> KpcAddress {
        KpcAddress {
            id: String::new(),
            licensee: "lic-1".into(),
            name: "Antwerp office".into(),
            address: "Hoveniersstraat 2, Antwerp".into(),
            country: "BE".into(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn validate_required_and_country() {
        assert!(sample().validate().is_ok());

        let mut addr = sample();
        addr.name = " ".into();
        addr.country = "Belgium".into();
        let errors = addr.validate().unwrap_err();
        assert!(errors.has_field("name"));
        assert!(errors.has_field("country"));
        assert!(!errors.has_field("address"));
    }
}
