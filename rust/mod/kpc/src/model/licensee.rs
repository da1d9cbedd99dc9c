use chrono::{DateTime, Utc};
use kpc_core::FormErrors;
use serde::{Deserialize, Serialize};

use crate::validate;

/// An entity involved in the export/import of rough diamonds within the
/// United States.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Licensee {
    #[serde(default)]
    pub id: String,

    pub name: String,

    pub address: String,

    /// Address continued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address2: Option<String>,

    pub city: String,

    /// USPS state code.
    pub state: String,

    pub zip_code: String,

    /// Tax identification number, `##-#######`.
    pub tax_id: String,

    /// Active licensees may register and access certificates.
    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl Licensee {
    /// Multi-line postal address as printed on receipts.
    pub fn address_text(&self) -> String {
        let mut text = self.address.clone();
        if let Some(ref more) = self.address2 {
            if !more.is_empty() {
                text.push('\n');
                text.push_str(more);
            }
        }
        text.push_str(&format!("\n{}, {} {}", self.city, self.state, self.zip_code));
        text.push_str("\nUnited States of America");
        text
    }

    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        let required = [
            ("name", &self.name),
            ("address", &self.address),
            ("city", &self.city),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                errors.add(field, "This field is required.");
            }
        }
        if self.name.chars().count() > 256 {
            errors.add("name", "Ensure this value has at most 256 characters.");
        }
        if !validate::is_us_state(&self.state) {
            errors.add("state", "Select a valid US state.");
        }
        if !validate::is_zip_code(&self.zip_code) {
            errors.add("zipCode", "Enter a zip code in the format XXXXX or XXXXX-XXXX.");
        }
        if !validate::is_tax_id(&self.tax_id) {
            errors.add("taxId", validate::TAX_ID_FORMAT_MSG);
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_licensee;

    #[test]
    fn address_text_includes_country() {
        let mut lic = sample_licensee("Acme Rough");
        assert_eq!(
            lic.address_text(),
            "1 Diamond Way\nNew York, NY 10036\nUnited States of America"
        );
        lic.address2 = Some("Suite 12".into());
        assert_eq!(
            lic.address_text(),
            "1 Diamond Way\nSuite 12\nNew York, NY 10036\nUnited States of America"
        );
    }

    #[test]
    fn validate_formats() {
        assert!(sample_licensee("Acme").validate().is_ok());

        let mut lic = sample_licensee("");
        lic.tax_id = "123".into();
        lic.state = "XX".into();
        let errors = lic.validate().unwrap_err();
        assert!(errors.has_field("name"));
        assert!(errors.has_field("state"));
        assert_eq!(errors.field("taxId"), ["TIN format: ##-#######".to_string()]);
    }

    #[test]
    fn active_by_default() {
        let lic: Licensee = serde_json::from_value(serde_json::json!({
            "name": "Acme",
            "address": "1 Main",
            "city": "Reno",
            "state": "NV",
            "zipCode": "89501",
            "taxId": "12-3456789"
        }))
        .unwrap();
        assert!(lic.is_active);
    }
}
