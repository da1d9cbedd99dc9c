//! Shipment details a licensee submits for an Available certificate.

use chrono::{DateTime, NaiveDate, Utc};
use kpc_core::FormErrors;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::model::{Certificate, CertificateConfig, CertificateStatus, TransitionError};
use crate::validate;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateDetails {
    #[serde(default)]
    pub country_of_origin: Vec<String>,
    #[serde(default)]
    pub aes: Option<String>,
    #[serde(default)]
    pub shipped_value: Option<Decimal>,
    #[serde(default)]
    pub exporter: Option<String>,
    #[serde(default)]
    pub exporter_address: Option<String>,
    #[serde(default)]
    pub number_of_parcels: Option<u32>,
    #[serde(default)]
    pub consignee: Option<String>,
    #[serde(default)]
    pub consignee_address: Option<String>,
    #[serde(default)]
    pub carat_weight: Option<Decimal>,
    #[serde(default)]
    pub harmonized_code: Option<String>,
    #[serde(default)]
    pub port_of_export: Option<String>,
    #[serde(default)]
    pub attested: bool,
}

/// Harmonized codes and ports staff have configured. An empty list
/// accepts any value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailChoices {
    pub hs_codes: Vec<String>,
    pub ports: Vec<String>,
}

impl DetailChoices {
    fn check(list: &[String], value: &Option<String>) -> Option<String> {
        let value = value.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        if list.is_empty() || list.iter().any(|v| v == value) {
            None
        } else {
            Some(format!("Select a valid choice. {} is not one of the available choices.", value))
        }
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or("").is_empty()
}

impl CertificateDetails {
    pub fn validate(
        &self,
        config: &CertificateConfig,
        choices: &DetailChoices,
    ) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();

        let required = [
            ("aes", &self.aes),
            ("exporter", &self.exporter),
            ("exporterAddress", &self.exporter_address),
            ("consignee", &self.consignee),
            ("consigneeAddress", &self.consignee_address),
            ("harmonizedCode", &self.harmonized_code),
            ("portOfExport", &self.port_of_export),
        ];
        for (field, value) in required {
            if blank(value) {
                errors.add(field, "This field is required.");
            }
        }

        if let Some(msg) = DetailChoices::check(&choices.hs_codes, &self.harmonized_code) {
            errors.add("harmonizedCode", msg);
        }
        if let Some(msg) = DetailChoices::check(&choices.ports, &self.port_of_export) {
            errors.add("portOfExport", msg);
        }

        if let Some(ref aes) = self.aes {
            if !aes.trim().is_empty() && !validate::is_aes(aes.trim()) {
                errors.add("aes", validate::AES_FORMAT_MSG);
            }
        }

        let min = validate::min_positive_amount();
        for (field, value) in [("shippedValue", self.shipped_value), ("caratWeight", self.carat_weight)] {
            match value {
                None => errors.add(field, "This field is required."),
                Some(v) if v < min => {
                    errors.add(field, "Ensure this value is greater than or equal to 0.01.")
                }
                Some(v) if !validate::fits_decimal(v, 12, 2) => errors.add(
                    field,
                    "Ensure that there are no more than 12 digits and 2 decimal places.",
                ),
                Some(_) => {}
            }
        }

        match self.number_of_parcels {
            None | Some(0) => errors.add("numberOfParcels", "Ensure this value is greater than or equal to 1."),
            Some(_) => {}
        }

        if self.country_of_origin.is_empty() {
            errors.add("countryOfOrigin", "This field is required.");
        }
        for code in &self.country_of_origin {
            if !validate::is_country_code(code) || !config.allows_country(code) {
                errors.add(
                    "countryOfOrigin",
                    format!("Select a valid choice. {} is not one of the available choices.", code),
                );
            }
        }

        if !self.attested {
            errors.add("attested", "Attestation is required to prepare a certificate.");
        }

        errors.into_result()
    }

    /// Copy the details onto `cert` and move it to Prepared, stamping issue
    /// and expiry dates. Call [`validate`](Self::validate) first.
    pub fn apply(
        self,
        cert: &mut Certificate,
        config: &CertificateConfig,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        cert.ensure_details_editable()?;

        cert.country_of_origin = self.country_of_origin;
        cert.aes = self.aes.map(|s| s.trim().to_string());
        cert.shipped_value = self.shipped_value;
        cert.exporter = self.exporter;
        cert.exporter_address = self.exporter_address;
        cert.number_of_parcels = self.number_of_parcels;
        cert.consignee = self.consignee;
        cert.consignee_address = self.consignee_address;
        cert.carat_weight = self.carat_weight;
        cert.harmonized_code = self.harmonized_code;
        cert.port_of_export = self.port_of_export;
        cert.attested = self.attested;

        cert.status = CertificateStatus::Prepared;
        cert.date_of_issue = Some(today);
        cert.date_of_expiry = config.expiry_for(today);
        cert.last_modified = now;
        Ok(())
    }
}
