//! Receipt composition for a completed registration.

use chrono::{DateTime, Utc};
use kpc_core::new_id;

use crate::model::{CertificateConfig, Receipt};
use crate::registration::RegistrationPlan;

/// Build the receipt snapshot for `plan`.
///
/// The unit price comes from `config` as it stands now. The receipt
/// number is left at 0; storage assigns it in the registration
/// transaction.
pub fn compose_receipt(
    plan: &RegistrationPlan,
    config: &CertificateConfig,
    now: DateTime<Utc>,
) -> Receipt {
    Receipt {
        id: new_id(),
        number: 0,
        licensee_name: plan.licensee.name.clone(),
        licensee_address: plan.licensee.address_text(),
        certificates: plan.display_numbers(),
        total_paid: plan.payment_amount,
        certificates_sold: plan.numbers.len() as u32,
        unit_price: config.price,
        payment_method: plan.payment_method,
        contact: plan.contact.display_name(),
        date_sold: plan.date_of_sale,
        created_at: Some(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PaymentMethod;
    use crate::registration::RegistrationMethod;
    use crate::testing::{sample_contact, sample_licensee};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn plan(numbers: Vec<u64>) -> RegistrationPlan {
        let mut contact = sample_contact("jdoe", &["lic-1"]);
        contact.first_name = "Jane".into();
        contact.last_name = "Doe".into();
        RegistrationPlan {
            licensee: sample_licensee("Acme Rough"),
            contact,
            date_of_sale: NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
            method: RegistrationMethod::Sequential,
            numbers,
            payment_method: PaymentMethod::Check,
            payment_amount: Decimal::new(4500, 2),
        }
    }

    #[test]
    fn snapshot_of_registration() {
        let config = CertificateConfig {
            price: Decimal::new(2250, 2),
            ..Default::default()
        };
        let receipt = compose_receipt(&plan(vec![100, 101]), &config, Utc::now());

        assert_eq!(receipt.certificates, vec!["US100", "US101"]);
        assert_eq!(receipt.certificates_text(), "US100, US101");
        assert_eq!(receipt.certificates_sold, 2);
        assert_eq!(receipt.unit_price, Decimal::new(2250, 2));
        assert_eq!(receipt.total_paid, Decimal::new(4500, 2));
        assert_eq!(receipt.contact, "Jane Doe");
        assert_eq!(receipt.licensee_name, "Acme Rough");
        assert!(receipt.licensee_address.ends_with("United States of America"));
        assert_eq!(receipt.payment_method, PaymentMethod::Check);
        assert_eq!(receipt.date_sold, NaiveDate::from_ymd_opt(2024, 4, 2).unwrap());
    }

    #[test]
    fn price_read_at_composition() {
        let mut config = CertificateConfig::default();
        let first = compose_receipt(&plan(vec![1]), &config, Utc::now());
        config.price = Decimal::new(3000, 2);
        let second = compose_receipt(&plan(vec![2]), &config, Utc::now());
        assert_eq!(first.unit_price.to_string(), "20.00");
        assert_eq!(second.unit_price.to_string(), "30.00");
    }
}
