//! Turns a validated [`RegistrationPlan`] into certificate records.

use chrono::{DateTime, Utc};
use kpc_core::new_id;

use crate::model::Certificate;
use crate::registration::RegistrationPlan;

/// One Available certificate per planned number, sharing the sale
/// attributes. Nothing is persisted here.
pub fn build_certificates(
    plan: &RegistrationPlan,
    assignor: &str,
    now: DateTime<Utc>,
) -> Vec<Certificate> {
    plan.numbers
        .iter()
        .map(|&number| {
            let mut cert = Certificate::new_available(number, now);
            cert.id = new_id();
            cert.assignor = Some(assignor.to_string());
            cert.licensee = Some(plan.licensee.id.clone());
            cert.date_of_sale = Some(plan.date_of_sale);
            cert.payment_method = Some(plan.payment_method);
            cert
        })
        .collect()
}
