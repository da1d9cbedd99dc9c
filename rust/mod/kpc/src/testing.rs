//! Shared fixtures for unit tests.

use rust_decimal::Decimal;

use kpc_sql::SqliteStore;

use crate::access::{Principal, Role};
use crate::lifecycle::CertificateDetails;
use crate::model::{Contact, Licensee};
use crate::service::KpcService;

pub(crate) fn sample_licensee(name: &str) -> Licensee {
    Licensee {
        id: String::new(),
        name: name.to_string(),
        address: "1 Diamond Way".into(),
        address2: None,
        city: "New York".into(),
        state: "NY".into(),
        zip_code: "10036".into(),
        tax_id: "12-3456789".into(),
        is_active: true,
        created_at: None,
        updated_at: None,
    }
}

pub(crate) fn sample_contact(username: &str, licensees: &[&str]) -> Contact {
    Contact {
        id: String::new(),
        username: username.to_string(),
        first_name: String::new(),
        last_name: String::new(),
        email: None,
        licensees: licensees.iter().map(|s| s.to_string()).collect(),
        is_superuser: false,
        is_auditor: false,
        is_active: true,
        created_at: None,
        updated_at: None,
    }
}

pub(crate) fn sample_details() -> CertificateDetails {
    CertificateDetails {
        country_of_origin: vec!["BW".into()],
        aes: Some("X20240101123456".into()),
        shipped_value: Some(Decimal::new(1_250_000, 2)),
        exporter: Some("Acme Rough".into()),
        exporter_address: Some("1 Diamond Way, New York".into()),
        number_of_parcels: Some(2),
        consignee: Some("Antwerp Trading".into()),
        consignee_address: Some("Hoveniersstraat 2, Antwerp".into()),
        carat_weight: Some(Decimal::new(1525, 2)),
        harmonized_code: Some("7102.10".into()),
        port_of_export: Some("JFK".into()),
        attested: true,
    }
}

/// Service over a fresh in-memory database; receipts start at 1.
pub(crate) fn memory_service() -> KpcService {
    let store = SqliteStore::open_in_memory().unwrap();
    KpcService::new(Box::new(store), 1).unwrap()
}

pub(crate) fn root_principal() -> Principal {
    Principal {
        user_id: "root".into(),
        name: "root".into(),
        role: Role::Superuser,
        licensees: Vec::new(),
    }
}

pub(crate) fn auditor_principal() -> Principal {
    Principal {
        user_id: "auditor".into(),
        name: "Audit Office".into(),
        role: Role::Auditor,
        licensees: Vec::new(),
    }
}

pub(crate) fn contact_principal(licensees: &[&str]) -> Principal {
    Principal {
        user_id: "contact".into(),
        name: "Licensee Contact".into(),
        role: Role::Contact,
        licensees: licensees.iter().map(|s| s.to_string()).collect(),
    }
}
