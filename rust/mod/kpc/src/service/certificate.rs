use rust_decimal::prelude::ToPrimitive;
use tracing::info;

use kpc_core::{FormErrors, ListParams, ListResult, ServiceError, now};
use kpc_sql::Value;

use crate::access::{authorize, Action, Principal};
use crate::datatable::{CertificateRow, DatatableRequest, DatatableResponse};
use crate::lifecycle::{CertificateDetails, DetailChoices};
use crate::model::{display_number, Certificate, LookupKind, TransitionError, MAX_CERTIFICATE_NUMBER};
use crate::search::{build_predicate, CertificateFilter, Predicate};
use super::{decode_row, storage_err, KpcService};

const FROM_CERTIFICATES: &str = "FROM certificates c LEFT JOIN licensees l ON l.id = c.licensee_id";

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::AlreadyVoid(_) | TransitionError::DetailsLocked { .. } => {
                ServiceError::ReadOnly(err.to_string())
            }
            TransitionError::NotAdvanceable { .. } => ServiceError::Validation(err.to_string()),
        }
    }
}

fn opt_date(d: Option<chrono::NaiveDate>) -> Value {
    Value::opt_text(d.map(|d| d.to_string()))
}

fn opt_real(v: Option<rust_decimal::Decimal>) -> Value {
    v.and_then(|d| d.to_f64()).map(Value::Real).unwrap_or(Value::Null)
}

/// `number` column value. Numbers past [`MAX_CERTIFICATE_NUMBER`] never
/// reach storage.
pub(crate) fn number_value(number: u64) -> Result<Value, ServiceError> {
    i64::try_from(number).map(Value::Integer).map_err(|_| {
        ServiceError::Validation(format!(
            "certificate number {} exceeds the maximum {}",
            number, MAX_CERTIFICATE_NUMBER
        ))
    })
}

/// Indexed columns mirrored from the JSON document.
pub(crate) fn certificate_indexes(cert: &Certificate) -> Result<Vec<(&'static str, Value)>, ServiceError> {
    Ok(vec![
        ("number", number_value(cert.number)?),
        ("status", Value::Integer(cert.status.code())),
        ("licensee_id", Value::opt_text(cert.licensee.clone())),
        ("date_of_issue", opt_date(cert.date_of_issue)),
        ("date_of_sale", opt_date(cert.date_of_sale)),
        ("date_of_expiry", opt_date(cert.date_of_expiry)),
        ("date_of_shipment", opt_date(cert.date_of_shipment)),
        ("date_of_delivery", opt_date(cert.date_of_delivery)),
        ("exporter", Value::opt_text(cert.exporter.clone())),
        ("consignee", Value::opt_text(cert.consignee.clone())),
        ("aes", Value::opt_text(cert.aes.clone())),
        ("shipped_value", opt_real(cert.shipped_value)),
        (
            "number_of_parcels",
            cert.number_of_parcels.map(|n| Value::Integer(n as i64)).unwrap_or(Value::Null),
        ),
        ("carat_weight", opt_real(cert.carat_weight)),
        ("harmonized_code", Value::opt_text(cert.harmonized_code.clone())),
        ("last_modified", Value::Text(cert.last_modified.to_rfc3339())),
    ])
}

impl KpcService {
    fn load_certificate(&self, number: u64) -> Result<Certificate, ServiceError> {
        let not_found = || ServiceError::NotFound(format!("certificate {} not found", display_number(number)));
        let key = i64::try_from(number).map_err(|_| not_found())?;
        let rows = self.sql
            .query("SELECT data FROM certificates WHERE number = ?1", &[Value::Integer(key)])
            .map_err(storage_err)?;
        let row = rows.first().ok_or_else(not_found)?;
        decode_row(row, "data")
    }

    /// Load a certificate the caller may act on under `action`.
    fn visible_certificate(
        &self,
        principal: &Principal,
        number: u64,
        action: Action,
    ) -> Result<Certificate, ServiceError> {
        let scope = authorize(principal, action)?;
        let cert = self.load_certificate(number)?;
        if !scope.allows(cert.licensee.as_deref()) {
            return Err(ServiceError::PermissionDenied(format!(
                "certificate {} is not visible to {}",
                cert.display_name(),
                principal.user_id
            )));
        }
        Ok(cert)
    }

    fn save_certificate(&self, cert: &Certificate) -> Result<(), ServiceError> {
        self.update_record("certificates", &cert.id, cert, &certificate_indexes(cert)?)
    }

    pub fn get_certificate(&self, principal: &Principal, number: u64) -> Result<Certificate, ServiceError> {
        self.visible_certificate(principal, number, Action::ViewCertificates)
    }

    /// Filtered, scoped certificate list ordered by number.
    pub fn search_certificates(
        &self,
        principal: &Principal,
        filter: CertificateFilter,
        params: &ListParams,
    ) -> Result<ListResult<Certificate>, ServiceError> {
        let scope = authorize(principal, Action::ViewCertificates)?;
        let filter = filter.or_default_for(principal);
        let pred = build_predicate(&scope, &filter);

        let total = self.count_matching(&pred)?;
        let rows = self.page(&pred, " ORDER BY c.number ASC", params.effective_limit(), params.offset)?;
        let items = rows.into_iter().map(|(cert, _)| cert).collect();
        Ok(ListResult { items, total })
    }

    /// DataTables endpoint: query pairs carry both filters and table
    /// parameters.
    pub fn certificate_datatable(
        &self,
        principal: &Principal,
        pairs: &[(String, String)],
    ) -> Result<DatatableResponse, ServiceError> {
        let scope = authorize(principal, Action::ViewCertificates)?;
        let table = DatatableRequest::from_pairs(pairs);
        let filter = CertificateFilter::from_pairs(pairs)?.or_default_for(principal);

        // Total is everything the caller can see; filters and search only
        // narrow the filtered count and the page.
        let records_total = self.count_matching(&build_predicate(&scope, &CertificateFilter::default()))?;
        let mut pred = build_predicate(&scope, &filter);
        if let Some(ref prefix) = table.search {
            pred.number_prefix(prefix);
        }
        let records_filtered = self.count_matching(&pred)?;

        let data = self
            .page(&pred, &table.order_sql(), table.length, table.start)?
            .into_iter()
            .map(|(cert, licensee_name)| CertificateRow::new(cert, licensee_name))
            .collect();

        Ok(DatatableResponse {
            draw: table.draw,
            records_total,
            records_filtered,
            data,
        })
    }

    /// Licensee fills in shipment details: Available → Prepared.
    pub fn submit_details(
        &self,
        principal: &Principal,
        number: u64,
        details: CertificateDetails,
    ) -> Result<Certificate, ServiceError> {
        let mut cert = self.visible_certificate(principal, number, Action::EditCertificate)?;
        cert.ensure_details_editable()?;

        let config = self.load_config()?;
        let choices = DetailChoices {
            hs_codes: self.lookup_values(LookupKind::HsCode)?,
            ports: self.lookup_values(LookupKind::PortOfExport)?,
        };
        details.validate(&config, &choices)?;

        let ts = now();
        details.apply(&mut cert, &config, ts.date_naive(), ts)?;
        self.save_certificate(&cert)?;
        info!(number = %cert.display_name(), user = %principal.user_id, "certificate prepared");
        Ok(cert)
    }

    /// Prepared → Shipped → Delivered.
    pub fn advance_status(&self, principal: &Principal, number: u64) -> Result<Certificate, ServiceError> {
        let mut cert = self.visible_certificate(principal, number, Action::EditCertificate)?;
        let ts = now();
        let status = cert.advance(ts.date_naive(), ts)?;
        self.save_certificate(&cert)?;
        info!(number = %cert.display_name(), ?status, "certificate status advanced");
        Ok(cert)
    }

    pub fn void_certificate(
        &self,
        principal: &Principal,
        number: u64,
        reason: &str,
    ) -> Result<Certificate, ServiceError> {
        let mut cert = self.visible_certificate(principal, number, Action::EditCertificate)?;
        self.check_void_reason(reason)?;
        let ts = now();
        cert.mark_void(reason, ts.date_naive(), ts)?;
        self.save_certificate(&cert)?;
        info!(number = %cert.display_name(), user = %principal.user_id, "certificate voided");
        Ok(cert)
    }

    /// Once staff configure void reasons, a non-blank reason must be one of
    /// them.
    fn check_void_reason(&self, reason: &str) -> Result<(), ServiceError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Ok(());
        }
        let reasons = self.lookup_values(LookupKind::VoidReason)?;
        if reasons.is_empty() || reasons.iter().any(|r| r == reason) {
            return Ok(());
        }
        let mut errors = FormErrors::new();
        errors.add(
            "reason",
            format!("Select a valid choice. {} is not one of the available choices.", reason),
        );
        Err(errors.into())
    }

    fn count_matching(&self, pred: &Predicate) -> Result<usize, ServiceError> {
        let sql = format!("SELECT COUNT(*) AS cnt {}{}", FROM_CERTIFICATES, pred.where_sql());
        self.count(&sql, &pred.params)
    }

    fn page(
        &self,
        pred: &Predicate,
        order_sql: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<(Certificate, Option<String>)>, ServiceError> {
        let mut params = pred.params.clone();
        params.push(Value::Integer(limit as i64));
        let limit_idx = params.len();
        params.push(Value::Integer(offset as i64));
        let offset_idx = params.len();

        let sql = format!(
            "SELECT c.data AS data, l.name AS licensee_name {}{}{} LIMIT ?{} OFFSET ?{}",
            FROM_CERTIFICATES,
            pred.where_sql(),
            order_sql,
            limit_idx,
            offset_idx,
        );
        let rows = self.sql.query(&sql, &params).map_err(storage_err)?;
        rows.iter()
            .map(|row| {
                let cert: Certificate = decode_row(row, "data")?;
                Ok((cert, row.get_str("licensee_name").map(String::from)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CertificateStatus, LookupEntry, PaymentMethod};
    use crate::registration::{RegistrationMethod, RegistrationRequest};
    use crate::testing::{
        auditor_principal, contact_principal, memory_service, root_principal, sample_contact,
        sample_details, sample_licensee,
    };
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    struct Fixture {
        svc: KpcService,
        acme: String,
        other: String,
    }

    /// Acme owns 1..=5, Other owns 10..=11.
    fn fixture() -> Fixture {
        let svc = memory_service();
        let root = root_principal();
        let acme = svc.insert_licensee(sample_licensee("Acme Rough")).unwrap();
        let other = svc.insert_licensee(sample_licensee("Other Gems")).unwrap();
        let a = svc.insert_contact(sample_contact("a", &[&acme.id]), "pw-123456").unwrap();
        let o = svc.insert_contact(sample_contact("o", &[&other.id]), "pw-123456").unwrap();

        for (lic, contact, from, to) in [(&acme.id, &a.id, 1, 5), (&other.id, &o.id, 10, 11)] {
            svc.register_certificates(
                &root,
                RegistrationRequest {
                    licensee: Some(lic.clone()),
                    contact: Some(contact.clone()),
                    date_of_sale: NaiveDate::from_ymd_opt(2024, 1, 10),
                    registration_method: Some(RegistrationMethod::Sequential),
                    cert_from: Some(from),
                    cert_to: Some(to),
                    cert_list: None,
                    payment_method: Some(PaymentMethod::Cash),
                    payment_amount: Some(Decimal::new(10000, 2)),
                },
            )
            .unwrap();
        }

        Fixture {
            svc,
            acme: acme.id,
            other: other.id,
        }
    }

    fn numbers(result: &ListResult<Certificate>) -> Vec<u64> {
        result.items.iter().map(|c| c.number).collect()
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn contacts_only_see_their_licensees() {
        let f = fixture();
        let p = contact_principal(&[&f.acme]);
        let found = f
            .svc
            .search_certificates(&p, CertificateFilter::default(), &ListParams::default())
            .unwrap();
        assert_eq!(numbers(&found), vec![1, 2, 3, 4, 5]);

        let err = f.svc.get_certificate(&p, 10).unwrap_err();
        assert_eq!(err.error_code(), "PERMISSION_DENIED");
        assert_eq!(f.svc.get_certificate(&p, 999).unwrap_err().error_code(), "NOT_FOUND");
    }

    #[test]
    fn default_view_depends_on_role() {
        let f = fixture();
        let root = root_principal();
        f.svc.submit_details(&root, 1, sample_details()).unwrap();
        f.svc.submit_details(&root, 2, sample_details()).unwrap();
        f.svc.advance_status(&root, 2).unwrap();
        f.svc.advance_status(&root, 2).unwrap();
        f.svc.void_certificate(&root, 3, "damaged").unwrap();

        let all = f
            .svc
            .search_certificates(&root, CertificateFilter::default(), &ListParams::default())
            .unwrap();
        // Available + Prepared + Shipped: 2 is Delivered, 3 is Void.
        assert_eq!(numbers(&all), vec![1, 4, 5, 10, 11]);

        let audit = f
            .svc
            .search_certificates(&auditor_principal(), CertificateFilter::default(), &ListParams::default())
            .unwrap();
        assert_eq!(numbers(&audit), vec![1, 2]);
    }

    #[test]
    fn explicit_filters_replace_defaults() {
        let f = fixture();
        let root = root_principal();
        f.svc.void_certificate(&root, 4, "").unwrap();

        let filter = CertificateFilter::from_pairs(&pairs(&[("status", "Void")])).unwrap();
        let found = f.svc.search_certificates(&root, filter, &ListParams::default()).unwrap();
        assert_eq!(numbers(&found), vec![4]);

        let filter = CertificateFilter::from_pairs(&pairs(&[("licensee", &f.other)])).unwrap();
        let found = f.svc.search_certificates(&root, filter, &ListParams::default()).unwrap();
        assert_eq!(numbers(&found), vec![10, 11]);

        let filter = CertificateFilter::from_pairs(&pairs(&[("number", "US1")])).unwrap();
        let found = f.svc.search_certificates(&root, filter, &ListParams::default()).unwrap();
        assert_eq!(numbers(&found), vec![1, 10, 11]);
    }

    #[test]
    fn exporter_and_date_filters() {
        let f = fixture();
        let root = root_principal();
        f.svc.submit_details(&root, 5, sample_details()).unwrap();
        let today = now().date_naive().to_string();

        let filter = CertificateFilter::from_pairs(&pairs(&[
            ("exporter", "acme"),
            ("date_of_issue_after", &today),
            ("date_of_issue_before", &today),
        ]))
        .unwrap();
        let found = f.svc.search_certificates(&root, filter, &ListParams::default()).unwrap();
        assert_eq!(numbers(&found), vec![5]);

        let filter = CertificateFilter::from_pairs(&pairs(&[("date_of_sale_before", "2023-12-31")])).unwrap();
        let found = f.svc.search_certificates(&root, filter, &ListParams::default()).unwrap();
        assert!(found.items.is_empty());
    }

    #[test]
    fn paging_reports_total() {
        let f = fixture();
        let params = ListParams { limit: 2, offset: 2 };
        let found = f
            .svc
            .search_certificates(&root_principal(), CertificateFilter::default(), &params)
            .unwrap();
        assert_eq!(found.total, 7);
        assert_eq!(numbers(&found), vec![3, 4]);
    }

    #[test]
    fn datatable_counts_and_sorts() {
        let f = fixture();
        let p = root_principal();
        let resp = f
            .svc
            .certificate_datatable(
                &p,
                &pairs(&[
                    ("draw", "4"),
                    ("start", "0"),
                    ("length", "3"),
                    ("order[0][column]", "0"),
                    ("order[0][dir]", "desc"),
                    ("search[value]", "1"),
                ]),
            )
            .unwrap();
        assert_eq!(resp.draw, 4);
        assert_eq!(resp.records_total, 7);
        assert_eq!(resp.records_filtered, 3);
        let shown: Vec<&str> = resp.data.iter().map(|r| r.number.as_str()).collect();
        assert_eq!(shown, vec!["US11", "US10", "US1"]);
        assert_eq!(resp.data[0].licensee_name.as_deref(), Some("Other Gems"));
    }

    #[test]
    fn datatable_total_ignores_filters() {
        let f = fixture();
        let p = root_principal();
        f.svc.void_certificate(&p, 2, "misprint").unwrap();

        let resp = f.svc.certificate_datatable(&p, &pairs(&[("status", "Void")])).unwrap();
        assert_eq!(resp.records_total, 7);
        assert_eq!(resp.records_filtered, 1);
        assert_eq!(resp.data.len(), 1);
        assert_eq!(resp.data[0].number, "US2");

        let contact = contact_principal(&[&f.acme]);
        let resp = f
            .svc
            .certificate_datatable(&contact, &pairs(&[("search[value]", "US4")]))
            .unwrap();
        assert_eq!(resp.records_total, 5);
        assert_eq!(resp.records_filtered, 1);
    }

    #[test]
    fn datatable_sorts_by_licensee_name() {
        let f = fixture();
        let resp = f
            .svc
            .certificate_datatable(
                &root_principal(),
                &pairs(&[("order[0][column]", "5"), ("order[0][dir]", "desc"), ("length", "2")]),
            )
            .unwrap();
        let shown: Vec<&str> = resp.data.iter().map(|r| r.number.as_str()).collect();
        assert_eq!(shown, vec!["US10", "US11"]);
    }

    #[test]
    fn datatable_rejects_bad_filters() {
        let f = fixture();
        let err = f
            .svc
            .certificate_datatable(&root_principal(), &pairs(&[("date_of_sale_after", "soon")]))
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
    }

    #[test]
    fn details_then_advance_then_deliver() {
        let f = fixture();
        let p = contact_principal(&[&f.acme]);

        let prepared = f.svc.submit_details(&p, 1, sample_details()).unwrap();
        assert_eq!(prepared.status, CertificateStatus::Prepared);
        assert_eq!(prepared.date_of_issue, Some(now().date_naive()));
        assert!(prepared.date_of_expiry.is_some());

        let err = f.svc.submit_details(&p, 1, sample_details()).unwrap_err();
        assert_eq!(err.error_code(), "READ_ONLY");

        let shipped = f.svc.advance_status(&p, 1).unwrap();
        assert_eq!(shipped.status, CertificateStatus::Shipped);
        assert!(shipped.date_of_shipment.is_some());
        let delivered = f.svc.advance_status(&p, 1).unwrap();
        assert_eq!(delivered.status, CertificateStatus::Delivered);
        assert!(delivered.date_of_delivery.is_some());

        let err = f.svc.advance_status(&p, 1).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
    }

    #[test]
    fn available_cannot_advance() {
        let f = fixture();
        let err = f.svc.advance_status(&root_principal(), 2).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
    }

    #[test]
    fn invalid_details_change_nothing() {
        let f = fixture();
        let root = root_principal();
        let mut details = sample_details();
        details.attested = false;
        let err = f.svc.submit_details(&root, 1, details).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
        assert_eq!(
            f.svc.get_certificate(&root, 1).unwrap().status,
            CertificateStatus::Available
        );
    }

    #[test]
    fn details_checked_against_managed_lists() {
        let f = fixture();
        let root = root_principal();
        let p = contact_principal(&[&f.acme]);
        f.svc.create_lookup(&root, LookupKind::HsCode, LookupEntry::new("7102.21", 0)).unwrap();
        f.svc.create_lookup(&root, LookupKind::PortOfExport, LookupEntry::new("JFK", 0)).unwrap();

        let err = f.svc.submit_details(&p, 1, sample_details()).unwrap_err();
        match err {
            ServiceError::Form(errors) => {
                assert!(errors.has_field("harmonizedCode"));
                assert!(!errors.has_field("portOfExport"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let mut details = sample_details();
        details.harmonized_code = Some("7102.21".into());
        let prepared = f.svc.submit_details(&p, 1, details).unwrap();
        assert_eq!(prepared.harmonized_code.as_deref(), Some("7102.21"));
    }

    #[test]
    fn void_reason_from_managed_list() {
        let f = fixture();
        let root = root_principal();
        let p = contact_principal(&[&f.acme]);
        // Free text until reasons are configured.
        f.svc.void_certificate(&p, 1, "coffee spill").unwrap();

        f.svc.create_lookup(&root, LookupKind::VoidReason, LookupEntry::new("Misprint", 0)).unwrap();
        let err = f.svc.void_certificate(&p, 2, "coffee spill").unwrap_err();
        match err {
            ServiceError::Form(errors) => assert!(errors.has_field("reason")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(f.svc.get_certificate(&p, 2).unwrap().status, CertificateStatus::Available);

        let voided = f.svc.void_certificate(&p, 2, " Misprint ").unwrap();
        assert_eq!(voided.notes, "Voided: Misprint");
        f.svc.void_certificate(&p, 3, "").unwrap();
    }

    #[test]
    fn auditors_cannot_modify() {
        let f = fixture();
        let auditor = auditor_principal();
        assert!(f.svc.get_certificate(&auditor, 1).is_ok());
        let err = f.svc.submit_details(&auditor, 1, sample_details()).unwrap_err();
        assert_eq!(err.error_code(), "PERMISSION_DENIED");
        assert!(f.svc.void_certificate(&auditor, 1, "x").is_err());
    }

    #[test]
    fn void_is_terminal() {
        let f = fixture();
        let p = contact_principal(&[&f.acme]);
        let voided = f.svc.void_certificate(&p, 2, "lost in transit").unwrap();
        assert_eq!(voided.status, CertificateStatus::Void);
        assert!(voided.void);
        assert_eq!(voided.notes, "Voided: lost in transit");

        assert_eq!(f.svc.void_certificate(&p, 2, "again").unwrap_err().error_code(), "READ_ONLY");
        assert_eq!(f.svc.advance_status(&p, 2).unwrap_err().error_code(), "READ_ONLY");
        assert_eq!(
            f.svc.submit_details(&p, 2, sample_details()).unwrap_err().error_code(),
            "READ_ONLY"
        );
        assert!(f.svc.void_certificate(&p, 10, "not mine").is_err());
    }
}
