//! Certificate search: query-string filters and the SQL predicate they
//! translate to.
//!
//! The predicate always starts from the caller's [`Scope`]. Filters are
//! ANDed on top. Column references assume the certificates table is
//! aliased `c` and licensees `l`.

use chrono::NaiveDate;
use kpc_core::FormErrors;
use kpc_sql::Value;

use crate::access::{Principal, Scope};
use crate::model::CertificateStatus;

/// Date columns that accept `_after` / `_before` bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    Issue,
    Sale,
    Expiry,
    Shipment,
    Delivery,
}

impl DateField {
    pub const ALL: [DateField; 5] = [
        Self::Issue,
        Self::Sale,
        Self::Expiry,
        Self::Shipment,
        Self::Delivery,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Issue => "date_of_issue",
            Self::Sale => "date_of_sale",
            Self::Expiry => "date_of_expiry",
            Self::Shipment => "date_of_shipment",
            Self::Delivery => "date_of_delivery",
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::Issue => "c.date_of_issue",
            Self::Sale => "c.date_of_sale",
            Self::Expiry => "c.date_of_expiry",
            Self::Shipment => "c.date_of_shipment",
            Self::Delivery => "c.date_of_delivery",
        }
    }
}

/// Inclusive bounds on one date column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub field: DateField,
    pub after: Option<NaiveDate>,
    pub before: Option<NaiveDate>,
}

/// Parsed certificate filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateFilter {
    pub statuses: Vec<CertificateStatus>,
    pub licensee: Option<String>,
    pub dates: Vec<DateRange>,
    pub exporter: Option<String>,
    pub consignee: Option<String>,
    /// Digits the certificate number must start with.
    pub number_prefix: Option<String>,
}

impl CertificateFilter {
    /// Parse query pairs. Unknown keys are ignored so paging and table
    /// parameters can share the query string. Blank values count as absent.
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, FormErrors> {
        let mut filter = Self::default();
        let mut errors = FormErrors::new();

        for (key, value) in pairs {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "status" => match CertificateStatus::parse(value) {
                    Some(status) => {
                        if !filter.statuses.contains(&status) {
                            filter.statuses.push(status);
                        }
                    }
                    None => errors.add(
                        "status",
                        format!("Select a valid choice. {} is not one of the available choices.", value),
                    ),
                },
                "licensee" => filter.licensee = Some(value.to_string()),
                "exporter" => filter.exporter = Some(value.to_string()),
                "consignee" => filter.consignee = Some(value.to_string()),
                "number" => filter.number_prefix = Some(strip_us_prefix(value).to_string()),
                other => {
                    if let Some((field, is_after)) = date_key(other) {
                        match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
                            Ok(date) => filter.set_date(field, is_after, date),
                            Err(_) => errors.add(other, "Enter a valid date."),
                        }
                    }
                }
            }
        }

        errors.into_result().map(|_| filter)
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply the role's default status set when no filter was given.
    pub fn or_default_for(mut self, principal: &Principal) -> Self {
        if self.is_empty() {
            self.statuses = principal.default_statuses().to_vec();
        }
        self
    }

    fn set_date(&mut self, field: DateField, is_after: bool, date: NaiveDate) {
        let pos = match self.dates.iter().position(|r| r.field == field) {
            Some(pos) => pos,
            None => {
                self.dates.push(DateRange { field, after: None, before: None });
                self.dates.len() - 1
            }
        };
        if is_after {
            self.dates[pos].after = Some(date);
        } else {
            self.dates[pos].before = Some(date);
        }
    }
}

fn date_key(key: &str) -> Option<(DateField, bool)> {
    DateField::ALL.into_iter().find_map(|field| {
        let rest = key.strip_prefix(field.key())?;
        match rest {
            "_after" => Some((field, true)),
            "_before" => Some((field, false)),
            _ => None,
        }
    })
}

/// `US1042` and `us1042` become `1042`; anything else is returned as is.
pub fn strip_us_prefix(raw: &str) -> &str {
    raw.strip_prefix("US")
        .or_else(|| raw.strip_prefix("us"))
        .unwrap_or(raw)
}

/// SQL `WHERE` fragments with positional parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    pub clauses: Vec<String>,
    pub params: Vec<Value>,
}

impl Predicate {
    /// Next free `?N` placeholder.
    fn placeholder(&mut self, value: Value) -> String {
        self.params.push(value);
        format!("?{}", self.params.len())
    }

    fn push_in(&mut self, column: &str, values: Vec<Value>) {
        if values.is_empty() {
            self.clauses.push("1 = 0".into());
            return;
        }
        let marks: Vec<String> = values.into_iter().map(|v| self.placeholder(v)).collect();
        self.clauses.push(format!("{} IN ({})", column, marks.join(", ")));
    }

    fn push_cmp(&mut self, column: &str, op: &str, value: Value) {
        let mark = self.placeholder(value);
        self.clauses.push(format!("{} {} {}", column, op, mark));
    }

    fn push_like(&mut self, expr: &str, pattern: String) {
        let mark = self.placeholder(Value::Text(pattern));
        self.clauses.push(format!("{} LIKE {} ESCAPE '\\'", expr, mark));
    }

    /// Restrict to certificates whose number starts with `prefix`.
    pub fn number_prefix(&mut self, prefix: &str) {
        self.push_like(
            "CAST(c.number AS TEXT)",
            format!("{}%", escape_like(strip_us_prefix(prefix.trim()))),
        );
    }

    /// ` WHERE a AND b`, or empty.
    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Scope first, then every filter, ANDed.
pub fn build_predicate(scope: &Scope, filter: &CertificateFilter) -> Predicate {
    let mut pred = Predicate::default();

    if let Scope::Licensees(ids) = scope {
        pred.push_in(
            "c.licensee_id",
            ids.iter().map(|id| Value::Text(id.clone())).collect(),
        );
    }

    if !filter.statuses.is_empty() {
        pred.push_in(
            "c.status",
            filter.statuses.iter().map(|s| Value::Integer(s.code())).collect(),
        );
    }

    if let Some(ref licensee) = filter.licensee {
        pred.push_cmp("c.licensee_id", "=", Value::Text(licensee.clone()));
    }

    for range in &filter.dates {
        if let Some(after) = range.after {
            pred.push_cmp(range.field.column(), ">=", Value::Text(after.to_string()));
        }
        if let Some(before) = range.before {
            pred.push_cmp(range.field.column(), "<=", Value::Text(before.to_string()));
        }
    }

    if let Some(ref exporter) = filter.exporter {
        pred.push_like("LOWER(c.exporter)", contains_pattern(exporter));
    }
    if let Some(ref consignee) = filter.consignee {
        pred.push_like("LOWER(c.consignee)", contains_pattern(consignee));
    }
    if let Some(ref prefix) = filter.number_prefix {
        pred.number_prefix(prefix);
    }

    pred
}

fn contains_pattern(raw: &str) -> String {
    format!("%{}%", escape_like(&raw.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn principal(role: Role) -> Principal {
        Principal {
            user_id: "u".into(),
            name: "U".into(),
            role,
            licensees: vec!["lic-a".into()],
        }
    }

    #[test]
    fn parses_every_key() {
        let filter = CertificateFilter::from_pairs(&pairs(&[
            ("status", "1"),
            ("status", "shipped"),
            ("status", "Prepared"),
            ("licensee", "lic-a"),
            ("date_of_issue_after", "2024-01-01"),
            ("date_of_issue_before", "2024-01-31"),
            ("date_of_delivery_before", "2024-03-01"),
            ("exporter", "Acme"),
            ("consignee", "Antwerp"),
            ("number", "US10"),
            ("limit", "20"),
        ]))
        .unwrap();

        assert_eq!(
            filter.statuses,
            vec![CertificateStatus::Prepared, CertificateStatus::Shipped]
        );
        assert_eq!(filter.licensee.as_deref(), Some("lic-a"));
        assert_eq!(filter.dates.len(), 2);
        assert_eq!(filter.dates[0].field, DateField::Issue);
        assert_eq!(filter.dates[0].after, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(filter.dates[0].before, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(filter.dates[1].field, DateField::Delivery);
        assert_eq!(filter.number_prefix.as_deref(), Some("10"));
    }

    #[test]
    fn bad_values_reported_per_key() {
        let errors = CertificateFilter::from_pairs(&pairs(&[
            ("status", "lost"),
            ("date_of_sale_after", "01/02/2024"),
        ]))
        .unwrap_err();
        assert!(errors.has_field("status"));
        assert_eq!(errors.field("date_of_sale_after"), ["Enter a valid date.".to_string()]);
    }

    #[test]
    fn blank_values_ignored() {
        let filter = CertificateFilter::from_pairs(&pairs(&[("status", ""), ("exporter", "  ")])).unwrap();
        assert!(filter.is_empty());
    }

    #[test]
    fn default_statuses_only_when_unfiltered() {
        let empty = CertificateFilter::default().or_default_for(&principal(Role::Contact));
        assert_eq!(empty.statuses, CertificateStatus::DEFAULT_SEARCH.to_vec());

        let audit = CertificateFilter::default().or_default_for(&principal(Role::Auditor));
        assert_eq!(audit.statuses, CertificateStatus::DEFAULT_AUDITOR_SEARCH.to_vec());

        let filtered = CertificateFilter {
            exporter: Some("x".into()),
            ..Default::default()
        }
        .or_default_for(&principal(Role::Contact));
        assert!(filtered.statuses.is_empty());
    }

    #[test]
    fn predicate_scopes_before_filters() {
        let scope = Scope::Licensees(vec!["lic-a".into(), "lic-b".into()]);
        let filter = CertificateFilter {
            statuses: vec![CertificateStatus::Available],
            exporter: Some("50%_Co".into()),
            ..Default::default()
        };
        let pred = build_predicate(&scope, &filter);
        assert_eq!(
            pred.clauses,
            vec![
                "c.licensee_id IN (?1, ?2)".to_string(),
                "c.status IN (?3)".to_string(),
                "LOWER(c.exporter) LIKE ?4 ESCAPE '\\'".to_string(),
            ]
        );
        assert_eq!(pred.params[2], Value::Integer(0));
        assert_eq!(pred.params[3], Value::Text("%50\\%\\_co%".into()));
        assert!(pred.where_sql().starts_with(" WHERE c.licensee_id IN"));
    }

    #[test]
    fn empty_scope_matches_nothing() {
        let pred = build_predicate(&Scope::Licensees(vec![]), &CertificateFilter::default());
        assert_eq!(pred.clauses, vec!["1 = 0".to_string()]);
        assert!(pred.params.is_empty());
    }

    #[test]
    fn unrestricted_scope_without_filters() {
        let pred = build_predicate(&Scope::All, &CertificateFilter::default());
        assert_eq!(pred.where_sql(), "");
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let filter = CertificateFilter::from_pairs(&pairs(&[
            ("date_of_expiry_after", "2024-05-01"),
            ("date_of_expiry_before", "2024-05-31"),
        ]))
        .unwrap();
        let pred = build_predicate(&Scope::All, &filter);
        assert_eq!(
            pred.clauses,
            vec!["c.date_of_expiry >= ?1".to_string(), "c.date_of_expiry <= ?2".to_string()]
        );
        assert_eq!(pred.params[0], Value::Text("2024-05-01".into()));
    }

    #[test]
    fn number_prefix_strips_us() {
        let mut pred = Predicate::default();
        pred.number_prefix("us12");
        assert_eq!(pred.params, vec![Value::Text("12%".into())]);
    }
}
