//! Server-side processing for the certificate table (DataTables protocol).

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::model::Certificate;

/// Largest page the table may request.
pub const MAX_DISPLAY_LENGTH: usize = 500;

const DEFAULT_LENGTH: usize = 10;

/// Column order as rendered by the table, with the SQL expression used to
/// sort on each.
pub const COLUMNS: [(&str, &str); 14] = [
    ("number", "c.number"),
    ("status", "c.status"),
    ("consignee", "c.consignee"),
    ("last_modified", "c.last_modified"),
    ("shipped_value", "c.shipped_value"),
    ("licensee__name", "l.name"),
    ("aes", "c.aes"),
    ("date_of_issue", "c.date_of_issue"),
    ("date_of_sale", "c.date_of_sale"),
    ("date_of_expiry", "c.date_of_expiry"),
    ("number_of_parcels", "c.number_of_parcels"),
    ("carat_weight", "c.carat_weight"),
    ("harmonized_code", "c.harmonized_code"),
    ("exporter", "c.exporter"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Paging, ordering and search parameters sent by the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatatableRequest {
    pub draw: u64,
    pub start: usize,
    pub length: usize,
    pub order_column: usize,
    pub order_dir: SortDir,
    /// Certificate number prefix.
    pub search: Option<String>,
}

impl Default for DatatableRequest {
    fn default() -> Self {
        Self {
            draw: 0,
            start: 0,
            length: DEFAULT_LENGTH,
            order_column: 0,
            order_dir: SortDir::Asc,
            search: None,
        }
    }
}

impl DatatableRequest {
    /// Read the protocol keys from query pairs; malformed values fall back
    /// to defaults. `length=-1` asks for the largest page.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut req = Self::default();
        for (key, value) in pairs {
            let value = value.trim();
            match key.as_str() {
                "draw" => req.draw = value.parse().unwrap_or(0),
                "start" => req.start = value.parse().unwrap_or(0),
                "length" => {
                    req.length = match value.parse::<i64>() {
                        Ok(n) if n < 0 => MAX_DISPLAY_LENGTH,
                        Ok(0) | Err(_) => DEFAULT_LENGTH,
                        Ok(n) => (n as usize).min(MAX_DISPLAY_LENGTH),
                    }
                }
                "order[0][column]" => {
                    req.order_column = value
                        .parse::<usize>()
                        .ok()
                        .filter(|i| *i < COLUMNS.len())
                        .unwrap_or(0)
                }
                "order[0][dir]" => {
                    req.order_dir = if value.eq_ignore_ascii_case("desc") {
                        SortDir::Desc
                    } else {
                        SortDir::Asc
                    }
                }
                "search[value]" => {
                    req.search = if value.is_empty() { None } else { Some(value.to_string()) }
                }
                _ => {}
            }
        }
        req
    }

    /// `ORDER BY` clause; ties broken by number so pages are stable.
    pub fn order_sql(&self) -> String {
        let (_, expr) = COLUMNS[self.order_column];
        if self.order_column == 0 {
            format!(" ORDER BY {} {}", expr, self.order_dir.sql())
        } else {
            format!(" ORDER BY {} {}, c.number ASC", expr, self.order_dir.sql())
        }
    }
}

/// One table row; field names match the column keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificateRow {
    pub number: String,
    pub status: String,
    pub consignee: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub shipped_value: Option<Decimal>,
    #[serde(rename = "licensee__name")]
    pub licensee_name: Option<String>,
    pub aes: Option<String>,
    pub date_of_issue: Option<NaiveDate>,
    pub date_of_sale: Option<NaiveDate>,
    pub date_of_expiry: Option<NaiveDate>,
    pub number_of_parcels: Option<u32>,
    pub carat_weight: Option<Decimal>,
    pub harmonized_code: Option<String>,
    pub exporter: Option<String>,
}

impl CertificateRow {
    pub fn new(cert: Certificate, licensee_name: Option<String>) -> Self {
        Self {
            number: cert.display_name(),
            status: cert.status.label().to_string(),
            consignee: cert.consignee,
            last_modified: cert.last_modified,
            shipped_value: cert.shipped_value,
            licensee_name,
            aes: cert.aes,
            date_of_issue: cert.date_of_issue,
            date_of_sale: cert.date_of_sale,
            date_of_expiry: cert.date_of_expiry,
            number_of_parcels: cert.number_of_parcels,
            carat_weight: cert.carat_weight,
            harmonized_code: cert.harmonized_code,
            exporter: cert.exporter,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatatableResponse {
    pub draw: u64,
    pub records_total: usize,
    pub records_filtered: usize,
    pub data: Vec<CertificateRow>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CertificateStatus;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn reads_protocol_keys() {
        let req = DatatableRequest::from_pairs(&pairs(&[
            ("draw", "3"),
            ("start", "20"),
            ("length", "25"),
            ("order[0][column]", "5"),
            ("order[0][dir]", "desc"),
            ("search[value]", "US12"),
            ("status", "1"),
        ]));
        assert_eq!(req.draw, 3);
        assert_eq!(req.start, 20);
        assert_eq!(req.length, 25);
        assert_eq!(req.order_dir, SortDir::Desc);
        assert_eq!(req.search.as_deref(), Some("US12"));
        assert_eq!(req.order_sql(), " ORDER BY l.name DESC, c.number ASC");
    }

    #[test]
    fn length_is_capped() {
        let req = DatatableRequest::from_pairs(&pairs(&[("length", "10000")]));
        assert_eq!(req.length, MAX_DISPLAY_LENGTH);
        let req = DatatableRequest::from_pairs(&pairs(&[("length", "-1")]));
        assert_eq!(req.length, MAX_DISPLAY_LENGTH);
        let req = DatatableRequest::from_pairs(&pairs(&[("length", "abc")]));
        assert_eq!(req.length, DEFAULT_LENGTH);
    }

    #[test]
    fn unknown_order_column_falls_back_to_number() {
        let req = DatatableRequest::from_pairs(&pairs(&[("order[0][column]", "99")]));
        assert_eq!(req.order_column, 0);
        assert_eq!(req.order_sql(), " ORDER BY c.number ASC");
    }

    #[test]
    fn row_uses_fixed_columns() {
        let mut cert = Certificate::new_available(42, Utc::now());
        cert.status = CertificateStatus::Prepared;
        cert.exporter = Some("Acme".into());
        let row = CertificateRow::new(cert, Some("Acme Rough".into()));
        let json = serde_json::to_value(&row).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        let mut expected: Vec<&str> = COLUMNS.iter().map(|(k, _)| *k).collect();
        expected.sort_unstable();
        let mut keys = keys;
        keys.sort_unstable();
        assert_eq!(keys, expected);
        assert_eq!(json["number"], "US42");
        assert_eq!(json["status"], "Prepared");
        assert_eq!(json["licensee__name"], "Acme Rough");
    }

    #[test]
    fn response_uses_protocol_names() {
        let resp = DatatableResponse {
            draw: 2,
            records_total: 10,
            records_filtered: 4,
            data: vec![],
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["recordsTotal"], 10);
        assert_eq!(json["recordsFiltered"], 4);
        assert_eq!(json["draw"], 2);
    }
}
