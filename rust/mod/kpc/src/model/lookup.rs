use chrono::{DateTime, Utc};
use kpc_core::FormErrors;
use serde::{Deserialize, Serialize};

/// Staff-managed choice lists offered on certificate forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    /// Reasons offered when voiding a certificate.
    VoidReason,
    /// Harmonized System codes for rough diamonds.
    HsCode,
    PortOfExport,
}

impl LookupKind {
    pub const ALL: [LookupKind; 3] = [LookupKind::VoidReason, LookupKind::HsCode, LookupKind::PortOfExport];

    pub fn table(self) -> &'static str {
        match self {
            LookupKind::VoidReason => "void_reasons",
            LookupKind::HsCode => "hs_codes",
            LookupKind::PortOfExport => "ports_of_export",
        }
    }

    /// Path segment under `/v1`.
    pub fn segment(self) -> &'static str {
        match self {
            LookupKind::VoidReason => "void-reasons",
            LookupKind::HsCode => "hs-codes",
            LookupKind::PortOfExport => "ports-of-export",
        }
    }

    pub fn max_len(self) -> usize {
        match self {
            LookupKind::VoidReason => 500,
            LookupKind::HsCode => 12,
            LookupKind::PortOfExport => 50,
        }
    }
}

/// One entry of a choice list. Lists order by `sort_order`, then `value`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LookupEntry {
    #[serde(default)]
    pub id: String,

    pub value: String,

    #[serde(default)]
    pub sort_order: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl LookupEntry {
    pub fn new(value: &str, sort_order: i64) -> Self {
        LookupEntry {
            id: String::new(),
            value: value.to_string(),
            sort_order,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn validate(&self, kind: LookupKind) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        let value = self.value.trim();
        if value.is_empty() {
            errors.add("value", "This field is required.");
        } else if value.chars().count() > kind.max_len() {
            errors.add(
                "value",
                format!("Ensure this value has at most {} characters.", kind.max_len()),
            );
        }
        errors.into_result()
    }
}
