use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A person who logs in to the registry. Licensee contacts are linked to
/// one or more licensees; staff accounts carry the superuser or auditor
/// flag instead.
///
/// The password hash is kept in its own column and never appears here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default)]
    pub id: String,

    pub username: String,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Licensee ids this contact acts for.
    #[serde(default)]
    pub licensees: Vec<String>,

    #[serde(default)]
    pub is_superuser: bool,

    #[serde(default)]
    pub is_auditor: bool,

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

impl Contact {
    /// "First Last", or the username when no name is on file.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }

    pub fn belongs_to(&self, licensee_id: &str) -> bool {
        self.licensees.iter().any(|l| l == licensee_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_contact;

    #[test]
    fn display_name_falls_back_to_username() {
        let mut c = sample_contact("jdoe", &[]);
        assert_eq!(c.display_name(), "jdoe");
        c.first_name = "Jane".into();
        assert_eq!(c.display_name(), "Jane");
        c.last_name = "Doe".into();
        assert_eq!(c.display_name(), "Jane Doe");
    }

    #[test]
    fn membership() {
        let c = sample_contact("jdoe", &["lic-a", "lic-b"]);
        assert!(c.belongs_to("lic-b"));
        assert!(!c.belongs_to("lic-c"));
    }
}
