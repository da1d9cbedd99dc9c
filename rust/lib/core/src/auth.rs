//! Token claims shared by the server binary and the registry module.
//!
//! The binary validates bearer tokens and stores the decoded `Claims` in
//! request extensions. Modules read them back and resolve the caller's
//! role and licensee memberships from their own storage.

use serde::{Deserialize, Serialize};

/// Subject used for the configured superuser account.
pub const ROOT_SUBJECT: &str = "root";

/// JWT claims payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: contact id, or [`ROOT_SUBJECT`].
    pub sub: String,
    /// Display name.
    pub name: String,
    /// Session id.
    pub sid: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

impl Claims {
    /// Build claims for a subject valid for `ttl_secs` from now.
    pub fn issue(sub: &str, name: &str, ttl_secs: u64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: sub.to_string(),
            name: name.to_string(),
            sid: crate::new_id(),
            iat: now,
            exp: now + ttl_secs as i64,
        }
    }

    /// Check if this token belongs to the configured superuser.
    pub fn is_root(&self) -> bool {
        self.sub == ROOT_SUBJECT
    }
}
