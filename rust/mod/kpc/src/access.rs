//! Roles, actions and the single authorization decision.
//!
//! Every service entry point turns the caller into a [`Principal`] and
//! asks [`authorize`] for the [`Scope`] it may operate in. Searches and
//! single-certificate lookups then narrow to that scope.

use kpc_core::ServiceError;
use serde::Serialize;

use crate::model::CertificateStatus;

/// What kind of account is calling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Registry staff: registers certificates, manages licensees.
    Superuser,
    /// Read-only visibility across all licensees.
    Auditor,
    /// Works on behalf of the licensees it is linked to.
    Contact,
}

/// Resolved caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: String,
    pub name: String,
    pub role: Role,
    /// Active licensees the caller acts for. Empty for staff.
    pub licensees: Vec<String>,
}

/// Operations subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    RegisterCertificates,
    ViewCertificates,
    EditCertificate,
    ViewLicensees,
    ManageLicensees,
    ManageContacts,
    ViewReceipts,
    ViewConfig,
    UpdateConfig,
    ViewLookups,
    ManageLookups,
    ManageAddresses,
}

/// Set of licensees whose records an action may touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    Licensees(Vec<String>),
}

impl Scope {
    pub fn allows(&self, licensee_id: Option<&str>) -> bool {
        match self {
            Scope::All => true,
            Scope::Licensees(ids) => licensee_id
                .map(|id| ids.iter().any(|l| l == id))
                .unwrap_or(false),
        }
    }
}

impl Principal {
    /// Status set applied when a certificate search carries no filters.
    pub fn default_statuses(&self) -> &'static [CertificateStatus] {
        match self.role {
            Role::Auditor => &CertificateStatus::DEFAULT_AUDITOR_SEARCH,
            Role::Superuser | Role::Contact => &CertificateStatus::DEFAULT_SEARCH,
        }
    }

    fn own_scope(&self) -> Scope {
        match self.role {
            Role::Superuser | Role::Auditor => Scope::All,
            Role::Contact => Scope::Licensees(self.licensees.clone()),
        }
    }
}

/// Decide whether `principal` may perform `action`, and over which scope.
pub fn authorize(principal: &Principal, action: Action) -> Result<Scope, ServiceError> {
    let allowed = match action {
        Action::RegisterCertificates
        | Action::ManageLicensees
        | Action::ManageContacts
        | Action::ViewReceipts
        | Action::UpdateConfig
        | Action::ManageLookups => principal.role == Role::Superuser,
        Action::EditCertificate | Action::ManageAddresses => principal.role != Role::Auditor,
        Action::ViewCertificates
        | Action::ViewLicensees
        | Action::ViewConfig
        | Action::ViewLookups => true,
    };

    if !allowed {
        return Err(ServiceError::PermissionDenied(format!(
            "user {} may not perform {:?}",
            principal.user_id, action
        )));
    }

    Ok(principal.own_scope())
}
