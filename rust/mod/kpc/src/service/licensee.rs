use serde::Serialize;
use tracing::info;

use kpc_core::{ListParams, ListResult, ServiceError, new_id, now};
use kpc_sql::Value;

use crate::access::{authorize, Action, Principal, Scope};
use crate::model::{Contact, Licensee};
use super::{decode_row, storage_err, KpcService};

/// Contact option offered once a licensee is chosen on the registration
/// form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactChoice {
    pub id: String,
    pub name: String,
}

fn licensee_indexes(lic: &Licensee) -> Vec<(&'static str, Value)> {
    vec![
        ("name", Value::Text(lic.name.clone())),
        ("is_active", Value::Integer(lic.is_active as i64)),
        ("update_at", Value::opt_text(lic.updated_at.map(|t| t.to_rfc3339()))),
    ]
}

impl KpcService {
    pub fn create_licensee(
        &self,
        principal: &Principal,
        licensee: Licensee,
    ) -> Result<Licensee, ServiceError> {
        authorize(principal, Action::ManageLicensees)?;
        licensee.validate()?;
        let created = self.insert_licensee(licensee)?;
        info!(id = %created.id, name = %created.name, "licensee created");
        Ok(created)
    }

    pub(crate) fn insert_licensee(&self, mut licensee: Licensee) -> Result<Licensee, ServiceError> {
        let ts = now();
        licensee.id = new_id();
        licensee.created_at = Some(ts);
        licensee.updated_at = Some(ts);

        let mut indexes = licensee_indexes(&licensee);
        indexes.push(("create_at", Value::Text(ts.to_rfc3339())));
        self.insert_record("licensees", &licensee.id, &licensee, &indexes)?;
        Ok(licensee)
    }

    pub fn get_licensee(&self, principal: &Principal, id: &str) -> Result<Licensee, ServiceError> {
        let scope = authorize(principal, Action::ViewLicensees)?;
        if !scope.allows(Some(id)) {
            return Err(ServiceError::PermissionDenied(format!(
                "licensee {} is not visible to {}",
                id, principal.user_id
            )));
        }
        self.get_licensee_record(id)
    }

    pub(crate) fn get_licensee_record(&self, id: &str) -> Result<Licensee, ServiceError> {
        self.get_record("licensees", id)
    }

    /// All licensees for staff; a contact sees its own active licensees.
    pub fn list_licensees(
        &self,
        principal: &Principal,
        params: &ListParams,
    ) -> Result<ListResult<Licensee>, ServiceError> {
        let limit = params.effective_limit();
        match authorize(principal, Action::ViewLicensees)? {
            Scope::All => self.list_records("licensees", &[], "name ASC", limit, params.offset),
            Scope::Licensees(ids) => {
                let mut items = ids
                    .iter()
                    .map(|id| self.get_licensee_record(id))
                    .collect::<Result<Vec<_>, _>>()?;
                items.sort_by(|a, b| a.name.cmp(&b.name));
                let total = items.len();
                let items = items.into_iter().skip(params.offset).take(limit).collect();
                Ok(ListResult { items, total })
            }
        }
    }

    pub fn update_licensee(
        &self,
        principal: &Principal,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<Licensee, ServiceError> {
        authorize(principal, Action::ManageLicensees)?;
        let current = self.get_licensee_record(id)?;
        let updated: Licensee = Self::apply_patch(&current, patch)?;
        updated.validate()?;
        self.update_record("licensees", id, &updated, &licensee_indexes(&updated))?;
        if current.is_active != updated.is_active {
            info!(id, active = updated.is_active, "licensee activation changed");
        }
        Ok(updated)
    }

    /// Contacts of `licensee_id` as `{id, name}` choices.
    pub fn licensee_contacts(
        &self,
        principal: &Principal,
        licensee_id: &str,
    ) -> Result<Vec<ContactChoice>, ServiceError> {
        authorize(principal, Action::RegisterCertificates)?;
        Ok(self
            .contacts_of_licensee(licensee_id)?
            .into_iter()
            .map(|c| ContactChoice {
                name: c.display_name(),
                id: c.id,
            })
            .collect())
    }

    pub(crate) fn contacts_of_licensee(&self, licensee_id: &str) -> Result<Vec<Contact>, ServiceError> {
        let rows = self.sql
            .query(
                "SELECT c.data FROM contacts c
                 JOIN contact_licensees cl ON cl.contact_id = c.id
                 WHERE cl.licensee_id = ?1
                 ORDER BY c.username",
                &[Value::Text(licensee_id.to_string())],
            )
            .map_err(storage_err)?;
        rows.iter().map(|row| decode_row(row, "data")).collect()
    }

    /// Ids of the active licensees a contact is linked to.
    pub(crate) fn active_licensee_ids_of(&self, contact_id: &str) -> Result<Vec<String>, ServiceError> {
        let rows = self.sql
            .query(
                "SELECT l.id FROM licensees l
                 JOIN contact_licensees cl ON cl.licensee_id = l.id
                 WHERE cl.contact_id = ?1 AND l.is_active = 1
                 ORDER BY l.name",
                &[Value::Text(contact_id.to_string())],
            )
            .map_err(storage_err)?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get_str("id").map(String::from))
            .collect())
    }
}
