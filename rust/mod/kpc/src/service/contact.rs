use serde::Deserialize;
use tracing::{info, warn};

use kpc_core::{FormErrors, ListParams, ListResult, ServiceError, new_id, now};
use kpc_sql::{Executor, SQLError, Value};

use crate::access::{authorize, Action, Principal};
use crate::model::Contact;
use crate::password::{hash_password, verify_password};
use super::{insert_statement, storage_err, to_json, KpcService};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Contact creation body: the contact plus its initial password.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    #[serde(flatten)]
    pub contact: Contact,
    pub password: String,
}

fn contact_indexes(contact: &Contact) -> Vec<(&'static str, Value)> {
    vec![
        ("username", Value::Text(contact.username.clone())),
        ("is_active", Value::Integer(contact.is_active as i64)),
        ("update_at", Value::opt_text(contact.updated_at.map(|t| t.to_rfc3339()))),
    ]
}

fn link_licensees(tx: &dyn Executor, contact: &Contact) -> Result<(), SQLError> {
    tx.exec(
        "DELETE FROM contact_licensees WHERE contact_id = ?1",
        &[Value::Text(contact.id.clone())],
    )?;
    for licensee_id in &contact.licensees {
        tx.exec(
            "INSERT OR IGNORE INTO contact_licensees (contact_id, licensee_id) VALUES (?1, ?2)",
            &[Value::Text(contact.id.clone()), Value::Text(licensee_id.clone())],
        )?;
    }
    Ok(())
}

fn conflict_or_storage(e: SQLError, username: &str) -> ServiceError {
    if e.is_constraint() {
        ServiceError::Conflict(format!("username {} is already taken", username))
    } else {
        storage_err(e)
    }
}

impl KpcService {
    pub fn create_contact(
        &self,
        principal: &Principal,
        input: NewContact,
    ) -> Result<Contact, ServiceError> {
        authorize(principal, Action::ManageContacts)?;
        let created = self.insert_contact(input.contact, &input.password)?;
        info!(id = %created.id, username = %created.username, "contact created");
        Ok(created)
    }

    pub(crate) fn insert_contact(
        &self,
        mut contact: Contact,
        password: &str,
    ) -> Result<Contact, ServiceError> {
        self.check_contact(&contact, Some(password))?;

        let ts = now();
        contact.id = new_id();
        contact.created_at = Some(ts);
        contact.updated_at = Some(ts);

        let hash = hash_password(password).map_err(ServiceError::Internal)?;
        let mut indexes = contact_indexes(&contact);
        indexes.push(("password_hash", Value::Text(hash)));
        indexes.push(("create_at", Value::Text(ts.to_rfc3339())));
        let (sql, params) = insert_statement("contacts", &contact.id, to_json(&contact)?, &indexes);

        self.sql
            .transaction(&mut |tx: &dyn Executor| {
                tx.exec(&sql, &params)?;
                link_licensees(tx, &contact)
            })
            .map_err(|e| conflict_or_storage(e, &contact.username))?;

        Ok(contact)
    }

    /// Staff may read any contact; everyone may read themselves.
    pub fn get_contact(&self, principal: &Principal, id: &str) -> Result<Contact, ServiceError> {
        if principal.user_id != id {
            authorize(principal, Action::ManageContacts)?;
        }
        self.get_contact_record(id)
    }

    pub(crate) fn get_contact_record(&self, id: &str) -> Result<Contact, ServiceError> {
        self.get_record("contacts", id)
    }

    pub fn list_contacts(
        &self,
        principal: &Principal,
        params: &ListParams,
    ) -> Result<ListResult<Contact>, ServiceError> {
        authorize(principal, Action::ManageContacts)?;
        self.list_records("contacts", &[], "username ASC", params.effective_limit(), params.offset)
    }

    /// Merge-patch a contact. A `password` key in the patch replaces the
    /// stored hash.
    pub fn update_contact(
        &self,
        principal: &Principal,
        id: &str,
        mut patch: serde_json::Value,
    ) -> Result<Contact, ServiceError> {
        authorize(principal, Action::ManageContacts)?;
        let password = patch
            .as_object_mut()
            .and_then(|obj| obj.remove("password"))
            .and_then(|v| v.as_str().map(String::from));

        let current = self.get_contact_record(id)?;
        let updated: Contact = Self::apply_patch(&current, patch)?;
        self.check_contact(&updated, password.as_deref())?;

        let mut sets = vec!["data = ?1".to_string()];
        let mut params = vec![Value::Text(to_json(&updated)?)];
        let mut indexes = contact_indexes(&updated);
        if let Some(ref pw) = password {
            indexes.push(("password_hash", Value::Text(hash_password(pw).map_err(ServiceError::Internal)?)));
        }
        for (col, val) in indexes {
            params.push(val);
            sets.push(format!("{} = ?{}", col, params.len()));
        }
        params.push(Value::Text(id.to_string()));
        let sql = format!("UPDATE contacts SET {} WHERE id = ?{}", sets.join(", "), params.len());

        self.sql
            .transaction(&mut |tx: &dyn Executor| {
                tx.exec(&sql, &params)?;
                link_licensees(tx, &updated)
            })
            .map_err(|e| conflict_or_storage(e, &updated.username))?;

        Ok(updated)
    }

    /// Check a username and password; inactive contacts cannot log in.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Contact, ServiceError> {
        let rows = self.sql
            .query(
                "SELECT data, password_hash FROM contacts WHERE username = ?1",
                &[Value::Text(username.to_string())],
            )
            .map_err(storage_err)?;

        let denied = || ServiceError::Unauthorized("invalid username or password".into());
        let row = rows.first().ok_or_else(denied)?;
        let hash = row.get_str("password_hash").unwrap_or("");
        if !verify_password(password, hash) {
            warn!(username, "failed contact login");
            return Err(denied());
        }

        let contact: Contact = super::decode_row(row, "data")?;
        if !contact.is_active {
            return Err(denied());
        }
        Ok(contact)
    }

    fn check_contact(&self, contact: &Contact, password: Option<&str>) -> Result<(), ServiceError> {
        let mut errors = FormErrors::new();
        if contact.username.trim().is_empty() {
            errors.add("username", "This field is required.");
        }
        if let Some(ref email) = contact.email {
            if !email.is_empty() && !email.contains('@') {
                errors.add("email", "Enter a valid email address.");
            }
        }
        if let Some(pw) = password {
            if pw.chars().count() < MIN_PASSWORD_LEN {
                errors.add(
                    "password",
                    format!("Ensure this value has at least {} characters.", MIN_PASSWORD_LEN),
                );
            }
        }
        for licensee_id in &contact.licensees {
            match self.get_licensee_record(licensee_id) {
                Ok(_) => {}
                Err(ServiceError::NotFound(_)) => errors.add(
                    "licensees",
                    format!("Select a valid choice. {} is not one of the available choices.", licensee_id),
                ),
                Err(e) => return Err(e),
            }
        }
        errors.into_result().map_err(ServiceError::from)
    }
}
