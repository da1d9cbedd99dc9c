use tracing::info;

use kpc_core::{ListParams, ListResult, ServiceError, new_id, now};
use kpc_sql::Value;

use crate::access::{authorize, Action, Principal};
use crate::model::{LookupEntry, LookupKind};
use super::{storage_err, KpcService};

const LOOKUP_ORDER: &str = "sort_order ASC, value ASC";

fn lookup_indexes(entry: &LookupEntry) -> Vec<(&'static str, Value)> {
    vec![
        ("value", Value::Text(entry.value.clone())),
        ("sort_order", Value::Integer(entry.sort_order)),
        ("update_at", Value::opt_text(entry.updated_at.map(|t| t.to_rfc3339()))),
    ]
}

impl KpcService {
    pub fn create_lookup(
        &self,
        principal: &Principal,
        kind: LookupKind,
        entry: LookupEntry,
    ) -> Result<LookupEntry, ServiceError> {
        authorize(principal, Action::ManageLookups)?;
        let created = self.insert_lookup(kind, entry)?;
        info!(kind = kind.table(), value = %created.value, "lookup entry created");
        Ok(created)
    }

    pub(crate) fn insert_lookup(
        &self,
        kind: LookupKind,
        mut entry: LookupEntry,
    ) -> Result<LookupEntry, ServiceError> {
        entry.value = entry.value.trim().to_string();
        entry.validate(kind)?;

        let ts = now();
        entry.id = new_id();
        entry.created_at = Some(ts);
        entry.updated_at = Some(ts);

        let mut indexes = lookup_indexes(&entry);
        indexes.push(("create_at", Value::Text(ts.to_rfc3339())));
        self.insert_record(kind.table(), &entry.id, &entry, &indexes)?;
        Ok(entry)
    }

    pub fn list_lookups(
        &self,
        principal: &Principal,
        kind: LookupKind,
        params: &ListParams,
    ) -> Result<ListResult<LookupEntry>, ServiceError> {
        authorize(principal, Action::ViewLookups)?;
        self.list_records(kind.table(), &[], LOOKUP_ORDER, params.effective_limit(), params.offset)
    }

    pub fn update_lookup(
        &self,
        principal: &Principal,
        kind: LookupKind,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<LookupEntry, ServiceError> {
        authorize(principal, Action::ManageLookups)?;
        let current: LookupEntry = self.get_record(kind.table(), id)?;
        let mut updated: LookupEntry = Self::apply_patch(&current, patch)?;
        updated.value = updated.value.trim().to_string();
        updated.validate(kind)?;
        self.update_record(kind.table(), id, &updated, &lookup_indexes(&updated))?;
        Ok(updated)
    }

    pub fn delete_lookup(
        &self,
        principal: &Principal,
        kind: LookupKind,
        id: &str,
    ) -> Result<(), ServiceError> {
        authorize(principal, Action::ManageLookups)?;
        self.delete_record(kind.table(), id)?;
        info!(kind = kind.table(), id, "lookup entry deleted");
        Ok(())
    }

    /// Every value of `kind` in display order. Empty when nothing is
    /// configured.
    pub(crate) fn lookup_values(&self, kind: LookupKind) -> Result<Vec<String>, ServiceError> {
        let sql = format!("SELECT value FROM {} ORDER BY {}", kind.table(), LOOKUP_ORDER);
        let rows = self.sql.query(&sql, &[]).map_err(storage_err)?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get_str("value").map(String::from))
            .collect())
    }
}
