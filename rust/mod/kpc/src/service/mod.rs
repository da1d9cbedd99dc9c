pub mod schema;
pub mod certificate;
pub mod registration;
pub mod licensee;
pub mod contact;
pub mod receipt;
pub mod config;
pub mod lookup;
pub mod address;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use kpc_core::{Claims, ListResult, ServiceError, merge_patch, now};
use kpc_sql::{Row, SQLError, SQLStore, Value};

use crate::access::{Principal, Role};

/// Registry service — owns the SQL store and provides business logic.
pub struct KpcService {
    pub(crate) sql: Box<dyn SQLStore>,
    /// Number given to the first receipt ever issued.
    pub(crate) receipt_seed: i64,
}

impl KpcService {
    pub fn new(sql: Box<dyn SQLStore>, receipt_seed: i64) -> Result<Self, ServiceError> {
        schema::init_schema(sql.as_ref())?;
        Ok(Self { sql, receipt_seed })
    }

    /// Resolve token claims into a principal with its current role and
    /// active licensee memberships.
    pub fn principal(&self, claims: &Claims) -> Result<Principal, ServiceError> {
        if claims.is_root() {
            return Ok(Principal {
                user_id: claims.sub.clone(),
                name: claims.name.clone(),
                role: Role::Superuser,
                licensees: Vec::new(),
            });
        }

        let contact = match self.get_contact_record(&claims.sub) {
            Ok(c) => c,
            Err(ServiceError::NotFound(_)) => {
                return Err(ServiceError::Unauthorized(format!("unknown user {}", claims.sub)))
            }
            Err(e) => return Err(e),
        };
        if !contact.is_active {
            return Err(ServiceError::Unauthorized(format!(
                "user {} is disabled",
                contact.username
            )));
        }

        // Superuser wins over auditor when both flags are set.
        let role = if contact.is_superuser {
            Role::Superuser
        } else if contact.is_auditor {
            Role::Auditor
        } else {
            Role::Contact
        };

        let licensees = if role == Role::Contact {
            self.active_licensee_ids_of(&contact.id)?
        } else {
            Vec::new()
        };

        debug!(user = %contact.username, ?role, licensees = licensees.len(), "resolved principal");

        Ok(Principal {
            user_id: contact.id.clone(),
            name: contact.display_name(),
            role,
            licensees,
        })
    }

    // ── Generic CRUD helpers ──

    /// Insert a record as JSON into a table with indexed columns.
    pub(crate) fn insert_record<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<(), ServiceError> {
        let (sql, params) = insert_statement(table, id, to_json(record)?, indexes);
        self.sql.exec(&sql, &params).map_err(|e| {
            if e.is_constraint() {
                ServiceError::Conflict(e.to_string())
            } else {
                storage_err(e)
            }
        })?;
        Ok(())
    }

    /// Get a record by id, deserializing the JSON `data` column.
    pub(crate) fn get_record<T: DeserializeOwned>(
        &self,
        table: &str,
        id: &str,
    ) -> Result<T, ServiceError> {
        let sql = format!("SELECT data FROM {} WHERE id = ?1", table);
        let rows = self.sql
            .query(&sql, &[Value::Text(id.to_string())])
            .map_err(storage_err)?;
        let row = rows.first()
            .ok_or_else(|| ServiceError::NotFound(format!("{}/{}", table, id)))?;
        decode_row(row, "data")
    }

    /// Update a record's JSON data and indexed columns.
    pub(crate) fn update_record<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<(), ServiceError> {
        let mut sets = vec!["data = ?1".to_string()];
        let mut params: Vec<Value> = vec![Value::Text(to_json(record)?)];

        for (i, (col, val)) in indexes.iter().enumerate() {
            let idx = i + 2;
            sets.push(format!("{} = ?{}", col, idx));
            params.push(val.clone());
        }

        let id_idx = params.len() + 1;
        params.push(Value::Text(id.to_string()));

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table,
            sets.join(", "),
            id_idx,
        );

        let affected = self.sql.exec(&sql, &params).map_err(|e| {
            if e.is_constraint() {
                ServiceError::Conflict(e.to_string())
            } else {
                storage_err(e)
            }
        })?;

        if affected == 0 {
            return Err(ServiceError::NotFound(format!("{}/{}", table, id)));
        }

        Ok(())
    }

    pub(crate) fn delete_record(&self, table: &str, id: &str) -> Result<(), ServiceError> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", table);
        let affected = self.sql
            .exec(&sql, &[Value::Text(id.to_string())])
            .map_err(storage_err)?;
        if affected == 0 {
            return Err(ServiceError::NotFound(format!("{}/{}", table, id)));
        }
        Ok(())
    }

    /// List records with equality filters, a fixed ordering, pagination and
    /// total count.
    pub(crate) fn list_records<T: DeserializeOwned + Serialize>(
        &self,
        table: &str,
        filters: &[(&str, Value)],
        order_by: &str,
        limit: usize,
        offset: usize,
    ) -> Result<ListResult<T>, ServiceError> {
        let mut where_clauses = Vec::new();
        let mut params = Vec::new();

        for (i, (col, val)) in filters.iter().enumerate() {
            let idx = i + 1;
            where_clauses.push(format!("{} = ?{}", col, idx));
            params.push(val.clone());
        }

        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", where_clauses.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) AS cnt FROM {}{}", table, where_sql);
        let total = self.count(&count_sql, &params)?;

        let limit_idx = params.len() + 1;
        let offset_idx = params.len() + 2;
        params.push(Value::Integer(limit as i64));
        params.push(Value::Integer(offset as i64));

        let sql = format!(
            "SELECT data FROM {}{} ORDER BY {} LIMIT ?{} OFFSET ?{}",
            table, where_sql, order_by, limit_idx, offset_idx,
        );

        let rows = self.sql.query(&sql, &params).map_err(storage_err)?;
        let items = rows
            .iter()
            .map(|row| decode_row(row, "data"))
            .collect::<Result<Vec<T>, _>>()?;

        Ok(ListResult { items, total })
    }

    /// Run a `SELECT COUNT(*) AS cnt ...` statement.
    pub(crate) fn count(&self, sql: &str, params: &[Value]) -> Result<usize, ServiceError> {
        let rows = self.sql.query(sql, params).map_err(storage_err)?;
        Ok(rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0) as usize)
    }

    /// Apply a JSON merge-patch to a record.
    pub(crate) fn apply_patch<T: Serialize + DeserializeOwned>(
        current: &T,
        patch: serde_json::Value,
    ) -> Result<T, ServiceError> {
        let mut json = serde_json::to_value(current)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        // Protect immutable fields
        let mut patch_filtered = patch;
        if let Some(obj) = patch_filtered.as_object_mut() {
            obj.remove("id");
            obj.remove("createdAt");
            obj.insert("updatedAt".into(), serde_json::json!(now()));
        }

        merge_patch(&mut json, &patch_filtered);
        serde_json::from_value(json).map_err(|e| ServiceError::Validation(e.to_string()))
    }
}

/// `INSERT` statement for a JSON record plus its indexed columns.
pub(crate) fn insert_statement(
    table: &str,
    id: &str,
    json: String,
    indexes: &[(&str, Value)],
) -> (String, Vec<Value>) {
    let mut cols = vec!["id", "data"];
    let mut placeholders = vec!["?1".to_string(), "?2".to_string()];
    let mut params = vec![Value::Text(id.to_string()), Value::Text(json)];

    for (i, (col, val)) in indexes.iter().enumerate() {
        let idx = i + 3;
        cols.push(col);
        placeholders.push(format!("?{}", idx));
        params.push(val.clone());
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        cols.join(", "),
        placeholders.join(", "),
    );
    (sql, params)
}

pub(crate) fn to_json<T: Serialize>(record: &T) -> Result<String, ServiceError> {
    serde_json::to_string(record).map_err(|e| ServiceError::Internal(e.to_string()))
}

pub(crate) fn decode_row<T: DeserializeOwned>(row: &Row, column: &str) -> Result<T, ServiceError> {
    let data = row.get_str(column)
        .ok_or_else(|| ServiceError::Internal(format!("missing {} column", column)))?;
    serde_json::from_str(data).map_err(|e| ServiceError::Internal(e.to_string()))
}

pub(crate) fn storage_err(e: SQLError) -> ServiceError {
    ServiceError::Storage(e.to_string())
}

pub(crate) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}
