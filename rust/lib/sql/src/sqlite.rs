use std::path::Path;
use std::sync::Mutex;

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, ErrorCode};

use crate::error::SQLError;
use crate::traits::{Executor, Row, SQLStore, Value};

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled SQLite).
///
/// The single connection sits behind a mutex, so statements and
/// transactions from concurrent requests are serialized.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self, SQLError> {
        let conn = Connection::open(path)
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        tracing::debug!("opened sqlite store at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, SQLError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

/// Executor over a borrowed connection or transaction.
struct ConnExecutor<'a> {
    conn: &'a Connection,
}

impl Executor for ConnExecutor<'_> {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| SQLError::Query(e.to_string()))?;

        let column_names: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let rows = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                let mut columns = Vec::with_capacity(column_names.len());
                for (i, name) in column_names.iter().enumerate() {
                    columns.push((name.clone(), row_value_at(row, i)?));
                }
                Ok(Row { columns })
            })
            .map_err(|e| SQLError::Query(e.to_string()))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| SQLError::Query(e.to_string()))?);
        }
        Ok(result)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let affected = self
            .conn
            .execute(sql, rusqlite::params_from_iter(params.iter()))
            .map_err(map_exec_error)?;
        Ok(affected as u64)
    }
}

impl SQLStore for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Query(e.to_string()))?;
        ConnExecutor { conn: &conn }.query(sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;
        ConnExecutor { conn: &conn }.exec(sql, params)
    }

    fn transaction(
        &self,
        work: &mut dyn FnMut(&dyn Executor) -> Result<(), SQLError>,
    ) -> Result<(), SQLError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        let tx = conn
            .transaction()
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        // Dropping `tx` without commit rolls back.
        work(&ConnExecutor { conn: &tx })?;

        tx.commit().map_err(map_exec_error)
    }
}

fn map_exec_error(e: rusqlite::Error) -> SQLError {
    match e {
        rusqlite::Error::SqliteFailure(ref err, ref msg)
            if err.code == ErrorCode::ConstraintViolation =>
        {
            SQLError::Constraint(msg.clone().unwrap_or_else(|| err.to_string()))
        }
        other => SQLError::Execution(other.to_string()),
    }
}

/// Extract a Value from a rusqlite row at a given column index.
fn row_value_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Value> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_table() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .exec(
                "CREATE TABLE items (id INTEGER PRIMARY KEY, label TEXT NOT NULL UNIQUE, weight REAL)",
                &[],
            )
            .unwrap();
        store
    }

    #[test]
    fn query_returns_typed_columns() {
        let store = store_with_table();
        store
            .exec(
                "INSERT INTO items (id, label, weight) VALUES (?1, ?2, ?3)",
                &[Value::Integer(7), Value::Text("parcel".into()), Value::Real(1.25)],
            )
            .unwrap();

        let rows = store.query("SELECT id, label, weight FROM items", &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64("id"), Some(7));
        assert_eq!(rows[0].get_str("label"), Some("parcel"));
        assert_eq!(rows[0].get_f64("weight"), Some(1.25));
    }

    #[test]
    fn unique_violation_is_constraint_error() {
        let store = store_with_table();
        let insert = "INSERT INTO items (label) VALUES (?1)";
        store.exec(insert, &[Value::Text("a".into())]).unwrap();
        let err = store.exec(insert, &[Value::Text("a".into())]).unwrap_err();
        assert!(err.is_constraint(), "got {err:?}");
    }

    #[test]
    fn failed_transaction_rolls_back_everything() {
        let store = store_with_table();
        store.exec("INSERT INTO items (label) VALUES ('b')", &[]).unwrap();

        let err = store
            .transaction(&mut |tx| {
                tx.exec("INSERT INTO items (label) VALUES ('a')", &[])?;
                tx.exec("INSERT INTO items (label) VALUES ('b')", &[])?;
                tx.exec("INSERT INTO items (label) VALUES ('c')", &[])?;
                Ok(())
            })
            .unwrap_err();
        assert!(err.is_constraint());

        let rows = store.query("SELECT COUNT(*) AS cnt FROM items", &[]).unwrap();
        assert_eq!(rows[0].get_i64("cnt"), Some(1));
    }

    #[test]
    fn successful_transaction_commits() {
        let store = store_with_table();
        store
            .transaction(&mut |tx| {
                tx.exec("INSERT INTO items (label) VALUES ('a')", &[])?;
                let rows = tx.query("SELECT COUNT(*) AS cnt FROM items", &[])?;
                assert_eq!(rows[0].get_i64("cnt"), Some(1));
                tx.exec("INSERT INTO items (label) VALUES ('b')", &[])?;
                Ok(())
            })
            .unwrap();

        let rows = store.query("SELECT COUNT(*) AS cnt FROM items", &[]).unwrap();
        assert_eq!(rows[0].get_i64("cnt"), Some(2));
    }

    #[test]
    fn open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kpc.sqlite");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.exec("CREATE TABLE t (x INTEGER)", &[]).unwrap();
            store.exec("INSERT INTO t (x) VALUES (1)", &[]).unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        let rows = reopened.query("SELECT x FROM t", &[]).unwrap();
        assert_eq!(rows[0].get_i64("x"), Some(1));
    }
}
