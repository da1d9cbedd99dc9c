use kpc_core::ServiceError;
use kpc_sql::SQLStore;

/// SQL DDL statements to initialize the registry database schema.
///
/// Each table stores the full JSON document in a `data` TEXT column,
/// with indexed columns extracted for filtering, sorting and uniqueness.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS licensees (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        name TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        create_at TEXT,
        update_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS contacts (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT,
        is_active INTEGER NOT NULL DEFAULT 1,
        create_at TEXT,
        update_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS contact_licensees (
        contact_id TEXT NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
        licensee_id TEXT NOT NULL REFERENCES licensees(id) ON DELETE CASCADE,
        PRIMARY KEY (contact_id, licensee_id)
    )",
    "CREATE TABLE IF NOT EXISTS certificates (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        number INTEGER NOT NULL UNIQUE,
        status INTEGER NOT NULL,
        licensee_id TEXT,
        date_of_issue TEXT,
        date_of_sale TEXT,
        date_of_expiry TEXT,
        date_of_shipment TEXT,
        date_of_delivery TEXT,
        exporter TEXT,
        consignee TEXT,
        aes TEXT,
        shipped_value REAL,
        number_of_parcels INTEGER,
        carat_weight REAL,
        harmonized_code TEXT,
        last_modified TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS receipts (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        number INTEGER NOT NULL UNIQUE,
        create_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS void_reasons (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        value TEXT NOT NULL UNIQUE,
        sort_order INTEGER NOT NULL DEFAULT 0,
        create_at TEXT,
        update_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS hs_codes (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        value TEXT NOT NULL UNIQUE,
        sort_order INTEGER NOT NULL DEFAULT 0,
        create_at TEXT,
        update_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS ports_of_export (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        value TEXT NOT NULL UNIQUE,
        sort_order INTEGER NOT NULL DEFAULT 0,
        create_at TEXT,
        update_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS addresses (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        licensee_id TEXT NOT NULL REFERENCES licensees(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        create_at TEXT,
        update_at TEXT,
        UNIQUE (licensee_id, name)
    )",
    "CREATE TABLE IF NOT EXISTS certificate_config (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        data TEXT NOT NULL
    )",
    // Indexes
    "CREATE INDEX IF NOT EXISTS idx_cert_status ON certificates(status)",
    "CREATE INDEX IF NOT EXISTS idx_cert_licensee ON certificates(licensee_id)",
    "CREATE INDEX IF NOT EXISTS idx_cert_modified ON certificates(last_modified)",
    "CREATE INDEX IF NOT EXISTS idx_lic_name ON licensees(name)",
    "CREATE INDEX IF NOT EXISTS idx_cl_licensee ON contact_licensees(licensee_id)",
    "CREATE INDEX IF NOT EXISTS idx_addr_licensee ON addresses(licensee_id)",
];

pub fn init_schema(sql: &dyn SQLStore) -> Result<(), ServiceError> {
    for stmt in SCHEMA {
        sql.exec(stmt, &[])
            .map_err(|e| ServiceError::Storage(format!("schema init failed: {}", e)))?;
    }
    Ok(())
}
