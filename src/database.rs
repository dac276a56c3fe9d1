//! Database initialization and table definitions
//!
//! This module handles the setup of the embedded redb database that backs
//! the mapping store.

use redb::{Database, TableDefinition};

/// Main table for storing URL mappings
///
/// Key: short key as string. Keys in a redb table are unique, so this table
/// doubles as the unique index on `short_key`.
/// Value: JSON-serialized `UrlMapping`
///
/// Example:
/// - Key: "aZ3k9"
/// - Value: '{"id":"...","target_url":"https://example.com","short_key":"aZ3k9",...}'
pub const TABLE_MAPPINGS: TableDefinition<&str, &str> = TableDefinition::new("url_mappings_v1");

/// Index of active mappings by target URL
///
/// Key: target URL
/// Value: short key of the active mapping for that URL
///
/// One entry per target URL, which enforces "at most one active mapping per
/// target".
pub const TABLE_ACTIVE_TARGETS: TableDefinition<&str, &str> =
    TableDefinition::new("active_targets_v1");

/// Initializes the embedded database and creates required tables
///
/// # Arguments
///
/// * `db_path` - File path where the database should be stored (e.g., "data.db")
///
/// # Example
///
/// ```no_run
/// # use linkmap::database::init_db;
/// let db = init_db("data.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<Database, redb::Error> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_MAPPINGS)?;
        write_txn.open_table(TABLE_ACTIVE_TARGETS)?;
    }
    write_txn.commit()?;

    Ok(db)
}
