//! # oxide-db-sqlite
//!
//! SQLite backend for `oxide-db`, built on `rusqlite` with the bundled
//! SQLite library.
//!
//! # How SQLite differs from other backends
//!
//! - **Identifier quoting**: double quotes, as in standard SQL.
//! - **No TRUNCATE**: `truncate` compiles to `DELETE FROM`.
//! - **OFFSET needs a LIMIT**: an offset alone compiles to `LIMIT -1 OFFSET n`.
//! - **Catalog**: tables come from `sqlite_master`, columns from
//!   `PRAGMA table_info`.
//! - **Column metadata**: declared types are reported as written in
//!   `CREATE TABLE`; SQLite does not enforce them.
//!
//! ## Example
//!
//! ```rust
//! use oxide_db::{AdapterRegistry, Connection, ConnectionConfig};
//!
//! let mut registry = AdapterRegistry::new();
//! oxide_db_sqlite::register(&mut registry);
//!
//! let mut db = Connection::open(ConnectionConfig::new("sqlite", ":memory:"), &registry).unwrap();
//! db.query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)").unwrap();
//! db.builder().set("name", "Ann");
//! db.insert("users").unwrap();
//!
//! let rows = db.get("users").unwrap().into_cursor().unwrap();
//! assert_eq!(rows.count(), 1);
//! ```

mod backend;

pub use backend::SqliteBackend;

use oxide_db::AdapterRegistry;

/// Driver names this crate registers.
pub const DRIVERS: [&str; 2] = ["sqlite", "sqlite3"];

/// Registers the SQLite backend under [`DRIVERS`].
pub fn register(registry: &mut AdapterRegistry) {
    for driver in DRIVERS {
        registry.register(driver, || Box::new(SqliteBackend::new()));
    }
}
