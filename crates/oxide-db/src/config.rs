//! Connection configuration.
//!
//! A [`ConnectionConfig`] is plain data. It deserializes from JSON with every
//! field optional, so a config file only names what differs from the
//! defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protect::Prefixes;

/// Settings for one database connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Adapter name looked up in the registry.
    pub driver: String,
    pub hostname: String,
    pub port: Option<u16>,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Database name, or a file path for file-backed drivers.
    pub database: String,
    pub char_set: String,
    pub dbcollat: String,
    /// Prefix prepended to table names.
    pub dbprefix: String,
    /// Placeholder prefix rewritten to `dbprefix` in raw SQL.
    pub swap_pre: String,
    pub pconnect: bool,
    /// When set, failed statements return errors instead of failure results.
    pub db_debug: bool,
    pub save_queries: bool,
    pub trans_enabled: bool,
    pub trans_strict: bool,
    /// Overrides the dialect's bind marker.
    pub bind_marker: Option<String>,
    /// Alternates tried in order when the primary connect fails.
    pub failover: Vec<ConnectionConfig>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            driver: String::new(),
            hostname: String::new(),
            port: None,
            username: String::new(),
            password: String::new(),
            database: String::new(),
            char_set: String::from("utf8"),
            dbcollat: String::from("utf8_general_ci"),
            dbprefix: String::new(),
            swap_pre: String::new(),
            pconnect: false,
            db_debug: false,
            save_queries: true,
            trans_enabled: true,
            trans_strict: true,
            bind_marker: None,
            failover: Vec::new(),
        }
    }
}

impl ConnectionConfig {
    /// Creates a config for a driver and database with defaults elsewhere.
    #[must_use]
    pub fn new(driver: &str, database: &str) -> Self {
        Self {
            driver: String::from(driver),
            database: String::from(database),
            ..Self::default()
        }
    }

    /// Sets the table prefix and its swap placeholder.
    #[must_use]
    pub fn with_prefix(mut self, dbprefix: &str, swap_pre: &str) -> Self {
        self.dbprefix = String::from(dbprefix);
        self.swap_pre = String::from(swap_pre);
        self
    }

    /// Sets debug mode.
    #[must_use]
    pub const fn with_debug(mut self, db_debug: bool) -> Self {
        self.db_debug = db_debug;
        self
    }

    /// Appends a failover alternate.
    #[must_use]
    pub fn with_failover(mut self, alternate: Self) -> Self {
        self.failover.push(alternate);
        self
    }

    /// Parses a config from JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error on malformed JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a config from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a serialization
    /// error on malformed JSON.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// The prefix pair used for identifier protection.
    #[must_use]
    pub fn prefixes(&self) -> Prefixes {
        Prefixes::new(&self.dbprefix, &self.swap_pre)
    }

    /// Layers a failover alternate over this config.
    ///
    /// Fields the alternate leaves at their default keep this config's value.
    /// The result carries no failover list of its own.
    #[must_use]
    pub fn overlay(&self, alternate: &Self) -> Self {
        let defaults = Self::default();
        macro_rules! pick {
            ($field:ident) => {
                if alternate.$field == defaults.$field {
                    self.$field.clone()
                } else {
                    alternate.$field.clone()
                }
            };
        }
        Self {
            driver: pick!(driver),
            hostname: pick!(hostname),
            port: pick!(port),
            username: pick!(username),
            password: pick!(password),
            database: pick!(database),
            char_set: pick!(char_set),
            dbcollat: pick!(dbcollat),
            dbprefix: pick!(dbprefix),
            swap_pre: pick!(swap_pre),
            pconnect: pick!(pconnect),
            db_debug: pick!(db_debug),
            save_queries: pick!(save_queries),
            trans_enabled: pick!(trans_enabled),
            trans_strict: pick!(trans_strict),
            bind_marker: pick!(bind_marker),
            failover: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::default();
        assert!(config.save_queries);
        assert!(config.trans_enabled);
        assert!(config.trans_strict);
        assert!(!config.db_debug);
        assert_eq!(config.char_set, "utf8");
    }

    #[test]
    fn test_from_json_partial() {
        let config = ConnectionConfig::from_json_str(
            r#"{"driver": "sqlite", "database": ":memory:", "dbprefix": "app_",
                "failover": [{"database": "backup.db"}]}"#,
        )
        .unwrap();
        assert_eq!(config.driver, "sqlite");
        assert_eq!(config.dbprefix, "app_");
        assert!(config.trans_enabled);
        assert_eq!(config.failover.len(), 1);
        assert_eq!(config.failover[0].database, "backup.db");
    }

    #[test]
    fn test_from_json_malformed() {
        assert!(matches!(
            ConnectionConfig::from_json_str("{driver"),
            Err(crate::DbError::Serialization(_))
        ));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(&path, r#"{"driver": "mysql", "hostname": "db1"}"#).unwrap();
        let config = ConnectionConfig::from_json_file(&path).unwrap();
        assert_eq!(config.hostname, "db1");

        assert!(matches!(
            ConnectionConfig::from_json_file(dir.path().join("missing.json")),
            Err(crate::DbError::Io(_))
        ));
    }

    #[test]
    fn test_password_not_serialized() {
        let mut config = ConnectionConfig::new("mysql", "app");
        config.password = String::from("hunter2");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn test_overlay_keeps_unset_fields() {
        let base = ConnectionConfig::new("mysql", "app").with_prefix("app_", "");
        let alternate = ConnectionConfig {
            hostname: String::from("replica"),
            ..ConnectionConfig::default()
        };
        let merged = base.overlay(&alternate);
        assert_eq!(merged.hostname, "replica");
        assert_eq!(merged.database, "app");
        assert_eq!(merged.dbprefix, "app_");
        assert!(merged.failover.is_empty());
    }
}
