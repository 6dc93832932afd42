//! # oxide-db
//!
//! A driver-agnostic database access layer.
//!
//! This crate provides:
//! - A chainable query builder that compiles SELECT, INSERT, UPDATE, DELETE,
//!   REPLACE and batch statements into dialect-specific SQL
//! - Identifier protection with table prefixes and alias tracking
//! - Value escaping and bind-marker substitution
//! - A query pipeline with logging, timing and nested transactions
//! - Buffered result cursors with typed row access
//!
//! Backends plug in through the [`Backend`] trait and describe their SQL
//! through a [`Dialect`](dialect::Dialect).
//!
//! ## Building Queries
//!
//! ```rust
//! use std::sync::Arc;
//! use oxide_db::builder::{OrderDirection, QueryBuilder};
//! use oxide_db::dialect::MySqlDialect;
//!
//! let mut qb = QueryBuilder::new(Arc::new(MySqlDialect));
//! qb.select("title")
//!     .from("posts")
//!     .where_("status", "published")
//!     .order_by("created", OrderDirection::Desc)
//!     .limit(10);
//!
//! assert_eq!(
//!     qb.get_compiled_select("", true).unwrap(),
//!     "SELECT `title`\nFROM `posts`\nWHERE `status` = 'published'\nORDER BY `created` DESC\nLIMIT 10"
//! );
//! ```
//!
//! ## Escaping
//!
//! Values passed to the builder are escaped as they are accumulated:
//!
//! ```rust
//! use std::sync::Arc;
//! use oxide_db::builder::QueryBuilder;
//! use oxide_db::dialect::GenericDialect;
//!
//! let mut qb = QueryBuilder::new(Arc::new(GenericDialect::unquoted()));
//! qb.where_("name", "'; DROP TABLE users; --");
//!
//! assert_eq!(
//!     qb.get_compiled_select("users", true).unwrap(),
//!     "SELECT *\nFROM users\nWHERE name = '''; DROP TABLE users; --'"
//! );
//! ```

pub mod backend;
pub mod builder;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod dialect;
pub mod error;
pub mod escape;
pub mod protect;
pub mod row;
pub mod transaction;
pub mod value;

pub use backend::{AdapterRegistry, Backend, Execution, FieldMeta, RowStream, VecRowStream};
pub use builder::QueryBuilder;
pub use config::ConnectionConfig;
pub use connection::{Connection, QueryResult};
pub use cursor::ResultCursor;
pub use error::{DbError, ErrorInfo, Result};
pub use row::Row;
pub use transaction::{TransactionState, TransactionStep};
pub use value::{ToValue, Value};
