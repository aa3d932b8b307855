//! # temps-table-sql
//!
//! SQL backends for `temps-table` built on sea-orm.
//!
//! - [`SqlDriver`] serves one table from a SQL relation. Conditions become
//!   a parameterized `WHERE` clause; counts and aggregates run as separate
//!   statements so they cover every matching row.
//! - [`SqlTemplateStore`] persists saved templates and their share lists.
//!
//! The driver reads its connection from the session, so one driver can serve
//! many tenants:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sea_orm::DatabaseConnection;
//! use temps_table::{QueryManager, Session};
//! use temps_table_sql::SqlDriver;
//!
//! # async fn example(manager: QueryManager, db: Arc<DatabaseConnection>) -> temps_table::Result<()> {
//! manager
//!     .register_driver("Label", Arc::new(SqlDriver::new("labels")))
//!     .await?;
//! let session = Session::new().with_extension(db);
//! # let _ = session;
//! # Ok(())
//! # }
//! ```

pub mod driver;
pub mod entities;
mod error;
mod statement;
pub mod store;

pub use driver::SqlDriver;
pub use store::SqlTemplateStore;
