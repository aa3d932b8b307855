//! # temps-table
//!
//! Metadata-driven table queries for Temps.
//!
//! Tables are declared once as [`TableSpec`]s, compiled into immutable
//! [`TableMetaData`] and queried through [`Template`]s: a filter, an output
//! projection, paging and ordering. The [`QueryManager`] validates templates,
//! resolves cross-table links and hands decoded conditions to the
//! [`Driver`] registered for the table.
//!
//! ## Architecture
//!
//! - **OperatorCatalog**: namespaced filter operators and operator sets
//! - **SchemaCompiler**: turns table specs into column descriptors
//! - **MetadataRegistry**: compiled tables, plus link validation
//! - **codec**: raw driver values to typed cells and back
//! - **Driver**: storage backend contract ([`MemoryDriver`] ships here,
//!   the SQL driver lives in `temps-table-sql`)
//! - **TemplateService**: saved, shared and public templates
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use temps_table::{
//!     DataKind, FieldSpec, MemoryDriver, QueryManager, RawRow, Session, TableContext, TableSpec,
//!     Template,
//! };
//!
//! # async fn example() -> temps_table::Result<()> {
//! let context = Arc::new(TableContext::new());
//! context.register_table(
//!     &TableSpec::new("Material", "Material")
//!         .field(FieldSpec::new("Code", DataKind::String).key().filters("EQ|IN"))
//!         .field(FieldSpec::new("Model", DataKind::String).filters("SSTR")),
//! )?;
//! context.validate_links()?;
//!
//! let manager = QueryManager::new(context);
//! let rows = vec![RawRow::from_pairs([("Code", "M-1"), ("Model", "X100")])];
//! manager
//!     .register_driver("Material", Arc::new(MemoryDriver::new(rows)))
//!     .await?;
//!
//! let template = Template::temporary("Material")
//!     .output(["Code", "Model"])
//!     .filter("Model", "CTN", vec![temps_table::Value::string("X1")]);
//! let result = manager.find_rows(&Session::new(), &template).await?;
//! assert_eq!(result.rows.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod codec;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod manager;
pub mod operator;
pub mod options;
pub mod registry;
pub mod schema;
pub mod session;
pub mod template;
pub mod templates;
pub mod types;
pub mod value;

pub use action::{CustomRowAction, FormAction, FormRowAction, HrefRowAction, RowAction};
pub use config::TableConfig;
pub use context::TableContext;
pub use driver::{AggregateColumn, Driver, DriverCondition, DriverQuery, MemoryDriver, RawAggregate, RowsResult};
pub use error::{Result, SchemaError, TableError};
pub use manager::QueryManager;
pub use operator::{builtin, Operator, OperatorCatalog, OperatorNode, OperatorSet};
pub use options::OptionRegistry;
pub use registry::MetadataRegistry;
pub use schema::{ColumnDescriptor, FieldSpec, Link, SchemaCompiler, TableMetaData, TableSpec};
pub use session::Session;
pub use template::{Condition, OrderParam, PageParam, Template, TemplateBody, TemplateColumn, TPL_DEFAULT, TPL_EMPTY};
pub use templates::{
    AccessType, FileInfo, InMemoryTemplateStore, SavedTemplate, StoredTemplate, TemplateRef, TemplateService,
    TemplateStore, TemplateUpdate, UserDirectory, UserInfo,
};
pub use types::{AggregateMethod, DataKind, FilterArity, HrefStyle, Order, RowActionType, ValueType};
pub use value::{
    AggregateResult, Cell, OptionValue, PageInfo, RawRow, RawValue, Record, RowActionInfo, TableRow, TableRows, Value,
};
