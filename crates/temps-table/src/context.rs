use crate::error::SchemaError;
use crate::operator::OperatorCatalog;
use crate::options::OptionRegistry;
use crate::registry::MetadataRegistry;
use crate::schema::{SchemaCompiler, TableMetaData, TableSpec};
use std::sync::Arc;

/// Process-wide catalogs shared by the schema compiler and the query manager.
///
/// Populated during bootstrap: register option types and custom operators,
/// then tables, then call [`TableContext::validate_links`].
pub struct TableContext {
    pub operators: OperatorCatalog,
    pub options: OptionRegistry,
    pub tables: MetadataRegistry,
}

impl Default for TableContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TableContext {
    pub fn new() -> Self {
        Self {
            operators: OperatorCatalog::with_builtins(),
            options: OptionRegistry::new(),
            tables: MetadataRegistry::new(),
        }
    }

    pub fn compiler(&self) -> SchemaCompiler<'_> {
        SchemaCompiler::new(&self.operators, &self.options)
    }

    /// Compile a table spec and register it
    pub fn register_table(&self, spec: &TableSpec) -> Result<Arc<TableMetaData>, SchemaError> {
        let meta = self.compiler().compile(spec)?;
        self.tables.register(meta)
    }

    /// Register an already compiled table, e.g. one decorated with row actions
    pub fn register_metadata(&self, meta: TableMetaData) -> Result<Arc<TableMetaData>, SchemaError> {
        self.tables.register(meta)
    }

    pub fn validate_links(&self) -> Result<(), SchemaError> {
        self.tables.validate_links()
    }
}
