use crate::error::{Result, SchemaError, TableError};
use crate::operator::builtin;
use crate::schema::TableMetaData;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of compiled table schemas keyed by table id
#[derive(Default)]
pub struct MetadataRegistry {
    tables: RwLock<HashMap<String, Arc<TableMetaData>>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table; both its id and display name must be unique
    pub fn register(&self, meta: TableMetaData) -> std::result::Result<Arc<TableMetaData>, SchemaError> {
        let mut tables = self.tables.write();
        if tables.contains_key(&meta.id) {
            return Err(SchemaError::DuplicateTableId(meta.id));
        }
        if tables.values().any(|t| t.name == meta.name) {
            return Err(SchemaError::DuplicateTableName(meta.name));
        }
        let meta = Arc::new(meta);
        tables.insert(meta.id.clone(), meta.clone());
        debug!("Registered table: {}", meta.id);
        Ok(meta)
    }

    pub fn find(&self, table_id: &str) -> Result<Arc<TableMetaData>> {
        self.tables
            .read()
            .get(table_id)
            .cloned()
            .ok_or_else(|| TableError::TableNotFound(table_id.to_string()))
    }

    /// All registered tables sorted by id
    pub fn list(&self) -> Vec<Arc<TableMetaData>> {
        let mut tables: Vec<_> = self.tables.read().values().cloned().collect();
        tables.sort_by(|a, b| a.id.cmp(&b.id));
        tables
    }

    /// Check every cross-table link once all tables are registered.
    ///
    /// For a link column whose local column supports IN, the column's
    /// filters are replaced by the remote value column's filters, since
    /// filtering on it is pushed down to the remote table.
    pub fn validate_links(&self) -> std::result::Result<(), SchemaError> {
        let mut tables = self.tables.write();
        let mut updated: Vec<TableMetaData> = Vec::new();

        let mut ids: Vec<_> = tables.keys().cloned().collect();
        ids.sort();

        for table_id in ids {
            let Some(table) = tables.get(&table_id) else {
                continue;
            };
            let mut widened: Vec<(String, Vec<_>)> = Vec::new();

            for column in table.columns.iter() {
                let Some(link) = &column.link else {
                    continue;
                };
                // a self link only declares a cross-table reference for this column
                if link.local_column_id == column.id {
                    continue;
                }
                let invalid = |reason: &str| SchemaError::InvalidLink {
                    table: table.id.clone(),
                    column_id: column.id.clone(),
                    link: link.to_string(),
                    reason: reason.to_string(),
                };

                let local = table
                    .column(&link.local_column_id)
                    .ok_or_else(|| invalid("local column not found"))?;
                let remote = tables
                    .get(&link.remote_table_id)
                    .ok_or_else(|| invalid("remote table not found"))?;
                let search = remote
                    .column(&link.remote_search_column_id)
                    .ok_or_else(|| invalid("remote search column not found"))?;
                if !search.supports_filter(builtin::EQ) && !search.supports_filter(builtin::IN) {
                    return Err(invalid("remote search column supports neither EQ nor IN"));
                }
                let value = remote
                    .column(&link.remote_value_column_id)
                    .ok_or_else(|| invalid("remote value column not found"))?;

                if link.local_column_id != column.id && local.supports_filter(builtin::IN) {
                    widened.push((column.id.clone(), value.filters.clone()));
                }
            }

            if !widened.is_empty() {
                let mut meta = (**table).clone();
                for (column_id, filters) in widened {
                    if let Some(column) = meta.columns.get_mut(&column_id) {
                        debug!(
                            "Link column {}.{} now filters with {} remote operators",
                            meta.id,
                            column_id,
                            filters.len()
                        );
                        column.filters = filters;
                    }
                }
                updated.push(meta);
            }
        }

        for meta in updated {
            tables.insert(meta.id.clone(), Arc::new(meta));
        }
        Ok(())
    }
}
