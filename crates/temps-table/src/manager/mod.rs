//! Query execution: validation, link resolution, driver dispatch and
//! result mapping.

mod link;
mod validate;

use crate::codec;
use crate::config::TableConfig;
use crate::context::TableContext;
use crate::driver::{AggregateColumn, Driver, DriverCondition, DriverQuery, RowsResult};
use crate::error::{Result, TableError};
use crate::operator::builtin;
use crate::schema::TableMetaData;
use crate::session::Session;
use crate::template::{Condition, PageParam, Template, TemplateColumn};
use crate::types::{AggregateMethod, RowActionType};
use crate::value::{AggregateResult, Cell, RawValue, RowActionInfo, TableRow, TableRows, Value};
use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};

pub(crate) use validate::validate_template;

/// Entry point for querying registered tables
pub struct QueryManager {
    context: Arc<TableContext>,
    drivers: Arc<RwLock<HashMap<String, Arc<dyn Driver>>>>,
    config: TableConfig,
}

impl QueryManager {
    pub fn new(context: Arc<TableContext>) -> Self {
        Self {
            context,
            drivers: Arc::new(RwLock::new(HashMap::new())),
            config: TableConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TableConfig) -> Self {
        self.config = config;
        self
    }

    pub fn context(&self) -> &Arc<TableContext> {
        &self.context
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Route queries for `table_id` to `driver`
    pub async fn register_driver(&self, table_id: impl Into<String>, driver: Arc<dyn Driver>) -> Result<()> {
        let table_id = table_id.into();
        let mut drivers = self.drivers.write().await;
        if drivers.contains_key(&table_id) {
            return Err(TableError::DuplicateDriver(table_id));
        }
        debug!("Registered {} driver for table: {}", driver.name(), table_id);
        drivers.insert(table_id, driver);
        Ok(())
    }

    pub async fn unregister_driver(&self, table_id: &str) -> Result<()> {
        let mut drivers = self.drivers.write().await;
        match drivers.remove(table_id) {
            Some(_) => {
                debug!("Unregistered driver for table: {}", table_id);
                Ok(())
            }
            None => Err(TableError::DriverNotFound(table_id.to_string())),
        }
    }

    async fn driver(&self, table_id: &str) -> Result<Arc<dyn Driver>> {
        self.drivers
            .read()
            .await
            .get(table_id)
            .cloned()
            .ok_or_else(|| TableError::DriverNotFound(table_id.to_string()))
    }

    /// Run a template and return only its visible columns
    pub async fn find_rows(&self, session: &Session, template: &Template) -> Result<TableRows> {
        let mut template = template.clone();
        template.body.output.retain(|c| c.visible);
        self.find_rows_inner(session, template, false).await
    }

    /// Fetch a single row by key; the template's filter and paging are ignored
    pub async fn find_row(&self, session: &Session, template: &Template, id: &str) -> Result<TableRow> {
        let meta = self.context.tables.find(&template.table_id)?;
        let key = meta
            .key_column()
            .ok_or_else(|| TableError::Internal(format!("table {} has no key column", meta.id)))?;

        let mut template = template.clone();
        template.body.filter = vec![Condition::new(&key.id, builtin::EQ, vec![Value::string(id)])];
        template.page = PageParam::unpaged();

        self.find_rows(session, &template)
            .await?
            .rows
            .into_iter()
            .next()
            .ok_or_else(|| TableError::NoResultForId {
                table: meta.id.clone(),
                id: id.to_string(),
            })
    }

    /// Query a table with URL query syntax.
    ///
    /// `col=v` filters with EQ, a repeated `col` with IN, `col=MAX(v)` with LT
    /// and `col=MIN(v)` with GT. Every column is returned.
    pub async fn find_rows_by_query(
        &self,
        session: &Session,
        table_id: &str,
        query: &str,
        page: PageParam,
    ) -> Result<TableRows> {
        let meta = self.context.tables.find(table_id)?;

        let mut params: Vec<(String, Vec<String>)> = Vec::new();
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match params.iter_mut().find(|(k, _)| *k == key) {
                Some((_, values)) => values.push(value.into_owned()),
                None => params.push((key.into_owned(), vec![value.into_owned()])),
            }
        }

        let mut template = Template::temporary(&meta.id);
        template.body.output = meta.columns.iter().map(|c| TemplateColumn::new(&c.id)).collect();
        template.page = page;

        for (column_id, values) in params {
            let column = meta
                .column(&column_id)
                .ok_or_else(|| TableError::invalid_column(&meta.id, &column_id))?;
            let condition = if values.len() > 1 {
                let values = values
                    .iter()
                    .map(|v| codec::parse_text(column, v))
                    .collect::<Result<Vec<_>>>()?;
                Condition::new(&column.id, builtin::IN, values)
            } else {
                let raw = values.first().map(String::as_str).unwrap_or_default();
                let (operator, text) = if let Some(v) = bounded(raw, "MAX(") {
                    (builtin::LT, v)
                } else if let Some(v) = bounded(raw, "MIN(") {
                    (builtin::GT, v)
                } else {
                    (builtin::EQ, raw)
                };
                Condition::new(&column.id, operator, vec![codec::parse_text(column, text)?])
            };
            template.body.filter.push(condition);
        }

        self.find_rows_inner(session, template, false).await
    }

    /// Execute a form row action with a submitted payload
    pub async fn execute_row_action(
        &self,
        session: &Session,
        table_id: &str,
        action_id: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        let meta = self.context.tables.find(table_id)?;
        let action = meta
            .row_action(action_id)
            .ok_or_else(|| TableError::RowActionNotFound {
                table: meta.id.clone(),
                action_id: action_id.to_string(),
            })?;
        let form = action
            .as_form()
            .ok_or_else(|| TableError::NotFormAction(action_id.to_string()))?;
        form.execute(session, payload).await
    }

    /// Run a template. `simple` skips outbound link resolution and row
    /// actions; link sub-queries always run simple.
    fn find_rows_inner<'a>(
        &'a self,
        session: &'a Session,
        template: Template,
        simple: bool,
    ) -> BoxFuture<'a, Result<TableRows>> {
        Box::pin(async move {
            let meta = self.context.tables.find(&template.table_id)?;
            validate_template(&meta, &template)?;

            let mut inbound = Vec::new();
            let mut conditions = Vec::new();
            for condition in &template.body.filter {
                let column = meta
                    .column(&condition.column_id)
                    .ok_or_else(|| TableError::invalid_column(&meta.id, &condition.column_id))?;
                if column.outbound_link().is_some() {
                    inbound.push(condition);
                    continue;
                }
                let values = condition
                    .values
                    .iter()
                    .map(|v| codec::to_raw(column, v))
                    .collect::<Result<Vec<_>>>()?;
                conditions.push(DriverCondition::new(&column.id, &condition.operator_id, values));
            }

            if !inbound.is_empty() {
                match self.resolve_inbound(session, &meta, &inbound).await? {
                    Some(translated) => conditions.extend(translated),
                    None => {
                        debug!("Inbound link matched nothing, skipping query on {}", meta.id);
                        return Ok(TableRows::default());
                    }
                }
            }

            let output_columns = candidate_columns(&meta, &template, &conditions);
            let aggregates: Vec<AggregateColumn> = template
                .body
                .output
                .iter()
                .filter(|c| c.aggregate != AggregateMethod::None)
                .map(|c| AggregateColumn {
                    column_id: c.column_id.clone(),
                    method: c.aggregate,
                })
                .collect();

            let driver = self.driver(&meta.id).await?;
            let query = DriverQuery {
                meta: &meta,
                conditions: &conditions,
                output_columns: &output_columns,
                aggregates: &aggregates,
                page: template.page,
                order: template.order.as_ref(),
            };
            let result = self.call_driver(driver.as_ref(), session, &query).await?;

            let options = &self.context.options;
            let mut rows = result
                .rows
                .iter()
                .map(|raw| codec::map_row(options, &meta, raw, &output_columns))
                .collect::<Result<Vec<_>>>()?;

            if !simple && !rows.is_empty() {
                self.resolve_outbound(session, &meta, &mut rows).await?;
            }

            let requested = template.output_ids();
            for row in &mut rows {
                reorder_cells(row, &requested);
            }

            let mut aggregates = Vec::with_capacity(result.aggregates.len());
            for agg in &result.aggregates {
                let column = meta
                    .column(&agg.column_id)
                    .ok_or_else(|| TableError::invalid_column(&meta.id, &agg.column_id))?;
                let value = match (agg.method, &agg.value) {
                    (AggregateMethod::Avg, RawValue::Float(f)) => Value::Double(*f),
                    (_, raw) => codec::map_value(options, column, raw)?,
                };
                aggregates.push(AggregateResult {
                    column_id: column.id.clone(),
                    column_name: column.name.clone(),
                    method: agg.method,
                    value,
                });
            }

            if !simple {
                for row in &mut rows {
                    row.actions = self.row_actions(session, &meta, row).await?;
                }
            }

            Ok(TableRows {
                rows,
                aggregates,
                page: result.page,
            })
        })
    }

    async fn call_driver(&self, driver: &dyn Driver, session: &Session, query: &DriverQuery<'_>) -> Result<RowsResult> {
        let result = match session.deadline() {
            Some(deadline) => tokio::time::timeout_at(deadline, driver.find_rows(session, query))
                .await
                .map_err(|_| TableError::SessionTimeout)?,
            None => driver.find_rows(session, query).await,
        };
        result.map_err(|e| {
            error!("{} driver failed on table {}: {}", driver.name(), query.meta.id, e);
            e
        })
    }

    async fn row_actions(&self, session: &Session, meta: &TableMetaData, row: &TableRow) -> Result<Vec<RowActionInfo>> {
        let mut infos = Vec::new();
        for action in meta.row_actions_for(session, row) {
            let mut info = RowActionInfo {
                id: action.id().to_string(),
                name: action.name().to_string(),
                action_type: action.action_type(),
                form_schema: None,
                href: None,
                href_style: None,
            };
            match action.action_type() {
                RowActionType::JsonForm => {
                    let Some(form) = action.as_form() else {
                        continue;
                    };
                    match form.schema(session, row).await {
                        Ok(schema) => info.form_schema = Some(schema),
                        Err(TableError::ActionNotSupported(_)) => continue,
                        Err(e) => return Err(e),
                    }
                }
                RowActionType::Href => {
                    if let Some((href, style)) = action.href(row) {
                        info.href = Some(href);
                        info.href_style = Some(style);
                    }
                }
                RowActionType::Custom => {}
            }
            infos.push(info);
        }
        Ok(infos)
    }
}

fn bounded<'a>(raw: &'a str, prefix: &str) -> Option<&'a str> {
    raw.strip_prefix(prefix)?.strip_suffix(')')
}

/// Columns fetched from the driver: the requested ones, the local side of
/// outbound links, the key column and every filtered column.
fn candidate_columns(meta: &TableMetaData, template: &Template, conditions: &[DriverCondition]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    let mut add = |id: &str| {
        if seen.insert(id.to_string()) {
            columns.push(id.to_string());
        }
    };

    for output in &template.body.output {
        add(&output.column_id);
    }
    for output in &template.body.output {
        if let Some(link) = meta.column(&output.column_id).and_then(|c| c.outbound_link()) {
            add(&link.local_column_id);
        }
    }
    add(&meta.key_column_id);
    for condition in conditions {
        add(&condition.column_id);
    }
    columns
}

fn reorder_cells(row: &mut TableRow, requested: &[&str]) {
    let mut cells: HashMap<String, Cell> = row
        .cells
        .drain(..)
        .map(|c| (c.column_id.clone(), c))
        .collect();
    row.cells = requested.iter().filter_map(|id| cells.remove(*id)).collect();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded() {
        assert_eq!(bounded("MAX(10)", "MAX("), Some("10"));
        assert_eq!(bounded("MIN(2024-01-01)", "MIN("), Some("2024-01-01"));
        assert_eq!(bounded("MAX(10", "MAX("), None);
        assert_eq!(bounded("10", "MAX("), None);
    }

    #[test]
    fn test_reorder_cells_follows_request() {
        let mut row = TableRow {
            id: "1".to_string(),
            cells: vec![
                Cell::new("B", Value::Int(2)),
                Cell::new("Key", Value::string("1")),
                Cell::new("A", Value::Int(1)),
            ],
            actions: vec![],
        };
        reorder_cells(&mut row, &["A", "B"]);
        let ids: Vec<_> = row.cells.iter().map(|c| c.column_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }
}
