use crate::error::db_error;
use crate::statement::{self, Params};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::{ConnectionTrait, DatabaseConnection, QueryResult};
use std::sync::Arc;
use temps_table::config::DEFAULT_QUERY_LIMIT;
use temps_table::driver::{paging, RawAggregate};
use temps_table::{
    builtin, AggregateMethod, ColumnDescriptor, DataKind, Driver, DriverQuery, RawRow, RawValue, Result,
    RowsResult, Session, TableConfig, TableError,
};
use tracing::debug;

/// Driver reading one SQL table through a sea-orm connection.
///
/// The connection is taken from the session: callers insert an
/// `Arc<DatabaseConnection>` extension before running a query.
pub struct SqlDriver {
    table: String,
    query_limit: u64,
}

impl SqlDriver {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            query_limit: DEFAULT_QUERY_LIMIT,
        }
    }

    pub fn with_query_limit(mut self, limit: u64) -> Self {
        self.query_limit = limit;
        self
    }

    pub fn with_config(self, config: &TableConfig) -> Self {
        self.with_query_limit(config.query_limit)
    }

    fn connection<'s>(&self, session: &'s Session) -> Result<&'s DatabaseConnection> {
        session
            .get::<Arc<DatabaseConnection>>()
            .map(|db| db.as_ref())
            .ok_or_else(|| TableError::backend(format!("no database connection in session for {}", self.table)))
    }

    async fn count(&self, db: &DatabaseConnection, filter: &str, params: &Params) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) AS total FROM {}{}", self.table, filter);
        debug!("Counting rows: {}", sql);
        let row = db
            .query_one(params.clone().into_statement(sql))
            .await
            .map_err(db_error)?;
        let total: i64 = match row {
            Some(row) => row.try_get("", "total").map_err(db_error)?,
            None => 0,
        };
        Ok(total.max(0) as u64)
    }

    async fn aggregates(
        &self,
        db: &DatabaseConnection,
        query: &DriverQuery<'_>,
        filter: &str,
        params: &Params,
    ) -> Result<Vec<RawAggregate>> {
        let backend = db.get_database_backend();
        let mut columns = Vec::new();
        let mut selects = Vec::new();
        for aggregate in query.aggregates {
            let column = query
                .meta
                .column(&aggregate.column_id)
                .ok_or_else(|| TableError::invalid_column(&query.meta.id, &aggregate.column_id))?;
            if let Some(expr) = statement::aggregate_expr(backend, column, aggregate.method) {
                selects.push(format!("{} AS agg_{}", expr, columns.len()));
                columns.push((column, aggregate.method));
            }
        }
        if selects.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("SELECT {} FROM {}{}", selects.join(", "), self.table, filter);
        debug!("Computing aggregates: {}", sql);
        let row = db
            .query_one(params.clone().into_statement(sql))
            .await
            .map_err(db_error)?;

        let mut results = Vec::with_capacity(columns.len());
        for (i, (column, method)) in columns.into_iter().enumerate() {
            let alias = format!("agg_{}", i);
            let value = match (&row, method) {
                (None, _) => RawValue::Null,
                (Some(row), AggregateMethod::Sum) if column.kind.is_integer() => {
                    let sum: Option<i64> = row.try_get("", &alias).map_err(db_error)?;
                    RawValue::Int(sum.unwrap_or_default())
                }
                (Some(row), AggregateMethod::Sum) => {
                    let sum: Option<f64> = row.try_get("", &alias).map_err(db_error)?;
                    RawValue::Float(sum.unwrap_or_default())
                }
                (Some(row), _) => {
                    let avg: Option<f64> = row.try_get("", &alias).map_err(db_error)?;
                    avg.map(RawValue::Float).unwrap_or(RawValue::Null)
                }
            };
            results.push(RawAggregate {
                column_id: column.id.clone(),
                method,
                value,
            });
        }
        Ok(results)
    }

    async fn select(
        &self,
        db: &DatabaseConnection,
        query: &DriverQuery<'_>,
        filter: &str,
        params: &Params,
    ) -> Result<Vec<RawRow>> {
        let backend = db.get_database_backend();
        let columns = statement::select_columns(query.meta, query.output_columns);
        let list: Vec<String> = columns
            .iter()
            .map(|c| format!("{} AS {}", c.storage_expression(), statement::quote(backend, &c.storage_name)))
            .collect();

        let mut params = params.clone();
        let order = statement::order_clause(query.meta, query.order);
        let page = statement::page_clause(&query.page, &mut params);
        let sql = format!("SELECT {} FROM {}{}{}{}", list.join(", "), self.table, filter, order, page);
        debug!("Selecting rows: {}", sql);

        let rows = db.query_all(params.into_statement(sql)).await.map_err(db_error)?;
        rows.iter()
            .map(|row| {
                let mut values = std::collections::HashMap::with_capacity(columns.len());
                for column in &columns {
                    values.insert(column.storage_name.clone(), read_value(row, column)?);
                }
                Ok(RawRow::Map(values))
            })
            .collect()
    }
}

fn read_value(row: &QueryResult, column: &ColumnDescriptor) -> Result<RawValue> {
    let name = column.storage_name.as_str();
    let failed = |e: sea_orm::DbErr| TableError::failed_map(&column.id, e.to_string());
    let value = match column.kind {
        DataKind::Bool => row.try_get::<Option<bool>>("", name).map_err(failed)?.into(),
        DataKind::Int => row.try_get::<Option<i64>>("", name).map_err(failed)?.into(),
        DataKind::UInt => match row.try_get::<Option<i64>>("", name).map_err(failed)? {
            Some(v) => RawValue::UInt(
                u64::try_from(v).map_err(|_| TableError::failed_map(&column.id, format!("{} is negative", v)))?,
            ),
            None => RawValue::Null,
        },
        DataKind::Float => row.try_get::<Option<f64>>("", name).map_err(failed)?.into(),
        DataKind::String | DataKind::Json => row.try_get::<Option<String>>("", name).map_err(failed)?.into(),
        DataKind::Time => row.try_get::<Option<NaiveDateTime>>("", name).map_err(failed)?.into(),
        DataKind::Bytes => match row.try_get::<Option<Vec<u8>>>("", name).map_err(failed)? {
            Some(bytes) => RawValue::Bytes(bytes),
            None => RawValue::Null,
        },
    };
    Ok(value)
}

#[async_trait]
impl Driver for SqlDriver {
    fn name(&self) -> &'static str {
        "sql"
    }

    async fn find_rows(&self, session: &Session, query: &DriverQuery<'_>) -> Result<RowsResult> {
        let db = self.connection(session)?;
        let mut params = Params::new(db.get_database_backend());
        let filter = statement::where_clause(query.meta, query.conditions, &mut params, builtin::local_now())?;

        let total = self.count(db, &filter, &params).await?;
        paging::check_limit(&query.page, total, self.query_limit)?;

        let aggregates = self.aggregates(db, query, &filter, &params).await?;
        let rows = if total == 0 {
            Vec::new()
        } else {
            self.select(db, query, &filter, &params).await?
        };

        Ok(RowsResult {
            rows,
            aggregates,
            page: paging::page_info(&query.page, total),
        })
    }
}
