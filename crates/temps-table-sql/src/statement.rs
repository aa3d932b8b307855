//! SQL text generation for table queries.
//!
//! Values are always bound as parameters; only column storage expressions
//! and the table name are spliced into the statement text.

use chrono::NaiveDateTime;
use sea_orm::{DbBackend, Statement, Value as SqlValue};
use temps_table::driver::DriverCondition;
use temps_table::{builtin, AggregateMethod, ColumnDescriptor, Order, OrderParam, PageParam, RawValue, Result, TableError, TableMetaData};

/// Bound parameters of a statement being built
#[derive(Debug, Clone)]
pub(crate) struct Params {
    backend: DbBackend,
    values: Vec<SqlValue>,
}

impl Params {
    pub fn new(backend: DbBackend) -> Self {
        Self {
            backend,
            values: Vec::new(),
        }
    }

    /// Bind a value and return its placeholder
    pub fn push(&mut self, value: SqlValue) -> String {
        self.values.push(value);
        match self.backend {
            DbBackend::Postgres => format!("${}", self.values.len()),
            _ => "?".to_string(),
        }
    }

    pub fn into_statement(self, sql: String) -> Statement {
        Statement::from_sql_and_values(self.backend, sql, self.values)
    }
}

pub(crate) fn quote(backend: DbBackend, ident: &str) -> String {
    match backend {
        DbBackend::MySql => format!("`{}`", ident.replace('`', "``")),
        _ => format!("\"{}\"", ident.replace('"', "\"\"")),
    }
}

pub(crate) fn sql_value(value: &RawValue) -> SqlValue {
    match value {
        RawValue::Null => SqlValue::String(None),
        RawValue::Bool(b) => (*b).into(),
        RawValue::Int(i) => (*i).into(),
        RawValue::UInt(u) => (*u).into(),
        RawValue::Float(f) => (*f).into(),
        RawValue::Str(s) => s.clone().into(),
        RawValue::Bytes(b) => b.clone().into(),
        RawValue::Time(t) => (*t).into(),
    }
}

fn text_of(value: &RawValue) -> String {
    match value {
        RawValue::Null => String::new(),
        RawValue::Bool(b) => b.to_string(),
        RawValue::Int(i) => i.to_string(),
        RawValue::UInt(u) => u.to_string(),
        RawValue::Float(f) => f.to_string(),
        RawValue::Str(s) => s.clone(),
        RawValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        RawValue::Time(t) => t.to_string(),
    }
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `WHERE ...` clause for the conditions, or an empty string
pub(crate) fn where_clause(
    meta: &TableMetaData,
    conditions: &[DriverCondition],
    params: &mut Params,
    now: NaiveDateTime,
) -> Result<String> {
    let mut clauses = Vec::with_capacity(conditions.len());
    for condition in conditions {
        let column = meta
            .column(&condition.column_id)
            .ok_or_else(|| TableError::invalid_column(&meta.id, &condition.column_id))?;
        clauses.push(condition_sql(column, condition, params, now)?);
    }
    if clauses.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" WHERE {}", clauses.join(" AND ")))
    }
}

fn condition_sql(
    column: &ColumnDescriptor,
    condition: &DriverCondition,
    params: &mut Params,
    now: NaiveDateTime,
) -> Result<String> {
    let expr = column.storage_expression();
    let operator = condition.operator_id.as_str();
    let first = || {
        condition
            .values
            .first()
            .ok_or_else(|| TableError::InvalidConditionValueCount {
                column_id: column.id.clone(),
                operator: operator.to_string(),
                expected: "exactly 1",
                got: 0,
            })
    };
    let like = |params: &mut Params, negate: bool, pattern: String| {
        let not = if negate { "NOT " } else { "" };
        format!("{} {}LIKE {} ESCAPE '\\'", expr, not, params.push(pattern.into()))
    };

    let sql = match operator {
        builtin::EQ => match first()? {
            RawValue::Null => format!("{} IS NULL", expr),
            value => format!("{} = {}", expr, params.push(sql_value(value))),
        },
        builtin::NE => match first()? {
            RawValue::Null => format!("{} IS NOT NULL", expr),
            value => format!("{} <> {}", expr, params.push(sql_value(value))),
        },
        builtin::GT => format!("{} > {}", expr, params.push(sql_value(first()?))),
        builtin::LT => format!("{} < {}", expr, params.push(sql_value(first()?))),
        builtin::GE => format!("{} >= {}", expr, params.push(sql_value(first()?))),
        builtin::LE => format!("{} <= {}", expr, params.push(sql_value(first()?))),
        builtin::CTN => like(params, false, format!("%{}%", escape_like(&text_of(first()?)))),
        builtin::NCTN => like(params, true, format!("%{}%", escape_like(&text_of(first()?)))),
        builtin::LCTN => like(params, false, format!("{}%", escape_like(&text_of(first()?)))),
        builtin::RCTN => like(params, false, format!("%{}", escape_like(&text_of(first()?)))),
        builtin::IN | builtin::NIN => {
            first()?;
            let placeholders: Vec<String> = condition
                .values
                .iter()
                .map(|v| params.push(sql_value(v)))
                .collect();
            let not = if operator == builtin::NIN { "NOT " } else { "" };
            format!("{} {}IN ({})", expr, not, placeholders.join(", "))
        }
        builtin::ISN => format!("{} IS NULL", expr),
        builtin::ISNN => format!("{} IS NOT NULL", expr),
        other => match builtin::relative_range(other, now) {
            Some((start, end)) => format!(
                "({} >= {} AND {} < {})",
                expr,
                params.push(start.into()),
                expr,
                params.push(end.into())
            ),
            None => {
                return Err(TableError::OperatorNotSupported {
                    column_id: column.id.clone(),
                    operator: other.to_string(),
                })
            }
        },
    };
    Ok(sql)
}

/// Select expression computing an aggregate, cast to a type rows can be read as
pub(crate) fn aggregate_expr(backend: DbBackend, column: &ColumnDescriptor, method: AggregateMethod) -> Option<String> {
    let (int_type, float_type) = match backend {
        DbBackend::MySql => ("SIGNED", "DOUBLE"),
        _ => ("BIGINT", "DOUBLE PRECISION"),
    };
    let expr = column.storage_expression();
    match method {
        AggregateMethod::Sum if column.kind.is_integer() => Some(format!("CAST(SUM({}) AS {})", expr, int_type)),
        AggregateMethod::Sum => Some(format!("CAST(SUM({}) AS {})", expr, float_type)),
        AggregateMethod::Avg => Some(format!("CAST(AVG({}) AS {})", expr, float_type)),
        AggregateMethod::None => None,
    }
}

/// `ORDER BY` clause, or an empty string when the column cannot be ordered
pub(crate) fn order_clause(meta: &TableMetaData, order: Option<&OrderParam>) -> String {
    let Some(order) = order else {
        return String::new();
    };
    match meta.column(&order.column_id) {
        Some(column) if column.orderable && column.outbound_link().is_none() => {
            let direction = match order.order {
                Order::Asc => "ASC",
                Order::Desc => "DESC",
            };
            format!(" ORDER BY {} {}", column.storage_expression(), direction)
        }
        _ => {
            tracing::debug!("Ignoring order on non-orderable column {}", order.column_id);
            String::new()
        }
    }
}

/// `LIMIT ... OFFSET ...` clause for paged requests
pub(crate) fn page_clause(page: &PageParam, params: &mut Params) -> String {
    if !page.is_paged() {
        return String::new();
    }
    let offset = temps_table::driver::paging::page_offset(page);
    let limit = params.push((page.page_size as i64).into());
    let offset = params.push((offset as i64).into());
    format!(" LIMIT {} OFFSET {}", limit, offset)
}

/// Columns the select list reads, one per storage name
pub(crate) fn select_columns<'m>(meta: &'m TableMetaData, output_columns: &[String]) -> Vec<&'m ColumnDescriptor> {
    let mut columns: Vec<&ColumnDescriptor> = Vec::new();
    for id in output_columns {
        let Some(column) = meta.column(id) else {
            continue;
        };
        if column.outbound_link().is_some() {
            continue;
        }
        if columns.iter().any(|c| c.storage_name == column.storage_name) {
            continue;
        }
        columns.push(column.as_ref());
    }
    if columns.is_empty() {
        if let Some(key) = meta.key_column() {
            columns.push(key.as_ref());
        }
    }
    columns
}
