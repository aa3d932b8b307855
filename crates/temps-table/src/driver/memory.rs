//! Driver evaluating conditions over rows held in memory.

use super::{paging, AggregateColumn, Driver, DriverCondition, DriverQuery, RawAggregate, RowsResult};
use crate::config::{TableConfig, DEFAULT_QUERY_LIMIT};
use crate::error::{Result, TableError};
use crate::operator::builtin;
use crate::schema::{ColumnDescriptor, TableMetaData};
use crate::session::Session;
use crate::types::{AggregateMethod, Order};
use crate::value::{RawRow, RawValue};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Predicate implementing a non-builtin operator: `(row value, condition values)`
pub type OperatorFn = Arc<dyn Fn(&RawValue, &[RawValue]) -> bool + Send + Sync>;

pub struct MemoryDriver {
    rows: RwLock<Vec<RawRow>>,
    query_limit: u64,
    operators: HashMap<String, OperatorFn>,
}

impl MemoryDriver {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self {
            rows: RwLock::new(rows),
            query_limit: DEFAULT_QUERY_LIMIT,
            operators: HashMap::new(),
        }
    }

    pub fn with_query_limit(mut self, limit: u64) -> Self {
        self.query_limit = limit;
        self
    }

    pub fn with_config(self, config: &TableConfig) -> Self {
        self.with_query_limit(config.query_limit)
    }

    /// Evaluate a custom operator id with the given predicate
    pub fn with_operator<F>(mut self, operator_id: impl Into<String>, eval: F) -> Self
    where
        F: Fn(&RawValue, &[RawValue]) -> bool + Send + Sync + 'static,
    {
        self.operators.insert(operator_id.into(), Arc::new(eval));
        self
    }

    pub fn push(&self, row: RawRow) {
        self.rows.write().push(row);
    }

    pub fn replace(&self, rows: Vec<RawRow>) {
        *self.rows.write() = rows;
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    fn matches(&self, meta: &TableMetaData, row: &RawRow, conditions: &[DriverCondition], now: NaiveDateTime) -> Result<bool> {
        for condition in conditions {
            let column = meta
                .column(&condition.column_id)
                .ok_or_else(|| TableError::invalid_column(&meta.id, &condition.column_id))?;
            let value = row.get(column).unwrap_or(RawValue::Null);
            if !self.evaluate(column, &condition.operator_id, &value, &condition.values, now)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn evaluate(
        &self,
        column: &ColumnDescriptor,
        operator_id: &str,
        value: &RawValue,
        args: &[RawValue],
        now: NaiveDateTime,
    ) -> Result<bool> {
        let first = || {
            args.first().ok_or_else(|| TableError::InvalidConditionValueCount {
                column_id: column.id.clone(),
                operator: operator_id.to_string(),
                expected: "exactly 1",
                got: 0,
            })
        };

        let matched = match operator_id {
            builtin::EQ => compare(value, first()?) == Some(Ordering::Equal),
            builtin::NE => compare(value, first()?) != Some(Ordering::Equal),
            builtin::GT => compare(value, first()?) == Some(Ordering::Greater),
            builtin::LT => compare(value, first()?) == Some(Ordering::Less),
            builtin::GE => matches!(compare(value, first()?), Some(Ordering::Greater | Ordering::Equal)),
            builtin::LE => matches!(compare(value, first()?), Some(Ordering::Less | Ordering::Equal)),
            builtin::CTN => text_of(value).contains(&text_of(first()?)),
            builtin::NCTN => !text_of(value).contains(&text_of(first()?)),
            builtin::LCTN => text_of(value).starts_with(&text_of(first()?)),
            builtin::RCTN => text_of(value).ends_with(&text_of(first()?)),
            builtin::IN => args.iter().any(|a| compare(value, a) == Some(Ordering::Equal)),
            builtin::NIN => !args.iter().any(|a| compare(value, a) == Some(Ordering::Equal)),
            builtin::ISN => value.is_null(),
            builtin::ISNN => !value.is_null(),
            builtin::TODAY | builtin::YEST | builtin::TWEEK | builtin::L1MONTH | builtin::L3MONTH => {
                match (builtin::relative_range(operator_id, now), value) {
                    (Some((start, end)), RawValue::Time(t)) => *t >= start && *t < end,
                    _ => false,
                }
            }
            other => match self.operators.get(other) {
                Some(eval) => eval(value, args),
                None => {
                    return Err(TableError::OperatorNotSupported {
                        column_id: column.id.clone(),
                        operator: other.to_string(),
                    })
                }
            },
        };
        Ok(matched)
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

/// Compare two native values; `None` when they are not comparable
fn compare(a: &RawValue, b: &RawValue) -> Option<Ordering> {
    match (a, b) {
        (RawValue::Null, RawValue::Null) => Some(Ordering::Equal),
        (RawValue::Null, _) | (_, RawValue::Null) => None,
        (RawValue::Str(x), RawValue::Str(y)) => Some(x.cmp(y)),
        (RawValue::Bytes(x), RawValue::Bytes(y)) => Some(x.cmp(y)),
        (RawValue::Time(x), RawValue::Time(y)) => Some(x.cmp(y)),
        (RawValue::Bool(x), RawValue::Bool(y)) => Some(x.cmp(y)),
        (RawValue::Int(x), RawValue::Int(y)) => Some(x.cmp(y)),
        (RawValue::UInt(x), RawValue::UInt(y)) => Some(x.cmp(y)),
        (RawValue::Str(_), _) | (_, RawValue::Str(_)) => None,
        (x, y) => x.as_f64()?.partial_cmp(&y.as_f64()?),
    }
}

/// Ordering used for sorting; NULL sorts first
fn order_cmp(a: &RawValue, b: &RawValue) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => compare(a, b).unwrap_or(Ordering::Equal),
    }
}

fn aggregate(meta: &TableMetaData, rows: &[&RawRow], column: &AggregateColumn) -> Result<RawAggregate> {
    let desc = meta
        .column(&column.column_id)
        .ok_or_else(|| TableError::invalid_column(&meta.id, &column.column_id))?;
    let values: Vec<RawValue> = rows
        .iter()
        .filter_map(|row| row.get(desc))
        .filter(|v| !v.is_null())
        .collect();

    let value = match column.method {
        AggregateMethod::Sum if desc.kind.is_integer() => {
            let mut sum: i64 = 0;
            for v in &values {
                let n = match v {
                    RawValue::Int(i) => *i,
                    RawValue::UInt(u) => i64::try_from(*u).map_err(|_| {
                        TableError::failed_map(&desc.id, format!("{} overflows SUM", u))
                    })?,
                    other => other.as_f64().unwrap_or_default() as i64,
                };
                sum = sum.saturating_add(n);
            }
            RawValue::Int(sum)
        }
        AggregateMethod::Sum => RawValue::Float(values.iter().filter_map(RawValue::as_f64).sum()),
        AggregateMethod::Avg => {
            let nums: Vec<f64> = values.iter().filter_map(RawValue::as_f64).collect();
            if nums.is_empty() {
                RawValue::Null
            } else {
                RawValue::Float(nums.iter().sum::<f64>() / nums.len() as f64)
            }
        }
        AggregateMethod::None => RawValue::Null,
    };

    Ok(RawAggregate {
        column_id: column.column_id.clone(),
        method: column.method,
        value,
    })
}

#[async_trait]
impl Driver for MemoryDriver {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn find_rows(&self, _session: &Session, query: &DriverQuery<'_>) -> Result<RowsResult> {
        let now = builtin::local_now();
        let rows = self.rows.read();

        let mut matched = Vec::new();
        for row in rows.iter() {
            if self.matches(query.meta, row, query.conditions, now)? {
                matched.push(row);
            }
        }

        if let Some(order) = query.order {
            match query.meta.column(&order.column_id) {
                Some(column) if column.orderable => {
                    matched.sort_by(|a, b| {
                        let a = a.get(column).unwrap_or(RawValue::Null);
                        let b = b.get(column).unwrap_or(RawValue::Null);
                        let ord = order_cmp(&a, &b);
                        match order.order {
                            Order::Asc => ord,
                            Order::Desc => ord.reverse(),
                        }
                    });
                }
                _ => debug!("Ignoring order on non-orderable column {}", order.column_id),
            }
        }

        let aggregates = query
            .aggregates
            .iter()
            .map(|column| aggregate(query.meta, &matched, column))
            .collect::<Result<Vec<_>>>()?;

        let total = matched.len() as u64;
        paging::check_limit(&query.page, total, self.query_limit)?;

        let window = paging::page_window(&query.page, matched.len());
        let rows = matched[window].iter().map(|row| (*row).clone()).collect();

        Ok(RowsResult {
            rows,
            aggregates,
            page: paging::page_info(&query.page, total),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TableContext;
    use crate::schema::{FieldSpec, TableSpec};
    use crate::template::{OrderParam, PageParam};
    use crate::types::DataKind;
    use chrono::Duration;

    fn stock() -> TableMetaData {
        let ctx = TableContext::new();
        ctx.compiler()
            .compile(
                &TableSpec::new("Stock", "Stock")
                    .field(FieldSpec::new("Code", DataKind::String).key().filters("SSTR"))
                    .field(FieldSpec::new("Qty", DataKind::Int).filters("SINT|SNULLABLE").aggregates("SUM|AVG").orderable())
                    .field(
                        FieldSpec::new("At", DataKind::Time)
                            .value_type("TIME")
                            .filters("STIME"),
                    ),
            )
            .unwrap()
    }

    fn row(code: &str, qty: Option<i64>, at: NaiveDateTime) -> RawRow {
        RawRow::from_pairs([
            ("Code", RawValue::from(code)),
            ("Qty", RawValue::from(qty)),
            ("At", RawValue::from(at)),
        ])
    }

    fn driver() -> MemoryDriver {
        let now = builtin::local_now();
        MemoryDriver::new(vec![
            row("A-1", Some(5), now),
            row("A-2", Some(3), now - Duration::days(1)),
            row("B-1", None, now - Duration::days(40)),
            row("B-2", Some(10), now - Duration::days(100)),
        ])
    }

    async fn run(
        driver: &MemoryDriver,
        meta: &TableMetaData,
        conditions: Vec<DriverCondition>,
        aggregates: Vec<AggregateColumn>,
        page: PageParam,
        order: Option<OrderParam>,
    ) -> Result<RowsResult> {
        let output = meta.columns.ids();
        let query = DriverQuery {
            meta,
            conditions: &conditions,
            output_columns: &output,
            aggregates: &aggregates,
            page,
            order: order.as_ref(),
        };
        driver.find_rows(&Session::new(), &query).await
    }

    fn codes(result: &RowsResult) -> Vec<String> {
        result
            .rows
            .iter()
            .map(|r| match r {
                RawRow::Map(m) => m.get("Code").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                _ => String::new(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_string_operators() {
        let meta = stock();
        let d = driver();
        let cond = |op: &str, v: &str| vec![DriverCondition::new("Code", op, vec![RawValue::from(v)])];

        let r = run(&d, &meta, cond(builtin::LCTN, "A"), vec![], PageParam::unpaged(), None).await.unwrap();
        assert_eq!(codes(&r), vec!["A-1", "A-2"]);
        let r = run(&d, &meta, cond(builtin::RCTN, "-1"), vec![], PageParam::unpaged(), None).await.unwrap();
        assert_eq!(codes(&r), vec!["A-1", "B-1"]);
        let r = run(&d, &meta, cond(builtin::NCTN, "A"), vec![], PageParam::unpaged(), None).await.unwrap();
        assert_eq!(codes(&r), vec!["B-1", "B-2"]);

        let r = run(
            &d,
            &meta,
            vec![DriverCondition::new("Code", builtin::IN, vec!["A-2".into(), "B-2".into()])],
            vec![],
            PageParam::unpaged(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(codes(&r), vec!["A-2", "B-2"]);
    }

    #[tokio::test]
    async fn test_numeric_and_null_operators() {
        let meta = stock();
        let d = driver();
        let r = run(
            &d,
            &meta,
            vec![DriverCondition::new("Qty", builtin::GE, vec![RawValue::Int(5)])],
            vec![],
            PageParam::unpaged(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(codes(&r), vec!["A-1", "B-2"]);

        let r = run(
            &d,
            &meta,
            vec![DriverCondition::new("Qty", builtin::ISN, vec![])],
            vec![],
            PageParam::unpaged(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(codes(&r), vec!["B-1"]);
    }

    #[tokio::test]
    async fn test_relative_time_operators() {
        let meta = stock();
        let d = driver();
        let today = run(
            &d,
            &meta,
            vec![DriverCondition::new("At", builtin::TODAY, vec![])],
            vec![],
            PageParam::unpaged(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(codes(&today), vec!["A-1"]);

        let quarter = run(
            &d,
            &meta,
            vec![DriverCondition::new("At", builtin::L3MONTH, vec![])],
            vec![],
            PageParam::unpaged(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(codes(&quarter), vec!["A-1", "A-2", "B-1"]);
    }

    #[tokio::test]
    async fn test_order_aggregates_and_paging() {
        let meta = stock();
        let d = driver();
        let r = run(
            &d,
            &meta,
            vec![],
            vec![
                AggregateColumn { column_id: "Qty".to_string(), method: AggregateMethod::Sum },
                AggregateColumn { column_id: "Qty".to_string(), method: AggregateMethod::Avg },
            ],
            PageParam::new(0, 2),
            Some(OrderParam::desc("Qty")),
        )
        .await
        .unwrap();

        assert_eq!(codes(&r), vec!["B-2", "A-1"]);
        assert_eq!(r.aggregates[0].value, RawValue::Int(18));
        assert_eq!(r.aggregates[1].value, RawValue::Float(6.0));
        assert_eq!(r.page.total_pages, 2);
        assert_eq!(r.page.total_results, 4);
    }

    #[tokio::test]
    async fn test_unpaged_limit() {
        let meta = stock();
        let d = driver().with_query_limit(3);
        let err = run(&d, &meta, vec![], vec![], PageParam::unpaged(), None).await.unwrap_err();
        assert!(matches!(err, TableError::ResultExceedMaxLimit { count: 4, limit: 3 }));
        assert!(run(&d, &meta, vec![], vec![], PageParam::new(0, 10), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_custom_operator() {
        let meta = stock();
        let d = driver();
        let err = run(
            &d,
            &meta,
            vec![DriverCondition::new("Code", "acme.EVEN", vec![])],
            vec![],
            PageParam::unpaged(),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TableError::OperatorNotSupported { .. }));

        let d = driver().with_operator("acme.EVEN", |v, _| {
            v.as_str().map(|s| s.ends_with('2')).unwrap_or(false)
        });
        let r = run(
            &d,
            &meta,
            vec![DriverCondition::new("Code", "acme.EVEN", vec![])],
            vec![],
            PageParam::unpaged(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(codes(&r), vec!["A-2", "B-2"]);
    }
}
