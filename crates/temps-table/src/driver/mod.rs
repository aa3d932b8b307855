//! Storage driver contract.
//!
//! A driver turns already validated, already decoded conditions into its
//! native fetch and reports rows, aggregates and page metadata. The query
//! manager owns validation, link resolution and value mapping.

pub mod memory;
pub mod paging;

use crate::error::Result;
use crate::schema::TableMetaData;
use crate::session::Session;
use crate::template::{OrderParam, PageParam};
use crate::types::AggregateMethod;
use crate::value::{PageInfo, RawRow, RawValue};
use async_trait::async_trait;

pub use memory::MemoryDriver;

/// A filter clause with values decoded to native form
#[derive(Debug, Clone, PartialEq)]
pub struct DriverCondition {
    pub column_id: String,
    pub operator_id: String,
    pub values: Vec<RawValue>,
}

impl DriverCondition {
    pub fn new(column_id: impl Into<String>, operator_id: impl Into<String>, values: Vec<RawValue>) -> Self {
        Self {
            column_id: column_id.into(),
            operator_id: operator_id.into(),
            values,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateColumn {
    pub column_id: String,
    pub method: AggregateMethod,
}

/// Aggregate computed over every matching row, regardless of paging
#[derive(Debug, Clone, PartialEq)]
pub struct RawAggregate {
    pub column_id: String,
    pub method: AggregateMethod,
    pub value: RawValue,
}

#[derive(Debug, Clone, Default)]
pub struct RowsResult {
    pub rows: Vec<RawRow>,
    pub aggregates: Vec<RawAggregate>,
    pub page: PageInfo,
}

impl RowsResult {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// One fetch request handed to a driver
#[derive(Debug, Clone, Copy)]
pub struct DriverQuery<'a> {
    pub meta: &'a TableMetaData,
    pub conditions: &'a [DriverCondition],
    /// Columns the returned rows must carry; drivers may return more
    pub output_columns: &'a [String],
    pub aggregates: &'a [AggregateColumn],
    pub page: PageParam,
    pub order: Option<&'a OrderParam>,
}

/// Storage backend serving one or more tables
#[async_trait]
pub trait Driver: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &'static str;

    /// Fetch rows matching every condition.
    ///
    /// Unpaged requests (`page.page_size == 0`) must fail with
    /// [`crate::TableError::ResultExceedMaxLimit`] when the total count
    /// exceeds the driver's limit.
    async fn find_rows(&self, session: &Session, query: &DriverQuery<'_>) -> Result<RowsResult>;
}
