use crate::types::{AggregateMethod, ValueType};
use thiserror::Error;

/// Errors raised while compiling or registering table schemas.
///
/// These are fatal at bootstrap: a process should refuse to start with an
/// inconsistent schema set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Duplicate column id {column_id} in table {table}")]
    DuplicateColumnId { table: String, column_id: String },

    #[error("Duplicate column name {name} in table {table}")]
    DuplicateColumnName { table: String, name: String },

    #[error("Multiple key columns not allowed in table {table}: {first}, {second}")]
    MultipleKeyColumns {
        table: String,
        first: String,
        second: String,
    },

    #[error("No key column specified for table {0}")]
    NoKeyColumn(String),

    #[error("Key column {column_id} of table {table} must support EQ")]
    KeyColumnMustSupportEq { table: String, column_id: String },

    #[error("Invalid link format on column {column_id}: {link}")]
    InvalidLinkFormat { column_id: String, link: String },

    #[error("Unsupported field kind {kind} on column {column_id}")]
    UnsupportedFieldKind { column_id: String, kind: String },

    #[error("Unknown value type {value_type} on column {column_id}")]
    UnknownValueType {
        column_id: String,
        value_type: String,
    },

    #[error("Column {column_id} holds a time value and must declare value type DATE or TIME")]
    InvalidValueTypeForTime { column_id: String },

    #[error("Value type {value_type} cannot be used for kind {kind} on column {column_id}")]
    IncompatibleValueType {
        column_id: String,
        kind: String,
        value_type: ValueType,
    },

    #[error("Unknown aggregate {aggregate} on column {column_id}")]
    UnknownAggregate {
        column_id: String,
        aggregate: String,
    },

    #[error("Invalid column width on column {0}")]
    InvalidColumnWidth(String),

    #[error("Invalid href style {style} on column {column_id}")]
    InvalidHrefStyle { column_id: String, style: String },

    #[error("Option column {0} must declare an option type")]
    MissingOptionType(String),

    #[error("Option type not found: {0}")]
    OptionTypeNotFound(String),

    #[error("Duplicate option type: {0}")]
    DuplicateOptionType(String),

    #[error("Duplicate table id: {0}")]
    DuplicateTableId(String),

    #[error("Duplicate table name: {0}")]
    DuplicateTableName(String),

    #[error("Invalid operator id: {0}")]
    InvalidOperatorId(String),

    #[error("Namespace {0} is reserved")]
    ReservedNamespace(String),

    #[error("Duplicate operator node id: {0}")]
    DuplicateNodeId(String),

    #[error("Duplicate operator node name: {0}")]
    DuplicateNodeName(String),

    #[error("Operator node does not exist: {0}")]
    NodeNotExist(String),

    #[error("Invalid link {link} on {table}.{column_id}: {reason}")]
    InvalidLink {
        table: String,
        column_id: String,
        link: String,
        reason: String,
    },

    #[error("Invalid table spec: {0}")]
    InvalidSpec(String),
}

/// Errors raised while serving a query or managing templates.
#[derive(Error, Debug)]
pub enum TableError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Invalid column id {column_id} for table {table}")]
    InvalidColumnId { table: String, column_id: String },

    #[error("Operator {operator} not supported by column {column_id}")]
    OperatorNotSupported { column_id: String, operator: String },

    #[error("Operator {operator} on column {column_id} expects {expected} value(s), got {got}")]
    InvalidConditionValueCount {
        column_id: String,
        operator: String,
        expected: &'static str,
        got: usize,
    },

    #[error("Invalid value for column {column_id}: expected {expected}, got {got}")]
    InvalidConditionValueType {
        column_id: String,
        expected: ValueType,
        got: String,
    },

    #[error("Aggregate {method} not supported by column {column_id}")]
    AggregateNotSupported {
        column_id: String,
        method: AggregateMethod,
    },

    #[error("Template output of table {0} is empty")]
    EmptyOutput(String),

    #[error("Duplicate output column {0}")]
    DuplicateOutputColumn(String),

    #[error("No driver registered for table {0}")]
    DriverNotFound(String),

    #[error("Driver already registered for table {0}")]
    DuplicateDriver(String),

    #[error("Result count {count} exceeds max limit {limit}")]
    ResultExceedMaxLimit { count: u64, limit: u64 },

    #[error("Column {remote_table}.{search_column} can not be used as a link target")]
    TableColumnNotLinkable {
        remote_table: String,
        search_column: String,
    },

    #[error("No result for id {id} in table {table}")]
    NoResultForId { table: String, id: String },

    #[error("Row action {action_id} not found in table {table}")]
    RowActionNotFound { table: String, action_id: String },

    #[error("Row action {0} is not a form action")]
    NotFormAction(String),

    #[error("Row action {0} does not apply to this row")]
    ActionNotSupported(String),

    #[error("Operation permission denied: {0}")]
    OperatePermissionDenied(String),

    #[error("Disable sharing form to all users")]
    PublicSharingDisabled,

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Failed to map value for column {column_id}: {reason}")]
    FailedMapValue { column_id: String, reason: String },

    #[error("Failed to parse value {value} for column {column_id}")]
    FailedParseValue { column_id: String, value: String },

    #[error("Session deadline exceeded")]
    SessionTimeout,

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TableError {
    /// Create a backend error with a custom message
    pub fn backend(msg: impl Into<String>) -> Self {
        TableError::Backend(msg.into())
    }

    /// Create an invalid query error with a custom message
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        TableError::InvalidQuery(msg.into())
    }

    pub fn invalid_column(table: impl Into<String>, column_id: impl Into<String>) -> Self {
        TableError::InvalidColumnId {
            table: table.into(),
            column_id: column_id.into(),
        }
    }

    pub fn failed_map(column_id: impl Into<String>, reason: impl Into<String>) -> Self {
        TableError::FailedMapValue {
            column_id: column_id.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for TableError {
    fn from(err: serde_json::Error) -> Self {
        TableError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TableError>;
