//! Typed cell values, raw backend values and the row shapes exchanged between
//! drivers and the query manager.

use crate::schema::{ColumnDescriptor, Link};
use crate::types::{AggregateMethod, HrefStyle, RowActionType, ValueType};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionValue {
    pub id: i32,
    pub name: String,
}

impl OptionValue {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A typed value as seen by query consumers.
///
/// Dates and times travel in their formatted string form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Null,
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    Date(String),
    Time(String),
    Option(OptionValue),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn option(id: i32) -> Self {
        Value::Option(OptionValue::new(id, ""))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::String(_) => Some(ValueType::String),
            Value::Int(_) => Some(ValueType::Int),
            Value::Double(_) => Some(ValueType::Double),
            Value::Bool(_) => Some(ValueType::Bool),
            Value::Date(_) => Some(ValueType::Date),
            Value::Time(_) => Some(ValueType::Time),
            Value::Option(_) => Some(ValueType::Option),
        }
    }

    pub fn type_name(&self) -> String {
        self.value_type()
            .map(|vt| vt.to_string())
            .unwrap_or_else(|| "NULL".to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Date(s) | Value::Time(s) => Some(s),
            _ => None,
        }
    }
}

/// Renders the value without type information; used as the key when
/// matching values across tables.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::String(s) | Value::Date(s) | Value::Time(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Option(o) => write!(f, "{}", o.id),
        }
    }
}

/// A native value as produced or consumed by a driver
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Time(NaiveDateTime),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Int(i) => Some(*i as f64),
            RawValue::UInt(u) => Some(*u as f64),
            RawValue::Float(f) => Some(*f),
            RawValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Str(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Str(s)
    }
}

impl From<i64> for RawValue {
    fn from(i: i64) -> Self {
        RawValue::Int(i)
    }
}

impl From<i32> for RawValue {
    fn from(i: i32) -> Self {
        RawValue::Int(i as i64)
    }
}

impl From<u64> for RawValue {
    fn from(u: u64) -> Self {
        RawValue::UInt(u)
    }
}

impl From<f64> for RawValue {
    fn from(f: f64) -> Self {
        RawValue::Float(f)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Bool(b)
    }
}

impl From<NaiveDateTime> for RawValue {
    fn from(t: NaiveDateTime) -> Self {
        RawValue::Time(t)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(RawValue::Null)
    }
}

/// A typed row source whose fields are addressed by column id
pub trait Record: Send + Sync + fmt::Debug {
    /// Returns `None` when the record has no field for the column
    fn field(&self, column_id: &str) -> Option<RawValue>;
}

/// One row as returned by a driver
#[derive(Debug, Clone)]
pub enum RawRow {
    /// Values keyed by the column's storage name
    Map(HashMap<String, RawValue>),
    /// Values read from a typed record by column id
    Record(Arc<dyn Record>),
    /// Already mapped rows, passed through untouched
    Typed(TableRow),
}

impl RawRow {
    /// Build a keyed-map row from `(storage name, value)` pairs
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<RawValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        RawRow::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Read the value backing a column. `None` means the row does not carry it.
    pub fn get(&self, column: &ColumnDescriptor) -> Option<RawValue> {
        match self {
            RawRow::Map(map) => Some(
                map.get(&column.storage_name)
                    .cloned()
                    .unwrap_or(RawValue::Null),
            ),
            RawRow::Record(record) => record.field(&column.id),
            RawRow::Typed(_) => None,
        }
    }
}

/// One typed output value for a row/column pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub column_id: String,
    pub value: Value,
    /// Split values for array-style columns, or the single resolved link value
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href_style: Option<HrefStyle>,
}

impl Cell {
    pub fn new(column_id: impl Into<String>, value: Value) -> Self {
        Self {
            column_id: column_id.into(),
            value,
            values: Vec::new(),
            link: None,
            href: None,
            href_style: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowActionInfo {
    pub id: String,
    pub name: String,
    pub action_type: RowActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href_style: Option<HrefStyle>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub id: String,
    pub cells: Vec<Cell>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<RowActionInfo>,
}

impl TableRow {
    pub fn cell(&self, column_id: &str) -> Option<&Cell> {
        self.cells.iter().find(|c| c.column_id == column_id)
    }

    pub fn value(&self, column_id: &str) -> Option<&Value> {
        self.cell(column_id).map(|c| &c.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub column_id: String,
    pub column_name: String,
    pub method: AggregateMethod,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub current_page: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub total_results: u64,
}

/// Final, typed result of a query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableRows {
    pub rows: Vec<TableRow>,
    pub aggregates: Vec<AggregateResult>,
    pub page: PageInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display_is_untyped() {
        assert_eq!(Value::string("M-1").to_string(), "M-1");
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Option(OptionValue::new(3, "Red")).to_string(), "3");
        assert_eq!(Value::Null.to_string(), "");
    }

    #[test]
    fn test_value_serializes_with_type_tag() {
        let json = serde_json::to_value(Value::Int(7)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "int", "value": 7}));
        let back: Value = serde_json::from_value(json).unwrap();
        assert_eq!(back, Value::Int(7));
    }

    #[test]
    fn test_raw_row_map_missing_key_reads_null() {
        let row = RawRow::from_pairs([("code", "A")]);
        let mut desc = ColumnDescriptor::test_column("Other", ValueType::String);
        desc.storage_name = "other".to_string();
        assert_eq!(row.get(&desc), Some(RawValue::Null));
    }
}
