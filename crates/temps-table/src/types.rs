use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical type of a column as seen by query consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueType {
    String,
    Int,
    Double,
    Bool,
    Date,
    Time,
    Option,
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STRING" => Ok(ValueType::String),
            "INT" => Ok(ValueType::Int),
            "DOUBLE" => Ok(ValueType::Double),
            "BOOL" | "BOOLEAN" => Ok(ValueType::Bool),
            "DATE" => Ok(ValueType::Date),
            "TIME" => Ok(ValueType::Time),
            "OPTION" => Ok(ValueType::Option),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::String => "STRING",
            ValueType::Int => "INT",
            ValueType::Double => "DOUBLE",
            ValueType::Bool => "BOOL",
            ValueType::Date => "DATE",
            ValueType::Time => "TIME",
            ValueType::Option => "OPTION",
        };
        write!(f, "{}", s)
    }
}

/// Physical kind of the value a backend stores for a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Bool,
    Int,
    UInt,
    Float,
    String,
    /// Naive timestamp, also used for calendar dates
    Time,
    Bytes,
    Json,
}

impl DataKind {
    pub fn is_integer(&self) -> bool {
        matches!(self, DataKind::Int | DataKind::UInt)
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataKind::Bool => "bool",
            DataKind::Int => "int",
            DataKind::UInt => "uint",
            DataKind::Float => "float",
            DataKind::String => "string",
            DataKind::Time => "time",
            DataKind::Bytes => "bytes",
            DataKind::Json => "json",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateMethod {
    #[default]
    None,
    Sum,
    Avg,
}

impl FromStr for AggregateMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUM" => Ok(AggregateMethod::Sum),
            "AVG" => Ok(AggregateMethod::Avg),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for AggregateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregateMethod::None => "NONE",
            AggregateMethod::Sum => "SUM",
            AggregateMethod::Avg => "AVG",
        };
        write!(f, "{}", s)
    }
}

/// Number of values an operator consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterArity {
    None,
    Single,
    Multiple,
}

impl FilterArity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            FilterArity::None => count == 0,
            FilterArity::Single => count == 1,
            FilterArity::Multiple => count >= 1,
        }
    }

    pub fn expectation(&self) -> &'static str {
        match self {
            FilterArity::None => "0",
            FilterArity::Single => "exactly 1",
            FilterArity::Multiple => "at least 1",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HrefStyle {
    #[default]
    NewTab,
    Dialog,
}

impl FromStr for HrefStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newtab" => Ok(HrefStyle::NewTab),
            "dialog" => Ok(HrefStyle::Dialog),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowActionType {
    Custom,
    JsonForm,
    Href,
}
