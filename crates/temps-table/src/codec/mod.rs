//! Mapping between raw driver values and typed cell values.

pub mod format;

use crate::error::{Result, TableError};
use crate::options::{OptionRegistry, UNKNOWN_OPTION_NAME};
use crate::schema::{ColumnDescriptor, TableMetaData};
use crate::types::{DataKind, ValueType};
use crate::value::{Cell, OptionValue, RawRow, RawValue, TableRow, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use format::{FormatArg, Scanned};
use std::fmt::Write;

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
pub const EMPTY_DATE: &str = "0000-00-00";
pub const EMPTY_TIME: &str = "0000-00-00T00:00:00Z";

/// Canonical placeholder for a column's value type
pub fn empty_value(column: &ColumnDescriptor) -> Value {
    match column.value_type {
        ValueType::String => Value::String(String::new()),
        ValueType::Int => Value::Int(0),
        ValueType::Double => Value::Double(0.0),
        ValueType::Bool => Value::Bool(false),
        ValueType::Date => Value::Date(EMPTY_DATE.to_string()),
        ValueType::Time => Value::Time(EMPTY_TIME.to_string()),
        ValueType::Option => Value::Option(OptionValue::new(-1, UNKNOWN_OPTION_NAME)),
    }
}

fn format_arg(raw: &RawValue) -> Option<FormatArg<'_>> {
    match raw {
        RawValue::Int(i) => Some(FormatArg::Int(*i)),
        RawValue::UInt(u) => Some(FormatArg::UInt(*u)),
        RawValue::Float(f) => Some(FormatArg::Float(*f)),
        RawValue::Str(s) => Some(FormatArg::Str(s)),
        RawValue::Bool(b) => Some(FormatArg::Bool(*b)),
        _ => None,
    }
}

fn format_time(column: &ColumnDescriptor, t: &NaiveDateTime) -> Result<String> {
    let fmt = column.format.as_deref().unwrap_or(match column.value_type {
        ValueType::Date => DEFAULT_DATE_FORMAT,
        _ => DEFAULT_TIME_FORMAT,
    });
    let mut out = String::new();
    write!(out, "{}", t.format(fmt))
        .map_err(|_| TableError::failed_map(&column.id, format!("invalid time format {}", fmt)))?;
    Ok(out)
}

fn to_i64(column: &ColumnDescriptor, raw: &RawValue) -> Result<i64> {
    match raw {
        RawValue::Int(i) => Ok(*i),
        RawValue::UInt(u) => i64::try_from(*u)
            .map_err(|_| TableError::failed_map(&column.id, format!("{} overflows INT", u))),
        RawValue::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| TableError::failed_map(&column.id, format!("{:?} is not an integer", s))),
        other => Err(TableError::failed_map(
            &column.id,
            format!("{:?} is not an integer", other),
        )),
    }
}

/// Map a raw value to the column's typed value.
///
/// NULL maps to the column's empty value. Unknown option ids resolve to a
/// placeholder name instead of failing.
pub fn map_value(options: &OptionRegistry, column: &ColumnDescriptor, raw: &RawValue) -> Result<Value> {
    if raw.is_null() {
        return Ok(empty_value(column));
    }

    match column.value_type {
        ValueType::String => {
            if let RawValue::Time(t) = raw {
                return Ok(Value::String(format_time(column, t)?));
            }
            let arg = format_arg(raw).ok_or_else(|| {
                TableError::failed_map(&column.id, format!("{:?} can not render as STRING", raw))
            })?;
            Ok(Value::String(match column.format.as_deref() {
                Some(fmt) => format::sprintf(fmt, arg),
                None => format::sprintf("%v", arg),
            }))
        }
        ValueType::Int => Ok(Value::Int(to_i64(column, raw)?)),
        ValueType::Double => raw.as_f64().map(Value::Double).ok_or_else(|| {
            TableError::failed_map(&column.id, format!("{:?} is not a number", raw))
        }),
        ValueType::Bool => match raw {
            RawValue::Bool(b) => Ok(Value::Bool(*b)),
            RawValue::Int(i) => Ok(Value::Bool(*i != 0)),
            RawValue::UInt(u) => Ok(Value::Bool(*u != 0)),
            other => Err(TableError::failed_map(
                &column.id,
                format!("{:?} is not a boolean", other),
            )),
        },
        ValueType::Date | ValueType::Time => {
            let rendered = match raw {
                RawValue::Time(t) => format_time(column, t)?,
                RawValue::Str(s) => s.clone(),
                other => {
                    return Err(TableError::failed_map(
                        &column.id,
                        format!("{:?} is not a time", other),
                    ))
                }
            };
            Ok(if column.value_type == ValueType::Date {
                Value::Date(rendered)
            } else {
                Value::Time(rendered)
            })
        }
        ValueType::Option => {
            let id = to_i64(column, raw)?;
            let id = i32::try_from(id)
                .map_err(|_| TableError::failed_map(&column.id, format!("{} overflows option id", id)))?;
            let option_type = column.option_type.as_deref().unwrap_or_default();
            Ok(Value::Option(options.resolve(option_type, id)))
        }
    }
}

/// Build a cell for a column from its raw value (`None` when the row does
/// not carry the column).
pub fn new_cell(options: &OptionRegistry, column: &ColumnDescriptor, raw: Option<&RawValue>) -> Result<Cell> {
    let value = match raw {
        Some(raw) => map_value(options, column, raw)?,
        None => empty_value(column),
    };

    let mut cell = Cell::new(&column.id, value);
    cell.link = column.link.clone();

    match (&column.array_split, &cell.value) {
        (Some(sep), Value::String(s)) if column.value_type == ValueType::String => {
            cell.values = s.split(sep.as_str()).map(Value::string).collect();
        }
        _ => cell.values = vec![cell.value.clone()],
    }

    if let (Some(href), Some(raw)) = (&column.href, raw) {
        if let Some(arg) = format_arg(raw) {
            cell.href = Some(format::sprintf(href, arg));
        } else if let Some(s) = cell.value.as_str() {
            cell.href = Some(format::sprintf(href, FormatArg::Str(s)));
        }
        cell.href_style = column.href_style;
    }
    Ok(cell)
}

/// Map a raw row into cells, one per output column in order.
///
/// Outbound link columns are not expected in the raw row and start with
/// their empty value; the query manager fills them in afterwards.
pub fn map_row(
    options: &OptionRegistry,
    meta: &TableMetaData,
    raw: &RawRow,
    output_columns: &[String],
) -> Result<TableRow> {
    if let RawRow::Typed(row) = raw {
        return Ok(row.clone());
    }

    let mut row = TableRow::default();
    for column_id in output_columns {
        let column = meta
            .column(column_id)
            .ok_or_else(|| TableError::invalid_column(&meta.id, column_id))?;

        let value = if column.outbound_link().is_some() {
            None
        } else {
            match raw.get(column) {
                Some(v) => Some(v),
                None => {
                    return Err(TableError::failed_map(
                        column_id,
                        "row does not provide this column",
                    ))
                }
            }
        };
        let cell = new_cell(options, column, value.as_ref())?;
        if column.is_key {
            row.id = cell.value.to_string();
        }
        row.cells.push(cell);
    }

    if row.id.is_empty() {
        if let Some(key) = meta.key_column() {
            if let Some(v) = raw.get(key) {
                row.id = map_value(options, key, &v)?.to_string();
            }
        }
    }
    Ok(row)
}

fn parse_failed(column: &ColumnDescriptor, value: &str) -> TableError {
    TableError::FailedParseValue {
        column_id: column.id.clone(),
        value: value.to_string(),
    }
}

fn parse_time(column: &ColumnDescriptor, s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    match column.value_type {
        ValueType::Date => {
            let fmt = column.format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
            NaiveDate::parse_from_str(s, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .or_else(|| NaiveDateTime::parse_from_str(s, fmt).ok())
                .ok_or_else(|| parse_failed(column, s))
        }
        _ => {
            let fmt = column.format.as_deref().unwrap_or(DEFAULT_TIME_FORMAT);
            NaiveDateTime::parse_from_str(s, fmt)
                .ok()
                .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|t| t.naive_utc()))
                .ok_or_else(|| parse_failed(column, s))
        }
    }
}

/// Decode a typed condition value into the native value a driver compares
/// against the column.
///
/// A NULL literal on a STRING column stands for the empty string; STRING
/// columns over numeric storage are parsed back through their format.
pub fn to_raw(column: &ColumnDescriptor, value: &Value) -> Result<RawValue> {
    let mismatch = || TableError::InvalidConditionValueType {
        column_id: column.id.clone(),
        expected: column.value_type,
        got: value.type_name(),
    };

    match column.value_type {
        ValueType::String => {
            let text = match value {
                Value::Null => "",
                Value::String(s) => s.as_str(),
                _ => return Err(mismatch()),
            };
            match column.kind {
                DataKind::Int | DataKind::UInt => {
                    let fmt = column.format.as_deref().unwrap_or("%d");
                    match format::scan(fmt, text) {
                        Some(Scanned::Int(i)) => Ok(RawValue::Int(i)),
                        _ => Err(parse_failed(column, text)),
                    }
                }
                DataKind::Float => {
                    let fmt = column.format.as_deref().unwrap_or("%g");
                    match format::scan(fmt, text) {
                        Some(Scanned::Float(f)) => Ok(RawValue::Float(f)),
                        Some(Scanned::Int(i)) => Ok(RawValue::Float(i as f64)),
                        _ => Err(parse_failed(column, text)),
                    }
                }
                DataKind::Bool => text
                    .parse::<bool>()
                    .map(RawValue::Bool)
                    .map_err(|_| parse_failed(column, text)),
                DataKind::Time => parse_time(column, text).map(RawValue::Time),
                _ => match column.format.as_deref() {
                    Some(fmt) => match format::scan(fmt, text) {
                        Some(Scanned::Str(s)) => Ok(RawValue::Str(s)),
                        _ => Err(parse_failed(column, text)),
                    },
                    None => Ok(RawValue::Str(text.to_string())),
                },
            }
        }
        ValueType::Int => match value {
            Value::Int(i) if column.kind == DataKind::UInt && *i >= 0 => Ok(RawValue::UInt(*i as u64)),
            Value::Int(i) => Ok(RawValue::Int(*i)),
            _ => Err(mismatch()),
        },
        ValueType::Double => match value {
            Value::Double(d) => Ok(RawValue::Float(*d)),
            Value::Int(i) => Ok(RawValue::Float(*i as f64)),
            _ => Err(mismatch()),
        },
        ValueType::Bool => match value {
            Value::Bool(b) => Ok(RawValue::Bool(*b)),
            _ => Err(mismatch()),
        },
        ValueType::Date => match value {
            Value::Date(s) => parse_time(column, s).map(RawValue::Time),
            _ => Err(mismatch()),
        },
        ValueType::Time => match value {
            Value::Time(s) => parse_time(column, s).map(RawValue::Time),
            _ => Err(mismatch()),
        },
        ValueType::Option => match value {
            Value::Option(o) => Ok(RawValue::Int(o.id as i64)),
            Value::Int(i) => Ok(RawValue::Int(*i)),
            _ => Err(mismatch()),
        },
    }
}

/// Parse plain text (e.g. a URL query value) into a typed value for a column
pub fn parse_text(column: &ColumnDescriptor, text: &str) -> Result<Value> {
    let text = text.trim();
    match column.value_type {
        ValueType::String => Ok(Value::String(text.to_string())),
        ValueType::Int => text
            .parse()
            .map(Value::Int)
            .map_err(|_| parse_failed(column, text)),
        ValueType::Double => text
            .parse()
            .map(Value::Double)
            .map_err(|_| parse_failed(column, text)),
        ValueType::Bool => match text {
            "1" | "true" | "TRUE" | "True" | "t" | "T" => Ok(Value::Bool(true)),
            "0" | "false" | "FALSE" | "False" | "f" | "F" => Ok(Value::Bool(false)),
            _ => Err(parse_failed(column, text)),
        },
        ValueType::Date => Ok(Value::Date(text.to_string())),
        ValueType::Time => Ok(Value::Time(text.to_string())),
        ValueType::Option => text
            .parse()
            .map(Value::option)
            .map_err(|_| parse_failed(column, text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HrefStyle;

    fn column(id: &str, kind: DataKind, value_type: ValueType) -> ColumnDescriptor {
        let mut c = ColumnDescriptor::test_column(id, value_type);
        c.kind = kind;
        c
    }

    #[test]
    fn test_empty_values() {
        let cases = [
            (ValueType::String, Value::string("")),
            (ValueType::Int, Value::Int(0)),
            (ValueType::Double, Value::Double(0.0)),
            (ValueType::Bool, Value::Bool(false)),
            (ValueType::Date, Value::Date("0000-00-00".to_string())),
            (ValueType::Time, Value::Time("0000-00-00T00:00:00Z".to_string())),
            (ValueType::Option, Value::Option(OptionValue::new(-1, "N/A"))),
        ];
        for (vt, expected) in cases {
            assert_eq!(empty_value(&ColumnDescriptor::test_column("c", vt)), expected);
        }
    }

    #[test]
    fn test_map_numeric_as_string_uses_format() {
        let options = OptionRegistry::new();
        let mut serial = column("Serial", DataKind::Int, ValueType::String);
        serial.format = Some("SN-%04d".to_string());
        assert_eq!(
            map_value(&options, &serial, &RawValue::Int(12)).unwrap(),
            Value::string("SN-0012")
        );

        let mut ratio = column("Ratio", DataKind::Float, ValueType::String);
        ratio.format = Some("%g".to_string());
        assert_eq!(
            map_value(&options, &ratio, &RawValue::Float(0.25)).unwrap(),
            Value::string("0.25")
        );
    }

    #[test]
    fn test_map_null_yields_empty_value() {
        let options = OptionRegistry::new();
        let qty = column("Qty", DataKind::Int, ValueType::Int);
        assert_eq!(map_value(&options, &qty, &RawValue::Null).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_map_dates_and_times() {
        let options = OptionRegistry::new();
        let t = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap();

        let mut day = column("Day", DataKind::Time, ValueType::Date);
        day.format = Some(DEFAULT_DATE_FORMAT.to_string());
        assert_eq!(
            map_value(&options, &day, &RawValue::Time(t)).unwrap(),
            Value::Date("2024-05-06".to_string())
        );

        let at = column("At", DataKind::Time, ValueType::Time);
        assert_eq!(
            map_value(&options, &at, &RawValue::Time(t)).unwrap(),
            Value::Time("2024-05-06T07:08:09Z".to_string())
        );
    }

    #[test]
    fn test_map_option_resolves_or_placeholder() {
        let options = OptionRegistry::new();
        options
            .register("color", vec![OptionValue::new(1, "Red")])
            .unwrap();
        let mut color = column("Color", DataKind::Int, ValueType::Option);
        color.option_type = Some("color".to_string());

        assert_eq!(
            map_value(&options, &color, &RawValue::Int(1)).unwrap(),
            Value::Option(OptionValue::new(1, "Red"))
        );
        assert_eq!(
            map_value(&options, &color, &RawValue::Int(5)).unwrap(),
            Value::Option(OptionValue::new(5, "N/A"))
        );
    }

    #[test]
    fn test_map_type_mismatch_fails() {
        let options = OptionRegistry::new();
        let flag = column("Flag", DataKind::Bool, ValueType::Bool);
        assert!(matches!(
            map_value(&options, &flag, &RawValue::Str("yes".to_string())),
            Err(TableError::FailedMapValue { .. })
        ));
    }

    #[test]
    fn test_new_cell_splits_arrays_and_renders_href() {
        let options = OptionRegistry::new();
        let mut tags = column("Tags", DataKind::String, ValueType::String);
        tags.array_split = Some(",".to_string());
        tags.href = Some("/tags?q=%s".to_string());
        tags.href_style = Some(HrefStyle::Dialog);

        let cell = new_cell(&options, &tags, Some(&RawValue::from("a,b,c"))).unwrap();
        assert_eq!(cell.value, Value::string("a,b,c"));
        assert_eq!(
            cell.values,
            vec![Value::string("a"), Value::string("b"), Value::string("c")]
        );
        assert_eq!(cell.href.as_deref(), Some("/tags?q=a,b,c"));
        assert_eq!(cell.href_style, Some(HrefStyle::Dialog));
    }

    #[test]
    fn test_to_raw_coerces_null_string() {
        let name = column("Name", DataKind::String, ValueType::String);
        assert_eq!(to_raw(&name, &Value::Null).unwrap(), RawValue::Str(String::new()));
        assert!(matches!(
            to_raw(&name, &Value::Int(1)),
            Err(TableError::InvalidConditionValueType { .. })
        ));
    }

    #[test]
    fn test_to_raw_keeps_string_whitespace() {
        let name = column("Name", DataKind::String, ValueType::String);
        assert_eq!(
            to_raw(&name, &Value::string(" A")).unwrap(),
            RawValue::Str(" A".to_string())
        );
        assert_eq!(
            to_raw(&name, &Value::string("A ")).unwrap(),
            RawValue::Str("A ".to_string())
        );
    }

    #[test]
    fn test_to_raw_parses_formatted_strings() {
        let mut serial = column("Serial", DataKind::Int, ValueType::String);
        serial.format = Some("SN-%04d".to_string());
        assert_eq!(
            to_raw(&serial, &Value::string("SN-0012")).unwrap(),
            RawValue::Int(12)
        );
        assert!(matches!(
            to_raw(&serial, &Value::string("oops")),
            Err(TableError::FailedParseValue { .. })
        ));
    }

    #[test]
    fn test_to_raw_dates() {
        let mut day = column("Day", DataKind::Time, ValueType::Date);
        day.format = Some(DEFAULT_DATE_FORMAT.to_string());
        let expected = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(
            to_raw(&day, &Value::Date("2024-01-31".to_string())).unwrap(),
            RawValue::Time(expected)
        );

        let at = column("At", DataKind::Time, ValueType::Time);
        assert_eq!(
            to_raw(&at, &Value::Time("2024-01-31T00:00:00+00:00".to_string())).unwrap(),
            RawValue::Time(expected)
        );
    }

    #[test]
    fn test_parse_text() {
        let qty = column("Qty", DataKind::Int, ValueType::Int);
        assert_eq!(parse_text(&qty, " 5 ").unwrap(), Value::Int(5));
        assert!(parse_text(&qty, "five").is_err());

        let color = column("Color", DataKind::Int, ValueType::Option);
        assert_eq!(parse_text(&color, "2").unwrap(), Value::option(2));
    }
}
