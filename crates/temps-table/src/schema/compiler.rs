use super::{ColumnDescriptor, ColumnList, FieldSpec, Link, TableMetaData, TableSpec};
use crate::codec::{DEFAULT_DATE_FORMAT, DEFAULT_TIME_FORMAT};
use crate::error::SchemaError;
use crate::operator::{builtin, OperatorCatalog};
use crate::options::OptionRegistry;
use crate::types::{AggregateMethod, DataKind, HrefStyle, ValueType};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

static LINK_FULL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([\.\w]+)\((\w+),(\w+),(\w+)\)$").expect("link pattern is valid")
});
static LINK_SHORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([\.\w]+)\((\w+)\)$").expect("link pattern is valid"));

/// Compiles [`TableSpec`]s into [`TableMetaData`] against a set of
/// operators and option types.
pub struct SchemaCompiler<'a> {
    operators: &'a OperatorCatalog,
    options: &'a OptionRegistry,
}

impl<'a> SchemaCompiler<'a> {
    pub fn new(operators: &'a OperatorCatalog, options: &'a OptionRegistry) -> Self {
        Self { operators, options }
    }

    pub fn compile(&self, spec: &TableSpec) -> Result<TableMetaData, SchemaError> {
        let mut columns = ColumnList::default();
        let mut names = HashSet::new();
        let mut key_column: Option<String> = None;

        for field in spec.fields.iter().filter(|f| !f.hidden) {
            let column = self.compile_field(field)?;

            if columns.contains(&column.id) {
                return Err(SchemaError::DuplicateColumnId {
                    table: spec.id.clone(),
                    column_id: column.id,
                });
            }
            if !names.insert(column.name.clone()) {
                return Err(SchemaError::DuplicateColumnName {
                    table: spec.id.clone(),
                    name: column.name,
                });
            }
            if column.is_key {
                if let Some(first) = &key_column {
                    return Err(SchemaError::MultipleKeyColumns {
                        table: spec.id.clone(),
                        first: first.clone(),
                        second: column.id,
                    });
                }
                key_column = Some(column.id.clone());
            }
            columns.push(column);
        }

        let key_column_id = key_column.ok_or_else(|| SchemaError::NoKeyColumn(spec.id.clone()))?;
        let supports_eq = columns
            .get(&key_column_id)
            .map(|c| c.supports_filter(builtin::EQ))
            .unwrap_or(false);
        if !supports_eq {
            return Err(SchemaError::KeyColumnMustSupportEq {
                table: spec.id.clone(),
                column_id: key_column_id,
            });
        }

        debug!(
            "Compiled table {} with {} columns, key column {}",
            spec.id,
            columns.len(),
            key_column_id
        );

        Ok(TableMetaData::new(
            spec.id.clone(),
            spec.name.clone(),
            spec.description.clone(),
            columns,
            key_column_id,
        ))
    }

    fn compile_field(&self, field: &FieldSpec) -> Result<ColumnDescriptor, SchemaError> {
        if matches!(field.kind, DataKind::Bytes | DataKind::Json) {
            return Err(SchemaError::UnsupportedFieldKind {
                column_id: field.id.clone(),
                kind: field.kind.to_string(),
            });
        }

        let value_type = resolve_value_type(field)?;

        let format = field
            .format
            .clone()
            .or_else(|| default_format(field.kind, value_type));

        let option_type = if value_type == ValueType::Option {
            let option_type = field
                .option_type
                .clone()
                .ok_or_else(|| SchemaError::MissingOptionType(field.id.clone()))?;
            if !self.options.contains(&option_type) {
                return Err(SchemaError::OptionTypeNotFound(option_type));
            }
            Some(option_type)
        } else {
            None
        };

        let filters = match field.filters.as_deref() {
            Some(spec) => self.operators.resolve_filters(spec)?,
            None => Vec::new(),
        };

        let aggregates = match field.aggregates.as_deref() {
            Some(spec) => parse_aggregates(&field.id, spec)?,
            None => Vec::new(),
        };

        let link = match field.link.as_deref() {
            Some(spec) if !spec.trim().is_empty() => Some(parse_link(&field.id, spec)?),
            _ => None,
        };

        let href_style = match (&field.href, field.href_style.as_deref()) {
            (Some(_), Some(style)) => Some(style.parse::<HrefStyle>().map_err(|style| {
                SchemaError::InvalidHrefStyle {
                    column_id: field.id.clone(),
                    style,
                }
            })?),
            (Some(_), None) => Some(HrefStyle::default()),
            (None, _) => None,
        };

        let col_width = match field.col_width {
            Some(0) => return Err(SchemaError::InvalidColumnWidth(field.id.clone())),
            Some(width) => width,
            None => 1,
        };

        Ok(ColumnDescriptor {
            id: field.id.clone(),
            name: field.name.clone().unwrap_or_else(|| field.id.clone()),
            kind: field.kind,
            value_type,
            format,
            filters,
            aggregates,
            link,
            is_key: field.key && value_type == ValueType::String,
            internal: field.internal,
            required: field.required,
            orderable: field.orderable,
            array_split: field.array_split.clone().filter(|s| !s.is_empty()),
            href: field.href.clone(),
            href_style,
            col_width,
            storage_name: field.db.clone().unwrap_or_else(|| field.id.clone()),
            storage_expr: field.db_expr.clone(),
            option_type,
        })
    }
}

fn resolve_value_type(field: &FieldSpec) -> Result<ValueType, SchemaError> {
    let declared = match field.value_type.as_deref() {
        Some(vt) => Some(vt.parse::<ValueType>().map_err(|value_type| {
            SchemaError::UnknownValueType {
                column_id: field.id.clone(),
                value_type,
            }
        })?),
        None => None,
    };

    let value_type = match (field.kind, declared) {
        (DataKind::Time, Some(vt @ (ValueType::Date | ValueType::Time))) => vt,
        (DataKind::Time, _) => {
            return Err(SchemaError::InvalidValueTypeForTime {
                column_id: field.id.clone(),
            })
        }
        (_, Some(vt)) => vt,
        (DataKind::Bool, None) => ValueType::Bool,
        (DataKind::Int | DataKind::UInt, None) => ValueType::Int,
        (DataKind::Float, None) => ValueType::Double,
        (_, None) => ValueType::String,
    };

    let compatible = match value_type {
        ValueType::String => true,
        ValueType::Int | ValueType::Option => field.kind.is_integer(),
        ValueType::Double => matches!(field.kind, DataKind::Float | DataKind::Int | DataKind::UInt),
        ValueType::Bool => field.kind == DataKind::Bool,
        ValueType::Date | ValueType::Time => field.kind == DataKind::Time,
    };
    if !compatible {
        return Err(SchemaError::IncompatibleValueType {
            column_id: field.id.clone(),
            kind: field.kind.to_string(),
            value_type,
        });
    }
    Ok(value_type)
}

fn default_format(kind: DataKind, value_type: ValueType) -> Option<String> {
    let format = match (kind, value_type) {
        (DataKind::Int | DataKind::UInt, ValueType::String) => "%d",
        (DataKind::Float, ValueType::String) => "%g",
        (DataKind::Bool, ValueType::String) => "%v",
        (_, ValueType::Date) => DEFAULT_DATE_FORMAT,
        (_, ValueType::Time) => DEFAULT_TIME_FORMAT,
        _ => return None,
    };
    Some(format.to_string())
}

fn parse_aggregates(column_id: &str, spec: &str) -> Result<Vec<AggregateMethod>, SchemaError> {
    let mut methods = Vec::new();
    for part in spec.split('|').map(str::trim).filter(|p| !p.is_empty()) {
        let method = part
            .parse::<AggregateMethod>()
            .map_err(|aggregate| SchemaError::UnknownAggregate {
                column_id: column_id.to_string(),
                aggregate,
            })?;
        if !methods.contains(&method) {
            methods.push(method);
        }
    }
    Ok(methods)
}

/// Parse `Table(local,search,value)` or the shorthand `Table(col)`, where the
/// column links to itself and `col` is both search and value column remotely.
pub(crate) fn parse_link(column_id: &str, spec: &str) -> Result<Link, SchemaError> {
    let compact: String = spec.chars().filter(|c| !c.is_whitespace()).collect();

    if let Some(caps) = LINK_FULL.captures(&compact) {
        return Ok(Link {
            remote_table_id: caps[1].to_string(),
            local_column_id: caps[2].to_string(),
            remote_search_column_id: caps[3].to_string(),
            remote_value_column_id: caps[4].to_string(),
        });
    }
    if let Some(caps) = LINK_SHORT.captures(&compact) {
        return Ok(Link {
            remote_table_id: caps[1].to_string(),
            local_column_id: column_id.to_string(),
            remote_search_column_id: caps[2].to_string(),
            remote_value_column_id: caps[2].to_string(),
        });
    }
    Err(SchemaError::InvalidLinkFormat {
        column_id: column_id.to_string(),
        link: spec.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::OptionValue;

    fn compile(spec: &TableSpec) -> Result<TableMetaData, SchemaError> {
        let operators = OperatorCatalog::with_builtins();
        let options = OptionRegistry::new();
        options
            .register("color", vec![OptionValue::new(1, "Red")])
            .unwrap();
        SchemaCompiler::new(&operators, &options).compile(spec)
    }

    fn base() -> TableSpec {
        TableSpec::new("t", "T").field(
            FieldSpec::new("Code", DataKind::String)
                .key()
                .filters("SSTR"),
        )
    }

    #[test]
    fn test_infers_value_types_and_default_formats() {
        let meta = compile(
            &base()
                .field(FieldSpec::new("Qty", DataKind::Int).filters("SINT"))
                .field(FieldSpec::new("Serial", DataKind::UInt).value_type("STRING"))
                .field(FieldSpec::new("Ratio", DataKind::Float).value_type("string"))
                .field(FieldSpec::new("Done", DataKind::Bool))
                .field(FieldSpec::new("Day", DataKind::Time).value_type("DATE")),
        )
        .unwrap();

        assert_eq!(meta.column("Qty").unwrap().value_type, ValueType::Int);
        assert_eq!(meta.column("Qty").unwrap().format, None);
        assert_eq!(meta.column("Serial").unwrap().format.as_deref(), Some("%d"));
        assert_eq!(meta.column("Ratio").unwrap().format.as_deref(), Some("%g"));
        assert_eq!(meta.column("Done").unwrap().value_type, ValueType::Bool);
        assert_eq!(
            meta.column("Day").unwrap().format.as_deref(),
            Some(DEFAULT_DATE_FORMAT)
        );
    }

    #[test]
    fn test_time_without_explicit_type_fails() {
        let err = compile(&base().field(FieldSpec::new("At", DataKind::Time))).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidValueTypeForTime { .. }));

        let err = compile(&base().field(FieldSpec::new("At", DataKind::Time).value_type("INT")))
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidValueTypeForTime { .. }));
    }

    #[test]
    fn test_unsupported_kind() {
        let err = compile(&base().field(FieldSpec::new("Blob", DataKind::Bytes))).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedFieldKind { .. }));
    }

    #[test]
    fn test_key_column_rules() {
        let no_key = TableSpec::new("t", "T").field(FieldSpec::new("Code", DataKind::String));
        assert_eq!(
            compile(&no_key).unwrap_err(),
            SchemaError::NoKeyColumn("t".to_string())
        );

        // non-string key annotations are ignored
        let int_key = TableSpec::new("t", "T").field(FieldSpec::new("Id", DataKind::Int).key());
        assert!(matches!(
            compile(&int_key).unwrap_err(),
            SchemaError::NoKeyColumn(_)
        ));

        let two_keys = base().field(FieldSpec::new("Other", DataKind::String).key().filters("EQ"));
        assert!(matches!(
            compile(&two_keys).unwrap_err(),
            SchemaError::MultipleKeyColumns { .. }
        ));

        let no_eq = TableSpec::new("t", "T").field(
            FieldSpec::new("Code", DataKind::String)
                .key()
                .filters("CTN"),
        );
        assert!(matches!(
            compile(&no_eq).unwrap_err(),
            SchemaError::KeyColumnMustSupportEq { .. }
        ));
    }

    #[test]
    fn test_duplicate_columns() {
        let dup_id = base().field(FieldSpec::new("Code", DataKind::String).name("Other"));
        assert!(matches!(
            compile(&dup_id).unwrap_err(),
            SchemaError::DuplicateColumnId { .. }
        ));

        let dup_name = base().field(FieldSpec::new("Other", DataKind::String).name("Code"));
        assert!(matches!(
            compile(&dup_name).unwrap_err(),
            SchemaError::DuplicateColumnName { .. }
        ));
    }

    #[test]
    fn test_hidden_fields_are_skipped() {
        let meta = compile(&base().field(FieldSpec::new("Code", DataKind::Int).hidden())).unwrap();
        assert_eq!(meta.columns.len(), 1);
    }

    #[test]
    fn test_filter_and_aggregate_parsing() {
        let meta = compile(
            &base().field(
                FieldSpec::new("Qty", DataKind::Int)
                    .filters("SINT|ISN")
                    .aggregates("SUM | AVG"),
            ),
        )
        .unwrap();
        let qty = meta.column("Qty").unwrap();
        assert_eq!(qty.filters.len(), 9);
        assert!(qty.supports_filter(builtin::ISN));
        assert_eq!(qty.aggregates, vec![AggregateMethod::Sum, AggregateMethod::Avg]);

        let err = compile(&base().field(FieldSpec::new("Qty", DataKind::Int).aggregates("MAX")))
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownAggregate { .. }));

        let err = compile(&base().field(FieldSpec::new("Qty", DataKind::Int).filters("BETWEEN")))
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::NodeNotExist("builtin.BETWEEN".to_string())
        );
    }

    #[test]
    fn test_link_grammars() {
        let full = parse_link("Model", "MaterialData( MaterialCode, Code, Model )").unwrap();
        assert_eq!(full.remote_table_id, "MaterialData");
        assert_eq!(full.local_column_id, "MaterialCode");
        assert_eq!(full.remote_search_column_id, "Code");
        assert_eq!(full.remote_value_column_id, "Model");

        let short = parse_link("MaterialCode", "MaterialData(Code)").unwrap();
        assert_eq!(short.local_column_id, "MaterialCode");
        assert_eq!(short.remote_search_column_id, "Code");
        assert_eq!(short.remote_value_column_id, "Code");

        assert!(matches!(
            parse_link("x", "MaterialData(a,b)"),
            Err(SchemaError::InvalidLinkFormat { .. })
        ));
    }

    #[test]
    fn test_option_columns_need_registered_type() {
        let ok = compile(
            &base().field(
                FieldSpec::new("Color", DataKind::Int)
                    .value_type("OPTION")
                    .option_type("color"),
            ),
        )
        .unwrap();
        assert_eq!(
            ok.column("Color").unwrap().option_type.as_deref(),
            Some("color")
        );

        let missing = compile(&base().field(FieldSpec::new("Color", DataKind::Int).value_type("OPTION")))
            .unwrap_err();
        assert!(matches!(missing, SchemaError::MissingOptionType(_)));

        let unknown = compile(
            &base().field(
                FieldSpec::new("Size", DataKind::Int)
                    .value_type("OPTION")
                    .option_type("size"),
            ),
        )
        .unwrap_err();
        assert_eq!(unknown, SchemaError::OptionTypeNotFound("size".to_string()));
    }

    #[test]
    fn test_secondary_metadata() {
        let meta = compile(
            &base().field(
                FieldSpec::new("Tags", DataKind::String)
                    .array_split(",")
                    .href("/tags/{}", "dialog")
                    .col_width(3)
                    .db("tag_list")
                    .internal()
                    .required()
                    .orderable(),
            ),
        )
        .unwrap();
        let tags = meta.column("Tags").unwrap();
        assert_eq!(tags.array_split.as_deref(), Some(","));
        assert_eq!(tags.href_style, Some(HrefStyle::Dialog));
        assert_eq!(tags.col_width, 3);
        assert_eq!(tags.storage_name, "tag_list");
        assert!(tags.internal && tags.required && tags.orderable);
        assert_eq!(meta.column("Code").unwrap().col_width, 1);

        let err = compile(&base().field(FieldSpec::new("W", DataKind::Int).col_width(0))).unwrap_err();
        assert_eq!(err, SchemaError::InvalidColumnWidth("W".to_string()));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let spec = base()
            .field(FieldSpec::new("Qty", DataKind::Int).filters("SINT|SNULLABLE"))
            .field(FieldSpec::new("Name", DataKind::String).filters("SSTR|EQ"));
        let a = compile(&spec).unwrap();
        let b = compile(&spec).unwrap();

        let shape = |m: &TableMetaData| {
            m.columns
                .iter()
                .map(|c| {
                    (
                        c.id.clone(),
                        c.value_type,
                        c.filters.iter().map(|f| f.id.clone()).collect::<Vec<_>>(),
                    )
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(shape(&a), shape(&b));
    }

    #[test]
    fn test_empty_template_excludes_internal_columns() {
        let meta = compile(&base().field(FieldSpec::new("Secret", DataKind::String).internal()))
            .unwrap()
            .with_default_template(|mut tpl| {
                tpl.body.output.truncate(1);
                tpl
            });

        let empty = meta.empty_template();
        assert_eq!(empty.id, crate::template::TPL_EMPTY);
        assert_eq!(empty.body.output.len(), 1);
        assert_eq!(meta.default_template().id, crate::template::TPL_DEFAULT);
    }
}
