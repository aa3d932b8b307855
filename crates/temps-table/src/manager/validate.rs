use crate::error::{Result, TableError};
use crate::schema::TableMetaData;
use crate::template::Template;
use crate::types::ValueType;
use std::collections::HashSet;

/// Check a template against its table before anything reaches a driver
pub(crate) fn validate_template(meta: &TableMetaData, template: &Template) -> Result<()> {
    for condition in &template.body.filter {
        let column = meta
            .column(&condition.column_id)
            .ok_or_else(|| TableError::invalid_column(&meta.id, &condition.column_id))?;
        let operator = column.find_filter(&condition.operator_id).ok_or_else(|| {
            TableError::OperatorNotSupported {
                column_id: column.id.clone(),
                operator: condition.operator_id.clone(),
            }
        })?;

        if !operator.arity.accepts(condition.values.len()) {
            return Err(TableError::InvalidConditionValueCount {
                column_id: column.id.clone(),
                operator: operator.id.clone(),
                expected: operator.arity.expectation(),
                got: condition.values.len(),
            });
        }

        for value in &condition.values {
            let accepted = match value.value_type() {
                None => column.value_type == ValueType::String,
                Some(vt) => vt == column.value_type,
            };
            if !accepted {
                return Err(TableError::InvalidConditionValueType {
                    column_id: column.id.clone(),
                    expected: column.value_type,
                    got: value.type_name(),
                });
            }
        }
    }

    if template.body.output.is_empty() {
        return Err(TableError::EmptyOutput(meta.id.clone()));
    }

    let mut seen = HashSet::new();
    for output in &template.body.output {
        if !seen.insert(output.column_id.as_str()) {
            return Err(TableError::DuplicateOutputColumn(output.column_id.clone()));
        }
        let column = meta
            .column(&output.column_id)
            .ok_or_else(|| TableError::invalid_column(&meta.id, &output.column_id))?;
        if !column.supports_aggregate(output.aggregate) {
            return Err(TableError::AggregateNotSupported {
                column_id: column.id.clone(),
                method: output.aggregate,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TableContext;
    use crate::schema::{FieldSpec, TableSpec};
    use crate::template::TemplateColumn;
    use crate::types::{AggregateMethod, DataKind};
    use crate::value::Value;

    fn meta() -> TableMetaData {
        TableContext::new()
            .compiler()
            .compile(
                &TableSpec::new("Stock", "Stock")
                    .field(FieldSpec::new("Code", DataKind::String).key().filters("EQ|IN|ISN"))
                    .field(FieldSpec::new("Qty", DataKind::Int).filters("SINT").aggregates("SUM")),
            )
            .unwrap()
    }

    fn tpl() -> Template {
        Template::temporary("Stock").output(["Code", "Qty"])
    }

    #[test]
    fn test_valid_template() {
        let t = tpl()
            .filter("Code", "IN", vec![Value::string("A"), Value::string("B")])
            .filter("Code", "ISN", vec![])
            .filter("Qty", "GT", vec![Value::Int(1)]);
        assert!(validate_template(&meta(), &t).is_ok());
    }

    #[test]
    fn test_unknown_column_and_operator() {
        let t = tpl().filter("Nope", "EQ", vec![Value::string("A")]);
        assert!(matches!(
            validate_template(&meta(), &t),
            Err(TableError::InvalidColumnId { .. })
        ));

        let t = tpl().filter("Code", "CTN", vec![Value::string("A")]);
        assert!(matches!(
            validate_template(&meta(), &t),
            Err(TableError::OperatorNotSupported { .. })
        ));
    }

    #[test]
    fn test_arity_is_enforced() {
        let m = meta();
        let none_with_value = tpl().filter("Code", "ISN", vec![Value::string("A")]);
        let single_with_two = tpl().filter("Code", "EQ", vec![Value::string("A"), Value::string("B")]);
        let multiple_with_none = tpl().filter("Code", "IN", vec![]);
        for t in [none_with_value, single_with_two, multiple_with_none] {
            assert!(matches!(
                validate_template(&m, &t),
                Err(TableError::InvalidConditionValueCount { .. })
            ));
        }
    }

    #[test]
    fn test_value_types() {
        let m = meta();
        let null_on_string = tpl().filter("Code", "EQ", vec![Value::Null]);
        assert!(validate_template(&m, &null_on_string).is_ok());

        let null_on_int = tpl().filter("Qty", "EQ", vec![Value::Null]);
        assert!(matches!(
            validate_template(&m, &null_on_int),
            Err(TableError::InvalidConditionValueType { .. })
        ));

        let string_on_int = tpl().filter("Qty", "EQ", vec![Value::string("1")]);
        assert!(validate_template(&m, &string_on_int).is_err());
    }

    #[test]
    fn test_output_rules() {
        let m = meta();
        let empty = Template::temporary("Stock");
        assert!(matches!(
            validate_template(&m, &empty),
            Err(TableError::EmptyOutput(_))
        ));

        let dup = Template::temporary("Stock").output(["Code", "Code"]);
        assert!(matches!(
            validate_template(&m, &dup),
            Err(TableError::DuplicateOutputColumn(_))
        ));

        let bad_agg = Template::temporary("Stock")
            .with_column(TemplateColumn::new("Code").aggregate(AggregateMethod::Sum));
        assert!(matches!(
            validate_template(&m, &bad_agg),
            Err(TableError::AggregateNotSupported { .. })
        ));

        let sum = Template::temporary("Stock")
            .with_column(TemplateColumn::new("Qty").aggregate(AggregateMethod::Sum));
        assert!(validate_template(&m, &sum).is_ok());
    }

    #[test]
    fn test_unsupported_aggregate_reports_method() {
        let avg = Template::temporary("Stock")
            .with_column(TemplateColumn::new("Qty").aggregate(AggregateMethod::Avg));
        match validate_template(&meta(), &avg) {
            Err(TableError::AggregateNotSupported { column_id, method }) => {
                assert_eq!(column_id, "Qty");
                assert_eq!(method, AggregateMethod::Avg);
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
