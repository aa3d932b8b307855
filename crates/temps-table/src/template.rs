use crate::types::{AggregateMethod, Order};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Id of the per-table template that outputs every non-internal column
pub const TPL_EMPTY: &str = "TPL_EMPTY";
/// Id of the per-table template produced by the table's default hook
pub const TPL_DEFAULT: &str = "TPL_DEFAULT";

/// One filter clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub column_id: String,
    pub operator_id: String,
    #[serde(default)]
    pub values: Vec<Value>,
}

impl Condition {
    /// Create a condition; bare operator ids are prefixed with the builtin namespace
    pub fn new(column_id: impl Into<String>, operator_id: &str, values: Vec<Value>) -> Self {
        Self {
            column_id: column_id.into(),
            operator_id: crate::operator::qualify(operator_id),
            values,
        }
    }
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateColumn {
    pub column_id: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub aggregate: AggregateMethod,
}

impl TemplateColumn {
    pub fn new(column_id: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            visible: true,
            aggregate: AggregateMethod::None,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn aggregate(mut self, method: AggregateMethod) -> Self {
        self.aggregate = method;
        self
    }
}

/// Filter and projection of a template; this is what gets persisted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateBody {
    #[serde(default)]
    pub filter: Vec<Condition>,
    #[serde(default)]
    pub output: Vec<TemplateColumn>,
}

/// Zero-based page request; a page size of 0 requests every row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParam {
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub page_size: u64,
}

impl PageParam {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self { page, page_size }
    }

    pub fn unpaged() -> Self {
        Self::default()
    }

    pub fn is_paged(&self) -> bool {
        self.page_size > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderParam {
    pub column_id: String,
    #[serde(default)]
    pub order: Order,
}

impl OrderParam {
    pub fn asc(column_id: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            order: Order::Asc,
        }
    }

    pub fn desc(column_id: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            order: Order::Desc,
        }
    }
}

/// A query request against one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub table_id: String,
    #[serde(default)]
    pub body: TemplateBody,
    #[serde(default)]
    pub page: PageParam,
    #[serde(default)]
    pub order: Option<OrderParam>,
}

impl Template {
    /// An unnamed, unsaved template
    pub fn temporary(table_id: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            table_id: table_id.into(),
            body: TemplateBody::default(),
            page: PageParam::default(),
            order: None,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.body.filter.push(condition);
        self
    }

    pub fn filter(self, column_id: &str, operator_id: &str, values: Vec<Value>) -> Self {
        self.with_condition(Condition::new(column_id, operator_id, values))
    }

    pub fn with_column(mut self, column: TemplateColumn) -> Self {
        self.body.output.push(column);
        self
    }

    /// Append visible output columns
    pub fn output<I, S>(mut self, column_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.body
            .output
            .extend(column_ids.into_iter().map(TemplateColumn::new));
        self
    }

    pub fn with_page(mut self, page: u64, page_size: u64) -> Self {
        self.page = PageParam::new(page, page_size);
        self
    }

    pub fn with_order(mut self, order: OrderParam) -> Self {
        self.order = Some(order);
        self
    }

    pub fn output_ids(&self) -> Vec<&str> {
        self.body
            .output
            .iter()
            .map(|c| c.column_id.as_str())
            .collect()
    }
}
