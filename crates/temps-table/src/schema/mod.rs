//! Compiled table schemas.
//!
//! A [`TableSpec`] describes a row type declaratively; the [`SchemaCompiler`]
//! turns it into an immutable [`TableMetaData`] that the registry shares with
//! every query.

mod compiler;
mod spec;

pub use compiler::SchemaCompiler;
pub use spec::{FieldSpec, TableSpec};

use crate::action::RowAction;
use crate::operator::Operator;
use crate::session::Session;
use crate::template::{Template, TemplateColumn, TPL_DEFAULT, TPL_EMPTY};
use crate::types::{AggregateMethod, DataKind, HrefStyle, ValueType};
use crate::value::TableRow;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A virtual join from a local column to another table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub remote_table_id: String,
    pub local_column_id: String,
    pub remote_search_column_id: String,
    pub remote_value_column_id: String,
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({},{},{})",
            self.remote_table_id,
            self.local_column_id,
            self.remote_search_column_id,
            self.remote_value_column_id
        )
    }
}

#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    pub id: String,
    pub name: String,
    pub kind: DataKind,
    pub value_type: ValueType,
    /// Render format; printf-style for numbers, strftime-style for dates and times
    pub format: Option<String>,
    pub filters: Vec<Arc<Operator>>,
    pub aggregates: Vec<AggregateMethod>,
    pub link: Option<Link>,
    pub is_key: bool,
    pub internal: bool,
    pub required: bool,
    pub orderable: bool,
    pub array_split: Option<String>,
    pub href: Option<String>,
    pub href_style: Option<HrefStyle>,
    pub col_width: u32,
    /// Name of the backing field in storage
    pub storage_name: String,
    /// Storage expression selected in place of `storage_name`
    pub storage_expr: Option<String>,
    pub option_type: Option<String>,
}

impl ColumnDescriptor {
    pub fn supports_filter(&self, operator_id: &str) -> bool {
        self.filters.iter().any(|op| op.id == operator_id)
    }

    pub fn find_filter(&self, operator_id: &str) -> Option<&Arc<Operator>> {
        self.filters.iter().find(|op| op.id == operator_id)
    }

    pub fn supports_aggregate(&self, method: AggregateMethod) -> bool {
        method == AggregateMethod::None || self.aggregates.contains(&method)
    }

    /// Link whose value is produced from another table rather than stored locally
    pub fn outbound_link(&self) -> Option<&Link> {
        self.link
            .as_ref()
            .filter(|link| link.local_column_id != self.id)
    }

    /// Expression to read the column in storage
    pub fn storage_expression(&self) -> &str {
        self.storage_expr.as_deref().unwrap_or(&self.storage_name)
    }

    #[cfg(test)]
    pub(crate) fn test_column(id: &str, value_type: ValueType) -> Self {
        let kind = match value_type {
            ValueType::String => DataKind::String,
            ValueType::Int | ValueType::Option => DataKind::Int,
            ValueType::Double => DataKind::Float,
            ValueType::Bool => DataKind::Bool,
            ValueType::Date | ValueType::Time => DataKind::Time,
        };
        Self {
            id: id.to_string(),
            name: id.to_string(),
            kind,
            value_type,
            format: None,
            filters: Vec::new(),
            aggregates: Vec::new(),
            link: None,
            is_key: false,
            internal: false,
            required: false,
            orderable: false,
            array_split: None,
            href: None,
            href_style: None,
            col_width: 1,
            storage_name: id.to_string(),
            storage_expr: None,
            option_type: None,
        }
    }
}

/// Ordered column list with an id index
#[derive(Debug, Clone, Default)]
pub struct ColumnList {
    columns: Vec<Arc<ColumnDescriptor>>,
    index: HashMap<String, usize>,
}

impl ColumnList {
    pub(crate) fn push(&mut self, column: ColumnDescriptor) {
        self.index.insert(column.id.clone(), self.columns.len());
        self.columns.push(Arc::new(column));
    }

    pub fn get(&self, id: &str) -> Option<&Arc<ColumnDescriptor>> {
        self.index.get(id).map(|&i| &self.columns[i])
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut ColumnDescriptor> {
        let i = *self.index.get(id)?;
        Some(Arc::make_mut(&mut self.columns[i]))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ColumnDescriptor>> {
        self.columns.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Predicate deciding whether a row action is offered for a row
pub type RowActionFilter = Arc<dyn Fn(&Session, &TableRow, &str) -> bool + Send + Sync>;

/// Hook customizing the table's default template
pub type TemplateWrapper = Arc<dyn Fn(Template) -> Template + Send + Sync>;

/// Runtime schema of one registered table
#[derive(Clone)]
pub struct TableMetaData {
    pub id: String,
    pub name: String,
    pub description: String,
    pub columns: ColumnList,
    pub key_column_id: String,
    row_actions: Vec<Arc<dyn RowAction>>,
    row_action_filter: Option<RowActionFilter>,
    default_template_wrapper: Option<TemplateWrapper>,
}

impl fmt::Debug for TableMetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableMetaData")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("columns", &self.columns.ids())
            .field("key_column_id", &self.key_column_id)
            .field(
                "row_actions",
                &self.row_actions.iter().map(|a| a.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl TableMetaData {
    pub(crate) fn new(
        id: String,
        name: String,
        description: String,
        columns: ColumnList,
        key_column_id: String,
    ) -> Self {
        Self {
            id,
            name,
            description,
            columns,
            key_column_id,
            row_actions: Vec::new(),
            row_action_filter: None,
            default_template_wrapper: None,
        }
    }

    pub fn with_row_action(mut self, action: Arc<dyn RowAction>) -> Self {
        self.row_actions.push(action);
        self
    }

    pub fn with_row_action_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Session, &TableRow, &str) -> bool + Send + Sync + 'static,
    {
        self.row_action_filter = Some(Arc::new(filter));
        self
    }

    pub fn with_default_template<F>(mut self, wrapper: F) -> Self
    where
        F: Fn(Template) -> Template + Send + Sync + 'static,
    {
        self.default_template_wrapper = Some(Arc::new(wrapper));
        self
    }

    pub fn column(&self, id: &str) -> Option<&Arc<ColumnDescriptor>> {
        self.columns.get(id)
    }

    pub fn key_column(&self) -> Option<&Arc<ColumnDescriptor>> {
        self.columns.get(&self.key_column_id)
    }

    pub fn row_actions(&self) -> &[Arc<dyn RowAction>] {
        &self.row_actions
    }

    pub fn row_action(&self, id: &str) -> Option<&Arc<dyn RowAction>> {
        self.row_actions.iter().find(|a| a.id() == id)
    }

    /// Row actions offered for one row after the table's filter is applied
    pub fn row_actions_for(&self, session: &Session, row: &TableRow) -> Vec<Arc<dyn RowAction>> {
        self.row_actions
            .iter()
            .filter(|a| match &self.row_action_filter {
                Some(filter) => filter(session, row, a.id()),
                None => true,
            })
            .cloned()
            .collect()
    }

    /// Template showing every non-internal column without filters
    pub fn empty_template(&self) -> Template {
        let mut tpl = Template::temporary(&self.id);
        tpl.id = TPL_EMPTY.to_string();
        tpl.name = "Empty template".to_string();
        tpl.body.output = self
            .columns
            .iter()
            .filter(|c| !c.internal)
            .map(|c| TemplateColumn::new(&c.id))
            .collect();
        tpl
    }

    /// The empty template passed through the table's default template hook
    pub fn default_template(&self) -> Template {
        let mut tpl = self.empty_template();
        tpl.id = TPL_DEFAULT.to_string();
        tpl.name = "Default template".to_string();
        match &self.default_template_wrapper {
            Some(wrapper) => wrapper(tpl),
            None => tpl,
        }
    }
}
