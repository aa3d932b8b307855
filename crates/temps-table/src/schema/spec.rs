use crate::error::SchemaError;
use crate::types::DataKind;
use serde::{Deserialize, Serialize};

/// Declarative description of one field of a row type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub id: String,
    pub kind: DataKind,
    /// Display name, defaults to the id
    #[serde(default)]
    pub name: Option<String>,
    /// Hidden fields are not compiled into columns
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub key: bool,
    #[serde(default)]
    pub value_type: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    /// Pipe-separated operator and operator-set ids
    #[serde(default)]
    pub filters: Option<String>,
    /// Pipe-separated aggregate names
    #[serde(default)]
    pub aggregates: Option<String>,
    /// `Table(local,search,value)` or `Table(col)`
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub internal: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub orderable: bool,
    #[serde(default)]
    pub array_split: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub href_style: Option<String>,
    #[serde(default)]
    pub col_width: Option<u32>,
    #[serde(default)]
    pub db: Option<String>,
    #[serde(default)]
    pub db_expr: Option<String>,
    #[serde(default)]
    pub option_type: Option<String>,
}

impl FieldSpec {
    pub fn new(id: impl Into<String>, kind: DataKind) -> Self {
        Self {
            id: id.into(),
            kind,
            name: None,
            hidden: false,
            key: false,
            value_type: None,
            format: None,
            filters: None,
            aggregates: None,
            link: None,
            internal: false,
            required: false,
            orderable: false,
            array_split: None,
            href: None,
            href_style: None,
            col_width: None,
            db: None,
            db_expr: None,
            option_type: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    pub fn value_type(mut self, value_type: impl Into<String>) -> Self {
        self.value_type = Some(value_type.into());
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn filters(mut self, filters: impl Into<String>) -> Self {
        self.filters = Some(filters.into());
        self
    }

    pub fn aggregates(mut self, aggregates: impl Into<String>) -> Self {
        self.aggregates = Some(aggregates.into());
        self
    }

    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn orderable(mut self) -> Self {
        self.orderable = true;
        self
    }

    pub fn array_split(mut self, separator: impl Into<String>) -> Self {
        self.array_split = Some(separator.into());
        self
    }

    pub fn href(mut self, href: impl Into<String>, style: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self.href_style = Some(style.into());
        self
    }

    pub fn col_width(mut self, width: u32) -> Self {
        self.col_width = Some(width);
        self
    }

    pub fn db(mut self, name: impl Into<String>) -> Self {
        self.db = Some(name.into());
        self
    }

    pub fn db_expr(mut self, expr: impl Into<String>) -> Self {
        self.db_expr = Some(expr.into());
        self
    }

    pub fn option_type(mut self, option_type: impl Into<String>) -> Self {
        self.option_type = Some(option_type.into());
        self
    }
}

/// Declarative description of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub fields: Vec<FieldSpec>,
}

impl TableSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            fields: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, SchemaError> {
        serde_yaml::from_str(s).map_err(|e| SchemaError::InvalidSpec(e.to_string()))
    }

    pub fn from_json_str(s: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(s).map_err(|e| SchemaError::InvalidSpec(e.to_string()))
    }
}
