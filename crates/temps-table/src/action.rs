//! Per-row actions a table can offer.

use crate::error::{Result, TableError};
use crate::session::Session;
use crate::types::{HrefStyle, RowActionType};
use crate::value::TableRow;
use async_trait::async_trait;
use std::sync::Arc;

/// An action attached to a table and offered on its rows
pub trait RowAction: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn action_type(&self) -> RowActionType;

    /// The form behind a JSON form action
    fn as_form(&self) -> Option<&dyn FormAction> {
        None
    }

    /// Link target and style for an href action
    fn href(&self, _row: &TableRow) -> Option<(String, HrefStyle)> {
        None
    }
}

/// Form backing a [`RowActionType::JsonForm`] action
#[async_trait]
pub trait FormAction: Send + Sync {
    /// JSON schema of the form for one row.
    ///
    /// Returning [`TableError::ActionNotSupported`] hides the action for that row.
    async fn schema(&self, session: &Session, row: &TableRow) -> Result<serde_json::Value>;

    /// Execute the action with a submitted form payload
    async fn execute(&self, session: &Session, payload: serde_json::Value) -> Result<()>;
}

/// Action handled entirely by the client
pub struct CustomRowAction {
    id: String,
    name: String,
}

impl CustomRowAction {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl RowAction for CustomRowAction {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn action_type(&self) -> RowActionType {
        RowActionType::Custom
    }
}

pub struct FormRowAction {
    id: String,
    name: String,
    form: Arc<dyn FormAction>,
}

impl FormRowAction {
    pub fn new(id: impl Into<String>, name: impl Into<String>, form: Arc<dyn FormAction>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            form,
        }
    }
}

impl RowAction for FormRowAction {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn action_type(&self) -> RowActionType {
        RowActionType::JsonForm
    }

    fn as_form(&self) -> Option<&dyn FormAction> {
        Some(self.form.as_ref())
    }
}

type HrefProvider = Arc<dyn Fn(&TableRow) -> String + Send + Sync>;

/// Action that navigates to a URL derived from the row
pub struct HrefRowAction {
    id: String,
    name: String,
    style: HrefStyle,
    provider: HrefProvider,
}

impl HrefRowAction {
    pub fn new<F>(id: impl Into<String>, name: impl Into<String>, style: HrefStyle, provider: F) -> Self
    where
        F: Fn(&TableRow) -> String + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            style,
            provider: Arc::new(provider),
        }
    }
}

impl RowAction for HrefRowAction {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn action_type(&self) -> RowActionType {
        RowActionType::Href
    }

    fn href(&self, row: &TableRow) -> Option<(String, HrefStyle)> {
        Some(((self.provider)(row), self.style))
    }
}

/// Helper for forms that only apply to some rows
pub fn not_supported(action_id: &str) -> TableError {
    TableError::ActionNotSupported(action_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_href_action_renders_from_row() {
        let action = HrefRowAction::new("open", "Open", HrefStyle::Dialog, |row: &TableRow| {
            format!("/materials/{}", row.id)
        });
        let row = TableRow {
            id: "M-1".to_string(),
            ..Default::default()
        };
        assert_eq!(action.action_type(), RowActionType::Href);
        assert_eq!(
            action.href(&row),
            Some(("/materials/M-1".to_string(), HrefStyle::Dialog))
        );
        assert!(action.as_form().is_none());
    }

    #[test]
    fn test_custom_action_has_no_form_or_href() {
        let action = CustomRowAction::new("ping", "Ping");
        assert_eq!(action.action_type(), RowActionType::Custom);
        assert!(action.as_form().is_none());
        assert!(action.href(&TableRow::default()).is_none());
    }
}
