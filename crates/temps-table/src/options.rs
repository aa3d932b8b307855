use crate::error::SchemaError;
use crate::value::OptionValue;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Name rendered for option ids that have no registered entry
pub const UNKNOWN_OPTION_NAME: &str = "N/A";

/// Registry of named option lists used by OPTION columns
#[derive(Default)]
pub struct OptionRegistry {
    types: RwLock<HashMap<String, Arc<Vec<OptionValue>>>>,
}

impl OptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        option_type: impl Into<String>,
        options: Vec<OptionValue>,
    ) -> Result<(), SchemaError> {
        let option_type = option_type.into();
        let mut types = self.types.write();
        if types.contains_key(&option_type) {
            return Err(SchemaError::DuplicateOptionType(option_type));
        }
        debug!(
            "Registered option type {} with {} entries",
            option_type,
            options.len()
        );
        types.insert(option_type, Arc::new(options));
        Ok(())
    }

    pub fn contains(&self, option_type: &str) -> bool {
        self.types.read().contains_key(option_type)
    }

    pub fn options(&self, option_type: &str) -> Result<Arc<Vec<OptionValue>>, SchemaError> {
        self.types
            .read()
            .get(option_type)
            .cloned()
            .ok_or_else(|| SchemaError::OptionTypeNotFound(option_type.to_string()))
    }

    /// Resolve an option id; unknown types or ids yield `None`
    pub fn lookup(&self, option_type: &str, id: i32) -> Option<OptionValue> {
        self.types
            .read()
            .get(option_type)
            .and_then(|opts| opts.iter().find(|o| o.id == id).cloned())
    }

    /// Resolve an option id, falling back to the placeholder name
    pub fn resolve(&self, option_type: &str, id: i32) -> OptionValue {
        self.lookup(option_type, id)
            .unwrap_or_else(|| OptionValue::new(id, UNKNOWN_OPTION_NAME))
    }
}
