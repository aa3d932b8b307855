use super::{AccessType, StoredTemplate, TemplateStore, TemplateUpdate};
use crate::error::{Result, TableError};
use crate::session::Session;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Template store kept in process memory
#[derive(Default)]
pub struct InMemoryTemplateStore {
    templates: RwLock<HashMap<String, StoredTemplate>>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn select<F>(&self, predicate: F) -> Vec<StoredTemplate>
    where
        F: Fn(&StoredTemplate) -> bool,
    {
        let mut found: Vec<_> = self
            .templates
            .read()
            .values()
            .filter(|t| predicate(t))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.create_time.cmp(&b.create_time).then_with(|| a.id.cmp(&b.id)));
        found
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn create(&self, _session: &Session, template: StoredTemplate) -> Result<()> {
        let mut templates = self.templates.write();
        if templates.contains_key(&template.id) {
            return Err(TableError::backend(format!(
                "template {} already exists",
                template.id
            )));
        }
        templates.insert(template.id.clone(), template);
        Ok(())
    }

    async fn find(&self, _session: &Session, id: &str) -> Result<StoredTemplate> {
        self.templates
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| TableError::TemplateNotFound(id.to_string()))
    }

    async fn update(&self, _session: &Session, id: &str, update: TemplateUpdate) -> Result<()> {
        let mut templates = self.templates.write();
        let stored = templates
            .get_mut(id)
            .ok_or_else(|| TableError::TemplateNotFound(id.to_string()))?;
        stored.name = update.name;
        stored.access = update.access;
        stored.body = update.body;
        stored.share_list = update.share_list;
        stored.modify_time = update.modify_time;
        Ok(())
    }

    async fn delete(&self, _session: &Session, id: &str) -> Result<u64> {
        Ok(self.templates.write().remove(id).map_or(0, |_| 1))
    }

    async fn delete_by_creator(&self, _session: &Session, user_id: &str) -> Result<u64> {
        let mut templates = self.templates.write();
        let before = templates.len();
        templates.retain(|_, t| t.create_user != user_id);
        Ok((before - templates.len()) as u64)
    }

    async fn list_by_creator(&self, _session: &Session, table_id: &str, user_id: &str) -> Result<Vec<StoredTemplate>> {
        Ok(self.select(|t| t.table_id == table_id && t.create_user == user_id))
    }

    async fn list_by_share_user(&self, _session: &Session, table_id: &str, user_id: &str) -> Result<Vec<StoredTemplate>> {
        Ok(self.select(|t| {
            t.table_id == table_id
                && t.access == AccessType::Shared
                && t.share_list.iter().any(|u| u == user_id)
        }))
    }

    async fn list_public(&self, _session: &Session, table_id: &str) -> Result<Vec<StoredTemplate>> {
        Ok(self.select(|t| t.table_id == table_id && t.access == AccessType::Public))
    }
}
