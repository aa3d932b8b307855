//! Saved templates: records, storage contract and the user directory the
//! service consults for ownership and display names.

mod memory;
mod service;

pub use memory::InMemoryTemplateStore;
pub use service::{TemplateRef, TemplateService};

use crate::error::Result;
use crate::session::Session;
use crate::template::Template;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who can see a saved template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessType {
    #[default]
    Private,
    Public,
    Shared,
}

impl AccessType {
    /// Numeric code used in storage
    pub fn code(&self) -> i32 {
        match self {
            AccessType::Private => 0,
            AccessType::Public => 1,
            AccessType::Shared => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(AccessType::Private),
            1 => Some(AccessType::Public),
            2 => Some(AccessType::Shared),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub display_name: String,
}

impl UserInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Ownership and sharing details of a saved template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub access: AccessType,
    pub create_user: UserInfo,
    pub create_time: DateTime<Utc>,
    pub modify_time: DateTime<Utc>,
    #[serde(default)]
    pub share_list: Vec<String>,
}

/// A template as presented to users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedTemplate {
    pub template: Template,
    /// `None` for the built-in empty and default templates
    #[serde(default)]
    pub file_info: Option<FileInfo>,
}

/// A template as persisted; the body is serialized JSON
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTemplate {
    pub id: String,
    pub name: String,
    pub table_id: String,
    pub access: AccessType,
    pub create_user: String,
    pub create_time: DateTime<Utc>,
    pub modify_time: DateTime<Utc>,
    pub body: String,
    /// Only populated for shared templates
    pub share_list: Vec<String>,
}

/// Fields replaced by an update
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateUpdate {
    pub name: String,
    pub access: AccessType,
    pub body: String,
    pub share_list: Vec<String>,
    pub modify_time: DateTime<Utc>,
}

/// Persistence for saved templates
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn create(&self, session: &Session, template: StoredTemplate) -> Result<()>;

    /// Fails with [`crate::TableError::TemplateNotFound`] for unknown ids
    async fn find(&self, session: &Session, id: &str) -> Result<StoredTemplate>;

    async fn update(&self, session: &Session, id: &str, update: TemplateUpdate) -> Result<()>;

    /// Returns the number of removed templates
    async fn delete(&self, session: &Session, id: &str) -> Result<u64>;

    async fn delete_by_creator(&self, session: &Session, user_id: &str) -> Result<u64>;

    async fn list_by_creator(&self, session: &Session, table_id: &str, user_id: &str) -> Result<Vec<StoredTemplate>>;

    /// Templates of a table shared with `user_id`
    async fn list_by_share_user(&self, session: &Session, table_id: &str, user_id: &str) -> Result<Vec<StoredTemplate>>;

    async fn list_public(&self, session: &Session, table_id: &str) -> Result<Vec<StoredTemplate>>;
}

/// Source of user identities
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn current_user(&self, session: &Session) -> Result<UserInfo>;

    async fn user_by_id(&self, id: &str) -> Result<UserInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_codes() {
        for access in [AccessType::Private, AccessType::Public, AccessType::Shared] {
            assert_eq!(AccessType::from_code(access.code()), Some(access));
        }
        assert_eq!(AccessType::from_code(9), None);
        assert_eq!(
            serde_json::to_string(&AccessType::Shared).unwrap(),
            "\"SHARED\""
        );
    }
}
