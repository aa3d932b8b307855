use super::{AccessType, FileInfo, SavedTemplate, StoredTemplate, TemplateStore, TemplateUpdate, UserDirectory, UserInfo};
use crate::context::TableContext;
use crate::error::{Result, TableError};
use crate::manager::validate_template;
use crate::schema::TableMetaData;
use crate::session::Session;
use crate::template::{Template, TemplateBody, TemplateColumn, TPL_DEFAULT, TPL_EMPTY};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// How a query names its template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateRef {
    /// `TPL_EMPTY`, `TPL_DEFAULT` or a saved template id
    Id(String),
    /// An unsaved template body
    Inline(TemplateBody),
}

/// Create, share and resolve saved templates
pub struct TemplateService {
    context: Arc<TableContext>,
    store: Arc<dyn TemplateStore>,
    users: Arc<dyn UserDirectory>,
}

impl TemplateService {
    pub fn new(context: Arc<TableContext>, store: Arc<dyn TemplateStore>, users: Arc<dyn UserDirectory>) -> Self {
        Self {
            context,
            store,
            users,
        }
    }

    /// Save a new template owned by the current user
    pub async fn create(
        &self,
        session: &Session,
        template: &Template,
        access: AccessType,
        share_list: Vec<String>,
    ) -> Result<SavedTemplate> {
        let meta = self.context.tables.find(&template.table_id)?;
        validate_template(&meta, template)?;
        let user = self.users.current_user(session).await?;

        let now = Utc::now();
        let stored = StoredTemplate {
            id: Uuid::new_v4().to_string(),
            name: template.name.clone(),
            table_id: template.table_id.clone(),
            access,
            create_user: user.id.clone(),
            create_time: now,
            modify_time: now,
            body: serde_json::to_string(&template.body)?,
            share_list: if access == AccessType::Shared {
                share_list
            } else {
                Vec::new()
            },
        };
        let id = stored.id.clone();
        self.store.create(session, stored).await?;
        debug!("Created template {} on table {} for user {}", id, meta.id, user.id);

        self.find(session, &id).await
    }

    /// Replace name, access and body of a template owned by the current user
    pub async fn update(
        &self,
        session: &Session,
        template: &Template,
        access: AccessType,
        share_list: Vec<String>,
    ) -> Result<SavedTemplate> {
        let meta = self.context.tables.find(&template.table_id)?;
        validate_template(&meta, template)?;
        let user = self.users.current_user(session).await?;

        let old = self.store.find(session, &template.id).await?;
        if old.create_user != user.id {
            return Err(TableError::OperatePermissionDenied(template.id.clone()));
        }
        let share_list = match access {
            AccessType::Shared => share_list,
            AccessType::Public => return Err(TableError::PublicSharingDisabled),
            AccessType::Private => Vec::new(),
        };

        let update = TemplateUpdate {
            name: template.name.clone(),
            access,
            body: serde_json::to_string(&template.body)?,
            share_list,
            modify_time: Utc::now(),
        };
        self.store.update(session, &template.id, update).await?;
        self.find(session, &template.id).await
    }

    pub async fn delete(&self, session: &Session, id: &str) -> Result<()> {
        let user = self.users.current_user(session).await?;
        let old = self.store.find(session, id).await?;
        if old.create_user != user.id {
            return Err(TableError::OperatePermissionDenied(id.to_string()));
        }
        self.store.delete(session, id).await?;
        debug!("Deleted template {}", id);
        Ok(())
    }

    /// Remove every template owned by the current user
    pub async fn delete_by_creator(&self, session: &Session) -> Result<u64> {
        let user = self.users.current_user(session).await?;
        self.store.delete_by_creator(session, &user.id).await
    }

    pub async fn find(&self, session: &Session, id: &str) -> Result<SavedTemplate> {
        let stored = self.store.find(session, id).await?;
        self.to_saved(stored).await
    }

    /// Templates the current user can pick for a table: the default
    /// template, their own, those shared with them and public ones,
    /// oldest first.
    pub async fn list_for_table(&self, session: &Session, table_id: &str) -> Result<Vec<SavedTemplate>> {
        let meta = self.context.tables.find(table_id)?;
        let user = self.users.current_user(session).await?;

        let mut list = vec![SavedTemplate {
            template: meta.default_template(),
            file_info: None,
        }];
        for stored in self.store.list_by_creator(session, table_id, &user.id).await? {
            list.push(self.to_saved(stored).await?);
        }

        let mut others = self.store.list_by_share_user(session, table_id, &user.id).await?;
        others.extend(self.store.list_public(session, table_id).await?);
        for stored in others {
            if stored.create_user == user.id {
                continue;
            }
            let mut saved = self.to_saved(stored).await?;
            let owner = saved
                .file_info
                .as_ref()
                .map(|f| owner_name(&f.create_user))
                .unwrap_or_default();
            saved.template.name = format!("{} [shared by {}]", saved.template.name, owner);
            list.push(saved);
        }

        list.sort_by_key(|t| t.file_info.as_ref().map(|f| f.create_time));
        let mut seen = HashSet::new();
        list.retain(|t| seen.insert(t.template.id.clone()));
        Ok(list)
    }

    /// Turn a template reference into a runnable template for `table_id`
    pub async fn resolve(&self, session: &Session, table_id: &str, reference: &TemplateRef) -> Result<Template> {
        let meta = self.context.tables.find(table_id)?;
        match reference {
            TemplateRef::Inline(body) => {
                let mut template = Template::temporary(table_id);
                template.body = body.clone();
                Ok(template)
            }
            TemplateRef::Id(id) if id == TPL_EMPTY => Ok(meta.empty_template()),
            TemplateRef::Id(id) if id == TPL_DEFAULT => Ok(meta.default_template()),
            TemplateRef::Id(id) => {
                let mut template = self.find(session, id).await?.template;
                template.table_id = table_id.to_string();
                Ok(template)
            }
        }
    }

    async fn to_saved(&self, stored: StoredTemplate) -> Result<SavedTemplate> {
        let body: TemplateBody = serde_json::from_str(&stored.body)?;
        let mut template = Template::temporary(&stored.table_id);
        template.id = stored.id;
        template.name = stored.name;
        template.body = body;

        match self.context.tables.find(&stored.table_id) {
            Ok(meta) => sync_columns(&meta, &mut template),
            Err(e) => warn!("Template {} refers to unknown table: {}", template.id, e),
        }

        let create_user = match self.users.user_by_id(&stored.create_user).await {
            Ok(user) => user,
            Err(e) => {
                warn!("Failed to load owner {} of template {}: {}", stored.create_user, template.id, e);
                UserInfo::new(&stored.create_user)
            }
        };

        Ok(SavedTemplate {
            template,
            file_info: Some(FileInfo {
                access: stored.access,
                create_user,
                create_time: stored.create_time,
                modify_time: stored.modify_time,
                share_list: if stored.access == AccessType::Shared {
                    stored.share_list
                } else {
                    Vec::new()
                },
            }),
        })
    }
}

fn owner_name(user: &UserInfo) -> &str {
    if user.display_name.is_empty() {
        &user.id
    } else {
        &user.display_name
    }
}

/// Drop output columns the table no longer has and append the ones the
/// template does not list yet, visible only when required.
fn sync_columns(meta: &TableMetaData, template: &mut Template) {
    template.body.output.retain(|c| meta.columns.contains(&c.column_id));
    if template.body.output.len() == meta.columns.len() {
        return;
    }
    let listed: HashSet<String> = template
        .body
        .output
        .iter()
        .map(|c| c.column_id.clone())
        .collect();
    for column in meta.columns.iter() {
        if !listed.contains(&column.id) {
            let mut output = TemplateColumn::new(&column.id);
            output.visible = column.required;
            template.body.output.push(output);
        }
    }
}
