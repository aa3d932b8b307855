use crate::entities::{table_template_shares, table_templates};
use crate::error::db_error;
use async_trait::async_trait;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use temps_table::{AccessType, Result, Session, StoredTemplate, TableError, TemplateStore, TemplateUpdate};
use tracing::debug;

/// Saved templates persisted in `table_templates` and `table_template_shares`
pub struct SqlTemplateStore {
    db: Arc<DatabaseConnection>,
}

impl SqlTemplateStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn with_shares(&self, models: Vec<table_templates::Model>) -> Result<Vec<StoredTemplate>> {
        if models.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = models.iter().map(|m| m.id.clone()).collect();
        let mut shares = load_shares(self.db.as_ref(), ids).await?;
        models
            .into_iter()
            .map(|model| {
                let share_list = shares.remove(&model.id).unwrap_or_default();
                to_stored(model, share_list)
            })
            .collect()
    }
}

async fn load_shares<C: ConnectionTrait>(db: &C, template_ids: Vec<String>) -> Result<HashMap<String, Vec<String>>> {
    let rows = table_template_shares::Entity::find()
        .filter(table_template_shares::Column::TemplateId.is_in(template_ids))
        .order_by_asc(table_template_shares::Column::Id)
        .all(db)
        .await
        .map_err(db_error)?;

    let mut shares: HashMap<String, Vec<String>> = HashMap::new();
    for row in rows {
        shares.entry(row.template_id).or_default().push(row.user_id);
    }
    Ok(shares)
}

async fn insert_shares<C: ConnectionTrait>(db: &C, template_id: &str, users: &[String]) -> Result<()> {
    if users.is_empty() {
        return Ok(());
    }
    let rows = users.iter().map(|user| table_template_shares::ActiveModel {
        template_id: Set(template_id.to_string()),
        user_id: Set(user.clone()),
        ..Default::default()
    });
    table_template_shares::Entity::insert_many(rows)
        .exec_without_returning(db)
        .await
        .map_err(db_error)?;
    Ok(())
}

fn to_stored(model: table_templates::Model, share_list: Vec<String>) -> Result<StoredTemplate> {
    let access = AccessType::from_code(model.access).ok_or_else(|| {
        TableError::backend(format!(
            "template {} has unknown access code {}",
            model.id, model.access
        ))
    })?;
    Ok(StoredTemplate {
        id: model.id,
        name: model.name,
        table_id: model.table_id,
        access,
        create_user: model.create_user,
        create_time: model.create_time,
        modify_time: model.modify_time,
        body: model.body,
        share_list,
    })
}

#[async_trait]
impl TemplateStore for SqlTemplateStore {
    async fn create(&self, _session: &Session, template: StoredTemplate) -> Result<()> {
        let txn = self.db.begin().await.map_err(db_error)?;

        let model = table_templates::ActiveModel {
            id: Set(template.id.clone()),
            name: Set(template.name),
            table_id: Set(template.table_id),
            access: Set(template.access.code()),
            create_user: Set(template.create_user),
            create_time: Set(template.create_time),
            modify_time: Set(template.modify_time),
            body: Set(template.body),
        };
        table_templates::Entity::insert(model)
            .exec_without_returning(&txn)
            .await
            .map_err(db_error)?;
        insert_shares(&txn, &template.id, &template.share_list).await?;

        txn.commit().await.map_err(db_error)?;
        debug!("Stored template {}", template.id);
        Ok(())
    }

    async fn find(&self, _session: &Session, id: &str) -> Result<StoredTemplate> {
        let model = table_templates::Entity::find_by_id(id.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(db_error)?
            .ok_or_else(|| TableError::TemplateNotFound(id.to_string()))?;
        let mut found = self.with_shares(vec![model]).await?;
        found
            .pop()
            .ok_or_else(|| TableError::TemplateNotFound(id.to_string()))
    }

    async fn update(&self, _session: &Session, id: &str, update: TemplateUpdate) -> Result<()> {
        let txn = self.db.begin().await.map_err(db_error)?;

        let result = table_templates::Entity::update_many()
            .filter(table_templates::Column::Id.eq(id))
            .set(table_templates::ActiveModel {
                name: Set(update.name),
                access: Set(update.access.code()),
                body: Set(update.body),
                modify_time: Set(update.modify_time),
                ..Default::default()
            })
            .exec(&txn)
            .await
            .map_err(db_error)?;
        if result.rows_affected == 0 {
            return Err(TableError::TemplateNotFound(id.to_string()));
        }

        table_template_shares::Entity::delete_many()
            .filter(table_template_shares::Column::TemplateId.eq(id))
            .exec(&txn)
            .await
            .map_err(db_error)?;
        insert_shares(&txn, id, &update.share_list).await?;

        txn.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn delete(&self, _session: &Session, id: &str) -> Result<u64> {
        let txn = self.db.begin().await.map_err(db_error)?;
        table_template_shares::Entity::delete_many()
            .filter(table_template_shares::Column::TemplateId.eq(id))
            .exec(&txn)
            .await
            .map_err(db_error)?;
        let result = table_templates::Entity::delete_by_id(id.to_string())
            .exec(&txn)
            .await
            .map_err(db_error)?;
        txn.commit().await.map_err(db_error)?;
        Ok(result.rows_affected)
    }

    async fn delete_by_creator(&self, _session: &Session, user_id: &str) -> Result<u64> {
        let txn = self.db.begin().await.map_err(db_error)?;
        let ids: Vec<String> = table_templates::Entity::find()
            .filter(table_templates::Column::CreateUser.eq(user_id))
            .all(&txn)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(|m| m.id)
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }

        table_template_shares::Entity::delete_many()
            .filter(table_template_shares::Column::TemplateId.is_in(ids))
            .exec(&txn)
            .await
            .map_err(db_error)?;
        let result = table_templates::Entity::delete_many()
            .filter(table_templates::Column::CreateUser.eq(user_id))
            .exec(&txn)
            .await
            .map_err(db_error)?;
        txn.commit().await.map_err(db_error)?;
        debug!("Deleted {} templates of user {}", result.rows_affected, user_id);
        Ok(result.rows_affected)
    }

    async fn list_by_creator(&self, _session: &Session, table_id: &str, user_id: &str) -> Result<Vec<StoredTemplate>> {
        let models = table_templates::Entity::find()
            .filter(table_templates::Column::TableId.eq(table_id))
            .filter(table_templates::Column::CreateUser.eq(user_id))
            .order_by_asc(table_templates::Column::CreateTime)
            .order_by_asc(table_templates::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(db_error)?;
        self.with_shares(models).await
    }

    async fn list_by_share_user(&self, _session: &Session, table_id: &str, user_id: &str) -> Result<Vec<StoredTemplate>> {
        let shared: Vec<String> = table_template_shares::Entity::find()
            .filter(table_template_shares::Column::UserId.eq(user_id))
            .all(self.db.as_ref())
            .await
            .map_err(db_error)?
            .into_iter()
            .map(|s| s.template_id)
            .collect();
        if shared.is_empty() {
            return Ok(Vec::new());
        }

        let models = table_templates::Entity::find()
            .filter(table_templates::Column::Id.is_in(shared))
            .filter(table_templates::Column::TableId.eq(table_id))
            .filter(table_templates::Column::Access.eq(AccessType::Shared.code()))
            .order_by_asc(table_templates::Column::CreateTime)
            .order_by_asc(table_templates::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(db_error)?;
        self.with_shares(models).await
    }

    async fn list_public(&self, _session: &Session, table_id: &str) -> Result<Vec<StoredTemplate>> {
        let models = table_templates::Entity::find()
            .filter(table_templates::Column::TableId.eq(table_id))
            .filter(table_templates::Column::Access.eq(AccessType::Public.code()))
            .order_by_asc(table_templates::Column::CreateTime)
            .order_by_asc(table_templates::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(db_error)?;
        // public templates carry no share list
        models
            .into_iter()
            .map(|m| to_stored(m, Vec::new()))
            .collect()
    }
}
