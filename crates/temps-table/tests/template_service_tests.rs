use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use temps_table::{
    AccessType, DataKind, FieldSpec, InMemoryTemplateStore, Result, Session, TableContext, TableError, TableSpec,
    Template, TemplateRef, TemplateService, UserDirectory, UserInfo, Value, TPL_DEFAULT, TPL_EMPTY,
};

struct StaticUsers {
    users: HashMap<String, UserInfo>,
}

#[async_trait]
impl UserDirectory for StaticUsers {
    async fn current_user(&self, session: &Session) -> Result<UserInfo> {
        let id = session
            .user_id()
            .ok_or_else(|| TableError::InvalidQuery("session has no user".to_string()))?;
        self.user_by_id(id).await
    }

    async fn user_by_id(&self, id: &str) -> Result<UserInfo> {
        self.users
            .get(id)
            .cloned()
            .ok_or_else(|| TableError::backend(format!("unknown user {}", id)))
    }
}

fn service() -> TemplateService {
    let context = Arc::new(TableContext::new());
    context
        .register_table(
            &TableSpec::new("Stock", "Stock")
                .field(FieldSpec::new("Code", DataKind::String).key().filters("EQ|IN").required())
                .field(FieldSpec::new("Qty", DataKind::Int).filters("SINT"))
                .field(FieldSpec::new("Note", DataKind::String).filters("SSTR")),
        )
        .unwrap();

    let users = ["alice", "bob", "carol"]
        .into_iter()
        .map(|id| {
            let mut user = UserInfo::new(id);
            user.user_name = id.to_string();
            if id == "alice" {
                user.display_name = "Alice".to_string();
            }
            (id.to_string(), user)
        })
        .collect();

    TemplateService::new(
        context,
        Arc::new(InMemoryTemplateStore::new()),
        Arc::new(StaticUsers { users }),
    )
}

fn template(name: &str) -> Template {
    let mut template = Template::temporary("Stock")
        .output(["Code", "Qty", "Note"])
        .filter("Qty", "GT", vec![Value::Int(10)]);
    template.name = name.to_string();
    template
}

fn names(list: &[temps_table::SavedTemplate]) -> Vec<&str> {
    list.iter().map(|t| t.template.name.as_str()).collect()
}

#[tokio::test]
async fn test_create_and_find() {
    let service = service();
    let alice = Session::new().with_user("alice");

    let saved = service
        .create(&alice, &template("Low stock"), AccessType::Shared, vec!["bob".to_string()])
        .await
        .unwrap();
    assert_eq!(saved.template.name, "Low stock");
    assert_eq!(saved.template.table_id, "Stock");
    let info = saved.file_info.as_ref().unwrap();
    assert_eq!(info.access, AccessType::Shared);
    assert_eq!(info.create_user.display_name, "Alice");
    assert_eq!(info.share_list, vec!["bob".to_string()]);

    let found = service.find(&alice, &saved.template.id).await.unwrap();
    assert_eq!(found, saved);
    assert_eq!(found.template.body.filter.len(), 1);
}

#[tokio::test]
async fn test_share_list_only_kept_for_shared() {
    let service = service();
    let alice = Session::new().with_user("alice");

    let saved = service
        .create(&alice, &template("Everyone"), AccessType::Public, vec!["bob".to_string()])
        .await
        .unwrap();
    assert!(saved.file_info.unwrap().share_list.is_empty());
}

#[tokio::test]
async fn test_create_rejects_invalid_template() {
    let service = service();
    let alice = Session::new().with_user("alice");

    let bad = Template::temporary("Stock").output(["Code", "Price"]);
    let err = service
        .create(&alice, &bad, AccessType::Private, vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, TableError::InvalidColumnId { .. }));

    let err = service
        .create(&alice, &Template::temporary("Nope").output(["Code"]), AccessType::Private, vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, TableError::TableNotFound(_)));
}

#[tokio::test]
async fn test_list_for_table() {
    let service = service();
    let alice = Session::new().with_user("alice");
    let bob = Session::new().with_user("bob");
    let carol = Session::new().with_user("carol");

    service
        .create(&alice, &template("Alice private"), AccessType::Private, vec![])
        .await
        .unwrap();
    service
        .create(&alice, &template("Alice for bob"), AccessType::Shared, vec!["bob".to_string()])
        .await
        .unwrap();
    service
        .create(&carol, &template("Carol public"), AccessType::Public, vec![])
        .await
        .unwrap();
    service
        .create(&bob, &template("Bob own"), AccessType::Public, vec![])
        .await
        .unwrap();

    let list = service.list_for_table(&bob, "Stock").await.unwrap();
    assert_eq!(list[0].template.id, TPL_DEFAULT);
    assert!(list[0].file_info.is_none());

    let mut listed = names(&list)[1..].to_vec();
    listed.sort();
    assert_eq!(
        listed,
        vec!["Alice for bob [shared by Alice]", "Bob own", "Carol public [shared by carol]"]
    );

    let list = service.list_for_table(&alice, "Stock").await.unwrap();
    let mut listed = names(&list)[1..].to_vec();
    listed.sort();
    assert_eq!(
        listed,
        vec![
            "Alice for bob",
            "Alice private",
            "Bob own [shared by bob]",
            "Carol public [shared by carol]"
        ]
    );
}

#[tokio::test]
async fn test_update_rules() {
    let service = service();
    let alice = Session::new().with_user("alice");
    let bob = Session::new().with_user("bob");

    let saved = service
        .create(&alice, &template("Draft"), AccessType::Private, vec![])
        .await
        .unwrap();
    let mut changed = saved.template.clone();
    changed.name = "Final".to_string();

    let err = service
        .update(&bob, &changed, AccessType::Private, vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, TableError::OperatePermissionDenied(_)));

    let err = service
        .update(&alice, &changed, AccessType::Public, vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, TableError::PublicSharingDisabled));

    let updated = service
        .update(&alice, &changed, AccessType::Shared, vec!["carol".to_string()])
        .await
        .unwrap();
    assert_eq!(updated.template.name, "Final");
    let info = updated.file_info.unwrap();
    assert_eq!(info.access, AccessType::Shared);
    assert_eq!(info.share_list, vec!["carol".to_string()]);
    assert!(info.modify_time >= info.create_time);
}

#[tokio::test]
async fn test_delete() {
    let service = service();
    let alice = Session::new().with_user("alice");
    let bob = Session::new().with_user("bob");

    let first = service
        .create(&alice, &template("One"), AccessType::Private, vec![])
        .await
        .unwrap();
    service
        .create(&alice, &template("Two"), AccessType::Private, vec![])
        .await
        .unwrap();

    let err = service.delete(&bob, &first.template.id).await.unwrap_err();
    assert!(matches!(err, TableError::OperatePermissionDenied(_)));

    service.delete(&alice, &first.template.id).await.unwrap();
    let err = service.find(&alice, &first.template.id).await.unwrap_err();
    assert!(matches!(err, TableError::TemplateNotFound(_)));

    assert_eq!(service.delete_by_creator(&alice).await.unwrap(), 1);
    assert_eq!(service.delete_by_creator(&alice).await.unwrap(), 0);
}

#[tokio::test]
async fn test_resolve_references() {
    let service = service();
    let alice = Session::new().with_user("alice");

    let empty = service
        .resolve(&alice, "Stock", &TemplateRef::Id(TPL_EMPTY.to_string()))
        .await
        .unwrap();
    assert_eq!(empty.output_ids(), vec!["Code", "Qty", "Note"]);
    assert!(empty.body.filter.is_empty());

    let default = service
        .resolve(&alice, "Stock", &TemplateRef::Id(TPL_DEFAULT.to_string()))
        .await
        .unwrap();
    assert_eq!(default.id, TPL_DEFAULT);

    let inline = service
        .resolve(&alice, "Stock", &TemplateRef::Inline(template("Inline").body))
        .await
        .unwrap();
    assert_eq!(inline.table_id, "Stock");
    assert_eq!(inline.body.filter.len(), 1);

    let saved = service
        .create(&alice, &template("Saved"), AccessType::Private, vec![])
        .await
        .unwrap();
    let resolved = service
        .resolve(&alice, "Stock", &TemplateRef::Id(saved.template.id.clone()))
        .await
        .unwrap();
    assert_eq!(resolved.name, "Saved");

    let err = service
        .resolve(&alice, "Stock", &TemplateRef::Id("missing".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, TableError::TemplateNotFound(_)));
}
