use std::sync::Arc;

use serde_json::Value;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    lists::services::ListService,
    store::{ShoppingItem, Store},
    validation::required,
};

/// Item CRUD scoped to one list; every call requires list access.
#[derive(Clone)]
pub struct ItemService {
    store: Arc<dyn Store>,
    lists: ListService,
}

fn check_tags(tags: Option<Value>) -> Result<Option<Value>, AppError> {
    match tags {
        None | Some(Value::Null) => Ok(None),
        Some(tags @ Value::Array(_)) => Ok(Some(tags)),
        Some(_) => Err(AppError::validation("tags must be an array")),
    }
}

impl ItemService {
    pub fn new(store: Arc<dyn Store>, lists: ListService) -> Self {
        Self { store, lists }
    }

    async fn guard(&self, list_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        if !self.lists.has_access(list_id, user_id).await? {
            return Err(AppError::AccessDenied);
        }
        Ok(())
    }

    async fn load(&self, list_id: Uuid, item_id: Uuid) -> Result<ShoppingItem, AppError> {
        self.store
            .find_item(list_id, item_id)
            .await?
            .ok_or(AppError::NotFound("item"))
    }

    pub async fn list_items(&self, list_id: Uuid, user_id: Uuid) -> Result<Vec<ShoppingItem>, AppError> {
        self.guard(list_id, user_id).await?;
        Ok(self.store.items_for_list(list_id).await?)
    }

    pub async fn create_item(
        &self,
        list_id: Uuid,
        user_id: Uuid,
        name: &str,
        tags: Option<Value>,
    ) -> Result<ShoppingItem, AppError> {
        let name = required(name, "item name")?;
        let tags = check_tags(tags)?.unwrap_or_else(|| Value::Array(Vec::new()));
        self.guard(list_id, user_id).await?;

        let item = ShoppingItem {
            id: Uuid::new_v4(),
            list_id,
            name: name.to_string(),
            completed: false,
            tags,
            created_at: OffsetDateTime::now_utc(),
        };
        self.store.insert_item(&item).await?;
        info!(%list_id, item_id = %item.id, %user_id, "item created");
        Ok(item)
    }

    /// Replaces the name, and the tags when given.
    pub async fn update_item(
        &self,
        list_id: Uuid,
        user_id: Uuid,
        item_id: Uuid,
        name: &str,
        tags: Option<Value>,
    ) -> Result<ShoppingItem, AppError> {
        let name = required(name, "item name")?;
        let tags = check_tags(tags)?;
        self.guard(list_id, user_id).await?;

        let mut item = self.load(list_id, item_id).await?;
        item.name = name.to_string();
        if let Some(tags) = tags {
            item.tags = tags;
        }
        self.save(item).await
    }

    pub async fn toggle_item(&self, list_id: Uuid, user_id: Uuid, item_id: Uuid) -> Result<ShoppingItem, AppError> {
        self.guard(list_id, user_id).await?;
        let mut item = self.load(list_id, item_id).await?;
        item.completed = !item.completed;
        self.save(item).await
    }

    pub async fn delete_item(&self, list_id: Uuid, user_id: Uuid, item_id: Uuid) -> Result<(), AppError> {
        self.guard(list_id, user_id).await?;
        if !self.store.delete_item(list_id, item_id).await? {
            return Err(AppError::NotFound("item"));
        }
        info!(%list_id, %item_id, %user_id, "item deleted");
        Ok(())
    }

    async fn save(&self, item: ShoppingItem) -> Result<ShoppingItem, AppError> {
        if !self.store.update_item(&item).await? {
            return Err(AppError::NotFound("item"));
        }
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::{memory::MemoryStore, ShoppingList};

    struct Fixture {
        items: ItemService,
        list: ShoppingList,
        owner: Uuid,
        outsider: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let lists = ListService::new(store.clone());
        let owner = store.seed_user("owner@x.com").id;
        let outsider = store.seed_user("out@x.com").id;
        let list = lists.create_list(owner, "Groceries").await.unwrap();
        Fixture {
            items: ItemService::new(store, lists),
            list,
            owner,
            outsider,
        }
    }

    #[tokio::test]
    async fn create_defaults_tags_and_lists_newest_first() {
        let f = fixture().await;
        let milk = f.items.create_item(f.list.id, f.owner, "Milk", None).await.unwrap();
        assert_eq!(milk.tags, json!([]));
        assert!(!milk.completed);

        let eggs = f
            .items
            .create_item(f.list.id, f.owner, "Eggs", Some(json!(["dairy"])))
            .await
            .unwrap();
        let all = f.items.list_items(f.list.id, f.owner).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|i| i.id == eggs.id && i.tags == json!(["dairy"])));
    }

    #[tokio::test]
    async fn rejects_bad_input() {
        let f = fixture().await;
        let err = f.items.create_item(f.list.id, f.owner, " ", None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = f
            .items
            .create_item(f.list.id, f.owner, "Milk", Some(json!({"a": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn outsiders_are_denied() {
        let f = fixture().await;
        let item = f.items.create_item(f.list.id, f.owner, "Milk", None).await.unwrap();

        assert!(matches!(f.items.list_items(f.list.id, f.outsider).await, Err(AppError::AccessDenied)));
        assert!(matches!(
            f.items.toggle_item(f.list.id, f.outsider, item.id).await,
            Err(AppError::AccessDenied)
        ));
        assert!(matches!(
            f.items.delete_item(f.list.id, f.outsider, item.id).await,
            Err(AppError::AccessDenied)
        ));
    }

    #[tokio::test]
    async fn update_toggle_and_delete() {
        let f = fixture().await;
        let item = f
            .items
            .create_item(f.list.id, f.owner, "Milk", Some(json!(["dairy"])))
            .await
            .unwrap();

        let renamed = f
            .items
            .update_item(f.list.id, f.owner, item.id, "Oat milk", None)
            .await
            .unwrap();
        assert_eq!(renamed.name, "Oat milk");
        assert_eq!(renamed.tags, json!(["dairy"]));

        let toggled = f.items.toggle_item(f.list.id, f.owner, item.id).await.unwrap();
        assert!(toggled.completed);
        let toggled = f.items.toggle_item(f.list.id, f.owner, item.id).await.unwrap();
        assert!(!toggled.completed);

        f.items.delete_item(f.list.id, f.owner, item.id).await.unwrap();
        let err = f.items.delete_item(f.list.id, f.owner, item.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("item")));
    }

    #[tokio::test]
    async fn item_ids_are_scoped_to_their_list() {
        let f = fixture().await;
        let other = f.items.lists.create_list(f.owner, "Hardware").await.unwrap();
        let item = f.items.create_item(f.list.id, f.owner, "Milk", None).await.unwrap();

        let err = f.items.toggle_item(other.id, f.owner, item.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("item")));
    }
}
