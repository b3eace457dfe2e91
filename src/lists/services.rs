use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    store::{constraints, ListMember, MemberView, Role, ShoppingList, Store},
    validation::required,
};

/// Name given to the list every newly admitted user starts with.
pub const DEFAULT_LIST_NAME: &str = "My Shopping List";

/// Lists and the membership rules around them.
#[derive(Clone)]
pub struct ListService {
    store: Arc<dyn Store>,
}

impl ListService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Creates a list owned by `user_id`.
    pub async fn create_list(&self, user_id: Uuid, name: &str) -> Result<ShoppingList, AppError> {
        let name = required(name, "list name")?;
        if user_id.is_nil() {
            return Err(AppError::validation("user id cannot be empty"));
        }
        if self.store.find_user_by_id(user_id).await?.is_none() {
            return Err(AppError::NotFound("user"));
        }

        let now = OffsetDateTime::now_utc();
        let list = ShoppingList {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id: user_id,
            created_at: now,
            updated_at: now,
        };
        let owner = ListMember {
            list_id: list.id,
            user_id,
            role: Role::Owner,
            joined_at: now,
        };
        self.store.insert_list_with_owner(&list, &owner).await?;
        info!(list_id = %list.id, user_id = %user_id, "list created");
        Ok(list)
    }

    pub async fn create_default_list(&self, user_id: Uuid) -> Result<ShoppingList, AppError> {
        self.create_list(user_id, DEFAULT_LIST_NAME).await
    }

    pub async fn get_user_lists(&self, user_id: Uuid) -> Result<Vec<ShoppingList>, AppError> {
        Ok(self.store.lists_for_member(user_id).await?)
    }

    pub async fn get_list(&self, list_id: Uuid, user_id: Uuid) -> Result<ShoppingList, AppError> {
        self.store
            .find_list_for_member(list_id, user_id)
            .await?
            .ok_or(AppError::NotFoundOrAccessDenied)
    }

    pub async fn update_list(&self, list_id: Uuid, user_id: Uuid, name: &str) -> Result<ShoppingList, AppError> {
        let name = required(name, "list name")?;
        if !self.is_owner(list_id, user_id).await? {
            warn!(%list_id, %user_id, "rename refused: not owner");
            return Err(AppError::NotOwner);
        }
        let list = self
            .store
            .update_list_name(list_id, name, OffsetDateTime::now_utc())
            .await?
            .ok_or(AppError::NotFound("list"))?;
        info!(%list_id, %user_id, "list renamed");
        Ok(list)
    }

    /// Deletes the list with its members, items and pending invitations.
    pub async fn delete_list(&self, list_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        if !self.is_owner(list_id, user_id).await? {
            warn!(%list_id, %user_id, "delete refused: not owner");
            return Err(AppError::NotOwner);
        }
        if !self.store.delete_list_cascade(list_id).await? {
            return Err(AppError::NotFound("list"));
        }
        info!(%list_id, %user_id, "list deleted");
        Ok(())
    }

    pub async fn list_members(&self, list_id: Uuid, user_id: Uuid) -> Result<Vec<MemberView>, AppError> {
        if !self.has_access(list_id, user_id).await? {
            return Err(AppError::AccessDenied);
        }
        Ok(self.store.members_of(list_id).await?)
    }

    /// Adds `new_member_id` as a plain member; only owners may do this.
    pub async fn add_member(&self, list_id: Uuid, user_id: Uuid, new_member_id: Uuid) -> Result<(), AppError> {
        if !self.is_owner(list_id, user_id).await? {
            return Err(AppError::NotOwner);
        }
        if self.store.find_member(list_id, new_member_id).await?.is_some() {
            return Err(AppError::AlreadyMember);
        }

        let member = ListMember {
            list_id,
            user_id: new_member_id,
            role: Role::Member,
            joined_at: OffsetDateTime::now_utc(),
        };
        self.store.insert_member(&member).await.map_err(|e| {
            if e.violates(constraints::LIST_MEMBER) {
                AppError::AlreadyMember
            } else {
                e.into()
            }
        })?;
        info!(%list_id, added_by = %user_id, user_id = %new_member_id, "member added");
        Ok(())
    }

    /// Owners may remove anyone; members may remove themselves. A sole owner
    /// cannot leave their own list.
    pub async fn remove_member(&self, list_id: Uuid, user_id: Uuid, member_id: Uuid) -> Result<(), AppError> {
        let caller_is_owner = self.is_owner(list_id, user_id).await?;
        if !caller_is_owner && user_id != member_id {
            return Err(AppError::AccessDenied);
        }
        if caller_is_owner && user_id == member_id && self.store.count_owners(list_id).await? <= 1 {
            warn!(%list_id, %user_id, "last owner tried to leave");
            return Err(AppError::LastOwnerProtection);
        }

        if !self.store.delete_member(list_id, member_id).await? {
            return Err(AppError::MemberNotFound);
        }
        info!(%list_id, removed_by = %user_id, user_id = %member_id, "member removed");
        Ok(())
    }

    /// Whether `user_id` holds any membership on the list.
    pub async fn has_access(&self, list_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        Ok(self.store.find_member(list_id, user_id).await?.is_some())
    }

    pub async fn is_owner(&self, list_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        Ok(self
            .store
            .find_member(list_id, user_id)
            .await?
            .is_some_and(|m| m.role == Role::Owner))
    }
}
