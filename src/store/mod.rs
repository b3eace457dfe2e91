//! Persistence gateway: plain records plus one repository trait per entity.
//!
//! `PgStore` is the production implementation. Tests run the services against
//! `memory::MemoryStore`, which enforces the same uniqueness rules as the schema
//! in `migrations/`.

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[cfg(test)]
pub mod memory;
mod pg;

pub use pg::PgStore;

/// Constraint names shared by the schema and the in-memory store.
pub mod constraints {
    pub const USER_EMAIL: &str = "users_email_key";
    pub const MAGIC_LINK_CODE: &str = "magic_links_pkey";
    pub const INVITATION_CODE: &str = "invitations_code_key";
    pub const ONE_UNUSED_INVITATION: &str = "invitations_one_unused_per_email";
    pub const LIST_MEMBER: &str = "list_members_pkey";
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint {0} violated")]
    UniqueViolation(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    pub fn violates(&self, constraint: &str) -> bool {
        matches!(self, StoreError::UniqueViolation(c) if c == constraint)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db) = e.as_database_error() {
            if db.is_unique_violation() {
                return StoreError::UniqueViolation(db.constraint().unwrap_or("unknown").to_string());
            }
        }
        StoreError::Database(e)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---- records ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Member,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invitation_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvitationKind {
    /// Admits a new user to the server.
    Server,
    /// Admits a new or existing user to one list.
    List,
}

impl FromStr for InvitationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server" => Ok(InvitationKind::Server),
            "list" => Ok(InvitationKind::List),
            other => Err(format!("invalid invitation type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// `None` only for the admin created by `setup`.
    pub invited_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct MagicLink {
    pub code: String,
    pub email: String,
    pub expires_at: OffsetDateTime,
    pub used: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Invitation {
    pub id: Uuid,
    pub code: String,
    pub email: String,
    #[serde(rename = "type")]
    pub kind: InvitationKind,
    pub list_id: Option<Uuid>,
    pub invited_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub used: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ShoppingList {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ListMember {
    pub list_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

/// A membership row joined with the member's email.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct MemberView {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ShoppingItem {
    pub id: Uuid,
    pub list_id: Uuid,
    pub name: String,
    pub completed: bool,
    pub tags: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct SystemSettings {
    pub id: String,
    pub is_setup: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub setup_at: OffsetDateTime,
    pub initial_admin: Uuid,
}

// ---- repositories ----

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
}

#[async_trait]
pub trait MagicLinkRepo: Send + Sync {
    /// Deletes every code stored for `link.email` and stores `link` in their place.
    async fn replace_magic_link(&self, link: &MagicLink) -> StoreResult<()>;

    /// Marks the unused, unexpired code for `(email, code)` as used and returns it.
    async fn consume_magic_link(
        &self,
        email: &str,
        code: &str,
        now: OffsetDateTime,
    ) -> StoreResult<Option<MagicLink>>;
}

#[async_trait]
pub trait InvitationRepo: Send + Sync {
    async fn find_unused_invitation(
        &self,
        email: &str,
        kind: InvitationKind,
    ) -> StoreResult<Option<Invitation>>;

    /// Newest unused, unexpired invitation for `email`, optionally of one kind.
    async fn find_pending_invitation(
        &self,
        email: &str,
        kind: Option<InvitationKind>,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Invitation>>;

    async fn delete_unused_invitations(&self, email: &str) -> StoreResult<u64>;
    async fn insert_invitation(&self, invitation: &Invitation) -> StoreResult<()>;

    async fn consume_invitation(
        &self,
        email: &str,
        code: &str,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Invitation>>;

    async fn invitations_by_inviter(&self, inviter_id: Uuid) -> StoreResult<Vec<Invitation>>;

    /// Deletes the invitation only if `inviter_id` created it and it is unused.
    async fn delete_unused_invitation(&self, id: Uuid, inviter_id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait ListRepo: Send + Sync {
    async fn insert_list_with_owner(&self, list: &ShoppingList, owner: &ListMember) -> StoreResult<()>;
    async fn find_list(&self, list_id: Uuid) -> StoreResult<Option<ShoppingList>>;
    async fn find_list_for_member(&self, list_id: Uuid, user_id: Uuid) -> StoreResult<Option<ShoppingList>>;
    async fn lists_for_member(&self, user_id: Uuid) -> StoreResult<Vec<ShoppingList>>;

    async fn update_list_name(
        &self,
        list_id: Uuid,
        name: &str,
        updated_at: OffsetDateTime,
    ) -> StoreResult<Option<ShoppingList>>;

    /// Removes the list together with its members, items and pending invitations.
    async fn delete_list_cascade(&self, list_id: Uuid) -> StoreResult<bool>;

    async fn find_member(&self, list_id: Uuid, user_id: Uuid) -> StoreResult<Option<ListMember>>;
    async fn insert_member(&self, member: &ListMember) -> StoreResult<()>;
    async fn delete_member(&self, list_id: Uuid, user_id: Uuid) -> StoreResult<bool>;
    async fn count_owners(&self, list_id: Uuid) -> StoreResult<i64>;
    async fn members_of(&self, list_id: Uuid) -> StoreResult<Vec<MemberView>>;
}

#[async_trait]
pub trait ItemRepo: Send + Sync {
    async fn items_for_list(&self, list_id: Uuid) -> StoreResult<Vec<ShoppingItem>>;
    async fn insert_item(&self, item: &ShoppingItem) -> StoreResult<()>;
    async fn find_item(&self, list_id: Uuid, item_id: Uuid) -> StoreResult<Option<ShoppingItem>>;
    async fn update_item(&self, item: &ShoppingItem) -> StoreResult<bool>;
    async fn delete_item(&self, list_id: Uuid, item_id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait SettingsRepo: Send + Sync {
    async fn system_settings(&self) -> StoreResult<Option<SystemSettings>>;

    /// Creates the first admin, their default list and the settings row in one step.
    async fn bootstrap(
        &self,
        admin: &User,
        list: &ShoppingList,
        owner: &ListMember,
        settings: &SystemSettings,
    ) -> StoreResult<()>;
}

pub trait Store: UserRepo + MagicLinkRepo + InvitationRepo + ListRepo + ItemRepo + SettingsRepo {}

impl<T> Store for T where T: UserRepo + MagicLinkRepo + InvitationRepo + ListRepo + ItemRepo + SettingsRepo {}
