use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    Invitation, InvitationKind, InvitationRepo, ItemRepo, ListMember, ListRepo, MagicLink,
    MagicLinkRepo, MemberView, SettingsRepo, ShoppingItem, ShoppingList, StoreResult,
    SystemSettings, User, UserRepo,
};

const USER_COLUMNS: &str = "id, email, invited_by, joined_at, created_at";
const INVITATION_COLUMNS: &str =
    "id, code, email, kind, list_id, invited_by, expires_at, used, created_at";
const LIST_COLUMNS: &str = "id, name, owner_id, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, list_id, name, completed, tags, created_at";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pub pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepo for PgStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, invited_by, joined_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(user.invited_by)
        .bind(user.joined_at)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MagicLinkRepo for PgStore {
    async fn replace_magic_link(&self, link: &MagicLink) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM magic_links WHERE email = $1")
            .bind(&link.email)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO magic_links (code, email, expires_at, used)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&link.code)
        .bind(&link.email)
        .bind(link.expires_at)
        .bind(link.used)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn consume_magic_link(
        &self,
        email: &str,
        code: &str,
        now: OffsetDateTime,
    ) -> StoreResult<Option<MagicLink>> {
        let link = sqlx::query_as::<_, MagicLink>(
            r#"
            UPDATE magic_links
               SET used = TRUE
             WHERE code = $1 AND email = $2 AND NOT used AND expires_at > $3
            RETURNING code, email, expires_at, used
            "#,
        )
        .bind(code)
        .bind(email)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(link)
    }
}

#[async_trait]
impl InvitationRepo for PgStore {
    async fn find_unused_invitation(
        &self,
        email: &str,
        kind: InvitationKind,
    ) -> StoreResult<Option<Invitation>> {
        let inv = sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations
              WHERE email = $1 AND kind = $2 AND NOT used
              LIMIT 1"
        ))
        .bind(email)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;
        Ok(inv)
    }

    async fn find_pending_invitation(
        &self,
        email: &str,
        kind: Option<InvitationKind>,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Invitation>> {
        let inv = sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations
              WHERE email = $1 AND NOT used AND expires_at > $2
                AND ($3::invitation_kind IS NULL OR kind = $3)
              ORDER BY created_at DESC
              LIMIT 1"
        ))
        .bind(email)
        .bind(now)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;
        Ok(inv)
    }

    async fn delete_unused_invitations(&self, email: &str) -> StoreResult<u64> {
        let res = sqlx::query("DELETE FROM invitations WHERE email = $1 AND NOT used")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    async fn insert_invitation(&self, inv: &Invitation) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invitations
                (id, code, email, kind, list_id, invited_by, expires_at, used, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(inv.id)
        .bind(&inv.code)
        .bind(&inv.email)
        .bind(inv.kind)
        .bind(inv.list_id)
        .bind(inv.invited_by)
        .bind(inv.expires_at)
        .bind(inv.used)
        .bind(inv.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume_invitation(
        &self,
        email: &str,
        code: &str,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Invitation>> {
        let inv = sqlx::query_as::<_, Invitation>(&format!(
            "UPDATE invitations
                SET used = TRUE
              WHERE email = $1 AND code = $2 AND NOT used AND expires_at > $3
             RETURNING {INVITATION_COLUMNS}"
        ))
        .bind(email)
        .bind(code)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(inv)
    }

    async fn invitations_by_inviter(&self, inviter_id: Uuid) -> StoreResult<Vec<Invitation>> {
        let rows = sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations
              WHERE invited_by = $1
              ORDER BY created_at DESC"
        ))
        .bind(inviter_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn delete_unused_invitation(&self, id: Uuid, inviter_id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM invitations WHERE id = $1 AND invited_by = $2 AND NOT used")
            .bind(id)
            .bind(inviter_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl ListRepo for PgStore {
    async fn insert_list_with_owner(&self, list: &ShoppingList, owner: &ListMember) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_list(&mut *tx, list).await?;
        insert_member(&mut *tx, owner).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_list(&self, list_id: Uuid) -> StoreResult<Option<ShoppingList>> {
        let list = sqlx::query_as::<_, ShoppingList>(&format!(
            "SELECT {LIST_COLUMNS} FROM shopping_lists WHERE id = $1"
        ))
        .bind(list_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(list)
    }

    async fn find_list_for_member(&self, list_id: Uuid, user_id: Uuid) -> StoreResult<Option<ShoppingList>> {
        let list = sqlx::query_as::<_, ShoppingList>(
            r#"
            SELECT l.id, l.name, l.owner_id, l.created_at, l.updated_at
              FROM shopping_lists l
              JOIN list_members m ON m.list_id = l.id
             WHERE l.id = $1 AND m.user_id = $2
            "#,
        )
        .bind(list_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(list)
    }

    async fn lists_for_member(&self, user_id: Uuid) -> StoreResult<Vec<ShoppingList>> {
        let rows = sqlx::query_as::<_, ShoppingList>(
            r#"
            SELECT l.id, l.name, l.owner_id, l.created_at, l.updated_at
              FROM shopping_lists l
              JOIN list_members m ON m.list_id = l.id
             WHERE m.user_id = $1
             ORDER BY l.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_list_name(
        &self,
        list_id: Uuid,
        name: &str,
        updated_at: OffsetDateTime,
    ) -> StoreResult<Option<ShoppingList>> {
        let list = sqlx::query_as::<_, ShoppingList>(&format!(
            "UPDATE shopping_lists SET name = $2, updated_at = $3 WHERE id = $1
             RETURNING {LIST_COLUMNS}"
        ))
        .bind(list_id)
        .bind(name)
        .bind(updated_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(list)
    }

    async fn delete_list_cascade(&self, list_id: Uuid) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM list_members WHERE list_id = $1")
            .bind(list_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM shopping_items WHERE list_id = $1")
            .bind(list_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM invitations WHERE list_id = $1")
            .bind(list_id)
            .execute(&mut *tx)
            .await?;
        let res = sqlx::query("DELETE FROM shopping_lists WHERE id = $1")
            .bind(list_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }

    async fn find_member(&self, list_id: Uuid, user_id: Uuid) -> StoreResult<Option<ListMember>> {
        let member = sqlx::query_as::<_, ListMember>(
            r#"
            SELECT list_id, user_id, role, joined_at
              FROM list_members
             WHERE list_id = $1 AND user_id = $2
            "#,
        )
        .bind(list_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    async fn insert_member(&self, member: &ListMember) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_member(&mut *conn, member).await
    }

    async fn delete_member(&self, list_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM list_members WHERE list_id = $1 AND user_id = $2")
            .bind(list_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn count_owners(&self, list_id: Uuid) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM list_members WHERE list_id = $1 AND role = 'owner'",
        )
        .bind(list_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn members_of(&self, list_id: Uuid) -> StoreResult<Vec<MemberView>> {
        let rows = sqlx::query_as::<_, MemberView>(
            r#"
            SELECT m.user_id, u.email, m.role, m.joined_at
              FROM list_members m
              JOIN users u ON u.id = m.user_id
             WHERE m.list_id = $1
             ORDER BY m.joined_at ASC
            "#,
        )
        .bind(list_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl ItemRepo for PgStore {
    async fn items_for_list(&self, list_id: Uuid) -> StoreResult<Vec<ShoppingItem>> {
        let rows = sqlx::query_as::<_, ShoppingItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM shopping_items WHERE list_id = $1 ORDER BY created_at DESC"
        ))
        .bind(list_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_item(&self, item: &ShoppingItem) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO shopping_items (id, list_id, name, completed, tags, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(item.id)
        .bind(item.list_id)
        .bind(&item.name)
        .bind(item.completed)
        .bind(&item.tags)
        .bind(item.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_item(&self, list_id: Uuid, item_id: Uuid) -> StoreResult<Option<ShoppingItem>> {
        let item = sqlx::query_as::<_, ShoppingItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM shopping_items WHERE id = $1 AND list_id = $2"
        ))
        .bind(item_id)
        .bind(list_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn update_item(&self, item: &ShoppingItem) -> StoreResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE shopping_items
               SET name = $3, completed = $4, tags = $5
             WHERE id = $1 AND list_id = $2
            "#,
        )
        .bind(item.id)
        .bind(item.list_id)
        .bind(&item.name)
        .bind(item.completed)
        .bind(&item.tags)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_item(&self, list_id: Uuid, item_id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM shopping_items WHERE id = $1 AND list_id = $2")
            .bind(item_id)
            .bind(list_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl SettingsRepo for PgStore {
    async fn system_settings(&self) -> StoreResult<Option<SystemSettings>> {
        let row = sqlx::query_as::<_, SystemSettings>(
            "SELECT id, is_setup, setup_at, initial_admin FROM system_settings WHERE id = 'system'",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn bootstrap(
        &self,
        admin: &User,
        list: &ShoppingList,
        owner: &ListMember,
        settings: &SystemSettings,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO users (id, email, invited_by, joined_at, created_at)
            VALUES ($1, $2, NULL, $3, $4)
            "#,
        )
        .bind(admin.id)
        .bind(&admin.email)
        .bind(admin.joined_at)
        .bind(admin.created_at)
        .execute(&mut *tx)
        .await?;
        insert_list(&mut *tx, list).await?;
        insert_member(&mut *tx, owner).await?;
        sqlx::query(
            r#"
            INSERT INTO system_settings (id, is_setup, setup_at, initial_admin)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&settings.id)
        .bind(settings.is_setup)
        .bind(settings.setup_at)
        .bind(settings.initial_admin)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn insert_list(conn: &mut sqlx::PgConnection, list: &ShoppingList) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO shopping_lists (id, name, owner_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(list.id)
    .bind(&list.name)
    .bind(list.owner_id)
    .bind(list.created_at)
    .bind(list.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_member(conn: &mut sqlx::PgConnection, member: &ListMember) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO list_members (list_id, user_id, role, joined_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(member.list_id)
    .bind(member.user_id)
    .bind(member.role)
    .bind(member.joined_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
