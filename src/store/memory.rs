//! In-memory store for service and router tests.

use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    constraints, Invitation, InvitationKind, InvitationRepo, ItemRepo, ListMember, ListRepo,
    MagicLink, MagicLinkRepo, MemberView, Role, SettingsRepo, ShoppingItem, ShoppingList,
    StoreError, StoreResult, SystemSettings, User, UserRepo,
};

#[derive(Default)]
pub struct Tables {
    pub users: Vec<User>,
    pub magic_links: Vec<MagicLink>,
    pub invitations: Vec<Invitation>,
    pub lists: Vec<ShoppingList>,
    pub members: Vec<ListMember>,
    pub items: Vec<ShoppingItem>,
    pub settings: Option<SystemSettings>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct access for arranging and inspecting state in tests.
    pub fn with<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        let mut tables = self.tables.lock().unwrap();
        f(&mut tables)
    }

    pub fn seed_user(&self, email: &str) -> User {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            invited_by: None,
            joined_at: now,
            created_at: now,
        };
        self.with(|t| t.users.push(user.clone()));
        user
    }
}

fn unique(constraint: &str) -> StoreError {
    StoreError::UniqueViolation(constraint.to_string())
}

impl Tables {
    fn check_member_unique(&self, member: &ListMember) -> StoreResult<()> {
        if self
            .members
            .iter()
            .any(|m| m.list_id == member.list_id && m.user_id == member.user_id)
        {
            return Err(unique(constraints::LIST_MEMBER));
        }
        Ok(())
    }

    fn check_user_unique(&self, user: &User) -> StoreResult<()> {
        if self.users.iter().any(|u| u.email == user.email) {
            return Err(unique(constraints::USER_EMAIL));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.with(|t| t.users.iter().find(|u| u.email == email).cloned()))
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.with(|t| t.users.iter().find(|u| u.id == id).cloned()))
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.with(|t| {
            t.check_user_unique(user)?;
            t.users.push(user.clone());
            Ok(())
        })
    }
}

#[async_trait]
impl MagicLinkRepo for MemoryStore {
    async fn replace_magic_link(&self, link: &MagicLink) -> StoreResult<()> {
        self.with(|t| {
            if t.magic_links.iter().any(|l| l.code == link.code && l.email != link.email) {
                return Err(unique(constraints::MAGIC_LINK_CODE));
            }
            t.magic_links.retain(|l| l.email != link.email);
            t.magic_links.push(link.clone());
            Ok(())
        })
    }

    async fn consume_magic_link(
        &self,
        email: &str,
        code: &str,
        now: OffsetDateTime,
    ) -> StoreResult<Option<MagicLink>> {
        Ok(self.with(|t| {
            let link = t
                .magic_links
                .iter_mut()
                .find(|l| l.code == code && l.email == email && !l.used && l.expires_at > now)?;
            link.used = true;
            Some(link.clone())
        }))
    }
}

#[async_trait]
impl InvitationRepo for MemoryStore {
    async fn find_unused_invitation(
        &self,
        email: &str,
        kind: InvitationKind,
    ) -> StoreResult<Option<Invitation>> {
        Ok(self.with(|t| {
            t.invitations
                .iter()
                .find(|i| i.email == email && i.kind == kind && !i.used)
                .cloned()
        }))
    }

    async fn find_pending_invitation(
        &self,
        email: &str,
        kind: Option<InvitationKind>,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Invitation>> {
        Ok(self.with(|t| {
            t.invitations
                .iter()
                .filter(|i| i.email == email && !i.used && i.expires_at > now)
                .filter(|i| kind.map_or(true, |k| i.kind == k))
                .max_by_key(|i| i.created_at)
                .cloned()
        }))
    }

    async fn delete_unused_invitations(&self, email: &str) -> StoreResult<u64> {
        Ok(self.with(|t| {
            let before = t.invitations.len();
            t.invitations.retain(|i| !(i.email == email && !i.used));
            (before - t.invitations.len()) as u64
        }))
    }

    async fn insert_invitation(&self, invitation: &Invitation) -> StoreResult<()> {
        self.with(|t| {
            if t.invitations.iter().any(|i| i.code == invitation.code) {
                return Err(unique(constraints::INVITATION_CODE));
            }
            if !invitation.used
                && t.invitations.iter().any(|i| i.email == invitation.email && !i.used)
            {
                return Err(unique(constraints::ONE_UNUSED_INVITATION));
            }
            t.invitations.push(invitation.clone());
            Ok(())
        })
    }

    async fn consume_invitation(
        &self,
        email: &str,
        code: &str,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Invitation>> {
        Ok(self.with(|t| {
            let inv = t
                .invitations
                .iter_mut()
                .find(|i| i.email == email && i.code == code && !i.used && i.expires_at > now)?;
            inv.used = true;
            Some(inv.clone())
        }))
    }

    async fn invitations_by_inviter(&self, inviter_id: Uuid) -> StoreResult<Vec<Invitation>> {
        Ok(self.with(|t| {
            let mut rows: Vec<_> = t
                .invitations
                .iter()
                .filter(|i| i.invited_by == inviter_id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            rows
        }))
    }

    async fn delete_unused_invitation(&self, id: Uuid, inviter_id: Uuid) -> StoreResult<bool> {
        Ok(self.with(|t| {
            let before = t.invitations.len();
            t.invitations
                .retain(|i| !(i.id == id && i.invited_by == inviter_id && !i.used));
            before != t.invitations.len()
        }))
    }
}

#[async_trait]
impl ListRepo for MemoryStore {
    async fn insert_list_with_owner(&self, list: &ShoppingList, owner: &ListMember) -> StoreResult<()> {
        self.with(|t| {
            t.check_member_unique(owner)?;
            t.lists.push(list.clone());
            t.members.push(owner.clone());
            Ok(())
        })
    }

    async fn find_list(&self, list_id: Uuid) -> StoreResult<Option<ShoppingList>> {
        Ok(self.with(|t| t.lists.iter().find(|l| l.id == list_id).cloned()))
    }

    async fn find_list_for_member(&self, list_id: Uuid, user_id: Uuid) -> StoreResult<Option<ShoppingList>> {
        Ok(self.with(|t| {
            let is_member = t
                .members
                .iter()
                .any(|m| m.list_id == list_id && m.user_id == user_id);
            if !is_member {
                return None;
            }
            t.lists.iter().find(|l| l.id == list_id).cloned()
        }))
    }

    async fn lists_for_member(&self, user_id: Uuid) -> StoreResult<Vec<ShoppingList>> {
        Ok(self.with(|t| {
            let mut rows: Vec<_> = t
                .lists
                .iter()
                .filter(|l| t.members.iter().any(|m| m.list_id == l.id && m.user_id == user_id))
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            rows
        }))
    }

    async fn update_list_name(
        &self,
        list_id: Uuid,
        name: &str,
        updated_at: OffsetDateTime,
    ) -> StoreResult<Option<ShoppingList>> {
        Ok(self.with(|t| {
            let list = t.lists.iter_mut().find(|l| l.id == list_id)?;
            list.name = name.to_string();
            list.updated_at = updated_at;
            Some(list.clone())
        }))
    }

    async fn delete_list_cascade(&self, list_id: Uuid) -> StoreResult<bool> {
        Ok(self.with(|t| {
            t.members.retain(|m| m.list_id != list_id);
            t.items.retain(|i| i.list_id != list_id);
            t.invitations.retain(|i| i.list_id != Some(list_id));
            let before = t.lists.len();
            t.lists.retain(|l| l.id != list_id);
            before != t.lists.len()
        }))
    }

    async fn find_member(&self, list_id: Uuid, user_id: Uuid) -> StoreResult<Option<ListMember>> {
        Ok(self.with(|t| {
            t.members
                .iter()
                .find(|m| m.list_id == list_id && m.user_id == user_id)
                .cloned()
        }))
    }

    async fn insert_member(&self, member: &ListMember) -> StoreResult<()> {
        self.with(|t| {
            t.check_member_unique(member)?;
            t.members.push(member.clone());
            Ok(())
        })
    }

    async fn delete_member(&self, list_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(self.with(|t| {
            let before = t.members.len();
            t.members
                .retain(|m| !(m.list_id == list_id && m.user_id == user_id));
            before != t.members.len()
        }))
    }

    async fn count_owners(&self, list_id: Uuid) -> StoreResult<i64> {
        Ok(self.with(|t| {
            t.members
                .iter()
                .filter(|m| m.list_id == list_id && m.role == Role::Owner)
                .count() as i64
        }))
    }

    async fn members_of(&self, list_id: Uuid) -> StoreResult<Vec<MemberView>> {
        Ok(self.with(|t| {
            let mut rows: Vec<_> = t
                .members
                .iter()
                .filter(|m| m.list_id == list_id)
                .filter_map(|m| {
                    let user = t.users.iter().find(|u| u.id == m.user_id)?;
                    Some(MemberView {
                        user_id: m.user_id,
                        email: user.email.clone(),
                        role: m.role,
                        joined_at: m.joined_at,
                    })
                })
                .collect();
            rows.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
            rows
        }))
    }
}

#[async_trait]
impl ItemRepo for MemoryStore {
    async fn items_for_list(&self, list_id: Uuid) -> StoreResult<Vec<ShoppingItem>> {
        Ok(self.with(|t| {
            let mut rows: Vec<_> = t.items.iter().filter(|i| i.list_id == list_id).cloned().collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            rows
        }))
    }

    async fn insert_item(&self, item: &ShoppingItem) -> StoreResult<()> {
        self.with(|t| t.items.push(item.clone()));
        Ok(())
    }

    async fn find_item(&self, list_id: Uuid, item_id: Uuid) -> StoreResult<Option<ShoppingItem>> {
        Ok(self.with(|t| {
            t.items
                .iter()
                .find(|i| i.id == item_id && i.list_id == list_id)
                .cloned()
        }))
    }

    async fn update_item(&self, item: &ShoppingItem) -> StoreResult<bool> {
        Ok(self.with(|t| {
            match t
                .items
                .iter_mut()
                .find(|i| i.id == item.id && i.list_id == item.list_id)
            {
                Some(existing) => {
                    *existing = item.clone();
                    true
                }
                None => false,
            }
        }))
    }

    async fn delete_item(&self, list_id: Uuid, item_id: Uuid) -> StoreResult<bool> {
        Ok(self.with(|t| {
            let before = t.items.len();
            t.items.retain(|i| !(i.id == item_id && i.list_id == list_id));
            before != t.items.len()
        }))
    }
}

#[async_trait]
impl SettingsRepo for MemoryStore {
    async fn system_settings(&self) -> StoreResult<Option<SystemSettings>> {
        Ok(self.with(|t| t.settings.clone()))
    }

    async fn bootstrap(
        &self,
        admin: &User,
        list: &ShoppingList,
        owner: &ListMember,
        settings: &SystemSettings,
    ) -> StoreResult<()> {
        self.with(|t| {
            t.check_user_unique(admin)?;
            t.users.push(admin.clone());
            t.lists.push(list.clone());
            t.members.push(owner.clone());
            t.settings = Some(settings.clone());
            Ok(())
        })
    }
}
