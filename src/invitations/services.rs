use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::codes,
    error::AppError,
    mail::{self, Mailer},
    state::AppState,
    store::{constraints, Invitation, InvitationKind, Role, Store, User},
    validation::{normalize_email, required},
};

/// How long an invitation can be redeemed.
pub const INVITATION_TTL: Duration = Duration::days(7);

const CODE_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct InvitationService {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
}

impl InvitationService {
    pub fn new(store: Arc<dyn Store>, mailer: Arc<dyn Mailer>) -> Self {
        Self { store, mailer }
    }

    /// Invites `email` to the server or, for list invitations, to `list_id`.
    ///
    /// Any earlier unused invitation for the address is dropped first, so each
    /// email has at most one live invitation. The notification mail is best effort.
    pub async fn create_invitation(
        &self,
        inviter_id: Uuid,
        email: &str,
        kind: InvitationKind,
        list_id: Option<Uuid>,
    ) -> Result<Invitation, AppError> {
        let email = normalize_email(email)?;
        let list_id = match kind {
            InvitationKind::Server => None,
            InvitationKind::List => {
                let list_id = list_id.ok_or_else(|| AppError::validation("list_id is required for list invitations"))?;
                let is_owner = self
                    .store
                    .find_member(list_id, inviter_id)
                    .await?
                    .is_some_and(|m| m.role == Role::Owner);
                if !is_owner {
                    warn!(%inviter_id, %list_id, "list invitation refused: not owner");
                    return Err(AppError::NotListOwner);
                }
                Some(list_id)
            }
        };

        if let Some(existing) = self.store.find_user_by_email(&email).await? {
            match list_id {
                None => return Err(AppError::UserAlreadyExists),
                Some(list_id) => {
                    if self.store.find_member(list_id, existing.id).await?.is_some() {
                        return Err(AppError::AlreadyMember);
                    }
                }
            }
        }

        if self.store.find_unused_invitation(&email, kind).await?.is_some() {
            return Err(AppError::AlreadyInvited);
        }
        let dropped = self.store.delete_unused_invitations(&email).await?;
        if dropped > 0 {
            info!(email = %email, dropped, "replaced earlier invitations");
        }

        let invitation = self.insert_with_fresh_code(inviter_id, &email, kind, list_id).await?;
        info!(
            invitation_id = %invitation.id,
            %inviter_id,
            email = %invitation.email,
            kind = ?invitation.kind,
            "invitation created"
        );

        self.notify(&invitation).await;
        Ok(invitation)
    }

    async fn insert_with_fresh_code(
        &self,
        inviter_id: Uuid,
        email: &str,
        kind: InvitationKind,
        list_id: Option<Uuid>,
    ) -> Result<Invitation, AppError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let now = OffsetDateTime::now_utc();
            let invitation = Invitation {
                id: Uuid::new_v4(),
                code: codes::invitation_code()?,
                email: email.to_string(),
                kind,
                list_id,
                invited_by: inviter_id,
                expires_at: now + INVITATION_TTL,
                used: false,
                created_at: now,
            };
            match self.store.insert_invitation(&invitation).await {
                Ok(()) => return Ok(invitation),
                Err(e) if e.violates(constraints::INVITATION_CODE) && attempt < CODE_ATTEMPTS => {
                    warn!(attempt, "invitation code collided; drawing another");
                }
                Err(e) if e.violates(constraints::ONE_UNUSED_INVITATION) => {
                    return Err(AppError::AlreadyInvited)
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn notify(&self, invitation: &Invitation) {
        let inviter = match self.store.find_user_by_id(invitation.invited_by).await {
            Ok(Some(user)) => user.email,
            Ok(None) => "a Shopping List user".to_string(),
            Err(e) => {
                warn!(error = %e, "inviter lookup failed; invitation mail skipped");
                return;
            }
        };

        let message = match invitation.list_id {
            None => mail::server_invitation_mail(&invitation.email, &inviter, &invitation.code),
            Some(list_id) => match self.store.find_list(list_id).await {
                Ok(Some(list)) => mail::list_invitation_mail(&invitation.email, &list.name, &inviter, &invitation.code),
                Ok(None) => return,
                Err(e) => {
                    warn!(error = %e, %list_id, "list lookup failed; invitation mail skipped");
                    return;
                }
            },
        };

        if let Err(e) = self.mailer.send(message).await {
            warn!(error = %e, invitation_id = %invitation.id, "invitation mail not delivered");
        }
    }

    /// Redeems an invitation addressed to `email`. Codes match case-insensitively.
    pub async fn accept_invitation(&self, email: &str, code: &str) -> Result<Invitation, AppError> {
        let email = normalize_email(email)?;
        let code = required(code, "code")?.to_ascii_uppercase();
        let invitation = self
            .store
            .consume_invitation(&email, &code, OffsetDateTime::now_utc())
            .await?
            .ok_or(AppError::InvalidOrExpiredInvitation)?;
        info!(invitation_id = %invitation.id, email = %email, "invitation accepted");
        Ok(invitation)
    }

    pub async fn list_invitations(&self, inviter_id: Uuid) -> Result<Vec<Invitation>, AppError> {
        Ok(self.store.invitations_by_inviter(inviter_id).await?)
    }

    pub async fn revoke_invitation(&self, id: Uuid, inviter_id: Uuid) -> Result<(), AppError> {
        if !self.store.delete_unused_invitation(id, inviter_id).await? {
            return Err(AppError::NotFoundOrUsed);
        }
        info!(invitation_id = %id, %inviter_id, "invitation revoked");
        Ok(())
    }
}

/// Applies a freshly redeemed invitation during login: newly admitted users get
/// their default list, list invitations join the user to that list.
pub async fn apply_invitation(st: &AppState, user: &User, invitation: &Invitation) -> Result<(), AppError> {
    match invitation.kind {
        InvitationKind::Server => {
            st.lists.create_default_list(user.id).await?;
        }
        InvitationKind::List => join_invited_list(st, user.id, invitation).await?,
    }
    Ok(())
}

/// Joins `user_id` to the list a list invitation points at, on behalf of its inviter.
pub async fn join_invited_list(st: &AppState, user_id: Uuid, invitation: &Invitation) -> Result<(), AppError> {
    if let Some(list_id) = invitation.list_id {
        st.lists.add_member(list_id, invitation.invited_by, user_id).await?;
    }
    Ok(())
}

/// Redeems an invitation for a signed-in user. A list invitation is only consumed
/// once the join can go through: its inviter must still own the list and the user
/// must not already be on it.
pub async fn accept_for_user(st: &AppState, user_id: Uuid, email: &str, code: &str) -> Result<Invitation, AppError> {
    let email = normalize_email(email)?;
    let code = required(code, "code")?.to_ascii_uppercase();

    let pending = st
        .store
        .find_pending_invitation(&email, None, OffsetDateTime::now_utc())
        .await?
        .filter(|inv| inv.code == code);
    if let Some(Invitation {
        kind: InvitationKind::List,
        list_id: Some(list_id),
        invited_by,
        ..
    }) = pending
    {
        if !st.lists.is_owner(list_id, invited_by).await? {
            warn!(%list_id, %invited_by, "inviter no longer owns the list; invitation kept");
            return Err(AppError::NotOwner);
        }
        if st.lists.has_access(list_id, user_id).await? {
            return Err(AppError::AlreadyMember);
        }
    }

    let invitation = st.invitations.accept_invitation(&email, &code).await?;
    if invitation.kind == InvitationKind::List {
        join_invited_list(st, user_id, &invitation).await?;
    }
    Ok(invitation)
}
