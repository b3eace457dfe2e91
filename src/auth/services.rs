use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use super::codes;
use crate::{
    error::AppError,
    invitations::services::apply_invitation,
    mail::{self, Mailer},
    state::AppState,
    store::{constraints, Invitation, InvitationKind, MagicLink, Store, User},
    validation::{normalize_email, required},
};

/// How long an emailed login code stays valid.
pub const CODE_TTL: Duration = Duration::minutes(15);

// Codes are the primary key of `magic_links`; a clash with another address's live
// code is retried with a fresh draw.
const CODE_ATTEMPTS: usize = 3;

/// Passwordless login: emailed one-time codes and invitation-gated sign-up.
#[derive(Clone)]
pub struct MagicLinkService {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
}

impl MagicLinkService {
    pub fn new(store: Arc<dyn Store>, mailer: Arc<dyn Mailer>) -> Self {
        Self { store, mailer }
    }

    /// Stores a fresh code for `email`, invalidating every earlier one.
    pub async fn create_code(&self, email: &str) -> Result<String, AppError> {
        let email = normalize_email(email)?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let link = MagicLink {
                code: codes::login_code()?,
                email: email.clone(),
                expires_at: OffsetDateTime::now_utc() + CODE_TTL,
                used: false,
            };
            match self.store.replace_magic_link(&link).await {
                Ok(()) => return Ok(link.code),
                Err(e) if e.violates(constraints::MAGIC_LINK_CODE) && attempt < CODE_ATTEMPTS => {
                    warn!(attempt, "login code collided; drawing another");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Creates a code and emails it.
    pub async fn request_code(&self, email: &str) -> Result<String, AppError> {
        let email = normalize_email(email)?;
        let code = self.create_code(&email).await?;
        self.mailer
            .send(mail::login_code_mail(&email, &code))
            .await
            .map_err(AppError::Mail)?;
        info!(email = %email, "login code sent");
        Ok(code)
    }

    /// Consumes the code and resolves the user.
    ///
    /// Existing users get back any pending list invitation so the caller can join
    /// them to that list. Unknown addresses need a pending invitation of either
    /// kind; the user is created from it and the invitation is returned alongside.
    pub async fn verify_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<(User, Option<Invitation>), AppError> {
        let email = normalize_email(email)?;
        let code = required(code, "code")?;
        let now = OffsetDateTime::now_utc();

        self.store
            .consume_magic_link(&email, code, now)
            .await?
            .ok_or(AppError::InvalidOrExpiredCode)?;

        if let Some(user) = self.store.find_user_by_email(&email).await? {
            let invitation = self
                .store
                .find_pending_invitation(&email, Some(InvitationKind::List), now)
                .await?;
            return Ok((user, invitation));
        }

        let invitation = self
            .store
            .find_pending_invitation(&email, None, now)
            .await?
            .ok_or(AppError::InvitationRequired)?;

        let user = User {
            id: Uuid::new_v4(),
            email,
            invited_by: Some(invitation.invited_by),
            joined_at: now,
            created_at: now,
        };
        self.store.insert_user(&user).await.map_err(|e| {
            if e.violates(constraints::USER_EMAIL) {
                AppError::UserAlreadyExists
            } else {
                e.into()
            }
        })?;
        info!(user_id = %user.id, email = %user.email, invited_by = %invitation.invited_by, "user created from invitation");

        Ok((user, Some(invitation)))
    }
}

/// Verifies a login code, redeems the invitation it resolved (if any) and signs a
/// session token for the user.
pub async fn complete_login(st: &AppState, email: &str, code: &str) -> Result<(String, User), AppError> {
    let (user, invitation) = st.auth.verify_code(email, code).await?;

    if let Some(pending) = invitation {
        let accepted = st
            .invitations
            .accept_invitation(&user.email, &pending.code)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("accept invitation {}: {e}", pending.id)))?;
        apply_invitation(st, &user, &accepted)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("apply invitation {}: {e}", accepted.id)))?;
    }

    let token = st.keys.sign(&user)?;
    info!(user_id = %user.id, "user logged in");
    Ok((token, user))
}
