use std::sync::Arc;

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    lists::services::DEFAULT_LIST_NAME,
    store::{constraints, ListMember, Role, ShoppingList, Store, SystemSettings, User},
    validation::normalize_email,
};

/// Key of the single settings row.
pub const SETTINGS_ID: &str = "system";

/// First-run bootstrap: the only path that creates a user without an invitation.
#[derive(Clone)]
pub struct SetupService {
    store: Arc<dyn Store>,
}

impl SetupService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn is_system_setup(&self) -> Result<bool, AppError> {
        Ok(self
            .store
            .system_settings()
            .await?
            .is_some_and(|s| s.is_setup))
    }

    /// Creates the admin, their default list and the settings row together.
    pub async fn setup_system(&self, email: &str) -> Result<User, AppError> {
        if self.is_system_setup().await? {
            return Err(AppError::AlreadySetup);
        }
        let email = normalize_email(email)?;
        let now = OffsetDateTime::now_utc();

        let admin = User {
            id: Uuid::new_v4(),
            email,
            invited_by: None,
            joined_at: now,
            created_at: now,
        };
        let list = ShoppingList {
            id: Uuid::new_v4(),
            name: DEFAULT_LIST_NAME.to_string(),
            owner_id: admin.id,
            created_at: now,
            updated_at: now,
        };
        let owner = ListMember {
            list_id: list.id,
            user_id: admin.id,
            role: Role::Owner,
            joined_at: now,
        };
        let settings = SystemSettings {
            id: SETTINGS_ID.to_string(),
            is_setup: true,
            setup_at: now,
            initial_admin: admin.id,
        };

        self.store
            .bootstrap(&admin, &list, &owner, &settings)
            .await
            .map_err(|e| {
                if e.violates(constraints::USER_EMAIL) {
                    AppError::UserAlreadyExists
                } else {
                    e.into()
                }
            })?;
        info!(user_id = %admin.id, email = %admin.email, "system set up");
        Ok(admin)
    }
}
