use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{
    dto::{AcceptInvitationRequest, CreateInvitationRequest},
    services::accept_for_user,
};
use crate::{
    auth::jwt::AuthUser,
    error::AppError,
    extract::JsonBody,
    state::AppState,
    store::{Invitation, InvitationKind},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/invitations", get(list_invitations).post(create_invitation))
        .route("/invitations/accept", post(accept_invitation))
        .route("/invitations/:id", delete(revoke_invitation))
}

#[instrument(skip(state, payload))]
pub async fn create_invitation(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(payload): JsonBody<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<Invitation>), AppError> {
    let kind: InvitationKind = payload.kind.parse().map_err(AppError::Validation)?;
    let invitation = state
        .invitations
        .create_invitation(user.id, &payload.email, kind, payload.list_id)
        .await
        .map_err(|e| {
            warn!(error = %e, inviter_id = %user.id, "invitation not created");
            e
        })?;
    Ok((StatusCode::CREATED, Json(invitation)))
}

#[instrument(skip(state))]
pub async fn list_invitations(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Invitation>>, AppError> {
    Ok(Json(state.invitations.list_invitations(user.id).await?))
}

#[instrument(skip(state))]
pub async fn revoke_invitation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.invitations.revoke_invitation(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Redeems an invitation addressed to the caller; list invitations join the list.
#[instrument(skip(state, payload))]
pub async fn accept_invitation(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(payload): JsonBody<AcceptInvitationRequest>,
) -> Result<Json<Invitation>, AppError> {
    let invitation = accept_for_user(&state, user.id, &user.email, &payload.code).await?;
    Ok(Json(invitation))
}
