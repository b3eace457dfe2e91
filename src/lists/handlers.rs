use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::ListNameRequest;
use crate::{
    auth::jwt::AuthUser,
    error::AppError,
    extract::JsonBody,
    state::AppState,
    store::{MemberView, ShoppingList},
};

pub fn list_routes() -> Router<AppState> {
    Router::new()
        .route("/lists", get(get_lists).post(create_list))
        .route("/lists/:id", get(get_list).put(update_list).delete(delete_list))
}

pub fn member_routes() -> Router<AppState> {
    Router::new()
        .route("/lists/:id/members", get(list_members))
        .route("/lists/:id/members/:user_id", delete(remove_member))
}

#[instrument(skip(state))]
pub async fn get_lists(State(state): State<AppState>, user: AuthUser) -> Result<Json<Vec<ShoppingList>>, AppError> {
    Ok(Json(state.lists.get_user_lists(user.id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_list(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(payload): JsonBody<ListNameRequest>,
) -> Result<(StatusCode, Json<ShoppingList>), AppError> {
    let list = state.lists.create_list(user.id, &payload.name).await?;
    Ok((StatusCode::CREATED, Json(list)))
}

#[instrument(skip(state))]
pub async fn get_list(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ShoppingList>, AppError> {
    Ok(Json(state.lists.get_list(id, user.id).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_list(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<ListNameRequest>,
) -> Result<Json<ShoppingList>, AppError> {
    Ok(Json(state.lists.update_list(id, user.id, &payload.name).await?))
}

#[instrument(skip(state))]
pub async fn delete_list(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.lists.delete_list(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_members(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MemberView>>, AppError> {
    Ok(Json(state.lists.list_members(id, user.id).await?))
}

#[instrument(skip(state))]
pub async fn remove_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state.lists.remove_member(id, user.id, member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
