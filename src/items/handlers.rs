use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::ItemRequest;
use crate::{auth::jwt::AuthUser, error::AppError, extract::JsonBody, state::AppState, store::ShoppingItem};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/lists/:id/items", get(list_items).post(create_item))
        .route("/lists/:id/items/:item_id", put(update_item).delete(delete_item))
        .route("/lists/:id/items/:item_id/toggle", post(toggle_item))
}

#[instrument(skip(state))]
pub async fn list_items(
    State(state): State<AppState>,
    user: AuthUser,
    Path(list_id): Path<Uuid>,
) -> Result<Json<Vec<ShoppingItem>>, AppError> {
    Ok(Json(state.items.list_items(list_id, user.id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(list_id): Path<Uuid>,
    JsonBody(payload): JsonBody<ItemRequest>,
) -> Result<(StatusCode, Json<ShoppingItem>), AppError> {
    let item = state
        .items
        .create_item(list_id, user.id, &payload.name, payload.tags)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(state, payload))]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path((list_id, item_id)): Path<(Uuid, Uuid)>,
    JsonBody(payload): JsonBody<ItemRequest>,
) -> Result<Json<ShoppingItem>, AppError> {
    let item = state
        .items
        .update_item(list_id, user.id, item_id, &payload.name, payload.tags)
        .await?;
    Ok(Json(item))
}

#[instrument(skip(state))]
pub async fn toggle_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path((list_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ShoppingItem>, AppError> {
    Ok(Json(state.items.toggle_item(list_id, user.id, item_id).await?))
}

#[instrument(skip(state))]
pub async fn delete_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path((list_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state.items.delete_item(list_id, user.id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
