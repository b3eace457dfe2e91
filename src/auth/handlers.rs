use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, MessageResponse, VerifyRequest},
        jwt::AuthUser,
        services::complete_login,
    },
    error::AppError,
    extract::JsonBody,
    state::AppState,
    store::User,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/verify", post(verify))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.request_code(&payload.email).await.map_err(|e| {
        warn!(error = %e, "login code request failed");
        e
    })?;
    Ok(Json(MessageResponse {
        message: "Login code sent to your email",
    }))
}

#[instrument(skip(state, payload))]
pub async fn verify(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<VerifyRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let (token, user) = complete_login(&state, &payload.email, &payload.code)
        .await
        .map_err(|e| {
            warn!(error = %e, "login verification failed");
            e
        })?;
    Ok(Json(AuthResponse { token, user }))
}

#[instrument(skip(state))]
pub async fn get_me(State(state): State<AppState>, user: AuthUser) -> Result<Json<User>, AppError> {
    let record = state.store.find_user_by_id(user.id).await?.ok_or_else(|| {
        warn!(user_id = %user.id, "token subject no longer exists");
        AppError::InvalidToken
    })?;
    info!(user_id = %record.id, "me");
    Ok(Json(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_response_serializes_user_fields() {
        let now = time::OffsetDateTime::now_utc();
        let response = AuthResponse {
            token: "t".into(),
            user: User {
                id: uuid::Uuid::new_v4(),
                email: "test@example.com".into(),
                invited_by: None,
                joined_at: now,
                created_at: now,
            },
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["token"], "t");
        assert_eq!(json["user"]["email"], "test@example.com");
        assert!(json["user"]["invited_by"].is_null());
    }
}
