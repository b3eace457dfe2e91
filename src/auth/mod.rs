use crate::state::AppState;
use axum::Router;

mod claims;
pub mod codes;
mod dto;
pub mod handlers;
pub mod jwt;
pub mod services;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
