use axum::extract::FromRequest;

use crate::error::AppError;

/// `axum::Json` whose rejections go through `AppError`, so malformed bodies get a
/// 400 with the usual `{"error": ..}` shape.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);
