use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::{ApiError, AppState};

/// Guards `/refresh-lists` with a single shared admin key (SPEC_FULL.md
/// §10.4's `ADMIN_KEY`), not per-tenant provisioning.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, axum::Json<ApiError>)> {
    let Some(expected) = state.config.admin_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if key == expected => Ok(next.run(request).await),
        Some(_) => Err((
            StatusCode::UNAUTHORIZED,
            axum::Json(ApiError::new("invalid_admin_key", vec!["X-Admin-Key header is invalid".to_string()])),
        )),
        None => Err((
            StatusCode::UNAUTHORIZED,
            axum::Json(ApiError::new("missing_admin_key", vec!["X-Admin-Key header is required".to_string()])),
        )),
    }
}
