use std::sync::Arc;

use axum::{
    RequestPartsExt,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Basic};
use tracing::warn;

use crate::web::error::ApiError;
use crate::web::models::AuthenticatedAccount;
use crate::web::AppState;

/// HTTP Basic with the API key in the username slot; the password slot is
/// ignored. Resolves the account and stashes it as a request extension.
/// Missing or unknown credentials answer 401 with a Basic challenge.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = req.into_parts();

    let TypedHeader(Authorization(credentials)) = parts
        .extract::<TypedHeader<Authorization<Basic>>>()
        .await
        .map_err(|_| ApiError::Unauthorized)?;

    let account = state
        .identity
        .by_api_key(credentials.username())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| {
            warn!("rejected request with unknown api key");
            ApiError::Unauthorized
        })?;

    let mut req = Request::from_parts(parts, body);
    req.extensions_mut().insert(AuthenticatedAccount(account));
    Ok(next.run(req).await)
}
