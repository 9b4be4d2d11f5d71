use std::sync::Arc;

use axum::{
    Extension, Form, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::dispatch::{ApprovalHandshake, DeliveryResult};
use crate::web::AppState;
use crate::web::error::ApiError;
use crate::web::models::{AuthenticatedAccount, HistoryItem, NotifyForm, ReplayForm};

/// Inbound notify: resolve source by api key and target by public hash,
/// find or create the channel, then let the dispatcher record and route.
pub async fn notify(
    State(state): State<Arc<AppState>>,
    Path(target_hash): Path<String>,
    Form(form): Form<NotifyForm>,
) -> Result<Response, ApiError> {
    let source = state.identity.require_api_key(&form.api_key).await?;
    let target = state.identity.require_hash(&target_hash).await?;

    let (channel, notice) = state.channels.find_or_create(&source, &target).await?;
    let result = state
        .dispatcher
        .dispatch(&channel, &source, form.into_raw(), notice)
        .await?;

    Ok(match result {
        DeliveryResult::Delivered(outcome) => (StatusCode::OK, outcome).into_response(),
        DeliveryResult::Pending(Some(handshake)) => {
            (StatusCode::ACCEPTED, handshake_body(&handshake)?).into_response()
        }
        DeliveryResult::Pending(None) => {
            (StatusCode::ACCEPTED, "202 Pending approval").into_response()
        }
        DeliveryResult::Disabled => {
            (StatusCode::ACCEPTED, "202 Accepted but disabled").into_response()
        }
    })
}

/// `outlet_hash:artifact` when the new channel has an outlet, bare artifact
/// otherwise.
fn handshake_body(handshake: &ApprovalHandshake) -> Result<String, ApiError> {
    let artifact = serde_json::to_string(&handshake.notice)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(match &handshake.outlet_hash {
        Some(hash) => format!("{hash}:{artifact}"),
        None => artifact,
    })
}

pub async fn replay(
    State(state): State<Arc<AppState>>,
    Path(notification_hash): Path<String>,
    Form(form): Form<ReplayForm>,
) -> Result<Response, ApiError> {
    let requester = state.identity.require_api_key(&form.api_key).await?;
    let outcome = state.history.replay(&notification_hash, &requester).await?;
    Ok((StatusCode::OK, outcome).into_response())
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(account)): Extension<AuthenticatedAccount>,
) -> Result<Json<Vec<HistoryItem>>, ApiError> {
    let entries = state
        .history
        .history_for(&account, state.config.history_limit)
        .await?;
    let items = entries
        .into_iter()
        .map(|entry| HistoryItem::render(entry, &state.config.default_icon))
        .collect();
    Ok(Json(items))
}

pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(account)): Extension<AuthenticatedAccount>,
    Path(notification_hash): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.history.delete(&notification_hash, &account).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Capability URL for the listen outlet: knowing the outlet hash grants the
/// queued payloads.
pub async fn listen(
    State(state): State<Arc<AppState>>,
    Path(outlet_hash): Path<String>,
) -> Json<Vec<serde_json::Value>> {
    Json(state.listen.drain(&outlet_hash))
}
