use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::models::{Account, Channel};
use crate::web::AppState;
use crate::web::error::ApiError;
use crate::web::models::{AuthenticatedAccount, ChannelView, OutletRoute, StatusChange};

/// Channels are addressed by the source's public hash; the target side is
/// always the authenticated caller, so ownership is implied by the lookup.
async fn resolve_channel(
    state: &AppState,
    source_hash: &str,
    target: &Account,
) -> Result<Channel, ApiError> {
    let source = state.identity.require_hash(source_hash).await?;
    state
        .channels
        .by_pair(&source, target)
        .await?
        .ok_or_else(|| ApiError::NotFound("channel".to_string()))
}

pub async fn list_channels(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(account)): Extension<AuthenticatedAccount>,
) -> Result<Json<Vec<ChannelView>>, ApiError> {
    let channels = state.channels.list_for_target(&account).await?;
    let mut views = Vec::with_capacity(channels.len());
    for channel in channels {
        let source_hash = state
            .store
            .accounts
            .by_id(&channel.source_id)
            .await?
            .map(|a| a.hash)
            .unwrap_or_else(|| channel.source_id.clone());
        views.push(ChannelView::render(&channel, source_hash));
    }
    Ok(Json(views))
}

pub async fn set_status(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(account)): Extension<AuthenticatedAccount>,
    Path(source_hash): Path<String>,
    Json(change): Json<StatusChange>,
) -> Result<StatusCode, ApiError> {
    let channel = resolve_channel(&state, &source_hash, &account).await?;
    state.channels.set_status(&channel, change.status).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn route_outlet(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(account)): Extension<AuthenticatedAccount>,
    Path(source_hash): Path<String>,
    Json(route): Json<OutletRoute>,
) -> Result<StatusCode, ApiError> {
    let channel = resolve_channel(&state, &source_hash, &account).await?;
    state.channels.route_outlet(&channel, &route.outlet).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_channel(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(account)): Extension<AuthenticatedAccount>,
    Path(source_hash): Path<String>,
) -> Result<StatusCode, ApiError> {
    let channel = resolve_channel(&state, &source_hash, &account).await?;
    state.channels.delete(&channel).await?;
    Ok(StatusCode::NO_CONTENT)
}
