use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use crate::models::Outlet;
use crate::web::AppState;
use crate::web::error::ApiError;
use crate::web::models::{AuthenticatedAccount, CreateOutlet, OutletView, RenameOutlet};

pub async fn list_outlets(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(account)): Extension<AuthenticatedAccount>,
) -> Result<Json<Vec<OutletView>>, ApiError> {
    let outlets = state.store.outlets.list_by_target(&account.id).await?;
    Ok(Json(outlets.into_iter().map(OutletView::from).collect()))
}

/// Creating an outlet of an unregistered type is refused up front; a typo
/// here would otherwise only surface as failed deliveries later.
pub async fn create_outlet(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(account)): Extension<AuthenticatedAccount>,
    Json(request): Json<CreateOutlet>,
) -> Result<(StatusCode, Json<OutletView>), ApiError> {
    let known = state.registry.type_names();
    if !known.iter().any(|t| *t == request.type_name) {
        return Err(ApiError::InvalidInput(format!(
            "unknown outlet type '{}', expected one of: {}",
            request.type_name,
            known.join(", ")
        )));
    }

    let name = request
        .name
        .unwrap_or_else(|| request.type_name.clone());
    let params = match request.params {
        serde_json::Value::Null => serde_json::json!({}),
        other => other,
    };
    let outlet = Outlet::new(&account.id, &request.type_name, &name, params);
    state.store.outlets.insert(&outlet).await?;
    info!(outlet = %outlet.hash, outlet_type = %outlet.type_name, "outlet created");

    // The first outlet an account sets up becomes its default.
    if account.default_outlet.is_none() {
        let mut account = account;
        account.default_outlet = Some(outlet.hash.clone());
        state.store.accounts.update(&account).await?;
    }

    Ok((StatusCode::CREATED, Json(OutletView::from(outlet))))
}

async fn owned_outlet(
    state: &AppState,
    account_id: &str,
    outlet_hash: &str,
) -> Result<Outlet, ApiError> {
    state
        .store
        .outlets
        .by_hash(outlet_hash)
        .await?
        .filter(|o| o.target_id == account_id)
        .ok_or_else(|| ApiError::NotFound("outlet".to_string()))
}

pub async fn rename_outlet(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(account)): Extension<AuthenticatedAccount>,
    Path(outlet_hash): Path<String>,
    Json(request): Json<RenameOutlet>,
) -> Result<StatusCode, ApiError> {
    let outlet = owned_outlet(&state, &account.id, &outlet_hash).await?;
    state.store.outlets.rename(&outlet.hash, &request.name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reference-safe removal: channels routed here fall back to "no outlet
/// configured", and a default-outlet pointer is cleared, never left
/// dangling.
pub async fn delete_outlet(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(account)): Extension<AuthenticatedAccount>,
    Path(outlet_hash): Path<String>,
) -> Result<StatusCode, ApiError> {
    let outlet = owned_outlet(&state, &account.id, &outlet_hash).await?;

    state.store.outlets.delete(&outlet.hash).await?;
    state.store.channels.detach_outlet(&outlet.hash).await?;
    if account.default_outlet.as_deref() == Some(outlet.hash.as_str()) {
        let mut account = account;
        account.default_outlet = None;
        state.store.accounts.update(&account).await?;
    }
    info!(outlet = %outlet.hash, "outlet deleted");
    Ok(StatusCode::NO_CONTENT)
}
