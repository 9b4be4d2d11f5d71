use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode};
use tracing::info;

use crate::models::Account;
use crate::web::AppState;
use crate::web::error::ApiError;
use crate::web::models::{AccountCreated, AuthenticatedAccount, SourceSettings};

/// Signup. Credentials are generated server-side and returned exactly once.
pub async fn create_account(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<AccountCreated>), ApiError> {
    let account = Account::new();
    state.store.accounts.insert(&account).await?;
    info!(hash = %account.hash, "account created");
    Ok((
        StatusCode::CREATED,
        Json(AccountCreated {
            api_key: account.api_key,
            hash: account.hash,
        }),
    ))
}

/// Source-profile settings. Disabling the source flag leaves the profile
/// fields as they were; enabling overwrites them with the submitted values.
pub async fn update_source_profile(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(account)): Extension<AuthenticatedAccount>,
    Json(settings): Json<SourceSettings>,
) -> Result<StatusCode, ApiError> {
    let mut account = account;
    if settings.source_enabled {
        account.source_enabled = true;
        account.source_name = settings.source_name;
        account.source_url = settings.source_url;
        account.source_icon = settings.source_icon;
    } else {
        account.source_enabled = false;
    }
    state.store.accounts.update(&account).await?;
    Ok(StatusCode::NO_CONTENT)
}
