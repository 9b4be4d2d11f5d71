use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::channels::ChannelManager;
use crate::config::ServerConfig;
use crate::dispatch::NotificationDispatcher;
use crate::history::HistoryService;
use crate::identity::IdentityStore;
use crate::outlets::{OutletRegistry, listen::ListenAdapter, webhook::WebhookAdapter};
use crate::store::Store;

pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;

use routes::{account_routes, api_routes, channel_routes, outlet_routes};

pub struct AppState {
    pub config: ServerConfig,
    pub store: Store,
    pub identity: IdentityStore,
    pub channels: ChannelManager,
    pub dispatcher: NotificationDispatcher,
    pub history: HistoryService,
    pub registry: Arc<OutletRegistry>,
    pub listen: Arc<ListenAdapter>,
}

impl AppState {
    /// Wires every service to the given store and registers the built-in
    /// outlet adapters. Adapter registration happens once, here.
    pub fn new(config: ServerConfig, store: Store) -> Arc<Self> {
        let listen = Arc::new(ListenAdapter::new());
        let registry = Arc::new(
            OutletRegistry::new(store.outlets.clone())
                .register(Arc::new(WebhookAdapter::new()))
                .register(listen.clone()),
        );
        let identity = IdentityStore::new(store.accounts.clone());
        let channels = ChannelManager::new(
            store.channels.clone(),
            store.outlets.clone(),
            registry.clone(),
        );
        let dispatcher = NotificationDispatcher::new(
            store.notifications.clone(),
            store.channels.clone(),
            registry.clone(),
        );
        let history = HistoryService::new(
            store.notifications.clone(),
            store.channels.clone(),
            store.accounts.clone(),
            registry.clone(),
        );
        Arc::new(Self {
            config,
            store,
            identity,
            channels,
            dispatcher,
            history,
            registry,
            listen,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let authed = Router::new()
        .route("/history.json", get(api_routes::history))
        .route("/account/source", put(account_routes::update_source_profile))
        .route("/channels", get(channel_routes::list_channels))
        .route(
            "/channels/{source_hash}/status",
            post(channel_routes::set_status),
        )
        .route(
            "/channels/{source_hash}/outlet",
            post(channel_routes::route_outlet),
        )
        .route("/channels/{source_hash}", delete(channel_routes::delete_channel))
        .route(
            "/outlets",
            get(outlet_routes::list_outlets).post(outlet_routes::create_outlet),
        )
        .route(
            "/outlets/{outlet_hash}",
            put(outlet_routes::rename_outlet).delete(outlet_routes::delete_outlet),
        )
        .route(
            "/notifications/{notification_hash}",
            delete(api_routes::delete_notification),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_api_key,
        ));

    let api = Router::new()
        .route("/notify/{target_hash}", post(api_routes::notify))
        .route("/replay/{notification_hash}", post(api_routes::replay))
        .route("/listen/{outlet_hash}", get(api_routes::listen))
        .route("/accounts", post(account_routes::create_account))
        .merge(authed);

    let prefix = format!("/{}", state.config.api_version);
    Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest(&prefix, api)
        .layer(cors)
        .with_state(state)
}

pub async fn serve(
    state: Arc<AppState>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "http server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
