use clap::Parser;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pushgate::config::{Cli, ServerConfig};
use pushgate::store::Store;
use pushgate::web::{self, AppState};

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let config = ServerConfig::from_env(&cli)?;

    let store = match &config.database_url {
        Some(url) => {
            info!("connecting to postgres");
            Store::postgres(url).await?
        }
        None => {
            info!("no DATABASE_URL configured, state is in-memory");
            Store::in_memory()
        }
    };

    info!(version = pushgate::VERSION, "starting pushgate");
    let listen_addr = config.listen_addr;
    let state = AppState::new(config, store);
    web::serve(state, listen_addr).await
}
