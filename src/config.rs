use std::env;
use std::net::SocketAddr;

use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(name = "pushgate", version, about = "Source-to-target notification relay")]
pub struct Cli {
    /// Address to bind the HTTP server to; overrides LISTEN_ADDR.
    #[arg(long)]
    pub listen: Option<SocketAddr>,
    /// Postgres connection string; overrides DATABASE_URL. Without either,
    /// state lives in memory.
    #[arg(long)]
    pub database_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub database_url: Option<String>,
    /// Hostname clients are told to use in capability URLs.
    pub api_host: String,
    /// Path prefix the API is mounted under.
    pub api_version: String,
    /// Icon substituted when a source never configured one.
    pub default_icon: String,
    pub history_limit: usize,
}

impl ServerConfig {
    pub fn from_env(cli: &Cli) -> Result<Self, String> {
        let listen_addr = match &cli.listen {
            Some(addr) => *addr,
            None => env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
                .parse()
                .map_err(|e| format!("invalid LISTEN_ADDR: {e}"))?,
        };

        let database_url = cli
            .database_url
            .clone()
            .or_else(|| env::var("DATABASE_URL").ok());

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "localhost:8080".to_string());
        let api_version = env::var("API_VERSION").unwrap_or_else(|_| "v1".to_string());
        let default_icon =
            env::var("DEFAULT_ICON_URL").unwrap_or_else(|_| "/static/default-icon.png".to_string());

        let history_limit = match env::var("HISTORY_LIMIT") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| format!("invalid HISTORY_LIMIT: {e}"))?,
            Err(_) => 20,
        };

        Ok(ServerConfig {
            listen_addr,
            database_url,
            api_host,
            api_version,
            default_icon,
            history_limit,
        })
    }
}

#[cfg(test)]
impl ServerConfig {
    /// Fixed configuration for router-level tests, independent of the
    /// process environment.
    pub fn for_tests() -> Self {
        ServerConfig {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            database_url: None,
            api_host: "localhost:8080".to_string(),
            api_version: "v1".to_string(),
            default_icon: "/static/default-icon.png".to_string(),
            history_limit: 20,
        }
    }
}
