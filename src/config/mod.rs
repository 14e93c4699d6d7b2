//! Configuration module for CivicBridge.
//!
//! All configuration is loaded from environment variables with sensible defaults.
//! The server and the client read the same variables; each uses the fields it needs.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

use crate::models::Location;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (disabled when unset)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to, checked by [`Config::socket_addr`]
    pub bind_addr: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Administrator username accepted by admin login
    pub admin_username: String,
    /// Administrator password accepted by admin login
    pub admin_password: String,
    /// Base URL of the REST API the client talks to, including `/api`
    pub api_url: String,
    /// Path of the client's persisted state document
    pub state_path: PathBuf,
    /// Fixed device position reported to the client's geolocation provider
    pub device_location: Option<Location>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_psk = env::var("CIVIC_API_PSK").ok().filter(|k| !k.is_empty());

        let db_path = env::var("CIVIC_DB_PATH")
            .unwrap_or_else(|_| "./data/civicbridge.sqlite".to_string())
            .into();

        let bind_addr =
            env::var("CIVIC_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:5000".to_string());

        let log_level = env::var("CIVIC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let admin_username =
            env::var("CIVIC_ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
        let admin_password =
            env::var("CIVIC_ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());

        let api_url = env::var("CIVIC_API_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:5000/api".to_string())
            .trim_end_matches('/')
            .to_string();

        let state_path = env::var("CIVIC_STATE_PATH")
            .unwrap_or_else(|_| "./data/client-state.json".to_string())
            .into();

        let device_location = env::var("CIVIC_DEVICE_LOCATION")
            .ok()
            .and_then(|raw| parse_location(&raw));

        Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            admin_username,
            admin_password,
            api_url,
            state_path,
            device_location,
        }
    }

    /// The server's listen address. Only `serve` needs it, so client
    /// commands keep working with a malformed value.
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        self.bind_addr
            .parse()
            .with_context(|| format!("Invalid CIVIC_BIND_ADDR format: {}", self.bind_addr))
    }
}

/// Parse a `"lat,lng"` pair. Out-of-range coordinates are rejected.
pub fn parse_location(raw: &str) -> Option<Location> {
    let (lat, lng) = raw.split_once(',')?;
    let location = Location::new(lat.trim().parse().ok()?, lng.trim().parse().ok()?);
    location.is_valid().then_some(location)
}
