//! Configuration for the honeypot service.

use std::net::SocketAddr;

const DEFAULT_CALLBACK_URL: &str = "https://hackathon.guvi.in/api/updateHoneyPotFinalResult";

#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind address.
    pub host: String,
    /// HTTP port.
    pub port: u16,
    /// Required `x-api-key` header value.
    pub api_key: String,
    /// Outbound final-output callback URL.
    pub callback_url: String,
    /// Path to the on-disk callback audit log.
    pub callback_log_path: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()?,
            api_key: std::env::var("API_KEY")
                .unwrap_or_else(|_| "default-hackathon-key-2026".to_string()),
            callback_url: std::env::var("CALLBACK_URL")
                .unwrap_or_else(|_| DEFAULT_CALLBACK_URL.to_string()),
            callback_log_path: std::env::var("CALLBACK_LOG_FILE")
                .unwrap_or_else(|_| "callback_history.json".to_string()),
        })
    }

    pub fn bind_address(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("invalid bind address")
    }
}
