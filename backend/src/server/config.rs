use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub listen_addr: String,
    pub log_dir: String,
    /// Shared secret keying the bind-code HMAC. Empty means misconfigured.
    pub bind_master_secret: String,
    pub bind_window_seconds: u64,
    pub bind_drift_windows: u32,
    pub activate_cooldown_seconds: u64,
    pub rate_limit_window_seconds: u64,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    database_url: Option<String>,
    listen_addr: Option<String>,
    log_dir: Option<String>,
    bind_master_secret: Option<String>,
    bind_window_seconds: Option<u64>,
    bind_drift_windows: Option<u32>,
    activate_cooldown_seconds: Option<u64>,
    rate_limit_window_seconds: Option<u64>,
}

impl PartialServerConfig {
    fn from_env() -> Result<Self, String> {
        Ok(Self {
            database_url: env_string("DATABASE_URL"),
            listen_addr: env_string("LISTEN_ADDR"),
            log_dir: env_string("LOG_DIR"),
            bind_master_secret: env_string("BIND_MASTER_SECRET"),
            bind_window_seconds: env_number("BIND_WINDOW_SECONDS")?,
            bind_drift_windows: env_number("BIND_DRIFT_WINDOWS")?,
            activate_cooldown_seconds: env_number("ACTIVATE_COOLDOWN_SECONDS")?,
            rate_limit_window_seconds: env_number("RATE_LIMIT_WINDOW_SECONDS")?,
        })
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_number<T: FromStr>(key: &str) -> Result<Option<T>, String> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| format!("{key} must be a non-negative integer")),
        Err(_) => Ok(None),
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:4000".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_bind_window_seconds() -> u64 {
    60
}

fn default_bind_drift_windows() -> u32 {
    1
}

fn default_activate_cooldown_seconds() -> u64 {
    30
}

fn default_rate_limit_window_seconds() -> u64 {
    60
}

impl ServerConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config: PartialServerConfig = match config_path {
            Some(path_str) => {
                let path = Path::new(path_str);
                if path.exists() {
                    let contents = fs::read_to_string(path)
                        .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
                    toml::from_str(&contents).map_err(|e| {
                        format!("Failed to parse TOML from config file at {path:?}: {e}")
                    })?
                } else {
                    warn!(path = %path_str, "Config file not found, using environment only.");
                    PartialServerConfig::default()
                }
            }
            None => PartialServerConfig::default(),
        };

        // 2. Load from environment variables
        let env_config = PartialServerConfig::from_env()?;

        // 3. Merge: environment overrides file
        Self::merge(env_config, file_config)
    }

    fn merge(env_config: PartialServerConfig, file_config: PartialServerConfig) -> Result<Self, String> {
        let config = ServerConfig {
            database_url: env_config
                .database_url
                .or(file_config.database_url)
                .ok_or("DATABASE_URL is required")?,
            listen_addr: env_config
                .listen_addr
                .or(file_config.listen_addr)
                .unwrap_or_else(default_listen_addr),
            log_dir: env_config
                .log_dir
                .or(file_config.log_dir)
                .unwrap_or_else(default_log_dir),
            bind_master_secret: env_config
                .bind_master_secret
                .or(file_config.bind_master_secret)
                .unwrap_or_default(),
            bind_window_seconds: env_config
                .bind_window_seconds
                .or(file_config.bind_window_seconds)
                .unwrap_or_else(default_bind_window_seconds),
            bind_drift_windows: env_config
                .bind_drift_windows
                .or(file_config.bind_drift_windows)
                .unwrap_or_else(default_bind_drift_windows),
            activate_cooldown_seconds: env_config
                .activate_cooldown_seconds
                .or(file_config.activate_cooldown_seconds)
                .unwrap_or_else(default_activate_cooldown_seconds),
            rate_limit_window_seconds: env_config
                .rate_limit_window_seconds
                .or(file_config.rate_limit_window_seconds)
                .unwrap_or_else(default_rate_limit_window_seconds),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.bind_window_seconds == 0 {
            return Err("BIND_WINDOW_SECONDS must be greater than zero".to_string());
        }
        if self.rate_limit_window_seconds == 0 {
            return Err("RATE_LIMIT_WINDOW_SECONDS must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Whether the bind-code secret is missing. Codes are still served (keyed
    /// by an all-zero key) but anyone can compute them.
    pub fn bind_secret_missing(&self) -> bool {
        self.bind_master_secret.trim().is_empty()
    }
}
