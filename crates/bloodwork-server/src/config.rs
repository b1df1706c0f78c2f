use bloodwork_ai::AiConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Login and bearer-token settings
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub patients: PatientSettings,
    #[serde(default)]
    pub validation: ValidationSettings,
    /// AI consultation providers
    #[serde(default)]
    pub ai: AiConfig,
}

impl AppConfig {
    /// First inconsistent setting, named by its dotted key.
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("server.port", usize::from(self.server.port)),
            ("server.body_limit_bytes", self.server.body_limit_bytes),
            ("search.default_count", self.search.default_count),
            ("search.max_count", self.search.max_count),
            ("patients.max_profiles", self.patients.max_profiles),
        ];
        if let Some((key, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(format!("{key} must be greater than 0"));
        }
        if self.search.default_count > self.search.max_count {
            return Err(format!(
                "search.default_count must be <= search.max_count ({} > {})",
                self.search.default_count, self.search.max_count
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(format!(
                "logging.level '{}' is not one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            ));
        }
        if self.auth.enabled {
            self.auth.validate()?;
        }
        self.ai
            .validate()
            .map_err(|e| format!("ai config error: {e}"))
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        SocketAddr::from((host, self.server.port))
    }

    /// Returns the configured `base_url`, or one computed from host:port.
    pub fn base_url(&self) -> String {
        self.server
            .base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.server.host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL used in links. Defaults to http://{host}:{port}
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    5000
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: None,
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_search_count")]
    pub default_count: usize,
    #[serde(default = "default_search_max_count")]
    pub max_count: usize,
}

fn default_search_count() -> usize {
    20
}
fn default_search_max_count() -> usize {
    100
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_count: default_search_count(),
            max_count: default_search_max_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub enabled: bool,
    /// HS256 signing secret
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    /// Plaintext in the config file; hashed with argon2 at startup
    #[serde(default)]
    pub admin_password: Option<String>,
}

impl AuthSettings {
    fn validate(&self) -> Result<(), String> {
        if self.jwt_secret.as_deref().is_none_or(|s| s.len() < 16) {
            return Err("auth.jwt_secret must be at least 16 characters when auth is enabled".into());
        }
        if self.admin_password.as_deref().is_none_or(str::is_empty) {
            return Err("auth.admin_password is required when auth is enabled".into());
        }
        if self.token_ttl_secs == 0 {
            return Err("auth.token_ttl_secs must be greater than 0".into());
        }
        Ok(())
    }
}

fn default_token_ttl() -> u64 {
    3600
}
fn default_admin_username() -> String {
    "admin".into()
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            jwt_secret: None,
            token_ttl_secs: default_token_ttl(),
            admin_username: default_admin_username(),
            admin_password: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSettings {
    /// Maximum number of patient profiles
    #[serde(default = "default_max_profiles")]
    pub max_profiles: usize,
}

fn default_max_profiles() -> usize {
    4
}

impl Default for PatientSettings {
    fn default() -> Self {
        Self {
            max_profiles: default_max_profiles(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ValidationSettings {
    /// Reject observations whose LOINC code or UCUM unit fails the syntax checks
    #[serde(default)]
    pub strict_codes: bool,
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    pub const DEFAULT_CONFIG_FILE: &str = "bloodwork.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., BLOODWORK__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("BLOODWORK")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<AppConfig, String> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.addr().to_string(), "127.0.0.1:5000");
        assert_eq!(cfg.base_url(), "http://127.0.0.1:5000");
        assert_eq!(cfg.search.default_count, 20);
        assert_eq!(cfg.search.max_count, 100);
        assert_eq!(cfg.patients.max_profiles, 4);
    }

    #[test]
    fn test_auth_requires_secret_and_password() {
        let mut cfg = AppConfig::default();
        cfg.auth.enabled = true;
        assert!(cfg.validate().unwrap_err().contains("jwt_secret"));
        cfg.auth.jwt_secret = Some("0123456789abcdef".into());
        assert!(cfg.validate().unwrap_err().contains("admin_password"));
        cfg.auth.admin_password = Some("secret".into());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_search_bounds() {
        let mut cfg = AppConfig::default();
        cfg.search.default_count = 200;
        assert!(cfg.validate().is_err());
        cfg.search.default_count = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_ai_errors_are_surfaced() {
        let mut cfg = AppConfig::default();
        cfg.ai.timeout_ms = 0;
        assert!(cfg.validate().unwrap_err().contains("ai.timeout_ms"));
    }
}
