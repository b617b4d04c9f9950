//! Application configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults.

use std::env;
use std::time::Duration;

/// Default list of config var name fragments redacted in compliance mode
pub const DEFAULT_ENVS_BLACKLIST: &str = "PASS,KEY,SECRET,PRIVATE,TOKEN,SALT";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Persistence configuration
    pub persistence: PersistenceConfig,
    /// Platform gateway configuration
    pub platform: PlatformConfig,
    /// Setup and config-var policy
    pub policy: PolicyConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host address to bind to
    pub host: String,
    /// Public base URL of this API, used in links handed to clients
    pub public_url: String,
    /// How long queued notifications and redeploys may take to drain at shutdown
    pub shutdown_grace: Duration,
}

/// Persistence configuration
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// SQLite database path or `sqlite:` URL
    pub database_url: String,
}

/// Platform gateway configuration
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Default platform API base URL; `None` runs against the in-memory platform
    pub api_url: Option<String>,
    /// Log shuttle base URL for log drains (defaults to the platform API)
    pub log_shuttle_url: Option<String>,
    /// Timeout for a single platform call
    pub request_timeout: Duration,
    /// How long a resolved space route stays cached
    pub route_cache_ttl: Duration,
}

/// Setup and config-var policy
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Comma-separated config var name fragments redacted in compliance mode
    pub envs_blacklist: Vec<String>,
    /// Formation size used when a setup request omits one
    pub default_formation_size: String,
    /// Upper bound for a formation's quantity
    pub max_formation_quantity: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            envs_blacklist: parse_blacklist(DEFAULT_ENVS_BLACKLIST),
            default_formation_size: "scout".to_string(),
            max_formation_quantity: 32,
        }
    }
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(5000),
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                public_url: non_empty_var("APPKIT_API_URL")
                    .map(|u| clean_forward_slash(&u))
                    .unwrap_or_default(),
                shutdown_grace: Duration::from_secs(
                    env::var("SHUTDOWN_GRACE_SECS")
                        .ok()
                        .and_then(|t| t.parse().ok())
                        .unwrap_or(10),
                ),
            },
            persistence: PersistenceConfig {
                database_url: env::var("DATABASE_URL").unwrap_or_else(|_| {
                    if let Some(home) = env::var_os("HOME") {
                        format!("{}/.appkit/appkit.db", home.to_string_lossy())
                    } else {
                        ".appkit/appkit.db".to_string()
                    }
                }),
            },
            platform: PlatformConfig {
                api_url: non_empty_var("PLATFORM_API_URL").map(|u| clean_forward_slash(&u)),
                log_shuttle_url: non_empty_var("LOG_SHUTTLE_URL")
                    .map(|u| clean_forward_slash(&u)),
                request_timeout: Duration::from_secs(
                    env::var("PLATFORM_TIMEOUT_SECS")
                        .ok()
                        .and_then(|t| t.parse().ok())
                        .unwrap_or(30),
                ),
                route_cache_ttl: Duration::from_secs(
                    env::var("ROUTE_CACHE_TTL_SECS")
                        .ok()
                        .and_then(|t| t.parse().ok())
                        .unwrap_or(300),
                ),
            },
            policy: PolicyConfig {
                envs_blacklist: parse_blacklist(
                    &env::var("BLACKLIST_ENV").unwrap_or_else(|_| DEFAULT_ENVS_BLACKLIST.into()),
                ),
                default_formation_size: non_empty_var("DYNO_DEFAULT_SIZE")
                    .unwrap_or_else(|| "scout".to_string()),
                max_formation_quantity: env::var("MAX_FORMATION_QUANTITY")
                    .ok()
                    .and_then(|q| q.parse().ok())
                    .unwrap_or(32),
            },
        }
    }

    /// Get the server address as a string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Look up the API base URL override for a named stack or region
///
/// `us-seattle` with kind `REGION` reads `US_SEATTLE_REGION_API`.
pub fn api_override(name: &str, kind: &str) -> Option<String> {
    let var = format!("{}_{}_API", name.to_uppercase().replace('-', "_"), kind);
    non_empty_var(&var).map(|u| clean_forward_slash(&u))
}

/// Strip trailing forward slashes from a URL
pub fn clean_forward_slash(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_blacklist(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_clean_forward_slash() {
        assert_eq!(clean_forward_slash("https://fooo.com/"), "https://fooo.com");
        assert_eq!(clean_forward_slash("https://fooo.com/foozle"), "https://fooo.com/foozle");
        assert_eq!(clean_forward_slash("https://fooo.com/foozle/"), "https://fooo.com/foozle");
    }

    #[test]
    fn test_parse_blacklist_skips_empty_fragments() {
        assert_eq!(parse_blacklist("PASS, ,KEY,"), vec!["PASS", "KEY"]);
        assert!(parse_blacklist("").is_empty());
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        for var in [
            "PORT",
            "SHUTDOWN_GRACE_SECS",
            "APPKIT_API_URL",
            "PLATFORM_API_URL",
            "BLACKLIST_ENV",
            "DYNO_DEFAULT_SIZE",
            "MAX_FORMATION_QUANTITY",
        ] {
            env::remove_var(var);
        }

        let config = Config::from_env();
        assert_eq!(config.server.port, 5000);
        assert!(config.platform.api_url.is_none());
        assert_eq!(config.server.public_url, "");
        assert_eq!(config.server.shutdown_grace, Duration::from_secs(10));
        assert_eq!(config.policy.default_formation_size, "scout");
        assert_eq!(config.policy.max_formation_quantity, 32);
        assert_eq!(
            config.policy.envs_blacklist,
            vec!["PASS", "KEY", "SECRET", "PRIVATE", "TOKEN", "SALT"]
        );
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        env::set_var("PLATFORM_API_URL", "http://platform.local/");
        env::set_var("APPKIT_API_URL", "https://appkit.local/");
        env::set_var("BLACKLIST_ENV", "SECRET");
        env::set_var("MAX_FORMATION_QUANTITY", "4");

        let config = Config::from_env();
        assert_eq!(config.platform.api_url.as_deref(), Some("http://platform.local"));
        assert_eq!(config.server.public_url, "https://appkit.local");
        assert_eq!(config.policy.envs_blacklist, vec!["SECRET"]);
        assert_eq!(config.policy.max_formation_quantity, 4);

        env::remove_var("PLATFORM_API_URL");
        env::remove_var("APPKIT_API_URL");
        env::remove_var("BLACKLIST_ENV");
        env::remove_var("MAX_FORMATION_QUANTITY");
    }

    #[test]
    #[serial]
    fn test_api_override_by_name() {
        env::set_var("US_SEATTLE_REGION_API", "https://region.example.com/");
        assert_eq!(
            api_override("us-seattle", "REGION").as_deref(),
            Some("https://region.example.com")
        );
        assert!(api_override("us-seattle", "STACK").is_none());
        env::remove_var("US_SEATTLE_REGION_API");
    }
}
