use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::session::{Role, RoleProbe};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub roles: RoleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Origin plus version prefix shared by every resource endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Token issue endpoint (username + password -> access + refresh)
    #[serde(default = "default_token_path")]
    pub token_path: String,
    /// Token refresh endpoint (refresh -> access)
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_path: default_token_path(),
            refresh_path: default_refresh_path(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/api/v1".to_string()
}

fn default_token_path() -> String {
    "token/".to_string()
}

fn default_refresh_path() -> String {
    "token/refresh/".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("TenderHub-CLI/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// File holding the access token, refresh token and user descriptor
    #[serde(default = "default_session_path")]
    pub path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

fn default_session_path() -> PathBuf {
    PathBuf::from("./.tenderhub/session.json")
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleConfig {
    /// Role-specific endpoints, tried in order; a 2xx assigns the role
    #[serde(default = "default_probes")]
    pub probes: Vec<RoleProbe>,
    /// Generic profile endpoint consulted after the probes
    #[serde(default = "default_profile_path")]
    pub profile_path: String,
    /// Token claims checked for a role, in priority order
    #[serde(default = "default_claim_names")]
    pub claim_names: Vec<String>,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            probes: default_probes(),
            profile_path: default_profile_path(),
            claim_names: default_claim_names(),
        }
    }
}

fn default_probes() -> Vec<RoleProbe> {
    vec![
        RoleProbe::new("vendors/me/", Role::Vendor),
        RoleProbe::new("clients/me/", Role::Client),
    ]
}

fn default_profile_path() -> String {
    "users/me/".to_string()
}

fn default_claim_names() -> Vec<String> {
    ["role", "user_role", "user_type", "account_type"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).with_context(|| "Failed to parse configuration file")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every request fail.
    pub fn validate(&self) -> Result<()> {
        let base = self.api.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            anyhow::bail!("api.base_url must start with http:// or https://, got '{}'", base);
        }
        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be greater than zero");
        }
        if let Some(probe) = self.roles.probes.iter().find(|p| !p.role.is_known()) {
            anyhow::bail!("roles.probes entry '{}' has no usable role", probe.path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://localhost:8000/api/v1");
        assert_eq!(config.roles.probes.len(), 2);
        assert_eq!(config.roles.probes[0].role, Role::Vendor);
        assert_eq!(config.roles.probes[1].role, Role::Client);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_parse_partial_file() {
        let config = Config::parse(
            r#"
            [api]
            base_url = "https://tenders.example.com/api/v2"

            [[roles.probes]]
            path = "clients/me/"
            role = "client"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://tenders.example.com/api/v2");
        assert_eq!(config.api.refresh_path, "token/refresh/");
        assert_eq!(config.roles.probes.len(), 1);
        assert_eq!(config.roles.profile_path, "users/me/");
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let err = Config::parse("[api]\nbase_url = \"localhost:8000\"").unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_rejects_probe_without_role() {
        let err = Config::parse(
            r#"
            [[roles.probes]]
            path = "admins/me/"
            role = "admin"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("admins/me/"));
    }
}
