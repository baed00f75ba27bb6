use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(String),

    #[error("config deserialize error: {0}")]
    Deserialize(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub namespaces: NamespaceConfig,
    #[serde(default)]
    pub argocd: ArgoCdConfig,
    /// Finalizer this controller places on every tenant it has provisioned
    #[serde(default = "default_finalizer")]
    pub finalizer: String,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_finalizer() -> String {
    "tenancy.dev/tenancy-controller".to_string()
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            proxy: ProxyConfig::default(),
            namespaces: NamespaceConfig::default(),
            argocd: ArgoCdConfig::default(),
            finalizer: default_finalizer(),
            retry: RetryConfig::default(),
            token: TokenConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.proxy.target_port == 0 {
            return Err("proxy.target_port must be > 0".into());
        }
        let namespaces = [
            ("proxy.service_name", &self.proxy.service_name),
            ("proxy.namespace", &self.proxy.namespace),
            ("namespaces.user_tenants", &self.namespaces.user_tenants),
            ("namespaces.system_tenants", &self.namespaces.system_tenants),
            ("argocd.namespace", &self.argocd.namespace),
            ("argocd.policy_config_map", &self.argocd.policy_config_map),
        ];
        for (field, value) in namespaces {
            if value.trim().is_empty() {
                return Err(format!("{field} must not be empty"));
            }
        }
        if self.finalizer.trim().is_empty() {
            return Err("finalizer must not be empty".into());
        }
        // Retry validations
        if self.retry.steps == 0 {
            return Err("retry.steps must be >= 1".into());
        }
        if !(self.retry.factor >= 1.0) {
            return Err("retry.factor must be >= 1.0".into());
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err("retry.jitter must be within 0.0..=1.0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }
}

/// The shared multi-tenant proxy every tenant endpoint forwards to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_service_name")]
    pub service_name: String,
    #[serde(default = "default_proxy_namespace")]
    pub namespace: String,
    #[serde(default = "default_proxy_target_port")]
    pub target_port: u16,
}

fn default_proxy_service_name() -> String {
    "capsule-proxy".into()
}
fn default_proxy_namespace() -> String {
    "capsule-system".into()
}
fn default_proxy_target_port() -> u16 {
    9001
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            service_name: default_proxy_service_name(),
            namespace: default_proxy_namespace(),
            target_port: default_proxy_target_port(),
        }
    }
}

/// Namespaces the per-tenant identities are created in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceConfig {
    #[serde(default = "default_user_tenants")]
    pub user_tenants: String,
    #[serde(default = "default_system_tenants")]
    pub system_tenants: String,
}

fn default_user_tenants() -> String {
    "tenants".into()
}
fn default_system_tenants() -> String {
    "tenants-system".into()
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            user_tenants: default_user_tenants(),
            system_tenants: default_system_tenants(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgoCdConfig {
    #[serde(default = "default_argocd_namespace")]
    pub namespace: String,
    /// Shared config map holding one policy entry per tenant
    #[serde(default = "default_policy_config_map")]
    pub policy_config_map: String,
}

fn default_argocd_namespace() -> String {
    "argocd".into()
}
fn default_policy_config_map() -> String {
    "argocd-rbac-cm".into()
}

impl Default for ArgoCdConfig {
    fn default() -> Self {
        Self {
            namespace: default_argocd_namespace(),
            policy_config_map: default_policy_config_map(),
        }
    }
}

/// Backoff schedule for optimistic-concurrency retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_steps")]
    pub steps: u32,
    #[serde(default = "default_retry_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_retry_factor")]
    pub factor: f64,
    #[serde(default = "default_retry_jitter")]
    pub jitter: f64,
    /// Requeue delay after a failure that is not expected to clear quickly
    #[serde(default = "default_failure_requeue_ms")]
    pub failure_requeue_ms: u64,
}

fn default_retry_steps() -> u32 {
    4
}
fn default_retry_initial_delay_ms() -> u64 {
    10
}
fn default_retry_factor() -> f64 {
    5.0
}
fn default_retry_jitter() -> f64 {
    0.1
}
fn default_failure_requeue_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            steps: default_retry_steps(),
            initial_delay_ms: default_retry_initial_delay_ms(),
            factor: default_retry_factor(),
            jitter: default_retry_jitter(),
            failure_requeue_ms: default_failure_requeue_ms(),
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn failure_requeue(&self) -> Duration {
        Duration::from_millis(self.failure_requeue_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Requeue delay while the store has not populated a token yet
    #[serde(default = "default_token_requeue_ms")]
    pub requeue_after_ms: u64,
}

fn default_token_requeue_ms() -> u64 {
    2000
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            requeue_after_ms: default_token_requeue_ms(),
        }
    }
}

impl TokenConfig {
    pub fn requeue_after(&self) -> Duration {
        Duration::from_millis(self.requeue_after_ms)
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

pub mod loader {
    use super::{ConfigError, ControllerConfig};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<ControllerConfig, ConfigError> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                // Try default root-level file
                let default_path = PathBuf::from("tenancy.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., TENANCY__PROXY__TARGET_PORT=9443
        builder = builder.add_source(
            Environment::with_prefix("TENANCY")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| ConfigError::Build(e.to_string()))?;
        let merged: ControllerConfig = cfg
            .try_deserialize()
            .map_err(|e| ConfigError::Deserialize(e.to_string()))?;
        merged.validate().map_err(ConfigError::Invalid)?;
        Ok(merged)
    }
}
