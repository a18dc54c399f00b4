use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::model::FailureCode;

/// Complete NEF emulator configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NefConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub nef: CoreConfig,
    #[serde(default)]
    pub southbound: SouthboundConfig,
    #[serde(default)]
    pub af_client: AfClientConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

fn default_bind_address() -> String {
    "0.0.0.0:8060".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

/// Limits and identifiers used by the AF registry
#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    #[serde(default = "default_max_af_support")]
    pub max_af_support: usize,
    #[serde(default = "default_max_per_af")]
    pub max_subscriptions_per_af: usize,
    #[serde(default = "default_max_per_af")]
    pub max_pfd_transactions_per_af: usize,
    #[serde(default = "default_subscription_id_start")]
    pub subscription_id_start: u64,
    #[serde(default = "default_transaction_id_start")]
    pub transaction_id_start: u64,
    /// Prefix of subscription locations, followed by `{afId}/subscriptions/{id}`
    #[serde(default = "default_location_url_prefix")]
    pub location_url_prefix: String,
    /// Prefix of PFD transaction locations, followed by `{afId}/transactions/{id}`
    #[serde(default = "default_location_url_prefix_pfd")]
    pub location_url_prefix_pfd: String,
    /// Route on which the SMF posts UP path change notifications
    #[serde(default = "default_upf_notification_path")]
    pub upf_notification_path: String,
    /// Absolute URI of that route, handed to the UDR/PCF
    #[serde(default = "default_upf_notification_uri")]
    pub upf_notification_uri: String,
    /// Ask the southbound for canonical state on every read
    #[serde(default)]
    pub refresh_from_southbound: bool,
}

fn default_max_af_support() -> usize {
    2
}

fn default_max_per_af() -> usize {
    5
}

fn default_subscription_id_start() -> u64 {
    11111
}

fn default_transaction_id_start() -> u64 {
    10000
}

fn default_location_url_prefix() -> String {
    "http://localhost:8060/3gpp-traffic-influence/v1/".to_string()
}

fn default_location_url_prefix_pfd() -> String {
    "http://localhost:8060/3gpp-pfd-management/v1/".to_string()
}

fn default_upf_notification_path() -> String {
    "/3gpp-traffic-influence/v1/notification/upf".to_string()
}

fn default_upf_notification_uri() -> String {
    format!("http://localhost:8060{}", default_upf_notification_path())
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_af_support: default_max_af_support(),
            max_subscriptions_per_af: default_max_per_af(),
            max_pfd_transactions_per_af: default_max_per_af(),
            subscription_id_start: default_subscription_id_start(),
            transaction_id_start: default_transaction_id_start(),
            location_url_prefix: default_location_url_prefix(),
            location_url_prefix_pfd: default_location_url_prefix_pfd(),
            upf_notification_path: default_upf_notification_path(),
            upf_notification_uri: default_upf_notification_uri(),
            refresh_from_southbound: false,
        }
    }
}

/// Which southbound stack the emulator binds entities to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SouthboundMode {
    /// In-memory UDR/PCF stand-in
    Emulated,
    /// Real UDR and PCF over HTTP
    Network,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SouthboundConfig {
    #[serde(default = "default_mode")]
    pub mode: SouthboundMode,
    #[serde(default = "default_udr_uri")]
    pub udr_uri: String,
    #[serde(default = "default_pcf_uri")]
    pub pcf_uri: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub fault_injection: FaultInjectionConfig,
}

fn default_mode() -> SouthboundMode {
    SouthboundMode::Emulated
}

fn default_udr_uri() -> String {
    "http://localhost:8070".to_string()
}

fn default_pcf_uri() -> String {
    "http://localhost:8071".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl SouthboundConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SouthboundConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            udr_uri: default_udr_uri(),
            pcf_uri: default_pcf_uri(),
            timeout_secs: default_timeout_secs(),
            fault_injection: FaultInjectionConfig::default(),
        }
    }
}

/// Forced PFD provisioning failures for exercising partial-failure reports
#[derive(Debug, Clone, Deserialize)]
pub struct FaultInjectionConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Applications to fail; empty fails every application
    #[serde(default)]
    pub app_ids: Vec<String>,
    #[serde(default = "default_failure_code")]
    pub failure_code: FailureCode,
}

fn default_failure_code() -> FailureCode {
    FailureCode::OtherReason
}

impl Default for FaultInjectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            app_ids: Vec::new(),
            failure_code: default_failure_code(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AfClientConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AfClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl NefConfig {
    /// Override selected values from env vars
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("NEF_BIND_ADDRESS") {
            self.server.bind_address = v;
        }
        if let Ok(v) = std::env::var("NEF_SOUTHBOUND_MODE") {
            match v.as_str() {
                "emulated" => self.southbound.mode = SouthboundMode::Emulated,
                "network" => self.southbound.mode = SouthboundMode::Network,
                _ => tracing::warn!(value = %v, "Ignoring unknown NEF_SOUTHBOUND_MODE"),
            }
        }
        if let Ok(v) = std::env::var("NEF_UDR_URI") {
            self.southbound.udr_uri = v;
        }
        if let Ok(v) = std::env::var("NEF_PCF_URI") {
            self.southbound.pcf_uri = v;
        }
        if let Ok(v) = std::env::var("NEF_MAX_AF_SUPPORT") {
            if let Ok(n) = v.parse::<usize>() {
                self.nef.max_af_support = n;
            }
        }
    }

    /// Refuse configurations the NEF cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.nef.location_url_prefix.is_empty() {
            bail!("location_url_prefix is empty");
        }
        if self.nef.location_url_prefix_pfd.is_empty() {
            bail!("location_url_prefix_pfd is empty");
        }
        if !self.nef.upf_notification_path.starts_with('/') {
            bail!("upf_notification_path must start with '/'");
        }
        if self.nef.max_af_support == 0
            || self.nef.max_subscriptions_per_af == 0
            || self.nef.max_pfd_transactions_per_af == 0
        {
            bail!("capacity limits must be greater than zero");
        }
        Ok(())
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<NefConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: NefConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file {}", path))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = NefConfig::default();
        assert_eq!(config.server.bind_address, "0.0.0.0:8060");
        assert_eq!(config.nef.max_af_support, 2);
        assert_eq!(config.nef.subscription_id_start, 11111);
        assert_eq!(config.southbound.mode, SouthboundMode::Emulated);
        assert!(!config.southbound.fault_injection.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [server]
            bind_address = "127.0.0.1:9000"

            [nef]
            max_af_support = 4
            max_subscriptions_per_af = 8
            subscription_id_start = 1
            location_url_prefix = "http://nef/3gpp-traffic-influence/v1/"

            [southbound]
            mode = "network"
            udr_uri = "http://udr:8080"
            timeout_secs = 3

            [southbound.fault_injection]
            enabled = true
            app_ids = ["appY"]
            failure_code = "MALFUNCTION"
        "#;

        let config: NefConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:9000");
        assert_eq!(config.nef.max_af_support, 4);
        assert_eq!(config.nef.max_subscriptions_per_af, 8);
        assert_eq!(config.nef.max_pfd_transactions_per_af, 5);
        assert_eq!(config.southbound.mode, SouthboundMode::Network);
        assert_eq!(config.southbound.timeout(), Duration::from_secs(3));
        assert_eq!(config.southbound.fault_injection.app_ids, vec!["appY"]);
        assert_eq!(
            config.southbound.fault_injection.failure_code,
            FailureCode::Malfunction
        );
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [af_client]
            timeout_secs = 2
        "#;

        let config: NefConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.af_client.timeout_secs, 2);
        assert_eq!(config.nef.transaction_id_start, 10000); // Default
        assert_eq!(config.southbound.pcf_uri, "http://localhost:8071"); // Default
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = NefConfig::default();
        config.nef.location_url_prefix.clear();
        assert!(config.validate().is_err());

        let mut config = NefConfig::default();
        config.nef.max_af_support = 0;
        assert!(config.validate().is_err());

        let mut config = NefConfig::default();
        config.nef.upf_notification_path = "notify".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[nef]\nmax_af_support = 7").unwrap();

        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.nef.max_af_support, 7);

        assert!(load_config("/nonexistent/nef.toml").is_err());
    }
}
