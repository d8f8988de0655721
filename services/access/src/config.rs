//! Service configuration loaded from the environment

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

use crate::scheduler::OverlapPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct AccessConfig {
    /// IoT Hub host name, e.g. `my-hub.azure-devices.net`
    pub iothub_host: String,

    /// Name of the shared access policy used to sign requests
    pub registry_shared_access_key_name: String,

    /// Base64 key of that policy
    pub registry_shared_access_key: String,

    #[serde(default = "default_iothub_api_version")]
    pub iothub_api_version: String,

    /// How long the hub waits for the device to answer
    #[serde(default = "default_method_response_timeout_secs")]
    pub method_response_timeout_secs: u64,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_sas_token_ttl_secs")]
    pub sas_token_ttl_secs: u64,

    /// Period of the anomaly scan
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    #[serde(default)]
    pub scan_overlap_policy: OverlapPolicy,

    /// Redis list that receives outgoing notifications
    #[serde(default = "default_notification_queue")]
    pub notification_queue: String,

    #[serde(default = "default_http_bind_addr")]
    pub http_bind_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_iothub_api_version() -> String {
    "2021-04-12".to_string()
}

fn default_method_response_timeout_secs() -> u64 {
    30
}

fn default_http_timeout_secs() -> u64 {
    60
}

fn default_sas_token_ttl_secs() -> u64 {
    3600
}

fn default_scan_interval_secs() -> u64 {
    180
}

fn default_notification_queue() -> String {
    "notifications:email".to_string()
}

fn default_http_bind_addr() -> String {
    "0.0.0.0:3002".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AccessConfig {
    /// Load from environment variables named after the fields (`IOTHUB_HOST`, ...)
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(Environment::default())
            .build()?
            .try_deserialize()?;

        if config.scan_interval_secs == 0 {
            return Err(ConfigError::Message(
                "SCAN_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}
