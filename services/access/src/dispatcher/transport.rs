//! Cloud-to-device command transport
//!
//! Locks are reached through Azure IoT Hub direct methods. The hub relays a
//! named method call to the device and returns the device's status and JSON
//! payload synchronously.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error};

use crate::config::AccessConfig;
use crate::dispatcher::CommandEnvelope;
use crate::error::{AccessError, AccessResult};

/// Raw response of a remote method call
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MethodResponse {
    pub status: i32,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Synchronous remote method invocation on a device
#[async_trait]
pub trait DeviceMethodTransport: Send + Sync {
    async fn invoke(
        &self,
        device_id: &str,
        method_name: &str,
        envelope: &CommandEnvelope,
    ) -> AccessResult<MethodResponse>;
}

/// IoT Hub connection settings
#[derive(Debug, Clone)]
pub struct IotHubSettings {
    pub host: String,
    pub shared_access_key_name: String,
    /// Base64 registry key of the shared access policy
    pub shared_access_key: String,
    pub api_version: String,
    pub method_response_timeout: Duration,
    pub http_timeout: Duration,
    pub sas_token_ttl: Duration,
}

impl From<&AccessConfig> for IotHubSettings {
    fn from(config: &AccessConfig) -> Self {
        Self {
            host: config.iothub_host.clone(),
            shared_access_key_name: config.registry_shared_access_key_name.clone(),
            shared_access_key: config.registry_shared_access_key.clone(),
            api_version: config.iothub_api_version.clone(),
            method_response_timeout: Duration::from_secs(config.method_response_timeout_secs),
            http_timeout: Duration::from_secs(config.http_timeout_secs),
            sas_token_ttl: Duration::from_secs(config.sas_token_ttl_secs),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DirectMethodRequest<'a> {
    method_name: &'a str,
    response_timeout_in_seconds: u64,
    payload: &'a CommandEnvelope,
}

/// Direct-method transport over the IoT Hub service REST API
#[derive(Clone)]
pub struct IotHubTransport {
    client: reqwest::Client,
    settings: IotHubSettings,
    signing_key: Vec<u8>,
}

impl IotHubTransport {
    pub fn new(settings: IotHubSettings) -> AccessResult<Self> {
        let signing_key = BASE64.decode(&settings.shared_access_key).map_err(|e| {
            AccessError::Format(format!("registry shared access key is not base64: {}", e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(settings.http_timeout)
            .build()
            .map_err(|e| AccessError::Dispatch(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            settings,
            signing_key,
        })
    }

    fn method_url(&self, device_id: &str) -> String {
        format!(
            "https://{}/twins/{}/methods?api-version={}",
            self.settings.host,
            urlencoding::encode(device_id),
            self.settings.api_version
        )
    }

    fn authorization(&self) -> AccessResult<String> {
        let expiry = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AccessError::Dispatch(format!("Failed to get current time: {}", e)))?
            .as_secs()
            + self.settings.sas_token_ttl.as_secs();

        shared_access_signature(
            &self.settings.host,
            &self.settings.shared_access_key_name,
            &self.signing_key,
            expiry,
        )
    }
}

#[async_trait]
impl DeviceMethodTransport for IotHubTransport {
    async fn invoke(
        &self,
        device_id: &str,
        method_name: &str,
        envelope: &CommandEnvelope,
    ) -> AccessResult<MethodResponse> {
        let request = DirectMethodRequest {
            method_name,
            response_timeout_in_seconds: self.settings.method_response_timeout.as_secs(),
            payload: envelope,
        };

        debug!(device_id, method_name, "Invoking direct method");

        let response = self
            .client
            .post(self.method_url(device_id))
            .header(reqwest::header::AUTHORIZATION, self.authorization()?)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(device_id, method_name, "Direct method request failed: {}", e);
                AccessError::Dispatch(format!("request to device {} failed: {}", device_id, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(device_id, method_name, %status, "IoT Hub rejected direct method: {}", body);
            return Err(AccessError::Dispatch(format!(
                "IoT Hub returned {} for device {}: {}",
                status, device_id, body
            )));
        }

        response.json::<MethodResponse>().await.map_err(|e| {
            AccessError::Dispatch(format!("malformed response from device {}: {}", device_id, e))
        })
    }
}

/// Build a `SharedAccessSignature` authorization value for `host`
pub fn shared_access_signature(
    host: &str,
    key_name: &str,
    signing_key: &[u8],
    expiry: u64,
) -> AccessResult<String> {
    let resource_uri = urlencoding::encode(host);
    let string_to_sign = format!("{}\n{}", resource_uri, expiry);

    let mut mac = Hmac::<Sha256>::new_from_slice(signing_key)
        .map_err(|e| AccessError::Format(format!("invalid signing key: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    Ok(format!(
        "SharedAccessSignature sr={}&sig={}&se={}&skn={}",
        resource_uri,
        urlencoding::encode(&signature),
        expiry,
        key_name
    ))
}
