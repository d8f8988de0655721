//! Command vocabulary and typed command results

use serde::{Deserialize, Serialize};
use std::fmt;

/// Commands understood by the lock firmware
///
/// Unrecognized names are forwarded untouched as [`LockCommand::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockCommand {
    OpenLock,
    CloseLock,
    GetTemperature,
    GetTemperatureStats,
    Other(String),
}

impl LockCommand {
    pub fn as_str(&self) -> &str {
        match self {
            LockCommand::OpenLock => "open_lock",
            LockCommand::CloseLock => "close_lock",
            LockCommand::GetTemperature => "get_temperature",
            LockCommand::GetTemperatureStats => "get_temperature_stats",
            LockCommand::Other(name) => name,
        }
    }
}

impl From<&str> for LockCommand {
    fn from(name: &str) -> Self {
        match name {
            "open_lock" => LockCommand::OpenLock,
            "close_lock" => LockCommand::CloseLock,
            "get_temperature" => LockCommand::GetTemperature,
            "get_temperature_stats" => LockCommand::GetTemperatureStats,
            other => LockCommand::Other(other.to_string()),
        }
    }
}

impl fmt::Display for LockCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed payload of a device response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandPayload {
    Ack,
    TemperatureReading { celsius: f64 },
    TemperatureStats { anomalies: Vec<f64> },
    Unknown { raw: serde_json::Value },
}

#[derive(Deserialize)]
struct TemperatureReadingBody {
    #[serde(alias = "celsius")]
    temperature: f64,
}

#[derive(Deserialize)]
struct TemperatureStatsBody {
    #[serde(default)]
    anomalies: Option<Vec<f64>>,
}

/// Outcome of one dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResult {
    pub status_code: i32,
    pub payload: CommandPayload,
    /// Payload exactly as the device returned it, kept for the audit trail
    pub raw_payload: serde_json::Value,
}

impl CommandResult {
    /// Interpret a raw device response for `command`
    ///
    /// Telemetry commands parse into their typed variant and fall back to
    /// [`CommandPayload::Unknown`] when the device sends something else.
    /// Every other command is an [`CommandPayload::Ack`].
    pub fn interpret(
        command: &LockCommand,
        status_code: i32,
        raw_payload: serde_json::Value,
    ) -> Self {
        let payload = match command {
            LockCommand::GetTemperature => {
                match serde_json::from_value::<TemperatureReadingBody>(raw_payload.clone()) {
                    Ok(body) => CommandPayload::TemperatureReading {
                        celsius: body.temperature,
                    },
                    Err(_) => CommandPayload::Unknown {
                        raw: raw_payload.clone(),
                    },
                }
            }
            LockCommand::GetTemperatureStats => {
                match serde_json::from_value::<TemperatureStatsBody>(raw_payload.clone()) {
                    Ok(body) => CommandPayload::TemperatureStats {
                        anomalies: body.anomalies.unwrap_or_default(),
                    },
                    Err(_) => CommandPayload::Unknown {
                        raw: raw_payload.clone(),
                    },
                }
            }
            _ => CommandPayload::Ack,
        };

        Self {
            status_code,
            payload,
            raw_payload,
        }
    }

    /// Anomaly readings carried by a stats response, empty otherwise
    pub fn anomalies(&self) -> &[f64] {
        match &self.payload {
            CommandPayload::TemperatureStats { anomalies } => anomalies,
            _ => &[],
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}
