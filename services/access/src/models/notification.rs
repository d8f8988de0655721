//! Outgoing notification model

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::Property;

pub const TEMPERATURE_ANOMALY_SUBJECT: &str = "Temperature Anomaly Alert";

/// Message handed to the notification queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<PathBuf>,
}

impl Notification {
    /// Alert for the owner of `property` listing the formatted readings
    pub fn temperature_anomaly(property: &Property, readings: &[String]) -> Self {
        Self {
            recipient: property.owner.email.clone(),
            subject: TEMPERATURE_ANOMALY_SUBJECT.to_string(),
            body: format!(
                "Temperature anomalies detected for your property {}: {}",
                property.name,
                readings.join(", ")
            ),
            attachment: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Owner;
    use uuid::Uuid;

    #[test]
    fn test_temperature_anomaly_addresses_owner() {
        let property = Property {
            id: Uuid::new_v4(),
            name: "Lakeside Cabin".to_string(),
            lock_id: Some("dev:QUFB".to_string()),
            owner: Owner {
                id: Uuid::new_v4(),
                email: "owner@example.com".to_string(),
            },
        };

        let readings = vec!["21.46°C".to_string(), "19.0°C".to_string()];
        let notification = Notification::temperature_anomaly(&property, &readings);

        assert_eq!(notification.recipient, "owner@example.com");
        assert_eq!(notification.subject, TEMPERATURE_ANOMALY_SUBJECT);
        assert_eq!(
            notification.body,
            "Temperature anomalies detected for your property Lakeside Cabin: 21.46°C, 19.0°C"
        );
        assert!(notification.attachment.is_none());
    }
}
