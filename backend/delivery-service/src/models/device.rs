use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered client device and the public key senders encrypt to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: i64,
    pub device_id: String,
    pub user_id: Uuid,
    pub public_key: String,
    pub device_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDevice {
    pub user_id: Uuid,
    pub device_id: String,
    pub public_key: String,
    pub device_name: String,
}

/// What a sender needs to address one device
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceKey {
    pub device_id: String,
    pub public_key: String,
    pub device_name: String,
}

impl From<Device> for DeviceKey {
    fn from(device: Device) -> Self {
        Self {
            device_id: device.device_id,
            public_key: device.public_key,
            device_name: device.device_name,
        }
    }
}
