//! Device registry
//!
//! Each user registers the devices they read from, together with the public
//! key senders encrypt to. Senders look up a receiver's keys, encrypt once
//! per device and send one message per `deviceId`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Device, DeviceKey, NewDevice};
use crate::store::DeviceStore;

/// Body of `POST /devices/register`. A client that already holds a
/// `deviceId` sends it back to refresh its key instead of creating a new
/// device.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceRequest {
    pub device_id: Option<String>,
    pub public_key: Option<String>,
    pub device_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeys {
    pub user_id: Uuid,
    pub devices: Vec<DeviceKey>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub async fn register_device(
    store: &dyn DeviceStore,
    user_id: Uuid,
    req: RegisterDeviceRequest,
) -> AppResult<Device> {
    let (Some(public_key), Some(device_name)) = (present(req.public_key), present(req.device_name))
    else {
        return Err(AppError::MissingFields("Missing required fields".into()));
    };
    let device_id = present(req.device_id).unwrap_or_else(|| Uuid::new_v4().to_string());

    let device = store
        .upsert_device(NewDevice {
            user_id,
            device_id,
            public_key,
            device_name,
        })
        .await?;

    tracing::info!(%user_id, device_id = %device.device_id, "device registered");
    Ok(device)
}

pub async fn my_devices(store: &dyn DeviceStore, user_id: Uuid) -> AppResult<Vec<Device>> {
    Ok(store.list_devices(user_id).await?)
}

pub async fn remove_device(
    store: &dyn DeviceStore,
    user_id: Uuid,
    device_id: &str,
) -> AppResult<u64> {
    let removed = store.remove_device(user_id, device_id).await?;
    if removed > 0 {
        tracing::info!(%user_id, device_id, "device removed");
    }
    Ok(removed)
}

/// Public keys of every device `user_id` has registered. A user without
/// devices cannot be written to, so that is a 404.
pub async fn public_keys(store: &dyn DeviceStore, user_id: Uuid) -> AppResult<PublicKeys> {
    let devices = store.list_devices(user_id).await?;
    if devices.is_empty() {
        return Err(AppError::DeviceNotFound(
            "No devices found for this user".into(),
        ));
    }
    Ok(PublicKeys {
        user_id,
        devices: devices.into_iter().map(DeviceKey::from).collect(),
    })
}
