use actix_middleware::Principal;
use actix_web::{web, HttpResponse};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::Device;
use crate::services::devices::{self, RegisterDeviceRequest};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredDevice {
    pub id: i64,
    pub device_id: String,
    pub user_id: Uuid,
    pub device_name: String,
}

impl From<Device> for RegisteredDevice {
    fn from(device: Device) -> Self {
        Self {
            id: device.id,
            device_id: device.device_id,
            user_id: device.user_id,
            device_name: device.device_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub device: RegisteredDevice,
}

#[derive(Debug, Serialize)]
pub struct DevicesResponse {
    pub devices: Vec<Device>,
}

#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub message: &'static str,
    pub removed: u64,
}

/// POST /api/v1/devices/register
pub async fn register_device(
    state: web::Data<AppState>,
    caller: Principal,
    body: web::Json<RegisterDeviceRequest>,
) -> AppResult<HttpResponse> {
    let device =
        devices::register_device(state.devices.as_ref(), caller.id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(RegisterResponse {
        message: "Device registered successfully",
        device: device.into(),
    }))
}

/// GET /api/v1/devices/my
pub async fn my_devices(state: web::Data<AppState>, caller: Principal) -> AppResult<HttpResponse> {
    let devices = devices::my_devices(state.devices.as_ref(), caller.id).await?;
    Ok(HttpResponse::Ok().json(DevicesResponse { devices }))
}

/// DELETE /api/v1/devices/remove/{deviceId}
pub async fn remove_device(
    state: web::Data<AppState>,
    caller: Principal,
    device_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let removed = devices::remove_device(state.devices.as_ref(), caller.id, &device_id).await?;
    Ok(HttpResponse::Ok().json(RemoveResponse {
        message: "Device removed successfully",
        removed,
    }))
}

/// GET /api/v1/devices/public-keys/{userId}
pub async fn public_keys(
    state: web::Data<AppState>,
    _caller: Principal,
    user_id: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let keys = devices::public_keys(state.devices.as_ref(), user_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(keys))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/devices")
            .route("/register", web::post().to(register_device))
            .route("/my", web::get().to(my_devices))
            .route("/remove/{deviceId}", web::delete().to(remove_device))
            .route("/public-keys/{userId}", web::get().to(public_keys)),
    );
}
