use std::sync::Arc;
use tokio::sync::watch;

use crate::config::Config;
use crate::services::DeliveryPoller;
use crate::store::{DeviceStore, MessageStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MessageStore>,
    pub devices: Arc<dyn DeviceStore>,
    pub config: Arc<Config>,
    /// Flips to `true` once the process starts shutting down
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MessageStore>,
        devices: Arc<dyn DeviceStore>,
        config: Arc<Config>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            devices,
            config,
            shutdown,
        }
    }

    pub fn poller(&self) -> DeliveryPoller {
        DeliveryPoller::new(
            self.store.clone(),
            self.config.long_poll,
            self.shutdown.clone(),
        )
    }
}
