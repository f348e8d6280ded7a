use crate::remote::{CsdbClient, DeviceClient};
use crate::storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const PI_ENDPOINT_KEY: &str = "pi_endpoint";
pub const CSDB_ENDPOINT_KEY: &str = "csdb_endpoint";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoints {
    pub pi_endpoint: String,
    pub csdb_endpoint: String,
}

/// Persisted proxy base URLs. Saved values win over the config file.
pub struct EndpointSettings {
    kv: Arc<dyn KeyValueStore>,
    device: Arc<DeviceClient>,
    csdb: Arc<CsdbClient>,
}

impl EndpointSettings {
    pub fn new(kv: Arc<dyn KeyValueStore>, device: Arc<DeviceClient>, csdb: Arc<CsdbClient>) -> Self {
        Self { kv, device, csdb }
    }

    fn saved(&self, key: &str) -> Option<String> {
        match self.kv.get(key) {
            Ok(value) => value.filter(|v| !v.trim().is_empty()),
            Err(e) => {
                log::warn!("[settings] reading {} failed: {}", key, e);
                None
            }
        }
    }

    /// Points both clients at the saved endpoints, if any.
    pub async fn apply_saved(&self) {
        if let Some(url) = self.saved(PI_ENDPOINT_KEY) {
            log::info!("[settings] Using saved device endpoint {}", url);
            self.device.set_endpoint(url).await;
        }
        if let Some(url) = self.saved(CSDB_ENDPOINT_KEY) {
            log::info!("[settings] Using saved CSDb endpoint {}", url);
            self.csdb.set_endpoint(url).await;
        }
    }

    pub async fn current(&self) -> Endpoints {
        Endpoints {
            pi_endpoint: self.device.endpoint().await,
            csdb_endpoint: self.csdb.endpoint().await,
        }
    }

    pub async fn set_pi_endpoint(&self, url: &str) {
        let url = url.trim_end_matches('/');
        if let Err(e) = self.kv.set(PI_ENDPOINT_KEY, url) {
            log::warn!("[settings] saving {} failed: {}", PI_ENDPOINT_KEY, e);
        }
        self.device.set_endpoint(url).await;
    }

    pub async fn set_csdb_endpoint(&self, url: &str) {
        let url = url.trim_end_matches('/');
        if let Err(e) = self.kv.set(CSDB_ENDPOINT_KEY, url) {
            log::warn!("[settings] saving {} failed: {}", CSDB_ENDPOINT_KEY, e);
        }
        self.csdb.set_endpoint(url).await;
    }
}
