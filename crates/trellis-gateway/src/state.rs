//! Shared application state.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use trellis_common::models::PrimaryTier;
use trellis_controller::Controller;

use crate::config::GatewayConfig;

/// State shared across all request handlers and worker tasks.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    /// The single-writer controller core. Decisions happen under this
    /// lock; network I/O never does.
    controller: Mutex<Controller>,
    /// Shared outbound client for forwarding and health polls.
    http: reqwest::Client,
    config: GatewayConfig,
    /// Runtime-mutable first-hop preference.
    primary: RwLock<PrimaryTier>,
}

impl AppState {
    pub fn new(controller: Controller, config: GatewayConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| anyhow::anyhow!("http client: {e}"))?;
        let primary = config.primary;
        Ok(Self {
            inner: Arc::new(Inner {
                controller: Mutex::new(controller),
                http,
                config,
                primary: RwLock::new(primary),
            }),
        })
    }

    pub fn controller(&self) -> &Mutex<Controller> {
        &self.inner.controller
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    pub async fn primary(&self) -> PrimaryTier {
        *self.inner.primary.read().await
    }

    pub async fn set_primary(&self, primary: PrimaryTier) {
        *self.inner.primary.write().await = primary;
    }
}
