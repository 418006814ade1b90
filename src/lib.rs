pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod notifications;
pub mod scheduling;

pub use db::DbPool;

use config::Config;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::notifications::SystemEmailService;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub mailer: SystemEmailService,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let mailer = SystemEmailService::new(config.email.clone());
        Self {
            config,
            db,
            mailer,
            metrics_handle: None,
        }
    }

    /// Set the Prometheus metrics handle
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}
