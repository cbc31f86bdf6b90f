use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::auth::AuthFlow;
use crate::backend::{BackendError, HttpBackend, TaxBackend};
use crate::config::{ClientConfig, ConfigError};
use crate::dashboard::{Dashboard, DashboardError};
use crate::models::Identity;
use crate::navigation::NavigationGate;
use crate::session::{FileSessionStore, SessionStore};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Everything a front end needs, wired to one backend and one session store.
pub struct TaxClient {
    backend: Arc<dyn TaxBackend>,
    session: Arc<dyn SessionStore>,
    auth: AuthFlow,
    gate: NavigationGate,
}

impl TaxClient {
    /// HTTP backend plus a file-backed session under `config.session_dir`.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let backend = HttpBackend::new(config.api_base_url.clone())?;
        let session = FileSessionStore::in_dir(&config.session_dir);
        info!(
            api_base_url = %config.api_base_url,
            session_path = %session.path().display(),
            "client configured"
        );

        Ok(Self::with_parts(
            Arc::new(backend),
            Arc::new(session),
            config.reset_redirect_delay(),
        ))
    }

    pub fn with_parts(
        backend: Arc<dyn TaxBackend>,
        session: Arc<dyn SessionStore>,
        reset_delay: Duration,
    ) -> Self {
        Self {
            auth: AuthFlow::new(backend.clone(), session.clone(), reset_delay),
            gate: NavigationGate::new(session.clone()),
            backend,
            session,
        }
    }

    pub fn auth(&self) -> &AuthFlow {
        &self.auth
    }

    pub fn gate(&self) -> &NavigationGate {
        &self.gate
    }

    pub fn identity(&self) -> Option<Identity> {
        self.session.load()
    }

    pub fn open_dashboard(&self) -> Result<Dashboard, DashboardError> {
        Dashboard::open(self.session.as_ref(), self.backend.clone())
    }
}
