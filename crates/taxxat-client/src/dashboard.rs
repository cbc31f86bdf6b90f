use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, warn};

use crate::backend::TaxBackend;
use crate::conversation::Conversation;
use crate::models::Identity;
use crate::session::SessionStore;
use crate::uploads::UploadTracker;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("no authenticated session")]
    NotAuthenticated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DashboardTab {
    #[default]
    Chat,
    Documents,
}

/// One authenticated visit: the chat and the document panel.
pub struct Dashboard {
    identity: Identity,
    conversation: Conversation,
    uploads: UploadTracker,
    active_tab: Mutex<DashboardTab>,
}

impl Dashboard {
    pub fn open(
        session: &dyn SessionStore,
        backend: Arc<dyn TaxBackend>,
    ) -> Result<Self, DashboardError> {
        let identity = session.load().ok_or(DashboardError::NotAuthenticated)?;
        debug!(email = %identity.email, "dashboard opened");
        Ok(Self {
            identity,
            conversation: Conversation::new(backend.clone()),
            uploads: UploadTracker::new(backend),
            active_tab: Mutex::new(DashboardTab::Chat),
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn uploads(&self) -> &UploadTracker {
        &self.uploads
    }

    pub fn active_tab(&self) -> DashboardTab {
        *self.active_tab.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Chat loads its history when still empty; documents refresh on every
    /// entry. Load failures are logged and leave the tab usable.
    pub async fn switch_tab(&self, tab: DashboardTab) {
        *self.active_tab.lock().unwrap_or_else(PoisonError::into_inner) = tab;
        match tab {
            DashboardTab::Chat => {
                if let Err(err) = self.conversation.load_history().await {
                    debug!(error = %err, "chat tab opened without history");
                }
            }
            DashboardTab::Documents => {
                if let Err(err) = self.uploads.refresh_list().await {
                    warn!(error = %err, "documents tab opened with a stale list");
                }
            }
        }
    }
}
