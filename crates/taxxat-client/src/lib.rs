pub mod auth;
pub mod backend;
pub mod client;
pub mod config;
mod config_env;
pub mod conversation;
pub mod dashboard;
pub mod models;
pub mod navigation;
pub mod session;
pub mod uploads;

#[cfg(test)]
mod testing;

pub use auth::{AuthError, AuthFlow, LoginForm, PasswordReset, RegisterForm, ResetForm};
pub use backend::{BackendError, HttpBackend, TaxBackend};
pub use client::{ClientError, TaxClient};
pub use config::{ClientConfig, ConfigError};
pub use conversation::{ChatPhase, Conversation, SendOutcome, StarterPrompt};
pub use dashboard::{Dashboard, DashboardError, DashboardTab};
pub use models::{ChatMessage, ChatRole, Identity, UploadedDocument};
pub use navigation::{NavigationGate, Redirect, Route};
pub use session::{FileSessionStore, MemorySessionStore, SessionStore};
pub use uploads::{SubmitOutcome, UploadError, UploadFile, UploadTracker};
