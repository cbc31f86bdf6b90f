use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::models::{
    ChatHistoryEntry, ChatRequest, ForgotPasswordRequest, Identity, LoginRequest,
    RegisterRequest, ResetPasswordRequest, UploadedDocument,
};
use crate::uploads::UploadFile;

mod http;


pub use http::HttpBackend;

pub const BACKEND_PATH_REGISTER: &str = "/auth/register";
pub const BACKEND_PATH_LOGIN: &str = "/auth/login";
pub const BACKEND_PATH_LOGOUT: &str = "/auth/logout";
pub const BACKEND_PATH_FORGOT_PASSWORD: &str = "/auth/forgot-password";
pub const BACKEND_PATH_RESET_PASSWORD: &str = "/auth/reset-password";
pub const BACKEND_PATH_CHAT: &str = "/chat";
pub const BACKEND_PATH_CHAT_HISTORY: &str = "/chatbot/history";
pub const BACKEND_PATH_DOCUMENT_UPLOAD: &str = "/documents/upload";
pub const BACKEND_PATH_DOCUMENTS: &str = "/documents/";

pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BackendError>> + Send + 'a>>;

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("backend rejected request: status={status}")]
    Rejected {
        status: u16,
        message: Option<String>,
    },
    #[error("backend request could not be built: {message}")]
    InvalidRequest { message: String },
    #[error("backend unavailable: {message}")]
    Transport { message: String },
    #[error("backend response invalid: {message}")]
    InvalidResponse { message: String },
}

impl BackendError {
    /// Message supplied by the backend in its error payload, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Rejected {
                message: Some(message),
                ..
            } => Some(message.as_str()),
            _ => None,
        }
    }

    /// What the user gets to see: the server message verbatim, otherwise the
    /// caller's localized fallback. Raw transport errors are never shown.
    pub fn display_message(&self, fallback: &str) -> String {
        self.server_message()
            .map(ToString::to_string)
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Remote API consumed by the client controllers. Every authenticated call
/// relies on the credential the backend set during login or register.
pub trait TaxBackend: Send + Sync {
    fn register<'a>(&'a self, request: RegisterRequest) -> BackendFuture<'a, Identity>;

    fn login<'a>(&'a self, request: LoginRequest) -> BackendFuture<'a, Identity>;

    fn logout<'a>(&'a self) -> BackendFuture<'a, ()>;

    fn forgot_password<'a>(&'a self, request: ForgotPasswordRequest) -> BackendFuture<'a, ()>;

    fn reset_password<'a>(&'a self, request: ResetPasswordRequest) -> BackendFuture<'a, ()>;

    /// Returns the assistant's reply text.
    fn send_chat<'a>(&'a self, request: ChatRequest) -> BackendFuture<'a, String>;

    /// Most-recent-first.
    fn chat_history<'a>(&'a self) -> BackendFuture<'a, Vec<ChatHistoryEntry>>;

    fn upload_document<'a>(&'a self, file: UploadFile) -> BackendFuture<'a, ()>;

    fn list_documents<'a>(&'a self) -> BackendFuture<'a, Vec<UploadedDocument>>;
}
