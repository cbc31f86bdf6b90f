//! Scripted in-memory backend for controller tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;

use crate::backend::{BackendError, BackendFuture, TaxBackend};
use crate::models::{
    ChatHistoryEntry, ChatRequest, ForgotPasswordRequest, Identity, LoginRequest,
    RegisterRequest, ResetPasswordRequest, UploadedDocument,
};
use crate::uploads::UploadFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Register(RegisterRequest),
    Login(LoginRequest),
    Logout,
    ForgotPassword(ForgotPasswordRequest),
    ResetPassword(ResetPasswordRequest),
    Chat(String),
    History,
    Upload(String),
    ListDocuments,
}

#[derive(Default)]
struct Script {
    identities: VecDeque<Result<Identity, BackendError>>,
    units: VecDeque<Result<(), BackendError>>,
    replies: VecDeque<Result<String, BackendError>>,
    history: VecDeque<Result<Vec<ChatHistoryEntry>, BackendError>>,
    documents: VecDeque<Result<Vec<UploadedDocument>, BackendError>>,
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    calls: Mutex<Vec<Call>>,
    script: Mutex<Script>,
    held: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(crate) fn push_identity(&self, reply: Result<Identity, BackendError>) {
        self.script.lock().expect("script lock").identities.push_back(reply);
    }

    /// Replies for logout, forgot/reset password and upload, in call order.
    pub(crate) fn push_unit(&self, reply: Result<(), BackendError>) {
        self.script.lock().expect("script lock").units.push_back(reply);
    }

    pub(crate) fn push_reply(&self, reply: Result<String, BackendError>) {
        self.script.lock().expect("script lock").replies.push_back(reply);
    }

    pub(crate) fn push_history(&self, reply: Result<Vec<ChatHistoryEntry>, BackendError>) {
        self.script.lock().expect("script lock").history.push_back(reply);
    }

    pub(crate) fn push_documents(&self, reply: Result<Vec<UploadedDocument>, BackendError>) {
        self.script.lock().expect("script lock").documents.push_back(reply);
    }

    /// Every call after this waits for a permit on the returned semaphore.
    pub(crate) fn hold(&self) -> Arc<Semaphore> {
        let semaphore = Arc::new(Semaphore::new(0));
        *self.held.lock().expect("held lock") = Some(semaphore.clone());
        semaphore
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }

    async fn wait_if_held(&self) {
        let semaphore = self.held.lock().expect("held lock").clone();
        if let Some(semaphore) = semaphore {
            semaphore
                .acquire()
                .await
                .expect("semaphore should stay open")
                .forget();
        }
    }
}

pub(crate) fn rejected(status: u16, message: Option<&str>) -> BackendError {
    BackendError::Rejected {
        status,
        message: message.map(ToString::to_string),
    }
}

pub(crate) fn unavailable() -> BackendError {
    BackendError::Transport {
        message: "connection refused".to_string(),
    }
}

pub(crate) fn document(id: &str, file_name: &str) -> UploadedDocument {
    UploadedDocument {
        id: id.to_string(),
        original_filename: file_name.to_string(),
        upload_date: "2025-03-04T10:00:00".to_string(),
        status: "pendente".to_string(),
    }
}

impl TaxBackend for FakeBackend {
    fn register<'a>(&'a self, request: RegisterRequest) -> BackendFuture<'a, Identity> {
        Box::pin(async move {
            self.record(Call::Register(request));
            self.wait_if_held().await;
            let next = self.script.lock().expect("script lock").identities.pop_front();
            next.unwrap_or_else(|| Err(unavailable()))
        })
    }

    fn login<'a>(&'a self, request: LoginRequest) -> BackendFuture<'a, Identity> {
        Box::pin(async move {
            self.record(Call::Login(request));
            self.wait_if_held().await;
            let next = self.script.lock().expect("script lock").identities.pop_front();
            next.unwrap_or_else(|| Err(unavailable()))
        })
    }

    fn logout<'a>(&'a self) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            self.record(Call::Logout);
            self.wait_if_held().await;
            let next = self.script.lock().expect("script lock").units.pop_front();
            next.unwrap_or(Ok(()))
        })
    }

    fn forgot_password<'a>(&'a self, request: ForgotPasswordRequest) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            self.record(Call::ForgotPassword(request));
            self.wait_if_held().await;
            let next = self.script.lock().expect("script lock").units.pop_front();
            next.unwrap_or(Ok(()))
        })
    }

    fn reset_password<'a>(&'a self, request: ResetPasswordRequest) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            self.record(Call::ResetPassword(request));
            self.wait_if_held().await;
            let next = self.script.lock().expect("script lock").units.pop_front();
            next.unwrap_or(Ok(()))
        })
    }

    fn send_chat<'a>(&'a self, request: ChatRequest) -> BackendFuture<'a, String> {
        Box::pin(async move {
            let echo = format!("resposta: {}", request.message);
            self.record(Call::Chat(request.message));
            self.wait_if_held().await;
            let next = self.script.lock().expect("script lock").replies.pop_front();
            next.unwrap_or(Ok(echo))
        })
    }

    fn chat_history<'a>(&'a self) -> BackendFuture<'a, Vec<ChatHistoryEntry>> {
        Box::pin(async move {
            self.record(Call::History);
            self.wait_if_held().await;
            let next = self.script.lock().expect("script lock").history.pop_front();
            next.unwrap_or(Ok(Vec::new()))
        })
    }

    fn upload_document<'a>(&'a self, file: UploadFile) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            self.record(Call::Upload(file.file_name));
            self.wait_if_held().await;
            let next = self.script.lock().expect("script lock").units.pop_front();
            next.unwrap_or(Ok(()))
        })
    }

    fn list_documents<'a>(&'a self) -> BackendFuture<'a, Vec<UploadedDocument>> {
        Box::pin(async move {
            self.record(Call::ListDocuments);
            self.wait_if_held().await;
            let next = self.script.lock().expect("script lock").documents.pop_front();
            next.unwrap_or(Ok(Vec::new()))
        })
    }
}
