use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{
    BACKEND_PATH_CHAT, BACKEND_PATH_CHAT_HISTORY, BACKEND_PATH_DOCUMENT_UPLOAD,
    BACKEND_PATH_DOCUMENTS, BACKEND_PATH_FORGOT_PASSWORD, BACKEND_PATH_LOGIN,
    BACKEND_PATH_LOGOUT, BACKEND_PATH_REGISTER, BACKEND_PATH_RESET_PASSWORD, BackendError,
    BackendFuture, TaxBackend,
};
use crate::models::{
    AuthResponse, ChatHistoryEntry, ChatHistoryResponse, ChatRequest, ChatResponse,
    DocumentListResponse, ErrorBody, ForgotPasswordRequest, Identity, LoginRequest,
    RegisterRequest, ResetPasswordRequest, UploadedDocument,
};
use crate::uploads::UploadFile;

/// reqwest-backed [`TaxBackend`]. The cookie jar carries the session
/// credential issued by login/register to every later call.
#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|err| BackendError::InvalidRequest {
                message: format!("failed to build http client: {err}"),
            })?;

        Ok(Self::with_client(base_url, http_client))
    }

    pub fn with_client(base_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            http_client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post_json<Req, Res>(&self, path: &str, payload: &Req) -> Result<Res, BackendError>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let request = self.http_client.post(self.url(path)).json(payload);
        let body = self.execute(path, request).await?;
        parse_success_body(path, &body)
    }

    async fn post_json_discarding<Req>(&self, path: &str, payload: &Req) -> Result<(), BackendError>
    where
        Req: Serialize,
    {
        let request = self.http_client.post(self.url(path)).json(payload);
        self.execute(path, request).await.map(|_| ())
    }

    async fn get_json<Res>(&self, path: &str) -> Result<Res, BackendError>
    where
        Res: DeserializeOwned,
    {
        let request = self.http_client.get(self.url(path));
        let body = self.execute(path, request).await?;
        parse_success_body(path, &body)
    }

    async fn execute(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Vec<u8>, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|err| BackendError::Transport {
                message: err.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| BackendError::InvalidResponse {
                message: format!("failed to read response body for {path}: {err}"),
            })?;

        debug!(path, status, bytes = body.len(), "backend call completed");

        if (200..300).contains(&status) {
            return Ok(body.to_vec());
        }

        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(ErrorBody::into_message);
        Err(BackendError::Rejected { status, message })
    }
}

fn parse_success_body<Res>(path: &str, body: &[u8]) -> Result<Res, BackendError>
where
    Res: DeserializeOwned,
{
    serde_json::from_slice::<Res>(body).map_err(|err| BackendError::InvalidResponse {
        message: format!("failed to parse success response for {path}: {err}"),
    })
}

impl TaxBackend for HttpBackend {
    fn register<'a>(&'a self, request: RegisterRequest) -> BackendFuture<'a, Identity> {
        Box::pin(async move {
            let response: AuthResponse = self.post_json(BACKEND_PATH_REGISTER, &request).await?;
            Ok(response.user)
        })
    }

    fn login<'a>(&'a self, request: LoginRequest) -> BackendFuture<'a, Identity> {
        Box::pin(async move {
            let response: AuthResponse = self.post_json(BACKEND_PATH_LOGIN, &request).await?;
            Ok(response.user)
        })
    }

    fn logout<'a>(&'a self) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            self.post_json_discarding(BACKEND_PATH_LOGOUT, &serde_json::json!({}))
                .await
        })
    }

    fn forgot_password<'a>(&'a self, request: ForgotPasswordRequest) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            self.post_json_discarding(BACKEND_PATH_FORGOT_PASSWORD, &request)
                .await
        })
    }

    fn reset_password<'a>(&'a self, request: ResetPasswordRequest) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            self.post_json_discarding(BACKEND_PATH_RESET_PASSWORD, &request)
                .await
        })
    }

    fn send_chat<'a>(&'a self, request: ChatRequest) -> BackendFuture<'a, String> {
        Box::pin(async move {
            let response: ChatResponse = self.post_json(BACKEND_PATH_CHAT, &request).await?;
            Ok(response.response)
        })
    }

    fn chat_history<'a>(&'a self) -> BackendFuture<'a, Vec<ChatHistoryEntry>> {
        Box::pin(async move {
            let response: ChatHistoryResponse = self.get_json(BACKEND_PATH_CHAT_HISTORY).await?;
            Ok(response.conversations)
        })
    }

    fn upload_document<'a>(&'a self, file: UploadFile) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let part = Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.content_type)
                .map_err(|err| BackendError::InvalidRequest {
                    message: format!("invalid upload content type: {err}"),
                })?;
            let form = Form::new().part("file", part);

            let request = self
                .http_client
                .post(self.url(BACKEND_PATH_DOCUMENT_UPLOAD))
                .multipart(form);
            self.execute(BACKEND_PATH_DOCUMENT_UPLOAD, request)
                .await
                .map(|_| ())
        })
    }

    fn list_documents<'a>(&'a self) -> BackendFuture<'a, Vec<UploadedDocument>> {
        Box::pin(async move {
            let response: DocumentListResponse = self.get_json(BACKEND_PATH_DOCUMENTS).await?;
            Ok(response.documents)
        })
    }
}
