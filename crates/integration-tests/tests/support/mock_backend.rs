#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use uuid::Uuid;

const SESSION_COOKIE: &str = "session";

#[derive(Debug, Clone)]
struct MockUser {
    id: String,
    name: String,
    password: String,
}

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: u64,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
struct BackendState {
    users: HashMap<String, MockUser>,
    sessions: HashMap<String, String>,
    reset_codes: HashMap<String, String>,
    conversations: HashMap<String, Vec<(String, String)>>,
    documents: HashMap<String, Vec<StoredDocument>>,
    next_document_id: u64,
    failing_chat: bool,
    failing_logout: bool,
    failing_uploads: bool,
    chat_requests: usize,
}

type SharedState = Arc<Mutex<BackendState>>;

/// In-process stand-in for the tax assistant API, served under `/api`.
pub struct MockBackend {
    pub base_url: String,
    state: SharedState,
    handle: tokio::task::JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = SharedState::default();
        let api = Router::new()
            .route("/auth/register", post(register))
            .route("/auth/login", post(login))
            .route("/auth/logout", post(logout))
            .route("/auth/forgot-password", post(forgot_password))
            .route("/auth/reset-password", post(reset_password))
            .route("/chat", post(chat))
            .route("/chatbot/history", get(history))
            .route("/documents/upload", post(upload))
            .route("/documents/", get(documents));
        let app = Router::new().nest("/api", api).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("mock backend listener should bind");
        let bind_addr = listener
            .local_addr()
            .expect("mock backend listener local address should exist");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("mock backend server should run");
        });

        Self {
            base_url: format!("http://{bind_addr}"),
            state,
            handle,
        }
    }

    pub fn api_url(&self) -> String {
        format!("{}/api", self.base_url)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut BackendState) -> T) -> T {
        let mut state = self.state.lock().expect("mock backend state lock");
        f(&mut state)
    }

    pub fn seed_user(&self, name: &str, email: &str, password: &str) {
        self.with_state(|state| {
            state.users.insert(
                email.to_string(),
                MockUser {
                    id: Uuid::new_v4().to_string(),
                    name: name.to_string(),
                    password: password.to_string(),
                },
            );
        });
    }

    pub fn seed_exchange(&self, email: &str, user_message: &str, bot_response: &str) {
        self.with_state(|state| {
            state
                .conversations
                .entry(email.to_string())
                .or_default()
                .push((user_message.to_string(), bot_response.to_string()));
        });
    }

    /// Code emailed by the last forgot-password call for `email`.
    pub fn issued_code(&self, email: &str) -> Option<String> {
        self.with_state(|state| state.reset_codes.get(email).cloned())
    }

    pub fn password_of(&self, email: &str) -> Option<String> {
        self.with_state(|state| state.users.get(email).map(|user| user.password.clone()))
    }

    pub fn active_sessions(&self) -> usize {
        self.with_state(|state| state.sessions.len())
    }

    pub fn chat_requests(&self) -> usize {
        self.with_state(|state| state.chat_requests)
    }

    pub fn stored_documents(&self, email: &str) -> Vec<StoredDocument> {
        self.with_state(|state| state.documents.get(email).cloned().unwrap_or_default())
    }

    pub fn fail_chat(&self, failing: bool) {
        self.with_state(|state| state.failing_chat = failing);
    }

    pub fn fail_logout(&self, failing: bool) {
        self.with_state(|state| state.failing_logout = failing);
    }

    pub fn fail_uploads(&self, failing: bool) {
        self.with_state(|state| state.failing_uploads = failing);
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn field<'a>(body: &'a Value, name: &str) -> Option<&'a str> {
    body.get(name)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

fn session_email(state: &BackendState, headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, token)| state.sessions.get(token).cloned())
}

fn signed_in(state: &mut BackendState, email: &str, user: &MockUser) -> Response {
    let token = Uuid::new_v4().to_string();
    state.sessions.insert(token.clone(), email.to_string());
    (
        [(
            header::SET_COOKIE,
            format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly"),
        )],
        Json(json!({
            "message": "Login realizado com sucesso!",
            "user": { "id": user.id, "nome": user.name, "email": email }
        })),
    )
        .into_response()
}

async fn register(State(state): State<SharedState>, Json(body): Json<Value>) -> Response {
    let (Some(name), Some(email), Some(password)) =
        (field(&body, "nome"), field(&body, "email"), field(&body, "senha"))
    else {
        return error(
            StatusCode::BAD_REQUEST,
            "Nome, Email e Senha são obrigatórios!",
        );
    };

    let mut state = state.lock().expect("mock backend state lock");
    if state.users.contains_key(email) {
        return error(StatusCode::CONFLICT, "Email já cadastrado!");
    }
    let user = MockUser {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        password: password.to_string(),
    };
    state.users.insert(email.to_string(), user.clone());
    let mut response = signed_in(&mut state, email, &user);
    *response.status_mut() = StatusCode::CREATED;
    response
}

async fn login(State(state): State<SharedState>, Json(body): Json<Value>) -> Response {
    let email = field(&body, "email").unwrap_or_default();
    let password = field(&body, "senha").unwrap_or_default();

    let mut state = state.lock().expect("mock backend state lock");
    match state.users.get(email).cloned() {
        Some(user) if user.password == password => signed_in(&mut state, email, &user),
        _ => error(StatusCode::UNAUTHORIZED, "Email ou senha inválidos!"),
    }
}

async fn logout(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let mut state = state.lock().expect("mock backend state lock");
    if state.failing_logout {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if let Some(email) = session_email(&state, &headers) {
        state.sessions.retain(|_, owner| *owner != email);
    }
    Json(json!({ "message": "Logout realizado com sucesso!" })).into_response()
}

async fn forgot_password(State(state): State<SharedState>, Json(body): Json<Value>) -> Response {
    let Some(email) = field(&body, "email") else {
        return error(StatusCode::BAD_REQUEST, "E-mail é obrigatório");
    };

    let mut state = state.lock().expect("mock backend state lock");
    if state.users.contains_key(email) {
        let code = format!("{:06}", Uuid::new_v4().as_u128() % 1_000_000);
        state.reset_codes.insert(email.to_string(), code);
    }
    Json(json!({ "message": "Código de redefinição enviado por e-mail!" })).into_response()
}

async fn reset_password(State(state): State<SharedState>, Json(body): Json<Value>) -> Response {
    let (Some(email), Some(token), Some(new_password)) = (
        field(&body, "email"),
        field(&body, "token"),
        field(&body, "new_password"),
    ) else {
        return error(
            StatusCode::BAD_REQUEST,
            "E-mail, token e nova senha são obrigatórios",
        );
    };

    let mut state = state.lock().expect("mock backend state lock");
    match state.reset_codes.get(email) {
        None => return error(StatusCode::BAD_REQUEST, "Token inválido ou expirado"),
        Some(code) if code != token => return error(StatusCode::BAD_REQUEST, "Token inválido"),
        Some(_) => {}
    }
    state.reset_codes.remove(email);
    if let Some(user) = state.users.get_mut(email) {
        user.password = new_password.to_string();
    }
    Json(json!({ "message": "Senha redefinida com sucesso!" })).into_response()
}

async fn chat(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().expect("mock backend state lock");
    state.chat_requests += 1;
    let Some(email) = session_email(&state, &headers) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "response": "Acesso não autorizado. Por favor, faça o login." })),
        )
            .into_response();
    };
    if state.failing_chat {
        return StatusCode::BAD_GATEWAY.into_response();
    }

    let message = field(&body, "message").unwrap_or_default().to_string();
    let reply = format!("Sobre \"{message}\": consulte a Receita Federal.");
    state
        .conversations
        .entry(email)
        .or_default()
        .push((message, reply.clone()));
    Json(json!({ "response": reply, "session_state": "idle" })).into_response()
}

async fn history(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let state = state.lock().expect("mock backend state lock");
    let Some(email) = session_email(&state, &headers) else {
        return error(StatusCode::UNAUTHORIZED, "Acesso não autorizado.");
    };

    let conversations: Vec<Value> = state
        .conversations
        .get(&email)
        .map(|exchanges| {
            exchanges
                .iter()
                .rev()
                .map(|(user_message, bot_response)| {
                    json!({ "user_message": user_message, "bot_response": bot_response })
                })
                .collect()
        })
        .unwrap_or_default();
    Json(json!({ "conversations": conversations })).into_response()
}

async fn upload(
    State(state): State<SharedState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let email = {
        let state = state.lock().expect("mock backend state lock");
        session_email(&state, &headers)
    };
    let Some(email) = email else {
        return error(StatusCode::UNAUTHORIZED, "Acesso não autorizado.");
    };

    let mut received = None;
    while let Ok(Some(part)) = multipart.next_field().await {
        if part.name() != Some("file") {
            continue;
        }
        let file_name = part.file_name().unwrap_or_default().to_string();
        let Ok(bytes) = part.bytes().await else {
            return error(StatusCode::BAD_REQUEST, "Falha ao ler o arquivo");
        };
        received = Some((file_name, bytes.to_vec()));
    }

    let mut state = state.lock().expect("mock backend state lock");
    if state.failing_uploads {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Falha ao salvar documento");
    }
    let Some((file_name, bytes)) = received else {
        return error(StatusCode::BAD_REQUEST, "Nenhum arquivo enviado");
    };
    if file_name.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Nenhum arquivo selecionado");
    }

    state.next_document_id += 1;
    let id = state.next_document_id;
    state
        .documents
        .entry(email)
        .or_default()
        .push(StoredDocument {
            id,
            file_name,
            bytes,
        });
    Json(json!({ "message": "Upload realizado com sucesso" })).into_response()
}

async fn documents(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let state = state.lock().expect("mock backend state lock");
    let Some(email) = session_email(&state, &headers) else {
        return error(StatusCode::UNAUTHORIZED, "Acesso não autorizado.");
    };

    let documents: Vec<Value> = state
        .documents
        .get(&email)
        .map(|stored| {
            stored
                .iter()
                .map(|document| {
                    json!({
                        "id": document.id,
                        "original_filename": document.file_name,
                        "upload_date": "2025-04-30T09:15:00",
                        "status": "processado"
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Json(json!({ "documents": documents })).into_response()
}
