//! Message log for the assistant chat.
//!
//! Messages are only ever appended. The user's own message shows up before
//! the request is sent and is never rolled back; whatever comes back (reply
//! or apology) lands right after it. One reply may be pending at a time.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::{BackendError, TaxBackend};
use crate::models::{ChatMessage, ChatRequest, expand_history};


pub const CHAT_FAILURE_REPLY: &str = "Desculpe, ocorreu um erro. Tente novamente.";

/// A starter button: the short label shown and the question it fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarterPrompt {
    pub label: &'static str,
    pub prompt: &'static str,
}

pub const STARTER_PROMPTS: [StarterPrompt; 3] = [
    StarterPrompt {
        label: "Quem precisa declarar?",
        prompt: "Quem precisa declarar IR em 2025?",
    },
    StarterPrompt {
        label: "Deduções permitidas",
        prompt: "Quais são as deduções permitidas?",
    },
    StarterPrompt {
        label: "Prazo de declaração",
        prompt: "Qual o prazo para declarar?",
    },
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatPhase {
    #[default]
    Idle,
    Sending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredReason {
    Empty,
    ReplyPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Ignored(IgnoredReason),
    Replied,
    /// The request failed and the apology was appended instead.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryLoad {
    /// Messages already present, or another load is running.
    Skipped,
    Loaded { messages: usize },
    /// Something was sent while the history was on its way.
    Superseded,
}

#[derive(Debug, Default)]
struct ChatState {
    messages: Vec<ChatMessage>,
    phase: ChatPhase,
    input: String,
    history_loading: bool,
    history_loaded: bool,
}

pub struct Conversation {
    backend: Arc<dyn TaxBackend>,
    state: Mutex<ChatState>,
    scroll: watch::Sender<Option<usize>>,
}

impl Conversation {
    pub fn new(backend: Arc<dyn TaxBackend>) -> Self {
        let (scroll, _) = watch::channel(None);
        Self {
            backend,
            state: Mutex::new(ChatState::default()),
            scroll,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn append(&self, state: &mut ChatState, message: ChatMessage) {
        state.messages.push(message);
        self.scroll.send_replace(Some(state.messages.len() - 1));
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().messages.clone()
    }

    pub fn phase(&self) -> ChatPhase {
        self.lock().phase
    }

    pub fn is_reply_pending(&self) -> bool {
        self.phase() == ChatPhase::Sending
    }

    pub fn history_loaded(&self) -> bool {
        self.lock().history_loaded
    }

    pub fn input(&self) -> String {
        self.lock().input.clone()
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.lock().input = text.into();
    }

    /// Index of the newest message, updated on every append.
    pub fn scroll_target(&self) -> watch::Receiver<Option<usize>> {
        self.scroll.subscribe()
    }

    /// Starter prompts, offered only while the log is empty.
    pub fn suggestions(&self) -> &'static [StarterPrompt] {
        if self.lock().messages.is_empty() {
            &STARTER_PROMPTS
        } else {
            &[]
        }
    }

    /// Puts the chosen starter question in the input buffer without sending
    /// it. `None` when the index is out of range or the prompts are gone.
    pub fn pick_suggestion(&self, index: usize) -> Option<StarterPrompt> {
        let mut state = self.lock();
        if !state.messages.is_empty() {
            return None;
        }
        let suggestion = *STARTER_PROMPTS.get(index)?;
        state.input = suggestion.prompt.to_string();
        Some(suggestion)
    }

    /// Fetches past exchanges when nothing is shown yet.
    pub async fn load_history(&self) -> Result<HistoryLoad, BackendError> {
        {
            let mut state = self.lock();
            if !state.messages.is_empty() || state.history_loading {
                return Ok(HistoryLoad::Skipped);
            }
            state.history_loading = true;
        }

        let loading = HistoryLoadingGuard { state: &self.state };
        let result = self.backend.chat_history().await;
        drop(loading);

        let entries = result.map_err(|err| {
            warn!(error = %err, "failed to load chat history");
            err
        })?;

        let mut state = self.lock();
        if !state.messages.is_empty() {
            debug!(
                entries = entries.len(),
                "discarding chat history that arrived after a new message"
            );
            return Ok(HistoryLoad::Superseded);
        }

        state.messages = expand_history(entries);
        state.history_loaded = true;
        let count = state.messages.len();
        if count > 0 {
            self.scroll.send_replace(Some(count - 1));
        }
        info!(messages = count, "chat history loaded");
        Ok(HistoryLoad::Loaded { messages: count })
    }

    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Ignored(IgnoredReason::Empty);
        }

        {
            let mut state = self.lock();
            if state.phase == ChatPhase::Sending {
                debug!("message dropped while a reply is pending");
                return SendOutcome::Ignored(IgnoredReason::ReplyPending);
            }
            state.input.clear();
            self.append(&mut state, ChatMessage::user(text));
            state.phase = ChatPhase::Sending;
        }

        let _pending = PendingReplyGuard { state: &self.state };
        let result = self
            .backend
            .send_chat(ChatRequest {
                message: text.to_string(),
            })
            .await;

        let mut state = self.lock();
        match result {
            Ok(reply) => {
                self.append(&mut state, ChatMessage::assistant(reply));
                SendOutcome::Replied
            }
            Err(err) => {
                warn!(error = %err, "chat request failed");
                self.append(&mut state, ChatMessage::assistant(CHAT_FAILURE_REPLY));
                SendOutcome::Fallback
            }
        }
    }

    /// Sends whatever is in the input buffer.
    pub async fn submit_input(&self) -> SendOutcome {
        let input = self.input();
        self.send(&input).await
    }
}

/// Returns the chat to idle once the request ends, however it ends.
struct PendingReplyGuard<'a> {
    state: &'a Mutex<ChatState>,
}

impl Drop for PendingReplyGuard<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .phase = ChatPhase::Idle;
    }
}

struct HistoryLoadingGuard<'a> {
    state: &'a Mutex<ChatState>,
}

impl Drop for HistoryLoadingGuard<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history_loading = false;
    }
}
