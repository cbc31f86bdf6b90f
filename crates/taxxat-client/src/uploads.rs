use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{info, warn};

use crate::backend::{BackendError, TaxBackend};
use crate::models::UploadedDocument;


pub const UPLOAD_SUCCESS_NOTICE: &str = "Documento enviado com sucesso!";
pub const UPLOAD_FAILURE_FALLBACK: &str = "Erro ao enviar documento";

/// Extensions the document picker offers. The backend makes the final call.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png", "txt"];

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Jpeg,
    Png,
    PlainText,
}

impl FileKind {
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = Path::new(file_name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "txt" => Some(Self::PlainText),
            _ => None,
        }
    }

    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::PlainText => "text/plain",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = FileKind::from_file_name(&file_name)
            .map(FileKind::content_type)
            .unwrap_or(OCTET_STREAM)
            .to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub async fn read(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| UploadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "documento".to_string());
        Ok(Self::from_bytes(file_name, bytes))
    }

    pub fn kind(&self) -> Option<FileKind> {
        FileKind::from_file_name(&self.file_name)
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{message}")]
    Backend {
        message: String,
        #[source]
        source: BackendError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    NothingSelected,
    AlreadyInFlight,
    Uploaded { documents_refreshed: bool },
}

#[derive(Debug)]
struct Selection {
    id: u64,
    file: UploadFile,
}

#[derive(Debug, Default)]
struct UploadState {
    selection: Option<Selection>,
    next_selection_id: u64,
    in_flight: bool,
    documents: Vec<UploadedDocument>,
}

/// One pending document plus the server's list of what was already sent.
pub struct UploadTracker {
    backend: Arc<dyn TaxBackend>,
    state: Mutex<UploadState>,
}

impl UploadTracker {
    pub fn new(backend: Arc<dyn TaxBackend>) -> Self {
        Self {
            backend,
            state: Mutex::new(UploadState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, UploadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces any unsent selection. Returns `None` for kinds outside
    /// [`ACCEPTED_EXTENSIONS`]; such files are still kept.
    pub fn select_file(&self, file: UploadFile) -> Option<FileKind> {
        let kind = file.kind();
        if kind.is_none() {
            warn!(file_name = %file.file_name, "selected file is outside the accepted document kinds");
        }

        let mut state = self.lock();
        state.next_selection_id += 1;
        let id = state.next_selection_id;
        state.selection = Some(Selection { id, file });
        kind
    }

    pub fn clear_selection(&self) {
        self.lock().selection = None;
    }

    pub fn selected(&self) -> Option<UploadFile> {
        self.lock()
            .selection
            .as_ref()
            .map(|selection| selection.file.clone())
    }

    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight
    }

    pub fn documents(&self) -> Vec<UploadedDocument> {
        self.lock().documents.clone()
    }

    pub async fn submit(&self) -> Result<SubmitOutcome, UploadError> {
        let (selection_id, file) = {
            let mut state = self.lock();
            let Some(selection) = state.selection.as_ref() else {
                return Ok(SubmitOutcome::NothingSelected);
            };
            if state.in_flight {
                return Ok(SubmitOutcome::AlreadyInFlight);
            }
            let picked = (selection.id, selection.file.clone());
            state.in_flight = true;
            picked
        };

        let in_flight = InFlightGuard { state: &self.state };
        let file_name = file.file_name.clone();
        let result = self.backend.upload_document(file).await;
        drop(in_flight);

        if let Err(err) = result {
            warn!(file_name = %file_name, error = %err, "document upload failed");
            return Err(UploadError::Backend {
                message: err.display_message(UPLOAD_FAILURE_FALLBACK),
                source: err,
            });
        }

        {
            let mut state = self.lock();
            // A file picked while the upload ran stays selected.
            if state
                .selection
                .as_ref()
                .is_some_and(|selection| selection.id == selection_id)
            {
                state.selection = None;
            }
        }
        info!(file_name = %file_name, "document uploaded");

        let documents_refreshed = self.refresh_list().await.is_ok();
        Ok(SubmitOutcome::Uploaded {
            documents_refreshed,
        })
    }

    /// Replaces the local list with the backend's. On failure the previous
    /// list is left as it was.
    pub async fn refresh_list(&self) -> Result<usize, BackendError> {
        let documents = self.backend.list_documents().await.map_err(|err| {
            warn!(error = %err, "failed to load documents");
            err
        })?;

        let count = documents.len();
        self.lock().documents = documents;
        Ok(count)
    }
}

struct InFlightGuard<'a> {
    state: &'a Mutex<UploadState>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight = false;
    }
}
