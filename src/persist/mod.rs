//! Saving and restoring session state as JSON.
//!
//! Persistence is a snapshot of conversational state only: histories,
//! names, chain selections, locks, and draft input. Live services,
//! in-flight calls, and streaming placeholders are deliberately not
//! persisted; a restored session rebuilds its service on first use.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chain::ChainType;
use crate::error::{Result, VellumError};
use crate::session::ChatSession;
use crate::store::SessionStore;
use crate::types::{Message, ModelSelection};

const STATE_FILE: &str = "sessions.json";

/// Serialized form of a chain lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedLock {
    pub file_path: PathBuf,
    pub chain: ChainType,
}

/// Serialized form of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSession {
    pub name: String,
    pub is_context_mode: bool,
    #[serde(default)]
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelSelection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_document: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_chain: Option<ChainType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock: Option<SavedLock>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub chat_mode_messages: Vec<Message>,
}

/// A full store snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedState {
    pub version: u32,
    pub sessions: Vec<SavedSession>,
    #[serde(default)]
    pub selected: usize,
}

impl SavedState {
    pub const CURRENT_VERSION: u32 = 1;

    /// Snapshot a store. Streaming placeholders are dropped; everything
    /// else in the histories is kept verbatim.
    pub fn capture(store: &SessionStore) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            sessions: store.sessions().iter().map(capture_session).collect(),
            selected: store.selected_index(),
        }
    }

    /// Replace the store's sessions with this snapshot's. A snapshot with
    /// no sessions leaves the store untouched.
    pub fn apply(self, store: &mut SessionStore) {
        let limits = store.limits().clone();
        let sessions: Vec<ChatSession> = self
            .sessions
            .into_iter()
            .map(|saved| restore_session(saved, &limits))
            .collect();
        store.replace_sessions(sessions, self.selected);
    }
}

fn capture_session(session: &ChatSession) -> SavedSession {
    let keep = |m: &&Message| !m.is_thinking;
    SavedSession {
        name: session.name.clone(),
        is_context_mode: session.is_context_mode,
        input: session.input.clone(),
        persona: session.persona.clone(),
        model: session.model.clone(),
        detected_file_type: session.detected_file_type.clone(),
        associated_document: session.associated_document.clone(),
        selected_chain: session.selected_chain(),
        lock: session.lock().map(|lock| SavedLock {
            file_path: lock.file_path.clone(),
            chain: lock.chain,
        }),
        messages: session
            .context_log()
            .messages()
            .iter()
            .filter(keep)
            .cloned()
            .collect(),
        chat_mode_messages: session
            .chat_log()
            .messages()
            .iter()
            .filter(keep)
            .cloned()
            .collect(),
    }
}

fn restore_session(saved: SavedSession, limits: &crate::history::LogLimits) -> ChatSession {
    let mut session = ChatSession::new(limits.clone());
    session.is_context_mode = saved.is_context_mode;
    session.input = saved.input;
    session.persona = saved.persona;
    session.model = saved.model;
    session.update_file_type(saved.detected_file_type);
    session.associated_document = saved.associated_document;
    session.selected_chain = saved.selected_chain;
    if let Some(lock) = saved.lock {
        session.engage_lock(lock.file_path, lock.chain);
    }
    // The saved name wins over whatever engage_lock derived.
    session.name = saved.name;
    for message in saved.messages {
        session.context_log_mut().append(message);
    }
    for message in saved.chat_mode_messages {
        session.chat_log_mut().append(message);
    }
    session
}

/// Platform state-file location, e.g. `~/.local/share/vellum/sessions.json`.
pub fn default_state_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "vellum").ok_or_else(|| {
        VellumError::InvalidState("no home directory to store session state".to_string())
    })?;
    Ok(dirs.data_dir().join(STATE_FILE))
}

/// Snapshot `store` to `path` as pretty JSON, creating parent directories.
pub async fn save_to(path: &Path, store: &SessionStore) -> Result<()> {
    let state = SavedState::capture(store);
    let json = serde_json::to_vec_pretty(&state)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, json).await?;
    info!(path = %path.display(), sessions = state.sessions.len(), "saved session state");
    Ok(())
}

/// Load a snapshot from `path` into `store`. A missing file is not an
/// error; the store keeps its current sessions.
pub async fn load_from(path: &Path, store: &mut SessionStore) -> Result<()> {
    let json = match tokio::fs::read(path).await {
        Ok(json) => json,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no saved session state");
            return Ok(());
        }
        Err(error) => return Err(error.into()),
    };
    let state: SavedState = serde_json::from_slice(&json)?;
    info!(path = %path.display(), sessions = state.sessions.len(), "restoring session state");
    state.apply(store);
    Ok(())
}
