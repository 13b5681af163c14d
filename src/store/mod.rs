//! The multi-session store: owns every tab, drives the send pipeline, and
//! fans document events out to sessions.
//!
//! One store per application. All sends go through [`SessionStore::send_message`],
//! which strings together routing, streaming, cancellation, and error
//! surfacing; request failures land in the session's log as messages rather
//! than escaping to the caller.

mod governor;

pub use governor::{GovernorSettings, MemoryGovernor};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use tracing::{info, warn};

use crate::cancel::SharedCanceller;
use crate::document::DocumentSource;
use crate::error::{Result, VellumError};
use crate::history::LogLimits;
use crate::router::ContextRouter;
use crate::service::{ContentUpdates, ServiceFactory};
use crate::session::ChatSession;
use crate::streaming::{StreamingCoordinator, UpdateSink, DEFAULT_DEBOUNCE};
use crate::types::{Message, MessageId, SessionId};

/// Store-wide tuning. Defaults are production values.
#[derive(Debug, Clone, Builder)]
pub struct StoreSettings {
    /// Interval between streamed partial-content applies.
    #[builder(default = DEFAULT_DEBOUNCE)]
    pub debounce: Duration,
    /// History hygiene limits applied to every session log.
    #[builder(default)]
    pub limits: LogLimits,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Owns all chat sessions and orchestrates the send pipeline.
pub struct SessionStore {
    sessions: Vec<ChatSession>,
    selected: usize,
    router: ContextRouter,
    cancel: SharedCanceller,
    settings: StoreSettings,
    update_sink: UpdateSink,
}

impl SessionStore {
    /// A store with default settings and one empty session.
    pub fn new(factory: Arc<dyn ServiceFactory>) -> Self {
        Self::with_settings(factory, StoreSettings::default())
    }

    pub fn with_settings(factory: Arc<dyn ServiceFactory>, settings: StoreSettings) -> Self {
        let mut store = Self {
            sessions: Vec::new(),
            selected: 0,
            router: ContextRouter::new(factory),
            cancel: SharedCanceller::new(),
            settings,
            update_sink: Arc::new(|_, _, _| {}),
        };
        store.add_session();
        store
    }

    /// Install the callback that receives debounced streaming partials.
    /// Defaults to discarding them; the final response always lands in the
    /// log regardless.
    pub fn set_update_sink(&mut self, sink: UpdateSink) {
        self.update_sink = sink;
    }

    /// A cloneable handle for cancelling in-flight calls from other tasks.
    pub fn canceller(&self) -> SharedCanceller {
        self.cancel.clone()
    }

    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    /// Index of the selected session within [`sessions`](Self::sessions).
    pub fn selected_index(&self) -> usize {
        self.selected
    }

    /// Swap in a restored session list. An empty list is ignored so a
    /// fresh state file never leaves the store without a session.
    pub(crate) fn replace_sessions(&mut self, sessions: Vec<ChatSession>, selected: usize) {
        if sessions.is_empty() {
            return;
        }
        self.selected = selected.min(sessions.len() - 1);
        self.sessions = sessions;
    }

    pub(crate) fn limits(&self) -> &LogLimits {
        &self.settings.limits
    }

    pub(crate) fn sessions_mut(&mut self) -> impl Iterator<Item = &mut ChatSession> {
        self.sessions.iter_mut()
    }

    pub fn session(&self, id: SessionId) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn session_mut(&mut self, id: SessionId) -> Option<&mut ChatSession> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    pub fn selected_session(&self) -> &ChatSession {
        &self.sessions[self.selected]
    }

    pub fn selected_session_mut(&mut self) -> &mut ChatSession {
        &mut self.sessions[self.selected]
    }

    /// Open a new session and select it.
    pub fn add_session(&mut self) -> SessionId {
        let session = ChatSession::new(self.settings.limits.clone());
        let id = session.id;
        self.sessions.push(session);
        self.selected = self.sessions.len() - 1;
        info!(session = ?id, "opened session");
        id
    }

    /// Close a session. The last remaining session cannot be closed; any
    /// in-flight call is cancelled and the cached service dropped with the
    /// session.
    pub fn close_session(&mut self, id: SessionId) -> Result<()> {
        if self.sessions.len() == 1 {
            return Err(VellumError::InvalidState(
                "the last session cannot be closed".to_string(),
            ));
        }
        let idx = self
            .sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| VellumError::InvalidState(format!("no session {id:?}")))?;
        self.cancel.cancel_call(id);
        self.sessions.remove(idx);
        if self.selected > idx {
            self.selected -= 1;
        }
        if self.selected >= self.sessions.len() {
            self.selected = self.sessions.len() - 1;
        }
        info!(session = ?id, "closed session");
        Ok(())
    }

    pub fn select_session(&mut self, id: SessionId) -> Result<()> {
        self.selected = self
            .sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| VellumError::InvalidState(format!("no session {id:?}")))?;
        Ok(())
    }

    /// Send one user turn through the selected session.
    ///
    /// Blank input is ignored. The user message and a streaming placeholder
    /// are appended up front; on success the placeholder becomes the final
    /// response, on failure it is replaced by a cancellation notice or a
    /// retryable error message. `Ok(())` therefore means "turn concluded",
    /// not "backend succeeded".
    pub async fn send_message(
        &mut self,
        input: &str,
        document: Option<&dyn DocumentSource>,
    ) -> Result<()> {
        let input = input.trim().to_string();
        if input.is_empty() {
            return Ok(());
        }
        let session_id = self.sessions[self.selected].id;
        let token = self.cancel.start_call(session_id);

        let placeholder_id;
        {
            let session = &mut self.sessions[self.selected];
            let mut user = Message::user(&input);
            let mut placeholder = Message::thinking();
            if let Some(model) = &session.model {
                user = user.with_model(model);
                placeholder = placeholder.with_model(model);
            }
            placeholder_id = placeholder.id;
            session.add_message(user);
            session.add_message(placeholder);
            session.input.clear();
        }

        let service = match self
            .router
            .resolve(&mut self.sessions[self.selected], document)
            .await
        {
            Ok(service) => service,
            Err(error) => {
                warn!(session = ?session_id, %error, "could not prepare a service");
                let session = &mut self.sessions[self.selected];
                session.remove_thinking_placeholder(placeholder_id);
                session.add_message(Message::system_error(
                    format!("Failed to prepare a conversation service: {error}"),
                    error.is_retryable(),
                    Some(input),
                ));
                self.cancel.finish_call(session_id);
                return Ok(());
            }
        };

        // A locked session's context always comes from its own file, never
        // from whichever document happens to be focused.
        let context = if self.sessions[self.selected].is_context_mode {
            match self.sessions[self.selected].lock().cloned() {
                Some(lock) => match tokio::fs::read_to_string(&lock.file_path).await {
                    Ok(content) => content,
                    Err(error) => {
                        warn!(
                            path = %lock.file_path.display(),
                            %error,
                            "failed to read locked document, using empty context"
                        );
                        String::new()
                    }
                },
                None => document.map(|d| d.current_text()).unwrap_or_default(),
            }
        } else {
            String::new()
        };

        let coordinator = StreamingCoordinator::new(
            session_id,
            placeholder_id,
            self.settings.debounce,
            Arc::clone(&self.update_sink),
        );
        let (updates, mut partials) = ContentUpdates::channel();
        let pump = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                while let Some(partial) = partials.recv().await {
                    coordinator.queue_update(partial);
                }
            })
        };

        let result = service.process_request(&context, &input, updates, token).await;
        // The service dropped its sender, so the pump drains and exits.
        let _ = pump.await;
        coordinator.finish();

        let session = &mut self.sessions[self.selected];
        match result {
            Ok(text) => session.finalize_placeholder(placeholder_id, text),
            Err(VellumError::Cancelled) => {
                session.remove_thinking_placeholder(placeholder_id);
                session.add_message(Message::system("Request cancelled."));
                // The stream stopped mid-context; rebuild on the next turn.
                session.invalidate_service();
            }
            Err(error) => {
                warn!(session = ?session_id, %error, "request failed");
                session.remove_thinking_placeholder(placeholder_id);
                session.add_message(Message::system_error(
                    format!("Request failed: {error}"),
                    error.is_retryable(),
                    Some(input),
                ));
            }
        }
        self.cancel.finish_call(session_id);
        Ok(())
    }

    /// Cancel the session's in-flight call and clean up its placeholder.
    pub fn cancel_send(&mut self, id: SessionId) {
        self.cancel.cancel_call(id);
        if let Some(session) = self.session_mut(id) {
            let stale: Vec<MessageId> = session
                .current_log()
                .messages()
                .iter()
                .filter(|m| m.is_thinking)
                .map(|m| m.id)
                .collect();
            for id in stale {
                session.remove_thinking_placeholder(id);
            }
            session.invalidate_service();
        }
    }

    /// Resend the user turn recorded on a retryable error message. The
    /// error message itself is removed first.
    pub async fn retry(
        &mut self,
        message_id: MessageId,
        document: Option<&dyn DocumentSource>,
    ) -> Result<()> {
        let input = {
            let log = self.sessions[self.selected].current_log_mut();
            let Some(message) = log.get(message_id) else {
                return Ok(());
            };
            if !(message.is_error && message.can_retry) {
                return Ok(());
            }
            let input = message.last_user_input.clone();
            log.remove(message_id);
            input
        };
        match input {
            Some(input) if !input.trim().is_empty() => self.send_message(&input, document).await,
            _ => Ok(()),
        }
    }

    /// Push fresh document text to the selected session's live service, if
    /// any. Failures are logged and swallowed; the next resolve rebuilds.
    pub async fn push_context(&mut self, context: &str) {
        let Some(service) = self.sessions[self.selected]
            .cached_service()
            .map(Arc::clone)
        else {
            return;
        };
        if let Err(error) = service.update_context(context).await {
            warn!(%error, "context push failed, flagging for rebuild");
            self.sessions[self.selected].invalidate_service();
        }
    }

    /// Mark every session bound or locked to `path` as needing a context
    /// rebuild on its next send.
    pub fn mark_document_changed(&mut self, path: &Path) {
        for session in &mut self.sessions {
            let bound = session.associated_document.as_deref() == Some(path)
                || session.lock().is_some_and(|lock| lock.file_path == path);
            if bound {
                session.mark_document_changed();
            }
        }
    }

    /// Fan a document-closed event out to every session.
    pub fn document_closed(&mut self, path: &Path) {
        for session in &mut self.sessions {
            session.document_closed(path);
        }
    }

    /// Heuristic total history footprint across all sessions.
    pub fn estimated_bytes(&self) -> usize {
        self.sessions
            .iter()
            .map(|s| s.context_log().estimated_bytes() + s.chat_log().estimated_bytes())
            .sum()
    }
}
