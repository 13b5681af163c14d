//! Per-tab session state: dual message logs, chain selection, document
//! binding, and the chain lock.
//!
//! A session owns its histories and the cached backend service, but never
//! talks to a backend itself; the router does that. Mutators here keep the
//! session's invariants (lock implies document, selected chain is always
//! offered) and record when the cached service has gone stale.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::chain::{chains_for_file_type, ChainType};
use crate::history::{LogLimits, MessageLog};
use crate::service::SharedService;
use crate::types::{Message, MessageId, ModelSelection, SessionId};

/// A chain lock binds a session to one file and one specialized chain
/// until explicitly released or the file closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLock {
    pub file_path: PathBuf,
    pub chain: ChainType,
}

/// One conversation tab.
pub struct ChatSession {
    pub id: SessionId,
    pub name: String,
    /// Document-aware history.
    messages: MessageLog,
    /// Document-independent history.
    chat_mode_messages: MessageLog,
    /// True while the session is in context (document-aware) mode.
    pub is_context_mode: bool,
    pub(crate) selected_chain: Option<ChainType>,
    pub available_chains: Vec<ChainType>,
    pub detected_file_type: Option<String>,
    pub associated_document: Option<PathBuf>,
    lock: Option<ChainLock>,
    /// Set whenever the cached service no longer matches session state.
    context_requires_refresh: bool,
    service: Option<SharedService>,
    pub persona: Option<String>,
    pub model: Option<ModelSelection>,
    /// Draft input preserved across tab switches and restarts.
    pub input: String,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("is_context_mode", &self.is_context_mode)
            .field("selected_chain", &self.selected_chain)
            .field("lock", &self.lock)
            .field("has_service", &self.service.is_some())
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    pub fn new(limits: LogLimits) -> Self {
        Self {
            id: SessionId::new(),
            name: "Chat".to_string(),
            messages: MessageLog::new(limits.clone()),
            chat_mode_messages: MessageLog::new(limits),
            is_context_mode: true,
            selected_chain: None,
            available_chains: vec![ChainType::Chat],
            detected_file_type: None,
            associated_document: None,
            lock: None,
            context_requires_refresh: false,
            service: None,
            persona: None,
            model: None,
            input: String::new(),
        }
    }

    pub fn selected_chain(&self) -> Option<ChainType> {
        self.selected_chain
    }

    pub fn lock(&self) -> Option<&ChainLock> {
        self.lock.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    pub fn context_requires_refresh(&self) -> bool {
        self.context_requires_refresh
    }

    /// The log messages currently land in, per the mode flag.
    pub fn current_log(&self) -> &MessageLog {
        if self.is_context_mode {
            &self.messages
        } else {
            &self.chat_mode_messages
        }
    }

    pub fn current_log_mut(&mut self) -> &mut MessageLog {
        if self.is_context_mode {
            &mut self.messages
        } else {
            &mut self.chat_mode_messages
        }
    }

    pub fn context_log(&self) -> &MessageLog {
        &self.messages
    }

    pub fn context_log_mut(&mut self) -> &mut MessageLog {
        &mut self.messages
    }

    pub fn chat_log(&self) -> &MessageLog {
        &self.chat_mode_messages
    }

    pub fn chat_log_mut(&mut self) -> &mut MessageLog {
        &mut self.chat_mode_messages
    }

    /// Append to whichever log the current mode selects.
    pub fn add_message(&mut self, message: Message) {
        self.current_log_mut().append(message);
    }

    /// Toggle between context mode and plain chat mode. The two histories
    /// are independent; switching never mixes them, but the cached service
    /// belongs to the old mode.
    pub fn set_context_mode(&mut self, enabled: bool) {
        if self.is_context_mode == enabled {
            return;
        }
        self.is_context_mode = enabled;
        self.invalidate_service();
    }

    /// Select a chain. Re-selecting the current chain is a no-op; anything
    /// else disposes the cached service. Selecting a specialized chain with
    /// a known associated document engages the lock immediately.
    pub fn select_chain(&mut self, chain: ChainType) {
        if self.selected_chain == Some(chain) {
            return;
        }
        self.selected_chain = Some(chain);
        self.invalidate_service();

        if chain != ChainType::Chat {
            if let Some(path) = self.associated_document.clone() {
                self.engage_lock(path, chain);
            }
        }
    }

    /// Engage the chain lock on `path` with `chain` and retitle the tab
    /// from the file stem and the chain's short name.
    pub fn engage_lock(&mut self, path: PathBuf, chain: ChainType) {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled".to_string());
        self.name = format!("{stem} - {}", chain.short_name());
        if !self.available_chains.contains(&chain) {
            self.available_chains.push(chain);
        }
        debug!(session = ?self.id, ?chain, path = %path.display(), "chain lock engaged");
        self.lock = Some(ChainLock {
            file_path: path,
            chain,
        });
    }

    /// Release the chain lock: dispose the service, clear the document
    /// association, and retitle the tab back to plain chat.
    pub fn unlock(&mut self) {
        if self.lock.take().is_none() {
            return;
        }
        self.invalidate_service();
        self.associated_document = None;
        self.name = match &self.persona {
            Some(persona) => format!("Chat - {persona}"),
            None => "Chat".to_string(),
        };
        debug!(session = ?self.id, "chain lock released");
    }

    /// Recompute chain availability for a newly detected file type.
    ///
    /// While locked, the locked chain always remains offered and the
    /// selection is never touched. Unlocked, a selection that is no longer
    /// offered falls back to `Chat`.
    pub fn update_file_type(&mut self, detected: Option<String>) {
        self.available_chains = chains_for_file_type(detected.as_deref());
        self.detected_file_type = detected;

        if let Some(lock) = &self.lock {
            if !self.available_chains.contains(&lock.chain) {
                self.available_chains.push(lock.chain);
            }
            return;
        }
        if let Some(selected) = self.selected_chain {
            if !self.available_chains.contains(&selected) {
                self.selected_chain = Some(ChainType::Chat);
                self.invalidate_service();
            }
        }
    }

    /// Switch models. A real change disposes the service and announces the
    /// switch in the current log.
    pub fn select_model(&mut self, model: ModelSelection) {
        if self.model.as_ref() == Some(&model) {
            return;
        }
        let announcement = Message::system(format!("Switched to {}", model.name));
        self.model = Some(model);
        self.invalidate_service();
        self.add_message(announcement);
    }

    pub fn set_persona(&mut self, persona: Option<String>) {
        if self.persona == persona {
            return;
        }
        self.persona = persona;
        self.invalidate_service();
        if self.lock.is_none() {
            self.name = match &self.persona {
                Some(persona) => format!("Chat - {persona}"),
                None => "Chat".to_string(),
            };
        }
    }

    /// Associate a document with this session without engaging a lock.
    pub fn bind_document(&mut self, path: PathBuf) {
        if self.associated_document.as_deref() == Some(path.as_path()) {
            return;
        }
        self.associated_document = Some(path);
        self.context_requires_refresh = true;
    }

    /// React to an editor closing `path`. Releases the lock if it was held
    /// on that file, and clears a plain association.
    pub fn document_closed(&mut self, path: &Path) {
        if self
            .lock
            .as_ref()
            .is_some_and(|lock| lock.file_path == path)
        {
            self.unlock();
            return;
        }
        if self.associated_document.as_deref() == Some(path) {
            self.associated_document = None;
            self.context_requires_refresh = true;
        }
    }

    /// Record that the bound document's content changed on disk or in the
    /// editor, so the next resolve rebuilds context.
    pub fn mark_document_changed(&mut self) {
        self.context_requires_refresh = true;
    }

    /// Drop the cached service and flag the context stale.
    pub fn invalidate_service(&mut self) {
        self.service = None;
        self.context_requires_refresh = true;
    }

    /// Peek at the cached service without consuming it.
    pub fn cached_service(&self) -> Option<&SharedService> {
        self.service.as_ref()
    }

    /// Take the cached service out, leaving the refresh flag as-is. The
    /// router takes before building so a failed rebuild never leaves a
    /// stale handle behind.
    pub fn take_service(&mut self) -> Option<SharedService> {
        self.service.take()
    }

    /// Install a freshly built service and clear the refresh flag.
    pub fn install_service(&mut self, service: SharedService) {
        self.service = Some(service);
        self.context_requires_refresh = false;
    }

    /// Remove the streaming placeholder if it is still in the current log.
    pub fn remove_thinking_placeholder(&mut self, id: MessageId) -> Option<Message> {
        let log = self.current_log_mut();
        if log.get(id).is_some_and(|m| m.is_thinking) {
            log.remove(id)
        } else {
            None
        }
    }

    /// Turn the placeholder into the final assistant message.
    pub fn finalize_placeholder(&mut self, id: MessageId, content: String) {
        if let Some(msg) = self.current_log_mut().get_mut(id) {
            msg.content = content;
            msg.is_thinking = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn session() -> ChatSession {
        ChatSession::new(LogLimits::default())
    }

    #[test]
    fn new_session_offers_only_chat() {
        let s = session();
        assert_eq!(s.name, "Chat");
        assert_eq!(s.available_chains, vec![ChainType::Chat]);
        assert!(s.is_context_mode);
        assert!(!s.is_locked());
    }

    #[test]
    fn reselecting_same_chain_is_a_noop() {
        let mut s = session();
        s.select_chain(ChainType::Chat);
        let refreshed = s.context_requires_refresh();
        s.select_chain(ChainType::Chat);
        assert_eq!(s.context_requires_refresh(), refreshed);
    }

    #[test]
    fn selecting_specialized_chain_with_document_engages_lock() {
        let mut s = session();
        s.bind_document(PathBuf::from("/novels/chapter-one.md"));
        s.select_chain(ChainType::FictionWriting);
        let lock = s.lock().cloned();
        assert_eq!(
            lock,
            Some(ChainLock {
                file_path: PathBuf::from("/novels/chapter-one.md"),
                chain: ChainType::FictionWriting,
            })
        );
        assert_eq!(s.name, "chapter-one - Fiction");
    }

    #[test]
    fn selecting_chain_without_document_does_not_lock() {
        let mut s = session();
        s.select_chain(ChainType::OutlineWriter);
        assert!(!s.is_locked());
    }

    #[test]
    fn unlock_clears_document_and_restores_name() {
        let mut s = session();
        s.set_persona(Some("Editor".to_string()));
        s.bind_document(PathBuf::from("/novels/draft.md"));
        s.select_chain(ChainType::Proofreader);
        s.unlock();
        assert!(!s.is_locked());
        assert!(s.associated_document.is_none());
        assert_eq!(s.name, "Chat - Editor");
    }

    #[test]
    fn update_file_type_keeps_locked_chain_available() {
        let mut s = session();
        s.bind_document(PathBuf::from("/novels/draft.md"));
        s.select_chain(ChainType::FictionWriting);
        // Document retyped to an outline; the lock holds.
        s.update_file_type(Some("outline".to_string()));
        assert!(s.available_chains.contains(&ChainType::FictionWriting));
        assert_eq!(s.selected_chain(), Some(ChainType::FictionWriting));
        assert!(s.is_locked());

        // Losing the frontmatter entirely changes nothing either.
        s.update_file_type(None);
        assert!(s.available_chains.contains(&ChainType::FictionWriting));
        assert_eq!(s.selected_chain(), Some(ChainType::FictionWriting));
        assert!(s.is_locked());
    }

    #[test]
    fn update_file_type_resets_invalid_unlocked_selection() {
        let mut s = session();
        s.update_file_type(Some("fiction".to_string()));
        s.select_chain(ChainType::StoryAnalysis);
        s.update_file_type(Some("rules".to_string()));
        assert_eq!(s.selected_chain(), Some(ChainType::Chat));
    }

    #[test]
    fn model_switch_announces_in_current_log() {
        let mut s = session();
        s.select_model(ModelSelection::new("claude-sonnet", "anthropic"));
        let last = s.current_log().messages().last().cloned();
        assert!(last.is_some_and(|m| m.content == "Switched to claude-sonnet"));
        assert!(s.context_requires_refresh());
    }

    #[test]
    fn reselecting_same_model_does_not_announce() {
        let mut s = session();
        let model = ModelSelection::new("claude-sonnet", "anthropic");
        s.select_model(model.clone());
        let len = s.current_log().len();
        s.select_model(model);
        assert_eq!(s.current_log().len(), len);
    }

    #[test]
    fn mode_switch_routes_messages_to_separate_logs() {
        let mut s = session();
        s.add_message(Message::user("context question"));
        s.set_context_mode(false);
        s.add_message(Message::user("plain question"));
        assert_eq!(s.context_log().len(), 1);
        assert_eq!(s.chat_log().len(), 1);
        assert_eq!(s.current_log().messages()[0].content, "plain question");
    }

    #[test]
    fn closing_locked_document_releases_lock() {
        let mut s = session();
        s.bind_document(PathBuf::from("/novels/draft.md"));
        s.select_chain(ChainType::FictionWriting);
        s.document_closed(Path::new("/novels/draft.md"));
        assert!(!s.is_locked());
        assert!(s.associated_document.is_none());
        assert_eq!(s.name, "Chat");
    }

    #[test]
    fn closing_unrelated_document_changes_nothing() {
        let mut s = session();
        s.bind_document(PathBuf::from("/novels/draft.md"));
        s.document_closed(Path::new("/other/file.md"));
        assert_eq!(
            s.associated_document.as_deref(),
            Some(Path::new("/novels/draft.md"))
        );
    }

    #[test]
    fn thinking_placeholder_lifecycle() {
        let mut s = session();
        let placeholder = Message::thinking();
        let id = placeholder.id;
        s.add_message(placeholder);
        s.finalize_placeholder(id, "final answer".to_string());
        let msg = s.current_log().get(id).cloned();
        assert!(msg.as_ref().is_some_and(|m| !m.is_thinking));
        assert_eq!(msg.as_ref().map(|m| m.content.as_str()), Some("final answer"));
        // Finalized messages are no longer removable as placeholders.
        assert!(s.remove_thinking_placeholder(id).is_none());
    }
}
