//! The backend conversation-service seam.
//!
//! Concrete chain implementations (the code that actually talks to a model
//! provider) live outside this crate. Routing only needs the two traits
//! here: a service that can process one request at a time while streaming
//! partial content, and a factory that builds one for a given chain.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::chain::ChainType;
use crate::error::Result;
use crate::types::ModelSelection;

/// Shared handle to a live backend service. Dropping the last handle is
/// disposal; a session holds at most one.
pub type SharedService = Arc<dyn ConversationService>;

/// Sender half for partial-content events emitted during a request.
///
/// Zero or more partials may be sent before completion. Sends never block
/// and never fail the request; a closed receiver just discards updates.
#[derive(Debug, Clone)]
pub struct ContentUpdates {
    tx: mpsc::UnboundedSender<String>,
}

impl ContentUpdates {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A sender whose updates go nowhere.
    pub fn discard() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }

    pub fn send(&self, partial: impl Into<String>) {
        let _ = self.tx.send(partial.into());
    }
}

/// A live backend conversation strategy.
#[async_trait]
pub trait ConversationService: Send + Sync {
    /// The chain this service implements.
    fn chain(&self) -> ChainType;

    /// Process one user request against the given context, streaming
    /// partials through `updates` and returning the final response text.
    ///
    /// Implementations must observe `cancel` and return
    /// [`VellumError::Cancelled`](crate::VellumError::Cancelled) promptly
    /// once it fires.
    async fn process_request(
        &self,
        context: &str,
        input: &str,
        updates: ContentUpdates,
        cancel: CancellationToken,
    ) -> Result<String>;

    /// Replace the document context backing this service.
    async fn update_context(&self, context: &str) -> Result<()>;
}

/// Document content handed to a chain-specific service at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentContext {
    pub path: PathBuf,
    pub content: String,
}

/// Everything a factory needs to build one service.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    pub chain: ChainType,
    pub model: Option<ModelSelection>,
    pub persona: Option<String>,
    /// Present for chain-specific services; always absent for `Chat`,
    /// which is intentionally isolated from file context.
    pub document: Option<DocumentContext>,
}

impl ServiceSpec {
    /// Spec for the document-independent chat service.
    pub fn chat(model: Option<ModelSelection>, persona: Option<String>) -> Self {
        Self {
            chain: ChainType::Chat,
            model,
            persona,
            document: None,
        }
    }
}

/// Builds services for chain types. The one explicit factory replaces any
/// per-chain singletons; routing owns a single `Arc<dyn ServiceFactory>`.
#[async_trait]
pub trait ServiceFactory: Send + Sync {
    async fn build(&self, spec: ServiceSpec) -> Result<SharedService>;
}
