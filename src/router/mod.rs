//! Service resolution: picks and builds the backend service for a session.
//!
//! The router is the only component that builds services. Resolution is
//! lazy (a cached, non-stale service is reused as-is) and always ends with
//! a usable service: failures to build a specialized chain degrade to the
//! plain chat service, and only a chat build failure surfaces to the
//! caller.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::chain::ChainType;
use crate::document::{detect_file_type, DocumentSource};
use crate::error::Result;
use crate::service::{DocumentContext, ServiceFactory, ServiceSpec, SharedService};
use crate::session::ChatSession;

/// Resolves the right backend service for a session's current state.
#[derive(Clone)]
pub struct ContextRouter {
    factory: Arc<dyn ServiceFactory>,
}

impl ContextRouter {
    pub fn new(factory: Arc<dyn ServiceFactory>) -> Self {
        Self { factory }
    }

    /// Resolve the service to handle the session's next request.
    ///
    /// Reuses the cached service unless the session flagged its context
    /// stale. Otherwise the old service is dropped first and a new one is
    /// built for, in priority order: plain chat when context mode is off,
    /// the locked chain, the selected chain for the current document, or
    /// plain chat when nothing more specific applies.
    pub async fn resolve(
        &self,
        session: &mut ChatSession,
        document: Option<&dyn DocumentSource>,
    ) -> Result<SharedService> {
        if !session.context_requires_refresh() {
            if let Some(service) = session.cached_service() {
                return Ok(Arc::clone(service));
            }
        }
        // Drop before building so a failed build leaves no stale handle.
        drop(session.take_service());

        if !session.is_context_mode {
            return self.build_chat(session).await;
        }

        if let Some(lock) = session.lock().cloned() {
            let content = match tokio::fs::read_to_string(&lock.file_path).await {
                Ok(content) => content,
                Err(error) => {
                    warn!(
                        path = %lock.file_path.display(),
                        %error,
                        "failed to read locked document, using empty context"
                    );
                    String::new()
                }
            };
            let spec = ServiceSpec {
                chain: lock.chain,
                model: session.model.clone(),
                persona: session.persona.clone(),
                document: Some(DocumentContext {
                    path: lock.file_path.clone(),
                    content,
                }),
            };
            return self.build_or_fall_back(session, spec).await;
        }

        let Some(document) = document else {
            return self.build_chat(session).await;
        };

        let content = document.current_text();
        let detected = detect_file_type(&content);
        session.update_file_type(detected);
        session.bind_document(document.path().to_path_buf());

        let chain = session.selected_chain().unwrap_or(ChainType::Chat);
        if chain == ChainType::Chat {
            return self.build_chat(session).await;
        }

        let path = document.path().to_path_buf();
        let spec = ServiceSpec {
            chain,
            model: session.model.clone(),
            persona: session.persona.clone(),
            document: Some(DocumentContext {
                path: path.clone(),
                content,
            }),
        };
        match self.factory.build(spec).await {
            Ok(service) => {
                if !session.is_locked() {
                    session.engage_lock(path, chain);
                }
                session.install_service(Arc::clone(&service));
                debug!(session = ?session.id, ?chain, "built specialized service");
                Ok(service)
            }
            Err(error) => {
                warn!(?chain, %error, "specialized chain unavailable, degrading to chat");
                self.build_chat(session).await
            }
        }
    }

    async fn build_or_fall_back(
        &self,
        session: &mut ChatSession,
        spec: ServiceSpec,
    ) -> Result<SharedService> {
        let chain = spec.chain;
        match self.factory.build(spec).await {
            Ok(service) => {
                session.install_service(Arc::clone(&service));
                Ok(service)
            }
            Err(error) => {
                warn!(?chain, %error, "specialized chain unavailable, degrading to chat");
                self.build_chat(session).await
            }
        }
    }

    /// Build the document-independent chat service. Failure here is final.
    async fn build_chat(&self, session: &mut ChatSession) -> Result<SharedService> {
        let spec = ServiceSpec::chat(session.model.clone(), session.persona.clone());
        let service = self.factory.build(spec).await?;
        session.install_service(Arc::clone(&service));
        Ok(service)
    }
}
