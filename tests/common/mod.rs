//! Shared test helpers and mock backend factory.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use vellum::error::Result;
use vellum::prelude::*;

/// Response queue shared between a factory and the services it builds.
#[derive(Default)]
struct Script {
    responses: Mutex<Vec<String>>,
    stall_next: Mutex<bool>,
    contexts: Mutex<Vec<String>>,
}

impl Script {
    fn next_turn(&self) -> MockTurn {
        if std::mem::take(&mut *self.stall_next.lock().unwrap()) {
            return MockTurn::Stall;
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            MockTurn::Respond("Mock response".to_string())
        } else {
            MockTurn::Respond(responses.remove(0))
        }
    }
}

enum MockTurn {
    Respond(String),
    Stall,
}

/// A mock factory that returns canned responses and records every build.
#[derive(Default)]
pub struct MockFactory {
    script: Arc<Script>,
    specs: Mutex<Vec<ServiceSpec>>,
    fail_chains: Mutex<Vec<ChainType>>,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a response; services answer with queued texts in order, then
    /// fall back to `"Mock response"`.
    pub fn queue_response(&self, text: &str) {
        self.script.responses.lock().unwrap().push(text.to_string());
    }

    /// Make builds for `chain` fail with a transient transport error.
    pub fn fail_chain(&self, chain: ChainType) {
        self.fail_chains.lock().unwrap().push(chain);
    }

    /// Let previously failed chains build again.
    pub fn clear_failures(&self) {
        self.fail_chains.lock().unwrap().clear();
    }

    /// Make the next request hang until its cancellation token fires.
    pub fn stall_next_request(&self) {
        *self.script.stall_next.lock().unwrap() = true;
    }

    /// Every spec this factory was asked to build, in order.
    pub fn specs(&self) -> Vec<ServiceSpec> {
        self.specs.lock().unwrap().clone()
    }

    pub fn built_chains(&self) -> Vec<ChainType> {
        self.specs().into_iter().map(|s| s.chain).collect()
    }

    /// The `context` argument of every `process_request` call, in order.
    pub fn request_contexts(&self) -> Vec<String> {
        self.script.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServiceFactory for MockFactory {
    async fn build(&self, spec: ServiceSpec) -> Result<SharedService> {
        self.specs.lock().unwrap().push(spec.clone());
        if self.fail_chains.lock().unwrap().contains(&spec.chain) {
            return Err(VellumError::transient("mock backend unavailable"));
        }
        Ok(Arc::new(MockService {
            chain: spec.chain,
            context: Mutex::new(spec.document.map(|d| d.content).unwrap_or_default()),
            script: Arc::clone(&self.script),
        }))
    }
}

/// Canned-response service. Streams each response in five-character
/// prefixes before returning the full text.
pub struct MockService {
    chain: ChainType,
    context: Mutex<String>,
    script: Arc<Script>,
}

impl MockService {
    pub fn context(&self) -> String {
        self.context.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationService for MockService {
    fn chain(&self) -> ChainType {
        self.chain
    }

    async fn process_request(
        &self,
        context: &str,
        _input: &str,
        updates: ContentUpdates,
        cancel: CancellationToken,
    ) -> Result<String> {
        self.script.contexts.lock().unwrap().push(context.to_string());
        match self.script.next_turn() {
            MockTurn::Stall => {
                cancel.cancelled().await;
                Err(VellumError::Cancelled)
            }
            MockTurn::Respond(text) => {
                let mut sofar = String::new();
                for chunk in text.chars().collect::<Vec<_>>().chunks(5) {
                    sofar.extend(chunk.iter());
                    updates.send(sofar.clone());
                }
                Ok(text)
            }
        }
    }

    async fn update_context(&self, context: &str) -> Result<()> {
        *self.context.lock().unwrap() = context.to_string();
        Ok(())
    }
}
