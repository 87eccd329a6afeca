//! Scripted completion backend for testing.
//!
//! Returns queued responses in order and records every request, so tests can
//! drive the report pipeline and the dialogue without network access.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Semaphore;

use crate::error::TransportError;
use crate::llm::{CompletionBackend, CompletionRequest, CompletionResponse};

type Handler = dyn Fn(&CompletionRequest) -> Result<CompletionResponse, TransportError> + Send + Sync;

/// Completion backend with scripted answers.
///
/// Queued outcomes are consumed first. Once the queue is empty the handler
/// set with [`ScriptedBackend::respond_with`] answers; without one the call
/// fails with [`TransportError::Other`].
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    queue: Arc<RwLock<VecDeque<Result<CompletionResponse, TransportError>>>>,
    handler: Arc<RwLock<Option<Arc<Handler>>>>,
    captured: Arc<RwLock<Vec<CompletionRequest>>>,
    /// When set, each call waits for a permit before answering.
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose calls block until [`ScriptedBackend::release`] hands
    /// out permits. Requests are recorded before blocking.
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    /// Queue a text answer.
    pub fn reply(self, content: impl Into<String>) -> Self {
        self.queue
            .write()
            .push_back(Ok(CompletionResponse::text(content)));
        self
    }

    /// Queue an answer without text.
    pub fn reply_empty(self) -> Self {
        self.queue.write().push_back(Ok(CompletionResponse::empty()));
        self
    }

    /// Queue a transport failure.
    pub fn fail(self, error: TransportError) -> Self {
        self.queue.write().push_back(Err(error));
        self
    }

    /// Answer every call not covered by the queue.
    pub fn respond_with<F>(self, handler: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<CompletionResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        *self.handler.write() = Some(Arc::new(handler));
        self
    }

    /// Let `calls` gated calls proceed.
    pub fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    /// Every request seen so far, in arrival order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.captured.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.captured.read().len()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, TransportError> {
        self.captured.write().push(request.clone());

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| TransportError::Other(e.to_string()))?;
            permit.forget();
        }

        if let Some(outcome) = self.queue.write().pop_front() {
            return outcome;
        }

        let handler = self.handler.read().clone();
        match handler {
            Some(handler) => handler(request),
            None => Err(TransportError::Other(
                "no scripted response left".to_string(),
            )),
        }
    }
}
