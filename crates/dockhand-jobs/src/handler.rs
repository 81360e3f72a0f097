//! Job handler trait and registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use dockhand_core::{Job, Result};

/// Context passed to every handler invocation.
///
/// The cancel token is a child of the queue's root token; handlers must
/// propagate it into every long-running operation they start.
pub struct JobContext {
    pub cancel: CancellationToken,
}

impl JobContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

/// Processes jobs of one type.
///
/// Returning `Err` hands the decision to the queue: retry with backoff
/// while attempts remain, terminal failure afterwards. Handlers that have
/// fully disposed of a problem (e.g. quarantined the document) return `Ok`.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job type this handler processes.
    fn job_type(&self) -> &'static str;

    /// Execute one delivery of a job.
    async fn execute(&self, ctx: &JobContext, job: &Job) -> Result<()>;
}

/// Mapping from job type to handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H: JobHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.job_type(), Arc::new(handler));
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(job_type).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoOpHandler;

    #[async_trait]
    impl JobHandler for NoOpHandler {
        fn job_type(&self) -> &'static str {
            "noop"
        }

        async fn execute(&self, _ctx: &JobContext, _job: &Job) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.is_empty());

        registry.register(NoOpHandler);
        assert!(registry.get("noop").is_some());
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_registry_replaces_same_type() {
        let mut registry = HandlerRegistry::new();
        registry.register(NoOpHandler);
        registry.register(NoOpHandler);
        assert!(registry.get("noop").is_some());
    }
}
