//! Registered profiling contexts
//!
//! Read-only view of the services active contexts requested. The controller
//! consumes it for exactly one decision: whether queue interception gets
//! installed at all.

use std::collections::HashSet;

/// Buffered-tracing domains a context can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TracingDomain {
    KernelDispatch,
    MemoryCopy,

    /// Runtime API call tracing; observed at the API shim, not at queues
    RuntimeApi,

    /// User marker ranges; never touch queues
    Marker,
}

/// Buffered-tracing service configuration of one context
#[derive(Debug, Clone, Default)]
pub struct BufferedTracerConfig {
    domains: HashSet<TracingDomain>,
}

impl BufferedTracerConfig {
    pub fn new(domains: impl IntoIterator<Item = TracingDomain>) -> Self {
        Self {
            domains: domains.into_iter().collect(),
        }
    }

    /// Whether `domain` was requested by this tracer
    pub fn domains(&self, domain: TracingDomain) -> bool {
        self.domains.contains(&domain)
    }
}

/// One registered profiling context and the services it requested
#[derive(Debug, Clone, Default)]
pub struct RegisteredContext {
    pub counter_collection: bool,
    pub buffered_tracer: Option<BufferedTracerConfig>,
}

impl RegisteredContext {
    /// Whether this context needs dispatches observed at the queue level.
    ///
    /// Exhaustive destructuring on purpose: adding a service field to this
    /// struct must not compile until its interception requirement has been
    /// decided here.
    pub fn requests_queue_interception(&self) -> bool {
        let Self {
            counter_collection,
            buffered_tracer,
        } = self;

        if *counter_collection {
            return true;
        }
        buffered_tracer.as_ref().is_some_and(|tracer| {
            tracer.domains(TracingDomain::KernelDispatch)
                || tracer.domains(TracingDomain::MemoryCopy)
        })
    }
}

/// Read-only enumeration of the active profiling contexts
#[derive(Debug, Clone, Default)]
pub struct ContextRegistry {
    contexts: Vec<RegisteredContext>,
}

impl ContextRegistry {
    pub fn new(contexts: Vec<RegisteredContext>) -> Self {
        Self { contexts }
    }

    pub fn registered_contexts(&self) -> &[RegisteredContext] {
        &self.contexts
    }
}
