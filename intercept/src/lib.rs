//! GPU command-queue interception
//!
//! Transparently wraps command queues created by the application so that
//! profiling services can observe kernel dispatches per compute agent. The
//! [`controller::QueueController`] owns the supported-agent set, the live
//! queue map, and the callback registry, and installs the queue
//! create/destroy trampolines into the runtime's dispatch table only when a
//! registered profiling context actually needs dispatches observed.

pub mod agent;
pub mod context;
pub mod controller;
pub mod error;
pub mod queue;
pub mod runtime;

// Re-export the primary surface
pub use agent::AgentCache;
pub use context::{BufferedTracerConfig, ContextRegistry, RegisteredContext, TracingDomain};
pub use controller::QueueController;
pub use error::InterceptError;
pub use queue::{CompletedCb, Queue, QueueCb};
pub use runtime::{
    AgentDescriptor, AgentEnumerator, AgentKind, CoreApiTable, ExtApiTable, QueueCreateRequest,
    QueueKind, StaticAgentEnumerator,
};
