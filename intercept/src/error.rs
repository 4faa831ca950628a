//! Structured error types for queue interception

use prism_shared::types::events::AgentHandle;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InterceptError {
    /// Queue creation was requested for an agent outside the supported set.
    /// Continuing would hand the application an un-intercepted queue while
    /// profiling services believe they observe it.
    #[error("agent {0:#x} is not in the supported set; refusing to create an un-intercepted queue")]
    AgentNotFound(AgentHandle),

    /// The agent cannot host intercepted queues; it is skipped, not fatal.
    #[error("agent {handle:#x} cannot be intercepted: {reason}")]
    AgentUnsupported { handle: AgentHandle, reason: String },

    /// The runtime refused to create the real queue for a supported agent.
    #[error("runtime queue creation failed on agent {handle:#x}: {cause:#}")]
    QueueCreateFailed {
        handle: AgentHandle,
        cause: anyhow::Error,
    },

    /// Agent enumeration failed, including descriptor-size skew.
    #[error("agent enumeration failed: {0:#}")]
    Enumeration(anyhow::Error),
}
