//! Modeled runtime ABI: dispatch tables and agent enumeration
//!
//! The GPU compute runtime is an external collaborator. This module models
//! the slice of its ABI the interception layer touches: the dispatch table
//! entries applications call to create and destroy queues, the extension
//! entry points used to build intercepted queues, and the callback-based
//! agent enumeration API with its struct-size skew guard.

use anyhow::Result;
use prism_shared::types::events::{AgentHandle, QueueId};
use std::sync::Arc;

/// Application-facing entry that creates a command queue
pub type QueueCreateFn = Arc<dyn Fn(QueueCreateRequest) -> Result<QueueId> + Send + Sync>;

/// Application-facing entry that destroys a command queue
pub type QueueDestroyFn = Arc<dyn Fn(QueueId) -> Result<()> + Send + Sync>;

/// Extension entry creating the real runtime queue with interception support
pub type QueueInterceptCreateFn = Arc<dyn Fn(QueueCreateRequest) -> Result<QueueId> + Send + Sync>;

/// Extension entry releasing a queue created through the intercept entry
pub type QueueInterceptDestroyFn = Arc<dyn Fn(QueueId) -> Result<()> + Send + Sync>;

/// Core runtime dispatch table.
///
/// The controller overwrites exactly two entries (`queue_create`,
/// `queue_destroy`) when interception is enabled and leaves the table
/// untouched otherwise.
#[derive(Clone)]
pub struct CoreApiTable {
    pub queue_create: QueueCreateFn,
    pub queue_destroy: QueueDestroyFn,
}

/// Extension dispatch table consumed when constructing intercepted queues.
#[derive(Clone)]
pub struct ExtApiTable {
    pub queue_intercept_create: QueueInterceptCreateFn,
    pub queue_intercept_destroy: QueueInterceptDestroyFn,
}

/// Producer discipline of a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    MultiProducer,
    SingleProducer,
}

/// Arguments of a queue-create call, as issued by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueCreateRequest {
    pub agent: AgentHandle,

    /// Requested ring size in packets
    pub size: u32,

    pub kind: QueueKind,
    pub private_segment_size: u32,
    pub group_segment_size: u32,
}

/// Device class of an agent
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Cpu = 0,
    Gpu = 1,
}

/// Per-agent record produced by the runtime's enumeration API.
///
/// This struct crosses the runtime ABI boundary, hence the fixed layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentDescriptor {
    pub handle: AgentHandle,
    pub kind: AgentKind,

    /// Topology node the agent is attached to
    pub node_id: u32,

    /// Largest queue ring the agent supports, in packets
    pub max_queue_size: u32,

    /// Number of hardware queues the agent can host
    pub max_queue_count: u32,
}

/// Descriptor size this crate was compiled against. Enumeration rejects any
/// other size instead of reinterpreting memory across a skewed ABI.
pub const AGENT_DESCRIPTOR_SIZE: usize = std::mem::size_of::<AgentDescriptor>();

// Layout guard: adding a field to AgentDescriptor must not compile until
// every consumer of the new field exists and this size is bumped with it.
const _: () = assert!(AGENT_DESCRIPTOR_SIZE == 24);

/// Callback-based agent enumeration, as exposed by the runtime.
pub trait AgentEnumerator: Send + Sync {
    /// Invoke `visit` exactly once with the full agent list.
    ///
    /// `expected_descriptor_size` is the per-agent struct size the caller
    /// was compiled against; enumeration fails on a mismatch (runtime
    /// version skew).
    fn enumerate(
        &self,
        expected_descriptor_size: usize,
        visit: &mut dyn FnMut(&[AgentDescriptor]),
    ) -> Result<()>;
}

/// Enumerator backed by a fixed descriptor list.
pub struct StaticAgentEnumerator {
    agents: Vec<AgentDescriptor>,
}

impl StaticAgentEnumerator {
    pub fn new(agents: Vec<AgentDescriptor>) -> Self {
        Self { agents }
    }
}

impl AgentEnumerator for StaticAgentEnumerator {
    fn enumerate(
        &self,
        expected_descriptor_size: usize,
        visit: &mut dyn FnMut(&[AgentDescriptor]),
    ) -> Result<()> {
        if expected_descriptor_size != AGENT_DESCRIPTOR_SIZE {
            anyhow::bail!(
                "agent descriptor size mismatch: caller expects {} bytes, runtime provides {}",
                expected_descriptor_size,
                AGENT_DESCRIPTOR_SIZE
            );
        }
        visit(&self.agents);
        Ok(())
    }
}
