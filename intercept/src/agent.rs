//! Per-agent interception snapshot

use crate::error::InterceptError;
use crate::runtime::{AgentDescriptor, AgentKind, ExtApiTable};
use prism_shared::types::events::AgentHandle;

/// Immutable snapshot of one supported agent, built once at controller
/// initialization.
///
/// Carries the agent identity and the runtime entry points an intercepted
/// queue needs; lives for the controller's lifetime.
pub struct AgentCache {
    descriptor: AgentDescriptor,
    index: u32,
    ext_table: ExtApiTable,
}

impl AgentCache {
    /// Snapshot `descriptor` for interception.
    ///
    /// Fails when the agent cannot host intercepted queues. The failure is
    /// recoverable: the caller skips this agent and keeps the rest.
    pub fn new(
        descriptor: AgentDescriptor,
        index: u32,
        ext_table: ExtApiTable,
    ) -> Result<Self, InterceptError> {
        if descriptor.kind != AgentKind::Gpu {
            return Err(InterceptError::AgentUnsupported {
                handle: descriptor.handle,
                reason: "not a GPU agent".into(),
            });
        }
        if descriptor.max_queue_size == 0 || descriptor.max_queue_count == 0 {
            return Err(InterceptError::AgentUnsupported {
                handle: descriptor.handle,
                reason: "agent reports no queue capability".into(),
            });
        }

        Ok(Self {
            descriptor,
            index,
            ext_table,
        })
    }

    pub fn handle(&self) -> AgentHandle {
        self.descriptor.handle
    }

    pub fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    /// Position of this agent in the runtime's enumeration order
    pub fn index(&self) -> u32 {
        self.index
    }

    pub(crate) fn ext_table(&self) -> &ExtApiTable {
        &self.ext_table
    }
}
