//! Event type definitions for GPU profiling data
//!
//! These types represent the observations produced by the intercepted
//! queues and the PC-sampling hardware path, before aggregation.

use serde::{Deserialize, Serialize};

/// Timestamp in nanoseconds
pub type Timestamp = u64;

/// Opaque handle identifying a compute agent (device) to the runtime
pub type AgentHandle = u64;

/// Runtime-assigned identity of a command queue
pub type QueueId = u64;

/// Identity of one registered callback pair; monotonically increasing,
/// never reused, never zero
pub type ClientId = u64;

/// Identity of one code-object load
pub type CodeObjectId = u64;

/// Virtual address inside a loaded code object
pub type VirtAddr = u64;

/// Set of active lanes executing an instruction when it was sampled
pub type ExecMask = u64;

/// Identity of one kernel dispatch
pub type DispatchId = u64;

/// One hardware program-counter sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcSample {
    /// Code object the sampled address belongs to
    pub code_object_id: CodeObjectId,

    /// Sampled program counter
    pub vaddr: VirtAddr,

    /// Execution mask captured with the sample
    pub exec_mask: ExecMask,

    /// Timestamp when the sample was taken
    pub timestamp: Timestamp,

    /// Dispatch the sampled wave belonged to
    pub dispatch_id: DispatchId,
}

/// A kernel dispatch observed on an intercepted queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelDispatch {
    pub dispatch_id: DispatchId,
    pub queue_id: QueueId,
    pub agent: AgentHandle,

    /// Kernel code handle from the dispatch packet
    pub kernel_object: u64,

    pub timestamp: Timestamp,
}

/// Completion-side record for a previously observed dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchComplete {
    pub dispatch_id: DispatchId,
    pub queue_id: QueueId,
    pub timestamp: Timestamp,
}
