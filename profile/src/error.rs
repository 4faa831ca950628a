//! Structured error types for flat profiling

use prism_shared::types::events::{CodeObjectId, VirtAddr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfileError {
    /// The translator could not decode an instruction while building a
    /// kernel object; construction fails rather than retaining a silently
    /// truncated stream.
    #[error("failed to decode instruction at {vaddr:#x} in code object {code_object_id}: {cause:#}")]
    Decode {
        code_object_id: CodeObjectId,
        vaddr: VirtAddr,
        cause: anyhow::Error,
    },

    /// The translator returned a zero-size instruction; advancing by it
    /// would never terminate the decode loop.
    #[error("instruction decode stalled at {vaddr:#x} in code object {code_object_id}: zero-size instruction")]
    StalledDecode {
        code_object_id: CodeObjectId,
        vaddr: VirtAddr,
    },

    /// A delivered PC sample did not resolve to any known instruction.
    #[error("failed to translate PC sample at {vaddr:#x} in code object {code_object_id}: {cause:#}")]
    Translate {
        code_object_id: CodeObjectId,
        vaddr: VirtAddr,
        cause: anyhow::Error,
    },

    /// The same instruction identity was reached twice while reporting;
    /// code-object load/unload tracking is inconsistent.
    #[error("instruction at {vaddr:#x} in code object {code_object_id} counted twice during reporting")]
    DoubleCounted {
        code_object_id: CodeObjectId,
        vaddr: VirtAddr,
    },

    /// Per-mask counts disagree with an instruction's sample total.
    #[error("per-mask counts sum to {mask_sum} but the instruction total is {total} at {vaddr:#x} in code object {code_object_id}")]
    MaskSumMismatch {
        code_object_id: CodeObjectId,
        vaddr: VirtAddr,
        mask_sum: u64,
        total: u64,
    },

    /// The decoded grand total disagrees with the externally collected
    /// sample count. Indicates a sample-attribution bug, not a transient
    /// condition.
    #[error("flat profile decoded {decoded} samples but the sampler collected {collected}")]
    Conservation { decoded: u64, collected: u64 },
}
