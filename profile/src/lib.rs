//! PC-sample address translation and flat-profile aggregation
//!
//! Turns raw (code object, address) program-counter samples into
//! per-instruction, per-execution-mask counts. Kernel instruction streams
//! are decoded eagerly at code-object load ([`kernel::KernelObject`]),
//! delivered samples are attributed through the [`translate::AddressTranslator`]
//! seam into the [`flat::FlatProfile`], and [`report`] renders a
//! conservation-checked traversal of the result.

pub mod error;
pub mod flat;
pub mod kernel;
pub mod profiler;
pub mod report;
pub mod translate;

// Re-export the primary surface
pub use error::ProfileError;
pub use flat::{FlatProfile, SampleInstruction};
pub use kernel::{InstructionMix, KernelObject, KernelObjectMap};
pub use profiler::FlatProfiler;
pub use report::{dump_flat_profile, summarize, KernelSummary, ReportSummary};
pub use translate::{AddressTranslator, Instruction, InstructionKey};
