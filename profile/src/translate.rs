//! Instruction records and the decode seam
//!
//! Decoding lives behind the [`AddressTranslator`] trait; the disassembler
//! and ELF loader that implement it are external collaborators.

use prism_shared::types::events::{CodeObjectId, VirtAddr};
use serde::{Deserialize, Serialize};

/// One decoded instruction at a fixed virtual address inside one
/// code-object load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub code_object_id: CodeObjectId,
    pub vaddr: VirtAddr,

    /// Encoded size in bytes; the decode cursor advances by this much
    pub size: u64,

    /// Disassembled text
    pub text: String,

    /// Source reference, e.g. `lib/kernels/reduce.cpp:41`
    pub comment: String,
}

impl Instruction {
    /// Identity of this instruction.
    ///
    /// Every code-object load gets a fresh id, so the same kernel loaded on
    /// two devices yields two distinct identities even when the decoded
    /// text is byte-identical. Counts are never merged across loads.
    pub fn key(&self) -> InstructionKey {
        InstructionKey {
            code_object_id: self.code_object_id,
            vaddr: self.vaddr,
        }
    }
}

/// Identity of one decoded instruction within one code-object load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstructionKey {
    pub code_object_id: CodeObjectId,
    pub vaddr: VirtAddr,
}

/// Decodes one instruction at one virtual address within one code object.
///
/// An address outside any known code object is an error, never an empty
/// instruction. Implementations are expected to cache decoded instructions;
/// the sample path calls [`AddressTranslator::get`] once per delivered PC
/// sample.
pub trait AddressTranslator: Send {
    fn get(&mut self, code_object_id: CodeObjectId, vaddr: VirtAddr)
        -> anyhow::Result<Instruction>;
}
