//! Kernel objects: the decoded instruction stream of each loaded kernel
//! symbol instance

use crate::error::ProfileError;
use crate::translate::{AddressTranslator, Instruction};
use prism_shared::types::events::{CodeObjectId, VirtAddr};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

/// One kernel symbol instance from one code-object load, with its full
/// instruction stream decoded eagerly at construction. Immutable afterwards.
pub struct KernelObject {
    code_object_id: CodeObjectId,
    kernel_name: String,
    begin_address: VirtAddr,
    end_address: VirtAddr,
    instructions: Vec<Instruction>,
}

impl KernelObject {
    /// Decode the instruction stream covering `[begin_address, end_address)`.
    ///
    /// The cursor starts at `begin_address` and advances by each decoded
    /// instruction's size. A translator failure fails construction — a
    /// partial stream would silently drop samples later. A zero-size
    /// instruction also fails construction, since the cursor would never
    /// advance past it.
    pub fn decode(
        translator: &mut dyn AddressTranslator,
        code_object_id: CodeObjectId,
        kernel_name: impl Into<String>,
        begin_address: VirtAddr,
        end_address: VirtAddr,
    ) -> Result<Self, ProfileError> {
        let kernel_name = kernel_name.into();
        let mut instructions = Vec::new();
        let mut vaddr = begin_address;

        while vaddr < end_address {
            let instruction =
                translator
                    .get(code_object_id, vaddr)
                    .map_err(|cause| ProfileError::Decode {
                        code_object_id,
                        vaddr,
                        cause,
                    })?;
            if instruction.size == 0 {
                return Err(ProfileError::StalledDecode {
                    code_object_id,
                    vaddr,
                });
            }
            vaddr += instruction.size;
            instructions.push(instruction);
        }

        debug!(
            "decoded {} instructions for kernel {} in code object {}",
            instructions.len(),
            kernel_name,
            code_object_id
        );

        Ok(Self {
            code_object_id,
            kernel_name,
            begin_address,
            end_address,
            instructions,
        })
    }

    pub fn code_object_id(&self) -> CodeObjectId {
        self.code_object_id
    }

    pub fn kernel_name(&self) -> &str {
        &self.kernel_name
    }

    pub fn begin_address(&self) -> VirtAddr {
        self.begin_address
    }

    pub fn end_address(&self) -> VirtAddr {
        self.end_address
    }

    /// Decoded instructions in address order
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Scalar/vector/waitcnt breakdown of the decoded stream
    pub fn instruction_mix(&self) -> InstructionMix {
        let mut mix = InstructionMix::default();
        for instruction in &self.instructions {
            if instruction.text.starts_with("v_") {
                mix.vector += 1;
            } else if instruction.text.starts_with("s_waitcnt") {
                mix.waitcnt += 1;
            } else if instruction.text.starts_with("s_") {
                mix.scalar += 1;
            } else {
                mix.other += 1;
            }
        }
        mix
    }

    /// Source files referenced by the instruction comments
    pub fn source_references(&self) -> BTreeSet<String> {
        self.instructions
            .iter()
            .filter_map(|instruction| source_file(&instruction.comment))
            .map(str::to_string)
            .collect()
    }
}

/// Instruction-category counts for one kernel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InstructionMix {
    pub scalar: u64,
    pub vector: u64,
    pub waitcnt: u64,
    pub other: u64,
}

impl InstructionMix {
    pub fn total(&self) -> u64 {
        self.scalar + self.vector + self.waitcnt + self.other
    }
}

/// Strip the directory and trailing `:line` from a `path/file.ext:line`
/// comment, keeping the file name.
fn source_file(comment: &str) -> Option<&str> {
    if comment.is_empty() {
        return None;
    }
    let base = comment.rsplit('/').next().unwrap_or(comment);
    let file = base
        .rsplit_once(':')
        .map(|(file, _)| file)
        .unwrap_or(base);
    (!file.is_empty()).then_some(file)
}

/// Every kernel object ever created.
///
/// Append-only: entries survive code-object unload, so stale loads keep
/// their instruction identities and counts for the whole session.
#[derive(Default)]
pub struct KernelObjectMap {
    objects: Vec<KernelObject>,
}

impl KernelObjectMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, object: KernelObject) {
        self.objects.push(object);
    }

    /// Lazy, restartable traversal in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &KernelObject> {
        self.objects.iter()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
