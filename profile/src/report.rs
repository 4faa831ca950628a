//! Flat-profile reporting
//!
//! A pure read traversal: (kernel objects, flat profile, collected total)
//! to text, enforcing the sample-conservation law. Aggregation state is
//! never mutated here.

use crate::error::ProfileError;
use crate::flat::FlatProfile;
use crate::kernel::{InstructionMix, KernelObjectMap};
use crate::translate::InstructionKey;
use prism_shared::types::events::CodeObjectId;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write;

/// Render the flat profile as a human-readable, conservation-checked
/// report.
///
/// For each kernel object (map order), each instruction is listed in
/// address order with its sample count and execution-mask breakdown. The
/// running grand total must match `collected_total`, the sample count
/// reported by the sampling subsystem; a mismatch — like an instruction
/// reached twice across kernel objects — is a hard failure, not a warning.
///
/// Callers must quiesce sample delivery first, or the totals are only a
/// lower bound and the conservation check is meaningless.
pub fn dump_flat_profile(
    kernel_objects: &KernelObjectMap,
    flat_profile: &FlatProfile,
    collected_total: u64,
) -> Result<String, ProfileError> {
    let mut out = String::new();
    let mut visited: HashSet<InstructionKey> = HashSet::new();
    let mut decoded_total: u64 = 0;

    for kernel_object in kernel_objects.iter() {
        let _ = writeln!(out, "====================================");
        let _ = writeln!(
            out,
            "kernel {} at {:#x} from code object {}",
            kernel_object.kernel_name(),
            kernel_object.begin_address(),
            kernel_object.code_object_id()
        );
        let mix = kernel_object.instruction_mix();
        let _ = writeln!(
            out,
            "  {} scalar, {} vector, {} waitcnt, {} other",
            mix.scalar, mix.vector, mix.waitcnt, mix.other
        );

        for instruction in kernel_object.instructions() {
            let Some(sample) = flat_profile.get_sample_instruction(instruction) else {
                let _ = writeln!(
                    out,
                    "\t{}\t{}\tsamples: 0",
                    instruction.text, instruction.comment
                );
                continue;
            };

            let key = instruction.key();
            // Each sampled instruction must be counted exactly once across
            // the whole map; a revisit means load/unload tracking broke.
            if !visited.insert(key) {
                return Err(ProfileError::DoubleCounted {
                    code_object_id: key.code_object_id,
                    vaddr: key.vaddr,
                });
            }
            decoded_total += sample.sample_count();

            let mask_sum: u64 = sample.exec_mask_counts().values().sum();
            if mask_sum != sample.sample_count() {
                return Err(ProfileError::MaskSumMismatch {
                    code_object_id: key.code_object_id,
                    vaddr: key.vaddr,
                    mask_sum,
                    total: sample.sample_count(),
                });
            }

            if sample.exec_mask_counts().len() == 1 {
                let (mask, count) = sample
                    .exec_mask_counts()
                    .iter()
                    .next()
                    .map(|(mask, count)| (*mask, *count))
                    .unwrap_or_default();
                let _ = writeln!(
                    out,
                    "\t{}\t{}\tsamples: {}, exec_mask: {:#x}",
                    instruction.text, instruction.comment, count, mask
                );
            } else {
                let _ = writeln!(
                    out,
                    "\t{}\t{}\tsamples: {}",
                    instruction.text,
                    instruction.comment,
                    sample.sample_count()
                );
                let mut masks: Vec<(u64, u64)> = sample
                    .exec_mask_counts()
                    .iter()
                    .map(|(mask, count)| (*mask, *count))
                    .collect();
                masks.sort_unstable();
                for (mask, count) in masks {
                    let _ = writeln!(out, "\t\texec_mask: {mask:#x}\tsamples: {count}");
                }
            }
        }
        let _ = writeln!(out, "====================================");
    }

    let _ = writeln!(out, "decoded samples:   {decoded_total}");
    let _ = writeln!(out, "collected samples: {collected_total}");

    if decoded_total != collected_total {
        return Err(ProfileError::Conservation {
            decoded: decoded_total,
            collected: collected_total,
        });
    }

    Ok(out)
}

/// Serializable per-kernel rollup of the flat profile
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub kernels: Vec<KernelSummary>,
    pub decoded_samples: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct KernelSummary {
    pub kernel_name: String,
    pub code_object_id: CodeObjectId,
    pub instructions: usize,
    pub samples: u64,
    pub mix: InstructionMix,
}

/// Roll the flat profile up per kernel. Unlike [`dump_flat_profile`] this
/// performs no conservation checks; it is a plain aggregation view.
pub fn summarize(kernel_objects: &KernelObjectMap, flat_profile: &FlatProfile) -> ReportSummary {
    let mut kernels = Vec::new();
    let mut decoded_samples = 0;

    for kernel_object in kernel_objects.iter() {
        let samples: u64 = kernel_object
            .instructions()
            .iter()
            .filter_map(|instruction| flat_profile.get_sample_instruction(instruction))
            .map(|sample| sample.sample_count())
            .sum();
        decoded_samples += samples;

        kernels.push(KernelSummary {
            kernel_name: kernel_object.kernel_name().to_string(),
            code_object_id: kernel_object.code_object_id(),
            instructions: kernel_object.instructions().len(),
            samples,
            mix: kernel_object.instruction_mix(),
        });
    }

    ReportSummary {
        kernels,
        decoded_samples,
    }
}
