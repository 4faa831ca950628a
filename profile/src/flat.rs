//! Flat-profile aggregation
//!
//! Per-instruction, per-execution-mask sample counts, independent of time.

use crate::translate::{Instruction, InstructionKey};
use prism_shared::types::events::ExecMask;
use serde::Serialize;
use std::collections::HashMap;

/// Sample aggregate for one decoded instruction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SampleInstruction {
    sample_count: u64,
    exec_mask_counts: HashMap<ExecMask, u64>,
}

impl SampleInstruction {
    /// Total samples attributed to the instruction
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Observed execution masks and how many samples carried each
    pub fn exec_mask_counts(&self) -> &HashMap<ExecMask, u64> {
        &self.exec_mask_counts
    }

    fn record(&mut self, exec_mask: ExecMask) {
        self.sample_count += 1;
        *self.exec_mask_counts.entry(exec_mask).or_insert(0) += 1;
    }
}

/// Mapping from instruction identity to its sample aggregate; the single
/// source of truth for how many samples landed on each decoded instruction.
///
/// Entries are created lazily on first observation and never removed during
/// a profiling session.
#[derive(Debug, Default)]
pub struct FlatProfile {
    samples: HashMap<InstructionKey, SampleInstruction>,
}

impl FlatProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one sample against `instruction` under `exec_mask`
    pub fn record_sample(&mut self, instruction: &Instruction, exec_mask: ExecMask) {
        self.samples
            .entry(instruction.key())
            .or_default()
            .record(exec_mask);
    }

    /// Aggregate for `instruction`; `None` means no sample ever landed there
    pub fn get_sample_instruction(&self, instruction: &Instruction) -> Option<&SampleInstruction> {
        self.samples.get(&instruction.key())
    }

    /// Number of distinct instructions with at least one sample
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruction(code_object_id: u64, vaddr: u64) -> Instruction {
        Instruction {
            code_object_id,
            vaddr,
            size: 4,
            text: "v_mov_b32 v0, v1".to_string(),
            comment: String::new(),
        }
    }

    #[test]
    fn test_single_mask_counts() {
        let mut profile = FlatProfile::new();
        let inst = instruction(1, 0x1000);

        for _ in 0..5 {
            profile.record_sample(&inst, 0xF);
        }

        let sample = profile.get_sample_instruction(&inst).unwrap();
        assert_eq!(sample.sample_count(), 5);
        assert_eq!(sample.exec_mask_counts().len(), 1);
        assert_eq!(sample.exec_mask_counts()[&0xF], 5);
    }

    #[test]
    fn test_multi_mask_counts_sum_to_total() {
        let mut profile = FlatProfile::new();
        let inst = instruction(1, 0x1000);

        for _ in 0..3 {
            profile.record_sample(&inst, 0xF);
        }
        for _ in 0..2 {
            profile.record_sample(&inst, 0x3);
        }

        let sample = profile.get_sample_instruction(&inst).unwrap();
        assert_eq!(sample.sample_count(), 5);
        assert_eq!(sample.exec_mask_counts()[&0xF], 3);
        assert_eq!(sample.exec_mask_counts()[&0x3], 2);
        assert_eq!(sample.exec_mask_counts().values().sum::<u64>(), 5);
    }

    #[test]
    fn test_identical_text_from_two_loads_is_never_merged() {
        let mut profile = FlatProfile::new();
        // The same kernel loaded on two devices: same text and address,
        // different code object ids.
        let device_a = instruction(1, 0x1000);
        let device_b = instruction(2, 0x1000);

        profile.record_sample(&device_a, 0xF);
        profile.record_sample(&device_a, 0xF);
        profile.record_sample(&device_b, 0xF);

        assert_eq!(profile.len(), 2);
        assert_eq!(
            profile.get_sample_instruction(&device_a).unwrap().sample_count(),
            2
        );
        assert_eq!(
            profile.get_sample_instruction(&device_b).unwrap().sample_count(),
            1
        );
    }

    #[test]
    fn test_unsampled_instruction_is_absent() {
        let profile = FlatProfile::new();
        assert!(profile
            .get_sample_instruction(&instruction(1, 0x1000))
            .is_none());
        assert!(profile.is_empty());
    }
}
