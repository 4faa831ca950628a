//! Flat-profiler context object
//!
//! Owns the translator, the kernel-object map, and the flat profile behind
//! one coarse lock. Kernel decoding and sample recording interleave
//! unpredictably with delivery threads; code-object loads are rare relative
//! to sample volume, so holding the lock across a decode loop is the
//! accepted tradeoff.

use crate::error::ProfileError;
use crate::flat::FlatProfile;
use crate::kernel::{KernelObject, KernelObjectMap};
use crate::report;
use crate::translate::AddressTranslator;
use prism_shared::types::events::{CodeObjectId, PcSample, VirtAddr};
use std::sync::Mutex;
use tracing::debug;

struct ProfilerState {
    translator: Box<dyn AddressTranslator>,
    kernel_objects: KernelObjectMap,
    flat_profile: FlatProfile,
}

/// Aggregates PC samples into a flat per-instruction profile.
///
/// Construct one per profiling session and share it by reference with the
/// code-object load path and the sample-delivery path. Tear it down
/// explicitly with [`FlatProfiler::into_parts`] instead of relying on
/// global destruction order.
pub struct FlatProfiler {
    inner: Mutex<ProfilerState>,
}

impl FlatProfiler {
    pub fn new(translator: Box<dyn AddressTranslator>) -> Self {
        Self {
            inner: Mutex::new(ProfilerState {
                translator,
                kernel_objects: KernelObjectMap::new(),
                flat_profile: FlatProfile::new(),
            }),
        }
    }

    /// Decode and retain a newly loaded kernel symbol instance.
    pub fn load_kernel(
        &self,
        code_object_id: CodeObjectId,
        kernel_name: &str,
        begin_address: VirtAddr,
        end_address: VirtAddr,
    ) -> Result<(), ProfileError> {
        let mut state = self.inner.lock().unwrap();
        let object = KernelObject::decode(
            state.translator.as_mut(),
            code_object_id,
            kernel_name,
            begin_address,
            end_address,
        )?;
        state.kernel_objects.insert(object);
        Ok(())
    }

    /// Attribute one delivered PC sample to its decoded instruction.
    ///
    /// A sample whose address resolves to no known code object is an
    /// attribution failure and propagates; it is never silently dropped,
    /// since dropped samples would break conservation at report time.
    pub fn record_sample(&self, sample: &PcSample) -> Result<(), ProfileError> {
        let mut state = self.inner.lock().unwrap();
        let instruction = state
            .translator
            .get(sample.code_object_id, sample.vaddr)
            .map_err(|cause| ProfileError::Translate {
                code_object_id: sample.code_object_id,
                vaddr: sample.vaddr,
                cause,
            })?;
        debug!(
            "sample at {:#x} in code object {} with exec mask {:#x}",
            sample.vaddr, sample.code_object_id, sample.exec_mask
        );
        state.flat_profile.record_sample(&instruction, sample.exec_mask);
        Ok(())
    }

    /// Render the conservation-checked report against the sampler's
    /// collected total. Quiesce sample delivery first.
    pub fn dump(&self, collected_total: u64) -> Result<String, ProfileError> {
        let state = self.inner.lock().unwrap();
        report::dump_flat_profile(&state.kernel_objects, &state.flat_profile, collected_total)
    }

    /// Number of kernel objects decoded so far
    pub fn kernel_object_count(&self) -> usize {
        self.inner.lock().unwrap().kernel_objects.len()
    }

    /// Explicit teardown, recovering the aggregation state
    pub fn into_parts(self) -> (KernelObjectMap, FlatProfile) {
        let state = self.inner.into_inner().unwrap();
        (state.kernel_objects, state.flat_profile)
    }
}
