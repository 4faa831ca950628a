//! Intercepted command queue
//!
//! Wraps one real runtime queue and fans dispatch observations out to the
//! callback pairs registered on it.

use crate::agent::AgentCache;
use crate::error::InterceptError;
use crate::runtime::QueueCreateRequest;
use prism_shared::types::events::{ClientId, DispatchComplete, KernelDispatch, QueueId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Callback invoked when a kernel dispatch is observed on a queue
pub type QueueCb = Arc<dyn Fn(&Queue, &KernelDispatch) + Send + Sync>;

/// Callback invoked when a previously observed dispatch completes
pub type CompletedCb = Arc<dyn Fn(&Queue, &DispatchComplete) + Send + Sync>;

/// One intercepted command queue.
///
/// Owns the real runtime queue handle and the per-client callback
/// registrations. Exclusively owned by the controller's queue map and
/// destroyed when the application destroys the underlying queue.
pub struct Queue {
    agent: Arc<AgentCache>,
    handle: QueueId,
    callbacks: RwLock<HashMap<ClientId, (QueueCb, CompletedCb)>>,
}

impl Queue {
    /// Create the real runtime queue through the agent's intercept entry
    /// point and wrap it.
    ///
    /// Failure is fatal: the agent was claimed supported, yet the runtime
    /// refused the queue.
    pub fn new(agent: Arc<AgentCache>, request: QueueCreateRequest) -> Result<Self, InterceptError> {
        let handle = (agent.ext_table().queue_intercept_create)(request).map_err(|cause| {
            InterceptError::QueueCreateFailed {
                handle: agent.handle(),
                cause,
            }
        })?;

        debug!("created intercepted queue {:#x} on agent {:#x}", handle, agent.handle());

        Ok(Self {
            agent,
            handle,
            callbacks: RwLock::new(HashMap::new()),
        })
    }

    /// Runtime-assigned identity of the underlying queue
    pub fn id(&self) -> QueueId {
        self.handle
    }

    pub fn agent(&self) -> &AgentCache {
        &self.agent
    }

    /// Attach a callback pair. Re-registering the same client replaces its
    /// previous registration.
    pub fn register_callback(&self, id: ClientId, queue_cb: QueueCb, completed_cb: CompletedCb) {
        self.callbacks
            .write()
            .unwrap()
            .insert(id, (queue_cb, completed_cb));
    }

    /// Detach a client. No-op if the client was never attached.
    pub fn remove_callback(&self, id: ClientId) {
        self.callbacks.write().unwrap().remove(&id);
    }

    pub fn has_callback(&self, id: ClientId) -> bool {
        self.callbacks.read().unwrap().contains_key(&id)
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.read().unwrap().len()
    }

    /// Deliver a dispatch observation to every attached callback.
    ///
    /// The registrations are snapshotted first so callbacks run without the
    /// registration lock held.
    pub fn process_dispatch(&self, dispatch: &KernelDispatch) {
        let snapshot: Vec<QueueCb> = self
            .callbacks
            .read()
            .unwrap()
            .values()
            .map(|(queue_cb, _)| queue_cb.clone())
            .collect();

        for callback in snapshot {
            callback(self, dispatch);
        }
    }

    /// Deliver a completion record to every attached callback.
    pub fn process_completion(&self, completion: &DispatchComplete) {
        let snapshot: Vec<CompletedCb> = self
            .callbacks
            .read()
            .unwrap()
            .values()
            .map(|(_, completed_cb)| completed_cb.clone())
            .collect();

        for callback in snapshot {
            callback(self, completion);
        }
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        if let Err(err) = (self.agent.ext_table().queue_intercept_destroy)(self.handle) {
            warn!("failed to release runtime queue {:#x}: {:#}", self.handle, err);
        }
    }
}
