//! Queue interception controller
//!
//! Single authority for which queues exist, which agents are supported, and
//! which callbacks observe which queues. Decides at initialization whether
//! interception is installed at all.

use crate::agent::AgentCache;
use crate::context::ContextRegistry;
use crate::error::InterceptError;
use crate::queue::{CompletedCb, Queue, QueueCb};
use crate::runtime::{
    AgentEnumerator, AgentKind, CoreApiTable, ExtApiTable, QueueCreateRequest,
    AGENT_DESCRIPTOR_SIZE,
};
use prism_shared::types::events::{AgentHandle, ClientId, DispatchComplete, KernelDispatch, QueueId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info};

/// Agent identity plus the callback pair stored under one client id
struct CallbackEntry {
    agent: AgentHandle,
    queue_cb: QueueCb,
    completed_cb: CompletedCb,
}

/// Tracks and manages intercepted queues.
///
/// Constructed once per process via [`QueueController::init`], after the
/// runtime's tables are available and before the application creates any
/// queue. All collaborators hold it behind an `Arc`.
pub struct QueueController {
    // Entry points captured before any trampoline was installed.
    core_table: CoreApiTable,
    ext_table: ExtApiTable,

    // Immutable after init; keyed by enumeration index.
    supported_agents: HashMap<u32, Arc<AgentCache>>,

    // Lock order: `callbacks` before `queues`, for every operation that
    // touches both. This ordering is what guarantees a callback registered
    // for an agent reaches a queue exactly once, via replay or via direct
    // attach.
    callbacks: RwLock<HashMap<ClientId, CallbackEntry>>,
    queues: RwLock<HashMap<QueueId, Arc<Queue>>>,

    // Client ids start at 1 and are never reused; 0 is never handed out.
    next_client_id: AtomicU64,
}

impl QueueController {
    /// Initialize interception.
    ///
    /// Enumerates the runtime's agents and builds an [`AgentCache`] per
    /// GPU-type agent; a cache that fails to build is logged and skipped so
    /// the remaining agents still get intercepted. If any registered
    /// context requests counter collection or buffered tracing of kernel
    /// dispatches or memory copies, the queue create/destroy trampolines
    /// are installed into `core_table`; otherwise the table is left
    /// untouched and interception costs nothing.
    pub fn init(
        core_table: &mut CoreApiTable,
        ext_table: ExtApiTable,
        agents: &dyn AgentEnumerator,
        contexts: &ContextRegistry,
    ) -> Result<Arc<Self>, InterceptError> {
        let mut supported = HashMap::new();
        agents
            .enumerate(AGENT_DESCRIPTOR_SIZE, &mut |descriptors| {
                for (index, descriptor) in descriptors.iter().enumerate() {
                    if descriptor.kind != AgentKind::Gpu {
                        continue;
                    }
                    match AgentCache::new(*descriptor, index as u32, ext_table.clone()) {
                        Ok(cache) => {
                            supported.insert(index as u32, Arc::new(cache));
                        }
                        Err(err) => {
                            error!(
                                "GPU agent construction failed (queue will not be intercepted): {:#x} ({})",
                                descriptor.handle, err
                            );
                        }
                    }
                }
            })
            .map_err(InterceptError::Enumeration)?;

        let controller = Arc::new(Self {
            core_table: core_table.clone(),
            ext_table,
            supported_agents: supported,
            callbacks: RwLock::new(HashMap::new()),
            queues: RwLock::new(HashMap::new()),
            next_client_id: AtomicU64::new(1),
        });

        let enable_intercepter = contexts
            .registered_contexts()
            .iter()
            .any(|context| context.requests_queue_interception());

        if enable_intercepter {
            info!(
                "queue interception enabled for {} supported agent(s)",
                controller.supported_agents.len()
            );

            let create = controller.clone();
            core_table.queue_create = Arc::new(move |request| Ok(create.create_queue(request)?));

            let destroy = controller.clone();
            core_table.queue_destroy = Arc::new(move |id| {
                destroy.destroy_queue(id);
                Ok(())
            });
        }

        Ok(controller)
    }

    /// Body of the create-queue trampoline: wrap the queue the application
    /// asked for.
    ///
    /// An agent outside the supported set is fatal — continuing would hand
    /// the application an un-intercepted queue.
    pub fn create_queue(&self, request: QueueCreateRequest) -> Result<QueueId, InterceptError> {
        let Some(agent) = self
            .supported_agents
            .values()
            .find(|cache| cache.handle() == request.agent)
        else {
            error!("could not find agent {:#x}", request.agent);
            return Err(InterceptError::AgentNotFound(request.agent));
        };

        let queue = Queue::new(agent.clone(), request)?;
        let id = queue.id();
        self.add_queue(id, queue);
        Ok(id)
    }

    /// Take ownership of a queue created by the application and replay
    /// every stored registration for its agent onto it.
    ///
    /// The registry lock is held across the insert, so a queue is never
    /// visible in the map without every callback registered for its agent
    /// at insertion time already attached.
    pub fn add_queue(&self, id: QueueId, queue: Queue) {
        // Lock order: callback registry, then queue map.
        let callbacks = self.callbacks.read().unwrap();
        let mut queues = self.queues.write().unwrap();

        let queue = Arc::new(queue);
        let agent = queue.agent().handle();
        for (client_id, entry) in callbacks.iter() {
            if entry.agent == agent {
                queue.register_callback(
                    *client_id,
                    entry.queue_cb.clone(),
                    entry.completed_cb.clone(),
                );
            }
        }
        queues.insert(id, queue);

        debug!("tracking queue {:#x} on agent {:#x}", id, agent);
    }

    /// Stop tracking a queue and release it. No-op for unknown ids.
    pub fn destroy_queue(&self, id: QueueId) {
        let queue = self.queues.write().unwrap().remove(&id);
        // The runtime release runs in Queue::drop, outside the map lock.
        drop(queue);
    }

    /// Register a callback pair for every current and future queue on
    /// `agent`. Returns the client id used to remove it later.
    pub fn add_callback(
        &self,
        agent: AgentHandle,
        queue_cb: QueueCb,
        completed_cb: CompletedCb,
    ) -> ClientId {
        // Lock order: callback registry, then queue map.
        let mut callbacks = self.callbacks.write().unwrap();
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        callbacks.insert(
            id,
            CallbackEntry {
                agent,
                queue_cb: queue_cb.clone(),
                completed_cb: completed_cb.clone(),
            },
        );

        let queues = self.queues.read().unwrap();
        for queue in queues.values() {
            if queue.agent().handle() == agent {
                queue.register_callback(id, queue_cb.clone(), completed_cb.clone());
            }
        }
        id
    }

    /// Erase a registration and detach it from every live queue, regardless
    /// of agent. No-op for unknown ids.
    pub fn remove_callback(&self, id: ClientId) {
        // Lock order: callback registry, then queue map.
        let mut callbacks = self.callbacks.write().unwrap();
        callbacks.remove(&id);

        let queues = self.queues.read().unwrap();
        for queue in queues.values() {
            queue.remove_callback(id);
        }
    }

    /// Deliver a dispatch observed on queue `id` to its callbacks.
    ///
    /// The queue is resolved under a short read lock and the callbacks run
    /// outside it, so delivery threads never hold the map against
    /// create/destroy.
    pub fn process_dispatch(&self, id: QueueId, dispatch: &KernelDispatch) {
        let queue = self.queues.read().unwrap().get(&id).cloned();
        match queue {
            Some(queue) => queue.process_dispatch(dispatch),
            None => debug!("dispatch on untracked queue {:#x} dropped", id),
        }
    }

    /// Deliver a completion record for queue `id`.
    pub fn process_completion(&self, id: QueueId, completion: &DispatchComplete) {
        let queue = self.queues.read().unwrap().get(&id).cloned();
        if let Some(queue) = queue {
            queue.process_completion(completion);
        }
    }

    /// Runtime entry points captured before any trampoline was installed
    pub fn core_table(&self) -> &CoreApiTable {
        &self.core_table
    }

    pub fn ext_table(&self) -> &ExtApiTable {
        &self.ext_table
    }

    /// Supported agents, keyed by enumeration index
    pub fn supported_agents(&self) -> &HashMap<u32, Arc<AgentCache>> {
        &self.supported_agents
    }

    /// Look up a live queue by its runtime identity
    pub fn queue(&self, id: QueueId) -> Option<Arc<Queue>> {
        self.queues.read().unwrap().get(&id).cloned()
    }

    pub fn queue_count(&self) -> usize {
        self.queues.read().unwrap().len()
    }
}
