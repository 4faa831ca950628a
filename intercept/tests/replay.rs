//! Callback replay and registration-race coverage for the queue controller

use prism_intercept::{
    AgentDescriptor, AgentKind, BufferedTracerConfig, ContextRegistry, CoreApiTable, ExtApiTable,
    QueueController, QueueCreateRequest, QueueKind, RegisteredContext, StaticAgentEnumerator,
    TracingDomain,
};
use prism_shared::types::events::{AgentHandle, ClientId, KernelDispatch};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn gpu(handle: AgentHandle) -> AgentDescriptor {
    AgentDescriptor {
        handle,
        kind: AgentKind::Gpu,
        node_id: 0,
        max_queue_size: 1024,
        max_queue_count: 8,
    }
}

fn tables() -> (CoreApiTable, ExtApiTable) {
    let next_handle = Arc::new(AtomicU64::new(0x1000));
    let core = CoreApiTable {
        queue_create: Arc::new(|_| anyhow::bail!("not intercepted")),
        queue_destroy: Arc::new(|_| Ok(())),
    };
    let ext = ExtApiTable {
        queue_intercept_create: Arc::new(move |_| Ok(next_handle.fetch_add(1, Ordering::Relaxed))),
        queue_intercept_destroy: Arc::new(|_| Ok(())),
    };
    (core, ext)
}

fn dispatch_contexts() -> ContextRegistry {
    ContextRegistry::new(vec![RegisteredContext {
        counter_collection: false,
        buffered_tracer: Some(BufferedTracerConfig::new([TracingDomain::KernelDispatch])),
    }])
}

fn request(agent: AgentHandle) -> QueueCreateRequest {
    QueueCreateRequest {
        agent,
        size: 256,
        kind: QueueKind::MultiProducer,
        private_segment_size: 0,
        group_segment_size: 0,
    }
}

#[test]
fn callback_before_queue_is_replayed_onto_new_queue() {
    init_logging();
    let (mut core, ext) = tables();
    let enumerator = StaticAgentEnumerator::new(vec![gpu(1)]);
    let controller =
        QueueController::init(&mut core, ext, &enumerator, &dispatch_contexts()).unwrap();

    let observed = Arc::new(AtomicUsize::new(0));
    let count = observed.clone();
    let id = controller.add_callback(
        1,
        Arc::new(move |_, _| {
            count.fetch_add(1, Ordering::SeqCst);
        }),
        Arc::new(|_, _| {}),
    );

    // The queue arrives after the registration; replay must attach it.
    let queue_id = controller.create_queue(request(1)).unwrap();
    assert!(controller.queue(queue_id).unwrap().has_callback(id));

    controller.process_dispatch(
        queue_id,
        &KernelDispatch {
            dispatch_id: 1,
            queue_id,
            agent: 1,
            kernel_object: 0x1000,
            timestamp: 0,
        },
    );
    assert_eq!(observed.load(Ordering::SeqCst), 1);
}

#[test]
fn queue_before_callback_converges_to_same_attached_set() {
    init_logging();
    let (mut core, ext) = tables();
    let enumerator = StaticAgentEnumerator::new(vec![gpu(1)]);
    let controller =
        QueueController::init(&mut core, ext, &enumerator, &dispatch_contexts()).unwrap();

    let queue_id = controller.create_queue(request(1)).unwrap();
    let id = controller.add_callback(1, Arc::new(|_, _| {}), Arc::new(|_, _| {}));

    assert!(controller.queue(queue_id).unwrap().has_callback(id));
    assert_eq!(controller.queue(queue_id).unwrap().callback_count(), 1);
}

#[test]
fn callbacks_only_attach_to_matching_agent() {
    init_logging();
    let (mut core, ext) = tables();
    let enumerator = StaticAgentEnumerator::new(vec![gpu(1), gpu(2)]);
    let controller =
        QueueController::init(&mut core, ext, &enumerator, &dispatch_contexts()).unwrap();

    let q1 = controller.create_queue(request(1)).unwrap();
    let q2 = controller.create_queue(request(2)).unwrap();

    let id = controller.add_callback(1, Arc::new(|_, _| {}), Arc::new(|_, _| {}));

    assert!(controller.queue(q1).unwrap().has_callback(id));
    assert!(!controller.queue(q2).unwrap().has_callback(id));
}

/// Registrations and queue creations race from many threads; every queue
/// must end up with every callback exactly once — attached via replay or
/// via direct attach, never duplicated, never missed.
#[test]
fn concurrent_registration_and_creation_attach_exactly_once() {
    init_logging();
    const CALLBACKS: usize = 8;
    const QUEUES: usize = 8;

    let (mut core, ext) = tables();
    let enumerator = StaticAgentEnumerator::new(vec![gpu(1)]);
    let controller =
        QueueController::init(&mut core, ext, &enumerator, &dispatch_contexts()).unwrap();

    let barrier = Arc::new(Barrier::new(CALLBACKS + QUEUES));
    let mut handles = Vec::new();

    for _ in 0..CALLBACKS {
        let controller = controller.clone();
        let barrier = barrier.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            let id: ClientId = controller.add_callback(1, Arc::new(|_, _| {}), Arc::new(|_, _| {}));
            id
        }));
    }

    let mut queue_handles = Vec::new();
    for _ in 0..QUEUES {
        let controller = controller.clone();
        let barrier = barrier.clone();
        queue_handles.push(thread::spawn(move || {
            barrier.wait();
            controller.create_queue(request(1)).unwrap()
        }));
    }

    let client_ids: Vec<ClientId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let queue_ids: Vec<_> = queue_handles.into_iter().map(|h| h.join().unwrap()).collect();

    // Ids are unique and never zero.
    let distinct: HashSet<ClientId> = client_ids.iter().copied().collect();
    assert_eq!(distinct.len(), CALLBACKS);
    assert!(client_ids.iter().all(|id| *id > 0));

    // After the race settles, every registration reached every queue.
    for queue_id in queue_ids {
        let queue = controller.queue(queue_id).unwrap();
        assert_eq!(queue.callback_count(), CALLBACKS);
        for id in &client_ids {
            assert!(queue.has_callback(*id));
        }
    }
}

#[test]
fn destroyed_queue_drops_out_of_dispatch_delivery() {
    init_logging();
    let (mut core, ext) = tables();
    let enumerator = StaticAgentEnumerator::new(vec![gpu(1)]);
    let controller =
        QueueController::init(&mut core, ext, &enumerator, &dispatch_contexts()).unwrap();

    let observed = Arc::new(AtomicUsize::new(0));
    let count = observed.clone();
    controller.add_callback(
        1,
        Arc::new(move |_, _| {
            count.fetch_add(1, Ordering::SeqCst);
        }),
        Arc::new(|_, _| {}),
    );

    let queue_id = controller.create_queue(request(1)).unwrap();
    controller.destroy_queue(queue_id);

    controller.process_dispatch(
        queue_id,
        &KernelDispatch {
            dispatch_id: 1,
            queue_id,
            agent: 1,
            kernel_object: 0x1000,
            timestamp: 0,
        },
    );
    assert_eq!(observed.load(Ordering::SeqCst), 0);
}
