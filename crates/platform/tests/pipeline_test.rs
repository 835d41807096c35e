//! Topologies and collections travelling through the work queues.

use std::sync::mpsc;
use std::time::Duration;

use mediaplat::{
    callback_fn, AsyncResult, Collection, Event, Handle, NodeType, Platform, PlatformConfig,
    PlatformError, Topology, WorkQueueId, PLATFORM_VERSION,
};

const WAIT: Duration = Duration::from_secs(5);

fn started() -> Platform {
    let platform = Platform::new(PlatformConfig::default());
    platform.startup(PLATFORM_VERSION).unwrap();
    platform
}

#[test]
fn topology_travels_as_result_state() {
    let platform = started();
    let topology = platform.create_topology();
    let source = platform.create_node(NodeType::SourceStream);
    let transform = platform.create_node(NodeType::Transform);
    let output = platform.create_node(NodeType::Output);
    source.connect_output(0, &transform, 0).unwrap();
    transform.connect_output(0, &output, 0).unwrap();
    for node in [&source, &transform, &output] {
        topology.add_node(node).unwrap();
    }

    let (tx, rx) = mpsc::sync_channel(1);
    platform
        .scheduler()
        .schedule_work_item(
            callback_fn(move |result| {
                let topology: Topology = result
                    .state()?
                    .downcast()
                    .ok_or(PlatformError::InvalidArgument)?;
                let sources = topology.source_node_collection();
                let outputs = topology.output_node_collection()?;
                tx.send((topology.id(), sources.count(), outputs.count()))
                    .map_err(|_| PlatformError::Fail)
            }),
            Some(topology.to_object()),
            10,
        )
        .unwrap();

    let (id, sources, outputs) = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(id, topology.id());
    assert_eq!(sources, 2);
    assert_eq!(outputs, 1);
    platform.shutdown();
}

#[test]
fn collection_filled_by_serial_work_items() {
    let platform = started();
    let serial = platform
        .allocate_serial_work_queue(WorkQueueId::MULTITHREADED)
        .unwrap();
    let collection = platform.create_collection();
    let done = Event::new();

    for i in 0..10u32 {
        let target = collection.clone();
        let result = AsyncResult::builder()
            .callback(callback_fn(move |_| {
                target.add_element(Some(mediaplat::Object::new(i)));
                Ok(())
            }))
            .build();
        platform.scheduler().put_work_item_ex(serial, &result).unwrap();
    }
    let last = AsyncResult::builder().event(done.clone()).build();
    platform.scheduler().put_work_item_ex(serial, &last).unwrap();
    assert!(done.wait_timeout(WAIT));

    assert_eq!(collection.count(), 10);
    let values: Vec<u32> = (0..10)
        .map(|i| *collection.element(i).unwrap().downcast_ref::<u32>().unwrap())
        .collect();
    assert_eq!(values, (0..10).collect::<Vec<_>>());

    platform.scheduler().unlock_work_queue(serial).unwrap();
    platform.shutdown();
}

#[test]
fn waiting_item_completes_a_chained_result() {
    let platform = started();
    let finished = Event::new();
    let inner = AsyncResult::builder().event(finished.clone()).build();

    // Completing the outer result forwards its status to the inner one.
    let outer = platform.create_async_result(
        Some(inner.to_object()),
        Some(callback_fn(|result| {
            let chained: AsyncResult = result
                .object()?
                .downcast()
                .ok_or(PlatformError::InvalidArgument)?;
            chained.set_status(result.status());
            chained.set_bytes_transferred(result.bytes_transferred());
            chained.event().ok_or(PlatformError::InvalidPointer)?.set();
            Ok(())
        })),
        None,
    );
    outer.set_status(Err(PlatformError::NotFound));
    outer.set_bytes_transferred(512);

    let trigger = Event::new();
    platform
        .scheduler()
        .put_waiting_work_item(Some(&trigger), 0, &outer)
        .unwrap();
    assert!(!finished.wait_timeout(Duration::from_millis(20)));
    trigger.set();
    assert!(finished.wait_timeout(WAIT));
    assert_eq!(inner.status(), Err(PlatformError::NotFound));
    assert_eq!(inner.bytes_transferred(), 512);
    platform.shutdown();
}

#[test]
fn collection_of_topologies_survives_shutdown() {
    let platform = started();
    let holder = Collection::new();
    for _ in 0..3 {
        holder.add_element(Some(platform.create_topology().to_object()));
    }
    platform.shutdown();

    let ids: Vec<u64> = holder.handles::<Topology>().iter().map(Topology::id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}
