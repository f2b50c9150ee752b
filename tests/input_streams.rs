//! Input window behavior across several streams

mod common;

use std::sync::Arc;
use std::thread;

use common::*;
use multi_object_tracker::prelude::*;

fn three_streams() -> InputManager {
    let channels = [channel("lidar"), channel("camera"), channel("radar")];
    InputManager::new(&channels, Time::from_seconds(0.0)).expect("channels configured")
}

#[test]
fn test_silent_stream_does_not_block_others() {
    let mut manager = three_streams();
    let lidar = manager.stream(0).expect("lidar");
    let radar = manager.stream(2).expect("radar");

    radar.set_objects(ego_batch(1.02, vec![car(5.0, 0.0)]), Time::from_seconds(1.05));
    lidar.set_objects(ego_batch(1.0, vec![car(5.0, 0.0)]), Time::from_seconds(1.04));

    let released = manager
        .get_objects(Time::from_seconds(1.2))
        .expect("two batches released");
    assert_eq!(released.len(), 2);
    assert_eq!(released[0].channel, 0);
    assert_eq!(released[1].channel, 2);
    assert!(released[0].stamp < released[1].stamp);
    assert_eq!(manager.latest_object_time(), Time::from_seconds(1.02));

    let silent = manager.stream(1).expect("camera").statistics(Time::from_seconds(1.2));
    assert!(silent.is_delayed);
    assert_eq!(silent.queued, 0);
}

#[test]
fn test_batches_are_released_once() {
    let mut manager = three_streams();
    let lidar = manager.stream(0).expect("lidar");

    lidar.set_objects(ego_batch(1.0, Vec::new()), Time::from_seconds(1.01));
    assert!(manager.get_objects(Time::from_seconds(1.2)).is_some());
    assert!(manager.get_objects(Time::from_seconds(1.25)).is_none());

    // older than what was already processed
    lidar.set_objects(ego_batch(0.9, Vec::new()), Time::from_seconds(1.26));
    assert!(manager.get_objects(Time::from_seconds(1.3)).is_none());
    assert_eq!(lidar.objects_count(), 0);
}

#[test]
fn test_too_fresh_batch_waits() {
    let mut manager = three_streams();
    let lidar = manager.stream(0).expect("lidar");

    lidar.set_objects(ego_batch(1.0, Vec::new()), Time::from_seconds(1.01));
    assert!(manager.get_objects(Time::from_seconds(1.05)).is_none());
    assert_eq!(lidar.objects_count(), 1);
    assert!(manager.get_objects(Time::from_seconds(1.2)).is_some());
}

#[test]
fn test_concurrent_producers_keep_newest() {
    let manager = three_streams();
    let streams: Vec<Arc<InputStream>> = manager.streams().to_vec();

    let handles: Vec<_> = streams
        .iter()
        .map(|stream| {
            let stream = Arc::clone(stream);
            thread::spawn(move || {
                for k in 0..200 {
                    let stamp = 0.01 * k as f64;
                    stream.set_objects(
                        ego_batch(stamp, vec![car(stamp, 0.0)]),
                        Time::from_seconds(stamp + 0.02),
                    );
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("producer finished");
    }

    for stream in &streams {
        let queue_size = stream.config().queue_size;
        assert_eq!(stream.objects_count(), queue_size);

        let out = stream.get_objects_older_than(Time::from_seconds(10.0), Time::from_seconds(0.0));
        let newest = out.last().expect("queued batches");
        assert_eq!(newest.stamp, Time::from_seconds(0.01 * 199.0));
        assert!(out.iter().all(|b| b.channel == stream.index()));
    }
}

#[test]
fn test_node_merges_streams_in_stamp_order() {
    let config = TrackerConfig {
        input_channels: vec![channel("lidar"), channel("radar")],
        ..TrackerConfig::default()
    };
    let mut node = make_node(config);
    let lidar = node.input_manager().stream(0).expect("lidar");
    let radar = node.input_manager().stream(1).expect("radar");

    for k in 0..6 {
        let stamp = 0.1 * k as f64;
        lidar.set_objects(
            ego_batch(stamp, vec![car(stamp, 0.0)]),
            Time::from_seconds(stamp + 0.03),
        );
        radar.set_objects(
            ego_batch(stamp + 0.05, vec![car(stamp + 0.05, 0.0)]),
            Time::from_seconds(stamp + 0.06),
        );
        node.on_trigger(Time::from_seconds(stamp + 0.25));
    }

    assert_eq!(node.processor().len(), 1);
    assert_eq!(node.processor().trackers()[0].total_measurement_count(), 12);
    let last = node.publisher().published.last().expect("published");
    assert_eq!(last.stamp, Time::from_seconds(0.5 + 0.05));
}
