//! End-to-end tracking scenarios

mod common;

use common::*;
use multi_object_tracker::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

#[test]
fn test_single_car_is_confirmed_with_velocity() {
    let mut node = make_node(TrackerConfig::default());
    let stream = node.input_manager().stream(0).expect("one stream");

    // 2 m/s along x for 2 s, one frame every 100 ms
    for k in 0..=20 {
        let stamp = 0.1 * k as f64;
        stream.set_objects(
            ego_batch(stamp, vec![car(2.0 * stamp, 0.0)]),
            Time::from_seconds(stamp + 0.05),
        );
        node.on_trigger(Time::from_seconds(stamp + 0.2));
    }

    let published = &node.publisher().published;
    assert_eq!(published.len(), 21);

    let last = published.last().expect("published");
    assert_eq!(last.len(), 1);
    let track = &last.objects[0];
    assert_eq!(track.label(), ObjectLabel::Car);
    assert!((track.kinematics.pose.position.x - 4.0).abs() < 0.5);
    assert!(
        (track.kinematics.twist.vx - 2.0).abs() < 0.5,
        "vx = {}",
        track.kinematics.twist.vx
    );

    // one identity for the whole run
    let ids: Vec<TrackId> = published
        .iter()
        .flat_map(|m| m.objects.iter().map(|o| o.id))
        .collect();
    assert!(!ids.is_empty());
    assert!(ids.iter().all(|id| *id == ids[0]));
}

#[test]
fn test_duplicate_detection_is_suppressed() {
    let (mut processor, association) = make_pipeline();

    run_cycle(&mut processor, &association, &world_batch(0.0, vec![car(0.0, 0.0)]));
    assert_eq!(processor.len(), 1);
    let original = processor.trackers()[0].id();

    // a second detection 0.2 m away spawns a track that overlaps the first
    for k in 1..=3 {
        let stamp = 0.1 * k as f64;
        run_cycle(
            &mut processor,
            &association,
            &world_batch(stamp, vec![car(0.0, 0.0), car(0.2, 0.0)]),
        );
        assert_eq!(processor.len(), 1);
    }

    let survivor = &processor.trackers()[0];
    assert_eq!(survivor.id(), original);
    assert_eq!(survivor.total_measurement_count(), 4);
}

#[test]
fn test_lost_track_expires() {
    let (mut processor, association) = make_pipeline();

    for k in 0..5 {
        let stamp = 0.1 * k as f64;
        run_cycle(&mut processor, &association, &world_batch(stamp, vec![car(0.0, 0.0)]));
    }
    assert_eq!(processor.get_tracked_objects(Time::from_seconds(0.4)).len(), 1);

    // coasting within max_elapsed_time
    run_cycle(&mut processor, &association, &world_batch(1.3, Vec::new()));
    assert_eq!(processor.len(), 1);
    assert_eq!(processor.trackers()[0].no_measurement_count(), 1);
    assert_eq!(processor.get_tracked_objects(Time::from_seconds(1.3)).len(), 1);

    run_cycle(&mut processor, &association, &world_batch(1.5, Vec::new()));
    assert!(processor.is_empty());
    assert!(processor.get_tracked_objects(Time::from_seconds(1.5)).is_empty());
}

#[test]
fn test_noisy_scene_keeps_identities() {
    let (mut processor, association) = make_pipeline();
    let mut rng = StdRng::seed_from_u64(7);
    let noise = Normal::new(0.0, 0.1).expect("valid deviation");

    let mut last_ids: Option<Vec<TrackId>> = None;
    for k in 0..30 {
        let t = 0.1 * k as f64;
        let mut n = || noise.sample(&mut rng);
        let objects = vec![
            car(5.0 * t + n(), n()),
            car(10.0 + 3.0 * t + n(), 4.0 + n()),
            pedestrian(10.0 + n(), -6.0 + n()),
        ];
        run_cycle(&mut processor, &association, &world_batch(t, objects));

        if k >= 5 {
            let mut ids: Vec<TrackId> = processor
                .get_tracked_objects(Time::from_seconds(t))
                .iter()
                .map(|o| o.id)
                .collect();
            ids.sort_by_key(|id| *id.as_uuid());
            assert_eq!(ids.len(), 3, "cycle {}", k);
            if let Some(previous) = &last_ids {
                assert_eq!(previous, &ids, "identity switch at cycle {}", k);
            }
            last_ids = Some(ids);
        }
    }

    let labels: Vec<ObjectLabel> = processor
        .get_tracked_objects(Time::from_seconds(2.9))
        .iter()
        .map(|o| o.label())
        .collect();
    assert_eq!(labels.iter().filter(|l| **l == ObjectLabel::Car).count(), 2);
    assert!(labels.contains(&ObjectLabel::Pedestrian));
}

#[test]
fn test_tracker_map_from_json() {
    let config = TrackerConfig::from_json(r#"{"tracker_map": {"car": "cv_tracker"}}"#)
        .expect("valid document");
    let mut processor = TrackerProcessor::new(config.processor, config.tracker_map);
    let association = DataAssociation::new(config.association).expect("valid tables");

    run_cycle(&mut processor, &association, &world_batch(0.0, vec![car(0.0, 0.0)]));
    assert_eq!(processor.trackers()[0].tracker_type(), TrackerType::Cv);

    // labels missing from the map use the unknown tracker
    run_cycle(&mut processor, &association, &world_batch(0.1, vec![pedestrian(30.0, 0.0)]));
    assert_eq!(processor.trackers()[1].tracker_type(), TrackerType::Unknown);
}
