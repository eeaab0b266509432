use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use tempfile::tempdir;

use strinex::{
    history::RunHistory,
    map::RouteMap,
    positioning::{PositionCallback, PositionError, PositionEvent, PositionSource, WatchOptions},
    replay::{ReplayError, ReplayPositionSource},
    session::{RunState, RunTracker},
};

const TRACK: &str = "\
latitude,longitude,accuracy_m,timestamp_ms
17.3850,78.4867,220,0
17.3850,78.4867,12,1000
17.3855,78.4870,10,2000
17.3860,78.4873,9,3000
17.3865,78.4876,11,4000
";

fn write_track(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("track.csv");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

fn channel_callback() -> (PositionCallback, mpsc::Receiver<PositionEvent>) {
    let (tx, rx) = mpsc::channel();
    let cb: PositionCallback = Arc::new(move |ev| {
        let _ = tx.send(ev);
    });
    (cb, rx)
}

#[test]
fn replayed_track_builds_a_route() {
    let (_dir, path) = write_track(TRACK);
    let source = ReplayPositionSource::from_path(&path, 100.0).unwrap();
    assert_eq!(source.len(), 5);

    let (cb, rx) = channel_callback();
    let mut tracker = RunTracker::new(source, RouteMap::default(), RunHistory::in_memory(), cb);
    tracker.start_run().unwrap();

    for _ in 0..5 {
        let ev = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        tracker.handle_position(ev);
        tracker.on_tick();
    }

    // the 220 m first fix is gated out
    assert_eq!(tracker.route().len(), 4);
    assert!(tracker.route().distance_km() > 0.15);

    let record = tracker.stop_run().unwrap();
    assert_eq!(record.gps_point_count, 4);
    assert_eq!(tracker.source().active_watches(), 0);
}

#[test]
fn long_gap_times_out() {
    let (_dir, path) = write_track(
        "latitude,longitude,accuracy_m,timestamp_ms\n1.0,1.0,5,0\n1.0,1.001,5,60000\n",
    );
    let mut source = ReplayPositionSource::from_path(&path, 1.0).unwrap();
    let (cb, rx) = channel_callback();
    let opts = WatchOptions {
        timeout: Duration::from_millis(50),
        ..WatchOptions::default()
    };
    let handle = source.watch(opts, cb);

    assert_matches!(
        rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        PositionEvent::Fix { watch, .. } if watch == handle
    );
    assert_matches!(
        rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        PositionEvent::Failed {
            error: PositionError::Timeout,
            ..
        }
    );
}

#[test]
fn recorded_failure_stops_the_run() {
    let (_dir, path) = write_track(
        "latitude,longitude,accuracy_m,timestamp_ms,error\n1.0,1.0,5,0,\n,,,100,position_unavailable\n",
    );
    let source = ReplayPositionSource::from_path(&path, 10.0).unwrap();
    let (cb, rx) = channel_callback();
    let mut tracker = RunTracker::new(source, RouteMap::default(), RunHistory::in_memory(), cb);
    tracker.start_run().unwrap();

    for _ in 0..2 {
        tracker.on_tick();
        let ev = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        tracker.handle_position(ev);
    }

    assert_eq!(tracker.state(), RunState::Stopped);
    assert!(tracker.history().is_empty());
    assert_eq!(
        tracker.status().label,
        PositionError::PositionUnavailable.user_message()
    );
}

#[test]
fn cleared_watch_goes_quiet() {
    let (_dir, path) = write_track(TRACK);
    let mut source = ReplayPositionSource::from_path(&path, 1.0).unwrap();
    let (cb, rx) = channel_callback();
    let handle = source.watch(WatchOptions::default(), cb);

    // first fix is immediate, the rest are a second apart
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    source.clear_watch(handle);
    assert_eq!(source.active_watches(), 0);
    assert!(rx.recv_timeout(Duration::from_millis(1500)).is_err());
}

#[test]
fn bad_files_are_rejected() {
    assert_matches!(
        ReplayPositionSource::from_path("/definitely/not/here.csv", 1.0),
        Err(ReplayError::Io(_))
    );

    let (_dir, path) = write_track("latitude,longitude,accuracy_m,timestamp_ms,error\n1,1,5,0,lost\n");
    assert_matches!(
        ReplayPositionSource::from_path(&path, 1.0),
        Err(ReplayError::InvalidError { row: 2, .. })
    );
}
