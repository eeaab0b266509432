//! Run lifecycle: Idle -> Tracking -> Stopped -> (start) -> Tracking.
//!
//! [`RunTracker`] is the only writer of the live [`Session`]. Position events
//! and clock ticks arrive one at a time from the event loop; nothing here
//! blocks except the one-shot fix in [`RunTracker::locate`].

use chrono::{DateTime, Local};

use crate::filter::{admit, Admission, RejectReason};
use crate::geo::{Bounds, GeoPoint};
use crate::history::{RunHistory, RunRecord};
use crate::map::{MapView, LOCATED_ZOOM};
use crate::metrics::{calories_kcal, format_elapsed, pace_min_per_km, LiveMetrics};
use crate::positioning::{
    PositionCallback, PositionError, PositionEvent, PositionSource, WatchHandle, WatchOptions,
};
use crate::route::Route;

/// Ticks (seconds) before "Run stopped" falls back to "GPS idle"
pub const STATUS_RESET_SECS: u32 = 4;

const COMPLETED_AT_FORMAT: &str = "%d %b %Y, %I:%M %p";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum RunState {
    Idle,
    Tracking,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    #[error("Positioning is not supported on this device.")]
    UnsupportedPlatform,
    #[error("{}", .0.user_message())]
    Position(#[from] PositionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum StatusIndicator {
    Idle,
    Searching,
    Active,
    Tracking,
    Error,
}

/// The single human-readable GPS status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpsStatus {
    pub indicator: StatusIndicator,
    pub label: String,
}

impl GpsStatus {
    pub fn new(indicator: StatusIndicator, label: impl Into<String>) -> Self {
        Self {
            indicator,
            label: label.into(),
        }
    }

    pub fn idle() -> Self {
        Self::new(StatusIndicator::Idle, "GPS idle")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Transient message for the user, drained by the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// One tracking attempt
#[derive(Debug, Clone)]
pub struct Session {
    pub state: RunState,
    pub route: Route,
    pub elapsed_secs: u64,
    pub started_at: Option<DateTime<Local>>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            state: RunState::Idle,
            route: Route::new(),
            elapsed_secs: 0,
            started_at: None,
        }
    }
}

pub struct RunTracker<P: PositionSource, M: MapView> {
    source: P,
    map: M,
    history: RunHistory,
    session: Session,
    live: LiveMetrics,
    status: GpsStatus,
    notices: Vec<Notice>,
    watch: Option<WatchHandle>,
    clock_running: bool,
    clock_restart: bool,
    status_reset_in: Option<u32>,
    initial_fix_options: WatchOptions,
    watch_options: WatchOptions,
    on_position: PositionCallback,
}

impl<P: PositionSource, M: MapView> RunTracker<P, M> {
    /// `on_position` is handed to every watch; it should queue the event for
    /// [`RunTracker::handle_position`].
    pub fn new(source: P, map: M, history: RunHistory, on_position: PositionCallback) -> Self {
        Self {
            source,
            map,
            history,
            session: Session::default(),
            live: LiveMetrics::default(),
            status: GpsStatus::idle(),
            notices: Vec::new(),
            watch: None,
            clock_running: false,
            clock_restart: false,
            status_reset_in: None,
            initial_fix_options: WatchOptions::default(),
            watch_options: WatchOptions::default(),
            on_position,
        }
    }

    pub fn with_options(mut self, initial_fix: WatchOptions, watch: WatchOptions) -> Self {
        self.initial_fix_options = initial_fix;
        self.watch_options = watch;
        self
    }

    pub fn state(&self) -> RunState {
        self.session.state
    }

    pub fn is_tracking(&self) -> bool {
        self.session.state == RunState::Tracking
    }

    pub fn route(&self) -> &Route {
        &self.session.route
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.session.elapsed_secs
    }

    pub fn elapsed_label(&self) -> String {
        format_elapsed(self.session.elapsed_secs)
    }

    pub fn live(&self) -> &LiveMetrics {
        &self.live
    }

    pub fn status(&self) -> &GpsStatus {
        &self.status
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn history(&self) -> &RunHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut RunHistory {
        &mut self.history
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    pub fn active_watch(&self) -> Option<WatchHandle> {
        self.watch
    }

    pub fn clock_running(&self) -> bool {
        self.clock_running
    }

    /// True once after each start; the event loop must then restart its tick
    /// phase so the first second of the run is a whole one.
    pub fn take_clock_restart(&mut self) -> bool {
        std::mem::take(&mut self.clock_restart)
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn set_status(&mut self, indicator: StatusIndicator, label: impl Into<String>) {
        self.status = GpsStatus::new(indicator, label);
        self.status_reset_in = None;
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }

    fn show_error(&mut self, message: &str) {
        self.set_status(StatusIndicator::Error, message);
        self.notify(NoticeLevel::Error, message);
    }

    /// One-shot fix used to centre the map before a run
    pub fn locate(&mut self) -> Result<GeoPoint, TrackerError> {
        self.set_status(StatusIndicator::Searching, "Locating you...");

        if !self.source.is_available() {
            let err = TrackerError::UnsupportedPlatform;
            self.show_error(&err.to_string());
            return Err(err);
        }

        match self.source.current_position(self.initial_fix_options) {
            Ok(fix) => {
                self.map.set_center(fix.lat_lng(), LOCATED_ZOOM);
                self.set_status(
                    StatusIndicator::Active,
                    format!("Ready. GPS accuracy: ±{}m", fix.accuracy_m.round()),
                );
                tracing::info!(lat = fix.latitude, lng = fix.longitude, "initial fix");
                Ok(fix)
            }
            Err(e) => {
                tracing::warn!(error = %e, "initial fix failed");
                self.show_error(e.user_message());
                Err(e.into())
            }
        }
    }

    pub fn start_run(&mut self) -> Result<(), TrackerError> {
        if !self.source.is_available() {
            let err = TrackerError::UnsupportedPlatform;
            self.show_error(&err.to_string());
            return Err(err);
        }

        // start always wins; the abandoned attempt is not saved
        if let Some(old) = self.watch.take() {
            tracing::info!(watch = old.0, "clearing previous watch");
            self.source.clear_watch(old);
        }

        self.session = Session {
            state: RunState::Tracking,
            route: Route::new(),
            elapsed_secs: 0,
            started_at: Some(Local::now()),
        };
        self.live = LiveMetrics::default();
        self.map.clear_route();
        self.set_status(StatusIndicator::Searching, "Acquiring GPS signal...");

        self.clock_running = true;
        self.clock_restart = true;
        let handle = self
            .source
            .watch(self.watch_options, self.on_position.clone());
        self.watch = Some(handle);

        tracing::info!(watch = handle.0, "run started");
        Ok(())
    }

    /// Stop tracking. Saves a record unless no time has elapsed; a no-op
    /// outside of Tracking.
    pub fn stop_run(&mut self) -> Option<RunRecord> {
        if self.session.state != RunState::Tracking {
            return None;
        }

        self.halt();
        self.set_status(StatusIndicator::Active, "✓ Run stopped");
        self.status_reset_in = Some(STATUS_RESET_SECS);

        if let Some(bounds) = Bounds::of_points(self.session.route.points()) {
            self.map.fit_bounds(bounds);
        }

        if self.session.elapsed_secs == 0 {
            tracing::info!("run stopped before the clock ticked, nothing saved");
            return None;
        }

        let record = self.snapshot(Local::now());
        self.history.save(record.clone());
        self.notify(NoticeLevel::Success, "Run complete! Route saved.");
        tracing::info!(
            id = record.id,
            distance_km = record.distance_km,
            duration_secs = record.duration_seconds,
            points = record.gps_point_count,
            "run saved"
        );
        Some(record)
    }

    pub fn toggle_run(&mut self) -> Result<(), TrackerError> {
        if self.is_tracking() {
            self.stop_run();
            Ok(())
        } else {
            self.start_run()
        }
    }

    /// Drop an in-progress run without saving it. Returns whether one was running.
    pub fn abandon_run(&mut self) -> bool {
        if self.session.state != RunState::Tracking {
            return false;
        }
        tracing::info!(
            elapsed_secs = self.session.elapsed_secs,
            points = self.session.route.len(),
            "run abandoned, nothing saved"
        );
        self.halt();
        true
    }

    /// Cancel subscription and clock, freeze the session
    fn halt(&mut self) {
        if let Some(handle) = self.watch.take() {
            self.source.clear_watch(handle);
        }
        self.clock_running = false;
        self.clock_restart = false;
        self.session.state = RunState::Stopped;
    }

    fn snapshot(&self, now: DateTime<Local>) -> RunRecord {
        let distance_km = self.session.route.distance_km();
        let elapsed = self.session.elapsed_secs;
        let calories = calories_kcal(distance_km);
        RunRecord {
            id: self.history.next_id(now.timestamp_millis()),
            distance_km,
            duration_seconds: elapsed,
            pace_min_per_km: pace_min_per_km(distance_km, elapsed),
            calories_kcal: (calories > 0).then_some(calories),
            completed_at_label: now.format(COMPLETED_AT_FORMAT).to_string(),
            gps_point_count: self.session.route.len(),
        }
    }

    pub fn handle_position(&mut self, event: PositionEvent) {
        if self.session.state != RunState::Tracking || self.watch != Some(event.watch()) {
            tracing::debug!(watch = event.watch().0, "dropping event from inactive watch");
            return;
        }

        match event {
            PositionEvent::Fix { sample, .. } => self.on_fix(sample),
            PositionEvent::Failed { error, .. } => self.on_position_error(error),
        }
    }

    fn on_fix(&mut self, sample: GeoPoint) {
        let accuracy = sample.accuracy_m.round();
        match admit(&sample, self.session.route.is_empty()) {
            Admission::Rejected(RejectReason::LowAccuracy) => {
                self.set_status(
                    StatusIndicator::Searching,
                    format!("Improving accuracy... ±{accuracy}m"),
                );
            }
            Admission::Accepted => {
                let point = sample.lat_lng();
                let distance = self.session.route.append(point);
                self.map.append_route_point(point);
                self.map.pan_to(point);
                self.live = LiveMetrics::compute(
                    distance,
                    self.session.elapsed_secs,
                    self.session.route.len(),
                );
                self.set_status(StatusIndicator::Tracking, format!("GPS live · ±{accuracy}m"));
                tracing::debug!(
                    lat = sample.latitude,
                    lng = sample.longitude,
                    accuracy_m = sample.accuracy_m,
                    distance_km = distance,
                    "fix accepted"
                );
            }
        }
    }

    /// Tracking cannot continue without a position source: stop without saving
    fn on_position_error(&mut self, error: PositionError) {
        tracing::warn!(error = %error, elapsed_secs = self.session.elapsed_secs, "positioning failed, run aborted");
        self.halt();
        self.show_error(error.user_message());
    }

    /// One wall-clock second
    pub fn on_tick(&mut self) {
        if self.clock_running && self.session.state == RunState::Tracking {
            self.session.elapsed_secs += 1;
            return;
        }

        if let Some(remaining) = self.status_reset_in {
            if remaining <= 1 {
                self.status = GpsStatus::idle();
                self.status_reset_in = None;
            } else {
                self.status_reset_in = Some(remaining - 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::RouteMap;
    use crate::positioning::ScriptedPositionSource;
    use assert_matches::assert_matches;
    use std::sync::mpsc::{self, Receiver};
    use std::sync::Arc;

    type Tracker = RunTracker<ScriptedPositionSource, RouteMap>;

    fn tracker_with(source: ScriptedPositionSource) -> (Tracker, Receiver<PositionEvent>) {
        let (tx, rx) = mpsc::channel();
        let cb: PositionCallback = Arc::new(move |ev| {
            let _ = tx.send(ev);
        });
        let tracker = RunTracker::new(source, RouteMap::default(), RunHistory::in_memory(), cb);
        (tracker, rx)
    }

    fn tracker() -> (Tracker, Receiver<PositionEvent>) {
        tracker_with(ScriptedPositionSource::new())
    }

    fn pump(tracker: &mut Tracker, rx: &Receiver<PositionEvent>) {
        while let Ok(ev) = rx.try_recv() {
            tracker.handle_position(ev);
        }
    }

    fn fix(lat: f64, lng: f64, accuracy: f64) -> GeoPoint {
        GeoPoint::new(lat, lng, accuracy, 0)
    }

    #[test]
    fn test_initial_state() {
        let (t, _rx) = tracker();
        assert_eq!(t.state(), RunState::Idle);
        assert_eq!(t.status(), &GpsStatus::idle());
        assert_eq!(t.elapsed_label(), "00:00");
    }

    #[test]
    fn test_start_subscribes_and_starts_clock() {
        let (mut t, _rx) = tracker();
        t.start_run().unwrap();
        assert_eq!(t.state(), RunState::Tracking);
        assert!(t.clock_running());
        assert_eq!(t.active_watch(), t.source().active_watch());
        assert_eq!(t.status().indicator, StatusIndicator::Searching);
        assert!(t.route().is_empty());
    }

    #[test]
    fn test_start_requests_clock_restart_once() {
        let (mut t, _rx) = tracker();
        assert!(!t.take_clock_restart());
        t.start_run().unwrap();
        assert!(t.take_clock_restart());
        assert!(!t.take_clock_restart());

        t.start_run().unwrap();
        t.stop_run();
        assert!(!t.take_clock_restart());
    }

    #[test]
    fn test_abandon_drops_run_without_saving() {
        let (mut t, rx) = tracker();
        assert!(!t.abandon_run());

        t.start_run().unwrap();
        let handle = t.active_watch().unwrap();
        t.source().emit(fix(0.0, 0.0, 5.0));
        pump(&mut t, &rx);
        for _ in 0..20 {
            t.on_tick();
        }

        assert!(t.abandon_run());
        assert_eq!(t.state(), RunState::Stopped);
        assert!(!t.clock_running());
        assert_eq!(t.source().cleared_watches(), &[handle]);
        assert!(t.history().is_empty());
        assert!(t.take_notices().is_empty());
        assert!(!t.abandon_run());
    }

    #[test]
    fn test_start_without_positioning_fails() {
        let (mut t, _rx) = tracker_with(ScriptedPositionSource::unavailable());
        assert_eq!(t.start_run(), Err(TrackerError::UnsupportedPlatform));
        assert_eq!(t.state(), RunState::Idle);
        assert_eq!(t.status().indicator, StatusIndicator::Error);
        assert!(t.active_watch().is_none());
        let notices = t.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
    }

    #[test]
    fn test_accuracy_gate_holds_first_fix_only() {
        let (mut t, rx) = tracker();
        t.start_run().unwrap();

        t.source().emit(fix(17.385, 78.486, 200.0));
        pump(&mut t, &rx);
        assert!(t.route().is_empty());
        assert_eq!(t.status().indicator, StatusIndicator::Searching);
        assert_eq!(t.status().label, "Improving accuracy... ±200m");

        t.source().emit(fix(17.385, 78.486, 10.0));
        t.source().emit(fix(17.386, 78.487, 200.0));
        pump(&mut t, &rx);
        assert_eq!(t.route().len(), 2);
        assert_eq!(t.status().indicator, StatusIndicator::Tracking);
        assert_eq!(t.status().label, "GPS live · ±200m");
    }

    #[test]
    fn test_accepted_fix_drives_map_and_metrics() {
        let (mut t, rx) = tracker();
        t.start_run().unwrap();
        for _ in 0..60 {
            t.on_tick();
        }
        t.source().emit(fix(0.0, 0.0, 5.0));
        t.source().emit(fix(0.001, 0.0, 5.0));
        pump(&mut t, &rx);

        assert_eq!(t.map().route.len(), 2);
        assert_eq!(t.map().center.lat, 0.001);
        assert_eq!(t.live().gps_points, 2);
        assert!((t.live().distance_km - t.route().distance_km()).abs() < 1e-12);
        assert!(t.live().speed_kmh > 0.0);
        assert!(t.live().pace_min_per_km > 0.0);
    }

    #[test]
    fn test_stop_without_elapsed_time_saves_nothing() {
        let (mut t, rx) = tracker();
        t.start_run().unwrap();
        t.source().emit(fix(0.0, 0.0, 5.0));
        pump(&mut t, &rx);
        assert!(t.stop_run().is_none());
        assert_eq!(t.state(), RunState::Stopped);
        assert!(t.history().is_empty());
    }

    #[test]
    fn test_stop_saves_record() {
        let (mut t, rx) = tracker();
        t.start_run().unwrap();
        t.source().emit(fix(0.0, 0.0, 5.0));
        t.source().emit(fix(0.01, 0.0, 5.0));
        pump(&mut t, &rx);
        for _ in 0..300 {
            t.on_tick();
        }

        let record = t.stop_run().expect("record");
        assert_eq!(record.duration_seconds, 300);
        assert_eq!(record.gps_point_count, 2);
        assert!((record.distance_km - t.route().distance_km()).abs() < 1e-12);
        assert!((record.pace_min_per_km - 5.0 / record.distance_km).abs() < 1e-9);
        assert_eq!(record.calories_kcal, Some(78));
        assert_eq!(t.history().list(), vec![record]);
        assert_eq!(t.status().label, "✓ Run stopped");
        assert_matches!(
            t.take_notices().as_slice(),
            [Notice {
                level: NoticeLevel::Success,
                ..
            }]
        );
    }

    #[test]
    fn test_record_without_distance_has_no_calories() {
        let (mut t, _rx) = tracker();
        t.start_run().unwrap();
        t.on_tick();
        let record = t.stop_run().unwrap();
        assert_eq!(record.distance_km, 0.0);
        assert_eq!(record.pace_min_per_km, 0.0);
        assert_eq!(record.calories_kcal, None);
    }

    #[test]
    fn test_stop_twice_is_noop() {
        let (mut t, _rx) = tracker();
        t.start_run().unwrap();
        t.on_tick();
        assert!(t.stop_run().is_some());
        assert!(t.stop_run().is_none());
        assert_eq!(t.history().len(), 1);
    }

    #[test]
    fn test_stop_from_idle_is_noop() {
        let (mut t, _rx) = tracker();
        assert!(t.stop_run().is_none());
        assert_eq!(t.state(), RunState::Idle);
    }

    #[test]
    fn test_stop_cancels_watch_and_clock() {
        let (mut t, rx) = tracker();
        t.start_run().unwrap();
        let handle = t.active_watch().unwrap();
        t.on_tick();

        // queued before the stop, delivered after it
        t.source().emit(fix(1.0, 1.0, 5.0));
        t.stop_run();
        pump(&mut t, &rx);
        t.on_tick();

        assert_eq!(t.source().cleared_watches(), &[handle]);
        assert!(t.source().active_watch().is_none());
        assert!(!t.clock_running());
        assert!(t.route().is_empty());
        assert_eq!(t.elapsed_secs(), 1);
    }

    #[test]
    fn test_position_error_aborts_without_saving() {
        let (mut t, rx) = tracker();
        t.start_run().unwrap();
        t.source().emit(fix(0.0, 0.0, 5.0));
        for _ in 0..30 {
            t.on_tick();
        }
        t.source().fail(PositionError::Timeout);
        pump(&mut t, &rx);

        assert_eq!(t.state(), RunState::Stopped);
        assert!(!t.clock_running());
        assert!(t.active_watch().is_none());
        assert!(t.history().is_empty());
        assert_eq!(
            t.status(),
            &GpsStatus::new(
                StatusIndicator::Error,
                "GPS timed out. Try moving to an open area."
            )
        );
        assert!(t.stop_run().is_none());
    }

    #[test]
    fn test_restart_while_tracking_discards_old_run() {
        let (mut t, rx) = tracker();
        t.start_run().unwrap();
        let first = t.active_watch().unwrap();
        t.source().emit(fix(0.0, 0.0, 5.0));
        t.on_tick();
        t.on_tick();

        t.start_run().unwrap();
        let second = t.active_watch().unwrap();
        assert_ne!(first, second);
        assert_eq!(t.source().cleared_watches(), &[first]);

        // the fix queued by the first watch is stale now
        pump(&mut t, &rx);
        assert!(t.route().is_empty());
        assert_eq!(t.elapsed_secs(), 0);
        assert!(t.history().is_empty());
    }

    #[test]
    fn test_events_ignored_when_not_tracking() {
        let (mut t, _rx) = tracker();
        t.handle_position(PositionEvent::Fix {
            watch: WatchHandle(1),
            sample: fix(0.0, 0.0, 1.0),
        });
        assert!(t.route().is_empty());
        assert_eq!(t.state(), RunState::Idle);
    }

    #[test]
    fn test_status_returns_to_idle_after_stop() {
        let (mut t, _rx) = tracker();
        t.start_run().unwrap();
        t.on_tick();
        t.stop_run();
        for _ in 0..STATUS_RESET_SECS - 1 {
            t.on_tick();
            assert_eq!(t.status().label, "✓ Run stopped");
        }
        t.on_tick();
        assert_eq!(t.status(), &GpsStatus::idle());
    }

    #[test]
    fn test_toggle() {
        let (mut t, _rx) = tracker();
        t.toggle_run().unwrap();
        assert!(t.is_tracking());
        t.on_tick();
        t.toggle_run().unwrap();
        assert_eq!(t.state(), RunState::Stopped);
        assert_eq!(t.history().len(), 1);
        t.toggle_run().unwrap();
        assert!(t.is_tracking());
    }

    #[test]
    fn test_locate_centres_map() {
        let source = ScriptedPositionSource::new().with_initial_fix(Ok(fix(12.97, 77.59, 7.6)));
        let (mut t, _rx) = tracker_with(source);
        let got = t.locate().unwrap();
        assert_eq!(got.latitude, 12.97);
        assert_eq!(t.map().zoom, LOCATED_ZOOM);
        assert_eq!(t.map().center.lng, 77.59);
        assert_eq!(t.status().label, "Ready. GPS accuracy: ±8m");
    }

    #[test]
    fn test_locate_failure_is_reported() {
        let source =
            ScriptedPositionSource::new().with_initial_fix(Err(PositionError::PermissionDenied));
        let (mut t, _rx) = tracker_with(source);
        assert_eq!(
            t.locate(),
            Err(TrackerError::Position(PositionError::PermissionDenied))
        );
        assert_eq!(t.status().indicator, StatusIndicator::Error);
        assert_eq!(t.state(), RunState::Idle);
    }

    #[test]
    fn test_watch_uses_configured_options() {
        let (t, _rx) = tracker();
        let opts = WatchOptions {
            high_accuracy: false,
            ..WatchOptions::default()
        };
        let mut t = t.with_options(WatchOptions::default(), opts);
        t.start_run().unwrap();
        assert_eq!(t.source().last_options(), Some(opts));
    }
}
