//! Boundary to whatever reports device position.
//!
//! The tracker only sees [`PositionSource`]: a one-shot fix plus a continuous,
//! cancellable watch whose events are pushed through a callback onto the
//! single event queue.

use std::sync::Arc;
use std::time::Duration;

use crate::geo::GeoPoint;

/// Classified positioning failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("timed out waiting for a position")]
    Timeout,
    #[error("unknown positioning error")]
    Unknown,
}

impl PositionError {
    /// Text for the status line and error toast
    pub fn user_message(&self) -> &'static str {
        match self {
            PositionError::PermissionDenied => {
                "Location access denied. Please allow location access in your settings."
            }
            PositionError::PositionUnavailable => {
                "Position unavailable. Check your GPS or network connection."
            }
            PositionError::Timeout => "GPS timed out. Try moving to an open area.",
            PositionError::Unknown => "Unknown geolocation error.",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "permission_denied" => Some(PositionError::PermissionDenied),
            "position_unavailable" => Some(PositionError::PositionUnavailable),
            "timeout" => Some(PositionError::Timeout),
            "unknown" => Some(PositionError::Unknown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Cached fixes older than this are not reused; always zero here
    pub maximum_age: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_millis(10_000),
            maximum_age: Duration::ZERO,
        }
    }
}

/// Identifies one continuous subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionEvent {
    Fix { watch: WatchHandle, sample: GeoPoint },
    Failed { watch: WatchHandle, error: PositionError },
}

impl PositionEvent {
    pub fn watch(&self) -> WatchHandle {
        match self {
            PositionEvent::Fix { watch, .. } | PositionEvent::Failed { watch, .. } => *watch,
        }
    }
}

pub type PositionCallback = Arc<dyn Fn(PositionEvent) + Send + Sync>;

pub trait PositionSource {
    /// False when the platform has no positioning capability at all
    fn is_available(&self) -> bool;

    /// One-shot fix, bounded by `options.timeout`
    fn current_position(&mut self, options: WatchOptions) -> Result<GeoPoint, PositionError>;

    /// Start continuous updates; every event is tagged with the returned handle
    fn watch(&mut self, options: WatchOptions, on_event: PositionCallback) -> WatchHandle;

    /// Stop a subscription. Events already queued may still arrive carrying
    /// the cleared handle; the consumer drops them.
    fn clear_watch(&mut self, handle: WatchHandle);
}

/// Platform without any positioning capability
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPositioning;

impl PositionSource for NoPositioning {
    fn is_available(&self) -> bool {
        false
    }

    fn current_position(&mut self, _options: WatchOptions) -> Result<GeoPoint, PositionError> {
        Err(PositionError::PositionUnavailable)
    }

    fn watch(&mut self, _options: WatchOptions, _on_event: PositionCallback) -> WatchHandle {
        WatchHandle(0)
    }

    fn clear_watch(&mut self, _handle: WatchHandle) {}
}

/// Test source: scripted samples are pushed by the test through the active watch
pub struct ScriptedPositionSource {
    available: bool,
    initial_fix: Result<GeoPoint, PositionError>,
    active: Option<(WatchHandle, PositionCallback)>,
    next_handle: u64,
    cleared: Vec<WatchHandle>,
    last_options: Option<WatchOptions>,
}

impl ScriptedPositionSource {
    pub fn new() -> Self {
        Self {
            available: true,
            initial_fix: Err(PositionError::Timeout),
            active: None,
            next_handle: 1,
            cleared: Vec::new(),
            last_options: None,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn with_initial_fix(mut self, fix: Result<GeoPoint, PositionError>) -> Self {
        self.initial_fix = fix;
        self
    }

    pub fn active_watch(&self) -> Option<WatchHandle> {
        self.active.as_ref().map(|(h, _)| *h)
    }

    pub fn cleared_watches(&self) -> &[WatchHandle] {
        &self.cleared
    }

    pub fn last_options(&self) -> Option<WatchOptions> {
        self.last_options
    }

    /// Deliver a fix through the active watch. Returns false if nothing is subscribed.
    pub fn emit(&self, sample: GeoPoint) -> bool {
        match &self.active {
            Some((watch, cb)) => {
                cb(PositionEvent::Fix {
                    watch: *watch,
                    sample,
                });
                true
            }
            None => false,
        }
    }

    pub fn fail(&self, error: PositionError) -> bool {
        match &self.active {
            Some((watch, cb)) => {
                cb(PositionEvent::Failed {
                    watch: *watch,
                    error,
                });
                true
            }
            None => false,
        }
    }
}

impl Default for ScriptedPositionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionSource for ScriptedPositionSource {
    fn is_available(&self) -> bool {
        self.available
    }

    fn current_position(&mut self, _options: WatchOptions) -> Result<GeoPoint, PositionError> {
        self.initial_fix
    }

    fn watch(&mut self, options: WatchOptions, on_event: PositionCallback) -> WatchHandle {
        let handle = WatchHandle(self.next_handle);
        self.next_handle += 1;
        self.last_options = Some(options);
        self.active = Some((handle, on_event));
        handle
    }

    fn clear_watch(&mut self, handle: WatchHandle) {
        if self.active_watch() == Some(handle) {
            self.active = None;
        }
        self.cleared.push(handle);
    }
}
