//! Position source that replays a recorded track from CSV.
//!
//! Expected header: `latitude,longitude,accuracy_m,timestamp_ms[,error]`.
//! A row with a non-empty `error` column (`permission_denied`,
//! `position_unavailable`, `timeout`, `unknown`) is replayed as a failure.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Deserialize;

use crate::geo::GeoPoint;
use crate::positioning::{
    PositionCallback, PositionError, PositionEvent, PositionSource, WatchHandle, WatchOptions,
};

const CANCEL_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("failed to read replay file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid replay csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: sample has no coordinates")]
    MissingCoordinates { row: usize },
    #[error("row {row}: unknown error code '{code}'")]
    InvalidError { row: usize, code: String },
}

#[derive(Debug, Deserialize)]
struct ReplayRow {
    latitude: Option<f64>,
    longitude: Option<f64>,
    accuracy_m: Option<f64>,
    timestamp_ms: i64,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReplayStep {
    Fix(GeoPoint),
    Fail {
        timestamp_ms: i64,
        error: PositionError,
    },
}

impl ReplayStep {
    pub fn timestamp_ms(&self) -> i64 {
        match self {
            ReplayStep::Fix(p) => p.timestamp_ms,
            ReplayStep::Fail { timestamp_ms, .. } => *timestamp_ms,
        }
    }
}

pub fn parse_steps<R: Read>(reader: R) -> Result<Vec<ReplayStep>, ReplayError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut steps = Vec::new();
    for (idx, row) in rdr.deserialize::<ReplayRow>().enumerate() {
        let row = row?;
        // header is row 1
        let row_no = idx + 2;

        if let Some(code) = row.error.as_deref().filter(|c| !c.is_empty()) {
            let error = PositionError::from_code(code).ok_or_else(|| ReplayError::InvalidError {
                row: row_no,
                code: code.to_string(),
            })?;
            steps.push(ReplayStep::Fail {
                timestamp_ms: row.timestamp_ms,
                error,
            });
            continue;
        }

        let (Some(latitude), Some(longitude)) = (row.latitude, row.longitude) else {
            return Err(ReplayError::MissingCoordinates { row: row_no });
        };
        steps.push(ReplayStep::Fix(GeoPoint::new(
            latitude,
            longitude,
            row.accuracy_m.unwrap_or(0.0),
            row.timestamp_ms,
        )));
    }
    Ok(steps)
}

/// Replays steps on a background thread, sleeping for the recorded gaps
/// divided by `speed`.
#[derive(Debug)]
pub struct ReplayPositionSource {
    steps: Arc<Vec<ReplayStep>>,
    speed: f64,
    next_handle: u64,
    watches: HashMap<WatchHandle, Arc<AtomicBool>>,
}

impl ReplayPositionSource {
    pub fn new(steps: Vec<ReplayStep>, speed: f64) -> Self {
        Self {
            steps: Arc::new(steps),
            speed: if speed > 0.0 { speed } else { 1.0 },
            next_handle: 1,
            watches: HashMap::new(),
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P, speed: f64) -> Result<Self, ReplayError> {
        let file = std::fs::File::open(path)?;
        Ok(Self::new(parse_steps(file)?, speed))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn active_watches(&self) -> usize {
        self.watches.len()
    }
}

fn sleep_unless_cancelled(total: Duration, cancelled: &AtomicBool) -> bool {
    let mut remaining = total;
    while !remaining.is_zero() {
        if cancelled.load(Ordering::SeqCst) {
            return false;
        }
        let slice = remaining.min(CANCEL_POLL);
        thread::sleep(slice);
        remaining -= slice;
    }
    !cancelled.load(Ordering::SeqCst)
}

impl PositionSource for ReplayPositionSource {
    fn is_available(&self) -> bool {
        true
    }

    fn current_position(&mut self, _options: WatchOptions) -> Result<GeoPoint, PositionError> {
        match self.steps.first() {
            Some(ReplayStep::Fix(p)) => Ok(*p),
            Some(ReplayStep::Fail { error, .. }) => Err(*error),
            None => Err(PositionError::Timeout),
        }
    }

    fn watch(&mut self, options: WatchOptions, on_event: PositionCallback) -> WatchHandle {
        let handle = WatchHandle(self.next_handle);
        self.next_handle += 1;

        let cancelled = Arc::new(AtomicBool::new(false));
        self.watches.insert(handle, cancelled.clone());

        let steps = self.steps.clone();
        let speed = self.speed;
        thread::spawn(move || {
            let mut previous_ts: Option<i64> = None;
            for step in steps.iter() {
                let gap_ms = previous_ts
                    .map(|prev| (step.timestamp_ms() - prev).max(0) as u64)
                    .unwrap_or(0);
                previous_ts = Some(step.timestamp_ms());

                let gap = Duration::from_millis(gap_ms);
                if gap > options.timeout {
                    if sleep_unless_cancelled(options.timeout.div_f64(speed), &cancelled) {
                        on_event(PositionEvent::Failed {
                            watch: handle,
                            error: PositionError::Timeout,
                        });
                    }
                    return;
                }

                if !sleep_unless_cancelled(gap.div_f64(speed), &cancelled) {
                    return;
                }

                let event = match *step {
                    ReplayStep::Fix(sample) => PositionEvent::Fix {
                        watch: handle,
                        sample,
                    },
                    ReplayStep::Fail { error, .. } => PositionEvent::Failed {
                        watch: handle,
                        error,
                    },
                };
                let terminal = matches!(event, PositionEvent::Failed { .. });
                on_event(event);
                if terminal {
                    return;
                }
            }
            tracing::debug!(watch = handle.0, "replay exhausted");
        });

        tracing::debug!(watch = handle.0, steps = self.steps.len(), speed, "replay watch started");
        handle
    }

    fn clear_watch(&mut self, handle: WatchHandle) {
        if let Some(flag) = self.watches.remove(&handle) {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

impl Drop for ReplayPositionSource {
    fn drop(&mut self) {
        for flag in self.watches.values() {
            flag.store(true, Ordering::SeqCst);
        }
    }
}
