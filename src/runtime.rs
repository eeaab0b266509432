use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent};

use crate::coach::CoachReply;
use crate::positioning::{PositionCallback, PositionEvent};

/// Everything the UI thread reacts to, multiplexed onto one queue
#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    /// One wall-clock second
    Tick,
    Position(PositionEvent),
    Coach(CoachReply),
}

/// Queue the UI thread drains
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;

    /// Handle for background producers (position watches, coach requests)
    fn sender(&self) -> Sender<AppEvent>;
}

/// Wrap a queue sender as the callback handed to position watches
pub fn position_callback(tx: Sender<AppEvent>) -> PositionCallback {
    Arc::new(move |ev| {
        // receiver gone means the app is shutting down
        let _ = tx.send(AppEvent::Position(ev));
    })
}

/// Production event source: a reader thread forwards crossterm events
pub struct CrosstermEventSource {
    tx: Sender<AppEvent>,
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let reader_tx = tx.clone();

        std::thread::spawn(move || loop {
            let forwarded = match event::read() {
                Ok(CtEvent::Key(key)) => reader_tx.send(AppEvent::Key(key)),
                Ok(CtEvent::Resize(_, _)) => reader_tx.send(AppEvent::Resize),
                Ok(_) => Ok(()),
                Err(e) => {
                    tracing::error!(error = %e, "terminal event reader stopped");
                    break;
                }
            };
            if forwarded.is_err() {
                break;
            }
        });

        Self { tx, rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn sender(&self) -> Sender<AppEvent> {
        self.tx.clone()
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn every_second() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source: the test keeps the sender and scripts the queue
pub struct TestEventSource {
    tx: Sender<AppEvent>,
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }
}

impl Default for TestEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn sender(&self) -> Sender<AppEvent> {
        self.tx.clone()
    }
}

/// Advances the application one event at a time.
///
/// Ticks follow a wall-clock deadline, so a busy queue cannot starve or
/// stretch the run clock.
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    next_tick: Instant,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        let next_tick = Instant::now() + ticker.interval();
        Self {
            event_source,
            ticker,
            next_tick,
        }
    }

    pub fn sender(&self) -> Sender<AppEvent> {
        self.event_source.sender()
    }

    /// Blocks until the next event or the tick deadline, whichever comes first
    pub fn step(&mut self) -> AppEvent {
        let now = Instant::now();
        if now >= self.next_tick {
            return self.fire_tick();
        }

        match self.event_source.recv_timeout(self.next_tick - now) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                self.fire_tick()
            }
        }
    }

    /// Next tick one full interval from now
    pub fn restart_tick(&mut self) {
        self.next_tick = Instant::now() + self.ticker.interval();
    }

    fn fire_tick(&mut self) -> AppEvent {
        self.next_tick += self.ticker.interval();
        AppEvent::Tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::positioning::WatchHandle;
    use assert_matches::assert_matches;

    #[test]
    fn restart_tick_moves_the_deadline() {
        let es = TestEventSource::new();
        let tx = es.sender();
        let mut runner = Runner::new(es, FixedTicker::new(Duration::from_millis(200)));

        std::thread::sleep(Duration::from_millis(150));
        runner.restart_tick();
        std::thread::sleep(Duration::from_millis(100));

        // past the original deadline, not the restarted one
        tx.send(AppEvent::Resize).unwrap();
        assert_matches!(runner.step(), AppEvent::Resize);
    }

    #[test]
    fn step_returns_tick_on_timeout() {
        let es = TestEventSource::new();
        let ticker = FixedTicker::new(Duration::from_millis(1));
        let mut runner = Runner::new(es, ticker);

        assert_matches!(runner.step(), AppEvent::Tick);
    }

    #[test]
    fn step_passes_through_events() {
        let es = TestEventSource::new();
        es.sender().send(AppEvent::Resize).unwrap();
        let ticker = FixedTicker::new(Duration::from_secs(10));
        let mut runner = Runner::new(es, ticker);

        assert_matches!(runner.step(), AppEvent::Resize);
    }

    #[test]
    fn busy_queue_still_ticks() {
        let es = TestEventSource::new();
        let tx = es.sender();
        let mut runner = Runner::new(es, FixedTicker::new(Duration::from_millis(200)));

        for _ in 0..1000 {
            tx.send(AppEvent::Resize).unwrap();
        }
        std::thread::sleep(Duration::from_millis(250));

        // deadline already passed: the tick comes before the backlog
        assert_matches!(runner.step(), AppEvent::Tick);
        assert_matches!(runner.step(), AppEvent::Resize);
    }

    #[test]
    fn position_callback_feeds_queue() {
        let es = TestEventSource::new();
        let cb = position_callback(es.sender());
        cb(PositionEvent::Fix {
            watch: WatchHandle(3),
            sample: GeoPoint::new(1.0, 2.0, 5.0, 0),
        });
        let mut runner = Runner::new(es, FixedTicker::new(Duration::from_secs(10)));

        assert_matches!(
            runner.step(),
            AppEvent::Position(PositionEvent::Fix {
                watch: WatchHandle(3),
                ..
            })
        );
    }
}
