use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::engine::{Effect, Event};
use crate::geo::LatLon;
use crate::session::TimerId;
use log::warn;

/// A line of player input
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Guess(LatLon),
    Text(String),
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Command {
        let line = line.trim();
        match line {
            "q" | "quit" | "exit" => Command::Quit,
            _ => match line.parse::<LatLon>() {
                Ok(p) => Command::Guess(p),
                Err(_) => Command::Text(line.to_string()),
            },
        }
    }
}

/// Unified event type consumed by the app runner
#[derive(Clone, Debug, PartialEq)]
pub enum RuntimeEvent {
    Input(Command),
    Tick,
}

/// Source of player input events
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<RuntimeEvent, RecvTimeoutError>;
}

/// Production event source reading lines on a background thread
pub struct LineEventSource {
    rx: Receiver<RuntimeEvent>,
}

impl LineEventSource {
    pub fn new<R: BufRead + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if tx.send(RuntimeEvent::Input(Command::parse(&line))).is_err() {
                    return;
                }
            }
            // End of input
            let _ = tx.send(RuntimeEvent::Input(Command::Quit));
        });

        Self { rx }
    }

    pub fn stdin() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()))
    }
}

impl EventSource for LineEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<RuntimeEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
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
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<RuntimeEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<RuntimeEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<RuntimeEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> RuntimeEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                RuntimeEvent::Tick
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Countdown {
    timer: TimerId,
    period: Duration,
    next: Instant,
}

#[derive(Debug, Clone)]
struct Pending {
    timer: TimerId,
    due: Instant,
    event: Event,
}

/// Wall-clock bookkeeping for the engine's countdown and delayed event.
/// Holds at most one of each; starting a new one replaces the old.
#[derive(Debug, Default)]
pub struct Timers {
    countdown: Option<Countdown>,
    pending: Option<Pending>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, effect: &Effect, now: Instant) {
        match effect {
            Effect::StartCountdown { timer, period } => {
                let period = (*period).max(Duration::from_millis(1));
                self.countdown = now.checked_add(period).map(|next| Countdown {
                    timer: *timer,
                    period,
                    next,
                });
                if self.countdown.is_none() {
                    warn!("countdown period {period:?} is out of range, not ticking");
                }
            }
            Effect::Schedule {
                timer,
                after,
                event,
            } => {
                self.pending = now.checked_add(*after).map(|due| Pending {
                    timer: *timer,
                    due,
                    event: event.clone(),
                });
                if self.pending.is_none() {
                    warn!("delay {after:?} is out of range, {event:?} will not fire");
                }
            }
            Effect::Cancel { timer } => {
                if self.countdown.as_ref().is_some_and(|c| c.timer == *timer) {
                    self.countdown = None;
                }
                if self.pending.as_ref().is_some_and(|p| p.timer == *timer) {
                    self.pending = None;
                }
            }
            _ => {}
        }
    }

    /// Next event due at or before `now`, earliest first, with its due time
    pub fn next_due(&mut self, now: Instant) -> Option<(Instant, Event)> {
        let tick_at = self.countdown.as_ref().map(|c| c.next).filter(|t| *t <= now);
        let pending_at = self.pending.as_ref().map(|p| p.due).filter(|t| *t <= now);

        match (tick_at, pending_at) {
            (Some(t), Some(p)) if p < t => self.take_pending(),
            (Some(_), _) => self.fire_countdown(),
            (None, Some(_)) => self.take_pending(),
            (None, None) => None,
        }
    }

    fn take_pending(&mut self) -> Option<(Instant, Event)> {
        self.pending.take().map(|p| (p.due, p.event))
    }

    fn fire_countdown(&mut self) -> Option<(Instant, Event)> {
        let countdown = self.countdown.as_mut()?;
        let at = countdown.next;
        let timer = countdown.timer;
        match at.checked_add(countdown.period) {
            Some(next) => countdown.next = next,
            None => self.countdown = None,
        }
        Some((at, Event::Tick { timer }))
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        let tick = self.countdown.as_ref().map(|c| c.next);
        let pending = self.pending.as_ref().map(|p| p.due);
        match (tick, pending) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.countdown.is_none() && self.pending.is_none()
    }
}
