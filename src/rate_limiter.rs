//! Sliding-window request pacing for the metadata search provider.
//!
//! The limiter keeps one timestamp log and checks it against every configured
//! window before letting a request through. Waiting goes through [`Clock`] so
//! tests can drive time by hand.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::{debug, info};

/// Jikan allows 3 requests per second.
pub const JIKAN_PER_SECOND_LIMIT: usize = 3;
/// Jikan allows 60 requests per minute.
pub const JIKAN_PER_MINUTE_LIMIT: usize = 60;

/// Source of time and the only place the process is allowed to block.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Clock that only moves when told to. Sleeping advances it instantly.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: std::cell::Cell<Duration>,
    slept: std::cell::Cell<Duration>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: std::cell::Cell::new(Duration::ZERO),
            slept: std::cell::Cell::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.elapsed.set(self.elapsed.get() + duration);
    }

    /// Total time spent in `sleep`, excluding manual `advance` calls.
    pub fn total_slept(&self) -> Duration {
        self.slept.get()
    }
}

#[cfg(test)]
impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed.get()
    }

    fn sleep(&self, duration: Duration) {
        self.slept.set(self.slept.get() + duration);
        self.advance(duration);
    }
}

/// One cap: at most `max_requests` inside any trailing `span`. A cap of zero
/// is treated as one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub max_requests: usize,
    pub span: Duration,
}

impl RateWindow {
    pub const fn new(max_requests: usize, span: Duration) -> Self {
        Self { max_requests, span }
    }
}

/// Blocking limiter enforcing several sliding windows over one timestamp log.
pub struct RateLimiter<'c> {
    label: &'static str,
    windows: Vec<RateWindow>,
    retention: Duration,
    timestamps: RefCell<VecDeque<Instant>>,
    clock: &'c dyn Clock,
}

impl<'c> RateLimiter<'c> {
    pub fn new(label: &'static str, windows: Vec<RateWindow>, clock: &'c dyn Clock) -> Self {
        let windows = windows
            .into_iter()
            .map(|window| RateWindow::new(window.max_requests.max(1), window.span))
            .collect::<Vec<_>>();
        let retention = windows
            .iter()
            .map(|window| window.span)
            .max()
            .unwrap_or(Duration::ZERO);
        Self {
            label,
            windows,
            retention,
            timestamps: RefCell::new(VecDeque::new()),
            clock,
        }
    }

    /// Limiter configured with the Jikan caps.
    pub fn jikan(clock: &'c dyn Clock) -> Self {
        Self::new(
            "Jikan",
            vec![
                RateWindow::new(JIKAN_PER_SECOND_LIMIT, Duration::from_secs(1)),
                RateWindow::new(JIKAN_PER_MINUTE_LIMIT, Duration::from_secs(60)),
            ],
            clock,
        )
    }

    /// Blocks until a request fits inside every window, then records it.
    pub fn acquire(&self) {
        loop {
            let now = self.clock.now();
            let wait = {
                let mut timestamps = self.timestamps.borrow_mut();
                self.evict_expired(&mut timestamps, now);
                match self.required_wait(&timestamps, now) {
                    None => {
                        timestamps.push_back(now);
                        return;
                    }
                    Some(wait) => wait,
                }
            };

            if wait >= Duration::from_secs(1) {
                info!("{} rate limit reached, waiting {:?}", self.label, wait);
            } else {
                debug!("{} rate limit pacing, waiting {:?}", self.label, wait);
            }
            self.clock.sleep(wait);
        }
    }

    /// Number of requests currently remembered.
    #[cfg(test)]
    pub fn recorded(&self) -> usize {
        self.timestamps.borrow().len()
    }

    fn evict_expired(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while timestamps
            .front()
            .is_some_and(|timestamp| now.saturating_duration_since(*timestamp) >= self.retention)
        {
            timestamps.pop_front();
        }
    }

    fn required_wait(&self, timestamps: &VecDeque<Instant>, now: Instant) -> Option<Duration> {
        self.windows
            .iter()
            .filter_map(|window| {
                let in_window = timestamps
                    .iter()
                    .rev()
                    .take_while(|timestamp| now.saturating_duration_since(**timestamp) < window.span)
                    .count();
                if in_window < window.max_requests {
                    return None;
                }
                let oldest = timestamps.get(timestamps.len().checked_sub(in_window)?)?;
                let elapsed = now.saturating_duration_since(*oldest);
                Some(window.span.saturating_sub(elapsed).max(Duration::from_millis(1)))
            })
            .max()
    }

    #[cfg(test)]
    fn snapshot(&self) -> Vec<Instant> {
        self.timestamps.borrow().iter().copied().collect()
    }
}
