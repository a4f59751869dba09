//! The `throttle` module applies both layers of admission control.
//!
//! The concurrency gate counts workers in flight against a hard limit and
//! drives the engine callback that pauses or resumes queue polling, giving
//! the broker backpressure. The rate limiter admits messages against sliding
//! time windows: each configured message pattern owns its own window, with a
//! queue-wide window as the fallback.
//!
//! Rejection has no side effect beyond the decision itself; the message is
//! left for the queue service's redelivery mechanism to retry later.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::config::ThrottleSettings;


/// Callback wired to the queue service: `(start, stop)`.
pub type Engine = Box<dyn Fn(bool, bool) + Send + Sync>;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Rejected,
}

/// Unit of measurement for a rate-limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateUnit {
    Second,
    Minute,
    FiveMinute,
    QuarterHour,
    HalfHour,
    Hour,
    Day,
}

impl RateUnit {
    /// Parse a configured unit name, falling back to `Minute` for anything
    /// unrecognised.
    fn parse(name: &str) -> RateUnit {
        match name {
            "second" => RateUnit::Second,
            "five-minute" => RateUnit::FiveMinute,
            "quarter-hour" => RateUnit::QuarterHour,
            "half-hour" => RateUnit::HalfHour,
            "hour" => RateUnit::Hour,
            "day" => RateUnit::Day,
            _ => RateUnit::Minute,
        }
    }

    fn duration(self) -> Duration {
        match self {
            RateUnit::Second => Duration::seconds(1),
            RateUnit::Minute => Duration::minutes(1),
            RateUnit::FiveMinute => Duration::minutes(5),
            RateUnit::QuarterHour => Duration::minutes(15),
            RateUnit::HalfHour => Duration::minutes(30),
            RateUnit::Hour => Duration::hours(1),
            RateUnit::Day => Duration::days(1),
        }
    }
}

/// Concurrency gate state.
#[derive(Debug)]
struct Gauge {
    limit: usize,
    count: usize,
}

/// One sliding rate-limit window: admitted-event timestamps bounded by
/// `value` per `value × unit`.
#[derive(Debug)]
struct Window {
    unit: RateUnit,
    value: usize,
    history: Vec<DateTime<Utc>>,
}

impl Window {
    fn new(unit: &str, value: usize) -> Self {
        Self {
            unit: RateUnit::parse(unit),
            value,
            history: Vec::new(),
        }
    }

    fn admit(&mut self, now: DateTime<Utc>) -> Admission {
        // zero means unlimited
        if self.value == 0 {
            return Admission::Accepted;
        }

        self.prune(now);

        if self.history.len() < self.value {
            self.history.push(now);
            Admission::Accepted
        } else {
            Admission::Rejected
        }
    }

    /// Discard history entries older than `now − value × unit`. The span is
    /// computed in milliseconds and clamped so oversized values cannot wrap
    /// the cutoff.
    fn prune(&mut self, now: DateTime<Utc>) {
        let span = self
            .unit
            .duration()
            .num_milliseconds()
            .saturating_mul(i64::try_from(self.value).unwrap_or(i64::MAX));
        let cutoff = now
            .checked_sub_signed(Duration::milliseconds(span))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.history.retain(|stamp| *stamp >= cutoff);
    }
}

/// A rate limit scoped to messages matching a pattern.
struct MessageLimit {
    pattern: Regex,
    window: Mutex<Window>,
}

/// Admission control: the concurrency gate plus the sliding-window rate
/// limiter.
pub struct Throttle {
    engine: Engine,
    workers: Mutex<Gauge>,
    queue: Mutex<Window>,
    messages: Vec<MessageLimit>,
}

impl Throttle {
    /// Build the throttle from configuration, compiling one pattern per
    /// message-specific limit.
    pub fn new(settings: &ThrottleSettings, engine: Engine) -> Result<Self, regex::Error> {
        let messages = settings
            .messages
            .iter()
            .map(|limit| {
                Ok(MessageLimit {
                    pattern: Regex::new(&limit.regex)?,
                    window: Mutex::new(Window::new(&limit.unit, limit.value)),
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            engine,
            workers: Mutex::new(Gauge {
                limit: settings.workers,
                count: 0,
            }),
            queue: Mutex::new(Window::new(&settings.queue.unit, settings.queue.value)),
            messages,
        })
    }

    /// Adds `1` to the in-flight worker count.
    pub fn increase(&self) {
        self.adjust(1);
    }

    /// Subtracts `1` from the in-flight worker count.
    pub fn decrease(&self) {
        self.adjust(-1);
    }

    /// The current in-flight worker count.
    pub fn count(&self) -> usize {
        self.workers.lock().unwrap().count
    }

    /// Apply an adjustment to the worker count, firing the engine callback
    /// at the limit boundary and saturating out-of-range adjustments.
    fn adjust(&self, amt: i64) {
        let mut gauge = self.workers.lock().unwrap();
        let adjusted = gauge.count as i64 + amt;

        // if either side of the tipping point, call the supplied engine
        // function which can start or stop the queue polling
        if adjusted == gauge.limit as i64 || gauge.count == gauge.limit {
            (self.engine)(amt < 0, amt > 0);
        }

        if adjusted >= 0 && adjusted <= gauge.limit as i64 {
            gauge.count = adjusted as usize;
        }
    }

    /// Decide whether to admit a message this cycle.
    ///
    /// The first configured pattern matching the full message body governs
    /// the decision; without a match the queue-wide window applies.
    pub fn admit(&self, body: &str) -> Admission {
        self.admit_at(body, Utc::now())
    }

    pub(crate) fn admit_at(&self, body: &str, now: DateTime<Utc>) -> Admission {
        for limit in &self.messages {
            if limit.pattern.is_match(body) {
                return limit.window.lock().unwrap().admit(now);
            }
        }

        self.queue.lock().unwrap().admit(now)
    }
}
