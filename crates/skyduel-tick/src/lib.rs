//! Fixed-period tick scheduler for skyduel.
//!
//! One scheduler drives one session's simulator. It lives inside the
//! session actor's `tokio::select!` loop so commands keep being served
//! between ticks:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* lifecycle commands */ }
//!         info = scheduler.wait_for_tick() => {
//!             let snapshot = world.step(inputs.take_all());
//!             if scheduler.record_tick_end() >= Budget::Warning { /* log */ }
//!         }
//!     }
//! }
//! ```
//!
//! The tick number handed out here is the single ordering authority for a
//! session: snapshots carry it and every consumer orders by it.

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the loop wakes up late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Forget the missed ticks and schedule the next one a full period
    /// from now.
    #[default]
    Skip,
    /// Keep the original cadence; the next deadline may already have
    /// passed, in which case the next tick fires immediately.
    Drop,
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks.
    pub period: Duration,
    pub policy: TickPolicy,
    /// Fraction of the period (0.0–1.0) above which a tick logs a warning.
    pub budget_warn_threshold: f64,
    /// Fraction of the period (0.0–1.0) above which a tick logs a
    /// critical warning.
    pub budget_critical_threshold: f64,
    /// Upper bound of random delay added before the first tick, so
    /// sessions started together do not tick in lockstep.
    pub initial_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            period: Self::DEFAULT_PERIOD,
            policy: TickPolicy::default(),
            budget_warn_threshold: 0.80,
            budget_critical_threshold: 1.0,
            initial_jitter: Duration::from_millis(2),
        }
    }
}

impl TickConfig {
    /// 16 ms, roughly 60 Hz.
    pub const DEFAULT_PERIOD: Duration = Duration::from_millis(16);
    /// Shortest accepted period.
    pub const MIN_PERIOD: Duration = Duration::from_millis(1);

    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values. Called by [`TickScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.period < Self::MIN_PERIOD {
            warn!(
                period_us = self.period.as_micros() as u64,
                "tick period below minimum, clamping"
            );
            self.period = Self::MIN_PERIOD;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self.budget_critical_threshold = self.budget_critical_threshold.clamp(0.0, 1.0);
        if self.budget_warn_threshold > self.budget_critical_threshold {
            self.budget_warn_threshold = self.budget_critical_threshold;
        }
        self
    }

    fn grade(&self, share: f64) -> Budget {
        if share >= self.budget_critical_threshold {
            Budget::Critical
        } else if share >= self.budget_warn_threshold {
            Budget::Warning
        } else {
            Budget::Within
        }
    }
}

// ---------------------------------------------------------------------------
// Tick info and metrics
// ---------------------------------------------------------------------------

/// Returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInfo {
    /// Starts at 1 and increases by exactly one per tick.
    pub tick: u64,
    /// The fixed period; simulators advance by this, never by wall time.
    pub dt: Duration,
    /// The loop woke up more than 10% of a period late.
    pub overrun: bool,
    /// Whole periods missed before this tick.
    pub ticks_skipped: u64,
}

/// How much of its period a tick used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Budget {
    Within,
    /// At or above `budget_warn_threshold`.
    Warning,
    /// At or above `budget_critical_threshold`.
    Critical,
}

/// Counters maintained by the scheduler.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    pub max_tick_time: Duration,
    /// Share of the period used by the last recorded tick.
    pub budget_utilization: f64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    next_tick: TokioInstant,
    tick_start: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Creates a scheduler whose first tick is one period (plus jitter)
    /// from now.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let jitter = if config.initial_jitter.is_zero() {
            Duration::ZERO
        } else {
            let max = config.initial_jitter.as_micros() as u64;
            Duration::from_micros(rand::rng().random_range(0..max.max(1)))
        };
        debug!(
            period_ms = config.period.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            "tick scheduler created"
        );
        Self {
            next_tick: TokioInstant::now() + config.period + jitter,
            config,
            tick_count: 0,
            tick_start: None,
            metrics: TickMetrics::default(),
        }
    }

    pub fn with_period(period: Duration) -> Self {
        Self::new(TickConfig::with_period(period))
    }

    /// Sleeps until the next deadline and returns its [`TickInfo`].
    ///
    /// Cancel-safe: dropping the future before it completes leaves the
    /// schedule untouched.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let deadline = self.next_tick;
        let period = self.config.period;
        time::sleep_until(deadline).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(deadline);
        let overrun = late_by > period / 10;
        let (next_tick, ticks_skipped) = match self.config.policy {
            TickPolicy::Skip if overrun => {
                (now + period, (late_by.as_nanos() / period.as_nanos()) as u64)
            }
            TickPolicy::Skip => (now + period, 0),
            TickPolicy::Drop => (deadline + period, 0),
        };
        self.next_tick = next_tick;

        if overrun {
            warn!(
                tick = self.tick_count,
                policy = ?self.config.policy,
                skipped = ticks_skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "tick overrun"
            );
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;
        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt: period,
            overrun,
            ticks_skipped,
        }
    }

    /// Marks the end of the work for the current tick and grades it
    /// against the period. Callers log the grade with their own context.
    pub fn record_tick_end(&mut self) -> Budget {
        let Some(start) = self.tick_start.take() else {
            return Budget::Within;
        };
        let elapsed = start.elapsed();
        let share = elapsed.as_secs_f64() / self.config.period.as_secs_f64();
        self.metrics.budget_utilization = share;
        self.metrics.max_tick_time = self.metrics.max_tick_time.max(elapsed);
        self.config.grade(share)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn period(&self) -> Duration {
        self.config.period
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }
}
