//! Automation scheduler — polls enabled rules against the wall clock.
//!
//! One long-lived task per process. Each tick evaluates every enabled rule
//! sequentially; a rule that fails is logged and retried on the next tick
//! because its running flag is left untouched.

use std::time::Duration;

use dwell_domain::engine::{self, Direction};
use dwell_domain::error::DwellError;
use dwell_domain::time::{self, TimeOfDay};

use crate::ports::{AutomationRepository, DeviceRepository};
use crate::transition::{self, ApplyMode};

/// Default polling interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of a single tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub evaluated: usize,
    pub activated: usize,
    pub deactivated: usize,
    /// Transitions committed with at least one skipped binding.
    pub partial: usize,
    /// Rules whose transition was rolled back.
    pub failed: usize,
}

/// Periodic evaluator of automation rules.
pub struct Scheduler<D, A> {
    devices: D,
    rules: A,
    interval: Duration,
    clock: fn() -> TimeOfDay,
}

impl<D, A> Scheduler<D, A>
where
    D: DeviceRepository,
    A: AutomationRepository,
{
    /// Create a scheduler reading the local wall clock.
    pub fn new(devices: D, rules: A, interval: Duration) -> Self {
        Self {
            devices,
            rules,
            interval,
            clock: time::local_time_of_day,
        }
    }

    /// Replace the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> TimeOfDay) -> Self {
        self.clock = clock;
        self
    }

    /// Tick forever. A tick that falls behind is skipped, never run back-to-back.
    pub async fn run(self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "scheduler started");
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let now = (self.clock)();
            match self.tick_at(now).await {
                Ok(report) if report.activated + report.deactivated + report.failed > 0 => {
                    tracing::info!(?report, %now, "scheduler tick");
                }
                Ok(report) => tracing::debug!(?report, %now, "scheduler tick"),
                Err(err) => tracing::error!(error = %err, "failed to load automation rules"),
            }
        }
    }

    /// Evaluate every enabled rule at `now`.
    ///
    /// Rules that are disabled but still running are included so they get
    /// restored.
    ///
    /// # Errors
    ///
    /// Returns an error only when the rule list cannot be loaded. Failures
    /// on individual rules are counted in the report.
    pub async fn tick_at(&self, now: TimeOfDay) -> Result<TickReport, DwellError> {
        let rules = self.rules.get_schedulable().await?;
        let mut report = TickReport::default();

        for rule in rules {
            report.evaluated += 1;
            let decision = engine::decide(now, &rule);
            let Some(direction) = decision.direction() else {
                continue;
            };

            let rule_id = rule.id;
            match transition::apply_rule(&self.devices, &self.rules, rule, direction, ApplyMode::Lenient)
                .await
            {
                Ok(applied) => {
                    if let Some(partial) = &applied.partial {
                        tracing::warn!(%rule_id, error = %partial, "automation partially applied");
                        report.partial += 1;
                    }
                    match direction {
                        Direction::Activate => report.activated += 1,
                        Direction::Deactivate => report.deactivated += 1,
                    }
                }
                Err(err) => {
                    tracing::error!(%rule_id, ?decision, error = %err, "automation transition failed");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
