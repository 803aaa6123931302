// Sequential poll loop over all targets.
//
// Cheap path first: read the page's own count and stop there when it matches
// the recorded one. Only a changed count pays for a reveal pass, a diff and a
// save. Per-target failures are contained; driver failures get a bounded
// retry with backoff and, when they keep coming back, an alert.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use threadwatch_common::{
    AlertEvent, BrowserDriver, Config, DomView, KnownState, NewItemsEvent, RevealTunables,
    StateMap, Target, WatchError,
};

use crate::change_detector::ChangeDetector;
use crate::estimator::CountEstimator;
use crate::notify::Notifier;
use crate::page;
use crate::patterns::PatternTable;
use crate::revealer::{RevealerEngine, Termination};
use crate::store::StateStore;

#[derive(Debug, Clone, PartialEq)]
pub struct PollSettings {
    pub poll_interval: Duration,
    /// Retries per target after a transient driver failure.
    pub driver_retries: u32,
    /// Consecutive failed cycles before an alert; repeats every N. 0 disables.
    pub alert_after_failures: u32,
    /// First retry delay; doubles on each further attempt.
    pub retry_base: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(300),
            driver_retries: 3,
            alert_after_failures: 3,
            retry_base: Duration::from_secs(2),
        }
    }
}

impl PollSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval,
            driver_retries: config.driver_retries,
            alert_after_failures: config.alert_after_failures,
            ..Self::default()
        }
    }

    /// `retry_base * 2^(attempt-1)` plus up to one `retry_base` of jitter.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.retry_base.as_millis() as u64;
        let exp = base.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
        let jitter = rand::rng().random_range(0..=base);
        Duration::from_millis(exp + jitter)
    }

    /// Poll interval stretched by up to 10%.
    fn next_cycle_delay(&self) -> Duration {
        let base = self.poll_interval.as_millis() as u64;
        let jitter = rand::rng().random_range(0..=base / 10);
        Duration::from_millis(base + jitter)
    }
}

/// What happened to one target in one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    /// No count signal on the page; nothing was touched.
    NoSignal,
    /// The count matches the recorded one.
    Unchanged,
    /// First observation. State recorded, no event.
    Baseline { known: usize },
    Changed { new_items: usize, recovered: bool },
    /// Cancelled mid-reveal; state left as it was.
    Cancelled,
}

#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    pub targets: u32,
    pub no_signal: u32,
    pub unchanged: u32,
    pub baselines: u32,
    pub changed: u32,
    pub new_items: u32,
    pub failed: u32,
    pub cancelled: u32,
}

impl CycleStats {
    fn record(&mut self, outcome: &TargetOutcome) {
        match outcome {
            TargetOutcome::NoSignal => self.no_signal += 1,
            TargetOutcome::Unchanged => self.unchanged += 1,
            TargetOutcome::Baseline { .. } => self.baselines += 1,
            TargetOutcome::Changed { new_items, .. } => {
                self.changed += 1;
                self.new_items += *new_items as u32;
            }
            TargetOutcome::Cancelled => self.cancelled += 1,
        }
    }
}

impl fmt::Display for CycleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "targets={} changed={} new_items={} unchanged={} baselines={} no_signal={} failed={} cancelled={}",
            self.targets,
            self.changed,
            self.new_items,
            self.unchanged,
            self.baselines,
            self.no_signal,
            self.failed,
            self.cancelled,
        )
    }
}

pub struct PollingOrchestrator {
    driver: Arc<dyn BrowserDriver>,
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    targets: Vec<Target>,
    state: StateMap,
    failures: HashMap<String, u32>,
    estimator: CountEstimator,
    revealer: RevealerEngine,
    detector: ChangeDetector,
    settings: PollSettings,
}

impl PollingOrchestrator {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        store: Arc<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
        targets: Vec<Target>,
        table: Arc<PatternTable>,
        tunables: RevealTunables,
        settings: PollSettings,
    ) -> Self {
        Self {
            driver,
            store,
            notifier,
            targets,
            state: StateMap::new(),
            failures: HashMap::new(),
            estimator: CountEstimator::new(table.clone()),
            revealer: RevealerEngine::new(table, tunables),
            detector: ChangeDetector::new(),
            settings,
        }
    }

    /// Replace the in-memory state with what the store holds.
    pub async fn load_state(&mut self) -> Result<(), WatchError> {
        self.state = self.store.load().await?;
        Ok(())
    }

    pub fn state(&self, target_id: &str) -> Option<&KnownState> {
        self.state.get(target_id)
    }

    pub fn consecutive_failures(&self, target_id: &str) -> u32 {
        self.failures.get(target_id).copied().unwrap_or(0)
    }

    /// Poll until cancelled.
    pub async fn run(&mut self, cancel: &CancellationToken) {
        loop {
            let stats = self.poll_once(cancel).await;
            info!("Poll cycle complete. {stats}");
            if cancel.is_cancelled() {
                break;
            }
            let delay = self.settings.next_cycle_delay();
            debug!(delay_secs = delay.as_secs(), "Sleeping until next cycle");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => break,
            }
        }
        info!("Polling stopped");
    }

    /// One pass over every target. Never fails as a whole.
    pub async fn poll_once(&mut self, cancel: &CancellationToken) -> CycleStats {
        let cycle_id = Uuid::new_v4();
        let mut stats = CycleStats::default();
        info!(%cycle_id, targets = self.targets.len(), "Poll cycle starting");

        for target in self.targets.clone() {
            if cancel.is_cancelled() {
                break;
            }
            stats.targets += 1;
            match self.visit_with_retry(&target, cancel).await {
                Ok(outcome) => {
                    self.failures.remove(&target.id);
                    info!(%cycle_id, target_id = target.id.as_str(), outcome = ?outcome, "Target visited");
                    stats.record(&outcome);
                }
                Err(e) => {
                    stats.failed += 1;
                    self.record_failure(&target, &e).await;
                }
            }
        }
        stats
    }

    async fn record_failure(&mut self, target: &Target, err: &WatchError) {
        let failures = self.failures.entry(target.id.clone()).or_insert(0);
        *failures += 1;
        let failures = *failures;
        error!(
            target_id = target.id.as_str(),
            consecutive_failures = failures,
            error = %err,
            "Target failed"
        );

        let every = self.settings.alert_after_failures;
        if every == 0 || failures % every != 0 {
            return;
        }
        let alert = AlertEvent {
            target: target.clone(),
            consecutive_failures: failures,
            last_error: err.to_string(),
            raised_at: Utc::now(),
        };
        if let Err(e) = self.notifier.alert(&alert).await {
            warn!(target_id = target.id.as_str(), error = %e, "Failed to send alert");
        }
    }

    /// `visit` with bounded retries on transient driver failures.
    pub async fn visit_with_retry(
        &mut self,
        target: &Target,
        cancel: &CancellationToken,
    ) -> Result<TargetOutcome, WatchError> {
        let mut attempt = 0;
        loop {
            let err = match self.visit(target, cancel).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => e,
            };
            let transient = matches!(&err, WatchError::Driver(d) if d.is_transient());
            if !transient || attempt >= self.settings.driver_retries || cancel.is_cancelled() {
                return Err(err);
            }
            attempt += 1;
            let delay = self.settings.backoff(attempt);
            warn!(
                target_id = target.id.as_str(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Driver failure, retrying"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(err),
            }
        }
    }

    /// One target, one attempt.
    pub async fn visit(
        &mut self,
        target: &Target,
        cancel: &CancellationToken,
    ) -> Result<TargetOutcome, WatchError> {
        let driver = self.driver.clone();
        let driver = driver.as_ref();
        let target_id = target.id.as_str();

        // Always reload: the count check must see the thread as first rendered.
        debug!(target_id, url = target.location_ref.as_str(), "Loading target");
        driver.navigate(&target.location_ref).await?;

        let view = match page::dom_view(driver, None).await {
            Ok(view) => view,
            Err(WatchError::Driver(e)) => return Err(e.into()),
            Err(e) => {
                warn!(target_id, error = %e, "Count signals unreadable");
                DomView::default()
            }
        };
        let estimate = self.estimator.estimate(&view);
        let Some(count) = estimate.value else {
            info!(target_id, "{}", WatchError::EstimationFailure(target.id.clone()));
            return Ok(TargetOutcome::NoSignal);
        };

        let known = self.state.get(target_id).cloned().unwrap_or_default();
        if known.last_count == Some(count) {
            debug!(target_id, count, "Count unchanged");
            return Ok(TargetOutcome::Unchanged);
        }
        let baseline = known.last_count.is_none();
        info!(
            target_id,
            count,
            last_count = ?known.last_count,
            source = ?estimate.source,
            "Count changed, revealing"
        );

        let located = self.revealer.locator().locate(driver, target.variant).await?;
        let outcome = self
            .revealer
            .reveal(driver, target.variant, located, Some(count), cancel)
            .await?;
        if outcome.termination == Termination::Cancelled {
            info!(target_id, "Reveal cancelled, state untouched");
            return Ok(TargetOutcome::Cancelled);
        }

        let mut next = known;
        let diff = self
            .detector
            .diff(target_id, &mut next, &outcome.snapshot, Some(count));
        let known_now = next.known_identities.len();
        self.state.insert(target.id.clone(), next);
        if let Err(e) = self.store.save(&self.state).await {
            error!(target_id, error = %e, "Failed to persist state");
        }

        if baseline {
            info!(target_id, known = known_now, "Baseline recorded");
            return Ok(TargetOutcome::Baseline { known: known_now });
        }

        let new_items = diff.new_items.len();
        if new_items > 0 {
            let event = NewItemsEvent {
                target: target.clone(),
                new_items: diff.new_items,
                count_before: diff.count_before,
                count_after: diff.count_after,
            };
            if let Err(e) = self.notifier.notify(&event).await {
                warn!(target_id, error = %e, "Failed to send notification");
            }
        }
        Ok(TargetOutcome::Changed {
            new_items,
            recovered: diff.recovered,
        })
    }
}
