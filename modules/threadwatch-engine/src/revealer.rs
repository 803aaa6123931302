// The reveal pass: act on the thread until it stops yielding new content.
//
// Round shape: SCANNING -> ACTING -> AWAITING_EFFECT -> MEASURING, then either
// back to SCANNING or into a terminal phase. Progress is measured as growth of
// the identity set harvested across the whole pass (virtualized threads drop
// rows that scrolled away, so the live DOM alone undercounts) or as scroll
// movement. Four independent stop rules make the loop terminate on any input;
// the round cap is the unconditional one.
//
// Only driver failures leave this module. Malformed page results, stale
// control handles and effect timeouts are absorbed into the round.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use threadwatch_common::{
    BrowserDriver, ControlCandidate, DriverError, Handle, Item, PageFn, RevealTunables,
    ScrollMetrics, ScrollTarget, Snapshot, Variant, WaitPredicate,
};

use crate::identity::IdentityExtractor;
use crate::locator::{ContainerLocator, Located};
use crate::page;
use crate::patterns::{ControlKind, PatternTable};

/// Scroll moves smaller than this are rendering jitter, not movement.
const SCROLL_EPSILON: f64 = 0.5;

/// Upper bound on nested expansions at one sweep position.
const MAX_EXPANSIONS_PER_STEP: u32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealPhase {
    Scanning,
    Acting,
    AwaitingEffect,
    Measuring,
    Sweeping,
    Converged,
    Stalled,
    MaxIter,
}

/// Why a pass stopped. None of these is an error; a stalled pass still
/// produces the best snapshot it could.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Harvest reached the expected count and one more round added nothing.
    CountReached,
    /// Too many consecutive rounds without new identities or scroll movement.
    NoProgress,
    /// Pinned at the bottom with nothing to click and a stable extent.
    HardBottom,
    /// Absolute round cap.
    MaxRounds,
    /// Cancelled between rounds.
    Cancelled,
}

impl Termination {
    pub fn phase(&self) -> RevealPhase {
        match self {
            Termination::CountReached => RevealPhase::Converged,
            Termination::NoProgress | Termination::HardBottom | Termination::Cancelled => {
                RevealPhase::Stalled
            }
            Termination::MaxRounds => RevealPhase::MaxIter,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::CountReached => "count_reached",
            Termination::NoProgress => "no_progress",
            Termination::HardBottom => "hard_bottom",
            Termination::MaxRounds => "max_rounds",
            Termination::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-pass bookkeeping. `last_measured_size` never decreases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevealState {
    pub round: u32,
    pub last_measured_size: usize,
    pub no_progress_count: u32,
    pub bottom_stable_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevealStats {
    pub clicks: u32,
    pub bonus_clicks: u32,
    pub stale_clicks: u32,
    pub effect_timeouts: u32,
    pub relocations: u32,
    pub sweep_passes: u32,
    pub sweep_expansions: u32,
}

#[derive(Debug, Clone)]
pub struct RevealOutcome {
    pub snapshot: Snapshot,
    pub termination: Termination,
    pub state: RevealState,
    pub stats: RevealStats,
    pub located: Located,
}

/// A classified control.
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub handle: Handle,
    pub kind: ControlKind,
    pub text: String,
    pub top: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Click(Control),
    Scroll,
}

/// Sort key: on-screen controls nearest the top first, then ones above.
fn proximity(c: &Control) -> (u8, f64) {
    if c.top >= 0.0 {
        (0, c.top)
    } else {
        (1, -c.top)
    }
}

fn closest<'a>(controls: impl Iterator<Item = &'a Control>) -> Option<&'a Control> {
    controls.min_by(|a, b| {
        let (ra, da) = proximity(a);
        let (rb, db) = proximity(b);
        ra.cmp(&rb).then(da.total_cmp(&db))
    })
}

/// Fixed precedence: more items > nested replies > truncated text > scroll.
pub fn choose_action(controls: &[Control]) -> Action {
    [
        ControlKind::MoreItems,
        ControlKind::NestedReplies,
        ControlKind::SeeMoreText,
    ]
    .into_iter()
    .find_map(|kind| closest(controls.iter().filter(|c| c.kind == kind)))
    .map(|c| Action::Click(c.clone()))
    .unwrap_or(Action::Scroll)
}

/// What one MEASURING step observed.
#[derive(Debug, Clone, Copy)]
pub struct Measurement {
    pub size: usize,
    pub metrics: ScrollMetrics,
    pub controls_available: bool,
}

/// The stop rules, kept free of I/O.
#[derive(Debug, Clone)]
pub struct Convergence {
    pub state: RevealState,
    target: Option<u64>,
    reached_target: bool,
    last_metrics: ScrollMetrics,
    no_progress_threshold: u32,
    bottom_stable_checks: u32,
    max_rounds: u32,
}

impl Convergence {
    pub fn new(
        initial_size: usize,
        initial_metrics: ScrollMetrics,
        target: Option<u64>,
        tunables: &RevealTunables,
    ) -> Self {
        Self {
            state: RevealState {
                last_measured_size: initial_size,
                ..Default::default()
            },
            target,
            reached_target: false,
            last_metrics: initial_metrics,
            no_progress_threshold: tunables.no_progress_threshold.max(1),
            bottom_stable_checks: tunables.bottom_stable_checks.max(1),
            max_rounds: tunables.max_rounds,
        }
    }

    pub fn rounds_exhausted(&self) -> bool {
        self.state.round >= self.max_rounds
    }

    pub fn last_metrics(&self) -> ScrollMetrics {
        self.last_metrics
    }

    /// Fold one measurement in; `Some` means stop.
    pub fn observe(&mut self, m: Measurement) -> Option<Termination> {
        let previous = self.last_metrics;
        self.last_metrics = m.metrics;

        let grew = m.size > self.state.last_measured_size;
        let scrolled = (m.metrics.top - previous.top).abs() > SCROLL_EPSILON;
        let progressed = grew || scrolled;
        if progressed {
            self.state.no_progress_count = 0;
            if grew {
                self.state.last_measured_size = m.size;
            }
        } else {
            self.state.no_progress_count += 1;
        }

        let extent_unchanged = (m.metrics.height - previous.height).abs() <= SCROLL_EPSILON;
        if m.metrics.at_bottom() && !m.controls_available && extent_unchanged {
            self.state.bottom_stable_count += 1;
        } else {
            self.state.bottom_stable_count = 0;
        }

        if let Some(target) = self.target {
            if self.state.last_measured_size as u64 >= target {
                if self.reached_target && !progressed {
                    return Some(Termination::CountReached);
                }
                self.reached_target = true;
            }
        }
        if self.state.no_progress_count >= self.no_progress_threshold {
            return Some(Termination::NoProgress);
        }
        if self.state.bottom_stable_count >= self.bottom_stable_checks {
            return Some(Termination::HardBottom);
        }
        None
    }
}

/// Items collected over a pass. Identified items accumulate across rounds;
/// identity-less ones can't be matched between DOM states, so only the latest
/// sighting of those is kept.
#[derive(Debug, Default)]
struct Harvest {
    identified: Vec<Item>,
    index: HashMap<String, usize>,
    anonymous: Vec<Item>,
    rendered: usize,
}

impl Harvest {
    fn absorb(&mut self, snapshot: Snapshot) {
        let mut anonymous = Vec::new();
        let mut rendered = 0;
        for item in snapshot.items {
            let Some(id) = item.identity.clone().filter(|id| !id.is_empty()) else {
                anonymous.push(item);
                continue;
            };
            rendered += 1;
            match self.index.get(&id) {
                Some(&i) => {
                    let seen = &mut self.identified[i];
                    seen.absorb(&item);
                    // expanded text supersedes its truncated rendering
                    let seen_len = seen.text.as_deref().map_or(0, |t| t.chars().count());
                    if let Some(text) = item.text.filter(|t| t.chars().count() > seen_len) {
                        seen.text = Some(text);
                    }
                }
                None => {
                    self.index.insert(id, self.identified.len());
                    self.identified.push(item);
                }
            }
        }
        self.anonymous = anonymous;
        self.rendered = rendered;
    }

    /// Identity-set size, or the item count when nothing is identifiable.
    fn size(&self) -> usize {
        if self.index.is_empty() {
            self.anonymous.len()
        } else {
            self.index.len()
        }
    }

    fn into_snapshot(self) -> Snapshot {
        let mut items = self.identified;
        items.extend(self.anonymous);
        Snapshot::new(items)
    }
}

pub struct RevealerEngine {
    locator: ContainerLocator,
    table: Arc<PatternTable>,
    extractor: IdentityExtractor,
    tunables: RevealTunables,
}

impl RevealerEngine {
    pub fn new(table: Arc<PatternTable>, tunables: RevealTunables) -> Self {
        Self {
            locator: ContainerLocator::new(table.clone()),
            table,
            extractor: IdentityExtractor::new(),
            tunables,
        }
    }

    pub fn locator(&self) -> &ContainerLocator {
        &self.locator
    }

    /// Run one reveal pass from `located`. `target` is the expected item
    /// count, if known. Safe to cancel: the pass stops at the next round
    /// boundary and returns what it has.
    pub async fn reveal(
        &self,
        driver: &dyn BrowserDriver,
        variant: Variant,
        located: Located,
        target: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<RevealOutcome, DriverError> {
        let mut located = located;
        let mut harvest = Harvest::default();
        let mut stats = RevealStats::default();

        self.harvest(driver, &located, &mut harvest).await?;
        let metrics = self
            .metrics(driver, &located, ScrollMetrics::default())
            .await?;
        let mut conv = Convergence::new(harvest.size(), metrics, target, &self.tunables);
        let mut phase = RevealPhase::Scanning;

        let termination = loop {
            if cancel.is_cancelled() {
                break Termination::Cancelled;
            }
            if conv.rounds_exhausted() {
                break Termination::MaxRounds;
            }
            conv.state.round += 1;
            let round = conv.state.round;

            enter(&mut phase, RevealPhase::Scanning, round);
            if let Some(fresh) = self.locator.revalidate(driver, variant, &located).await? {
                stats.relocations += 1;
                located = fresh;
            }
            let controls = self.scan(driver, &located.root).await?;

            enter(&mut phase, RevealPhase::Acting, round);
            match choose_action(&controls) {
                Action::Click(control) => {
                    enter(&mut phase, RevealPhase::AwaitingEffect, round);
                    let effect = self
                        .click_with_effect(driver, &located, &control, &harvest, &mut stats)
                        .await?;
                    if effect && self.tunables.bonus_clicks > 0 {
                        let kind = control.kind;
                        self.bonus_clicks(driver, &located, kind, &mut harvest, &mut stats)
                            .await?;
                    }
                }
                Action::Scroll => {
                    let to = ScrollTarget::for_scrollable(located.scrollable.as_ref());
                    driver.scroll_by(&to, self.tunables.scroll_step).await?;
                }
            }
            self.settle().await;

            enter(&mut phase, RevealPhase::Measuring, round);
            self.harvest(driver, &located, &mut harvest).await?;
            let metrics = self.metrics(driver, &located, conv.last_metrics()).await?;
            let measurement = Measurement {
                size: harvest.size(),
                metrics,
                controls_available: !controls.is_empty(),
            };
            let verdict = conv.observe(measurement);
            debug!(
                round,
                size = measurement.size,
                no_progress = conv.state.no_progress_count,
                bottom_stable = conv.state.bottom_stable_count,
                "Reveal round measured"
            );
            if let Some(t) = verdict {
                break t;
            }
        };

        if termination != Termination::Cancelled && self.tunables.sweep_passes > 0 {
            enter(&mut phase, RevealPhase::Sweeping, conv.state.round);
            self.sweep(driver, variant, &mut located, &mut harvest, &mut stats, cancel)
                .await?;
        }
        enter(&mut phase, termination.phase(), conv.state.round);

        self.harvest(driver, &located, &mut harvest).await?;
        let snapshot = harvest.into_snapshot();

        info!(
            %variant,
            termination = termination.as_str(),
            rounds = conv.state.round,
            items = snapshot.len(),
            identities = snapshot.identity_count(),
            clicks = stats.clicks,
            bonus_clicks = stats.bonus_clicks,
            sweeps = stats.sweep_passes,
            degraded = located.degraded,
            "Reveal pass finished"
        );

        Ok(RevealOutcome {
            snapshot,
            termination,
            state: conv.state,
            stats,
            located,
        })
    }

    /// Current controls under `root`, classified. Unclassifiable ones are dropped.
    async fn scan(
        &self,
        driver: &dyn BrowserDriver,
        root: &Handle,
    ) -> Result<Vec<Control>, DriverError> {
        let listed = page::call::<Vec<ControlCandidate>>(
            driver,
            PageFn::ListControls,
            json!({ "root": root }),
        )
        .await;
        let raw = page::tolerate(listed, Vec::new(), "list_controls")?;
        Ok(raw
            .into_iter()
            .filter_map(|c| {
                let kind = self.table.classify_control(&c.text)?;
                Some(Control {
                    handle: c.handle,
                    kind,
                    text: c.text,
                    top: c.top,
                })
            })
            .collect())
    }

    async fn harvest(
        &self,
        driver: &dyn BrowserDriver,
        located: &Located,
        harvest: &mut Harvest,
    ) -> Result<(), DriverError> {
        let refs = page::tolerate(
            page::item_refs(driver, &located.root).await.map(Some),
            None,
            "item_refs",
        )?;
        if let Some(refs) = refs {
            harvest.absorb(self.extractor.extract_all(&refs));
        }
        Ok(())
    }

    async fn metrics(
        &self,
        driver: &dyn BrowserDriver,
        located: &Located,
        fallback: ScrollMetrics,
    ) -> Result<ScrollMetrics, DriverError> {
        page::tolerate(
            page::scroll_metrics(driver, located.scrollable.as_ref()).await,
            fallback,
            "scroll_metrics",
        )
    }

    async fn settle(&self) {
        if !self.tunables.settle_delay.is_zero() {
            tokio::time::sleep(self.tunables.settle_delay).await;
        }
    }

    /// Click and wait for a visible effect. Returns whether one was seen.
    /// A timeout nudges the scroll position instead of re-clicking.
    async fn click_with_effect(
        &self,
        driver: &dyn BrowserDriver,
        located: &Located,
        control: &Control,
        harvest: &Harvest,
        stats: &mut RevealStats,
    ) -> Result<bool, DriverError> {
        match driver.click(&control.handle).await {
            Ok(()) => stats.clicks += 1,
            Err(DriverError::StaleHandle(handle)) => {
                debug!(%handle, kind = ?control.kind, "Control went stale before click");
                stats.stale_clicks += 1;
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        let predicate = WaitPredicate::AnyOf {
            predicates: vec![
                WaitPredicate::IdentityCountAbove {
                    root: located.root.clone(),
                    count: harvest.rendered,
                },
                WaitPredicate::ControlGone {
                    handle: control.handle.clone(),
                    text: control.text.clone(),
                },
            ],
        };
        if driver
            .wait_for(&predicate, self.tunables.effect_timeout)
            .await?
        {
            return Ok(true);
        }

        stats.effect_timeouts += 1;
        debug!(handle = %control.handle, "No effect after click, nudging");
        let to = ScrollTarget::for_scrollable(located.scrollable.as_ref());
        driver.scroll_by(&to, self.tunables.nudge).await?;
        Ok(false)
    }

    /// Extra same-kind clicks after a confirmed effect. Each must grow the
    /// identity set, otherwise the streak ends.
    async fn bonus_clicks(
        &self,
        driver: &dyn BrowserDriver,
        located: &Located,
        kind: ControlKind,
        harvest: &mut Harvest,
        stats: &mut RevealStats,
    ) -> Result<(), DriverError> {
        for _ in 0..self.tunables.bonus_clicks {
            self.harvest(driver, located, harvest).await?;
            let before = harvest.size();

            let controls = self.scan(driver, &located.root).await?;
            let Some(next) = closest(controls.iter().filter(|c| c.kind == kind)).cloned() else {
                break;
            };
            if !self
                .click_with_effect(driver, located, &next, harvest, stats)
                .await?
            {
                break;
            }

            self.harvest(driver, located, harvest).await?;
            if harvest.size() <= before {
                break;
            }
            stats.bonus_clicks += 1;
        }
        Ok(())
    }

    /// Re-walk the thread top to bottom expanding nested replies that the
    /// main loop left behind or that virtualization collapsed again.
    async fn sweep(
        &self,
        driver: &dyn BrowserDriver,
        variant: Variant,
        located: &mut Located,
        harvest: &mut Harvest,
        stats: &mut RevealStats,
        cancel: &CancellationToken,
    ) -> Result<(), DriverError> {
        let pending = self
            .scan(driver, &located.root)
            .await?
            .iter()
            .filter(|c| c.kind == ControlKind::NestedReplies)
            .count();
        if pending == 0 {
            return Ok(());
        }

        for pass in 1..=self.tunables.sweep_passes {
            if cancel.is_cancelled() {
                break;
            }
            if let Some(fresh) = self.locator.revalidate(driver, variant, located).await? {
                stats.relocations += 1;
                *located = fresh;
            }
            let to = ScrollTarget::for_scrollable(located.scrollable.as_ref());

            let top = self
                .metrics(driver, located, ScrollMetrics::default())
                .await?
                .top;
            if top > 0.0 {
                driver.scroll_by(&to, -top).await?;
                self.settle().await;
            }

            let mut expanded = 0u32;
            for _ in 0..self.tunables.sweep_max_steps {
                for _ in 0..MAX_EXPANSIONS_PER_STEP {
                    let controls = self.scan(driver, &located.root).await?;
                    let Some(next) = closest(
                        controls
                            .iter()
                            .filter(|c| c.kind == ControlKind::NestedReplies),
                    )
                    .cloned() else {
                        break;
                    };
                    if !self
                        .click_with_effect(driver, located, &next, harvest, stats)
                        .await?
                    {
                        break;
                    }
                    expanded += 1;
                    self.harvest(driver, located, harvest).await?;
                }

                let metrics = self
                    .metrics(driver, located, ScrollMetrics::default())
                    .await?;
                if metrics.at_bottom() {
                    break;
                }
                driver.scroll_by(&to, self.tunables.scroll_step).await?;
                self.settle().await;
                self.harvest(driver, located, harvest).await?;
            }

            stats.sweep_passes += 1;
            stats.sweep_expansions += expanded;
            debug!(pass, expanded, "Sweep pass done");
            if expanded == 0 {
                break;
            }
        }
        Ok(())
    }
}

fn enter(phase: &mut RevealPhase, next: RevealPhase, round: u32) {
    let from = *phase;
    if from != next {
        debug!(round, from = ?from, to = ?next, "Reveal phase");
        *phase = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control(kind: ControlKind, top: f64) -> Control {
        Control {
            handle: Handle::new(format!("{kind:?}-{top}")),
            kind,
            text: String::new(),
            top,
        }
    }

    fn metrics(top: f64, height: f64) -> ScrollMetrics {
        ScrollMetrics {
            top,
            height,
            client_height: 500.0,
        }
    }

    fn harvested(items: Vec<Item>) -> Harvest {
        let mut h = Harvest::default();
        h.absorb(Snapshot::new(items));
        h
    }

    fn tunables() -> RevealTunables {
        RevealTunables {
            no_progress_threshold: 3,
            bottom_stable_checks: 2,
            max_rounds: 10,
            ..RevealTunables::default()
        }
    }

    #[test]
    fn precedence_beats_proximity() {
        let controls = vec![
            control(ControlKind::SeeMoreText, 5.0),
            control(ControlKind::NestedReplies, 10.0),
            control(ControlKind::MoreItems, 700.0),
        ];
        match choose_action(&controls) {
            Action::Click(c) => assert_eq!(c.kind, ControlKind::MoreItems),
            Action::Scroll => panic!("expected a click"),
        }
    }

    #[test]
    fn ties_go_to_the_control_nearest_the_top() {
        let controls = vec![
            control(ControlKind::NestedReplies, 400.0),
            control(ControlKind::NestedReplies, -20.0),
            control(ControlKind::NestedReplies, 30.0),
        ];
        match choose_action(&controls) {
            Action::Click(c) => assert_eq!(c.top, 30.0),
            Action::Scroll => panic!("expected a click"),
        }
    }

    #[test]
    fn no_controls_means_scroll() {
        assert_eq!(choose_action(&[]), Action::Scroll);
    }

    #[test]
    fn count_reached_needs_a_confirming_round() {
        let mut c = Convergence::new(3, metrics(0.0, 2000.0), Some(5), &tunables());
        let m = |size| Measurement {
            size,
            metrics: metrics(0.0, 2000.0),
            controls_available: true,
        };
        assert_eq!(c.observe(m(5)), None);
        assert_eq!(c.observe(m(5)), Some(Termination::CountReached));
    }

    #[test]
    fn count_reached_waits_while_still_progressing() {
        let mut c = Convergence::new(3, metrics(0.0, 2000.0), Some(5), &tunables());
        let at = |size, top| Measurement {
            size,
            metrics: metrics(top, 2000.0),
            controls_available: true,
        };
        assert_eq!(c.observe(at(5, 0.0)), None);
        assert_eq!(c.observe(at(6, 0.0)), None);
        assert_eq!(c.observe(at(6, 300.0)), None);
        assert_eq!(c.observe(at(6, 300.0)), Some(Termination::CountReached));
    }

    #[test]
    fn no_progress_threshold_stalls() {
        let mut c = Convergence::new(4, metrics(0.0, 2000.0), None, &tunables());
        let m = Measurement {
            size: 4,
            metrics: metrics(0.0, 2000.0),
            controls_available: true,
        };
        assert_eq!(c.observe(m), None);
        assert_eq!(c.observe(m), None);
        assert_eq!(c.observe(m), Some(Termination::NoProgress));
        assert_eq!(c.state.no_progress_count, 3);
    }

    #[test]
    fn hard_bottom_needs_stable_extent_and_no_controls() {
        let mut c = Convergence::new(4, metrics(1500.0, 2000.0), None, &tunables());
        let bottom = Measurement {
            size: 4,
            metrics: metrics(1500.0, 2000.0),
            controls_available: false,
        };
        let grown = Measurement {
            metrics: metrics(1500.0, 2400.0),
            ..bottom
        };
        assert_eq!(c.observe(bottom), None);
        assert_eq!(c.state.bottom_stable_count, 1);
        // extent changed: streak resets
        assert_eq!(c.observe(grown), None);
        assert_eq!(c.state.bottom_stable_count, 0);
        let settled = Measurement {
            metrics: metrics(1900.0, 2400.0),
            ..bottom
        };
        assert_eq!(c.observe(settled), None);
        assert_eq!(c.observe(settled), Some(Termination::HardBottom));
    }

    #[test]
    fn measured_size_never_decreases() {
        let mut c = Convergence::new(10, metrics(0.0, 2000.0), None, &tunables());
        let m = |size| Measurement {
            size,
            metrics: metrics(0.0, 2000.0),
            controls_available: true,
        };
        c.observe(m(12));
        c.observe(m(7));
        assert_eq!(c.state.last_measured_size, 12);
    }

    #[test]
    fn harvest_keeps_identities_seen_in_earlier_rounds() {
        let mut h = harvested(vec![Item::with_identity("1"), Item::with_identity("2")]);
        h.absorb(Snapshot::new(vec![
            Item::with_identity("2"),
            Item::with_identity("3"),
            Item::default(),
        ]));
        assert_eq!(h.size(), 3);
        assert_eq!(h.rendered, 2);
        let snap = h.into_snapshot();
        assert_eq!(snap.len(), 4);
        assert_eq!(snap.items[0].identity.as_deref(), Some("1"));
    }

    #[test]
    fn harvest_without_identities_counts_items() {
        let h = harvested(vec![Item::default(), Item::default()]);
        assert_eq!(h.size(), 2);
        assert_eq!(h.rendered, 0);
    }
}
