// Finds the thread region and the element that scrolls it.
//
// The page reports candidate regions; ranking happens here so it can use the
// pattern table and be tested without a browser. Handles are only reused after
// a liveness check.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use threadwatch_common::{
    BrowserDriver, ContainerCandidate, DriverError, Handle, PageFn, Variant, WatchError,
};

use crate::page;
use crate::patterns::{PatternKind, PatternTable};

/// Where the thread lives. `scrollable == None` means the window scrolls.
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub root: Handle,
    pub scrollable: Option<Handle>,
    /// No region matched and the whole document is used instead.
    pub degraded: bool,
}

impl Located {
    pub fn whole_document() -> Self {
        Self {
            root: Handle::document(),
            scrollable: None,
            degraded: true,
        }
    }
}

pub struct ContainerLocator {
    table: Arc<PatternTable>,
}

impl ContainerLocator {
    pub fn new(table: Arc<PatternTable>) -> Self {
        Self { table }
    }

    /// Locate the thread. Never fails on page noise: an empty or malformed
    /// candidate list degrades to the whole document.
    pub async fn locate(
        &self,
        driver: &dyn BrowserDriver,
        variant: Variant,
    ) -> Result<Located, DriverError> {
        let result = page::call::<Vec<ContainerCandidate>>(
            driver,
            PageFn::FindContainers,
            json!({ "variant": variant }),
        )
        .await;

        let candidates = match result {
            Ok(c) => c,
            Err(WatchError::Driver(e)) => return Err(e),
            Err(e) => {
                let err = WatchError::Locator(format!("container lookup failed: {e}"));
                warn!(%variant, error = %err, "Degraded to whole document");
                return Ok(Located::whole_document());
            }
        };

        match self.select(variant, &candidates) {
            Some(located) => {
                debug!(%variant, root = %located.root, scrollable = ?located.scrollable, "Located thread");
                Ok(located)
            }
            None => {
                let err = WatchError::Locator(format!(
                    "no {variant} thread region among {} candidates",
                    candidates.len()
                ));
                warn!(%variant, error = %err, "Degraded to whole document");
                Ok(Located::whole_document())
            }
        }
    }

    /// `None` while all of `current`'s handles are alive, otherwise the
    /// result of locating again.
    pub async fn revalidate(
        &self,
        driver: &dyn BrowserDriver,
        variant: Variant,
        current: &Located,
    ) -> Result<Option<Located>, DriverError> {
        let mut handles = vec![&current.root];
        if let Some(ref s) = current.scrollable {
            handles.push(s);
        }
        let alive = page::tolerate(
            page::handles_alive(driver, &handles).await,
            vec![false; handles.len()],
            "handles_alive",
        )?;
        if alive.iter().all(|a| *a) {
            return Ok(None);
        }
        debug!(%variant, root = %current.root, "Thread handles went stale, relocating");
        self.locate(driver, variant).await.map(Some)
    }

    fn affordances(&self, candidate: &ContainerCandidate) -> usize {
        candidate
            .affordance_labels
            .iter()
            .filter(|l| self.table.matches(PatternKind::Affordance, l))
            .count()
    }

    /// Variant-specific ranking. Returns `None` when nothing qualifies.
    pub fn select(&self, variant: Variant, candidates: &[ContainerCandidate]) -> Option<Located> {
        let scored: Vec<(&ContainerCandidate, usize)> = candidates
            .iter()
            .map(|c| (c, self.affordances(c)))
            .collect();

        let chosen = match variant {
            // Feed posts scroll with the window; pick the region that looks
            // most like a thread.
            Variant::FeedPost => scored
                .iter()
                .filter(|(_, a)| *a > 0)
                .max_by_key(|(_, a)| *a)
                .map(|(c, _)| *c),
            // Media viewers nest the thread in a side panel; the widest
            // scrollable ancestor of the anchor is the one that grows.
            Variant::Photo | Variant::Video => scored
                .iter()
                .filter(|(c, _)| c.contains_anchor && c.scrollable.is_some())
                .max_by(|(a, fa), (b, fb)| {
                    a.scroll_delta
                        .total_cmp(&b.scroll_delta)
                        .then(fa.cmp(fb))
                })
                .map(|(c, _)| *c)
                .or_else(|| {
                    scored
                        .iter()
                        .filter(|(c, a)| c.contains_anchor && *a > 0)
                        .max_by_key(|(_, a)| *a)
                        .map(|(c, _)| *c)
                }),
            Variant::WatchPage => scored
                .iter()
                .filter(|(c, a)| *a > 0 && c.scrollable.is_some())
                .max_by(|(a, fa), (b, fb)| {
                    fa.cmp(fb)
                        .then(a.scroll_delta.total_cmp(&b.scroll_delta))
                })
                .or_else(|| scored.iter().filter(|(_, a)| *a > 0).max_by_key(|(_, a)| *a))
                .map(|(c, _)| *c),
        }?;

        Some(Located {
            root: chosen.handle.clone(),
            scrollable: chosen.scrollable.clone(),
            degraded: false,
        })
    }
}
