// Per-target delta between the known identity set and a fresh snapshot.

use std::collections::BTreeSet;

use tracing::{debug, info};

use threadwatch_common::{Item, KnownState, Snapshot};

/// Result of one diff.
#[derive(Debug, Clone, PartialEq)]
pub struct Diff {
    pub new_items: Vec<Item>,
    pub count_before: Option<u64>,
    pub count_after: Option<u64>,
    /// New items were picked by position because no unknown identity showed up.
    pub recovered: bool,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.new_items.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ChangeDetector;

impl ChangeDetector {
    pub fn new() -> Self {
        Self
    }

    /// Compute the delta and fold the snapshot into `known`.
    ///
    /// `known` is only written once the whole result exists. Identity-less
    /// items never count as new, except through positional recovery: when no
    /// unknown identity is present but the estimate grew past the recorded
    /// count, the trailing `estimate - last` items by position are reported.
    /// A `None` estimate keeps the recorded count and disables recovery.
    pub fn diff(
        &self,
        target_id: &str,
        known: &mut KnownState,
        snapshot: &Snapshot,
        estimate: Option<u64>,
    ) -> Diff {
        let mut seen_now: BTreeSet<&str> = BTreeSet::new();
        let mut new_items: Vec<Item> = Vec::new();
        for item in &snapshot.items {
            let Some(id) = item.identity.as_deref().filter(|id| !id.is_empty()) else {
                continue;
            };
            if !known.knows(id) && seen_now.insert(id) {
                new_items.push(item.clone());
            }
        }

        let count_before = known.last_count;
        let mut recovered = false;
        if new_items.is_empty() {
            if let Some(estimate) = estimate {
                let last = count_before.unwrap_or(0);
                if estimate > last {
                    new_items = trailing_by_position(snapshot, (estimate - last) as usize);
                    recovered = !new_items.is_empty();
                }
            }
        }

        let mut next = known.clone();
        next.known_identities
            .extend(snapshot.identities().into_iter().map(String::from));
        if estimate.is_some() {
            next.last_count = estimate;
        }
        *known = next;

        if recovered {
            info!(
                target_id,
                recovered = new_items.len(),
                "No unknown identities, recovered new items by position"
            );
        }
        debug!(
            target_id,
            new = new_items.len(),
            known = known.known_identities.len(),
            "Diff computed"
        );

        Diff {
            new_items,
            count_before,
            count_after: known.last_count,
            recovered,
        }
    }
}

/// Last `n` items after a stable sort by position. Items without a position
/// sort after positioned ones, keeping snapshot order among themselves.
fn trailing_by_position(snapshot: &Snapshot, n: usize) -> Vec<Item> {
    let mut ordered: Vec<&Item> = snapshot.items.iter().collect();
    ordered.sort_by_key(|item| item.position.map_or((1, 0), |p| (0, p)));
    let skip = ordered.len().saturating_sub(n);
    ordered.into_iter().skip(skip).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(ids: &[&str]) -> Snapshot {
        Snapshot::new(ids.iter().map(|id| Item::with_identity(*id)).collect())
    }

    fn ids(diff: &Diff) -> Vec<&str> {
        diff.new_items
            .iter()
            .filter_map(|i| i.identity.as_deref())
            .collect()
    }

    #[test]
    fn second_diff_of_same_snapshot_is_empty() {
        let detector = ChangeDetector::new();
        let mut known = KnownState::default();
        let snap = items(&["1", "2", "3"]);

        let first = detector.diff("t", &mut known, &snap, Some(3));
        assert_eq!(ids(&first), vec!["1", "2", "3"]);
        let second = detector.diff("t", &mut known, &snap, Some(3));
        assert!(second.is_empty());
        assert!(!second.recovered);
    }

    #[test]
    fn known_identities_never_shrink() {
        let detector = ChangeDetector::new();
        let mut known = KnownState::default();
        detector.diff("t", &mut known, &items(&["1", "2", "3"]), Some(3));
        detector.diff("t", &mut known, &items(&["2"]), Some(1));
        assert_eq!(known.known_identities.len(), 3);
        assert!(known.knows("1"));
    }

    #[test]
    fn reports_only_unknown_identities_in_snapshot_order() {
        let detector = ChangeDetector::new();
        let mut known = KnownState {
            known_identities: ["1", "2"].into_iter().map(String::from).collect(),
            last_count: Some(2),
        };
        let diff = detector.diff("t", &mut known, &items(&["4", "1", "2", "3", "4"]), Some(4));
        assert_eq!(ids(&diff), vec!["4", "3"]);
        assert_eq!(diff.count_before, Some(2));
        assert_eq!(diff.count_after, Some(4));
    }

    #[test]
    fn identity_less_items_are_recovered_by_position() {
        let detector = ChangeDetector::new();
        let mut known = KnownState {
            known_identities: BTreeSet::new(),
            last_count: Some(2),
        };
        // out of document order on purpose
        let snap = Snapshot::new(
            [3u32, 0, 4, 1, 2]
                .into_iter()
                .map(|p| Item {
                    position: Some(p),
                    text: Some(format!("c{p}")),
                    ..Item::default()
                })
                .collect(),
        );
        let diff = detector.diff("t", &mut known, &snap, Some(5));
        assert!(diff.recovered);
        let positions: Vec<u32> = diff.new_items.iter().filter_map(|i| i.position).collect();
        assert_eq!(positions, vec![2, 3, 4]);
        assert_eq!(known.last_count, Some(5));
        assert!(known.known_identities.is_empty());
    }

    #[test]
    fn missing_estimate_keeps_last_count_and_skips_recovery() {
        let detector = ChangeDetector::new();
        let mut known = KnownState {
            known_identities: BTreeSet::new(),
            last_count: Some(2),
        };
        let snap = Snapshot::new(vec![Item::default(), Item::default(), Item::default()]);
        let diff = detector.diff("t", &mut known, &snap, None);
        assert!(diff.is_empty());
        assert_eq!(known.last_count, Some(2));
        assert_eq!(diff.count_after, Some(2));
    }

    #[test]
    fn shrinking_estimate_reports_nothing() {
        let detector = ChangeDetector::new();
        let mut known = KnownState {
            known_identities: ["1", "2", "3"].into_iter().map(String::from).collect(),
            last_count: Some(3),
        };
        let diff = detector.diff("t", &mut known, &items(&["1", "2"]), Some(2));
        assert!(diff.is_empty());
        assert_eq!(known.last_count, Some(2));
    }
}
