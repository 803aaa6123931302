//! Reveal passes against a simulated thread.
//!
//! `SimDom` → `ContainerLocator::locate()` → `RevealerEngine::reveal()` →
//! assert on termination, harvested snapshot and the clicks the page saw.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use simdom::{SimComment, SimDom, SimLayout, TokenStyle};
use threadwatch_common::{DriverError, PageFn, RevealTunables, Variant};
use threadwatch_engine::{PatternTable, RevealOutcome, RevealerEngine, Termination};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn fast() -> RevealTunables {
    RevealTunables {
        effect_timeout: Duration::ZERO,
        settle_delay: Duration::ZERO,
        ..RevealTunables::default()
    }
}

fn engine(tunables: RevealTunables) -> RevealerEngine {
    RevealerEngine::new(Arc::new(PatternTable::builtin().unwrap()), tunables)
}

async fn reveal(
    dom: &SimDom,
    tunables: RevealTunables,
    target: Option<u64>,
) -> Result<RevealOutcome, DriverError> {
    let engine = engine(tunables);
    let located = engine.locator().locate(dom, Variant::FeedPost).await?;
    engine
        .reveal(dom, Variant::FeedPost, located, target, &CancellationToken::new())
        .await
}

fn ids(outcome: &RevealOutcome) -> BTreeSet<String> {
    outcome
        .snapshot
        .identities()
        .into_iter()
        .map(String::from)
        .collect()
}

fn expected(ids: impl IntoIterator<Item = u64>) -> BTreeSet<String> {
    ids.into_iter().map(|id| id.to_string()).collect()
}

fn with_one_reply_each(first: u64, n: usize) -> Vec<SimComment> {
    SimComment::numbered(first, n)
        .into_iter()
        .map(|c| {
            let reply = SimComment::new(c.id + 100, "replier", "a reply");
            c.with_replies(vec![reply])
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Termination
// ---------------------------------------------------------------------------

#[tokio::test]
async fn more_clicks_until_count_reached() {
    // tall viewport: the whole thread fits, so scrolling never counts as progress
    let dom = SimDom::new(SimComment::numbered(1, 13))
        .initially_visible(3)
        .page_size(4)
        .layout(SimLayout {
            viewport: 2000.0,
            ..SimLayout::default()
        });
    let tunables = RevealTunables {
        bonus_clicks: 0,
        ..fast()
    };

    let outcome = reveal(&dom, tunables, Some(13)).await.unwrap();

    assert_eq!(outcome.termination, Termination::CountReached);
    assert_eq!(outcome.state.round, 4);
    assert_eq!(ids(&outcome), expected(1..=13));
    assert_eq!(dom.clicks(), vec!["more-top", "more-top", "more-top"]);
}

#[tokio::test]
async fn bonus_clicks_chain_within_a_round() {
    let dom = SimDom::new(SimComment::numbered(1, 13))
        .initially_visible(3)
        .page_size(4);

    let outcome = reveal(&dom, fast(), Some(13)).await.unwrap();

    assert_eq!(outcome.termination, Termination::CountReached);
    assert_eq!(outcome.stats.bonus_clicks, 2);
    assert!(outcome.state.round < 4);
    assert_eq!(outcome.snapshot.identity_count(), 13);
}

#[tokio::test]
async fn endless_thread_stops_at_round_cap() {
    let dom = SimDom::new(SimComment::numbered(1, 3)).endless();
    let tunables = RevealTunables {
        max_rounds: 8,
        sweep_passes: 0,
        ..fast()
    };

    let outcome = reveal(&dom, tunables, None).await.unwrap();

    assert_eq!(outcome.termination, Termination::MaxRounds);
    assert_eq!(outcome.state.round, 8);
    assert!(outcome.state.last_measured_size > 3);
}

#[tokio::test]
async fn unresponsive_control_stalls_on_no_progress() {
    let dom = SimDom::new(SimComment::numbered(1, 10))
        .initially_visible(3)
        .unresponsive("more-top");

    let outcome = reveal(&dom, fast(), None).await.unwrap();

    assert_eq!(outcome.termination, Termination::NoProgress);
    assert_eq!(outcome.state.no_progress_count, 4);
    assert_eq!(outcome.stats.effect_timeouts, 4);
    assert_eq!(dom.clicks().len(), 4);
    assert_eq!(outcome.snapshot.identity_count(), 3);
}

#[tokio::test]
async fn short_thread_settles_on_hard_bottom() {
    let dom = SimDom::new(SimComment::numbered(1, 5)).initially_visible(5);

    let outcome = reveal(&dom, fast(), None).await.unwrap();

    assert_eq!(outcome.termination, Termination::HardBottom);
    assert_eq!(outcome.state.round, 3);
    assert_eq!(outcome.state.bottom_stable_count, 3);
    assert!(dom.clicks().is_empty());
}

#[tokio::test]
async fn cancelled_before_first_round() {
    let dom = SimDom::new(SimComment::numbered(1, 10)).initially_visible(3);
    let engine = engine(fast());
    let located = engine.locator().locate(&dom, Variant::FeedPost).await.unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = engine
        .reveal(&dom, Variant::FeedPost, located, Some(10), &cancel)
        .await
        .unwrap();

    assert_eq!(outcome.termination, Termination::Cancelled);
    assert_eq!(outcome.state.round, 0);
    assert!(dom.clicks().is_empty());
    assert_eq!(outcome.snapshot.identity_count(), 3);
}

// ---------------------------------------------------------------------------
// Harvesting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn virtualized_rows_accumulate_across_rounds() {
    let dom = SimDom::new(SimComment::numbered(1, 30))
        .initially_visible(30)
        .layout(SimLayout {
            virtual_buffer: Some(200.0),
            ..SimLayout::default()
        });

    let outcome = reveal(&dom, fast(), Some(30)).await.unwrap();

    assert_eq!(outcome.termination, Termination::CountReached);
    assert_eq!(ids(&outcome), expected(1..=30));
    assert_eq!(outcome.snapshot.len(), 30);
    assert_eq!(outcome.state.last_measured_size, 30);
    assert!(dom.scroll_top() > 0.0);
}

#[tokio::test]
async fn nested_replies_are_expanded() {
    let dom = SimDom::new(with_one_reply_each(1, 3)).initially_visible(3);

    let outcome = reveal(&dom, fast(), Some(6)).await.unwrap();

    assert_eq!(outcome.termination, Termination::CountReached);
    assert_eq!(ids(&outcome), expected([1, 2, 3, 101, 102, 103]));
    assert_eq!(dom.expanded_reply_count(), 3);
}

#[tokio::test]
async fn sweep_picks_up_replies_left_behind() {
    let dom = SimDom::new(with_one_reply_each(1, 3)).initially_visible(3);
    let tunables = RevealTunables {
        max_rounds: 2,
        bonus_clicks: 0,
        ..fast()
    };

    let outcome = reveal(&dom, tunables, None).await.unwrap();

    assert_eq!(outcome.termination, Termination::MaxRounds);
    assert_eq!(outcome.stats.sweep_expansions, 1);
    assert_eq!(outcome.stats.sweep_passes, 2);
    assert_eq!(dom.expanded_reply_count(), 3);
    assert_eq!(outcome.snapshot.identity_count(), 6);
}

#[tokio::test]
async fn sweep_reexpands_replies_folded_by_virtualization() {
    let dom = SimDom::new(with_one_reply_each(1, 12))
        .initially_visible(12)
        .layout(SimLayout {
            virtual_buffer: Some(0.0),
            ..SimLayout::default()
        })
        .recollapse_offscreen();
    // eight rounds: replies 1-5 expanded, one scroll folds 1 and 2, then 6 and 7
    let tunables = RevealTunables {
        max_rounds: 8,
        bonus_clicks: 0,
        ..fast()
    };

    let outcome = reveal(&dom, tunables, None).await.unwrap();

    assert_eq!(outcome.termination, Termination::MaxRounds);
    let first_reply_clicks = dom
        .clicks()
        .iter()
        .filter(|h| h.as_str() == "replies-1")
        .count();
    assert!(first_reply_clicks >= 2);
    assert_eq!(outcome.stats.sweep_passes, 2);
    assert_eq!(ids(&outcome), expected((1..=12).chain(101..=112)));
}

#[tokio::test]
async fn sweeping_disabled_leaves_replies_collapsed() {
    let dom = SimDom::new(with_one_reply_each(1, 3)).initially_visible(3);
    let tunables = RevealTunables {
        max_rounds: 2,
        bonus_clicks: 0,
        sweep_passes: 0,
        ..fast()
    };

    let outcome = reveal(&dom, tunables, None).await.unwrap();

    assert_eq!(outcome.stats.sweep_passes, 0);
    assert_eq!(dom.expanded_reply_count(), 2);
    assert_eq!(outcome.snapshot.identity_count(), 5);
}

#[tokio::test]
async fn truncated_text_is_expanded_in_place() {
    let long = "this comment is rather long indeed";
    let dom = SimDom::new(vec![
        SimComment::new(1, "ada", long).truncated(),
        SimComment::new(2, "bob", "short"),
    ])
    .initially_visible(2);

    let outcome = reveal(&dom, fast(), Some(2)).await.unwrap();

    assert_eq!(outcome.snapshot.len(), 2);
    let first = &outcome.snapshot.items[0];
    assert_eq!(first.identity.as_deref(), Some("1"));
    assert_eq!(first.text.as_deref(), Some(long));
    assert!(dom.clicks().contains(&"seemore-1".to_string()));
}

#[tokio::test]
async fn opaque_tokens_decode_to_comment_ids() {
    let dom = SimDom::new(with_one_reply_each(41, 2))
        .initially_visible(2)
        .token_style(TokenStyle::Opaque);

    let outcome = reveal(&dom, fast(), Some(4)).await.unwrap();

    assert_eq!(ids(&outcome), expected([41, 42, 141, 142]));
}

#[tokio::test]
async fn href_tokens_prefer_reply_ids() {
    let dom = SimDom::new(with_one_reply_each(7, 2))
        .initially_visible(2)
        .token_style(TokenStyle::Href);

    let outcome = reveal(&dom, fast(), Some(4)).await.unwrap();

    assert_eq!(ids(&outcome), expected([7, 8, 107, 108]));
}

#[tokio::test]
async fn missing_tokens_fall_back_to_item_count() {
    let dom = SimDom::new(SimComment::numbered(1, 5))
        .initially_visible(5)
        .token_style(TokenStyle::Missing);

    let outcome = reveal(&dom, fast(), Some(5)).await.unwrap();

    assert_eq!(outcome.termination, Termination::CountReached);
    assert_eq!(outcome.snapshot.len(), 5);
    assert_eq!(outcome.snapshot.identity_count(), 0);
}

// ---------------------------------------------------------------------------
// Page faults
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_root_is_relocated() {
    let dom = SimDom::new(SimComment::numbered(1, 6))
        .initially_visible(3)
        .stale_thread(1);

    let outcome = reveal(&dom, fast(), Some(6)).await.unwrap();

    assert_eq!(outcome.stats.relocations, 1);
    assert_eq!(outcome.termination, Termination::CountReached);
    assert_eq!(outcome.snapshot.identity_count(), 6);
    assert!(!outcome.located.degraded);
}

#[tokio::test]
async fn missing_container_degrades_to_document() {
    let dom = SimDom::new(SimComment::numbered(1, 6))
        .initially_visible(3)
        .without_container();

    let outcome = reveal(&dom, fast(), Some(6)).await.unwrap();

    assert!(outcome.located.degraded);
    assert_eq!(outcome.snapshot.identity_count(), 6);
}

#[tokio::test]
async fn malformed_control_list_is_absorbed() {
    let dom = SimDom::new(SimComment::numbered(1, 6))
        .initially_visible(3)
        .malformed(PageFn::ListControls);

    let outcome = reveal(&dom, fast(), Some(6)).await.unwrap();

    assert_eq!(outcome.termination, Termination::HardBottom);
    assert!(dom.clicks().is_empty());
    assert_eq!(outcome.snapshot.identity_count(), 3);
}

#[tokio::test]
async fn driver_failures_escape_the_pass() {
    let dom = SimDom::new(SimComment::numbered(1, 6)).fail_on(PageFn::ItemRefs);

    let err = reveal(&dom, fast(), Some(6)).await.unwrap_err();

    assert!(matches!(err, DriverError::Evaluation { .. }));
}
