// Cheap "how many comments does the page claim" check.
//
// Strategies run in a fixed priority order and the first one yielding a
// positive count wins. This is a priority list, not a vote: a low-priority
// strategy is only consulted when every stronger signal is absent.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use threadwatch_common::DomView;

use crate::numeric::{counts_in, parse_count};
use crate::patterns::{PatternKind, PatternTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyId {
    /// Number adjacent to an explicit "comments" label.
    ExplicitLabel,
    /// Localized numeric+unit phrase inside a longer label.
    UnitPhrase,
    /// "X of Y" phrasing, yields Y.
    OfPhrasing,
    /// Largest digit token inside a comment-themed block, timestamps aside.
    LargestNearTheme,
    /// How many items are identifiable right now.
    IdentityCardinality,
}

impl StrategyId {
    pub const PRIORITY: [StrategyId; 5] = [
        StrategyId::ExplicitLabel,
        StrategyId::UnitPhrase,
        StrategyId::OfPhrasing,
        StrategyId::LargestNearTheme,
        StrategyId::IdentityCardinality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyId::ExplicitLabel => "explicit-label",
            StrategyId::UnitPhrase => "unit-phrase",
            StrategyId::OfPhrasing => "of-phrasing",
            StrategyId::LargestNearTheme => "largest-near-theme",
            StrategyId::IdentityCardinality => "identity-cardinality",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `value == None` means "no signal", which is not the same as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountEstimate {
    pub value: Option<u64>,
    pub source: Option<StrategyId>,
}

impl CountEstimate {
    pub fn none() -> Self {
        Self {
            value: None,
            source: None,
        }
    }
}

pub struct CountEstimator {
    table: Arc<PatternTable>,
}

impl CountEstimator {
    pub fn new(table: Arc<PatternTable>) -> Self {
        Self { table }
    }

    pub fn estimate(&self, view: &DomView) -> CountEstimate {
        for strategy in StrategyId::PRIORITY {
            if let Some(value) = self.apply(strategy, view).filter(|v| *v > 0) {
                return CountEstimate {
                    value: Some(value),
                    source: Some(strategy),
                };
            }
        }
        CountEstimate::none()
    }

    /// Run a single strategy. Exposed so each can be tested in isolation.
    pub fn apply(&self, strategy: StrategyId, view: &DomView) -> Option<u64> {
        match strategy {
            StrategyId::ExplicitLabel => self.first_capture(PatternKind::CommentLabel, &view.labels),
            StrategyId::UnitPhrase => self.first_capture(PatternKind::UnitPhrase, &view.labels),
            StrategyId::OfPhrasing => {
                let texts: Vec<String> =
                    view.labels.iter().chain(&view.blocks).cloned().collect();
                self.first_capture(PatternKind::OfPhrasing, &texts)
            }
            StrategyId::LargestNearTheme => view
                .blocks
                .iter()
                .filter(|b| self.table.matches(PatternKind::CommentTheme, b))
                .flat_map(|b| counts_in(&self.table.strip(PatternKind::RelativeTime, b)))
                .max(),
            StrategyId::IdentityCardinality => Some(view.identity_count as u64),
        }
    }

    /// First positive `n` capture over texts, in text order then table order.
    fn first_capture(&self, kind: PatternKind, texts: &[String]) -> Option<u64> {
        texts.iter().find_map(|text| {
            self.table.of_kind(kind).find_map(|entry| {
                entry
                    .regex
                    .captures_iter(text)
                    .filter_map(|caps| caps.name("n"))
                    .filter_map(|m| parse_count(m.as_str()))
                    .find(|v| *v > 0)
            })
        })
    }
}
