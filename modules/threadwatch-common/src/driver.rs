// Browser-driver collaborator boundary.
//
// The engine never touches DOM nodes. Everything goes through named page
// functions evaluated by the driver, with JSON in and JSON out. Element
// references come back as opaque `Handle` tokens that may go stale whenever
// the page re-renders, so callers re-validate them with `PageFn::HandlesAlive`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DriverError;

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Opaque element token minted by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    pub const DOCUMENT: &'static str = "document";

    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The whole document. Always alive.
    pub fn document() -> Self {
        Self(Self::DOCUMENT.to_string())
    }

    pub fn is_document(&self) -> bool {
        self.0 == Self::DOCUMENT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Page functions
// ---------------------------------------------------------------------------

/// Named page-side functions. The script body for each lives in the driver
/// adapter; the engine only knows the name, the args and the result shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageFn {
    /// `{ root? }` -> [`DomView`]
    CountSignals,
    /// `{ variant }` -> `Vec<ContainerCandidate>`
    FindContainers,
    /// `{ root }` -> `Vec<ControlCandidate>`
    ListControls,
    /// `{ root }` -> `Vec<RawItemRef>`
    ItemRefs,
    /// `{ handle? }` -> [`ScrollMetrics`]; `null` handle means the window.
    ScrollMetrics,
    /// `{ handles: [..] }` -> `Vec<bool>`
    HandlesAlive,
}

impl PageFn {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageFn::CountSignals => "count_signals",
            PageFn::FindContainers => "find_containers",
            PageFn::ListControls => "list_controls",
            PageFn::ItemRefs => "item_refs",
            PageFn::ScrollMetrics => "scroll_metrics",
            PageFn::HandlesAlive => "handles_alive",
        }
    }
}

impl std::fmt::Display for PageFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cheap text view of the page used for count estimation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomView {
    /// aria-label / button / link texts.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Text of blocks that look comment-related.
    #[serde(default)]
    pub blocks: Vec<String>,
    /// Number of identifiable items currently rendered.
    #[serde(default)]
    pub identity_count: usize,
}

/// A region that might hold the thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerCandidate {
    pub handle: Handle,
    /// Short button/link texts inside the region (Reply, Like, ...).
    #[serde(default)]
    pub affordance_labels: Vec<String>,
    /// Whether the region contains the variant's anchor element.
    #[serde(default)]
    pub contains_anchor: bool,
    /// Nearest scrollable ancestor, if any.
    #[serde(default)]
    pub scrollable: Option<Handle>,
    /// `scrollHeight - clientHeight` of that ancestor.
    #[serde(default)]
    pub scroll_delta: f64,
}

/// A clickable element inside the thread root, before classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlCandidate {
    pub handle: Handle,
    pub text: String,
    /// Distance from the viewport top in px (negative when above).
    #[serde(default)]
    pub top: f64,
}

/// Where a raw reference was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefSource {
    TimeAnchor,
    Block,
}

/// One candidate item as reported by the page, before identity parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItemRef {
    /// Query-parameter style id, an opaque token, or an href carrying one.
    #[serde(default)]
    pub token: Option<String>,
    pub source: RefSource,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub time_label: Option<String>,
    #[serde(default)]
    pub position: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollMetrics {
    pub top: f64,
    pub height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    /// Slack for sub-pixel rounding at the bottom edge.
    pub const BOTTOM_TOLERANCE: f64 = 2.0;

    pub fn at_bottom(&self) -> bool {
        self.top + self.client_height >= self.height - Self::BOTTOM_TOLERANCE
    }

    pub fn max_top(&self) -> f64 {
        (self.height - self.client_height).max(0.0)
    }
}

// ---------------------------------------------------------------------------
// Actions & predicates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "handle", rename_all = "snake_case")]
pub enum ScrollTarget {
    Window,
    Element(Handle),
}

impl ScrollTarget {
    pub fn for_scrollable(scrollable: Option<&Handle>) -> Self {
        match scrollable {
            Some(h) if !h.is_document() => ScrollTarget::Element(h.clone()),
            _ => ScrollTarget::Window,
        }
    }
}

/// DOM condition polled by `BrowserDriver::wait_for`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WaitPredicate {
    /// More than `count` identifiable items are rendered under `root`.
    IdentityCountAbove { root: Handle, count: usize },
    /// `handle` is detached, hidden, or no longer shows `text`.
    ControlGone { handle: Handle, text: String },
    AnyOf { predicates: Vec<WaitPredicate> },
}

// ---------------------------------------------------------------------------
// BrowserDriver
// ---------------------------------------------------------------------------

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Run a named page function. Returns its JSON result.
    async fn evaluate(
        &self,
        call: PageFn,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, DriverError>;

    /// Poll `predicate` until it holds or `timeout` elapses.
    async fn wait_for(
        &self,
        predicate: &WaitPredicate,
        timeout: Duration,
    ) -> Result<bool, DriverError>;

    async fn click(&self, handle: &Handle) -> Result<(), DriverError>;

    async fn scroll_by(&self, target: &ScrollTarget, delta: f64) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    /// Navigation sits with the orchestrator, not the reveal engine.
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;
}
