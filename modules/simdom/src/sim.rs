//! SimDom — a scripted virtualized comment thread behind the driver trait.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use tracing::debug;

use threadwatch_common::{
    BrowserDriver, ContainerCandidate, ControlCandidate, DomView, DriverError, Handle, PageFn,
    RawItemRef, RefSource, ScrollMetrics, ScrollTarget, WaitPredicate,
};

use crate::types::{SimComment, SimLayout, TokenStyle};

/// Post id embedded in href and opaque tokens.
const POST_ID: u64 = 99;

const MORE_HANDLE: &str = "more-top";
const THREAD_HANDLE: &str = "thread";
const SCROLLER_HANDLE: &str = "scroller";
const SIDEBAR_HANDLE: &str = "sidebar";
const DIALOG_HANDLE: &str = "dialog";
const DIALOG_SCROLL_HANDLE: &str = "dialog-scroll";

/// In-memory thread implementing `BrowserDriver`.
///
/// Builder methods configure the world; `&self` methods mutate it between
/// polls the way a live page would.
pub struct SimDom {
    state: Mutex<SimState>,
}

struct SimState {
    comments: Vec<SimComment>,
    token_style: TokenStyle,
    layout: SimLayout,
    page_size: usize,
    initial: usize,
    revealed: usize,
    endless: bool,
    recollapse: bool,
    expanded_replies: HashSet<u64>,
    expanded_text: HashSet<u64>,
    scroll_top: f64,
    count_label: Option<String>,
    extra_labels: Vec<String>,
    blocks: Vec<String>,
    url: String,
    unresponsive: HashSet<String>,
    fail_on: Option<PageFn>,
    malformed: Option<PageFn>,
    no_container: bool,
    stale_thread_checks: u32,
    clicks: Vec<String>,
    navigations: u32,
}

/// One visible line of the flattened thread.
struct Row {
    id: u64,
    parent: Option<u64>,
    author: String,
    text: String,
    hidden_replies: usize,
    truncated: bool,
}

impl SimDom {
    pub fn new(comments: Vec<SimComment>) -> Self {
        let initial = comments.len().min(3);
        Self {
            state: Mutex::new(SimState {
                comments,
                token_style: TokenStyle::Plain,
                layout: SimLayout::default(),
                page_size: 3,
                initial,
                revealed: initial,
                endless: false,
                recollapse: false,
                expanded_replies: HashSet::new(),
                expanded_text: HashSet::new(),
                scroll_top: 0.0,
                count_label: None,
                extra_labels: vec!["Like".to_string(), "Share".to_string()],
                blocks: Vec::new(),
                url: "about:blank".to_string(),
                unresponsive: HashSet::new(),
                fail_on: None,
                malformed: None,
                no_container: false,
                stale_thread_checks: 0,
                clicks: Vec::new(),
                navigations: 0,
            }),
        }
    }

    fn configure(self, f: impl FnOnce(&mut SimState)) -> Self {
        {
            let mut s = self.lock();
            f(&mut s);
        }
        self
    }

    /// Top-level comments shown before any "more" click.
    pub fn initially_visible(self, n: usize) -> Self {
        self.configure(|s| {
            s.initial = n.min(s.comments.len());
            s.revealed = s.initial;
        })
    }

    /// Top-level comments revealed per "more" click.
    pub fn page_size(self, n: usize) -> Self {
        self.configure(|s| s.page_size = n.max(1))
    }

    pub fn token_style(self, style: TokenStyle) -> Self {
        self.configure(|s| s.token_style = style)
    }

    pub fn layout(self, layout: SimLayout) -> Self {
        self.configure(|s| s.layout = layout)
    }

    pub fn count_label(self, label: &str) -> Self {
        self.configure(|s| s.count_label = Some(label.to_string()))
    }

    pub fn block(self, text: &str) -> Self {
        self.configure(|s| s.blocks.push(text.to_string()))
    }

    /// Every "more" click reveals a fresh comment carrying its own collapsed
    /// reply, and the "more" control never goes away.
    pub fn endless(self) -> Self {
        self.configure(|s| s.endless = true)
    }

    /// Expanded replies fold back up once their whole subtree scrolls out
    /// above the render window. Needs a `virtual_buffer`.
    pub fn recollapse_offscreen(self) -> Self {
        self.configure(|s| s.recollapse = true)
    }

    /// Clicks on `handle` are accepted but change nothing.
    pub fn unresponsive(self, handle: &str) -> Self {
        self.configure(|s| {
            s.unresponsive.insert(handle.to_string());
        })
    }

    pub fn fail_on(self, call: PageFn) -> Self {
        self.configure(|s| s.fail_on = Some(call))
    }

    /// `call` returns a value that does not fit its result shape.
    pub fn malformed(self, call: PageFn) -> Self {
        self.configure(|s| s.malformed = Some(call))
    }

    pub fn without_container(self) -> Self {
        self.configure(|s| s.no_container = true)
    }

    /// The thread root reports as detached for the next `n` liveness checks.
    pub fn stale_thread(self, n: u32) -> Self {
        self.configure(|s| s.stale_thread_checks = n)
    }

    // --- live mutations ---

    pub fn push_comment(&self, comment: SimComment) {
        self.lock().comments.push(comment);
    }

    pub fn set_count_label(&self, label: Option<&str>) {
        self.lock().count_label = label.map(String::from);
    }

    // --- inspection ---

    pub fn clicks(&self) -> Vec<String> {
        self.lock().clicks.clone()
    }

    pub fn navigations(&self) -> u32 {
        self.lock().navigations
    }

    pub fn scroll_top(&self) -> f64 {
        self.lock().scroll_top
    }

    pub fn expanded_reply_count(&self) -> usize {
        self.lock().expanded_replies.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl SimState {
    fn rows(&self) -> Vec<Row> {
        let mut rows = Vec::new();
        for c in self.comments.iter().take(self.revealed) {
            self.push_rows(c, None, &mut rows);
        }
        rows
    }

    fn push_rows(&self, c: &SimComment, parent: Option<u64>, rows: &mut Vec<Row>) {
        let expanded = self.expanded_replies.contains(&c.id);
        let truncated = c.truncated && !self.expanded_text.contains(&c.id);
        let text = if truncated {
            c.text.chars().take(12).collect::<String>() + "..."
        } else {
            c.text.clone()
        };
        rows.push(Row {
            id: c.id,
            parent,
            author: c.author.clone(),
            text,
            hidden_replies: if expanded { 0 } else { c.replies.len() },
            truncated,
        });
        if expanded {
            for r in &c.replies {
                self.push_rows(r, Some(c.id), rows);
            }
        }
    }

    fn has_more(&self) -> bool {
        self.endless || self.revealed < self.comments.len()
    }

    fn metrics(&self, row_count: usize) -> ScrollMetrics {
        let footer = if self.has_more() { 1 } else { 0 };
        ScrollMetrics {
            top: self.scroll_top,
            height: (row_count + footer) as f64 * self.layout.row_height,
            client_height: self.layout.viewport,
        }
    }

    fn is_rendered(&self, index: usize) -> bool {
        let Some(buffer) = self.layout.virtual_buffer else {
            return true;
        };
        let h = self.layout.row_height;
        let row_top = index as f64 * h;
        row_top + h >= self.scroll_top - buffer
            && row_top <= self.scroll_top + self.layout.viewport + buffer
    }

    fn rendered(&self) -> Vec<(usize, Row)> {
        self.rows()
            .into_iter()
            .enumerate()
            .filter(|(i, _)| self.is_rendered(*i))
            .collect()
    }

    fn token(&self, row: &Row) -> Option<String> {
        match self.token_style {
            TokenStyle::Plain => Some(row.id.to_string()),
            TokenStyle::Href => Some(match row.parent {
                Some(p) => format!(
                    "https://example.com/post/{POST_ID}?comment_id={p}&reply_comment_id={}",
                    row.id
                ),
                None => format!("https://example.com/post/{POST_ID}?comment_id={}", row.id),
            }),
            TokenStyle::Opaque => Some(STANDARD.encode(format!("comment:{POST_ID}_{}", row.id))),
            TokenStyle::Missing => None,
        }
    }

    fn identity_count(&self) -> usize {
        if self.token_style == TokenStyle::Missing {
            return 0;
        }
        self.rendered().len()
    }

    fn controls(&self) -> Vec<ControlCandidate> {
        let h = self.layout.row_height;
        let mut out = Vec::new();
        let rows = self.rows();
        for (i, row) in rows.iter().enumerate() {
            if !self.is_rendered(i) {
                continue;
            }
            let top = i as f64 * h - self.scroll_top;
            if row.hidden_replies > 0 {
                let text = if row.hidden_replies == 1 {
                    "View 1 reply".to_string()
                } else {
                    format!("View {} replies", row.hidden_replies)
                };
                out.push(ControlCandidate {
                    handle: Handle::new(format!("replies-{}", row.id)),
                    text,
                    top: top + h * 0.8,
                });
            }
            if row.truncated {
                out.push(ControlCandidate {
                    handle: Handle::new(format!("seemore-{}", row.id)),
                    text: "See more".to_string(),
                    top: top + h * 0.5,
                });
            }
        }
        if self.has_more() {
            out.push(ControlCandidate {
                handle: Handle::new(MORE_HANDLE),
                text: "View more comments".to_string(),
                top: rows.len() as f64 * h - self.scroll_top,
            });
        }
        out
    }

    fn item_refs(&self) -> Vec<RawItemRef> {
        let mut refs = Vec::new();
        for (i, row) in self.rendered() {
            let token = self.token(&row);
            refs.push(RawItemRef {
                token: token.clone(),
                source: RefSource::TimeAnchor,
                author: None,
                text: None,
                time_label: Some(format!("{}m", row.id % 60 + 1)),
                position: Some(i as u32),
            });
            refs.push(RawItemRef {
                token,
                source: RefSource::Block,
                author: Some(row.author.clone()),
                text: Some(row.text.clone()),
                time_label: None,
                position: Some(i as u32),
            });
        }
        refs
    }

    fn containers(&self) -> Vec<ContainerCandidate> {
        if self.no_container {
            return Vec::new();
        }
        let metrics = self.metrics(self.rows().len());
        let affordances: Vec<String> = self
            .rendered()
            .iter()
            .flat_map(|_| ["Like".to_string(), "Reply".to_string()])
            .collect();
        let scrollable = self
            .layout
            .scroll_container
            .then(|| Handle::new(SCROLLER_HANDLE));
        vec![
            ContainerCandidate {
                handle: Handle::new(SIDEBAR_HANDLE),
                affordance_labels: vec!["Home".to_string(), "Menu".to_string()],
                contains_anchor: false,
                scrollable: None,
                scroll_delta: 0.0,
            },
            ContainerCandidate {
                handle: Handle::new(DIALOG_HANDLE),
                affordance_labels: vec!["Like".to_string(), "Share".to_string()],
                contains_anchor: true,
                scrollable: Some(Handle::new(DIALOG_SCROLL_HANDLE)),
                scroll_delta: 0.0,
            },
            ContainerCandidate {
                handle: Handle::new(THREAD_HANDLE),
                affordance_labels: affordances,
                contains_anchor: true,
                scrollable,
                scroll_delta: metrics.max_top(),
            },
        ]
    }

    fn alive(&mut self, handle: &str) -> bool {
        match handle {
            Handle::DOCUMENT | SCROLLER_HANDLE | SIDEBAR_HANDLE | DIALOG_HANDLE
            | DIALOG_SCROLL_HANDLE => true,
            THREAD_HANDLE => {
                if self.stale_thread_checks > 0 {
                    self.stale_thread_checks -= 1;
                    false
                } else {
                    true
                }
            }
            other => self.controls().iter().any(|c| c.handle.as_str() == other),
        }
    }

    fn predicate_holds(&self, predicate: &WaitPredicate) -> bool {
        match predicate {
            WaitPredicate::IdentityCountAbove { count, .. } => self.identity_count() > *count,
            WaitPredicate::ControlGone { handle, text } => !self
                .controls()
                .iter()
                .any(|c| &c.handle == handle && &c.text == text),
            WaitPredicate::AnyOf { predicates } => {
                predicates.iter().any(|p| self.predicate_holds(p))
            }
        }
    }

    fn apply_click(&mut self, handle: &str) -> Result<(), DriverError> {
        if !self.controls().iter().any(|c| c.handle.as_str() == handle) {
            return Err(DriverError::StaleHandle(handle.to_string()));
        }
        self.clicks.push(handle.to_string());
        if self.unresponsive.contains(handle) {
            return Ok(());
        }

        if handle == MORE_HANDLE {
            if self.endless {
                let id = 10_000 + self.comments.len() as u64;
                let reply = SimComment::new(id + 50_000, "replier", "reply");
                self.comments.push(
                    SimComment::new(id, &format!("user{id}"), "more").with_replies(vec![reply]),
                );
                self.revealed = self.comments.len();
            } else {
                self.revealed = (self.revealed + self.page_size).min(self.comments.len());
            }
        } else if let Some(id) = handle.strip_prefix("replies-").and_then(|s| s.parse().ok()) {
            self.expanded_replies.insert(id);
        } else if let Some(id) = handle.strip_prefix("seemore-").and_then(|s| s.parse().ok()) {
            self.expanded_text.insert(id);
        }
        Ok(())
    }

    fn subtree_len(&self, c: &SimComment) -> usize {
        if !self.expanded_replies.contains(&c.id) {
            return 1;
        }
        1 + c.replies.iter().map(|r| self.subtree_len(r)).sum::<usize>()
    }

    /// Folds expanded top-level subtrees lying wholly above the render
    /// window. Scroll anchoring keeps the rendered rows where they were.
    fn recollapse_above(&mut self) {
        let Some(buffer) = self.layout.virtual_buffer else {
            return;
        };
        let h = self.layout.row_height;
        let mut index = 0;
        let mut folded = Vec::new();
        for c in self.comments.iter().take(self.revealed) {
            let len = self.subtree_len(c);
            if len > 1 && (index + len) as f64 * h < self.scroll_top - buffer {
                folded.push((c.id, len - 1));
            }
            index += len;
        }
        for (id, hidden) in folded {
            self.expanded_replies.remove(&id);
            self.scroll_top -= hidden as f64 * h;
        }
    }

    fn clamp_scroll(&mut self) {
        let max = self.metrics(self.rows().len()).max_top();
        self.scroll_top = self.scroll_top.clamp(0.0, max);
    }
}

#[async_trait]
impl BrowserDriver for SimDom {
    async fn evaluate(&self, call: PageFn, args: Value) -> Result<Value, DriverError> {
        let mut s = self.lock();
        debug!(%call, "simdom evaluate");
        if s.fail_on == Some(call) {
            return Err(DriverError::Evaluation {
                call: call.to_string(),
                message: "simulated evaluation failure".to_string(),
            });
        }
        if s.malformed == Some(call) {
            return Ok(json!("\u{1F4A5} not what you expected"));
        }

        let value = match call {
            PageFn::CountSignals => {
                let mut labels = Vec::new();
                if let Some(ref l) = s.count_label {
                    labels.push(l.clone());
                }
                labels.extend(s.extra_labels.iter().cloned());
                serde_json::to_value(DomView {
                    labels,
                    blocks: s.blocks.clone(),
                    identity_count: s.identity_count(),
                })
            }
            PageFn::FindContainers => serde_json::to_value(s.containers()),
            PageFn::ListControls => serde_json::to_value(s.controls()),
            PageFn::ItemRefs => serde_json::to_value(s.item_refs()),
            PageFn::ScrollMetrics => {
                let rows = s.rows().len();
                serde_json::to_value(s.metrics(rows))
            }
            PageFn::HandlesAlive => {
                let handles: Vec<String> = args
                    .get("handles")
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(|e| DriverError::Evaluation {
                        call: call.to_string(),
                        message: e.to_string(),
                    })?
                    .unwrap_or_default();
                let alive: Vec<bool> = handles.iter().map(|h| s.alive(h)).collect();
                serde_json::to_value(alive)
            }
        };

        value.map_err(|e| DriverError::Evaluation {
            call: call.to_string(),
            message: e.to_string(),
        })
    }

    async fn wait_for(
        &self,
        predicate: &WaitPredicate,
        _timeout: Duration,
    ) -> Result<bool, DriverError> {
        Ok(self.lock().predicate_holds(predicate))
    }

    async fn click(&self, handle: &Handle) -> Result<(), DriverError> {
        self.lock().apply_click(handle.as_str())
    }

    async fn scroll_by(&self, target: &ScrollTarget, delta: f64) -> Result<(), DriverError> {
        let mut s = self.lock();
        let scrolls_thread = match target {
            ScrollTarget::Window => !s.layout.scroll_container,
            ScrollTarget::Element(h) => {
                h.as_str() == SCROLLER_HANDLE || h.as_str() == THREAD_HANDLE
            }
        };
        if scrolls_thread {
            s.scroll_top += delta;
            s.clamp_scroll();
            if s.recollapse {
                s.recollapse_above();
            }
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.lock().url.clone())
    }

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let mut s = self.lock();
        s.url = url.to_string();
        s.navigations += 1;
        s.revealed = s.initial.min(s.comments.len());
        s.expanded_replies.clear();
        s.expanded_text.clear();
        s.scroll_top = 0.0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controls(dom: &SimDom) -> Vec<ControlCandidate> {
        dom.lock().controls()
    }

    #[tokio::test]
    async fn more_click_reveals_a_page() {
        let dom = SimDom::new(SimComment::numbered(1, 7)).initially_visible(2).page_size(3);
        assert_eq!(dom.lock().identity_count(), 2);
        dom.click(&Handle::new(MORE_HANDLE)).await.unwrap();
        assert_eq!(dom.lock().identity_count(), 5);
        dom.click(&Handle::new(MORE_HANDLE)).await.unwrap();
        assert_eq!(dom.lock().identity_count(), 7);
        assert!(controls(&dom).is_empty());
    }

    #[tokio::test]
    async fn clicking_a_missing_control_is_stale() {
        let dom = SimDom::new(SimComment::numbered(1, 2));
        let err = dom.click(&Handle::new("replies-1")).await.unwrap_err();
        assert!(matches!(err, DriverError::StaleHandle(_)));
    }

    #[tokio::test]
    async fn virtualization_drops_rows_out_of_view() {
        let dom = SimDom::new(SimComment::numbered(1, 30))
            .initially_visible(30)
            .layout(SimLayout {
                virtual_buffer: Some(200.0),
                ..SimLayout::default()
            });
        assert_eq!(dom.lock().identity_count(), 11);
        dom.scroll_by(&ScrollTarget::Element(Handle::new(SCROLLER_HANDLE)), 1500.0)
            .await
            .unwrap();
        let refs = dom.lock().item_refs();
        assert_eq!(dom.lock().identity_count(), 14);
        assert!(refs.iter().all(|r| r.token.as_deref() != Some("1")));
    }

    #[tokio::test]
    async fn navigate_resets_the_view() {
        let dom = SimDom::new(SimComment::numbered(1, 9)).initially_visible(3);
        dom.click(&Handle::new(MORE_HANDLE)).await.unwrap();
        dom.navigate("https://example.com/post/99").await.unwrap();
        assert_eq!(dom.lock().identity_count(), 3);
        assert_eq!(dom.navigations(), 1);
        assert_eq!(dom.current_url().await.unwrap(), "https://example.com/post/99");
    }

    #[tokio::test]
    async fn expanded_replies_fold_once_scrolled_past() {
        let comments = SimComment::numbered(1, 12)
            .into_iter()
            .map(|c| {
                let reply = SimComment::new(c.id + 100, "replier", "a reply");
                c.with_replies(vec![reply])
            })
            .collect();
        let dom = SimDom::new(comments)
            .initially_visible(12)
            .layout(SimLayout {
                virtual_buffer: Some(0.0),
                ..SimLayout::default()
            })
            .recollapse_offscreen();
        for id in 1..=3 {
            dom.click(&Handle::new(format!("replies-{id}"))).await.unwrap();
        }
        let scroller = ScrollTarget::Element(Handle::new(SCROLLER_HANDLE));

        dom.scroll_by(&scroller, 600.0).await.unwrap();

        // 1 and 2 lie wholly above the window; 3's reply is still on its edge
        assert_eq!(dom.expanded_reply_count(), 1);
        assert_eq!(dom.scroll_top(), 400.0);
    }

    #[tokio::test]
    async fn opaque_tokens_are_base64() {
        let dom = SimDom::new(SimComment::numbered(456, 1)).token_style(TokenStyle::Opaque);
        let refs = dom.lock().item_refs();
        let decoded = STANDARD.decode(refs[0].token.as_deref().unwrap()).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "comment:99_456");
    }
}
