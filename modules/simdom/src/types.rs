//! World description for a simulated thread.

use serde::{Deserialize, Serialize};

/// A comment in the simulated thread, with its (collapsed) replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimComment {
    pub id: u64,
    pub author: String,
    pub text: String,
    /// Rendered cut short behind a "See more" control until expanded.
    pub truncated: bool,
    pub replies: Vec<SimComment>,
}

impl SimComment {
    pub fn new(id: u64, author: &str, text: &str) -> Self {
        Self {
            id,
            author: author.to_string(),
            text: text.to_string(),
            truncated: false,
            replies: Vec::new(),
        }
    }

    pub fn truncated(mut self) -> Self {
        self.truncated = true;
        self
    }

    pub fn with_replies(mut self, replies: Vec<SimComment>) -> Self {
        self.replies = replies;
        self
    }

    /// Numbered comments `first..first+n` by synthetic authors.
    pub fn numbered(first: u64, n: usize) -> Vec<SimComment> {
        (first..first + n as u64)
            .map(|id| SimComment::new(id, &format!("user{id}"), &format!("comment {id}")))
            .collect()
    }
}

/// How item identifiers appear in the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStyle {
    /// `"123"`
    Plain,
    /// `https://.../post/99?comment_id=123`
    Href,
    /// base64 of `comment:99_123`
    Opaque,
    /// No identifier at all.
    Missing,
}

/// Geometry of the simulated viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimLayout {
    pub row_height: f64,
    pub viewport: f64,
    /// Rows further than this many px outside the viewport are not rendered.
    /// `None` renders everything.
    pub virtual_buffer: Option<f64>,
    /// Thread scrolls inside its own container instead of the window.
    pub scroll_container: bool,
}

impl Default for SimLayout {
    fn default() -> Self {
        Self {
            row_height: 100.0,
            viewport: 800.0,
            virtual_buffer: None,
            scroll_container: true,
        }
    }
}
