//! simdom — a deterministic, in-memory virtualized comment thread.
//!
//! Implements `BrowserDriver` so reveal passes and full polling cycles can be
//! exercised without a browser. Behaviour is scripted, not generated: the same
//! world and the same sequence of actions always yield the same page.

pub mod sim;
pub mod types;

pub use sim::SimDom;
pub use types::{SimComment, SimLayout, TokenStyle};
