use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Targets ---

/// Content variant of a monitored location. Each variant lays its comment
/// thread out differently, so locating and scrolling are variant-specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    FeedPost,
    Photo,
    Video,
    WatchPage,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::FeedPost => "feed-post",
            Variant::Photo => "photo",
            Variant::Video => "video",
            Variant::WatchPage => "watch-page",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monitored location. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: String,
    pub variant: Variant,
    #[serde(alias = "location", alias = "url")]
    pub location_ref: String,
}

// --- Items & snapshots ---

/// One comment (or reply) as seen on the page. Only `identity` matters for
/// dedup; the rest is best-effort display data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub identity: Option<String>,
    pub author: Option<String>,
    pub text: Option<String>,
    pub time_label: Option<String>,
    pub position: Option<u32>,
}

impl Item {
    pub fn with_identity(identity: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
            ..Default::default()
        }
    }

    pub fn has_identity(&self) -> bool {
        self.identity.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// Fill every empty field from `other`. Populated fields are never
    /// overwritten, so the first non-empty sighting wins.
    pub fn absorb(&mut self, other: &Item) {
        fill(&mut self.author, &other.author);
        fill(&mut self.text, &other.text);
        fill(&mut self.time_label, &other.time_label);
        if self.position.is_none() {
            self.position = other.position;
        }
    }
}

fn fill(slot: &mut Option<String>, candidate: &Option<String>) {
    let empty = slot.as_deref().map_or(true, |s| s.trim().is_empty());
    if !empty {
        return;
    }
    if let Some(value) = candidate.as_deref().filter(|v| !v.trim().is_empty()) {
        *slot = Some(value.to_string());
    }
}

/// Items captured at one instant, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub items: Vec<Item>,
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items,
            captured_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Distinct identities present in this snapshot.
    pub fn identities(&self) -> BTreeSet<&str> {
        self.items
            .iter()
            .filter(|i| i.has_identity())
            .filter_map(|i| i.identity.as_deref())
            .collect()
    }

    pub fn identity_count(&self) -> usize {
        self.identities().len()
    }
}

// --- Persisted per-target state ---

/// What we remember about a target between polls.
///
/// `known_identities` only grows during a session; the only way to forget an
/// identity is an external reset of the persisted file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownState {
    #[serde(default)]
    pub known_identities: BTreeSet<String>,
    #[serde(default)]
    pub last_count: Option<u64>,
}

impl KnownState {
    pub fn knows(&self, identity: &str) -> bool {
        self.known_identities.contains(identity)
    }
}

/// On-disk shape: `{ [targetId]: KnownState }`.
pub type StateMap = BTreeMap<String, KnownState>;

// --- Notification payloads ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItemsEvent {
    pub target: Target,
    pub new_items: Vec<Item>,
    pub count_before: Option<u64>,
    pub count_after: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub target: Target,
    pub consecutive_failures: u32,
    pub last_error: String,
    pub raised_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_keeps_first_populated_value() {
        let mut first = Item {
            identity: Some("1".into()),
            author: Some("Ada".into()),
            text: Some("  ".into()),
            ..Default::default()
        };
        let second = Item {
            identity: Some("1".into()),
            author: Some("Someone else".into()),
            text: Some("hello".into()),
            time_label: Some("2h".into()),
            position: Some(4),
        };
        first.absorb(&second);
        assert_eq!(first.author.as_deref(), Some("Ada"));
        assert_eq!(first.text.as_deref(), Some("hello"));
        assert_eq!(first.time_label.as_deref(), Some("2h"));
        assert_eq!(first.position, Some(4));
    }

    #[test]
    fn absorb_never_clears_a_field() {
        let mut item = Item {
            text: Some("kept".into()),
            ..Default::default()
        };
        item.absorb(&Item::default());
        assert_eq!(item.text.as_deref(), Some("kept"));
    }

    #[test]
    fn snapshot_counts_distinct_identities_only() {
        let snapshot = Snapshot::new(vec![
            Item::with_identity("1"),
            Item::with_identity("1"),
            Item::with_identity("2"),
            Item::default(),
            Item::with_identity(""),
        ]);
        assert_eq!(snapshot.len(), 5);
        assert_eq!(snapshot.identity_count(), 2);
    }

    #[test]
    fn known_state_uses_camel_case_on_disk() {
        let mut state = KnownState::default();
        state.known_identities.insert("42".into());
        state.last_count = Some(7);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["knownIdentities"], serde_json::json!(["42"]));
        assert_eq!(json["lastCount"], serde_json::json!(7));

        let back: KnownState = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(back.known_identities.is_empty());
        assert_eq!(back.last_count, None);
    }

    #[test]
    fn target_accepts_location_alias() {
        let t: Target = serde_json::from_str(
            r#"{"id":"a","variant":"watch-page","location":"https://example.com/v/1"}"#,
        )
        .unwrap();
        assert_eq!(t.variant, Variant::WatchPage);
        assert_eq!(t.location_ref, "https://example.com/v/1");
    }
}
