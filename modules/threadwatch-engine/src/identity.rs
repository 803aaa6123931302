//! Raw item references → canonical identities and merged items.

use std::collections::HashMap;
use std::sync::LazyLock;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use regex::Regex;
use tracing::debug;
use url::Url;

use threadwatch_common::{Item, RawItemRef, Snapshot, WatchError};

/// Query parameters carrying an item id, most specific first.
const ID_PARAMS: &[&str] = &["reply_comment_id", "comment_id"];

/// `...:<parent>_<item>` inside a decoded opaque token.
static EMBEDDED_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":(\d+)_(\d+)").unwrap_or_else(|e| panic!("{e}")));

/// `...:<item>` at the end of a decoded opaque token.
static EMBEDDED_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":(\d+)$").unwrap_or_else(|e| panic!("{e}")));

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Canonical identity for one token.
///
/// Plain integers map to themselves. Hrefs and query strings yield their id
/// parameter, which is then parsed the same way. Anything else is treated as
/// an opaque base64 token whose decoded form embeds the numeric id.
pub fn parse_identity(token: &str) -> Result<String, WatchError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(WatchError::Extraction("empty token".to_string()));
    }
    if is_numeric(token) {
        return Ok(token.to_string());
    }
    if token.contains('=') && (token.contains('?') || token.contains('&') || token.contains("://"))
    {
        return match query_id(token) {
            Some(inner) => parse_identity(&inner),
            None => Err(WatchError::Extraction(format!(
                "no id parameter in {token}"
            ))),
        };
    }
    decode_opaque(token)
}

fn query_id(token: &str) -> Option<String> {
    let url = Url::parse(token)
        .or_else(|_| {
            let query = token.split_once('?').map_or(token, |(_, q)| q);
            Url::parse(&format!("https://placeholder.invalid/?{query}"))
        })
        .ok()?;
    let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();
    ID_PARAMS
        .iter()
        .find_map(|p| pairs.get(*p).filter(|v| !v.is_empty()).cloned())
}

fn decode_opaque(token: &str) -> Result<String, WatchError> {
    let trimmed = token.trim_end_matches('=');
    let bytes = [&STANDARD, &URL_SAFE]
        .iter()
        .find_map(|engine| engine.decode(token).ok())
        .or_else(|| {
            [&STANDARD_NO_PAD, &URL_SAFE_NO_PAD]
                .iter()
                .find_map(|engine| engine.decode(trimmed).ok())
        })
        .ok_or_else(|| WatchError::Extraction(format!("undecodable token {token}")))?;

    let decoded = String::from_utf8_lossy(&bytes);
    if let Some(caps) = EMBEDDED_PAIR.captures_iter(&decoded).last() {
        return Ok(caps[2].to_string());
    }
    if let Some(caps) = EMBEDDED_TAIL.captures(&decoded) {
        return Ok(caps[1].to_string());
    }
    Err(WatchError::Extraction(format!(
        "no embedded id in decoded token {decoded:?}"
    )))
}

/// Turns page references into a snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityExtractor;

impl IdentityExtractor {
    pub fn new() -> Self {
        Self
    }

    /// One item per reference, identity-less when the token is missing or
    /// unparseable. Failures are per item and never abort the batch.
    pub fn item(&self, raw: &RawItemRef) -> Item {
        let identity = match raw.token.as_deref() {
            Some(token) => match parse_identity(token) {
                Ok(id) => Some(id),
                Err(e) => {
                    debug!(error = %e, "Item without identity");
                    None
                }
            },
            None => None,
        };
        Item {
            identity,
            author: raw.author.clone(),
            text: raw.text.clone(),
            time_label: raw.time_label.clone(),
            position: raw.position,
        }
    }

    /// Snapshot in first-sighting order. Repeated sightings of one item merge
    /// into the first, field by field. Without an identity, references at the
    /// same position are taken to be the same item.
    pub fn extract_all(&self, refs: &[RawItemRef]) -> Snapshot {
        let mut items: Vec<Item> = Vec::with_capacity(refs.len());
        let mut index: HashMap<SightingKey, usize> = HashMap::new();

        for raw in refs {
            let item = self.item(raw);
            let key = match (&item.identity, item.position) {
                (Some(id), _) => Some(SightingKey::Identity(id.clone())),
                (None, Some(p)) => Some(SightingKey::Position(p)),
                (None, None) => None,
            };
            match key {
                Some(key) => match index.get(&key) {
                    Some(&i) => items[i].absorb(&item),
                    None => {
                        index.insert(key, items.len());
                        items.push(item);
                    }
                },
                None => items.push(item),
            }
        }

        Snapshot::new(items)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SightingKey {
    Identity(String),
    Position(u32),
}
