// Data-driven localized UI matching.
//
// Every literal phrase the estimator and the locator look for lives in one
// table of {pattern_id, locale, kind, regex}. Adding a locale means adding
// rows, never adding branches. Count-bearing patterns expose the number
// (plus any magnitude suffix) as the named group `n`.

use std::borrow::Cow;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use threadwatch_common::WatchError;

/// A number with optional grouping/decimal separators and magnitude suffix.
/// Kept in sync with `numeric::parse_count`.
pub const NUM: &str = r"\d+(?:[.,\x{a0}\x{202f}]\d+)*(?:\s*(?:thousand|millions?|milioni|millones|milhões|milhares|mila|mille|mln|mil|mio|tsd|k|m)\b\.?)?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternKind {
    /// Whole label is a count next to an explicit comments word.
    CommentLabel,
    /// Count + comments word somewhere inside a longer label.
    UnitPhrase,
    /// "10 of 45" phrasing; `n` is the total.
    OfPhrasing,
    /// Marks a block as comment-related.
    CommentTheme,
    MoreItems,
    NestedReplies,
    SeeMoreText,
    /// Reply / Like style buttons that mark a thread region.
    Affordance,
    /// Relative timestamps ("5m", "2 hours ago") that read like counts.
    RelativeTime,
}

/// Control kinds in action precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlKind {
    MoreItems,
    NestedReplies,
    SeeMoreText,
}

impl ControlKind {
    pub fn pattern_kind(&self) -> PatternKind {
        match self {
            ControlKind::MoreItems => PatternKind::MoreItems,
            ControlKind::NestedReplies => PatternKind::NestedReplies,
            ControlKind::SeeMoreText => PatternKind::SeeMoreText,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PatternEntry {
    pub id: String,
    pub locale: String,
    pub kind: PatternKind,
    pub regex: Regex,
}

/// Serialized form used for extension files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSpec {
    pub id: String,
    pub locale: String,
    pub kind: PatternKind,
    /// May reference the shared number pattern as `{NUM}`.
    pub pattern: String,
}

#[derive(Debug, Clone)]
pub struct PatternTable {
    entries: Vec<PatternEntry>,
}

// (id, locale, kind, pattern)
const BUILTIN: &[(&str, &str, PatternKind, &str)] = &[
    // --- explicit comment labels ---
    ("en.label", "en", PatternKind::CommentLabel, r"(?i)^\s*(?P<n>{NUM})\s*comments?\s*$"),
    ("en.label.prefix", "en", PatternKind::CommentLabel, r"(?i)^\s*comments?\s*[:(]?\s*(?P<n>{NUM})\s*\)?\s*$"),
    ("it.label", "it", PatternKind::CommentLabel, r"(?i)^\s*(?P<n>{NUM})\s*comment[io]\s*$"),
    ("it.label.prefix", "it", PatternKind::CommentLabel, r"(?i)^\s*comment[io]\s*[:(]?\s*(?P<n>{NUM})\s*\)?\s*$"),
    ("es.label", "es", PatternKind::CommentLabel, r"(?i)^\s*(?P<n>{NUM})\s*comentarios?\s*$"),
    ("pt.label", "pt", PatternKind::CommentLabel, r"(?i)^\s*(?P<n>{NUM})\s*comentários?\s*$"),
    ("fr.label", "fr", PatternKind::CommentLabel, r"(?i)^\s*(?P<n>{NUM})\s*commentaires?\s*$"),
    ("de.label", "de", PatternKind::CommentLabel, r"(?i)^\s*(?P<n>{NUM})\s*kommentare?\s*$"),
    // --- numeric + unit phrases inside longer labels ---
    ("en.unit", "en", PatternKind::UnitPhrase, r"(?i)(?P<n>{NUM})\s+comments?\b"),
    ("it.unit", "it", PatternKind::UnitPhrase, r"(?i)(?P<n>{NUM})\s+comment[io]\b"),
    ("es.unit", "es", PatternKind::UnitPhrase, r"(?i)(?P<n>{NUM})\s+comentarios?\b"),
    ("pt.unit", "pt", PatternKind::UnitPhrase, r"(?i)(?P<n>{NUM})\s+comentários?"),
    ("fr.unit", "fr", PatternKind::UnitPhrase, r"(?i)(?P<n>{NUM})\s+commentaires?\b"),
    ("de.unit", "de", PatternKind::UnitPhrase, r"(?i)(?P<n>{NUM})\s+kommentare?\b"),
    // --- "X of Y" ---
    ("en.of", "en", PatternKind::OfPhrasing, r"(?i)\b\d[\d.,]*\s+of\s+(?P<n>{NUM})"),
    ("it.of", "it", PatternKind::OfPhrasing, r"(?i)\b\d[\d.,]*\s+di\s+(?P<n>{NUM})"),
    ("es.of", "es", PatternKind::OfPhrasing, r"(?i)\b\d[\d.,]*\s+de\s+(?P<n>{NUM})"),
    ("fr.of", "fr", PatternKind::OfPhrasing, r"(?i)\b\d[\d.,]*\s+sur\s+(?P<n>{NUM})"),
    ("de.of", "de", PatternKind::OfPhrasing, r"(?i)\b\d[\d.,]*\s+von\s+(?P<n>{NUM})"),
    // --- comment-themed blocks ---
    ("en.theme", "en", PatternKind::CommentTheme, r"(?i)\bcomments?\b"),
    ("it.theme", "it", PatternKind::CommentTheme, r"(?i)\bcomment[io]\b"),
    ("es.theme", "es", PatternKind::CommentTheme, r"(?i)\bcomentarios?\b"),
    ("pt.theme", "pt", PatternKind::CommentTheme, r"(?i)\bcomentários?"),
    ("fr.theme", "fr", PatternKind::CommentTheme, r"(?i)\bcommentaires?\b"),
    ("de.theme", "de", PatternKind::CommentTheme, r"(?i)\bkommentare?\b"),
    // --- expand more top-level items ---
    ("en.more", "en", PatternKind::MoreItems, r"(?i)\b(?:view|see|show|load)\b.*\b(?:more|previous|all|older)\b.*\bcomments?\b"),
    ("en.more.short", "en", PatternKind::MoreItems, r"(?i)^\s*(?:more|previous)\s+comments\s*$"),
    ("it.more", "it", PatternKind::MoreItems, r"(?i)\b(?:visualizza|mostra|carica)\b.*\b(?:altri|tutti|precedenti)\b.*\bcommenti\b"),
    ("es.more", "es", PatternKind::MoreItems, r"(?i)\b(?:ver|mostrar|cargar)\b.*\b(?:más|todos|anteriores)\b.*\bcomentarios\b"),
    ("pt.more", "pt", PatternKind::MoreItems, r"(?i)\b(?:ver|mostrar|carregar)\b.*\b(?:mais|todos|anteriores)\b.*\bcomentários"),
    ("fr.more", "fr", PatternKind::MoreItems, r"(?i)\b(?:voir|afficher|charger)\b.*\b(?:plus|tous|précédents)\b.*\bcommentaires\b"),
    ("de.more", "de", PatternKind::MoreItems, r"(?i)\b(?:weitere|alle|vorherige)\b.*\bkommentare\b"),
    // --- expand nested replies ---
    ("en.replies", "en", PatternKind::NestedReplies, r"(?i)\b(?:view|see|show|load)\b.*\brepl(?:y|ies)\b|^\s*\d+\s+repl(?:y|ies)\s*$"),
    ("it.replies", "it", PatternKind::NestedReplies, r"(?i)\b(?:visualizza|mostra)\b.*\brispost[ae]\b|^\s*\d+\s+rispost[ae]\s*$"),
    ("es.replies", "es", PatternKind::NestedReplies, r"(?i)\b(?:ver|mostrar)\b.*\brespuestas?\b|^\s*\d+\s+respuestas?\s*$"),
    ("pt.replies", "pt", PatternKind::NestedReplies, r"(?i)\b(?:ver|mostrar)\b.*\brespostas?\b|^\s*\d+\s+respostas?\s*$"),
    ("fr.replies", "fr", PatternKind::NestedReplies, r"(?i)\b(?:voir|afficher)\b.*\bréponses?|^\s*\d+\s+réponses?\s*$"),
    ("de.replies", "de", PatternKind::NestedReplies, r"(?i)\b\d+\s+antworten\b|\balle\s+antworten\b|\bantworten\s+anzeigen\b"),
    // --- expand truncated text ---
    ("en.see_more", "en", PatternKind::SeeMoreText, r"(?i)^\s*(?:see|show|read)\s+more\s*$|^\s*more\s*$"),
    ("it.see_more", "it", PatternKind::SeeMoreText, r"(?i)^\s*(?:altro|(?:mostra|leggi)\s+(?:altro|di più))\s*$"),
    ("es.see_more", "es", PatternKind::SeeMoreText, r"(?i)^\s*(?:ver|leer)\s+más\s*$"),
    ("pt.see_more", "pt", PatternKind::SeeMoreText, r"(?i)^\s*(?:ver|ler)\s+mais\s*$"),
    ("fr.see_more", "fr", PatternKind::SeeMoreText, r"(?i)^\s*(?:voir|afficher|lire)\s+(?:plus|la suite)\s*$"),
    ("de.see_more", "de", PatternKind::SeeMoreText, r"(?i)^\s*(?:mehr\s+(?:anzeigen|ansehen)|mehr)\s*$"),
    // --- thread affordances ---
    ("en.affordance", "en", PatternKind::Affordance, r"(?i)^\s*(?:like|reply|share)\s*$"),
    ("it.affordance", "it", PatternKind::Affordance, r"(?i)^\s*(?:mi piace|rispondi|condividi)\s*$"),
    ("es.affordance", "es", PatternKind::Affordance, r"(?i)^\s*(?:me gusta|responder|compartir)\s*$"),
    ("pt.affordance", "pt", PatternKind::Affordance, r"(?i)^\s*(?:curtir|responder|compartilhar)\s*$"),
    ("fr.affordance", "fr", PatternKind::Affordance, r"(?i)^\s*(?:j[’']aime|répondre|partager)\s*$"),
    ("de.affordance", "de", PatternKind::Affordance, r"(?i)^\s*(?:gefällt mir|antworten|teilen)\s*$"),
    // --- relative timestamps; {GUARD} keeps "1.2m" intact ---
    ("en.time.short", "en", PatternKind::RelativeTime, r"(?i){GUARD}\d+\s*(?:s|m|mins?|h|hrs?|d|w|wks?|mo|y|yrs?)\b"),
    ("en.time.long", "en", PatternKind::RelativeTime, r"(?i){GUARD}\d+\s+(?:seconds?|minutes?|hours?|days?|weeks?|months?|years?)\b(?:\s+ago\b)?"),
    ("it.time", "it", PatternKind::RelativeTime, r"(?i){GUARD}\d+\s*(?:min|h|g|sett|or[ae]|giorn[oi]|settiman[ae]|mes[ei]|ann[oi])\b"),
    ("es.time", "es", PatternKind::RelativeTime, r"(?i){GUARD}\d+\s*(?:min|h|d|sem|horas?|días?|semanas?|meses|años?)\b"),
    ("pt.time", "pt", PatternKind::RelativeTime, r"(?i){GUARD}\d+\s*(?:min|h|d|sem|horas?|dias?|semanas?|meses|anos?)\b"),
    ("fr.time", "fr", PatternKind::RelativeTime, r"(?i){GUARD}\d+\s*(?:min|h|j|sem|heures?|jours?|semaines?|mois|ans?)\b"),
    ("de.time", "de", PatternKind::RelativeTime, r"(?i){GUARD}\d+\s*(?:min|std|t|tg|wo|stunden?|tagen?|wochen?|monaten?|jahren?)\b\.?"),
];

/// Start of text or a character that cannot belong to a number, so a match
/// never begins inside "1.2m" or "12,5h".
const GUARD: &str = r"(?:^|[^\d.,\x{a0}\x{202f}])";

fn compile(id: &str, pattern: &str) -> Result<Regex, WatchError> {
    Regex::new(&pattern.replace("{NUM}", NUM).replace("{GUARD}", GUARD))
        .map_err(|e| WatchError::Config(format!("pattern {id}: {e}")))
}

impl PatternTable {
    /// The built-in table. Fails only if a built-in pattern is invalid.
    pub fn builtin() -> Result<Self, WatchError> {
        let entries = BUILTIN
            .iter()
            .map(|(id, locale, kind, pattern)| {
                Ok(PatternEntry {
                    id: id.to_string(),
                    locale: locale.to_string(),
                    kind: *kind,
                    regex: compile(id, pattern)?,
                })
            })
            .collect::<Result<Vec<_>, WatchError>>()?;
        Ok(Self { entries })
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append rows. Later rows never shadow earlier ones; order within a kind
    /// is evaluation order.
    pub fn extend(&mut self, specs: Vec<PatternSpec>) -> Result<(), WatchError> {
        for spec in specs {
            let regex = compile(&spec.id, &spec.pattern)?;
            self.entries.push(PatternEntry {
                id: spec.id,
                locale: spec.locale,
                kind: spec.kind,
                regex,
            });
        }
        Ok(())
    }

    /// Built-in table plus rows from a JSON file of [`PatternSpec`].
    pub fn with_file(path: &Path) -> Result<Self, WatchError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| WatchError::Config(format!("reading {}: {e}", path.display())))?;
        let specs: Vec<PatternSpec> = serde_json::from_str(&raw)
            .map_err(|e| WatchError::Config(format!("parsing {}: {e}", path.display())))?;
        let mut table = Self::builtin()?;
        let added = specs.len();
        table.extend(specs)?;
        info!(path = %path.display(), added, "Loaded extra UI patterns");
        Ok(table)
    }

    pub fn of_kind(&self, kind: PatternKind) -> impl Iterator<Item = &PatternEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    pub fn matches(&self, kind: PatternKind, text: &str) -> bool {
        self.of_kind(kind).any(|e| e.regex.is_match(text))
    }

    /// Blank out every match of `kind` in `text`.
    pub fn strip<'a>(&self, kind: PatternKind, text: &'a str) -> Cow<'a, str> {
        let mut out = Cow::Borrowed(text);
        for entry in self.of_kind(kind) {
            let replaced = match entry.regex.replace_all(&out, " ") {
                Cow::Borrowed(_) => None,
                Cow::Owned(s) => Some(s),
            };
            if let Some(s) = replaced {
                out = Cow::Owned(s);
            }
        }
        out
    }

    /// Classify a control label. Reply-specific phrasing is checked first so
    /// "View more replies" counts as nested, not top-level.
    pub fn classify_control(&self, text: &str) -> Option<ControlKind> {
        [
            ControlKind::NestedReplies,
            ControlKind::MoreItems,
            ControlKind::SeeMoreText,
        ]
        .into_iter()
        .find(|kind| self.matches(kind.pattern_kind(), text))
    }

    pub fn locales(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.entries.iter().map(|e| e.locale.as_str()).collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PatternTable {
        PatternTable::builtin().unwrap()
    }

    #[test]
    fn builtin_table_compiles_every_locale() {
        let t = table();
        assert_eq!(t.locales(), vec!["de", "en", "es", "fr", "it", "pt"]);
    }

    #[test]
    fn classifies_controls_by_precedence_kind() {
        let t = table();
        assert_eq!(
            t.classify_control("View 5 more comments"),
            Some(ControlKind::MoreItems)
        );
        assert_eq!(
            t.classify_control("View more replies"),
            Some(ControlKind::NestedReplies)
        );
        assert_eq!(
            t.classify_control("3 replies"),
            Some(ControlKind::NestedReplies)
        );
        assert_eq!(t.classify_control("See more"), Some(ControlKind::SeeMoreText));
        assert_eq!(
            t.classify_control("Visualizza altri 12 commenti"),
            Some(ControlKind::MoreItems)
        );
        assert_eq!(
            t.classify_control("Visualizza 4 risposte"),
            Some(ControlKind::NestedReplies)
        );
        assert_eq!(t.classify_control("Reply"), None);
        assert_eq!(t.classify_control("Antworten"), None);
    }

    #[test]
    fn affordances_match_whole_labels_only() {
        let t = table();
        assert!(t.matches(PatternKind::Affordance, "Reply"));
        assert!(t.matches(PatternKind::Affordance, "Mi piace"));
        assert!(!t.matches(PatternKind::Affordance, "Reply to Ada"));
    }

    #[test]
    fn relative_timestamps_are_blanked() {
        let t = table();
        let strip = |text| t.strip(PatternKind::RelativeTime, text).into_owned();
        assert_eq!(strip("Ada · nice post · 5m · Reply"), "Ada · nice post · · Reply");
        assert_eq!(strip("2 hours ago"), " ");
        assert_eq!(strip("vor 3 Std."), "vor ");
        assert_eq!(strip("hace 4 días"), "hace ");
        assert_eq!(strip("1.2m views"), "1.2m views");
        assert_eq!(strip("45 comments 2,5 mila"), "45 comments 2,5 mila");
    }

    #[test]
    fn extension_rows_are_additive() {
        let mut t = table();
        let before = t.len();
        t.extend(vec![PatternSpec {
            id: "nl.label".into(),
            locale: "nl".into(),
            kind: PatternKind::CommentLabel,
            pattern: r"(?i)^\s*(?P<n>{NUM})\s*reacties\s*$".into(),
        }])
        .unwrap();
        assert_eq!(t.len(), before + 1);
        assert!(t.matches(PatternKind::CommentLabel, "12 reacties"));
    }

    #[test]
    fn invalid_extension_is_a_config_error() {
        let mut t = PatternTable::empty();
        let err = t
            .extend(vec![PatternSpec {
                id: "bad".into(),
                locale: "xx".into(),
                kind: PatternKind::Affordance,
                pattern: "(unclosed".into(),
            }])
            .unwrap_err();
        assert!(matches!(err, WatchError::Config(_)));
    }
}
