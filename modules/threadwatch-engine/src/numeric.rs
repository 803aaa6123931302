//! Locale-tolerant parsing of UI count strings ("1.2K", "1,5 mila", "12.345").

use std::sync::LazyLock;

use regex::Regex;

use crate::patterns::NUM;

/// Any count-like token inside free text.
pub static NUMBER_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i){NUM}")).unwrap_or_else(|e| panic!("number token pattern: {e}"))
});

const THOUSAND: u64 = 1_000;
const MILLION: u64 = 1_000_000;

// Localized magnitude suffixes, matched after lowercasing and trimming a
// trailing period.
const SUFFIXES: &[(&str, u64)] = &[
    ("k", THOUSAND),
    ("thousand", THOUSAND),
    ("mila", THOUSAND),
    ("mille", THOUSAND),
    ("mil", THOUSAND),
    ("milhares", THOUSAND),
    ("tsd", THOUSAND),
    ("m", MILLION),
    ("million", MILLION),
    ("millions", MILLION),
    ("milioni", MILLION),
    ("millones", MILLION),
    ("milhões", MILLION),
    ("mln", MILLION),
    ("mio", MILLION),
];

fn is_separator(c: char) -> bool {
    matches!(c, '.' | ',' | '\u{a0}' | '\u{202f}')
}

/// Parse a count string. Accepts decimal-comma and decimal-point locales and
/// magnitude suffixes. Returns `None` for anything that is not a count.
///
/// Without a suffix, separators must be thousands grouping (`1.234`,
/// `1,234,567`); a bare fraction like `12.5` is rejected.
pub fn parse_count(raw: &str) -> Option<u64> {
    let s = raw.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }

    let split = s
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || is_separator(*c)))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    let (number, suffix) = s.split_at(split);
    let number = number.trim_end_matches(is_separator);
    let suffix = suffix.trim().trim_end_matches('.');

    if number.is_empty() || !number.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    let multiplier = if suffix.is_empty() {
        1
    } else {
        SUFFIXES
            .iter()
            .find(|(name, _)| *name == suffix)
            .map(|(_, m)| *m)?
    };

    let groups: Vec<&str> = number.split(is_separator).collect();
    if groups.iter().any(|g| g.is_empty()) {
        return None;
    }

    if multiplier == 1 {
        if groups.len() > 1 && groups[1..].iter().any(|g| g.len() != 3) {
            return None;
        }
        return groups.concat().parse().ok();
    }

    // With a suffix the last separator is a decimal mark, unless there are
    // several separators and the last group still looks like grouping.
    let decimal = groups.len() == 2 || (groups.len() > 2 && groups[groups.len() - 1].len() != 3);
    let (int_part, frac_part) = if groups.len() > 1 && decimal {
        (groups[..groups.len() - 1].concat(), groups[groups.len() - 1])
    } else {
        (groups.concat(), "")
    };

    let int: u64 = int_part.parse().ok()?;
    let mut value = int.checked_mul(multiplier)?;
    if !frac_part.is_empty() {
        // Only as many fractional digits as the multiplier can hold.
        let digits = frac_part.len().min(multiplier.ilog10() as usize);
        let frac: u64 = frac_part[..digits].parse().ok()?;
        let scale = 10u64.pow(digits as u32);
        value = value.checked_add(frac * (multiplier / scale))?;
    }
    Some(value)
}

/// Every count-like token in `text`, parsed.
pub fn counts_in(text: &str) -> Vec<u64> {
    NUMBER_TOKEN
        .find_iter(text)
        .filter_map(|m| parse_count(m.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_integers() {
        assert_eq!(parse_count("12"), Some(12));
        assert_eq!(parse_count(" 0 "), Some(0));
    }

    #[test]
    fn thousands_grouping_in_either_locale() {
        assert_eq!(parse_count("1,234"), Some(1234));
        assert_eq!(parse_count("1.234"), Some(1234));
        assert_eq!(parse_count("1.234.567"), Some(1_234_567));
        assert_eq!(parse_count("12\u{a0}345"), Some(12_345));
    }

    #[test]
    fn bare_fractions_are_not_counts() {
        assert_eq!(parse_count("12.5"), None);
        assert_eq!(parse_count("1,23"), None);
    }

    #[test]
    fn magnitude_suffixes() {
        assert_eq!(parse_count("1.2K"), Some(1200));
        assert_eq!(parse_count("1,2K"), Some(1200));
        assert_eq!(parse_count("3k"), Some(3000));
        assert_eq!(parse_count("2,5 mila"), Some(2500));
        assert_eq!(parse_count("1.25M"), Some(1_250_000));
        assert_eq!(parse_count("4 million"), Some(4_000_000));
        assert_eq!(parse_count("3,4 mln"), Some(3_400_000));
        assert_eq!(parse_count("7 mil"), Some(7000));
        assert_eq!(parse_count("1,5 Mio."), Some(1_500_000));
        assert_eq!(parse_count("1,234K"), Some(1234));
        assert_eq!(parse_count("1.234.567K"), Some(1_234_567_000));
    }

    #[test]
    fn noise_is_rejected() {
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("abc"), None);
        assert_eq!(parse_count("12abc"), None);
        assert_eq!(parse_count(",5"), None);
        assert_eq!(parse_count("1..2"), None);
    }

    #[test]
    fn finds_tokens_in_text() {
        assert_eq!(
            counts_in("Top comments · 1.2K reactions · 45 shares"),
            vec![1200, 45]
        );
    }
}
