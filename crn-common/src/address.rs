//! Address normalization and similarity
//!
//! Free-text postal addresses are parsed into a best-effort structure
//! (street number, street name, unit, city, state, zip) with USPS-style
//! abbreviations so that "123 Main Street" and "123 Main ST" compare equal.
//!
//! Parsing never fails. Missing parts only lower the achievable match score.

use crate::identity_hash::digest;
use crate::tuning::{
    SIMILARITY_CHAR_FALLBACK_SCALE, SIMILARITY_CITY_BONUS, SIMILARITY_EXACT_BASE,
    SIMILARITY_NUMBER_MATCH_BASE, SIMILARITY_NUMBER_MATCH_SCALE, SIMILARITY_WORD_JACCARD_MIN,
    SIMILARITY_ZIP_BONUS,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Trailing unit designator: "Apt 4B", "Suite 200", "#12"
static UNIT_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[\s,])(?:#\s*|(?:apt|apartment|unit|suite|ste|room|rm)\b\.?\s*#?\s*)([a-z0-9][a-z0-9-]*)\s*$")
        .expect("unit pattern is valid")
});

/// A whole segment that is only a unit designator
static UNIT_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:#\s*|(?:apt|apartment|unit|suite|ste|room|rm)\b\.?\s*#?\s*)([a-z0-9][a-z0-9-]*)$")
        .expect("unit segment pattern is valid")
});

static ZIP_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{5})(?:-\d{4})?\b").expect("zip pattern is valid"));

/// Word → abbreviation. Directionals first, then street types.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("NORTH", "N"),
    ("SOUTH", "S"),
    ("EAST", "E"),
    ("WEST", "W"),
    ("NORTHEAST", "NE"),
    ("NORTHWEST", "NW"),
    ("SOUTHEAST", "SE"),
    ("SOUTHWEST", "SW"),
    ("STREET", "ST"),
    ("AVENUE", "AVE"),
    ("AV", "AVE"),
    ("ROAD", "RD"),
    ("DRIVE", "DR"),
    ("LANE", "LN"),
    ("COURT", "CT"),
    ("PLACE", "PL"),
    ("BOULEVARD", "BLVD"),
    ("CIRCLE", "CIR"),
    ("TERRACE", "TER"),
    ("PARKWAY", "PKWY"),
    ("HIGHWAY", "HWY"),
    ("TRAIL", "TRL"),
    ("SQUARE", "SQ"),
    ("PLAZA", "PLZ"),
    ("ROUTE", "RT"),
    ("TURNPIKE", "TPKE"),
    ("EXPRESSWAY", "EXPY"),
];

const STREET_TYPES: &[&str] = &[
    "ST", "AVE", "RD", "DR", "LN", "CT", "PL", "BLVD", "CIR", "TER", "PKWY", "HWY", "TRL",
    "SQ", "PLZ", "RT", "TPKE", "EXPY", "WAY",
];

const STATES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN",
    "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH",
    "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT",
    "VT", "VA", "WA", "WV", "WI", "WY",
];

/// Parsed and normalized address. All text is upper case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedAddress {
    pub street_number: Option<String>,
    pub street_name: String,
    /// Street number + name, without the unit
    pub street: String,
    pub unit: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

impl NormalizedAddress {
    /// Full normalized form, e.g. `123 MAIN ST #4B, SPRINGFIELD, NJ 07081`
    pub fn canonical(&self) -> String {
        let mut line = self.street.clone();
        if let Some(unit) = &self.unit {
            if !line.is_empty() {
                line.push(' ');
            }
            line.push('#');
            line.push_str(unit);
        }

        let mut parts = vec![line];
        if let Some(city) = &self.city {
            parts.push(city.clone());
        }
        let region = [self.state.as_deref(), self.zip.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if !region.is_empty() {
            parts.push(region);
        }
        parts.retain(|p| !p.is_empty());
        parts.join(", ")
    }

    /// Fill the city from a separate field when the text carried none
    pub fn with_city_fallback(mut self, city: Option<&str>) -> Self {
        if self.city.is_none() {
            self.city = city.map(normalize_words).filter(|c| !c.is_empty());
        }
        self
    }

    /// Fill the state from a separate field when the text carried none
    pub fn with_state_fallback(mut self, state: Option<&str>) -> Self {
        if self.state.is_none() {
            self.state = state.map(normalize_words).filter(|s| !s.is_empty());
        }
        self
    }

    /// Key hashed into `address_hash`: `STREET [#UNIT]|CITY`.
    ///
    /// State and zip are left out because one side often lacks them
    /// (property records carry neither). Without a street and a city the
    /// address is too weak to key on.
    pub fn hash_key(&self) -> Option<String> {
        let city = self.city.as_deref()?;
        if self.street.is_empty() {
            return None;
        }
        let mut street = self.street.clone();
        if let Some(unit) = &self.unit {
            street.push_str(" #");
            street.push_str(unit);
        }
        Some(format!("{}|{}", street, city))
    }

    /// SHA-256 of [`hash_key`](Self::hash_key)
    pub fn address_hash(&self) -> Option<String> {
        self.hash_key().map(|key| digest(&key))
    }
}

/// Upper-case, collapse punctuation and whitespace, apply abbreviations
fn normalize_words(text: &str) -> String {
    text.to_uppercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(abbreviate)
        .collect::<Vec<_>>()
        .join(" ")
}

fn abbreviate(word: &str) -> &str {
    ABBREVIATIONS
        .iter()
        .find(|(full, _)| *full == word)
        .map(|(_, short)| *short)
        .unwrap_or(word)
}

fn normalize_unit(unit: &str) -> String {
    unit.to_uppercase().replace('-', "")
}

/// Split "SPRINGFIELD NJ 07081" style text into city / state / zip
fn split_region(text: &str) -> (Option<String>, Option<String>, Option<String>) {
    let zip = ZIP_CODE
        .captures_iter(text)
        .last()
        .map(|caps| caps[1].to_string());
    let without_zip = ZIP_CODE.replace_all(text, " ");
    let mut words: Vec<String> = normalize_words(&without_zip)
        .split_whitespace()
        .map(str::to_string)
        .collect();

    let state = match words.last() {
        Some(last) if STATES.contains(&last.as_str()) => words.pop(),
        _ => None,
    };
    let city = if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    };
    (city, state, zip)
}

/// Parse a free-text address into normalized parts
pub fn parse_address(raw: &str) -> NormalizedAddress {
    let mut segments: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let mut unit = None;
    if segments.len() > 1 {
        if let Some(pos) = segments[1..]
            .iter()
            .position(|s| UNIT_SEGMENT.is_match(s))
            .map(|p| p + 1)
        {
            unit = UNIT_SEGMENT
                .captures(segments[pos])
                .map(|caps| normalize_unit(&caps[1]));
            segments.remove(pos);
        }
    }

    let Some(street_raw) = segments.first().copied() else {
        return NormalizedAddress::default();
    };

    let mut street_text = street_raw.to_string();
    if unit.is_none() {
        if let Some(caps) = UNIT_SUFFIX.captures(street_raw) {
            unit = Some(normalize_unit(&caps[1]));
            if let Some(m) = caps.get(0) {
                street_text = street_raw[..m.start()].to_string();
            }
        }
    }

    let (city, state, mut zip) = match &segments[1..] {
        [] => (None, None, None),
        [region] => split_region(region),
        [city, .., region] => {
            let (extra_city, state, zip) = split_region(region);
            let city = normalize_words(city);
            let city = if city.is_empty() { extra_city } else { Some(city) };
            (city, state, zip)
        }
    };

    // Single-segment input may still end in a zip after the street
    if segments.len() == 1 && zip.is_none() {
        if let Some(caps) = ZIP_CODE.captures_iter(&street_text).last() {
            if let Some(m) = caps.get(0) {
                if m.start() > 0 {
                    zip = Some(caps[1].to_string());
                    street_text = street_text[..m.start()].to_string();
                }
            }
        }
    }

    let street = normalize_words(&street_text);
    let mut words = street.split_whitespace();
    let (street_number, street_name) = match words.clone().next() {
        Some(first) if first.starts_with(|c: char| c.is_ascii_digit()) => {
            words.next();
            (Some(first.to_string()), words.collect::<Vec<_>>().join(" "))
        }
        _ => (None, street.clone()),
    };

    NormalizedAddress {
        street_number,
        street_name,
        street,
        unit,
        city,
        state,
        zip,
    }
}

fn jaccard<T: Eq + std::hash::Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Word-set Jaccard similarity of two street names
pub fn word_jaccard(a: &str, b: &str) -> f64 {
    let a: HashSet<&str> = a.split_whitespace().collect();
    let b: HashSet<&str> = b.split_whitespace().collect();
    jaccard(&a, &b)
}

/// Character-set Jaccard similarity, ignoring whitespace and punctuation
pub fn char_jaccard(a: &str, b: &str) -> f64 {
    let a: HashSet<char> = a.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    let b: HashSet<char> = b.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    jaccard(&a, &b)
}

/// Similarity of two parsed addresses in [0.0, 1.0]
///
/// First applicable rule wins:
/// 1. identical street text: 0.8, +0.1 same city, +0.1 same zip
/// 2. same street number and street-name word Jaccard >= 0.5: 0.5 + J * 0.3
/// 3. character-set Jaccard of the canonical strings * 0.5
pub fn similarity_parsed(a: &NormalizedAddress, b: &NormalizedAddress) -> f64 {
    if !a.street.is_empty() && a.street == b.street {
        let mut score = SIMILARITY_EXACT_BASE;
        if a.city.is_some() && a.city == b.city {
            score += SIMILARITY_CITY_BONUS;
        }
        if a.zip.is_some() && a.zip == b.zip {
            score += SIMILARITY_ZIP_BONUS;
        }
        return score.min(1.0);
    }

    if let (Some(num_a), Some(num_b)) = (&a.street_number, &b.street_number) {
        if num_a == num_b {
            let words = word_jaccard(&a.street_name, &b.street_name);
            if words >= SIMILARITY_WORD_JACCARD_MIN {
                return SIMILARITY_NUMBER_MATCH_BASE + words * SIMILARITY_NUMBER_MATCH_SCALE;
            }
        }
    }

    char_jaccard(&a.canonical(), &b.canonical()) * SIMILARITY_CHAR_FALLBACK_SCALE
}

/// Similarity of two raw address strings
pub fn similarity(a: &str, b: &str) -> f64 {
    similarity_parsed(&parse_address(a), &parse_address(b))
}

/// Whether a free-text search query looks like an address rather than a name
/// or contact
pub fn is_address_like(query: &str) -> bool {
    let trimmed = query.trim();
    if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        return true;
    }
    if ZIP_CODE.is_match(trimmed) {
        return true;
    }

    let normalized = normalize_words(trimmed);
    let words: Vec<&str> = normalized.split_whitespace().collect();
    if words.iter().any(|w| STREET_TYPES.contains(w)) {
        return true;
    }
    matches!(words.last(), Some(last) if STATES.contains(last))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_address() {
        let addr = parse_address("123 North Main Street Apt 4B, Springfield, NJ 07081-1234");
        assert_eq!(addr.street_number.as_deref(), Some("123"));
        assert_eq!(addr.street_name, "N MAIN ST");
        assert_eq!(addr.street, "123 N MAIN ST");
        assert_eq!(addr.unit.as_deref(), Some("4B"));
        assert_eq!(addr.city.as_deref(), Some("SPRINGFIELD"));
        assert_eq!(addr.state.as_deref(), Some("NJ"));
        assert_eq!(addr.zip.as_deref(), Some("07081"));
        assert_eq!(addr.canonical(), "123 N MAIN ST #4B, SPRINGFIELD, NJ 07081");
    }

    #[test]
    fn test_unit_as_own_segment() {
        let addr = parse_address("9 Elm Ave., Suite 200, Trenton NJ");
        assert_eq!(addr.street, "9 ELM AVE");
        assert_eq!(addr.unit.as_deref(), Some("200"));
        assert_eq!(addr.city.as_deref(), Some("TRENTON"));
        assert_eq!(addr.state.as_deref(), Some("NJ"));
        assert_eq!(addr.zip, None);
    }

    #[test]
    fn test_hash_unit_suffix() {
        let addr = parse_address("55 Oak Road #12");
        assert_eq!(addr.street, "55 OAK RD");
        assert_eq!(addr.unit.as_deref(), Some("12"));
    }

    #[test]
    fn test_malformed_address_is_partial_not_error() {
        let addr = parse_address("Main Street");
        assert_eq!(addr.street_number, None);
        assert_eq!(addr.street_name, "MAIN ST");
        assert_eq!(addr.city, None);
        assert_eq!(addr.hash_key(), None);

        assert_eq!(parse_address(""), NormalizedAddress::default());
        assert_eq!(parse_address(" , , "), NormalizedAddress::default());
    }

    #[test]
    fn test_abbreviation_exact_match() {
        assert!(similarity("123 Main Street", "123 Main ST") >= 0.8);
    }

    #[test]
    fn test_unrelated_below_link_threshold() {
        assert!(similarity("123 Main St", "456 Oak Ave") < crate::tuning::ADDRESS_LINK_THRESHOLD);
    }

    #[test]
    fn test_exact_with_city_and_zip_bonus() {
        let score = similarity(
            "123 Main St, Springfield, NJ 07081",
            "123 Main Street, Springfield, NJ 07081",
        );
        assert!((score - 1.0).abs() < 1e-9);

        let score = similarity("123 Main St, Springfield", "123 Main St, Union");
        assert!((score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_same_number_word_overlap() {
        // {MAIN, ST} vs {MAIN, AVE}: J = 1/3 < 0.5, falls through
        let a = parse_address("10 Main St");
        let b = parse_address("10 Main Ave");
        assert!(similarity_parsed(&a, &b) < 0.5);

        // {W, MAIN, ST} vs {MAIN, ST}: J = 2/3
        let a = parse_address("10 West Main St");
        let b = parse_address("10 Main St");
        let expected = 0.5 + (2.0 / 3.0) * 0.3;
        assert!((similarity_parsed(&a, &b) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let pairs = [
            ("12 Abc St", "12 Abcdefg Street, Newark"),
            ("1 A", "1 A B C D E F"),
            ("77 Sunset Blvd", "Sunset"),
        ];
        for (a, b) in pairs {
            assert!((similarity(a, b) - similarity(b, a)).abs() < 1e-12, "{a} / {b}");
        }
    }

    #[test]
    fn test_hash_key_ignores_zip_state_and_formatting() {
        let a = parse_address("123 Main Street, Springfield, NJ 07081");
        let b = parse_address("123 MAIN ST.")
            .with_city_fallback(Some("springfield"))
            .with_state_fallback(Some("nj"));
        let c = parse_address("123 Main St").with_city_fallback(Some("Springfield"));
        assert_eq!(a.hash_key().as_deref(), Some("123 MAIN ST|SPRINGFIELD"));
        assert_eq!(a.address_hash(), b.address_hash());
        assert_eq!(a.address_hash(), c.address_hash());

        let unit = parse_address("123 Main St Apt 4B, Springfield, NJ");
        assert_eq!(unit.hash_key().as_deref(), Some("123 MAIN ST #4B|SPRINGFIELD"));
    }

    #[test]
    fn test_is_address_like() {
        assert!(is_address_like("123 Main"));
        assert!(is_address_like("Main Street"));
        assert!(is_address_like("Springfield 07081"));
        assert!(is_address_like("Springfield, NJ"));
        assert!(!is_address_like("Jane Smith"));
        assert!(!is_address_like("jane@example.com"));
    }
}
