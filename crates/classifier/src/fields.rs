//! The labeled-pattern leaf primitive every parser in this crate builds on.

use std::collections::BTreeMap;

use regex::Regex;

use crate::model::ConfigError;

/// Named captures produced by a [`FieldPattern`], keyed by group name.
///
/// `BTreeMap` so capture output iterates in a stable order.
pub type FieldMap = BTreeMap<String, String>;

/// A labeled pattern with named capture slots.
///
/// Stateless: compiled once, reused across calls. Applying it to a message
/// either yields the named captures that participated in the match, or
/// nothing.
#[derive(Debug, Clone)]
pub struct FieldPattern {
    label: &'static str,
    regex: Regex,
}

impl FieldPattern {
    /// Compile `pattern` under `label`. The label names the pattern in
    /// configuration errors and diagnostics.
    pub fn new(label: &'static str, pattern: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
            label: label.to_string(),
            source,
        })?;
        Ok(Self { label, regex })
    }

    /// Compile a pattern known to be valid; for the crate's static built-ins.
    pub(crate) fn must(label: &'static str, pattern: &str) -> Self {
        Self::new(label, pattern).expect("built-in pattern must compile")
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn is_match(&self, message: &str) -> bool {
        self.regex.is_match(message)
    }

    /// Named captures for `message`, or `None` if the pattern does not
    /// match. Optional groups that did not participate are absent from the
    /// map, never empty strings.
    pub fn captures(&self, message: &str) -> Option<FieldMap> {
        let caps = self.regex.captures(message)?;
        Some(self.named_fields(&caps))
    }

    /// Like [`captures`](Self::captures), but only for a match anchored at
    /// the start of `message`; also returns the remainder after the match.
    /// Used to peel envelope prefixes off a line.
    pub fn strip_prefix<'m>(&self, message: &'m str) -> Option<(FieldMap, &'m str)> {
        let caps = self.regex.captures(message)?;
        let whole = caps.get(0)?;
        if whole.start() != 0 {
            return None;
        }
        Some((self.named_fields(&caps), &message[whole.end()..]))
    }

    fn named_fields(&self, caps: &regex::Captures<'_>) -> FieldMap {
        let mut fields = FieldMap::new();
        for name in self.regex.capture_names().flatten() {
            if let Some(m) = caps.name(name) {
                fields.insert(name.to_string(), m.as_str().to_string());
            }
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captures_named_groups() {
        let pattern = FieldPattern::new(
            "status",
            r"status=(?P<code>\d{3}) method=(?P<method>[A-Z]+)",
        )
        .unwrap();

        let fields = pattern.captures("status=200 method=GET trailing").unwrap();
        assert_eq!(fields.get("code").map(String::as_str), Some("200"));
        assert_eq!(fields.get("method").map(String::as_str), Some("GET"));
    }

    #[test]
    fn test_no_match_yields_none() {
        let pattern = FieldPattern::new("status", r"status=(?P<code>\d{3})").unwrap();
        assert!(pattern.captures("nothing to see").is_none());
        assert!(!pattern.is_match("nothing to see"));
    }

    #[test]
    fn test_missing_optional_group_is_absent_not_empty() {
        let pattern = FieldPattern::new(
            "done",
            r"(?:elapsed=(?P<elapsed>[\d.]+) )?done",
        )
        .unwrap();

        let with = pattern.captures("elapsed=0.152 done").unwrap();
        assert_eq!(with.get("elapsed").map(String::as_str), Some("0.152"));

        let without = pattern.captures("done").unwrap();
        assert!(
            !without.contains_key("elapsed"),
            "non-participating group must be absent, got {:?}",
            without
        );
    }

    #[test]
    fn test_strip_prefix_returns_remainder() {
        let pattern =
            FieldPattern::new("envelope", r"^(?P<host>\S+) (?P<pid>\d+): ").unwrap();

        let (fields, rest) = pattern.strip_prefix("web-01 4227: the payload").unwrap();
        assert_eq!(fields.get("host").map(String::as_str), Some("web-01"));
        assert_eq!(fields.get("pid").map(String::as_str), Some("4227"));
        assert_eq!(rest, "the payload");
    }

    #[test]
    fn test_strip_prefix_requires_match_at_start() {
        let pattern = FieldPattern::new("marker", r"(?P<word>ready)").unwrap();
        assert!(pattern.strip_prefix("not ready yet").is_none());
    }

    #[test]
    fn test_invalid_pattern_is_a_config_error() {
        let err = FieldPattern::new("broken", r"(?P<oops").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("broken"), "error should name the label: {message}");
    }
}
