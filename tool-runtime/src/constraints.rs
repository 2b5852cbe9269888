//! Constraint directives attached to record fields.
//!
//! A directive is the comma-separated text given to `#[tool("...")]`, for
//! example `required,minLength=1,description=Message to echo`. It is parsed
//! once per record type when the descriptor table is first built.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Number;
use tracing::{debug, warn};

const REQUIRED_MARKER: &str = "required";

/// Parsed constraint set for a single field.
#[derive(Debug, Clone, Default)]
pub struct Constraints {
    required: bool,
    minimum: Option<Number>,
    maximum: Option<Number>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    min_items: Option<usize>,
    max_items: Option<usize>,
    pattern: Option<String>,
    compiled_pattern: Option<Regex>,
    enum_values: Vec<String>,
    description: Option<String>,
    format: Option<String>,
    title: Option<String>,
    extra: BTreeMap<String, String>,
}

impl Constraints {
    /// Parses a directive string.
    ///
    /// Parsing never fails: malformed numeric bounds are dropped and an invalid
    /// pattern is kept for the schema but not enforced.
    #[must_use]
    pub fn parse(directive: &str) -> Self {
        let mut constraints = Self::default();
        let mut open: Option<Entry> = None;

        for segment in directive.split(',') {
            let trimmed = segment.trim();

            if trimmed == REQUIRED_MARKER {
                if let Some(entry) = open.take() {
                    constraints.apply(entry);
                }
                constraints.required = true;
                continue;
            }

            if let Some((key, value)) = split_entry(trimmed) {
                if let Some(entry) = open.take() {
                    constraints.apply(entry);
                }
                open = Some(Entry {
                    key: key.to_owned(),
                    parts: vec![value.to_owned()],
                });
                continue;
            }

            match open.as_mut() {
                Some(entry) if entry.key == "enum" => entry.parts.push(trimmed.to_owned()),
                Some(entry) if is_text_key(&entry.key) => entry.parts.push(segment.to_owned()),
                _ if trimmed.is_empty() => {}
                _ => debug!(segment = trimmed, "ignoring unrecognised directive segment"),
            }
        }

        if let Some(entry) = open.take() {
            constraints.apply(entry);
        }

        constraints
    }

    fn apply(&mut self, entry: Entry) {
        let Entry { key, parts } = entry;

        if key == "enum" {
            self.enum_values = parts
                .iter()
                .map(|part| part.trim())
                .filter(|part| !part.is_empty())
                .map(str::to_owned)
                .collect();
            return;
        }

        let value = parts.join(",").trim().to_owned();
        match key.as_str() {
            "minimum" => self.minimum = parse_number(&key, &value),
            "maximum" => self.maximum = parse_number(&key, &value),
            "minLength" => self.min_length = parse_count(&key, &value),
            "maxLength" => self.max_length = parse_count(&key, &value),
            "minItems" => self.min_items = parse_count(&key, &value),
            "maxItems" => self.max_items = parse_count(&key, &value),
            "description" => self.description = Some(value),
            "format" => self.format = Some(value),
            "title" => self.title = Some(value),
            "pattern" => {
                self.compiled_pattern = match Regex::new(&value) {
                    Ok(regex) => Some(regex),
                    Err(err) => {
                        warn!(pattern = %value, error = %err, "invalid pattern will not be enforced");
                        None
                    }
                };
                self.pattern = Some(value);
            }
            _ => {
                self.extra.insert(key, value);
            }
        }
    }

    /// Returns `true` when the directive carried the bare `required` marker.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Inclusive numeric lower bound.
    #[must_use]
    pub fn minimum(&self) -> Option<&Number> {
        self.minimum.as_ref()
    }

    /// Inclusive numeric upper bound.
    #[must_use]
    pub fn maximum(&self) -> Option<&Number> {
        self.maximum.as_ref()
    }

    /// Minimum text length in characters.
    #[must_use]
    pub const fn min_length(&self) -> Option<usize> {
        self.min_length
    }

    /// Maximum text length in characters.
    #[must_use]
    pub const fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    /// Minimum number of sequence elements.
    #[must_use]
    pub const fn min_items(&self) -> Option<usize> {
        self.min_items
    }

    /// Maximum number of sequence elements.
    #[must_use]
    pub const fn max_items(&self) -> Option<usize> {
        self.max_items
    }

    /// Regular expression source as written in the directive.
    #[must_use]
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    /// Compiled pattern, absent when the source failed to compile.
    #[must_use]
    pub fn compiled_pattern(&self) -> Option<&Regex> {
        self.compiled_pattern.as_ref()
    }

    /// Allowed values; empty when unrestricted.
    #[must_use]
    pub fn enum_values(&self) -> &[String] {
        &self.enum_values
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Format hint such as `email` or `date-time`.
    #[must_use]
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Short display title.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Unrecognised `key=value` entries, emitted verbatim into the schema.
    #[must_use]
    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }
}

struct Entry {
    key: String,
    parts: Vec<String>,
}

fn split_entry(segment: &str) -> Option<(&str, &str)> {
    let (key, value) = segment.split_once('=')?;
    let key = key.trim();
    let mut chars = key.chars();
    let leading = chars.next()?;
    if leading.is_ascii_alphabetic() && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Some((key, value.trim()))
    } else {
        None
    }
}

fn is_text_key(key: &str) -> bool {
    matches!(key, "description" | "title" | "pattern" | "format")
}

fn parse_number(key: &str, value: &str) -> Option<Number> {
    if let Ok(integer) = value.parse::<i64>() {
        return Some(Number::from(integer));
    }
    let parsed = value.parse::<f64>().ok().and_then(Number::from_f64);
    if parsed.is_none() {
        debug!(key, value, "dropping non-numeric bound");
    }
    parsed
}

fn parse_count(key: &str, value: &str) -> Option<usize> {
    let parsed = value.parse::<usize>().ok();
    if parsed.is_none() {
        debug!(key, value, "dropping non-integer count");
    }
    parsed
}
