use regex::Regex;

use crate::error::BusError;

/// A subscribe-time topic expression compiled to a full-string matcher.
///
/// Literal `.` separators match themselves; every `*` matches any sequence
/// of characters, including across segment boundaries. Matching is anchored
/// at both ends, so `"order.*"` matches `"order.created"` and
/// `"order.a.b"` but never `"preorder.created"`.
#[derive(Debug, Clone)]
pub struct TopicPattern {
    raw: String,
    regex: Regex,
}

impl TopicPattern {
    /// Compile a topic pattern. Fails fast with [`BusError::InvalidPattern`]
    /// so a bad subscription never reaches dispatch.
    pub fn compile(pattern: &str) -> Result<Self, BusError> {
        let rewritten = pattern.replace('.', "\\.").replace('*', ".*");
        let regex =
            Regex::new(&format!("^(?:{rewritten})$")).map_err(|source| BusError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self {
            raw: pattern.to_string(),
            regex,
        })
    }

    /// Whether `topic` matches the entire pattern.
    pub fn matches(&self, topic: &str) -> bool {
        self.regex.is_match(topic)
    }

    /// The pattern string as supplied at subscribe time.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}
