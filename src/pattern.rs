//! Response pattern matching.

use std::fmt;

use regex::{Regex, RegexBuilder};
use tracing::error;

use crate::monitor::ValidationError;

/// Maximum allowed length of a pattern, in characters.
pub const MAX_PATTERN_LEN: usize = 128;

/// A validated, case-insensitive regular expression.
///
/// Compiled once and shared read-only by every probe of a monitor.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Validate and compile `source`.
    pub fn new(source: impl Into<String>) -> Result<Self, ValidationError> {
        let source = source.into();

        if source.chars().count() > MAX_PATTERN_LEN {
            let err = ValidationError::PatternTooLong {
                pattern: source,
                max: MAX_PATTERN_LEN,
            };
            error!("{}", err);
            return Err(err);
        }

        let regex = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                let err = ValidationError::PatternInvalid {
                    pattern: source.clone(),
                    error: e.to_string(),
                };
                error!("{}", err);
                err
            })?;

        Ok(Self { source, regex })
    }

    /// Compile an optional pattern; `None` means no matching.
    pub fn optional(source: Option<&str>) -> Result<Option<Self>, ValidationError> {
        source.map(Self::new).transpose()
    }

    /// Search `text` for the pattern anywhere (not a full match).
    #[inline]
    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// The pattern as configured.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}
