//! Tolerant matching for error banner wording
//!
//! The expected message is a set of acceptable phrasings. Any one of them
//! matching is a pass, and the caller learns which one did.

use regex::{Regex, RegexBuilder};

use crate::error::{ProbeError, ProbeResult};

/// Which phrasing matched a banner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerMatch {
    pub variant: String,
    pub matched_text: String,
}

#[derive(Debug, Clone)]
pub struct BannerMatcher {
    alternatives: Vec<(String, Regex)>,
}

impl BannerMatcher {
    /// Compile each alternative case-insensitively.
    ///
    /// Rejects an empty set and any alternative that also matches the empty
    /// string, since those would accept a banner with no recognisable signal.
    pub fn new<I, S>(patterns: I) -> ProbeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut alternatives = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
            if regex.is_match("") {
                return Err(ProbeError::InvalidPattern(format!(
                    "banner pattern '{}' matches empty text",
                    pattern
                )));
            }
            alternatives.push((pattern.to_string(), regex));
        }
        if alternatives.is_empty() {
            return Err(ProbeError::InvalidPattern(
                "at least one banner pattern is required".to_string(),
            ));
        }
        Ok(Self { alternatives })
    }

    /// First alternative, in configured order, found in `text`
    pub fn match_text(&self, text: &str) -> Option<BannerMatch> {
        self.alternatives.iter().find_map(|(variant, regex)| {
            regex.find(text).map(|m| BannerMatch {
                variant: variant.clone(),
                matched_text: m.as_str().to_string(),
            })
        })
    }

    /// All alternatives joined as one regex disjunction, for accessible-name queries
    pub fn disjunction(&self) -> String {
        self.alternatives
            .iter()
            .map(|(variant, _)| variant.as_str())
            .collect::<Vec<_>>()
            .join("|")
    }

    pub fn variants(&self) -> impl Iterator<Item = &str> {
        self.alternatives.iter().map(|(v, _)| v.as_str())
    }
}
