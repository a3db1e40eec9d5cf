//! Artifact leak detection
//!
//! Cookies and storage entries whose names look authorization-bearing must not
//! exist after a failed or terminated authentication. Only names are ever
//! inspected or reported; values stay inside the snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::driver::{BrowserDriver, StorageKind};
use crate::error::{ProbeError, ProbeResult};

/// Where an artifact lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Cookie,
    Storage(StorageKind),
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Cookie => write!(f, "cookie"),
            ArtifactKind::Storage(kind) => write!(f, "{}", kind),
        }
    }
}

/// Cookies and storage captured at one point in time. Immutable once taken.
#[derive(Debug, Clone)]
pub struct ArtifactSnapshot {
    cookies: BTreeSet<(String, String)>,
    storage: BTreeMap<StorageKind, BTreeMap<String, String>>,
    taken_at: DateTime<Utc>,
}

impl ArtifactSnapshot {
    pub fn new(
        cookies: impl IntoIterator<Item = (String, String)>,
        storage: BTreeMap<StorageKind, BTreeMap<String, String>>,
    ) -> Self {
        Self {
            cookies: cookies.into_iter().collect(),
            storage,
            taken_at: Utc::now(),
        }
    }

    /// Read cookies and the requested storage areas from the driver
    pub async fn capture<D>(driver: &mut D, kinds: &[StorageKind]) -> ProbeResult<Self>
    where
        D: BrowserDriver + ?Sized,
    {
        let cookies = driver.read_cookies().await?;
        let mut storage = BTreeMap::new();
        for kind in kinds {
            storage.insert(*kind, driver.read_storage(*kind).await?);
        }
        let snapshot = Self::new(cookies, storage);
        debug!(
            "Captured {} cookie(s), {} storage entr(ies)",
            snapshot.cookies.len(),
            snapshot.storage.values().map(BTreeMap::len).sum::<usize>()
        );
        Ok(snapshot)
    }

    pub fn cookies(&self) -> &BTreeSet<(String, String)> {
        &self.cookies
    }

    pub fn storage(&self, kind: StorageKind) -> Option<&BTreeMap<String, String>> {
        self.storage.get(&kind)
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Every artifact name with its kind, cookies first
    pub fn names(&self) -> impl Iterator<Item = (ArtifactKind, &str)> {
        let cookies = self
            .cookies
            .iter()
            .map(|(name, _)| (ArtifactKind::Cookie, name.as_str()));
        let storage = self.storage.iter().flat_map(|(kind, entries)| {
            entries
                .keys()
                .map(move |key| (ArtifactKind::Storage(*kind), key.as_str()))
        });
        cookies.chain(storage)
    }

    /// Whether an artifact with this kind and name exists
    pub fn contains(&self, kind: ArtifactKind, name: &str) -> bool {
        match kind {
            ArtifactKind::Cookie => self.cookies.iter().any(|(n, _)| n == name),
            ArtifactKind::Storage(s) => self
                .storage
                .get(&s)
                .map(|entries| entries.contains_key(name))
                .unwrap_or(false),
        }
    }

    /// Artifacts present here but absent from `before`
    pub fn introduced_since(&self, before: &ArtifactSnapshot) -> Vec<(ArtifactKind, String)> {
        self.names()
            .filter(|(kind, name)| !before.contains(*kind, name))
            .map(|(kind, name)| (kind, name.to_string()))
            .collect()
    }
}

/// Case-insensitive naming rule marking an artifact as authorization-bearing
#[derive(Debug, Clone)]
pub struct SensitivePattern {
    source: String,
    regex: Regex,
}

impl SensitivePattern {
    pub fn new(pattern: &str) -> ProbeResult<Self> {
        let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        if regex.is_match("") {
            return Err(ProbeError::InvalidPattern(format!(
                "sensitive pattern '{}' matches every name",
                pattern
            )));
        }
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn compile_all<S: AsRef<str>>(patterns: &[S]) -> ProbeResult<Vec<Self>> {
        patterns.iter().map(|p| Self::new(p.as_ref())).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

/// One artifact whose name matched a sensitive pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakFinding {
    pub kind: ArtifactKind,
    pub name: String,
    pub pattern: String,
}

impl fmt::Display for LeakFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' (matches /{}/i)", self.kind, self.name, self.pattern)
    }
}

/// Classify every artifact in `snapshot`; one finding per matching artifact
pub fn scan(snapshot: &ArtifactSnapshot, patterns: &[SensitivePattern]) -> Vec<LeakFinding> {
    snapshot
        .names()
        .filter_map(|(kind, name)| {
            patterns.iter().find(|p| p.is_match(name)).map(|p| LeakFinding {
                kind,
                name: name.to_string(),
                pattern: p.as_str().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> Vec<SensitivePattern> {
        SensitivePattern::compile_all(&["session", "auth", "token"]).unwrap()
    }

    fn snapshot(cookies: &[&str], local: &[&str]) -> ArtifactSnapshot {
        let mut storage = BTreeMap::new();
        storage.insert(
            StorageKind::Local,
            local.iter().map(|k| (k.to_string(), "v".to_string())).collect(),
        );
        ArtifactSnapshot::new(
            cookies.iter().map(|c| (c.to_string(), "secret".to_string())),
            storage,
        )
    }

    #[test]
    fn test_benign_artifacts_pass() {
        let snap = snapshot(&["_ga", "theme"], &["cart-contents", "backtrace"]);
        assert!(scan(&snap, &patterns()).is_empty());
    }

    #[test]
    fn test_matches_are_case_insensitive() {
        let snap = snapshot(&["SESSION-username"], &["Auth_Token"]);
        let findings = scan(&snap, &patterns());
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].kind, ArtifactKind::Cookie);
        assert_eq!(findings[0].name, "SESSION-username");
        assert_eq!(findings[0].pattern, "session");
        assert_eq!(findings[1].kind, ArtifactKind::Storage(StorageKind::Local));
        assert_eq!(findings[1].pattern, "auth");
    }

    #[test]
    fn test_scan_does_not_expose_values() {
        let snap = snapshot(&["token"], &[]);
        let rendered = scan(&snap, &patterns())[0].to_string();
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_introduced_since() {
        let before = snapshot(&["_ga"], &[]);
        let after = snapshot(&["_ga", "session-username"], &["auth"]);
        let added = after.introduced_since(&before);
        assert_eq!(
            added,
            vec![
                (ArtifactKind::Cookie, "session-username".to_string()),
                (ArtifactKind::Storage(StorageKind::Local), "auth".to_string()),
            ]
        );
    }

    #[test]
    fn test_catch_all_pattern_rejected() {
        assert!(matches!(SensitivePattern::new("x*"), Err(ProbeError::InvalidPattern(_))));
    }
}
