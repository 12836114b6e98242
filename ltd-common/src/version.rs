//! Dotted application version numbers.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Numeric dotted version (`1.2.10`). Missing trailing parts count as zero.
#[derive(Debug, Clone)]
pub struct AppVersion {
    parts: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid version number: {0:?}")]
pub struct ParseVersionError(pub String);

impl AppVersion {
    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    fn significant(&self) -> &[u64] {
        let end = self
            .parts
            .iter()
            .rposition(|part| *part != 0)
            .map_or(0, |i| i + 1);
        &self.parts[..end]
    }
}

impl FromStr for AppVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(ParseVersionError(s.to_string()));
        }
        let parts = trimmed
            .split('.')
            .map(|part| part.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ParseVersionError(s.to_string()))?;
        Ok(Self { parts })
    }
}

impl PartialEq for AppVersion {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl Eq for AppVersion {}

impl Ord for AppVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        (0..len)
            .map(|i| {
                let a = self.parts.get(i).copied().unwrap_or(0);
                let b = other.parts.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for AppVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .parts
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&rendered)
    }
}

/// Same version tag. Unparseable tags only match when the strings are identical.
pub fn same_version(a: &str, b: &str) -> bool {
    match (a.parse::<AppVersion>(), b.parse::<AppVersion>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Next revision after `base`: `major.minor.(revision + 1)`.
///
/// A missing minor becomes `0` and a missing revision makes the result
/// `.1`, so `"2"` gives `"2.0.1"`. Parts past the revision are dropped.
/// Returns `None` when the revision is not a number.
pub fn next_version(base: &str) -> Option<String> {
    let mut parts = base.trim().split('.');
    let major = parts.next().filter(|major| !major.is_empty())?;
    let minor = parts.next().unwrap_or("0");
    let revision = match parts.next() {
        Some(revision) => revision.parse::<u64>().ok()?.checked_add(1)?,
        None => 1,
    };
    Some(format!("{major}.{minor}.{revision}"))
}
