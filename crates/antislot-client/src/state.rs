//! Last verified ruleset held by a device.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use antislot_core::matcher::snapshot_rules;
use antislot_core::ruleset::{default_patterns, Pattern};
use antislot_storage::{atomic_write, StorageError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Signature-verified rules plus the local allow-list.
///
/// Versions are `None` until the first successful sync; until then the
/// built-in default patterns apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedState {
    pub blocklist_version: Option<u64>,
    pub blocklist_updated_at: Option<i64>,
    pub domains: Vec<String>,
    pub patterns_version: Option<u64>,
    pub patterns_updated_at: Option<i64>,
    pub patterns: Vec<Pattern>,
    #[serde(default)]
    pub allow_list: Vec<String>,
    /// Time of the last accepted sync (epoch ms).
    pub last_sync: Option<i64>,
}

impl Default for VerifiedState {
    fn default() -> Self {
        Self {
            blocklist_version: None,
            blocklist_updated_at: None,
            domains: Vec::new(),
            patterns_version: None,
            patterns_updated_at: None,
            patterns: default_patterns(),
            allow_list: Vec::new(),
            last_sync: None,
        }
    }
}

impl VerifiedState {
    /// Reads persisted state; an absent file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read(path) {
            Ok(bytes) => {
                let state = serde_json::from_slice(&bytes).map_err(|e| {
                    StorageError::Validation(format!(
                        "client state {} is malformed: {e}",
                        path.display()
                    ))
                })?;
                debug!(path = %path.display(), "Loaded verified state");
                Ok(state)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(StorageError::Io(e).into()),
        }
    }

    /// Atomically writes the state to `path`.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(StorageError::Json)?;
        atomic_write(path, &json)?;
        Ok(())
    }

    /// Flat rule list for the matcher.
    pub fn rules(&self) -> Vec<Pattern> {
        snapshot_rules(&self.domains, &self.patterns)
    }
}

/// Trims, lowercases and dedupes domains, keeping first-seen order.
pub fn normalize_domains(domains: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    domains
        .iter()
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty() && seen.insert(d.clone()))
        .collect()
}

/// Trims pattern text, clamps weights to `[0, 1]` and drops empty patterns.
pub fn normalize_patterns(patterns: &[Pattern]) -> Vec<Pattern> {
    patterns
        .iter()
        .map(|p| Pattern::new(p.pattern.as_str(), p.kind, p.weight))
        .filter(|p| !p.pattern.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use antislot_core::ruleset::PatternKind;
    use tempfile::TempDir;

    #[test]
    fn absent_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let state = VerifiedState::load(&dir.path().join("state.json")).unwrap();
        assert_eq!(state, VerifiedState::default());
        assert!(state.blocklist_version.is_none());
        assert_eq!(state.patterns.len(), 7);
    }

    #[test]
    fn persist_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let state = VerifiedState {
            blocklist_version: Some(4),
            domains: vec!["bet365.com".into()],
            allow_list: vec!["example.com".into()],
            ..Default::default()
        };
        state.persist(&path).unwrap();
        assert_eq!(VerifiedState::load(&path).unwrap(), state);
    }

    #[test]
    fn corrupt_state_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"[1,2").unwrap();
        assert!(VerifiedState::load(&path).is_err());
    }

    #[test]
    fn domain_normalization() {
        let input = vec![
            " Bet365.com ".to_string(),
            "bet365.com".to_string(),
            "".to_string(),
            "CASINO.net".to_string(),
        ];
        assert_eq!(normalize_domains(&input), vec!["bet365.com", "casino.net"]);
    }

    #[test]
    fn pattern_normalization() {
        let input = vec![
            Pattern {
                pattern: "  casino ".into(),
                kind: PatternKind::Contains,
                weight: 1.7,
            },
            Pattern {
                pattern: "   ".into(),
                kind: PatternKind::Regex,
                weight: 0.5,
            },
        ];
        let out = normalize_patterns(&input);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pattern, "casino");
        assert_eq!(out[0].weight, 1.0);
    }
}
