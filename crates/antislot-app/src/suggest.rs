//! Batch suggestion pipeline: score observed domains, export a report,
//! and promote reviewed suggestions into the blocklist.

use std::fs;
use std::path::{Path, PathBuf};

use antislot_core::domain::is_plausible_domain;
use antislot_core::ruleset::now_millis;
use antislot_core::suggestor::{DomainSuggestor, Suggestion, SuggestorConfig};
use antislot_storage::{atomic_write, RuleStore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AppError, Result};

/// Report file names, written next to the input file.
pub const JSON_REPORT: &str = "suggestions_output.json";
pub const CSV_REPORT: &str = "suggestions_output.csv";

/// Default confidence required by [`integrate`].
pub const DEFAULT_INTEGRATE_CONFIDENCE: u8 = 80;

/// Totals for one suggestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionSummary {
    pub total_analyzed: usize,
    pub suggested: usize,
    /// Lowest confidence among the suggestions, 0 when there are none.
    pub min_confidence: u8,
    pub average_confidence: u8,
}

/// Contents of `suggestions_output.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionReport {
    pub suggestions: Vec<Suggestion>,
    #[serde(default)]
    pub summary: SuggestionSummary,
    #[serde(default)]
    pub timestamp: i64,
}

impl SuggestionReport {
    /// Builds a report and its summary.
    pub fn new(total_analyzed: usize, suggestions: Vec<Suggestion>, timestamp: i64) -> Self {
        let confidences: Vec<u32> = suggestions.iter().map(|s| u32::from(s.confidence)).collect();
        let min_confidence = confidences.iter().copied().min().unwrap_or(0) as u8;
        let average_confidence = if confidences.is_empty() {
            0
        } else {
            let sum: u32 = confidences.iter().sum();
            (f64::from(sum) / confidences.len() as f64).round() as u8
        };

        Self {
            summary: SuggestionSummary {
                total_analyzed,
                suggested: suggestions.len(),
                min_confidence,
                average_confidence,
            },
            suggestions,
            timestamp,
        }
    }

    /// Reads a report written by [`run_suggest`].
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Reads observed domains, one per line.
///
/// Blank lines and `#` comments are skipped, as is anything that does not
/// look like a domain.
pub fn read_observed_domains(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    let mut domains = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if is_plausible_domain(line) {
            domains.push(line.to_lowercase());
        } else {
            warn!(line, "Skipping invalid domain");
        }
    }
    Ok(domains)
}

/// Paths of the files produced by [`run_suggest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFiles {
    pub json: PathBuf,
    pub csv: PathBuf,
}

impl ReportFiles {
    /// Report locations for an input file.
    pub fn beside(input: &Path) -> Self {
        let dir = input.parent().unwrap_or_else(|| Path::new("."));
        Self {
            json: dir.join(JSON_REPORT),
            csv: dir.join(CSV_REPORT),
        }
    }
}

/// Scores every observed domain in `input` against the current rulesets and
/// writes the JSON and CSV reports next to it.
pub fn run_suggest(
    store: &RuleStore,
    input: &Path,
    config: SuggestorConfig,
) -> Result<(SuggestionReport, ReportFiles)> {
    let observed = read_observed_domains(input)?;
    if observed.is_empty() {
        return Err(AppError::NoDomains(input.to_path_buf()));
    }

    let rules = store.blocklist.load()?;
    let patterns = store.patterns.load()?;
    let suggestor = DomainSuggestor::from_rulesets(config, &rules, &patterns);

    info!("Analyzing {} observed domains", observed.len());
    let suggestions = suggestor.suggest(&observed);
    let report = SuggestionReport::new(observed.len(), suggestions, now_millis());

    let files = ReportFiles::beside(input);
    write_json(&report, &files.json)?;
    write_csv(&report.suggestions, &files.csv)?;
    info!(
        suggested = report.summary.suggested,
        json = %files.json.display(),
        csv = %files.csv.display(),
        "Suggestion reports written"
    );

    Ok((report, files))
}

fn write_json(report: &SuggestionReport, path: &Path) -> Result<()> {
    let json = serde_json::to_vec_pretty(report)?;
    atomic_write(path, &json)?;
    Ok(())
}

/// Writes suggestions as `domain,confidence,reasons,patterns`, joining list
/// fields with `"; "`.
pub fn write_csv(suggestions: &[Suggestion], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["domain", "confidence", "reasons", "patterns"])?;

    for s in suggestions {
        writer.write_record([
            s.domain.clone(),
            s.confidence.to_string(),
            s.reasons.join("; "),
            s.matched_patterns.join("; "),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Outcome of promoting suggestions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrationSummary {
    /// Domains newly added to the blocklist.
    pub added: Vec<String>,
    /// Domains already present whose entry was refreshed.
    pub updated: Vec<String>,
    /// Domains that failed, with the error message.
    pub failed: Vec<(String, String)>,
    /// Suggestions below the threshold.
    pub below_threshold: usize,
}

/// Blocklist reason recorded for a promoted suggestion.
pub fn integration_reason(suggestion: &Suggestion) -> String {
    format!(
        "Auto suggestion: {} (confidence: {}%)",
        suggestion.reasons.join("; "),
        suggestion.confidence
    )
}

/// Adds every suggestion with confidence at or above `min_confidence` to the
/// blocklist. A failing domain is recorded and the rest still proceed.
pub fn integrate(
    store: &RuleStore,
    suggestions: &[Suggestion],
    min_confidence: u8,
) -> IntegrationSummary {
    let mut summary = IntegrationSummary::default();

    for suggestion in suggestions {
        if suggestion.confidence < min_confidence {
            summary.below_threshold += 1;
            continue;
        }

        let reason = integration_reason(suggestion);
        match store.blocklist.add_domain(&suggestion.domain, &reason, None) {
            Ok(true) => summary.added.push(suggestion.domain.clone()),
            Ok(false) => summary.updated.push(suggestion.domain.clone()),
            Err(e) => {
                warn!(domain = %suggestion.domain, "Failed to integrate suggestion: {e}");
                summary.failed.push((suggestion.domain.clone(), e.to_string()));
            }
        }
    }

    info!(
        added = summary.added.len(),
        updated = summary.updated.len(),
        failed = summary.failed.len(),
        "Integrated suggestions"
    );
    summary
}
