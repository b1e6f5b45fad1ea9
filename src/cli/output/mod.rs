//! CLI output formatting module
//!
//! Each command produces a serializable output value that renders either as
//! human-readable tables or as pretty JSON.

pub mod table;

pub use table::TableFormatter;

use std::fmt::Write as _;

use serde::Serialize;

use crate::domain::models::{BatchReport, RetrievalResult};
use crate::services::{CacheStats, CircuitSnapshot};

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&result.to_json()).unwrap_or_default()
        );
    } else {
        println!("{}", result.to_human());
    }
}

#[derive(Debug, Serialize)]
pub struct RankOutput {
    pub query: String,
    pub matches: RetrievalResult,
}

impl CommandOutput for RankOutput {
    fn to_human(&self) -> String {
        if self.matches.is_empty() {
            return format!("No matches for {:?}", self.query);
        }
        TableFormatter::new().format_matches(&self.matches)
    }
}

/// Flattened [`crate::domain::models::BatchFailure`] for display.
#[derive(Debug, Clone, Serialize)]
pub struct FailureRow {
    pub id: i64,
    pub code: String,
    pub kind: &'static str,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct VectorizeOutput {
    pub updated: usize,
    pub skipped: usize,
    pub failed: Vec<FailureRow>,
}

impl From<&BatchReport> for VectorizeOutput {
    fn from(report: &BatchReport) -> Self {
        Self {
            updated: report.updated,
            skipped: report.skipped,
            failed: report
                .failed
                .iter()
                .map(|f| FailureRow {
                    id: f.id,
                    code: f.code.clone(),
                    kind: f.error.kind(),
                    error: f.error.to_string(),
                })
                .collect(),
        }
    }
}

impl CommandOutput for VectorizeOutput {
    fn to_human(&self) -> String {
        let mut out = format!(
            "Vectorized {} candidate(s), skipped {}, failed {}",
            self.updated,
            self.skipped,
            self.failed.len()
        );
        if !self.failed.is_empty() {
            let _ = write!(out, "\n{}", TableFormatter::new().format_failures(&self.failed));
        }
        out
    }
}

#[derive(Debug, Serialize)]
pub struct ImportOutput {
    pub imported: usize,
    pub codes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vectorized: Option<VectorizeOutput>,
}

impl CommandOutput for ImportOutput {
    fn to_human(&self) -> String {
        let mut out = format!("Imported {} candidate(s)", self.imported);
        if let Some(vectorized) = &self.vectorized {
            let _ = write!(out, "\n{}", vectorized.to_human());
        }
        out
    }
}

#[derive(Debug, Serialize)]
pub struct ExportOutput {
    pub exported: usize,
    pub file: String,
}

impl CommandOutput for ExportOutput {
    fn to_human(&self) -> String {
        format!("Exported {} candidate(s) to {}", self.exported, self.file)
    }
}

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    /// `None` when the store could not be reached.
    pub candidates: Option<usize>,
    pub cache: CacheStats,
    pub circuits: Vec<CircuitSnapshot>,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        let formatter = TableFormatter::new();
        let candidates = self
            .candidates
            .map_or_else(|| "unavailable".to_string(), |n| n.to_string());
        format!(
            "Candidates: {candidates}\n\n{}\n\n{}",
            formatter.format_cache_stats(&self.cache),
            formatter.format_circuits(&self.circuits)
        )
    }
}
