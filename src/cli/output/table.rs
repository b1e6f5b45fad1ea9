//! Table output formatting for CLI commands
//!
//! Renders ranked matches, breaker snapshots and batch failures using
//! comfy-table.

use std::env;

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};

use crate::domain::models::RetrievalResult;
use crate::services::{CacheStats, CircuitSnapshot, CircuitState};

use super::FailureRow;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl TableFormatter {
    /// Create a new table formatter
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    /// Create a new table formatter with custom settings
    pub fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Format ranked matches, best first
    pub fn format_matches(&self, result: &RetrievalResult) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&[
            "#",
            "Emoji",
            "Similarity",
            "Priority",
            "Score",
            "Description",
        ]));

        for (rank, m) in result.iter().enumerate() {
            table.add_row(vec![
                Cell::new(rank + 1),
                Cell::new(&m.candidate.code),
                Cell::new(format!("{:.3}", m.similarity)),
                Cell::new(m.candidate.priority),
                Cell::new(format!("{:.3}", m.final_score)).add_attribute(Attribute::Bold),
                Cell::new(truncate_text(&m.candidate.description, 48)),
            ]);
        }

        table.to_string()
    }

    /// Format breaker snapshots
    pub fn format_circuits(&self, circuits: &[CircuitSnapshot]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&[
            "Dependency",
            "State",
            "Failures",
            "Opened",
            "Rejected",
            "Retry After",
        ]));

        for snapshot in circuits {
            let state_cell = if self.use_colors {
                Cell::new(snapshot.state).fg(state_color(snapshot.state))
            } else {
                Cell::new(format!("{} {}", state_icon(snapshot.state), snapshot.state))
            };

            table.add_row(vec![
                Cell::new(snapshot.dependency),
                state_cell,
                Cell::new(format!(
                    "{}/{}",
                    snapshot.consecutive_failures, snapshot.failure_threshold
                )),
                Cell::new(snapshot.open_count),
                Cell::new(snapshot.total_rejections),
                Cell::new(
                    snapshot
                        .retry_after_ms
                        .map_or_else(|| "-".to_string(), |ms| format!("{ms}ms")),
                ),
            ]);
        }

        table.to_string()
    }

    /// Format cache counters as a two-column table
    pub fn format_cache_stats(&self, stats: &CacheStats) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Cache", "Value"]));
        table.add_row(vec![
            Cell::new("Entries"),
            Cell::new(format!("{}/{}", stats.entries, stats.capacity)),
        ]);
        table.add_row(vec![Cell::new("Hits"), Cell::new(stats.hits)]);
        table.add_row(vec![Cell::new("Misses"), Cell::new(stats.misses)]);
        table.add_row(vec![
            Cell::new("Hit rate"),
            Cell::new(format!("{:.1}%", stats.hit_rate() * 100.0)),
        ]);
        table.add_row(vec![Cell::new("Evictions"), Cell::new(stats.evictions)]);
        table.add_row(vec![Cell::new("Expirations"), Cell::new(stats.expirations)]);
        table.to_string()
    }

    /// Format per-candidate batch failures
    pub fn format_failures(&self, failures: &[FailureRow]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "Emoji", "Kind", "Error"]));

        for failure in failures {
            let kind_cell = if self.use_colors {
                Cell::new(failure.kind).fg(Color::Red)
            } else {
                Cell::new(failure.kind)
            };
            table.add_row(vec![
                Cell::new(failure.id),
                Cell::new(&failure.code),
                kind_cell,
                Cell::new(truncate_text(&failure.error, 60)),
            ]);
        }

        table.to_string()
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();

        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width);
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|t| Cell::new(t).add_attribute(Attribute::Bold))
        .collect()
}

/// Check if terminal supports colors
fn supports_color() -> bool {
    // Respect NO_COLOR environment variable
    if env::var("NO_COLOR").is_ok() {
        return false;
    }

    if let Ok(term) = env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    true
}

fn state_color(state: CircuitState) -> Color {
    match state {
        CircuitState::Closed => Color::Green,
        CircuitState::HalfOpen => Color::Yellow,
        CircuitState::Open => Color::Red,
    }
}

fn state_icon(state: CircuitState) -> &'static str {
    match state {
        CircuitState::Closed => "●",
        CircuitState::HalfOpen => "◐",
        CircuitState::Open => "○",
    }
}

/// Truncate on a char boundary, appending "..." when shortened.
fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
