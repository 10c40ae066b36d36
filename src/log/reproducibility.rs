/// Processing log for reproducibility
///
/// Each operation applied between reading a file and reporting candidates
/// is appended in order, with the parameters that drove it and the time
/// elapsed since the session began. The log is embedded in every
/// `AnalysisResult` and exports as text or JSON.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// 1-based position in the log
    pub step: usize,
    pub timestamp: DateTime<Local>,
    /// Milliseconds since the session started
    pub elapsed_ms: i64,
    pub operation: String,
    pub description: String,
    pub parameters: BTreeMap<String, String>,
}

impl LogEntry {
    fn parameter_text(&self) -> String {
        if self.parameters.is_empty() {
            return "-".to_string();
        }
        self.parameters
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn to_text(&self) -> String {
        format!(
            "{:>2}. {:<20} +{}ms  {}\n    {}",
            self.step,
            self.operation,
            self.elapsed_ms,
            self.description,
            self.parameter_text()
        )
    }
}

/// Split `"a=1 b=2"` into a map. Bare words become keys with empty values.
fn parse_parameters(parameters: &str) -> BTreeMap<String, String> {
    parameters
        .split_whitespace()
        .map(|token| match token.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (token.to_string(), String::new()),
        })
        .collect()
}

/// Ordered record of what was done to one spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingLog {
    pub session_id: String,
    pub started_at: DateTime<Local>,
    pub source: String,
    pub crate_version: String,
    pub entries: Vec<LogEntry>,
}

impl ProcessingLog {
    pub fn new() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            started_at: Local::now(),
            source: String::new(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            entries: Vec::new(),
        }
    }

    pub fn set_source(&mut self, source: &str) {
        self.source = source.to_string();
    }

    /// Append one operation. `parameters` is a space-separated list of
    /// `key=value` pairs.
    pub fn add_entry(&mut self, operation: &str, description: &str, parameters: &str) {
        let now = Local::now();
        let step = self.entries.len() + 1;
        self.entries.push(LogEntry {
            step,
            timestamp: now,
            elapsed_ms: (now - self.started_at).num_milliseconds(),
            operation: operation.to_string(),
            description: description.to_string(),
            parameters: parse_parameters(parameters),
        });
        log::debug!("step {} {}: {}", step, operation, description);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Operation names in order.
    pub fn operations(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.operation.as_str()).collect()
    }

    /// Value of `key` on the most recent entry named `operation`.
    pub fn parameter(&self, operation: &str, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.operation == operation)
            .and_then(|e| e.parameters.get(key))
            .map(String::as_str)
    }

    pub fn to_text(&self) -> String {
        let mut out = format!(
            "# pfas-nmr {} processing log\n# session {}\n# started {}\n# source {}\n\n",
            self.crate_version,
            self.session_id,
            self.started_at.format("%Y-%m-%d %H:%M:%S"),
            if self.source.is_empty() { "-" } else { &self.source },
        );
        for entry in &self.entries {
            out.push_str(&entry.to_text());
            out.push('\n');
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn save_text(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, self.to_text())
    }
}

impl Default for ProcessingLog {
    fn default() -> Self {
        Self::new()
    }
}
