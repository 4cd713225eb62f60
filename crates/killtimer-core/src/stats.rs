//! Aggregation of work log records per command.

use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::duration::format_timedelta;
use crate::worklog::WorkLogRecord;

/// What the stats tool was asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsConfig {
    pub log_file_path: PathBuf,
    /// Report total worked duration grouped by command.
    pub total_duration_worked: bool,
    pub json: bool,
}

/// Totals for one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSummary {
    pub command: String,
    pub count: usize,
    #[serde(serialize_with = "as_timedelta")]
    pub total_work_duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsReport {
    pub records_loaded: usize,
    /// Present only when totals were requested, in first-seen command order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_command: Option<Vec<CommandSummary>>,
}

fn as_timedelta<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_timedelta(*d))
}

/// Group records by exact command string, keeping first-seen order.
pub fn group_by_command(records: &[WorkLogRecord]) -> IndexMap<&str, Vec<&WorkLogRecord>> {
    let mut groups: IndexMap<&str, Vec<&WorkLogRecord>> = IndexMap::new();
    for record in records {
        groups.entry(record.command.as_str()).or_default().push(record);
    }
    groups
}

/// Count and sum `total_work_duration` per command.
pub fn total_duration_by_command(records: &[WorkLogRecord]) -> Vec<CommandSummary> {
    group_by_command(records)
        .into_iter()
        .map(|(command, group)| CommandSummary {
            command: command.to_string(),
            count: group.len(),
            total_work_duration: group
                .iter()
                .map(|r| r.total_work_duration)
                .fold(Duration::ZERO, Duration::saturating_add),
        })
        .collect()
}

/// Build the report the configuration asks for.
pub fn summarize(records: &[WorkLogRecord], config: &StatsConfig) -> StatsReport {
    StatsReport {
        records_loaded: records.len(),
        by_command: config
            .total_duration_worked
            .then(|| total_duration_by_command(records)),
    }
}

impl StatsReport {
    /// Plain text rendering: record count, then a tab-separated table.
    pub fn to_text(&self) -> String {
        let mut out = format!("{} records loaded\n", self.records_loaded);
        if let Some(rows) = &self.by_command {
            out.push_str("Program\tEntry count\tTotal worked duration\n");
            for row in rows {
                out.push_str(&format!(
                    "{}\t{}\t{}\n",
                    row.command,
                    row.count,
                    format_timedelta(row.total_work_duration)
                ));
            }
        }
        out
    }
}
