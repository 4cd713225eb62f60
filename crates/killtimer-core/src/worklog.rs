//! Work log records: one comma-separated line per finished run.
//!
//! Field order: start timestamp (ISO-8601), minimal effort, work, overtime,
//! total worked (all `H:MM:SS`), command. Fields containing a comma or a
//! double quote are wrapped in double quotes with inner quotes doubled.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::Serialize;
use tracing::debug;

use crate::config::RuntimeConfiguration;
use crate::duration::{format_timedelta, parse_duration};
use crate::error::{CoreError, MalformedRecordError, Result};
use crate::supervisor::RunSummary;

const FIELD_COUNT: usize = 6;
const DELIMITER: char = ',';
const QUOTE: char = '"';

/// One historical run. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkLogRecord {
    pub start_time: DateTime<Local>,
    pub minimal_effort_duration: Duration,
    pub work_duration: Duration,
    pub overtime_duration: Duration,
    pub total_work_duration: Duration,
    pub command: String,
}

impl WorkLogRecord {
    /// Record of a finished run. Total worked time is whole seconds of wall
    /// time from task start to the end of supervision.
    pub fn from_run(config: &RuntimeConfiguration, summary: &RunSummary) -> Self {
        Self {
            start_time: summary.start_time,
            minimal_effort_duration: config.minimal_effort_duration,
            work_duration: config.work_duration,
            overtime_duration: config.overtime_duration,
            total_work_duration: Duration::from_secs(summary.total_duration().as_secs()),
            command: config.command_to_run.join(" "),
        }
    }

    /// Build a record from already-split fields.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedRecordError`] unless there are exactly six fields and
    /// every one of them parses.
    pub fn parse_record<S: AsRef<str>>(fields: &[S]) -> Result<Self, MalformedRecordError> {
        if fields.len() != FIELD_COUNT {
            return Err(MalformedRecordError::new(format!(
                "expected {FIELD_COUNT} fields, found {}",
                fields.len()
            )));
        }
        let field = |i: usize| fields[i].as_ref().trim();
        let span = |i: usize, name: &str| {
            parse_duration(field(i))
                .map_err(|e| MalformedRecordError::new(format!("{name}: {e}")))
        };

        Ok(Self {
            start_time: parse_timestamp(field(0))?,
            minimal_effort_duration: span(1, "minimal effort duration")?,
            work_duration: span(2, "work duration")?,
            overtime_duration: span(3, "overtime duration")?,
            total_work_duration: span(4, "total work duration")?,
            command: fields[5].as_ref().to_string(),
        })
    }

    /// Parse a single log line.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedRecordError`] if the line has unbalanced quotes or
    /// does not form a valid record.
    pub fn from_line(line: &str) -> Result<Self, MalformedRecordError> {
        Self::parse_record(&split_fields(line)?)
    }

    /// Render as a log line, without the trailing newline. Line breaks in
    /// the command are written as spaces.
    pub fn to_line(&self) -> String {
        let fields = [
            self.start_time.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            format_timedelta(self.minimal_effort_duration),
            format_timedelta(self.work_duration),
            format_timedelta(self.overtime_duration),
            format_timedelta(self.total_work_duration),
            // One record per physical line.
            self.command.replace(['\r', '\n'], " "),
        ];
        fields
            .iter()
            .map(|f| quote_field(f))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Accepts RFC 3339 (`2024-05-01T09:30:00+02:00`) and naive local forms
/// (`2024-05-01T09:30:00.123456`, `2024-05-01 09:30:00`, `2024-05-01T09:30`).
fn parse_timestamp(text: &str) -> Result<DateTime<Local>, MalformedRecordError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Local));
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .ok_or_else(|| MalformedRecordError::new(format!("start time: cannot parse '{text}'")))
}

/// Split a line on commas, honouring double-quoted fields.
///
/// # Errors
///
/// Returns [`MalformedRecordError`] for an unterminated quote or stray text
/// after a closing quote.
pub fn split_fields(line: &str) -> Result<Vec<String>, MalformedRecordError> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;
    let mut field_was_quoted = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                QUOTE if chars.peek() == Some(&QUOTE) => {
                    chars.next();
                    current.push(QUOTE);
                }
                QUOTE => in_quotes = false,
                _ => current.push(c),
            }
            continue;
        }
        match c {
            DELIMITER => {
                fields.push(std::mem::take(&mut current));
                field_was_quoted = false;
            }
            QUOTE if current.is_empty() && !field_was_quoted => {
                in_quotes = true;
                field_was_quoted = true;
            }
            _ if field_was_quoted => {
                return Err(MalformedRecordError::new(
                    "unexpected text after closing quote",
                ))
            }
            _ => current.push(c),
        }
    }
    if in_quotes {
        return Err(MalformedRecordError::new("unterminated quoted field"));
    }
    fields.push(current);
    Ok(fields)
}

fn quote_field(field: &str) -> String {
    if field.contains([DELIMITER, QUOTE, '\n', '\r']) {
        format!("\"{}\"", field.replace(QUOTE, "\"\""))
    } else {
        field.to_string()
    }
}

/// Read every record from `reader`. Blank lines are skipped; the first bad
/// line aborts the whole load.
///
/// # Errors
///
/// Returns [`CoreError::MalformedRecord`] carrying the 1-based line number, or
/// [`CoreError::Io`] if reading fails.
pub fn load_records<R: BufRead>(reader: R) -> Result<Vec<WorkLogRecord>> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let record = WorkLogRecord::from_line(line).map_err(|e| e.at_line(index + 1))?;
        records.push(record);
    }
    debug!(count = records.len(), "work log loaded");
    Ok(records)
}

/// Load a log file from disk.
///
/// # Errors
///
/// Returns an IO error if the file cannot be opened, or the first malformed
/// record.
pub fn load_log(path: &Path) -> Result<Vec<WorkLogRecord>> {
    let file = std::fs::File::open(path).map_err(|e| {
        CoreError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ))
    })?;
    load_records(BufReader::new(file))
}

/// Append one record to the log, creating the file if needed.
///
/// # Errors
///
/// Returns an IO error if the file cannot be opened or written.
pub fn append_record(path: &Path, record: &WorkLogRecord) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", record.to_line())?;
    debug!(path = %path.display(), "work log record appended");
    Ok(())
}
