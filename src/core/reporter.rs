use crate::core::parser::INPUT_COLUMNS;
use crate::domain::model::{
    EntityKind, ImportRun, Outcome, OutcomeStatus, RunStatus, SourceRecord,
};
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

pub const OUTCOMES_FILE: &str = "outcomes.csv";
pub const FAILURES_FILE: &str = "failures.csv";
pub const SUMMARY_FILE: &str = "summary.json";

/// Final counts of a finalized run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
    pub not_attempted: usize,
    pub total: usize,
    pub dry_run: bool,
    pub status: RunStatus,
    pub halt: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={}, skipped={}, failed={}, total={}",
            self.created, self.skipped, self.failed, self.total
        )?;
        if self.not_attempted > 0 {
            write!(f, ", not_attempted={}", self.not_attempted)?;
        }
        Ok(())
    }
}

pub fn summarize(run: &ImportRun) -> RunSummary {
    RunSummary {
        created: run.created(),
        skipped: run.skipped(),
        failed: run.failed(),
        not_attempted: run.not_attempted(),
        total: run.total(),
        dry_run: run.dry_run(),
        status: run.status(),
        halt: run.halted().map(ToString::to_string),
        started_at: run.started_at(),
        finished_at: run.finished_at(),
    }
}

/// The input-schema record to retry a failed row with.
///
/// When the row's parent was created in this run the parent reference is
/// replaced by its remote id, so the retry file does not depend on rows
/// that are no longer in it.
pub fn retry_record(outcome: &Outcome) -> SourceRecord {
    let mut record = outcome.source.clone();
    if let Some(parent_id) = &outcome.parent_remote_id {
        match outcome.kind {
            Some(EntityKind::Subdomain) => record.parent_domain_id = parent_id.clone(),
            Some(EntityKind::BusinessUnit) => record.client_id = parent_id.clone(),
            _ => {}
        }
    }
    record
}

/// Failed rows, in processing order, as re-importable records.
pub fn failure_records(run: &ImportRun) -> Vec<SourceRecord> {
    run.outcomes()
        .iter()
        .filter(|outcome| outcome.status == OutcomeStatus::Failed)
        .map(retry_record)
        .collect()
}

fn source_fields(record: &SourceRecord) -> [&str; 5] {
    [
        record.entity_type.as_str(),
        record.name.as_str(),
        record.timezone.as_str(),
        record.parent_domain_id.as_str(),
        record.client_id.as_str(),
    ]
}

/// `failures.csv`: the input schema only, ready to be fed back in.
pub fn failures_csv(run: &ImportRun, delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    writer.write_record(INPUT_COLUMNS)?;
    for record in failure_records(run) {
        writer.write_record(source_fields(&record))?;
    }
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()).into())
}

/// `outcomes.csv`: one line per row, input columns first so that any
/// filtered subset of it is itself a valid input file.
pub fn outcomes_csv(run: &ImportRun, delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    let mut header: Vec<&str> = INPUT_COLUMNS.to_vec();
    header.extend([
        "source_line",
        "status",
        "error_code",
        "http_status",
        "error_message",
        "remote_id",
        "attempts",
    ]);
    writer.write_record(&header)?;

    for outcome in run.outcomes() {
        let record = if outcome.status == OutcomeStatus::Failed {
            retry_record(outcome)
        } else {
            outcome.source.clone()
        };
        let source_line = outcome.source_line.to_string();
        let http_status = outcome.http_status.map(|s| s.to_string()).unwrap_or_default();
        let attempts = outcome.attempts.to_string();

        let mut fields: Vec<&str> = source_fields(&record).to_vec();
        fields.extend([
            source_line.as_str(),
            outcome.status.as_str(),
            outcome.error_code().unwrap_or(""),
            http_status.as_str(),
            outcome.error_message.as_deref().unwrap_or(""),
            outcome.remote_id.as_deref().unwrap_or(""),
            attempts.as_str(),
        ]);
        writer.write_record(&fields)?;
    }
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()).into())
}

/// One structured log line per processed row.
pub fn log_outcome(outcome: &Outcome) {
    let kind = outcome.kind.map(|k| k.as_str()).unwrap_or("unknown");
    match outcome.status {
        OutcomeStatus::Created | OutcomeStatus::Skipped => tracing::info!(
            source_line = outcome.source_line,
            kind,
            name = %outcome.name,
            status = %outcome.status,
            remote_id = outcome.remote_id.as_deref().unwrap_or(""),
            "✅ row {}",
            outcome.status
        ),
        OutcomeStatus::Failed => tracing::warn!(
            source_line = outcome.source_line,
            kind,
            name = %outcome.name,
            status = %outcome.status,
            error_code = outcome.error_code().unwrap_or(""),
            http_status = outcome.http_status,
            "❌ row failed: {}",
            outcome.error_message.as_deref().unwrap_or("")
        ),
        OutcomeStatus::NotAttempted => tracing::info!(
            source_line = outcome.source_line,
            kind,
            name = %outcome.name,
            status = %outcome.status,
            "⏭️ row not attempted"
        ),
    }
}

pub fn log_summary(summary: &RunSummary) {
    tracing::info!("🔥 Final Statistics{}:", if summary.dry_run { " (dry run)" } else { "" });
    tracing::info!("✅ Created: {}", summary.created);
    tracing::info!("⏭️ Skipped: {}", summary.skipped);
    tracing::info!("❌ Failed: {}", summary.failed);
    if summary.not_attempted > 0 {
        tracing::info!("🛑 Not attempted: {}", summary.not_attempted);
    }
    if let Some(halt) = &summary.halt {
        tracing::error!("💥 Run halted: {}", halt);
    }
}

/// Paths of the report files written for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFiles {
    pub outcomes: String,
    /// Header only when no row failed.
    pub failures: String,
    pub summary: String,
}

/// Writes the report files of a finalized run through a `Storage`.
pub struct OutcomeReporter<S: Storage> {
    storage: S,
    delimiter: u8,
}

impl<S: Storage> OutcomeReporter<S> {
    pub fn new(storage: S, delimiter: u8) -> Self {
        Self { storage, delimiter }
    }

    pub async fn write_reports(&self, run: &ImportRun, summary: &RunSummary) -> Result<ReportFiles> {
        let outcomes = outcomes_csv(run, self.delimiter)?;
        tracing::debug!("Writing {} ({} bytes)", OUTCOMES_FILE, outcomes.len());
        self.storage.write_file(OUTCOMES_FILE, &outcomes).await?;

        // 每次都寫入，避免留下前一次執行的 failures.csv
        let failures = failures_csv(run, self.delimiter)?;
        self.storage.write_file(FAILURES_FILE, &failures).await?;
        if run.failed() > 0 {
            tracing::info!("📝 {} failed rows written to {}", run.failed(), FAILURES_FILE);
        }

        let json = serde_json::to_string_pretty(summary)?;
        self.storage.write_file(SUMMARY_FILE, json.as_bytes()).await?;

        Ok(ReportFiles {
            outcomes: OUTCOMES_FILE.to_string(),
            failures: FAILURES_FILE.to_string(),
            summary: SUMMARY_FILE.to_string(),
        })
    }
}
