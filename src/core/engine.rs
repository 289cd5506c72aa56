use crate::core::orchestrator::{ImportOrchestrator, RetryPolicy};
use crate::core::parser;
use crate::core::reporter::{self, OutcomeReporter, ReportFiles, RunSummary};
use crate::domain::model::ImportRun;
use crate::domain::ports::{Gateway, ProgressSink, Storage};
use crate::utils::error::Result;
use std::io::Read;

#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    pub dry_run: bool,
    pub delimiter: u8,
    pub retry: RetryPolicy,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            delimiter: b',',
            retry: RetryPolicy::default(),
        }
    }
}

/// Everything a caller needs after a run: the finalized run itself, its
/// summary and where the report files went.
///
/// `files` is an error when the reports could not be written; the run and
/// its outcomes are still returned, since remote state has already changed.
#[derive(Debug)]
pub struct ImportReport {
    pub run: ImportRun,
    pub summary: RunSummary,
    pub files: Result<ReportFiles>,
}

impl ImportReport {
    /// The run status decides first; a clean run whose reports could not be
    /// written exits with the write error's code.
    pub fn exit_code(&self) -> i32 {
        match (self.run.status().exit_code(), &self.files) {
            (0, Err(e)) => e.severity().exit_code(),
            (code, _) => code,
        }
    }
}

/// parse → resolve → execute → report
pub struct ImportEngine<G: Gateway, S: Storage> {
    orchestrator: ImportOrchestrator<G>,
    reporter: OutcomeReporter<S>,
    delimiter: u8,
}

impl<G: Gateway, S: Storage> ImportEngine<G, S> {
    pub fn new(gateway: G, storage: S, options: ImportOptions) -> Self {
        Self {
            orchestrator: ImportOrchestrator::new(gateway, options.retry, options.dry_run),
            reporter: OutcomeReporter::new(storage, options.delimiter),
            delimiter: options.delimiter,
        }
    }

    pub async fn run<R: Read>(&self, input: R, progress: &mut dyn ProgressSink) -> Result<ImportReport> {
        tracing::info!("🚀 Starting import{}", if self.orchestrator.dry_run() { " (dry run)" } else { "" });

        let parsed = parser::read_rows(input, self.delimiter)?;
        tracing::info!(
            "📥 Read {} rows ({} valid)",
            parsed.total(),
            parsed.valid().count()
        );

        let run = self.orchestrator.execute(parsed, progress).await;
        let summary = reporter::summarize(&run);
        reporter::log_summary(&summary);

        let files = self.reporter.write_reports(&run, &summary).await;
        if let Err(e) = &files {
            tracing::error!("❌ Could not write report files: {}", e);
        }

        Ok(ImportReport {
            run,
            summary,
            files,
        })
    }
}
