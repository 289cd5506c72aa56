use crate::core::parser::ParsedInput;
use crate::core::reporter;
use crate::core::resolver::{self, ParentLink};
use crate::domain::model::{
    EntityRequest, FailureKind, ImportRun, Outcome, OutcomeStatus, RunHalt,
};
use crate::domain::ports::{Gateway, GatewayError, ProgressSink};
use std::collections::HashMap;
use std::time::Duration;

/// Bounded retry for transient failures: a fixed number of extra attempts
/// after a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// One automatic retry after `delay`.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            max_retries: 1,
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}

/// Map a gateway error to the row-level failure taxonomy.
pub fn classify(error: &GatewayError) -> FailureKind {
    match error {
        GatewayError::Http { status, .. } => match *status {
            401 | 403 => FailureKind::Auth,
            409 => FailureKind::AlreadyExists,
            500..=599 => FailureKind::ServerError,
            _ => FailureKind::BadRequest,
        },
        GatewayError::Timeout { .. } | GatewayError::Transport { .. } => FailureKind::ServerError,
        GatewayError::InvalidResponse { .. } => FailureKind::UnconfirmedCreate,
    }
}

/// Terminal state of a row, as seen by its dependents.
#[derive(Debug, Clone)]
enum RowState {
    Created(String),
    Skipped,
    Failed,
}

/// Drives validated rows through the gateway in dependency order.
///
/// One call in flight at a time; the run it builds is owned here until it
/// is finalized and handed back.
pub struct ImportOrchestrator<G: Gateway> {
    gateway: G,
    retry: RetryPolicy,
    dry_run: bool,
}

impl<G: Gateway> ImportOrchestrator<G> {
    pub fn new(gateway: G, retry: RetryPolicy, dry_run: bool) -> Self {
        Self {
            gateway,
            retry,
            dry_run,
        }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub async fn execute(&self, input: ParsedInput, progress: &mut dyn ProgressSink) -> ImportRun {
        let mut run = ImportRun::new(input.total(), self.dry_run);
        let (requests, rejected) = input.split();

        for error in &rejected {
            let outcome = Outcome::rejected(error.source_line, error.reason.clone(), error.source.clone());
            Self::complete(&mut run, outcome, progress);
        }

        let plan = match resolver::resolve(requests.clone(), &rejected) {
            Ok(plan) => plan,
            Err(cycle) => {
                // 在任何 API 呼叫之前就中止
                for request in &requests {
                    Self::skip_after_halt(&mut run, request);
                }
                run.halt(RunHalt::CyclicDependency { lines: cycle.lines });
                run.finalize();
                return run;
            }
        };

        tracing::info!(
            "📋 Execution plan: {} rows ({} rejected during validation){}",
            plan.len(),
            rejected.len(),
            if self.dry_run { " [dry run]" } else { "" }
        );

        let mut states: HashMap<usize, RowState> = HashMap::with_capacity(plan.len());

        for step in &plan.steps {
            let request = &step.request;

            if run.halted().is_some() {
                Self::skip_after_halt(&mut run, request);
                continue;
            }

            let outcome = match self.resolve_parent(request, &step.parent, &states) {
                Err(outcome) => outcome,
                Ok(_) if self.dry_run => Outcome::skipped(request),
                Ok(parent) => self.attempt(request, parent).await,
            };

            states.insert(
                request.source_line,
                match (&outcome.status, &outcome.remote_id) {
                    (OutcomeStatus::Created, Some(id)) => RowState::Created(id.clone()),
                    (OutcomeStatus::Skipped, _) => RowState::Skipped,
                    _ => RowState::Failed,
                },
            );

            if matches!(outcome.failure, Some(FailureKind::Auth)) {
                run.halt(RunHalt::Auth {
                    source_line: request.source_line,
                    message: outcome.error_message.clone().unwrap_or_default(),
                });
                tracing::error!(
                    "🛑 Authentication rejected at line {}; remaining rows will not be attempted",
                    request.source_line
                );
            }

            Self::complete(&mut run, outcome, progress);
        }

        run.finalize();
        run
    }

    /// No progress event: the row was never processed.
    fn skip_after_halt(run: &mut ImportRun, request: &EntityRequest) {
        reporter::log_outcome(run.record(Outcome::not_attempted(request)));
    }

    fn complete(run: &mut ImportRun, outcome: Outcome, progress: &mut dyn ProgressSink) {
        reporter::log_outcome(run.record(outcome));
        progress.on_progress(&run.progress());
    }

    /// Decide the parent id to send, or the outcome that ends the row
    /// without a network call.
    fn resolve_parent<'a>(
        &self,
        request: &EntityRequest,
        link: &'a ParentLink,
        states: &'a HashMap<usize, RowState>,
    ) -> Result<Option<&'a str>, Outcome> {
        match link {
            ParentLink::None => Ok(None),
            ParentLink::Remote { id } => Ok(Some(id.as_str())),
            ParentLink::SameRun { source_line } => match states.get(source_line) {
                Some(RowState::Created(id)) => Ok(Some(id.as_str())),
                // dry run: parent validated as resolvable, nothing to send
                Some(RowState::Skipped) => Ok(None),
                Some(RowState::Failed) | None => Err(Outcome::failed(
                    request,
                    FailureKind::DependencyFailed,
                    format!("parent at line {} was not created", source_line),
                )),
            },
            ParentLink::Unresolved { reference } => Err(Outcome::failed(
                request,
                FailureKind::UnresolvedParent,
                format!("reference '{}' matches no row in this file", reference),
            )),
            ParentLink::Rejected { source_line } => Err(Outcome::failed(
                request,
                FailureKind::DependencyFailed,
                format!("parent at line {} failed validation", source_line),
            )),
        }
    }

    async fn attempt(&self, request: &EntityRequest, parent_id: Option<&str>) -> Outcome {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            tracing::debug!(
                "➡️ Creating {} '{}' (line {}, attempt {})",
                request.kind(),
                request.name,
                request.source_line,
                attempts
            );

            let error = match request.create_with(&self.gateway, parent_id).await {
                Ok(remote_id) => return Outcome::created(request, remote_id, attempts),
                Err(error) => error,
            };

            let failure = classify(&error);
            if failure.is_retryable() && attempts <= self.retry.max_retries {
                tracing::warn!(
                    "⚠️ Line {}: {} - retrying in {:?}",
                    request.source_line,
                    error,
                    self.retry.delay
                );
                tokio::time::sleep(self.retry.delay).await;
                continue;
            }

            return Outcome::failed(request, failure, error.message())
                .with_http_status(error.http_status())
                .with_attempts(attempts)
                .with_parent_remote_id(parent_id.map(str::to_string));
        }
    }
}
