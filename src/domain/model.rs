use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 可建立的組織實體種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Domain,
    Subdomain,
    Client,
    BusinessUnit,
}

impl EntityKind {
    /// Case-insensitive match of the `type` column.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "domain" => Some(EntityKind::Domain),
            "subdomain" | "sub_domain" | "sub-domain" => Some(EntityKind::Subdomain),
            "client" => Some(EntityKind::Client),
            "business_unit" | "businessunit" | "business unit" | "business-unit" | "bu" => {
                Some(EntityKind::BusinessUnit)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Domain => "domain",
            EntityKind::Subdomain => "subdomain",
            EntityKind::Client => "client",
            EntityKind::BusinessUnit => "business_unit",
        }
    }

    /// Kinds a same-run reference of this kind may point at, in lookup priority.
    pub fn parent_kinds(&self) -> &'static [EntityKind] {
        match self {
            EntityKind::Subdomain => &[EntityKind::Domain, EntityKind::Subdomain],
            EntityKind::BusinessUnit => &[EntityKind::Client],
            EntityKind::Domain | EntityKind::Client => &[],
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The recognized input columns of one row, trimmed but otherwise as written.
///
/// Kept on every outcome so failed rows can be written back out in the
/// input schema and re-imported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub name: String,
    pub timezone: String,
    pub parent_domain_id: String,
    pub client_id: String,
}

/// Kind-specific payload of a validated row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntitySpec {
    Domain { timezone: String },
    Subdomain { parent_domain_ref: String },
    Client,
    BusinessUnit { client_ref: String },
}

/// 一列 CSV 經驗證後的建立請求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRequest {
    pub name: String,
    pub spec: EntitySpec,
    pub source_line: usize,
    pub source: SourceRecord,
}

impl EntityRequest {
    pub fn kind(&self) -> EntityKind {
        match self.spec {
            EntitySpec::Domain { .. } => EntityKind::Domain,
            EntitySpec::Subdomain { .. } => EntityKind::Subdomain,
            EntitySpec::Client => EntityKind::Client,
            EntitySpec::BusinessUnit { .. } => EntityKind::BusinessUnit,
        }
    }

    pub fn parent_ref(&self) -> Option<&str> {
        match &self.spec {
            EntitySpec::Subdomain { parent_domain_ref } => Some(parent_domain_ref),
            EntitySpec::BusinessUnit { client_ref } => Some(client_ref),
            EntitySpec::Domain { .. } | EntitySpec::Client => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum ValidationReason {
    UnknownKind(String),
    MissingField(&'static str),
    EmptyName,
    Malformed(String),
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationReason::UnknownKind(raw) if raw.is_empty() => write!(f, "missing entity type"),
            ValidationReason::UnknownKind(raw) => write!(f, "unknown entity type '{}'", raw),
            ValidationReason::MissingField(field) => write!(f, "missing required field '{}'", field),
            ValidationReason::EmptyName => write!(f, "name must not be empty"),
            ValidationReason::Malformed(message) => write!(f, "malformed row: {}", message),
        }
    }
}

/// Why a row ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation(ValidationReason),
    UnresolvedParent,
    DependencyFailed,
    AlreadyExists,
    BadRequest,
    /// The API answered 2xx without a usable id; the entity may exist.
    UnconfirmedCreate,
    ServerError,
    Auth,
}

impl FailureKind {
    pub fn code(&self) -> &'static str {
        match self {
            FailureKind::Validation(_) => "validation_error",
            FailureKind::UnresolvedParent => "unresolved_parent",
            FailureKind::DependencyFailed => "dependency_failed",
            FailureKind::AlreadyExists => "already_exists",
            FailureKind::BadRequest => "bad_request",
            FailureKind::UnconfirmedCreate => "unconfirmed_create",
            FailureKind::ServerError => "server_error",
            FailureKind::Auth => "auth",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::ServerError)
    }

    pub fn is_run_fatal(&self) -> bool {
        matches!(self, FailureKind::Auth)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Created,
    Skipped,
    Failed,
    NotAttempted,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Created => "created",
            OutcomeStatus::Skipped => "skipped",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::NotAttempted => "not_attempted",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one input row. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub source_line: usize,
    /// `None` only for rows whose type could not be recognized.
    pub kind: Option<EntityKind>,
    pub name: String,
    pub status: OutcomeStatus,
    pub failure: Option<FailureKind>,
    pub http_status: Option<u16>,
    pub error_message: Option<String>,
    pub remote_id: Option<String>,
    /// Remote id of the same-run parent, when that parent was created.
    pub parent_remote_id: Option<String>,
    /// Number of gateway calls made for this row.
    pub attempts: u32,
    pub source: SourceRecord,
}

impl Outcome {
    fn base(request: &EntityRequest, status: OutcomeStatus) -> Self {
        Self {
            source_line: request.source_line,
            kind: Some(request.kind()),
            name: request.name.clone(),
            status,
            failure: None,
            http_status: None,
            error_message: None,
            remote_id: None,
            parent_remote_id: None,
            attempts: 0,
            source: request.source.clone(),
        }
    }

    pub fn created(request: &EntityRequest, remote_id: String, attempts: u32) -> Self {
        Self {
            remote_id: Some(remote_id),
            attempts,
            ..Self::base(request, OutcomeStatus::Created)
        }
    }

    pub fn skipped(request: &EntityRequest) -> Self {
        Self::base(request, OutcomeStatus::Skipped)
    }

    pub fn not_attempted(request: &EntityRequest) -> Self {
        Self::base(request, OutcomeStatus::NotAttempted)
    }

    pub fn failed(
        request: &EntityRequest,
        failure: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            failure: Some(failure),
            error_message: Some(message.into()),
            ..Self::base(request, OutcomeStatus::Failed)
        }
    }

    /// A row rejected before it became an `EntityRequest`.
    pub fn rejected(source_line: usize, reason: ValidationReason, source: SourceRecord) -> Self {
        Self {
            source_line,
            kind: EntityKind::parse(&source.entity_type),
            name: source.name.clone(),
            status: OutcomeStatus::Failed,
            error_message: Some(reason.to_string()),
            failure: Some(FailureKind::Validation(reason)),
            http_status: None,
            remote_id: None,
            parent_remote_id: None,
            attempts: 0,
            source,
        }
    }

    pub fn with_http_status(mut self, status: Option<u16>) -> Self {
        self.http_status = status;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_parent_remote_id(mut self, parent_remote_id: Option<String>) -> Self {
        self.parent_remote_id = parent_remote_id;
        self
    }

    pub fn error_code(&self) -> Option<&'static str> {
        self.failure.as_ref().map(FailureKind::code)
    }
}

/// Why a run stopped before reaching every row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RunHalt {
    Auth { source_line: usize, message: String },
    CyclicDependency { lines: Vec<usize> },
}

impl fmt::Display for RunHalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunHalt::Auth {
                source_line,
                message,
            } => write!(
                f,
                "authentication rejected at line {}: {}",
                source_line, message
            ),
            RunHalt::CyclicDependency { lines } => {
                write!(f, "cyclic dependency between lines {:?}", lines)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    PartialFailure,
    Fatal,
}

impl RunStatus {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::PartialFailure => 2,
            RunStatus::Fatal => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub processed: usize,
    pub total: usize,
    pub created: usize,
    pub failed: usize,
}

/// The whole execution: outcome sequence plus running counters.
///
/// Mutated only by the orchestrator; once `finalize` has run the counts are
/// frozen and readers get a consistent view.
#[derive(Debug, Clone)]
pub struct ImportRun {
    dry_run: bool,
    total: usize,
    outcomes: Vec<Outcome>,
    created: usize,
    skipped: usize,
    failed: usize,
    not_attempted: usize,
    halt: Option<RunHalt>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl ImportRun {
    pub(crate) fn new(total: usize, dry_run: bool) -> Self {
        Self {
            dry_run,
            total,
            outcomes: Vec::with_capacity(total),
            created: 0,
            skipped: 0,
            failed: 0,
            not_attempted: 0,
            halt: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub(crate) fn record(&mut self, outcome: Outcome) -> &Outcome {
        debug_assert!(!self.is_finalized(), "outcome recorded after finalize");
        match outcome.status {
            OutcomeStatus::Created => self.created += 1,
            OutcomeStatus::Skipped => self.skipped += 1,
            OutcomeStatus::Failed => self.failed += 1,
            OutcomeStatus::NotAttempted => self.not_attempted += 1,
        }
        self.outcomes.push(outcome);
        &self.outcomes[self.outcomes.len() - 1]
    }

    pub(crate) fn halt(&mut self, reason: RunHalt) {
        if self.halt.is_none() {
            self.halt = Some(reason);
        }
    }

    pub(crate) fn finalize(&mut self) {
        if self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn created(&self) -> usize {
        self.created
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn not_attempted(&self) -> usize {
        self.not_attempted
    }

    pub fn halted(&self) -> Option<&RunHalt> {
        self.halt.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Rows that reached a terminal state through processing.
    pub fn processed(&self) -> usize {
        self.created + self.skipped + self.failed
    }

    pub fn progress(&self) -> ProgressEvent {
        ProgressEvent {
            processed: self.processed(),
            total: self.total,
            created: self.created,
            failed: self.failed,
        }
    }

    pub fn status(&self) -> RunStatus {
        if self.halt.is_some() {
            RunStatus::Fatal
        } else if self.failed > 0 {
            RunStatus::PartialFailure
        } else {
            RunStatus::Success
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain_request(line: usize, name: &str) -> EntityRequest {
        EntityRequest {
            name: name.to_string(),
            spec: EntitySpec::Domain {
                timezone: "Europe/Berlin".to_string(),
            },
            source_line: line,
            source: SourceRecord {
                entity_type: "domain".to_string(),
                name: name.to_string(),
                timezone: "Europe/Berlin".to_string(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_entity_kind_parse_is_case_insensitive() {
        assert_eq!(EntityKind::parse("Domain"), Some(EntityKind::Domain));
        assert_eq!(EntityKind::parse(" SUBDOMAIN "), Some(EntityKind::Subdomain));
        assert_eq!(EntityKind::parse("Business_Unit"), Some(EntityKind::BusinessUnit));
        assert_eq!(EntityKind::parse("business unit"), Some(EntityKind::BusinessUnit));
        assert_eq!(EntityKind::parse("project"), None);
        assert_eq!(EntityKind::parse(""), None);
    }

    #[test]
    fn test_run_counters_follow_recorded_outcomes() {
        let mut run = ImportRun::new(4, false);
        let a = domain_request(2, "EMEA");
        let b = domain_request(3, "APAC");
        let c = domain_request(4, "AMER");

        run.record(Outcome::created(&a, "d-1".to_string(), 1));
        run.record(Outcome::failed(&b, FailureKind::AlreadyExists, "exists").with_http_status(Some(409)));
        run.record(Outcome::not_attempted(&c));
        run.finalize();

        assert_eq!(run.created(), 1);
        assert_eq!(run.failed(), 1);
        assert_eq!(run.not_attempted(), 1);
        assert_eq!(run.processed(), 2);
        assert_eq!(run.status(), RunStatus::PartialFailure);
        assert!(run.is_finalized());
        assert_eq!(run.outcomes()[1].error_code(), Some("already_exists"));
    }

    #[test]
    fn test_halt_makes_run_fatal_and_keeps_first_reason() {
        let mut run = ImportRun::new(0, false);
        run.halt(RunHalt::CyclicDependency { lines: vec![2, 3] });
        run.halt(RunHalt::Auth {
            source_line: 4,
            message: "401".to_string(),
        });
        assert_eq!(run.status(), RunStatus::Fatal);
        assert!(matches!(run.halted(), Some(RunHalt::CyclicDependency { .. })));
    }

    #[test]
    fn test_rejected_outcome_keeps_recognized_kind() {
        let source = SourceRecord {
            entity_type: "Domain".to_string(),
            name: "EMEA".to_string(),
            ..Default::default()
        };
        let outcome = Outcome::rejected(5, ValidationReason::MissingField("timezone"), source);
        assert_eq!(outcome.kind, Some(EntityKind::Domain));
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.error_code(), Some("validation_error"));
        assert_eq!(
            outcome.error_message.as_deref(),
            Some("missing required field 'timezone'")
        );
    }
}
