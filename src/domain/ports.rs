use crate::domain::model::{EntityRequest, EntitySpec, ProgressEvent};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::fmt;

/// Error contract shared by every gateway operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The API answered with a non-success status.
    Http {
        status: u16,
        code: String,
        message: String,
    },
    /// No answer within the configured timeout.
    Timeout { message: String },
    /// Connection-level failure before a status was received.
    Transport { message: String },
    /// Success status but the body carried no usable id.
    InvalidResponse { status: u16, message: String },
}

impl GatewayError {
    pub fn http_status(&self) -> Option<u16> {
        match self {
            GatewayError::Http { status, .. } | GatewayError::InvalidResponse { status, .. } => {
                Some(*status)
            }
            GatewayError::Timeout { .. } | GatewayError::Transport { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            GatewayError::Http { message, .. }
            | GatewayError::Timeout { message }
            | GatewayError::Transport { message }
            | GatewayError::InvalidResponse { message, .. } => message,
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Http {
                status,
                code,
                message,
            } => write!(f, "HTTP {} {}: {}", status, code, message),
            GatewayError::Timeout { message } => write!(f, "timeout: {}", message),
            GatewayError::Transport { message } => write!(f, "transport error: {}", message),
            GatewayError::InvalidResponse { status, message } => {
                write!(f, "invalid response (HTTP {}): {}", status, message)
            }
        }
    }
}

/// `Ok` carries the remote id of the created entity.
pub type GatewayResult = std::result::Result<String, GatewayError>;

/// One idempotent create operation per entity kind.
///
/// Re-creating an existing entity must answer 409 instead of duplicating it.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn create_domain(&self, name: &str, timezone: &str) -> GatewayResult;
    async fn create_subdomain(&self, parent_domain_id: &str, name: &str) -> GatewayResult;
    async fn create_client(&self, name: &str) -> GatewayResult;
    async fn create_business_unit(&self, client_id: &str, name: &str) -> GatewayResult;
}

impl EntityRequest {
    /// Issue the create call matching this request's kind.
    ///
    /// `parent_id` is the resolved remote id of the parent (same-run or
    /// pre-existing); it falls back to the reference written in the row.
    pub async fn create_with<G: Gateway + ?Sized>(
        &self,
        gateway: &G,
        parent_id: Option<&str>,
    ) -> GatewayResult {
        match &self.spec {
            EntitySpec::Domain { timezone } => gateway.create_domain(&self.name, timezone).await,
            EntitySpec::Subdomain { parent_domain_ref } => {
                let parent = parent_id.unwrap_or(parent_domain_ref);
                gateway.create_subdomain(parent, &self.name).await
            }
            EntitySpec::Client => gateway.create_client(&self.name).await,
            EntitySpec::BusinessUnit { client_ref } => {
                let client = parent_id.unwrap_or(client_ref);
                gateway.create_business_unit(client, &self.name).await
            }
        }
    }
}

/// Receives a notification after every terminal row transition.
pub trait ProgressSink: Send {
    fn on_progress(&mut self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: FnMut(&ProgressEvent) + Send,
{
    fn on_progress(&mut self, event: &ProgressEvent) {
        self(event)
    }
}

/// Destination for the report files.
pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
