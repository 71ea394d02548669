//! Client-side orchestration of queued ingestion for a Kusto analytics
//! service: payloads are staged in service-vended blob storage, ingestion
//! notifications are posted to service-managed queues, and per-ingestion
//! status rows are optionally tracked in a service-managed table.
//!
//! The heart of the crate is [`resources::ResourceManager`], a concurrent
//! cache of the short-lived credentialed endpoints the control plane vends
//! for those purposes. [`QueuedIngestClient`] is the ingest façade built
//! on top of it.

pub mod control;
pub mod ingest;
pub mod resources;
pub mod retry;
pub mod storage;

pub use ingest::QueuedIngestClient;
pub use resources::{Handle, ResourceKind, ResourceManager, ResourceUri};
pub use storage::QueueRequestOptions;

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Caller-attributable failures.
    #[error("invalid ingestion argument: {0}")]
    InvalidArgument(&'static str),
    #[error("invalid resource URI '{uri}': {reason}")]
    InvalidResourceUri { uri: String, reason: &'static str },
    #[error("failed to read local ingestion payload")]
    Io(#[from] std::io::Error),
    #[error("failed to encode ingestion document")]
    Json(#[from] serde_json::Error),
    #[error("failed to materialize result set as CSV")]
    Csv(#[from] csv::Error),

    /// The control plane's transient "retry later" signal. It's consumed by
    /// the retry policy, and surfaces only when throttling outlasts every
    /// attempt.
    #[error("control plane throttled the request")]
    Throttled,
    /// A failure attributed to the peer service or a storage endpoint.
    #[error("{context}")]
    Service {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("malformed control plane response: {0}")]
    MalformedResponse(String),
    #[error("no {0} resources are available, even after refreshing them")]
    ResourcesExhausted(ResourceKind),
    #[error("unable to get identity token")]
    TokenUnavailable,
    #[error("upload did not complete within {0:?}")]
    UploadTimeout(Duration),

    /// The control plane vended a resource of a kind this client does not
    /// know. Fatal for the refresh that observed it: the previous pools
    /// remain published.
    #[error("unknown ingestion resource type '{0}'")]
    UnknownResourceType(String),
}

impl Error {
    /// True for the control plane's transient throttle signal, the only
    /// error the retry policy retries.
    pub fn is_throttle(&self) -> bool {
        matches!(self, Error::Throttled)
    }

    /// True for failures attributed to the peer rather than to the caller.
    pub fn is_service(&self) -> bool {
        matches!(
            self,
            Error::Throttled
                | Error::Service { .. }
                | Error::MalformedResponse(_)
                | Error::ResourcesExhausted(_)
                | Error::TokenUnavailable
                | Error::UploadTimeout(_)
        )
    }

    /// Wrap a collaborator failure as a service-attributed error.
    pub fn service(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Service {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// ClientOptions tunes refresh cadence and storage behavior.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Cadence at which ingestion resources and the identity token are
    /// re-fetched after a successful refresh.
    pub refresh_interval: Duration,
    /// Cadence used after a refresh fails.
    pub failure_refresh_interval: Duration,
    /// Bound on a single payload upload to temp storage.
    pub upload_timeout: Duration,
    /// Options applied to queue clients as they are constructed.
    pub queue_request_options: QueueRequestOptions,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60 * 60),
            failure_refresh_interval: Duration::from_secs(15 * 60),
            upload_timeout: Duration::from_secs(10 * 60),
            queue_request_options: QueueRequestOptions::default(),
        }
    }
}
