//! Interfaces of the storage collaborators this client drives. The
//! concrete queue, blob, and table SDKs live outside this crate; the
//! resource manager constructs them through [`StorageClientFactory`] from
//! the credentialed URIs the control plane vends.

use crate::resources::ResourceUri;
use crate::Result;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// Options applied to queue clients as they are constructed. Changing the
/// options affects handles built by future refreshes only.
#[derive(Debug, Clone, Default)]
pub struct QueueRequestOptions {
    /// Per-request timeout applied by the queue transport.
    pub timeout: Option<Duration>,
    /// Retries the queue transport may make per request.
    pub max_retries: Option<u32>,
}

/// A client of one ingestion-notification or report queue.
#[async_trait::async_trait]
pub trait QueueClient: Send + Sync + 'static {
    /// Post a single UTF-8 message.
    async fn post_message(&self, content: &str) -> Result<()>;
}

/// A client of one temp-storage blob container.
#[async_trait::async_trait]
pub trait ContainerClient: Send + Sync + 'static {
    /// Upload a blob under `name` within this container.
    async fn upload_blob(&self, name: &str, content: Bytes) -> Result<()>;
}

/// A client of the ingestion status table.
#[async_trait::async_trait]
pub trait TableClient: Send + Sync + 'static {
    /// Insert a new entity row.
    async fn insert_entity(&self, entity: &TableEntity) -> Result<()>;
}

/// One row of a key-value storage table.
#[derive(Debug, Clone)]
pub struct TableEntity {
    pub partition_key: String,
    pub row_key: String,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// StorageClientFactory builds typed storage clients from the credentialed
/// resource URIs vended by the control plane.
pub trait StorageClientFactory: Send + Sync + 'static {
    fn queue_client(
        &self,
        uri: &ResourceUri,
        options: &QueueRequestOptions,
    ) -> Arc<dyn QueueClient>;

    fn container_client(&self, uri: &ResourceUri) -> Arc<dyn ContainerClient>;

    fn table_client(&self, uri: &ResourceUri) -> Arc<dyn TableClient>;
}
