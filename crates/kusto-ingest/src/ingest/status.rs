use crate::resources::Handle;
use crate::storage::{TableClient, TableEntity};
use crate::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Lifecycle state of one queued ingestion, as tracked client-side and in
/// the status table. The service advances rows past `Pending` once it
/// picks the ingestion up.
#[derive(Debug, Copy, Clone, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum OperationStatus {
    Pending,
    Queued,
    Succeeded,
    Failed,
    PartiallySucceeded,
    Skipped,
}

/// One per-ingestion status row.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IngestionStatus {
    pub database: String,
    pub table: String,
    pub status: OperationStatus,
    pub updated_on: DateTime<Utc>,
    pub ingestion_source_id: Uuid,
    pub ingestion_source_path: String,
}

impl IngestionStatus {
    /// Render this status as a table entity. Both partition and row key
    /// are the ingestion source id.
    pub fn to_entity(&self) -> Result<TableEntity> {
        let serde_json::Value::Object(properties) = serde_json::to_value(self)? else {
            unreachable!("a status row always serializes to an object");
        };

        Ok(TableEntity {
            partition_key: self.ingestion_source_id.to_string(),
            row_key: self.ingestion_source_id.to_string(),
            properties,
        })
    }
}

/// Pointer carried by the queue message at which the service updates the
/// caller-visible status row.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IngestionStatusInTable {
    pub table_connection_string: String,
    pub partition_key: String,
    pub row_key: String,
}

/// Outcome of one queued ingest call.
#[derive(Debug)]
pub enum IngestionResult {
    /// The payload was enqueued; status is tracked in memory only.
    Queued(IngestionStatus),
    /// A pending status row was inserted, which the service updates as
    /// the ingestion progresses.
    Tracked {
        status: IngestionStatus,
        table: Handle<dyn TableClient>,
    },
}

impl IngestionResult {
    /// The status as known at enqueue time.
    pub fn status(&self) -> &IngestionStatus {
        match self {
            IngestionResult::Queued(status) => status,
            IngestionResult::Tracked { status, .. } => status,
        }
    }
}
