use super::properties::{IngestionProperties, ReportLevel, ReportMethod, ValidationPolicy};
use super::status::IngestionStatusInTable;
use std::collections::HashMap;
use uuid::Uuid;

/// IngestionBlobInfo is the queue message asking the service to ingest
/// one staged blob.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IngestionBlobInfo {
    pub blob_path: String,
    pub database_name: String,
    pub table_name: String,
    /// Uncompressed payload size. Omitted when unknown, in which case the
    /// service estimates it from the blob.
    #[serde(skip_serializing_if = "is_zero")]
    pub raw_data_size: u64,
    pub report_level: ReportLevel,
    pub report_method: ReportMethod,
    pub flush_immediately: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_policy: Option<ValidationPolicy>,
    pub additional_properties: HashMap<String, String>,
    pub id: Uuid,
    pub ingestion_status_in_table: Option<IngestionStatusInTable>,
    /// Identity token authorizing this message, stamped by the façade
    /// just before enqueueing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_context: Option<String>,
}

fn is_zero(size: &u64) -> bool {
    *size == 0
}

impl IngestionBlobInfo {
    /// Assemble the queue document for one staged blob. The data format
    /// is folded into the additional-properties map the way the service
    /// expects it.
    pub fn new(
        blob_path: impl Into<String>,
        raw_data_size: u64,
        id: Uuid,
        props: &IngestionProperties,
    ) -> Self {
        let mut additional_properties = props.additional_properties.clone();
        additional_properties.insert("format".to_string(), props.format.name().to_string());

        Self {
            blob_path: blob_path.into(),
            database_name: props.database.clone(),
            table_name: props.table.clone(),
            raw_data_size,
            report_level: props.report_level,
            report_method: props.report_method,
            flush_immediately: props.flush_immediately,
            validation_policy: props.validation_policy,
            additional_properties,
            id,
            ingestion_status_in_table: None,
            authorization_context: None,
        }
    }
}
