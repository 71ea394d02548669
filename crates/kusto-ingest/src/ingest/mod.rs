//! The queued ingest façade: translates a source descriptor and ingestion
//! properties into a staged payload, an enqueued ingestion notification,
//! and (optionally) a tracked status row.

mod blob_info;
mod properties;
mod source;
mod status;

pub use blob_info::IngestionBlobInfo;
pub use properties::{
    DataFormat, IngestionProperties, ReportLevel, ReportMethod, ValidationImplications,
    ValidationOptions, ValidationPolicy,
};
pub use source::{BlobDescriptor, FileDescriptor, ResultSetDescriptor, StreamDescriptor};
pub use status::{IngestionResult, IngestionStatus, IngestionStatusInTable, OperationStatus};

use crate::control::ControlPlane;
use crate::resources::ResourceManager;
use crate::storage::StorageClientFactory;
use crate::{ClientOptions, Error, Result};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

// Service role of a correctly-targeted ingestion endpoint.
const EXPECTED_SERVICE_TYPE: &str = "DataManagement";

/// QueuedIngestClient stages payloads in service-vended storage and
/// enqueues ingestion notifications for the service to pick up.
#[derive(Clone)]
pub struct QueuedIngestClient {
    resources: Arc<ResourceManager>,
    upload_timeout: Duration,
}

impl QueuedIngestClient {
    /// Build a client over the given control-plane and storage
    /// collaborators. Background refresh of ingestion resources and the
    /// identity token begins immediately.
    pub fn new(control: Arc<dyn ControlPlane>, storage: Arc<dyn StorageClientFactory>) -> Self {
        Self::with_options(control, storage, &ClientOptions::default())
    }

    pub fn with_options(
        control: Arc<dyn ControlPlane>,
        storage: Arc<dyn StorageClientFactory>,
        options: &ClientOptions,
    ) -> Self {
        Self {
            resources: ResourceManager::start(control, storage, options),
            upload_timeout: options.upload_timeout,
        }
    }

    /// The resource manager backing this client.
    pub fn resources(&self) -> &Arc<ResourceManager> {
        &self.resources
    }

    /// Stop background refreshes. Handles already vended remain usable.
    pub fn close(&self) {
        self.resources.close();
    }

    /// Enqueue ingestion of a payload already staged in blob storage.
    pub async fn ingest_from_blob(
        &self,
        blob: BlobDescriptor,
        props: &IngestionProperties,
    ) -> Result<IngestionResult> {
        props.validate()?;
        if blob.path.is_empty() {
            return Err(Error::InvalidArgument("blob path is empty"));
        }

        let source_id = blob.source_id.unwrap_or_else(Uuid::new_v4);
        if blob.raw_size == 0 {
            tracing::warn!(
                %source_id,
                "ingesting a blob without a raw-size hint; the service will estimate it"
            );
        }

        let mut info = IngestionBlobInfo::new(blob.path.as_str(), blob.raw_size, source_id, props);
        info.authorization_context = Some(self.resources.identity_token().await?);

        let mut ingest_status = IngestionStatus {
            database: props.database.clone(),
            table: props.table.clone(),
            status: OperationStatus::Queued,
            updated_on: Utc::now(),
            ingestion_source_id: source_id,
            ingestion_source_path: blob.path.clone(),
        };

        // Table-based reporting tracks a pending row which the service
        // updates as the ingestion progresses.
        let track_in_table =
            props.report_level != ReportLevel::None && props.report_method != ReportMethod::Queue;

        let result = if track_in_table {
            ingest_status.status = OperationStatus::Pending;

            let table = self.resources.next_status_table().await?;
            let entity = ingest_status.to_entity()?;
            self.probe_on_service_error(table.client().insert_entity(&entity))
                .await?;

            info.ingestion_status_in_table = Some(IngestionStatusInTable {
                table_connection_string: table.uri().uri().to_string(),
                partition_key: source_id.to_string(),
                row_key: source_id.to_string(),
            });
            IngestionResult::Tracked {
                status: ingest_status,
                table,
            }
        } else {
            IngestionResult::Queued(ingest_status)
        };

        let message = serde_json::to_string(&info)?;
        let queue = self.resources.next_aggregation_queue().await?;
        self.probe_on_service_error(queue.client().post_message(&message))
            .await?;

        tracing::debug!(
            %source_id,
            database = %props.database,
            table = %props.table,
            "enqueued ingestion notification"
        );
        Ok(result)
    }

    /// Stage a local file in temp storage and enqueue its ingestion.
    pub async fn ingest_from_file(
        &self,
        file: FileDescriptor,
        props: &IngestionProperties,
    ) -> Result<IngestionResult> {
        props.validate()?;

        let basename = file
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or(Error::InvalidArgument("file path has no UTF-8 basename"))?
            .to_string();
        let data = tokio::fs::read(&file.path).await?;

        // Files named *.gz or *.zip arrive pre-compressed.
        let compressed = basename.ends_with(".gz") || basename.ends_with(".zip");
        let raw_size = match (file.raw_size, compressed) {
            (size, _) if size != 0 => size,
            (_, true) => 0,
            (_, false) => data.len() as u64,
        };

        self.stage_and_ingest(
            StreamDescriptor {
                data: data.into(),
                name: basename,
                compressed,
                source_id: file.source_id,
            },
            props,
            raw_size,
        )
        .await
    }

    /// Stage an in-memory payload in temp storage and enqueue its
    /// ingestion.
    pub async fn ingest_from_stream(
        &self,
        stream: StreamDescriptor,
        props: &IngestionProperties,
    ) -> Result<IngestionResult> {
        props.validate()?;

        let raw_size = if stream.compressed {
            0
        } else {
            stream.data.len() as u64
        };
        self.stage_and_ingest(stream, props, raw_size).await
    }

    /// Materialize a tabular result set as CSV and enqueue its ingestion.
    pub async fn ingest_from_result_set(
        &self,
        result_set: ResultSetDescriptor,
        props: &IngestionProperties,
    ) -> Result<IngestionResult> {
        props.validate()?;

        let data = source::to_csv(&result_set.rows)?;
        self.stage_and_ingest(
            StreamDescriptor {
                data,
                name: result_set.name,
                compressed: false,
                source_id: result_set.source_id,
            },
            props,
            0,
        )
        .await
    }

    async fn stage_and_ingest(
        &self,
        stream: StreamDescriptor,
        props: &IngestionProperties,
        mut raw_size: u64,
    ) -> Result<IngestionResult> {
        if stream.data.is_empty() {
            return Err(Error::InvalidArgument("ingestion payload is empty"));
        }
        let source_id = stream.source_id.unwrap_or_else(Uuid::new_v4);

        if raw_size == 0 && !stream.compressed {
            raw_size = stream.data.len() as u64;
        }

        let gzipped = props.format.is_compressible() && !stream.compressed;
        let data = if gzipped {
            source::gzip(&stream.data)?
        } else {
            stream.data
        };

        let name = source::blob_name(
            &props.database,
            &props.table,
            &stream.name,
            source_id,
            props.format,
            gzipped,
        );

        let container = self.resources.next_temp_storage().await?;
        match tokio::time::timeout(
            self.upload_timeout,
            container.client().upload_blob(&name, data),
        )
        .await
        {
            Ok(uploaded) => uploaded?,
            Err(_elapsed) => return Err(Error::UploadTimeout(self.upload_timeout)),
        }
        tracing::debug!(%source_id, blob = %name, "staged payload in temp storage");

        self.ingest_from_blob(
            BlobDescriptor {
                path: container.uri().child_url(&name),
                raw_size,
                source_id: Some(source_id),
            },
            props,
        )
        .await
    }

    // A service-class failure while enqueueing is often a mis-targeted
    // connection: probe which role the endpoint reports and say so before
    // surfacing the original error.
    async fn probe_on_service_error<T>(&self, op: impl Future<Output = Result<T>>) -> Result<T> {
        match op.await {
            Err(err) if err.is_service() => {
                match self.resources.service_type().await {
                    Some(service_type) if service_type != EXPECTED_SERVICE_TYPE => {
                        tracing::warn!(
                            service_type = %service_type,
                            expected = EXPECTED_SERVICE_TYPE,
                            "endpoint reports an unexpected service role; the connection \
                             likely targets the engine instead of the ingestion service"
                        );
                    }
                    _ => (),
                }
                Err(err)
            }
            result => result,
        }
    }
}
