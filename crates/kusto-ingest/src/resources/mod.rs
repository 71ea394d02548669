//! The resource manager: a long-lived, concurrent cache of the
//! short-lived credentialed endpoints the control plane vends for queued
//! ingestion, refreshed periodically in the background and on demand when
//! a caller finds a pool empty.

mod kind;
mod pool;
mod refresh;
mod uri;

pub use kind::ResourceKind;
pub use pool::Pool;
pub use uri::ResourceUri;

use crate::control::{self, ControlPlane, RowSet};
use crate::retry::RetryPolicy;
use crate::storage::{
    ContainerClient, QueueClient, QueueRequestOptions, StorageClientFactory, TableClient,
};
use crate::{ClientOptions, Error, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Handle is one credentialed storage endpoint paired with its typed
/// client. Handles are self-contained: they carry their own credential,
/// and remain usable after the pool that vended them is replaced.
pub struct Handle<C: ?Sized> {
    uri: ResourceUri,
    client: Arc<C>,
}

impl<C: ?Sized> Handle<C> {
    pub fn uri(&self) -> &ResourceUri {
        &self.uri
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }
}

impl<C: ?Sized> Clone for Handle<C> {
    fn clone(&self) -> Self {
        Self {
            uri: self.uri.clone(),
            client: self.client.clone(),
        }
    }
}

impl<C: ?Sized> std::fmt::Debug for Handle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle").field("uri", &self.uri).finish()
    }
}

/// IngestResources is the atomic unit of refresh: one pool per resource
/// kind, replaced wholesale by each successful refresh. Readers observe
/// either all-old pools or all-new pools, never a mix.
#[derive(Default)]
struct IngestResources {
    aggregation_queues: Pool<Handle<dyn QueueClient>>,
    failed_queues: Pool<Handle<dyn QueueClient>>,
    successful_queues: Pool<Handle<dyn QueueClient>>,
    temp_containers: Pool<Handle<dyn ContainerClient>>,
    status_tables: Pool<Handle<dyn TableClient>>,
}

/// ResourceManager caches the ingestion resources and identity token
/// vended by one control plane, spreading load across equivalent handles
/// and absorbing transient control-plane throttling.
///
/// The resource snapshot and the identity token refresh independently,
/// each behind its own lock. Refreshers take their write lock with a
/// non-blocking attempt so concurrent refreshes collapse to one; readers
/// always go through the read side and so block only while a winning
/// refresher is publishing.
pub struct ResourceManager {
    control: Arc<dyn ControlPlane>,
    clients: Arc<dyn StorageClientFactory>,
    retry: RetryPolicy,
    resources: RwLock<IngestResources>,
    token: RwLock<Option<String>>,
    queue_options: std::sync::Mutex<QueueRequestOptions>,
    shutdown: CancellationToken,
}

impl ResourceManager {
    /// Start a manager which refreshes ingestion resources and the
    /// identity token in the background, immediately and then periodically,
    /// until [`ResourceManager::close`] is called.
    pub fn start(
        control: Arc<dyn ControlPlane>,
        clients: Arc<dyn StorageClientFactory>,
        options: &ClientOptions,
    ) -> Arc<Self> {
        let manager = Arc::new(Self::new(control, clients, options));
        refresh::spawn(&manager, options);
        manager
    }

    fn new(
        control: Arc<dyn ControlPlane>,
        clients: Arc<dyn StorageClientFactory>,
        options: &ClientOptions,
    ) -> Self {
        Self {
            control,
            clients,
            retry: RetryPolicy::default(),
            resources: RwLock::new(IngestResources::default()),
            token: RwLock::new(None),
            queue_options: std::sync::Mutex::new(options.queue_request_options.clone()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Return the next ingestion-notification queue handle in rotation.
    pub async fn next_aggregation_queue(&self) -> Result<Handle<dyn QueueClient>> {
        self.next_handle(ResourceKind::SecuredReadyForAggregationQueue, |r| {
            &r.aggregation_queues
        })
        .await
    }

    /// Return the next failure-report queue handle in rotation.
    pub async fn next_failed_queue(&self) -> Result<Handle<dyn QueueClient>> {
        self.next_handle(ResourceKind::FailedIngestionsQueue, |r| &r.failed_queues)
            .await
    }

    /// Return the next success-report queue handle in rotation.
    pub async fn next_successful_queue(&self) -> Result<Handle<dyn QueueClient>> {
        self.next_handle(ResourceKind::SuccessfulIngestionsQueue, |r| {
            &r.successful_queues
        })
        .await
    }

    /// Return the next temp-storage container handle in rotation.
    pub async fn next_temp_storage(&self) -> Result<Handle<dyn ContainerClient>> {
        self.next_handle(ResourceKind::TempStorage, |r| &r.temp_containers)
            .await
    }

    /// Return the next status-table handle in rotation.
    pub async fn next_status_table(&self) -> Result<Handle<dyn TableClient>> {
        self.next_handle(ResourceKind::IngestionsStatusTable, |r| &r.status_tables)
            .await
    }

    async fn next_handle<C: ?Sized>(
        &self,
        kind: ResourceKind,
        select: impl Fn(&IngestResources) -> &Pool<Handle<C>>,
    ) -> Result<Handle<C>> {
        {
            let resources = self.resources.read().await;
            if let Some(handle) = select(&resources).next() {
                return Ok(handle);
            }
        }

        // The pool is empty: fetch resources on demand, then try once more.
        self.refresh_ingestion_resources().await?;

        let resources = self.resources.read().await;
        select(&resources)
            .next()
            .ok_or(Error::ResourcesExhausted(kind))
    }

    /// The current identity token attached to ingestion messages,
    /// fetching it on demand if none has been published yet.
    pub async fn identity_token(&self) -> Result<String> {
        {
            let token = self.token.read().await;
            if let Some(token) = token.as_deref() {
                return Ok(token.to_string());
            }
        }

        self.refresh_identity_token().await?;

        let token = self.token.read().await;
        token.clone().ok_or(Error::TokenUnavailable)
    }

    /// Fetch `.get ingestion resources` and atomically publish a new pool
    /// for every resource kind.
    ///
    /// At most one refresh runs at a time: a caller that loses the
    /// write-lock race returns immediately, and any caller that needs a
    /// handle blocks on the read side until the winner publishes.
    pub async fn refresh_ingestion_resources(&self) -> Result<()> {
        let Ok(mut resources) = self.resources.try_write() else {
            // Another refresh is already in flight.
            return Ok(());
        };

        let rows = self
            .retry
            .run(|| self.control.execute(control::GET_INGESTION_RESOURCES))
            .await?;

        *resources = self.build_resources(&rows)?;
        Ok(())
    }

    fn build_resources(&self, rows: &RowSet) -> Result<IngestResources> {
        let kind_col = rows.column("ResourceTypeName")?;
        let root_col = rows.column("StorageRoot")?;
        let queue_options = self.queue_options.lock().unwrap().clone();

        let mut next = IngestResources::default();
        for row in 0..rows.len() {
            let name = rows.str_cell(row, kind_col)?;
            let root = rows.str_cell(row, root_col)?;

            let Some(kind) = ResourceKind::from_wire_name(name) else {
                return Err(Error::UnknownResourceType(name.to_string()));
            };
            let uri = ResourceUri::try_from(root)?;

            match kind {
                ResourceKind::SecuredReadyForAggregationQueue => next
                    .aggregation_queues
                    .add(self.queue_handle(uri, &queue_options)),
                ResourceKind::FailedIngestionsQueue => next
                    .failed_queues
                    .add(self.queue_handle(uri, &queue_options)),
                ResourceKind::SuccessfulIngestionsQueue => next
                    .successful_queues
                    .add(self.queue_handle(uri, &queue_options)),
                ResourceKind::TempStorage => {
                    let client = self.clients.container_client(&uri);
                    next.temp_containers.add(Handle { uri, client });
                }
                ResourceKind::IngestionsStatusTable => {
                    let client = self.clients.table_client(&uri);
                    next.status_tables.add(Handle { uri, client });
                }
            }
        }

        tracing::debug!(
            aggregation_queues = next.aggregation_queues.len(),
            failed_queues = next.failed_queues.len(),
            successful_queues = next.successful_queues.len(),
            temp_containers = next.temp_containers.len(),
            status_tables = next.status_tables.len(),
            "refreshed ingestion resources"
        );
        Ok(next)
    }

    fn queue_handle(
        &self,
        uri: ResourceUri,
        options: &QueueRequestOptions,
    ) -> Handle<dyn QueueClient> {
        let client = self.clients.queue_client(&uri, options);
        Handle { uri, client }
    }

    /// Fetch `.get kusto identity token` and publish the new token. Uses
    /// the same non-blocking write-lock pattern as the resources refresh,
    /// under a separate lock so the two never contend.
    pub async fn refresh_identity_token(&self) -> Result<()> {
        let Ok(mut token) = self.token.try_write() else {
            return Ok(());
        };

        let rows = self
            .retry
            .run(|| self.control.execute(control::GET_IDENTITY_TOKEN))
            .await?;

        *token = Some(rows.str_cell(0, 0)?.to_string());
        Ok(())
    }

    /// Ask the endpoint which service role it hosts, as a diagnostic for
    /// mis-targeted ingestion. One-shot and retry-free; failures are
    /// logged and swallowed.
    pub async fn service_type(&self) -> Option<String> {
        let rows = match self.control.execute(control::SHOW_VERSION).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(error = ?err, "failed to probe the endpoint's service type");
                return None;
            }
        };

        let column = rows.column("ServiceType").ok()?;
        Some(rows.str_cell(0, column).ok()?.to_string())
    }

    /// Replace the options applied to queue clients constructed by future
    /// refreshes. Existing handles are unaffected.
    pub fn set_queue_request_options(&self, options: QueueRequestOptions) {
        *self.queue_options.lock().unwrap() = options;
    }

    /// Stop scheduling background refreshes. In-flight refreshes are
    /// allowed to finish; their publication remains atomic.
    pub fn close(&self) {
        self.shutdown.cancel();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn empty_pool_triggers_on_demand_refresh() {
        let manager = manager_with(FnControlPlane(|command: &str| -> Result<RowSet> {
            assert_eq!(command, control::GET_INGESTION_RESOURCES);
            Ok(RowSet {
                columns: vec!["ResourceTypeName".to_string(), "StorageRoot".to_string()],
                rows: vec![resource_row(
                    "SecuredReadyForAggregationQueue",
                    "https://a.queue.example.net/q?sas=x",
                )],
            })
        }));

        let handle = manager.next_aggregation_queue().await.unwrap();
        assert_eq!(handle.uri().uri(), "https://a.queue.example.net/q?sas=x");
        assert_eq!(handle.uri().sas(), "sas=x");
    }

    #[tokio::test]
    async fn resources_rotate_round_robin_across_draws() {
        let manager = manager_with(FnControlPlane(|_: &str| -> Result<RowSet> {
            Ok(RowSet {
                columns: vec!["ResourceTypeName".to_string(), "StorageRoot".to_string()],
                rows: vec![
                    resource_row("TempStorage", "https://a.blob.example.net/t0?sas=x"),
                    resource_row("TempStorage", "https://a.blob.example.net/t1?sas=x"),
                    resource_row("TempStorage", "https://a.blob.example.net/t2?sas=x"),
                ],
            })
        }));

        let mut drawn = Vec::new();
        for _ in 0..4 {
            let handle = manager.next_temp_storage().await.unwrap();
            drawn.push(handle.uri().object_name().to_string());
        }
        assert_eq!(drawn, vec!["t1", "t2", "t0", "t1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_refresh_retries_then_publishes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();

        let manager = manager_with(FnControlPlane(move |_: &str| -> Result<RowSet> {
            if counted.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(Error::Throttled)
            } else {
                Ok(full_resource_rows())
            }
        }));

        manager.refresh_ingestion_resources().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let handle = manager.next_aggregation_queue().await.unwrap();
        assert_eq!(
            handle.uri().object_name(),
            "SecuredReadyForAggregationQueue"
        );
    }

    #[tokio::test]
    async fn concurrent_refreshes_collapse_to_one() {
        let control = Arc::new(GatedControlPlane {
            calls: AtomicUsize::new(0),
            gate: tokio::sync::Semaphore::new(0),
            rows: full_resource_rows(),
        });
        let manager = Arc::new(ResourceManager::new(
            control.clone(),
            Arc::new(StubStorageFactory),
            &ClientOptions::default(),
        ));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.refresh_ingestion_resources().await })
            })
            .collect();

        // Let every task reach the write-lock attempt: the winner parks on
        // the gate, the rest return immediately.
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        control.gate.add_permits(1);

        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }
        assert_eq!(control.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_kind_is_fatal_and_preserves_prior_snapshot() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();

        let manager = manager_with(FnControlPlane(move |_: &str| -> Result<RowSet> {
            if counted.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(full_resource_rows())
            } else {
                Ok(RowSet {
                    columns: vec!["ResourceTypeName".to_string(), "StorageRoot".to_string()],
                    rows: vec![resource_row(
                        "MysteryQueue",
                        "https://a.queue.example.net/m?sas=x",
                    )],
                })
            }
        }));

        manager.refresh_ingestion_resources().await.unwrap();

        let err = manager.refresh_ingestion_resources().await.unwrap_err();
        assert!(matches!(err, Error::UnknownResourceType(name) if name == "MysteryQueue"));

        // The first snapshot is still published.
        let handle = manager.next_temp_storage().await.unwrap();
        assert_eq!(handle.uri().object_name(), "TempStorage");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn token_refresh_is_independent_of_resources_refresh() {
        let manager = manager_with(FnControlPlane(|command: &str| -> Result<RowSet> {
            match command {
                control::GET_IDENTITY_TOKEN => Ok(single_cell("token-abc")),
                _ => Err(Error::Service {
                    context: "control plane unavailable".to_string(),
                    source: None,
                }),
            }
        }));

        assert_eq!(manager.identity_token().await.unwrap(), "token-abc");

        let err = manager.next_aggregation_queue().await.unwrap_err();
        assert!(err.is_service(), "{err}");
    }

    #[tokio::test]
    async fn exhausted_pool_after_refresh_names_the_kind() {
        // A refresh that succeeds but vends only temp storage.
        let manager = manager_with(FnControlPlane(|_: &str| -> Result<RowSet> {
            Ok(RowSet {
                columns: vec!["ResourceTypeName".to_string(), "StorageRoot".to_string()],
                rows: vec![resource_row(
                    "TempStorage",
                    "https://a.blob.example.net/t?sas=x",
                )],
            })
        }));

        let err = manager.next_status_table().await.unwrap_err();
        assert!(matches!(
            err,
            Error::ResourcesExhausted(ResourceKind::IngestionsStatusTable)
        ));
    }

    #[tokio::test]
    async fn service_type_probe_swallows_failures() {
        let manager = manager_with(FnControlPlane(|command: &str| -> Result<RowSet> {
            match command {
                control::SHOW_VERSION => Ok(RowSet {
                    columns: vec!["BuildVersion".to_string(), "ServiceType".to_string()],
                    rows: vec![vec![
                        serde_json::json!("1.0.0.0"),
                        serde_json::json!("DataManagement"),
                    ]],
                }),
                _ => Err(Error::Throttled),
            }
        }));
        assert_eq!(manager.service_type().await.as_deref(), Some("DataManagement"));

        let failing = manager_with(FnControlPlane(|_: &str| -> Result<RowSet> {
            Err(Error::Service {
                context: "boom".to_string(),
                source: None,
            })
        }));
        assert_eq!(failing.service_type().await, None);

        let empty = manager_with(FnControlPlane(|_: &str| -> Result<RowSet> {
            Ok(RowSet {
                columns: vec!["ServiceType".to_string()],
                rows: Vec::new(),
            })
        }));
        assert_eq!(empty.service_type().await, None);
    }
}
