//! Operator request handler.
//!
//! Composes the attribute coordinator, the cluster registry, and the
//! namespace deleter behind one lifecycle. Every request is profiled: it
//! counts toward the request metrics, runs inside a tracing span carrying the
//! operation name, and records a failure by [`ErrorKind`] when it fails.
//!
//! [`ErrorKind`]: crate::error::ErrorKind

use std::{
    collections::BTreeMap,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
};

use conductor_types::{
    BackendKind, ClusterName, IndexName, IndexedValueType, NamespaceName, config::OperatorConfig,
};
use snafu::ensure;
use tracing::{Instrument, debug, error, info, info_span};

use crate::{
    clusters::{ClusterListing, RemoteClusterRegistry},
    collaborators::{
        ClusterMetadataStore, ClusterMetadataView, IndexClient, NamespaceRegistry,
        RemoteClusterClient, SearchAttributeManager, SearchAttributeProvider, TaskEngine,
    },
    dispatcher::OperationDispatcher,
    error::{NotServingSnafu, Result},
    metrics::{self, RequestTimer},
    namespaces::NamespaceDeleter,
    search_attributes::{
        DynamicMappingBackend, FixedCapacityBackend, ListedAttributes, SearchAttributeCoordinator,
    },
};

/// Handler lifecycle phase.
///
/// Transitions: `Initialized` → `Started` → `Stopped`. They are one-way; a
/// stopped handler never serves again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecyclePhase {
    /// Constructed, not yet serving.
    Initialized = 0,
    /// Serving requests.
    Started = 1,
    /// Stopped for good.
    Stopped = 2,
}

impl LifecyclePhase {
    fn from_u8(val: u8) -> Self {
        match val {
            1 => Self::Started,
            2 => Self::Stopped,
            _ => Self::Initialized,
        }
    }
}

/// External collaborators the handler is wired to.
#[derive(Clone)]
pub struct Collaborators {
    /// Durable task engine.
    pub task_engine: Arc<dyn TaskEngine>,
    /// Reads the current attribute schema.
    pub attribute_provider: Arc<dyn SearchAttributeProvider>,
    /// Persists custom attribute definitions.
    pub attribute_manager: Arc<dyn SearchAttributeManager>,
    /// Reads the physical index mapping, when the store exposes one.
    pub index_client: Option<Arc<dyn IndexClient>>,
    /// Namespace descriptors and alias mappings.
    pub namespace_registry: Arc<dyn NamespaceRegistry>,
    /// Persisted cluster records.
    pub cluster_store: Arc<dyn ClusterMetadataStore>,
    /// In-memory view of the deployment's clusters.
    pub cluster_view: Arc<dyn ClusterMetadataView>,
    /// Reaches peer clusters.
    pub remote_clusters: Arc<dyn RemoteClusterClient>,
}

/// Entry point for operator requests.
pub struct OperatorHandler {
    phase: AtomicU8,
    backend: BackendKind,
    index: IndexName,
    attributes: SearchAttributeCoordinator,
    clusters: RemoteClusterRegistry,
    namespaces: NamespaceDeleter,
}

impl OperatorHandler {
    /// Wires the handler from validated configuration.
    ///
    /// The handler starts in [`LifecyclePhase::Initialized`] and rejects
    /// requests until [`start`](Self::start) is called.
    pub fn new(config: &OperatorConfig, collaborators: Collaborators) -> Self {
        let dispatcher = Arc::new(OperationDispatcher::new(
            collaborators.task_engine,
            config.task_queue.clone(),
        ));

        let dynamic = DynamicMappingBackend::new(
            Arc::clone(&dispatcher),
            collaborators.attribute_manager,
            collaborators.index_client,
            config.operation_timeout,
        );
        let fixed = FixedCapacityBackend::new(collaborators.namespace_registry);
        let attributes =
            SearchAttributeCoordinator::new(collaborators.attribute_provider, dynamic, fixed);

        let clusters = RemoteClusterRegistry::new(
            collaborators.cluster_view,
            collaborators.cluster_store,
            collaborators.remote_clusters,
            config.history_shard_count,
            config.list_clusters_page_size,
        );

        let namespaces = NamespaceDeleter::new(
            dispatcher,
            config.namespace_deletion.clone(),
            config.operation_timeout,
        );

        Self {
            phase: AtomicU8::new(LifecyclePhase::Initialized as u8),
            backend: config.backend,
            index: IndexName::new(config.index_name.clone()),
            attributes,
            clusters,
            namespaces,
        }
    }

    /// Returns the current lifecycle phase.
    pub fn phase(&self) -> LifecyclePhase {
        LifecyclePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn transition(&self, from: LifecyclePhase, to: LifecyclePhase) -> bool {
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Starts serving. Returns `false` unless the handler was `Initialized`.
    pub fn start(&self) -> bool {
        let started = self.transition(LifecyclePhase::Initialized, LifecyclePhase::Started);
        if started {
            info!(backend = %self.backend, index = %self.index, "Operator handler started");
        }
        started
    }

    /// Stops serving. Returns `false` unless the handler was `Started`.
    pub fn stop(&self) -> bool {
        let stopped = self.transition(LifecyclePhase::Started, LifecyclePhase::Stopped);
        if stopped {
            info!("Operator handler stopped");
        }
        stopped
    }

    /// Whether requests are accepted.
    pub fn serving(&self) -> bool {
        self.phase() == LifecyclePhase::Started
    }

    async fn profiled<T>(
        &self,
        operation: &'static str,
        request: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let timer = RequestTimer::start(operation);
        let span = info_span!("operator_request", operation);

        let result = async {
            ensure!(self.serving(), NotServingSnafu);
            request.await
        }
        .instrument(span)
        .await;

        if let Err(err) = &result {
            let kind = err.kind();
            metrics::record_failure(operation, kind);
            if kind.needs_investigation() {
                error!(
                    operation,
                    %kind,
                    code = %err.code(),
                    error = %err,
                    "Operator request failed"
                );
            } else {
                debug!(
                    operation,
                    %kind,
                    code = %err.code(),
                    error = %err,
                    "Operator request rejected"
                );
            }
        }
        debug!(operation, latency_secs = timer.elapsed_secs(), "Operator request finished");
        result
    }

    /// Adds custom search attributes on the configured backend and index.
    pub async fn add_search_attributes(
        &self,
        namespace: Option<&NamespaceName>,
        attributes: BTreeMap<String, IndexedValueType>,
    ) -> Result<()> {
        self.profiled(
            "add_search_attributes",
            self.attributes.add_attributes(self.backend, &self.index, namespace, attributes),
        )
        .await
    }

    /// Removes custom search attributes on the configured backend and index.
    pub async fn remove_search_attributes(
        &self,
        namespace: Option<&NamespaceName>,
        names: &[String],
    ) -> Result<()> {
        self.profiled(
            "remove_search_attributes",
            self.attributes.remove_attributes(self.backend, &self.index, namespace, names),
        )
        .await
    }

    /// Lists the search attributes visible to the caller.
    pub async fn list_search_attributes(
        &self,
        namespace: Option<&NamespaceName>,
    ) -> Result<ListedAttributes> {
        self.profiled(
            "list_search_attributes",
            self.attributes.list_attributes(self.backend, &self.index, namespace),
        )
        .await
    }

    /// Deletes a namespace and all of its executions.
    pub async fn delete_namespace(&self, namespace: &NamespaceName) -> Result<NamespaceName> {
        self.profiled("delete_namespace", self.namespaces.delete_namespace(namespace)).await
    }

    /// Registers or refreshes the peer cluster reachable at `address`.
    pub async fn add_or_update_remote_cluster(
        &self,
        address: &str,
        enable_connection: bool,
    ) -> Result<()> {
        self.profiled(
            "add_or_update_remote_cluster",
            self.clusters.add_or_update_remote_cluster(address, enable_connection),
        )
        .await
    }

    /// Removes a peer cluster.
    pub async fn remove_remote_cluster(&self, cluster_name: &ClusterName) -> Result<()> {
        self.profiled("remove_remote_cluster", self.clusters.remove_remote_cluster(cluster_name))
            .await
    }

    /// Lists persisted cluster records.
    pub async fn list_clusters(&self, page_size: i32, page_token: &[u8]) -> Result<ClusterListing> {
        self.profiled("list_clusters", self.clusters.list_clusters(page_size, page_token)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use conductor_types::ClusterInfo;

    use super::*;
    use crate::{
        error::{ErrorCode, ErrorKind},
        memory::{
            InMemoryClusterMetadataStore, InMemoryNamespaceRegistry, InMemoryRemoteClusters,
            InMemorySearchAttributes, InMemoryTaskEngine, StaticClusterView,
        },
    };

    fn handler() -> OperatorHandler {
        let config = OperatorConfig::default();
        let schema = Arc::new(InMemorySearchAttributes::new());
        let local = ClusterInfo {
            enabled: true,
            initial_failover_version: 1,
            address: "local:7233".to_string(),
            history_shard_count: 4,
        };
        let collaborators = Collaborators {
            task_engine: Arc::new(InMemoryTaskEngine::new()),
            attribute_provider: schema.clone(),
            attribute_manager: schema,
            index_client: None,
            namespace_registry: Arc::new(InMemoryNamespaceRegistry::new()),
            cluster_store: Arc::new(InMemoryClusterMetadataStore::new()),
            cluster_view: Arc::new(StaticClusterView::new(ClusterName::new("local"), 10, local)),
            remote_clusters: Arc::new(InMemoryRemoteClusters::new()),
        };
        OperatorHandler::new(&config, collaborators)
    }

    #[test]
    fn test_lifecycle_is_one_way() {
        let handler = handler();
        assert_eq!(handler.phase(), LifecyclePhase::Initialized);
        assert!(!handler.serving());
        assert!(!handler.stop());

        assert!(handler.start());
        assert!(handler.serving());
        assert!(!handler.start());

        assert!(handler.stop());
        assert_eq!(handler.phase(), LifecyclePhase::Stopped);
        assert!(!handler.start());
        assert!(!handler.serving());
    }

    #[test]
    fn test_phase_from_unknown_u8() {
        assert_eq!(LifecyclePhase::from_u8(9), LifecyclePhase::Initialized);
    }

    #[tokio::test]
    async fn test_rejects_requests_unless_started() {
        let handler = handler();
        let err = handler.list_clusters(0, &[]).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotServing);
        assert_eq!(err.kind(), ErrorKind::Unavailable);

        handler.start();
        assert!(handler.list_clusters(0, &[]).await.unwrap().clusters.is_empty());

        handler.stop();
        assert!(handler.list_clusters(0, &[]).await.is_err());
    }
}
