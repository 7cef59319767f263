//! In-memory deployment shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use conductor_operator::{
    Collaborators, OperatorHandler,
    collaborators::ClusterMetadataStore,
    memory::{
        InMemoryClusterMetadataStore, InMemoryIndexClient, InMemoryNamespaceRegistry,
        InMemoryRemoteClusters, InMemorySearchAttributes, InMemoryTaskEngine, StaticClusterView,
    },
};
use conductor_test_utils::{TEST_INDEX, test_operator_config};
use conductor_types::{
    BackendKind, ClusterDescription, ClusterInfo, ClusterName, IndexName, NamespaceName,
    config::OperatorConfig, search_attribute::fixed_capacity_custom_fields,
};

/// Name of the local cluster.
pub const LOCAL_CLUSTER: &str = "local";
/// Failover version increment shared by the deployment.
pub const INCREMENT: i64 = 10;
/// Initial failover version of the local cluster.
pub const LOCAL_FAILOVER_VERSION: i64 = 1;

/// A started handler together with the collaborators behind it.
pub struct Harness {
    pub config: OperatorConfig,
    pub handler: Arc<OperatorHandler>,
    pub engine: Arc<InMemoryTaskEngine>,
    pub schema: Arc<InMemorySearchAttributes>,
    pub index_client: Arc<InMemoryIndexClient>,
    pub namespaces: Arc<InMemoryNamespaceRegistry>,
    pub store: Arc<InMemoryClusterMetadataStore>,
    pub view: Arc<StaticClusterView>,
    pub remotes: Arc<InMemoryRemoteClusters>,
    collaborators: Collaborators,
}

impl Harness {
    /// Fixed-capacity deployment with the default custom fields and a
    /// namespace named `orders`.
    pub fn fixed_capacity() -> Self {
        let harness = Self::with_config(test_operator_config(BackendKind::FixedCapacity));
        harness.schema.set_custom(&index(), fixed_capacity_custom_fields());
        harness.namespaces.add_namespace(&orders());
        harness
    }

    /// Dynamic-mapping deployment with no custom attributes.
    pub fn dynamic_mapping() -> Self {
        Self::with_config(test_operator_config(BackendKind::DynamicMapping))
    }

    pub fn with_config(config: OperatorConfig) -> Self {
        let schema = Arc::new(InMemorySearchAttributes::new());
        let engine = Arc::new(InMemoryTaskEngine::new().with_schema_store(schema.clone()));
        let index_client = Arc::new(InMemoryIndexClient::new());
        let namespaces = Arc::new(InMemoryNamespaceRegistry::new());
        let store = Arc::new(InMemoryClusterMetadataStore::new());
        let view = Arc::new(StaticClusterView::new(
            ClusterName::new(LOCAL_CLUSTER),
            INCREMENT,
            ClusterInfo {
                enabled: true,
                initial_failover_version: LOCAL_FAILOVER_VERSION,
                address: "local:7233".to_string(),
                history_shard_count: config.history_shard_count,
            },
        ));
        let remotes = Arc::new(InMemoryRemoteClusters::new());

        let collaborators = Collaborators {
            task_engine: engine.clone(),
            attribute_provider: schema.clone(),
            attribute_manager: schema.clone(),
            index_client: Some(index_client.clone()),
            namespace_registry: namespaces.clone(),
            cluster_store: store.clone(),
            cluster_view: view.clone(),
            remote_clusters: remotes.clone(),
        };
        let handler = Arc::new(start(&config, collaborators.clone()));

        Self {
            config,
            handler,
            engine,
            schema,
            index_client,
            namespaces,
            store,
            view,
            remotes,
            collaborators,
        }
    }

    /// Builds a started handler whose cluster store is `store`.
    pub fn handler_with_store(&self, store: Arc<dyn ClusterMetadataStore>) -> OperatorHandler {
        let collaborators = Collaborators { cluster_store: store, ..self.collaborators.clone() };
        start(&self.config, collaborators)
    }

    /// Reloads the cluster view from the store, as a metadata refresh would.
    pub fn refresh_view(&self) {
        self.view.refresh_from(&self.store.records());
    }

    /// Makes a peer reachable at `{name}:7233` and returns the address.
    pub fn add_peer(&self, description: ClusterDescription) -> String {
        let address = format!("{}:7233", description.cluster_name);
        self.remotes.add_peer(address.clone(), description);
        address
    }
}

fn start(config: &OperatorConfig, collaborators: Collaborators) -> OperatorHandler {
    let handler = OperatorHandler::new(config, collaborators);
    assert!(handler.start());
    handler
}

pub fn index() -> IndexName {
    IndexName::new(TEST_INDEX)
}

pub fn orders() -> NamespaceName {
    NamespaceName::new("orders")
}

/// A valid peer description against the harness's local cluster.
pub fn peer(
    name: &str,
    history_shard_count: i32,
    initial_failover_version: i64,
) -> ClusterDescription {
    ClusterDescription {
        cluster_name: ClusterName::new(name),
        cluster_id: format!("id-{name}"),
        history_shard_count,
        failover_version_increment: INCREMENT,
        initial_failover_version,
        is_global_namespace_enabled: true,
    }
}
