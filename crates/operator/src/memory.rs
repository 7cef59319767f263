//! In-memory collaborators for tests and embedding.
//!
//! # Features
//!
//! - **Full contracts**: every collaborator trait, including the conditional
//!   versioned save of cluster metadata
//! - **Failure injection**: make the next N calls of a kind fail with
//!   `Unavailable`
//! - **Call recording**: inspect submissions, saves, and deletes
//!
//! The task engine completes runs immediately unless told otherwise, and can
//! apply schema updates to a shared [`InMemorySearchAttributes`] so that
//! dynamic-mapping additions become visible to later listings.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use conductor_types::{
    AliasMapping, ClusterDescription, ClusterInfo, ClusterMetadata, ClusterMetadataRecord,
    ClusterName, IndexName, IndexedValueType, NameTypeMap, NamespaceName, OperationId,
    OperationOutcome, OperationParams, OperationResult, RunId,
    operation::NamespaceDeletionResult,
    search_attribute::system_attributes,
};
use parking_lot::{Mutex, RwLock};

use crate::{
    collaborators::{
        ClusterMetadataStore, ClusterMetadataView, ClusterPage, IndexClient, NamespaceDescriptor,
        NamespaceRegistry, RemoteClusterClient, SearchAttributeManager, SearchAttributeProvider,
        SubmitRequest, TaskEngine,
    },
    error::CollaboratorError,
};

// =============================================================================
// Failure Injection
// =============================================================================

/// Countdown of injected failures.
#[derive(Debug, Default)]
pub struct FailureInjector {
    remaining: AtomicUsize,
}

impl FailureInjector {
    /// Makes the next `count` checks fail.
    pub fn inject(&self, count: usize) {
        self.remaining.store(count, Ordering::SeqCst);
    }

    /// Consumes one injected failure, if any is left.
    fn should_fail(&self) -> bool {
        loop {
            let current = self.remaining.load(Ordering::SeqCst);
            if current == 0 {
                return false;
            }
            if self
                .remaining
                .compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Returns an injected `Unavailable` error for `call`, if one is pending.
    pub fn check(&self, call: &str) -> Result<(), CollaboratorError> {
        if self.should_fail() {
            return Err(CollaboratorError::Unavailable {
                message: format!("injected {call} failure"),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Task Engine
// =============================================================================

#[derive(Debug, Clone)]
struct Run {
    run_id: RunId,
    params: OperationParams,
    outcome: OperationOutcome,
}

#[derive(Debug, Default)]
struct EngineState {
    submissions: Vec<SubmitRequest>,
    scripted: HashMap<OperationId, OperationOutcome>,
    held: HashSet<OperationId>,
    runs: HashMap<OperationId, Run>,
}

/// Task engine that resolves runs in memory.
///
/// A run succeeds with the natural result of its parameters unless an
/// outcome was scripted for its operation id, or its completion is held.
#[derive(Default)]
pub struct InMemoryTaskEngine {
    state: Mutex<EngineState>,
    schema: Option<Arc<InMemorySearchAttributes>>,
    submit_failures: FailureInjector,
    wait_failures: FailureInjector,
}

impl InMemoryTaskEngine {
    /// Creates an engine with no scripted behavior.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies successful schema updates to `schema`.
    #[must_use]
    pub fn with_schema_store(mut self, schema: Arc<InMemorySearchAttributes>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Makes the next `count` submissions fail.
    pub fn fail_next_submits(&self, count: usize) {
        self.submit_failures.inject(count);
    }

    /// Makes the next `count` completion waits fail.
    pub fn fail_next_waits(&self, count: usize) {
        self.wait_failures.inject(count);
    }

    /// Scripts the outcome of runs of `operation_id`.
    pub fn set_outcome(&self, operation_id: OperationId, outcome: OperationOutcome) {
        self.state.lock().scripted.insert(operation_id, outcome);
    }

    /// Keeps runs of `operation_id` pending forever.
    pub fn hold_completion(&self, operation_id: OperationId) {
        self.state.lock().held.insert(operation_id);
    }

    /// Returns every accepted submission, oldest first.
    pub fn submissions(&self) -> Vec<SubmitRequest> {
        self.state.lock().submissions.clone()
    }

    /// Returns the run id of the latest run of `operation_id`.
    pub fn run_id(&self, operation_id: &OperationId) -> Option<RunId> {
        self.state.lock().runs.get(operation_id).map(|run| run.run_id.clone())
    }

    /// Returns the outcome of the latest run of `operation_id`.
    pub fn run_outcome(&self, operation_id: &OperationId) -> Option<OperationOutcome> {
        self.state.lock().runs.get(operation_id).map(|run| run.outcome.clone())
    }

    fn natural_result(params: &OperationParams) -> OperationResult {
        match params {
            OperationParams::AttributeSchemaUpdate(_) => OperationResult::AttributeSchemaUpdated,
            OperationParams::NamespaceDeletion(p) => {
                OperationResult::NamespaceDeleted(NamespaceDeletionResult {
                    deleted_namespace: p.namespace.clone(),
                })
            },
        }
    }
}

#[tonic::async_trait]
impl TaskEngine for InMemoryTaskEngine {
    async fn submit(&self, request: SubmitRequest) -> Result<RunId, CollaboratorError> {
        self.submit_failures.check("submit")?;

        let run_id = RunId::new(uuid::Uuid::new_v4().to_string());
        let mut state = self.state.lock();
        state.runs.insert(
            request.operation_id.clone(),
            Run {
                run_id: run_id.clone(),
                params: request.params.clone(),
                outcome: OperationOutcome::Pending,
            },
        );
        state.submissions.push(request);
        Ok(run_id)
    }

    async fn await_completion(
        &self,
        operation_id: &OperationId,
        run_id: &RunId,
    ) -> Result<OperationOutcome, CollaboratorError> {
        self.wait_failures.check("await")?;

        let resolved = {
            let mut state = self.state.lock();
            if state.held.contains(operation_id) {
                None
            } else {
                let scripted = state.scripted.get(operation_id).cloned();
                let run = state
                    .runs
                    .get_mut(operation_id)
                    .filter(|run| run.run_id == *run_id)
                    .ok_or_else(|| CollaboratorError::NotFound {
                        entity: format!("run {run_id} of {operation_id}"),
                    })?;
                let outcome = scripted.unwrap_or_else(|| {
                    OperationOutcome::Succeeded(Self::natural_result(&run.params))
                });
                run.outcome = outcome.clone();
                Some((outcome, run.params.clone()))
            }
        };

        let Some((outcome, params)) = resolved else {
            return std::future::pending().await;
        };

        if let (
            OperationOutcome::Succeeded(_),
            OperationParams::AttributeSchemaUpdate(update),
            Some(schema),
        ) = (&outcome, &params, &self.schema)
        {
            schema.extend_custom(&update.index_name, update.custom_attributes_to_add.clone());
        }
        Ok(outcome)
    }
}

// =============================================================================
// Search Attributes
// =============================================================================

/// Attribute schemas per index.
///
/// Every index carries the platform system attributes. Custom attributes
/// start empty unless provisioned.
#[derive(Default)]
pub struct InMemorySearchAttributes {
    custom: RwLock<HashMap<IndexName, BTreeMap<String, IndexedValueType>>>,
    read_failures: FailureInjector,
    save_failures: FailureInjector,
    saves: AtomicUsize,
}

impl InMemorySearchAttributes {
    /// Creates a store with no custom attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the custom attributes of `index`.
    pub fn set_custom(&self, index: &IndexName, custom: BTreeMap<String, IndexedValueType>) {
        self.custom.write().insert(index.clone(), custom);
    }

    /// Adds custom attributes to `index`.
    pub fn extend_custom(&self, index: &IndexName, added: BTreeMap<String, IndexedValueType>) {
        self.custom.write().entry(index.clone()).or_default().extend(added);
    }

    /// Returns the custom attributes of `index`.
    pub fn custom(&self, index: &IndexName) -> BTreeMap<String, IndexedValueType> {
        self.custom.read().get(index).cloned().unwrap_or_default()
    }

    /// Makes the next `count` reads fail.
    pub fn fail_next_reads(&self, count: usize) {
        self.read_failures.inject(count);
    }

    /// Makes the next `count` saves fail.
    pub fn fail_next_saves(&self, count: usize) {
        self.save_failures.inject(count);
    }

    /// Number of applied saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[tonic::async_trait]
impl SearchAttributeProvider for InMemorySearchAttributes {
    async fn get_search_attributes(
        &self,
        index: &IndexName,
        include_custom: bool,
    ) -> Result<NameTypeMap, CollaboratorError> {
        self.read_failures.check("get_search_attributes")?;
        let custom = if include_custom { self.custom(index) } else { BTreeMap::new() };
        Ok(NameTypeMap::new(system_attributes(), custom))
    }
}

#[tonic::async_trait]
impl SearchAttributeManager for InMemorySearchAttributes {
    async fn save_search_attributes(
        &self,
        index: &IndexName,
        custom: BTreeMap<String, IndexedValueType>,
    ) -> Result<(), CollaboratorError> {
        self.save_failures.check("save_search_attributes")?;
        self.set_custom(index, custom);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Index client serving fixed mappings.
#[derive(Default)]
pub struct InMemoryIndexClient {
    mappings: RwLock<HashMap<IndexName, BTreeMap<String, String>>>,
    failures: FailureInjector,
}

impl InMemoryIndexClient {
    /// Creates a client with no mappings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the physical mapping of `index`.
    pub fn set_mapping(&self, index: &IndexName, mapping: BTreeMap<String, String>) {
        self.mappings.write().insert(index.clone(), mapping);
    }

    /// Makes the next `count` calls fail.
    pub fn fail_next(&self, count: usize) {
        self.failures.inject(count);
    }
}

#[tonic::async_trait]
impl IndexClient for InMemoryIndexClient {
    async fn get_mapping(
        &self,
        index: &IndexName,
    ) -> Result<BTreeMap<String, String>, CollaboratorError> {
        self.failures.check("get_mapping")?;
        self.mappings
            .read()
            .get(index)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound { entity: format!("index {index}") })
    }
}

// =============================================================================
// Namespaces
// =============================================================================

/// Namespace registry holding descriptors in memory.
#[derive(Default)]
pub struct InMemoryNamespaceRegistry {
    namespaces: RwLock<HashMap<NamespaceName, NamespaceDescriptor>>,
    lookup_failures: FailureInjector,
    update_failures: FailureInjector,
    updates: AtomicUsize,
}

impl InMemoryNamespaceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a namespace with an empty alias mapping.
    pub fn add_namespace(&self, namespace: &NamespaceName) {
        self.namespaces.write().insert(
            namespace.clone(),
            NamespaceDescriptor {
                name: namespace.clone(),
                id: uuid::Uuid::new_v4().to_string(),
                alias_mapping: AliasMapping::new(),
            },
        );
    }

    /// Returns the alias mapping of `namespace`.
    pub fn alias_mapping(&self, namespace: &NamespaceName) -> Option<AliasMapping> {
        self.namespaces.read().get(namespace).map(|d| d.alias_mapping.clone())
    }

    /// Makes the next `count` lookups fail.
    pub fn fail_next_lookups(&self, count: usize) {
        self.lookup_failures.inject(count);
    }

    /// Makes the next `count` mapping updates fail.
    pub fn fail_next_updates(&self, count: usize) {
        self.update_failures.inject(count);
    }

    /// Number of applied mapping updates.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[tonic::async_trait]
impl NamespaceRegistry for InMemoryNamespaceRegistry {
    async fn get_namespace(
        &self,
        namespace: &NamespaceName,
    ) -> Result<NamespaceDescriptor, CollaboratorError> {
        self.lookup_failures.check("get_namespace")?;
        self.namespaces
            .read()
            .get(namespace)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound { entity: format!("namespace {namespace}") })
    }

    async fn update_alias_mapping(
        &self,
        namespace: &NamespaceName,
        mapping: AliasMapping,
    ) -> Result<(), CollaboratorError> {
        self.update_failures.check("update_alias_mapping")?;
        let mut namespaces = self.namespaces.write();
        let descriptor = namespaces.get_mut(namespace).ok_or_else(|| {
            CollaboratorError::NotFound { entity: format!("namespace {namespace}") }
        })?;
        descriptor.alias_mapping = mapping;
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Clusters
// =============================================================================

/// Cluster metadata store with optimistic-version conditional saves.
#[derive(Default)]
pub struct InMemoryClusterMetadataStore {
    records: Mutex<BTreeMap<ClusterName, ClusterMetadataRecord>>,
    get_failures: FailureInjector,
    save_failures: FailureInjector,
    delete_failures: FailureInjector,
    deletes: AtomicUsize,
}

impl InMemoryClusterMetadataStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record of `cluster_name`.
    pub fn record(&self, cluster_name: &ClusterName) -> Option<ClusterMetadataRecord> {
        self.records.lock().get(cluster_name).cloned()
    }

    /// Returns every record ordered by name.
    pub fn records(&self) -> Vec<ClusterMetadataRecord> {
        self.records.lock().values().cloned().collect()
    }

    /// Makes the next `count` reads fail.
    pub fn fail_next_gets(&self, count: usize) {
        self.get_failures.inject(count);
    }

    /// Makes the next `count` saves fail.
    pub fn fail_next_saves(&self, count: usize) {
        self.save_failures.inject(count);
    }

    /// Makes the next `count` deletes fail.
    pub fn fail_next_deletes(&self, count: usize) {
        self.delete_failures.inject(count);
    }

    /// Number of delete calls received, failed ones included.
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[tonic::async_trait]
impl ClusterMetadataStore for InMemoryClusterMetadataStore {
    async fn get(
        &self,
        cluster_name: &ClusterName,
    ) -> Result<ClusterMetadataRecord, CollaboratorError> {
        self.get_failures.check("get_cluster_metadata")?;
        self.record(cluster_name).ok_or_else(|| CollaboratorError::NotFound {
            entity: format!("cluster {cluster_name}"),
        })
    }

    async fn save(
        &self,
        metadata: ClusterMetadata,
        expected_version: i64,
    ) -> Result<bool, CollaboratorError> {
        self.save_failures.check("save_cluster_metadata")?;

        let mut records = self.records.lock();
        let stored = records.get(&metadata.cluster_name).map_or(0, |r| r.version);
        if stored != expected_version {
            return Ok(false);
        }
        records.insert(
            metadata.cluster_name.clone(),
            ClusterMetadataRecord { metadata, version: expected_version + 1 },
        );
        Ok(true)
    }

    async fn delete(&self, cluster_name: &ClusterName) -> Result<(), CollaboratorError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.delete_failures.check("delete_cluster_metadata")?;
        self.records.lock().remove(cluster_name);
        Ok(())
    }

    async fn list(
        &self,
        page_size: i32,
        page_token: &[u8],
    ) -> Result<ClusterPage, CollaboratorError> {
        let after = String::from_utf8(page_token.to_vec()).map_err(|_| {
            CollaboratorError::Rejected { message: "malformed page token".to_string() }
        })?;
        let page_size = usize::try_from(page_size.max(1)).unwrap_or(1);

        let records = self.records.lock();
        let mut remaining = records
            .iter()
            .filter(|(name, _)| after.is_empty() || name.as_str() > after.as_str())
            .map(|(_, record)| record);

        let page: Vec<ClusterMetadataRecord> =
            remaining.by_ref().take(page_size).cloned().collect();
        let next_page_token = match (remaining.next(), page.last()) {
            (Some(_), Some(last)) => last.metadata.cluster_name.as_str().as_bytes().to_vec(),
            _ => Vec::new(),
        };
        Ok(ClusterPage { records: page, next_page_token })
    }
}

/// Peer clusters reachable by address.
#[derive(Default)]
pub struct InMemoryRemoteClusters {
    peers: RwLock<HashMap<String, ClusterDescription>>,
}

impl InMemoryRemoteClusters {
    /// Creates a client that reaches no peers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `description` reachable at `address`.
    pub fn add_peer(&self, address: impl Into<String>, description: ClusterDescription) {
        self.peers.write().insert(address.into(), description);
    }
}

#[tonic::async_trait]
impl RemoteClusterClient for InMemoryRemoteClusters {
    async fn describe_cluster(
        &self,
        address: &str,
    ) -> Result<ClusterDescription, CollaboratorError> {
        self.peers.read().get(address).cloned().ok_or_else(|| CollaboratorError::Unavailable {
            message: format!("no cluster listening at {address}"),
        })
    }
}

/// Cluster view over explicitly set cluster info.
pub struct StaticClusterView {
    current_cluster_name: ClusterName,
    failover_version_increment: i64,
    clusters: RwLock<BTreeMap<ClusterName, ClusterInfo>>,
}

impl StaticClusterView {
    /// Creates a view containing only the local cluster.
    pub fn new(
        current_cluster_name: ClusterName,
        failover_version_increment: i64,
        local: ClusterInfo,
    ) -> Self {
        let clusters = BTreeMap::from([(current_cluster_name.clone(), local)]);
        Self { current_cluster_name, failover_version_increment, clusters: RwLock::new(clusters) }
    }

    /// Adds or replaces a cluster.
    pub fn insert(&self, cluster_name: ClusterName, info: ClusterInfo) {
        self.clusters.write().insert(cluster_name, info);
    }

    /// Reloads every remote cluster from persisted records, keeping the local one.
    pub fn refresh_from(&self, records: &[ClusterMetadataRecord]) {
        let mut clusters = self.clusters.write();
        clusters.retain(|name, _| *name == self.current_cluster_name);
        for record in records {
            clusters.insert(
                record.metadata.cluster_name.clone(),
                ClusterInfo::from(&record.metadata),
            );
        }
    }
}

impl ClusterMetadataView for StaticClusterView {
    fn current_cluster_name(&self) -> ClusterName {
        self.current_cluster_name.clone()
    }

    fn failover_version_increment(&self) -> i64 {
        self.failover_version_increment
    }

    fn all_cluster_info(&self) -> BTreeMap<ClusterName, ClusterInfo> {
        self.clusters.read().clone()
    }
}
