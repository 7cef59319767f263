//! Contracts of the external collaborators the coordinators depend on.
//!
//! Every collaborator is injected at construction as an `Arc<dyn Trait>`.
//! None of them is reached through global state, and the coordinators keep
//! no shared mutable state of their own.

use std::collections::BTreeMap;

use conductor_types::{
    AliasMapping, ClusterDescription, ClusterInfo, ClusterMetadata, ClusterMetadataRecord,
    ClusterName, IndexName, IndexedValueType, NameTypeMap, NamespaceName, OperationId,
    OperationOutcome, OperationParams, RunId,
};

use crate::error::CollaboratorError;

// =============================================================================
// Durable Task Engine
// =============================================================================

/// A durable operation handed to the task engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    /// Deterministic operation id.
    pub operation_id: OperationId,
    /// Queue the engine schedules the operation on.
    pub task_queue: String,
    /// Typed parameters; they determine the operation kind.
    pub params: OperationParams,
}

/// External engine that runs durable operations.
#[tonic::async_trait]
pub trait TaskEngine: Send + Sync {
    /// Starts an operation and returns the run id the engine assigned to it.
    async fn submit(&self, request: SubmitRequest) -> Result<RunId, CollaboratorError>;

    /// Waits for the run to reach a terminal outcome.
    ///
    /// Returns `Err` only when the engine cannot be asked. A run that
    /// finished unsuccessfully is `Ok(OperationOutcome::Failed { .. })`.
    async fn await_completion(
        &self,
        operation_id: &OperationId,
        run_id: &RunId,
    ) -> Result<OperationOutcome, CollaboratorError>;
}

// =============================================================================
// Cluster Metadata
// =============================================================================

/// One page of persisted cluster records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterPage {
    /// Records on this page.
    pub records: Vec<ClusterMetadataRecord>,
    /// Opaque token for the next page; empty when this is the last one.
    pub next_page_token: Vec<u8>,
}

/// Persistence of cluster metadata with optimistic-version writes.
#[tonic::async_trait]
pub trait ClusterMetadataStore: Send + Sync {
    /// Reads the record of `cluster_name`.
    ///
    /// Returns [`CollaboratorError::NotFound`] if it was never saved.
    async fn get(&self, cluster_name: &ClusterName)
    -> Result<ClusterMetadataRecord, CollaboratorError>;

    /// Saves `metadata` if the stored version still equals `expected_version`.
    ///
    /// An absent record is at version 0. Returns `Ok(false)` when a concurrent
    /// writer advanced the version first. An applied save stores
    /// `expected_version + 1`.
    async fn save(
        &self,
        metadata: ClusterMetadata,
        expected_version: i64,
    ) -> Result<bool, CollaboratorError>;

    /// Deletes the record of `cluster_name`.
    async fn delete(&self, cluster_name: &ClusterName) -> Result<(), CollaboratorError>;

    /// Lists records in pages of at most `page_size`.
    async fn list(&self, page_size: i32, page_token: &[u8])
    -> Result<ClusterPage, CollaboratorError>;
}

/// Client able to ask a peer cluster to describe itself.
#[tonic::async_trait]
pub trait RemoteClusterClient: Send + Sync {
    /// Fetches the self-description of the cluster serving `address`.
    async fn describe_cluster(&self, address: &str)
    -> Result<ClusterDescription, CollaboratorError>;
}

/// Read-only in-memory view of the deployment held by every node.
///
/// Refreshed out of band, so it may lag persisted state.
pub trait ClusterMetadataView: Send + Sync {
    /// Name of the local cluster.
    fn current_cluster_name(&self) -> ClusterName;

    /// Failover version increment shared by the deployment.
    fn failover_version_increment(&self) -> i64;

    /// Every known cluster, the local one included.
    fn all_cluster_info(&self) -> BTreeMap<ClusterName, ClusterInfo>;
}

// =============================================================================
// Search Attributes
// =============================================================================

/// Source of the current attribute schema of an index.
#[tonic::async_trait]
pub trait SearchAttributeProvider: Send + Sync {
    /// Returns the attributes defined for `index`.
    ///
    /// With `include_custom` unset, the custom partition is left empty.
    async fn get_search_attributes(
        &self,
        index: &IndexName,
        include_custom: bool,
    ) -> Result<NameTypeMap, CollaboratorError>;
}

/// Writer of the custom attribute set of a dynamic-mapping index.
#[tonic::async_trait]
pub trait SearchAttributeManager: Send + Sync {
    /// Replaces the custom attributes of `index`.
    async fn save_search_attributes(
        &self,
        index: &IndexName,
        custom: BTreeMap<String, IndexedValueType>,
    ) -> Result<(), CollaboratorError>;
}

/// Client of the dynamic-mapping search index.
#[tonic::async_trait]
pub trait IndexClient: Send + Sync {
    /// Returns the raw physical schema of `index`, field name to storage type.
    async fn get_mapping(&self, index: &IndexName)
    -> Result<BTreeMap<String, String>, CollaboratorError>;
}

// =============================================================================
// Namespaces
// =============================================================================

/// Namespace configuration as seen by the coordinators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDescriptor {
    /// Namespace name.
    pub name: NamespaceName,
    /// Namespace identifier.
    pub id: String,
    /// Alias mapping of the fixed-capacity backend.
    pub alias_mapping: AliasMapping,
}

/// Namespace configuration storage.
#[tonic::async_trait]
pub trait NamespaceRegistry: Send + Sync {
    /// Reads a namespace.
    ///
    /// Returns [`CollaboratorError::NotFound`] if it does not exist.
    async fn get_namespace(
        &self,
        namespace: &NamespaceName,
    ) -> Result<NamespaceDescriptor, CollaboratorError>;

    /// Atomically replaces the alias mapping of a namespace.
    async fn update_alias_mapping(
        &self,
        namespace: &NamespaceName,
        mapping: AliasMapping,
    ) -> Result<(), CollaboratorError>;
}
