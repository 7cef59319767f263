//! Cluster metadata for multi-region deployments.
//!
//! Every cluster in a global deployment is described by a
//! [`ClusterMetadata`] record keyed by its name. Records are persisted with an
//! optimistic-concurrency version. An absent record is observed at version 0,
//! and every conditional save that supplies the last-observed version stores
//! that version plus one, so the first applied save stores version 1.

use serde::{Deserialize, Serialize};

use crate::types::ClusterName;

/// Version supplied when saving a cluster that has never been persisted.
pub const INITIAL_RECORD_VERSION: i64 = 0;

/// Self-description returned by a peer cluster.
///
/// Carries everything needed to register the peer except its address, which
/// always comes from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDescription {
    /// The peer's unique name.
    pub cluster_name: ClusterName,
    /// The peer's opaque identifier.
    pub cluster_id: String,
    /// Number of history shards the peer runs.
    pub history_shard_count: i32,
    /// Step between failover versions; must agree across the deployment.
    pub failover_version_increment: i64,
    /// The peer's starting failover version; unique across the deployment.
    pub initial_failover_version: i64,
    /// Whether the peer can host global namespaces.
    pub is_global_namespace_enabled: bool,
}

/// Persisted metadata for one cluster, without its version token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMetadata {
    /// Unique key.
    pub cluster_name: ClusterName,
    /// Opaque identifier.
    pub cluster_id: String,
    /// Frontend address used to reach the cluster.
    pub address: String,
    /// Number of history shards.
    pub history_shard_count: i32,
    /// Step between failover versions.
    pub failover_version_increment: i64,
    /// Starting failover version.
    pub initial_failover_version: i64,
    /// Whether the cluster can host global namespaces.
    pub is_global_namespace_enabled: bool,
    /// Whether replication connections to the cluster are enabled.
    pub is_connection_enabled: bool,
}

impl ClusterMetadata {
    /// Builds the metadata to persist for a described peer.
    ///
    /// The caller-supplied `address` replaces whatever the peer believes its
    /// address to be.
    pub fn from_description(
        description: ClusterDescription,
        address: impl Into<String>,
        enable_connection: bool,
    ) -> Self {
        Self {
            cluster_name: description.cluster_name,
            cluster_id: description.cluster_id,
            address: address.into(),
            history_shard_count: description.history_shard_count,
            failover_version_increment: description.failover_version_increment,
            initial_failover_version: description.initial_failover_version,
            is_global_namespace_enabled: description.is_global_namespace_enabled,
            is_connection_enabled: enable_connection,
        }
    }
}

/// A persisted cluster record together with its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMetadataRecord {
    /// The stored metadata.
    pub metadata: ClusterMetadata,
    /// Version token; supply it to the next conditional save.
    pub version: i64,
}

/// Entry of the in-memory cluster view kept by every node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// Whether replication to the cluster is enabled.
    pub enabled: bool,
    /// Starting failover version.
    pub initial_failover_version: i64,
    /// Frontend address.
    pub address: String,
    /// Number of history shards.
    pub history_shard_count: i32,
}

impl From<&ClusterMetadata> for ClusterInfo {
    fn from(metadata: &ClusterMetadata) -> Self {
        Self {
            enabled: metadata.is_connection_enabled,
            initial_failover_version: metadata.initial_failover_version,
            address: metadata.address.clone(),
            history_shard_count: metadata.history_shard_count,
        }
    }
}

/// Operator-facing projection of a cluster record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// Cluster name.
    pub cluster_name: ClusterName,
    /// Cluster identifier.
    pub cluster_id: String,
    /// Frontend address.
    pub address: String,
    /// Starting failover version.
    pub initial_failover_version: i64,
    /// Number of history shards.
    pub history_shard_count: i32,
    /// Whether replication connections are enabled.
    pub is_connection_enabled: bool,
}

impl From<&ClusterMetadataRecord> for ClusterSummary {
    fn from(record: &ClusterMetadataRecord) -> Self {
        let m = &record.metadata;
        Self {
            cluster_name: m.cluster_name.clone(),
            cluster_id: m.cluster_id.clone(),
            address: m.address.clone(),
            initial_failover_version: m.initial_failover_version,
            history_shard_count: m.history_shard_count,
            is_connection_enabled: m.is_connection_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description() -> ClusterDescription {
        ClusterDescription {
            cluster_name: ClusterName::new("eu-west"),
            cluster_id: "c-2".to_string(),
            history_shard_count: 8,
            failover_version_increment: 10,
            initial_failover_version: 2,
            is_global_namespace_enabled: true,
        }
    }

    #[test]
    fn test_metadata_uses_caller_address() {
        let metadata = ClusterMetadata::from_description(description(), "10.0.0.2:7233", false);
        assert_eq!(metadata.address, "10.0.0.2:7233");
        assert_eq!(metadata.cluster_name.as_str(), "eu-west");
        assert!(!metadata.is_connection_enabled);
        assert_eq!(metadata.initial_failover_version, 2);
    }

    #[test]
    fn test_summary_projection() {
        let record = ClusterMetadataRecord {
            metadata: ClusterMetadata::from_description(description(), "peer:7233", true),
            version: 3,
        };
        let summary = ClusterSummary::from(&record);
        assert_eq!(summary.cluster_id, "c-2");
        assert_eq!(summary.history_shard_count, 8);
        assert!(summary.is_connection_enabled);
    }

    #[test]
    fn test_cluster_info_from_metadata() {
        let metadata = ClusterMetadata::from_description(description(), "peer:7233", true);
        let info = ClusterInfo::from(&metadata);
        assert!(info.enabled);
        assert_eq!(info.initial_failover_version, 2);
        assert_eq!(info.address, "peer:7233");
    }
}
