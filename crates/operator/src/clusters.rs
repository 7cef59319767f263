//! Remote cluster registry for multi-region deployments.
//!
//! A peer is registered by asking it to describe itself, checking the
//! description against the deployment invariants, and saving it with a
//! conditional write keyed on the last-observed record version.
//!
//! The invariant checks run against the in-memory cluster view and are
//! best-effort: two peers registered concurrently with the same initial
//! failover version can both pass. The conditional write is the only
//! authoritative guard, and it only protects a single cluster name.

use std::{collections::BTreeMap, sync::Arc};

use conductor_types::{
    ClusterDescription, ClusterInfo, ClusterMetadata, ClusterName, ClusterSummary,
    cluster::INITIAL_RECORD_VERSION,
};
use snafu::{ResultExt, ensure};
use tracing::{debug, info, warn};

use crate::{
    collaborators::{ClusterMetadataStore, ClusterMetadataView, RemoteClusterClient},
    error::{
        ClusterDeleteSnafu, ClusterDescribeSnafu, ClusterInvalidSnafu, ClusterListSnafu,
        ClusterLookupSnafu, ClusterNotFoundSnafu, ClusterSaveSnafu, ClusterValidationError,
        ClusterVersionConflictSnafu, FailoverIncrementMismatchSnafu,
        FailoverVersionCollisionSnafu, GlobalNamespaceDisabledSnafu, LocalNameCollisionSnafu,
        Result, ShardCountMismatchSnafu,
    },
};

/// Local cluster facts a candidate peer is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalClusterFacts<'a> {
    /// Name of the local cluster.
    pub cluster_name: &'a ClusterName,
    /// Failover version increment of the deployment.
    pub failover_version_increment: i64,
    /// History shard count of the local cluster.
    pub history_shard_count: i32,
}

/// Checks a candidate peer against the deployment invariants.
///
/// Checks run in a fixed order and the first violation is returned:
/// local name collision, increment mismatch, shard counts that are not
/// multiples, global namespaces disabled, initial failover version collision
/// with a differently named cluster in `known`.
///
/// # Errors
///
/// Returns the [`ClusterValidationError`] describing the violation.
pub fn validate_remote_cluster(
    candidate: &ClusterDescription,
    local: LocalClusterFacts<'_>,
    known: &BTreeMap<ClusterName, ClusterInfo>,
) -> std::result::Result<(), ClusterValidationError> {
    ensure!(
        candidate.cluster_name != *local.cluster_name,
        LocalNameCollisionSnafu { cluster_name: candidate.cluster_name.clone() }
    );
    ensure!(
        candidate.failover_version_increment == local.failover_version_increment,
        FailoverIncrementMismatchSnafu {
            local: local.failover_version_increment,
            remote: candidate.failover_version_increment,
        }
    );
    ensure!(
        shard_counts_compatible(local.history_shard_count, candidate.history_shard_count),
        ShardCountMismatchSnafu {
            local: local.history_shard_count,
            remote: candidate.history_shard_count,
        }
    );
    ensure!(
        candidate.is_global_namespace_enabled,
        GlobalNamespaceDisabledSnafu { cluster_name: candidate.cluster_name.clone() }
    );

    let collision = known.iter().find(|(name, info)| {
        **name != candidate.cluster_name
            && info.initial_failover_version == candidate.initial_failover_version
    });
    if let Some((existing, _)) = collision {
        return FailoverVersionCollisionSnafu {
            initial_failover_version: candidate.initial_failover_version,
            existing: existing.clone(),
        }
        .fail();
    }
    Ok(())
}

/// Whether the larger shard count is an exact multiple of the smaller.
///
/// Non-positive counts are never compatible.
pub fn shard_counts_compatible(a: i32, b: i32) -> bool {
    if a <= 0 || b <= 0 {
        return false;
    }
    let (small, large) = if a <= b { (a, b) } else { (b, a) };
    large % small == 0
}

/// One page of the cluster listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterListing {
    /// Projected records.
    pub clusters: Vec<ClusterSummary>,
    /// Token for the next page; empty on the last page.
    pub next_page_token: Vec<u8>,
}

/// Registers, removes, and lists peer clusters.
pub struct RemoteClusterRegistry {
    view: Arc<dyn ClusterMetadataView>,
    store: Arc<dyn ClusterMetadataStore>,
    remote: Arc<dyn RemoteClusterClient>,
    local_shard_count: i32,
    default_page_size: i32,
}

impl RemoteClusterRegistry {
    /// Creates a registry for a local cluster running `local_shard_count` shards.
    pub fn new(
        view: Arc<dyn ClusterMetadataView>,
        store: Arc<dyn ClusterMetadataStore>,
        remote: Arc<dyn RemoteClusterClient>,
        local_shard_count: i32,
        default_page_size: i32,
    ) -> Self {
        Self { view, store, remote, local_shard_count, default_page_size }
    }

    /// Adds a peer cluster, or refreshes a known one, from its self-description.
    ///
    /// The caller-supplied `address` is stored instead of whatever address
    /// the peer reports.
    ///
    /// # Errors
    ///
    /// - `ClusterDescribe` (unavailable) if the peer cannot be reached
    /// - `ClusterInvalid` (invalid-argument) if an invariant is violated
    /// - `ClusterLookup` (internal) if the existing record cannot be read
    /// - `ClusterSave` (internal) if the conditional save fails
    /// - `ClusterVersionConflict` (invalid-argument) if a concurrent writer
    ///   advanced the version first
    pub async fn add_or_update_remote_cluster(
        &self,
        address: &str,
        enable_connection: bool,
    ) -> Result<()> {
        let description = self
            .remote
            .describe_cluster(address)
            .await
            .context(ClusterDescribeSnafu { address })?;
        let cluster_name = description.cluster_name.clone();

        let local_name = self.view.current_cluster_name();
        let local = LocalClusterFacts {
            cluster_name: &local_name,
            failover_version_increment: self.view.failover_version_increment(),
            history_shard_count: self.local_shard_count,
        };
        validate_remote_cluster(&description, local, &self.view.all_cluster_info())
            .context(ClusterInvalidSnafu)?;
        debug!(%cluster_name, address, "Remote cluster metadata validated");

        let version = match self.store.get(&cluster_name).await {
            Ok(record) => record.version,
            Err(source) if source.is_not_found() => INITIAL_RECORD_VERSION,
            Err(source) => {
                return Err(source).context(ClusterLookupSnafu { cluster_name });
            },
        };

        let metadata = ClusterMetadata::from_description(description, address, enable_connection);
        let applied = self
            .store
            .save(metadata, version)
            .await
            .context(ClusterSaveSnafu { cluster_name: cluster_name.clone() })?;
        if !applied {
            warn!(%cluster_name, version, "Conditional cluster save rejected by concurrent writer");
            return ClusterVersionConflictSnafu { cluster_name, version }.fail();
        }

        info!(%cluster_name, address, version, enable_connection, "Remote cluster saved");
        Ok(())
    }

    /// Removes a peer cluster known to the in-memory view.
    ///
    /// # Errors
    ///
    /// - `ClusterNotFound` if the view does not know the cluster; the store
    ///   is not called
    /// - `ClusterDelete` (internal) if the record cannot be deleted
    pub async fn remove_remote_cluster(&self, cluster_name: &ClusterName) -> Result<()> {
        ensure!(
            self.view.all_cluster_info().contains_key(cluster_name),
            ClusterNotFoundSnafu { cluster_name: cluster_name.clone() }
        );

        self.store
            .delete(cluster_name)
            .await
            .context(ClusterDeleteSnafu { cluster_name: cluster_name.clone() })?;

        info!(%cluster_name, "Remote cluster removed");
        Ok(())
    }

    /// Lists persisted cluster records, one page at a time.
    ///
    /// A non-positive `page_size` is replaced by the configured default.
    pub async fn list_clusters(&self, page_size: i32, page_token: &[u8]) -> Result<ClusterListing> {
        let page_size = if page_size <= 0 { self.default_page_size } else { page_size };
        let page = self.store.list(page_size, page_token).await.context(ClusterListSnafu)?;

        Ok(ClusterListing {
            clusters: page.records.iter().map(ClusterSummary::from).collect(),
            next_page_token: page.next_page_token,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn local_name() -> ClusterName {
        ClusterName::new("us-east")
    }

    fn known() -> BTreeMap<ClusterName, ClusterInfo> {
        [(
            local_name(),
            ClusterInfo {
                enabled: true,
                initial_failover_version: 1,
                address: "local:7233".to_string(),
                history_shard_count: 4,
            },
        )]
        .into_iter()
        .collect()
    }

    fn candidate() -> ClusterDescription {
        ClusterDescription {
            cluster_name: ClusterName::new("eu-west"),
            cluster_id: "c-2".to_string(),
            history_shard_count: 8,
            failover_version_increment: 10,
            initial_failover_version: 2,
            is_global_namespace_enabled: true,
        }
    }

    fn check(candidate: &ClusterDescription) -> std::result::Result<(), ClusterValidationError> {
        let name = local_name();
        let local = LocalClusterFacts {
            cluster_name: &name,
            failover_version_increment: 10,
            history_shard_count: 4,
        };
        validate_remote_cluster(candidate, local, &known())
    }

    #[test]
    fn test_valid_candidate() {
        check(&candidate()).unwrap();
    }

    #[test]
    fn test_local_name_collision() {
        let mut c = candidate();
        c.cluster_name = local_name();
        assert!(matches!(check(&c), Err(ClusterValidationError::LocalNameCollision { .. })));
    }

    #[test]
    fn test_increment_mismatch() {
        let mut c = candidate();
        c.failover_version_increment = 100;
        assert!(matches!(
            check(&c),
            Err(ClusterValidationError::FailoverIncrementMismatch { local: 10, remote: 100 })
        ));
    }

    #[test]
    fn test_shard_counts_must_be_multiples() {
        let mut c = candidate();
        c.history_shard_count = 7;
        assert!(matches!(check(&c), Err(ClusterValidationError::ShardCountMismatch { .. })));
        c.history_shard_count = 2;
        check(&c).unwrap();
        c.history_shard_count = 4;
        check(&c).unwrap();
    }

    #[test]
    fn test_shard_count_compatibility() {
        assert!(shard_counts_compatible(4, 8));
        assert!(shard_counts_compatible(8, 4));
        assert!(shard_counts_compatible(4, 4));
        assert!(!shard_counts_compatible(4, 7));
        assert!(!shard_counts_compatible(4, 6));
        assert!(!shard_counts_compatible(4, 0));
        assert!(!shard_counts_compatible(-4, 4));
    }

    #[test]
    fn test_global_namespace_required() {
        let mut c = candidate();
        c.is_global_namespace_enabled = false;
        assert!(matches!(check(&c), Err(ClusterValidationError::GlobalNamespaceDisabled { .. })));
    }

    #[test]
    fn test_failover_version_collision_with_other_cluster() {
        let mut c = candidate();
        c.initial_failover_version = 1;
        let err = check(&c).unwrap_err();
        assert!(err.to_string().contains("us-east"));
    }

    #[test]
    fn test_own_prior_entry_does_not_collide() {
        let name = local_name();
        let local = LocalClusterFacts {
            cluster_name: &name,
            failover_version_increment: 10,
            history_shard_count: 4,
        };
        let mut view = known();
        view.insert(
            ClusterName::new("eu-west"),
            ClusterInfo {
                enabled: false,
                initial_failover_version: 2,
                address: "old:7233".to_string(),
                history_shard_count: 8,
            },
        );
        validate_remote_cluster(&candidate(), local, &view).unwrap();
    }

    #[test]
    fn test_checks_run_in_order() {
        // Both the increment and the shard count are wrong; the increment is reported.
        let mut c = candidate();
        c.failover_version_increment = 5;
        c.history_shard_count = 7;
        assert!(matches!(
            check(&c),
            Err(ClusterValidationError::FailoverIncrementMismatch { .. })
        ));
    }
}
