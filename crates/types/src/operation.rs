//! Durable operations executed by the external task engine.
//!
//! ## Operation Kinds
//!
//! - **AttributeSchemaUpdate**: adds custom fields to a dynamic-mapping index
//! - **NamespaceDeletion**: deletes every execution of a namespace, then the namespace itself
//!
//! The engine owns durability. This crate only describes what is submitted,
//! how a submission is identified, and what a run resolves to.

use std::{collections::BTreeMap, fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    search_attribute::IndexedValueType,
    types::{IndexName, NamespaceName, OperationId, RunId},
};

/// Fixed id of the schema update operation.
///
/// One id per cluster means a second submission while a migration is running
/// attaches to, or is rejected by, the in-flight run instead of racing it.
pub const ATTRIBUTE_SCHEMA_UPDATE_ID: &str = "add-search-attributes";

/// Id prefix of namespace deletion operations.
pub const NAMESPACE_DELETION_ID_PREFIX: &str = "delete-namespace";

/// Kind of durable operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Schema migration on a dynamic-mapping index.
    AttributeSchemaUpdate,
    /// Cascading namespace deletion.
    NamespaceDeletion,
}

impl OperationKind {
    /// Stable name, also used as a metric label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AttributeSchemaUpdate => "attribute_schema_update",
            Self::NamespaceDeletion => "namespace_deletion",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OperationId {
    /// Deterministic id of the schema update operation.
    pub fn attribute_schema_update() -> Self {
        Self::new(ATTRIBUTE_SCHEMA_UPDATE_ID)
    }

    /// Deterministic id of the deletion operation for `namespace`.
    ///
    /// Pattern: `delete-namespace/{namespace}`
    pub fn namespace_deletion(namespace: &NamespaceName) -> Self {
        Self::new(format!("{NAMESPACE_DELETION_ID_PREFIX}/{namespace}"))
    }
}

// =============================================================================
// Parameters
// =============================================================================

/// Input for a schema update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSchemaUpdateParams {
    /// Custom attributes to add, by name.
    pub custom_attributes_to_add: BTreeMap<String, IndexedValueType>,
    /// Index whose schema is updated.
    pub index_name: IndexName,
    /// Only record the attributes, leaving the physical schema untouched.
    pub skip_schema_update: bool,
}

/// Pacing of the execution cleanup phase of a namespace deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteExecutionsConfig {
    /// Maximum delete calls per second.
    pub delete_activity_rps: u32,
    /// Executions listed per page.
    pub page_size: u32,
    /// Pages processed before the cleanup continues as a new run.
    pub pages_per_execution: u32,
    /// Parallel delete activities.
    pub concurrent_delete_executions_activities: u32,
}

/// Input for a namespace deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceDeletionParams {
    /// Namespace to delete.
    pub namespace: NamespaceName,
    /// Execution cleanup pacing.
    pub delete_executions: DeleteExecutionsConfig,
    /// Wait before the namespace record is irrevocably removed.
    pub namespace_delete_delay: Duration,
}

/// Parameters of a submission; the variant determines the operation kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationParams {
    /// Schema update input.
    AttributeSchemaUpdate(AttributeSchemaUpdateParams),
    /// Namespace deletion input.
    NamespaceDeletion(NamespaceDeletionParams),
}

impl OperationParams {
    /// The kind of operation these parameters start.
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::AttributeSchemaUpdate(_) => OperationKind::AttributeSchemaUpdate,
            Self::NamespaceDeletion(_) => OperationKind::NamespaceDeletion,
        }
    }
}

// =============================================================================
// Results
// =============================================================================

/// Summary of a completed namespace deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceDeletionResult {
    /// Name of the namespace actually deleted.
    ///
    /// The engine renames a namespace before removing it, so this can differ
    /// from the requested name.
    pub deleted_namespace: NamespaceName,
}

/// Typed payload of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationResult {
    /// The schema now contains the requested fields.
    AttributeSchemaUpdated,
    /// The namespace was deleted.
    NamespaceDeleted(NamespaceDeletionResult),
}

/// State of a submitted run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationOutcome {
    /// Submitted, not yet resolved.
    Pending,
    /// Finished successfully.
    Succeeded(OperationResult),
    /// Ran and failed.
    Failed {
        /// Failure reported by the engine.
        cause: String,
    },
}

/// Handle to a submitted durable operation.
///
/// Returned by submission with a `Pending` outcome and resolved when the
/// completion wait returns. Never persisted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationHandle {
    /// Operation kind.
    pub kind: OperationKind,
    /// Deterministic operation id.
    pub operation_id: OperationId,
    /// Engine-assigned run id.
    pub run_id: RunId,
    /// When the submission was accepted.
    pub submitted_at: DateTime<Utc>,
    /// Current outcome.
    pub outcome: OperationOutcome,
}

impl OperationHandle {
    /// Creates a pending handle for an accepted submission.
    pub fn pending(kind: OperationKind, operation_id: OperationId, run_id: RunId) -> Self {
        Self {
            kind,
            operation_id,
            run_id,
            submitted_at: Utc::now(),
            outcome: OperationOutcome::Pending,
        }
    }

    /// Time since the submission was accepted.
    ///
    /// Zero if the wall clock moved backwards.
    pub fn elapsed(&self) -> Duration {
        (Utc::now() - self.submitted_at).to_std().unwrap_or_default()
    }

    /// Checks if the run has not been resolved yet.
    pub fn is_pending(&self) -> bool {
        matches!(self.outcome, OperationOutcome::Pending)
    }

    /// Records the terminal outcome.
    #[must_use]
    pub fn resolve(mut self, outcome: OperationOutcome) -> Self {
        self.outcome = outcome;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_ids_are_deterministic() {
        assert_eq!(OperationId::attribute_schema_update().as_str(), "add-search-attributes");
        let ns = NamespaceName::new("orders");
        assert_eq!(OperationId::namespace_deletion(&ns).as_str(), "delete-namespace/orders");
        assert_eq!(OperationId::namespace_deletion(&ns), OperationId::namespace_deletion(&ns));
    }

    #[test]
    fn test_params_kind() {
        let params = OperationParams::AttributeSchemaUpdate(AttributeSchemaUpdateParams {
            custom_attributes_to_add: BTreeMap::new(),
            index_name: IndexName::new("idx"),
            skip_schema_update: false,
        });
        assert_eq!(params.kind(), OperationKind::AttributeSchemaUpdate);
        assert_eq!(params.kind().to_string(), "attribute_schema_update");
    }

    #[test]
    fn test_handle_lifecycle() {
        let handle = OperationHandle::pending(
            OperationKind::NamespaceDeletion,
            OperationId::new("delete-namespace/orders"),
            RunId::new("run-1"),
        );
        assert!(handle.is_pending());
        assert!(handle.elapsed() < Duration::from_secs(60));

        let resolved = handle.resolve(OperationOutcome::Failed { cause: "boom".to_string() });
        assert!(!resolved.is_pending());
        assert_eq!(resolved.run_id.as_str(), "run-1");
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = OperationOutcome::Succeeded(OperationResult::NamespaceDeleted(
            NamespaceDeletionResult { deleted_namespace: NamespaceName::new("orders-deleted-1") },
        ));
        let json = serde_json::to_vec(&outcome).unwrap();
        let back: OperationOutcome = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, outcome);
    }
}
