//! Error types for the operator control plane using snafu.
//!
//! [`OperatorError`] is the single caller-facing error. Each variant maps to
//! an [`ErrorKind`] that callers branch on (retry, fix the request, or
//! investigate) and a stable numeric [`ErrorCode`].
//!
//! Collaborators report failures as [`CollaboratorError`], which separates a
//! missing entity from a transient failure so coordinators can choose the
//! right kind.

// Snafu generates struct fields for context selectors that don't need documentation
#![allow(missing_docs)]

use std::{fmt, time::Duration};

use conductor_types::{
    ClusterName, IndexName, IndexedValueType, NamespaceName, OperationId, OperationKind, RunId,
    search_attribute::AliasMappingError,
};
use snafu::Snafu;

/// Result type alias for operator operations.
pub type Result<T, E = OperatorError> = std::result::Result<T, E>;

// ============================================================================
// Error Kinds
// ============================================================================

/// Stable classification of an [`OperatorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or contradictory request, capacity exceeded, invariant
    /// violation, or version conflict.
    InvalidArgument,
    /// Duplicate attribute or alias.
    AlreadyExists,
    /// Missing attribute, cluster, or namespace.
    NotFound,
    /// A collaborator is unreachable or failed transiently.
    Unavailable,
    /// A persistence write failed for reasons not attributable to the caller.
    Internal,
    /// A durable operation ran and failed.
    SystemOperationFailed,
}

impl ErrorKind {
    /// Stable name, also used as a metric label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::AlreadyExists => "already_exists",
            Self::NotFound => "not_found",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
            Self::SystemOperationFailed => "system_operation_failed",
        }
    }

    /// Whether the same request may succeed if retried.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Unavailable)
    }

    /// Whether an operator should look into the failure out of band.
    #[must_use]
    pub const fn needs_investigation(self) -> bool {
        matches!(self, Self::Internal | Self::SystemOperationFailed)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Error Codes
// ============================================================================

/// Numeric error codes, grouped by domain.
///
/// - 4000–4099: search attributes
/// - 4100–4199: remote clusters
/// - 4200–4299: namespaces and durable operations
/// - 4300–4399: request handling and lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // --- Search attributes (4000–4099) ---
    /// No attributes in the request.
    AttributesNotSet = 4000,
    /// Name reserved for the platform.
    AttributeReserved = 4001,
    /// Attribute or alias already defined.
    AttributeAlreadyExists = 4002,
    /// Unrecognized value type.
    AttributeTypeUnknown = 4003,
    /// Fixed-capacity request without a namespace.
    NamespaceNotSet = 4004,
    /// No free custom field of the requested type.
    AttributeCapacityExceeded = 4005,
    /// Attribute not defined.
    AttributeNotFound = 4006,
    /// Attribute is not custom.
    AttributeNotRemovable = 4007,
    /// Current attributes could not be read.
    AttributesUnavailable = 4008,
    /// Custom attributes could not be saved.
    AttributesSave = 4009,
    /// Alias mapping commit failed.
    AliasMappingCommit = 4010,
    /// Alias mapping invariant broken while assigning fields.
    AliasMappingInvariant = 4011,

    // --- Remote clusters (4100–4199) ---
    /// Peer could not describe itself.
    ClusterDescribe = 4100,
    /// Peer metadata violates a deployment invariant.
    ClusterInvalid = 4101,
    /// Existing record could not be read.
    ClusterLookup = 4102,
    /// Record could not be saved.
    ClusterSave = 4103,
    /// Conditional save lost to a concurrent writer.
    ClusterVersionConflict = 4104,
    /// Cluster absent from the in-memory view.
    ClusterNotFound = 4105,
    /// Record could not be deleted.
    ClusterDelete = 4106,
    /// Records could not be listed.
    ClusterList = 4107,

    // --- Namespaces and durable operations (4200–4299) ---
    /// Namespace could not be read.
    NamespaceLookup = 4200,
    /// Namespace does not exist.
    NamespaceNotFound = 4201,
    /// Namespace name missing.
    NamespaceNameEmpty = 4202,
    /// System namespace cannot be deleted.
    SystemNamespaceProtected = 4203,
    /// Task engine refused or could not take the submission.
    OperationSubmit = 4210,
    /// Durable operation failed.
    OperationFailed = 4211,
    /// Completion wait exceeded its deadline.
    OperationTimeout = 4212,
    /// Completion wait could not reach the task engine.
    OperationWait = 4213,
    /// Durable operation succeeded with an unexpected payload.
    OperationResultMismatch = 4214,

    // --- Request handling (4300–4399) ---
    /// Handler is not serving.
    NotServing = 4300,
}

impl ErrorCode {
    /// Returns the numeric code value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Converts a numeric code to an `ErrorCode`, returning `None` for unknown values.
    #[must_use]
    pub fn from_u16(code: u16) -> Option<Self> {
        ALL_ERROR_CODES.iter().copied().find(|c| c.as_u16() == code)
    }
}

/// Every error code, in numeric order.
pub const ALL_ERROR_CODES: [ErrorCode; 30] = [
    ErrorCode::AttributesNotSet,
    ErrorCode::AttributeReserved,
    ErrorCode::AttributeAlreadyExists,
    ErrorCode::AttributeTypeUnknown,
    ErrorCode::NamespaceNotSet,
    ErrorCode::AttributeCapacityExceeded,
    ErrorCode::AttributeNotFound,
    ErrorCode::AttributeNotRemovable,
    ErrorCode::AttributesUnavailable,
    ErrorCode::AttributesSave,
    ErrorCode::AliasMappingCommit,
    ErrorCode::AliasMappingInvariant,
    ErrorCode::ClusterDescribe,
    ErrorCode::ClusterInvalid,
    ErrorCode::ClusterLookup,
    ErrorCode::ClusterSave,
    ErrorCode::ClusterVersionConflict,
    ErrorCode::ClusterNotFound,
    ErrorCode::ClusterDelete,
    ErrorCode::ClusterList,
    ErrorCode::NamespaceLookup,
    ErrorCode::NamespaceNotFound,
    ErrorCode::NamespaceNameEmpty,
    ErrorCode::SystemNamespaceProtected,
    ErrorCode::OperationSubmit,
    ErrorCode::OperationFailed,
    ErrorCode::OperationTimeout,
    ErrorCode::OperationWait,
    ErrorCode::OperationResultMismatch,
    ErrorCode::NotServing,
];

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

// ============================================================================
// Collaborator Errors
// ============================================================================

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum CollaboratorError {
    /// The requested entity does not exist.
    #[snafu(display("{entity} not found"))]
    NotFound { entity: String },

    /// The collaborator could not be reached or failed transiently.
    #[snafu(display("unavailable: {message}"))]
    Unavailable { message: String },

    /// The collaborator refused the request.
    #[snafu(display("rejected: {message}"))]
    Rejected { message: String },
}

impl CollaboratorError {
    /// Checks if this is a not-found failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// ============================================================================
// Cluster Validation Errors
// ============================================================================

/// A remote cluster violates a deployment-wide invariant.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum ClusterValidationError {
    /// The peer claims the local cluster's name.
    #[snafu(display("cannot update current cluster {cluster_name} metadata from a remote call"))]
    LocalNameCollision { cluster_name: ClusterName },

    /// The peer uses a different failover version increment.
    #[snafu(display("failover version increment mismatch: local {local}, remote {remote}"))]
    FailoverIncrementMismatch { local: i64, remote: i64 },

    /// Neither shard count is a multiple of the other.
    #[snafu(display(
        "remote shard count {remote} and local shard count {local} are not multiples"
    ))]
    ShardCountMismatch { local: i32, remote: i32 },

    /// The peer cannot host global namespaces.
    #[snafu(display("global namespace is not enabled on remote cluster {cluster_name}"))]
    GlobalNamespaceDisabled { cluster_name: ClusterName },

    /// Another cluster already starts at the same failover version.
    #[snafu(display(
        "initial failover version {initial_failover_version} conflicts with cluster {existing}"
    ))]
    FailoverVersionCollision { initial_failover_version: i64, existing: ClusterName },
}

// ============================================================================
// Operator Errors
// ============================================================================

/// Caller-facing error of every operator operation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum OperatorError {
    // --- Search attributes ---
    /// No attributes in the request.
    #[snafu(display("search attributes are not set on request"))]
    AttributesNotSet,

    /// Name reserved for the platform.
    #[snafu(display("search attribute {name} is reserved by system"))]
    AttributeReserved { name: String },

    /// Attribute or alias already defined.
    #[snafu(display("search attribute {name} already exists"))]
    AttributeAlreadyExists { name: String },

    /// Unrecognized value type.
    #[snafu(display("unknown search attribute type {value_type} for {name}"))]
    AttributeTypeUnknown { name: String, value_type: IndexedValueType },

    /// Fixed-capacity request without a namespace.
    #[snafu(display("namespace is not set on request"))]
    NamespaceNotSet,

    /// No free custom field of the requested type.
    #[snafu(display(
        "unable to create search attribute {name}: cannot have more than {used} search attributes of type {value_type}"
    ))]
    AttributeCapacityExceeded { name: String, used: usize, value_type: IndexedValueType },

    /// Attribute not defined.
    #[snafu(display("search attribute {name} doesn't exist"))]
    AttributeNotFound { name: String },

    /// Attribute is not custom.
    #[snafu(display("unable to remove non-custom search attribute {name}"))]
    AttributeNotRemovable { name: String },

    /// Current attributes could not be read.
    #[snafu(display("unable to read search attributes of index {index}: {source}"))]
    AttributesUnavailable { index: IndexName, source: CollaboratorError },

    /// Custom attributes could not be saved.
    #[snafu(display("unable to save search attributes of index {index}: {source}"))]
    AttributesSave { index: IndexName, source: CollaboratorError },

    /// Alias mapping commit failed.
    #[snafu(display("unable to update alias mapping of namespace {namespace}: {source}"))]
    AliasMappingCommit { namespace: NamespaceName, source: CollaboratorError },

    /// Alias mapping invariant broken while assigning fields.
    #[snafu(display("alias mapping of namespace {namespace} is inconsistent: {source}"))]
    AliasMappingInvariant { namespace: NamespaceName, source: AliasMappingError },

    // --- Remote clusters ---
    /// Peer could not describe itself.
    #[snafu(display("unable to connect to remote cluster at {address}: {source}"))]
    ClusterDescribe { address: String, source: CollaboratorError },

    /// Peer metadata violates a deployment invariant.
    #[snafu(display("invalid remote cluster info: {source}"))]
    ClusterInvalid { source: ClusterValidationError },

    /// Existing record could not be read.
    #[snafu(display("unable to read cluster info of {cluster_name}: {source}"))]
    ClusterLookup { cluster_name: ClusterName, source: CollaboratorError },

    /// Record could not be saved.
    #[snafu(display("unable to store cluster info of {cluster_name}: {source}"))]
    ClusterSave { cluster_name: ClusterName, source: CollaboratorError },

    /// Conditional save lost to a concurrent writer.
    #[snafu(display(
        "unable to store cluster info of {cluster_name}: version {version} was advanced concurrently"
    ))]
    ClusterVersionConflict { cluster_name: ClusterName, version: i64 },

    /// Cluster absent from the in-memory view.
    #[snafu(display("cluster {cluster_name} cannot be found in clusters cache"))]
    ClusterNotFound { cluster_name: ClusterName },

    /// Record could not be deleted.
    #[snafu(display("unable to delete cluster info of {cluster_name}: {source}"))]
    ClusterDelete { cluster_name: ClusterName, source: CollaboratorError },

    /// Records could not be listed.
    #[snafu(display("unable to list clusters: {source}"))]
    ClusterList { source: CollaboratorError },

    // --- Namespaces ---
    /// Namespace could not be read.
    #[snafu(display("unable to get namespace {namespace} info: {source}"))]
    NamespaceLookup { namespace: NamespaceName, source: CollaboratorError },

    /// Namespace does not exist.
    #[snafu(display("namespace {namespace} not found"))]
    NamespaceNotFound { namespace: NamespaceName },

    /// Namespace name missing.
    #[snafu(display("namespace name is empty"))]
    NamespaceNameEmpty,

    /// System namespace cannot be deleted.
    #[snafu(display("unable to delete system namespace {namespace}"))]
    SystemNamespaceProtected { namespace: NamespaceName },

    // --- Durable operations ---
    /// Task engine refused or could not take the submission.
    #[snafu(display("unable to start {kind} operation {operation_id}: {source}"))]
    OperationSubmit { kind: OperationKind, operation_id: OperationId, source: CollaboratorError },

    /// Durable operation failed.
    #[snafu(display("{kind} operation {operation_id} (run {run_id}) failed: {cause}"))]
    OperationFailed {
        kind: OperationKind,
        operation_id: OperationId,
        run_id: RunId,
        cause: String,
    },

    /// Completion wait exceeded its deadline.
    #[snafu(display(
        "{kind} operation {operation_id} (run {run_id}) did not complete within {timeout:?}"
    ))]
    OperationTimeout {
        kind: OperationKind,
        operation_id: OperationId,
        run_id: RunId,
        timeout: Duration,
    },

    /// Completion wait could not reach the task engine.
    #[snafu(display(
        "unable to await {kind} operation {operation_id} (run {run_id}): {source}"
    ))]
    OperationWait {
        kind: OperationKind,
        operation_id: OperationId,
        run_id: RunId,
        source: CollaboratorError,
    },

    /// Durable operation succeeded with an unexpected payload.
    #[snafu(display(
        "{kind} operation {operation_id} (run {run_id}) returned an unexpected result"
    ))]
    OperationResultMismatch { kind: OperationKind, operation_id: OperationId, run_id: RunId },

    // --- Request handling ---
    /// Handler is not serving.
    #[snafu(display("operator handler is not serving"))]
    NotServing,
}

impl OperatorError {
    /// Returns the stable classification.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::AttributesNotSet
            | Self::AttributeReserved { .. }
            | Self::AttributeTypeUnknown { .. }
            | Self::NamespaceNotSet
            | Self::AttributeCapacityExceeded { .. }
            | Self::AttributeNotRemovable { .. }
            | Self::ClusterInvalid { .. }
            | Self::ClusterVersionConflict { .. }
            | Self::NamespaceNameEmpty
            | Self::SystemNamespaceProtected { .. } => ErrorKind::InvalidArgument,
            Self::AttributeAlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::AttributeNotFound { .. }
            | Self::ClusterNotFound { .. }
            | Self::NamespaceNotFound { .. } => ErrorKind::NotFound,
            Self::AttributesUnavailable { .. }
            | Self::AttributesSave { .. }
            | Self::AliasMappingCommit { .. }
            | Self::ClusterDescribe { .. }
            | Self::ClusterList { .. }
            | Self::NamespaceLookup { .. }
            | Self::OperationSubmit { .. }
            | Self::OperationTimeout { .. }
            | Self::OperationWait { .. }
            | Self::NotServing => ErrorKind::Unavailable,
            Self::AliasMappingInvariant { .. }
            | Self::ClusterLookup { .. }
            | Self::ClusterSave { .. }
            | Self::ClusterDelete { .. }
            | Self::OperationResultMismatch { .. } => ErrorKind::Internal,
            Self::OperationFailed { .. } => ErrorKind::SystemOperationFailed,
        }
    }

    /// Returns the numeric error code.
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::AttributesNotSet => ErrorCode::AttributesNotSet,
            Self::AttributeReserved { .. } => ErrorCode::AttributeReserved,
            Self::AttributeAlreadyExists { .. } => ErrorCode::AttributeAlreadyExists,
            Self::AttributeTypeUnknown { .. } => ErrorCode::AttributeTypeUnknown,
            Self::NamespaceNotSet => ErrorCode::NamespaceNotSet,
            Self::AttributeCapacityExceeded { .. } => ErrorCode::AttributeCapacityExceeded,
            Self::AttributeNotFound { .. } => ErrorCode::AttributeNotFound,
            Self::AttributeNotRemovable { .. } => ErrorCode::AttributeNotRemovable,
            Self::AttributesUnavailable { .. } => ErrorCode::AttributesUnavailable,
            Self::AttributesSave { .. } => ErrorCode::AttributesSave,
            Self::AliasMappingCommit { .. } => ErrorCode::AliasMappingCommit,
            Self::AliasMappingInvariant { .. } => ErrorCode::AliasMappingInvariant,
            Self::ClusterDescribe { .. } => ErrorCode::ClusterDescribe,
            Self::ClusterInvalid { .. } => ErrorCode::ClusterInvalid,
            Self::ClusterLookup { .. } => ErrorCode::ClusterLookup,
            Self::ClusterSave { .. } => ErrorCode::ClusterSave,
            Self::ClusterVersionConflict { .. } => ErrorCode::ClusterVersionConflict,
            Self::ClusterNotFound { .. } => ErrorCode::ClusterNotFound,
            Self::ClusterDelete { .. } => ErrorCode::ClusterDelete,
            Self::ClusterList { .. } => ErrorCode::ClusterList,
            Self::NamespaceLookup { .. } => ErrorCode::NamespaceLookup,
            Self::NamespaceNotFound { .. } => ErrorCode::NamespaceNotFound,
            Self::NamespaceNameEmpty => ErrorCode::NamespaceNameEmpty,
            Self::SystemNamespaceProtected { .. } => ErrorCode::SystemNamespaceProtected,
            Self::OperationSubmit { .. } => ErrorCode::OperationSubmit,
            Self::OperationFailed { .. } => ErrorCode::OperationFailed,
            Self::OperationTimeout { .. } => ErrorCode::OperationTimeout,
            Self::OperationWait { .. } => ErrorCode::OperationWait,
            Self::OperationResultMismatch { .. } => ErrorCode::OperationResultMismatch,
            Self::NotServing => ErrorCode::NotServing,
        }
    }

    /// Whether the same request may succeed if retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Whether an operator should look into the failure out of band.
    #[must_use]
    pub const fn needs_investigation(&self) -> bool {
        self.kind().needs_investigation()
    }
}

impl From<OperatorError> for tonic::Status {
    fn from(err: OperatorError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::InvalidArgument => tonic::Status::invalid_argument(message),
            ErrorKind::AlreadyExists => tonic::Status::already_exists(message),
            ErrorKind::NotFound => tonic::Status::not_found(message),
            ErrorKind::Unavailable => tonic::Status::unavailable(message),
            ErrorKind::Internal => tonic::Status::internal(message),
            ErrorKind::SystemOperationFailed => {
                tonic::Status::internal(format!("system operation failed: {message}"))
            },
        }
    }
}
