//! Domain types and configuration for the Conductor operator control plane.
//!
//! This crate provides the foundational types shared by the operator:
//! - Newtype identifiers for indexes, namespaces, clusters, and operations
//! - Search attribute value types, system attributes, and alias mappings
//! - Cluster metadata records and their projections
//! - Durable operation parameters, handles, and outcomes
//! - Validated configuration with fallible builders

pub mod cluster;
pub mod config;
pub mod operation;
pub mod search_attribute;
pub mod types;

// Re-export commonly used types at crate root
pub use cluster::{
    ClusterDescription, ClusterInfo, ClusterMetadata, ClusterMetadataRecord, ClusterSummary,
};
pub use operation::{
    OperationHandle, OperationKind, OperationOutcome, OperationParams, OperationResult,
};
pub use search_attribute::{AliasMapping, BackendKind, IndexedValueType, NameTypeMap};
pub use types::*;
