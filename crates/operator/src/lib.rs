//! Operator control plane for Conductor.
//!
//! This crate coordinates the administrative operations of a cluster:
//!
//! - Search attribute schema management across dynamic-mapping and
//!   fixed-capacity visibility backends
//! - Remote cluster registration with optimistic-version conditional saves
//! - Durable operation dispatch with two-phase submit and await
//! - Cascading namespace deletion through a durable operation
//!
//! External systems are reached through the traits in [`collaborators`];
//! [`memory`] implements all of them in memory for tests and embedding.

#![deny(unsafe_code)]

pub mod clusters;
pub mod collaborators;
pub mod config;
pub mod dispatcher;
pub mod error;
mod handler;
pub mod logging;
pub mod memory;
pub mod metrics;
pub mod namespaces;
pub mod search_attributes;

pub use crate::config::{LoadError, LoadOperatorConfig};
pub use clusters::{ClusterListing, RemoteClusterRegistry};
pub use dispatcher::OperationDispatcher;
pub use error::{CollaboratorError, ErrorCode, ErrorKind, OperatorError, Result};
pub use handler::{Collaborators, LifecyclePhase, OperatorHandler};
pub use logging::{LogFormat, init_logging};
pub use namespaces::NamespaceDeleter;
pub use search_attributes::{ListedAttributes, SearchAttributeCoordinator};
