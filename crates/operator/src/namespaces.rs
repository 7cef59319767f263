//! Cascading namespace deletion through a durable operation.

use std::{sync::Arc, time::Duration};

use conductor_types::{
    NamespaceName, OperationId, OperationParams, OperationResult,
    config::NamespaceDeletionConfig,
};
use snafu::ensure;
use tracing::info;

use crate::{
    dispatcher::OperationDispatcher,
    error::{
        NamespaceNameEmptySnafu, OperationResultMismatchSnafu, Result,
        SystemNamespaceProtectedSnafu,
    },
};

/// Deletes namespaces by submitting a deletion operation and awaiting it.
pub struct NamespaceDeleter {
    dispatcher: Arc<OperationDispatcher>,
    config: NamespaceDeletionConfig,
    operation_timeout: Duration,
}

impl NamespaceDeleter {
    /// Creates a deleter whose operations are paced by `config`.
    pub fn new(
        dispatcher: Arc<OperationDispatcher>,
        config: NamespaceDeletionConfig,
        operation_timeout: Duration,
    ) -> Self {
        Self { dispatcher, config, operation_timeout }
    }

    /// Deletes `namespace` and every execution in it.
    ///
    /// Returns the name the engine reports as deleted.
    ///
    /// # Errors
    ///
    /// - `NamespaceNameEmpty` or `SystemNamespaceProtected` (invalid-argument)
    /// - `OperationSubmit` / `OperationTimeout` (unavailable)
    /// - `OperationFailed` (system-operation-failed) with the run identity
    pub async fn delete_namespace(&self, namespace: &NamespaceName) -> Result<NamespaceName> {
        ensure!(!namespace.is_empty(), NamespaceNameEmptySnafu);
        ensure!(
            !namespace.is_system(),
            SystemNamespaceProtectedSnafu { namespace: namespace.clone() }
        );

        let operation_id = OperationId::namespace_deletion(namespace);
        let params = OperationParams::NamespaceDeletion(self.config.params_for(namespace.clone()));
        let handle = self.dispatcher.submit(operation_id, params).await?;
        let (kind, operation_id, run_id) =
            (handle.kind, handle.operation_id.clone(), handle.run_id.clone());

        match self.dispatcher.await_outcome(handle, self.operation_timeout).await? {
            OperationResult::NamespaceDeleted(result) => {
                info!(
                    %namespace,
                    deleted_namespace = %result.deleted_namespace,
                    %run_id,
                    "Namespace deleted"
                );
                Ok(result.deleted_namespace)
            },
            OperationResult::AttributeSchemaUpdated => {
                OperationResultMismatchSnafu { kind, operation_id, run_id }.fail()
            },
        }
    }
}
