//! Two-phase dispatch of durable operations to the task engine.
//!
//! [`OperationDispatcher::submit`] hands the operation to the engine and
//! returns a pending [`OperationHandle`]. [`OperationDispatcher::await_outcome`]
//! consumes the handle and waits, up to a caller-chosen deadline, for the
//! engine to report a terminal outcome. A deadline only abandons the wait;
//! the engine keeps running the operation.

use std::{sync::Arc, time::Duration};

use conductor_types::{
    OperationHandle, OperationId, OperationOutcome, OperationParams, OperationResult,
};
use snafu::ResultExt;
use tracing::{info, warn};

use crate::{
    collaborators::{SubmitRequest, TaskEngine},
    error::{
        OperationFailedSnafu, OperationSubmitSnafu, OperationTimeoutSnafu, OperationWaitSnafu,
        Result,
    },
    metrics,
};

/// Submits durable operations and reconciles their outcomes.
pub struct OperationDispatcher {
    engine: Arc<dyn TaskEngine>,
    task_queue: String,
}

impl OperationDispatcher {
    /// Creates a dispatcher submitting to `task_queue`.
    pub fn new(engine: Arc<dyn TaskEngine>, task_queue: impl Into<String>) -> Self {
        Self { engine, task_queue: task_queue.into() }
    }

    /// Hands an operation to the task engine.
    ///
    /// The kind is taken from `params`. Resubmitting the same id and kind is
    /// idempotent to the extent the engine deduplicates ids.
    ///
    /// # Errors
    ///
    /// Returns `OperationSubmit` (unavailable) if the engine does not accept
    /// the submission.
    pub async fn submit(
        &self,
        operation_id: OperationId,
        params: OperationParams,
    ) -> Result<OperationHandle> {
        let kind = params.kind();
        let request = SubmitRequest {
            operation_id: operation_id.clone(),
            task_queue: self.task_queue.clone(),
            params,
        };

        let run_id = match self.engine.submit(request).await {
            Ok(run_id) => run_id,
            Err(source) => {
                metrics::record_durable_operation(kind, "submit_failed");
                warn!(%kind, %operation_id, error = %source, "Durable operation submission failed");
                return Err(source).context(OperationSubmitSnafu { kind, operation_id });
            },
        };

        info!(
            %kind,
            %operation_id,
            %run_id,
            task_queue = %self.task_queue,
            "Durable operation submitted"
        );
        Ok(OperationHandle::pending(kind, operation_id, run_id))
    }

    /// Waits up to `deadline` for the engine to resolve `handle`.
    ///
    /// Returns the handle carrying the terminal outcome, which may be a
    /// failed run.
    ///
    /// # Errors
    ///
    /// - `OperationTimeout` (unavailable) if the deadline passed first, or
    ///   the engine returned without a terminal outcome
    /// - `OperationWait` (unavailable) if the engine could not be asked
    pub async fn wait_for_completion(
        &self,
        handle: OperationHandle,
        deadline: Duration,
    ) -> Result<OperationHandle> {
        let waited = tokio::time::timeout(
            deadline,
            self.engine.await_completion(&handle.operation_id, &handle.run_id),
        )
        .await;

        let OperationHandle { kind, ref operation_id, ref run_id, .. } = handle;
        let outcome = match waited {
            Ok(Ok(OperationOutcome::Pending)) | Err(_) => {
                metrics::record_durable_operation(kind, "timed_out");
                warn!(
                    %kind,
                    %operation_id,
                    %run_id,
                    ?deadline,
                    "Stopped waiting for durable operation"
                );
                return OperationTimeoutSnafu {
                    kind,
                    operation_id: operation_id.clone(),
                    run_id: run_id.clone(),
                    timeout: deadline,
                }
                .fail();
            },
            Ok(Ok(outcome)) => outcome,
            Ok(Err(source)) => {
                return Err(source).context(OperationWaitSnafu {
                    kind,
                    operation_id: operation_id.clone(),
                    run_id: run_id.clone(),
                });
            },
        };

        let handle = handle.resolve(outcome);
        metrics::record_durable_operation_duration(kind, handle.elapsed().as_secs_f64());
        Ok(handle)
    }

    /// Waits up to `deadline` for a submitted operation to finish.
    ///
    /// # Errors
    ///
    /// - `OperationFailed` (system-operation-failed) if the run failed; it
    ///   carries kind, id, and run id
    /// - `OperationTimeout` / `OperationWait` as for
    ///   [`wait_for_completion`](Self::wait_for_completion)
    pub async fn await_outcome(
        &self,
        handle: OperationHandle,
        deadline: Duration,
    ) -> Result<OperationResult> {
        let handle = self.wait_for_completion(handle, deadline).await?;
        let elapsed = handle.elapsed();
        let OperationHandle { kind, operation_id, run_id, outcome, .. } = handle;

        match outcome {
            OperationOutcome::Succeeded(result) => {
                metrics::record_durable_operation(kind, "succeeded");
                info!(%kind, %operation_id, %run_id, ?elapsed, "Durable operation completed");
                Ok(result)
            },
            OperationOutcome::Failed { cause } => {
                metrics::record_durable_operation(kind, "failed");
                warn!(%kind, %operation_id, %run_id, ?elapsed, %cause, "Durable operation failed");
                OperationFailedSnafu { kind, operation_id, run_id, cause }.fail()
            },
            OperationOutcome::Pending => {
                metrics::record_durable_operation(kind, "timed_out");
                OperationTimeoutSnafu { kind, operation_id, run_id, timeout: deadline }.fail()
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::BTreeMap;

    use conductor_types::{IndexName, OperationKind, operation::AttributeSchemaUpdateParams};

    use super::*;
    use crate::{error::ErrorKind, memory::InMemoryTaskEngine};

    fn schema_params() -> OperationParams {
        OperationParams::AttributeSchemaUpdate(AttributeSchemaUpdateParams {
            custom_attributes_to_add: BTreeMap::new(),
            index_name: IndexName::new("idx"),
            skip_schema_update: false,
        })
    }

    #[tokio::test]
    async fn test_submit_returns_pending_handle() {
        let engine = Arc::new(InMemoryTaskEngine::new());
        let dispatcher = OperationDispatcher::new(engine.clone(), "tq");

        let handle = dispatcher
            .submit(OperationId::attribute_schema_update(), schema_params())
            .await
            .unwrap();

        assert!(handle.is_pending());
        assert_eq!(handle.kind, OperationKind::AttributeSchemaUpdate);
        let submitted = engine.submissions();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].task_queue, "tq");
    }

    #[tokio::test]
    async fn test_submit_failure_is_unavailable() {
        let engine = Arc::new(InMemoryTaskEngine::new());
        engine.fail_next_submits(1);
        let dispatcher = OperationDispatcher::new(engine, "tq");

        let err = dispatcher
            .submit(OperationId::attribute_schema_update(), schema_params())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(err.to_string().contains("attribute_schema_update"));
    }

    #[tokio::test]
    async fn test_failed_run_carries_identity() {
        let engine = Arc::new(InMemoryTaskEngine::new());
        engine.set_outcome(
            OperationId::attribute_schema_update(),
            OperationOutcome::Failed { cause: "mapping rejected".to_string() },
        );
        let dispatcher = OperationDispatcher::new(engine, "tq");

        let handle = dispatcher
            .submit(OperationId::attribute_schema_update(), schema_params())
            .await
            .unwrap();
        let run_id = handle.run_id.clone();
        let err = dispatcher.await_outcome(handle, Duration::from_secs(5)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SystemOperationFailed);
        let message = err.to_string();
        assert!(message.contains("add-search-attributes"));
        assert!(message.contains(run_id.as_str()));
        assert!(message.contains("mapping rejected"));
    }

    #[tokio::test]
    async fn test_wait_resolves_handle() {
        let engine = Arc::new(InMemoryTaskEngine::new());
        engine.set_outcome(
            OperationId::attribute_schema_update(),
            OperationOutcome::Failed { cause: "mapping rejected".to_string() },
        );
        let dispatcher = OperationDispatcher::new(engine, "tq");

        let handle = dispatcher
            .submit(OperationId::attribute_schema_update(), schema_params())
            .await
            .unwrap();
        let run_id = handle.run_id.clone();
        let resolved =
            dispatcher.wait_for_completion(handle, Duration::from_secs(5)).await.unwrap();

        assert!(!resolved.is_pending());
        assert_eq!(resolved.run_id, run_id);
        assert_eq!(
            resolved.outcome,
            OperationOutcome::Failed { cause: "mapping rejected".to_string() }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_abandons_wait_only() {
        let engine = Arc::new(InMemoryTaskEngine::new());
        engine.hold_completion(OperationId::attribute_schema_update());
        let dispatcher = OperationDispatcher::new(engine.clone(), "tq");

        let handle = dispatcher
            .submit(OperationId::attribute_schema_update(), schema_params())
            .await
            .unwrap();
        let err = dispatcher.await_outcome(handle, Duration::from_secs(1)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(matches!(err, crate::error::OperatorError::OperationTimeout { .. }));
        assert_eq!(
            engine.run_outcome(&OperationId::attribute_schema_update()),
            Some(OperationOutcome::Pending)
        );
    }
}
