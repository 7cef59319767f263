//! Configuration presets for tests.

use std::time::Duration;

use conductor_types::{BackendKind, config::OperatorConfig};

/// Index name used by test configurations.
pub const TEST_INDEX: &str = "test_visibility";

/// Task queue used by test configurations.
pub const TEST_TASK_QUEUE: &str = "test-worker-tq";

/// Returns an operator configuration for `backend` suited to tests.
///
/// - `history_shard_count`: 4
/// - `list_clusters_page_size`: 2 (forces paging with few records)
/// - `operation_timeout`: 2s
#[must_use]
pub fn test_operator_config(backend: BackendKind) -> OperatorConfig {
    OperatorConfig {
        history_shard_count: 4,
        list_clusters_page_size: 2,
        operation_timeout: Duration::from_secs(2),
        backend,
        index_name: TEST_INDEX.to_string(),
        task_queue: TEST_TASK_QUEUE.to_string(),
        namespace_deletion: Default::default(),
    }
}
