//! Operator service and namespace deletion configuration.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::{
    operation::{DeleteExecutionsConfig, NamespaceDeletionParams},
    search_attribute::BackendKind,
    types::NamespaceName,
};

/// Minimum wait for a durable operation to complete.
const MIN_OPERATION_TIMEOUT: Duration = Duration::from_secs(1);

/// Maximum executions listed per deletion page.
const MAX_DELETE_PAGE_SIZE: u32 = 1000;

/// Maximum parallel delete activities.
const MAX_CONCURRENT_DELETE_ACTIVITIES: u32 = 256;

// =============================================================================
// Namespace Deletion Configuration
// =============================================================================

fn default_delete_activity_rps() -> u32 {
    100
}

fn default_delete_page_size() -> u32 {
    1000
}

fn default_pages_per_execution() -> u32 {
    256
}

fn default_concurrent_delete_activities() -> u32 {
    4
}

fn default_namespace_delete_delay() -> Duration {
    Duration::ZERO
}

/// Pacing of cascading namespace deletions.
///
/// Copied verbatim into the parameters of every deletion operation.
///
/// # Example
///
/// ```no_run
/// # use std::time::Duration;
/// # use conductor_types::config::NamespaceDeletionConfig;
/// let config = NamespaceDeletionConfig::builder()
///     .delete_activity_rps(50)
///     .namespace_delete_delay(Duration::from_secs(24 * 3600))
///     .build()
///     .expect("valid namespace deletion config");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NamespaceDeletionConfig {
    /// Maximum delete calls per second.
    ///
    /// Must be > 0.
    #[serde(default = "default_delete_activity_rps")]
    pub delete_activity_rps: u32,
    /// Executions listed per page.
    ///
    /// Must be in 1..=1000.
    #[serde(default = "default_delete_page_size")]
    pub page_size: u32,
    /// Pages processed before the cleanup continues as a new run.
    ///
    /// Must be > 0.
    #[serde(default = "default_pages_per_execution")]
    pub pages_per_execution: u32,
    /// Parallel delete activities.
    ///
    /// Must be in 1..=256.
    #[serde(default = "default_concurrent_delete_activities")]
    pub concurrent_delete_executions_activities: u32,
    /// Wait before the namespace record is removed.
    #[serde(default = "default_namespace_delete_delay")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub namespace_delete_delay: Duration,
}

#[bon::bon]
impl NamespaceDeletionConfig {
    /// Creates a new namespace deletion configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    #[builder]
    pub fn new(
        #[builder(default = default_delete_activity_rps())] delete_activity_rps: u32,
        #[builder(default = default_delete_page_size())] page_size: u32,
        #[builder(default = default_pages_per_execution())] pages_per_execution: u32,
        #[builder(default = default_concurrent_delete_activities())]
        concurrent_delete_executions_activities: u32,
        #[builder(default = default_namespace_delete_delay())] namespace_delete_delay: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            delete_activity_rps,
            page_size,
            pages_per_execution,
            concurrent_delete_executions_activities,
            namespace_delete_delay,
        };
        config.validate()?;
        Ok(config)
    }
}

impl NamespaceDeletionConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delete_activity_rps == 0 {
            return Err(ConfigError::Validation {
                message: "delete_activity_rps must be > 0".to_string(),
            });
        }
        if self.page_size == 0 || self.page_size > MAX_DELETE_PAGE_SIZE {
            return Err(ConfigError::Validation {
                message: format!(
                    "page_size must be in 1..={MAX_DELETE_PAGE_SIZE}, got {}",
                    self.page_size
                ),
            });
        }
        if self.pages_per_execution == 0 {
            return Err(ConfigError::Validation {
                message: "pages_per_execution must be > 0".to_string(),
            });
        }
        if self.concurrent_delete_executions_activities == 0
            || self.concurrent_delete_executions_activities > MAX_CONCURRENT_DELETE_ACTIVITIES
        {
            return Err(ConfigError::Validation {
                message: format!(
                    "concurrent_delete_executions_activities must be in 1..={MAX_CONCURRENT_DELETE_ACTIVITIES}, got {}",
                    self.concurrent_delete_executions_activities
                ),
            });
        }
        Ok(())
    }

    /// Builds the parameters of a deletion operation for `namespace`.
    pub fn params_for(&self, namespace: NamespaceName) -> NamespaceDeletionParams {
        NamespaceDeletionParams {
            namespace,
            delete_executions: DeleteExecutionsConfig {
                delete_activity_rps: self.delete_activity_rps,
                page_size: self.page_size,
                pages_per_execution: self.pages_per_execution,
                concurrent_delete_executions_activities: self
                    .concurrent_delete_executions_activities,
            },
            namespace_delete_delay: self.namespace_delete_delay,
        }
    }
}

impl Default for NamespaceDeletionConfig {
    fn default() -> Self {
        Self {
            delete_activity_rps: default_delete_activity_rps(),
            page_size: default_delete_page_size(),
            pages_per_execution: default_pages_per_execution(),
            concurrent_delete_executions_activities: default_concurrent_delete_activities(),
            namespace_delete_delay: default_namespace_delete_delay(),
        }
    }
}

// =============================================================================
// Operator Configuration
// =============================================================================

fn default_history_shard_count() -> i32 {
    4
}

fn default_list_clusters_page_size() -> i32 {
    100
}

fn default_operation_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_index_name() -> String {
    "conductor_visibility".to_string()
}

fn default_task_queue() -> String {
    "default-worker-tq".to_string()
}

/// Configuration of the operator control plane.
///
/// # Example
///
/// ```no_run
/// # use std::time::Duration;
/// # use conductor_types::config::OperatorConfig;
/// let config = OperatorConfig::builder()
///     .history_shard_count(16)
///     .operation_timeout(Duration::from_secs(60))
///     .build()
///     .expect("valid operator config");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OperatorConfig {
    /// History shard count of the local cluster.
    ///
    /// A remote cluster is accepted only if its shard count is a multiple or
    /// a divisor of this value. Must be > 0.
    #[serde(default = "default_history_shard_count")]
    pub history_shard_count: i32,
    /// Page size used when a cluster listing request asks for none.
    ///
    /// Must be > 0.
    #[serde(default = "default_list_clusters_page_size")]
    pub list_clusters_page_size: i32,
    /// Upper bound on waiting for a durable operation to finish.
    ///
    /// The operation itself keeps running past this bound. Must be >= 1s.
    #[serde(default = "default_operation_timeout")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub operation_timeout: Duration,
    /// Visibility backend kind.
    #[serde(default)]
    pub backend: BackendKind,
    /// Visibility index whose schema is managed.
    ///
    /// Must be non-empty.
    #[serde(default = "default_index_name")]
    pub index_name: String,
    /// Task queue durable operations are submitted to.
    ///
    /// Must be non-empty.
    #[serde(default = "default_task_queue")]
    pub task_queue: String,
    /// Namespace deletion pacing.
    #[serde(default)]
    pub namespace_deletion: NamespaceDeletionConfig,
}

#[bon::bon]
impl OperatorConfig {
    /// Creates a new operator configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    #[builder]
    pub fn new(
        #[builder(default = default_history_shard_count())] history_shard_count: i32,
        #[builder(default = default_list_clusters_page_size())] list_clusters_page_size: i32,
        #[builder(default = default_operation_timeout())] operation_timeout: Duration,
        #[builder(default)] backend: BackendKind,
        #[builder(default = default_index_name(), into)] index_name: String,
        #[builder(default = default_task_queue(), into)] task_queue: String,
        #[builder(default)] namespace_deletion: NamespaceDeletionConfig,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            history_shard_count,
            list_clusters_page_size,
            operation_timeout,
            backend,
            index_name,
            task_queue,
            namespace_deletion,
        };
        config.validate()?;
        Ok(config)
    }
}

impl OperatorConfig {
    /// Validates the configuration values, including nested sections.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_shard_count <= 0 {
            return Err(ConfigError::Validation {
                message: format!(
                    "history_shard_count must be > 0, got {}",
                    self.history_shard_count
                ),
            });
        }
        if self.list_clusters_page_size <= 0 {
            return Err(ConfigError::Validation {
                message: format!(
                    "list_clusters_page_size must be > 0, got {}",
                    self.list_clusters_page_size
                ),
            });
        }
        if self.operation_timeout < MIN_OPERATION_TIMEOUT {
            return Err(ConfigError::Validation {
                message: format!(
                    "operation_timeout must be >= 1s, got {:?}",
                    self.operation_timeout
                ),
            });
        }
        if self.index_name.is_empty() {
            return Err(ConfigError::Validation {
                message: "index_name must not be empty".to_string(),
            });
        }
        if self.task_queue.is_empty() {
            return Err(ConfigError::Validation {
                message: "task_queue must not be empty".to_string(),
            });
        }
        self.namespace_deletion.validate()
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            history_shard_count: default_history_shard_count(),
            list_clusters_page_size: default_list_clusters_page_size(),
            operation_timeout: default_operation_timeout(),
            backend: BackendKind::default(),
            index_name: default_index_name(),
            task_queue: default_task_queue(),
            namespace_deletion: NamespaceDeletionConfig::default(),
        }
    }
}
