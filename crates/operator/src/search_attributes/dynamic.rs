//! Dynamic-mapping backend: the index accepts new fields at runtime.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use conductor_types::{
    BackendKind, IndexName, IndexedValueType, NameTypeMap, NamespaceName, OperationId,
    OperationParams, OperationResult, operation::AttributeSchemaUpdateParams,
};
use snafu::{OptionExt, ResultExt, ensure};
use tracing::{info, warn};

use super::{AttributeBackend, ListedAttributes};
use crate::{
    collaborators::{IndexClient, SearchAttributeManager},
    dispatcher::OperationDispatcher,
    error::{
        AttributeNotFoundSnafu, AttributeNotRemovableSnafu, AttributesSaveSnafu,
        OperationResultMismatchSnafu, Result,
    },
};

/// Backend for indexes that migrate their schema through a durable operation.
///
/// Namespaces play no part here; attributes are defined per index.
pub struct DynamicMappingBackend {
    dispatcher: Arc<OperationDispatcher>,
    manager: Arc<dyn SearchAttributeManager>,
    index_client: Option<Arc<dyn IndexClient>>,
    operation_timeout: Duration,
}

impl DynamicMappingBackend {
    /// Creates the backend.
    ///
    /// Without an index client, listings never report a storage schema.
    pub fn new(
        dispatcher: Arc<OperationDispatcher>,
        manager: Arc<dyn SearchAttributeManager>,
        index_client: Option<Arc<dyn IndexClient>>,
        operation_timeout: Duration,
    ) -> Self {
        Self { dispatcher, manager, index_client, operation_timeout }
    }
}

#[tonic::async_trait]
impl AttributeBackend for DynamicMappingBackend {
    async fn add(
        &self,
        index: &IndexName,
        _namespace: Option<&NamespaceName>,
        requested: &BTreeMap<String, IndexedValueType>,
        _current: &NameTypeMap,
    ) -> Result<()> {
        let params = OperationParams::AttributeSchemaUpdate(AttributeSchemaUpdateParams {
            custom_attributes_to_add: requested.clone(),
            index_name: index.clone(),
            skip_schema_update: false,
        });
        let handle =
            self.dispatcher.submit(OperationId::attribute_schema_update(), params).await?;
        let (kind, operation_id, run_id) =
            (handle.kind, handle.operation_id.clone(), handle.run_id.clone());

        let result = self.dispatcher.await_outcome(handle, self.operation_timeout).await?;
        ensure!(
            matches!(result, OperationResult::AttributeSchemaUpdated),
            OperationResultMismatchSnafu { kind, operation_id, run_id }
        );

        info!(
            %index,
            attributes = ?requested.keys().collect::<Vec<_>>(),
            "Search attributes added to index schema"
        );
        Ok(())
    }

    async fn remove(
        &self,
        index: &IndexName,
        _namespace: Option<&NamespaceName>,
        names: &[String],
        current: &NameTypeMap,
    ) -> Result<()> {
        let mut custom = current.custom().clone();
        for name in names {
            ensure!(current.is_defined(name), AttributeNotFoundSnafu { name });
            custom.remove(name).context(AttributeNotRemovableSnafu { name })?;
        }

        self.manager
            .save_search_attributes(index, custom)
            .await
            .context(AttributesSaveSnafu { index: index.clone() })?;

        info!(%index, removed = ?names, "Search attributes removed from index");
        Ok(())
    }

    async fn list(
        &self,
        index: &IndexName,
        _namespace: Option<&NamespaceName>,
        current: NameTypeMap,
    ) -> Result<ListedAttributes> {
        let storage_schema = match &self.index_client {
            Some(client) => match client.get_mapping(index).await {
                Ok(mapping) => Some(mapping),
                Err(error) => {
                    warn!(%index, %error, "Index mapping unavailable, omitting storage schema");
                    None
                },
            },
            None => None,
        };

        Ok(ListedAttributes {
            custom: current.custom().clone(),
            system: current.system().clone(),
            storage_schema,
        })
    }
}
