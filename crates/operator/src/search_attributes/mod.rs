//! Search attribute schema coordination.
//!
//! The coordinator performs the validation common to both backends, then
//! hands the request to the [`AttributeBackend`] selected by the caller's
//! [`BackendKind`]:
//!
//! - [`DynamicMappingBackend`] migrates the index schema through a durable operation
//! - [`FixedCapacityBackend`] assigns pre-provisioned fields to per-namespace aliases
//!
//! The current schema is fetched from the provider on every call and never
//! cached, so a mutation never acts on a stale snapshot.

mod dynamic;
mod fixed;

use std::{collections::BTreeMap, sync::Arc};

use conductor_types::{
    BackendKind, IndexName, IndexedValueType, NameTypeMap, NamespaceName,
    search_attribute::is_reserved,
};
pub use dynamic::DynamicMappingBackend;
pub use fixed::{FixedCapacityBackend, assign_fields};
use snafu::{ResultExt, ensure};
use tracing::debug;

use crate::{
    collaborators::SearchAttributeProvider,
    error::{
        AttributeAlreadyExistsSnafu, AttributeReservedSnafu, AttributeTypeUnknownSnafu,
        AttributesNotSetSnafu, AttributesUnavailableSnafu, Result,
    },
};

/// Attributes visible to a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListedAttributes {
    /// Custom attributes, by the name the caller uses.
    pub custom: BTreeMap<String, IndexedValueType>,
    /// System attributes.
    pub system: BTreeMap<String, IndexedValueType>,
    /// Raw physical schema; only reported by the dynamic-mapping backend.
    pub storage_schema: Option<BTreeMap<String, String>>,
}

/// Backend-specific half of the attribute operations.
///
/// Implementations receive requests that already passed the common
/// validation, together with the schema snapshot it was checked against.
#[tonic::async_trait]
pub trait AttributeBackend: Send + Sync {
    /// Adds validated, previously undefined attributes.
    async fn add(
        &self,
        index: &IndexName,
        namespace: Option<&NamespaceName>,
        requested: &BTreeMap<String, IndexedValueType>,
        current: &NameTypeMap,
    ) -> Result<()>;

    /// Removes attributes by name.
    async fn remove(
        &self,
        index: &IndexName,
        namespace: Option<&NamespaceName>,
        names: &[String],
        current: &NameTypeMap,
    ) -> Result<()>;

    /// Lists the attributes visible to the caller.
    async fn list(
        &self,
        index: &IndexName,
        namespace: Option<&NamespaceName>,
        current: NameTypeMap,
    ) -> Result<ListedAttributes>;
}

/// Coordinates add, remove, and list across both backends.
pub struct SearchAttributeCoordinator {
    provider: Arc<dyn SearchAttributeProvider>,
    dynamic: Arc<dyn AttributeBackend>,
    fixed: Arc<dyn AttributeBackend>,
}

impl SearchAttributeCoordinator {
    /// Creates a coordinator over the two backends.
    pub fn new(
        provider: Arc<dyn SearchAttributeProvider>,
        dynamic: DynamicMappingBackend,
        fixed: FixedCapacityBackend,
    ) -> Self {
        Self { provider, dynamic: Arc::new(dynamic), fixed: Arc::new(fixed) }
    }

    fn backend(&self, kind: BackendKind) -> &dyn AttributeBackend {
        match kind {
            BackendKind::DynamicMapping => self.dynamic.as_ref(),
            BackendKind::FixedCapacity => self.fixed.as_ref(),
        }
    }

    async fn current(&self, index: &IndexName) -> Result<NameTypeMap> {
        self.provider
            .get_search_attributes(index, true)
            .await
            .context(AttributesUnavailableSnafu { index: index.clone() })
    }

    /// Adds custom attributes.
    ///
    /// Every requested attribute is validated before anything is mutated;
    /// checks run per name in order: already defined, reserved, type.
    ///
    /// # Errors
    ///
    /// - `AttributesNotSet` if `requested` is empty
    /// - `AttributeAlreadyExists` for a name already in the schema, system
    ///   attributes included
    /// - `AttributeReserved` for an undefined name carrying the platform prefix
    /// - `AttributeTypeUnknown` for an unrecognized type
    /// - backend-specific errors after validation
    pub async fn add_attributes(
        &self,
        backend: BackendKind,
        index: &IndexName,
        namespace: Option<&NamespaceName>,
        requested: BTreeMap<String, IndexedValueType>,
    ) -> Result<()> {
        ensure!(!requested.is_empty(), AttributesNotSetSnafu);

        let current = self.current(index).await?;
        validate_additions(&requested, &current)?;
        debug!(%index, %backend, count = requested.len(), "Search attribute additions validated");

        self.backend(backend).add(index, namespace, &requested, &current).await
    }

    /// Removes custom attributes.
    ///
    /// # Errors
    ///
    /// - `AttributesNotSet` if `names` is empty
    /// - `AttributeNotFound` for a name that is not defined
    /// - `AttributeNotRemovable` for a system attribute (dynamic-mapping)
    pub async fn remove_attributes(
        &self,
        backend: BackendKind,
        index: &IndexName,
        namespace: Option<&NamespaceName>,
        names: &[String],
    ) -> Result<()> {
        ensure!(!names.is_empty(), AttributesNotSetSnafu);

        let current = self.current(index).await?;
        self.backend(backend).remove(index, namespace, names, &current).await
    }

    /// Lists attributes as seen by the caller.
    pub async fn list_attributes(
        &self,
        backend: BackendKind,
        index: &IndexName,
        namespace: Option<&NamespaceName>,
    ) -> Result<ListedAttributes> {
        let current = self.current(index).await?;
        self.backend(backend).list(index, namespace, current).await
    }
}

/// Checks requested additions against the current schema.
///
/// A system attribute present in `current` is reported as already existing;
/// reserved names that are not defined are reported as reserved.
///
/// # Errors
///
/// Returns the first violation found, iterating names in order.
pub fn validate_additions(
    requested: &BTreeMap<String, IndexedValueType>,
    current: &NameTypeMap,
) -> Result<()> {
    for (name, value_type) in requested {
        ensure!(!current.is_defined(name), AttributeAlreadyExistsSnafu { name });
        ensure!(!is_reserved(name), AttributeReservedSnafu { name });
        ensure!(
            value_type.is_recognized(),
            AttributeTypeUnknownSnafu { name, value_type: *value_type }
        );
    }
    Ok(())
}

/// Returns the namespace if one was supplied and is non-empty.
pub(crate) fn supplied(namespace: Option<&NamespaceName>) -> Option<&NamespaceName> {
    namespace.filter(|ns| !ns.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use conductor_types::search_attribute::{fixed_capacity_custom_fields, system_attributes};

    use super::*;
    use crate::error::ErrorKind;

    fn snapshot() -> NameTypeMap {
        NameTypeMap::new(system_attributes(), fixed_capacity_custom_fields())
    }

    fn request(pairs: &[(&str, IndexedValueType)]) -> BTreeMap<String, IndexedValueType> {
        pairs.iter().map(|(n, t)| (n.to_string(), *t)).collect()
    }

    #[test]
    fn test_validate_accepts_new_names() {
        let requested = request(&[("region", IndexedValueType::Keyword)]);
        validate_additions(&requested, &snapshot()).unwrap();
    }

    #[test]
    fn test_validate_rejects_reserved_prefix() {
        let requested = request(&[("ConductorInternal", IndexedValueType::Keyword)]);
        let err = validate_additions(&requested, &snapshot()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn test_validate_reports_system_name_as_existing() {
        let requested = request(&[("WorkflowId", IndexedValueType::Keyword)]);
        let err = validate_additions(&requested, &snapshot()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_validate_rejects_undefined_system_name_as_reserved() {
        let custom_only = NameTypeMap::new(BTreeMap::new(), fixed_capacity_custom_fields());
        let requested = request(&[("WorkflowId", IndexedValueType::Keyword)]);
        let err = validate_additions(&requested, &custom_only).unwrap_err();
        assert!(matches!(err, crate::error::OperatorError::AttributeReserved { .. }));
    }

    #[test]
    fn test_validate_rejects_defined_custom_name() {
        let requested = request(&[("CustomIntField01", IndexedValueType::Int)]);
        let err = validate_additions(&requested, &snapshot()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_validate_rejects_unspecified_type() {
        let requested = request(&[("region", IndexedValueType::Unspecified)]);
        let err = validate_additions(&requested, &snapshot()).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::AttributeTypeUnknown);
    }

    #[test]
    fn test_supplied_ignores_empty_namespace() {
        let empty = NamespaceName::default();
        assert!(supplied(Some(&empty)).is_none());
        assert!(supplied(None).is_none());
        let ns = NamespaceName::new("orders");
        assert_eq!(supplied(Some(&ns)), Some(&ns));
    }
}
