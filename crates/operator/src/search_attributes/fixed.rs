//! Fixed-capacity backend: a bounded set of typed custom fields shared by
//! per-namespace aliases.
//!
//! ## Field Assignment
//!
//! Each requested alias takes the first free custom field of its type,
//! scanning fields in lexicographic order of their physical names. A field is
//! free when no alias of the namespace maps to it. All aliases of a request
//! are assigned against a private copy of the mapping, and the copy is
//! committed in one update only if every alias found a field.
//!
//! ## Consistency
//!
//! Commits are last-writer-wins. Two concurrent requests against the same
//! namespace each read the mapping, assign fields, and write back the whole
//! mapping; the later commit silently replaces the earlier one.

use std::{collections::BTreeMap, sync::Arc};

use conductor_types::{
    AliasMapping, IndexName, IndexedValueType, NameTypeMap, NamespaceName,
};
use snafu::{OptionExt, ResultExt, ensure};
use tracing::{debug, info};

use super::{AttributeBackend, ListedAttributes, supplied};
use crate::{
    collaborators::{NamespaceDescriptor, NamespaceRegistry},
    error::{
        AliasMappingCommitSnafu, AliasMappingInvariantSnafu, AttributeAlreadyExistsSnafu,
        AttributeCapacityExceededSnafu, AttributeNotFoundSnafu, NamespaceLookupSnafu,
        NamespaceNotFoundSnafu, NamespaceNotSetSnafu, Result,
    },
};

/// Backend for stores with pre-provisioned custom fields.
pub struct FixedCapacityBackend {
    registry: Arc<dyn NamespaceRegistry>,
}

impl FixedCapacityBackend {
    /// Creates the backend over the namespace registry.
    pub fn new(registry: Arc<dyn NamespaceRegistry>) -> Self {
        Self { registry }
    }

    async fn namespace<'a>(
        &self,
        namespace: Option<&'a NamespaceName>,
    ) -> Result<(&'a NamespaceName, NamespaceDescriptor)> {
        let namespace = supplied(namespace).context(NamespaceNotSetSnafu)?;
        match self.registry.get_namespace(namespace).await {
            Ok(descriptor) => Ok((namespace, descriptor)),
            Err(source) if source.is_not_found() => {
                NamespaceNotFoundSnafu { namespace: namespace.clone() }.fail()
            },
            Err(source) => {
                Err(source).context(NamespaceLookupSnafu { namespace: namespace.clone() })
            },
        }
    }

    async fn commit(&self, namespace: &NamespaceName, mapping: AliasMapping) -> Result<()> {
        self.registry
            .update_alias_mapping(namespace, mapping)
            .await
            .context(AliasMappingCommitSnafu { namespace: namespace.clone() })
    }
}

/// Assigns a free custom field to every requested alias.
///
/// Returns the updated mapping without touching `mapping`. The result depends
/// only on the inputs: the same mapping, fields, and request always produce
/// the same assignment.
///
/// # Errors
///
/// - `AttributeAlreadyExists` if an alias is already mapped
/// - `AttributeCapacityExceeded` if no free field of the type is left,
///   reporting how many fields of that type are taken
pub fn assign_fields(
    namespace: &NamespaceName,
    mapping: &AliasMapping,
    custom_fields: &BTreeMap<String, IndexedValueType>,
    requested: &BTreeMap<String, IndexedValueType>,
) -> Result<AliasMapping> {
    let mut updated = mapping.clone();
    for (alias, value_type) in requested {
        ensure!(updated.field_for(alias).is_none(), AttributeAlreadyExistsSnafu { name: alias });

        let mut used: usize = 0;
        let mut target = None;
        for (field, field_type) in custom_fields {
            if field_type != value_type {
                continue;
            }
            if !updated.contains_field(field) {
                target = Some(field);
                break;
            }
            used += 1;
        }

        let field = target.context(AttributeCapacityExceededSnafu {
            name: alias,
            used,
            value_type: *value_type,
        })?;
        updated
            .insert(alias.clone(), field.clone())
            .context(AliasMappingInvariantSnafu { namespace: namespace.clone() })?;
    }
    Ok(updated)
}

#[tonic::async_trait]
impl AttributeBackend for FixedCapacityBackend {
    async fn add(
        &self,
        _index: &IndexName,
        namespace: Option<&NamespaceName>,
        requested: &BTreeMap<String, IndexedValueType>,
        current: &NameTypeMap,
    ) -> Result<()> {
        let (namespace, descriptor) = self.namespace(namespace).await?;
        let updated =
            assign_fields(namespace, &descriptor.alias_mapping, current.custom(), requested)?;

        let assigned: Vec<(&str, &str)> = updated
            .iter()
            .filter(|(alias, _)| requested.contains_key(*alias))
            .collect();
        debug!(%namespace, ?assigned, "Custom fields assigned");

        self.commit(namespace, updated.clone()).await?;
        info!(%namespace, ?assigned, "Search attribute aliases added");
        Ok(())
    }

    async fn remove(
        &self,
        _index: &IndexName,
        namespace: Option<&NamespaceName>,
        names: &[String],
        _current: &NameTypeMap,
    ) -> Result<()> {
        let (namespace, descriptor) = self.namespace(namespace).await?;

        // Names resolve against the mapping as read; a repeated name is removed once.
        let existing = &descriptor.alias_mapping;
        let mut updated = existing.clone();
        for name in names {
            existing.field_for(name).context(AttributeNotFoundSnafu { name })?;
            updated.remove(name);
        }

        self.commit(namespace, updated).await?;
        info!(%namespace, removed = ?names, "Search attribute aliases removed");
        Ok(())
    }

    async fn list(
        &self,
        _index: &IndexName,
        namespace: Option<&NamespaceName>,
        current: NameTypeMap,
    ) -> Result<ListedAttributes> {
        let (_, descriptor) = self.namespace(namespace).await?;
        let mapping = &descriptor.alias_mapping;

        let custom = current
            .custom()
            .iter()
            .filter_map(|(field, t)| mapping.alias_for(field).map(|alias| (alias.to_string(), *t)))
            .collect();

        Ok(ListedAttributes { custom, system: current.system().clone(), storage_schema: None })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use conductor_types::search_attribute::fixed_capacity_custom_fields;

    use super::*;
    use crate::error::{ErrorKind, OperatorError};

    fn ns() -> NamespaceName {
        NamespaceName::new("orders")
    }

    fn request(pairs: &[(&str, IndexedValueType)]) -> BTreeMap<String, IndexedValueType> {
        pairs.iter().map(|(n, t)| (n.to_string(), *t)).collect()
    }

    #[test]
    fn test_first_free_field_in_name_order() {
        let mapping = AliasMapping::new();
        let updated = assign_fields(
            &ns(),
            &mapping,
            &fixed_capacity_custom_fields(),
            &request(&[("region", IndexedValueType::Keyword)]),
        )
        .unwrap();
        assert_eq!(updated.field_for("region"), Some("CustomKeywordField01"));
        assert!(mapping.is_empty());
    }

    #[test]
    fn test_skips_fields_already_backing_aliases() {
        let mapping = AliasMapping::from_pairs([("tier", "CustomKeywordField01")]).unwrap();
        let updated = assign_fields(
            &ns(),
            &mapping,
            &fixed_capacity_custom_fields(),
            &request(&[("region", IndexedValueType::Keyword)]),
        )
        .unwrap();
        assert_eq!(updated.field_for("region"), Some("CustomKeywordField02"));
        assert_eq!(updated.field_for("tier"), Some("CustomKeywordField01"));
    }

    #[test]
    fn test_fields_of_other_types_are_never_chosen() {
        let updated = assign_fields(
            &ns(),
            &AliasMapping::new(),
            &fixed_capacity_custom_fields(),
            &request(&[("amount", IndexedValueType::Double), ("count", IndexedValueType::Int)]),
        )
        .unwrap();
        assert_eq!(updated.field_for("amount"), Some("CustomDoubleField01"));
        assert_eq!(updated.field_for("count"), Some("CustomIntField01"));
    }

    #[test]
    fn test_existing_alias_is_rejected() {
        let mapping = AliasMapping::from_pairs([("region", "CustomKeywordField01")]).unwrap();
        let err = assign_fields(
            &ns(),
            &mapping,
            &fixed_capacity_custom_fields(),
            &request(&[("region", IndexedValueType::Keyword)]),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_capacity_exceeded_reports_used_slots() {
        let fields: BTreeMap<String, IndexedValueType> = [
            ("CustomBoolField01".to_string(), IndexedValueType::Bool),
            ("CustomBoolField02".to_string(), IndexedValueType::Bool),
        ]
        .into_iter()
        .collect();
        let mapping = AliasMapping::from_pairs([("a", "CustomBoolField01")]).unwrap();

        let err = assign_fields(
            &ns(),
            &mapping,
            &fields,
            &request(&[("b", IndexedValueType::Bool), ("c", IndexedValueType::Bool)]),
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(matches!(
            err,
            OperatorError::AttributeCapacityExceeded {
                used: 2,
                value_type: IndexedValueType::Bool,
                ..
            }
        ));
        assert_eq!(mapping.len(), 1);
    }
}
