//! Search attribute schema model.
//!
//! A search attribute is a typed, queryable field attached to workflow
//! executions. System attributes are defined by the platform and can never be
//! changed; custom attributes are defined by operators.
//!
//! ## Backends
//!
//! Two visibility backends store attributes differently:
//!
//! - **Dynamic mapping**: the index accepts new fields at runtime, so a custom attribute's name is
//!   its physical field name.
//! - **Fixed capacity**: the store is provisioned with a bounded set of typed custom columns
//!   (`CustomKeywordField01`, ...). Each namespace maps user-facing aliases onto those columns
//!   through an [`AliasMapping`].

use std::{collections::BTreeMap, fmt};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Names starting with this prefix are reserved for the platform.
pub const RESERVED_PREFIX: &str = "Conductor";

// ============================================================================
// Value Types
// ============================================================================

/// Static type of a search attribute.
///
/// Discriminants are the stable wire codes. `Unspecified` exists so that raw
/// codes can be decoded losslessly; it is never a valid attribute type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[repr(i32)]
pub enum IndexedValueType {
    /// No type was supplied.
    #[default]
    Unspecified = 0,
    /// Full-text searchable string.
    Text = 1,
    /// Exact-match string.
    Keyword = 2,
    /// 64-bit signed integer.
    Int = 3,
    /// 64-bit float.
    Double = 4,
    /// Boolean.
    Bool = 5,
    /// Timestamp.
    Datetime = 6,
    /// List of exact-match strings.
    KeywordList = 7,
}

impl IndexedValueType {
    /// All recognized attribute types, in wire-code order.
    pub const ALL: [IndexedValueType; 7] = [
        Self::Text,
        Self::Keyword,
        Self::Int,
        Self::Double,
        Self::Bool,
        Self::Datetime,
        Self::KeywordList,
    ];

    /// Returns `true` for every type an attribute can actually have.
    #[must_use]
    pub const fn is_recognized(self) -> bool {
        !matches!(self, Self::Unspecified)
    }

    /// The type's name as used in physical custom field names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "Unspecified",
            Self::Text => "Text",
            Self::Keyword => "Keyword",
            Self::Int => "Int",
            Self::Double => "Double",
            Self::Bool => "Bool",
            Self::Datetime => "Datetime",
            Self::KeywordList => "KeywordList",
        }
    }
}

impl fmt::Display for IndexedValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Definitions
// ============================================================================

/// Whether an attribute is platform-defined or operator-defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeScope {
    /// Platform-defined and immutable.
    System,
    /// Operator-defined.
    Custom,
}

/// Visibility backend kind, resolved once per request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Index that accepts new schema fields at runtime.
    DynamicMapping,
    /// Store with a bounded, pre-provisioned set of typed custom fields.
    #[default]
    FixedCapacity,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DynamicMapping => f.write_str("dynamic_mapping"),
            Self::FixedCapacity => f.write_str("fixed_capacity"),
        }
    }
}

// ============================================================================
// Name/Type Snapshot
// ============================================================================

/// Immutable snapshot of every attribute defined for an index.
///
/// Both partitions are ordered by name, which makes iteration over the custom
/// partition deterministic. The fixed-capacity backend relies on that order
/// when choosing a free physical field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameTypeMap {
    system: BTreeMap<String, IndexedValueType>,
    custom: BTreeMap<String, IndexedValueType>,
}

impl NameTypeMap {
    /// Creates a snapshot from its two partitions.
    pub fn new(
        system: BTreeMap<String, IndexedValueType>,
        custom: BTreeMap<String, IndexedValueType>,
    ) -> Self {
        Self { system, custom }
    }

    /// Returns the type of `name`, looking in both partitions.
    pub fn get(&self, name: &str) -> Option<IndexedValueType> {
        self.system.get(name).or_else(|| self.custom.get(name)).copied()
    }

    /// Returns which partition defines `name`, if any.
    pub fn scope_of(&self, name: &str) -> Option<AttributeScope> {
        if self.system.contains_key(name) {
            Some(AttributeScope::System)
        } else if self.custom.contains_key(name) {
            Some(AttributeScope::Custom)
        } else {
            None
        }
    }

    /// Checks whether `name` is defined in either partition.
    pub fn is_defined(&self, name: &str) -> bool {
        self.scope_of(name).is_some()
    }

    /// System partition.
    pub fn system(&self) -> &BTreeMap<String, IndexedValueType> {
        &self.system
    }

    /// Custom partition.
    pub fn custom(&self) -> &BTreeMap<String, IndexedValueType> {
        &self.custom
    }
}

/// Platform-defined attributes present on every index.
pub fn system_attributes() -> BTreeMap<String, IndexedValueType> {
    use IndexedValueType::*;

    [
        ("WorkflowId", Keyword),
        ("RunId", Keyword),
        ("WorkflowType", Keyword),
        ("StartTime", Datetime),
        ("ExecutionTime", Datetime),
        ("CloseTime", Datetime),
        ("ExecutionStatus", Keyword),
        ("TaskQueue", Keyword),
        ("HistoryLength", Int),
        ("ExecutionDuration", Int),
        ("StateTransitionCount", Int),
        ("BinaryChecksums", KeywordList),
        ("BatcherNamespace", Keyword),
        ("BatcherUser", Keyword),
    ]
    .into_iter()
    .map(|(name, t)| (name.to_string(), t))
    .collect()
}

/// Checks whether `name` is reserved for the platform.
///
/// Reserved names are the system attributes plus anything carrying the
/// platform prefix.
pub fn is_reserved(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX) || system_attributes().contains_key(name)
}

/// Physical name of the `slot`-th (1-based) fixed custom field of `value_type`.
///
/// Pattern: `Custom{Type}Field{NN}`, e.g. `CustomKeywordField01`.
pub fn custom_field_name(value_type: IndexedValueType, slot: u32) -> String {
    format!("Custom{}Field{:02}", value_type.as_str(), slot)
}

/// Default pre-provisioned custom fields of the fixed-capacity backend.
///
/// Ten keyword fields and three of every other type.
pub fn fixed_capacity_custom_fields() -> BTreeMap<String, IndexedValueType> {
    IndexedValueType::ALL
        .into_iter()
        .flat_map(|t| {
            let slots = if t == IndexedValueType::Keyword { 10 } else { 3 };
            (1..=slots).map(move |slot| (custom_field_name(t, slot), t))
        })
        .collect()
}

// ============================================================================
// Alias Mapping
// ============================================================================

/// Errors from mutating an [`AliasMapping`].
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum AliasMappingError {
    /// The alias is already mapped to a field.
    #[snafu(display("alias {alias} is already mapped to {field}"))]
    AliasInUse {
        /// The duplicate alias.
        alias: String,
        /// The field it already resolves to.
        field: String,
    },

    /// The field already backs another alias.
    #[snafu(display("field {field} already backs alias {alias}"))]
    FieldInUse {
        /// The contested field.
        field: String,
        /// The alias already using it.
        alias: String,
    },
}

/// Per-namespace mapping from user-facing aliases to physical custom fields.
///
/// Invariants held by every mutation:
/// - an alias maps to exactly one field;
/// - a field backs at most one alias.
///
/// The type of an alias is the type of its field, so type agreement holds as
/// long as fields are only chosen from same-typed slots.
///
/// Serialized as a plain `alias -> field` map. Deserialization goes through
/// [`AliasMapping::from_pairs`] and fails if two aliases share a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct AliasMapping {
    aliases: BTreeMap<String, String>,
}

impl AliasMapping {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a mapping from `(alias, field)` pairs, enforcing the invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AliasMappingError`] on a duplicate alias or a shared field.
    pub fn from_pairs<A, F>(
        pairs: impl IntoIterator<Item = (A, F)>,
    ) -> Result<Self, AliasMappingError>
    where
        A: Into<String>,
        F: Into<String>,
    {
        let mut mapping = Self::new();
        for (alias, field) in pairs {
            mapping.insert(alias, field)?;
        }
        Ok(mapping)
    }

    /// Returns the field backing `alias`.
    pub fn field_for(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    /// Returns the alias backed by `field`.
    pub fn alias_for(&self, field: &str) -> Option<&str> {
        self.aliases.iter().find(|(_, f)| f.as_str() == field).map(|(a, _)| a.as_str())
    }

    /// Checks whether `field` already backs an alias.
    pub fn contains_field(&self, field: &str) -> bool {
        self.alias_for(field).is_some()
    }

    /// Maps `alias` to `field`.
    ///
    /// # Errors
    ///
    /// Returns [`AliasMappingError::AliasInUse`] if the alias exists, or
    /// [`AliasMappingError::FieldInUse`] if the field already backs an alias.
    pub fn insert(
        &mut self,
        alias: impl Into<String>,
        field: impl Into<String>,
    ) -> Result<(), AliasMappingError> {
        let alias = alias.into();
        let field = field.into();
        if let Some(existing) = self.aliases.get(&alias) {
            return Err(AliasMappingError::AliasInUse { alias, field: existing.clone() });
        }
        if let Some(owner) = self.alias_for(&field) {
            return Err(AliasMappingError::FieldInUse { field, alias: owner.to_string() });
        }
        self.aliases.insert(alias, field);
        Ok(())
    }

    /// Removes `alias`, returning the field it was mapped to.
    pub fn remove(&mut self, alias: &str) -> Option<String> {
        self.aliases.remove(alias)
    }

    /// Iterates over `(alias, field)` pairs ordered by alias.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(a, f)| (a.as_str(), f.as_str()))
    }

    /// Number of aliases.
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// Checks if the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl TryFrom<BTreeMap<String, String>> for AliasMapping {
    type Error = AliasMappingError;

    fn try_from(aliases: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        Self::from_pairs(aliases)
    }
}

impl From<AliasMapping> for BTreeMap<String, String> {
    fn from(mapping: AliasMapping) -> Self {
        mapping.aliases
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn snapshot() -> NameTypeMap {
        NameTypeMap::new(system_attributes(), fixed_capacity_custom_fields())
    }

    #[test]
    fn test_value_type_codes() {
        for (code, t) in (1..).zip(IndexedValueType::ALL) {
            assert_eq!(t as i32, code);
            assert!(t.is_recognized());
        }
        assert_eq!(IndexedValueType::Unspecified as i32, 0);
        assert!(!IndexedValueType::Unspecified.is_recognized());
        assert_eq!(IndexedValueType::KeywordList.to_string(), "KeywordList");
    }

    #[test]
    fn test_name_type_map_partitions() {
        let map = snapshot();
        assert_eq!(map.scope_of("WorkflowId"), Some(AttributeScope::System));
        assert_eq!(map.scope_of("CustomIntField02"), Some(AttributeScope::Custom));
        assert_eq!(map.scope_of("region"), None);
        assert_eq!(map.get("StartTime"), Some(IndexedValueType::Datetime));
        assert!(!map.is_defined("region"));
        assert_eq!(map.get("region"), None);
    }

    #[test]
    fn test_reserved_names() {
        assert!(is_reserved("WorkflowId"));
        assert!(is_reserved("ConductorChangeVersion"));
        assert!(!is_reserved("region"));
        assert!(!is_reserved("CustomKeywordField01"));
    }

    #[test]
    fn test_fixed_capacity_fields_layout() {
        let fields = fixed_capacity_custom_fields();
        assert_eq!(fields.get("CustomKeywordField01"), Some(&IndexedValueType::Keyword));
        assert_eq!(fields.get("CustomKeywordField10"), Some(&IndexedValueType::Keyword));
        assert_eq!(fields.get("CustomBoolField03"), Some(&IndexedValueType::Bool));
        assert!(!fields.contains_key("CustomBoolField04"));
        assert_eq!(fields.len(), 10 + 6 * 3);
    }

    #[test]
    fn test_alias_mapping_insert_and_lookup() {
        let mut mapping = AliasMapping::new();
        mapping.insert("region", "CustomKeywordField01").unwrap();
        assert_eq!(mapping.field_for("region"), Some("CustomKeywordField01"));
        assert_eq!(mapping.alias_for("CustomKeywordField01"), Some("region"));
        assert!(mapping.contains_field("CustomKeywordField01"));
        assert!(!mapping.contains_field("CustomKeywordField02"));
    }

    #[test]
    fn test_alias_mapping_rejects_duplicate_alias() {
        let mut mapping = AliasMapping::from_pairs([("region", "CustomKeywordField01")]).unwrap();
        let err = mapping.insert("region", "CustomKeywordField02").unwrap_err();
        assert_eq!(
            err,
            AliasMappingError::AliasInUse {
                alias: "region".to_string(),
                field: "CustomKeywordField01".to_string()
            }
        );
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn test_alias_mapping_rejects_shared_field() {
        let result =
            AliasMapping::from_pairs([("a", "CustomIntField01"), ("b", "CustomIntField01")]);
        assert!(matches!(result, Err(AliasMappingError::FieldInUse { .. })));
    }

    #[test]
    fn test_alias_mapping_remove() {
        let mut mapping =
            AliasMapping::from_pairs([("a", "CustomIntField01"), ("b", "CustomIntField02")])
                .unwrap();
        assert_eq!(mapping.remove("a").as_deref(), Some("CustomIntField01"));
        assert_eq!(mapping.remove("a"), None);
        assert_eq!(mapping.alias_for("CustomIntField02"), Some("b"));
        assert!(!mapping.is_empty());
    }

    #[test]
    fn test_alias_mapping_serializes_as_map() {
        let mapping = AliasMapping::from_pairs([("region", "CustomKeywordField01")]).unwrap();
        let json = serde_json::to_string(&mapping).unwrap();
        assert_eq!(json, r#"{"region":"CustomKeywordField01"}"#);
        let back: AliasMapping = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mapping);
    }

    #[test]
    fn test_alias_mapping_deserialize_rejects_shared_field() {
        let json = r#"{"a":"CustomIntField01","b":"CustomIntField01"}"#;
        let err = serde_json::from_str::<AliasMapping>(json).unwrap_err();
        assert!(err.to_string().contains("field CustomIntField01 already backs alias a"));
    }
}
