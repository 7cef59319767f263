//! Identifier types for the operator control plane.
//!
//! Every name that crosses a collaborator boundary (index, namespace, cluster,
//! durable operation) gets its own newtype so that a cluster name can never be
//! passed where a namespace name is expected.

use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

// ============================================================================
// Identifier Types
// ============================================================================

/// Generates a newtype wrapper around `String` for type-safe names.
///
/// Each generated type provides:
/// - Standard derives: Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord
/// - Serde with `#[serde(transparent)]` for wire format compatibility
/// - `From<String>`, `From<&str>` and `Into<String>` conversions
/// - `Display` as the bare name, and `new()` / `as_str()` / `is_empty()`
macro_rules! define_name {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new name from anything string-like.
            #[inline]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the name as a string slice.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns `true` if the name is the empty string.
            #[inline]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            #[inline]
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<$name> for String {
            #[inline]
            fn from(name: $name) -> Self {
                name.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

define_name!(
    /// Name of the visibility index whose search attribute schema is managed.
    IndexName
);

define_name!(
    /// Name of a tenant namespace.
    NamespaceName
);

define_name!(
    /// Unique key of a cluster participating in a multi-region deployment.
    ClusterName
);

define_name!(
    /// Deterministic identifier of a durable operation submitted to the task engine.
    ///
    /// Resubmitting with the same id and kind is idempotent where the engine
    /// rejects duplicate ids.
    OperationId
);

define_name!(
    /// Engine-assigned identifier of a single run of a durable operation.
    RunId
);

/// Name of the reserved system namespace. It can never be deleted.
pub const SYSTEM_NAMESPACE: &str = "_system";

impl NamespaceName {
    /// Returns `true` if this is the reserved system namespace.
    pub fn is_system(&self) -> bool {
        self.0 == SYSTEM_NAMESPACE
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn test_name_display_is_bare_value() {
        assert_eq!(ClusterName::new("us-east").to_string(), "us-east");
        assert_eq!(NamespaceName::from("orders").as_str(), "orders");
    }

    #[test]
    fn test_name_serde_is_transparent() {
        let name = IndexName::new("visibility");
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"visibility\"");
        let back: IndexName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
    }

    #[test]
    fn test_name_borrow_allows_str_lookup() {
        let mut map = BTreeMap::new();
        map.insert(ClusterName::new("eu-west"), 1);
        assert_eq!(map.get("eu-west"), Some(&1));
    }

    #[test]
    fn test_system_namespace_detection() {
        assert!(NamespaceName::new(SYSTEM_NAMESPACE).is_system());
        assert!(!NamespaceName::new("orders").is_system());
        assert!(NamespaceName::default().is_empty());
    }
}
