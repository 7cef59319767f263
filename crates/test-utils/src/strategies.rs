//! Proptest strategies for operator domain values.
//!
//! # Usage
//!
//! ```no_run
//! use conductor_test_utils::strategies;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn my_property(request in strategies::arb_attribute_request(4)) {
//!         // check an invariant over a generated request
//!     }
//! }
//! ```

use std::collections::BTreeMap;

use conductor_types::{ClusterDescription, ClusterName, IndexedValueType};
use proptest::prelude::*;

/// Generates a custom attribute name matching `[a-z][a-zA-Z0-9_]{0,15}`.
///
/// The lowercase first letter keeps names clear of the reserved prefix and
/// of every system attribute.
pub fn arb_attribute_name() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9_]{0,15}"
}

/// Generates a recognized value type.
pub fn arb_value_type() -> impl Strategy<Value = IndexedValueType> {
    prop::sample::select(IndexedValueType::ALL.to_vec())
}

/// Generates between 1 and `max` distinct attribute names with their types.
pub fn arb_attribute_request(
    max: usize,
) -> impl Strategy<Value = BTreeMap<String, IndexedValueType>> {
    prop::collection::btree_map(arb_attribute_name(), arb_value_type(), 1..=max.max(1))
}

/// Generates a positive history shard count between 1 and 64.
pub fn arb_shard_count() -> impl Strategy<Value = i32> {
    1i32..=64
}

/// Generates a peer description that shares `increment` with the local
/// deployment and has global namespaces enabled.
///
/// Shard count and initial failover version vary, so the result may still
/// violate the shard-count or failover-version checks.
pub fn arb_cluster_description(increment: i64) -> impl Strategy<Value = ClusterDescription> {
    ("[a-z]{2}-[a-z]{3,6}-[0-9]", arb_shard_count(), 0..increment.max(1)).prop_map(
        move |(name, history_shard_count, initial_failover_version)| ClusterDescription {
            cluster_id: format!("id-{name}"),
            cluster_name: ClusterName::new(name),
            history_shard_count,
            failover_version_increment: increment,
            initial_failover_version,
            is_global_namespace_enabled: true,
        },
    )
}
