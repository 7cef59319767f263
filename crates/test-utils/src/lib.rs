//! Shared test utilities for the Conductor operator crates.
//!
//! - [`TestDir`] - temporary directory removed on drop
//! - [`assert_eventually`] - poll a condition until it holds or times out
//! - [`test_operator_config`] - operator configuration suited to tests
//! - [`strategies`] - proptest strategies for operator domain values

#![deny(unsafe_code)]

mod assertions;
mod config;
pub mod strategies;
mod test_dir;

pub use assertions::assert_eventually;
pub use config::{TEST_INDEX, TEST_TASK_QUEUE, test_operator_config};
pub use test_dir::TestDir;
