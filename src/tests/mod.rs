//! Test suite for the function-block core
//!
//! This module organizes tests into logical groups: trigger scheduling,
//! script hosting, whole-topology integration and property-based checks.


/// Route tracing output through the test harness; honors `RUST_LOG`.
#[cfg(test)]
pub(crate) fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
#[cfg(test)]
mod integration;
