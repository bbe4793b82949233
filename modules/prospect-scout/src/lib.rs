pub mod dedup;
pub mod fetcher;
pub mod refresh;
pub mod run_log;
pub mod scheduling;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
