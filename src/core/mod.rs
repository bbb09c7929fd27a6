pub mod adapters;
pub mod builtin_providers;
pub mod config;
pub mod entropy;
pub mod fallback;
pub mod keyring;
pub mod message;
pub mod orchestrator;
pub mod postprocess;
pub mod prompt;
pub mod providers;
pub mod secret;
pub mod storage;
pub mod store;
#[cfg(test)]
pub(crate) mod test_helpers;
