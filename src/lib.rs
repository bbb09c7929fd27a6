//! charchat is a command-line character chat client for hosted LLM APIs.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the response pipeline: prompt building, provider
//!   resolution and adapters, post-processing, the local fallback, and the
//!   orchestrator that ties them to the chat store.
//! - [`character`] defines character cards and the built-in catalog.
//! - [`api`] defines the wire payloads exchanged with providers.
//! - [`cli`] parses arguments and runs one command per invocation.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod character;
pub mod cli;
pub mod core;
pub mod logging;
