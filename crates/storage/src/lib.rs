//! Storage abstraction and implementations for workforce data.
//!
//! This crate provides a trait-based storage interface with an in-memory
//! reference implementation that can persist JSON snapshots.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;

pub use trait_::{Storage, StorageError, Result};
pub use json_storage::JsonStorage;
