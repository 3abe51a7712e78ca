// src/core/mod.rs

//! The central module containing the cluster model, wire protocol and packet handlers.

pub mod cluster;
pub mod errors;
pub mod handler;
pub mod protocol;
pub mod tasks;

pub use errors::FakeCtdbError;
