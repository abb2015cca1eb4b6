//! Modules layer - Infrastructure components for external integrations
//!
//! Contains the record store client and the document photo storage.

pub mod storage;
pub mod store;
