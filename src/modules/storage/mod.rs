//! Storage module for document photos
//!
//! Provides the MinIO/S3-compatible client used for photo uploads and
//! presigned URL generation.

mod minio_client;

pub use minio_client::{MinIOClient, PhotoStorage};
