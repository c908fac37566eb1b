//! Core types and shared functionality for tome.
//!
//! This crate provides:
//! - Resource cache with disk and memory backends
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheKey, DiskCache, MemoryCache, ResourceCache, Staleness};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
