//! Core types, class hierarchy, cache, configuration, and stubs for flow.
//!
//! This crate provides the foundational data structures used across all flow
//! crates:
//! - [`types`] — extraction/program data model and error types
//! - [`hierarchy`] — exception class hierarchy and subtype closure
//! - [`cache`] — per-file SQLite-backed extraction cache
//! - [`config`] — configuration loading from `.flow/config.yaml`
//! - [`stubs`] — third-party library exception signatures
//! - [`hash`] — deterministic content hashing (base62 of xxhash64)
//! - [`telemetry`] — privacy-safe telemetry storage

pub mod cache;
pub mod config;
pub mod hash;
pub mod hierarchy;
pub mod stubs;
pub mod telemetry;
pub mod types;
