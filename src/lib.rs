//! Packbind - self-extracting carrier builder and runtime
//!
//! This crate provides functionality for building carrier executables that
//! embed an ordered set of payload files (the PACK v2 container format), and
//! for the runtime side that locates, extracts, and launches those payloads.

// Enforce strict code quality and reliability
#![deny(
    // Safety
    unsafe_code,

    // Correctness
    missing_debug_implementations,
    unreachable_pub,

    // Future compatibility
    future_incompatible,

    // Rust 2018 idioms
    rust_2018_idioms,

    // All warnings must be fixed
    warnings,
)]
#![warn(
    // Documentation
    missing_docs,

    // Error handling best practices
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::todo,

    // Performance
    clippy::inefficient_to_string,
    clippy::large_enum_variant,

    // Code clarity and maintainability
    clippy::cognitive_complexity,
    clippy::type_complexity,

    // Best practices
    clippy::clone_on_ref_ptr,
    clippy::wildcard_imports,
    clippy::enum_glob_use,
    clippy::if_not_else,
    clippy::single_match_else,
    clippy::needless_continue,
    clippy::explicit_iter_loop,
    clippy::explicit_into_iter_loop,
)]
#![allow(
    missing_docs,  // TODO: Complete documentation
)]

pub mod api;
pub mod exceptions;
pub mod exit_codes;
pub mod logger;
pub mod pack;
pub mod utils;
pub mod version;

// Re-export main API functions
pub use api::{BuildOptions, RunOptions, build_carrier, inspect_carrier, run_carrier};
pub use exceptions::PackError;
pub use utils::get_platform_string;

// Re-export format-specific types for advanced usage
pub use pack::format_v2;
