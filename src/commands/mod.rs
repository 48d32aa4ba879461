//! Command implementations
//!
//! - `plumbing`: Low-level object commands (hash-object)
//! - `porcelain`: User-facing diff commands (diff, stat)

pub mod plumbing;
pub mod porcelain;
