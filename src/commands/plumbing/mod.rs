//! Plumbing commands (low-level object operations)
//!
//! ## Commands
//!
//! - `hash-object`: Compute a blob's object ID and optionally store it

pub mod hash_object;
