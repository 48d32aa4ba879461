//! Data structures and algorithms behind the commands
//!
//! - `diff`: Per-file patches, hunk/line accumulation and the diff walk
//! - `objects`: Object IDs, object headers and blobs

pub mod diff;
pub mod objects;
