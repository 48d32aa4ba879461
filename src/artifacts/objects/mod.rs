//! Git object types and operations
//!
//! Only the pieces the patch machinery needs survive here: object IDs, the
//! `<type> <size>\0` header, and blobs (raw content plus identity hashing).

pub mod blob;
pub mod object;
pub mod object_id;
pub mod object_type;

/// Length of a SHA-1 hash in hexadecimal format
pub const OBJECT_ID_LENGTH: usize = 40;
