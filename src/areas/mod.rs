//! Storage areas a diff reads from
//!
//! - `database`: loose object store, the source of stored blob content
//! - `workspace`: working tree files, symlinks and nested repositories
//! - `repository`: ties both together for the commands

pub mod database;
pub mod repository;
pub mod workspace;
