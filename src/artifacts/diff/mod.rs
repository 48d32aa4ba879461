//! Patch generation between two versions of a file
//!
//! A [`diff_list::DiffList`] holds the deltas of a comparison. Each delta is
//! turned into a [`patch::Patch`] by loading both sides
//! ([`content::ContentLoader`]), classifying them as text or binary
//! ([`binary`]), and running the line engine ([`engine`]) whose hunks and
//! lines are either accumulated into the patch ([`hunk`]) or streamed to
//! caller callbacks ([`context`]).

pub mod binary;
pub mod content;
pub mod context;
pub mod delta;
pub mod diff_algorithm;
pub mod diff_list;
pub mod engine;
pub mod error;
pub mod hunk;
pub mod options;
pub mod patch;
