//! Porcelain commands (user-facing diff output)
//!
//! Both commands take two operands, each either a stored blob ID or a
//! working tree path.
//!
//! ## Commands
//!
//! - `diff`: Print a unified patch between the operands
//! - `stat`: Summarize the hunks and line counts of the same diff

pub mod diff;
pub mod stat;
