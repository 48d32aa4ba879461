//! Error types for patch generation.
//!
//! Storage areas report through `anyhow`; everything crossing the patch
//! boundary is folded into [`DiffError`] so callers can tell a cancelled walk
//! from an out-of-range query from a failed read.

use std::collections::TryReserveError;
use std::path::PathBuf;
use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum DiffError {
    /// Index out of range on a query or on by-index delta retrieval.
    #[error("{0} not found")]
    NotFound(String),

    /// A user callback asked the walk to stop.
    #[error("diff walk cancelled by callback")]
    UserCancelled,

    /// Reading one side of a delta failed.
    #[error("unable to load content for {}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: BoxedSource,
    },

    /// The line diff engine failed.
    #[error("line diff engine failed")]
    Engine(#[source] BoxedSource),

    #[error("unable to grow {what}")]
    Alloc {
        what: &'static str,
        #[source]
        source: TryReserveError,
    },
}

impl DiffError {
    pub fn load(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        DiffError::Load {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn engine(source: anyhow::Error) -> Self {
        DiffError::Engine(source.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DiffError::NotFound(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, DiffError::UserCancelled)
    }
}

pub type Result<T> = std::result::Result<T, DiffError>;
