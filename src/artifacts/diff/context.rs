//! Caller callbacks for a diff walk
//!
//! A callback returning [`ControlFlow::Break`] cancels the walk; the walk
//! reports it once as [`DiffError::UserCancelled`] after cleaning up the
//! patch in flight.

use crate::artifacts::diff::delta::Delta;
use crate::artifacts::diff::error::{DiffError, Result};
use crate::artifacts::diff::hunk::{DiffRange, LineOrigin};
use std::ops::ControlFlow;

pub type FileCallback<'c> = Box<dyn FnMut(&Delta, f32) -> ControlFlow<()> + 'c>;
pub type HunkCallback<'c> = Box<dyn FnMut(&Delta, &DiffRange, &[u8]) -> ControlFlow<()> + 'c>;
pub type LineCallback<'c> =
    Box<dyn FnMut(&Delta, &DiffRange, LineOrigin, &[u8]) -> ControlFlow<()> + 'c>;

#[derive(Default)]
pub struct DiffCallbacks<'c> {
    file: Option<FileCallback<'c>>,
    hunk: Option<HunkCallback<'c>>,
    line: Option<LineCallback<'c>>,
}

impl<'c> DiffCallbacks<'c> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once per delta with the walk's progress in `[0, 1)`
    pub fn on_file(mut self, callback: impl FnMut(&Delta, f32) -> ControlFlow<()> + 'c) -> Self {
        self.file = Some(Box::new(callback));
        self
    }

    pub fn on_hunk(
        mut self,
        callback: impl FnMut(&Delta, &DiffRange, &[u8]) -> ControlFlow<()> + 'c,
    ) -> Self {
        self.hunk = Some(Box::new(callback));
        self
    }

    pub fn on_line(
        mut self,
        callback: impl FnMut(&Delta, &DiffRange, LineOrigin, &[u8]) -> ControlFlow<()> + 'c,
    ) -> Self {
        self.line = Some(Box::new(callback));
        self
    }

    pub(crate) fn file(&mut self, delta: &Delta, progress: f32) -> Result<()> {
        match self.file.as_mut() {
            Some(callback) => check(callback(delta, progress)),
            None => Ok(()),
        }
    }

    pub(crate) fn hunk(&mut self, delta: &Delta, range: &DiffRange, header: &[u8]) -> Result<()> {
        match self.hunk.as_mut() {
            Some(callback) => check(callback(delta, range, header)),
            None => Ok(()),
        }
    }

    pub(crate) fn line(
        &mut self,
        delta: &Delta,
        range: &DiffRange,
        origin: LineOrigin,
        content: &[u8],
    ) -> Result<()> {
        match self.line.as_mut() {
            Some(callback) => check(callback(delta, range, origin, content)),
            None => Ok(()),
        }
    }
}

fn check(flow: ControlFlow<()>) -> Result<()> {
    match flow {
        ControlFlow::Continue(()) => Ok(()),
        ControlFlow::Break(()) => Err(DiffError::UserCancelled),
    }
}

/// Per-walk state shared by every patch the walk drives
pub(crate) struct DiffContext<'c> {
    pub(crate) callbacks: DiffCallbacks<'c>,
    accumulate: bool,
}

impl<'c> DiffContext<'c> {
    pub(crate) fn new(callbacks: DiffCallbacks<'c>) -> Self {
        DiffContext {
            callbacks,
            accumulate: false,
        }
    }

    /// A context that records hunks and lines into the patch, with no caller
    /// callbacks
    pub(crate) fn accumulating() -> Self {
        DiffContext {
            callbacks: DiffCallbacks::default(),
            accumulate: true,
        }
    }

    pub(crate) fn accumulates(&self) -> bool {
        self.accumulate
    }

    /// Someone will look at hunks or lines, so content has to be loaded
    pub(crate) fn needs_content(&self) -> bool {
        self.accumulate || self.callbacks.hunk.is_some() || self.callbacks.line.is_some()
    }

    /// Running the engine would produce something observable
    pub(crate) fn needs_hunks(&self) -> bool {
        self.needs_content() || self.callbacks.file.is_some()
    }
}
