//! Patch lifecycle and query API
//!
//! A patch moves through `LOADED` (both sides fetched and classified),
//! `DIFFABLE` (worth running the engine over) and `DIFFED` (engine output
//! delivered). [`Patch::unload`] returns it to the start while keeping the
//! record capacity, so a walk reuses one patch for every delta.

use crate::artifacts::diff::binary;
use crate::artifacts::diff::content::{Content, ContentLoader};
use crate::artifacts::diff::context::{DiffCallbacks, DiffContext};
use crate::artifacts::diff::delta::{Binary, Delta, DeltaStatus, Side};
use crate::artifacts::diff::diff_list::DiffList;
use crate::artifacts::diff::engine::{DiffSink, EngineConfig};
use crate::artifacts::diff::error::{DiffError, Result};
use crate::artifacts::diff::hunk::{
    Accumulator, DiffRange, Hunk, HunkInfo, Line, LineInfo, LineOrigin,
};
use crate::artifacts::diff::options::DiffFlags;
use bitflags::bitflags;
use bytes::Bytes;
use tracing::{debug, trace};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PatchFlags: u32 {
        /// Handed out by [`DiffList::patch`] rather than driven by a walk
        const ALLOCATED = 1 << 0;
        const LOADED = 1 << 1;
        const DIFFABLE = 1 << 2;
        const DIFFED = 1 << 3;
    }
}

pub struct Patch {
    diff: DiffList,
    index: usize,
    delta: Delta,
    old_data: Content,
    new_data: Content,
    flags: PatchFlags,
    hunks: Vec<Hunk>,
    lines: Vec<Line>,
}

impl Patch {
    pub(crate) fn new(diff: DiffList, index: usize, delta: Delta, flags: PatchFlags) -> Self {
        Patch {
            diff,
            index,
            delta,
            old_data: Content::NoData,
            new_data: Content::NoData,
            flags,
            hunks: Vec::new(),
            lines: Vec::new(),
        }
    }

    /// Point an unloaded patch at another delta of the same collection
    pub(crate) fn rebind(&mut self, index: usize, delta: Delta) {
        self.unload();
        self.index = index;
        self.delta = delta;
    }

    pub fn delta(&self) -> &Delta {
        &self.delta
    }

    pub fn flags(&self) -> PatchFlags {
        self.flags
    }

    pub fn is_loaded(&self) -> bool {
        self.flags.contains(PatchFlags::LOADED)
    }

    pub fn is_diffable(&self) -> bool {
        self.flags.contains(PatchFlags::DIFFABLE)
    }

    pub fn is_diffed(&self) -> bool {
        self.flags.contains(PatchFlags::DIFFED)
    }

    pub fn old_content(&self) -> &Content {
        &self.old_data
    }

    pub fn new_content(&self) -> &Content {
        &self.new_data
    }

    /// Fetch and classify both sides. Does nothing once loaded.
    pub fn load(&mut self) -> Result<()> {
        self.load_with(&DiffContext::accumulating())
    }

    /// Run the engine and record its hunks and lines into this patch
    pub fn generate(&mut self) -> Result<()> {
        self.generate_with(&mut DiffContext::accumulating())
    }

    pub(crate) fn load_with(&mut self, ctx: &DiffContext<'_>) -> Result<()> {
        if self.is_loaded() {
            return Ok(());
        }

        let options = self.diff.options();
        binary::classify_by_override(&mut self.delta, options);

        // nobody will look at content and nobody asked for classification
        let skip_content = !ctx.needs_content() && options.has(DiffFlags::SKIP_BINARY_CHECK);

        if !skip_content {
            self.delta
                .mark_missing_sides(options.has(DiffFlags::INCLUDE_UNTRACKED_CONTENT));

            let loaded = load_sides(
                &self.diff,
                &mut self.delta,
                &mut self.old_data,
                &mut self.new_data,
            );

            if let Err(err) = loaded {
                self.release_content();
                self.diff.store_delta(self.index, &self.delta);
                debug!(path = %self.delta.new_file.path.display(), %err, "patch load failed");
                return Err(err);
            }

            self.delta.update_binary();
            self.demote_if_unchanged();
        }

        self.flags |= PatchFlags::LOADED;
        if self.check_diffable() {
            self.flags |= PatchFlags::DIFFABLE;
        }
        self.diff.store_delta(self.index, &self.delta);

        debug!(
            path = %self.delta.new_file.path.display(),
            binary = ?self.delta.binary,
            old_len = self.old_data.len(),
            new_len = self.new_data.len(),
            diffable = self.is_diffable(),
            "loaded patch"
        );

        Ok(())
    }

    pub(crate) fn generate_with(&mut self, ctx: &mut DiffContext<'_>) -> Result<()> {
        if self.is_diffed() {
            return Ok(());
        }

        self.load_with(ctx)?;

        if !self.is_diffable() || !ctx.needs_hunks() {
            return Ok(());
        }

        let config = EngineConfig::from(self.diff.options());
        let engine = self.diff.engine();
        let accumulate = ctx.accumulates();

        let mut sink = PatchSink {
            delta: &self.delta,
            buffers: [self.old_data.bytes(), self.new_data.bytes()],
            callbacks: &mut ctx.callbacks,
            records: accumulate.then(|| Accumulator::new(&mut self.hunks, &mut self.lines)),
        };

        engine.diff(
            self.old_data.as_bytes(),
            self.new_data.as_bytes(),
            &config,
            &mut sink,
        )?;

        self.flags |= PatchFlags::DIFFED;
        debug!(
            path = %self.delta.new_file.path.display(),
            hunks = self.hunks.len(),
            lines = self.lines.len(),
            "generated patch"
        );

        Ok(())
    }

    /// Release loaded content and forget hunks and lines. Safe to repeat.
    pub fn unload(&mut self) {
        let was_loaded = self.is_loaded();
        self.release_content();
        if was_loaded {
            self.diff.store_delta(self.index, &self.delta);
        }
        self.hunks.clear();
        self.lines.clear();
        self.flags
            .remove(PatchFlags::LOADED | PatchFlags::DIFFABLE | PatchFlags::DIFFED);
    }

    fn release_content(&mut self) {
        self.old_data.release(&mut self.delta.old_file.flags);
        self.new_data.release(&mut self.delta.new_file.flags);
    }

    /// A working tree side that hashes to the same blob as its counterpart
    /// is not a change after all
    fn demote_if_unchanged(&mut self) {
        let touches_workdir =
            self.diff.old_source().is_workdir() || self.diff.new_source().is_workdir();
        let (old, new) = (&self.delta.old_file, &self.delta.new_file);

        if touches_workdir
            && self.delta.status == DeltaStatus::Modified
            && old.has_valid_oid()
            && new.has_valid_oid()
            && old.oid == new.oid
            && old.mode == new.mode
        {
            trace!(path = %new.path.display(), "working tree matches, demoting to unmodified");
            self.delta.status = DeltaStatus::Unmodified;
        }
    }

    fn check_diffable(&self) -> bool {
        self.delta.binary != Binary::Binary
            && self.delta.status != DeltaStatus::Unmodified
            && (!self.old_data.is_empty() || !self.new_data.is_empty())
            && self.delta.old_file.oid != self.delta.new_file.oid
    }

    pub fn num_hunks(&self) -> usize {
        self.hunks.len()
    }

    pub fn hunk(&self, idx: usize) -> Result<HunkInfo<'_>> {
        self.hunks
            .get(idx)
            .map(|hunk| HunkInfo {
                range: hunk.range,
                header: &hunk.header,
                line_count: hunk.line_count,
            })
            .ok_or_else(|| DiffError::NotFound(format!("hunk {idx}")))
    }

    pub fn num_lines_in_hunk(&self, hunk_idx: usize) -> Result<usize> {
        self.hunks
            .get(hunk_idx)
            .map(|hunk| hunk.line_count)
            .ok_or_else(|| DiffError::NotFound(format!("hunk {hunk_idx}")))
    }

    pub fn line_in_hunk(&self, hunk_idx: usize, line_idx: usize) -> Result<LineInfo<'_>> {
        let hunk = self
            .hunks
            .get(hunk_idx)
            .ok_or_else(|| DiffError::NotFound(format!("hunk {hunk_idx}")))?;

        if line_idx >= hunk.line_count {
            return Err(DiffError::NotFound(format!(
                "line {line_idx} in hunk {hunk_idx}"
            )));
        }

        self.lines
            .get(hunk.line_start + line_idx)
            .map(LineInfo::from)
            .ok_or_else(|| DiffError::NotFound(format!("line {line_idx} in hunk {hunk_idx}")))
    }

    /// [`Patch::hunk`], falling back to [`HunkInfo::not_found`] for an index
    /// past the last hunk
    pub fn hunk_or_not_found(&self, idx: usize) -> HunkInfo<'_> {
        self.hunk(idx).unwrap_or_else(|_| HunkInfo::not_found())
    }

    pub fn line_in_hunk_or_not_found(&self, hunk_idx: usize, line_idx: usize) -> LineInfo<'_> {
        self.line_in_hunk(hunk_idx, line_idx)
            .unwrap_or_else(|_| LineInfo::not_found())
    }

    /// Total lines across all hunks, split by origin
    pub fn line_stats(&self) -> (usize, usize, usize) {
        self.lines
            .iter()
            .fold((0, 0, 0), |(context, added, deleted), line| match line.origin {
                LineOrigin::Context => (context + 1, added, deleted),
                LineOrigin::Addition => (context, added + 1, deleted),
                LineOrigin::Deletion => (context, added, deleted + 1),
                _ => (context, added, deleted),
            })
    }
}

impl Drop for Patch {
    fn drop(&mut self) {
        self.unload();
        trace!(
            index = self.index,
            allocated = self.flags.contains(PatchFlags::ALLOCATED),
            "patch released"
        );
    }
}

impl std::fmt::Debug for Patch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Patch")
            .field("index", &self.index)
            .field("delta", &self.delta)
            .field("flags", &self.flags)
            .field("hunks", &self.hunks.len())
            .field("lines", &self.lines.len())
            .finish()
    }
}

/// Load the old and new side, working tree sides first so a binary working
/// file spares the store read
fn load_sides(
    diff: &DiffList,
    delta: &mut Delta,
    old_data: &mut Content,
    new_data: &mut Content,
) -> Result<()> {
    let options = diff.options();
    let loader = ContentLoader::new(diff.store(), diff.workdir(), options);

    let sides = [
        (Side::Old, diff.old_source()),
        (Side::New, diff.new_source()),
    ];
    let ordered = sides
        .iter()
        .filter(|(_, source)| source.is_workdir())
        .chain(sides.iter().filter(|(_, source)| !source.is_workdir()));

    for &(side, source) in ordered {
        if delta.is_binary() {
            break;
        }

        let content = loader.load(delta, side, source)?;
        match side {
            Side::Old => *old_data = content,
            Side::New => *new_data = content,
        }
    }

    Ok(())
}

struct PatchSink<'p, 'c> {
    delta: &'p Delta,
    buffers: [Option<&'p Bytes>; 2],
    callbacks: &'p mut DiffCallbacks<'c>,
    records: Option<Accumulator<'p>>,
}

impl PatchSink<'_, '_> {
    /// Line content as a view of the loaded buffer it points into. Engine
    /// synthesized text is copied.
    fn share(&self, content: &[u8]) -> Bytes {
        if content.is_empty() {
            return Bytes::new();
        }

        let inner = content.as_ptr_range();
        self.buffers
            .iter()
            .flatten()
            .find(|buffer| {
                let outer = buffer.as_ptr_range();
                outer.start <= inner.start && inner.end <= outer.end
            })
            .map(|buffer| buffer.slice_ref(content))
            .unwrap_or_else(|| Bytes::copy_from_slice(content))
    }
}

impl DiffSink for PatchSink<'_, '_> {
    fn on_hunk(&mut self, range: &DiffRange, header: &[u8]) -> Result<()> {
        self.callbacks.hunk(self.delta, range, header)?;

        if let Some(records) = self.records.as_mut() {
            records.push_hunk(range, header)?;
        }

        Ok(())
    }

    fn on_line(&mut self, range: &DiffRange, origin: LineOrigin, content: &[u8]) -> Result<()> {
        self.callbacks.line(self.delta, range, origin, content)?;

        if self.records.is_some() {
            let shared = self.share(content);
            if let Some(records) = self.records.as_mut() {
                records.push_line(origin, shared)?;
            }
        }

        Ok(())
    }
}
