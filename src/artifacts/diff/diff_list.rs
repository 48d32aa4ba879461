//! The delta collection and the walk that drives patches over it

use crate::artifacts::diff::content::{ContentSource, MemoryStore, ObjectStore, WorkTree};
use crate::artifacts::diff::context::{DiffCallbacks, DiffContext};
use crate::artifacts::diff::delta::{Binary, Delta, DeltaStatus, DiffFile, FileMode};
use crate::artifacts::diff::engine::{DiffEngine, MyersEngine};
use crate::artifacts::diff::error::{DiffError, Result};
use crate::artifacts::diff::options::{DiffFlags, DiffOptions};
use crate::artifacts::diff::patch::{Patch, PatchFlags};
use bytes::Bytes;
use derive_new::new;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// A shared handle to an ordered list of deltas and everything needed to load
/// them. Every patch holds a clone, so the list lives as long as its patches.
#[derive(Clone)]
pub struct DiffList {
    inner: Arc<DiffListInner>,
}

struct DiffListInner {
    deltas: RwLock<Vec<Delta>>,
    options: DiffOptions,
    old_src: ContentSource,
    new_src: ContentSource,
    store: Arc<dyn ObjectStore>,
    workdir: Option<Arc<dyn WorkTree>>,
    engine: Arc<dyn DiffEngine>,
    standalone: bool,
}

pub struct DiffListBuilder {
    deltas: Vec<Delta>,
    options: DiffOptions,
    old_src: ContentSource,
    new_src: ContentSource,
    store: Arc<dyn ObjectStore>,
    workdir: Option<Arc<dyn WorkTree>>,
    engine: Arc<dyn DiffEngine>,
}

impl DiffListBuilder {
    pub fn delta(mut self, delta: Delta) -> Self {
        self.deltas.push(delta);
        self
    }

    pub fn deltas(mut self, deltas: impl IntoIterator<Item = Delta>) -> Self {
        self.deltas.extend(deltas);
        self
    }

    pub fn options(mut self, options: DiffOptions) -> Self {
        self.options = options;
        self
    }

    pub fn sources(mut self, old_src: ContentSource, new_src: ContentSource) -> Self {
        self.old_src = old_src;
        self.new_src = new_src;
        self
    }

    pub fn workdir(mut self, workdir: Arc<dyn WorkTree>) -> Self {
        self.workdir = Some(workdir);
        self
    }

    pub fn engine(mut self, engine: Arc<dyn DiffEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn build(self) -> DiffList {
        self.finish(false)
    }

    fn finish(self, standalone: bool) -> DiffList {
        DiffList {
            inner: Arc::new(DiffListInner {
                deltas: RwLock::new(self.deltas),
                options: self.options,
                old_src: self.old_src,
                new_src: self.new_src,
                store: self.store,
                workdir: self.workdir,
                engine: self.engine,
                standalone,
            }),
        }
    }
}

/// One side of a standalone buffer diff
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct DiffBuffer {
    pub path: PathBuf,
    pub data: Bytes,
}

impl DiffList {
    pub fn builder(store: Arc<dyn ObjectStore>) -> DiffListBuilder {
        DiffListBuilder {
            deltas: Vec::new(),
            options: DiffOptions::default(),
            old_src: ContentSource::Tree,
            new_src: ContentSource::Tree,
            store,
            workdir: None,
            engine: Arc::new(MyersEngine),
        }
    }

    /// A single-delta list comparing two in-memory buffers.
    ///
    /// The status follows from which sides are present, `REVERSE` swaps them,
    /// and status filters do not apply.
    pub fn from_buffers(
        old: Option<DiffBuffer>,
        new: Option<DiffBuffer>,
        options: &DiffOptions,
    ) -> Result<DiffList> {
        let (old, new) = if options.has(DiffFlags::REVERSE) {
            (new, old)
        } else {
            (old, new)
        };

        let status = match (&old, &new) {
            (Some(_), Some(_)) => DeltaStatus::Modified,
            (None, Some(_)) => DeltaStatus::Added,
            (Some(_), None) => DeltaStatus::Deleted,
            (None, None) => DeltaStatus::Untracked,
        };

        let fallback_path = old
            .as_ref()
            .or(new.as_ref())
            .map(|buffer| buffer.path.clone())
            .unwrap_or_default();

        let store = MemoryStore::default();
        let side = |buffer: Option<DiffBuffer>| -> Result<DiffFile> {
            match buffer {
                Some(DiffBuffer { path, data }) => {
                    let size = data.len() as u64;
                    let oid = store
                        .insert(data)
                        .map_err(|e| DiffError::load(&path, e))?;
                    Ok(DiffFile::from_oid(path, oid, FileMode::Blob).with_size(size))
                }
                None => Ok(DiffFile::unhashed(fallback_path.clone(), FileMode::Unreadable)),
            }
        };

        let delta = Delta::new(status, side(old)?, side(new)?);

        Ok(DiffList::builder(Arc::new(store))
            .delta(delta)
            .options(options.clone())
            .finish(true))
    }

    /// Number of handles to this list, patches included
    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn options(&self) -> &DiffOptions {
        &self.inner.options
    }

    pub fn old_source(&self) -> ContentSource {
        self.inner.old_src
    }

    pub fn new_source(&self) -> ContentSource {
        self.inner.new_src
    }

    pub(crate) fn store(&self) -> &dyn ObjectStore {
        self.inner.store.as_ref()
    }

    pub(crate) fn workdir(&self) -> Option<&dyn WorkTree> {
        self.inner.workdir.as_deref()
    }

    pub(crate) fn engine(&self) -> Arc<dyn DiffEngine> {
        Arc::clone(&self.inner.engine)
    }

    pub fn num_deltas(&self) -> usize {
        self.read_deltas(|deltas| deltas.len())
    }

    pub fn num_deltas_of_type(&self, status: DeltaStatus) -> usize {
        self.read_deltas(|deltas| deltas.iter().filter(|d| d.status == status).count())
    }

    /// The delta at `idx`, with its binary flag resolved by loading the
    /// content unless `SKIP_BINARY_CHECK` is set
    pub fn delta(&self, idx: usize) -> Result<Delta> {
        let delta = self.delta_at(idx)?;

        if delta.binary != Binary::Unknown || self.options().has(DiffFlags::SKIP_BINARY_CHECK) {
            return Ok(delta);
        }

        let mut patch = Patch::new(self.clone(), idx, delta, PatchFlags::empty());
        patch.load()?;
        patch.unload();

        Ok(patch.delta().clone())
    }

    /// A fully generated patch for the delta at `idx`, or `None` when the
    /// status filters exclude it
    pub fn patch(&self, idx: usize) -> Result<Option<Patch>> {
        let delta = self.delta_at(idx)?;

        if self.filters(&delta) {
            return Ok(None);
        }

        let mut patch = Patch::new(self.clone(), idx, delta, PatchFlags::ALLOCATED);
        patch.generate()?;

        Ok(Some(patch))
    }

    /// Walk every delta in order, loading and diffing each one and reporting
    /// it to `callbacks`.
    ///
    /// The first error or cancellation stops the walk; the patch in flight is
    /// unloaded before it is returned.
    pub fn foreach(&self, callbacks: DiffCallbacks<'_>) -> Result<()> {
        let mut ctx = DiffContext::new(callbacks);
        let total = self.num_deltas();
        let mut current: Option<Patch> = None;

        debug!(total, standalone = self.inner.standalone, "diff walk started");

        for idx in 0..total {
            let delta = self.delta_at(idx)?;
            if self.filters(&delta) {
                continue;
            }

            let patch = match current.take() {
                Some(mut patch) => {
                    patch.rebind(idx, delta);
                    patch
                }
                None => Patch::new(self.clone(), idx, delta, PatchFlags::empty()),
            };
            let patch = current.insert(patch);

            let progress = if self.inner.standalone {
                1.0
            } else {
                idx as f32 / total as f32
            };

            let outcome = walk_delta(patch, &mut ctx, progress);
            patch.unload();

            if let Err(err) = outcome {
                if err.is_cancelled() {
                    debug!(idx, "diff walk cancelled");
                } else {
                    warn!(idx, path = %patch.delta().new_file.path.display(), %err, "diff walk failed");
                }
                return Err(err);
            }
        }

        debug!(total, "diff walk finished");
        Ok(())
    }

    fn filters(&self, delta: &Delta) -> bool {
        !self.inner.standalone && self.options().should_skip(delta)
    }

    fn delta_at(&self, idx: usize) -> Result<Delta> {
        self.read_deltas(|deltas| deltas.get(idx).cloned())
            .ok_or_else(|| DiffError::NotFound(format!("delta {idx}")))
    }

    fn read_deltas<T>(&self, read: impl FnOnce(&[Delta]) -> T) -> T {
        let deltas = self
            .inner
            .deltas
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        read(&deltas)
    }

    /// Record what loading learned about a delta
    pub(crate) fn store_delta(&self, idx: usize, delta: &Delta) {
        let mut deltas = self
            .inner
            .deltas
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = deltas.get_mut(idx) {
            slot.clone_from(delta);
        }
    }
}

impl std::fmt::Debug for DiffList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiffList")
            .field("deltas", &self.num_deltas())
            .field("options", &self.inner.options)
            .field("old_src", &self.inner.old_src)
            .field("new_src", &self.inner.new_src)
            .field("standalone", &self.inner.standalone)
            .finish()
    }
}

fn walk_delta(patch: &mut Patch, ctx: &mut DiffContext<'_>, progress: f32) -> Result<()> {
    patch.load_with(ctx)?;
    ctx.callbacks.file(patch.delta(), progress)?;
    patch.generate_with(ctx)
}

/// Diff two buffers, reporting through `callbacks` exactly like a walk over
/// a one-delta list
pub fn diff_buffers(
    old: Option<DiffBuffer>,
    new: Option<DiffBuffer>,
    options: &DiffOptions,
    callbacks: DiffCallbacks<'_>,
) -> Result<()> {
    DiffList::from_buffers(old, new, options)?.foreach(callbacks)
}

/// Diff two buffers into a patch that can be queried afterwards
pub fn patch_from_buffers(
    old: Option<DiffBuffer>,
    new: Option<DiffBuffer>,
    options: &DiffOptions,
) -> Result<Patch> {
    DiffList::from_buffers(old, new, options)?
        .patch(0)?
        .ok_or_else(|| DiffError::NotFound("buffer delta".into()))
}
