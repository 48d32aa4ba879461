//! Loading one side of a delta into memory
//!
//! Content comes from one of three places: a synthesized submodule marker,
//! the working tree, or the object store. Working tree and marker buffers are
//! owned by the patch (`FREE_DATA`); store buffers are shared views of the
//! store's memory and are only released by dropping the view.

use crate::artifacts::diff::binary;
use crate::artifacts::diff::delta::{Delta, FileFlags, FileMode, Side};
use crate::artifacts::diff::error::{DiffError, Result};
use crate::artifacts::diff::options::DiffOptions;
use crate::artifacts::objects::blob::hash_blob;
use crate::artifacts::objects::object_id::ObjectId;
use bytes::Bytes;
use derive_new::new;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::trace;

/// Read access to stored objects
pub trait ObjectStore: Send + Sync {
    /// Content of the blob with the given identity
    fn read(&self, oid: &ObjectId) -> anyhow::Result<Bytes>;

    /// Size of the blob, used by the size heuristic before reading
    fn size(&self, oid: &ObjectId) -> anyhow::Result<u64> {
        Ok(self.read(oid)?.len() as u64)
    }
}

/// What the working tree knows about a nested repository
#[derive(Debug, Clone, Default, PartialEq, Eq, new)]
pub struct SubmoduleStatus {
    pub head: Option<ObjectId>,
    pub workdir: Option<ObjectId>,
    pub dirty: bool,
}

/// Read access to the working tree
pub trait WorkTree: Send + Sync {
    fn read_file(&self, path: &Path) -> anyhow::Result<Bytes>;

    fn read_link(&self, path: &Path) -> anyhow::Result<Bytes>;

    fn submodule_status(&self, path: &Path) -> anyhow::Result<SubmoduleStatus>;
}

/// Where one side of a diff walk takes its content from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentSource {
    #[default]
    Tree,
    Index,
    Workdir,
}

impl ContentSource {
    pub fn is_workdir(&self) -> bool {
        matches!(self, ContentSource::Workdir)
    }
}

/// The loaded bytes of one side, tagged with who must release them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Content {
    #[default]
    NoData,
    Loaded { data: Bytes, owned: bool },
}

impl Content {
    pub fn empty() -> Self {
        Content::Loaded {
            data: Bytes::new(),
            owned: false,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Content::NoData => &[],
            Content::Loaded { data, .. } => data,
        }
    }

    pub fn bytes(&self) -> Option<&Bytes> {
        match self {
            Content::NoData => None,
            Content::Loaded { data, .. } => Some(data),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Content::Loaded { owned: true, .. })
    }

    /// Drop the buffer and clear the side's ownership flag
    pub(crate) fn release(&mut self, flags: &mut FileFlags) {
        if self.is_owned() {
            flags.remove(FileFlags::FREE_DATA);
        }
        *self = Content::NoData;
    }

    fn owned(data: impl Into<Bytes>) -> Self {
        Content::Loaded {
            data: data.into(),
            owned: true,
        }
    }
}

/// In-memory store, used for standalone buffer diffs
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<ObjectId, Bytes>>,
}

impl MemoryStore {
    pub fn insert(&self, data: Bytes) -> anyhow::Result<ObjectId> {
        let oid = hash_blob(&data)?;
        self.objects
            .write()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?
            .insert(oid.clone(), data);
        Ok(oid)
    }
}

impl ObjectStore for MemoryStore {
    fn read(&self, oid: &ObjectId) -> anyhow::Result<Bytes> {
        self.objects
            .read()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?
            .get(oid)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Object {oid} not found"))
    }
}

#[derive(new)]
pub struct ContentLoader<'a> {
    store: &'a dyn ObjectStore,
    workdir: Option<&'a dyn WorkTree>,
    options: &'a DiffOptions,
}

impl ContentLoader<'_> {
    /// Load one side of `delta` from `source`.
    ///
    /// Sides flagged `NO_DATA` yield [`Content::NoData`]. Classification
    /// results and any identity learned along the way are written back into
    /// the delta.
    pub fn load(&self, delta: &mut Delta, side: Side, source: ContentSource) -> Result<Content> {
        if delta.file(side).has_no_data() {
            return Ok(Content::NoData);
        }

        let content = if source.is_workdir() {
            self.load_workdir(delta, side)?
        } else {
            self.load_blob(delta, side)?
        };

        if content.is_owned() {
            delta.file_mut(side).flags |= FileFlags::FREE_DATA;
        }

        trace!(
            path = %delta.file(side).path.display(),
            ?side,
            ?source,
            len = content.len(),
            owned = content.is_owned(),
            "loaded content"
        );

        Ok(content)
    }

    fn load_blob(&self, delta: &mut Delta, side: Side) -> Result<Content> {
        let file = delta.file(side);

        if file.mode.is_commit() {
            let marker = format!("Subproject commit {}\n", file.oid);
            binary::classify_by_size(delta, side, self.options);
            return Ok(Content::owned(marker));
        }

        if file.mode.is_tree() || file.oid.is_zero() {
            return Ok(Content::empty());
        }

        let path = file.path.clone();
        let oid = file.oid.clone();

        if file.size == 0 {
            delta.file_mut(side).size = self
                .store
                .size(&oid)
                .map_err(|e| DiffError::load(&path, e))?;
        }

        binary::classify_by_size(delta, side, self.options);
        if delta.is_binary() {
            return Ok(Content::empty());
        }

        let data = self
            .store
            .read(&oid)
            .map_err(|e| DiffError::load(&path, e))?;

        delta.file_mut(side).flags |= FileFlags::VALIDATED;
        binary::classify_by_content(delta, side, &data);

        Ok(Content::Loaded { data, owned: false })
    }

    fn load_workdir(&self, delta: &mut Delta, side: Side) -> Result<Content> {
        let file = delta.file(side);
        let path = file.path.clone();

        if file.mode.is_tree() {
            return Ok(Content::empty());
        }

        let workdir = self.workdir.ok_or_else(|| {
            DiffError::load(&path, anyhow::anyhow!("no working tree to read from"))
        })?;

        if file.mode.is_commit() {
            return self.load_submodule(workdir, delta, side);
        }

        let mode = file.mode;
        let data = match mode {
            FileMode::Link => workdir.read_link(&path),
            _ => {
                binary::classify_by_size(delta, side, self.options);
                if delta.is_binary() {
                    return Ok(Content::empty());
                }
                workdir.read_file(&path)
            }
        }
        .map_err(|e| DiffError::load(&path, e))?;

        let file = delta.file_mut(side);
        file.size = data.len() as u64;
        if !file.has_valid_oid() {
            file.oid = hash_blob(&data).map_err(|e| DiffError::load(&path, e))?;
            file.flags |= FileFlags::VALID_OID;
        }
        file.flags |= FileFlags::VALIDATED;

        binary::classify_by_size(delta, side, self.options);
        binary::classify_by_content(delta, side, &data);

        Ok(Content::owned(data))
    }

    fn load_submodule(
        &self,
        workdir: &dyn WorkTree,
        delta: &mut Delta,
        side: Side,
    ) -> Result<Content> {
        let path = delta.file(side).path.clone();
        let status = workdir
            .submodule_status(&path)
            .map_err(|e| DiffError::load(&path, e))?;

        let file = delta.file_mut(side);
        if !file.has_valid_oid()
            && let Some(oid) = status.workdir.as_ref().or(status.head.as_ref())
        {
            file.oid = oid.clone();
            file.flags |= FileFlags::VALID_OID;
        }

        let suffix = if status.dirty { "-dirty" } else { "" };
        let marker = format!("Subproject commit {}{}\n", file.oid, suffix);

        binary::classify_by_size(delta, side, self.options);

        Ok(Content::owned(marker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::diff::delta::{Binary, DeltaStatus, DiffFile};
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use std::path::PathBuf;

    const SUB_HEAD: &str = "1111111111111111111111111111111111111111";
    const SUB_WORKDIR: &str = "2222222222222222222222222222222222222222";

    #[derive(Default)]
    struct FakeTree {
        files: HashMap<PathBuf, Bytes>,
        submodule: Option<SubmoduleStatus>,
    }

    impl WorkTree for FakeTree {
        fn read_file(&self, path: &Path) -> anyhow::Result<Bytes> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("No such file {}", path.display()))
        }

        fn read_link(&self, path: &Path) -> anyhow::Result<Bytes> {
            self.read_file(path)
        }

        fn submodule_status(&self, path: &Path) -> anyhow::Result<SubmoduleStatus> {
            self.submodule
                .clone()
                .ok_or_else(|| anyhow::anyhow!("No submodule at {}", path.display()))
        }
    }

    #[fixture]
    fn store() -> MemoryStore {
        MemoryStore::default()
    }

    fn modified(old: DiffFile, new: DiffFile) -> Delta {
        Delta::new(DeltaStatus::Modified, old, new)
    }

    #[rstest]
    fn store_side_is_borrowed_and_validated(store: MemoryStore) {
        let oid = store.insert(Bytes::from_static(b"hello\n")).unwrap();
        let options = DiffOptions::default();
        let loader = ContentLoader::new(&store, None, &options);
        let mut delta = modified(
            DiffFile::from_oid("a.txt", oid.clone(), FileMode::Blob),
            DiffFile::from_oid("a.txt", oid, FileMode::Blob),
        );

        let content = loader.load(&mut delta, Side::Old, ContentSource::Tree).unwrap();

        assert_eq!(content.as_bytes(), b"hello\n");
        assert!(!content.is_owned());
        assert_eq!(delta.old_file.size, 6);
        assert!(!delta.old_file.flags.contains(FileFlags::FREE_DATA));
        assert!(delta.old_file.flags.contains(FileFlags::VALIDATED));
        assert_eq!(delta.old_file.binary(), Binary::NotBinary);
    }

    #[rstest]
    fn missing_object_is_a_load_error(store: MemoryStore) {
        let options = DiffOptions::default();
        let loader = ContentLoader::new(&store, None, &options);
        let oid = ObjectId::try_parse(SUB_HEAD).unwrap();
        let mut delta = modified(
            DiffFile::from_oid("gone.txt", oid.clone(), FileMode::Blob),
            DiffFile::from_oid("gone.txt", oid, FileMode::Blob),
        );

        let err = loader
            .load(&mut delta, Side::Old, ContentSource::Tree)
            .unwrap_err();

        assert!(matches!(err, DiffError::Load { .. }));
    }

    #[rstest]
    fn workdir_side_is_owned_and_hashed(store: MemoryStore) {
        let tree = FakeTree {
            files: HashMap::from([(PathBuf::from("a.txt"), Bytes::from_static(b"hello world\n"))]),
            ..Default::default()
        };
        let options = DiffOptions::default();
        let loader = ContentLoader::new(&store, Some(&tree), &options);
        let mut delta = modified(
            DiffFile::unhashed("a.txt", FileMode::Blob),
            DiffFile::unhashed("a.txt", FileMode::Blob),
        );

        let content = loader
            .load(&mut delta, Side::New, ContentSource::Workdir)
            .unwrap();

        assert!(content.is_owned());
        assert!(delta.new_file.flags.contains(FileFlags::FREE_DATA));
        assert!(delta.new_file.has_valid_oid());
        assert_eq!(
            delta.new_file.oid.as_ref(),
            "3b18e512dba79e4c8300dd08aeb37f8e728b8dad"
        );
    }

    #[rstest]
    fn unreadable_workdir_file_is_a_load_error(store: MemoryStore) {
        let tree = FakeTree::default();
        let options = DiffOptions::default();
        let loader = ContentLoader::new(&store, Some(&tree), &options);
        let mut delta = modified(
            DiffFile::unhashed("missing.txt", FileMode::Blob),
            DiffFile::unhashed("missing.txt", FileMode::Blob),
        );

        let err = loader
            .load(&mut delta, Side::New, ContentSource::Workdir)
            .unwrap_err();

        assert_eq!(err.to_string(), "unable to load content for missing.txt");
    }

    #[rstest]
    fn dirty_submodule_marker_resolves_identity(store: MemoryStore) {
        let tree = FakeTree {
            submodule: Some(SubmoduleStatus::new(
                Some(ObjectId::try_parse(SUB_HEAD).unwrap()),
                Some(ObjectId::try_parse(SUB_WORKDIR).unwrap()),
                true,
            )),
            ..Default::default()
        };
        let options = DiffOptions::default();
        let loader = ContentLoader::new(&store, Some(&tree), &options);
        let mut delta = modified(
            DiffFile::from_oid("sub", ObjectId::try_parse(SUB_HEAD).unwrap(), FileMode::Commit),
            DiffFile::unhashed("sub", FileMode::Commit),
        );

        let content = loader
            .load(&mut delta, Side::New, ContentSource::Workdir)
            .unwrap();

        assert_eq!(
            content.as_bytes(),
            format!("Subproject commit {SUB_WORKDIR}-dirty\n").as_bytes()
        );
        assert!(content.is_owned());
        assert_eq!(delta.new_file.oid.as_ref(), SUB_WORKDIR);
        assert_eq!(delta.new_file.binary(), Binary::NotBinary);
    }

    #[rstest]
    fn stored_submodule_marker_is_synthesized(store: MemoryStore) {
        let options = DiffOptions::default();
        let loader = ContentLoader::new(&store, None, &options);
        let mut delta = modified(
            DiffFile::from_oid("sub", ObjectId::try_parse(SUB_HEAD).unwrap(), FileMode::Commit),
            DiffFile::unhashed("sub", FileMode::Commit),
        );

        let content = loader.load(&mut delta, Side::Old, ContentSource::Tree).unwrap();

        assert_eq!(
            content.as_bytes(),
            format!("Subproject commit {SUB_HEAD}\n").as_bytes()
        );
        assert!(delta.old_file.flags.contains(FileFlags::FREE_DATA));
    }

    #[rstest]
    fn directories_and_missing_sides_load_nothing(store: MemoryStore) {
        let options = DiffOptions::default();
        let loader = ContentLoader::new(&store, None, &options);
        let mut delta = modified(
            DiffFile::unhashed("dir", FileMode::Tree),
            DiffFile::unhashed("dir", FileMode::Blob).with_flags(FileFlags::NO_DATA),
        );

        let dir = loader.load(&mut delta, Side::Old, ContentSource::Tree).unwrap();
        let missing = loader.load(&mut delta, Side::New, ContentSource::Tree).unwrap();

        assert_eq!(dir, Content::empty());
        assert_eq!(missing, Content::NoData);
    }

    #[test]
    fn release_clears_ownership() {
        let mut content = Content::owned(b"abc".to_vec());
        let mut flags = FileFlags::FREE_DATA | FileFlags::NOT_BINARY;

        content.release(&mut flags);
        content.release(&mut flags);

        assert_eq!(content, Content::NoData);
        assert_eq!(flags, FileFlags::NOT_BINARY);
    }
}
