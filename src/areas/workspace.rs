use crate::artifacts::diff::content::{SubmoduleStatus, WorkTree};
use crate::artifacts::diff::delta::FileMode;
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use bytes::Bytes;
use is_executable::IsExecutable;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

const GIT_DIR: &str = ".git";

#[derive(Debug)]
pub struct Workspace {
    path: Box<Path>,
}

impl Workspace {
    pub fn new(path: Box<Path>) -> Self {
        Workspace { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self, file_path: &Path) -> bool {
        std::fs::symlink_metadata(self.path.join(file_path)).is_ok()
    }

    /// Mode and size of a working tree entry, without following symlinks
    pub fn stat_file(&self, file_path: &Path) -> anyhow::Result<(FileMode, u64)> {
        let full_path = self.path.join(file_path);
        let metadata = std::fs::symlink_metadata(&full_path)
            .with_context(|| format!("Unable to stat {}", full_path.display()))?;

        let mode = if metadata.file_type().is_symlink() {
            FileMode::Link
        } else if metadata.is_dir() && full_path.join(GIT_DIR).exists() {
            FileMode::Commit
        } else if metadata.is_dir() {
            FileMode::Tree
        } else if full_path.is_executable() {
            FileMode::BlobExecutable
        } else {
            FileMode::Blob
        };

        Ok((mode, metadata.len()))
    }

    /// Resolve the checked out commit of a nested repository
    fn resolve_head(git_dir: &Path) -> anyhow::Result<Option<ObjectId>> {
        let head_path = git_dir.join("HEAD");
        let head = match std::fs::read_to_string(&head_path) {
            Ok(head) => head,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).context(format!("Unable to read {}", head_path.display()));
            }
        };

        match head.trim().strip_prefix("ref: ") {
            Some(reference) => {
                let ref_path = git_dir.join(reference);
                match std::fs::read_to_string(&ref_path) {
                    Ok(oid) => Ok(Some(ObjectId::try_parse(oid.trim())?)),
                    // unborn branch
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(e).context(format!("Unable to read {}", ref_path.display())),
                }
            }
            None => Ok(Some(ObjectId::try_parse(head.trim())?)),
        }
    }

    /// A nested repository counts as dirty when any of its files changed
    /// after its index was last written
    fn is_dirty(root: &Path, git_dir: &Path) -> anyhow::Result<bool> {
        let index_written = match std::fs::metadata(git_dir.join("index")) {
            Ok(metadata) => metadata.modified()?,
            Err(_) => SystemTime::UNIX_EPOCH,
        };

        let changed = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != GIT_DIR)
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| entry.metadata().ok()?.modified().ok())
            .any(|modified| modified > index_written);

        Ok(changed)
    }
}

impl WorkTree for Workspace {
    fn read_file(&self, file_path: &Path) -> anyhow::Result<Bytes> {
        let full_path = self.path.join(file_path);

        let content = std::fs::read(&full_path)
            .with_context(|| format!("Unable to read file {}", full_path.display()))?;

        Ok(content.into())
    }

    fn read_link(&self, file_path: &Path) -> anyhow::Result<Bytes> {
        let full_path = self.path.join(file_path);

        let target: PathBuf = std::fs::read_link(&full_path)
            .with_context(|| format!("Unable to read link {}", full_path.display()))?;

        Ok(Bytes::from(target.to_string_lossy().into_owned()))
    }

    fn submodule_status(&self, file_path: &Path) -> anyhow::Result<SubmoduleStatus> {
        let root = self.path.join(file_path);
        let git_dir = root.join(GIT_DIR);

        if !git_dir.is_dir() {
            anyhow::bail!("No submodule checked out at {}", file_path.display());
        }

        let head = Self::resolve_head(&git_dir)?;
        let dirty = Self::is_dirty(&root, &git_dir)?;

        Ok(SubmoduleStatus::new(head.clone(), head, dirty))
    }
}
