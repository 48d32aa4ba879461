use crate::artifacts::objects::object_id::ObjectId;
use bitflags::bitflags;
use derive_new::new;
use std::path::{Path, PathBuf};

bitflags! {
    /// Per-side state accumulated while classifying and loading content
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FileFlags: u32 {
        const VALID_OID = 0b0000_0001;
        const BINARY = 0b0000_0010;
        const NOT_BINARY = 0b0000_0100;
        const FREE_DATA = 0b0000_1000;
        const NO_DATA = 0b0001_0000;
        const VALIDATED = 0b0010_0000;
    }
}

impl FileFlags {
    pub const KNOWN_BINARY: FileFlags = FileFlags::BINARY.union(FileFlags::NOT_BINARY);
    pub const NOT_BINARY_OR_NO_DATA: FileFlags = FileFlags::NOT_BINARY.union(FileFlags::NO_DATA);

    pub fn is_classified(&self) -> bool {
        self.intersects(Self::KNOWN_BINARY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileMode {
    #[default]
    Unreadable,
    Tree,
    Blob,
    BlobExecutable,
    Link,
    Commit,
}

impl FileMode {
    pub fn as_str(&self) -> &str {
        match self {
            FileMode::Unreadable => "000000",
            FileMode::Tree => "40000",
            FileMode::Blob => "100644",
            FileMode::BlobExecutable => "100755",
            FileMode::Link => "120000",
            FileMode::Commit => "160000",
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            FileMode::Unreadable => 0,
            FileMode::Tree => 0o40000,
            FileMode::Blob => 0o100644,
            FileMode::BlobExecutable => 0o100755,
            FileMode::Link => 0o120000,
            FileMode::Commit => 0o160000,
        }
    }

    /// Submodule link (gitlink)
    pub fn is_commit(&self) -> bool {
        matches!(self, FileMode::Commit)
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, FileMode::Tree)
    }
}

impl TryFrom<u32> for FileMode {
    type Error = anyhow::Error;

    fn try_from(mode: u32) -> anyhow::Result<Self> {
        match mode {
            0 => Ok(FileMode::Unreadable),
            0o40000 => Ok(FileMode::Tree),
            0o100644 => Ok(FileMode::Blob),
            0o100755 => Ok(FileMode::BlobExecutable),
            0o120000 => Ok(FileMode::Link),
            0o160000 => Ok(FileMode::Commit),
            _ => Err(anyhow::anyhow!("Invalid file mode {mode:o}")),
        }
    }
}

impl TryFrom<&str> for FileMode {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> anyhow::Result<Self> {
        let mode = u32::from_str_radix(value, 8)
            .map_err(|_| anyhow::anyhow!("Invalid file mode {value}"))?;
        FileMode::try_from(mode)
    }
}

/// One side of a delta
#[derive(Debug, Clone, PartialEq, Eq, Default, new)]
pub struct DiffFile {
    pub path: PathBuf,
    pub oid: ObjectId,
    pub mode: FileMode,
    #[new(default)]
    pub size: u64,
    #[new(default)]
    pub flags: FileFlags,
}

impl DiffFile {
    /// A side whose identity is already known, e.g. a tree or index entry
    pub fn from_oid(path: impl Into<PathBuf>, oid: ObjectId, mode: FileMode) -> Self {
        let mut file = Self::new(path.into(), oid, mode);
        if !file.oid.is_zero() {
            file.flags |= FileFlags::VALID_OID;
        }
        file
    }

    /// A working tree side whose identity is computed once its content is read
    pub fn unhashed(path: impl Into<PathBuf>, mode: FileMode) -> Self {
        Self::new(path.into(), ObjectId::zero(), mode)
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_flags(mut self, flags: FileFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_valid_oid(&self) -> bool {
        self.flags.contains(FileFlags::VALID_OID)
    }

    pub fn is_binary(&self) -> bool {
        self.flags.contains(FileFlags::BINARY)
    }

    pub fn has_no_data(&self) -> bool {
        self.flags.contains(FileFlags::NO_DATA)
    }

    /// This side's own classification, independent of the other side
    pub fn binary(&self) -> Binary {
        if self.flags.contains(FileFlags::BINARY) {
            Binary::Binary
        } else if self.flags.contains(FileFlags::NOT_BINARY) {
            Binary::NotBinary
        } else {
            Binary::Unknown
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeltaStatus {
    Unmodified,
    Added,
    Deleted,
    Modified,
    Renamed,
    Copied,
    Ignored,
    Untracked,
    TypeChange,
}

impl DeltaStatus {
    pub fn status_char(&self) -> char {
        match self {
            DeltaStatus::Added => 'A',
            DeltaStatus::Deleted => 'D',
            DeltaStatus::Modified => 'M',
            DeltaStatus::Renamed => 'R',
            DeltaStatus::Copied => 'C',
            DeltaStatus::Ignored => 'I',
            DeltaStatus::Untracked => '?',
            DeltaStatus::TypeChange => 'T',
            DeltaStatus::Unmodified => ' ',
        }
    }
}

/// Selects one side of a delta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Old,
    New,
}

/// Whether a delta's content can be line diffed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Binary {
    #[default]
    Unknown,
    NotBinary,
    Binary,
}

/// One file pair participating in a diff
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Delta {
    pub status: DeltaStatus,
    pub old_file: DiffFile,
    pub new_file: DiffFile,
    #[new(default)]
    pub binary: Binary,
}

impl Delta {
    pub fn is_binary(&self) -> bool {
        self.binary == Binary::Binary
    }

    pub fn file(&self, side: Side) -> &DiffFile {
        match side {
            Side::Old => &self.old_file,
            Side::New => &self.new_file,
        }
    }

    pub fn file_mut(&mut self, side: Side) -> &mut DiffFile {
        match side {
            Side::Old => &mut self.old_file,
            Side::New => &mut self.new_file,
        }
    }

    /// Roll the per-side flags up into the delta's tri-state.
    ///
    /// Binary on either side wins; both sides must be known text (or have no
    /// data at all) before the delta is called text. Anything else leaves the
    /// current value alone.
    pub fn update_binary(&mut self) {
        if self.old_file.is_binary() || self.new_file.is_binary() {
            self.binary = Binary::Binary;
        } else if self
            .old_file
            .flags
            .intersects(FileFlags::NOT_BINARY_OR_NO_DATA)
            && self
                .new_file
                .flags
                .intersects(FileFlags::NOT_BINARY_OR_NO_DATA)
        {
            self.binary = Binary::NotBinary;
        }
    }

    /// Mark which sides legitimately have nothing to load for this status
    pub(crate) fn mark_missing_sides(&mut self, include_untracked_content: bool) {
        match self.status {
            DeltaStatus::Added => self.old_file.flags |= FileFlags::NO_DATA,
            DeltaStatus::Deleted => self.new_file.flags |= FileFlags::NO_DATA,
            DeltaStatus::Modified
            | DeltaStatus::Renamed
            | DeltaStatus::Copied
            | DeltaStatus::TypeChange => {}
            DeltaStatus::Untracked => {
                self.old_file.flags |= FileFlags::NO_DATA;
                if !include_untracked_content {
                    self.new_file.flags |= FileFlags::NO_DATA;
                }
            }
            DeltaStatus::Unmodified | DeltaStatus::Ignored => {
                self.old_file.flags |= FileFlags::NO_DATA;
                self.new_file.flags |= FileFlags::NO_DATA;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn delta(old: FileFlags, new: FileFlags) -> Delta {
        Delta::new(
            DeltaStatus::Modified,
            DiffFile::unhashed("f", FileMode::Blob).with_flags(old),
            DiffFile::unhashed("f", FileMode::Blob).with_flags(new),
        )
    }

    #[rstest]
    #[case(FileFlags::BINARY, FileFlags::empty(), Binary::Binary)]
    #[case(FileFlags::NOT_BINARY, FileFlags::BINARY, Binary::Binary)]
    #[case(FileFlags::NOT_BINARY, FileFlags::NO_DATA, Binary::NotBinary)]
    #[case(FileFlags::NOT_BINARY, FileFlags::empty(), Binary::Unknown)]
    fn rolls_up_side_flags(
        #[case] old: FileFlags,
        #[case] new: FileFlags,
        #[case] expected: Binary,
    ) {
        let mut delta = delta(old, new);
        delta.update_binary();

        assert_eq!(delta.binary, expected);
    }

    #[rstest]
    #[case(DeltaStatus::Added, true, false)]
    #[case(DeltaStatus::Deleted, false, true)]
    #[case(DeltaStatus::Modified, false, false)]
    #[case(DeltaStatus::Ignored, true, true)]
    fn marks_missing_sides(
        #[case] status: DeltaStatus,
        #[case] old_missing: bool,
        #[case] new_missing: bool,
    ) {
        let mut delta = delta(FileFlags::empty(), FileFlags::empty());
        delta.status = status;
        delta.mark_missing_sides(false);

        assert_eq!(delta.old_file.has_no_data(), old_missing);
        assert_eq!(delta.new_file.has_no_data(), new_missing);
    }

    #[rstest]
    #[case(false, true)]
    #[case(true, false)]
    fn untracked_new_side_depends_on_content_inclusion(
        #[case] include_content: bool,
        #[case] new_missing: bool,
    ) {
        let mut delta = delta(FileFlags::empty(), FileFlags::empty());
        delta.status = DeltaStatus::Untracked;
        delta.mark_missing_sides(include_content);

        assert!(delta.old_file.has_no_data());
        assert_eq!(delta.new_file.has_no_data(), new_missing);
    }

    #[rstest]
    #[case("160000", FileMode::Commit)]
    #[case("40000", FileMode::Tree)]
    #[case("100755", FileMode::BlobExecutable)]
    fn parses_octal_modes(#[case] raw: &str, #[case] expected: FileMode) {
        assert_eq!(FileMode::try_from(raw).unwrap(), expected);
        assert_eq!(expected.as_str(), raw);
    }

    #[test]
    fn from_oid_validates_non_zero_identity() {
        let oid = ObjectId::try_parse("3b18e512dba79e4c8300dd08aeb37f8e728b8dad").unwrap();

        assert!(DiffFile::from_oid("a", oid, FileMode::Blob).has_valid_oid());
        assert!(!DiffFile::from_oid("a", ObjectId::zero(), FileMode::Blob).has_valid_oid());
    }
}
