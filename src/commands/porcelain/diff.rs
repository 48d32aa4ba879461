use crate::areas::repository::Repository;
use crate::artifacts::diff::content::{ContentSource, ObjectStore, WorkTree};
use crate::artifacts::diff::delta::{Delta, DeltaStatus, DiffFile, FileMode};
use crate::artifacts::diff::diff_list::DiffList;
use crate::artifacts::diff::hunk::LineOrigin;
use crate::artifacts::diff::options::{DiffFlags, DiffOptions};
use crate::artifacts::diff::patch::Patch;
use crate::artifacts::objects::object_id::ObjectId;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const NULL_PATH: &str = "/dev/null";

/// What a command line operand names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A blob already in the object database
    Stored(ObjectId),
    /// A file in the working tree
    File(PathBuf),
    /// A path with nothing behind it, the absent side of an add or delete
    Missing(PathBuf),
}

impl Operand {
    fn source(&self) -> ContentSource {
        match self {
            Operand::Stored(_) => ContentSource::Tree,
            Operand::File(_) | Operand::Missing(_) => ContentSource::Workdir,
        }
    }

    fn path(&self) -> Option<&Path> {
        match self {
            Operand::Stored(_) => None,
            Operand::File(path) | Operand::Missing(path) => Some(path),
        }
    }

    fn is_missing(&self) -> bool {
        matches!(self, Operand::Missing(_))
    }
}

impl Repository {
    pub fn diff(&self, old: &str, new: &str, options: DiffOptions) -> anyhow::Result<()> {
        let diff_list = self.diff_list(old, new, options)?;

        let Some(patch) = diff_list.patch(0)? else {
            return Ok(());
        };

        self.print_patch(&patch)
    }

    pub fn resolve_operand(&self, operand: &str) -> Operand {
        if let Ok(oid) = ObjectId::try_parse(operand)
            && self.database().exists(&oid)
        {
            return Operand::Stored(oid);
        }

        let path = PathBuf::from(operand);
        if self.workspace().exists(&path) {
            Operand::File(path)
        } else {
            Operand::Missing(path)
        }
    }

    /// A one-file diff list between two operands
    pub fn diff_list(&self, old: &str, new: &str, options: DiffOptions) -> anyhow::Result<DiffList> {
        let (old, new) = if options.has(DiffFlags::REVERSE) {
            (self.resolve_operand(new), self.resolve_operand(old))
        } else {
            (self.resolve_operand(old), self.resolve_operand(new))
        };

        let status = match (old.is_missing(), new.is_missing()) {
            (false, false) => DeltaStatus::Modified,
            (true, false) => DeltaStatus::Added,
            (false, true) => DeltaStatus::Deleted,
            (true, true) => anyhow::bail!("Neither {old:?} nor {new:?} exists"),
        };

        let label = old
            .path()
            .or(new.path())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| match &old {
                Operand::Stored(oid) => PathBuf::from(oid.to_short_oid()),
                _ => PathBuf::new(),
            });

        let delta = Delta::new(
            status,
            self.diff_file(&old, &label)?,
            self.diff_file(&new, &label)?,
        );

        tracing::debug!(?old, ?new, ?status, "resolved diff operands");

        let store: Arc<dyn ObjectStore> = self.database().clone();
        let workdir: Arc<dyn WorkTree> = self.workspace().clone();

        Ok(DiffList::builder(store)
            .delta(delta)
            .sources(old.source(), new.source())
            .workdir(workdir)
            .options(options)
            .build())
    }

    fn diff_file(&self, operand: &Operand, label: &Path) -> anyhow::Result<DiffFile> {
        match operand {
            Operand::Stored(oid) => {
                let size = self.database().size(oid)?;
                Ok(DiffFile::from_oid(label, oid.clone(), FileMode::Blob).with_size(size))
            }
            Operand::File(path) => {
                let (mode, size) = self.workspace().stat_file(path)?;
                Ok(DiffFile::unhashed(path, mode).with_size(size))
            }
            Operand::Missing(path) => Ok(DiffFile::unhashed(path, FileMode::Unreadable)),
        }
    }

    fn print_patch(&self, patch: &Patch) -> anyhow::Result<()> {
        let delta = patch.delta();
        if delta.status == DeltaStatus::Unmodified {
            return Ok(());
        }

        let (a, b) = (&delta.old_file, &delta.new_file);
        if a.has_valid_oid() && a.oid == b.oid && a.mode == b.mode {
            return Ok(());
        }

        let a_path = Path::new("a").join(a.path());
        let b_path = Path::new("b").join(b.path());

        writeln!(
            self.writer(),
            "{}",
            format!("diff --git {} {}", a_path.display(), b_path.display()).bold()
        )?;
        self.print_patch_mode(delta)?;

        let mut oid_range = format!("index {}..{}", a.oid.to_short_oid(), b.oid.to_short_oid());
        if a.mode == b.mode {
            oid_range.push_str(&format!(" {}", a.mode.as_str()));
        }
        writeln!(self.writer(), "{}", oid_range.bold())?;

        let a_display = match delta.status {
            DeltaStatus::Added => PathBuf::from(NULL_PATH),
            _ => a_path,
        };
        let b_display = match delta.status {
            DeltaStatus::Deleted => PathBuf::from(NULL_PATH),
            _ => b_path,
        };

        if delta.is_binary() {
            writeln!(
                self.writer(),
                "Binary files {} and {} differ",
                a_display.display(),
                b_display.display()
            )?;
            return Ok(());
        }

        writeln!(self.writer(), "{}", format!("--- {}", a_display.display()).bold())?;
        writeln!(self.writer(), "{}", format!("+++ {}", b_display.display()).bold())?;

        for hunk_idx in 0..patch.num_hunks() {
            self.print_patch_hunk(patch, hunk_idx)?;
        }

        Ok(())
    }

    fn print_patch_mode(&self, delta: &Delta) -> anyhow::Result<()> {
        let (a, b) = (&delta.old_file, &delta.new_file);

        match delta.status {
            DeltaStatus::Added => {
                writeln!(
                    self.writer(),
                    "{}",
                    format!("new file mode {}", b.mode.as_str()).bold()
                )?;
            }
            DeltaStatus::Deleted => {
                writeln!(
                    self.writer(),
                    "{}",
                    format!("deleted file mode {}", a.mode.as_str()).bold()
                )?;
            }
            _ if a.mode != b.mode => {
                writeln!(
                    self.writer(),
                    "{}",
                    format!("old mode {}", a.mode.as_str()).bold()
                )?;
                writeln!(
                    self.writer(),
                    "{}",
                    format!("new mode {}", b.mode.as_str()).bold()
                )?;
            }
            _ => {}
        }

        Ok(())
    }

    fn print_patch_hunk(&self, patch: &Patch, hunk_idx: usize) -> anyhow::Result<()> {
        let hunk = patch.hunk(hunk_idx)?;
        let header = String::from_utf8_lossy(hunk.header);
        writeln!(self.writer(), "{}", header.trim_end().cyan())?;

        for line_idx in 0..hunk.line_count {
            let line = patch.line_in_hunk(hunk_idx, line_idx)?;
            let content = line.content.unwrap_or_default();
            let text = String::from_utf8_lossy(content);
            let text = text.strip_suffix('\n').unwrap_or(&text);

            match line.origin {
                LineOrigin::Addition => writeln!(self.writer(), "{}", format!("+{text}").green())?,
                LineOrigin::Deletion => writeln!(self.writer(), "{}", format!("-{text}").red())?,
                LineOrigin::Context => writeln!(self.writer(), " {text}")?,
                LineOrigin::ContextEofnl | LineOrigin::AddEofnl | LineOrigin::DelEofnl => {
                    writeln!(self.writer(), "{text}")?
                }
                LineOrigin::FileHeader | LineOrigin::HunkHeader | LineOrigin::Binary => {}
            }
        }

        Ok(())
    }
}
