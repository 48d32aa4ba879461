use crate::areas::repository::Repository;
use crate::artifacts::diff::context::DiffCallbacks;
use crate::artifacts::diff::delta::{Delta, DeltaStatus};
use crate::artifacts::diff::hunk::LineOrigin;
use crate::artifacts::diff::options::DiffOptions;
use colored::Colorize;
use std::cell::RefCell;
use std::ops::ControlFlow;
use std::path::PathBuf;

#[derive(Debug, Default)]
struct HunkStat {
    header: String,
    lines: usize,
    added: usize,
    deleted: usize,
}

#[derive(Debug)]
struct FileStat {
    path: PathBuf,
    binary: bool,
    hunks: Vec<HunkStat>,
}

impl FileStat {
    fn totals(&self) -> (usize, usize) {
        self.hunks.iter().fold((0, 0), |(added, deleted), hunk| {
            (added + hunk.added, deleted + hunk.deleted)
        })
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

impl Repository {
    /// Per-hunk line counts, gathered by walking the diff with callbacks
    pub fn stat(&self, old: &str, new: &str, options: DiffOptions) -> anyhow::Result<()> {
        let diff_list = self.diff_list(old, new, options)?;
        let files: RefCell<Vec<FileStat>> = RefCell::new(Vec::new());

        let callbacks = DiffCallbacks::new()
            .on_file(|delta: &Delta, _progress| {
                if delta.status != DeltaStatus::Unmodified {
                    files.borrow_mut().push(FileStat {
                        path: delta.new_file.path.clone(),
                        binary: delta.is_binary(),
                        hunks: Vec::new(),
                    });
                }
                ControlFlow::Continue(())
            })
            .on_hunk(|_delta, _range, header| {
                if let Some(file) = files.borrow_mut().last_mut() {
                    file.hunks.push(HunkStat {
                        header: String::from_utf8_lossy(header).trim_end().to_string(),
                        ..Default::default()
                    });
                }
                ControlFlow::Continue(())
            })
            .on_line(|_delta, _range, origin, _content| {
                let mut files = files.borrow_mut();
                let Some(hunk) = files.last_mut().and_then(|file| file.hunks.last_mut()) else {
                    return ControlFlow::Continue(());
                };

                match origin {
                    LineOrigin::Addition => hunk.added += 1,
                    LineOrigin::Deletion => hunk.deleted += 1,
                    LineOrigin::Context => {}
                    _ => return ControlFlow::Continue(()),
                }
                hunk.lines += 1;
                ControlFlow::Continue(())
            });

        diff_list.foreach(callbacks)?;

        self.print_stat(&files.into_inner())
    }

    fn print_stat(&self, files: &[FileStat]) -> anyhow::Result<()> {
        let (mut insertions, mut deletions) = (0, 0);

        for file in files {
            if file.binary {
                writeln!(self.writer(), " {} | Bin", file.path.display())?;
                continue;
            }

            for hunk in &file.hunks {
                writeln!(
                    self.writer(),
                    "{} {} {} {}",
                    hunk.header.cyan(),
                    plural(hunk.lines, "line"),
                    format!("+{}", hunk.added).green(),
                    format!("-{}", hunk.deleted).red()
                )?;
            }

            let (added, deleted) = file.totals();
            insertions += added;
            deletions += deleted;

            writeln!(
                self.writer(),
                " {} | {}(+), {}(-)",
                file.path.display(),
                plural(added, "insertion"),
                plural(deleted, "deletion")
            )?;
        }

        writeln!(
            self.writer(),
            " {} changed, {}(+), {}(-)",
            plural(files.len(), "file"),
            plural(insertions, "insertion"),
            plural(deletions, "deletion")
        )?;

        Ok(())
    }
}
