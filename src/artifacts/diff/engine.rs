//! The line-diff engine seam
//!
//! A patch hands two loaded buffers to a [`DiffEngine`] and receives hunk and
//! line events through a [`DiffSink`]. Line content passed to the sink is a
//! subslice of the buffer it came from; only the end-of-file markers are
//! engine owned.

use crate::artifacts::diff::diff_algorithm::{DiffAlgorithm, Edit, MyersDiff};
use crate::artifacts::diff::error::Result;
use crate::artifacts::diff::hunk::{DiffRange, LineOrigin};
use crate::artifacts::diff::options::{DiffOptions, WhitespaceMode};
use std::borrow::Cow;
use std::ops::Range;
use tracing::trace;

pub const NO_NEWLINE_MARKER: &[u8] = b"\\ No newline at end of file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub context_lines: usize,
    pub interhunk_lines: usize,
    pub whitespace: WhitespaceMode,
}

impl From<&DiffOptions> for EngineConfig {
    fn from(options: &DiffOptions) -> Self {
        EngineConfig {
            context_lines: options.context_lines,
            interhunk_lines: options.interhunk_lines,
            whitespace: options.whitespace(),
        }
    }
}

/// Receives engine output in order: a hunk, then its lines, then the next hunk
pub trait DiffSink {
    fn on_hunk(&mut self, range: &DiffRange, header: &[u8]) -> Result<()>;

    fn on_line(&mut self, range: &DiffRange, origin: LineOrigin, content: &[u8]) -> Result<()>;
}

pub trait DiffEngine: Send + Sync {
    /// Diff two buffers, stopping at the first error the sink returns
    fn diff(
        &self,
        old: &[u8],
        new: &[u8],
        config: &EngineConfig,
        sink: &mut dyn DiffSink,
    ) -> Result<()>;
}

/// Unified diff over lines, built on Myers' shortest edit script
#[derive(Debug, Clone, Copy, Default)]
pub struct MyersEngine;

impl DiffEngine for MyersEngine {
    fn diff(
        &self,
        old: &[u8],
        new: &[u8],
        config: &EngineConfig,
        sink: &mut dyn DiffSink,
    ) -> Result<()> {
        let old_lines = split_lines(old);
        let new_lines = split_lines(new);

        let old_keys = line_keys(&old_lines, config.whitespace);
        let new_keys = line_keys(&new_lines, config.whitespace);
        let edits = MyersDiff::new(&old_keys, &new_keys).diff();

        let hunks = group_hunks(&edits, config.context_lines, config.interhunk_lines);
        trace!(
            old_lines = old_lines.len(),
            new_lines = new_lines.len(),
            hunks = hunks.len(),
            "computed edit script"
        );

        for hunk in hunks {
            let range = hunk_range(&edits, &hunk);
            sink.on_hunk(&range, hunk_header(&range).as_bytes())?;

            for edit in &edits[hunk] {
                let (origin, content, marker) = match *edit {
                    Edit::Equal { a, .. } => {
                        (LineOrigin::Context, old_lines[a], LineOrigin::ContextEofnl)
                    }
                    Edit::Delete { a } => (LineOrigin::Deletion, old_lines[a], LineOrigin::AddEofnl),
                    Edit::Insert { b } => (LineOrigin::Addition, new_lines[b], LineOrigin::DelEofnl),
                };

                sink.on_line(&range, origin, content)?;
                if !content.ends_with(b"\n") {
                    sink.on_line(&range, marker, NO_NEWLINE_MARKER)?;
                }
            }
        }

        Ok(())
    }
}

fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    data.split_inclusive(|&byte| byte == b'\n').collect()
}

fn line_keys<'d>(lines: &[&'d [u8]], whitespace: WhitespaceMode) -> Vec<Cow<'d, [u8]>> {
    lines
        .iter()
        .map(|&line| match whitespace {
            WhitespaceMode::Exact => Cow::Borrowed(line),
            WhitespaceMode::IgnoreEol => Cow::Borrowed(line.trim_ascii_end()),
            WhitespaceMode::IgnoreAll => Cow::Owned(
                line.iter()
                    .copied()
                    .filter(|byte| !byte.is_ascii_whitespace())
                    .collect(),
            ),
            WhitespaceMode::IgnoreChange => Cow::Owned(collapse_whitespace(line)),
        })
        .collect()
}

/// Runs of whitespace compare as a single space; trailing whitespace is dropped
fn collapse_whitespace(line: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(line.len());
    let mut pending_space = false;

    for &byte in line.trim_ascii_end() {
        if byte.is_ascii_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            key.push(b' ');
            pending_space = false;
        }
        key.push(byte);
    }

    key
}

/// Cluster changes into hunks. Changes separated by no more than twice the
/// context (plus the inter-hunk allowance) share a hunk.
fn group_hunks(edits: &[Edit], context: usize, interhunk: usize) -> Vec<Range<usize>> {
    let mut clusters: Vec<(usize, usize)> = Vec::new();

    for (idx, _) in edits.iter().enumerate().filter(|(_, edit)| edit.is_change()) {
        match clusters.last_mut() {
            Some((_, last)) if idx - *last - 1 <= 2 * context + interhunk => *last = idx,
            _ => clusters.push((idx, idx)),
        }
    }

    clusters
        .into_iter()
        .map(|(first, last)| first.saturating_sub(context)..(last + context + 1).min(edits.len()))
        .collect()
}

fn hunk_range(edits: &[Edit], hunk: &Range<usize>) -> DiffRange {
    let on_old = |edit: &&Edit| !matches!(edit, Edit::Insert { .. });
    let on_new = |edit: &&Edit| !matches!(edit, Edit::Delete { .. });

    let old_before = edits[..hunk.start].iter().filter(on_old).count();
    let new_before = edits[..hunk.start].iter().filter(on_new).count();
    let old_lines = edits[hunk.clone()].iter().filter(on_old).count();
    let new_lines = edits[hunk.clone()].iter().filter(on_new).count();

    // an empty side starts at the line it would follow
    let start = |before: usize, count: usize| if count == 0 { before } else { before + 1 };

    DiffRange::new(
        start(old_before, old_lines),
        old_lines,
        start(new_before, new_lines),
        new_lines,
    )
}

pub fn hunk_header(range: &DiffRange) -> String {
    let span = |start: usize, count: usize| {
        if count == 1 {
            format!("{start}")
        } else {
            format!("{start},{count}")
        }
    };

    format!(
        "@@ -{} +{} @@\n",
        span(range.old_start, range.old_lines),
        span(range.new_start, range.new_lines)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::diff::error::DiffError;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        stop_after_hunks: Option<usize>,
    }

    impl DiffSink for Recorder {
        fn on_hunk(&mut self, _range: &DiffRange, header: &[u8]) -> Result<()> {
            let seen = self.events.iter().filter(|e| e.starts_with("@@")).count();
            if self.stop_after_hunks.is_some_and(|limit| seen >= limit) {
                return Err(DiffError::UserCancelled);
            }
            self.events.push(String::from_utf8_lossy(header).trim_end().to_string());
            Ok(())
        }

        fn on_line(&mut self, _range: &DiffRange, origin: LineOrigin, content: &[u8]) -> Result<()> {
            let text = String::from_utf8_lossy(content);
            self.events
                .push(format!("{}{}", origin.as_char(), text.trim_end_matches('\n')));
            Ok(())
        }
    }

    fn run(old: &str, new: &str, config: EngineConfig) -> Vec<String> {
        let mut recorder = Recorder::default();
        MyersEngine
            .diff(old.as_bytes(), new.as_bytes(), &config, &mut recorder)
            .unwrap();
        recorder.events
    }

    fn twenty_lines_changed_at_2_and_19() -> (String, String) {
        let old = (1..=20).map(|n| format!("{n}\n")).collect::<String>();
        let new = (1..=20)
            .map(|n| match n {
                2 => "two\n".to_string(),
                19 => "nineteen\n".to_string(),
                _ => format!("{n}\n"),
            })
            .collect::<String>();
        (old, new)
    }

    fn config() -> EngineConfig {
        EngineConfig::from(&DiffOptions::default())
    }

    #[test]
    fn single_replacement() {
        assert_eq!(
            run("a\nb\nc\n", "a\nx\nc\n", config()),
            vec!["@@ -1,3 +1,3 @@", " a", "-b", "+x", " c"]
        );
    }

    #[test]
    fn identical_buffers_have_no_hunks() {
        assert!(run("a\nb\n", "a\nb\n", config()).is_empty());
    }

    #[test]
    fn added_file_starts_old_side_at_zero() {
        assert_eq!(
            run("", "one\ntwo\n", config()),
            vec!["@@ -0,0 +1,2 @@", "+one", "+two"]
        );
    }

    #[test]
    fn missing_newline_gets_a_marker() {
        assert_eq!(
            run("a\nb", "a\nb\n", config()),
            vec![
                "@@ -1,2 +1,2 @@",
                " a",
                "-b",
                ">\\ No newline at end of file",
                "+b",
            ]
        );
    }

    #[test]
    fn rewritten_file_becomes_one_hunk() {
        let old = (0..10_000).map(|i| format!("old {i}\n")).collect::<String>();
        let new = (0..10_000).map(|i| format!("new {i}\n")).collect::<String>();

        let events = run(&old, &new, config());

        assert_eq!(events.len(), 20_001);
        assert_eq!(events[0], "@@ -1,10000 +1,10000 @@");
        assert_eq!(events[1], "-old 0");
        assert_eq!(events[10_001], "+new 0");
    }

    #[test]
    fn distant_changes_split_into_hunks() {
        let (old, new) = twenty_lines_changed_at_2_and_19();

        let headers = run(&old, &new, config())
            .into_iter()
            .filter(|e| e.starts_with("@@"))
            .collect::<Vec<_>>();

        assert_eq!(headers, vec!["@@ -1,5 +1,5 @@", "@@ -16,5 +16,5 @@"]);
    }

    #[test]
    fn interhunk_context_merges_nearby_hunks() {
        let (old, new) = twenty_lines_changed_at_2_and_19();
        let config = EngineConfig {
            interhunk_lines: 10,
            ..config()
        };

        let headers = run(&old, &new, config)
            .into_iter()
            .filter(|e| e.starts_with("@@"))
            .collect::<Vec<_>>();

        assert_eq!(headers, vec!["@@ -1,20 +1,20 @@"]);
    }

    #[rstest]
    #[case(WhitespaceMode::IgnoreAll, "a b\n", "ab \n")]
    #[case(WhitespaceMode::IgnoreChange, "a  b\n", "a b  \n")]
    #[case(WhitespaceMode::IgnoreEol, "a b\n", "a b \t\n")]
    fn whitespace_modes_hide_differences(
        #[case] whitespace: WhitespaceMode,
        #[case] old: &str,
        #[case] new: &str,
    ) {
        let config = EngineConfig {
            whitespace,
            ..config()
        };

        assert!(run(old, new, config).is_empty());
        assert!(!run(old, new, EngineConfig::from(&DiffOptions::default())).is_empty());
    }

    #[test]
    fn sink_errors_stop_the_walk() {
        let (old, new) = twenty_lines_changed_at_2_and_19();
        let mut recorder = Recorder {
            stop_after_hunks: Some(1),
            ..Default::default()
        };

        let err = MyersEngine
            .diff(old.as_bytes(), new.as_bytes(), &config(), &mut recorder)
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(recorder.events.iter().filter(|e| e.starts_with("@@")).count(), 1);
    }

    #[rstest]
    #[case(DiffRange::new(1, 1, 1, 1), "@@ -1 +1 @@\n")]
    #[case(DiffRange::new(3, 0, 4, 2), "@@ -3,0 +4,2 @@\n")]
    fn header_elides_single_line_counts(#[case] range: DiffRange, #[case] expected: &str) {
        assert_eq!(hunk_header(&range), expected);
    }
}
