//! Hunk and line records produced while a patch is generated
//!
//! Records are appended in engine order and never reordered, so a line's old
//! and new numbers can be derived from the line before it. Line content is a
//! shared view into the patch's loaded buffer: growing the record vectors
//! moves the records, never the bytes they point at.

use crate::artifacts::diff::error::{DiffError, Result};
use bytes::Bytes;
use derive_new::new;

/// Hunk headers are engine generated and must fit this many bytes, terminator
/// included
pub const HUNK_HEADER_CAPACITY: usize = 128;

pub(crate) const HUNK_GROWTH: GrowthPolicy = GrowthPolicy::new(8, 128, 3, 2);
pub(crate) const LINE_GROWTH: GrowthPolicy = GrowthPolicy::new(8, 256, 2, 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, new)]
pub struct DiffRange {
    pub old_start: usize,
    pub old_lines: usize,
    pub new_start: usize,
    pub new_lines: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineOrigin {
    #[default]
    Context,
    Addition,
    Deletion,
    /// Both sides lack a newline at end of file
    ContextEofnl,
    /// The old side lacks a newline at end of file, the new side has one
    AddEofnl,
    /// The new side lacks a newline at end of file, the old side has one
    DelEofnl,
    FileHeader,
    HunkHeader,
    Binary,
}

impl LineOrigin {
    pub fn as_char(&self) -> char {
        match self {
            LineOrigin::Context => ' ',
            LineOrigin::Addition => '+',
            LineOrigin::Deletion => '-',
            LineOrigin::ContextEofnl => '=',
            LineOrigin::AddEofnl => '>',
            LineOrigin::DelEofnl => '<',
            LineOrigin::FileHeader => 'F',
            LineOrigin::HunkHeader => 'H',
            LineOrigin::Binary => 'B',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Hunk {
    pub(crate) range: DiffRange,
    pub(crate) header: Bytes,
    pub(crate) line_start: usize,
    pub(crate) line_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Line {
    pub(crate) origin: LineOrigin,
    pub(crate) content: Bytes,
    pub(crate) lines: usize,
    pub(crate) oldno: i64,
    pub(crate) newno: i64,
}

/// Read-only view of one hunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HunkInfo<'p> {
    pub range: DiffRange,
    pub header: &'p [u8],
    pub line_count: usize,
}

impl HunkInfo<'_> {
    /// The all-zero record reported alongside a not-found hunk lookup
    pub fn not_found() -> Self {
        Self::default()
    }

    /// Recorded hunks always carry a header
    pub fn is_not_found(&self) -> bool {
        self.header.is_empty()
    }
}

/// Read-only view of one line within a hunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineInfo<'p> {
    pub origin: LineOrigin,
    pub content: Option<&'p [u8]>,
    pub content_len: usize,
    pub old_lineno: i64,
    pub new_lineno: i64,
}

impl LineInfo<'_> {
    /// The sentinel reported alongside a not-found line lookup
    pub fn not_found() -> Self {
        LineInfo {
            origin: LineOrigin::Context,
            content: None,
            content_len: 0,
            old_lineno: -1,
            new_lineno: -1,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.content.is_none()
    }
}

impl<'p> From<&'p Line> for LineInfo<'p> {
    fn from(line: &'p Line) -> Self {
        LineInfo {
            origin: line.origin,
            content: Some(&line.content),
            content_len: line.content.len(),
            old_lineno: line.oldno,
            new_lineno: line.newno,
        }
    }
}

/// Amortized capacity growth: multiply while small, add a fixed step once
/// large, never below the seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GrowthPolicy {
    seed: usize,
    max_step: usize,
    numerator: usize,
    denominator: usize,
}

impl GrowthPolicy {
    pub(crate) const fn new(
        seed: usize,
        max_step: usize,
        numerator: usize,
        denominator: usize,
    ) -> Self {
        GrowthPolicy {
            seed,
            max_step,
            numerator,
            denominator,
        }
    }

    pub(crate) fn next_capacity(&self, capacity: usize) -> usize {
        let grown = if capacity > self.max_step {
            capacity + self.max_step
        } else {
            capacity * self.numerator / self.denominator
        };

        grown.max(self.seed)
    }

    /// Make room for one more element.
    ///
    /// On failure the vector is untouched and still usable.
    pub(crate) fn reserve_one<T>(&self, items: &mut Vec<T>, what: &'static str) -> Result<()> {
        if items.len() < items.capacity() {
            return Ok(());
        }

        let additional = self.next_capacity(items.capacity()) - items.len();
        items
            .try_reserve_exact(additional)
            .map_err(|source| DiffError::Alloc { what, source })
    }
}

/// Appends engine events to a patch's hunk and line records
pub(crate) struct Accumulator<'p> {
    hunks: &'p mut Vec<Hunk>,
    lines: &'p mut Vec<Line>,
}

impl<'p> Accumulator<'p> {
    pub(crate) fn new(hunks: &'p mut Vec<Hunk>, lines: &'p mut Vec<Line>) -> Self {
        Accumulator { hunks, lines }
    }

    pub(crate) fn push_hunk(&mut self, range: &DiffRange, header: &[u8]) -> Result<()> {
        assert!(
            header.len() + 1 < HUNK_HEADER_CAPACITY,
            "hunk header of {} bytes exceeds {HUNK_HEADER_CAPACITY}",
            header.len()
        );

        HUNK_GROWTH.reserve_one(self.hunks, "hunk list")?;
        self.hunks.push(Hunk {
            range: *range,
            header: Bytes::copy_from_slice(header),
            line_start: self.lines.len(),
            line_count: 0,
        });

        Ok(())
    }

    /// Append a line to the most recently opened hunk.
    ///
    /// The first line of a hunk starts at the hunk's range. Every later line
    /// continues from its predecessor: an addition only advances the new
    /// number, a deletion only the old one, anything else both.
    pub(crate) fn push_line(&mut self, origin: LineOrigin, content: Bytes) -> Result<()> {
        let hunk = self
            .hunks
            .last_mut()
            .expect("line event received before any hunk was opened");

        LINE_GROWTH.reserve_one(self.lines, "line list")?;

        let (oldno, newno) = match self.lines.last() {
            Some(last) if hunk.line_count > 0 => {
                let step = last.lines as i64;
                match last.origin {
                    LineOrigin::Addition => (last.oldno, last.newno + step),
                    LineOrigin::Deletion => (last.oldno + step, last.newno),
                    _ => (last.oldno + step, last.newno + step),
                }
            }
            _ => (hunk.range.old_start as i64, hunk.range.new_start as i64),
        };

        let lines = content.iter().filter(|&&byte| byte == b'\n').count();
        self.lines.push(Line {
            origin,
            content,
            lines,
            oldno,
            newno,
        });
        hunk.line_count += 1;

        Ok(())
    }
}
