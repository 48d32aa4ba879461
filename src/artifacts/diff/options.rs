use crate::artifacts::diff::delta::{Delta, DeltaStatus};
use bitflags::bitflags;

/// Files above this size are not sampled for binary content by default
pub const MAX_DIFF_FILESIZE: u64 = 0x2000_0000;

pub const DEFAULT_CONTEXT_LINES: usize = 3;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DiffFlags: u32 {
        const REVERSE = 1 << 0;
        const FORCE_TEXT = 1 << 1;
        const SKIP_BINARY_CHECK = 1 << 2;
        const INCLUDE_UNTRACKED_CONTENT = 1 << 3;
        const INCLUDE_UNTRACKED = 1 << 4;
        const INCLUDE_IGNORED = 1 << 5;
        const INCLUDE_UNMODIFIED = 1 << 6;
        const IGNORE_WHITESPACE = 1 << 7;
        const IGNORE_WHITESPACE_CHANGE = 1 << 8;
        const IGNORE_WHITESPACE_EOL = 1 << 9;
    }
}

/// Upper bound on the size of files that get a binary content check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaxSize {
    #[default]
    Default,
    Unlimited,
    Bytes(u64),
}

impl MaxSize {
    pub fn threshold(&self) -> Option<u64> {
        match self {
            MaxSize::Default => Some(MAX_DIFF_FILESIZE),
            MaxSize::Unlimited => None,
            MaxSize::Bytes(0) => Some(MAX_DIFF_FILESIZE),
            MaxSize::Bytes(limit) => Some(*limit),
        }
    }
}

/// How whitespace differences are treated when lines are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhitespaceMode {
    #[default]
    Exact,
    IgnoreAll,
    IgnoreChange,
    IgnoreEol,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffOptions {
    pub flags: DiffFlags,
    pub context_lines: usize,
    pub interhunk_lines: usize,
    pub max_size: MaxSize,
}

impl Default for DiffOptions {
    fn default() -> Self {
        DiffOptions {
            flags: DiffFlags::empty(),
            context_lines: DEFAULT_CONTEXT_LINES,
            interhunk_lines: 0,
            max_size: MaxSize::Default,
        }
    }
}

impl DiffOptions {
    pub fn with_flags(mut self, flags: DiffFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_context_lines(mut self, context_lines: usize) -> Self {
        self.context_lines = context_lines;
        self
    }

    pub fn with_interhunk_lines(mut self, interhunk_lines: usize) -> Self {
        self.interhunk_lines = interhunk_lines;
        self
    }

    pub fn with_max_size(mut self, max_size: MaxSize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn has(&self, flag: DiffFlags) -> bool {
        self.flags.contains(flag)
    }

    /// The strongest whitespace rule requested wins
    pub fn whitespace(&self) -> WhitespaceMode {
        if self.has(DiffFlags::IGNORE_WHITESPACE) {
            WhitespaceMode::IgnoreAll
        } else if self.has(DiffFlags::IGNORE_WHITESPACE_CHANGE) {
            WhitespaceMode::IgnoreChange
        } else if self.has(DiffFlags::IGNORE_WHITESPACE_EOL) {
            WhitespaceMode::IgnoreEol
        } else {
            WhitespaceMode::Exact
        }
    }

    /// Status filters: unmodified, ignored and untracked deltas are opt-in
    pub fn should_skip(&self, delta: &Delta) -> bool {
        match delta.status {
            DeltaStatus::Unmodified => !self.has(DiffFlags::INCLUDE_UNMODIFIED),
            DeltaStatus::Ignored => !self.has(DiffFlags::INCLUDE_IGNORED),
            DeltaStatus::Untracked => !self.has(DiffFlags::INCLUDE_UNTRACKED),
            _ => false,
        }
    }
}
