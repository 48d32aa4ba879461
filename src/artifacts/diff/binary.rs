//! Binary classification of delta sides
//!
//! Each side is classified at most once: the outcome is written back into the
//! side's [`FileFlags`] and rolled up into [`Delta::binary`], so later checks
//! return immediately. Three layers apply in order:
//!
//! - the force-text override
//! - the size heuristic (no content needed)
//! - the content heuristic over a leading sample

use crate::artifacts::diff::delta::{Binary, Delta, FileFlags, Side};
use crate::artifacts::diff::options::{DiffFlags, DiffOptions};
use tracing::trace;

/// How much of a buffer the content heuristic looks at
pub const BINARY_SAMPLE_LEN: usize = 4000;

/// NUL anywhere in the sample, or more than one non-printable byte per 128
/// printable ones, makes content binary.
pub fn is_binary_content(sample: &[u8]) -> bool {
    let sample = &sample[..sample.len().min(BINARY_SAMPLE_LEN)];
    let mut printable = 0usize;
    let mut nonprintable = 0usize;

    for &byte in sample {
        match byte {
            b'\0' => return true,
            0x20..=0x7e | 0x80..=0xff => printable += 1,
            b'\t' | b'\n' | b'\r' | 0x0b | 0x0c => {}
            _ => nonprintable += 1,
        }
    }

    (printable >> 7) < nonprintable
}

/// The user override, applied before any heuristic.
///
/// Under force-text a known classification of the old side is mirrored onto
/// the new side and every side still unclassified is taken as text.
pub(crate) fn classify_by_override(delta: &mut Delta, options: &DiffOptions) {
    if options.has(DiffFlags::FORCE_TEXT) {
        let known = delta.old_file.flags & FileFlags::KNOWN_BINARY;
        delta.new_file.flags |= known;

        for side in [Side::Old, Side::New] {
            let file = delta.file_mut(side);
            if !file.flags.is_classified() {
                file.flags |= FileFlags::NOT_BINARY;
            }
        }
    }

    delta.update_binary();
}

/// Classify one side without looking at its content.
///
/// Submodule links are never binary, sides without data cannot be binary, and
/// files above the configured threshold are treated as text.
pub(crate) fn classify_by_size(delta: &mut Delta, side: Side, options: &DiffOptions) {
    let threshold = options.max_size.threshold();
    let file = delta.file_mut(side);

    if !file.flags.is_classified() {
        let oversized = threshold.is_some_and(|limit| file.size > limit);

        if file.mode.is_commit() || file.has_no_data() || oversized {
            trace!(path = %file.path.display(), oversized, "classified as text without sampling");
            file.flags |= FileFlags::NOT_BINARY;
        }
    }

    delta.update_binary();
}

/// Classify one side from a sample of its loaded content
pub(crate) fn classify_by_content(delta: &mut Delta, side: Side, content: &[u8]) {
    let file = delta.file_mut(side);

    if !file.flags.is_classified() {
        if !file.mode.is_commit() && is_binary_content(content) {
            file.flags |= FileFlags::BINARY;
        } else {
            file.flags |= FileFlags::NOT_BINARY;
        }
    }

    delta.update_binary();
}

/// Classify one side of a delta, sampling `content` only when the cheaper
/// checks are inconclusive.
///
/// Directories are not applicable and report [`Binary::Unknown`]. Repeated
/// calls return the memoized answer.
pub fn classify(
    delta: &mut Delta,
    side: Side,
    options: &DiffOptions,
    content: Option<&[u8]>,
) -> Binary {
    if delta.file(side).mode.is_tree() {
        return Binary::Unknown;
    }

    classify_by_size(delta, side, options);

    if let Some(content) = content
        && !delta.file(side).flags.is_classified()
    {
        classify_by_content(delta, side, content);
    }

    delta.file(side).binary()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::diff::delta::{DeltaStatus, DiffFile, FileMode};
    use crate::artifacts::diff::options::MaxSize;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn delta() -> Delta {
        Delta::new(
            DeltaStatus::Modified,
            DiffFile::unhashed("file.txt", FileMode::Blob),
            DiffFile::unhashed("file.txt", FileMode::Blob),
        )
    }

    #[rstest]
    #[case(b"plain text\nwith lines\n".as_slice(), false)]
    #[case(b"has a \0 byte".as_slice(), true)]
    #[case(b"caf\xc3\xa9 na\xc3\xafve\n".as_slice(), false)]
    #[case(b"\x01\x02\x03\x04\x05\x06".as_slice(), true)]
    #[case(b"".as_slice(), false)]
    fn content_heuristic(#[case] sample: &[u8], #[case] expected: bool) {
        assert_eq!(is_binary_content(sample), expected);
    }

    #[test]
    fn nul_past_the_sample_is_not_seen() {
        let mut content = vec![b'a'; BINARY_SAMPLE_LEN];
        content.push(b'\0');

        assert!(!is_binary_content(&content));
    }

    #[rstest]
    fn nul_content_marks_side_and_delta_binary(mut delta: Delta) {
        let outcome = classify(&mut delta, Side::New, &DiffOptions::default(), Some(b"\0\x01"));

        assert_eq!(outcome, Binary::Binary);
        assert_eq!(delta.binary, Binary::Binary);
    }

    #[rstest]
    fn classification_is_memoized(mut delta: Delta) {
        let options = DiffOptions::default();
        classify(&mut delta, Side::Old, &options, Some(b"text\n"));

        let again = classify(&mut delta, Side::Old, &options, Some(b"\0"));

        assert_eq!(again, Binary::NotBinary);
    }

    #[rstest]
    fn oversized_file_is_text_without_sampling(mut delta: Delta) {
        let options = DiffOptions::default().with_max_size(MaxSize::Bytes(4));
        delta.new_file.size = 5;

        assert_eq!(classify(&mut delta, Side::New, &options, None), Binary::NotBinary);
    }

    #[rstest]
    fn unlimited_size_leaves_large_file_unclassified(mut delta: Delta) {
        let options = DiffOptions::default().with_max_size(MaxSize::Unlimited);
        delta.new_file.size = u64::MAX;

        assert_eq!(classify(&mut delta, Side::New, &options, None), Binary::Unknown);
    }

    #[rstest]
    fn no_data_side_is_text(mut delta: Delta) {
        delta.old_file.flags |= FileFlags::NO_DATA;

        let outcome = classify(&mut delta, Side::Old, &DiffOptions::default(), None);

        assert_eq!(outcome, Binary::NotBinary);
    }

    #[rstest]
    fn submodule_link_is_never_binary(mut delta: Delta) {
        delta.new_file.mode = FileMode::Commit;

        let outcome = classify(&mut delta, Side::New, &DiffOptions::default(), Some(b"\0"));

        assert_eq!(outcome, Binary::NotBinary);
    }

    #[rstest]
    fn directories_are_not_applicable(mut delta: Delta) {
        delta.old_file.mode = FileMode::Tree;

        let outcome = classify(&mut delta, Side::Old, &DiffOptions::default(), Some(b"\0"));

        assert_eq!(outcome, Binary::Unknown);
        assert!(!delta.old_file.flags.is_classified());
    }

    #[rstest]
    fn force_text_mirrors_known_old_side(mut delta: Delta) {
        delta.old_file.flags |= FileFlags::BINARY;
        let options = DiffOptions::default().with_flags(DiffFlags::FORCE_TEXT);

        classify_by_override(&mut delta, &options);

        assert!(delta.new_file.is_binary());
        assert_eq!(delta.binary, Binary::Binary);
    }

    #[rstest]
    fn force_text_makes_unclassified_sides_text(mut delta: Delta) {
        let options = DiffOptions::default().with_flags(DiffFlags::FORCE_TEXT);

        classify_by_override(&mut delta, &options);
        let outcome = classify(&mut delta, Side::New, &options, Some(b"\0"));

        assert_eq!(outcome, Binary::NotBinary);
        assert_eq!(delta.binary, Binary::NotBinary);
    }
}
