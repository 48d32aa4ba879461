use derive_new::new;
use similar::{Algorithm, DiffTag};
use std::hash::Hash;

/// One step of an edit script, by position in the old (`a`) and new (`b`)
/// sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    Delete { a: usize },
    Insert { b: usize },
    Equal { a: usize, b: usize },
}

impl Edit {
    pub fn is_change(&self) -> bool {
        !matches!(self, Edit::Equal { .. })
    }
}

pub trait DiffAlgorithm {
    fn diff(&self) -> Vec<Edit>;
}

/// Myers' shortest edit script in linear space
///
/// Within every run of changes between two equal elements, deletions come
/// before insertions.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct MyersDiff<'d, T> {
    a: &'d [T],
    b: &'d [T],
}

impl<T: Eq + Hash + Ord> DiffAlgorithm for MyersDiff<'_, T> {
    fn diff(&self) -> Vec<Edit> {
        let ops = similar::capture_diff_slices(Algorithm::Myers, self.a, self.b);

        let mut edits = Vec::with_capacity(self.a.len().max(self.b.len()));
        let mut inserts = Vec::new();

        for op in ops {
            let (tag, old_range, new_range) = op.as_tag_tuple();
            match tag {
                DiffTag::Equal => {
                    edits.append(&mut inserts);
                    edits.extend(
                        old_range
                            .zip(new_range)
                            .map(|(a, b)| Edit::Equal { a, b }),
                    );
                }
                DiffTag::Delete => edits.extend(old_range.map(|a| Edit::Delete { a })),
                DiffTag::Insert => inserts.extend(new_range.map(|b| Edit::Insert { b })),
                DiffTag::Replace => {
                    edits.extend(old_range.map(|a| Edit::Delete { a }));
                    inserts.extend(new_range.map(|b| Edit::Insert { b }));
                }
            }
        }
        edits.append(&mut inserts);

        edits
    }
}
