use rustc_hash::FxHashSet;
use std::iter;

pub const DEFAULT_SHINGLE_SIZE: usize = 3;

///
/// Collects every distinct run of `k` consecutive characters in `text`.
/// Text shorter than `k` characters has no shingles.
///
pub fn shingles(text: &str, k: usize) -> FxHashSet<&str> {
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(iter::once(text.len()))
        .collect();
    let char_count = bounds.len() - 1;
    if k == 0 || char_count < k {
        return FxHashSet::default();
    }
    (0..=char_count - k)
        .map(|start| &text[bounds[start]..bounds[start + k]])
        .collect()
}
