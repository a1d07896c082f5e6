// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Pure, store-independent invariant checks. Kept free of I/O so
//! both `agor-store`'s transaction code and standalone property tests can
//! call them without spinning up a database.

/// Spec invariant 2: `Message.index` is unique per session and forms a
/// dense monotonic sequence `[0..n)`.
pub fn message_indices_are_dense(mut indices: Vec<u64>) -> bool {
    indices.sort_unstable();
    indices.iter().enumerate().all(|(i, &idx)| idx == i as u64)
}

/// Spec invariant 3 (contiguity half): a task's `[start, end]` range must be
/// a sub-range of `[0, message_count)`.
pub fn task_range_is_contiguous(start: u64, end: Option<u64>, message_count: u64) -> bool {
    match end {
        Some(end) => start <= end && end < message_count,
        // Still running: only the start bound needs to be in range.
        None => start <= message_count,
    }
}

/// Spec invariant 3 (ordering half): tasks within a session have
/// non-overlapping ranges, ordered by id (here: by the order they are
/// passed in, which callers must supply in creation order).
pub fn ranges_are_non_overlapping(ranges: &[(u64, Option<u64>)]) -> bool {
    let mut prev_end: Option<u64> = None;
    for &(start, end) in ranges {
        if let Some(pe) = prev_end {
            if start <= pe {
                return false;
            }
        }
        prev_end = end.or(Some(start));
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_indices_pass() {
        assert!(message_indices_are_dense(vec![0, 1, 2, 3]));
        assert!(message_indices_are_dense(vec![3, 1, 0, 2]));
    }

    #[test]
    fn gap_in_indices_fails() {
        assert!(!message_indices_are_dense(vec![0, 1, 3]));
    }

    #[test]
    fn duplicate_index_fails() {
        assert!(!message_indices_are_dense(vec![0, 1, 1]));
    }

    #[test]
    fn empty_session_has_no_indices() {
        assert!(message_indices_are_dense(vec![]));
    }

    #[test]
    fn contiguous_closed_range_within_message_count() {
        assert!(task_range_is_contiguous(0, Some(2), 3));
        assert!(!task_range_is_contiguous(0, Some(3), 3));
    }

    #[test]
    fn open_range_only_checks_start() {
        assert!(task_range_is_contiguous(2, None, 2));
        assert!(!task_range_is_contiguous(5, None, 2));
    }

    #[test]
    fn non_overlapping_ranges_pass() {
        let ranges = [(0, Some(1)), (2, Some(4)), (5, None)];
        assert!(ranges_are_non_overlapping(&ranges));
    }

    #[test]
    fn overlapping_ranges_fail() {
        let ranges = [(0, Some(3)), (2, Some(4))];
        assert!(!ranges_are_non_overlapping(&ranges));
    }
}
