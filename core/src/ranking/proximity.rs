//! Minimum covering span over per-term position lists.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Smallest `max - min` over windows holding at least one position from every
/// list. Each list must be sorted ascending. `None` when there are no lists or
/// any list is empty.
///
/// k-way merge: a min-heap holds the current head of every list together with
/// the running maximum; popping the minimum and advancing its list is the only
/// move that can shrink the window.
pub fn min_covering_span(position_lists: &[&[u32]]) -> Option<u32> {
    if position_lists.is_empty() || position_lists.iter().any(|l| l.is_empty()) {
        return None;
    }

    let mut heap: BinaryHeap<Reverse<(u32, usize)>> = BinaryHeap::with_capacity(position_lists.len());
    let mut cursors = vec![0usize; position_lists.len()];
    let mut current_max = 0u32;
    for (list_idx, list) in position_lists.iter().enumerate() {
        heap.push(Reverse((list[0], list_idx)));
        current_max = current_max.max(list[0]);
    }

    let mut best = u32::MAX;
    while let Some(Reverse((current_min, list_idx))) = heap.pop() {
        best = best.min(current_max - current_min);
        if best == 0 {
            break;
        }
        cursors[list_idx] += 1;
        let Some(&next) = position_lists[list_idx].get(cursors[list_idx]) else {
            break;
        };
        current_max = current_max.max(next);
        heap.push(Reverse((next, list_idx)));
    }
    Some(best)
}

/// `1 / (1 + span)`; 1 for fewer than two lists, 0 when a term is missing.
pub fn proximity_score(position_lists: &[&[u32]]) -> f64 {
    if position_lists.len() <= 1 {
        return if position_lists.first().is_some_and(|l| l.is_empty()) { 0.0 } else { 1.0 };
    }
    match min_covering_span(position_lists) {
        Some(span) => 1.0 / (1.0 + span as f64),
        None => 0.0,
    }
}
