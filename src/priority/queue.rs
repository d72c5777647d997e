//! Score-ordered instrument queue
//!
//! Indexed binary max-heap with a code-to-slot map for O(log n) update and
//! remove and O(1) membership checks. The heap array is only partially
//! ordered, so `get_top` extracts candidates and sorts them explicitly
//! before returning.

use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Entry {
    code: String,
    score: f64,
}

#[derive(Default)]
struct Heap {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl Heap {
    fn update(&mut self, code: &str, score: f64) {
        match self.index.get(code).copied() {
            Some(pos) => {
                let old = self.entries[pos].score;
                self.entries[pos].score = score;
                if score > old {
                    self.sift_up(pos);
                } else if score < old {
                    self.sift_down(pos);
                }
            }
            None => {
                let pos = self.entries.len();
                self.entries.push(Entry {
                    code: code.to_string(),
                    score,
                });
                self.index.insert(code.to_string(), pos);
                self.sift_up(pos);
            }
        }
    }

    fn remove(&mut self, code: &str) -> bool {
        let Some(pos) = self.index.remove(code) else {
            return false;
        };
        // Swap the raw entries only: going through `swap` would re-index the
        // element about to be popped.
        let last = self.entries.len() - 1;
        self.entries.swap(pos, last);
        self.entries.pop();
        if pos < self.entries.len() {
            self.index.insert(self.entries[pos].code.clone(), pos);
            // The element moved into `pos` may belong in either direction.
            self.sift_up(pos);
            self.sift_down(pos);
        }
        true
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.entries.swap(a, b);
        self.index.insert(self.entries[a].code.clone(), a);
        self.index.insert(self.entries[b].code.clone(), b);
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.entries[pos].score <= self.entries[parent].score {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * pos + 1;
            let right = 2 * pos + 2;
            let mut largest = pos;
            if left < len && self.entries[left].score > self.entries[largest].score {
                largest = left;
            }
            if right < len && self.entries[right].score > self.entries[largest].score {
                largest = right;
            }
            if largest == pos {
                break;
            }
            self.swap(pos, largest);
            pos = largest;
        }
    }
}

/// Ranks tracked instruments by importance score
pub struct PriorityQueue {
    heap: RwLock<Heap>,
}

impl PriorityQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            heap: RwLock::new(Heap::default()),
        }
    }

    /// Insert an instrument or reposition it under a fresh score
    pub fn update(&self, code: &str, score: f64) {
        self.heap.write().update(code, score);
    }

    /// Remove an instrument, returning whether it was tracked
    pub fn remove(&self, code: &str) -> bool {
        self.heap.write().remove(code)
    }

    /// Whether the instrument is tracked
    pub fn contains(&self, code: &str) -> bool {
        self.heap.read().index.contains_key(code)
    }

    /// The n highest-scoring instruments in strictly non-increasing score
    /// order, without mutating the queue
    pub fn get_top(&self, n: usize) -> Vec<(String, f64)> {
        let heap = self.heap.read();
        let mut candidates: Vec<(String, f64)> = heap
            .entries
            .iter()
            .map(|e| (e.code.clone(), e.score))
            .collect();
        drop(heap);
        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(n);
        candidates
    }

    /// The lowest score currently tracked, if any
    pub fn lowest_score(&self) -> Option<f64> {
        let heap = self.heap.read();
        heap.entries
            .iter()
            .map(|e| e.score)
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Number of tracked instruments
    pub fn len(&self) -> usize {
        self.heap.read().entries.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.heap.read().entries.is_empty()
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}
