//! # Runtime Primitives
//!
//! Per-predicate storage the evaluator operates on (spec.md §3, §4.5):
//! three [`TupleBuffer`]s (`base`, `delta`, `next`) plus an optional
//! [`HashIndex`] on argument 0.
//!
//! Grounded in the teacher's `hash_index::HashIndex`/`HashIndexManager`,
//! simplified from the teacher's multi-column composite-key index down to
//! spec.md §4.5's single-column index on argument 0 only — rulr never
//! plans joins, so there's no query-driven index selection to support.

use std::collections::HashMap;

use crate::value::Tuple;

/// A growable, insertion-ordered sequence of tuples (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct TupleBuffer {
    rows: Vec<Tuple>,
}

impl TupleBuffer {
    #[must_use]
    pub fn new() -> Self {
        TupleBuffer::default()
    }

    /// O(1) amortized append (spec.md §4.5).
    pub fn append(&mut self, t: Tuple) {
        self.rows.push(t);
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn get(&self, i: usize) -> Option<&Tuple> {
        self.rows.get(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.rows.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Tuple] {
        &self.rows
    }

    #[must_use]
    pub fn contains(&self, t: &Tuple) -> bool {
        self.rows.iter().any(|r| r == t)
    }
}

/// Chained hash index from argument 0's canonical integer key to the row
/// indices in `base` that carry it (spec.md §3, §4.5). Never indexes
/// `delta`/`next` — only `base` is looked up by key during body matching.
#[derive(Debug, Clone, Default)]
pub struct HashIndex {
    buckets: HashMap<i64, Vec<usize>>,
}

impl HashIndex {
    #[must_use]
    pub fn new() -> Self {
        HashIndex::default()
    }

    pub fn add(&mut self, key: i64, row: usize) {
        self.buckets.entry(key).or_default().push(row);
    }

    #[must_use]
    pub fn lookup(&self, key: i64) -> &[usize] {
        self.buckets.get(&key).map_or(&[], Vec::as_slice)
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}

/// Per-predicate storage: three buffers plus an optional argument-0 index
/// (spec.md §3).
#[derive(Debug, Clone)]
pub struct PredicateRuntime {
    pub arity: usize,
    pub stratum: u32,
    pub base: TupleBuffer,
    pub delta: TupleBuffer,
    pub next: TupleBuffer,
    pub index: Option<HashIndex>,
}

impl PredicateRuntime {
    #[must_use]
    pub fn new(arity: usize, stratum: u32) -> Self {
        PredicateRuntime {
            arity,
            stratum,
            base: TupleBuffer::new(),
            delta: TupleBuffer::new(),
            next: TupleBuffer::new(),
            index: if arity > 0 { Some(HashIndex::new()) } else { None },
        }
    }

    /// Insert into `base` if not already present, updating the index.
    /// Returns `true` if the tuple was newly inserted (spec.md §4.5
    /// `relation_base_insert_unique`).
    pub fn insert_base_unique(&mut self, t: Tuple) -> bool {
        if self.base.contains(&t) {
            return false;
        }
        if let Some(index) = &mut self.index {
            if let Some(key) = t.get(0) {
                index.add(key.index_key(), self.base.len());
            }
        }
        self.base.append(t);
        true
    }

    /// Insert into `next` if not already present there or in `base`
    /// (spec.md §4.5 `relation_next_insert_unique`). Checking `base` too is
    /// what makes the fixpoint loop's `changed` flag meaningful: `next` is
    /// cleared every iteration, so a rule driven off a fact already in
    /// `base` would otherwise "newly" insert the same tuple into `next` on
    /// every pass forever and the loop would never converge.
    pub fn insert_next_unique(&mut self, t: Tuple) -> bool {
        if self.next.contains(&t) || self.base.contains(&t) {
            return false;
        }
        self.next.append(t);
        true
    }

    /// Seed `delta` from `base` at the start of a stratum's fixpoint
    /// (spec.md §4.5 `relation_prepare_delta_from_base`).
    pub fn prepare_delta_from_base(&mut self) {
        self.delta = self.base.clone();
    }

    /// Promote every `next` tuple into `base`, then swap `delta` and
    /// `next`, then clear `next`. Returns `true` if anything was promoted
    /// (spec.md §4.5 `relation_promote_next`).
    pub fn promote_next(&mut self) -> bool {
        let mut promoted = false;
        let pending: Vec<Tuple> = self.next.iter().cloned().collect();
        for t in pending {
            if self.insert_base_unique(t) {
                promoted = true;
            }
        }
        std::mem::swap(&mut self.delta, &mut self.next);
        self.next.clear();
        promoted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn base_insert_dedupes() {
        let mut rt = PredicateRuntime::new(2, 0);
        assert!(rt.insert_base_unique(Tuple::new(vec![Value::Int(1), Value::Int(2)])));
        assert!(!rt.insert_base_unique(Tuple::new(vec![Value::Int(1), Value::Int(2)])));
        assert_eq!(rt.base.len(), 1);
    }

    #[test]
    fn promote_next_moves_tuples_into_base_and_rotates_delta() {
        let mut rt = PredicateRuntime::new(1, 0);
        rt.insert_next_unique(Tuple::new(vec![Value::Int(1)]));
        rt.insert_next_unique(Tuple::new(vec![Value::Int(2)]));
        assert!(rt.promote_next());
        assert_eq!(rt.base.len(), 2);
        assert_eq!(rt.delta.len(), 2); // old next, now delta
        assert!(rt.next.is_empty());
        assert!(!rt.promote_next()); // nothing new to promote
    }

    #[test]
    fn index_finds_rows_by_argument_zero() {
        let mut rt = PredicateRuntime::new(2, 0);
        rt.insert_base_unique(Tuple::new(vec![Value::Int(7), Value::Int(1)]));
        rt.insert_base_unique(Tuple::new(vec![Value::Int(7), Value::Int(2)]));
        let rows = rt.index.as_ref().unwrap().lookup(7);
        assert_eq!(rows, &[0, 1]);
    }
}
