//! String interning with insertion-order id semantics (spec.md §4.2).
//!
//! Every distinct byte string seen by the store — path components, mostly —
//! is stored exactly once in a byte arena; callers hold a small `StringId`
//! instead of copying the bytes around. Unlike the C original's two-level
//! `node pool -> string pool` indirection, a `StringId` here is simply the
//! offset of that string's `(offset, len)` span in its own small arena —
//! one indirection, not two, since Rust's ownership already gives us the
//! "never move once allocated" property the C version needed the node pool
//! for.
//!
//! Lookup reuses [`crate::treap::Treap`], the same ordered-index
//! abstraction directories are built from, but ordered by the *bytes* a
//! `StringId` refers to rather than by its numeric value — the two orders
//! coincide only by coincidence of insertion sequence. Directory ordering
//! (spec.md §8 invariant 3) is explicitly defined over id/insertion order,
//! never over these bytes, so the two treaps must never be confused for
//! one another.

use std::cmp::Ordering;

use crate::arena::{Arena, NIL};
use crate::error::Result;
use crate::treap::{priority_of, Treap, TreapNode};

/// A handle to an interned byte string. Ordering by `StringId` value is
/// insertion order, not lexicographic order (spec.md §8 invariant 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StringId(pub u32);

/// A `(start, length)` slice into the interner's byte arena. Persisted via
/// [`crate::record::Record`] alongside the other fixed-size record types.
#[derive(Debug, Clone, Copy)]
pub struct Span {
    pub offset: u32,
    pub len: u32,
}

/// Free function (rather than a method) so callers can borrow it alongside
/// a disjoint `&mut` borrow of another field of [`Interner`] — see
/// [`Interner::insert_into_lookup`].
fn span_bytes<'a>(bytes: &'a Arena<u8>, spans: &Arena<Span>, id: StringId) -> &'a [u8] {
    let span = spans.get(id.0).expect("dangling StringId");
    &bytes.as_slice()[span.offset as usize..(span.offset + span.len) as usize]
}

/// The interner: a byte arena, a span table addressed by `StringId`, and a
/// lookup treap ordering spans by their bytes.
#[derive(Debug)]
pub struct Interner {
    bytes: Arena<u8>,
    spans: Arena<Span>,
    lookup_root: u32,
    lookup: Treap<StringId, ()>,
    next_priority: u32,
}

impl Default for Interner {
    fn default() -> Self {
        Interner::with_capacity(4096)
    }
}

impl Interner {
    pub fn with_capacity(capacity: usize) -> Self {
        Interner {
            bytes: Arena::with_capacity(capacity),
            spans: Arena::with_capacity(capacity / 8),
            lookup_root: NIL,
            lookup: Treap::with_capacity(capacity / 8),
            next_priority: 0,
        }
    }

    fn span_bytes(&self, id: StringId) -> &[u8] {
        span_bytes(&self.bytes, &self.spans, id)
    }

    /// The bytes `id` was interned from.
    pub fn fetch(&self, id: StringId) -> &str {
        std::str::from_utf8(self.span_bytes(id)).expect("interned string was not valid UTF-8")
    }

    /// Find `needle` in the lookup index by walking its own tree directly
    /// (rather than through [`Treap::search_by`]) since, before interning,
    /// `needle` has no `StringId` of its own to compare with the generic
    /// `Fn(&StringId, &StringId)` comparator that every other caller uses.
    fn find(&self, needle: &[u8]) -> Option<StringId> {
        let mut off = self.lookup_root;
        let arena = self.lookup.arena();
        while off != NIL {
            let node: &TreapNode<StringId, ()> = arena.get(off).expect("dangling treap offset");
            match needle.cmp(self.span_bytes(node.key)) {
                Ordering::Less => off = node.left,
                Ordering::Greater => off = node.right,
                Ordering::Equal => return Some(node.key),
            }
        }
        None
    }

    /// Insert `id` into the lookup index. Split out of [`Interner::intern`]
    /// and [`Interner::recover`] so both can borrow `bytes`/`spans` and
    /// `lookup` as the disjoint fields they are, rather than going through
    /// a `&self` method — a closure that calls back into a `self` method
    /// would have to borrow all of `self`, which conflicts with the
    /// simultaneous `&mut self.lookup` the insert itself needs.
    fn insert_into_lookup(&mut self, id: StringId) -> Result<()> {
        let priority = priority_of(self.next_priority);
        self.next_priority += 1;
        let committed = self.lookup.committed();
        let bytes = &self.bytes;
        let spans = &self.spans;
        let (new_root, _) = self.lookup.set_by(
            self.lookup_root,
            id,
            (),
            priority,
            committed,
            |a, b| span_bytes(bytes, spans, *a).cmp(span_bytes(bytes, spans, *b)),
        )?;
        self.lookup_root = new_root;
        Ok(())
    }

    /// Intern `s`, returning its existing id if already present or a fresh
    /// one otherwise. Interning the same bytes twice always yields the same
    /// id (spec.md §4.2's canonicalization guarantee).
    pub fn intern(&mut self, s: &str) -> Result<StringId> {
        let bytes = s.as_bytes();
        if let Some(id) = self.find(bytes) {
            return Ok(id);
        }

        let offset = self.bytes.len();
        for b in bytes {
            self.bytes.push(*b)?;
        }
        let span_off = self.spans.push(Span {
            offset,
            len: bytes.len() as u32,
        })?;
        let id = StringId(span_off);

        self.insert_into_lookup(id)?;
        Ok(id)
    }

    /// Rebuild an interner from a recovered byte arena and span table
    /// (spec.md §6: "the interned-string index is rebuilt in memory at
    /// startup by re-inserting every known string"). `bytes` and `spans`
    /// are typically the result of [`crate::arena::Arena::recover`].
    pub fn recover(bytes: Arena<u8>, spans: Arena<Span>) -> Result<Self> {
        let committed = spans.committed();
        let mut interner = Interner {
            bytes,
            spans,
            lookup_root: NIL,
            lookup: Treap::with_capacity(committed as usize),
            next_priority: 0,
        };
        let ids: Vec<StringId> = interner
            .spans
            .iter_committed()
            .map(|(offset, _)| StringId(offset))
            .collect();
        for id in ids {
            interner.insert_into_lookup(id)?;
        }
        interner.lookup.commit();
        Ok(interner)
    }

    /// Raw byte arena, for checkpointing (spec.md §6).
    pub fn bytes_arena_mut(&mut self) -> &mut Arena<u8> {
        &mut self.bytes
    }

    /// Span table arena, for checkpointing.
    pub fn spans_arena_mut(&mut self) -> &mut Arena<Span> {
        &mut self.spans
    }

    /// Number of distinct strings interned so far.
    pub fn len(&self) -> u32 {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Seal the current state: everything interned so far becomes part of
    /// the immutable, shareable prefix.
    pub fn commit(&mut self) {
        self.bytes.commit();
        self.spans.commit();
        self.lookup.commit();
    }

    pub fn reset(&mut self) {
        self.bytes.reset();
        self.spans.reset();
        self.lookup.reset();
        self.lookup_root = NIL;
        self.next_priority = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_same_string_twice_yields_same_id() {
        let mut interner = Interner::default();
        let a = interner.intern("trunk").unwrap();
        let b = interner.intern("trunk").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_strings_get_distinct_ids() {
        let mut interner = Interner::default();
        let a = interner.intern("trunk").unwrap();
        let b = interner.intern("branches").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn fetch_round_trips_bytes() {
        let mut interner = Interner::default();
        let id = interner.intern("README.md").unwrap();
        assert_eq!(interner.fetch(id), "README.md");
    }

    #[test]
    fn ids_reflect_insertion_order_not_lexicographic_order() {
        let mut interner = Interner::default();
        let z = interner.intern("zzz").unwrap();
        let a = interner.intern("aaa").unwrap();
        // "aaa" sorts before "zzz" lexicographically, but was interned second.
        assert!(z.0 < a.0);
    }

    #[test]
    fn many_strings_all_found_after_interning() {
        let mut interner = Interner::default();
        let names: Vec<String> = (0..300).map(|i| format!("file-{i}.txt")).collect();
        let ids: Vec<StringId> = names.iter().map(|n| interner.intern(n).unwrap()).collect();
        for (name, id) in names.iter().zip(ids.iter()) {
            assert_eq!(interner.fetch(*id), name);
        }
        // Re-interning must not grow the table.
        let before = interner.len();
        for name in &names {
            interner.intern(name).unwrap();
        }
        assert_eq!(interner.len(), before);
    }
}
