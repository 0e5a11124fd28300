//! Tag allocation for compiled graph queries
//!
//! A tag is the single-letter variable binding a node or relationship
//! endpoint inside one compiled query. Auto tags are drawn from a shrinking
//! pool of the 26 lowercase letters, so a query can never reuse one; running
//! out is a compile error.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;

use super::query::CompileError;

/// A query variable, e.g. the `a` in `(a:user)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(char);

impl Tag {
    /// Accepts any ASCII letter.
    pub fn new(c: char) -> Result<Self, CompileError> {
        if c.is_ascii_alphabetic() {
            Ok(Self(c))
        } else {
            Err(CompileError::InvalidTag(c))
        }
    }

    pub fn as_char(self) -> char {
        self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of fresh tags for one query.
#[derive(Debug, Clone)]
pub struct TagAllocator {
    /// Remaining letters; allocation pops from the end.
    pool: Vec<char>,
}

impl TagAllocator {
    /// Hands out `a`, `b`, `c`, … in order.
    pub fn sequential() -> Self {
        let mut pool: Vec<char> = ('a'..='z').collect();
        pool.reverse();
        Self { pool }
    }

    /// Hands out letters in an order drawn from `rng`.
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut pool: Vec<char> = ('a'..='z').collect();
        pool.shuffle(rng);
        Self { pool }
    }

    /// Remove a tag from the pool because the caller claimed it explicitly.
    pub fn reserve(&mut self, tag: Tag) {
        self.pool.retain(|c| *c != tag.as_char());
    }

    pub fn allocate(&mut self) -> Result<Tag, CompileError> {
        self.pool.pop().map(Tag).ok_or(CompileError::TagsExhausted)
    }

    pub fn remaining(&self) -> usize {
        self.pool.len()
    }
}

impl Default for TagAllocator {
    fn default() -> Self {
        Self::sequential()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn sequential_starts_at_a() {
        let mut tags = TagAllocator::sequential();
        assert_eq!(tags.allocate().unwrap(), Tag('a'));
        assert_eq!(tags.allocate().unwrap(), Tag('b'));
    }

    #[test]
    fn reserved_tags_are_skipped() {
        let mut tags = TagAllocator::sequential();
        tags.reserve(Tag('a'));
        assert_eq!(tags.allocate().unwrap(), Tag('b'));
    }

    #[test]
    fn shuffled_never_repeats_and_exhausts() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut tags = TagAllocator::shuffled(&mut rng);
        let mut seen = HashSet::new();
        for _ in 0..26 {
            assert!(seen.insert(tags.allocate().unwrap()));
        }
        assert!(matches!(tags.allocate(), Err(CompileError::TagsExhausted)));
    }

    #[test]
    fn same_seed_same_order() {
        let first: Vec<Tag> = {
            let mut tags = TagAllocator::shuffled(&mut StdRng::seed_from_u64(99));
            (0..5).map(|_| tags.allocate().unwrap()).collect()
        };
        let second: Vec<Tag> = {
            let mut tags = TagAllocator::shuffled(&mut StdRng::seed_from_u64(99));
            (0..5).map(|_| tags.allocate().unwrap()).collect()
        };
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_non_letters() {
        assert!(Tag::new('1').is_err());
        assert!(Tag::new('x').is_ok());
    }
}
