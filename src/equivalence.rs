//! Term equivalence classes asserted by rule head equality.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::term::{Constructed, Term};

/// Equivalence relation over ground terms
pub trait EquivalentTerms: fmt::Debug {
    /// The representative of `term`'s class
    fn canonical(&self, term: &Term) -> Term;

    /// Merge the classes of `a` and `b`; returns `true` if they were distinct
    fn set_equivalent(&mut self, a: &Term, b: &Term) -> bool;

    /// True when `canonical` is always the identity, so callers can skip it
    fn is_identity(&self) -> bool {
        false
    }
}

/// Treats every term as equivalent only to itself
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreTermEquivalence;

impl EquivalentTerms for IgnoreTermEquivalence {
    fn canonical(&self, term: &Term) -> Term {
        term.clone()
    }

    fn set_equivalent(&mut self, _a: &Term, _b: &Term) -> bool {
        false
    }

    fn is_identity(&self) -> bool {
        true
    }
}

/// Union-find over terms; the smallest term of a class is its representative
#[derive(Debug, Default, Clone)]
pub struct UnionFindTerms {
    parent: IndexMap<Term, Term>,
}

impl UnionFindTerms {
    /// An empty relation
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of terms that are not their own representative
    #[must_use]
    pub fn merged_terms(&self) -> usize {
        self.parent.len()
    }

    fn find(&self, term: &Term) -> Term {
        let mut current = term;
        while let Some(next) = self.parent.get(current) {
            current = next;
        }
        current.clone()
    }
}

impl EquivalentTerms for UnionFindTerms {
    fn canonical(&self, term: &Term) -> Term {
        if self.parent.is_empty() {
            return term.clone();
        }
        let root = self.find(term);
        match root {
            Term::Constructed(c) => {
                let args = c.args.iter().map(|arg| self.canonical(arg)).collect();
                self.find(&Term::Constructed(Constructed {
                    functor: Arc::clone(&c.functor),
                    args,
                }))
            }
            other => other,
        }
    }

    fn set_equivalent(&mut self, a: &Term, b: &Term) -> bool {
        let ra = self.canonical(a);
        let rb = self.canonical(b);
        if ra == rb {
            return false;
        }
        let (keep, drop) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent.insert(drop, keep);
        true
    }
}
