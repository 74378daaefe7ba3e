use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

use crate::equivalence::EquivalentTerms;
use crate::error::EvaluationError;
use crate::program::{Atom, Predicate};
use crate::term::{Term, Tuple};

/// Key extracted from a tuple at a fixed list of positions
pub(crate) type Key = SmallVec<[Term; 4]>;

/// A duplicate-free set of tuples of one arity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    arity: usize,
    tuples: IndexSet<Tuple>,
}

impl Relation {
    /// An empty relation
    #[must_use]
    pub fn new(arity: usize) -> Self {
        Self {
            arity,
            tuples: IndexSet::new(),
        }
    }

    /// A relation holding just the zero-length tuple; the unit of joins
    #[must_use]
    pub fn unit() -> Self {
        let mut relation = Self::new(0);
        relation.tuples.insert(Tuple::empty());
        relation
    }

    /// Tuple length of every member
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Number of tuples
    #[must_use]
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    /// True when there are no tuples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Membership test
    #[must_use]
    pub fn contains(&self, tuple: &Tuple) -> bool {
        self.tuples.contains(tuple)
    }

    /// Tuples in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter()
    }

    /// Add a tuple; returns `true` if it was not already present
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::ArityMismatch`] if the tuple length differs from the relation arity
    pub fn insert(&mut self, tuple: Tuple, predicate: &Predicate) -> Result<bool, EvaluationError> {
        if tuple.arity() != self.arity {
            return Err(EvaluationError::ArityMismatch {
                predicate: predicate.clone(),
                found: tuple.arity(),
            });
        }
        Ok(self.tuples.insert(tuple))
    }

    /// Insert without an arity check; callers guarantee the arity
    pub(crate) fn push(&mut self, tuple: Tuple) -> bool {
        debug_assert_eq!(tuple.arity(), self.arity);
        self.tuples.insert(tuple)
    }

    /// Tuples sorted by term order, for deterministic comparison and display
    #[must_use]
    pub fn sorted(&self) -> Vec<Tuple> {
        let mut tuples: Vec<Tuple> = self.tuples.iter().cloned().collect();
        tuples.sort();
        tuples
    }

    /// Set equality, ignoring insertion order
    #[must_use]
    pub fn same_tuples(&self, other: &Relation) -> bool {
        self.arity == other.arity
            && self.len() == other.len()
            && self.tuples.iter().all(|t| other.contains(t))
    }

    /// Hash index on the given positions
    pub(crate) fn index(&self, positions: &[usize]) -> Index {
        let mut map: IndexMap<Key, Vec<Tuple>> = IndexMap::new();
        for tuple in &self.tuples {
            map.entry(make_key(tuple, positions))
                .or_default()
                .push(tuple.clone());
        }
        Index { map }
    }

    fn canonicalize(&mut self, equivalence: &dyn EquivalentTerms) -> bool {
        let before = self.tuples.len();
        let mut changed = false;
        self.tuples = self
            .tuples
            .iter()
            .map(|tuple| {
                let canonical: Tuple = tuple.iter().map(|t| equivalence.canonical(t)).collect();
                changed |= canonical != *tuple;
                canonical
            })
            .collect();
        changed || self.tuples.len() != before
    }
}

impl<'a> IntoIterator for &'a Relation {
    type Item = &'a Tuple;
    type IntoIter = indexmap::set::Iter<'a, Tuple>;

    fn into_iter(self) -> Self::IntoIter {
        self.tuples.iter()
    }
}

pub(crate) fn make_key(tuple: &Tuple, positions: &[usize]) -> Key {
    positions.iter().map(|&p| tuple[p].clone()).collect()
}

/// Tuples grouped by the terms at a fixed list of positions
#[derive(Debug)]
pub(crate) struct Index {
    map: IndexMap<Key, Vec<Tuple>>,
}

impl Index {
    pub(crate) fn get(&self, key: &Key) -> &[Tuple] {
        self.map.get(key).map_or(&[][..], Vec::as_slice)
    }

    pub(crate) fn contains_key(&self, key: &Key) -> bool {
        self.map.contains_key(key)
    }
}

/// The fact store: one relation per predicate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Facts {
    relations: IndexMap<Predicate, Relation>,
}

impl Facts {
    /// An empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The relation of `predicate`, if any tuple was ever stored for it
    #[must_use]
    pub fn get(&self, predicate: &Predicate) -> Option<&Relation> {
        self.relations.get(predicate)
    }

    /// The relation of `predicate`, created empty on first use
    pub fn relation_mut(&mut self, predicate: &Predicate) -> &mut Relation {
        self.relations
            .entry(predicate.clone())
            .or_insert_with(|| Relation::new(predicate.arity()))
    }

    /// Number of tuples stored for `predicate`
    #[must_use]
    pub fn count(&self, predicate: &Predicate) -> usize {
        self.get(predicate).map_or(0, Relation::len)
    }

    /// Add a ground fact; returns `true` if it is new
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::NonGroundFact`] if the atom contains variables
    pub fn add(&mut self, atom: Atom) -> Result<bool, EvaluationError> {
        if !atom.is_ground() {
            return Err(EvaluationError::NonGroundFact {
                predicate: atom.predicate,
            });
        }
        let Atom { predicate, tuple } = atom;
        self.relation_mut(&predicate).insert(tuple, &predicate)
    }

    /// Add a tuple; returns `true` if it is new
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::ArityMismatch`] on a tuple of the wrong length
    pub fn insert(&mut self, predicate: &Predicate, tuple: Tuple) -> Result<bool, EvaluationError> {
        self.relation_mut(predicate).insert(tuple, predicate)
    }

    /// Union `tuples` into `predicate`'s relation and return only the tuples that were new
    pub(crate) fn merge(
        &mut self,
        predicate: &Predicate,
        tuples: &Relation,
    ) -> Result<Relation, EvaluationError> {
        if tuples.arity() != predicate.arity() {
            return Err(EvaluationError::ArityMismatch {
                predicate: predicate.clone(),
                found: tuples.arity(),
            });
        }
        let target = self.relation_mut(predicate);
        let mut added = Relation::new(tuples.arity());
        for tuple in tuples {
            if target.push(tuple.clone()) {
                added.push(tuple.clone());
            }
        }
        Ok(added)
    }

    /// All predicates with a relation, in first-use order
    pub fn predicates(&self) -> impl Iterator<Item = &Predicate> {
        self.relations.keys()
    }

    /// `(predicate, relation)` pairs in first-use order
    pub fn iter(&self) -> impl Iterator<Item = (&Predicate, &Relation)> {
        self.relations.iter()
    }

    /// Total number of tuples across all predicates
    #[must_use]
    pub fn total_tuples(&self) -> usize {
        self.relations.values().map(Relation::len).sum()
    }

    /// True when no predicate holds a tuple
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.relations.values().all(Relation::is_empty)
    }

    /// Set equality per predicate; empty and missing relations are equal
    #[must_use]
    pub fn same_facts(&self, other: &Facts) -> bool {
        let covers = |a: &Facts, b: &Facts| {
            a.relations.iter().all(|(predicate, relation)| match b.get(predicate) {
                Some(theirs) => relation.same_tuples(theirs),
                None => relation.is_empty(),
            })
        };
        covers(self, other) && covers(other, self)
    }

    /// Rewrite every stored term to its class representative; returns `true` if anything changed
    pub(crate) fn canonicalize(&mut self, equivalence: &dyn EquivalentTerms) -> bool {
        if equivalence.is_identity() {
            return false;
        }
        let mut changed = false;
        for relation in self.relations.values_mut() {
            changed |= relation.canonicalize(equivalence);
        }
        changed
    }
}
