//! Relational operators of a compiled rule.
//!
//! Every operator maps the rows accumulated so far (one column per bound
//! variable, in binding order) to a new set of rows.

use std::sync::Arc;

use log::trace;
use smallvec::SmallVec;

use crate::builtin::Builtin;
use crate::equivalence::EquivalentTerms;
use crate::error::{BuiltinError, EvaluationError};
use crate::program::{Atom, Predicate};
use crate::relation::{make_key, Relation};
use crate::term::{Term, Tuple, Variable};

pub(crate) type Positions = SmallVec<[usize; 4]>;

/// Look up `variable` in a row whose columns are `variables`
fn binding(variables: &[Variable], row: &Tuple, variable: &Variable) -> Option<Term> {
    variables
        .iter()
        .position(|bound| bound == variable)
        .map(|index| row[index].clone())
}

/// Positions of the shared variables in `left` and `right`, in `left` order
fn shared_positions(left: &[Variable], right: &[Variable]) -> (Positions, Positions) {
    left.iter()
        .enumerate()
        .filter_map(|(l, variable)| {
            right
                .iter()
                .position(|other| other == variable)
                .map(|r| (l, r))
        })
        .unzip()
}

/// Stored tuples of one literal, filtered by its constants and repeated variables,
/// projected onto its distinct variables
#[derive(Debug, Clone)]
pub(crate) struct View {
    pub(crate) predicate: Predicate,
    pattern: Tuple,
    pub(crate) variables: Vec<Variable>,
    /// The pattern is just distinct variables: every tuple matches unchanged
    identity: bool,
}

impl View {
    pub(crate) fn new(atom: &Atom) -> Self {
        let variables = atom.variables();
        let identity = variables.len() == atom.tuple.arity()
            && atom.tuple.iter().all(|term| matches!(term, Term::Variable(_)));
        Self {
            predicate: atom.predicate.clone(),
            pattern: atom.tuple.clone(),
            variables,
            identity,
        }
    }

    pub(crate) fn select(
        &self,
        relation: Option<&Relation>,
        equivalence: &dyn EquivalentTerms,
    ) -> Relation {
        let Some(relation) = relation else {
            return Relation::new(self.variables.len());
        };
        if self.identity {
            return relation.clone();
        }

        let pattern: Vec<Term> = self
            .pattern
            .iter()
            .map(|term| {
                if term.is_ground() {
                    equivalence.canonical(term)
                } else {
                    term.clone()
                }
            })
            .collect();

        let mut out = Relation::new(self.variables.len());
        let mut matched = Vec::with_capacity(self.variables.len());
        for tuple in relation {
            matched.clear();
            if pattern
                .iter()
                .zip(tuple.iter())
                .all(|(term, ground)| term.match_ground(ground, &mut matched))
            {
                // Bindings arrive in first-occurrence order, the order of `variables`
                out.push(matched.iter().map(|(_, value)| value.clone()).collect());
            }
        }
        out
    }
}

/// Equi-join of the accumulated rows with a view on their shared variables
#[derive(Debug, Clone)]
pub(crate) struct Join {
    pub(crate) view: View,
    left: Positions,
    right: Positions,
    appended: Positions,
    arity: usize,
}

impl Join {
    pub(crate) fn new(view: View, bound: &[Variable]) -> Self {
        let (left, right) = shared_positions(bound, &view.variables);
        let appended: Positions = (0..view.variables.len())
            .filter(|position| !right.contains(position))
            .collect();
        let arity = bound.len() + appended.len();
        Self {
            view,
            left,
            right,
            appended,
            arity,
        }
    }

    pub(crate) fn new_variables(&self) -> impl Iterator<Item = &Variable> {
        self.appended.iter().map(|&p| &self.view.variables[p])
    }

    pub(crate) fn apply(
        &self,
        input: &Relation,
        relation: Option<&Relation>,
        equivalence: &dyn EquivalentTerms,
    ) -> Relation {
        let mut out = Relation::new(self.arity);
        let right = self.view.select(relation, equivalence);
        if right.is_empty() {
            return out;
        }
        let index = right.index(&self.right);
        for row in input {
            for matched in index.get(&make_key(row, &self.left)) {
                out.push(row.extended(self.appended.iter().map(|&p| matched[p].clone())));
            }
        }
        out
    }
}

/// Drops the rows that have a match in a negated literal's view
///
/// View variables that are not bound yet are existential.
#[derive(Debug, Clone)]
pub(crate) struct AntiJoin {
    pub(crate) view: View,
    left: Positions,
    right: Positions,
}

impl AntiJoin {
    pub(crate) fn new(view: View, bound: &[Variable]) -> Self {
        let (left, right) = shared_positions(bound, &view.variables);
        Self { view, left, right }
    }

    pub(crate) fn apply(
        &self,
        input: Relation,
        relation: Option<&Relation>,
        equivalence: &dyn EquivalentTerms,
    ) -> Relation {
        let right = self.view.select(relation, equivalence);
        if right.is_empty() {
            return input;
        }
        let index = right.index(&self.right);
        let mut out = Relation::new(input.arity());
        for row in &input {
            if !index.contains_key(&make_key(row, &self.left)) {
                out.push(row.clone());
            }
        }
        out
    }
}

/// A built-in literal used as a filter, or as a function extending each row
#[derive(Debug, Clone)]
pub(crate) struct BuiltinFilter {
    builtin: Arc<dyn Builtin>,
    predicate: Predicate,
    positive: bool,
    pattern: Tuple,
    bound: Vec<Variable>,
    /// Position computed by the built-in, if one variable is still unbound
    output: Option<usize>,
}

impl BuiltinFilter {
    pub(crate) fn new(
        builtin: Arc<dyn Builtin>,
        atom: &Atom,
        positive: bool,
        bound: &[Variable],
        output: Option<usize>,
    ) -> Self {
        Self {
            builtin,
            predicate: atom.predicate.clone(),
            positive,
            pattern: atom.tuple.clone(),
            bound: bound.to_vec(),
            output,
        }
    }

    pub(crate) fn computed_variable(&self) -> Option<&Variable> {
        match self.output.map(|position| &self.pattern[position]) {
            Some(Term::Variable(variable)) => Some(variable),
            _ => None,
        }
    }

    /// Arguments and computed values are compared as class representatives
    pub(crate) fn apply(
        &self,
        input: &Relation,
        equivalence: &dyn EquivalentTerms,
    ) -> Result<Relation, EvaluationError> {
        let arity = self.bound.len() + usize::from(self.output.is_some());
        let mut out = Relation::new(arity);
        for row in input {
            let lookup = |variable: &Variable| binding(&self.bound, row, variable);
            let args: Vec<Term> = self
                .pattern
                .iter()
                .map(|term| equivalence.canonical(&term.substitute(&lookup)))
                .collect();
            match self.evaluate(&args) {
                Ok(Outcome::Keep) => {
                    out.push(row.clone());
                }
                Ok(Outcome::Extend(value)) => {
                    out.push(row.extended([equivalence.canonical(&value)]));
                }
                Ok(Outcome::Drop) => {}
                Err(BuiltinError::TypeMismatch(message)) => {
                    trace!("{} dropped row {row}: {message}", self.predicate);
                }
                Err(BuiltinError::Fatal(message)) => {
                    return Err(EvaluationError::Builtin {
                        predicate: self.predicate.clone(),
                        message,
                    });
                }
            }
        }
        Ok(out)
    }

    fn evaluate(&self, args: &[Term]) -> Result<Outcome, BuiltinError> {
        match self.output {
            None if self.builtin.test(args)? == self.positive => Ok(Outcome::Keep),
            None => Ok(Outcome::Drop),
            Some(output) => Ok(self
                .builtin
                .compute(args, output)?
                .map_or(Outcome::Drop, Outcome::Extend)),
        }
    }
}

enum Outcome {
    Keep,
    Extend(Term),
    Drop,
}

/// Produces the rule's output tuples from the final rows
#[derive(Debug, Clone)]
pub(crate) struct HeadSubstituter {
    pattern: Tuple,
    bound: Vec<Variable>,
}

impl HeadSubstituter {
    pub(crate) fn new(pattern: Tuple, bound: &[Variable]) -> Self {
        Self {
            pattern,
            bound: bound.to_vec(),
        }
    }

    pub(crate) fn arity(&self) -> usize {
        self.pattern.arity()
    }

    pub(crate) fn apply(&self, rows: &Relation, equivalence: &dyn EquivalentTerms) -> Relation {
        let mut out = Relation::new(self.pattern.arity());
        for row in rows {
            let lookup = |variable: &Variable| binding(&self.bound, row, variable);
            out.push(
                self.pattern
                    .iter()
                    .map(|term| equivalence.canonical(&term.substitute(&lookup)))
                    .collect(),
            );
        }
        out
    }
}
