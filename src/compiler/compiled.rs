use log::trace;

use crate::equivalence::EquivalentTerms;
use crate::error::EvaluationError;
use crate::program::{Predicate, Rule};
use crate::relation::{Facts, Relation};
use crate::term::Variable;

use super::elements::{AntiJoin, BuiltinFilter, HeadSubstituter, Join, View};

/// One operator of a compiled rule body
#[derive(Debug, Clone)]
pub(crate) enum RuleElement {
    /// First stored literal: selects from its relation
    View(View),
    /// Later stored literal: joins on shared variables
    Join(Join),
    /// Negated stored literal
    AntiJoin(AntiJoin),
    /// Built-in test or function
    Builtin(BuiltinFilter),
}

impl RuleElement {
    /// The predicate read positively from the facts, if any
    fn positive_source(&self) -> Option<&Predicate> {
        match self {
            RuleElement::View(view) => Some(&view.predicate),
            RuleElement::Join(join) => Some(&join.view.predicate),
            RuleElement::AntiJoin(_) | RuleElement::Builtin(_) => None,
        }
    }
}

/// Which relation each element reads: the full facts, except for one element reading a delta
#[derive(Clone, Copy)]
struct Sources<'a> {
    facts: &'a Facts,
    delta: Option<(usize, &'a Relation)>,
}

impl<'a> Sources<'a> {
    fn relation(&self, element: usize, predicate: &Predicate) -> Option<&'a Relation> {
        match self.delta {
            Some((position, delta)) if position == element => Some(delta),
            _ => self.facts.get(predicate),
        }
    }
}

/// A rule (or query) compiled into a pipeline of relational operators
///
/// A compiled rule holds no facts; every evaluation reads the relations it is given.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub(crate) rule: Rule,
    pub(crate) elements: Vec<RuleElement>,
    pub(crate) head: HeadSubstituter,
    pub(crate) output_variables: Vec<Variable>,
}

impl CompiledRule {
    /// The rule this was compiled from, with its body in source order
    #[must_use]
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    /// The predicate of the produced tuples
    #[must_use]
    pub fn head_predicate(&self) -> &Predicate {
        self.rule.head_predicate()
    }

    /// True when the output tuples are term pairs to be made equivalent
    #[must_use]
    pub fn has_head_equality(&self) -> bool {
        self.rule.has_head_equality()
    }

    /// Variables of the head, in order of first occurrence; a query's answer columns
    #[must_use]
    pub fn output_variables(&self) -> &[Variable] {
        &self.output_variables
    }

    /// Predicates read positively, in pipeline order
    pub fn body_predicates(&self) -> impl Iterator<Item = &Predicate> {
        self.elements.iter().filter_map(RuleElement::positive_source)
    }

    /// Run the pipeline over the full relations of `facts`
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::Builtin`] if a built-in fails fatally
    pub fn evaluate(
        &self,
        facts: &Facts,
        equivalence: &dyn EquivalentTerms,
    ) -> Result<Relation, EvaluationError> {
        self.run(Sources { facts, delta: None }, equivalence)
    }

    /// Semi-naive evaluation: once per positive literal whose predicate has a delta,
    /// read that literal from `deltas` and everything else from `facts`, and union the results
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::Builtin`] if a built-in fails fatally
    pub fn evaluate_iteratively(
        &self,
        facts: &Facts,
        deltas: &Facts,
        equivalence: &dyn EquivalentTerms,
    ) -> Result<Relation, EvaluationError> {
        let mut out = Relation::new(self.head.arity());
        for (position, element) in self.elements.iter().enumerate() {
            let Some(delta) = element
                .positive_source()
                .and_then(|predicate| deltas.get(predicate))
                .filter(|delta| !delta.is_empty())
            else {
                continue;
            };
            let derived = self.run(
                Sources {
                    facts,
                    delta: Some((position, delta)),
                },
                equivalence,
            )?;
            for tuple in &derived {
                out.push(tuple.clone());
            }
        }
        Ok(out)
    }

    fn run(
        &self,
        sources: Sources<'_>,
        equivalence: &dyn EquivalentTerms,
    ) -> Result<Relation, EvaluationError> {
        let mut rows = Relation::unit();
        for (position, element) in self.elements.iter().enumerate() {
            if rows.is_empty() {
                break;
            }
            rows = match element {
                RuleElement::View(view) => {
                    view.select(sources.relation(position, &view.predicate), equivalence)
                }
                RuleElement::Join(join) => join.apply(
                    &rows,
                    sources.relation(position, &join.view.predicate),
                    equivalence,
                ),
                RuleElement::AntiJoin(anti) => anti.apply(
                    rows,
                    sources.relation(position, &anti.view.predicate),
                    equivalence,
                ),
                RuleElement::Builtin(builtin) => builtin.apply(&rows, equivalence)?,
            };
        }
        let out = self.head.apply(&rows, equivalence);
        trace!("{} produced {} tuples", self.rule, out.len());
        Ok(out)
    }
}
