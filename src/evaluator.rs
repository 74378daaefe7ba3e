//! Semi-naive, stratum-by-stratum evaluation to the least fixpoint.

use indexmap::IndexMap;
use log::{debug, info, trace};

use crate::builtin::BuiltinRegistry;
use crate::compiler::{CompiledRule, RuleCompiler};
use crate::config::Configuration;
use crate::equivalence::{EquivalentTerms, UnionFindTerms};
use crate::error::EvaluationError;
use crate::program::{Predicate, Rule};
use crate::relation::{Facts, Relation};
use crate::safety::SafetyChecker;
use crate::stratify::stratify_with;

/// Where a stratum's evaluation stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationState {
    /// Every rule is evaluated once over the full relations
    Seeding,
    /// Rules are re-evaluated against the previous iteration's new tuples only
    Iterating,
    /// Nothing new was derived; the stratum's relations are final
    Fixed,
}

/// Fixpoint loop over the compiled rules of one stratum
#[derive(Debug, Clone)]
pub struct SemiNaiveEvaluator {
    rules: Vec<CompiledRule>,
    state: EvaluationState,
    iteration: usize,
    deltas: Facts,
}

/// Outcome of evaluating a batch of rules
struct Derived {
    /// New tuples per head predicate, already merged into the facts
    added: Facts,
    /// Whether an equality head merged two classes
    merged: bool,
}

impl SemiNaiveEvaluator {
    /// A stratum ready for seeding
    #[must_use]
    pub fn new(rules: Vec<CompiledRule>) -> Self {
        Self {
            rules,
            state: EvaluationState::Seeding,
            iteration: 0,
            deltas: Facts::new(),
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> EvaluationState {
        self.state
    }

    /// Number of completed `Iterating` steps
    #[must_use]
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// The compiled rules of this stratum
    #[must_use]
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Tuples derived for the first time by the last step
    #[must_use]
    pub fn deltas(&self) -> &Facts {
        &self.deltas
    }

    /// Back to `Seeding` with no deltas
    pub fn reset(&mut self) {
        self.state = EvaluationState::Seeding;
        self.iteration = 0;
        self.deltas = Facts::new();
    }

    /// Run one `Seeding` or `Iterating` step, merging new tuples into `facts`
    ///
    /// When an equality head merges two classes, every relation is rewritten to
    /// canonical terms and the stratum starts over from `Seeding`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a rule
    pub fn step(
        &mut self,
        facts: &mut Facts,
        equivalence: &mut dyn EquivalentTerms,
    ) -> Result<EvaluationState, EvaluationError> {
        let derived = match self.state {
            EvaluationState::Fixed => return Ok(EvaluationState::Fixed),
            EvaluationState::Seeding => {
                let mut pending: IndexMap<Predicate, Relation> = IndexMap::new();
                let mut merged = false;
                for rule in &self.rules {
                    let out = rule.evaluate(facts, equivalence)?;
                    if rule.has_head_equality() {
                        merged |= assert_equivalent(&out, equivalence);
                    } else {
                        let target = pending
                            .entry(rule.head_predicate().clone())
                            .or_insert_with(|| Relation::new(out.arity()));
                        for tuple in &out {
                            target.push(tuple.clone());
                        }
                    }
                }
                let mut added = Facts::new();
                if !merged {
                    for (predicate, relation) in &pending {
                        let new = facts.merge(predicate, relation)?;
                        added.merge(predicate, &new)?;
                    }
                }
                Derived { added, merged }
            }
            EvaluationState::Iterating => {
                let mut added = Facts::new();
                let mut merged = false;
                for rule in &self.rules {
                    if !rule
                        .body_predicates()
                        .any(|predicate| self.deltas.count(predicate) > 0)
                    {
                        continue;
                    }
                    let out = rule.evaluate_iteratively(facts, &self.deltas, equivalence)?;
                    if rule.has_head_equality() {
                        merged |= assert_equivalent(&out, equivalence);
                    } else {
                        let new = facts.merge(rule.head_predicate(), &out)?;
                        added.merge(rule.head_predicate(), &new)?;
                    }
                }
                self.iteration += 1;
                Derived { added, merged }
            }
        };

        if derived.merged {
            facts.canonicalize(&*equivalence);
            debug!("term classes merged; restarting stratum");
            self.reset();
            return Ok(self.state);
        }

        trace!(
            "{:?} step {} derived {} new tuples",
            self.state,
            self.iteration,
            derived.added.total_tuples()
        );
        self.state = if derived.added.is_empty() {
            EvaluationState::Fixed
        } else {
            EvaluationState::Iterating
        };
        self.deltas = derived.added;
        Ok(self.state)
    }
}

fn assert_equivalent(pairs: &Relation, equivalence: &mut dyn EquivalentTerms) -> bool {
    let mut merged = false;
    for pair in pairs {
        if let [lhs, rhs] = &pair[..] {
            merged |= equivalence.set_equivalent(lhs, rhs);
        }
    }
    merged
}

/// Progress report of one [`Evaluation::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Level of the stratum that was stepped
    pub stratum: usize,
    /// That stratum's state after the step
    pub state: EvaluationState,
    /// That stratum's completed iterations
    pub iteration: usize,
}

#[derive(Debug, Clone)]
struct StratumEvaluation {
    level: usize,
    evaluator: SemiNaiveEvaluator,
}

/// A whole program's evaluation, advanced one step at a time
///
/// Each stratum runs to `Fixed` before the next one starts. When an equality head
/// merges two term classes, the input facts are rewritten to representatives and
/// evaluation starts over from the lowest stratum, keeping the classes found so far.
/// Callers that need a deadline or a size bound check it between steps; see
/// [`crate::limits::run_with_limits`].
#[derive(Debug, Clone)]
pub struct Evaluation {
    input: Facts,
    facts: Facts,
    strata: Vec<StratumEvaluation>,
    current: usize,
    equivalence: UnionFindTerms,
}

impl Evaluation {
    /// Check, stratify and compile `rules`
    ///
    /// # Errors
    ///
    /// [`EvaluationError::Unsafe`], [`EvaluationError::NotStratified`], or a compile error
    pub fn new(
        facts: Facts,
        rules: &[Rule],
        configuration: &Configuration,
        builtins: &BuiltinRegistry,
    ) -> Result<Self, EvaluationError> {
        let checker = SafetyChecker::new(configuration.safety, builtins);
        for rule in rules {
            checker.check(rule)?;
        }

        let compiler = RuleCompiler::new(configuration, builtins);
        let strata = stratify_with(rules, &configuration.stratifiers)?
            .into_iter()
            .map(|stratum| {
                let compiled = stratum
                    .rules
                    .iter()
                    .map(|rule| compiler.compile(rule))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(StratumEvaluation {
                    level: stratum.level,
                    evaluator: SemiNaiveEvaluator::new(compiled),
                })
            })
            .collect::<Result<Vec<_>, EvaluationError>>()?;

        debug!("{} rules in {} strata", rules.len(), strata.len());
        Ok(Self {
            input: facts.clone(),
            facts,
            strata,
            current: 0,
            equivalence: UnionFindTerms::new(),
        })
    }

    /// Advance the current stratum by one step
    ///
    /// Once finished, further calls change nothing and report `Fixed`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a rule
    pub fn step(&mut self) -> Result<Progress, EvaluationError> {
        let Some(stratum) = self.strata.get_mut(self.current) else {
            return Ok(Progress {
                stratum: self.strata.last().map_or(0, |s| s.level),
                state: EvaluationState::Fixed,
                iteration: 0,
            });
        };
        if stratum.evaluator.state() == EvaluationState::Seeding
            && stratum.evaluator.iteration() == 0
        {
            debug!(
                "evaluating stratum {} ({} rules)",
                stratum.level,
                stratum.evaluator.rules().len()
            );
        }

        let merged_before = self.equivalence.merged_terms();
        let state = stratum
            .evaluator
            .step(&mut self.facts, &mut self.equivalence)?;
        let progress = Progress {
            stratum: stratum.level,
            state,
            iteration: stratum.evaluator.iteration(),
        };

        if self.equivalence.merged_terms() != merged_before {
            self.restart();
        } else if state == EvaluationState::Fixed {
            debug!(
                "stratum {} fixed after {} iterations",
                stratum.level,
                stratum.evaluator.iteration()
            );
            self.current += 1;
            if self.is_finished() {
                info!(
                    "fixpoint reached: {} strata, {} tuples",
                    self.strata.len(),
                    self.facts.total_tuples()
                );
            }
        }
        Ok(progress)
    }

    /// Rebuild the facts from the input under the current classes and re-seed every stratum
    fn restart(&mut self) {
        debug!(
            "{} terms merged; restarting from the lowest stratum",
            self.equivalence.merged_terms()
        );
        self.facts = self.input.clone();
        self.facts.canonicalize(&self.equivalence);
        for stratum in &mut self.strata {
            stratum.evaluator.reset();
        }
        self.current = 0;
    }

    /// True once every stratum is `Fixed`
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.current >= self.strata.len()
    }

    /// The facts derived so far
    #[must_use]
    pub fn facts(&self) -> &Facts {
        &self.facts
    }

    /// Term classes asserted by equality heads so far
    #[must_use]
    pub fn equivalence(&self) -> &UnionFindTerms {
        &self.equivalence
    }

    /// Step until finished
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a rule
    pub fn run(&mut self) -> Result<(), EvaluationError> {
        while !self.is_finished() {
            self.step()?;
        }
        Ok(())
    }

    /// The facts, consuming the evaluation
    #[must_use]
    pub fn into_facts(self) -> Facts {
        self.facts
    }

    /// The facts and the asserted term classes, consuming the evaluation
    #[must_use]
    pub fn into_parts(self) -> (Facts, UnionFindTerms) {
        (self.facts, self.equivalence)
    }
}

/// Compute the minimal model of `rules` over `facts` with the default configuration
/// and no registered built-ins
///
/// # Errors
///
/// See [`run_program_with`]
pub fn run_program(facts: Facts, rules: &[Rule]) -> Result<Facts, EvaluationError> {
    run_program_with(facts, rules, &Configuration::default(), &BuiltinRegistry::new())
}

/// Compute the minimal model of `rules` over `facts`
///
/// # Errors
///
/// [`EvaluationError::Unsafe`] for an unsafe rule, [`EvaluationError::NotStratified`]
/// when no configured stratifier succeeds, a compile error, or a fatal built-in failure
pub fn run_program_with(
    facts: Facts,
    rules: &[Rule],
    configuration: &Configuration,
    builtins: &BuiltinRegistry,
) -> Result<Facts, EvaluationError> {
    let mut evaluation = Evaluation::new(facts, rules, configuration, builtins)?;
    evaluation.run()?;
    Ok(evaluation.into_facts())
}
