//! Compiles rules and queries into pipelines of relational operators.
//!
//! Body literals are placed one at a time: at each step the compiler takes the
//! first remaining literal that can run with the variables bound so far. A
//! negated literal waits until its variables are bound, and a built-in waits
//! until at most one of its variables is unbound and that one is computable.

mod compiled;
mod elements;

use std::sync::Arc;

use crate::builtin::{Builtin, BuiltinRegistry};
use crate::config::Configuration;
use crate::error::{EvaluationError, RuleUnsafe, UnsafeReason};
use crate::program::{Literal, Query, Rule};
use crate::term::{Term, Variable};

pub use compiled::CompiledRule;
use compiled::RuleElement;
use elements::{AntiJoin, BuiltinFilter, HeadSubstituter, Join, View};

/// Compiles rules against a configuration and a built-in registry
#[derive(Debug, Clone, Copy)]
pub struct RuleCompiler<'a> {
    configuration: &'a Configuration,
    builtins: &'a BuiltinRegistry,
}

impl<'a> RuleCompiler<'a> {
    /// Create a compiler
    #[must_use]
    pub fn new(configuration: &'a Configuration, builtins: &'a BuiltinRegistry) -> Self {
        Self {
            configuration,
            builtins,
        }
    }

    /// Compile one rule
    ///
    /// # Errors
    ///
    /// - [`EvaluationError::HeadEqualityDisabled`] for an equality head when rule head equality is off
    /// - [`EvaluationError::UnknownBuiltin`] or [`EvaluationError::BuiltinArity`] for an unresolvable built-in
    /// - the error of the last literal tried when no remaining literal can be placed
    /// - [`EvaluationError::Unsafe`] when a head variable is never bound
    pub fn compile(&self, rule: &Rule) -> Result<CompiledRule, EvaluationError> {
        if rule.has_head_equality() && !self.configuration.rule_head_equality {
            return Err(EvaluationError::HeadEqualityDisabled {
                rule: rule.to_string(),
            });
        }

        let mut remaining: Vec<(&Literal, Option<Arc<dyn Builtin>>)> = rule
            .body
            .iter()
            .map(|literal| {
                let builtin = if literal.builtin {
                    Some(self.builtins.resolve(literal.predicate())?)
                } else {
                    None
                };
                Ok((literal, builtin))
            })
            .collect::<Result<_, EvaluationError>>()?;

        let mut bound: Vec<Variable> = Vec::new();
        let mut elements: Vec<RuleElement> = Vec::new();

        while !remaining.is_empty() {
            let mut placed = None;
            let mut last_error = None;
            for (index, (literal, builtin)) in remaining.iter().enumerate() {
                let others = remaining
                    .iter()
                    .enumerate()
                    .filter(|(other, _)| *other != index)
                    .map(|(_, (literal, _))| *literal);
                match self.element(literal, builtin.as_ref(), &bound, others, elements.is_empty()) {
                    Ok(element) => {
                        placed = Some((index, element));
                        break;
                    }
                    Err(error) => last_error = Some(error),
                }
            }
            let (index, element) = match (placed, last_error) {
                (Some(placed), _) => placed,
                (None, Some(error)) => return Err(error),
                (None, None) => break,
            };
            remaining.remove(index);
            extend_bound(&mut bound, &element);
            elements.push(element);
        }

        let output_variables = rule.head.atom.variables();
        if let Some(variable) = output_variables.iter().find(|v| !bound.contains(v)) {
            return Err(RuleUnsafe {
                rule: rule.to_string(),
                variable: variable.clone(),
                reason: UnsafeReason::Unlimited,
            }
            .into());
        }

        Ok(CompiledRule {
            rule: rule.clone(),
            elements,
            head: HeadSubstituter::new(rule.head.atom.tuple.clone(), &bound),
            output_variables,
        })
    }

    /// Compile a query as a rule whose head lists the answer variables
    ///
    /// # Errors
    ///
    /// As [`RuleCompiler::compile`]
    pub fn compile_query(&self, query: &Query) -> Result<CompiledRule, EvaluationError> {
        self.compile(&query.as_rule())
    }

    fn element<'l>(
        &self,
        literal: &Literal,
        builtin: Option<&Arc<dyn Builtin>>,
        bound: &[Variable],
        mut others: impl Iterator<Item = &'l Literal>,
        first: bool,
    ) -> Result<RuleElement, EvaluationError> {
        let unbound: Vec<Variable> = literal
            .atom
            .variables()
            .into_iter()
            .filter(|variable| !bound.contains(variable))
            .collect();

        if let Some(builtin) = builtin {
            return builtin_element(literal, builtin, bound, &unbound);
        }

        if literal.positive {
            let view = View::new(&literal.atom);
            return Ok(if first {
                RuleElement::View(view)
            } else {
                RuleElement::Join(Join::new(view, bound))
            });
        }

        if !unbound.is_empty() {
            let existential = self.configuration.safety.allow_unlimited_variables_in_negation
                && !others.any(|other| {
                    other
                        .atom
                        .variables()
                        .iter()
                        .any(|variable| unbound.contains(variable))
                });
            if !existential {
                return Err(EvaluationError::UnboundNegation {
                    literal: literal.to_string(),
                    variables: unbound,
                });
            }
        }
        Ok(RuleElement::AntiJoin(AntiJoin::new(
            View::new(&literal.atom),
            bound,
        )))
    }
}

fn builtin_element(
    literal: &Literal,
    builtin: &Arc<dyn Builtin>,
    bound: &[Variable],
    unbound: &[Variable],
) -> Result<RuleElement, EvaluationError> {
    let output = match unbound {
        [] => None,
        [variable] if literal.positive => {
            let position = computed_position(literal, builtin.as_ref(), variable).ok_or_else(|| {
                EvaluationError::NotComputable {
                    builtin: literal.to_string(),
                    variable: variable.clone(),
                }
            })?;
            Some(position)
        }
        _ if literal.positive => {
            return Err(EvaluationError::TooManyUnboundVariables {
                builtin: literal.to_string(),
                variables: unbound.to_vec(),
            })
        }
        _ => {
            return Err(EvaluationError::UnboundNegation {
                literal: literal.to_string(),
                variables: unbound.to_vec(),
            })
        }
    };
    Ok(RuleElement::Builtin(BuiltinFilter::new(
        Arc::clone(builtin),
        &literal.atom,
        literal.positive,
        bound,
        output,
    )))
}

/// The single top-level position of `variable`, if the built-in can compute it there
fn computed_position(literal: &Literal, builtin: &dyn Builtin, variable: &Variable) -> Option<usize> {
    let mut position = None;
    for (index, term) in literal.atom.tuple.iter().enumerate() {
        match term {
            Term::Variable(v) if v == variable => {
                if position.replace(index).is_some() {
                    return None;
                }
            }
            Term::Constructed(_) if term_mentions(term, variable) => return None,
            _ => {}
        }
    }
    position.filter(|&index| builtin.computes(index))
}

fn term_mentions(term: &Term, variable: &Variable) -> bool {
    let mut variables = Vec::new();
    term.collect_variables(&mut variables);
    variables.contains(variable)
}

fn extend_bound(bound: &mut Vec<Variable>, element: &RuleElement) {
    match element {
        RuleElement::View(view) => bound.extend(view.variables.iter().cloned()),
        RuleElement::Join(join) => {
            let added: Vec<Variable> = join.new_variables().cloned().collect();
            bound.extend(added);
        }
        RuleElement::Builtin(builtin) => {
            if let Some(variable) = builtin.computed_variable() {
                bound.push(variable.clone());
            }
        }
        RuleElement::AntiJoin(_) => {}
    }
}

/// Compile a rule with the default configuration and no registered built-ins
///
/// Facts are not needed up front: the compiled rule reads relations when it is evaluated.
///
/// # Errors
///
/// As [`RuleCompiler::compile`]
pub fn compile(rule: &Rule) -> Result<CompiledRule, EvaluationError> {
    let configuration = Configuration::default();
    let builtins = BuiltinRegistry::new();
    RuleCompiler::new(&configuration, &builtins).compile(rule)
}

/// Compile a query with the default configuration and no registered built-ins
///
/// # Errors
///
/// As [`RuleCompiler::compile`]
pub fn compile_query(query: &Query) -> Result<CompiledRule, EvaluationError> {
    compile(&query.as_rule())
}
