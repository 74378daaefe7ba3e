//! Stratification: order the rules so that negation never looks forward.
//!
//! The global stratifier assigns a level to every rule-head predicate and
//! raises levels until every positive dependency points to the same or a lower
//! level and every negative dependency to a strictly lower one. A level above
//! the number of head predicates can only come from a cycle through negation.
//!
//! The local stratifier does the same per rule, and only counts a dependency on
//! a rule whose head can actually match the body literal. `p(?X) :- q(?X), not p('a').`
//! is rejected globally, but accepted locally when no rule for `p` can derive `p('a')`.

use indexmap::{IndexMap, IndexSet};
use log::debug;

use crate::config::StratifierKind;
use crate::error::NotStratified;
use crate::program::{Literal, Predicate, Rule};

/// A group of rules evaluated together, after every lower level is complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stratum {
    /// Evaluation order; higher levels run later
    pub level: usize,
    /// The rules of this level, in program order
    pub rules: Vec<Rule>,
}

/// Stratify with the global (per-predicate) algorithm
///
/// # Errors
///
/// Returns [`NotStratified`] if the rules contain a cycle through negation
pub fn stratify(rules: &[Rule]) -> Result<Vec<Stratum>, NotStratified> {
    GlobalStratifier::new(rules).run()
}

/// Try each stratifier in turn and return the first success
///
/// An empty list behaves like `[Global]`.
///
/// # Errors
///
/// Returns the last stratifier's [`NotStratified`] if none succeeds
pub fn stratify_with(
    rules: &[Rule],
    stratifiers: &[StratifierKind],
) -> Result<Vec<Stratum>, NotStratified> {
    let mut last_error = None;
    for kind in stratifiers {
        let result = match kind {
            StratifierKind::Global => GlobalStratifier::new(rules).run(),
            StratifierKind::Local => local_stratify(rules),
        };
        match result {
            Ok(strata) => {
                debug!("{kind:?} stratifier produced {} strata", strata.len());
                return Ok(strata);
            }
            Err(error) => {
                debug!("{kind:?} stratifier failed: {error}");
                last_error = Some(error);
            }
        }
    }
    match last_error {
        Some(error) => Err(error),
        None => stratify(rules),
    }
}

fn ordinary_body(rule: &Rule) -> impl Iterator<Item = &Literal> {
    rule.body.iter().filter(|literal| !literal.builtin)
}

struct GlobalStratifier<'a> {
    rules: &'a [Rule],
    levels: IndexMap<Predicate, usize>,
}

impl<'a> GlobalStratifier<'a> {
    fn new(rules: &'a [Rule]) -> Self {
        let levels = rules
            .iter()
            .map(|rule| (rule.head_predicate().clone(), 1))
            .collect();
        Self { rules, levels }
    }

    /// Base facts are level 0; they are complete before any rule runs
    fn level(&self, predicate: &Predicate) -> usize {
        self.levels.get(predicate).copied().unwrap_or(0)
    }

    fn run(mut self) -> Result<Vec<Stratum>, NotStratified> {
        let bound = self.levels.len();
        let mut highest = usize::from(bound > 0);
        let mut changed = true;

        while changed && highest <= bound {
            changed = false;
            for rule in self.rules {
                let head = rule.head_predicate();
                for literal in ordinary_body(rule) {
                    let body_level = self.level(literal.predicate());
                    let head_level = self.level(head);
                    let required = if literal.positive {
                        body_level
                    } else {
                        body_level + 1
                    };
                    if head_level < required {
                        self.levels.insert(head.clone(), required);
                        highest = highest.max(required);
                        changed = true;
                    }
                }
            }
        }

        if highest > bound {
            return Err(NotStratified {
                predicates: negative_cycle_predicates(self.rules),
            });
        }

        let mut groups: IndexMap<usize, Vec<Rule>> = IndexMap::new();
        for rule in self.rules {
            groups
                .entry(self.level(rule.head_predicate()))
                .or_default()
                .push(rule.clone());
        }
        Ok(into_strata(groups))
    }
}

fn into_strata(groups: IndexMap<usize, Vec<Rule>>) -> Vec<Stratum> {
    let mut strata: Vec<Stratum> = groups
        .into_iter()
        .map(|(level, rules)| Stratum { level, rules })
        .collect();
    strata.sort_by_key(|stratum| stratum.level);
    strata
}

/// Head predicates that lie on a dependency cycle containing a negative edge
fn negative_cycle_predicates(rules: &[Rule]) -> Vec<Predicate> {
    let mut edges: IndexMap<&Predicate, IndexSet<&Predicate>> = IndexMap::new();
    for rule in rules {
        edges.entry(rule.head_predicate()).or_default().extend(
            ordinary_body(rule).map(Literal::predicate),
        );
    }
    let reaches = |from: &Predicate, to: &Predicate| {
        let mut seen: IndexSet<&Predicate> = IndexSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if seen.insert(current) {
                if let Some(next) = edges.get(current) {
                    stack.extend(next.iter().copied());
                }
            }
        }
        false
    };

    let mut on_cycle: IndexSet<Predicate> = IndexSet::new();
    for rule in rules {
        let head = rule.head_predicate();
        for literal in ordinary_body(rule).filter(|literal| !literal.positive) {
            let body = literal.predicate();
            if !reaches(body, head) {
                continue;
            }
            for candidate in edges.keys() {
                if reaches(body, candidate) && reaches(candidate, head) {
                    on_cycle.insert((*candidate).clone());
                }
            }
        }
    }
    on_cycle.into_iter().collect()
}

/// Whether some fact derived by `rule` could match `literal`
fn head_matches(rule: &Rule, literal: &Literal) -> bool {
    rule.head_predicate() == literal.predicate()
        && rule
            .head
            .atom
            .tuple
            .iter()
            .zip(literal.atom.tuple.iter())
            .all(|(head, body)| head.may_unify(body))
}

fn local_stratify(rules: &[Rule]) -> Result<Vec<Stratum>, NotStratified> {
    // For each rule, (rule it depends on, positive?)
    let dependencies: Vec<Vec<(usize, bool)>> = rules
        .iter()
        .map(|rule| {
            ordinary_body(rule)
                .flat_map(|literal| {
                    rules
                        .iter()
                        .enumerate()
                        .filter(move |(_, other)| head_matches(other, literal))
                        .map(move |(index, _)| (index, literal.positive))
                })
                .collect()
        })
        .collect();

    let bound = rules.len();
    let mut levels = vec![1_usize; rules.len()];
    let mut highest = usize::from(bound > 0);
    let mut changed = true;

    while changed && highest <= bound {
        changed = false;
        for (rule, deps) in dependencies.iter().enumerate() {
            for &(dependency, positive) in deps {
                let required = if positive {
                    levels[dependency]
                } else {
                    levels[dependency] + 1
                };
                if levels[rule] < required {
                    levels[rule] = required;
                    highest = highest.max(required);
                    changed = true;
                }
            }
        }
    }

    if highest > bound {
        let predicates: IndexSet<Predicate> = rules
            .iter()
            .zip(&levels)
            .filter(|(_, &level)| level > bound)
            .map(|(rule, _)| rule.head_predicate().clone())
            .collect();
        return Err(NotStratified {
            predicates: predicates.into_iter().collect(),
        });
    }

    let mut groups: IndexMap<usize, Vec<Rule>> = IndexMap::new();
    for (rule, level) in rules.iter().zip(levels) {
        groups.entry(level).or_default().push(rule.clone());
    }
    Ok(into_strata(groups))
}
