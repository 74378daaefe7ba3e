//! Rule safety: every variable must be limited before a rule is compiled.
//!
//! A variable is limited when it occurs in a positive ordinary body literal, or
//! (with [`SafetyConfig::builtins_imply_limited`]) when it is the only
//! non-limited variable of a positive built-in that can compute its position.
//! The second case is iterated to a fixpoint, so the result does not depend on
//! the order of the body literals.

use indexmap::IndexSet;

use crate::builtin::BuiltinRegistry;
use crate::config::SafetyConfig;
use crate::error::{RuleUnsafe, UnsafeReason};
use crate::program::{Literal, Rule};
use crate::term::{Term, Variable};

/// Checks rules against a safety configuration and the known built-ins
#[derive(Debug, Clone, Copy)]
pub struct SafetyChecker<'a> {
    config: SafetyConfig,
    builtins: &'a BuiltinRegistry,
}

/// Variables of one positive built-in literal, flagged with whether the built-in can compute them
struct BuiltinGroup {
    variables: Vec<(Variable, bool)>,
}

impl<'a> SafetyChecker<'a> {
    /// Create a checker
    #[must_use]
    pub fn new(config: SafetyConfig, builtins: &'a BuiltinRegistry) -> Self {
        Self { config, builtins }
    }

    /// Check one rule
    ///
    /// # Errors
    ///
    /// Returns [`RuleUnsafe`] naming the first unsafe variable, in order of first occurrence
    pub fn check(&self, rule: &Rule) -> Result<(), RuleUnsafe> {
        let mut limited: IndexSet<Variable> = IndexSet::new();
        let mut negated: IndexSet<Variable> = IndexSet::new();
        let mut in_builtins: IndexSet<Variable> = IndexSet::new();
        let mut groups: Vec<BuiltinGroup> = Vec::new();

        for literal in &rule.body {
            let variables = literal.atom.variables();
            if variables.is_empty() {
                continue;
            }
            if literal.builtin {
                in_builtins.extend(variables.iter().cloned());
                if literal.positive && self.config.builtins_imply_limited {
                    groups.push(self.builtin_group(literal, variables));
                }
            } else if literal.positive {
                limited.extend(variables);
            } else {
                negated.extend(variables);
            }
        }

        let mut changed = true;
        while changed {
            changed = false;
            for group in &groups {
                let mut open = group
                    .variables
                    .iter()
                    .filter(|(variable, _)| !limited.contains(variable));
                if let (Some((variable, true)), None) = (open.next(), open.next()) {
                    limited.insert(variable.clone());
                    changed = true;
                }
            }
        }

        let head_variables = rule.head.atom.variables();
        for variable in rule.variables() {
            if limited.contains(&variable) {
                continue;
            }
            let reason = if head_variables.contains(&variable) {
                UnsafeReason::Unlimited
            } else if in_builtins.contains(&variable) {
                UnsafeReason::UnlimitedInBuiltin
            } else if negated.contains(&variable)
                && !self.config.allow_unlimited_variables_in_negation
            {
                UnsafeReason::UnlimitedInNegation
            } else {
                continue;
            };
            return Err(RuleUnsafe {
                rule: rule.to_string(),
                variable,
                reason,
            });
        }
        Ok(())
    }

    fn builtin_group(&self, literal: &Literal, variables: Vec<Variable>) -> BuiltinGroup {
        let builtin = self.builtins.resolve(literal.predicate()).ok();
        let computable = |variable: &Variable| {
            builtin.as_ref().is_some_and(|b| {
                literal.atom.tuple.iter().enumerate().any(|(position, term)| {
                    matches!(term, Term::Variable(v) if v == variable) && b.computes(position)
                })
            })
        };
        BuiltinGroup {
            variables: variables
                .into_iter()
                .map(|variable| {
                    let can = computable(&variable);
                    (variable, can)
                })
                .collect(),
        }
    }
}

/// Strict check: accept a rule exactly when every variable occurs in a positive ordinary body literal
///
/// Use [`SafetyChecker`] to let computing built-ins limit variables.
///
/// # Errors
///
/// Returns [`RuleUnsafe`] naming the offending variable
pub fn check_safety(rule: Rule) -> Result<Rule, RuleUnsafe> {
    let builtins = BuiltinRegistry::new();
    let strict = SafetyConfig {
        builtins_imply_limited: false,
        allow_unlimited_variables_in_negation: false,
    };
    SafetyChecker::new(strict, &builtins).check(&rule)?;
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::testing;
    use crate::program::Atom;

    fn atom(symbol: &str, terms: &[&str]) -> Atom {
        Atom::new(
            symbol,
            terms
                .iter()
                .map(|t| {
                    if t.starts_with(char::is_uppercase) {
                        Term::var(t)
                    } else {
                        Term::string(t)
                    }
                })
                .collect(),
        )
    }

    fn pos(symbol: &str, terms: &[&str]) -> Literal {
        Literal::positive(atom(symbol, terms))
    }

    fn neg(symbol: &str, terms: &[&str]) -> Literal {
        Literal::negative(atom(symbol, terms))
    }

    fn builtin(symbol: &str, terms: &[&str]) -> Literal {
        Literal::builtin(atom(symbol, terms))
    }

    #[test]
    fn test_head_variable_never_grounded() {
        let rule = Rule::new(pos("p", &["X", "Y"]), vec![pos("q", &["X"])]);
        let error = check_safety(rule).unwrap_err();

        assert_eq!(error.variable, Variable::new("Y"));
        assert_eq!(error.reason, UnsafeReason::Unlimited);
    }

    #[test]
    fn test_safe_rule_is_returned_unchanged() {
        let rule = Rule::new(
            pos("path", &["X", "Y"]),
            vec![pos("edge", &["X", "Z"]), pos("path", &["Z", "Y"])],
        );
        assert_eq!(check_safety(rule.clone()), Ok(rule));
    }

    #[test]
    fn test_negation_needs_limited_variables() {
        let rule = Rule::new(pos("p", &["X"]), vec![pos("q", &["X"]), neg("r", &["X", "Y"])]);
        let error = check_safety(rule.clone()).unwrap_err();
        assert_eq!(error.variable, Variable::new("Y"));
        assert_eq!(error.reason, UnsafeReason::UnlimitedInNegation);

        let builtins = BuiltinRegistry::new();
        let relaxed = SafetyConfig {
            allow_unlimited_variables_in_negation: true,
            ..SafetyConfig::default()
        };
        assert!(SafetyChecker::new(relaxed, &builtins).check(&rule).is_ok());
    }

    #[test]
    fn test_negation_order_does_not_matter() {
        let rule = Rule::new(pos("p", &["X"]), vec![neg("r", &["X"]), pos("q", &["X"])]);
        assert!(check_safety(rule).is_ok());
    }

    #[test]
    fn test_builtin_without_registry_does_not_limit() {
        let rule = Rule::new(
            pos("p", &["Z"]),
            vec![pos("q", &["X", "Y"]), builtin("add", &["X", "Y", "Z"])],
        );
        let error = check_safety(rule).unwrap_err();
        assert_eq!(error.variable, Variable::new("Z"));
    }

    #[test]
    fn test_computing_builtin_limits_its_output() {
        let builtins = testing::registry();
        let checker = SafetyChecker::new(SafetyConfig::default(), &builtins);

        // Built-in listed before the literal that limits its inputs
        let rule = Rule::new(
            pos("p", &["Z"]),
            vec![builtin("add", &["X", "Y", "Z"]), pos("q", &["X", "Y"])],
        );
        assert!(checker.check(&rule).is_ok());

        // Chained: W needs Z first
        let chained = Rule::new(
            pos("p", &["W"]),
            vec![
                builtin("add", &["Z", "X", "W"]),
                builtin("add", &["X", "Y", "Z"]),
                pos("q", &["X", "Y"]),
            ],
        );
        assert!(checker.check(&chained).is_ok());

        let disabled = SafetyChecker::new(
            SafetyConfig {
                builtins_imply_limited: false,
                ..SafetyConfig::default()
            },
            &builtins,
        );
        assert!(disabled.check(&rule).is_err());
    }

    #[test]
    fn test_builtin_with_two_open_variables_is_unsafe() {
        let builtins = testing::registry();
        let checker = SafetyChecker::new(SafetyConfig::default(), &builtins);
        let rule = Rule::new(
            pos("p", &["X"]),
            vec![pos("q", &["X"]), builtin("add", &["X", "Y", "Z"])],
        );

        let error = checker.check(&rule).unwrap_err();
        assert_eq!(error.variable, Variable::new("Y"));
        assert_eq!(error.reason, UnsafeReason::UnlimitedInBuiltin);
    }

    #[test]
    fn test_equality_binds_from_the_other_side() {
        let rule = Rule::new(
            pos("p", &["Y"]),
            vec![pos("q", &["X"]), Literal::equality(Term::var("Y"), Term::var("X"))],
        );
        let builtins = BuiltinRegistry::new();
        assert!(SafetyChecker::new(SafetyConfig::default(), &builtins)
            .check(&rule)
            .is_ok());
    }

    #[test]
    fn test_builtin_that_cannot_compute_is_unsafe() {
        let builtins = testing::registry();
        let checker = SafetyChecker::new(SafetyConfig::default(), &builtins);
        let rule = Rule::new(
            pos("p", &["X"]),
            vec![pos("q", &["X"]), builtin("less", &["X", "Y"])],
        );
        assert_eq!(
            checker.check(&rule).unwrap_err().reason,
            UnsafeReason::UnlimitedInBuiltin
        );
    }

    #[test]
    fn test_variables_inside_constructed_terms_count() {
        let rule = Rule::new(
            pos("p", &["X"]),
            vec![Literal::positive(Atom::new(
                "q",
                vec![Term::constructed("f", vec![Term::var("X")])],
            ))],
        );
        assert!(check_safety(rule).is_ok());
    }
}
