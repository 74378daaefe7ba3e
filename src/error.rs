//! Error types for safety checking, stratification and evaluation.

use std::fmt;

use thiserror::Error;

use crate::program::Predicate;
use crate::term::Variable;

/// Why a variable is not limited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsafeReason {
    /// The variable occurs in the head but no positive ordinary body literal binds it
    Unlimited,
    /// The variable only occurs in negated literals
    UnlimitedInNegation,
    /// The variable only occurs in built-in literals that cannot compute it
    UnlimitedInBuiltin,
}

impl fmt::Display for UnsafeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnsafeReason::Unlimited => "is not limited by any positive ordinary literal",
            UnsafeReason::UnlimitedInNegation => "only occurs in negated literals",
            UnsafeReason::UnlimitedInBuiltin => "is not limited and no built-in can compute it",
        };
        f.write_str(text)
    }
}

/// A rule uses a variable that is never grounded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsafe rule `{rule}`: variable {variable} {reason}")]
pub struct RuleUnsafe {
    /// The offending rule, rendered
    pub rule: String,
    /// The first variable found to be unsafe
    pub variable: Variable,
    /// Where the variable occurs
    pub reason: UnsafeReason,
}

/// No stratifier could order the rules so that negation never looks forward
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("program is not stratifiable: cycle through negation involving {}", display_predicates(.predicates))]
pub struct NotStratified {
    /// The rule-head predicates whose stratum grew past the bound
    pub predicates: Vec<Predicate>,
}

fn display_predicates(predicates: &[Predicate]) -> String {
    predicates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure reported by a built-in implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuiltinError {
    /// Arguments of the wrong type; the current row simply fails
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// The built-in declares this failure fatal; evaluation aborts
    #[error("{0}")]
    Fatal(String),
}

/// Errors raised while compiling or evaluating a program
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    /// A rule failed the safety check
    #[error(transparent)]
    Unsafe(#[from] RuleUnsafe),

    /// The rule set cannot be stratified
    #[error(transparent)]
    NotStratified(#[from] NotStratified),

    /// A literal is marked built-in but the registry does not know it
    #[error("unknown built-in predicate {predicate}")]
    UnknownBuiltin {
        /// The unregistered predicate
        predicate: Predicate,
    },

    /// A built-in literal's arity differs from the registered built-in
    #[error("built-in {predicate} expects {expected} arguments")]
    BuiltinArity {
        /// The literal's predicate
        predicate: Predicate,
        /// The arity the registered built-in declares
        expected: usize,
    },

    /// A built-in literal has more than one unbound variable
    #[error("too many unbound variables for built-in `{builtin}`: {}", display_variables(.variables))]
    TooManyUnboundVariables {
        /// The built-in literal, rendered
        builtin: String,
        /// The variables still unbound when the literal was reached
        variables: Vec<Variable>,
    },

    /// A built-in cannot compute the one variable left unbound
    #[error("built-in `{builtin}` cannot compute {variable}")]
    NotComputable {
        /// The built-in literal, rendered
        builtin: String,
        /// The variable that would have to be computed
        variable: Variable,
    },

    /// A negated literal needs variables that are bound by a later literal
    #[error("negated literal `{literal}` uses unbound variables {}", display_variables(.variables))]
    UnboundNegation {
        /// The negated literal, rendered
        literal: String,
        /// The unbound variables
        variables: Vec<Variable>,
    },

    /// A built-in reported a fatal failure
    #[error("built-in {predicate} failed: {message}")]
    Builtin {
        /// The failing built-in
        predicate: Predicate,
        /// The built-in's message
        message: String,
    },

    /// A fact contains variables
    #[error("fact for {predicate} is not ground")]
    NonGroundFact {
        /// The predicate of the offending fact
        predicate: Predicate,
    },

    /// A tuple's length differs from its predicate's arity
    #[error("tuple of arity {found} does not fit predicate {predicate}")]
    ArityMismatch {
        /// The predicate
        predicate: Predicate,
        /// The tuple length found
        found: usize,
    },

    /// A rule asserts equality in its head but head equality is switched off
    #[error("rule `{rule}` has an equality head but rule head equality is disabled")]
    HeadEqualityDisabled {
        /// The offending rule, rendered
        rule: String,
    },

    /// Evaluation was stopped between iterations by a caller-imposed limit
    #[error("evaluation interrupted: {reason}")]
    Interrupted {
        /// Which limit was hit
        reason: String,
    },
}

fn display_variables(variables: &[Variable]) -> String {
    variables
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
