//! The contract between the rule compiler and computed (built-in) predicates.
//!
//! Apart from [`Equality`], the engine ships no concrete built-ins. Callers
//! register implementations of [`Builtin`] in a [`BuiltinRegistry`]; a literal
//! marked built-in is resolved by its predicate when its rule is compiled.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{BuiltinError, EvaluationError};
use crate::program::Predicate;
use crate::term::Term;

/// A computed predicate
///
/// A built-in is either a test over fully bound arguments, or (for the positions
/// where [`Builtin::computes`] is `true`) a function computing the single unbound
/// argument from the others.
pub trait Builtin: fmt::Debug + Send + Sync {
    /// Symbol and arity this built-in answers to
    fn predicate(&self) -> Predicate;

    /// Whether the argument at `position` may be the one computed output
    fn computes(&self, _position: usize) -> bool {
        false
    }

    /// Evaluate over fully bound arguments
    ///
    /// # Errors
    ///
    /// [`BuiltinError::TypeMismatch`] makes the current row fail; [`BuiltinError::Fatal`] aborts evaluation
    fn test(&self, args: &[Term]) -> Result<bool, BuiltinError>;

    /// Compute the argument at `output`; `args[output]` holds the unbound variable
    ///
    /// `Ok(None)` means no value exists for these inputs and the row fails.
    ///
    /// # Errors
    ///
    /// Same as [`Builtin::test`]
    fn compute(&self, _args: &[Term], _output: usize) -> Result<Option<Term>, BuiltinError> {
        Ok(None)
    }
}

/// Built-ins by predicate
#[derive(Debug, Clone, Default)]
pub struct BuiltinRegistry {
    builtins: IndexMap<Predicate, Arc<dyn Builtin>>,
}

impl BuiltinRegistry {
    /// An empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the built-in for its predicate
    pub fn register(&mut self, builtin: Arc<dyn Builtin>) {
        self.builtins.insert(builtin.predicate(), builtin);
    }

    /// Builder-style [`BuiltinRegistry::register`]
    #[must_use]
    pub fn with(mut self, builtin: Arc<dyn Builtin>) -> Self {
        self.register(builtin);
        self
    }

    /// Look up a built-in
    #[must_use]
    pub fn get(&self, predicate: &Predicate) -> Option<&Arc<dyn Builtin>> {
        self.builtins.get(predicate)
    }

    /// The built-in for a literal's predicate
    ///
    /// `=`/2 falls back to [`Equality`] unless something else is registered for it.
    ///
    /// # Errors
    ///
    /// [`EvaluationError::BuiltinArity`] if the symbol is only registered with another
    /// arity, [`EvaluationError::UnknownBuiltin`] if it is not registered at all
    pub fn resolve(&self, predicate: &Predicate) -> Result<Arc<dyn Builtin>, EvaluationError> {
        if let Some(builtin) = self.builtins.get(predicate) {
            return Ok(Arc::clone(builtin));
        }
        if *predicate == Predicate::equality() {
            return Ok(Arc::new(Equality));
        }
        match self
            .builtins
            .keys()
            .find(|registered| registered.symbol() == predicate.symbol())
        {
            Some(registered) => Err(EvaluationError::BuiltinArity {
                predicate: predicate.clone(),
                expected: registered.arity(),
            }),
            None => Err(EvaluationError::UnknownBuiltin {
                predicate: predicate.clone(),
            }),
        }
    }

    /// Number of registered built-ins
    #[must_use]
    pub fn len(&self) -> usize {
        self.builtins.len()
    }

    /// True when nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.builtins.is_empty()
    }
}

/// `lhs = rhs`: structural equality of ground terms; computes either side from the other
#[derive(Debug, Clone, Copy, Default)]
pub struct Equality;

impl Builtin for Equality {
    fn predicate(&self) -> Predicate {
        Predicate::equality()
    }

    fn computes(&self, position: usize) -> bool {
        position < 2
    }

    fn test(&self, args: &[Term]) -> Result<bool, BuiltinError> {
        match args {
            [lhs, rhs] => Ok(lhs == rhs),
            _ => Err(BuiltinError::TypeMismatch(format!(
                "equality takes 2 arguments, got {}",
                args.len()
            ))),
        }
    }

    fn compute(&self, args: &[Term], output: usize) -> Result<Option<Term>, BuiltinError> {
        match (args, output) {
            ([_, rhs], 0) => Ok(Some(rhs.clone())),
            ([lhs, _], 1) => Ok(Some(lhs.clone())),
            _ => Ok(None),
        }
    }
}
