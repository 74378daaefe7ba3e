//! Answering queries against a finished model.

use crate::builtin::BuiltinRegistry;
use crate::compiler::RuleCompiler;
use crate::config::Configuration;
use crate::equivalence::{EquivalentTerms, IgnoreTermEquivalence};
use crate::error::EvaluationError;
use crate::program::Query;
use crate::relation::Facts;
use crate::relation::Relation;
use crate::safety::SafetyChecker;
use crate::term::Variable;

/// Answer `query` with the default configuration and no registered built-ins
///
/// Returns one tuple per distinct binding of the query's variables, with the
/// variables naming the columns.
///
/// # Errors
///
/// See [`answer_with`]
pub fn answer(query: &Query, facts: &Facts) -> Result<(Relation, Vec<Variable>), EvaluationError> {
    answer_with(
        query,
        facts,
        &Configuration::default(),
        &BuiltinRegistry::new(),
        &IgnoreTermEquivalence,
    )
}

/// Answer `query` over `facts`
///
/// Constants in the query are compared by their class under `equivalence`,
/// which should be the one the facts were derived with.
///
/// # Errors
///
/// [`EvaluationError::Unsafe`] if an answer variable or a negated variable is not
/// limited by the query's literals, a compile error, or a fatal built-in failure
pub fn answer_with(
    query: &Query,
    facts: &Facts,
    configuration: &Configuration,
    builtins: &BuiltinRegistry,
    equivalence: &dyn EquivalentTerms,
) -> Result<(Relation, Vec<Variable>), EvaluationError> {
    let rule = query.as_rule();
    SafetyChecker::new(configuration.safety, builtins).check(&rule)?;
    let compiled = RuleCompiler::new(configuration, builtins).compile(&rule)?;
    let relation = compiled.evaluate(facts, equivalence)?;
    Ok((relation, query.variables.clone()))
}
