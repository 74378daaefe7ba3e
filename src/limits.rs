//! Running an evaluation under a deadline or a size bound.
//!
//! Limits are checked between [`Evaluation::step`] calls, so a single step may
//! overshoot them; a stopped run returns [`EvaluationError::Interrupted`] and
//! discards its partial facts.

use std::time::Instant;

use log::warn;

use crate::builtin::BuiltinRegistry;
use crate::config::{Configuration, Limits};
use crate::error::EvaluationError;
use crate::evaluator::Evaluation;
use crate::program::Rule;
use crate::relation::Facts;

/// Like [`crate::evaluator::run_program_with`], stopping once `limits` are exceeded
///
/// # Errors
///
/// [`EvaluationError::Interrupted`] when the timeout elapses or the tuple count
/// passes `max_tuples`, or any error [`Evaluation`] raises
pub fn run_with_limits(
    facts: Facts,
    rules: &[Rule],
    configuration: &Configuration,
    builtins: &BuiltinRegistry,
    limits: &Limits,
) -> Result<Facts, EvaluationError> {
    let started = Instant::now();
    let mut evaluation = Evaluation::new(facts, rules, configuration, builtins)?;

    loop {
        check(&evaluation, limits, started)?;
        if evaluation.is_finished() {
            return Ok(evaluation.into_facts());
        }
        evaluation.step()?;
    }
}

fn check(evaluation: &Evaluation, limits: &Limits, started: Instant) -> Result<(), EvaluationError> {
    if let Some(timeout) = limits.timeout {
        let elapsed = started.elapsed();
        if elapsed >= timeout {
            warn!("evaluation stopped after {elapsed:?}");
            return Err(EvaluationError::Interrupted {
                reason: format!("timeout of {timeout:?} elapsed"),
            });
        }
    }
    if let Some(max_tuples) = limits.max_tuples {
        let tuples = evaluation.facts().total_tuples();
        if tuples > max_tuples {
            warn!("evaluation stopped at {tuples} tuples");
            return Err(EvaluationError::Interrupted {
                reason: format!("{tuples} tuples exceed the limit of {max_tuples}"),
            });
        }
    }
    Ok(())
}
