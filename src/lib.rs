//! # Stratalog
//!
//! A stratified Datalog deduction engine with semi-naive evaluation.
//!
//! ## Features
//!
//! - Rule safety checking, with variables limited through built-ins
//! - Global and local stratification for negation
//! - Rules compiled into pipelines of relational operators
//! - Semi-naive bottom-up evaluation, one step at a time
//! - User-supplied built-in predicates and rule head equality
//!
//! ## Example
//!
//! ```rust
//! use stratalog::{Atom, DatalogEngine, Literal, Query, Rule, Term};
//!
//! let mut engine = DatalogEngine::new();
//! engine.add_fact(Atom::new("edge", vec![Term::string("a"), Term::string("b")]))?;
//! engine.add_fact(Atom::new("edge", vec![Term::string("b"), Term::string("c")]))?;
//!
//! // path(?X, ?Y) :- edge(?X, ?Y).
//! engine.add_rule(Rule::new(
//!     Literal::positive(Atom::new("path", vec![Term::var("X"), Term::var("Y")])),
//!     vec![Literal::positive(Atom::new("edge", vec![Term::var("X"), Term::var("Y")]))],
//! ))?;
//! // path(?X, ?Z) :- path(?X, ?Y), edge(?Y, ?Z).
//! engine.add_rule(Rule::new(
//!     Literal::positive(Atom::new("path", vec![Term::var("X"), Term::var("Z")])),
//!     vec![
//!         Literal::positive(Atom::new("path", vec![Term::var("X"), Term::var("Y")])),
//!         Literal::positive(Atom::new("edge", vec![Term::var("Y"), Term::var("Z")])),
//!     ],
//! ))?;
//! engine.run()?;
//!
//! let query = Query::new(vec![Literal::positive(Atom::new(
//!     "path",
//!     vec![Term::string("a"), Term::var("Y")],
//! ))]);
//! assert_eq!(engine.query(&query)?.len(), 2);
//! # Ok::<(), stratalog::EvaluationError>(())
//! ```

/// Computed predicates.
pub mod builtin;
pub mod compiler;
/// Evaluation settings.
pub mod config;
/// Datalog engine.
pub mod engine;
pub mod equivalence;
pub mod error;
/// Semi-naive evaluation of stratified programs.
pub mod evaluator;
pub mod limits;
/// Predicates, atoms, literals, rules and queries.
pub mod program;
pub mod query;
/// Relations and fact stores.
pub mod relation;
pub mod safety;
pub mod stratify;
/// Variables, constants and tuples.
pub mod term;

pub use builtin::{Builtin, BuiltinRegistry, Equality};
pub use compiler::{compile, compile_query, CompiledRule, RuleCompiler};
pub use config::{Configuration, Limits, SafetyConfig, StratifierKind};
pub use engine::{DatalogEngine, QueryAnswer};
pub use equivalence::{EquivalentTerms, IgnoreTermEquivalence, UnionFindTerms};
pub use error::{BuiltinError, EvaluationError, NotStratified, RuleUnsafe, UnsafeReason};
pub use evaluator::{
    run_program, run_program_with, Evaluation, EvaluationState, Progress, SemiNaiveEvaluator,
};
pub use limits::run_with_limits;
pub use program::{Atom, Literal, Predicate, Query, Rule};
pub use query::{answer, answer_with};
pub use relation::{Facts, Relation};
pub use safety::{check_safety, SafetyChecker};
pub use stratify::{stratify, stratify_with, Stratum};
pub use term::{Constant, Constructed, Term, Tuple, Variable};
