use indexmap::IndexMap;

use crate::builtin::BuiltinRegistry;
use crate::config::Configuration;
use crate::equivalence::UnionFindTerms;
use crate::error::EvaluationError;
use crate::evaluator::Evaluation;
use crate::program::{Atom, Predicate, Query, Rule};
use crate::query::answer_with;
use crate::relation::{Facts, Relation};
use crate::safety::SafetyChecker;
use crate::term::{Term, Tuple, Variable};

/// Result of a query: one row per distinct binding of the query variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryAnswer {
    relation: Relation,
    variables: Vec<Variable>,
}

impl QueryAnswer {
    /// The answer tuples; column `i` binds `variables()[i]`
    #[must_use]
    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    /// The answer columns
    #[must_use]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Number of answers
    #[must_use]
    pub fn len(&self) -> usize {
        self.relation.len()
    }

    /// True when the query has no answer
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.relation.is_empty()
    }

    /// Each answer as a variable-to-term map
    pub fn bindings(&self) -> impl Iterator<Item = IndexMap<Variable, Term>> + '_ {
        self.relation.iter().map(|tuple| {
            self.variables
                .iter()
                .cloned()
                .zip(tuple.iter().cloned())
                .collect()
        })
    }
}

/// The Datalog evaluation engine
///
/// Holds the base facts and rules of one program. [`DatalogEngine::run`] computes
/// the model from scratch; adding facts or rules afterwards discards it until the
/// next run.
#[derive(Debug, Default)]
pub struct DatalogEngine {
    configuration: Configuration,
    builtins: BuiltinRegistry,
    base: Facts,
    rules: Vec<Rule>,
    model: Option<(Facts, UnionFindTerms)>,
}

impl DatalogEngine {
    /// Create a new Datalog engine with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `configuration` for safety checks, stratification and evaluation
    #[must_use]
    pub fn with_configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = configuration;
        self.model = None;
        self
    }

    /// Use `builtins` to evaluate built-in literals
    #[must_use]
    pub fn with_builtins(mut self, builtins: BuiltinRegistry) -> Self {
        self.builtins = builtins;
        self.model = None;
        self
    }

    /// Add a fact to the knowledge base
    ///
    /// Returns `true` if the fact was new.
    ///
    /// # Errors
    ///
    /// [`EvaluationError::NonGroundFact`] if the atom contains variables, or
    /// [`EvaluationError::ArityMismatch`] if the predicate's relation has another arity
    pub fn add_fact(&mut self, atom: Atom) -> Result<bool, EvaluationError> {
        let added = self.base.add(atom)?;
        if added {
            self.model = None;
        }
        Ok(added)
    }

    /// Add several facts; stops at the first invalid one
    ///
    /// # Errors
    ///
    /// As [`DatalogEngine::add_fact`]
    pub fn add_facts<I>(&mut self, atoms: I) -> Result<(), EvaluationError>
    where
        I: IntoIterator<Item = Atom>,
    {
        for atom in atoms {
            self.add_fact(atom)?;
        }
        Ok(())
    }

    /// Add a rule to the knowledge base
    ///
    /// # Errors
    ///
    /// [`EvaluationError::Unsafe`] if a variable of the rule is not limited
    pub fn add_rule(&mut self, rule: Rule) -> Result<(), EvaluationError> {
        SafetyChecker::new(self.configuration.safety, &self.builtins).check(&rule)?;
        self.rules.push(rule);
        self.model = None;
        Ok(())
    }

    /// The rules added so far
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Run the Datalog evaluation to fixed point using semi-naive evaluation
    ///
    /// - Rules are ordered into strata so that negation only reads finished relations
    /// - Each stratum is seeded by evaluating every rule once over all facts
    /// - Later iterations only join against the facts derived in the previous one
    /// - A stratum ends when an iteration derives nothing new
    ///
    /// # Errors
    ///
    /// [`EvaluationError::NotStratified`], a compile error, or a fatal built-in failure.
    /// On error the previous model (if any) is kept.
    pub fn run(&mut self) -> Result<(), EvaluationError> {
        let mut evaluation = Evaluation::new(
            self.base.clone(),
            &self.rules,
            &self.configuration,
            &self.builtins,
        )?;
        evaluation.run()?;
        self.model = Some(evaluation.into_parts());
        Ok(())
    }

    /// The model if [`DatalogEngine::run`] has completed since the last change, else the base facts
    #[must_use]
    pub fn facts(&self) -> &Facts {
        self.model.as_ref().map_or(&self.base, |(facts, _)| facts)
    }

    /// Get all facts for a predicate, in derivation order
    #[must_use]
    pub fn get_facts(&self, predicate: &Predicate) -> Vec<Tuple> {
        self.facts()
            .get(predicate)
            .map(|relation| relation.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns all variable bindings that make the query true
    ///
    /// # Errors
    ///
    /// [`EvaluationError::Unsafe`] for an unsafe query, or a compile or built-in error
    pub fn query(&self, query: &Query) -> Result<QueryAnswer, EvaluationError> {
        let unchanged = UnionFindTerms::new();
        let equivalence = self
            .model
            .as_ref()
            .map_or(&unchanged, |(_, equivalence)| equivalence);
        let (relation, variables) = answer_with(
            query,
            self.facts(),
            &self.configuration,
            &self.builtins,
            equivalence,
        )?;
        Ok(QueryAnswer {
            relation,
            variables,
        })
    }

    /// Returns whether the query has at least one answer
    ///
    /// # Errors
    ///
    /// As [`DatalogEngine::query`]
    pub fn ask(&self, query: &Query) -> Result<bool, EvaluationError> {
        Ok(!self.query(query)?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Literal;

    fn symbol(value: &str) -> Term {
        Term::string(value)
    }

    fn fact(predicate: &str, values: &[&str]) -> Atom {
        Atom::new(predicate, values.iter().map(|v| symbol(v)).collect())
    }

    fn pattern(predicate: &str, terms: &[&str]) -> Atom {
        Atom::new(
            predicate,
            terms
                .iter()
                .map(|t| match t.strip_prefix('?') {
                    Some(name) => Term::var(name),
                    None => symbol(t),
                })
                .collect(),
        )
    }

    fn rule(head: Atom, body: Vec<Atom>) -> Rule {
        Rule::new(
            Literal::positive(head),
            body.into_iter().map(Literal::positive).collect(),
        )
    }

    fn query(atom: Atom) -> Query {
        Query::new(vec![Literal::positive(atom)])
    }

    fn tuple(values: &[&str]) -> Tuple {
        values.iter().map(|v| symbol(v)).collect()
    }

    fn add_path_rules(engine: &mut DatalogEngine, head: &str) {
        // head(x, y) :- edge(x, y).
        engine
            .add_rule(rule(
                pattern(head, &["?x", "?y"]),
                vec![pattern("edge", &["?x", "?y"])],
            ))
            .unwrap();
        // head(x, z) :- head(x, y), edge(y, z).
        engine
            .add_rule(rule(
                pattern(head, &["?x", "?z"]),
                vec![pattern(head, &["?x", "?y"]), pattern("edge", &["?y", "?z"])],
            ))
            .unwrap();
    }

    #[test]
    fn test_transitive_closure_with_path_rules() {
        let mut engine = DatalogEngine::new();
        engine.add_fact(fact("edge", &["a", "b"])).unwrap();
        engine.add_fact(fact("edge", &["b", "c"])).unwrap();
        add_path_rules(&mut engine, "path");

        engine.run().unwrap();

        let mut path_facts = engine.get_facts(&Predicate::new("path", 2));
        path_facts.sort();
        assert_eq!(
            path_facts,
            vec![tuple(&["a", "b"]), tuple(&["a", "c"]), tuple(&["b", "c"])],
            "Should have exactly path(a, b), path(a, c), path(b, c)"
        );
    }

    #[test]
    fn test_empty_engine_returns_no_facts() {
        let engine = DatalogEngine::new();
        assert!(engine.get_facts(&Predicate::new("nonexistent", 1)).is_empty());
        assert!(engine.facts().is_empty());
    }

    #[test]
    fn test_single_fact_without_rules() {
        let mut engine = DatalogEngine::new();
        assert!(engine.add_fact(fact("test", &["value"])).unwrap());
        assert!(!engine.add_fact(fact("test", &["value"])).unwrap());

        let facts = engine.get_facts(&Predicate::new("test", 1));
        assert_eq!(facts, vec![tuple(&["value"])]);
    }

    #[test]
    fn test_longer_chain() {
        let mut engine = DatalogEngine::new();
        engine
            .add_facts(
                [("a", "b"), ("b", "c"), ("c", "d"), ("d", "e")]
                    .into_iter()
                    .map(|(from, to)| fact("edge", &[from, to])),
            )
            .unwrap();
        add_path_rules(&mut engine, "path");

        engine.run().unwrap();

        let mut path_facts = engine.get_facts(&Predicate::new("path", 2));
        path_facts.sort();
        let expected: Vec<Tuple> = [
            ("a", "b"),
            ("a", "c"),
            ("a", "d"),
            ("a", "e"),
            ("b", "c"),
            ("b", "d"),
            ("b", "e"),
            ("c", "d"),
            ("c", "e"),
            ("d", "e"),
        ]
        .into_iter()
        .map(|(from, to)| tuple(&[from, to]))
        .collect();
        assert_eq!(path_facts, expected);
    }

    #[test]
    fn test_with_complex_rules() {
        let mut engine = DatalogEngine::new();
        for (from, to) in [("1", "2"), ("2", "3"), ("3", "4")] {
            engine.add_fact(fact("edge", &[from, to])).unwrap();
        }
        // triangle(x, y, z) :- edge(x, y), edge(y, z).
        engine
            .add_rule(rule(
                pattern("triangle", &["?x", "?y", "?z"]),
                vec![pattern("edge", &["?x", "?y"]), pattern("edge", &["?y", "?z"])],
            ))
            .unwrap();

        engine.run().unwrap();

        let triangles = engine.get_facts(&Predicate::new("triangle", 3));
        assert_eq!(triangles.len(), 2);
        assert!(triangles.contains(&tuple(&["1", "2", "3"])));
        assert!(triangles.contains(&tuple(&["2", "3", "4"])));
    }

    #[test]
    fn test_correctness_large_graph() {
        let mut engine = DatalogEngine::new();
        let edges = [
            ("a", "b"),
            ("b", "c"),
            ("c", "d"),
            ("d", "e"),
            ("a", "f"),
            ("f", "g"),
            ("g", "d"),
            ("e", "h"),
            ("h", "i"),
            ("i", "j"),
            ("b", "k"),
            ("k", "l"),
            ("l", "m"),
        ];
        for (from, to) in edges {
            engine.add_fact(fact("edge", &[from, to])).unwrap();
        }
        add_path_rules(&mut engine, "reachable");

        engine.run().unwrap();

        let reachable = engine.get_facts(&Predicate::new("reachable", 2));
        assert!(
            reachable.len() > edges.len(),
            "Should have generated more reachability facts than just direct edges"
        );
        for (from, to) in [("a", "e"), ("a", "d"), ("b", "m"), ("a", "j")] {
            assert!(
                reachable.contains(&tuple(&[from, to])),
                "Should be able to reach {to} from {from}"
            );
        }
        assert!(!reachable.contains(&tuple(&["m", "a"])));
    }

    #[test]
    fn test_query_with_variables() {
        let mut engine = DatalogEngine::new();
        for (who, food) in [("alice", "pizza"), ("bob", "burger"), ("alice", "pasta")] {
            engine.add_fact(fact("likes", &[who, food])).unwrap();
        }

        // What does alice like? likes(alice, x)
        let answer = engine
            .query(&query(pattern("likes", &["alice", "?x"])))
            .unwrap();
        assert_eq!(answer.len(), 2);

        let x = Variable::new("x");
        let mut foods: Vec<Term> = answer.bindings().map(|b| b[&x].clone()).collect();
        foods.sort();
        assert_eq!(foods, vec![symbol("pasta"), symbol("pizza")]);
    }

    #[test]
    fn test_query_with_multiple_variables() {
        let mut engine = DatalogEngine::new();
        engine.add_fact(fact("parent", &["john", "mary"])).unwrap();
        engine.add_fact(fact("parent", &["mary", "alice"])).unwrap();

        let answer = engine
            .query(&query(pattern("parent", &["?x", "?y"])))
            .unwrap();
        assert_eq!(answer.variables(), &[Variable::new("x"), Variable::new("y")]);

        assert_eq!(
            answer.relation().sorted(),
            vec![tuple(&["john", "mary"]), tuple(&["mary", "alice"])]
        );
    }

    #[test]
    fn test_query_with_constants_only() {
        let mut engine = DatalogEngine::new();
        engine.add_fact(fact("friend", &["alice", "bob"])).unwrap();

        let answer = engine
            .query(&query(pattern("friend", &["alice", "bob"])))
            .unwrap();
        assert_eq!(answer.len(), 1);
        // No variables to bind
        assert!(answer.bindings().all(|binding| binding.is_empty()));
    }

    #[test]
    fn test_ask_method() {
        let mut engine = DatalogEngine::new();
        engine.add_fact(fact("student", &["alice"])).unwrap();

        assert!(engine.ask(&query(fact("student", &["alice"]))).unwrap());
        assert!(!engine.ask(&query(fact("student", &["bob"]))).unwrap());
    }

    #[test]
    fn test_query_on_derived_facts() {
        let mut engine = DatalogEngine::new();
        engine.add_fact(fact("edge", &["a", "b"])).unwrap();
        engine.add_fact(fact("edge", &["b", "c"])).unwrap();
        add_path_rules(&mut engine, "path");

        // Before running only base facts are visible
        assert!(!engine.ask(&query(fact("path", &["a", "c"]))).unwrap());

        engine.run().unwrap();

        let answer = engine.query(&query(pattern("path", &["a", "?x"]))).unwrap();
        assert_eq!(
            answer.relation().sorted(),
            vec![tuple(&["b"]), tuple(&["c"])]
        );
        assert!(engine.ask(&query(fact("path", &["a", "c"]))).unwrap());
    }

    #[test]
    fn test_query_nonexistent_predicate() {
        let engine = DatalogEngine::new();
        let nothing = query(pattern("nonexistent", &["?x"]));

        assert!(engine.query(&nothing).unwrap().is_empty());
        assert!(!engine.ask(&nothing).unwrap());
    }

    #[test]
    fn test_repeated_variable_unification() {
        let mut engine = DatalogEngine::new();
        engine.add_fact(fact("same", &["a", "b"])).unwrap();
        engine.add_fact(fact("same", &["c", "c"])).unwrap();

        // same(x, x) only matches facts whose arguments are identical
        let answer = engine.query(&query(pattern("same", &["?x", "?x"]))).unwrap();
        assert_eq!(answer.relation().sorted(), vec![tuple(&["c"])]);
    }

    #[test]
    fn test_repeated_variable_unification_with_rule() {
        let mut engine = DatalogEngine::new();
        engine.add_fact(fact("person", &["alice"])).unwrap();
        engine.add_fact(fact("person", &["bob"])).unwrap();
        engine.add_fact(fact("likes", &["alice", "pizza"])).unwrap();
        // Bob likes himself
        engine.add_fact(fact("likes", &["bob", "bob"])).unwrap();

        // narcissist(x) :- likes(x, x).
        engine
            .add_rule(rule(
                pattern("narcissist", &["?x"]),
                vec![pattern("likes", &["?x", "?x"])],
            ))
            .unwrap();
        engine.run().unwrap();

        assert_eq!(
            engine.get_facts(&Predicate::new("narcissist", 1)),
            vec![tuple(&["bob"])]
        );
    }

    #[test]
    fn test_negation_reads_lower_stratum() {
        let mut engine = DatalogEngine::new();
        engine.add_fact(fact("person", &["alice"])).unwrap();
        engine.add_fact(fact("person", &["bob"])).unwrap();
        engine.add_fact(fact("likes", &["bob", "bob"])).unwrap();
        engine
            .add_rule(rule(
                pattern("narcissist", &["?x"]),
                vec![pattern("likes", &["?x", "?x"])],
            ))
            .unwrap();
        // modest(x) :- person(x), not narcissist(x).
        engine
            .add_rule(Rule::new(
                Literal::positive(pattern("modest", &["?x"])),
                vec![
                    Literal::positive(pattern("person", &["?x"])),
                    Literal::negative(pattern("narcissist", &["?x"])),
                ],
            ))
            .unwrap();

        engine.run().unwrap();
        assert_eq!(
            engine.get_facts(&Predicate::new("modest", 1)),
            vec![tuple(&["alice"])]
        );

        // The model is recomputed from the base facts
        engine.add_fact(fact("likes", &["alice", "alice"])).unwrap();
        engine.run().unwrap();
        assert!(engine.get_facts(&Predicate::new("modest", 1)).is_empty());
    }

    #[test]
    fn test_same_symbol_with_different_arities() {
        let mut engine = DatalogEngine::new();
        engine.add_fact(fact("test", &["a", "b"])).unwrap();

        // test/2 and test/3 are different predicates
        engine.add_fact(fact("test", &["x", "y", "z"])).unwrap();
        assert_eq!(engine.get_facts(&Predicate::new("test", 2)).len(), 1);
        assert_eq!(engine.get_facts(&Predicate::new("test", 3)).len(), 1);
    }

    #[test]
    fn test_non_ground_fact_is_rejected() {
        let mut engine = DatalogEngine::new();
        let result = engine.add_fact(pattern("person", &["?x"]));
        assert!(matches!(result, Err(EvaluationError::NonGroundFact { .. })));
    }

    #[test]
    fn test_empty_string_is_a_value() {
        let mut engine = DatalogEngine::new();
        engine.add_fact(fact("test", &["", "value"])).unwrap();
        engine.add_fact(fact("test", &["other", ""])).unwrap();

        let answer = engine
            .query(&query(pattern("test", &["?x", "value"])))
            .unwrap();
        assert_eq!(answer.relation().sorted(), vec![tuple(&[""])]);
    }

    #[test]
    fn test_unbound_variable_in_head_validation() {
        let mut engine = DatalogEngine::new();
        engine.add_fact(fact("person", &["alice"])).unwrap();

        // y appears in the head but not in the body
        let result = engine.add_rule(rule(
            pattern("result", &["?x", "?y"]),
            vec![pattern("person", &["?x"])],
        ));
        match result {
            Err(EvaluationError::Unsafe(error)) => assert_eq!(error.variable, Variable::new("y")),
            other => panic!("expected an unsafe rule error, got {other:?}"),
        }
        assert!(engine.rules().is_empty());
    }

    #[test]
    fn test_unstratifiable_program_keeps_base_facts() {
        let mut engine = DatalogEngine::new();
        engine.add_fact(fact("e", &["a"])).unwrap();
        for (head, negated) in [("p", "q"), ("q", "p")] {
            engine
                .add_rule(Rule::new(
                    Literal::positive(pattern(head, &["?x"])),
                    vec![
                        Literal::positive(pattern("e", &["?x"])),
                        Literal::negative(pattern(negated, &["?x"])),
                    ],
                ))
                .unwrap();
        }

        assert!(matches!(
            engine.run(),
            Err(EvaluationError::NotStratified(_))
        ));
        assert_eq!(engine.facts().total_tuples(), 1);
    }
}
