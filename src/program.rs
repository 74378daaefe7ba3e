use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::term::{write_separated, Term, Tuple, Variable};

/// A predicate symbol together with its arity
///
/// `edge/2` and `edge/3` are different predicates.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Predicate {
    symbol: Arc<str>,
    arity: usize,
}

impl Predicate {
    /// Create a predicate
    #[must_use]
    pub fn new(symbol: &str, arity: usize) -> Self {
        Self {
            symbol: Arc::from(symbol),
            arity,
        }
    }

    /// The binary equality predicate `=`, used for rule head equality
    #[must_use]
    pub fn equality() -> Self {
        Self::new("=", 2)
    }

    /// The predicate symbol
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// The predicate arity
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.symbol, self.arity)
    }
}

/// A predicate applied to a tuple of terms (e.g. `edge(?X, 'b')`)
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Atom {
    /// The predicate; its arity equals the tuple length
    pub predicate: Predicate,
    /// The argument terms
    pub tuple: Tuple,
}

impl Atom {
    /// Build an atom, deriving the predicate arity from the number of terms
    #[must_use]
    pub fn new(symbol: &str, terms: Vec<Term>) -> Self {
        Self {
            predicate: Predicate::new(symbol, terms.len()),
            tuple: Tuple::new(terms),
        }
    }

    /// True when the tuple contains no variables
    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.tuple.is_ground()
    }

    /// Distinct variables in order of first occurrence
    #[must_use]
    pub fn variables(&self) -> Vec<Variable> {
        self.tuple.variables()
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.predicate == Predicate::equality() && self.tuple.arity() == 2 {
            return write!(f, "{} = {}", self.tuple[0], self.tuple[1]);
        }
        write!(f, "{}(", self.predicate.symbol())?;
        write_separated(f, &self.tuple)?;
        write!(f, ")")
    }
}

/// An atom with a polarity, optionally naming a built-in (computed) predicate
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Literal {
    /// `false` for negation as failure (`not p(?X)`)
    pub positive: bool,
    /// The wrapped atom
    pub atom: Atom,
    /// `true` when the atom is evaluated by a built-in rather than looked up in the facts
    pub builtin: bool,
}

impl Literal {
    /// A positive ordinary literal
    #[must_use]
    pub fn positive(atom: Atom) -> Self {
        Self {
            positive: true,
            atom,
            builtin: false,
        }
    }

    /// A negated ordinary literal
    #[must_use]
    pub fn negative(atom: Atom) -> Self {
        Self {
            positive: false,
            atom,
            builtin: false,
        }
    }

    /// A positive built-in literal
    #[must_use]
    pub fn builtin(atom: Atom) -> Self {
        Self {
            positive: true,
            atom,
            builtin: true,
        }
    }

    /// An equality literal `lhs = rhs`; as a rule head it asserts that both terms are equal
    #[must_use]
    pub fn equality(lhs: Term, rhs: Term) -> Self {
        Self::builtin(Atom {
            predicate: Predicate::equality(),
            tuple: Tuple::new(vec![lhs, rhs]),
        })
    }

    /// The same literal with the opposite polarity
    #[must_use]
    pub fn negated(mut self) -> Self {
        self.positive = !self.positive;
        self
    }

    /// The literal's predicate
    #[must_use]
    pub fn predicate(&self) -> &Predicate {
        &self.atom.predicate
    }

    /// Positive and stored in the facts
    #[must_use]
    pub fn is_positive_ordinary(&self) -> bool {
        self.positive && !self.builtin
    }

    /// True for `lhs = rhs`
    #[must_use]
    pub fn is_equality(&self) -> bool {
        self.builtin && self.atom.predicate == Predicate::equality()
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.positive {
            write!(f, "not ")?;
        }
        write!(f, "{}", self.atom)
    }
}

/// A Datalog rule (e.g. `path(?X, ?Z) :- edge(?X, ?Y), path(?Y, ?Z).`)
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rule {
    /// The conclusion; an equality literal makes this a rule head equality rule
    pub head: Literal,
    /// The conditions, in source order
    pub body: Vec<Literal>,
}

impl Rule {
    /// Create a rule
    #[must_use]
    pub fn new(head: Literal, body: Vec<Literal>) -> Self {
        Self { head, body }
    }

    /// The predicate this rule derives
    #[must_use]
    pub fn head_predicate(&self) -> &Predicate {
        self.head.predicate()
    }

    /// True when the rule asserts equality of two terms instead of a fact
    #[must_use]
    pub fn has_head_equality(&self) -> bool {
        self.head.is_equality()
    }

    /// Distinct variables of head and body, in order of first occurrence
    #[must_use]
    pub fn variables(&self) -> Vec<Variable> {
        let mut out = Vec::new();
        std::iter::once(&self.head)
            .chain(&self.body)
            .flat_map(|literal| literal.atom.tuple.iter())
            .for_each(|term| term.collect_variables(&mut out));
        out
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        if !self.body.is_empty() {
            write!(f, " :- ")?;
            write_separated(f, &self.body)?;
        }
        write!(f, ".")
    }
}

/// A headless rule whose answer columns are the bindings of `variables`
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Query {
    /// The conditions to satisfy
    pub literals: Vec<Literal>,
    /// The answer columns, in order
    pub variables: Vec<Variable>,
}

impl Query {
    /// A query answering every variable of `literals`, in order of first occurrence
    #[must_use]
    pub fn new(literals: Vec<Literal>) -> Self {
        let mut variables = Vec::new();
        literals
            .iter()
            .flat_map(|literal| literal.atom.tuple.iter())
            .for_each(|term| term.collect_variables(&mut variables));
        Self {
            literals,
            variables,
        }
    }

    /// A query with explicitly chosen answer columns
    #[must_use]
    pub fn with_variables(literals: Vec<Literal>, variables: Vec<Variable>) -> Self {
        Self {
            literals,
            variables,
        }
    }

    /// The synthetic rule used to compile this query
    pub(crate) fn as_rule(&self) -> Rule {
        let head = Atom::new(
            "?-",
            self.variables.iter().cloned().map(Term::Variable).collect(),
        );
        Rule::new(Literal::positive(head), self.literals.clone())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?- ")?;
        write_separated(f, &self.literals)?;
        write!(f, ".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_rule() -> Rule {
        Rule::new(
            Literal::positive(Atom::new("path", vec![Term::var("X"), Term::var("Z")])),
            vec![
                Literal::positive(Atom::new("edge", vec![Term::var("X"), Term::var("Y")])),
                Literal::positive(Atom::new("path", vec![Term::var("Y"), Term::var("Z")])),
            ],
        )
    }

    #[test]
    fn test_predicate_identity_includes_arity() {
        assert_eq!(Predicate::new("edge", 2), Predicate::new("edge", 2));
        assert_ne!(Predicate::new("edge", 2), Predicate::new("edge", 3));
    }

    #[test]
    fn test_rule_display() {
        assert_eq!(
            path_rule().to_string(),
            "path(?X, ?Z) :- edge(?X, ?Y), path(?Y, ?Z)."
        );

        let negated = Rule::new(
            Literal::positive(Atom::new("foo", vec![Term::var("X")])),
            vec![
                Literal::positive(Atom::new("a", vec![Term::var("X")])),
                Literal::negative(Atom::new("c", vec![Term::var("X")])),
            ],
        );
        assert_eq!(negated.to_string(), "foo(?X) :- a(?X), not c(?X).");
    }

    #[test]
    fn test_rule_variables() {
        assert_eq!(
            path_rule().variables(),
            vec![Variable::new("X"), Variable::new("Z"), Variable::new("Y")]
        );
    }

    #[test]
    fn test_query_variables_follow_first_occurrence() {
        let query = Query::new(vec![Literal::positive(Atom::new(
            "edge",
            vec![Term::var("B"), Term::string("x"), Term::var("A")],
        ))]);

        assert_eq!(query.variables, vec![Variable::new("B"), Variable::new("A")]);
        assert_eq!(query.as_rule().head.atom.tuple.arity(), 2);
    }

    #[test]
    fn test_head_equality_detection() {
        let rule = Rule::new(
            Literal::equality(Term::var("X"), Term::var("Y")),
            vec![Literal::positive(Atom::new(
                "same",
                vec![Term::var("X"), Term::var("Y")],
            ))],
        );
        assert!(rule.has_head_equality());
        assert!(!path_rule().has_head_equality());
        assert_eq!(rule.to_string(), "?X = ?Y :- same(?X, ?Y).");
    }
}
