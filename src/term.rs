use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A named logic variable (e.g. `?X`)
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Variable(Arc<str>);

impl Variable {
    /// Create a variable with the given name
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// The variable name, without the `?` prefix
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

/// A typed constant value
///
/// Constants are totally ordered: first by type (in declaration order), then by value.
/// Doubles compare with [`f64::total_cmp`], so `NaN` is equal to itself and
/// `-0.0 < 0.0`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Constant {
    /// `true` / `false`
    Boolean(bool),
    /// A signed integer
    Integer(i64),
    /// A double precision float
    Double(f64),
    /// A plain string (e.g. `'alice'`)
    String(Arc<str>),
    /// An IRI (e.g. `_"http://example.org/a"`)
    Iri(Arc<str>),
}

impl Constant {
    fn type_rank(&self) -> u8 {
        match self {
            Constant::Boolean(_) => 0,
            Constant::Integer(_) => 1,
            Constant::Double(_) => 2,
            Constant::String(_) => 3,
            Constant::Iri(_) => 4,
        }
    }
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Constant {}

impl PartialOrd for Constant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Constant {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Constant::Boolean(a), Constant::Boolean(b)) => a.cmp(b),
            (Constant::Integer(a), Constant::Integer(b)) => a.cmp(b),
            (Constant::Double(a), Constant::Double(b)) => a.total_cmp(b),
            (Constant::String(a), Constant::String(b)) | (Constant::Iri(a), Constant::Iri(b)) => {
                a.cmp(b)
            }
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl Hash for Constant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_rank().hash(state);
        match self {
            Constant::Boolean(b) => b.hash(state),
            Constant::Integer(i) => i.hash(state),
            Constant::Double(d) => d.to_bits().hash(state),
            Constant::String(s) | Constant::Iri(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Boolean(b) => write!(f, "{b}"),
            Constant::Integer(i) => write!(f, "{i}"),
            Constant::Double(d) => write!(f, "{d:?}"),
            Constant::String(s) => write!(f, "'{s}'"),
            Constant::Iri(s) => write!(f, "_\"{s}\""),
        }
    }
}

/// A function symbol applied to argument terms (e.g. `f(?X, 'a')`)
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Constructed {
    /// The function symbol
    pub functor: Arc<str>,
    /// The ordered arguments
    pub args: Vec<Term>,
}

/// A Datalog term
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Term {
    /// A variable that binds to ground terms during evaluation
    Variable(Variable),
    /// A typed constant
    Constant(Constant),
    /// A constructed (function) term
    Constructed(Constructed),
}

impl Term {
    /// Shorthand for a variable term
    #[must_use]
    pub fn var(name: &str) -> Self {
        Term::Variable(Variable::new(name))
    }

    /// Shorthand for a string constant
    #[must_use]
    pub fn string(value: &str) -> Self {
        Term::Constant(Constant::String(Arc::from(value)))
    }

    /// Shorthand for an integer constant
    #[must_use]
    pub fn integer(value: i64) -> Self {
        Term::Constant(Constant::Integer(value))
    }

    /// Shorthand for a constructed term
    #[must_use]
    pub fn constructed(functor: &str, args: Vec<Term>) -> Self {
        Term::Constructed(Constructed {
            functor: Arc::from(functor),
            args,
        })
    }

    /// True when the term contains no variables
    #[must_use]
    pub fn is_ground(&self) -> bool {
        match self {
            Term::Variable(_) => false,
            Term::Constant(_) => true,
            Term::Constructed(c) => c.args.iter().all(Term::is_ground),
        }
    }

    /// Appends the variables of this term to `out`, skipping ones already present
    pub fn collect_variables(&self, out: &mut Vec<Variable>) {
        match self {
            Term::Variable(v) => {
                if !out.contains(v) {
                    out.push(v.clone());
                }
            }
            Term::Constant(_) => {}
            Term::Constructed(c) => c.args.iter().for_each(|arg| arg.collect_variables(out)),
        }
    }

    /// Replace variables using `lookup`; unknown variables are left in place
    #[must_use]
    pub fn substitute<F>(&self, lookup: &F) -> Term
    where
        F: Fn(&Variable) -> Option<Term>,
    {
        match self {
            Term::Variable(v) => lookup(v).unwrap_or_else(|| self.clone()),
            Term::Constant(_) => self.clone(),
            Term::Constructed(c) => Term::Constructed(Constructed {
                functor: Arc::clone(&c.functor),
                args: c.args.iter().map(|arg| arg.substitute(lookup)).collect(),
            }),
        }
    }

    /// Structural match of a (possibly non-ground) pattern against a ground term.
    ///
    /// Bindings already present in `binding` must agree; new ones are appended.
    pub(crate) fn match_ground(&self, ground: &Term, binding: &mut Vec<(Variable, Term)>) -> bool {
        match (self, ground) {
            (Term::Variable(v), _) => match binding.iter().find(|(bound, _)| bound == v) {
                Some((_, value)) => value == ground,
                None => {
                    binding.push((v.clone(), ground.clone()));
                    true
                }
            },
            (Term::Constructed(p), Term::Constructed(g)) => {
                p.functor == g.functor
                    && p.args.len() == g.args.len()
                    && p.args
                        .iter()
                        .zip(&g.args)
                        .all(|(pa, ga)| pa.match_ground(ga, binding))
            }
            _ => self == ground,
        }
    }

    /// Whether two terms could denote the same ground term (variables match anything)
    pub(crate) fn may_unify(&self, other: &Term) -> bool {
        match (self, other) {
            (Term::Variable(_), _) | (_, Term::Variable(_)) => true,
            (Term::Constructed(a), Term::Constructed(b)) => {
                a.functor == b.functor
                    && a.args.len() == b.args.len()
                    && a.args.iter().zip(&b.args).all(|(x, y)| x.may_unify(y))
            }
            _ => self == other,
        }
    }
}

impl From<Constant> for Term {
    fn from(value: Constant) -> Self {
        Term::Constant(value)
    }
}

impl From<Variable> for Term {
    fn from(value: Variable) -> Self {
        Term::Variable(value)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(v) => write!(f, "{v}"),
            Term::Constant(c) => write!(f, "{c}"),
            Term::Constructed(c) => {
                write!(f, "{}(", c.functor)?;
                write_separated(f, &c.args)?;
                write!(f, ")")
            }
        }
    }
}

/// An immutable, fixed-length sequence of terms
///
/// Cloning is cheap: the terms are shared.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tuple(Arc<[Term]>);

impl Tuple {
    /// Build a tuple from its terms
    #[must_use]
    pub fn new(terms: Vec<Term>) -> Self {
        Self(Arc::from(terms))
    }

    /// The zero-length tuple
    #[must_use]
    pub fn empty() -> Self {
        Self(Arc::from(Vec::new()))
    }

    /// Number of terms
    #[must_use]
    pub fn arity(&self) -> usize {
        self.0.len()
    }

    /// True when every term is ground
    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.0.iter().all(Term::is_ground)
    }

    /// Distinct variables in order of first occurrence
    #[must_use]
    pub fn variables(&self) -> Vec<Variable> {
        let mut out = Vec::new();
        self.0.iter().for_each(|t| t.collect_variables(&mut out));
        out
    }

    /// A new tuple with this tuple's terms followed by `extra`
    #[must_use]
    pub fn extended<I>(&self, extra: I) -> Tuple
    where
        I: IntoIterator<Item = Term>,
    {
        Tuple::new(self.0.iter().cloned().chain(extra).collect())
    }
}

impl Deref for Tuple {
    type Target = [Term];

    fn deref(&self) -> &[Term] {
        &self.0
    }
}

impl From<Vec<Term>> for Tuple {
    fn from(terms: Vec<Term>) -> Self {
        Tuple::new(terms)
    }
}

impl FromIterator<Term> for Tuple {
    fn from_iter<I: IntoIterator<Item = Term>>(iter: I) -> Self {
        Tuple::new(iter.into_iter().collect())
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        write_separated(f, &self.0)?;
        write!(f, ")")
    }
}

pub(crate) fn write_separated<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_order_by_type_then_value() {
        let mut constants = vec![
            Constant::String(Arc::from("b")),
            Constant::Integer(7),
            Constant::Double(1.5),
            Constant::String(Arc::from("a")),
            Constant::Boolean(true),
            Constant::Integer(-2),
        ];
        constants.sort();

        assert_eq!(
            constants,
            vec![
                Constant::Boolean(true),
                Constant::Integer(-2),
                Constant::Integer(7),
                Constant::Double(1.5),
                Constant::String(Arc::from("a")),
                Constant::String(Arc::from("b")),
            ]
        );
    }

    #[test]
    fn test_double_equality_is_total() {
        assert_eq!(Constant::Double(f64::NAN), Constant::Double(f64::NAN));
        assert!(Constant::Double(-0.0) < Constant::Double(0.0));
        // Same numeric value, different types
        assert_ne!(Constant::Double(1.0), Constant::Integer(1));
    }

    #[test]
    fn test_tuple_variables_in_first_occurrence_order() {
        let tuple = Tuple::new(vec![
            Term::var("Y"),
            Term::constructed("f", vec![Term::var("X"), Term::var("Y")]),
            Term::string("a"),
            Term::var("Z"),
        ]);

        assert_eq!(
            tuple.variables(),
            vec![Variable::new("Y"), Variable::new("X"), Variable::new("Z")]
        );
        assert!(!tuple.is_ground());
    }

    #[test]
    fn test_match_ground_respects_repeated_variables() {
        let pattern = Term::constructed("pair", vec![Term::var("X"), Term::var("X")]);
        let same = Term::constructed("pair", vec![Term::integer(1), Term::integer(1)]);
        let different = Term::constructed("pair", vec![Term::integer(1), Term::integer(2)]);

        let mut binding = Vec::new();
        assert!(pattern.match_ground(&same, &mut binding));
        assert_eq!(binding, vec![(Variable::new("X"), Term::integer(1))]);

        let mut binding = Vec::new();
        assert!(!pattern.match_ground(&different, &mut binding));
    }

    #[test]
    fn test_display() {
        let term = Term::constructed("f", vec![Term::var("X"), Term::string("a"), Term::integer(3)]);
        assert_eq!(term.to_string(), "f(?X, 'a', 3)");
    }
}
