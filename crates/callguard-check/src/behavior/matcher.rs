//! Behavior matching: does a value satisfy a descriptor?
//!
//! The [`Matcher`] is pure. Everything it needs to know about classes and
//! members comes from a [`TypeEnvironment`], which the runtime implements.
//! Capability probes (`RespondsTo`) are inherently dynamic: they look at the
//! member tables as they are at the moment of the check.

use std::panic::{self, AssertUnwindSafe};

use callguard_core::{ScopeId, Symbol, Value};

use super::{BehaviorDescriptor, Predicate};

/// Default bound on tuple nesting.
pub const DEFAULT_MAX_MATCH_DEPTH: usize = 32;

/// Type and capability queries the matcher relies on.
pub trait TypeEnvironment {
    /// `true` if `value`'s class is `scope` or a subtype of it.
    fn is_instance_of(&self, value: &Value, scope: ScopeId) -> bool;

    /// `true` if `value` publicly answers `member`.
    fn responds_to(&self, value: &Value, member: &Symbol) -> bool;

    /// Canonical text form of `value`, if it has one.
    fn text_of(&self, value: &Value) -> Option<String>;
}

/// Evaluates descriptors against values.
pub struct Matcher<'e, E: TypeEnvironment + ?Sized> {
    env: &'e E,
    max_depth: usize,
}

impl<'e, E: TypeEnvironment + ?Sized> Matcher<'e, E> {
    pub fn new(env: &'e E) -> Self {
        Matcher {
            env,
            max_depth: DEFAULT_MAX_MATCH_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Returns whether `value` satisfies `descriptor`.
    pub fn matches(&self, descriptor: &BehaviorDescriptor, value: &Value) -> bool {
        self.matches_at(descriptor, value, 0)
    }

    fn matches_at(&self, descriptor: &BehaviorDescriptor, value: &Value, depth: usize) -> bool {
        match descriptor {
            BehaviorDescriptor::ExactType(t) => self.env.is_instance_of(value, t.id),
            BehaviorDescriptor::RespondsTo(member) => self.env.responds_to(value, member),
            BehaviorDescriptor::Pattern(pattern) => self
                .env
                .text_of(value)
                .is_some_and(|text| pattern.is_match(&text)),
            BehaviorDescriptor::Interval(interval) => interval.contains(value),
            BehaviorDescriptor::Tuple(items) => {
                if depth >= self.max_depth {
                    return false;
                }
                let Value::Array(elements) = value else {
                    return false;
                };
                elements.len() == items.len()
                    && items
                        .iter()
                        .zip(elements)
                        .all(|(d, v)| self.matches_at(d, v, depth + 1))
            }
            BehaviorDescriptor::Predicate(predicate) => run_predicate(predicate, value),
            BehaviorDescriptor::BooleanTrue => value.truthy(),
            BehaviorDescriptor::BooleanFalse => !value.truthy(),
            BehaviorDescriptor::Absent => value.is_nil(),
            BehaviorDescriptor::Wildcard => true,
        }
    }
}

/// Runs a predicate, turning faults and panics into a non-match.
fn run_predicate(predicate: &Predicate, value: &Value) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| predicate.call(value))) {
        Ok(Ok(result)) => result,
        Ok(Err(fault)) => {
            tracing::warn!(predicate = predicate.label(), %fault, "predicate fault treated as mismatch");
            false
        }
        Err(_) => {
            tracing::warn!(predicate = predicate.label(), "predicate panicked; treated as mismatch");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{Interval, Pattern, PredicateFault, TypeRef};
    use crate::runtime::Runtime;

    fn int() -> BehaviorDescriptor {
        BehaviorDescriptor::ExactType(TypeRef::new(ScopeId::INTEGER, "Integer"))
    }

    fn pair_of_ints() -> BehaviorDescriptor {
        BehaviorDescriptor::Tuple(vec![int(), int()])
    }

    // -----------------------------------------------------------------------
    // Exact type
    // -----------------------------------------------------------------------

    #[test]
    fn exact_type_honors_subtypes() {
        let rt = Runtime::new();
        let m = Matcher::new(&rt);
        let numeric = BehaviorDescriptor::ExactType(TypeRef::new(ScopeId::NUMERIC, "Numeric"));
        let boolean = BehaviorDescriptor::ExactType(TypeRef::new(ScopeId::BOOLEAN, "Boolean"));

        assert!(m.matches(&int(), &Value::Int(1)));
        assert!(!m.matches(&int(), &Value::Float(1.0)));
        assert!(m.matches(&numeric, &Value::Float(1.0)));
        assert!(m.matches(&boolean, &Value::Bool(false)));
        assert!(!m.matches(&boolean, &Value::Nil));
    }

    #[test]
    fn exact_type_for_objects() {
        let rt = Runtime::new();
        let base = rt.define_class("Base", None).unwrap();
        let derived = rt.define_class("Derived", Some(base)).unwrap();
        let obj = rt.new_object(derived).unwrap();
        let m = Matcher::new(&rt);

        assert!(m.matches(&BehaviorDescriptor::ExactType(TypeRef::new(base, "Base")), &obj));
        assert!(!m.matches(&int(), &obj));
    }

    // -----------------------------------------------------------------------
    // Capability, pattern, interval
    // -----------------------------------------------------------------------

    #[test]
    fn responds_to_probes_members() {
        let rt = Runtime::new();
        let m = Matcher::new(&rt);
        let to_i = BehaviorDescriptor::RespondsTo("to_i".into());

        assert!(m.matches(&to_i, &Value::Int(123)));
        assert!(m.matches(&to_i, &Value::from("42")));
        assert!(m.matches(&to_i, &Value::Nil));
        assert!(!m.matches(&to_i, &Value::Bool(true)));
    }

    #[test]
    fn pattern_uses_text_form() {
        let rt = Runtime::new();
        let m = Matcher::new(&rt);
        let cuba = BehaviorDescriptor::Pattern(Pattern::new("cuba").unwrap());

        assert!(m.matches(&cuba, &Value::from("cuba")));
        assert!(m.matches(&cuba, &Value::Symbol("cuba_libre".into())));
        assert!(!m.matches(&cuba, &Value::from("brazil")));

        let digits = BehaviorDescriptor::Pattern(Pattern::new("^\\d+$").unwrap());
        assert!(m.matches(&digits, &Value::Int(123)));
    }

    #[test]
    fn interval_membership() {
        let rt = Runtime::new();
        let m = Matcher::new(&rt);
        let range = BehaviorDescriptor::Interval(Interval::inclusive(1, 10));
        assert!(m.matches(&range, &Value::Int(5)));
        assert!(!m.matches(&range, &Value::Int(1001)));
        assert!(!m.matches(&range, &Value::Nil));
    }

    #[test]
    fn interval_with_float_bound_is_exact_for_large_integers() {
        let rt = Runtime::new();
        let m = Matcher::new(&rt);
        let bound = 9_007_199_254_740_992_i64;
        let range = BehaviorDescriptor::Interval(Interval::inclusive(0, Value::Float(bound as f64)));
        assert!(m.matches(&range, &Value::Int(bound)));
        assert!(!m.matches(&range, &Value::Int(bound + 1)));
    }

    // -----------------------------------------------------------------------
    // Tuples
    // -----------------------------------------------------------------------

    #[test]
    fn tuple_requires_same_length_and_elementwise_match() {
        let rt = Runtime::new();
        let m = Matcher::new(&rt);

        assert!(m.matches(&pair_of_ints(), &Value::from(vec![Value::Int(1), Value::Int(2)])));
        assert!(!m.matches(
            &pair_of_ints(),
            &Value::from(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        ));
        assert!(!m.matches(&pair_of_ints(), &Value::from(vec![Value::Int(1), Value::from("x")])));
        assert!(!m.matches(&pair_of_ints(), &Value::Int(1)));
    }

    #[test]
    fn nested_tuples_respect_depth_limit() {
        let rt = Runtime::new();
        let nested = BehaviorDescriptor::Tuple(vec![pair_of_ints()]);
        let value = Value::from(vec![Value::from(vec![Value::Int(1), Value::Int(2)])]);

        assert!(Matcher::new(&rt).matches(&nested, &value));
        assert!(!Matcher::new(&rt).with_max_depth(1).matches(&nested, &value));
    }

    // -----------------------------------------------------------------------
    // Predicates and literals
    // -----------------------------------------------------------------------

    #[test]
    fn predicate_faults_are_mismatches() {
        let rt = Runtime::new();
        let m = Matcher::new(&rt);

        let non_nil = BehaviorDescriptor::Predicate(Predicate::from_fn("non_nil", |v| !v.is_nil()));
        assert!(m.matches(&non_nil, &Value::Int(123)));
        assert!(!m.matches(&non_nil, &Value::Nil));

        let faulty = BehaviorDescriptor::Predicate(Predicate::new("faulty", |_| {
            Err(PredicateFault::new("boom"))
        }));
        assert!(!m.matches(&faulty, &Value::Int(1)));

        let panicky = BehaviorDescriptor::Predicate(Predicate::from_fn("panicky", |_| {
            panic!("predicate blew up")
        }));
        assert!(!m.matches(&panicky, &Value::Int(1)));
    }

    #[test]
    fn boolean_literals_compare_truthiness() {
        let rt = Runtime::new();
        let m = Matcher::new(&rt);

        assert!(m.matches(&BehaviorDescriptor::BooleanTrue, &Value::Int(123)));
        assert!(!m.matches(&BehaviorDescriptor::BooleanTrue, &Value::Nil));
        assert!(m.matches(&BehaviorDescriptor::BooleanFalse, &Value::Nil));
        assert!(!m.matches(&BehaviorDescriptor::BooleanFalse, &Value::Int(123)));
    }

    #[test]
    fn absent_and_wildcard() {
        let rt = Runtime::new();
        let m = Matcher::new(&rt);

        assert!(m.matches(&BehaviorDescriptor::Absent, &Value::Nil));
        assert!(!m.matches(&BehaviorDescriptor::Absent, &Value::Array(vec![])));
        assert!(!m.matches(&BehaviorDescriptor::Absent, &Value::Bool(false)));
        assert!(m.matches(&BehaviorDescriptor::Wildcard, &Value::Nil));
        assert!(m.matches(&BehaviorDescriptor::Wildcard, &Value::from("anything")));
    }

    // -----------------------------------------------------------------------
    // Purity
    // -----------------------------------------------------------------------

    fn arb_value() -> impl proptest::strategy::Strategy<Value = Value> {
        use proptest::prelude::*;

        let leaf = prop_oneof![
            Just(Value::Nil),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            (-1.0e6..1.0e6f64).prop_map(Value::Float),
            "[a-z]{0,8}".prop_map(Value::Str),
        ];
        leaf.prop_recursive(2, 8, 3, |inner| {
            proptest::collection::vec(inner, 0..3).prop_map(Value::Array)
        })
    }

    proptest::proptest! {
        #[test]
        fn matching_is_deterministic(value in arb_value()) {
            let rt = Runtime::new();
            let m = Matcher::new(&rt);
            let descriptors = vec![
                int(),
                pair_of_ints(),
                BehaviorDescriptor::RespondsTo("to_i".into()),
                BehaviorDescriptor::Pattern(Pattern::new("a").unwrap()),
                BehaviorDescriptor::Interval(Interval::inclusive(-10, 10)),
                BehaviorDescriptor::BooleanTrue,
                BehaviorDescriptor::Absent,
            ];
            for d in &descriptors {
                proptest::prop_assert_eq!(m.matches(d, &value), m.matches(d, &value));
            }
            proptest::prop_assert!(m.matches(&BehaviorDescriptor::Wildcard, &value));
            proptest::prop_assert_eq!(
                m.matches(&BehaviorDescriptor::BooleanTrue, &value),
                !m.matches(&BehaviorDescriptor::BooleanFalse, &value)
            );
        }
    }
}
