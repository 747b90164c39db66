//! Property-based tests over randomly generated edge sets and rule sets,
//! covering the quantified invariants a stratified semi-naive evaluator
//! must hold regardless of input shape.

use std::collections::HashSet;

use proptest::prelude::*;
use rulr::engine::Engine;
use rulr::value::Value;

/// An arbitrary small directed graph over a fixed alphabet of node names,
/// rendered as `edge(...)` facts plus a transitive-closure rule pair.
fn arb_edges() -> impl Strategy<Value = Vec<(u8, u8)>> {
    prop::collection::vec((0u8..6, 0u8..6), 0..20)
}

fn chain_source(edges: &[(u8, u8)]) -> String {
    let mut src = String::from(".pred edge(a: symbol, b: symbol).\n.pred path(a: symbol, b: symbol).\n");
    for (a, b) in edges {
        src.push_str(&format!("edge(\"n{a}\",\"n{b}\").\n"));
    }
    src.push_str("path(A,B) :- edge(A,B).\n");
    src.push_str("path(A,C) :- edge(A,B), path(B,C).\n");
    src
}

/// Closes `edges` under transitivity with plain `HashSet` bookkeeping, as
/// an evaluator-independent oracle for `path`.
fn reference_closure(edges: &[(u8, u8)]) -> HashSet<(u8, u8)> {
    let mut closure: HashSet<(u8, u8)> = edges.iter().copied().collect();
    loop {
        let mut grown = false;
        let additions: Vec<(u8, u8)> = closure
            .iter()
            .flat_map(|&(a, b)| closure.iter().filter(move |&&(c, _)| c == b).map(move |&(_, d)| (a, d)))
            .collect();
        for pair in additions {
            if closure.insert(pair) {
                grown = true;
            }
        }
        if !grown {
            break;
        }
    }
    closure
}

fn path_pairs(engine: &Engine) -> HashSet<(u8, u8)> {
    let id = engine.get_predicate_id("path").expect("path is declared");
    engine
        .get_relation_view(id)
        .expect("valid id")
        .tuples
        .iter()
        .map(|t| {
            let Value::Symbol(a) = t.get(0).unwrap() else { panic!("not a symbol") };
            let Value::Symbol(b) = t.get(1).unwrap() else { panic!("not a symbol") };
            let name = |id: i32| -> u8 {
                engine.symbols().lookup(id).unwrap()[1..].parse().unwrap()
            };
            (name(a), name(b))
        })
        .collect()
}

proptest! {
    /// Invariant 2/4 (spec-level): every tuple the evaluator derives for
    /// `path` is exactly the transitive closure of the input edges --
    /// neither more (soundness) nor less (completeness).
    #[test]
    fn transitive_closure_matches_reference_oracle(edges in arb_edges()) {
        let mut engine = Engine::create();
        engine.load_rules_from_string(&chain_source(&edges)).unwrap();
        engine.evaluate();
        prop_assert_eq!(path_pairs(&engine), reference_closure(&edges));
    }

    /// Invariant 3: re-running the fixpoint never duplicates a `base` tuple.
    #[test]
    fn base_never_contains_duplicate_tuples(edges in arb_edges()) {
        let mut engine = Engine::create();
        engine.load_rules_from_string(&chain_source(&edges)).unwrap();
        engine.evaluate();
        let id = engine.get_predicate_id("path").unwrap();
        let tuples = &engine.get_relation_view(id).unwrap().tuples;
        let unique: HashSet<_> = tuples.iter().map(|t| (t.get(0).unwrap(), t.get(1).unwrap())).collect();
        prop_assert_eq!(unique.len(), tuples.len());
    }

    /// Invariant: evaluation is idempotent once at a fixpoint -- calling
    /// `evaluate()` again never grows or shrinks any relation.
    #[test]
    fn re_evaluating_a_fixpoint_is_a_no_op(edges in arb_edges()) {
        let mut engine = Engine::create();
        engine.load_rules_from_string(&chain_source(&edges)).unwrap();
        engine.evaluate();
        let before = path_pairs(&engine);
        engine.evaluate();
        prop_assert_eq!(path_pairs(&engine), before);
    }
}

// Invariant 1: every rule the IR builder accepts is range-restricted --
// generating rule bodies is harder to make "arbitrary" usefully, so this
// checks the inverse direction over a fixed corpus of safe/unsafe shapes
// and confirms the safety checker's verdict matches by inspection.
proptest! {
    #[test]
    fn safety_checker_agrees_with_manual_classification(
        bind_in_positive in any::<bool>(),
        negate_same_var in any::<bool>(),
    ) {
        let body = if bind_in_positive {
            if negate_same_var {
                ".pred base(x: symbol).\n.pred q(x: symbol).\nr(X) :- base(X), not q(X)."
            } else {
                ".pred base(x: symbol).\nr(X) :- base(X)."
            }
        } else if negate_same_var {
            ".pred q(x: symbol).\nr(X) :- not q(X)."
        } else {
            "r(X) :- X = X."
        };
        let mut engine = Engine::create();
        let result = engine.load_rules_from_string(body);
        prop_assert_eq!(result.is_ok(), bind_in_positive);
    }
}
