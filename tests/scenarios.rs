//! End-to-end scenarios exercised through the public [`Engine`] facade:
//! transitive closure, stratified negation, negation-cycle and safety
//! rejection, codec round-trip equivalence, and semi-naive/naive parity.

use std::collections::HashSet;

use rulr::engine::Engine;
use rulr::error::{EngineError, IrError};
use rulr::value::Value;

fn symbol_pairs(engine: &Engine, pred: &str) -> HashSet<(String, String)> {
    let id = engine.get_predicate_id(pred).expect("predicate registered");
    engine
        .get_relation_view(id)
        .expect("valid predicate id")
        .tuples
        .iter()
        .map(|t| {
            let Value::Symbol(a) = t.get(0).unwrap() else { panic!("not a symbol") };
            let Value::Symbol(b) = t.get(1).unwrap() else { panic!("not a symbol") };
            (engine.symbols().lookup(a).unwrap().to_string(), engine.symbols().lookup(b).unwrap().to_string())
        })
        .collect()
}

const CHAIN: &str = r#"
.pred edge(a: symbol, b: symbol).
.pred path(a: symbol, b: symbol).
edge("x","y"). edge("y","z"). edge("z","w").
path(A,B) :- edge(A,B).
path(A,C) :- edge(A,B), path(B,C).
"#;

#[test]
fn transitive_closure_over_a_chain_graph() {
    let mut engine = Engine::create();
    engine.load_rules_from_string(CHAIN).unwrap();
    engine.evaluate();

    let expected: HashSet<(String, String)> = [
        ("x", "y"),
        ("y", "z"),
        ("z", "w"),
        ("x", "z"),
        ("y", "w"),
        ("x", "w"),
    ]
    .into_iter()
    .map(|(a, b)| (a.to_string(), b.to_string()))
    .collect();
    assert_eq!(symbol_pairs(&engine, "path"), expected);
}

#[test]
fn stratified_negation_excludes_marked_nodes() {
    let mut engine = Engine::create();
    engine
        .load_rules_from_string(
            r#"
            .pred node(n: symbol).
            .pred marked(n: symbol).
            node("a"). node("b"). node("c"). marked("a").
            unmarked(N) :- node(N), not marked(N).
            "#,
        )
        .unwrap();
    engine.evaluate();

    let id = engine.get_predicate_id("unmarked").unwrap();
    let mut names: Vec<&str> = engine
        .get_relation_view(id)
        .unwrap()
        .tuples
        .iter()
        .map(|t| {
            let Value::Symbol(s) = t.get(0).unwrap() else { panic!("not a symbol") };
            engine.symbols().lookup(s).unwrap()
        })
        .collect();
    names.sort_unstable();
    assert_eq!(names, vec!["b", "c"]);
}

#[test]
fn negation_cycle_is_rejected_as_unstratifiable() {
    // Both rules bind their head variable positively through `base` first,
    // so this exercises the stratifier rather than the safety checker --
    // the cycle is p's negative dependency on q and q's on p.
    let mut engine = Engine::create();
    let err = engine
        .load_rules_from_string(
            r"
            .pred base(x: symbol). .pred p(x: symbol). .pred q(x: symbol).
            p(X) :- base(X), not q(X).
            q(X) :- base(X), not p(X).
            ",
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::Ir(IrError::NegationCycle { .. })), "got {err:?}");
}

#[test]
fn rule_with_variable_bound_only_negatively_is_unsafe() {
    let mut engine = Engine::create();
    let err = engine.load_rules_from_string(".pred p(x: symbol).\np(X) :- not p(X).").unwrap_err();
    match &err {
        EngineError::Ir(IrError::UnsafeRule { variable, .. }) => assert_eq!(variable, "X"),
        other => panic!("expected UnsafeRule, got {other:?}"),
    }
}

#[test]
fn codec_round_trip_evaluates_identically() {
    let mut direct = Engine::create();
    direct.load_rules_from_string(CHAIN).unwrap();
    direct.evaluate();

    let bytes = Engine::compile_to_bytes(CHAIN).unwrap();
    let program = rulr::codec::decode(&bytes).unwrap();
    let reencoded = rulr::codec::encode(&program).unwrap();
    assert_eq!(bytes, reencoded);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chain.dlc");
    std::fs::write(&path, &bytes).unwrap();
    let mut from_codec = Engine::create();
    from_codec.load_rules_from_file(&path).unwrap();
    from_codec.evaluate();

    assert_eq!(symbol_pairs(&direct, "path"), symbol_pairs(&from_codec, "path"));
}

/// A reference evaluator that ignores `delta`/`next` bookkeeping entirely
/// and just re-runs every rule over `base` until nothing new appears --
/// the naive algorithm the semi-naive evaluator is checked against.
fn naive_evaluate(program: &rulr::ir::IrProgram, runtimes: &mut [rulr::runtime::PredicateRuntime]) {
    loop {
        let mut produced: Vec<(usize, rulr::value::Tuple)> = Vec::new();
        for rule in &program.rules {
            let num_vars = rule.num_vars;
            let mut stack: Vec<Vec<Option<Value>>> = vec![vec![None; num_vars]];
            for literal in &rule.body {
                let mut next_stack = Vec::new();
                for env in stack {
                    match literal {
                        rulr::ir::IrLiteral::Positive { predicate, args } => {
                            for row in runtimes[*predicate].base.iter() {
                                let mut candidate = env.clone();
                                if unify_naive(args, row.as_slice(), &mut candidate) {
                                    next_stack.push(candidate);
                                }
                            }
                        }
                        rulr::ir::IrLiteral::Negative { predicate, args } => {
                            let exists = runtimes[*predicate].base.iter().any(|row| {
                                let mut probe = env.clone();
                                unify_naive(args, row.as_slice(), &mut probe)
                            });
                            if !exists {
                                next_stack.push(env.clone());
                            }
                        }
                        rulr::ir::IrLiteral::Equality { lhs, rhs } => {
                            if let Some(bound) = eval_equality_naive(lhs, rhs, &env) {
                                next_stack.push(bound);
                            }
                        }
                        rulr::ir::IrLiteral::Comparison { .. } | rulr::ir::IrLiteral::Builtin { .. } => {
                            next_stack.push(env.clone());
                        }
                    }
                }
                stack = next_stack;
            }
            for env in stack {
                let tuple = rulr::value::Tuple::new(
                    rule.head_args.iter().map(|t| term_value_naive(t, &env).expect("rule is safe")).collect(),
                );
                produced.push((rule.head_predicate, tuple));
            }
        }
        let mut changed = false;
        for (pred, tuple) in produced {
            if runtimes[pred].insert_base_unique(tuple) {
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

fn term_value_naive(term: &rulr::ir::IrTerm, env: &[Option<Value>]) -> Option<Value> {
    match term {
        rulr::ir::IrTerm::Integer(v) => Some(Value::Int(*v)),
        rulr::ir::IrTerm::SymbolId(s) => Some(Value::Symbol(*s)),
        rulr::ir::IrTerm::Variable(idx) => env[*idx],
    }
}

fn unify_naive(args: &[rulr::ir::IrTerm], row: &[Value], env: &mut [Option<Value>]) -> bool {
    for (term, value) in args.iter().zip(row) {
        match term {
            rulr::ir::IrTerm::Integer(v) if *value != Value::Int(*v) => return false,
            rulr::ir::IrTerm::SymbolId(s) if *value != Value::Symbol(*s) => return false,
            rulr::ir::IrTerm::Variable(idx) => match env[*idx] {
                Some(bound) if bound != *value => return false,
                Some(_) => {}
                None => env[*idx] = Some(*value),
            },
            _ => {}
        }
    }
    true
}

fn eval_equality_naive(lhs: &rulr::ir::IrTerm, rhs: &rulr::ir::IrTerm, env: &[Option<Value>]) -> Option<Vec<Option<Value>>> {
    match (term_value_naive(lhs, env), term_value_naive(rhs, env)) {
        (Some(a), Some(b)) => (a == b).then(|| env.to_vec()),
        (Some(a), None) => {
            let rulr::ir::IrTerm::Variable(idx) = rhs else { return None };
            let mut next = env.to_vec();
            next[*idx] = Some(a);
            Some(next)
        }
        (None, Some(b)) => {
            let rulr::ir::IrTerm::Variable(idx) = lhs else { return None };
            let mut next = env.to_vec();
            next[*idx] = Some(b);
            Some(next)
        }
        (None, None) => None,
    }
}

fn parity_check(source: &str, predicates: &[&str]) {
    let program = rulr::parser::Parser::new(source).unwrap().parse_program().unwrap();
    let mut symbols_semi = rulr::symbols::SymbolTable::new();
    let (ir, facts) = rulr::ir_builder::build(&program, rulr::ir::PredicateTable::new(), &mut symbols_semi).unwrap();

    let mut semi_naive_runtimes: Vec<rulr::runtime::PredicateRuntime> =
        ir.predicates.iter().map(|(_, d)| rulr::runtime::PredicateRuntime::new(d.arity, d.stratum)).collect();
    for fact in &facts {
        semi_naive_runtimes[fact.predicate].insert_base_unique(rulr::value::Tuple::new(fact.values.clone()));
    }
    rulr::evaluator::evaluate(&ir, &mut semi_naive_runtimes);

    let mut naive_runtimes: Vec<rulr::runtime::PredicateRuntime> =
        ir.predicates.iter().map(|(_, d)| rulr::runtime::PredicateRuntime::new(d.arity, d.stratum)).collect();
    for fact in &facts {
        naive_runtimes[fact.predicate].insert_base_unique(rulr::value::Tuple::new(fact.values.clone()));
    }
    naive_evaluate(&ir, &mut naive_runtimes);

    for name in predicates {
        let id = ir.predicates.find(name).unwrap();
        let mut semi: Vec<Vec<Value>> = semi_naive_runtimes[id].base.iter().map(|t| t.as_slice().to_vec()).collect();
        let mut naive: Vec<Vec<Value>> = naive_runtimes[id].base.iter().map(|t| t.as_slice().to_vec()).collect();
        semi.sort_by_key(|t| t.iter().copied().map(Value::index_key).collect::<Vec<_>>());
        naive.sort_by_key(|t| t.iter().copied().map(Value::index_key).collect::<Vec<_>>());
        assert_eq!(semi, naive, "semi-naive and naive disagree on '{name}'");
    }
}

#[test]
fn semi_naive_matches_naive_on_transitive_closure() {
    parity_check(CHAIN, &["path"]);
}

#[test]
fn semi_naive_matches_naive_on_stratified_negation() {
    parity_check(
        r#"
        .pred node(n: symbol).
        .pred marked(n: symbol).
        node("a"). node("b"). node("c"). marked("a").
        unmarked(N) :- node(N), not marked(N).
        "#,
        &["unmarked"],
    );
}

#[test]
fn semi_naive_matches_naive_on_a_diamond_graph() {
    parity_check(
        r#"
        .pred edge(a: symbol, b: symbol).
        .pred path(a: symbol, b: symbol).
        edge("a","b"). edge("a","c"). edge("b","d"). edge("c","d"). edge("d","e").
        path(A,B) :- edge(A,B).
        path(A,C) :- edge(A,B), path(B,C).
        "#,
        &["path"],
    );
}

/// A negative literal positioned before the positive literal that is its
/// only source of a binding must still see that binding, not a stale
/// wider probe (the body's textual order is `p(X), not q(Y), s(Y).`, so
/// `Y` is unbound in the rule's source order at the point `not q(Y)` is
/// written, even though it is positively bound later by `s(Y)`).
#[test]
fn negative_literal_sees_binding_from_a_later_positive_literal() {
    let mut engine = Engine::create();
    engine
        .load_rules_from_string(
            r#"
            .pred p(x: symbol).
            .pred q(y: symbol).
            .pred s(y: symbol).
            p("a").
            q("keep").
            s("keep"). s("drop").
            r(X,Y) :- p(X), not q(Y), s(Y).
            "#,
        )
        .unwrap();
    engine.evaluate();
    assert_eq!(symbol_pairs(&engine, "r"), HashSet::from([("a".to_string(), "drop".to_string())]));
}
