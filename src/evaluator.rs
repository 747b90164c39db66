//! # Evaluator
//!
//! Semi-naive, stratified-negation fixpoint evaluation (spec.md §4.6).
//!
//! Grounded in the teacher's relational `IRNode` execution tree
//! (`execution::*`), radically simplified: rulr has no join planner or
//! operator tree, so rule evaluation here is a direct driver-literal
//! selection plus a recursive body matcher over flat literal lists, exactly
//! as spec.md §4.6 describes it.

use crate::ir::{IrLiteral, IrProgram, IrRule, IrTerm};
use crate::runtime::PredicateRuntime;
use crate::value::{Tuple, Value};

type Env = Vec<Option<Value>>;

fn term_value(term: &IrTerm, env: &Env) -> Option<Value> {
    match term {
        IrTerm::Integer(v) => Some(Value::Int(*v)),
        IrTerm::SymbolId(s) => Some(Value::Symbol(*s)),
        IrTerm::Variable(idx) => env[*idx],
    }
}

/// Unify `args` against `row`, binding free variables in `env` and failing
/// on any mismatch (spec.md §4.6 "unify it with the driver literal").
fn unify(args: &[IrTerm], row: &[Value], env: &mut Env) -> bool {
    for (term, value) in args.iter().zip(row) {
        match term {
            IrTerm::Integer(v) => {
                if *value != Value::Int(*v) {
                    return false;
                }
            }
            IrTerm::SymbolId(s) => {
                if *value != Value::Symbol(*s) {
                    return false;
                }
            }
            IrTerm::Variable(idx) => match env[*idx] {
                Some(bound) if bound != *value => return false,
                Some(_) => {}
                None => env[*idx] = Some(*value),
            },
        }
    }
    true
}

fn eval_equality(lhs: &IrTerm, rhs: &IrTerm, env: &Env) -> Option<Env> {
    match (term_value(lhs, env), term_value(rhs, env)) {
        (Some(a), Some(b)) => (a == b).then(|| env.clone()),
        (Some(a), None) => {
            let IrTerm::Variable(idx) = rhs else { return None };
            let mut next = env.clone();
            next[*idx] = Some(a);
            Some(next)
        }
        (None, Some(b)) => {
            let IrTerm::Variable(idx) = lhs else { return None };
            let mut next = env.clone();
            next[*idx] = Some(b);
            Some(next)
        }
        (None, None) => None,
    }
}

fn eval_comparison(op: crate::ast::ComparisonOp, lhs: &IrTerm, rhs: &IrTerm, env: &Env) -> bool {
    use crate::ast::ComparisonOp::{Eq, Ge, Gt, Le, Lt, Ne};
    let (Some(a), Some(b)) = (term_value(lhs, env), term_value(rhs, env)) else {
        return false;
    };
    if a.is_symbol() != b.is_symbol() {
        return false;
    }
    let (x, y) = (a.index_key(), b.index_key());
    match op {
        Eq => x == y,
        Ne => x != y,
        Lt => x < y,
        Le => x <= y,
        Gt => x > y,
        Ge => x >= y,
    }
}

/// `match(a, b)`: exact equality of the two ground operands (spec.md §9).
fn eval_builtin(lhs: &IrTerm, rhs: &IrTerm, env: &Env) -> bool {
    match (term_value(lhs, env), term_value(rhs, env)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Collect the candidate `base` rows for a non-driver positive literal,
/// using the argument-0 index when the first argument is already bound
/// (spec.md §4.6 "Recursive body matcher").
fn positive_candidates(runtime: &PredicateRuntime, args: &[IrTerm], env: &Env) -> Vec<Tuple> {
    if let (Some(first), Some(index)) = (args.first(), runtime.index.as_ref()) {
        if let Some(bound) = term_value(first, env) {
            return index
                .lookup(bound.index_key())
                .iter()
                .filter_map(|&row| runtime.base.get(row).cloned())
                .collect();
        }
    }
    runtime.base.iter().cloned().collect()
}

fn exists_in_base(runtime: &PredicateRuntime, args: &[IrTerm], env: &Env) -> bool {
    runtime.base.iter().any(|row| {
        let mut probe = env.clone();
        unify(args, row.as_slice(), &mut probe)
    })
}

/// Recursively matches `rule.body[remaining[pos..]]`, calling `on_match`
/// with the final environment for every satisfying assignment.
#[allow(clippy::too_many_arguments)]
fn match_remaining(
    rule: &IrRule,
    remaining: &[usize],
    pos: usize,
    env: &Env,
    runtimes: &[PredicateRuntime],
    on_match: &mut dyn FnMut(&Env),
) {
    if pos == remaining.len() {
        on_match(env);
        return;
    }
    match &rule.body[remaining[pos]] {
        IrLiteral::Positive { predicate, args } => {
            for candidate in positive_candidates(&runtimes[*predicate], args, env) {
                let mut next_env = env.clone();
                if unify(args, candidate.as_slice(), &mut next_env) {
                    match_remaining(rule, remaining, pos + 1, &next_env, runtimes, on_match);
                }
            }
        }
        IrLiteral::Negative { predicate, args } => {
            if !exists_in_base(&runtimes[*predicate], args, env) {
                match_remaining(rule, remaining, pos + 1, env, runtimes, on_match);
            }
        }
        IrLiteral::Equality { lhs, rhs } => {
            if let Some(next_env) = eval_equality(lhs, rhs, env) {
                match_remaining(rule, remaining, pos + 1, &next_env, runtimes, on_match);
            }
        }
        IrLiteral::Comparison { op, lhs, rhs } => {
            if eval_comparison(*op, lhs, rhs, env) {
                match_remaining(rule, remaining, pos + 1, env, runtimes, on_match);
            }
        }
        IrLiteral::Builtin { lhs, rhs, .. } => {
            if eval_builtin(lhs, rhs, env) {
                match_remaining(rule, remaining, pos + 1, env, runtimes, on_match);
            }
        }
    }
}

fn head_tuple(rule: &IrRule, env: &Env) -> Tuple {
    Tuple::new(rule.head_args.iter().map(|t| term_value(t, env).expect("rule is safe")).collect())
}

/// Evaluates one rule once against the current `base`/`delta` state,
/// inserting every derived head tuple into the head predicate's `next`
/// buffer. Returns `true` if any tuple was newly inserted.
fn evaluate_rule(program: &IrProgram, runtimes: &mut [PredicateRuntime], rule: &IrRule) -> bool {
    let head_stratum = program.predicates.get(rule.head_predicate).expect("valid id").stratum;
    let driver_pos = rule.body.iter().position(|l| matches!(l, IrLiteral::Positive { .. }));

    let mut produced: Vec<Tuple> = Vec::new();
    let mut record = |env: &Env| produced.push(head_tuple(rule, env));

    match driver_pos {
        None => {
            let remaining: Vec<usize> = (0..rule.body.len()).collect();
            let env = vec![None; rule.num_vars];
            match_remaining(rule, &remaining, 0, &env, runtimes, &mut record);
        }
        Some(driver_pos) => {
            let IrLiteral::Positive { predicate, args } = &rule.body[driver_pos] else {
                unreachable!("driver_pos always names a positive literal")
            };
            let driver_def = program.predicates.get(*predicate).expect("valid id");
            let use_base = !driver_def.is_idb || driver_def.stratum < head_stratum;
            let driver_rows: Vec<Tuple> = if use_base {
                runtimes[*predicate].base.iter().cloned().collect()
            } else {
                runtimes[*predicate].delta.iter().cloned().collect()
            };
            let remaining: Vec<usize> = (0..rule.body.len()).filter(|&i| i != driver_pos).collect();
            for row in driver_rows {
                let mut env = vec![None; rule.num_vars];
                if unify(args, row.as_slice(), &mut env) {
                    match_remaining(rule, &remaining, 0, &env, runtimes, &mut record);
                }
            }
        }
    }

    let mut changed = false;
    for tuple in produced {
        if runtimes[rule.head_predicate].insert_next_unique(tuple) {
            changed = true;
        }
    }
    changed
}

/// Runs the full semi-naive stratified fixpoint (spec.md §4.6) over
/// `runtimes`, indexed by predicate id exactly as `program.predicates` is.
pub fn evaluate(program: &IrProgram, runtimes: &mut [PredicateRuntime]) {
    for stratum in 0..=program.max_stratum {
        let members: Vec<usize> =
            program.predicates.iter().filter(|(_, d)| d.stratum == stratum).map(|(id, _)| id).collect();
        for &id in &members {
            runtimes[id].prepare_delta_from_base();
        }
        loop {
            for &id in &members {
                runtimes[id].next.clear();
            }
            let mut changed = false;
            for rule in &program.rules {
                if program.predicates.get(rule.head_predicate).expect("valid id").stratum == stratum {
                    changed |= evaluate_rule(program, runtimes, rule);
                }
            }
            for &id in &members {
                if runtimes[id].promote_next() {
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }
}
