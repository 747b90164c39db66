//! # IR Builder
//!
//! AST → IR: resolves predicate names to ids, interns string literals,
//! assigns per-rule variable indices, type-checks arguments, enforces the
//! range-restriction (safety) rule, and computes a stratification number
//! per predicate (spec.md §4.3).
//!
//! Grounded in the teacher's `ir_builder::IRBuilder` (catalog-backed name
//! resolution) and `recursion::DependencyGraph` (stratified-negation
//! dependency tracking), generalized from the teacher's SCC/SIP-rewriting
//! pipeline down to rulr's simpler per-predicate fixpoint-raise
//! stratification (spec.md §4.3 step 5) — rulr has no join-tree IR, so
//! there is no notion of grouping mutually recursive relations the way the
//! teacher's Tarjan pass does; a rule only ever needs its own head's
//! stratum raised high enough.

use std::collections::HashMap;

use crate::ast::{self, DeclaredType, Literal, Program, Term};
use crate::error::IrError;
use crate::ir::{ArgType, IrLiteral, IrProgram, IrRule, IrTerm, PredicateDef, PredicateTable};
use crate::symbols::SymbolTable;
use crate::value::Value;

/// Maximum number of declarations/facts/rules in one program, and the
/// maximum body-literal count per rule (spec.md §6). Kept as the IR
/// builder's over-limit guard; the codec enforces the same bounds as
/// hard on-disk field widths.
pub const MAX_PREDICATES: usize = 65_535;
pub const MAX_RULES: usize = 65_535;
pub const MAX_LITERALS: usize = 65_535;

/// A ground fact with its predicate resolved to an id and its arguments
/// resolved to runtime [`Value`]s (string literals interned via the same
/// symbol table the rules use, so constants compare equal across facts and
/// rule bodies). Facts are not IR nodes (spec.md §4.3 step 2) — this is
/// purely the engine's insertion payload.
#[derive(Debug, Clone)]
pub struct ResolvedFact {
    pub predicate: usize,
    pub values: Vec<Value>,
}

struct VarTable {
    names: Vec<Option<String>>,
    lookup: HashMap<String, usize>,
}

impl VarTable {
    fn new() -> Self {
        VarTable { names: Vec::new(), lookup: HashMap::new() }
    }

    fn variable(&mut self, name: &str) -> usize {
        if let Some(&id) = self.lookup.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(Some(name.to_string()));
        self.lookup.insert(name.to_string(), id);
        id
    }

    fn wildcard(&mut self) -> usize {
        let id = self.names.len();
        self.names.push(None);
        id
    }

    fn len(&self) -> usize {
        self.names.len()
    }
}

fn register_predicate(
    predicates: &mut PredicateTable,
    name: &str,
    arity: usize,
) -> Result<usize, IrError> {
    if let Some(id) = predicates.find(name) {
        let def = predicates.get(id).expect("id from find always resolves");
        if def.arity != arity {
            return Err(IrError::ArityMismatch {
                name: name.to_string(),
                old_arity: def.arity,
                new_arity: arity,
            });
        }
        Ok(id)
    } else {
        if predicates.len() >= MAX_PREDICATES {
            return Err(IrError::OverLimit { what: "predicates", count: predicates.len(), max: MAX_PREDICATES });
        }
        Ok(predicates.push(PredicateDef {
            name: name.to_string(),
            arity,
            declared: false,
            arg_types: vec![ArgType::Unknown; arity],
            stratum: 0,
            is_idb: false,
        }))
    }
}

fn check_term_type(
    name: &str,
    index: usize,
    expected: ArgType,
    term_is_symbol: Option<bool>,
) -> Result<(), IrError> {
    let Some(is_symbol) = term_is_symbol else {
        return Ok(()); // variables are unconstrained a priori
    };
    let ok = match expected {
        ArgType::Unknown => true,
        ArgType::Symbol => is_symbol,
        ArgType::Int | ArgType::Range => !is_symbol,
    };
    if ok {
        Ok(())
    } else {
        let found = if is_symbol { ArgType::Symbol } else { ArgType::Int };
        Err(IrError::TypeMismatch { name: name.to_string(), index, expected, found })
    }
}

/// Translates one AST term to IR, interning string literals and assigning
/// variable indices, and returns whether the IR term is "symbol-shaped"
/// (for type checking) — `None` for variables, which aren't checked here.
fn translate_term(term: &Term, vars: &mut VarTable, symbols: &mut SymbolTable) -> (IrTerm, Option<bool>) {
    match term {
        Term::IntLiteral(v) => (IrTerm::Integer(*v), Some(false)),
        Term::StringLiteral(s) => (IrTerm::SymbolId(symbols.intern(s)), Some(true)),
        Term::Variable(name) => (IrTerm::Variable(vars.variable(name)), None),
        Term::Wildcard => (IrTerm::Variable(vars.wildcard()), None),
    }
}

/// Builds IR for one program against a (possibly already populated)
/// predicate table, which is extended in place as the spec's lazy
/// registration rule requires (spec.md §3 Invariants).
///
/// # Errors
/// Returns the first [`IrError`] hit: arity/type mismatch, an unsafe rule,
/// an unknown predicate in a fact, a negation cycle, or an over-limit count.
pub fn build(
    program: &Program,
    predicates: PredicateTable,
    symbols: &mut SymbolTable,
) -> Result<(IrProgram, Vec<ResolvedFact>), IrError> {
    build_with_limit(program, predicates, symbols, crate::config::EngineConfig::default().max_stratification_iterations)
}

/// Same as [`build`], but with an explicit cap on stratification passes
/// (wired from [`crate::config::EngineConfig::max_stratification_iterations`]
/// by the engine; exposed separately so tests can probe small caps).
///
/// # Errors
/// See [`build`].
pub fn build_with_limit(
    program: &Program,
    mut predicates: PredicateTable,
    symbols: &mut SymbolTable,
    max_iterations: usize,
) -> Result<(IrProgram, Vec<ResolvedFact>), IrError> {
    // 1. Declarations.
    for decl in &program.declarations {
        let arity = decl.args.len();
        let id = register_predicate(&mut predicates, &decl.predicate, arity)?;
        let def = predicates.get_mut(id).expect("just registered");
        def.declared = true;
        def.arg_types = decl.args.iter().map(|(_, ty)| *ty).collect();
    }

    // 2. Facts.
    let mut resolved_facts = Vec::with_capacity(program.facts.len());
    for fact in &program.facts {
        let id = register_predicate(&mut predicates, &fact.predicate, fact.args.len())?;
        let mut values = Vec::with_capacity(fact.args.len());
        for (i, arg) in fact.args.iter().enumerate() {
            let arg_type = predicates.get(id).expect("resolved above").arg_types[i];
            let (value, is_symbol) = match arg {
                ast::FactArg::Str(s) => (Value::Symbol(symbols.intern(s)), true),
                ast::FactArg::Int(v) => (Value::Int(*v), false),
            };
            check_term_type(&fact.predicate, i, arg_type, Some(is_symbol))?;
            values.push(value);
        }
        resolved_facts.push(ResolvedFact { predicate: id, values });
    }

    // 3. Rules.
    if program.rules.len() > MAX_RULES {
        return Err(IrError::OverLimit { what: "rules", count: program.rules.len(), max: MAX_RULES });
    }
    let mut ir_rules = Vec::with_capacity(program.rules.len());
    for rule in &program.rules {
        ir_rules.push(build_rule(rule, &mut predicates, symbols)?);
    }

    // 4. is_idb inference: recomputed fresh for the predicates touched by
    // this program's rule set (a predicate's IDB status reflects the
    // *current* rule list, spec.md §3).
    for def in predicates.iter_mut() {
        def.is_idb = false;
    }
    for rule in &ir_rules {
        predicates.get_mut(rule.head_predicate).expect("valid id").is_idb = true;
    }

    // 5. Stratification.
    let max_stratum = stratify(&ir_rules, &mut predicates, max_iterations)?;

    let ir_program = IrProgram { predicates, rules: ir_rules, max_stratum };
    Ok((ir_program, resolved_facts))
}

fn build_rule(
    rule: &ast::Rule,
    predicates: &mut PredicateTable,
    symbols: &mut SymbolTable,
) -> Result<IrRule, IrError> {
    if rule.body.len() > MAX_LITERALS {
        return Err(IrError::OverLimit { what: "body literals", count: rule.body.len(), max: MAX_LITERALS });
    }
    let mut vars = VarTable::new();
    let mut positively_bound: Vec<bool> = Vec::new();

    // Head terms first, so head variables get the lowest indices.
    let mut head_args = Vec::with_capacity(rule.head_args.len());
    let head_id = register_predicate(predicates, &rule.head_predicate, rule.head_args.len())?;
    for (i, term) in rule.head_args.iter().enumerate() {
        let (ir_term, is_symbol) = translate_term(term, &mut vars, symbols);
        let expected = predicates.get(head_id).expect("resolved above").arg_types[i];
        check_term_type(&rule.head_predicate, i, expected, is_symbol)?;
        head_args.push(ir_term);
    }

    let mut body = Vec::with_capacity(rule.body.len());
    for literal in &rule.body {
        body.push(build_literal(literal, predicates, &mut vars, symbols, &mut positively_bound)?);
    }
    if positively_bound.len() < vars.len() {
        positively_bound.resize(vars.len(), false);
    }

    // Stable-partition positive literals before negative/equality/comparison/
    // builtin ones. The evaluator processes body literals left to right
    // after the driver; without this, a variable whose only positive
    // occurrence comes textually after a negative/comparison use of it would
    // still pass the safety check below (which only requires a positive
    // occurrence *somewhere* in the rule) while being unbound at the point
    // that use is actually evaluated.
    let (positives, others): (Vec<_>, Vec<_>) =
        body.into_iter().partition(|lit| matches!(lit, IrLiteral::Positive { .. }));
    let body: Vec<IrLiteral> = positives.into_iter().chain(others).collect();

    // Safety: every variable occurring anywhere in the rule must have at
    // least one positive occurrence (spec.md §8 invariant 1).
    for (idx, name) in vars.names.iter().enumerate() {
        if let Some(name) = name {
            if !positively_bound[idx] {
                return Err(IrError::UnsafeRule {
                    head: rule.head_predicate.clone(),
                    variable: name.clone(),
                });
            }
        }
    }
    // Wildcards are always fresh and never reused outside their own
    // literal, so a wildcard appearing only in the head or in a negative
    // literal is also unsafe; render it with a synthetic name for the
    // diagnostic.
    for (idx, name) in vars.names.iter().enumerate() {
        if name.is_none() && !positively_bound[idx] {
            return Err(IrError::UnsafeRule {
                head: rule.head_predicate.clone(),
                variable: "_".to_string(),
            });
        }
    }

    Ok(IrRule { head_predicate: head_id, head_args, body, num_vars: vars.len() })
}

fn build_literal(
    literal: &Literal,
    predicates: &mut PredicateTable,
    vars: &mut VarTable,
    symbols: &mut SymbolTable,
    positively_bound: &mut Vec<bool>,
) -> Result<IrLiteral, IrError> {
    let mark = |positively_bound: &mut Vec<bool>, idx: usize| {
        if positively_bound.len() <= idx {
            positively_bound.resize(idx + 1, false);
        }
        positively_bound[idx] = true;
    };

    match literal {
        Literal::Positive(atom) => {
            let id = register_predicate(predicates, &atom.predicate, atom.args.len())?;
            let mut args = Vec::with_capacity(atom.args.len());
            for (i, term) in atom.args.iter().enumerate() {
                let (ir_term, is_symbol) = translate_term(term, vars, symbols);
                let expected = predicates.get(id).expect("resolved above").arg_types[i];
                check_term_type(&atom.predicate, i, expected, is_symbol)?;
                if let IrTerm::Variable(idx) = ir_term {
                    mark(positively_bound, idx);
                }
                args.push(ir_term);
            }
            Ok(IrLiteral::Positive { predicate: id, args })
        }
        Literal::Negative(atom) => {
            let id = register_predicate(predicates, &atom.predicate, atom.args.len())?;
            let mut args = Vec::with_capacity(atom.args.len());
            for (i, term) in atom.args.iter().enumerate() {
                let (ir_term, is_symbol) = translate_term(term, vars, symbols);
                let expected = predicates.get(id).expect("resolved above").arg_types[i];
                check_term_type(&atom.predicate, i, expected, is_symbol)?;
                args.push(ir_term);
            }
            Ok(IrLiteral::Negative { predicate: id, args })
        }
        Literal::Equality { lhs, rhs } => {
            let (lhs, _) = translate_term(lhs, vars, symbols);
            let (rhs, _) = translate_term(rhs, vars, symbols);
            Ok(IrLiteral::Equality { lhs, rhs })
        }
        Literal::Comparison { op, lhs, rhs } => {
            let (lhs, _) = translate_term(lhs, vars, symbols);
            let (rhs, _) = translate_term(rhs, vars, symbols);
            Ok(IrLiteral::Comparison { op: *op, lhs, rhs })
        }
        Literal::Builtin { kind, lhs, rhs } => {
            let (lhs, _) = translate_term(lhs, vars, symbols);
            let (rhs, _) = translate_term(rhs, vars, symbols);
            Ok(IrLiteral::Builtin { kind: *kind, lhs, rhs })
        }
    }
}

/// Raises each predicate's stratum until the constraints of spec.md §4.3
/// step 5 are satisfied, or reports a negation cycle if that never
/// converges within `num_predicates` passes. `max_iterations` is a separate,
/// configurable resource ceiling (spec.md §9): it never lowers the
/// correctness bound below `num_predicates`, since a legitimately
/// stratifiable program can need up to one pass per predicate.
fn stratify(rules: &[IrRule], predicates: &mut PredicateTable, max_iterations: usize) -> Result<u32, IrError> {
    let num_predicates = predicates.len();
    for def in predicates.iter_mut() {
        def.stratum = 0;
    }

    let mut iterations = 0usize;
    loop {
        let mut changed = false;
        for rule in rules {
            for literal in &rule.body {
                match literal {
                    IrLiteral::Positive { predicate, .. } => {
                        let body_stratum = predicates.get(*predicate).expect("valid id").stratum;
                        let head = predicates.get_mut(rule.head_predicate).expect("valid id");
                        if head.stratum < body_stratum {
                            head.stratum = body_stratum;
                            changed = true;
                        }
                    }
                    IrLiteral::Negative { predicate, .. } => {
                        let body_stratum = predicates.get(*predicate).expect("valid id").stratum;
                        let head = predicates.get_mut(rule.head_predicate).expect("valid id");
                        if head.stratum <= body_stratum {
                            head.stratum = body_stratum + 1;
                            changed = true;
                        }
                    }
                    IrLiteral::Equality { .. } | IrLiteral::Comparison { .. } | IrLiteral::Builtin { .. } => {}
                }
            }
        }
        if !changed {
            break;
        }
        iterations += 1;
        if iterations > max_iterations {
            return Err(IrError::OverLimit {
                what: "stratification iterations",
                count: iterations,
                max: max_iterations,
            });
        }
        if iterations > num_predicates + 1 {
            // Identify one predicate stuck in the cycle for the diagnostic.
            let predicate = rules
                .iter()
                .find(|r| r.body.iter().any(|l| matches!(l, IrLiteral::Negative { predicate, .. } if *predicate == r.head_predicate)))
                .map_or_else(|| "<unknown>".to_string(), |r| predicates.get(r.head_predicate).expect("valid id").name.clone());
            return Err(IrError::NegationCycle { predicate });
        }
    }

    Ok(predicates.iter().map(|(_, d)| d.stratum).max().unwrap_or(0))
}

/// Resolve a fact-kind check used by the engine when facts are inserted via
/// the public API rather than parsed from source (spec.md §4.7
/// `insert_fact`).
#[must_use]
pub fn check_fact_shape(def: &PredicateDef, values: &[Value]) -> bool {
    if values.len() != def.arity {
        return false;
    }
    values.iter().enumerate().all(|(i, v)| match def.arg_types[i] {
        DeclaredType::Unknown => true,
        DeclaredType::Symbol => v.is_symbol(),
        DeclaredType::Int | DeclaredType::Range => v.is_int(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn build_src(src: &str) -> Result<(IrProgram, Vec<ResolvedFact>), IrError> {
        let program = Parser::new(src).unwrap().parse_program().unwrap();
        let mut symbols = SymbolTable::new();
        build(&program, PredicateTable::new(), &mut symbols)
    }

    #[test]
    fn transitive_closure_stratifies_at_zero() {
        let (ir, facts) = build_src(
            r#"
            .pred edge(a: symbol, b: symbol).
            .pred path(a: symbol, b: symbol).
            edge("x","y"). edge("y","z").
            path(A,B) :- edge(A,B).
            path(A,C) :- edge(A,B), path(B,C).
            "#,
        )
        .unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(ir.max_stratum, 0);
        let path_id = ir.predicates.find("path").unwrap();
        assert!(ir.predicates.get(path_id).unwrap().is_idb);
    }

    #[test]
    fn stratified_negation_raises_stratum() {
        let (ir, _) = build_src(
            r#"
            .pred node(n: symbol).
            node("a").
            unmarked(N) :- node(N), not marked(N).
            "#,
        )
        .unwrap();
        let unmarked = ir.predicates.find("unmarked").unwrap();
        let marked = ir.predicates.find("marked").unwrap();
        assert!(ir.predicates.get(unmarked).unwrap().stratum > ir.predicates.get(marked).unwrap().stratum);
    }

    #[test]
    fn negation_cycle_is_rejected() {
        let err = build_src(
            r"
            .pred base(x: symbol). .pred p(x: symbol). .pred q(x: symbol).
            p(X) :- base(X), not q(X).
            q(X) :- base(X), not p(X).
            ",
        )
        .unwrap_err();
        assert!(matches!(err, IrError::NegationCycle { .. }));
    }

    #[test]
    fn unsafe_rule_is_rejected() {
        let err = build_src(
            r"
            .pred p(x: symbol).
            p(X) :- not p(X).
            ",
        )
        .unwrap_err();
        assert!(matches!(err, IrError::UnsafeRule { .. }));
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let err = build_src(
            r#"
            .pred edge(a: symbol, b: symbol).
            edge("x","y","z").
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, IrError::ArityMismatch { .. }));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let err = build_src(
            r#"
            .pred edge(a: symbol, b: int).
            edge("x","y").
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, IrError::TypeMismatch { .. }));
    }
}
