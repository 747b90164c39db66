//! # Engine Facade
//!
//! The public entry point (spec.md §4.7): owns the IR program, one
//! [`PredicateRuntime`] per predicate, and the symbol table, and exposes
//! register/insert/load/evaluate/view operations to callers.
//!
//! Grounded in the teacher's `DatalogEngine` facade (construction, rule
//! loading, and query surface), with the teacher's differential-dataflow
//! worker/probe plumbing dropped — rulr evaluates synchronously to a
//! fixpoint on the caller's thread (spec.md §5).

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::ast::DeclaredType;
use crate::codec;
use crate::error::EngineError;
use crate::evaluator;
use crate::ir::{IrProgram, PredicateDef};
use crate::ir_builder::{self, build_with_limit};
use crate::parser::Parser;
use crate::runtime::PredicateRuntime;
use crate::symbols::SymbolTable;
use crate::value::{Tuple, Value};

pub mod loader;

/// A borrowed snapshot of one predicate's `base` relation (spec.md §4.7).
/// Invalidated by any later mutation of the engine (spec.md §5).
#[derive(Debug, Clone, Copy)]
pub struct RelationView<'a> {
    pub predicate: usize,
    pub tuples: &'a [Tuple],
}

impl RelationView<'_> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }
}

/// The embeddable Datalog engine (spec.md §2-§4.7).
pub struct Engine {
    program: IrProgram,
    runtimes: Vec<PredicateRuntime>,
    symbols: SymbolTable,
    max_stratification_iterations: usize,
    last_clear_derived: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::create()
    }
}

impl Engine {
    /// An engine with an empty IR program and a fresh symbol table
    /// (spec.md §4.7 `create`).
    #[must_use]
    pub fn create() -> Self {
        Engine {
            program: IrProgram::new(),
            runtimes: Vec::new(),
            symbols: SymbolTable::new(),
            max_stratification_iterations: crate::config::EngineConfig::default().max_stratification_iterations,
            last_clear_derived: false,
        }
    }

    /// Overrides ambient limits from configuration (deflate level is used
    /// only by [`Engine::compile_to_bytes`]; `max_stratification_iterations`
    /// bounds every later [`Engine::load_rules_from_string`]).
    #[must_use]
    pub fn with_config(mut self, config: &crate::config::EngineConfig) -> Self {
        self.max_stratification_iterations = config.max_stratification_iterations;
        self
    }

    /// Replaces the engine's symbol table wholesale, e.g. to share an
    /// externally-owned string pool (spec.md §4.7 `set_symbol_table`,
    /// simplified per spec.md §9 to direct attachment rather than
    /// injected callbacks).
    pub fn set_symbol_table(&mut self, symbols: SymbolTable) {
        self.symbols = symbols;
    }

    fn ensure_runtime_capacity(&mut self) {
        while self.runtimes.len() < self.program.predicates.len() {
            let id = self.runtimes.len();
            let def = self.program.predicates.get(id).expect("within bounds");
            self.runtimes.push(PredicateRuntime::new(def.arity, def.stratum));
        }
    }

    /// Registers (or looks up) a predicate by name, idempotent on name;
    /// fails on an arity or type mismatch against a prior registration
    /// (spec.md §4.7 `register_predicate`).
    ///
    /// # Errors
    /// Returns [`EngineError::Ir`] wrapping an [`crate::error::IrError`] on
    /// arity/type conflicts.
    pub fn register_predicate(
        &mut self,
        name: &str,
        arity: usize,
        types: Option<Vec<DeclaredType>>,
    ) -> Result<usize, EngineError> {
        let id = if let Some(id) = self.program.predicates.find(name) {
            let def = self.program.predicates.get(id).expect("found");
            if def.arity != arity {
                return Err(crate::error::IrError::ArityMismatch {
                    name: name.to_string(),
                    old_arity: def.arity,
                    new_arity: arity,
                }
                .into());
            }
            id
        } else {
            let arg_types = types.unwrap_or_else(|| vec![DeclaredType::Unknown; arity]);
            self.program.predicates.push(PredicateDef {
                name: name.to_string(),
                arity,
                declared: true,
                arg_types,
                stratum: 0,
                is_idb: false,
            })
        };
        self.ensure_runtime_capacity();
        Ok(id)
    }

    /// Looks up a predicate id by name (spec.md §4.7 `get_predicate_id`).
    #[must_use]
    pub fn get_predicate_id(&self, name: &str) -> Option<usize> {
        self.program.predicates.find(name)
    }

    /// Inserts a fact directly into a predicate's `base`, bypassing the
    /// parser (spec.md §4.7 `insert_fact`). Returns whether the fact was
    /// newly inserted.
    ///
    /// # Errors
    /// Returns [`EngineError::UnknownPredicate`], [`EngineError::FactArityMismatch`],
    /// or [`EngineError::FactTypeMismatch`] on an invalid call.
    #[instrument(skip(self, values))]
    pub fn insert_fact(&mut self, pred_id: usize, values: &[Value]) -> Result<bool, EngineError> {
        let def = self.program.predicates.get(pred_id).ok_or(EngineError::UnknownPredicate(pred_id))?;
        if values.len() != def.arity {
            return Err(EngineError::FactArityMismatch { pred_id, given: values.len(), expected: def.arity });
        }
        if !ir_builder::check_fact_shape(def, values) {
            let index = values
                .iter()
                .enumerate()
                .find(|(i, v)| !matches_arg_type(def.arg_types[*i], **v))
                .map_or(0, |(i, _)| i);
            return Err(EngineError::FactTypeMismatch { pred_id, index });
        }
        let inserted = self.runtimes[pred_id].insert_base_unique(Tuple::new(values.to_vec()));
        debug!(pred_id, inserted, "insert_fact");
        Ok(inserted)
    }

    /// Parses `source`, builds IR, replaces the rule list, recomputes
    /// strata, and inserts every fact the source declares — preserving
    /// base facts from earlier loads that remain arity/type-compatible
    /// (spec.md §4.7 `load_rules_from_string`). On any error the engine's
    /// prior rule set and facts are left untouched (spec.md §7
    /// "Propagation").
    ///
    /// # Errors
    /// Returns [`EngineError::Parse`] or [`EngineError::Ir`] on a malformed
    /// program.
    #[instrument(skip(self, source))]
    pub fn load_rules_from_string(&mut self, source: &str) -> Result<(), EngineError> {
        let ast_program = Parser::new(source)?.parse_program()?;
        self.load_ast_program(ast_program)
    }

    fn load_ast_program(&mut self, ast_program: crate::ast::Program) -> Result<(), EngineError> {
        let clear_derived = ast_program.clear_derived;
        let (new_program, facts) = build_with_limit(
            &ast_program,
            self.program.predicates.clone(),
            &mut self.symbols,
            self.max_stratification_iterations,
        )?;

        let mut new_runtimes: Vec<PredicateRuntime> = new_program
            .predicates
            .iter()
            .map(|(id, d)| {
                self.runtimes
                    .get(id)
                    .filter(|rt| rt.arity == d.arity)
                    .cloned()
                    .unwrap_or_else(|| PredicateRuntime::new(d.arity, d.stratum))
            })
            .collect();
        for (id, def) in new_program.predicates.iter() {
            new_runtimes[id].stratum = def.stratum;
        }
        for fact in facts {
            new_runtimes[fact.predicate].insert_base_unique(Tuple::new(fact.values));
        }

        info!(
            rules = new_program.rules.len(),
            predicates = new_program.predicates.len(),
            max_stratum = new_program.max_stratum,
            "loaded rule program"
        );
        self.program = new_program;
        self.runtimes = new_runtimes;
        self.last_clear_derived = clear_derived;
        Ok(())
    }

    /// Convenience wrapper over [`Engine::load_rules_from_string`] that
    /// reads `path`. Tries `<name>.dlc` (compiled) first per spec.md §6
    /// only when `path` ends in `.dlc`; otherwise reads source text.
    ///
    /// # Errors
    /// Returns [`EngineError::Codec`] if `path` is a `.dlc` file and fails
    /// to decode, or propagates [`Engine::load_rules_from_string`]'s errors.
    pub fn load_rules_from_file(&mut self, path: &Path) -> Result<(), EngineError> {
        if path.extension().and_then(|e| e.to_str()) == Some("dlc") {
            let bytes = std::fs::read(path).map_err(crate::error::CodecError::from)?;
            let program = codec::decode(&bytes)?;
            return self.load_ast_program(program);
        }
        let source = std::fs::read_to_string(path).map_err(crate::error::CodecError::from)?;
        self.load_rules_from_string(&source)
    }

    /// Loads a rule set by bare name (spec.md §6 "File loading strategy"):
    /// tries `<name>.dlc` first, and on any failure — missing file,
    /// corrupt/undecodable payload, or a malformed compiled program — falls
    /// back to `<name>.dl` source. See [`loader::load_rules_file`].
    ///
    /// # Errors
    /// Returns the `.dl` fallback's error if both attempts fail.
    pub fn load_rules_by_name(&mut self, name: &str) -> Result<(), EngineError> {
        loader::load_rules_file(self, name)
    }

    /// Compiles `source` to the `.dlc` wire format without mutating the
    /// engine (used by the CLI's `--compile` path).
    ///
    /// # Errors
    /// Returns [`EngineError::Parse`] or [`EngineError::Codec`].
    pub fn compile_to_bytes(source: &str) -> Result<Vec<u8>, EngineError> {
        let program = Parser::new(source)?.parse_program()?;
        Ok(codec::encode(&program)?)
    }

    /// Runs the semi-naive stratified fixpoint (spec.md §4.6). If the last
    /// loaded program set `clear_derived`, every IDB predicate's `base` is
    /// cleared first (spec.md §9 "Open question — fact retention").
    #[instrument(skip(self))]
    pub fn evaluate(&mut self) {
        self.ensure_runtime_capacity();
        if self.last_clear_derived {
            self.clear_derived();
        }
        evaluator::evaluate(&self.program, &mut self.runtimes);
        info!("evaluation complete");
    }

    /// Clears the `base` of every IDB predicate, leaving EDB facts intact
    /// (spec.md §9). Exposed so callers can honor a `.clear_derived`
    /// directive before re-evaluating.
    pub fn clear_derived(&mut self) {
        for (id, def) in self.program.predicates.iter() {
            if def.is_idb {
                self.runtimes[id].base.clear();
                self.runtimes[id].delta.clear();
                self.runtimes[id].next.clear();
                if let Some(index) = &mut self.runtimes[id].index {
                    index.clear();
                }
            }
        }
    }

    /// True if the most recently loaded program requested `.clear_derived()`.
    /// `evaluate()` already applies this automatically; exposed for callers
    /// that want to inspect it.
    #[must_use]
    pub fn wants_clear_derived(&self) -> bool {
        self.last_clear_derived
    }

    /// A borrowed view over a predicate's `base` (spec.md §4.7
    /// `get_relation_view`). Returns `None` for an unknown predicate id
    /// (the facade's "sentinel" behavior, spec.md §4.7).
    #[must_use]
    pub fn get_relation_view(&self, pred_id: usize) -> Option<RelationView<'_>> {
        self.runtimes.get(pred_id).map(|rt| RelationView { predicate: pred_id, tuples: rt.base.as_slice() })
    }

    #[must_use]
    pub fn predicate_name(&self, pred_id: usize) -> Option<&str> {
        self.program.predicates.get(pred_id).map(|d| d.name.as_str())
    }

    #[must_use]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }
}

fn matches_arg_type(ty: DeclaredType, value: Value) -> bool {
    match ty {
        DeclaredType::Unknown => true,
        DeclaredType::Symbol => value.is_symbol(),
        DeclaredType::Int | DeclaredType::Range => value.is_int(),
    }
}
