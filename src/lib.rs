//! rulr: an embeddable Datalog engine.
//!
//! A lexer/parser front end turns `.dl` source into an AST; the IR builder
//! resolves names, interns symbols, type-checks, enforces range-restriction
//! safety, and stratifies negation; the evaluator runs semi-naive fixpoint
//! iteration over the stratified rule set. A binary `.dlc` format lets
//! compiled programs skip the front end on reload. See [`engine::Engine`]
//! for the public surface.

pub mod ast;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod ir;
pub mod ir_builder;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod symbols;
pub mod value;

pub use engine::{Engine, RelationView};
pub use error::EngineError;
pub use value::{Tuple, Value};
