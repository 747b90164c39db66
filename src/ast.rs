//! # Abstract Syntax Tree
//!
//! AST types produced by the parser (spec.md §3, §4.2). Mirrors the
//! teacher's `ast::mod` separation of Term/Atom/Rule/Program, generalized
//! to rulr's smaller term/literal vocabulary (no aggregates, arithmetic, or
//! vector literals — those are out of scope here).

/// A term appearing in a fact, rule head, or rule body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// A variable, with its source name. The IR builder assigns the
    /// per-rule index; the parser only records the name.
    Variable(String),
    /// A double-quoted string literal.
    StringLiteral(String),
    /// An integer literal.
    IntLiteral(i64),
    /// `_`, sugar for a fresh anonymous variable (spec.md §3).
    Wildcard,
}

/// Comparison operators (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Built-in predicate kinds (spec.md §3; currently only `match`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    Match,
}

/// An atom: a predicate name applied to argument terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    pub predicate: String,
    pub args: Vec<Term>,
}

/// A body literal (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Positive(Atom),
    Negative(Atom),
    Equality { lhs: Term, rhs: Term },
    Comparison { op: ComparisonOp, lhs: Term, rhs: Term },
    Builtin { kind: BuiltinKind, lhs: Term, rhs: Term },
}

/// A rule: `head(...) :- body.`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub head_predicate: String,
    pub head_args: Vec<Term>,
    pub body: Vec<Literal>,
}

/// A ground fact, parsed directly from a head with only literal arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactArg {
    Str(String),
    Int(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact {
    pub predicate: String,
    pub args: Vec<FactArg>,
}

/// A declared argument type name (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredType {
    Unknown,
    Symbol,
    Int,
    Range,
}

impl DeclaredType {
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "symbol" => DeclaredType::Symbol,
            "int" => DeclaredType::Int,
            "range" => DeclaredType::Range,
            _ => DeclaredType::Unknown,
        }
    }
}

/// A `.pred name(arg: type, ...).` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub predicate: String,
    pub args: Vec<(String, DeclaredType)>,
}

/// The full parsed program (spec.md §3).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub declarations: Vec<Declaration>,
    pub facts: Vec<Fact>,
    pub rules: Vec<Rule>,
    pub clear_derived: bool,
}

impl Program {
    #[must_use]
    pub fn new() -> Self {
        Program::default()
    }
}
