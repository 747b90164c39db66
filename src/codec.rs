//! # `.dlc` Binary Codec
//!
//! Serializes a parsed [`ast::Program`] to the compiled on-disk format and
//! back (spec.md §4.4). The format is deliberately hand-rolled rather than
//! built on `serde`/`bincode` — the wire layout is a fixed external
//! contract, not a Rust type's derived shape, so encoding/decoding walks it
//! field by field the way the reference codec does.
//!
//! Grounded in the teacher's stack: the reference codec has no compression
//! stage, so deflate framing is enriched in from the other pack repos that
//! reach for `flate2` around a length-prefixed binary payload.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::ast::{Atom, ComparisonOp, Declaration, DeclaredType, Fact, FactArg, Literal, Program, Rule, Term};
use crate::error::CodecError;

/// On-disk magic bytes identifying a rulr compiled program.
pub const MAGIC: [u8; 4] = *b"DLC1";

const FLAG_CLEAR_DERIVED: u8 = 1;

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Writer { buf: Vec::new() }
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// A length-prefixed string, truncated at 65535 bytes (spec.md §4.4).
    fn str(&mut self, s: &str) {
        let bytes = s.as_bytes();
        let len = bytes.len().min(u16::MAX as usize);
        self.u16(len as u16);
        self.buf.extend_from_slice(&bytes[..len]);
    }

    fn term(&mut self, term: &Term) {
        match term {
            Term::Variable(name) => {
                self.u8(0);
                self.str(name);
            }
            Term::StringLiteral(s) => {
                self.u8(1);
                self.str(s);
            }
            Term::IntLiteral(v) => {
                self.u8(2);
                self.i64(*v);
            }
            Term::Wildcard => self.u8(3),
        }
    }

    fn literal(&mut self, literal: &Literal) -> Result<(), CodecError> {
        match literal {
            Literal::Positive(atom) => {
                self.u8(0);
                self.atom(atom)?;
            }
            Literal::Negative(atom) => {
                self.u8(1);
                self.atom(atom)?;
            }
            Literal::Equality { lhs, rhs } => {
                self.u8(2);
                self.term(lhs);
                self.term(rhs);
            }
            Literal::Comparison { op, lhs, rhs } => {
                self.u8(3);
                self.u8(comparison_op_code(*op));
                self.term(lhs);
                self.term(rhs);
            }
            Literal::Builtin { kind: _, lhs, rhs } => {
                self.u8(4);
                self.u8(0); // only `match` exists today
                self.term(lhs);
                self.term(rhs);
            }
        }
        Ok(())
    }

    fn atom(&mut self, atom: &Atom) -> Result<(), CodecError> {
        self.str(&atom.predicate);
        self.u8(bounded_u8(atom.args.len(), "atom arity")?);
        for t in &atom.args {
            self.term(t);
        }
        Ok(())
    }
}

/// Casts `len` to `u8`, or reports [`CodecError::LengthOutOfRange`] if it
/// overflows the wire format's one-byte field (spec.md §6 "maximum arity
/// per predicate = 255").
fn bounded_u8(len: usize, what: &str) -> Result<u8, CodecError> {
    u8::try_from(len).map_err(|_| CodecError::LengthOutOfRange(format!("{what} of {len} exceeds 255")))
}

/// Casts `len` to `u16`, or reports [`CodecError::LengthOutOfRange`] if it
/// overflows the wire format's two-byte count field (spec.md §6 "maximum
/// declarations/facts/rules = 65 535 each; maximum body length per rule =
/// 65 535").
fn bounded_u16(len: usize, what: &str) -> Result<u16, CodecError> {
    u16::try_from(len).map_err(|_| CodecError::LengthOutOfRange(format!("{what} of {len} exceeds 65535")))
}

fn comparison_op_code(op: ComparisonOp) -> u8 {
    match op {
        ComparisonOp::Eq => 0,
        ComparisonOp::Ne => 1,
        ComparisonOp::Lt => 2,
        ComparisonOp::Le => 3,
        ComparisonOp::Gt => 4,
        ComparisonOp::Ge => 5,
    }
}

fn comparison_op_from_code(code: u8) -> Result<ComparisonOp, CodecError> {
    match code {
        0 => Ok(ComparisonOp::Eq),
        1 => Ok(ComparisonOp::Ne),
        2 => Ok(ComparisonOp::Lt),
        3 => Ok(ComparisonOp::Le),
        4 => Ok(ComparisonOp::Gt),
        5 => Ok(ComparisonOp::Ge),
        other => Err(CodecError::Decompression(format!("unknown comparison op code {other}"))),
    }
}

fn type_name(ty: DeclaredType) -> &'static str {
    match ty {
        DeclaredType::Unknown => "unknown",
        DeclaredType::Symbol => "symbol",
        DeclaredType::Int => "int",
        DeclaredType::Range => "range",
    }
}

/// Encode a parsed program to the uncompressed wire layout, then deflate and
/// frame it with the magic header (spec.md §4.4).
///
/// # Errors
/// Returns [`CodecError::Compression`] if the deflate stage fails.
pub fn encode(program: &Program) -> Result<Vec<u8>, CodecError> {
    let mut w = Writer::new();
    w.u8(if program.clear_derived { FLAG_CLEAR_DERIVED } else { 0 });

    w.u16(bounded_u16(program.declarations.len(), "declaration count")?);
    for decl in &program.declarations {
        w.str(&decl.predicate);
        w.u8(bounded_u8(decl.args.len(), "declaration arity")?);
        for (name, ty) in &decl.args {
            w.str(name);
            w.str(type_name(*ty));
        }
    }

    w.u16(bounded_u16(program.facts.len(), "fact count")?);
    for fact in &program.facts {
        w.str(&fact.predicate);
        w.u8(bounded_u8(fact.args.len(), "fact arity")?);
        for arg in &fact.args {
            match arg {
                FactArg::Str(s) => {
                    w.u8(0);
                    w.str(s);
                }
                FactArg::Int(v) => {
                    w.u8(1);
                    w.i64(*v);
                }
            }
        }
    }

    w.u16(bounded_u16(program.rules.len(), "rule count")?);
    for rule in &program.rules {
        w.str(&rule.head_predicate);
        w.u8(bounded_u8(rule.head_args.len(), "rule head arity")?);
        for t in &rule.head_args {
            w.term(t);
        }
        w.u16(bounded_u16(rule.body.len(), "rule body length")?);
        for lit in &rule.body {
            w.literal(lit)?;
        }
    }

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&w.buf)
        .map_err(|e| CodecError::Compression(e.to_string()))?;
    let compressed = encoder.finish().map_err(|e| CodecError::Compression(e.to_string()))?;

    let uncompressed_len = u32::try_from(w.buf.len())
        .map_err(|_| CodecError::LengthOutOfRange(format!("payload of {} bytes", w.buf.len())))?;

    let mut out = Vec::with_capacity(8 + compressed.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&uncompressed_len.to_le_bytes());
    out.extend_from_slice(&compressed);
    Ok(out)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.buf.len() - self.pos < n {
            return Err(CodecError::Truncated { needed: n, had: self.buf.len() - self.pos });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn i64(&mut self) -> Result<i64, CodecError> {
        let b = self.take(8)?;
        Ok(i64::from_le_bytes(b.try_into().expect("exactly 8 bytes")))
    }

    fn str(&mut self) -> Result<String, CodecError> {
        let len = self.u16()? as usize;
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn term(&mut self) -> Result<Term, CodecError> {
        Ok(match self.u8()? {
            0 => Term::Variable(self.str()?),
            1 => Term::StringLiteral(self.str()?),
            2 => Term::IntLiteral(self.i64()?),
            3 => Term::Wildcard,
            other => return Err(CodecError::Decompression(format!("unknown term kind {other}"))),
        })
    }

    fn atom(&mut self) -> Result<Atom, CodecError> {
        let predicate = self.str()?;
        let arity = self.u8()? as usize;
        let mut args = Vec::with_capacity(arity);
        for _ in 0..arity {
            args.push(self.term()?);
        }
        Ok(Atom { predicate, args })
    }

    fn literal(&mut self) -> Result<Literal, CodecError> {
        Ok(match self.u8()? {
            0 => Literal::Positive(self.atom()?),
            1 => Literal::Negative(self.atom()?),
            2 => {
                let lhs = self.term()?;
                let rhs = self.term()?;
                Literal::Equality { lhs, rhs }
            }
            3 => {
                let op = comparison_op_from_code(self.u8()?)?;
                let lhs = self.term()?;
                let rhs = self.term()?;
                Literal::Comparison { op, lhs, rhs }
            }
            4 => {
                let _kind = self.u8()?;
                let lhs = self.term()?;
                let rhs = self.term()?;
                Literal::Builtin { kind: crate::ast::BuiltinKind::Match, lhs, rhs }
            }
            other => return Err(CodecError::Decompression(format!("unknown literal kind {other}"))),
        })
    }
}

fn declared_type_from_name(name: &str) -> DeclaredType {
    DeclaredType::from_name(name)
}

/// Decode a `.dlc` byte stream back into a [`Program`] (spec.md §4.4).
///
/// Variable *names* round-trip exactly since the codec operates on the
/// parsed AST, before the IR builder assigns numeric variable indices.
///
/// # Errors
/// Returns [`CodecError::BadMagic`] if the header doesn't match, or
/// [`CodecError::Truncated`]/[`CodecError::Decompression`] on a malformed
/// or corrupt body.
pub fn decode(bytes: &[u8]) -> Result<Program, CodecError> {
    if bytes.len() < 8 {
        return Err(CodecError::Truncated { needed: 8, had: bytes.len() });
    }
    let magic: [u8; 4] = bytes[0..4].try_into().expect("checked length");
    if magic != MAGIC {
        return Err(CodecError::BadMagic(magic));
    }
    let uncompressed_len = u32::from_le_bytes(bytes[4..8].try_into().expect("checked length")) as usize;

    let mut decoder = DeflateDecoder::new(&bytes[8..]);
    let mut payload = Vec::with_capacity(uncompressed_len);
    decoder
        .read_to_end(&mut payload)
        .map_err(|e| CodecError::Decompression(e.to_string()))?;

    let mut r = Reader::new(&payload);
    let flags = r.u8()?;
    let mut program = Program::new();
    program.clear_derived = flags & FLAG_CLEAR_DERIVED != 0;

    let num_decls = r.u16()?;
    for _ in 0..num_decls {
        let predicate = r.str()?;
        let arity = r.u8()? as usize;
        let mut args = Vec::with_capacity(arity);
        for _ in 0..arity {
            let name = r.str()?;
            let ty = declared_type_from_name(&r.str()?);
            args.push((name, ty));
        }
        program.declarations.push(Declaration { predicate, args });
    }

    let num_facts = r.u16()?;
    for _ in 0..num_facts {
        let predicate = r.str()?;
        let arity = r.u8()? as usize;
        let mut args = Vec::with_capacity(arity);
        for _ in 0..arity {
            args.push(match r.u8()? {
                0 => FactArg::Str(r.str()?),
                1 => FactArg::Int(r.i64()?),
                other => return Err(CodecError::Decompression(format!("unknown fact arg kind {other}"))),
            });
        }
        program.facts.push(Fact { predicate, args });
    }

    let num_rules = r.u16()?;
    for _ in 0..num_rules {
        let head_predicate = r.str()?;
        let head_arity = r.u8()? as usize;
        let mut head_args = Vec::with_capacity(head_arity);
        for _ in 0..head_arity {
            head_args.push(r.term()?);
        }
        let body_len = r.u16()?;
        let mut body = Vec::with_capacity(body_len as usize);
        for _ in 0..body_len {
            body.push(r.literal()?);
        }
        program.rules.push(Rule { head_predicate, head_args, body });
    }

    Ok(program)
}
