//! # Parser
//!
//! Recursive-descent, single-token-lookahead parser building an
//! [`ast::Program`] from a token stream (spec.md §4.2). Errors are
//! single-shot: the caller gets the first error the parser hit, with any
//! later ones suppressed by simply stopping.
//!
//! Grounded in the teacher's `parser::parse_rule`/`parse_atom_args`/
//! `parse_single_term` term classification (leading-case decides variable
//! vs. predicate name, `_` is a wildcard), adapted from string slicing to
//! token-stream parsing so multi-line rules and real lookahead work.

use crate::ast::{
    Atom, BuiltinKind, ComparisonOp, Declaration, DeclaredType, Fact, FactArg, Literal, Program,
    Rule, Term,
};
use crate::error::ParseError;
use crate::lexer::{Lexer, Token, TokenKind};

/// Maximum argument count the parser will accept for a single predicate
/// application (spec.md §6: max arity per predicate is 255).
pub const MAX_ARGS: usize = 255;

#[derive(Debug)]
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// # Errors
    /// Propagates a lexical error encountered while priming the first token.
    pub fn new(src: &'a str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(src);
        let current = lexer.next_token()?;
        Ok(Parser { lexer, current })
    }

    fn advance(&mut self) -> Result<Token, ParseError> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, ParseError> {
        if &self.current.kind == kind {
            self.advance()
        } else {
            Err(self.unexpected(&format!("{kind:?}")))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            line: self.current.line,
            column: self.current.column,
            expected: expected.to_string(),
            got: format!("{:?}", self.current.kind),
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.current.kind.clone() {
            TokenKind::Ident(name) => {
                self.advance()?;
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// Parse a whole program (spec.md §4.2 grammar).
    ///
    /// # Errors
    /// Returns the first [`ParseError`] encountered.
    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut program = Program::new();
        while self.current.kind != TokenKind::Eof {
            match &self.current.kind {
                TokenKind::PredDecl => program.declarations.push(self.parse_decl()?),
                TokenKind::ClearDerivedDecl => {
                    self.parse_clear_directive()?;
                    program.clear_derived = true;
                }
                _ => self.parse_fact_or_rule(&mut program)?,
            }
        }
        Ok(program)
    }

    fn parse_decl(&mut self) -> Result<Declaration, ParseError> {
        self.advance()?; // .pred
        let predicate = self.expect_ident()?;
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if self.current.kind != TokenKind::RParen {
            loop {
                let name = self.expect_ident()?;
                self.expect(&TokenKind::Colon)?;
                let type_name = self.expect_ident()?;
                if args.len() >= MAX_ARGS {
                    return Err(ParseError::TooManyArguments {
                        line: self.current.line,
                        column: self.current.column,
                        max: MAX_ARGS,
                    });
                }
                args.push((name, DeclaredType::from_name(&type_name)));
                if self.current.kind == TokenKind::Comma {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::Dot)?;
        Ok(Declaration { predicate, args })
    }

    fn parse_clear_directive(&mut self) -> Result<(), ParseError> {
        self.advance()?; // .clear_derived
        self.expect(&TokenKind::LParen)?;
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::Dot)?;
        Ok(())
    }

    fn parse_fact_or_rule(&mut self, program: &mut Program) -> Result<(), ParseError> {
        let line = self.current.line;
        let column = self.current.column;
        let predicate = match self.current.kind.clone() {
            TokenKind::Ident(name) => {
                self.advance()?;
                name
            }
            _ => return Err(ParseError::NonPredicateHead { line, column }),
        };
        self.expect(&TokenKind::LParen)?;
        let args = self.parse_term_list()?;
        self.expect(&TokenKind::RParen)?;

        match self.current.kind {
            TokenKind::Dot => {
                self.advance()?;
                if args.iter().all(|t| matches!(t, Term::StringLiteral(_) | Term::IntLiteral(_))) {
                    let fact_args = args
                        .into_iter()
                        .map(|t| match t {
                            Term::StringLiteral(s) => FactArg::Str(s),
                            Term::IntLiteral(i) => FactArg::Int(i),
                            _ => unreachable!(),
                        })
                        .collect();
                    program.facts.push(Fact { predicate, args: fact_args });
                } else {
                    // A head with variables/wildcards and no body is not valid:
                    // only ground heads become facts; variable heads require `:-`.
                    return Err(ParseError::NonPredicateHead { line, column });
                }
            }
            TokenKind::Arrow => {
                self.advance()?;
                let body = self.parse_body()?;
                program.rules.push(Rule { head_predicate: predicate, head_args: args, body });
            }
            _ => return Err(self.unexpected("'.' or ':-'")),
        }
        Ok(())
    }

    fn parse_body(&mut self) -> Result<Vec<Literal>, ParseError> {
        let mut body = vec![self.parse_literal()?];
        while self.current.kind == TokenKind::Comma {
            self.advance()?;
            body.push(self.parse_literal()?);
        }
        self.expect(&TokenKind::Dot)?;
        Ok(body)
    }

    fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        if self.current.kind == TokenKind::Not {
            self.advance()?;
            let atom = self.parse_pred_call()?;
            return Ok(Literal::Negative(atom));
        }
        if let TokenKind::Ident(name) = &self.current.kind {
            if name == "match" {
                return self.parse_match_literal();
            }
        }
        if matches!(self.current.kind, TokenKind::Ident(_)) {
            // Lookahead: identifier followed by '(' is a predicate call.
            // We can't peek two tokens, so speculatively parse as a predicate
            // call only when the grammar shape matches; otherwise this must
            // be a bare-variable comparison, which never starts with an
            // identifier that is itself followed by '(' in valid programs.
            if self.looks_like_pred_call() {
                let atom = self.parse_pred_call()?;
                return Ok(Literal::Positive(atom));
            }
        }
        self.parse_cmp_literal()
    }

    /// True if the current identifier token is immediately followed by `(`,
    /// i.e. this is a predicate application rather than a bare term.
    fn looks_like_pred_call(&mut self) -> bool {
        // The lexer only gives one token of lookahead through `self.current`;
        // a predicate call's defining shape is `IDENT (`, so clone the
        // lexer to peek the following token without consuming input.
        let mut probe = self.lexer.clone();
        matches!(probe.next_token(), Ok(Token { kind: TokenKind::LParen, .. }))
    }

    fn parse_pred_call(&mut self) -> Result<Atom, ParseError> {
        let predicate = self.expect_ident()?;
        self.expect(&TokenKind::LParen)?;
        let args = self.parse_term_list()?;
        self.expect(&TokenKind::RParen)?;
        Ok(Atom { predicate, args })
    }

    fn parse_match_literal(&mut self) -> Result<Literal, ParseError> {
        self.advance()?; // 'match' ident
        self.expect(&TokenKind::LParen)?;
        let lhs = self.parse_term()?;
        self.expect(&TokenKind::Comma)?;
        let rhs = self.parse_term()?;
        self.expect(&TokenKind::RParen)?;
        Ok(Literal::Builtin { kind: BuiltinKind::Match, lhs, rhs })
    }

    fn parse_cmp_literal(&mut self) -> Result<Literal, ParseError> {
        let lhs = self.parse_term()?;
        let op = self.parse_comparison_op()?;
        let rhs = self.parse_term()?;
        if op == ComparisonOp::Eq {
            Ok(Literal::Equality { lhs, rhs })
        } else {
            Ok(Literal::Comparison { op, lhs, rhs })
        }
    }

    fn parse_comparison_op(&mut self) -> Result<ComparisonOp, ParseError> {
        let op = match self.current.kind {
            TokenKind::Eq => ComparisonOp::Eq,
            TokenKind::Ne => ComparisonOp::Ne,
            TokenKind::Lt => ComparisonOp::Lt,
            TokenKind::Le => ComparisonOp::Le,
            TokenKind::Gt => ComparisonOp::Gt,
            TokenKind::Ge => ComparisonOp::Ge,
            _ => {
                return Err(ParseError::MissingComparisonOperator {
                    line: self.current.line,
                    column: self.current.column,
                })
            }
        };
        self.advance()?;
        Ok(op)
    }

    fn parse_term_list(&mut self) -> Result<Vec<Term>, ParseError> {
        let mut terms = Vec::new();
        if self.current.kind == TokenKind::RParen {
            return Ok(terms);
        }
        loop {
            if terms.len() >= MAX_ARGS {
                return Err(ParseError::TooManyArguments {
                    line: self.current.line,
                    column: self.current.column,
                    max: MAX_ARGS,
                });
            }
            terms.push(self.parse_term()?);
            if self.current.kind == TokenKind::Comma {
                self.advance()?;
            } else {
                break;
            }
        }
        Ok(terms)
    }

    fn parse_term(&mut self) -> Result<Term, ParseError> {
        let term = match self.current.kind.clone() {
            TokenKind::Ident(name) => Term::Variable(name),
            TokenKind::Wildcard => Term::Wildcard,
            TokenKind::Str(s) => Term::StringLiteral(s),
            TokenKind::Int(i) => Term::IntLiteral(i),
            _ => return Err(self.unexpected("term")),
        };
        self.advance()?;
        Ok(term)
    }
}
