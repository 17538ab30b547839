// SPDX-License-Identifier: MIT

//! The transition `condition` expression language.
//!
//! A small boolean expression grammar over `input|state|output` path
//! references, literals, comparisons (`==`, `!=`, `<`, `<=`, `>`, `>=`),
//! and logical combinators (`&&`, `||`, `!`), e.g.:
//!
//! ```text
//! $.state.count > 3 && $.input.kind == "urgent"
//! ```
//!
//! Evaluation never panics; a malformed or unevaluable condition is
//! reported as a [`ExprError`] and the caller (the planner) treats the
//! owning transition as non-matching, per the planner-error taxonomy.

use crate::context::Context;
use serde_json::Value;
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Bool(bool),
    Number(f64),
    String(String),
    Ref(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("unexpected end of condition expression")]
    UnexpectedEnd,
    #[error("unexpected token {0:?} in condition expression")]
    UnexpectedToken(String),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("cannot compare values of different kinds")]
    Incomparable,
}

/// Parse and evaluate `src` against `ctx`, returning its truthiness.
/// An empty condition is always `true` (an absent condition always matches).
pub fn evaluate(src: &str, ctx: &Context) -> Result<bool, ExprError> {
    if src.trim().is_empty() {
        return Ok(true);
    }
    let expr = parse(src)?;
    Ok(truthy(&eval(&expr, ctx)?))
}

pub fn parse(src: &str) -> Result<Expr, ExprError> {
    let mut tokens = Lexer::new(src).peekable();
    let expr = parse_or(&mut tokens)?;
    if let Some(tok) = tokens.next() {
        return Err(ExprError::UnexpectedToken(tok?.to_string()));
    }
    Ok(expr)
}

fn eval(expr: &Expr, ctx: &Context) -> Result<Value, ExprError> {
    Ok(match expr {
        Expr::Bool(b) => Value::Bool(*b),
        Expr::Number(n) => serde_json::Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
        Expr::String(s) => Value::String(s.clone()),
        Expr::Ref(path) => ctx.resolve_ref(path).unwrap_or(Value::Null),
        Expr::Not(inner) => Value::Bool(!truthy(&eval(inner, ctx)?)),
        Expr::And(a, b) => Value::Bool(truthy(&eval(a, ctx)?) && truthy(&eval(b, ctx)?)),
        Expr::Or(a, b) => Value::Bool(truthy(&eval(a, ctx)?) || truthy(&eval(b, ctx)?)),
        Expr::Cmp(op, a, b) => Value::Bool(compare(*op, &eval(a, ctx)?, &eval(b, ctx)?)?),
    })
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn compare(op: CmpOp, a: &Value, b: &Value) -> Result<bool, ExprError> {
    if matches!(op, CmpOp::Eq) {
        return Ok(a == b);
    }
    if matches!(op, CmpOp::Ne) {
        return Ok(a != b);
    }
    let ordering = match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            x.as_f64().and_then(|x| y.as_f64().map(|y| x.partial_cmp(&y)))
        }
        (Value::String(x), Value::String(y)) => Some(Some(x.cmp(y))),
        _ => return Err(ExprError::Incomparable),
    };
    let Some(Some(ord)) = ordering else { return Err(ExprError::Incomparable) };
    Ok(match op {
        CmpOp::Lt => ord.is_lt(),
        CmpOp::Le => ord.is_le(),
        CmpOp::Gt => ord.is_gt(),
        CmpOp::Ge => ord.is_ge(),
        CmpOp::Eq | CmpOp::Ne => unreachable!("handled above"),
    })
}

// --- parsing ---

fn parse_or(tokens: &mut Peekable<Lexer<'_>>) -> Result<Expr, ExprError> {
    let mut lhs = parse_and(tokens)?;
    while matches!(tokens.peek(), Some(Ok(Token::OrOr))) {
        tokens.next();
        let rhs = parse_and(tokens)?;
        lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_and(tokens: &mut Peekable<Lexer<'_>>) -> Result<Expr, ExprError> {
    let mut lhs = parse_unary(tokens)?;
    while matches!(tokens.peek(), Some(Ok(Token::AndAnd))) {
        tokens.next();
        let rhs = parse_unary(tokens)?;
        lhs = Expr::And(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_unary(tokens: &mut Peekable<Lexer<'_>>) -> Result<Expr, ExprError> {
    if matches!(tokens.peek(), Some(Ok(Token::Bang))) {
        tokens.next();
        return Ok(Expr::Not(Box::new(parse_unary(tokens)?)));
    }
    parse_comparison(tokens)
}

fn parse_comparison(tokens: &mut Peekable<Lexer<'_>>) -> Result<Expr, ExprError> {
    let lhs = parse_primary(tokens)?;
    let op = match tokens.peek() {
        Some(Ok(Token::EqEq)) => CmpOp::Eq,
        Some(Ok(Token::NotEq)) => CmpOp::Ne,
        Some(Ok(Token::Lt)) => CmpOp::Lt,
        Some(Ok(Token::Le)) => CmpOp::Le,
        Some(Ok(Token::Gt)) => CmpOp::Gt,
        Some(Ok(Token::Ge)) => CmpOp::Ge,
        _ => return Ok(lhs),
    };
    tokens.next();
    let rhs = parse_primary(tokens)?;
    Ok(Expr::Cmp(op, Box::new(lhs), Box::new(rhs)))
}

fn parse_primary(tokens: &mut Peekable<Lexer<'_>>) -> Result<Expr, ExprError> {
    match tokens.next().ok_or(ExprError::UnexpectedEnd)?? {
        Token::True => Ok(Expr::Bool(true)),
        Token::False => Ok(Expr::Bool(false)),
        Token::Number(n) => Ok(Expr::Number(n)),
        Token::String(s) => Ok(Expr::String(s)),
        Token::Ref(r) => Ok(Expr::Ref(r)),
        Token::LParen => {
            let inner = parse_or(tokens)?;
            match tokens.next() {
                Some(Ok(Token::RParen)) => Ok(inner),
                Some(Ok(other)) => Err(ExprError::UnexpectedToken(format!("{other:?}"))),
                Some(Err(e)) => Err(e),
                None => Err(ExprError::UnexpectedEnd),
            }
        }
        other => Err(ExprError::UnexpectedToken(format!("{other:?}"))),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    True,
    False,
    Number(f64),
    String(String),
    Ref(String),
    Bang,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

struct Lexer<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, chars: src.char_indices().peekable() }
    }

    fn take_while(&mut self, start: usize, pred: impl Fn(char) -> bool) -> &'a str {
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if pred(c) {
                end = i + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        &self.src[start..end]
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, ExprError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let &(i, c) = self.chars.peek()?;
            if c.is_whitespace() {
                self.chars.next();
                continue;
            }
            return Some(match c {
                '(' => {
                    self.chars.next();
                    Ok(Token::LParen)
                }
                ')' => {
                    self.chars.next();
                    Ok(Token::RParen)
                }
                '!' => {
                    self.chars.next();
                    if matches!(self.chars.peek(), Some(&(_, '='))) {
                        self.chars.next();
                        Ok(Token::NotEq)
                    } else {
                        Ok(Token::Bang)
                    }
                }
                '&' => {
                    self.chars.next();
                    match self.chars.next() {
                        Some((_, '&')) => Ok(Token::AndAnd),
                        _ => Err(ExprError::UnexpectedToken("&".to_string())),
                    }
                }
                '|' => {
                    self.chars.next();
                    match self.chars.next() {
                        Some((_, '|')) => Ok(Token::OrOr),
                        _ => Err(ExprError::UnexpectedToken("|".to_string())),
                    }
                }
                '=' => {
                    self.chars.next();
                    match self.chars.next() {
                        Some((_, '=')) => Ok(Token::EqEq),
                        _ => Err(ExprError::UnexpectedToken("=".to_string())),
                    }
                }
                '<' => {
                    self.chars.next();
                    if matches!(self.chars.peek(), Some(&(_, '='))) {
                        self.chars.next();
                        Ok(Token::Le)
                    } else {
                        Ok(Token::Lt)
                    }
                }
                '>' => {
                    self.chars.next();
                    if matches!(self.chars.peek(), Some(&(_, '='))) {
                        self.chars.next();
                        Ok(Token::Ge)
                    } else {
                        Ok(Token::Gt)
                    }
                }
                '"' => {
                    self.chars.next();
                    let start = i + 1;
                    let body = self.take_while(start, |c| c != '"');
                    match self.chars.next() {
                        Some((_, '"')) => Ok(Token::String(body.to_string())),
                        _ => Err(ExprError::UnterminatedString),
                    }
                }
                '$' => {
                    let body = self.take_while(i, |c| {
                        c == '$' || c == '.' || c.is_alphanumeric() || c == '_'
                    });
                    Ok(Token::Ref(body.to_string()))
                }
                c if c.is_ascii_digit() || c == '-' => {
                    let body = self.take_while(i, |c| c.is_ascii_digit() || c == '.' || c == '-');
                    body.parse::<f64>().map(Token::Number).map_err(|_| {
                        ExprError::UnexpectedToken(body.to_string())
                    })
                }
                c if c.is_alphabetic() || c == '_' => {
                    let body = self.take_while(i, |c| c.is_alphanumeric() || c == '_');
                    match body {
                        "true" => Ok(Token::True),
                        "false" => Ok(Token::False),
                        other => Err(ExprError::UnexpectedToken(other.to_string())),
                    }
                }
                other => {
                    self.chars.next();
                    Err(ExprError::UnexpectedToken(other.to_string()))
                }
            });
        }
    }
}

#[cfg(test)]
#[path = "expr_tests.rs"]
mod tests;
