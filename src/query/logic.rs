//! Set expressions combining query results, e.g. `(0 | 1) & !2`.
//!
//! Operands are query indices. Operators, loosest first: `|` (union),
//! `^` (symmetric difference), `&` (intersection), `-` (difference), and
//! prefix `!` (complement against all ids). `and`/`or`/`not` are accepted
//! as spellings of `&`, `|` and `!`.

use crate::{err::Error, tables::IdSet};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Index(usize),
    Union,
    SymDiff,
    Intersect,
    Minus,
    Not,
    Open,
    Close,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, Error> {
    let mut tokens = Vec::new();
    let mut chars = expr.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '|' => Token::Union,
            '^' => Token::SymDiff,
            '&' => Token::Intersect,
            '-' => Token::Minus,
            '!' | '~' => Token::Not,
            '(' => Token::Open,
            ')' => Token::Close,
            c if c.is_ascii_alphanumeric() => {
                let mut end = start + c.len_utf8();
                while let Some((idx, c)) = chars.peek().copied() {
                    if !c.is_ascii_alphanumeric() {
                        break;
                    }
                    end = idx + c.len_utf8();
                    chars.next();
                }
                let word = &expr[start..end];
                match word.to_ascii_lowercase().as_str() {
                    "and" => Token::Intersect,
                    "or" => Token::Union,
                    "not" => Token::Not,
                    _ => Token::Index(word.parse().map_err(|_| {
                        Error::query(expr, format!("unexpected word {:?}", word))
                    })?),
                }
            }
            c => {
                return Err(Error::query(
                    expr,
                    format!("unexpected character {:?} at {}", c, start),
                ))
            }
        };
        tokens.push(token);
    }
    Ok(tokens)
}

/// Recursive descent evaluator over the token stream.
struct Evaluator<'a> {
    expr: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    sets: &'a [IdSet],
    universe: &'a IdSet,
}

impl<'a> Evaluator<'a> {
    fn error(&self, msg: &str) -> Error {
        Error::query(self.expr, format!("{} at token {}", msg, self.pos))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn accept(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// One precedence level: `next (op next)*`.
    fn binary<F, C>(&mut self, op: Token, mut next: F, combine: C) -> Result<IdSet, Error>
    where
        F: FnMut(&mut Self) -> Result<IdSet, Error>,
        C: Fn(&IdSet, &IdSet) -> IdSet,
    {
        let mut lhs = next(self)?;
        while self.accept(&op) {
            let rhs = next(self)?;
            lhs = combine(&lhs, &rhs);
        }
        Ok(lhs)
    }

    fn union(&mut self) -> Result<IdSet, Error> {
        self.binary(Token::Union, Self::sym_diff, |a, b| a.union(b).cloned().collect())
    }

    fn sym_diff(&mut self) -> Result<IdSet, Error> {
        self.binary(Token::SymDiff, Self::intersect, |a, b| {
            a.symmetric_difference(b).cloned().collect()
        })
    }

    fn intersect(&mut self) -> Result<IdSet, Error> {
        self.binary(Token::Intersect, Self::minus, |a, b| {
            a.intersection(b).cloned().collect()
        })
    }

    fn minus(&mut self) -> Result<IdSet, Error> {
        self.binary(Token::Minus, Self::unary, |a, b| {
            a.difference(b).cloned().collect()
        })
    }

    fn unary(&mut self) -> Result<IdSet, Error> {
        if self.accept(&Token::Not) {
            let inner = self.unary()?;
            return Ok(self.universe.difference(&inner).cloned().collect());
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<IdSet, Error> {
        match self.peek().cloned() {
            Some(Token::Index(idx)) => {
                self.pos += 1;
                self.sets
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| self.error(&format!("no query with index {}", idx)))
            }
            Some(Token::Open) => {
                self.pos += 1;
                let inner = self.union()?;
                if !self.accept(&Token::Close) {
                    return Err(self.error("expected ')'"));
                }
                Ok(inner)
            }
            Some(_) => Err(self.error("expected query index or '('")),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

/// Evaluate `expr` with operand `i` bound to `sets[i]`.
pub fn evaluate(expr: &str, sets: &[IdSet], universe: &IdSet) -> Result<IdSet, Error> {
    let mut evaluator = Evaluator {
        expr,
        tokens: tokenize(expr)?,
        pos: 0,
        sets,
        universe,
    };
    if evaluator.tokens.is_empty() {
        return Err(evaluator.error("empty expression"));
    }
    let result = evaluator.union()?;
    if evaluator.pos != evaluator.tokens.len() {
        return Err(evaluator.error("trailing input"));
    }
    Ok(result)
}
