//! Parser for the agent-language subset used by belief bases and plans.
//!
//! A `logos` lexer feeds a recursive-descent parser. Nesting depth is
//! bounded so hostile input cannot overflow the stack.

use std::ops::Range;

use logos::Logos;

use crate::error::ParseError;
use crate::syntax::formula::{InternalCall, LogicalFormula, RelOp, Rule};
use crate::syntax::plan::{BodyStep, Plan, Trigger, TriggerKind, TriggerOp};
use crate::syntax::term::{ArithOp, Literal, Term};

const MAX_DEPTH: usize = 128;

#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
enum Token {
    #[token(":-")]
    RuleArrow,
    #[token("<-")]
    PlanArrow,
    #[token("::")]
    NsSep,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("&")]
    And,
    #[token("|")]
    Or,
    #[token("~")]
    Tilde,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("=")]
    Unify,
    #[token("==")]
    EqEq,
    #[token("\\==")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("!")]
    Bang,
    #[token("@")]
    At,
    #[regex(r"\.[a-z][A-Za-z0-9_]*", |lex| lex.slice()[1..].to_string())]
    InternalName(String),
    #[regex(r"[a-z][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
    #[regex(r"[A-Z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Var(String),
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),
    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    Str(String),
}

/// A top-level clause of an agent program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// A ground or non-ground fact `p(a).`
    Fact(Literal),
    /// A rule `h :- body.`
    Rule(Rule),
    /// A plan `+e : ctx <- body.`
    Plan(Plan),
}

struct Parser {
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
    depth: usize,
    end: usize,
}

fn lex(src: &str) -> Result<Vec<(Token, Range<usize>)>, ParseError> {
    let mut lexer = Token::lexer(src);
    let mut out = Vec::new();
    while let Some(token) = lexer.next() {
        match token {
            Ok(t) => out.push((t, lexer.span())),
            Err(()) => {
                return Err(ParseError::new(
                    lexer.span().start,
                    format!("unexpected input '{}'", lexer.slice()),
                ))
            }
        }
    }
    Ok(out)
}

impl Parser {
    fn new(src: &str) -> Result<Self, ParseError> {
        Ok(Self {
            tokens: lex(src)?,
            pos: 0,
            depth: 0,
            end: src.len(),
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(_, span)| span.start)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.position(), message)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), ParseError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn finish(&mut self) -> Result<(), ParseError> {
        self.eat(&Token::Dot);
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error("unexpected trailing input"))
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ---- terms ----

    fn term(&mut self) -> Result<Term, ParseError> {
        self.enter()?;
        let result = self.additive();
        self.leave();
        result
    }

    fn additive(&mut self) -> Result<Term, ParseError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = Term::arith(op, lhs, rhs);
        }
    }

    fn multiplicative(&mut self) -> Result<Term, ParseError> {
        let mut lhs = self.primary_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => ArithOp::Mul,
                Some(Token::Slash) => ArithOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.primary_term()?;
            lhs = Term::arith(op, lhs, rhs);
        }
    }

    fn primary_term(&mut self) -> Result<Term, ParseError> {
        match self.peek() {
            Some(Token::Var(_)) => match self.bump() {
                Some(Token::Var(name)) => Ok(Term::Var(name)),
                _ => Err(self.error("expected variable")),
            },
            Some(Token::Int(_)) => match self.bump() {
                Some(Token::Int(v)) => Ok(Term::Int(v)),
                _ => Err(self.error("expected integer")),
            },
            Some(Token::Str(_)) => match self.bump() {
                Some(Token::Str(s)) => Ok(Term::Str(s)),
                _ => Err(self.error("expected string")),
            },
            Some(Token::Minus) => {
                self.pos += 1;
                match self.bump() {
                    Some(Token::Int(v)) => Ok(Term::Int(-v)),
                    _ => Err(self.error("expected integer after '-'")),
                }
            }
            Some(Token::LBracket) => {
                self.pos += 1;
                let items = self.term_list(&Token::RBracket)?;
                Ok(Term::List(items))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.term()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Tilde | Token::Ident(_)) => Ok(Term::from(self.literal()?)),
            _ => Err(self.error("expected term")),
        }
    }

    /// Comma-separated terms up to and including `close`.
    fn term_list(&mut self, close: &Token) -> Result<Vec<Term>, ParseError> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.term()?);
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(&Token::Comma, "','")?;
        }
    }

    fn literal(&mut self) -> Result<Literal, ParseError> {
        self.enter()?;
        let result = self.literal_inner();
        self.leave();
        result
    }

    fn literal_inner(&mut self) -> Result<Literal, ParseError> {
        let negated = self.eat(&Token::Tilde);
        let Some(Token::Ident(first)) = self.bump() else {
            return Err(self.error("expected literal"));
        };
        let (namespace, functor) = if self.eat(&Token::NsSep) {
            match self.bump() {
                Some(Token::Ident(name)) => (Some(first), name),
                _ => return Err(self.error("expected functor after '::'")),
            }
        } else {
            (None, first)
        };
        let mut lit = Literal::new(functor).with_negated(negated);
        lit.namespace = namespace;
        if self.eat(&Token::LParen) {
            lit.terms = self.term_list(&Token::RParen)?;
        }
        if self.eat(&Token::LBracket) {
            lit.annots = self.term_list(&Token::RBracket)?;
        }
        Ok(lit)
    }

    // ---- formulas ----

    fn formula(&mut self) -> Result<LogicalFormula, ParseError> {
        self.enter()?;
        let result = self.disjunction();
        self.leave();
        result
    }

    fn disjunction(&mut self) -> Result<LogicalFormula, ParseError> {
        let mut lhs = self.conjunction()?;
        while self.eat(&Token::Or) {
            let rhs = self.conjunction()?;
            lhs = LogicalFormula::or(lhs, rhs);
        }
        Ok(lhs)
    }

    fn conjunction(&mut self) -> Result<LogicalFormula, ParseError> {
        let mut lhs = self.unary()?;
        while self.eat(&Token::And) {
            let rhs = self.unary()?;
            lhs = LogicalFormula::and(lhs, rhs);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<LogicalFormula, ParseError> {
        if matches!(self.peek(), Some(Token::Ident(k)) if k == "not")
            && !matches!(self.peek_at(1), Some(Token::NsSep | Token::Dot | Token::Comma) | None)
        {
            self.pos += 1;
            self.enter()?;
            let inner = self.unary();
            self.leave();
            return Ok(LogicalFormula::not(inner?));
        }
        self.primary_formula()
    }

    fn primary_formula(&mut self) -> Result<LogicalFormula, ParseError> {
        match self.peek() {
            Some(Token::InternalName(_)) => {
                let Some(Token::InternalName(name)) = self.bump() else {
                    return Err(self.error("expected internal action"));
                };
                let args = if self.eat(&Token::LParen) {
                    self.term_list(&Token::RParen)?
                } else {
                    Vec::new()
                };
                Ok(LogicalFormula::Internal(InternalCall::new(name, args)))
            }
            Some(Token::LParen) => {
                let saved = self.pos;
                self.pos += 1;
                if let Ok(inner) = self.formula() {
                    if self.eat(&Token::RParen) && !self.at_operator() {
                        return Ok(inner);
                    }
                }
                self.pos = saved;
                self.relational()
            }
            _ => self.relational(),
        }
    }

    fn at_operator(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Plus
                    | Token::Minus
                    | Token::Star
                    | Token::Slash
                    | Token::Unify
                    | Token::EqEq
                    | Token::NotEq
                    | Token::Lt
                    | Token::Le
                    | Token::Gt
                    | Token::Ge
            )
        )
    }

    fn rel_op(&self) -> Option<RelOp> {
        match self.peek()? {
            Token::Unify => Some(RelOp::Unify),
            Token::EqEq => Some(RelOp::Eq),
            Token::NotEq => Some(RelOp::Ne),
            Token::Lt => Some(RelOp::Lt),
            Token::Le => Some(RelOp::Le),
            Token::Gt => Some(RelOp::Gt),
            Token::Ge => Some(RelOp::Ge),
            _ => None,
        }
    }

    fn relational(&mut self) -> Result<LogicalFormula, ParseError> {
        let start = self.position();
        let lhs = self.term()?;
        if let Some(op) = self.rel_op() {
            self.pos += 1;
            let rhs = self.term()?;
            return Ok(LogicalFormula::rel(op, lhs, rhs));
        }
        lhs.as_formula()
            .ok_or_else(|| ParseError::new(start, format!("'{lhs}' is not a formula")))
    }

    // ---- plans ----

    fn plan(&mut self) -> Result<Plan, ParseError> {
        let label = if self.eat(&Token::At) {
            match self.bump() {
                Some(Token::Ident(name)) => Some(name),
                _ => return Err(self.error("expected plan label")),
            }
        } else {
            None
        };
        let op = match self.bump() {
            Some(Token::Plus) => TriggerOp::Add,
            Some(Token::Minus) => TriggerOp::Del,
            _ => return Err(self.error("expected '+' or '-' trigger")),
        };
        let kind = if self.eat(&Token::Bang) {
            TriggerKind::Achieve
        } else {
            TriggerKind::Belief
        };
        let literal = self.literal()?;
        let context = if self.eat(&Token::Colon) {
            Some(self.formula()?)
        } else {
            None
        };
        let mut body = Vec::new();
        if self.eat(&Token::PlanArrow) {
            loop {
                body.push(self.body_step()?);
                if !self.eat(&Token::Semi) {
                    break;
                }
            }
        }
        Ok(Plan {
            label,
            trigger: Trigger { op, kind, literal },
            context,
            body,
        })
    }

    fn body_step(&mut self) -> Result<BodyStep, ParseError> {
        match self.peek() {
            Some(Token::Plus) => {
                self.pos += 1;
                Ok(BodyStep::AddBel(self.literal()?))
            }
            Some(Token::Minus) => {
                self.pos += 1;
                if self.eat(&Token::Plus) {
                    Ok(BodyStep::ReplaceBel(self.literal()?))
                } else {
                    Ok(BodyStep::DelBel(self.literal()?))
                }
            }
            Some(Token::Bang) => {
                self.pos += 1;
                Ok(BodyStep::Achieve(self.literal()?))
            }
            Some(Token::InternalName(_)) => match self.primary_formula()? {
                LogicalFormula::Internal(call) => Ok(BodyStep::Internal(call)),
                other => Err(self.error(format!("expected internal action, found {other}"))),
            },
            _ => Ok(BodyStep::Action(self.literal()?)),
        }
    }

    fn clause(&mut self) -> Result<Clause, ParseError> {
        if matches!(self.peek(), Some(Token::At | Token::Plus | Token::Minus)) {
            let plan = self.plan()?;
            self.expect(&Token::Dot, "'.' after plan")?;
            return Ok(Clause::Plan(plan));
        }
        let head = self.literal()?;
        if self.eat(&Token::RuleArrow) {
            let body = self.formula()?;
            self.expect(&Token::Dot, "'.' after rule")?;
            return Ok(Clause::Rule(Rule::new(head, body)));
        }
        self.expect(&Token::Dot, "'.' after fact")?;
        Ok(Clause::Fact(head))
    }
}

/// Parses a single term.
pub fn parse_term(src: &str) -> Result<Term, ParseError> {
    let mut p = Parser::new(src)?;
    let term = p.term()?;
    p.finish()?;
    Ok(term)
}

/// Parses a single literal, e.g. `~ns::loc(1,Y)[source(percept)]`.
pub fn parse_literal(src: &str) -> Result<Literal, ParseError> {
    let mut p = Parser::new(src)?;
    let lit = p.literal()?;
    p.finish()?;
    Ok(lit)
}

/// Parses a logical formula, e.g. `p(X) & not q(X) | X > 3`.
pub fn parse_formula(src: &str) -> Result<LogicalFormula, ParseError> {
    let mut p = Parser::new(src)?;
    let formula = p.formula()?;
    p.finish()?;
    Ok(formula)
}

/// Parses a rule `head :- body.`
pub fn parse_rule(src: &str) -> Result<Rule, ParseError> {
    let mut p = Parser::new(src)?;
    let head = p.literal()?;
    p.expect(&Token::RuleArrow, "':-'")?;
    let body = p.formula()?;
    p.finish()?;
    Ok(Rule::new(head, body))
}

/// Parses a plan `@label +trigger : context <- body.`
pub fn parse_plan(src: &str) -> Result<Plan, ParseError> {
    let mut p = Parser::new(src)?;
    let plan = p.plan()?;
    p.finish()?;
    Ok(plan)
}

/// Parses a whole agent program into facts, rules and plans.
pub fn parse_program(src: &str) -> Result<Vec<Clause>, ParseError> {
    let mut p = Parser::new(src)?;
    let mut clauses = Vec::new();
    while !p.at_end() {
        clauses.push(p.clause()?);
    }
    Ok(clauses)
}
