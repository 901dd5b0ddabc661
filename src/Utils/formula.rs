//! # Formula evaluator
//!
//! Small sandboxed expression language for user-defined material laws such as
//! `k(T) = 20 + 0.01*T` or `if(T > 1400, 35, 20 + 0.01*T)`.
//!
//! | Construct | Syntax |
//! |-----------|--------|
//! | arithmetic | `+ - * / ^` (right-associative power), unary `-` |
//! | comparison | `< <= > >= == !=`, logical `&& \|\| !` (true = 1.0) |
//! | functions | `sin cos tan exp log sqrt abs min max` |
//! | conditional | `if(cond, a, b)` |
//! | constants | `pi e` |
//!
//! Identifiers are resolved at compile time against the variable list given to
//! [`Formula::compile`], so evaluation is a plain tree walk over a value slice.
use crate::errors::{FurnaceError, FurnaceResult};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?P<num>(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)|(?P<id>[A-Za-z_][A-Za-z0-9_]*)|(?P<op><=|>=|==|!=|&&|\|\||[-+*/^(),<>!]))",
    )
    .expect("token regex is valid")
});

/// nesting of parentheses, calls and unary operators accepted by the parser
pub const MAX_NESTING: usize = 128;
/// bounds the depth of left-associative chains such as `T + T + ... + T`
pub const MAX_TOKENS: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(String),
}

fn tokenize(source: &str) -> FurnaceResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = source;
    while !rest.trim().is_empty() {
        if tokens.len() == MAX_TOKENS {
            return Err(FurnaceError::formula(source, format!("more than {} tokens", MAX_TOKENS)));
        }
        let caps = TOKEN_RE.captures(rest).ok_or_else(|| {
            let pos = source.len() - rest.trim_start().len();
            FurnaceError::formula(source, format!("unexpected character at position {}", pos))
        })?;
        if let Some(m) = caps.name("num") {
            let value: f64 = m.as_str().parse().map_err(|_| {
                FurnaceError::formula(source, format!("bad number `{}`", m.as_str()))
            })?;
            tokens.push(Token::Num(value));
        } else if let Some(m) = caps.name("id") {
            tokens.push(Token::Ident(m.as_str().to_string()));
        } else if let Some(m) = caps.name("op") {
            tokens.push(Token::Op(m.as_str().to_string()));
        }
        let consumed = caps.get(0).map(|m| m.end()).unwrap_or(rest.len());
        rest = &rest[consumed..];
    }
    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Func {
    Sin,
    Cos,
    Tan,
    Exp,
    Log,
    Sqrt,
    Abs,
    Min,
    Max,
}

impl Func {
    fn from_name(name: &str) -> Option<(Func, usize)> {
        let f = match name {
            "sin" => (Func::Sin, 1),
            "cos" => (Func::Cos, 1),
            "tan" => (Func::Tan, 1),
            "exp" => (Func::Exp, 1),
            "log" | "ln" => (Func::Log, 1),
            "sqrt" => (Func::Sqrt, 1),
            "abs" => (Func::Abs, 1),
            "min" => (Func::Min, 2),
            "max" => (Func::Max, 2),
            _ => return None,
        };
        Some(f)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Num(f64),
    Var(usize),
    Neg(Box<Node>),
    Not(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
    If(Box<Node>, Box<Node>, Box<Node>),
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    variables: &'a [&'a str],
}

impl<'a> Parser<'a> {
    fn peek_op(&self) -> Option<&str> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(op)) => Some(op.as_str()),
            _ => None,
        }
    }

    fn error(&self, message: impl Into<String>) -> FurnaceError {
        FurnaceError::formula(self.source, message)
    }

    fn expect_op(&mut self, op: &str) -> FurnaceResult<()> {
        if self.peek_op() == Some(op) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected `{}` at token {}", op, self.pos)))
        }
    }

    fn parse_or(&mut self) -> FurnaceResult<Node> {
        let mut lhs = self.parse_and()?;
        while self.peek_op() == Some("||") {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Node::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> FurnaceResult<Node> {
        let mut lhs = self.parse_cmp()?;
        while self.peek_op() == Some("&&") {
            self.pos += 1;
            let rhs = self.parse_cmp()?;
            lhs = Node::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> FurnaceResult<Node> {
        let lhs = self.parse_add()?;
        let op = match self.peek_op() {
            Some("<") => BinOp::Lt,
            Some("<=") => BinOp::Le,
            Some(">") => BinOp::Gt,
            Some(">=") => BinOp::Ge,
            Some("==") => BinOp::Eq,
            Some("!=") => BinOp::Ne,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_add()?;
        Ok(Node::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_add(&mut self) -> FurnaceResult<Node> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek_op() {
                Some("+") => BinOp::Add,
                Some("-") => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_mul()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_mul(&mut self) -> FurnaceResult<Node> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_op() {
                Some("*") => BinOp::Mul,
                Some("/") => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> FurnaceResult<Node> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("expression nested deeper than {} levels", MAX_NESTING)));
        }
        self.depth += 1;
        let node = self.parse_unary_inner();
        self.depth -= 1;
        node
    }

    fn parse_unary_inner(&mut self) -> FurnaceResult<Node> {
        match self.peek_op() {
            Some("-") => {
                self.pos += 1;
                Ok(Node::Neg(Box::new(self.parse_unary()?)))
            }
            Some("+") => {
                self.pos += 1;
                self.parse_unary()
            }
            Some("!") => {
                self.pos += 1;
                Ok(Node::Not(Box::new(self.parse_unary()?)))
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> FurnaceResult<Node> {
        let base = self.parse_primary()?;
        if self.peek_op() == Some("^") {
            self.pos += 1;
            // right-associative, binds tighter than unary minus on the left only
            let exponent = self.parse_unary()?;
            return Ok(Node::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_args(&mut self) -> FurnaceResult<Vec<Node>> {
        self.expect_op("(")?;
        let mut args = vec![self.parse_or()?];
        while self.peek_op() == Some(",") {
            self.pos += 1;
            args.push(self.parse_or()?);
        }
        self.expect_op(")")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> FurnaceResult<Node> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| self.error("unexpected end of expression"))?;
        self.pos += 1;
        match token {
            Token::Num(v) => Ok(Node::Num(v)),
            Token::Op(op) if op == "(" => {
                let inner = self.parse_or()?;
                self.expect_op(")")?;
                Ok(inner)
            }
            Token::Op(op) => Err(self.error(format!("unexpected operator `{}`", op))),
            Token::Ident(name) => {
                if self.peek_op() == Some("(") {
                    if name == "if" {
                        let mut args = self.parse_args()?;
                        if args.len() != 3 {
                            return Err(self.error("if(cond, a, b) takes 3 arguments"));
                        }
                        let otherwise = args.pop().map(Box::new);
                        let then = args.pop().map(Box::new);
                        let cond = args.pop().map(Box::new);
                        return match (cond, then, otherwise) {
                            (Some(c), Some(t), Some(o)) => Ok(Node::If(c, t, o)),
                            _ => Err(self.error("malformed if()")),
                        };
                    }
                    let (func, arity) = Func::from_name(&name)
                        .ok_or_else(|| self.error(format!("unknown function `{}`", name)))?;
                    let args = self.parse_args()?;
                    if args.len() != arity {
                        return Err(self.error(format!(
                            "`{}` takes {} argument(s), got {}",
                            name,
                            arity,
                            args.len()
                        )));
                    }
                    return Ok(Node::Call(func, args));
                }
                if let Some(idx) = self.variables.iter().position(|v| *v == name) {
                    return Ok(Node::Var(idx));
                }
                match name.as_str() {
                    "pi" => Ok(Node::Num(std::f64::consts::PI)),
                    "e" => Ok(Node::Num(std::f64::consts::E)),
                    _ => Err(self.error(format!("unknown variable `{}`", name))),
                }
            }
        }
    }
}

fn truth(v: bool) -> f64 {
    if v { 1.0 } else { 0.0 }
}

/// Compiled expression bound to an ordered list of variable names.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    variables: Vec<String>,
    root: Node,
}

impl Formula {
    /// Parses `source`; every identifier must be a function, `pi`, `e` or one of `variables`.
    pub fn compile(source: &str, variables: &[&str]) -> FurnaceResult<Self> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(FurnaceError::formula(source, "empty expression"));
        }
        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
            depth: 0,
            variables,
        };
        let root = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error(format!("trailing input after token {}", parser.pos)));
        }
        Ok(Self {
            source: source.to_string(),
            variables: variables.iter().map(|v| v.to_string()).collect(),
            root,
        })
    }

    /// `values` follows the order of the variable list given at compile time.
    pub fn eval(&self, values: &[f64]) -> FurnaceResult<f64> {
        if values.len() != self.variables.len() {
            return Err(FurnaceError::formula(
                &self.source,
                format!("expected {} values, got {}", self.variables.len(), values.len()),
            ));
        }
        let v = self.eval_node(&self.root, values)?;
        if !v.is_finite() {
            return Err(FurnaceError::formula(&self.source, format!("non-finite result {}", v)));
        }
        Ok(v)
    }

    fn eval_node(&self, node: &Node, values: &[f64]) -> FurnaceResult<f64> {
        let v = match node {
            Node::Num(v) => *v,
            Node::Var(i) => values[*i],
            Node::Neg(inner) => -self.eval_node(inner, values)?,
            Node::Not(inner) => truth(self.eval_node(inner, values)? == 0.0),
            Node::If(cond, then, otherwise) => {
                if self.eval_node(cond, values)? != 0.0 {
                    self.eval_node(then, values)?
                } else {
                    self.eval_node(otherwise, values)?
                }
            }
            Node::Binary(op, lhs, rhs) => {
                let a = self.eval_node(lhs, values)?;
                let b = self.eval_node(rhs, values)?;
                match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => {
                        if b == 0.0 {
                            return Err(FurnaceError::formula(&self.source, "division by zero"));
                        }
                        a / b
                    }
                    BinOp::Pow => a.powf(b),
                    BinOp::Lt => truth(a < b),
                    BinOp::Le => truth(a <= b),
                    BinOp::Gt => truth(a > b),
                    BinOp::Ge => truth(a >= b),
                    BinOp::Eq => truth(a == b),
                    BinOp::Ne => truth(a != b),
                    BinOp::And => truth(a != 0.0 && b != 0.0),
                    BinOp::Or => truth(a != 0.0 || b != 0.0),
                }
            }
            Node::Call(func, args) => {
                let x = self.eval_node(&args[0], values)?;
                match func {
                    Func::Sin => x.sin(),
                    Func::Cos => x.cos(),
                    Func::Tan => x.tan(),
                    Func::Exp => x.exp(),
                    Func::Abs => x.abs(),
                    Func::Log => {
                        if x <= 0.0 {
                            return Err(FurnaceError::formula(
                                &self.source,
                                format!("log of non-positive value {}", x),
                            ));
                        }
                        x.ln()
                    }
                    Func::Sqrt => {
                        if x < 0.0 {
                            return Err(FurnaceError::formula(
                                &self.source,
                                format!("sqrt of negative value {}", x),
                            ));
                        }
                        x.sqrt()
                    }
                    Func::Min => x.min(self.eval_node(&args[1], values)?),
                    Func::Max => x.max(self.eval_node(&args[1], values)?),
                }
            }
        };
        Ok(v)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}
