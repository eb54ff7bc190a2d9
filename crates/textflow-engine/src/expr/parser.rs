//! Tokenizer and recursive-descent parser for inline expressions

use crate::error::{NodeEngineError, Result};

use super::Value;

/// Deepest nesting accepted before parsing is abandoned
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
}

/// Operators, longest first so `**` wins over `*`
const OPERATORS: &[&str] = &[
    "**", "//", "==", "!=", "<=", ">=", "+", "-", "*", "/", "%", "<", ">", "(", ")", "[", "]",
    ",", ".", ";",
];

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
                i += 1;
            }
            let mut is_float = false;
            if i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit() {
                is_float = true;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    is_float = true;
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().filter(|c| **c != '_').collect();
            let token = if is_float {
                Token::Float(text.parse().map_err(|_| {
                    NodeEngineError::expression(format!("invalid number '{}'", text))
                })?)
            } else {
                Token::Int(text.parse().map_err(|_| {
                    NodeEngineError::expression(format!("integer literal too large '{}'", text))
                })?)
            };
            tokens.push(token);
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }

        if c == '"' || c == '\'' {
            let quote = c;
            let mut text = String::new();
            i += 1;
            loop {
                let Some(&ch) = chars.get(i) else {
                    return Err(NodeEngineError::expression("unterminated string literal"));
                };
                i += 1;
                if ch == quote {
                    break;
                }
                if ch == '\\' {
                    let Some(&escaped) = chars.get(i) else {
                        return Err(NodeEngineError::expression("unterminated string literal"));
                    };
                    i += 1;
                    text.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                } else {
                    text.push(ch);
                }
            }
            tokens.push(Token::Str(text));
            continue;
        }

        let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
        match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            Some(op) => {
                tokens.push(Token::Op(op));
                i += op.chars().count();
            }
            None => {
                return Err(NodeEngineError::expression(format!(
                    "unexpected character '{}'",
                    c
                )))
            }
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Name(String),
    List(Vec<Expr>),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Attribute(Box<Expr>, String),
    Call(Box<Expr>, Vec<Expr>),
    Index(Box<Expr>, Box<Expr>),
}

/// A parsed expression with its leading `import` clauses
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Program {
    pub imports: Vec<String>,
    pub body: Expr,
}

pub(crate) fn parse(source: &str) -> Result<Program> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let program = parser.program()?;
    if let Some(token) = parser.peek() {
        return Err(NodeEngineError::expression(format!(
            "unexpected trailing token {:?}",
            token
        )));
    }
    Ok(program)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(self.peek(), Some(Token::Op(o)) if *o == op)
    }

    fn at_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(w)) if w == word)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.at_op(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.at_keyword(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(NodeEngineError::expression(format!(
                "expected '{}', found {:?}",
                op,
                self.peek()
            )))
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            other => Err(NodeEngineError::expression(format!(
                "expected a name, found {:?}",
                other
            ))),
        }
    }

    fn program(&mut self) -> Result<Program> {
        let mut imports = Vec::new();
        while self.eat_keyword("import") {
            loop {
                imports.push(self.ident()?);
                if !self.eat_op(",") {
                    break;
                }
            }
            self.expect_op(";")?;
        }
        let body = self.expression()?;
        Ok(Program { imports, body })
    }

    fn expression(&mut self) -> Result<Expr> {
        self.descend(Self::conditional)
    }

    /// Run `rule` one nesting level deeper, bounded by `MAX_DEPTH`
    fn descend(&mut self, rule: fn(&mut Self) -> Result<Expr>) -> Result<Expr> {
        if self.depth >= MAX_DEPTH {
            return Err(NodeEngineError::expression("expression nested too deeply"));
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }

    fn conditional(&mut self) -> Result<Expr> {
        let then = self.or()?;
        if self.eat_keyword("if") {
            let condition = self.or()?;
            if !self.eat_keyword("else") {
                return Err(NodeEngineError::expression("conditional is missing 'else'"));
            }
            let otherwise = self.expression()?;
            return Ok(Expr::Conditional {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(then)
    }

    fn or(&mut self) -> Result<Expr> {
        let mut left = self.and()?;
        while self.eat_keyword("or") {
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut left = self.not()?;
        while self.eat_keyword("and") {
            let right = self.not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr> {
        if self.eat_keyword("not") {
            let inner = self.descend(Self::not)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("==")) => BinaryOp::Eq,
                Some(Token::Op("!=")) => BinaryOp::Ne,
                Some(Token::Op("<")) => BinaryOp::Lt,
                Some(Token::Op("<=")) => BinaryOp::Le,
                Some(Token::Op(">")) => BinaryOp::Gt,
                Some(Token::Op(">=")) => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("+")) => BinaryOp::Add,
                Some(Token::Op("-")) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn term(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("*")) => BinaryOp::Mul,
                Some(Token::Op("/")) => BinaryOp::Div,
                Some(Token::Op("//")) => BinaryOp::FloorDiv,
                Some(Token::Op("%")) => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat_op("-") {
            let inner = self.descend(Self::unary)?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        if self.eat_op("+") {
            return self.descend(Self::unary);
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr> {
        let base = self.postfix()?;
        if self.eat_op("**") {
            let exponent = self.descend(Self::unary)?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_op("(") {
                let args = self.items(")")?;
                expr = Expr::Call(Box::new(expr), args);
            } else if self.eat_op(".") {
                let attr = self.ident()?;
                expr = Expr::Attribute(Box::new(expr), attr);
            } else if self.eat_op("[") {
                let index = self.expression()?;
                self.expect_op("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma-separated expressions up to `close`
    fn items(&mut self, close: &str) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        if self.eat_op(close) {
            return Ok(items);
        }
        loop {
            items.push(self.expression()?);
            if self.eat_op(close) {
                return Ok(items);
            }
            self.expect_op(",")?;
            // trailing comma
            if self.eat_op(close) {
                return Ok(items);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Int(n)) => Ok(Expr::Literal(Value::Int(n))),
            Some(Token::Float(f)) => Ok(Expr::Literal(Value::Float(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::Ident(name)) => Ok(match name.as_str() {
                "True" | "true" => Expr::Literal(Value::Bool(true)),
                "False" | "false" => Expr::Literal(Value::Bool(false)),
                "None" => Expr::Literal(Value::None),
                _ => Expr::Name(name),
            }),
            Some(Token::Op("(")) => {
                let inner = self.expression()?;
                self.expect_op(")")?;
                Ok(inner)
            }
            Some(Token::Op("[")) => Ok(Expr::List(self.items("]")?)),
            other => Err(NodeEngineError::expression(format!(
                "unexpected token {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        let tokens = tokenize("len('ab') ** 2 // 3").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("len".into()),
                Token::Op("("),
                Token::Str("ab".into()),
                Token::Op(")"),
                Token::Op("**"),
                Token::Int(2),
                Token::Op("//"),
                Token::Int(3),
            ]
        );
    }

    #[test]
    fn test_tokenize_numbers() {
        assert_eq!(tokenize("1.5").unwrap(), vec![Token::Float(1.5)]);
        assert_eq!(tokenize("2e3").unwrap(), vec![Token::Float(2000.0)]);
        assert_eq!(tokenize("1_000").unwrap(), vec![Token::Int(1000)]);
    }

    #[test]
    fn test_precedence() {
        let program = parse("1 + 2 * 3").unwrap();
        match program.body {
            Expr::Binary(BinaryOp::Add, _, right) => {
                assert!(matches!(*right, Expr::Binary(BinaryOp::Mul, _, _)));
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_imports() {
        let program = parse("import math, re; math.pi").unwrap();
        assert_eq!(program.imports, vec!["math", "re"]);
        assert!(matches!(program.body, Expr::Attribute(_, _)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("1 +").is_err());
        assert!(parse("'open").is_err());
        assert!(parse("a if b").is_err());
        assert!(parse("1 2").is_err());
        assert!(parse("#").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert!(parse(&deep).is_err());
    }
}
