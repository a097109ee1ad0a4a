//! Restricted row-formula language for custom calculations.
//!
//! Formulas are evaluated once per output row with exactly one binding: the
//! row's fields, reached as `row.Field` or `row["Field name"]`. The grammar
//! is deliberately closed — literals, arithmetic, comparisons, `and`/`or`/
//! `not`, string concatenation with `+`, and a fixed set of one-argument
//! functions (`upper`, `lower`, `trim`, `len`, `str`, `num`, `round`). There
//! is no ambient environment, no assignment and no way to reach outside the
//! row, which removes the injection surface of evaluating caller-supplied
//! code directly.
//!
//! Formulas are parsed once when the calculation pass is built and the AST
//! is reused for every row.

use matmas_ingest::format_numeric;

/// A formula value. `Null` propagates through arithmetic, renders as the
/// empty string and concatenates as nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
}

impl Value {
    /// String form written into the output column.
    pub fn render(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(true) => "true".to_string(),
            Self::Bool(false) => "false".to_string(),
            Self::Num(v) => format_numeric(*v),
            Self::Str(s) => s.clone(),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Num(v) => *v != 0.0,
            Self::Str(s) => !s.is_empty(),
        }
    }

    fn concat_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            other => other.render(),
        }
    }
}

/// Source of field values during evaluation.
pub trait RowScope {
    /// `None` means the field does not exist (distinct from a null cell).
    fn field(&self, name: &str) -> Option<Value>;
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ExprError {
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("division by zero")]
    DivisionByZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Upper,
    Lower,
    Trim,
    Len,
    Str,
    Num,
    Round,
}

/// Parsed formula, ready for repeated evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Field(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

impl Expr {
    pub fn parse(formula: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(formula)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if let Some((offset, _)) = parser.peek() {
            return Err(ExprError::Parse {
                offset,
                message: "unexpected trailing input".to_string(),
            });
        }
        Ok(expr)
    }

    pub fn eval(&self, row: &dyn RowScope) -> Result<Value, ExprError> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Field(name) => row
                .field(name)
                .ok_or_else(|| ExprError::UnknownField(name.clone())),
            Self::Unary(op, inner) => eval_unary(*op, inner.eval(row)?),
            Self::Binary(op, left, right) => match op {
                BinaryOp::And => {
                    let lhs = left.eval(row)?;
                    if !lhs.truthy() {
                        return Ok(Value::Bool(false));
                    }
                    Ok(Value::Bool(right.eval(row)?.truthy()))
                }
                BinaryOp::Or => {
                    let lhs = left.eval(row)?;
                    if lhs.truthy() {
                        return Ok(Value::Bool(true));
                    }
                    Ok(Value::Bool(right.eval(row)?.truthy()))
                }
                _ => eval_binary(*op, left.eval(row)?, right.eval(row)?),
            },
            Self::Call(func, arg) => eval_call(*func, arg.eval(row)?),
        }
    }
}

fn eval_unary(op: UnaryOp, value: Value) -> Result<Value, ExprError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
        UnaryOp::Neg => match value {
            Value::Num(v) => Ok(Value::Num(-v)),
            Value::Null => Ok(Value::Null),
            other => Err(ExprError::Type(format!(
                "cannot negate {}",
                type_name(&other)
            ))),
        },
    }
}

fn eval_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, ExprError> {
    match op {
        BinaryOp::Add => {
            // `+` concatenates as soon as either side is a string.
            if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) {
                return Ok(Value::Str(format!(
                    "{}{}",
                    left.concat_text(),
                    right.concat_text()
                )));
            }
            arithmetic(op, left, right)
        }
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => arithmetic(op, left, right),
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&left, &right))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&left, &right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&left, &right) {
                (Value::Num(a), Value::Num(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => None,
            };
            let Some(ordering) = ordering else {
                // Mixed or null comparison is simply false, mirroring how
                // missing data should not satisfy any cutoff.
                return Ok(Value::Bool(false));
            };
            let result = match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("short-circuited in eval"),
    }
}

fn arithmetic(op: BinaryOp, left: Value, right: Value) -> Result<Value, ExprError> {
    if matches!(left, Value::Null) || matches!(right, Value::Null) {
        return Ok(Value::Null);
    }
    let (Value::Num(a), Value::Num(b)) = (&left, &right) else {
        return Err(ExprError::Type(format!(
            "arithmetic on {} and {}",
            type_name(&left),
            type_name(&right)
        )));
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if *b == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            a / b
        }
        _ => unreachable!(),
    };
    Ok(Value::Num(result))
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Num(a), Value::Num(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        _ => false,
    }
}

fn eval_call(func: Func, arg: Value) -> Result<Value, ExprError> {
    match func {
        Func::Upper => Ok(Value::Str(arg.concat_text().to_uppercase())),
        Func::Lower => Ok(Value::Str(arg.concat_text().to_lowercase())),
        Func::Trim => Ok(Value::Str(arg.concat_text().trim().to_string())),
        Func::Len => Ok(Value::Num(arg.concat_text().chars().count() as f64)),
        Func::Str => Ok(Value::Str(arg.render())),
        Func::Num => match arg {
            Value::Null => Ok(Value::Null),
            Value::Num(v) => Ok(Value::Num(v)),
            Value::Str(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Num)
                .map_err(|_| ExprError::Type(format!("'{s}' is not a number"))),
            Value::Bool(_) => Err(ExprError::Type("num() of a boolean".to_string())),
        },
        Func::Round => match arg {
            Value::Null => Ok(Value::Null),
            Value::Num(v) => Ok(Value::Num(v.round())),
            other => Err(ExprError::Type(format!(
                "round() of {}",
                type_name(&other)
            ))),
        },
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Num(_) => "number",
        Value::Str(_) => "string",
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Num(f64),
    Str(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, ExprError> {
    let mut tokens = Vec::new();
    let bytes: Vec<char> = input.chars().collect();
    let mut pos = 0;
    while pos < bytes.len() {
        let ch = bytes[pos];
        if ch.is_whitespace() {
            pos += 1;
            continue;
        }
        let start = pos;
        let token = match ch {
            '+' => {
                pos += 1;
                Token::Plus
            }
            '-' => {
                pos += 1;
                Token::Minus
            }
            '*' => {
                pos += 1;
                Token::Star
            }
            '/' => {
                pos += 1;
                Token::Slash
            }
            '(' => {
                pos += 1;
                Token::LParen
            }
            ')' => {
                pos += 1;
                Token::RParen
            }
            '[' => {
                pos += 1;
                Token::LBracket
            }
            ']' => {
                pos += 1;
                Token::RBracket
            }
            '.' => {
                pos += 1;
                Token::Dot
            }
            '=' => {
                if bytes.get(pos + 1) == Some(&'=') {
                    pos += 2;
                    Token::Eq
                } else {
                    return Err(ExprError::Parse {
                        offset: start,
                        message: "single '=' (use '==')".to_string(),
                    });
                }
            }
            '!' => {
                if bytes.get(pos + 1) == Some(&'=') {
                    pos += 2;
                    Token::Ne
                } else {
                    return Err(ExprError::Parse {
                        offset: start,
                        message: "unexpected '!'".to_string(),
                    });
                }
            }
            '<' => {
                if bytes.get(pos + 1) == Some(&'=') {
                    pos += 2;
                    Token::Le
                } else {
                    pos += 1;
                    Token::Lt
                }
            }
            '>' => {
                if bytes.get(pos + 1) == Some(&'=') {
                    pos += 2;
                    Token::Ge
                } else {
                    pos += 1;
                    Token::Gt
                }
            }
            '\'' | '"' => {
                let quote = ch;
                pos += 1;
                let mut text = String::new();
                loop {
                    match bytes.get(pos) {
                        Some(&c) if c == quote => {
                            pos += 1;
                            break;
                        }
                        Some(&c) => {
                            text.push(c);
                            pos += 1;
                        }
                        None => {
                            return Err(ExprError::Parse {
                                offset: start,
                                message: "unterminated string literal".to_string(),
                            });
                        }
                    }
                }
                Token::Str(text)
            }
            c if c.is_ascii_digit() => {
                let mut text = String::new();
                let mut seen_dot = false;
                while let Some(&c) = bytes.get(pos) {
                    if c.is_ascii_digit() {
                        text.push(c);
                        pos += 1;
                    } else if c == '.' && !seen_dot && bytes.get(pos + 1).is_some_and(char::is_ascii_digit) {
                        seen_dot = true;
                        text.push(c);
                        pos += 1;
                    } else {
                        break;
                    }
                }
                let value = text.parse::<f64>().map_err(|_| ExprError::Parse {
                    offset: start,
                    message: format!("invalid number '{text}'"),
                })?;
                Token::Num(value)
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut text = String::new();
                while let Some(&c) = bytes.get(pos) {
                    if c.is_alphanumeric() || c == '_' {
                        text.push(c);
                        pos += 1;
                    } else {
                        break;
                    }
                }
                Token::Ident(text)
            }
            other => {
                return Err(ExprError::Parse {
                    offset: start,
                    message: format!("unexpected character '{other}'"),
                });
            }
        };
        tokens.push((start, token));
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<(usize, &Token)> {
        self.tokens.get(self.pos).map(|(offset, token)| (*offset, token))
    }

    fn advance(&mut self) -> Option<(usize, Token)> {
        let entry = self.tokens.get(self.pos).cloned();
        if entry.is_some() {
            self.pos += 1;
        }
        entry
    }

    fn error(&self, message: impl Into<String>) -> ExprError {
        let offset = self
            .tokens
            .get(self.pos)
            .map(|(offset, _)| *offset)
            .unwrap_or_else(|| self.tokens.last().map(|(offset, _)| *offset + 1).unwrap_or(0));
        ExprError::Parse {
            offset,
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), ExprError> {
        match self.advance() {
            Some((_, token)) if token == *expected => Ok(()),
            _ => Err(self.error(format!("expected {what}"))),
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if let Some((_, Token::Ident(word))) = self.peek() {
            if word == keyword {
                self.pos += 1;
                return true;
            }
        }
        false
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("or") {
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("and") {
            let right = self.parse_not()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        if self.eat_keyword("not") {
            let inner = self.parse_not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let left = self.parse_additive()?;
        let op = match self.peek() {
            Some((_, Token::Eq)) => Some(BinaryOp::Eq),
            Some((_, Token::Ne)) => Some(BinaryOp::Ne),
            Some((_, Token::Lt)) => Some(BinaryOp::Lt),
            Some((_, Token::Le)) => Some(BinaryOp::Le),
            Some((_, Token::Gt)) => Some(BinaryOp::Gt),
            Some((_, Token::Ge)) => Some(BinaryOp::Ge),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(left);
        };
        self.pos += 1;
        let right = self.parse_additive()?;
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some((_, Token::Plus)) => BinaryOp::Add,
                Some((_, Token::Minus)) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some((_, Token::Star)) => BinaryOp::Mul,
                Some((_, Token::Slash)) => BinaryOp::Div,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if matches!(self.peek(), Some((_, Token::Minus))) {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.advance() {
            Some((_, Token::Num(value))) => Ok(Expr::Literal(Value::Num(value))),
            Some((_, Token::Str(value))) => Ok(Expr::Literal(Value::Str(value))),
            Some((_, Token::LParen)) => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some((offset, Token::Ident(word))) => match word.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                "row" => self.parse_field_access(),
                name => {
                    let func = function_by_name(name).ok_or(ExprError::Parse {
                        offset,
                        message: format!("unknown identifier '{name}'"),
                    })?;
                    self.expect(&Token::LParen, "'(' after function name")?;
                    let arg = self.parse_or()?;
                    self.expect(&Token::RParen, "')'")?;
                    Ok(Expr::Call(func, Box::new(arg)))
                }
            },
            _ => Err(self.error("expected a value")),
        }
    }

    /// `row.Field` or `row["Field name"]`.
    fn parse_field_access(&mut self) -> Result<Expr, ExprError> {
        match self.advance() {
            Some((_, Token::Dot)) => match self.advance() {
                Some((_, Token::Ident(name))) => Ok(Expr::Field(name)),
                _ => Err(self.error("expected field name after 'row.'")),
            },
            Some((_, Token::LBracket)) => {
                let name = match self.advance() {
                    Some((_, Token::Str(name))) => name,
                    _ => return Err(self.error("expected string field name in 'row[...]'")),
                };
                self.expect(&Token::RBracket, "']'")?;
                Ok(Expr::Field(name))
            }
            _ => Err(self.error("'row' must be followed by '.' or '[' field access")),
        }
    }
}

fn function_by_name(name: &str) -> Option<Func> {
    match name {
        "upper" => Some(Func::Upper),
        "lower" => Some(Func::Lower),
        "trim" => Some(Func::Trim),
        "len" => Some(Func::Len),
        "str" => Some(Func::Str),
        "num" => Some(Func::Num),
        "round" => Some(Func::Round),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct TestRow(HashMap<&'static str, Value>);

    impl RowScope for TestRow {
        fn field(&self, name: &str) -> Option<Value> {
            self.0.get(name).cloned()
        }
    }

    fn row() -> TestRow {
        let mut fields = HashMap::new();
        fields.insert("Aantal", Value::Str("12".to_string()));
        fields.insert("Naam", Value::Str("Gauze".to_string()));
        fields.insert("Eenheid", Value::Str("ST".to_string()));
        fields.insert("EindDat", Value::Null);
        TestRow(fields)
    }

    fn eval(formula: &str) -> Value {
        Expr::parse(formula).unwrap().eval(&row()).unwrap()
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(eval("1 + 2 * 3"), Value::Num(7.0));
        assert_eq!(eval("(1 + 2) * 3"), Value::Num(9.0));
        assert_eq!(eval("-2 + 5"), Value::Num(3.0));
    }

    #[test]
    fn field_access_both_forms() {
        assert_eq!(eval("row.Naam"), Value::Str("Gauze".to_string()));
        assert_eq!(eval("row[\"Naam\"]"), Value::Str("Gauze".to_string()));
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(
            eval("row.Naam + ' (' + row.Eenheid + ')'"),
            Value::Str("Gauze (ST)".to_string())
        );
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(eval("num(row.Aantal) >= 10"), Value::Bool(true));
        assert_eq!(eval("row.Eenheid == 'ST' and num(row.Aantal) < 20"), Value::Bool(true));
        assert_eq!(eval("row.Eenheid == 'KG' or row.Naam == 'Gauze'"), Value::Bool(true));
        assert_eq!(eval("not (row.Eenheid == 'ST')"), Value::Bool(false));
    }

    #[test]
    fn functions() {
        assert_eq!(eval("upper(row.Naam)"), Value::Str("GAUZE".to_string()));
        assert_eq!(eval("len(trim('  ab  '))"), Value::Num(2.0));
        assert_eq!(eval("round(num('2.6'))"), Value::Num(3.0));
        assert_eq!(eval("str(12)"), Value::Str("12".to_string()));
    }

    #[test]
    fn null_propagates_and_renders_empty() {
        assert_eq!(eval("row.EindDat"), Value::Null);
        assert_eq!(eval("num(row.EindDat) * 2"), Value::Null);
        assert_eq!(eval("row.EindDat + ' suffix'"), Value::Str(" suffix".to_string()));
        assert_eq!(eval("row.EindDat == null"), Value::Bool(true));
        assert_eq!(Value::Null.render(), "");
    }

    #[test]
    fn unknown_field_is_an_eval_error() {
        let expr = Expr::parse("row.DoesNotExist").unwrap();
        assert_eq!(
            expr.eval(&row()),
            Err(ExprError::UnknownField("DoesNotExist".to_string()))
        );
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let expr = Expr::parse("1 / 0").unwrap();
        assert_eq!(expr.eval(&row()), Err(ExprError::DivisionByZero));
    }

    #[test]
    fn parse_errors() {
        assert!(Expr::parse("row.").is_err());
        assert!(Expr::parse("1 +").is_err());
        assert!(Expr::parse("shell('rm -rf /')").is_err());
        assert!(Expr::parse("'unterminated").is_err());
        assert!(Expr::parse("1 = 2").is_err());
        assert!(Expr::parse("row").is_err());
    }
}
