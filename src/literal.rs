//! Typed cell literals used inside a tag sheet.
//!
//! A cell holds one of a handful of value shapes: nothing, a quoted string,
//! an integer, a `(number, total)` pair, or a list of strings. The textual
//! form never contains a raw `|` or line break, so a cell can sit between
//! table borders without escaping at the table level.

use std::fmt::{self, Write as _};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Int(i64),
    Pair(Option<u32>, Option<u32>),
    List(Vec<String>),
}

impl CellValue {
    /// Builds a cell from the raw values of a tag field. A single value is
    /// unwrapped so the common case reads as a plain string.
    pub fn from_values(mut values: Vec<String>) -> Self {
        match values.len() {
            0 => CellValue::Empty,
            1 => CellValue::Text(values.remove(0)),
            _ => CellValue::List(values),
        }
    }

    /// The `n` of an `n` or `n/total` value, if the cell carries one.
    pub fn leading_number(&self) -> Option<i64> {
        match self {
            CellValue::Int(n) => Some(*n),
            CellValue::Pair(n, _) => n.map(i64::from),
            CellValue::Text(text) => leading_number_in(text),
            CellValue::List(items) if items.len() == 1 => leading_number_in(&items[0]),
            _ => None,
        }
    }
}

fn leading_number_in(text: &str) -> Option<i64> {
    text.split('/').next()?.trim().parse::<i64>().ok()
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_literal(self))
    }
}

pub fn encode_literal(value: &CellValue) -> String {
    match value {
        CellValue::Empty => String::new(),
        CellValue::Text(text) => quote_text(text),
        CellValue::Int(n) => n.to_string(),
        CellValue::Pair(n, total) => format!("({}, {})", count_literal(*n), count_literal(*total)),
        CellValue::List(items) => {
            let parts: Vec<String> = items.iter().map(|item| quote_text(item)).collect();
            format!("[{}]", parts.join(", "))
        }
    }
}

fn count_literal(value: Option<u32>) -> String {
    value.map_or_else(|| "None".to_string(), |n| n.to_string())
}

fn quote_text(text: &str) -> String {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '|' => out.push_str("\\x7c"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

impl LiteralError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

impl fmt::Display for LiteralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at offset {})", self.message, self.offset)
    }
}

impl std::error::Error for LiteralError {}

/// Parses one cell. Only the value shapes of [`CellValue`] are accepted;
/// there is no expression evaluation of any kind.
pub fn decode_literal(input: &str) -> Result<CellValue, LiteralError> {
    let mut parser = Parser { src: input, pos: 0 };
    parser.skip_ws();
    if parser.at_end() {
        return Ok(CellValue::Empty);
    }
    let value = parser.value()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError::new(self.pos, message)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> Result<(), LiteralError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{expected}', found '{c}'"))),
            None => Err(self.error(format!("expected '{expected}', found end of input"))),
        }
    }

    fn value(&mut self) -> Result<CellValue, LiteralError> {
        match self.peek() {
            Some('\'' | '"') => self.string().map(CellValue::Text),
            Some('(') => self.pair(),
            Some('[') => self.list(),
            Some(c) if c == '-' || c == '+' || c.is_ascii_digit() => {
                self.integer().map(CellValue::Int)
            }
            Some(c) if c.is_alphabetic() => {
                self.none_keyword()?;
                Ok(CellValue::Empty)
            }
            Some(c) => Err(self.error(format!("unexpected character '{c}'"))),
            None => Err(self.error("expected a value")),
        }
    }

    fn none_keyword(&mut self) -> Result<(), LiteralError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        match &self.src[start..self.pos] {
            "None" => Ok(()),
            word => Err(LiteralError::new(
                start,
                format!("unknown name '{word}'; strings must be quoted"),
            )),
        }
    }

    fn integer(&mut self) -> Result<i64, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '_') {
            self.bump();
        }
        let raw = &self.src[start..self.pos];
        let digits: String = raw.chars().filter(|c| *c != '_').collect();
        digits
            .parse::<i64>()
            .map_err(|_| LiteralError::new(start, format!("invalid integer '{raw}'")))
    }

    fn count(&mut self) -> Result<Option<u32>, LiteralError> {
        self.skip_ws();
        if matches!(self.peek(), Some(c) if c.is_alphabetic()) {
            self.none_keyword()?;
            return Ok(None);
        }
        let start = self.pos;
        let n = self.integer()?;
        u32::try_from(n)
            .map(Some)
            .map_err(|_| LiteralError::new(start, format!("{n} is not a valid count")))
    }

    fn pair(&mut self) -> Result<CellValue, LiteralError> {
        self.eat('(')?;
        let number = self.count()?;
        self.skip_ws();
        self.eat(',')?;
        let total = self.count()?;
        self.skip_ws();
        self.eat(')')?;
        Ok(CellValue::Pair(number, total))
    }

    fn list(&mut self) -> Result<CellValue, LiteralError> {
        self.eat('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(']') {
                self.bump();
                break;
            }
            items.push(self.string()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(']') => {
                    self.bump();
                    break;
                }
                Some(c) => return Err(self.error(format!("expected ',' or ']', found '{c}'"))),
                None => return Err(self.error("unterminated list")),
            }
        }
        Ok(CellValue::List(items))
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let start = self.pos;
        let quote = match self.bump() {
            Some(c @ ('\'' | '"')) => c,
            _ => return Err(LiteralError::new(start, "expected a quoted string")),
        };
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(LiteralError::new(start, "unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => out.push(self.escape()?),
                Some('\n') => return Err(LiteralError::new(start, "line break inside string")),
                Some(c) => out.push(c),
            }
        }
    }

    fn escape(&mut self) -> Result<char, LiteralError> {
        let start = self.pos - 1;
        match self.bump() {
            Some('\\') => Ok('\\'),
            Some('\'') => Ok('\''),
            Some('"') => Ok('"'),
            Some('n') => Ok('\n'),
            Some('r') => Ok('\r'),
            Some('t') => Ok('\t'),
            Some('0') => Ok('\0'),
            Some('x') => self.hex_escape(start, 2),
            Some('u') => self.hex_escape(start, 4),
            Some('U') => self.hex_escape(start, 8),
            Some(c) => Err(LiteralError::new(start, format!("unknown escape '\\{c}'"))),
            None => Err(LiteralError::new(start, "unterminated escape")),
        }
    }

    fn hex_escape(&mut self, start: usize, len: usize) -> Result<char, LiteralError> {
        let mut code = 0u32;
        for _ in 0..len {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| LiteralError::new(start, "truncated hex escape"))?;
            code = code * 16 + digit;
        }
        char::from_u32(code)
            .ok_or_else(|| LiteralError::new(start, format!("invalid code point {code:#x}")))
    }
}
