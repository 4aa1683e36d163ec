//! Building expressions from tokens.
//!
//! [`read`] and [`read_all`] parse a complete string. [`Reader`] pulls lines
//! from any iterator and yields one top-level expression at a time, which is
//! what file loaders and line-oriented front ends need.

use std::collections::VecDeque;

use crate::ast::{Complex, IntType, Value, sym, val};
use crate::tokenizer::{is_unterminated_string, tokenize};
use crate::{Error, ReadConfig, SyntaxError, SyntaxErrorKind};

/// A source of tokens consumed front to back.
pub trait TokenSource {
    type Token: AsRef<str>;

    /// The next token, or `None` at end of input
    fn next_token(&mut self) -> Result<Option<Self::Token>, Error>;
}

impl<'a> TokenSource for VecDeque<&'a str> {
    type Token = &'a str;

    fn next_token(&mut self) -> Result<Option<&'a str>, Error> {
        Ok(self.pop_front())
    }
}

const UNTERMINATED_STRING: &str = "unterminated string literal";

/// Whether reading failed only because the input stopped inside a list,
/// after a quote prefix, or inside a string literal. More input may
/// complete it.
pub fn is_incomplete(err: &Error) -> bool {
    match err {
        Error::Syntax(e) => e.kind == SyntaxErrorKind::UnexpectedEof,
        Error::ConversionError(msg) => msg.starts_with(UNTERMINATED_STRING),
        _ => false,
    }
}

fn unexpected_eof() -> Error {
    Error::syntax(SyntaxErrorKind::UnexpectedEof, "unexpected EOF")
}

fn quote_prefix_symbol(token: &str) -> Option<&'static str> {
    match token {
        "'" => Some("quote"),
        "`" => Some("quasiquote"),
        "," => Some("unquote"),
        ",@" => Some("unquote-splicing"),
        _ => None,
    }
}

/// Read the expression that starts with `token`, nested `depth` levels deep.
fn read_form<S: TokenSource + ?Sized>(
    source: &mut S,
    token: &str,
    depth: usize,
    max_depth: usize,
) -> Result<Value, Error> {
    let nests = token == "(" || quote_prefix_symbol(token).is_some();
    if nests && depth >= max_depth {
        return Err(Error::syntax(
            SyntaxErrorKind::TooDeeplyNested,
            format!("Expression too deeply nested (max depth: {max_depth})"),
        ));
    }

    if token == "(" {
        let mut items = Vec::new();
        loop {
            let Some(next) = source.next_token()? else {
                return Err(unexpected_eof());
            };
            if next.as_ref() == ")" {
                return Ok(Value::list(items));
            }
            items.push(read_form(source, next.as_ref(), depth + 1, max_depth)?);
        }
    }

    if token == ")" {
        return Err(Error::syntax(
            SyntaxErrorKind::UnexpectedClose,
            "unexpected )",
        ));
    }

    if let Some(name) = quote_prefix_symbol(token) {
        let Some(next) = source.next_token()? else {
            return Err(unexpected_eof());
        };
        let quoted = read_form(source, next.as_ref(), depth + 1, max_depth)?;
        return Ok(Value::list(vec![sym(name), quoted]));
    }

    parse_atom(token)
}

/// Read one expression, consuming its tokens from the front of `source`.
pub fn read_from_tokens<S: TokenSource + ?Sized>(source: &mut S) -> Result<Value, Error> {
    read_from_tokens_with_config(source, &ReadConfig::default())
}

pub fn read_from_tokens_with_config<S: TokenSource + ?Sized>(
    source: &mut S,
    config: &ReadConfig,
) -> Result<Value, Error> {
    let Some(token) = source.next_token()? else {
        return Err(unexpected_eof());
    };
    read_form(source, token.as_ref(), 0, config.max_depth)
}

/// Read exactly one expression from `text`.
pub fn read(text: &str) -> Result<Value, Error> {
    read_with_config(text, &ReadConfig::default())
}

pub fn read_with_config(text: &str, config: &ReadConfig) -> Result<Value, Error> {
    let mut tokens: VecDeque<&str> = tokenize(text)?.into();
    let expr = read_from_tokens_with_config(&mut tokens, config)?;
    if let Some(extra) = tokens.front() {
        return Err(SyntaxError::new(
            SyntaxErrorKind::TrailingContent,
            "unexpected content after expression",
            Some((*extra).to_owned()),
        )
        .into());
    }
    Ok(expr)
}

/// Read every top-level expression in `text`.
pub fn read_all(text: &str) -> Result<Vec<Value>, Error> {
    let mut tokens: VecDeque<&str> = tokenize(text)?.into();
    let mut exprs = Vec::new();
    while !tokens.is_empty() {
        exprs.push(read_from_tokens(&mut tokens)?);
    }
    Ok(exprs)
}

/// Streaming reader over lines of source text.
///
/// Lines are pulled only when more tokens are needed, so an expression or a
/// string literal may span several lines.
pub struct Reader<L> {
    lines: L,
    pending: VecDeque<String>,
    config: ReadConfig,
}

impl<L: Iterator<Item = String>> Reader<L> {
    pub fn new(lines: L) -> Self {
        Self::with_config(lines, ReadConfig::default())
    }

    pub fn with_config(lines: L, config: ReadConfig) -> Self {
        Reader {
            lines,
            pending: VecDeque::new(),
            config,
        }
    }

    /// The next top-level expression; `None` once the input is exhausted.
    pub fn next_expr(&mut self) -> Result<Option<Value>, Error> {
        let Some(token) = self.next_token()? else {
            return Ok(None);
        };
        let max_depth = self.config.max_depth;
        read_form(self, &token, 0, max_depth).map(Some)
    }
}

impl<L: Iterator<Item = String>> TokenSource for Reader<L> {
    type Token = String;

    fn next_token(&mut self) -> Result<Option<String>, Error> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(Some(token));
            }
            let Some(mut text) = self.lines.next() else {
                return Ok(None);
            };
            // A string literal left open continues on the following lines
            loop {
                let tokens = tokenize(&text)?;
                let open = tokens.last().is_some_and(|t| is_unterminated_string(t));
                let next = if open { self.lines.next() } else { None };
                match next {
                    Some(line) => {
                        text.push('\n');
                        text.push_str(&line);
                    }
                    None => {
                        self.pending.extend(tokens.into_iter().map(str::to_owned));
                        break;
                    }
                }
            }
        }
    }
}

impl<L: Iterator<Item = String>> Iterator for Reader<L> {
    type Item = Result<Value, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_expr().transpose()
    }
}

//
// Atoms
//

/// Classify an atom: integer, float, complex, boolean, string, else symbol.
fn parse_atom(token: &str) -> Result<Value, Error> {
    if let Ok(n) = token.parse::<IntType>() {
        return Ok(val(n));
    }
    if let Ok(x) = token.parse::<f64>() {
        return Ok(val(x));
    }
    if let Some(z) = parse_complex(token) {
        return Ok(val(z));
    }
    match token {
        "#t" => Ok(val(true)),
        "#f" => Ok(val(false)),
        _ if token.starts_with('"') => parse_string_literal(token).map(Value::String),
        _ => Ok(sym(token)),
    }
}

/// Complex literals: `1+2i`, `-3.5i`, `2e3-1i`, `1-i`
fn parse_complex(token: &str) -> Option<Complex> {
    let body = token.strip_suffix('i')?;
    if !body.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    // The sign separating the parts is not leading and not an exponent sign
    let split = body
        .char_indices()
        .rev()
        .find(|&(i, c)| {
            i > 0 && (c == '+' || c == '-') && !matches!(body.as_bytes()[i - 1], b'e' | b'E')
        })
        .map(|(i, _)| i);
    let (real, imaginary) = match split {
        Some(i) => (&body[..i], &body[i..]),
        None => ("", body),
    };

    let real = if real.is_empty() {
        0.0
    } else {
        real.parse::<f64>().ok()?
    };
    let imaginary = match imaginary {
        "+" => 1.0,
        "-" => -1.0,
        digits => digits.parse::<f64>().ok()?,
    };
    Some(Complex::new(real, imaginary))
}

/// Decode a string literal token, quotes included
fn parse_string_literal(token: &str) -> Result<String, Error> {
    let unterminated = || Error::ConversionError(format!("{UNTERMINATED_STRING}: {token}"));
    let mut chars = token.strip_prefix('"').ok_or_else(unterminated)?.chars();
    let mut result = String::new();

    loop {
        match chars.next() {
            Some('"') if chars.as_str().is_empty() => return Ok(result),
            Some('"') => {
                return Err(Error::ConversionError(format!(
                    "unexpected content after string literal: {token}"
                )));
            }
            Some('\\') => match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some(other) => {
                    return Err(Error::ConversionError(format!(
                        "unknown escape sequence \\{other} in {token}"
                    )));
                }
                None => return Err(unterminated()),
            },
            Some(c) => result.push(c),
            None => return Err(unterminated()),
        }
    }
}
