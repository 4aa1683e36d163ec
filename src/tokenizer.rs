//! Splitting source text into tokens.
//!
//! Parentheses and the quote prefixes `'`, `` ` ``, `,` and `,@` are
//! standalone tokens. A string literal, escapes included, is one token;
//! an unterminated literal runs to the end of the input and is rejected
//! later by the reader. `;` starts a comment that runs to the end of the
//! line. Everything else is split on whitespace and delimiters.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, one_of},
    combinator::{recognize, value},
    multi::many0,
    sequence::pair,
};

use crate::{Error, SyntaxErrorKind};

/// Characters that end an atom
const DELIMITERS: &str = "()'\"`,;";

fn is_atom_char(c: char) -> bool {
    !c.is_whitespace() && !DELIMITERS.contains(c)
}

fn comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(char(';'), take_while(|c: char| c != '\n'))).parse(input)
}

/// Skip whitespace and comments. Whitespace is every Unicode `White_Space`
/// character, the same set that ends an atom.
fn skip(input: &str) -> IResult<&str, ()> {
    value((), many0(alt((take_while1(char::is_whitespace), comment)))).parse(input)
}

/// A string literal including both quotes, or the rest of the input if the
/// closing quote is missing
fn string_token(input: &str) -> IResult<&str, &str> {
    let (body, _) = char('"').parse(input)?;
    match closing_quote(body) {
        Some(i) => {
            let end = i + 2; // opening and closing quote
            Ok((&input[end..], &input[..end]))
        }
        None => Ok(("", input)),
    }
}

/// Byte offset of the unescaped quote that ends a string body
fn closing_quote(body: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(i),
            _ => {}
        }
    }
    None
}

/// Whether `token` is a string literal whose closing quote is missing
pub fn is_unterminated_string(token: &str) -> bool {
    token
        .strip_prefix('"')
        .is_some_and(|body| closing_quote(body).is_none())
}

fn token(input: &str) -> IResult<&str, &str> {
    alt((
        tag(",@"),
        recognize(one_of("()'`,")),
        string_token,
        take_while1(is_atom_char),
    ))
    .parse(input)
}

fn invalid_syntax(input: &str) -> Error {
    let near: String = input.chars().take(10).collect();
    Error::syntax(
        SyntaxErrorKind::InvalidSyntax,
        format!("Invalid syntax near '{near}'"),
    )
}

/// Split `input` into tokens. Tokens borrow from the input.
pub fn tokenize(input: &str) -> Result<Vec<&str>, Error> {
    let mut tokens = Vec::new();
    let (mut rest, ()) = skip(input).map_err(|_| invalid_syntax(input))?;
    while !rest.is_empty() {
        let (after, tok) = token(rest).map_err(|_| invalid_syntax(rest))?;
        tokens.push(tok);
        let (after, ()) = skip(after).map_err(|_| invalid_syntax(after))?;
        rest = after;
    }
    Ok(tokens)
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        let cases: Vec<(&str, Vec<&str>)> = vec![
            ("(define r 10)", vec!["(", "define", "r", "10", ")"]),
            ("", vec![]),
            ("   \n\t ", vec![]),
            ("42", vec!["42"]),
            ("(+ 1 (* 2 3))", vec!["(", "+", "1", "(", "*", "2", "3", ")", ")"]),
            ("((a)b)", vec!["(", "(", "a", ")", "b", ")"]),
            ("'x", vec!["'", "x"]),
            ("'(1 2)", vec!["'", "(", "1", "2", ")"]),
            (
                "`(a ,b ,@c)",
                vec!["`", "(", "a", ",", "b", ",@", "c", ")"],
            ),
            ("\"hello world\"", vec!["\"hello world\""]),
            (
                "(print \"a \\\"q\\\" b\")",
                vec!["(", "print", "\"a \\\"q\\\" b\"", ")"],
            ),
            ("\"a\"\"b\"", vec!["\"a\"", "\"b\""]),
            ("\"unterminated (1 2)", vec!["\"unterminated (1 2)"]),
            ("1 ; comment (ignored)\n2", vec!["1", "2"]),
            ("; only a comment", vec![]),
            ("a;b\nc", vec!["a", "c"]),
            ("1+2i -3.5 #t set! <=", vec!["1+2i", "-3.5", "#t", "set!", "<="]),
            ("héllo wörld", vec!["héllo", "wörld"]),
            // Form feed, vertical tab and no-break space separate tokens
            ("(+ 1\x0c2)", vec!["(", "+", "1", "2", ")"]),
            ("a\x0bb", vec!["a", "b"]),
            ("x\u{a0}y\u{2003}z", vec!["x", "y", "z"]),
            ("\x0c(define r 10)\x0c", vec!["(", "define", "r", "10", ")"]),
        ];

        for (i, (input, expected)) in cases.iter().enumerate() {
            let tokens = tokenize(input).unwrap();
            assert_eq!(tokens, *expected, "case #{} ({input:?})", i + 1);
        }
    }

    #[test]
    fn test_unterminated_string_token() {
        let cases = vec![
            ("\"open", true),
            ("\"", true),
            ("\"escaped quote \\\"", true),
            ("\"closed\"", false),
            ("\"\"", false),
            ("\"ends in backslash \\\\\"", false),
            ("atom", false),
            ("(", false),
        ];

        for (i, (token, expected)) in cases.iter().enumerate() {
            assert_eq!(
                is_unterminated_string(token),
                *expected,
                "case #{} ({token:?})",
                i + 1
            );
        }
    }
}
