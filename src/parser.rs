// ABOUTME: Reader module turning Lisp source text into s-expressions using nom combinators

use nom::{
    branch::alt,
    bytes::complete::{escaped, tag, take_while, take_while1},
    character::complete::{anychar, char, multispace1, none_of, one_of},
    combinator::value,
    multi::many0,
    IResult, Parser,
};

use crate::error::Error;
use crate::sexpr::Sexpr;

/// Parse a comment: `;` to end of line.
fn parse_comment(input: &str) -> IResult<&str, ()> {
    let (input, _) = char(';')(input)?;
    let (input, _) = take_while(|c| c != '\n')(input)?;
    Ok((input, ()))
}

/// Skip whitespace and comments.
fn ws_and_comments(input: &str) -> IResult<&str, ()> {
    many0(alt((value((), multispace1), parse_comment)))
        .map(|_| ())
        .parse(input)
}

/// Parse a boolean literal. The target machine is integer-only, so `#t`
/// and `#f` become 1 and 0 right here.
fn parse_boolean(input: &str) -> IResult<&str, Sexpr> {
    alt((
        value(Sexpr::Integer(1), tag("#t")),
        value(Sexpr::Integer(0), tag("#f")),
    ))
    .parse(input)
}

/// Parse a character literal: `#\space`, `#\newline`, or `#\X`.
/// Characters are their integer codes.
fn parse_character(input: &str) -> IResult<&str, Sexpr> {
    let (input, _) = tag("#\\")(input)?;
    alt((
        value(Sexpr::Integer(' ' as i64), tag("space")),
        value(Sexpr::Integer('\n' as i64), tag("newline")),
        anychar.map(|c| Sexpr::Integer(c as i64)),
    ))
    .parse(input)
}

/// Parse a string literal with `\"` and `\n` escapes.
///
/// Strings have no direct stack representation; they expand to
/// `(quote (c1 c2 ... cn))` where each element is a character code.
fn parse_string(input: &str) -> IResult<&str, Sexpr> {
    let (input, _) = char('"')(input)?;

    // Handle empty strings
    if let Ok((input, _)) = char::<_, nom::error::Error<_>>('"')(input) {
        return Ok((input, quoted_codes("")));
    }

    let (input, content) = escaped(none_of("\"\\"), '\\', one_of("\"n"))(input)?;
    let (input, _) = char('"')(input)?;

    // Process escape sequences
    let mut result = String::new();
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('"') => result.push('"'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }

    Ok((input, quoted_codes(&result)))
}

fn quoted_codes(text: &str) -> Sexpr {
    let codes = text.chars().map(|c| Sexpr::Integer(c as i64)).collect();
    Sexpr::List(vec![Sexpr::symbol("quote"), Sexpr::List(codes)])
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!$%&*+./:<=>?\"@^_~-".contains(c)
}

/// Parse a bare token and classify it: an integer, `nil`, or a symbol.
fn parse_token(input: &str) -> IResult<&str, Sexpr> {
    let (input, token) = take_while1(is_token_char)(input)?;

    let numeric_start = token
        .chars()
        .next()
        .is_some_and(|c| c == '-' || c.is_ascii_digit());
    if numeric_start {
        if let Ok(n) = token.parse::<i64>() {
            return Ok((input, Sexpr::Integer(n)));
        }
    }
    if token == "nil" {
        return Ok((input, Sexpr::Nil));
    }
    Ok((input, Sexpr::Symbol(token.to_string())))
}

/// Parse a quoted expression: 'expr -> (quote expr)
fn parse_quote(input: &str) -> IResult<&str, Sexpr> {
    let (input, _) = char('\'')(input)?;
    let (input, expr) = parse_expr(input)?;
    Ok((input, Sexpr::List(vec![Sexpr::symbol("quote"), expr])))
}

/// Parse a list: (expr1 expr2 ...)
/// The empty list () reads as nil.
fn parse_list(input: &str) -> IResult<&str, Sexpr> {
    let (input, _) = char('(')(input)?;

    let mut items = Vec::new();
    let mut remaining = input;

    loop {
        let (rest, _) = ws_and_comments(remaining)?;
        if let Ok((rest, _)) = char::<_, nom::error::Error<_>>(')')(rest) {
            if items.is_empty() {
                return Ok((rest, Sexpr::Nil));
            }
            return Ok((rest, Sexpr::List(items)));
        }

        let (rest, expr) = parse_expr(rest)?;
        items.push(expr);
        remaining = rest;
    }
}

/// Main expression parser - tries all alternatives
fn parse_expr(input: &str) -> IResult<&str, Sexpr> {
    let (input, _) = ws_and_comments(input)?;
    alt((
        parse_quote,
        parse_list,
        parse_character,
        parse_boolean,
        parse_string,
        parse_token,
    ))
    .parse(input)
}

/// Public entry point: parse a whole source text into its top-level forms.
pub fn parse(input: &str) -> Result<Vec<Sexpr>, Error> {
    let mut forms = Vec::new();
    let mut remaining = input;

    loop {
        let (rest, _) = ws_and_comments(remaining).unwrap_or((remaining, ()));
        if rest.is_empty() {
            break;
        }
        match parse_expr(rest) {
            Ok((rest, expr)) => {
                forms.push(expr);
                remaining = rest;
            }
            Err(_) => {
                let snippet: String = rest.chars().take(24).collect();
                return Err(Error::Parse(format!("unexpected input at '{}'", snippet)));
            }
        }
    }

    Ok(forms)
}
