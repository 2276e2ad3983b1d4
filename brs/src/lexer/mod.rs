//! Lexer implementation using logos

mod token;

pub use token::{Lexeme, Token};

use crate::ast::{Literal, Location, Position};
use crate::error::CompileError;
use logos::Logos;
use std::sync::Arc;
use token::RawToken;

/// Output of [`scan`]: every token that could be read plus every lexical error
#[derive(Debug, Default)]
pub struct ScanResults {
    pub tokens: Vec<Token>,
    pub errors: Vec<CompileError>,
}

/// Maps byte offsets to line/column positions
struct LineIndex<'a> {
    source: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(source: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { source, starts }
    }

    fn position(&self, offset: usize) -> Position {
        let line = match self.starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let start = self.starts[line];
        let column = self.source[start..offset].chars().count();
        Position::new(line as u32 + 1, column as u32)
    }
}

/// Tokenize `source`, collecting errors instead of stopping at the first one
pub fn scan(source: &str, filename: &str) -> ScanResults {
    let file: Arc<str> = Arc::from(filename);
    let index = LineIndex::new(source);
    let location = |start: usize, end: usize| {
        Location::new(Arc::clone(&file), index.position(start), index.position(end))
    };

    let mut results = ScanResults::default();
    let mut lexer = RawToken::lexer(source);

    while let Some(raw) = lexer.next() {
        let span = lexer.span();
        let text = lexer.slice();
        let raw = match raw {
            Ok(raw) => raw,
            Err(_) => {
                results.errors.push(CompileError::lexer(
                    format!("Unexpected character '{text}'"),
                    location(span.start, span.end),
                ));
                continue;
            }
        };

        let token = match raw {
            RawToken::Newline => Token::new(Lexeme::Newline, text, location(span.start, span.end)),
            RawToken::Quote => {
                let (consumed, value, terminated) = scan_string(lexer.remainder());
                lexer.bump(consumed);
                let end = span.end + consumed;
                if !terminated {
                    results.errors.push(CompileError::lexer(
                        "Unterminated string at end of line",
                        location(span.start, end),
                    ));
                    continue;
                }
                Token::new(Lexeme::String, &source[span.start..end], location(span.start, end))
                    .with_literal(Literal::Str(value))
            }
            RawToken::Word => {
                let lower = text.to_ascii_lowercase();
                if lower == "rem" {
                    let rest = lexer.remainder();
                    lexer.bump(rest.find(['\r', '\n']).unwrap_or(rest.len()));
                    continue;
                }
                let first = Lexeme::keyword(&lower).unwrap_or(Lexeme::Identifier);
                if let Some((consumed, second)) = peek_word(lexer.remainder()) {
                    if let Some(merged) = Lexeme::merge(first, text, &second) {
                        lexer.bump(consumed);
                        let end = span.end + consumed;
                        results.tokens.push(Token::new(
                            merged,
                            &source[span.start..end],
                            location(span.start, end),
                        ));
                        continue;
                    }
                }
                let token = Token::new(first, text, location(span.start, span.end));
                match first {
                    Lexeme::True => token.with_literal(Literal::Bool(true)),
                    Lexeme::False => token.with_literal(Literal::Bool(false)),
                    Lexeme::Invalid => token.with_literal(Literal::Invalid),
                    _ => token,
                }
            }
            RawToken::Directive => {
                let lower = text.to_ascii_lowercase();
                let merged_if = peek_word(lexer.remainder()).filter(|(_, w)| w == "if");
                let kind = match (lower.as_str(), merged_if) {
                    ("#if", _) => Lexeme::HashIf,
                    ("#elseif", _) => Lexeme::HashElseIf,
                    ("#endif", _) => Lexeme::HashEndIf,
                    ("#const", _) => Lexeme::HashConst,
                    ("#error", _) => Lexeme::HashError,
                    ("#else", Some((consumed, _))) => {
                        lexer.bump(consumed);
                        Lexeme::HashElseIf
                    }
                    ("#else", None) => Lexeme::HashElse,
                    ("#end", Some((consumed, _))) => {
                        lexer.bump(consumed);
                        Lexeme::HashEndIf
                    }
                    _ => {
                        results.errors.push(CompileError::lexer(
                            format!("Unknown preprocessor directive '{text}'"),
                            location(span.start, span.end),
                        ));
                        continue;
                    }
                };
                let end = lexer.span().end;
                results.tokens.push(Token::new(
                    kind,
                    &source[span.start..end],
                    location(span.start, end),
                ));
                if kind == Lexeme::HashError {
                    let rest = lexer.remainder();
                    let len = rest.find(['\r', '\n']).unwrap_or(rest.len());
                    let message_start = end;
                    lexer.bump(len);
                    results.tokens.push(Token::new(
                        Lexeme::HashErrorMessage,
                        rest[..len].trim(),
                        location(message_start, message_start + len),
                    ));
                }
                continue;
            }
            RawToken::Integer => {
                let literal = integer_literal(text);
                number_token(literal, text, location(span.start, span.end))
            }
            RawToken::Hex => {
                let literal = hex_literal(text);
                number_token(literal, text, location(span.start, span.end))
            }
            RawToken::Decimal => {
                let literal = decimal_literal(text);
                number_token(literal, text, location(span.start, span.end))
            }
            RawToken::Question => {
                Token::new(Lexeme::Print, text, location(span.start, span.end))
            }
            other => {
                let kind = operator_kind(other);
                Token::new(kind, text, location(span.start, span.end))
            }
        };
        results.tokens.push(token);
    }

    let end = location(source.len(), source.len());
    results.tokens.push(Token::new(Lexeme::Eof, "", end));
    log::debug!(
        "scanned {filename}: {} tokens, {} errors",
        results.tokens.len(),
        results.errors.len()
    );
    results
}

/// Scan the body of a string literal after the opening quote.
/// Returns (bytes consumed, value, terminated).
fn scan_string(rest: &str) -> (usize, String, bool) {
    let mut value = String::new();
    let mut chars = rest.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                if let Some((_, '"')) = chars.peek() {
                    chars.next();
                    value.push('"');
                } else {
                    return (i + 1, value, true);
                }
            }
            '\r' | '\n' => return (i, value, false),
            c => value.push(c),
        }
    }
    (rest.len(), value, false)
}

/// Look past spaces/tabs for a following word on the same line.
/// Returns (bytes to consume including the word, lowercased word).
fn peek_word(rest: &str) -> Option<(usize, String)> {
    let trimmed = rest.trim_start_matches([' ', '\t']);
    let skipped = rest.len() - trimmed.len();
    if skipped == 0 {
        return None;
    }
    let len = trimmed
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(trimmed.len());
    if len == 0 {
        return None;
    }
    Some((skipped + len, trimmed[..len].to_ascii_lowercase()))
}

fn number_token(literal: Literal, text: &str, loc: Location) -> Token {
    let kind = match literal {
        Literal::Int32(_) => Lexeme::Integer,
        Literal::Int64(_) => Lexeme::LongInteger,
        Literal::Float(_) => Lexeme::Float,
        _ => Lexeme::Double,
    };
    Token::new(kind, text, loc).with_literal(literal)
}

fn integer_literal(text: &str) -> Literal {
    let (digits, suffix) = split_suffix(text);
    let parsed = digits.parse::<i64>();
    match (suffix, parsed) {
        (Some('%'), Ok(n)) => Literal::Int32(n as i32),
        (Some('&'), Ok(n)) => Literal::Int64(n),
        (Some('!'), _) => Literal::Float(digits.parse::<f32>().unwrap_or(f32::INFINITY)),
        (Some('#'), _) => Literal::Double(digits.parse::<f64>().unwrap_or(f64::INFINITY)),
        (_, Ok(n)) => match i32::try_from(n) {
            Ok(small) => Literal::Int32(small),
            Err(_) => Literal::Int64(n),
        },
        (_, Err(_)) => Literal::Double(digits.parse::<f64>().unwrap_or(f64::INFINITY)),
    }
}

fn hex_literal(text: &str) -> Literal {
    let body = &text[2..];
    let (digits, long) = match body.strip_suffix('&') {
        Some(d) => (d, true),
        None => (body, false),
    };
    let value = u64::from_str_radix(digits, 16).unwrap_or(u64::MAX);
    if long {
        Literal::Int64(value as i64)
    } else if let Ok(small) = u32::try_from(value) {
        Literal::Int32(small as i32)
    } else {
        Literal::Int64(value as i64)
    }
}

fn decimal_literal(text: &str) -> Literal {
    let (body, suffix) = split_suffix(text);
    let has_d_exponent = body.contains(['d', 'D']);
    let normalized = body.replace(['d', 'D'], "e");
    let value = normalized.parse::<f64>().unwrap_or(0.0);
    let mantissa = normalized.split(['e', 'E']).next().unwrap_or("");
    let significant = mantissa
        .chars()
        .filter(char::is_ascii_digit)
        .skip_while(|&c| c == '0')
        .count();
    match suffix {
        Some('#') => Literal::Double(value),
        Some('!') => Literal::Float(value as f32),
        _ if has_d_exponent || significant > 7 => Literal::Double(value),
        _ => Literal::Float(value as f32),
    }
}

fn split_suffix(text: &str) -> (&str, Option<char>) {
    match text.chars().last() {
        Some(c @ ('%' | '&' | '!' | '#')) => (&text[..text.len() - 1], Some(c)),
        _ => (text, None),
    }
}

fn operator_kind(raw: RawToken) -> Lexeme {
    match raw {
        RawToken::LeftParen => Lexeme::LeftParen,
        RawToken::RightParen => Lexeme::RightParen,
        RawToken::LeftSquare => Lexeme::LeftSquare,
        RawToken::RightSquare => Lexeme::RightSquare,
        RawToken::LeftBrace => Lexeme::LeftBrace,
        RawToken::RightBrace => Lexeme::RightBrace,
        RawToken::Caret => Lexeme::Caret,
        RawToken::Minus => Lexeme::Minus,
        RawToken::Plus => Lexeme::Plus,
        RawToken::Star => Lexeme::Star,
        RawToken::Slash => Lexeme::Slash,
        RawToken::Backslash => Lexeme::Backslash,
        RawToken::PlusPlus => Lexeme::PlusPlus,
        RawToken::MinusMinus => Lexeme::MinusMinus,
        RawToken::LeftShift => Lexeme::LeftShift,
        RawToken::RightShift => Lexeme::RightShift,
        RawToken::MinusEqual => Lexeme::MinusEqual,
        RawToken::PlusEqual => Lexeme::PlusEqual,
        RawToken::StarEqual => Lexeme::StarEqual,
        RawToken::SlashEqual => Lexeme::SlashEqual,
        RawToken::BackslashEqual => Lexeme::BackslashEqual,
        RawToken::LeftShiftEqual => Lexeme::LeftShiftEqual,
        RawToken::RightShiftEqual => Lexeme::RightShiftEqual,
        RawToken::Less => Lexeme::Less,
        RawToken::LessEqual => Lexeme::LessEqual,
        RawToken::Greater => Lexeme::Greater,
        RawToken::GreaterEqual => Lexeme::GreaterEqual,
        RawToken::Equal => Lexeme::Equal,
        RawToken::LessGreater => Lexeme::LessGreater,
        RawToken::Dot => Lexeme::Dot,
        RawToken::Comma => Lexeme::Comma,
        RawToken::Colon => Lexeme::Colon,
        RawToken::Semicolon => Lexeme::Semicolon,
        RawToken::AtSymbol => Lexeme::AtSymbol,
        RawToken::QuestionDot => Lexeme::QuestionDot,
        RawToken::QuestionLeftSquare => Lexeme::QuestionLeftSquare,
        RawToken::Question => Lexeme::Print,
        RawToken::Newline => Lexeme::Newline,
        RawToken::Word => Lexeme::Identifier,
        RawToken::Directive => Lexeme::HashIf,
        RawToken::Integer | RawToken::Hex => Lexeme::Integer,
        RawToken::Decimal => Lexeme::Float,
        RawToken::Quote => Lexeme::String,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Lexeme> {
        let results = scan(source, "test.brs");
        assert!(results.errors.is_empty(), "unexpected errors: {:?}", results.errors);
        results.tokens.iter().map(|t| t.kind).collect()
    }

    fn literal(source: &str) -> Literal {
        let results = scan(source, "test.brs");
        results.tokens[0].literal.clone().unwrap()
    }

    #[test]
    fn test_scan_empty() {
        assert_eq!(kinds(""), vec![Lexeme::Eof]);
    }

    #[test]
    fn test_scan_keywords_case_insensitive() {
        assert_eq!(
            kinds("IF Then ELSE while"),
            vec![Lexeme::If, Lexeme::Then, Lexeme::Else, Lexeme::While, Lexeme::Eof]
        );
    }

    #[test]
    fn test_scan_two_word_keywords() {
        assert_eq!(
            kinds("end if\nEnd   Function\nexit while\nelse if\nfor each\ncontinue for"),
            vec![
                Lexeme::EndIf,
                Lexeme::Newline,
                Lexeme::EndFunction,
                Lexeme::Newline,
                Lexeme::ExitWhile,
                Lexeme::Newline,
                Lexeme::ElseIf,
                Lexeme::Newline,
                Lexeme::ForEach,
                Lexeme::Newline,
                Lexeme::ContinueFor,
                Lexeme::Eof
            ]
        );
    }

    #[test]
    fn test_scan_end_alone() {
        assert_eq!(kinds("end\n"), vec![Lexeme::End, Lexeme::Newline, Lexeme::Eof]);
    }

    #[test]
    fn test_scan_operators() {
        assert_eq!(
            kinds("+ - * / \\ ^ mod <> <= >= << >> += ++"),
            vec![
                Lexeme::Plus,
                Lexeme::Minus,
                Lexeme::Star,
                Lexeme::Slash,
                Lexeme::Backslash,
                Lexeme::Caret,
                Lexeme::Mod,
                Lexeme::LessGreater,
                Lexeme::LessEqual,
                Lexeme::GreaterEqual,
                Lexeme::LeftShift,
                Lexeme::RightShift,
                Lexeme::PlusEqual,
                Lexeme::PlusPlus,
                Lexeme::Eof
            ]
        );
    }

    #[test]
    fn test_scan_question_is_print() {
        assert_eq!(kinds("? 1"), vec![Lexeme::Print, Lexeme::Integer, Lexeme::Eof]);
    }

    #[test]
    fn test_scan_comments() {
        assert_eq!(
            kinds("x = 1 ' trailing\nREM whole line\ny"),
            vec![
                Lexeme::Identifier,
                Lexeme::Equal,
                Lexeme::Integer,
                Lexeme::Newline,
                Lexeme::Newline,
                Lexeme::Identifier,
                Lexeme::Eof
            ]
        );
    }

    #[test]
    fn test_scan_rem_prefix_is_identifier() {
        let results = scan("remaining = 1", "test.brs");
        assert_eq!(results.tokens[0].kind, Lexeme::Identifier);
        assert_eq!(results.tokens[0].text, "remaining");
    }

    #[test]
    fn test_scan_string_with_escaped_quote() {
        assert_eq!(literal(r#""say ""hi""""#), Literal::Str("say \"hi\"".to_string()));
    }

    #[test]
    fn test_scan_unterminated_string() {
        let results = scan("x = \"open\ny = 1", "test.brs");
        assert_eq!(results.errors.len(), 1);
        assert!(results.errors[0].message().contains("Unterminated string"));
        // scanning continues on the next line
        assert!(results.tokens.iter().any(|t| t.text == "y"));
    }

    #[test]
    fn test_scan_collects_multiple_errors() {
        let results = scan("a = `\nb = ~", "test.brs");
        assert_eq!(results.errors.len(), 2);
    }

    #[test]
    fn test_scan_integer_literals() {
        assert_eq!(literal("42"), Literal::Int32(42));
        assert_eq!(literal("42&"), Literal::Int64(42));
        assert_eq!(literal("3000000000"), Literal::Int64(3_000_000_000));
        assert_eq!(literal("7!"), Literal::Float(7.0));
        assert_eq!(literal("7#"), Literal::Double(7.0));
    }

    #[test]
    fn test_scan_hex_literals() {
        assert_eq!(literal("&hFF"), Literal::Int32(255));
        assert_eq!(literal("&HFFFFFFFF"), Literal::Int32(-1));
        assert_eq!(literal("&h10&"), Literal::Int64(16));
    }

    #[test]
    fn test_scan_float_literals() {
        assert_eq!(literal("1.5"), Literal::Float(1.5));
        assert_eq!(literal(".25"), Literal::Float(0.25));
        assert_eq!(literal("2.5#"), Literal::Double(2.5));
        assert_eq!(literal("1.23456789"), Literal::Double(1.23456789));
        assert_eq!(literal("1e3"), Literal::Float(1000.0));
        assert_eq!(literal("1d3"), Literal::Double(1000.0));
    }

    #[test]
    fn test_scan_bool_and_invalid_literals() {
        assert_eq!(literal("true"), Literal::Bool(true));
        assert_eq!(literal("FALSE"), Literal::Bool(false));
        assert_eq!(literal("invalid"), Literal::Invalid);
    }

    #[test]
    fn test_scan_identifier_with_designator() {
        let results = scan("name$ = \"x\"", "test.brs");
        assert_eq!(results.tokens[0].kind, Lexeme::Identifier);
        assert_eq!(results.tokens[0].text, "name$");
    }

    #[test]
    fn test_scan_directives() {
        assert_eq!(
            kinds("#if debug\n#else if other\n#else\n#end if\n#const x = true"),
            vec![
                Lexeme::HashIf,
                Lexeme::Identifier,
                Lexeme::Newline,
                Lexeme::HashElseIf,
                Lexeme::Identifier,
                Lexeme::Newline,
                Lexeme::HashElse,
                Lexeme::Newline,
                Lexeme::HashEndIf,
                Lexeme::Newline,
                Lexeme::HashConst,
                Lexeme::Identifier,
                Lexeme::Equal,
                Lexeme::True,
                Lexeme::Eof
            ]
        );
    }

    #[test]
    fn test_scan_hash_error_message() {
        let results = scan("#error  not supported here\n", "test.brs");
        assert_eq!(results.tokens[0].kind, Lexeme::HashError);
        assert_eq!(results.tokens[1].kind, Lexeme::HashErrorMessage);
        assert_eq!(results.tokens[1].text, "not supported here");
    }

    #[test]
    fn test_scan_locations() {
        let results = scan("x = 10\n  y", "test.brs");
        let x = &results.tokens[0];
        assert_eq!((x.loc.start, x.loc.end), (Position::new(1, 0), Position::new(1, 1)));
        let ten = &results.tokens[2];
        assert_eq!((ten.loc.start, ten.loc.end), (Position::new(1, 4), Position::new(1, 6)));
        let y = &results.tokens[4];
        assert_eq!((y.loc.start, y.loc.end), (Position::new(2, 2), Position::new(2, 3)));
    }

    #[test]
    fn test_scan_locations_monotonic() {
        let source = "function main()\n  a = [1, 2.5, \"s\"]\n  print a[0]; a.count()\nend function\n";
        let results = scan(source, "test.brs");
        assert!(results.errors.is_empty());
        for pair in results.tokens.windows(2) {
            assert!(pair[0].loc.start <= pair[0].loc.end);
            assert!(pair[0].loc.end <= pair[1].loc.start, "{:?} overlaps {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_scan_crlf_newlines() {
        assert_eq!(
            kinds("a\r\nb"),
            vec![Lexeme::Identifier, Lexeme::Newline, Lexeme::Identifier, Lexeme::Eof]
        );
    }

    #[test]
    fn test_scan_file_name_in_location() {
        let results = scan("x", "pkg:/source/main.brs");
        assert_eq!(&*results.tokens[0].loc.file, "pkg:/source/main.brs");
    }
}
