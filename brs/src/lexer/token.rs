//! Token definitions

use crate::ast::{Literal, Location};
use logos::Logos;
use serde::{Deserialize, Serialize};

/// Raw token classes recognized by the logos automaton.
///
/// Keywords, comments introduced by `rem`, strings and directive arguments
/// need context and are resolved by the scanner in `lexer::scan`.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r"'[^\r\n]*")]
pub(crate) enum RawToken {
    #[regex(r"\r?\n")]
    Newline,
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*[$%!#&]?")]
    Word,
    #[regex(r"#[A-Za-z_]+")]
    Directive,
    #[regex(r"[0-9]+[%&!#]?")]
    Integer,
    #[regex(r"&[hH][0-9A-Fa-f]+&?")]
    Hex,
    #[regex(r"[0-9]*\.[0-9]+([eEdD][+-]?[0-9]+)?[!#]?")]
    #[regex(r"[0-9]+[eEdD][+-]?[0-9]+[!#]?")]
    Decimal,
    #[token("\"")]
    Quote,

    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("[")]
    LeftSquare,
    #[token("]")]
    RightSquare,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("^")]
    Caret,
    #[token("-")]
    Minus,
    #[token("+")]
    Plus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("\\")]
    Backslash,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("<<")]
    LeftShift,
    #[token(">>")]
    RightShift,
    #[token("-=")]
    MinusEqual,
    #[token("+=")]
    PlusEqual,
    #[token("*=")]
    StarEqual,
    #[token("/=")]
    SlashEqual,
    #[token("\\=")]
    BackslashEqual,
    #[token("<<=")]
    LeftShiftEqual,
    #[token(">>=")]
    RightShiftEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("=")]
    Equal,
    #[token("<>")]
    LessGreater,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("@")]
    AtSymbol,
    #[token("?")]
    Question,
    #[token("?.")]
    QuestionDot,
    #[token("?[")]
    QuestionLeftSquare,
}

/// Kind of a scanned token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lexeme {
    // Delimiters
    LeftParen,
    RightParen,
    LeftSquare,
    RightSquare,
    LeftBrace,
    RightBrace,

    // Operators
    Caret,
    Minus,
    Plus,
    Star,
    Slash,
    Mod,
    Backslash,
    PlusPlus,
    MinusMinus,
    LeftShift,
    RightShift,
    MinusEqual,
    PlusEqual,
    StarEqual,
    SlashEqual,
    BackslashEqual,
    LeftShiftEqual,
    RightShiftEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    LessGreater,

    // Literals and names
    Identifier,
    String,
    Integer,
    LongInteger,
    Float,
    Double,

    // Punctuation
    Dot,
    Comma,
    Colon,
    Semicolon,
    AtSymbol,
    QuestionDot,
    QuestionLeftSquare,

    // Preprocessor directives
    HashIf,
    HashElseIf,
    HashElse,
    HashEndIf,
    HashConst,
    HashError,
    HashErrorMessage,

    // Keywords
    And,
    Catch,
    ContinueFor,
    ContinueWhile,
    Dim,
    Else,
    ElseIf,
    End,
    EndFunction,
    EndFor,
    EndIf,
    EndSub,
    EndTry,
    EndWhile,
    Exit,
    ExitFor,
    ExitWhile,
    False,
    For,
    ForEach,
    Function,
    Goto,
    If,
    Invalid,
    Next,
    Not,
    Or,
    Print,
    Return,
    Step,
    Stop,
    Sub,
    Then,
    Throw,
    To,
    True,
    Try,
    While,

    Newline,
    Eof,
}

impl Lexeme {
    /// Classify a lowercased word as a reserved word
    pub fn keyword(word: &str) -> Option<Lexeme> {
        let kind = match word {
            "and" => Lexeme::And,
            "catch" => Lexeme::Catch,
            "dim" => Lexeme::Dim,
            "else" => Lexeme::Else,
            "elseif" => Lexeme::ElseIf,
            "end" => Lexeme::End,
            "endfunction" => Lexeme::EndFunction,
            "endfor" => Lexeme::EndFor,
            "endif" => Lexeme::EndIf,
            "endsub" => Lexeme::EndSub,
            "endtry" => Lexeme::EndTry,
            "endwhile" => Lexeme::EndWhile,
            "exit" => Lexeme::Exit,
            "exitfor" => Lexeme::ExitFor,
            "exitwhile" => Lexeme::ExitWhile,
            "false" => Lexeme::False,
            "for" => Lexeme::For,
            "foreach" => Lexeme::ForEach,
            "function" => Lexeme::Function,
            "goto" => Lexeme::Goto,
            "if" => Lexeme::If,
            "invalid" => Lexeme::Invalid,
            "mod" => Lexeme::Mod,
            "next" => Lexeme::Next,
            "not" => Lexeme::Not,
            "or" => Lexeme::Or,
            "print" => Lexeme::Print,
            "return" => Lexeme::Return,
            "step" => Lexeme::Step,
            "stop" => Lexeme::Stop,
            "sub" => Lexeme::Sub,
            "then" => Lexeme::Then,
            "throw" => Lexeme::Throw,
            "to" => Lexeme::To,
            "true" => Lexeme::True,
            "try" => Lexeme::Try,
            "while" => Lexeme::While,
            _ => return None,
        };
        Some(kind)
    }

    /// Two-word keywords: `end if`, `exit while`, `else if`, `for each`, ...
    pub fn merge(first: Lexeme, first_text: &str, second: &str) -> Option<Lexeme> {
        let merged = match (first, second) {
            (Lexeme::End, "if") => Lexeme::EndIf,
            (Lexeme::End, "function") => Lexeme::EndFunction,
            (Lexeme::End, "sub") => Lexeme::EndSub,
            (Lexeme::End, "while") => Lexeme::EndWhile,
            (Lexeme::End, "for") => Lexeme::EndFor,
            (Lexeme::End, "try") => Lexeme::EndTry,
            (Lexeme::Exit, "for") => Lexeme::ExitFor,
            (Lexeme::Exit, "while") => Lexeme::ExitWhile,
            (Lexeme::Else, "if") => Lexeme::ElseIf,
            (Lexeme::For, "each") => Lexeme::ForEach,
            (Lexeme::Identifier, "for") if first_text.eq_ignore_ascii_case("continue") => {
                Lexeme::ContinueFor
            }
            (Lexeme::Identifier, "while") if first_text.eq_ignore_ascii_case("continue") => {
                Lexeme::ContinueWhile
            }
            _ => return None,
        };
        Some(merged)
    }

    /// Tokens that end a statement
    pub fn is_terminator(self) -> bool {
        matches!(self, Lexeme::Newline | Lexeme::Colon | Lexeme::Eof)
    }
}

impl std::fmt::Display for Lexeme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Lexeme::LeftParen => "(",
            Lexeme::RightParen => ")",
            Lexeme::LeftSquare => "[",
            Lexeme::RightSquare => "]",
            Lexeme::LeftBrace => "{",
            Lexeme::RightBrace => "}",
            Lexeme::Caret => "^",
            Lexeme::Minus => "-",
            Lexeme::Plus => "+",
            Lexeme::Star => "*",
            Lexeme::Slash => "/",
            Lexeme::Mod => "mod",
            Lexeme::Backslash => "\\",
            Lexeme::PlusPlus => "++",
            Lexeme::MinusMinus => "--",
            Lexeme::LeftShift => "<<",
            Lexeme::RightShift => ">>",
            Lexeme::MinusEqual => "-=",
            Lexeme::PlusEqual => "+=",
            Lexeme::StarEqual => "*=",
            Lexeme::SlashEqual => "/=",
            Lexeme::BackslashEqual => "\\=",
            Lexeme::LeftShiftEqual => "<<=",
            Lexeme::RightShiftEqual => ">>=",
            Lexeme::Less => "<",
            Lexeme::LessEqual => "<=",
            Lexeme::Greater => ">",
            Lexeme::GreaterEqual => ">=",
            Lexeme::Equal => "=",
            Lexeme::LessGreater => "<>",
            Lexeme::Identifier => "identifier",
            Lexeme::String => "string literal",
            Lexeme::Integer => "integer literal",
            Lexeme::LongInteger => "long integer literal",
            Lexeme::Float => "float literal",
            Lexeme::Double => "double literal",
            Lexeme::Dot => ".",
            Lexeme::Comma => ",",
            Lexeme::Colon => ":",
            Lexeme::Semicolon => ";",
            Lexeme::AtSymbol => "@",
            Lexeme::QuestionDot => "?.",
            Lexeme::QuestionLeftSquare => "?[",
            Lexeme::HashIf => "#if",
            Lexeme::HashElseIf => "#else if",
            Lexeme::HashElse => "#else",
            Lexeme::HashEndIf => "#end if",
            Lexeme::HashConst => "#const",
            Lexeme::HashError => "#error",
            Lexeme::HashErrorMessage => "#error message",
            Lexeme::And => "and",
            Lexeme::Catch => "catch",
            Lexeme::ContinueFor => "continue for",
            Lexeme::ContinueWhile => "continue while",
            Lexeme::Dim => "dim",
            Lexeme::Else => "else",
            Lexeme::ElseIf => "else if",
            Lexeme::End => "end",
            Lexeme::EndFunction => "end function",
            Lexeme::EndFor => "end for",
            Lexeme::EndIf => "end if",
            Lexeme::EndSub => "end sub",
            Lexeme::EndTry => "end try",
            Lexeme::EndWhile => "end while",
            Lexeme::Exit => "exit",
            Lexeme::ExitFor => "exit for",
            Lexeme::ExitWhile => "exit while",
            Lexeme::False => "false",
            Lexeme::For => "for",
            Lexeme::ForEach => "for each",
            Lexeme::Function => "function",
            Lexeme::Goto => "goto",
            Lexeme::If => "if",
            Lexeme::Invalid => "invalid",
            Lexeme::Next => "next",
            Lexeme::Not => "not",
            Lexeme::Or => "or",
            Lexeme::Print => "print",
            Lexeme::Return => "return",
            Lexeme::Step => "step",
            Lexeme::Stop => "stop",
            Lexeme::Sub => "sub",
            Lexeme::Then => "then",
            Lexeme::Throw => "throw",
            Lexeme::To => "to",
            Lexeme::True => "true",
            Lexeme::Try => "try",
            Lexeme::While => "while",
            Lexeme::Newline => "newline",
            Lexeme::Eof => "end of file",
        };
        write!(f, "{text}")
    }
}

/// A scanned token with its source text and location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: Lexeme,
    pub text: String,
    pub literal: Option<Literal>,
    pub loc: Location,
}

impl Token {
    pub fn new(kind: Lexeme, text: impl Into<String>, loc: Location) -> Self {
        Self {
            kind,
            text: text.into(),
            literal: None,
            loc,
        }
    }

    pub fn with_literal(mut self, literal: Literal) -> Self {
        self.literal = Some(literal);
        self
    }

    /// Does this token read as the (non-reserved) word `word`?
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == Lexeme::Identifier && self.text.eq_ignore_ascii_case(word)
    }
}
