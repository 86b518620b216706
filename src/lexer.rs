//! Tokenizer for Rex source text.
//!
//! Raw tokenization is handled entirely by logos. Comments and whitespace are
//! recognized like any other token and then dropped, unless the caller asks
//! to keep them (useful when the lexer serves as a general-purpose scanner).

use std::fmt;
use std::ops::Range;

use log::trace;
use logos::Logos;

use crate::error::{Error, Result};

#[derive(Logos, Debug, Clone, PartialEq)]
pub enum TokenKind {
    #[regex(r"'([^'\\\n]|\\u[0-9a-fA-F]{4}|\\[^\n])'", |lex| character(lex.slice()))]
    CharacterLiteral(char),

    // Kept as text; the parser decides what an out-of-range value means.
    #[regex(r"[0-9]+", |lex| lex.slice().to_string())]
    Integer(String),

    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*", |lex| lex.slice().to_string())]
    Identifier(String),

    #[regex(r"/([^/\\\n]|\\[^\n])+/", |lex| regex_body(lex.slice()))]
    RegexLiteral(String),

    #[regex(r#""([^"\\\n]|\\[^\n])*""#, |lex| string(lex.slice()))]
    StringLiteral(String),

    #[regex(r"[&(),<>\[\]{|}]", |lex| lex.slice().chars().next())]
    Separator(char),

    #[regex(r"[%*+=?]", |lex| lex.slice().chars().next())]
    Operator(char),

    #[regex(r"//[^\n]*", priority = 10)]
    EndOfLineComment,

    // Wins over a regex literal of the same length, e.g. `/* a */`.
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/", priority = 10)]
    BlockComment,

    #[regex(r"[ \t\r\n\x0C]+")]
    Whitespace,
}

impl TokenKind {
    /// Comments and whitespace.
    pub fn is_ignorable(&self) -> bool {
        matches!(
            self,
            TokenKind::EndOfLineComment | TokenKind::BlockComment | TokenKind::Whitespace
        )
    }

    pub(crate) fn is_separator(&self, c: char) -> bool {
        *self == TokenKind::Separator(c)
    }

    pub(crate) fn is_operator(&self, c: char) -> bool {
        *self == TokenKind::Operator(c)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::CharacterLiteral(c) => write!(f, "character literal {c:?}"),
            TokenKind::Integer(digits) => write!(f, "integer {digits}"),
            TokenKind::Identifier(name) => write!(f, "identifier {name}"),
            TokenKind::RegexLiteral(pattern) => write!(f, "regex literal /{pattern}/"),
            TokenKind::StringLiteral(text) => write!(f, "string literal {text:?}"),
            TokenKind::Separator(c) | TokenKind::Operator(c) => write!(f, "'{c}'"),
            TokenKind::EndOfLineComment => f.write_str("end-of-line comment"),
            TokenKind::BlockComment => f.write_str("block comment"),
            TokenKind::Whitespace => f.write_str("whitespace"),
        }
    }
}

/// Byte offset plus 1-based line and column (columns count characters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Maps byte offsets of one source text to positions.
struct LineIndex<'s> {
    source: &'s str,
    line_starts: Vec<usize>,
}

impl<'s> LineIndex<'s> {
    fn new(source: &'s str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            source,
            line_starts,
        }
    }

    fn position(&self, offset: usize) -> Position {
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let start = self.line_starts[line];
        let column = self.source[start..offset].chars().count() + 1;
        Position {
            offset,
            line: line + 1,
            column,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
    pub position: Position,
}

impl Token {
    pub fn is_ignorable(&self) -> bool {
        self.kind.is_ignorable()
    }

    /// The source text this token was scanned from.
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.span.clone()]
    }
}

pub struct Lexer<'s> {
    source: &'s str,
    retain_ignorable: bool,
}

impl<'s> Lexer<'s> {
    pub fn new(source: &'s str) -> Self {
        Self {
            source,
            retain_ignorable: false,
        }
    }

    /// Keep comments and whitespace in the output instead of dropping them.
    pub fn retain_ignorable(mut self, retain: bool) -> Self {
        self.retain_ignorable = retain;
        self
    }

    /// Scans the whole source, failing at the first unscannable position.
    pub fn tokenize(&self) -> Result<Vec<Token>> {
        let lines = LineIndex::new(self.source);
        let mut lexer = TokenKind::lexer(self.source);
        let mut tokens = Vec::new();

        while let Some(result) = lexer.next() {
            let span = lexer.span();
            let position = lines.position(span.start);
            let Ok(kind) = result else {
                return Err(Error::Lexical {
                    position,
                    found: lexer.slice().to_string(),
                });
            };
            if kind.is_ignorable() && !self.retain_ignorable {
                continue;
            }
            tokens.push(Token {
                kind,
                span,
                position,
            });
        }

        trace!("scanned {} tokens from {} bytes", tokens.len(), self.source.len());
        Ok(tokens)
    }

    /// Position just past the last character, for errors at end of input.
    pub(crate) fn end_position(&self) -> Position {
        LineIndex::new(self.source).position(self.source.len())
    }
}

/// Tokenize `source`, dropping comments and whitespace.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).tokenize()
}

fn character(slice: &str) -> Option<char> {
    let text = unescape(&slice[1..slice.len() - 1])?;
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn string(slice: &str) -> Option<String> {
    unescape(&slice[1..slice.len() - 1])
}

/// Decodes `\n \t \r \0 \\ \' \" \uXXXX`; any other escape is invalid.
fn unescape(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let decoded = match chars.next()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            c @ ('\\' | '\'' | '"') => c,
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                if hex.len() != 4 {
                    return None;
                }
                char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?
            }
            _ => return None,
        };
        out.push(decoded);
    }
    Some(out)
}

/// Strips the slashes and turns `\/` back into `/`; other escapes are
/// left for the regex engine.
fn regex_body(slice: &str) -> String {
    let body = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('/') => out.push('/'),
            Some(escaped) => {
                out.push('\\');
                out.push(escaped);
            }
            None => out.push('\\'),
        }
    }
    out
}
