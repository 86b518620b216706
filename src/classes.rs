//! Built-in symbol classes.
//!
//! A class either tests one character with a host predicate, or applies one
//! anchored literal-format regex and consumes whatever it matched.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Error;

static UNICODE_IDENTIFIER_START: Lazy<Regex> = Lazy::new(|| anchored(r"\p{XID_Start}"));
static UNICODE_IDENTIFIER_PART: Lazy<Regex> = Lazy::new(|| anchored(r"\p{XID_Continue}"));
static CHARACTER_LITERAL: Lazy<Regex> =
    Lazy::new(|| anchored(r#"'(?:[^'\\\n]|\\u[0-9a-fA-F]{4}|\\[^\n])'"#));
static STRING_LITERAL: Lazy<Regex> = Lazy::new(|| anchored(r#""(?:[^"\\\n]|\\[^\n])*""#));
static END_OF_LINE_COMMENT: Lazy<Regex> = Lazy::new(|| anchored(r"//[^\n]*"));
static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| anchored(r"/\*(?s:.)*?\*/"));
static COMMENT_OR_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| anchored(r"(?:\s+|//[^\n]*|/\*(?s:.)*?\*/)+"));
static REGEX_LITERAL: Lazy<Regex> = Lazy::new(|| anchored(r"/(?:[^/\\\n]|\\[^\n])+/"));

fn anchored(pattern: &str) -> Regex {
    // Patterns are compile-time constants covered by the tests below.
    match Regex::new(&format!("^(?:{pattern})")) {
        Ok(regex) => regex,
        Err(err) => panic!("built-in pattern {pattern:?} does not compile: {err}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolClassKind {
    Digit,
    Letter,
    LetterOrDigit,
    UpperCase,
    LowerCase,
    Whitespace,
    IdentifierStart,
    IdentifierPart,
    UnicodeIdentifierStart,
    UnicodeIdentifierPart,
    CharacterLiteral,
    StringLiteral,
    EndOfLineComment,
    BlockComment,
    CommentOrWhitespace,
    RegexLiteral,
}

impl SymbolClassKind {
    pub const ALL: [SymbolClassKind; 16] = [
        SymbolClassKind::Digit,
        SymbolClassKind::Letter,
        SymbolClassKind::LetterOrDigit,
        SymbolClassKind::UpperCase,
        SymbolClassKind::LowerCase,
        SymbolClassKind::Whitespace,
        SymbolClassKind::IdentifierStart,
        SymbolClassKind::IdentifierPart,
        SymbolClassKind::UnicodeIdentifierStart,
        SymbolClassKind::UnicodeIdentifierPart,
        SymbolClassKind::CharacterLiteral,
        SymbolClassKind::StringLiteral,
        SymbolClassKind::EndOfLineComment,
        SymbolClassKind::BlockComment,
        SymbolClassKind::CommentOrWhitespace,
        SymbolClassKind::RegexLiteral,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SymbolClassKind::Digit => "Digit",
            SymbolClassKind::Letter => "Letter",
            SymbolClassKind::LetterOrDigit => "LetterOrDigit",
            SymbolClassKind::UpperCase => "UpperCase",
            SymbolClassKind::LowerCase => "LowerCase",
            SymbolClassKind::Whitespace => "Whitespace",
            SymbolClassKind::IdentifierStart => "IdentifierStart",
            SymbolClassKind::IdentifierPart => "IdentifierPart",
            SymbolClassKind::UnicodeIdentifierStart => "UnicodeIdentifierStart",
            SymbolClassKind::UnicodeIdentifierPart => "UnicodeIdentifierPart",
            SymbolClassKind::CharacterLiteral => "CharacterLiteral",
            SymbolClassKind::StringLiteral => "StringLiteral",
            SymbolClassKind::EndOfLineComment => "EndOfLineComment",
            SymbolClassKind::BlockComment => "BlockComment",
            SymbolClassKind::CommentOrWhitespace => "CommentOrWhitespace",
            SymbolClassKind::RegexLiteral => "RegexLiteral",
        }
    }

    /// Tries one occurrence at `index`, returning the offset after it.
    ///
    /// `index` must be a character boundary of `input`.
    pub fn match_once(self, input: &str, index: usize) -> Option<usize> {
        let rest = &input[index..];
        match self.predicate() {
            Some(predicate) => {
                let c = rest.chars().next()?;
                predicate(c).then(|| index + c.len_utf8())
            }
            None => {
                let found = self.literal_format()?.find(rest)?;
                Some(index + found.end())
            }
        }
    }

    fn predicate(self) -> Option<fn(char) -> bool> {
        let predicate: fn(char) -> bool = match self {
            // ASCII 0-9 only.
            SymbolClassKind::Digit => |c| c.is_ascii_digit(),
            SymbolClassKind::Letter => char::is_alphabetic,
            SymbolClassKind::LetterOrDigit => |c| c.is_alphabetic() || c.is_ascii_digit(),
            SymbolClassKind::UpperCase => char::is_uppercase,
            SymbolClassKind::LowerCase => char::is_lowercase,
            SymbolClassKind::Whitespace => char::is_whitespace,
            SymbolClassKind::IdentifierStart => |c| c.is_alphabetic() || c == '_' || c == '$',
            SymbolClassKind::IdentifierPart => {
                |c| c.is_alphabetic() || c.is_ascii_digit() || c == '_' || c == '$'
            }
            _ => return None,
        };
        Some(predicate)
    }

    fn literal_format(self) -> Option<&'static Regex> {
        let regex: &'static Regex = match self {
            SymbolClassKind::UnicodeIdentifierStart => &*UNICODE_IDENTIFIER_START,
            SymbolClassKind::UnicodeIdentifierPart => &*UNICODE_IDENTIFIER_PART,
            SymbolClassKind::CharacterLiteral => &*CHARACTER_LITERAL,
            SymbolClassKind::StringLiteral => &*STRING_LITERAL,
            SymbolClassKind::EndOfLineComment => &*END_OF_LINE_COMMENT,
            SymbolClassKind::BlockComment => &*BLOCK_COMMENT,
            SymbolClassKind::CommentOrWhitespace => &*COMMENT_OR_WHITESPACE,
            SymbolClassKind::RegexLiteral => &*REGEX_LITERAL,
            _ => return None,
        };
        Some(regex)
    }
}

impl fmt::Display for SymbolClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SymbolClassKind {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Error> {
        SymbolClassKind::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| Error::argument(format!("unknown symbol class %{name}")))
    }
}
