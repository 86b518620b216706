//! Rex: a small pattern language compiled into a tree of matchers.
//!
//! Patterns are parsed once into an [`Expression`] and then matched against
//! any number of inputs. Matching is greedy, never backtracks, and picks the
//! first alternative that succeeds. Every match yields a [`MatchResult`]
//! tree recording how the match was derived.

pub mod ast;
pub mod classes;
pub mod error;
pub mod lexer;
pub mod matcher;
pub mod parser;
mod resolver;
pub mod result;

use std::path::Path;

pub use ast::{
    Alternation, Concatenation, Expression, Group, GroupReference, GroupReferenceDefinition,
    Matcher, ReferenceKey, RegexLeaf, Repetition, Symbol, SymbolClass,
};
pub use classes::SymbolClassKind;
pub use error::{Error, Result};
pub use lexer::{tokenize, Lexer, Position, Token, TokenKind};
pub use parser::Parser;
pub use result::{LineSink, MatchResult};

/// Parse Rex source into a linked, ready-to-match expression.
pub fn parse(source: &str) -> Result<Expression> {
    Parser::new(source)?.parse()
}

/// Read a file and [`parse`] its contents.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Expression> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&source)
}

/// Whether `pattern` matches all of `input`.
pub fn is_match(input: &str, pattern: &str) -> Result<bool> {
    Ok(parse(pattern)?.matches(input).is_complete())
}
