use log::debug;

use crate::ast::{
    Alternation, Concatenation, Expression, Group, GroupReference, GroupReferenceDefinition,
    Matcher, ReferenceKey, RegexLeaf, Repetition, Symbol, SymbolClass,
};
use crate::error::{Error, Result};
use crate::lexer::{Lexer, Position, Token, TokenKind};

/// Recursive-descent parser for Rex source.
///
/// The `Parser` struct holds the significant tokens and the current position.
/// References are left unbound while parsing and linked once the whole tree
/// exists.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: Position,
}

impl Parser {
    /// Create a new parser for the given source, tokenizing it first.
    pub fn new(source: &str) -> Result<Self> {
        let lexer = Lexer::new(source);
        Ok(Self {
            tokens: lexer.tokenize()?,
            pos: 0,
            end: lexer.end_position(),
        })
    }

    /// Peek at the next token without advancing.
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|token| &token.kind)
    }

    /// Advance by one token and return it.
    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos)?.clone();
        self.pos += 1;
        Some(token)
    }

    /// Position of the next token, or of the end of input.
    fn position(&self) -> Position {
        self.tokens
            .get(self.pos)
            .map_or(self.end, |token| token.position)
    }

    fn unexpected(&self, expected: &str) -> Error {
        let found = match self.peek() {
            Some(kind) => kind.to_string(),
            None => "end of input".to_string(),
        };
        Error::syntax(self.position(), format!("expected {expected}, found {found}"))
    }

    /// Expect a specific separator and advance if it matches.
    fn expect_separator(&mut self, expected: char, context: &str) -> Result<Token> {
        match self.tokens.get(self.pos) {
            Some(token) if token.kind.is_separator(expected) => {
                let token = token.clone();
                self.pos += 1;
                Ok(token)
            }
            _ => Err(self.unexpected(&format!("'{expected}' {context}"))),
        }
    }

    /// Entry point: parse the whole source and link its references.
    ///
    /// Example:
    /// - Source: `'a' | 'b'` → Expression(Alternation[Concatenation['a'], Concatenation['b']])
    pub fn parse(&mut self) -> Result<Expression> {
        let root = self.parse_alt()?;
        if self.peek().is_some() {
            return Err(self.unexpected("'|' or end of input"));
        }
        let expression = Expression::new(root)?;
        debug!("parsed expression {expression}");
        Ok(expression)
    }

    /// Parse alternation (`|`).
    ///
    /// Example:
    /// - Source: `'a' | 'b' | 'c'` → Alternation[Concatenation['a'], Concatenation['b'], Concatenation['c']]
    /// - Source: `'a' 'b'` → Alternation[Concatenation['a', 'b']]
    fn parse_alt(&mut self) -> Result<Alternation> {
        let mut branches = vec![self.parse_seq()?];
        while self.peek().is_some_and(|kind| kind.is_separator('|')) {
            self.advance();
            branches.push(self.parse_seq()?);
        }
        Alternation::new(branches)
    }

    /// Parse a concatenation: matchers until the next token cannot start one.
    ///
    /// Example:
    /// - Source: `'a' ('b' | 'c') %Digit` → Concatenation['a', Group, SymbolClass]
    fn parse_seq(&mut self) -> Result<Concatenation> {
        let mut nodes = Vec::new();
        while self.peek().is_some_and(starts_matcher) {
            nodes.push(self.parse_atom()?);
        }
        if nodes.is_empty() {
            return Err(self.unexpected("a matcher"));
        }
        Concatenation::new(nodes)
    }

    /// Parse a single matcher, dispatching on the kind of the next token.
    ///
    /// Examples:
    /// - Source: `('a')+`      → Group
    /// - Source: `<0>?`        → GroupReference
    /// - Source: `<g>=('a')`   → GroupReferenceDefinition
    /// - Source: `'a'*`        → Symbol
    /// - Source: `"abc"`       → Regex (escaped literal)
    /// - Source: `/[a-z]+/`    → Regex
    /// - Source: `%Digit+`     → SymbolClass
    fn parse_atom(&mut self) -> Result<Matcher> {
        let position = self.position();
        match self.peek() {
            Some(TokenKind::Separator('(')) => Ok(self.parse_group()?.into()),
            Some(TokenKind::Separator('<')) => self.parse_reference(),
            Some(TokenKind::Operator('%')) => self.parse_symbol_class(),
            Some(TokenKind::CharacterLiteral(c)) => {
                let c = *c;
                self.advance();
                Ok(Symbol::new(c, self.parse_repetition()?).into())
            }
            Some(TokenKind::StringLiteral(text)) => {
                let leaf = RegexLeaf::literal(text);
                self.advance();
                Ok(leaf.map_err(|err| Error::syntax(position, err.to_string()))?.into())
            }
            Some(TokenKind::RegexLiteral(pattern)) => {
                let leaf = RegexLeaf::new(pattern);
                self.advance();
                Ok(leaf.map_err(|err| Error::syntax(position, err.to_string()))?.into())
            }
            _ => Err(self.unexpected("a matcher")),
        }
    }

    /// Parse a group, e.g. `('a' | 'b')*`.
    fn parse_group(&mut self) -> Result<Group> {
        self.expect_separator('(', "to open a group")?;
        let body = self.parse_alt()?;
        self.expect_separator(')', "to close a group")?;
        Ok(Group::new(body, self.parse_repetition()?))
    }

    /// Parse `<name>` or `<name>=(...)`.
    ///
    /// A following `=` makes it a definition, whose name must be an
    /// identifier; otherwise it is a reference with an optional repetition.
    ///
    /// Examples:
    /// - Source: `<0>+`          → GroupReference { key: Index(0), repetition: ONE_OR_MORE }
    /// - Source: `<word>`        → GroupReference { key: Name("word"), repetition: ONE }
    /// - Source: `<word>=('a')`  → GroupReferenceDefinition { name: "word", body: Group }
    fn parse_reference(&mut self) -> Result<Matcher> {
        self.expect_separator('<', "to open a reference")?;
        let name_position = self.position();
        let key = match self.peek() {
            // Digits too large for an index stay a key; resolution reports them.
            Some(TokenKind::Integer(digits)) => ReferenceKey::parse(digits),
            Some(TokenKind::Identifier(name)) => ReferenceKey::Name(name.as_str().into()),
            _ => return Err(self.unexpected("a group number or name")),
        };
        self.advance();
        self.expect_separator('>', "to close a reference")?;

        if !self.peek().is_some_and(|kind| kind.is_operator('=')) {
            let repetition = self.parse_repetition()?;
            return Ok(GroupReference::with_key(key, repetition).into());
        }

        let name = match key {
            ReferenceKey::Name(name) if !name.bytes().all(|b| b.is_ascii_digit()) => name,
            number => {
                return Err(Error::syntax(
                    name_position,
                    format!("a group definition needs a name, not the number {number}"),
                ))
            }
        };
        self.advance();
        if !self.peek().is_some_and(|kind| kind.is_separator('(')) {
            return Err(self.unexpected(&format!("a group after <{name}>=")));
        }
        let body = self.parse_group()?;
        Ok(GroupReferenceDefinition::new(&name, body)?.into())
    }

    /// Parse `%Name` with an optional repetition.
    fn parse_symbol_class(&mut self) -> Result<Matcher> {
        self.advance();
        let Some(TokenKind::Identifier(name)) = self.peek() else {
            return Err(self.unexpected("a symbol class name after '%'"));
        };
        let name = name.clone();
        self.advance();
        Ok(SymbolClass::new(&name, self.parse_repetition()?).into())
    }

    /// Parse repetition operators after a matcher.
    ///
    /// Example:
    /// - Source: `?`      → ZERO_OR_ONE
    /// - Source: `*`      → ZERO_OR_MORE
    /// - Source: `+`      → ONE_OR_MORE
    /// - Source: `{2,5}`  → {2, 5}
    /// - Source: nothing  → ONE
    fn parse_repetition(&mut self) -> Result<Repetition> {
        let repetition = match self.peek() {
            Some(TokenKind::Operator('?')) => Repetition::ZERO_OR_ONE,
            Some(TokenKind::Operator('*')) => Repetition::ZERO_OR_MORE,
            Some(TokenKind::Operator('+')) => Repetition::ONE_OR_MORE,
            Some(TokenKind::Separator('{')) => return self.parse_bounds(),
            _ => return Ok(Repetition::ONE),
        };
        self.advance();
        Ok(repetition)
    }

    /// Parse `{m}`, `{m,}` or `{m,n}`.
    fn parse_bounds(&mut self) -> Result<Repetition> {
        let open = self.expect_separator('{', "to open a repetition")?;
        let minimum = self.parse_integer()?;
        let maximum = if self.peek().is_some_and(|kind| kind.is_separator(',')) {
            self.advance();
            match self.peek() {
                Some(TokenKind::Integer(_)) => self.parse_integer()?,
                _ => Repetition::UNBOUNDED,
            }
        } else {
            minimum
        };
        self.expect_separator('}', "to close a repetition")?;
        Repetition::new(minimum, maximum)
            .map_err(|err| Error::syntax(open.position, err.to_string()))
    }

    fn parse_integer(&mut self) -> Result<usize> {
        match self.peek() {
            Some(TokenKind::Integer(digits)) => {
                let position = self.position();
                let count = digits.parse::<usize>().map_err(|_| {
                    Error::syntax(position, format!("repetition count {digits} is too large"))
                })?;
                self.advance();
                Ok(count)
            }
            _ => Err(self.unexpected("a repetition count")),
        }
    }
}

/// Whether a token can begin a matcher.
fn starts_matcher(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Separator('(' | '<')
            | TokenKind::Operator('%')
            | TokenKind::CharacterLiteral(_)
            | TokenKind::StringLiteral(_)
            | TokenKind::RegexLiteral(_)
    )
}
