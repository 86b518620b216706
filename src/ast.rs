use std::fmt::{self, Write as _};
use std::str::FromStr;
use std::sync::{Arc, OnceLock, Weak};

use regex::Regex;

use crate::classes::SymbolClassKind;
use crate::error::{Error, Result};
use crate::resolver;
use crate::result::LineSink;

/// Inclusive occurrence-count constraint attached to a matcher.
///
/// A `maximum` of [`Repetition::UNBOUNDED`] means "as many as possible".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Repetition {
    minimum: usize,
    maximum: usize,
}

impl Repetition {
    pub const UNBOUNDED: usize = usize::MAX;

    /// Exactly once; written as nothing at all.
    pub const ONE: Repetition = Repetition { minimum: 1, maximum: 1 };
    /// `?`
    pub const ZERO_OR_ONE: Repetition = Repetition { minimum: 0, maximum: 1 };
    /// `*`
    pub const ZERO_OR_MORE: Repetition = Repetition {
        minimum: 0,
        maximum: Self::UNBOUNDED,
    };
    /// `+`
    pub const ONE_OR_MORE: Repetition = Repetition {
        minimum: 1,
        maximum: Self::UNBOUNDED,
    };

    pub fn new(minimum: usize, maximum: usize) -> Result<Self> {
        if minimum > maximum {
            return Err(Error::argument(format!(
                "repetition minimum {minimum} exceeds maximum {maximum}"
            )));
        }
        Ok(Self { minimum, maximum })
    }

    pub fn minimum(self) -> usize {
        self.minimum
    }

    pub fn maximum(self) -> usize {
        self.maximum
    }

    pub fn is_unbounded(self) -> bool {
        self.maximum == Self::UNBOUNDED
    }
}

impl Default for Repetition {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for Repetition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.minimum, self.maximum) {
            (1, 1) => Ok(()),
            (0, 1) => f.write_str("?"),
            (0, Self::UNBOUNDED) => f.write_str("*"),
            (1, Self::UNBOUNDED) => f.write_str("+"),
            (min, Self::UNBOUNDED) => write!(f, "{{{min},}}"),
            (min, max) if min == max => write!(f, "{{{min}}}"),
            (min, max) => write!(f, "{{{min},{max}}}"),
        }
    }
}

impl FromStr for Repetition {
    type Err = Error;

    /// Parses every form [`Repetition`]'s `Display` emits.
    ///
    /// Examples:
    /// - `""` → ONE
    /// - `"+"` → ONE_OR_MORE
    /// - `"{2,}"` → {2, UNBOUNDED}
    /// - `"{2,5}"` → {2, 5}
    fn from_str(text: &str) -> Result<Self> {
        match text {
            "" => return Ok(Self::ONE),
            "?" => return Ok(Self::ZERO_OR_ONE),
            "*" => return Ok(Self::ZERO_OR_MORE),
            "+" => return Ok(Self::ONE_OR_MORE),
            _ => {}
        }
        let invalid = || Error::argument(format!("invalid repetition {text:?}"));
        let bound = |digits: &str| digits.parse::<usize>().map_err(|_| invalid());
        let inner = text
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .ok_or_else(invalid)?;
        let (minimum, maximum) = match inner.split_once(',') {
            None => {
                let exact = bound(inner)?;
                (exact, exact)
            }
            Some((min, "")) => (bound(min)?, Self::UNBOUNDED),
            Some((min, max)) => (bound(min)?, bound(max)?),
        };
        Self::new(minimum, maximum)
    }
}

/// A grammar node: anything that can try to match text at an offset.
///
/// Handles are cheap to clone; composite nodes share their children.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    Symbol(Symbol),
    SymbolClass(SymbolClass),
    Regex(RegexLeaf),
    Concatenation(Concatenation),
    Alternation(Alternation),
    Group(Group),
    GroupReference(GroupReference),
    GroupReferenceDefinition(GroupReferenceDefinition),
    Expression(Expression),
}

macro_rules! impl_from_node {
    ($($variant:ident($node:ident)),* $(,)?) => {
        $(
            impl From<$node> for Matcher {
                fn from(node: $node) -> Self {
                    Matcher::$variant(node)
                }
            }
        )*
    };
}

impl_from_node!(
    Symbol(Symbol),
    SymbolClass(SymbolClass),
    Regex(RegexLeaf),
    Concatenation(Concatenation),
    Alternation(Alternation),
    Group(Group),
    GroupReference(GroupReference),
    GroupReferenceDefinition(GroupReferenceDefinition),
    Expression(Expression),
);

impl Matcher {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Matcher::Symbol(_) => "Symbol",
            Matcher::SymbolClass(_) => "SymbolClass",
            Matcher::Regex(_) => "Regex",
            Matcher::Concatenation(_) => "Concatenation",
            Matcher::Alternation(_) => "Alternation",
            Matcher::Group(_) => "Group",
            Matcher::GroupReference(_) => "GroupReference",
            Matcher::GroupReferenceDefinition(_) => "GroupReferenceDefinition",
            Matcher::Expression(_) => "Expression",
        }
    }

    /// Direct sub-nodes in document order. References are not followed.
    pub fn children(&self) -> Vec<Matcher> {
        match self {
            Matcher::Symbol(_)
            | Matcher::SymbolClass(_)
            | Matcher::Regex(_)
            | Matcher::GroupReference(_) => Vec::new(),
            Matcher::Concatenation(concatenation) => concatenation.children().to_vec(),
            Matcher::Alternation(alternation) => alternation
                .children()
                .iter()
                .cloned()
                .map(Matcher::Concatenation)
                .collect(),
            Matcher::Group(group) => vec![group.body().clone().into()],
            Matcher::GroupReferenceDefinition(definition) => vec![definition.body().clone().into()],
            Matcher::Expression(expression) => vec![expression.root().clone().into()],
        }
    }

    /// One-line description of this node alone.
    ///
    /// Example:
    /// - `'a'+` → `Symbol 'a'+`
    /// - `('a' | 'b')*` → `Group *`
    pub fn describe(&self) -> String {
        let name = self.kind_name();
        match self {
            Matcher::Symbol(_) | Matcher::SymbolClass(_) | Matcher::Regex(_) => {
                format!("{name} {self}")
            }
            Matcher::Concatenation(concatenation) => {
                format!("{name} ({} matchers)", concatenation.children().len())
            }
            Matcher::Alternation(alternation) => {
                format!("{name} ({} choices)", alternation.children().len())
            }
            Matcher::Group(group) => format!("{name} {}", group.repetition()).trim_end().to_string(),
            Matcher::GroupReference(reference) if !reference.is_resolved() => {
                format!("{name} {reference} (unresolved)")
            }
            Matcher::GroupReference(reference) => format!("{name} {reference}"),
            Matcher::GroupReferenceDefinition(definition) => {
                format!("{name} <{}>", definition.name())
            }
            Matcher::Expression(_) => name.to_string(),
        }
    }

    /// Emits this node and its sub-nodes depth-first, one line each.
    pub fn outline(&self, sink: &mut impl LineSink) {
        self.outline_at(0, sink);
    }

    fn outline_at(&self, depth: usize, sink: &mut impl LineSink) {
        sink.line(depth, &self.describe());
        for child in self.children() {
            child.outline_at(depth + 1, sink);
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Symbol(node) => fmt::Display::fmt(node, f),
            Matcher::SymbolClass(node) => fmt::Display::fmt(node, f),
            Matcher::Regex(node) => fmt::Display::fmt(node, f),
            Matcher::Concatenation(node) => fmt::Display::fmt(node, f),
            Matcher::Alternation(node) => fmt::Display::fmt(node, f),
            Matcher::Group(node) => fmt::Display::fmt(node, f),
            Matcher::GroupReference(node) => fmt::Display::fmt(node, f),
            Matcher::GroupReferenceDefinition(node) => fmt::Display::fmt(node, f),
            Matcher::Expression(node) => fmt::Display::fmt(node, f),
        }
    }
}

/// One literal character, repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    character: char,
    repetition: Repetition,
}

impl Symbol {
    pub fn new(character: char, repetition: Repetition) -> Self {
        Self {
            character,
            repetition,
        }
    }

    pub fn character(&self) -> char {
        self.character
    }

    pub fn repetition(&self) -> Repetition {
        self.repetition
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('\'')?;
        write_escaped(f, self.character, '\'')?;
        write!(f, "'{}", self.repetition)
    }
}

/// A named built-in predicate or literal format, repeated.
///
/// Unknown names are kept; they fail every occurrence test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolClass {
    name: Arc<str>,
    kind: Option<SymbolClassKind>,
    repetition: Repetition,
}

impl SymbolClass {
    pub fn new(name: &str, repetition: Repetition) -> Self {
        Self {
            name: name.into(),
            kind: name.parse().ok(),
            repetition,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Option<SymbolClassKind> {
        self.kind
    }

    pub fn repetition(&self) -> Repetition {
        self.repetition
    }
}

impl fmt::Display for SymbolClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}{}", self.name, self.repetition)
    }
}

/// A single application of a host regex, anchored at the match offset.
#[derive(Debug, Clone)]
pub struct RegexLeaf {
    pattern: Arc<str>,
    regex: Regex,
}

impl RegexLeaf {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{pattern})"))
            .map_err(|err| Error::argument(format!("invalid regex /{pattern}/: {err}")))?;
        Ok(Self {
            pattern: pattern.into(),
            regex,
        })
    }

    /// A leaf matching `text` verbatim.
    pub fn literal(text: &str) -> Result<Self> {
        Self::new(&regex::escape(text))
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub(crate) fn regex(&self) -> &Regex {
        &self.regex
    }
}

impl PartialEq for RegexLeaf {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl fmt::Display for RegexLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `//` would lex as a comment
        if self.pattern.is_empty() {
            return f.write_str("\"\"");
        }
        f.write_char('/')?;
        let mut chars = self.pattern.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    f.write_char('\\')?;
                    if let Some(escaped) = chars.next() {
                        f.write_char(escaped)?;
                    }
                }
                '/' => f.write_str("\\/")?,
                c => f.write_char(c)?,
            }
        }
        f.write_char('/')
    }
}

/// Ordered, all-or-nothing sequence of matchers.
#[derive(Debug, Clone, PartialEq)]
pub struct Concatenation {
    children: Arc<[Matcher]>,
}

impl Concatenation {
    pub fn new(children: Vec<Matcher>) -> Result<Self> {
        if children.is_empty() {
            return Err(Error::argument("a concatenation needs at least one matcher"));
        }
        Ok(Self {
            children: children.into(),
        })
    }

    pub fn children(&self) -> &[Matcher] {
        &self.children
    }
}

impl fmt::Display for Concatenation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                f.write_char(' ')?;
            }
            write!(f, "{child}")?;
        }
        Ok(())
    }
}

/// Ordered choice between concatenations; the first success wins.
#[derive(Debug, Clone, PartialEq)]
pub struct Alternation {
    children: Arc<[Concatenation]>,
}

impl Alternation {
    pub fn new(children: Vec<Concatenation>) -> Result<Self> {
        if children.is_empty() {
            return Err(Error::argument("an alternation needs at least one concatenation"));
        }
        Ok(Self {
            children: children.into(),
        })
    }

    pub fn children(&self) -> &[Concatenation] {
        &self.children
    }
}

impl fmt::Display for Alternation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{child}")?;
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
pub(crate) struct GroupNode {
    body: Alternation,
    repetition: Repetition,
}

/// A parenthesized, repeatable sub-pattern.
///
/// Clones share the same node, which is what references point at.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    node: Arc<GroupNode>,
}

impl Group {
    pub fn new(body: Alternation, repetition: Repetition) -> Self {
        Self {
            node: Arc::new(GroupNode { body, repetition }),
        }
    }

    pub fn body(&self) -> &Alternation {
        &self.node.body
    }

    pub fn repetition(&self) -> Repetition {
        self.node.repetition
    }

    /// True when both handles are the same node, not merely equal ones.
    pub fn ptr_eq(&self, other: &Group) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}){}", self.node.body, self.node.repetition)
    }
}

/// How a reference names its target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceKey {
    /// Position among all groups in document order, 0-based.
    Index(usize),
    /// Name of a [`GroupReferenceDefinition`].
    Name(Arc<str>),
}

impl ReferenceKey {
    /// All-digit names that fit in a `usize` are positional, everything
    /// else is by name.
    pub fn parse(name: &str) -> Self {
        if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = name.parse() {
                return ReferenceKey::Index(index);
            }
        }
        ReferenceKey::Name(name.into())
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKey::Index(index) => write!(f, "{index}"),
            ReferenceKey::Name(name) => f.write_str(name),
        }
    }
}

/// How a bound reference holds its target.
#[derive(Debug)]
enum Link {
    Owned(Arc<GroupNode>),
    // Only for targets that can reach the reference again.
    Weak(Weak<GroupNode>),
}

impl Link {
    fn upgrade(&self) -> Option<Arc<GroupNode>> {
        match self {
            Link::Owned(node) => Some(Arc::clone(node)),
            Link::Weak(node) => node.upgrade(),
        }
    }
}

#[derive(Debug)]
struct ReferenceNode {
    key: ReferenceKey,
    repetition: Repetition,
    target: OnceLock<Link>,
}

/// A back-reference replaying another group's body.
///
/// The reference's own repetition decides how many times the body is
/// replayed; the target group's repetition is ignored.
///
/// A bound reference keeps its target alive, so a clone taken out of an
/// expression still matches after the expression is dropped. The exception
/// is a recursive target, one that can reach the reference again: that link
/// is weak, and the reference stops being resolved once the last owner of
/// the target is gone.
#[derive(Debug, Clone)]
pub struct GroupReference {
    node: Arc<ReferenceNode>,
}

impl GroupReference {
    pub fn new(name: &str, repetition: Repetition) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::argument("a group reference needs a name or an index"));
        }
        Ok(Self::with_key(ReferenceKey::parse(name), repetition))
    }

    pub fn positional(index: usize, repetition: Repetition) -> Self {
        Self::with_key(ReferenceKey::Index(index), repetition)
    }

    pub fn with_key(key: ReferenceKey, repetition: Repetition) -> Self {
        Self {
            node: Arc::new(ReferenceNode {
                key,
                repetition,
                target: OnceLock::new(),
            }),
        }
    }

    pub fn key(&self) -> &ReferenceKey {
        &self.node.key
    }

    /// True when both handles are the same reference, not merely equal ones.
    pub fn ptr_eq(&self, other: &GroupReference) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    pub fn repetition(&self) -> Repetition {
        self.node.repetition
    }

    /// Bound to a group that is still alive; agrees with [`Self::target`].
    pub fn is_resolved(&self) -> bool {
        self.target().is_some()
    }

    /// Whether the slot was ever filled, even if the target has since been
    /// dropped.
    pub(crate) fn is_bound(&self) -> bool {
        self.node.target.get().is_some()
    }

    /// The bound group, if bound and still alive.
    pub fn target(&self) -> Option<Group> {
        let node = self.node.target.get()?.upgrade()?;
        Some(Group { node })
    }

    /// Binds the target slot once.
    ///
    /// Binding again to the same group is a no-op; binding to a different
    /// group fails and leaves the first binding in place.
    pub fn bind(&self, group: &Group) -> Result<()> {
        let owned = !resolver::reaches(group, self, &[]);
        self.bind_link(group, owned)
    }

    /// Binds with a strong link when `owned`, a weak one otherwise.
    pub(crate) fn bind_link(&self, group: &Group, owned: bool) -> Result<()> {
        let link = if owned {
            Link::Owned(Arc::clone(&group.node))
        } else {
            Link::Weak(Arc::downgrade(&group.node))
        };
        if self.node.target.set(link).is_ok() {
            return Ok(());
        }
        match self.target() {
            Some(bound) if bound.ptr_eq(group) => Ok(()),
            _ => Err(Error::reference(
                &self.node.key,
                "already bound to a different group",
            )),
        }
    }
}

impl PartialEq for GroupReference {
    fn eq(&self, other: &Self) -> bool {
        self.node.key == other.node.key && self.node.repetition == other.node.repetition
    }
}

impl fmt::Display for GroupReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>{}", self.node.key, self.node.repetition)
    }
}

/// Named declaration of a group; matches nothing by itself.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupReferenceDefinition {
    name: Arc<str>,
    body: Group,
}

impl GroupReferenceDefinition {
    pub fn new(name: &str, body: Group) -> Result<Self> {
        if name.is_empty() || name.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::argument(format!(
                "definition name {name:?} must be an identifier"
            )));
        }
        Ok(Self {
            name: name.into(),
            body,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &Group {
        &self.body
    }
}

impl fmt::Display for GroupReferenceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>={}", self.name, self.body)
    }
}

/// A compiled Rex program with every reference bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    root: Alternation,
}

impl Expression {
    /// Links the references under `root` and freezes the tree.
    pub fn new(root: Alternation) -> Result<Self> {
        resolver::resolve(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Alternation {
        &self.root
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}

impl FromStr for Expression {
    type Err = Error;

    fn from_str(source: &str) -> Result<Self> {
        crate::parse(source)
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, c: char, quote: char) -> fmt::Result {
    match c {
        '\\' => f.write_str("\\\\"),
        '\n' => f.write_str("\\n"),
        '\t' => f.write_str("\\t"),
        '\r' => f.write_str("\\r"),
        '\0' => f.write_str("\\0"),
        c if c == quote => write!(f, "\\{c}"),
        c => f.write_char(c),
    }
}
