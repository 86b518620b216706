use std::fmt;

use crate::ast::Matcher;

/// Receives one line per node while a tree is walked depth-first.
pub trait LineSink {
    fn line(&mut self, depth: usize, text: &str);
}

impl<F: FnMut(usize, &str)> LineSink for F {
    fn line(&mut self, depth: usize, text: &str) {
        (self)(depth, text)
    }
}

/// Outcome of one match attempt, with the results that derived it.
///
/// A failed result is anchored where the attempt started and spans nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult<'s> {
    matcher: Matcher,
    source: &'s str,
    matching: bool,
    begin: usize,
    end: usize,
    children: Vec<MatchResult<'s>>,
}

impl<'s> MatchResult<'s> {
    pub(crate) fn success(
        matcher: Matcher,
        source: &'s str,
        begin: usize,
        end: usize,
        children: Vec<MatchResult<'s>>,
    ) -> Self {
        debug_assert!(begin <= end && end <= source.len());
        Self {
            matcher,
            source,
            matching: true,
            begin,
            end,
            children,
        }
    }

    pub(crate) fn failure(matcher: Matcher, source: &'s str, index: usize) -> Self {
        Self {
            matcher,
            source,
            matching: false,
            begin: index,
            end: index,
            children: Vec::new(),
        }
    }

    /// The node that produced this result.
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn source(&self) -> &'s str {
        self.source
    }

    pub fn is_matching(&self) -> bool {
        self.matching
    }

    /// Matched, starting at 0 and reaching the end of the source.
    pub fn is_complete(&self) -> bool {
        self.matching && self.begin == 0 && self.end == self.source.len()
    }

    pub fn begin(&self) -> usize {
        self.begin
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// The matched text; empty for failures.
    pub fn as_str(&self) -> &'s str {
        &self.source[self.begin..self.end]
    }

    pub fn children(&self) -> &[MatchResult<'s>] {
        &self.children
    }

    pub fn describe(&self) -> String {
        if self.matching {
            format!(
                "{} matched [{}..{}) {:?}",
                self.matcher.describe(),
                self.begin,
                self.end,
                self.as_str()
            )
        } else {
            format!("{} failed at {}", self.matcher.describe(), self.begin)
        }
    }

    /// Emits this result and its children depth-first, one line each.
    pub fn outline(&self, sink: &mut impl LineSink) {
        self.outline_at(0, sink);
    }

    fn outline_at(&self, depth: usize, sink: &mut impl LineSink) {
        sink.line(depth, &self.describe());
        for child in &self.children {
            child.outline_at(depth + 1, sink);
        }
    }
}

impl fmt::Display for MatchResult<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
