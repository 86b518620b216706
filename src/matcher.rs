//! The matching engine.
//!
//! Every node is evaluated by walking the tree: no backtracking, greedy
//! repetition, first-success alternation. Failures are anchored at the
//! offset the attempt started from.

use crate::ast::{Alternation, Concatenation, Expression, Group, GroupReference, Matcher, Repetition};
use crate::error::{Error, Result};
use crate::result::MatchResult;

impl Matcher {
    /// Matches this node against `input` starting at byte offset `index`.
    ///
    /// A failed match is an `Ok` result that reports `is_matching() == false`;
    /// errors are reserved for offsets that are out of range or split a
    /// character.
    ///
    /// # Panics
    ///
    /// When the tree contains a group reference that was never bound, or a
    /// recursive reference taken out of an expression that has since been
    /// dropped.
    pub fn match_at<'s>(&self, input: &'s str, index: usize) -> Result<MatchResult<'s>> {
        check_index(input, index)?;
        Ok(match_node(self, input, index))
    }

    /// `match_at(input, 0)`, which cannot fail on its arguments.
    pub fn matches<'s>(&self, input: &'s str) -> MatchResult<'s> {
        match_node(self, input, 0)
    }
}

impl Expression {
    pub fn match_at<'s>(&self, input: &'s str, index: usize) -> Result<MatchResult<'s>> {
        check_index(input, index)?;
        Ok(match_expression(self, input, index))
    }

    pub fn matches<'s>(&self, input: &'s str) -> MatchResult<'s> {
        match_expression(self, input, 0)
    }
}

fn check_index(input: &str, index: usize) -> Result<()> {
    if index > input.len() {
        return Err(Error::argument(format!(
            "offset {index} is past the end of a {}-byte input",
            input.len()
        )));
    }
    if !input.is_char_boundary(index) {
        return Err(Error::argument(format!(
            "offset {index} is inside a multi-byte character"
        )));
    }
    Ok(())
}

/// Evaluates `node` at `pos`; `pos` is a valid offset of `input`.
pub(crate) fn match_node<'s>(node: &Matcher, input: &'s str, pos: usize) -> MatchResult<'s> {
    match node {
        Matcher::Symbol(symbol) => {
            let c = symbol.character();
            let found = repeat(symbol.repetition(), pos, |at| {
                input[at..]
                    .starts_with(c)
                    .then(|| (at + c.len_utf8(), None))
            });
            leaf(node, input, pos, found)
        }
        Matcher::SymbolClass(class) => {
            let found = match class.kind() {
                Some(kind) => repeat(class.repetition(), pos, |at| {
                    kind.match_once(input, at).map(|end| (end, None))
                }),
                // Unknown classes fail every occurrence.
                None => repeat(class.repetition(), pos, |_| None),
            };
            leaf(node, input, pos, found)
        }
        Matcher::Regex(leaf_regex) => {
            let found = leaf_regex
                .regex()
                .find(&input[pos..])
                .map(|found| (pos + found.end(), Vec::new()));
            leaf(node, input, pos, found)
        }
        Matcher::Concatenation(concatenation) => match_concatenation(concatenation, input, pos),
        Matcher::Alternation(alternation) => match_alternation(alternation, input, pos),
        Matcher::Group(group) => {
            let found = repeat_body(group.body(), group.repetition(), input, pos);
            leaf(node, input, pos, found)
        }
        Matcher::GroupReference(reference) => {
            let target = resolved_target(reference);
            let found = repeat_body(target.body(), reference.repetition(), input, pos);
            leaf(node, input, pos, found)
        }
        // Declarations only; the body is reached through references.
        Matcher::GroupReferenceDefinition(_) => {
            MatchResult::success(node.clone(), input, pos, pos, Vec::new())
        }
        Matcher::Expression(expression) => match_expression(expression, input, pos),
    }
}

fn leaf<'s>(
    node: &Matcher,
    input: &'s str,
    pos: usize,
    found: Option<(usize, Vec<MatchResult<'s>>)>,
) -> MatchResult<'s> {
    match found {
        Some((end, children)) => MatchResult::success(node.clone(), input, pos, end, children),
        None => MatchResult::failure(node.clone(), input, pos),
    }
}

fn resolved_target(reference: &GroupReference) -> Group {
    match reference.target() {
        Some(group) => group,
        None if reference.is_bound() => panic!(
            "group reference {reference} outlived the expression that owns its recursive target"
        ),
        None => panic!("group reference {reference} was matched before it was resolved"),
    }
}

/// Sequential AND: the first failing child fails the whole sequence at `pos`.
fn match_concatenation<'s>(
    concatenation: &Concatenation,
    input: &'s str,
    pos: usize,
) -> MatchResult<'s> {
    let origin = Matcher::Concatenation(concatenation.clone());
    let mut at = pos;
    let mut children = Vec::with_capacity(concatenation.children().len());
    for child in concatenation.children() {
        let result = match_node(child, input, at);
        if !result.is_matching() {
            return MatchResult::failure(origin, input, pos);
        }
        at = result.end();
        children.push(result);
    }
    MatchResult::success(origin, input, pos, at, children)
}

/// Ordered choice: the first succeeding branch is the only child.
fn match_alternation<'s>(alternation: &Alternation, input: &'s str, pos: usize) -> MatchResult<'s> {
    let origin = Matcher::Alternation(alternation.clone());
    for choice in alternation.children() {
        let result = match_concatenation(choice, input, pos);
        if result.is_matching() {
            let end = result.end();
            return MatchResult::success(origin, input, pos, end, vec![result]);
        }
    }
    MatchResult::failure(origin, input, pos)
}

fn match_expression<'s>(expression: &Expression, input: &'s str, pos: usize) -> MatchResult<'s> {
    let origin = Matcher::Expression(expression.clone());
    let result = match_alternation(expression.root(), input, pos);
    if result.is_matching() {
        let end = result.end();
        MatchResult::success(origin, input, pos, end, vec![result])
    } else {
        MatchResult::failure(origin, input, pos)
    }
}

fn repeat_body<'s>(
    body: &Alternation,
    repetition: Repetition,
    input: &'s str,
    pos: usize,
) -> Option<(usize, Vec<MatchResult<'s>>)> {
    repeat(repetition, pos, |at| {
        let result = match_alternation(body, input, at);
        result
            .is_matching()
            .then(|| (result.end(), Some(result)))
    })
}

/// The greedy repeat envelope shared by symbols, classes, groups and
/// references.
///
/// `attempt` tries one occurrence at an offset and returns the offset after
/// it, plus the result to nest if there is one. Repetition stops at the
/// maximum or the first failed attempt. An occurrence that consumes nothing
/// also stops it and satisfies the minimum, since every further attempt
/// would be the same empty match.
fn repeat<'s>(
    repetition: Repetition,
    pos: usize,
    mut attempt: impl FnMut(usize) -> Option<(usize, Option<MatchResult<'s>>)>,
) -> Option<(usize, Vec<MatchResult<'s>>)> {
    let mut at = pos;
    let mut count = 0;
    let mut children = Vec::new();
    while count < repetition.maximum() {
        let Some((end, result)) = attempt(at) else {
            break;
        };
        count += 1;
        children.extend(result);
        if end == at {
            return Some((at, children));
        }
        at = end;
    }
    (count >= repetition.minimum()).then_some((at, children))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{GroupReferenceDefinition, RegexLeaf, Symbol, SymbolClass};

    fn symbol(c: char, repetition: Repetition) -> Matcher {
        Symbol::new(c, repetition).into()
    }

    fn seq(children: Vec<Matcher>) -> Concatenation {
        Concatenation::new(children).unwrap()
    }

    fn alt(choices: Vec<Vec<Matcher>>) -> Alternation {
        Alternation::new(choices.into_iter().map(seq).collect()).unwrap()
    }

    #[test]
    fn symbol_is_greedy() {
        let result = symbol('a', Repetition::ONE_OR_MORE).matches("aaab");
        assert!(result.is_matching());
        assert_eq!(result.as_str(), "aaa");
        assert_eq!(result.end(), 3);
    }

    #[test]
    fn symbol_respects_maximum_and_minimum() {
        let two = Repetition::new(2, 2).unwrap();
        assert_eq!(symbol('a', two).matches("aaaa").len(), 2);
        assert!(!symbol('a', two).matches("ab").is_matching());
    }

    #[test]
    fn optional_symbol_can_match_nothing() {
        let result = symbol('x', Repetition::new(0, 1).unwrap()).matches("y");
        assert!(result.is_matching());
        assert!(result.is_empty());
        assert_eq!(result.begin(), 0);
    }

    #[test]
    fn failure_is_anchored_at_the_start() {
        let concatenation = Matcher::from(seq(vec![
            symbol('a', Repetition::ONE),
            symbol('b', Repetition::ONE),
        ]));
        let result = concatenation.match_at("xxac", 2).unwrap();
        assert!(!result.is_matching());
        assert_eq!((result.begin(), result.end()), (2, 2));
        assert!(result.children().is_empty());
    }

    #[test]
    fn group_nests_each_repetition() {
        let group = Matcher::from(Group::new(
            alt(vec![vec![
                symbol('a', Repetition::ONE),
                symbol('b', Repetition::ONE),
            ]]),
            Repetition::ONE_OR_MORE,
        ));
        let result = group.matches("ababab");
        assert!(result.is_complete());
        assert_eq!(result.children().len(), 3);
        for child in result.children() {
            assert_eq!(child.as_str(), "ab");
        }
    }

    #[test]
    fn alternation_takes_the_first_success() {
        let alternation = Matcher::from(alt(vec![
            vec![symbol('a', Repetition::ONE)],
            vec![symbol('a', Repetition::ONE_OR_MORE)],
        ]));
        let result = alternation.matches("aaa");
        assert_eq!(result.as_str(), "a");

        let alternation = Matcher::from(alt(vec![
            vec![symbol('a', Repetition::ONE)],
            vec![symbol('b', Repetition::ONE)],
        ]));
        let result = alternation.matches("b");
        assert_eq!(result.as_str(), "b");
        assert_eq!(result.children().len(), 1);
    }

    #[test]
    fn class_stops_at_first_non_member() {
        let class = Matcher::from(SymbolClass::new("Digit", Repetition::ONE_OR_MORE));
        let result = class.matches("123x");
        assert_eq!(result.as_str(), "123");
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn unknown_class_fails_each_occurrence() {
        assert!(!Matcher::from(SymbolClass::new("Nope", Repetition::ONE))
            .matches("a")
            .is_matching());
        assert!(Matcher::from(SymbolClass::new("Nope", Repetition::ZERO_OR_MORE))
            .matches("a")
            .is_matching());
    }

    #[test]
    fn regex_leaf_is_anchored_and_partial() {
        let regex = Matcher::from(RegexLeaf::new("[0-9]+").unwrap());
        let result = regex.match_at("ab12cd", 2).unwrap();
        assert_eq!(result.as_str(), "12");
        assert!(!regex.match_at("ab12cd", 0).unwrap().is_matching());
    }

    #[test]
    fn definition_is_zero_width() {
        let group = Group::new(alt(vec![vec![symbol('z', Repetition::ONE)]]), Repetition::ONE);
        let definition = Matcher::from(GroupReferenceDefinition::new("g", group).unwrap());
        let result = definition.match_at("abc", 1).unwrap();
        assert!(result.is_matching());
        assert_eq!((result.begin(), result.end()), (1, 1));
    }

    #[test]
    fn reference_uses_its_own_repetition() {
        let group = Group::new(alt(vec![vec![symbol('a', Repetition::ONE)]]), Repetition::ONE);
        let reference = GroupReference::positional(0, Repetition::ONE_OR_MORE);
        reference.bind(&group).unwrap();
        let result = Matcher::from(reference).matches("aaab");
        assert_eq!(result.as_str(), "aaa");
        assert_eq!(result.children().len(), 3);
    }

    #[test]
    fn nullable_body_does_not_loop() {
        let group = Matcher::from(Group::new(
            alt(vec![vec![symbol('a', Repetition::ZERO_OR_ONE)]]),
            Repetition::new(3, Repetition::UNBOUNDED).unwrap(),
        ));
        let result = group.matches("b");
        assert!(result.is_matching());
        assert!(result.is_empty());
    }

    #[test]
    #[should_panic(expected = "before it was resolved")]
    fn unresolved_reference_panics() {
        let reference = GroupReference::new("g", Repetition::ONE).unwrap();
        Matcher::from(reference).matches("a");
    }

    #[test]
    fn reference_outlives_its_expression() {
        let expression = crate::parse("<g>=('a') <g>").unwrap();
        let reference = expression.root().children()[0].children()[1].clone();
        drop(expression);
        assert_eq!(reference.matches("ab").as_str(), "a");
    }

    #[test]
    #[should_panic(expected = "outlived the expression")]
    fn recursive_reference_without_its_expression_panics() {
        let expression = crate::parse("<p>=('(' <p>* ')') <p>").unwrap();
        let Matcher::GroupReferenceDefinition(definition) =
            &expression.root().children()[0].children()[0]
        else {
            panic!("expected the definition first");
        };
        let inner = definition.body().body().children()[0].children()[1].clone();
        drop(expression);
        let Matcher::GroupReference(reference) = &inner else {
            panic!("expected the inner reference");
        };
        assert!(!reference.is_resolved());
        inner.matches("()");
    }

    #[test]
    fn bad_offsets_are_argument_errors() {
        let matcher = symbol('a', Repetition::ONE);
        assert!(matches!(matcher.match_at("abc", 4), Err(Error::Argument(_))));
        assert!(matches!(matcher.match_at("é", 1), Err(Error::Argument(_))));
        assert!(matcher.match_at("abc", 3).is_ok());
    }
}
