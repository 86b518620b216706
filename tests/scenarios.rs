//! End-to-end matching scenarios: parse a pattern, run it, inspect the result.

use std::io::Write;
use std::thread;

use anyhow::Result;
use rex::{
    Alternation, Concatenation, Error, Expression, Group, GroupReference, Matcher, Repetition,
    Symbol, SymbolClass,
};
use rstest::rstest;

fn symbol(c: char, repetition: Repetition) -> Matcher {
    Symbol::new(c, repetition).into()
}

fn reference_in(expression: &Expression, index: usize) -> GroupReference {
    match &expression.root().children()[0].children()[index] {
        Matcher::GroupReference(reference) => reference.clone(),
        other => panic!("expected a reference, found {other}"),
    }
}

fn group_in(expression: &Expression, index: usize) -> Group {
    match &expression.root().children()[0].children()[index] {
        Matcher::Group(group) => group.clone(),
        Matcher::GroupReferenceDefinition(definition) => definition.body().clone(),
        other => panic!("expected a group, found {other}"),
    }
}

#[rstest]
#[case::greedy_symbol("'a'+", "aaab", Some("aaa"))]
#[case::repeated_group("('a' 'b')+", "ababab", Some("ababab"))]
#[case::second_choice("'a' | 'b'", "b", Some("b"))]
#[case::digits("%Digit+", "123x", Some("123"))]
#[case::optional_absent("'x'?", "y", Some(""))]
#[case::first_choice_wins("'a' | 'a' 'b'", "ab", Some("a"))]
#[case::no_backtracking("'a'+ 'a'", "aaa", None)]
#[case::group_swallows_reference_input("('a')* <0>", "aaa", None)]
#[case::keyword_and_identifier(
    r#""let" %Whitespace+ %IdentifierStart %IdentifierPart*"#,
    "let x1 = 2",
    Some("let x1")
)]
#[case::decimal("/[0-9]+/ ('.' /[0-9]+/)?", "3.14", Some("3.14"))]
#[case::string_literal_format("%StringLiteral", r#""a\"b" tail"#, Some(r#""a\"b""#))]
#[case::bounded_reference("<d>=(%Digit) <d>{3} '-' <d>{4}", "555-1234", Some("555-1234"))]
#[case::comments_in_pattern("'a' /* then */ 'b' // done", "ab", Some("ab"))]
fn matches_from_the_start(
    #[case] pattern: &str,
    #[case] input: &str,
    #[case] expected: Option<&str>,
) -> Result<()> {
    let expression = rex::parse(pattern)?;
    let result = expression.matches(input);
    assert_eq!(result.is_matching().then(|| result.as_str()), expected);
    Ok(())
}

#[rstest]
#[case::index_out_of_range("<9>")]
#[case::second_group_missing("('a') ('b') <2>")]
#[case::unknown_name("('a') <word>")]
#[case::duplicate_definition("<g>=('a') <g>=('b')")]
#[case::oversized_index("('a') <99999999999999999999999>")]
#[case::left_recursive("<g>=(<g> 'a') <g>")]
#[case::left_recursive_through_optional("<g>=('x'? <g>) 'y'")]
#[case::left_recursive_pair("<a>=(<b> 'a') <b>=(<a>? 'b') <a>")]
fn unresolvable_references(#[case] pattern: &str) {
    assert!(matches!(rex::parse(pattern), Err(Error::Reference { .. })));
}

#[test]
fn positional_reference_binds_the_first_group() -> Result<()> {
    let expression = rex::parse("('a') ('b') <0>")?;
    let target = reference_in(&expression, 2).target().expect("bound");
    assert!(target.ptr_eq(&group_in(&expression, 0)));
    assert!(expression.matches("aba").is_complete());
    Ok(())
}

#[test]
fn named_reference_binds_its_definition() -> Result<()> {
    let expression = rex::parse("<g>=('a') <g>")?;
    let target = reference_in(&expression, 1).target().expect("bound");
    assert!(target.ptr_eq(&group_in(&expression, 0)));

    // The definition itself consumes nothing; the reference does.
    let result = expression.matches("ab");
    assert_eq!(result.as_str(), "a");
    Ok(())
}

#[test]
fn reference_may_precede_its_definition() -> Result<()> {
    let expression = rex::parse("<word>+ <word>=(%Letter)")?;
    assert_eq!(expression.matches("abc1").as_str(), "abc");
    Ok(())
}

#[test]
fn recursive_definition() -> Result<()> {
    let expression = rex::parse("<p>=('(' <p>* ')') <p>")?;
    assert!(expression.matches("(()(()))").is_complete());
    assert_eq!(expression.matches("(()").as_str(), "");
    assert!(!expression.matches("(()").is_complete());
    Ok(())
}

#[test]
fn failed_construction_binds_nothing() -> Result<()> {
    let first = GroupReference::positional(0, Repetition::ONE);
    let group = Group::new(
        Alternation::new(vec![Concatenation::new(vec![symbol('a', Repetition::ONE)])?])?,
        Repetition::ONE,
    );
    let root = Alternation::new(vec![Concatenation::new(vec![
        group.into(),
        first.clone().into(),
        GroupReference::positional(5, Repetition::ONE).into(),
    ])?])?;
    assert!(matches!(Expression::new(root), Err(Error::Reference { .. })));
    assert!(!first.is_resolved());
    Ok(())
}

#[test]
fn references_keep_their_targets_alive() -> Result<()> {
    let reference = {
        let expression = rex::parse("<g>=('a' 'b') <g>+")?;
        Matcher::from(reference_in(&expression, 1))
    };
    assert_eq!(reference.matches("ababx").as_str(), "abab");
    Ok(())
}

#[test]
fn right_recursion_is_allowed() -> Result<()> {
    let expression = rex::parse("<list>=('x' (',' <list>)?) <list>")?;
    assert!(expression.matches("x,x,x").is_complete());
    Ok(())
}

#[test]
fn reference_ignores_the_target_repetition() -> Result<()> {
    let expression = rex::parse("<g>=('a')+ <g>")?;
    assert_eq!(expression.matches("aaa").as_str(), "a");
    Ok(())
}

#[test]
fn result_tree_records_the_derivation() -> Result<()> {
    let group = Group::new(
        Alternation::new(vec![Concatenation::new(vec![
            symbol('a', Repetition::ONE),
            symbol('b', Repetition::ONE),
        ])?])?,
        Repetition::ONE_OR_MORE,
    );
    let result = Matcher::from(group.clone()).matches("ababab");
    assert!(result.is_complete());
    assert_eq!(result.children().len(), 3);
    for (i, repetition) in result.children().iter().enumerate() {
        assert_eq!(repetition.as_str(), "ab");
        assert_eq!(repetition.begin(), i * 2);
        assert_eq!(repetition.matcher(), &Matcher::from(group.body().clone()));
    }
    Ok(())
}

#[test]
fn expression_wraps_its_root() -> Result<()> {
    let expression = rex::parse("'a' | 'b'")?;
    let result = expression.matches("b");
    assert_eq!(result.matcher().kind_name(), "Expression");
    let root = &result.children()[0];
    assert_eq!(root.matcher().kind_name(), "Alternation");
    assert_eq!(root.children().len(), 1);
    let second = Matcher::from(expression.root().children()[1].clone());
    assert_eq!(root.children()[0].matcher(), &second);
    Ok(())
}

#[test]
fn match_at_an_offset() -> Result<()> {
    let class = Matcher::from(SymbolClass::new("Letter", Repetition::ONE_OR_MORE));
    let result = class.match_at("12abc3", 2)?;
    assert_eq!((result.begin(), result.end()), (2, 5));
    assert_eq!(result.as_str(), "abc");
    assert!(!result.is_complete());
    Ok(())
}

#[test]
fn outline_lists_every_result() -> Result<()> {
    let expression = rex::parse("('a')+")?;
    let mut lines = Vec::new();
    expression
        .matches("aa")
        .outline(&mut |depth: usize, text: &str| {
            lines.push(format!("{}{text}", "  ".repeat(depth)))
        });
    assert_eq!(
        lines,
        vec![
            r#"Expression matched [0..2) "aa""#,
            r#"  Alternation (1 choices) matched [0..2) "aa""#,
            r#"    Concatenation (1 matchers) matched [0..2) "aa""#,
            r#"      Group + matched [0..2) "aa""#,
            r#"        Alternation (1 choices) matched [0..1) "a""#,
            r#"          Concatenation (1 matchers) matched [0..1) "a""#,
            r#"            Symbol 'a' matched [0..1) "a""#,
            r#"        Alternation (1 choices) matched [1..2) "a""#,
            r#"          Concatenation (1 matchers) matched [1..2) "a""#,
            r#"            Symbol 'a' matched [1..2) "a""#,
        ]
    );
    Ok(())
}

#[rstest]
#[case("'a'+ 'b'? | %Digit*")]
#[case("<g>=('a' | 'b')+ <g>{2,} <0>?")]
#[case(r#""x/y" /a\/b/ '\'' '\n' %Unknown"#)]
#[case("('a'{3} | ('b')*)? <1>")]
fn display_parses_back(#[case] pattern: &str) -> Result<()> {
    let expression = rex::parse(pattern)?;
    let reparsed = rex::parse(&expression.to_string())?;
    assert_eq!(reparsed, expression);
    Ok(())
}

#[test]
fn concurrent_matching_shares_one_expression() -> Result<()> {
    let expression = rex::parse("<w>=(%Letter+) <w> (' ' <w>)*")?;
    let input = "the quick brown fox";
    let expected = expression.matches(input);
    thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| expression.matches(input)))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().expect("matching thread panicked"), expected);
        }
    });
    assert!(expected.is_complete());
    Ok(())
}

#[test]
fn parse_file_reads_the_source() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "// digits, then letters")?;
    writeln!(file, "%Digit+ %Letter*")?;
    let expression = rex::parse_file(file.path())?;
    assert!(expression.matches("42abc").is_complete());
    Ok(())
}

#[test]
fn parse_file_reports_missing_files() {
    let missing = std::env::temp_dir().join("rex-no-such-pattern.rex");
    assert!(matches!(rex::parse_file(missing), Err(Error::Io { .. })));
}

#[test]
fn is_match_requires_the_whole_input() -> Result<()> {
    assert!(rex::is_match("abc", "%Letter+")?);
    assert!(!rex::is_match("abc1", "%Letter+")?);
    assert!(rex::is_match("abc", "('a'").is_err());
    Ok(())
}

#[test]
fn syntax_errors_carry_positions() {
    let err = rex::parse("'a'\n  | )").unwrap_err();
    let position = err.position().expect("syntax errors have a position");
    assert_eq!((position.line, position.column), (2, 5));
}
