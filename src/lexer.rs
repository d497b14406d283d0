//! Lifting a `rulelist` derivation back into a [`Grammar`].
//!
//! [`parse_abnf`] is the full pipeline: run the generic parser over the
//! hard-coded ABNF grammar (depth bound disabled, it is known to
//! terminate), demand exactly one whole-input derivation, lex the path into
//! a grammar object, then semantically validate it.
//!
//! The lexer walks the derivation by matched rule name, descending only
//! through synthetic plumbing nodes, and reads leaf payloads (repeat
//! counts, char-val bodies, num-val digits, prose text) straight from the
//! matched input span. A malformed derivation shape is a library bug and
//! panics; it cannot be reached through [`parse_abnf`].

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::ast::{Alternation, Base, Concatenation, Element, Grammar, NumKind, Repetition, Rule};
use crate::parser::{parse_with, ParseOptions, Path};
use crate::rules::{is_core_rule, ABNF};
use crate::validate::validate;
use crate::Error;

/// Knobs of the ABNF meta-parser.
#[derive(Debug, Clone)]
pub struct ParseAbnfOptions {
    /// Run semantic validation on the lexed grammar.
    pub validate: bool,
    /// Let the grammar's rules shadow the RFC 5234 core rules, and allow
    /// `=/` against a core rule name.
    pub redefine_core_rules: bool,
}

impl Default for ParseAbnfOptions {
    fn default() -> Self {
        Self {
            validate: true,
            redefine_core_rules: false,
        }
    }
}

/// Parses ABNF source into a validated [`Grammar`], with default options.
///
/// The source must follow RFC 5234 + RFC 7405, with CRLF line terminators.
pub fn parse_abnf(input: &[u8]) -> Result<Grammar, Error> {
    parse_abnf_with(input, &ParseAbnfOptions::default())
}

/// Parses ABNF source into a [`Grammar`].
pub fn parse_abnf_with(input: &[u8], options: &ParseAbnfOptions) -> Result<Grammar, Error> {
    let mut paths = parse_with(
        input,
        &ABNF,
        "rulelist",
        &ParseOptions {
            deepness_threshold: None,
        },
    )?;

    let path = match paths.len() {
        0 => return Err(Error::NoSolutionFound),
        1 => paths.remove(0),
        _ => return Err(Error::MultipleSolutionsFound { paths }),
    };

    let grammar = lex_rulelist(input, &path, options)?;
    tracing::debug!(rules = grammar.len(), "lexed ABNF grammar");

    if options.validate {
        validate(&grammar)?;
    }
    Ok(grammar)
}

fn lex_rulelist(input: &[u8], path: &Path, options: &ParseAbnfOptions) -> Result<Grammar, Error> {
    let mut rulemap: BTreeMap<String, Rule> = BTreeMap::new();

    for rule_path in collect_tagged(path, "rule") {
        let (rule, incremental) = lex_rule(input, rule_path);
        let key = rule.name.to_ascii_lowercase();

        if incremental {
            // An incremental alternative merges its concatenations onto
            // the already-defined rule.
            if !options.redefine_core_rules && is_core_rule(&rule.name) {
                return Err(Error::CoreRuleModify {
                    rulename: rule.name,
                });
            }
            match rulemap.get_mut(&key) {
                Some(existing) => existing
                    .alternation
                    .concatenations
                    .extend(rule.alternation.concatenations),
                None => {
                    return Err(Error::RuleNotFound {
                        rulename: rule.name,
                    })
                }
            }
        } else {
            if rulemap.contains_key(&key) {
                return Err(Error::DuplicatedRule {
                    rulename: rule.name,
                });
            }
            rulemap.insert(key, rule);
        }
    }

    Ok(Grammar {
        rulemap,
        redefine_core_rules: options.redefine_core_rules,
    })
}

/// Lexes `rule = rulename defined-as elements c-nl`. The boolean is true
/// for an incremental alternative (`=/`).
fn lex_rule(input: &[u8], path: &Path) -> (Rule, bool) {
    let name = text(input, expect_tagged(path, "rulename")).into_owned();

    // The defined-as sign sits in a synthetic group child whose span is
    // exactly "=" or "=/"; surrounding c-wsp nodes are tagged or hold only
    // whitespace and comments.
    let defined_as = expect_tagged(path, "defined-as");
    let incremental = defined_as
        .children
        .iter()
        .filter(|child| child.matched_rule.is_none())
        .any(|child| text(input, child) == "=/");

    let elements = expect_tagged(path, "elements");
    let alternation = lex_alternation(input, expect_tagged(elements, "alternation"));

    (Rule { name, alternation }, incremental)
}

fn lex_alternation(input: &[u8], path: &Path) -> Alternation {
    Alternation {
        concatenations: collect_tagged(path, "concatenation")
            .into_iter()
            .map(|concatenation| lex_concatenation(input, concatenation))
            .collect(),
    }
}

fn lex_concatenation(input: &[u8], path: &Path) -> Concatenation {
    Concatenation {
        repetitions: collect_tagged(path, "repetition")
            .into_iter()
            .map(|repetition| lex_repetition(input, repetition))
            .collect(),
    }
}

fn lex_repetition(input: &[u8], path: &Path) -> Repetition {
    let (min, max) = match find_tagged(path, "repeat") {
        None => (1, Some(1)),
        Some(repeat) => lex_repeat(&text(input, repeat)),
    };

    let element_path = expect_tagged(path, "element");
    let variant = element_path
        .children
        .first()
        .unwrap_or_else(|| shape_panic(element_path, "an element variant"));

    let element = match variant.matched_rule.as_deref() {
        Some("rulename") => Element::Rulename {
            name: text(input, variant).into_owned(),
        },
        Some("group") => Element::Group(lex_alternation(
            input,
            expect_tagged(variant, "alternation"),
        )),
        Some("option") => Element::Option(lex_alternation(
            input,
            expect_tagged(variant, "alternation"),
        )),
        Some("char-val") => lex_char_val(input, variant),
        Some("num-val") => lex_num_val(input, variant),
        Some("prose-val") => lex_prose_val(input, variant),
        _ => shape_panic(variant, "a known element variant"),
    };

    Repetition { min, max, element }
}

/// Decodes a `repeat` literal: a bare count means an exact repetition, a
/// `*` splits it into a minimum prefix (empty: 0) and a maximum suffix
/// (empty: unbounded).
fn lex_repeat(literal: &str) -> (u32, Option<u32>) {
    match literal.find('*') {
        None => {
            let count = literal.parse().unwrap_or(u32::MAX);
            (count, Some(count))
        }
        Some(star) => {
            let min = if star == 0 {
                0
            } else {
                literal[..star].parse().unwrap_or(u32::MAX)
            };
            let max = if star + 1 == literal.len() {
                None
            } else {
                Some(literal[star + 1..].parse().unwrap_or(u32::MAX))
            };
            (min, max)
        }
    }
}

fn lex_char_val(input: &[u8], path: &Path) -> Element {
    // char-val = case-insensitive-string / case-sensitive-string; the
    // outer production choice drives sensitivity (RFC 7405).
    let string = path
        .children
        .first()
        .unwrap_or_else(|| shape_panic(path, "a char-val string"));
    let sensitive = matches!(
        string.matched_rule.as_deref(),
        Some(tag) if tag.eq_ignore_ascii_case("case-sensitive-string")
    );

    let quoted = expect_tagged(string, "quoted-string");
    let inner = String::from_utf8_lossy(&input[quoted.start + 1..quoted.end - 1]);
    Element::CharVal {
        sensitive,
        values: inner.chars().collect(),
    }
}

fn lex_num_val(input: &[u8], path: &Path) -> Element {
    let val = find_tagged_any(path, &["bin-val", "dec-val", "hex-val"])
        .unwrap_or_else(|| shape_panic(path, "a num-val body"));
    let base = match val.matched_rule.as_deref() {
        Some("bin-val") => Base::Binary,
        Some("dec-val") => Base::Decimal,
        _ => Base::Hexadecimal,
    };

    // Strip the base letter, then the separator decides the kind: the
    // grammar only ever uses "-" for a range and "." for a series.
    let body = text(input, val);
    let digits = &body.as_ref()[1..];
    if digits.contains('-') {
        Element::NumVal {
            base,
            kind: NumKind::Range,
            elems: digits.split('-').map(str::to_string).collect(),
        }
    } else {
        Element::NumVal {
            base,
            kind: NumKind::Series,
            elems: digits.split('.').map(str::to_string).collect(),
        }
    }
}

fn lex_prose_val(input: &[u8], path: &Path) -> Element {
    let inner = String::from_utf8_lossy(&input[path.start + 1..path.end - 1]);
    let segments = if inner.is_empty() {
        Vec::new()
    } else {
        vec![inner.into_owned()]
    };
    Element::ProseVal { segments }
}

fn text<'i>(input: &'i [u8], path: &Path) -> Cow<'i, str> {
    String::from_utf8_lossy(&input[path.start..path.end])
}

/// Collects the paths tagged `name`, in input order, descending only
/// through synthetic nodes. Tagged nodes bound the search: nothing inside
/// another rule match is reported.
fn collect_tagged<'p>(path: &'p Path, name: &str) -> Vec<&'p Path> {
    let mut out = Vec::new();
    collect_tagged_into(path, name, &mut out);
    out
}

fn collect_tagged_into<'p>(path: &'p Path, name: &str, out: &mut Vec<&'p Path>) {
    for child in &path.children {
        match child.matched_rule.as_deref() {
            Some(tag) if tag.eq_ignore_ascii_case(name) => out.push(child),
            Some(_) => {}
            None => collect_tagged_into(child, name, out),
        }
    }
}

fn find_tagged<'p>(path: &'p Path, name: &str) -> Option<&'p Path> {
    find_tagged_any(path, &[name])
}

fn find_tagged_any<'p>(path: &'p Path, names: &[&str]) -> Option<&'p Path> {
    for child in &path.children {
        match child.matched_rule.as_deref() {
            Some(tag) if names.iter().any(|name| tag.eq_ignore_ascii_case(name)) => {
                return Some(child)
            }
            Some(_) => {}
            None => {
                if let Some(found) = find_tagged_any(child, names) {
                    return Some(found);
                }
            }
        }
    }
    None
}

fn expect_tagged<'p>(path: &'p Path, name: &str) -> &'p Path {
    find_tagged(path, name).unwrap_or_else(|| shape_panic(path, name))
}

fn shape_panic(path: &Path, expected: &str) -> ! {
    panic!(
        "unhandlable path from {} to {}: expected {expected}; this is a bug, please open an issue",
        path.start, path.end
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_val(values: &str) -> Element {
        Element::CharVal {
            sensitive: false,
            values: values.chars().collect(),
        }
    }

    fn single_rule(name: &str, element: Element) -> Grammar {
        Grammar::from_rules([Rule {
            name: name.to_string(),
            alternation: Alternation {
                concatenations: vec![Concatenation {
                    repetitions: vec![Repetition {
                        min: 1,
                        max: Some(1),
                        element,
                    }],
                }],
            },
        }])
        .unwrap()
    }

    fn first_repetition(grammar: &Grammar, name: &str) -> Repetition {
        grammar.get_rule(name).unwrap().alternation.concatenations[0].repetitions[0].clone()
    }

    #[test]
    fn it_lexes_a_single_char_val_rule() {
        let grammar = parse_abnf(b"a = \"a\"\r\n").unwrap();
        assert_eq!(grammar, single_rule("a", char_val("a")));
    }

    #[test]
    fn it_lexes_empty_char_vals() {
        let grammar = parse_abnf(b"a = \"\"\r\n").unwrap();
        assert_eq!(grammar, single_rule("a", char_val("")));

        let grammar = parse_abnf(b"a = \"abc\"\r\n").unwrap();
        assert_eq!(grammar, single_rule("a", char_val("abc")));
    }

    #[test]
    fn it_lexes_sensitivity_prefixes() {
        let insensitive = parse_abnf(b"a = %i\"aB\"\r\n").unwrap();
        assert_eq!(insensitive, single_rule("a", char_val("aB")));

        let sensitive = parse_abnf(b"a = %s\"aB\"\r\n").unwrap();
        assert_eq!(
            sensitive,
            single_rule(
                "a",
                Element::CharVal {
                    sensitive: true,
                    values: vec!['a', 'B'],
                }
            )
        );
    }

    #[test]
    fn it_lexes_repeat_counts() {
        for (source, min, max) in [
            ("a = 3*5\"x\"\r\n", 3, Some(5)),
            ("a = *4\"x\"\r\n", 0, Some(4)),
            ("a = 2*\"x\"\r\n", 2, None),
            ("a = *\"x\"\r\n", 0, None),
            ("a = 7\"x\"\r\n", 7, Some(7)),
        ] {
            let grammar = parse_abnf(source.as_bytes()).unwrap();
            let repetition = first_repetition(&grammar, "a");
            assert_eq!((repetition.min, repetition.max), (min, max), "{source}");
        }
    }

    #[test]
    fn it_lexes_num_vals() {
        let grammar = parse_abnf(b"a = %d13.10\r\n").unwrap();
        assert_eq!(
            first_repetition(&grammar, "a").element,
            Element::NumVal {
                base: Base::Decimal,
                kind: NumKind::Series,
                elems: vec!["13".into(), "10".into()],
            }
        );

        let grammar = parse_abnf(b"a = %x41-5A\r\n").unwrap();
        assert_eq!(
            first_repetition(&grammar, "a").element,
            Element::NumVal {
                base: Base::Hexadecimal,
                kind: NumKind::Range,
                elems: vec!["41".into(), "5A".into()],
            }
        );

        let grammar = parse_abnf(b"a = %b1010\r\n").unwrap();
        assert_eq!(
            first_repetition(&grammar, "a").element,
            Element::NumVal {
                base: Base::Binary,
                kind: NumKind::Series,
                elems: vec!["1010".into()],
            }
        );
    }

    #[test]
    fn it_lexes_prose_vals() {
        let grammar = parse_abnf(b"a = <free text>\r\n").unwrap();
        assert_eq!(
            first_repetition(&grammar, "a").element,
            Element::ProseVal {
                segments: vec!["free text".into()],
            }
        );

        let grammar = parse_abnf(b"a = <>\r\n").unwrap();
        assert_eq!(
            first_repetition(&grammar, "a").element,
            Element::ProseVal {
                segments: Vec::new(),
            }
        );
    }

    #[test]
    fn it_lexes_groups_and_options() {
        let grammar = parse_abnf_with(
            b"example = some-rule (\"a\" / \"b\") [\"c\"]\r\n",
            &ParseAbnfOptions {
                validate: false,
                ..Default::default()
            },
        )
        .unwrap();
        let repetitions =
            &grammar.get_rule("example").unwrap().alternation.concatenations[0].repetitions;
        assert_eq!(repetitions.len(), 3);
        assert_eq!(
            repetitions[0].element,
            Element::Rulename {
                name: "some-rule".into(),
            }
        );
        assert_eq!(
            repetitions[1].element,
            Element::Group(Alternation {
                concatenations: vec![
                    Concatenation {
                        repetitions: vec![Repetition {
                            min: 1,
                            max: Some(1),
                            element: char_val("a"),
                        }],
                    },
                    Concatenation {
                        repetitions: vec![Repetition {
                            min: 1,
                            max: Some(1),
                            element: char_val("b"),
                        }],
                    },
                ],
            })
        );
        assert!(matches!(&repetitions[2].element, Element::Option(_)));
    }

    #[test]
    fn it_merges_incremental_alternatives() {
        let grammar = parse_abnf(b"a = \"a\"\r\na =/ \"b\"\r\n").unwrap();
        let rule = grammar.get_rule("a").unwrap();
        assert_eq!(rule.alternation.concatenations.len(), 2);
    }

    #[test]
    fn it_rejects_duplicated_rules() {
        let err = parse_abnf(b"a = \"a\"\r\na = \"b\"\r\n").unwrap_err();
        assert!(matches!(err, Error::DuplicatedRule { rulename } if rulename == "a"));
    }

    #[test]
    fn it_rejects_incremental_alternatives_on_missing_rules() {
        let err = parse_abnf(b"a =/ \"b\"\r\n").unwrap_err();
        assert!(matches!(err, Error::RuleNotFound { rulename } if rulename == "a"));
    }

    #[test]
    fn it_polices_core_rule_modification() {
        let source = b"ALPHA = \"@\"\r\nALPHA =/ \"#\"\r\n";

        let err = parse_abnf(source).unwrap_err();
        assert!(matches!(err, Error::CoreRuleModify { rulename } if rulename == "ALPHA"));

        let options = ParseAbnfOptions {
            redefine_core_rules: true,
            ..Default::default()
        };
        let grammar = parse_abnf_with(source, &options).unwrap();
        let alpha = grammar.get_rule("alpha").unwrap();
        assert_eq!(alpha.alternation.concatenations.len(), 2);
    }

    #[test]
    fn it_skips_comments_and_empty_lines() {
        let source = b"; a leading comment\r\n\r\na = \"a\" ; trailing\r\n  \r\nb = a\r\n";
        let grammar = parse_abnf(source).unwrap();
        assert_eq!(grammar.len(), 2);
    }

    #[test]
    fn it_rejects_lf_only_line_endings() {
        assert!(matches!(
            parse_abnf(b"a = \"a\"\n"),
            Err(Error::NoSolutionFound)
        ));
    }

    #[test]
    fn it_rejects_empty_input() {
        assert!(matches!(parse_abnf(b""), Err(Error::NoSolutionFound)));
    }

    #[test]
    fn it_validates_by_default() {
        let err = parse_abnf(b"a = b\r\n").unwrap_err();
        assert!(matches!(err, Error::DependencyNotFound { rulename } if rulename == "b"));

        let options = ParseAbnfOptions {
            validate: false,
            ..Default::default()
        };
        assert!(parse_abnf_with(b"a = b\r\n", &options).is_ok());
    }

    #[test]
    fn it_lexes_multiline_rules() {
        let source = b"a = \"x\"\r\n      / \"y\"\r\n";
        let grammar = parse_abnf(source).unwrap();
        assert_eq!(
            grammar.get_rule("a").unwrap().alternation.concatenations.len(),
            2
        );
    }

    #[test]
    fn it_round_trips_grammars_through_printing() {
        for source in [
            "a = \"a\"\r\n",
            "a = 2*4\"ab\" / %x41-5A\r\nb = a [a] (a / \"c\")\r\n",
            "a = %s\"Case\" %d13.10 *a\r\n",
            "a = <prose>\r\n",
        ] {
            let grammar = parse_abnf(source.as_bytes()).unwrap();
            let printed = grammar.to_string();
            let reparsed = parse_abnf(printed.as_bytes()).unwrap();
            assert_eq!(grammar, reparsed, "round-trip failed for {source}");
        }
    }

    #[test]
    fn it_parses_the_abnf_of_abnf_back_to_itself() {
        let printed = ABNF.to_string();
        let reparsed = parse_abnf(printed.as_bytes()).unwrap();
        assert_eq!(*ABNF, reparsed);
    }
}
