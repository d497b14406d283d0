//! The RFC 5234 Section 8.1 core rules, the self-describing ABNF grammar,
//! and rule lookup.
//!
//! Both tables are process-wide immutable constants, initialised on first
//! use and never mutated. The hard-coded ABNF grammar deviates from the
//! pristine RFC text in two deliberate ways: the leading `*c-wsp` of
//! `rulelist` entries and of `elements` is `*WSP` per Errata 3076 and 2968,
//! and `char-val` is split into `case-insensitive-string` /
//! `case-sensitive-string` per RFC 7405.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::ast::{Alternation, Base, Concatenation, Element, Grammar, NumKind, Repetition, Rule};

/// Resolves a rule name, case-insensitively, against a rulemap and the core
/// rules.
///
/// By default (RFC 5234), core rules take precedence over the rulemap. When
/// `redefine_core_rules` is set, the rulemap wins and may shadow them.
pub fn get_rule<'a>(
    rulename: &str,
    rulemap: &'a BTreeMap<String, Rule>,
    redefine_core_rules: bool,
) -> Option<&'a Rule> {
    let key = rulename.to_ascii_lowercase();
    if redefine_core_rules {
        rulemap.get(&key).or_else(|| CORE_RULES.get(&key))
    } else {
        CORE_RULES.get(&key).or_else(|| rulemap.get(&key))
    }
}

/// Whether the name designates one of the 16 RFC 5234 core rules.
pub fn is_core_rule(rulename: &str) -> bool {
    CORE_RULES.contains_key(&rulename.to_ascii_lowercase())
}

fn rule(name: &str, alternation: Alternation) -> (String, Rule) {
    (
        name.to_ascii_lowercase(),
        Rule {
            name: name.to_string(),
            alternation,
        },
    )
}

fn alt(concatenations: Vec<Concatenation>) -> Alternation {
    Alternation { concatenations }
}

fn concat(repetitions: Vec<Repetition>) -> Concatenation {
    Concatenation { repetitions }
}

/// A concatenation of exactly one mandatory element.
fn single(element: Element) -> Concatenation {
    concat(vec![once(element)])
}

/// An alternation where every branch is one mandatory element.
fn choice(elements: Vec<Element>) -> Alternation {
    alt(elements.into_iter().map(single).collect())
}

fn once(element: Element) -> Repetition {
    Repetition {
        min: 1,
        max: Some(1),
        element,
    }
}

fn between(min: u32, max: Option<u32>, element: Element) -> Repetition {
    Repetition { min, max, element }
}

fn rulename(name: &str) -> Element {
    Element::Rulename {
        name: name.to_string(),
    }
}

fn chars(values: &str) -> Element {
    Element::CharVal {
        sensitive: false,
        values: values.chars().collect(),
    }
}

fn hex_range(lo: &str, hi: &str) -> Element {
    Element::NumVal {
        base: Base::Hexadecimal,
        kind: NumKind::Range,
        elems: vec![lo.to_string(), hi.to_string()],
    }
}

fn hex_series(elem: &str) -> Element {
    Element::NumVal {
        base: Base::Hexadecimal,
        kind: NumKind::Series,
        elems: vec![elem.to_string()],
    }
}

fn group(alternation: Alternation) -> Element {
    Element::Group(alternation)
}

fn optional(alternation: Alternation) -> Element {
    Element::Option(alternation)
}

/// The 16 core rules of RFC 5234 Section 8.1, keyed by lower-cased name.
pub static CORE_RULES: LazyLock<BTreeMap<String, Rule>> = LazyLock::new(|| {
    BTreeMap::from([
        // ALPHA = %x41-5A / %x61-7A
        rule(
            "ALPHA",
            choice(vec![hex_range("41", "5A"), hex_range("61", "7A")]),
        ),
        // BIT = "0" / "1"
        rule("BIT", choice(vec![chars("0"), chars("1")])),
        // CHAR = %x01-7F
        rule("CHAR", choice(vec![hex_range("01", "7F")])),
        // CR = %x0D
        rule("CR", choice(vec![hex_series("0D")])),
        // CRLF = CR LF
        rule(
            "CRLF",
            alt(vec![concat(vec![once(rulename("CR")), once(rulename("LF"))])]),
        ),
        // CTL = %x00-1F / %x7F
        rule("CTL", choice(vec![hex_range("00", "1F"), hex_series("7F")])),
        // DIGIT = %x30-39
        rule("DIGIT", choice(vec![hex_range("30", "39")])),
        // DQUOTE = %x22
        rule("DQUOTE", choice(vec![hex_series("22")])),
        // HEXDIG = DIGIT / "A" / "B" / "C" / "D" / "E" / "F"
        rule(
            "HEXDIG",
            choice(vec![
                rulename("DIGIT"),
                chars("A"),
                chars("B"),
                chars("C"),
                chars("D"),
                chars("E"),
                chars("F"),
            ]),
        ),
        // HTAB = %x09
        rule("HTAB", choice(vec![hex_series("09")])),
        // LF = %x0A
        rule("LF", choice(vec![hex_series("0A")])),
        // LWSP = *(WSP / CRLF WSP)
        rule(
            "LWSP",
            alt(vec![concat(vec![between(
                0,
                None,
                group(alt(vec![
                    single(rulename("WSP")),
                    concat(vec![once(rulename("CRLF")), once(rulename("WSP"))]),
                ])),
            )])]),
        ),
        // OCTET = %x00-FF
        rule("OCTET", choice(vec![hex_range("00", "FF")])),
        // SP = %x20
        rule("SP", choice(vec![hex_series("20")])),
        // VCHAR = %x21-7E
        rule("VCHAR", choice(vec![hex_range("21", "7E")])),
        // WSP = SP / HTAB
        rule("WSP", choice(vec![rulename("SP"), rulename("HTAB")])),
    ])
});

/// Body shared by `bin-val`, `dec-val` and `hex-val`:
/// `<letter> 1*<digit> [ 1*("." 1*<digit>) / ("-" 1*<digit>) ]`.
fn num_val_body(letter: &str, digit_rule: &str) -> Alternation {
    alt(vec![concat(vec![
        once(chars(letter)),
        between(1, None, rulename(digit_rule)),
        once(optional(alt(vec![
            concat(vec![between(
                1,
                None,
                group(alt(vec![concat(vec![
                    once(chars(".")),
                    between(1, None, rulename(digit_rule)),
                ])])),
            )]),
            single(group(alt(vec![concat(vec![
                once(chars("-")),
                between(1, None, rulename(digit_rule)),
            ])]))),
        ]))),
    ])])
}

/// The ABNF grammar of ABNF itself, expressed in the data model it parses
/// into. Parsing any ABNF source goes through this grammar.
pub static ABNF: LazyLock<Grammar> = LazyLock::new(|| {
    let rulemap = BTreeMap::from([
        // rulelist = 1*( rule / (*WSP c-nl) )   ; Errata 3076
        rule(
            "rulelist",
            alt(vec![concat(vec![between(
                1,
                None,
                group(alt(vec![
                    single(rulename("rule")),
                    single(group(alt(vec![concat(vec![
                        between(0, None, rulename("WSP")),
                        once(rulename("c-nl")),
                    ])]))),
                ])),
            )])]),
        ),
        // rule = rulename defined-as elements c-nl
        rule(
            "rule",
            alt(vec![concat(vec![
                once(rulename("rulename")),
                once(rulename("defined-as")),
                once(rulename("elements")),
                once(rulename("c-nl")),
            ])]),
        ),
        // rulename = ALPHA *(ALPHA / DIGIT / "-")
        rule(
            "rulename",
            alt(vec![concat(vec![
                once(rulename("ALPHA")),
                between(
                    0,
                    None,
                    group(choice(vec![
                        rulename("ALPHA"),
                        rulename("DIGIT"),
                        chars("-"),
                    ])),
                ),
            ])]),
        ),
        // defined-as = *c-wsp ("=" / "=/") *c-wsp
        rule(
            "defined-as",
            alt(vec![concat(vec![
                between(0, None, rulename("c-wsp")),
                once(group(choice(vec![chars("="), chars("=/")]))),
                between(0, None, rulename("c-wsp")),
            ])]),
        ),
        // elements = alternation *WSP   ; Errata 2968
        rule(
            "elements",
            alt(vec![concat(vec![
                once(rulename("alternation")),
                between(0, None, rulename("WSP")),
            ])]),
        ),
        // c-wsp = WSP / (c-nl WSP)
        rule(
            "c-wsp",
            alt(vec![
                single(rulename("WSP")),
                single(group(alt(vec![concat(vec![
                    once(rulename("c-nl")),
                    once(rulename("WSP")),
                ])]))),
            ]),
        ),
        // c-nl = comment / CRLF
        rule(
            "c-nl",
            choice(vec![rulename("comment"), rulename("CRLF")]),
        ),
        // comment = ";" *(WSP / VCHAR) CRLF
        rule(
            "comment",
            alt(vec![concat(vec![
                once(chars(";")),
                between(
                    0,
                    None,
                    group(choice(vec![rulename("WSP"), rulename("VCHAR")])),
                ),
                once(rulename("CRLF")),
            ])]),
        ),
        // alternation = concatenation *( *c-wsp "/" *c-wsp concatenation )
        rule(
            "alternation",
            alt(vec![concat(vec![
                once(rulename("concatenation")),
                between(
                    0,
                    None,
                    group(alt(vec![concat(vec![
                        between(0, None, rulename("c-wsp")),
                        once(chars("/")),
                        between(0, None, rulename("c-wsp")),
                        once(rulename("concatenation")),
                    ])])),
                ),
            ])]),
        ),
        // concatenation = repetition *( 1*c-wsp repetition )
        rule(
            "concatenation",
            alt(vec![concat(vec![
                once(rulename("repetition")),
                between(
                    0,
                    None,
                    group(alt(vec![concat(vec![
                        between(1, None, rulename("c-wsp")),
                        once(rulename("repetition")),
                    ])])),
                ),
            ])]),
        ),
        // repetition = [repeat] element
        rule(
            "repetition",
            alt(vec![concat(vec![
                once(optional(alt(vec![single(rulename("repeat"))]))),
                once(rulename("element")),
            ])]),
        ),
        // repeat = 1*DIGIT / (*DIGIT "*" *DIGIT)
        rule(
            "repeat",
            alt(vec![
                concat(vec![between(1, None, rulename("DIGIT"))]),
                single(group(alt(vec![concat(vec![
                    between(0, None, rulename("DIGIT")),
                    once(chars("*")),
                    between(0, None, rulename("DIGIT")),
                ])]))),
            ]),
        ),
        // element = rulename / group / option / char-val / num-val / prose-val
        rule(
            "element",
            choice(vec![
                rulename("rulename"),
                rulename("group"),
                rulename("option"),
                rulename("char-val"),
                rulename("num-val"),
                rulename("prose-val"),
            ]),
        ),
        // group = "(" *c-wsp alternation *c-wsp ")"
        rule(
            "group",
            alt(vec![concat(vec![
                once(chars("(")),
                between(0, None, rulename("c-wsp")),
                once(rulename("alternation")),
                between(0, None, rulename("c-wsp")),
                once(chars(")")),
            ])]),
        ),
        // option = "[" *c-wsp alternation *c-wsp "]"
        rule(
            "option",
            alt(vec![concat(vec![
                once(chars("[")),
                between(0, None, rulename("c-wsp")),
                once(rulename("alternation")),
                between(0, None, rulename("c-wsp")),
                once(chars("]")),
            ])]),
        ),
        // char-val = case-insensitive-string / case-sensitive-string
        // (RFC 7405 rendition)
        rule(
            "char-val",
            choice(vec![
                rulename("case-insensitive-string"),
                rulename("case-sensitive-string"),
            ]),
        ),
        // case-insensitive-string = [ "%i" ] quoted-string
        rule(
            "case-insensitive-string",
            alt(vec![concat(vec![
                once(optional(alt(vec![single(chars("%i"))]))),
                once(rulename("quoted-string")),
            ])]),
        ),
        // case-sensitive-string = "%s" quoted-string
        rule(
            "case-sensitive-string",
            alt(vec![concat(vec![
                once(chars("%s")),
                once(rulename("quoted-string")),
            ])]),
        ),
        // quoted-string = DQUOTE *(%x20-21 / %x23-7E) DQUOTE
        rule(
            "quoted-string",
            alt(vec![concat(vec![
                once(rulename("DQUOTE")),
                between(
                    0,
                    None,
                    group(choice(vec![hex_range("20", "21"), hex_range("23", "7E")])),
                ),
                once(rulename("DQUOTE")),
            ])]),
        ),
        // num-val = "%" (bin-val / dec-val / hex-val)
        rule(
            "num-val",
            alt(vec![concat(vec![
                once(chars("%")),
                once(group(choice(vec![
                    rulename("bin-val"),
                    rulename("dec-val"),
                    rulename("hex-val"),
                ]))),
            ])]),
        ),
        // bin-val = "b" 1*BIT [ 1*("." 1*BIT) / ("-" 1*BIT) ]
        rule("bin-val", num_val_body("b", "BIT")),
        // dec-val = "d" 1*DIGIT [ 1*("." 1*DIGIT) / ("-" 1*DIGIT) ]
        rule("dec-val", num_val_body("d", "DIGIT")),
        // hex-val = "x" 1*HEXDIG [ 1*("." 1*HEXDIG) / ("-" 1*HEXDIG) ]
        rule("hex-val", num_val_body("x", "HEXDIG")),
        // prose-val = "<" *(%x20-3D / %x3F-7E) ">"
        rule(
            "prose-val",
            alt(vec![concat(vec![
                once(chars("<")),
                between(
                    0,
                    None,
                    group(choice(vec![hex_range("20", "3D"), hex_range("3F", "7E")])),
                ),
                once(chars(">")),
            ])]),
        ),
    ]);

    Grammar {
        rulemap,
        redefine_core_rules: false,
    }
});
