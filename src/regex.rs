//! Regular-expression derivation.
//!
//! Compiles a non-cyclic rule down to a (deliberately unoptimised) regular
//! expression. The produced pattern is a superset matcher: it compiles
//! under standard engines and accepts at least every input the rule
//! accepts. Cyclic rules cannot be expressed and are refused, as are
//! prose-vals.

use itertools::Itertools;

use crate::ast::{Alternation, Element, Grammar, NumKind, Repetition};
use crate::numval::numval_to_code_point;
use crate::Error;

impl Grammar {
    /// Builds a regular expression validating `rulename`.
    pub fn regex(&self, rulename: &str) -> Result<String, Error> {
        if self.rule_contains_cycle(rulename)? {
            return Err(Error::CyclicRule {
                rulename: rulename.to_string(),
            });
        }
        let rule = self.get_rule(rulename).ok_or_else(|| Error::RuleNotFound {
            rulename: rulename.to_string(),
        })?;
        self.alternation_regex(&rule.alternation)
    }

    fn alternation_regex(&self, alternation: &Alternation) -> Result<String, Error> {
        let branches: Vec<String> = alternation
            .concatenations
            .iter()
            .map(|concatenation| {
                concatenation
                    .repetitions
                    .iter()
                    .map(|repetition| self.repetition_regex(repetition))
                    .collect::<Result<Vec<_>, _>>()
                    .map(|parts| parts.concat())
            })
            .collect::<Result<_, _>>()?;
        Ok(format!("({})", branches.iter().join("|")))
    }

    fn repetition_regex(&self, repetition: &Repetition) -> Result<String, Error> {
        let quantifier = match (repetition.min, repetition.max) {
            (min, Some(max)) if min == max => format!("{{{min}}}"),
            (0, None) => "*".to_string(),
            (0, Some(max)) => format!("{{0,{max}}}"),
            (min, None) => format!("{{{min},}}"),
            (min, Some(max)) => format!("{{{min},{max}}}"),
        };
        Ok(format!(
            "({}){quantifier}",
            self.element_regex(&repetition.element)?
        ))
    }

    fn element_regex(&self, element: &Element) -> Result<String, Error> {
        match element {
            Element::Rulename { name } => {
                let rule = self.get_rule(name).ok_or_else(|| Error::RuleNotFound {
                    rulename: name.clone(),
                })?;
                self.alternation_regex(&rule.alternation)
            }
            Element::Group(alternation) => {
                Ok(format!("({})", self.alternation_regex(alternation)?))
            }
            Element::Option(alternation) => {
                Ok(format!("({})?", self.alternation_regex(alternation)?))
            }
            Element::NumVal { base, kind, elems } => match kind {
                NumKind::Range => {
                    let (Some(low), Some(high)) = (elems.first(), elems.get(1)) else {
                        return Ok(String::new());
                    };
                    let low = numval_to_code_point(low, *base)?;
                    let high = numval_to_code_point(high, *base)?;
                    Ok(format!(
                        "[{}-{}]",
                        escape_code_point(low),
                        escape_code_point(high)
                    ))
                }
                NumKind::Series => {
                    let mut out = String::new();
                    for elem in elems {
                        out.push_str(&escape_code_point(numval_to_code_point(elem, *base)?));
                    }
                    Ok(out)
                }
            },
            Element::CharVal { sensitive, values } => {
                let mut out = String::new();
                for &value in values {
                    if !sensitive && value.is_ascii_alphabetic() {
                        // Insensitive letters accept both cases.
                        out.push_str(&format!(
                            "[{}{}]",
                            value.to_ascii_lowercase(),
                            value.to_ascii_uppercase()
                        ));
                    } else {
                        out.push_str(&escape_char(value));
                    }
                }
                Ok(out)
            }
            Element::ProseVal { .. } => Err(Error::HandlingProseVal),
        }
    }
}

fn escape_code_point(code_point: u32) -> String {
    match char::from_u32(code_point) {
        Some(c) => escape_char(c),
        None => format!("\\x{{{code_point:X}}}"),
    }
}

/// Escapes a code point for use inside and outside character classes.
/// Printable ASCII passes through (meta characters backslash-escaped),
/// everything else renders as a hex escape.
fn escape_char(c: char) -> String {
    match c {
        '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$'
        | '#' | '&' | '-' | '~' => format!("\\{c}"),
        c if c.is_ascii_graphic() || c == ' ' => c.to_string(),
        c => format!("\\x{{{:X}}}", c as u32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_abnf;
    use crate::rules::ABNF;
    use regex::Regex;

    fn grammar(source: &str) -> Grammar {
        parse_abnf(source.as_bytes()).unwrap()
    }

    fn compiled(grammar: &Grammar, rulename: &str) -> Regex {
        let pattern = grammar.regex(rulename).unwrap();
        Regex::new(&format!("^{pattern}$"))
            .unwrap_or_else(|e| panic!("derived regex does not compile: {e}"))
    }

    #[test]
    fn it_refuses_cyclic_rules() {
        let g = grammar("a = \"x\" [a]\r\n");
        assert!(matches!(
            g.regex("a"),
            Err(Error::CyclicRule { rulename }) if rulename == "a"
        ));
    }

    #[test]
    fn it_refuses_prose_vals() {
        let g = grammar("a = <free text>\r\n");
        assert!(matches!(g.regex("a"), Err(Error::HandlingProseVal)));
    }

    #[test]
    fn it_compiles_for_core_and_user_rules() {
        let g = grammar("a = 2*4\"ab\" (%x30-39 / \"-\") [%s\"end\"]\r\n");
        for rulename in ["a", "ALPHA", "DIGIT", "CRLF", "LWSP", "VCHAR"] {
            let pattern = g.regex(rulename).unwrap();
            assert!(
                Regex::new(&pattern).is_ok(),
                "{rulename} derived a non-compiling pattern: {pattern}"
            );
        }
    }

    #[test]
    fn it_accepts_what_the_rule_accepts() {
        let g = grammar("a = 2*4\"ab\" %d48-57\r\n");
        let re = compiled(&g, "a");
        assert!(re.is_match("abab5"));
        assert!(re.is_match("aBAbab9"));
        assert!(!re.is_match("ab"));
        assert!(!re.is_match("ababx"));
    }

    #[test]
    fn it_expands_num_val_series_as_sequences() {
        let g = grammar("a = %x61.62.63\r\n");
        let re = compiled(&g, "a");
        assert!(re.is_match("abc"));
        assert!(!re.is_match("a"));
        assert!(!re.is_match("cba"));
    }

    #[test]
    fn it_handles_non_ascii_ranges() {
        let g = grammar("a = %xE000-10FFFF\r\n");
        let re = compiled(&g, "a");
        assert!(re.is_match("\u{E123}"));
        assert!(!re.is_match("x"));
    }

    #[test]
    fn it_escapes_meta_characters() {
        let g = grammar("a = \"(\" \".\" \"*\" \")\"\r\n");
        let re = compiled(&g, "a");
        assert!(re.is_match("(.*)"));
        assert!(!re.is_match("x.*)"));
    }

    #[test]
    fn it_matches_every_generated_output() {
        let g = grammar("a = 1*4(ALPHA / DIGIT) [\"-\" 2*2%x30-39]\r\n");
        let re = compiled(&g, "a");
        for seed in 0..32 {
            let out = g.generate(seed, "a").unwrap();
            let text = String::from_utf8(out).unwrap();
            assert!(re.is_match(&text), "seed {seed} generated {text:?}");
        }
    }

    #[test]
    fn it_refuses_the_cyclic_meta_grammar_rules() {
        assert!(matches!(
            ABNF.regex("alternation"),
            Err(Error::CyclicRule { .. })
        ));
        assert!(ABNF.regex("rulename").is_ok());
    }
}
