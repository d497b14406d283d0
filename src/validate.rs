//! Semantic validation of a grammar.

use crate::ast::{Alternation, Element, Grammar};
use crate::dag::dependencies;
use crate::numval::numval_to_code_point;
use crate::Error;

/// Checks the semantics of a grammar, stopping at the first problem:
/// every rulename dependency must resolve, every repetition must satisfy
/// `min <= max` (unbounded counts as +inf), and every num-val literal must
/// denote a Unicode code point.
pub fn validate(grammar: &Grammar) -> Result<(), Error> {
    for rule in grammar.rules() {
        for dependency in dependencies(&rule.alternation) {
            if grammar.get_rule(&dependency).is_none() {
                return Err(Error::DependencyNotFound {
                    rulename: dependency,
                });
            }
        }
    }

    for rule in grammar.rules() {
        validate_alternation(&rule.alternation)?;
    }
    Ok(())
}

impl Grammar {
    /// See [`validate`].
    pub fn validate(&self) -> Result<(), Error> {
        validate(self)
    }
}

fn validate_alternation(alternation: &Alternation) -> Result<(), Error> {
    for concatenation in &alternation.concatenations {
        for repetition in &concatenation.repetitions {
            if repetition.max.is_some_and(|max| repetition.min > max) {
                return Err(Error::SemanticRepetition {
                    repetition: repetition.to_string(),
                });
            }
            match &repetition.element {
                Element::Group(alternation) | Element::Option(alternation) => {
                    validate_alternation(alternation)?;
                }
                Element::NumVal { base, elems, .. } => {
                    for elem in elems {
                        numval_to_code_point(elem, *base)?;
                    }
                }
                _ => {}
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{parse_abnf_with, ParseAbnfOptions};
    use crate::Base;

    fn unvalidated(source: &str) -> Grammar {
        parse_abnf_with(
            source.as_bytes(),
            &ParseAbnfOptions {
                validate: false,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn it_accepts_well_formed_grammars() {
        let grammar = unvalidated("a = b [2*4b]\r\nb = %x61 / 1*DIGIT\r\n");
        assert!(validate(&grammar).is_ok());
    }

    #[test]
    fn it_reports_missing_dependencies() {
        let grammar = unvalidated("a = b\r\n");
        let err = validate(&grammar).unwrap_err();
        assert!(matches!(err, Error::DependencyNotFound { rulename } if rulename == "b"));
    }

    #[test]
    fn it_finds_dependencies_inside_groups_and_options() {
        let grammar = unvalidated("a = (\"x\" / [ghost])\r\n");
        let err = validate(&grammar).unwrap_err();
        assert!(matches!(err, Error::DependencyNotFound { rulename } if rulename == "ghost"));
    }

    #[test]
    fn it_rejects_inverted_repetition_bounds() {
        let grammar = unvalidated("a = 3*2\"x\"\r\n");
        let err = validate(&grammar).unwrap_err();
        assert!(matches!(err, Error::SemanticRepetition { .. }));
    }

    #[test]
    fn it_accepts_unbounded_repetitions() {
        let grammar = unvalidated("a = 42*\"x\"\r\n");
        assert!(validate(&grammar).is_ok());
    }

    #[test]
    fn it_rejects_out_of_range_num_vals() {
        let grammar = unvalidated("a = %x110000\r\n");
        let err = validate(&grammar).unwrap_err();
        assert!(matches!(
            err,
            Error::TooLargeNumeral {
                base: Base::Hexadecimal,
                value,
            } if value == "110000"
        ));

        let grammar = unvalidated("a = %d1114111\r\n");
        assert!(validate(&grammar).is_ok());
    }
}
