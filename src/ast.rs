//! The ABNF data model.
//!
//! A [`Grammar`] owns its [`Rule`]s, a rule body is an [`Alternation`] of
//! [`Concatenation`]s of [`Repetition`]s, and every repetition carries one
//! [`Element`]. The tree is fully owned, equality is structural, and rule
//! references are by name only — dependency cycles live in the separate
//! graph built by [`crate::dag`], never in the model itself.

use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;

use crate::rules;
use crate::Error;

/// An ABNF grammar: a set of rules with unique, case-insensitive names.
///
/// Read-only once built. Constructed by [`crate::parse_abnf`], or by hand
/// through [`Grammar::from_rules`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grammar {
    /// Rules keyed by their lower-cased name.
    pub(crate) rulemap: BTreeMap<String, Rule>,
    /// Whether rules of this grammar shadow the RFC 5234 core rules during
    /// lookup. Captured at construction so every downstream operation
    /// resolves names under the same policy.
    pub(crate) redefine_core_rules: bool,
}

impl Grammar {
    /// Builds a grammar from hand-constructed rules.
    pub fn from_rules(rules: impl IntoIterator<Item = Rule>) -> Result<Self, Error> {
        let mut rulemap = BTreeMap::new();
        for rule in rules {
            let key = rule.name.to_ascii_lowercase();
            if rulemap.contains_key(&key) {
                return Err(Error::DuplicatedRule { rulename: rule.name });
            }
            rulemap.insert(key, rule);
        }
        Ok(Self {
            rulemap,
            redefine_core_rules: false,
        })
    }

    /// Resolves a rule by name, case-insensitively, against this grammar
    /// and the core rules. Core rules win unless the grammar was built with
    /// core-rule redefinition enabled.
    pub fn get_rule(&self, rulename: &str) -> Option<&Rule> {
        rules::get_rule(rulename, &self.rulemap, self.redefine_core_rules)
    }

    /// Iterates over the rules of this grammar, in name order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rulemap.values()
    }

    /// Number of rules in this grammar.
    pub fn len(&self) -> usize {
        self.rulemap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rulemap.is_empty()
    }

    /// Renders the grammar with rule names right-padded to a common width.
    pub fn pretty_print(&self) -> String {
        let width = self
            .rulemap
            .values()
            .map(|rule| rule.name.len())
            .max()
            .unwrap_or(0);
        let mut out = String::new();
        for rule in self.rulemap.values() {
            out.push_str(&format!(
                "{:<width$} = {}\r\n",
                rule.name, rule.alternation
            ));
        }
        out
    }
}

/// Renders each rule on its own CRLF-terminated line, as required by the
/// ABNF specification. Comments and the original rule order are not
/// preserved; rules come out in name order.
impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in self.rulemap.values() {
            write!(f, "{rule}\r\n")?;
        }
        Ok(())
    }
}

/// A named ABNF production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Rule name. Case-insensitive per RFC 5234 Section 2.1.
    pub name: String,
    pub alternation: Alternation,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.alternation)
    }
}

/// An ordered choice between concatenations.
///
/// Order only matters to deterministic consumers (the generator picks by
/// index, the transition-graph builder lays entrypoints out in order); the
/// parser explores every branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternation {
    pub concatenations: Vec<Concatenation>,
}

impl fmt::Display for Alternation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.concatenations.iter().map(|c| c.to_string()).join(" / ")
        )
    }
}

/// An ordered sequence of repetitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concatenation {
    pub repetitions: Vec<Repetition>,
}

impl fmt::Display for Concatenation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.repetitions.iter().map(|r| r.to_string()).join(" ")
        )
    }
}

/// A bounded repetition of one element. `max == None` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repetition {
    pub min: u32,
    pub max: Option<u32>,
    pub element: Element,
}

impl fmt::Display for Repetition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if self.min == max => {
                if self.min != 1 {
                    write!(f, "{}", self.min)?;
                }
            }
            max => {
                if self.min != 0 {
                    write!(f, "{}", self.min)?;
                }
                write!(f, "*")?;
                if let Some(max) = max {
                    write!(f, "{max}")?;
                }
            }
        }
        write!(f, "{}", self.element)
    }
}

/// The six element variants of an ABNF repetition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    /// A case-insensitive reference to another rule.
    Rulename { name: String },
    /// A parenthesised sub-alternation.
    Group(Alternation),
    /// A bracketed sub-alternation, equivalent to a `0*1` group.
    Option(Alternation),
    /// A quoted literal, matched code point by code point. ASCII letters
    /// compare case-insensitively unless `sensitive` is set (RFC 7405).
    /// An empty `values` list is legal and matches the empty string.
    CharVal { sensitive: bool, values: Vec<char> },
    /// A numeric literal: either an ordered series of code points or an
    /// inclusive range (exactly two entries, low then high).
    NumVal {
        base: Base,
        kind: NumKind,
        elems: Vec<String>,
    },
    /// A free-text `<...>` placeholder. Legal to parse, but every derived
    /// artifact refuses it.
    ProseVal { segments: Vec<String> },
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Rulename { name } => write!(f, "{name}"),
            Element::Group(alternation) => write!(f, "({alternation})"),
            Element::Option(alternation) => write!(f, "[{alternation}]"),
            Element::CharVal { sensitive, values } => {
                if *sensitive {
                    write!(f, "%s")?;
                }
                write!(f, "\"")?;
                for value in values {
                    write!(f, "{value}")?;
                }
                write!(f, "\"")
            }
            Element::NumVal { base, kind, elems } => {
                let separator = match kind {
                    NumKind::Series => ".",
                    NumKind::Range => "-",
                };
                write!(f, "%{base}{}", elems.iter().join(separator))
            }
            Element::ProseVal { segments } => {
                write!(f, "<{}>", segments.concat())
            }
        }
    }
}

/// The numeral base of a num-val literal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, derive_more::Display)]
pub enum Base {
    #[display("b")]
    Binary,
    #[display("d")]
    Decimal,
    #[display("x")]
    Hexadecimal,
}

impl Base {
    pub fn radix(self) -> u32 {
        match self {
            Base::Binary => 2,
            Base::Decimal => 10,
            Base::Hexadecimal => 16,
        }
    }
}

/// Whether a num-val lists its code points or bounds a range of them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NumKind {
    Series,
    Range,
}
