//! RFC 5234 / RFC 7405 ABNF grammar engine.
//!
//! This crate parses Augmented Backus-Naur Form source into a [`Grammar`]
//! and then acts as a generic engine over *any* such grammar: parse an input
//! against a rule and get every derivation tree, generate reproducible
//! pseudo-random content, analyze the rule dependency graph, derive a
//! regular expression or a transition graph from a rule.
//!
//! The engine bootstraps itself: the ABNF grammar of ABNF is hard-coded in
//! the same data model ([`ABNF`]), and [`parse_abnf`] runs the generic
//! parser over it to lift your source into a fresh [`Grammar`].
//!
//! # Example
//!
//! ```
//! use abnf_kit::{parse, parse_abnf};
//!
//! # fn main() -> Result<(), abnf_kit::Error> {
//! let grammar = parse_abnf(b"greeting = \"hello\" [\" world\"]\r\n")?;
//! assert!(grammar.is_valid("greeting", b"Hello World")?);
//!
//! let derivations = parse(b"hello", &grammar, "greeting")?;
//! assert_eq!(derivations.len(), 1);
//!
//! let content = grammar.generate(42, "greeting")?;
//! assert!(grammar.is_valid("greeting", &content)?);
//!
//! // Non-cyclic rules also compile down to a regular expression.
//! let pattern = grammar.regex("greeting")?;
//! assert!(pattern.starts_with('('));
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod dag;
pub mod generate;
pub mod graph;
pub mod lexer;
pub mod numval;
pub mod parser;
pub mod regex;
pub mod rules;
pub mod validate;

pub use ast::{Alternation, Base, Concatenation, Element, Grammar, NumKind, Repetition, Rule};
pub use dag::{DepNode, Depgraph};
pub use generate::GenerateOptions;
pub use graph::{Node, NodeId, TransitionGraph, TransitionGraphOptions};
pub use lexer::{parse_abnf, parse_abnf_with, ParseAbnfOptions};
pub use numval::{code_point_to_numval, numval_to_code_point};
pub use parser::{parse, parse_with, ParseOptions, Path};
pub use rules::{ABNF, CORE_RULES};
pub use validate::validate;

/// Any error the engine can surface.
///
/// Every operation returns its first structured error; nothing is recovered
/// silently. "No parse" is not an error at the generic parser layer, it is
/// an empty solution set.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The ABNF meta-parser found no whole-input derivation.
    #[error("no solution found, input ABNF grammar may be invalid")]
    NoSolutionFound,

    /// The ABNF meta-parser found more than one whole-input derivation.
    /// The hard-coded grammar is believed unambiguous, so this is a library
    /// bug: please open an issue with the offending input.
    #[error("multiple solutions found, this should not happen, please open an issue")]
    MultipleSolutionsFound { paths: Vec<Path> },

    /// A referenced rule is neither a core rule nor part of the grammar.
    #[error("rule {rulename} was not found in grammar")]
    RuleNotFound { rulename: String },

    /// An incremental alternative (`=/`) targeted a core rule while core
    /// rule redefinition is disabled.
    #[error("core rule {rulename} can't be modified")]
    CoreRuleModify { rulename: String },

    /// Semantic validation: a rule depends on a rule that does not exist.
    #[error("unsatisfied dependency (rule) {rulename}")]
    DependencyNotFound { rulename: String },

    /// Semantic validation: a repetition has `min > max`.
    #[error("invalid repetition bounds for {repetition}")]
    SemanticRepetition { repetition: String },

    /// A num-val literal does not fit in the Unicode code point space.
    #[error("too large numeral value {value} for base {base}")]
    TooLargeNumeral { base: Base, value: String },

    /// A rule was `=`-defined twice.
    #[error("rule {rulename} was already defined in grammar")]
    DuplicatedRule { rulename: String },

    /// The requested operation needs the rule to be acyclic, and it is not.
    #[error("rule {rulename} involves an unavoidable cycle")]
    CyclicRule { rulename: String },

    /// The requested operation cannot give meaning to a prose-val.
    #[error("can't handle prose-val descriptions")]
    HandlingProseVal,

    /// The transition-graph builder refused to expand a repetition larger
    /// than the configured cap.
    #[error("repetition threshold of {threshold} reached")]
    RepetitionThreshold { threshold: u32 },
}
