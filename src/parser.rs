//! The generic top-down backtracking parser.
//!
//! [`parse`] consumes an input against any [`Grammar`] rule and returns
//! *every* derivation that consumes the whole input. An empty result means
//! "no parse"; more than one result means the grammar is ambiguous, which
//! is a legal outcome here — only the ABNF meta-parser in [`crate::lexer`]
//! treats it as an error.
//!
//! Three mutually recursive solvers work on alternations, repetitions and
//! elements. Each solver returns the set of paths rooted at the same start
//! offset with every reachable end offset; the concatenation fold extends
//! each path with every solution of the next repetition.

use crate::ast::{Alternation, Element, Grammar, NumKind, Repetition};
use crate::numval::{decode_code_point, numval_to_code_point};
use crate::Error;

/// A node of a derivation tree: the portion of the input from `start` to
/// `end` matched `matched_rule`. `None` marks a synthetic node produced by
/// alternation/concatenation/repetition plumbing rather than a rule match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub children: Vec<Path>,
    pub matched_rule: Option<String>,
    pub start: usize,
    pub end: usize,
}

impl Path {
    fn empty_at(index: usize) -> Self {
        Path {
            children: Vec::new(),
            matched_rule: None,
            start: index,
            end: index,
        }
    }

    fn is_empty_span(&self) -> bool {
        self.start == self.end
    }
}

/// Knobs of the generic parser.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Maximum element recursion depth, `None` for unlimited. When the
    /// bound is hit the element under scrutiny simply yields no matches.
    /// The ABNF meta-parser disables the bound for its own grammar, which
    /// is known to terminate.
    pub deepness_threshold: Option<usize>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            deepness_threshold: Some(1024),
        }
    }
}

/// Parses `input` under `root_rulename` and returns every whole-input
/// derivation, with default options.
pub fn parse(input: &[u8], grammar: &Grammar, root_rulename: &str) -> Result<Vec<Path>, Error> {
    parse_with(input, grammar, root_rulename, &ParseOptions::default())
}

/// Parses `input` under `root_rulename` and returns every whole-input
/// derivation.
pub fn parse_with(
    input: &[u8],
    grammar: &Grammar,
    root_rulename: &str,
    options: &ParseOptions,
) -> Result<Vec<Path>, Error> {
    let root = grammar
        .get_rule(root_rulename)
        .ok_or_else(|| Error::RuleNotFound {
            rulename: root_rulename.to_string(),
        })?;
    tracing::trace!(
        root = root_rulename,
        input_len = input.len(),
        "parsing input"
    );

    let solver = Solver {
        grammar,
        input,
        deepness_threshold: options.deepness_threshold,
    };
    let possibilities = solver.solve_alternation(&root.alternation, 0, 0)?;

    // Keep the derivations that consumed the whole input, tagged as the
    // root rule so they read like any other rule match.
    let solutions: Vec<Path> = possibilities
        .into_iter()
        .filter(|possibility| possibility.end == input.len())
        .map(|mut possibility| {
            possibility.matched_rule = Some(root_rulename.to_string());
            possibility
        })
        .collect();
    tracing::trace!(solutions = solutions.len(), "parse complete");
    Ok(solutions)
}

impl Grammar {
    /// Whether at least one whole-input derivation of `input` exists under
    /// `rulename`.
    ///
    /// Refuses rules that are not left-terminating with
    /// [`Error::CyclicRule`]: those cannot be decided without unbounded
    /// recursion.
    pub fn is_valid(&self, rulename: &str, input: &[u8]) -> Result<bool, Error> {
        if !self.is_left_terminating(rulename)? {
            return Err(Error::CyclicRule {
                rulename: rulename.to_string(),
            });
        }
        Ok(!parse(input, self, rulename)?.is_empty())
    }
}

struct Solver<'a> {
    grammar: &'a Grammar,
    input: &'a [u8],
    deepness_threshold: Option<usize>,
}

impl Solver<'_> {
    fn solve_alternation(
        &self,
        alternation: &Alternation,
        index: usize,
        depth: usize,
    ) -> Result<Vec<Path>, Error> {
        let mut out = Vec::new();
        for concatenation in &alternation.concatenations {
            let Some((first, rest)) = concatenation.repetitions.split_first() else {
                continue;
            };

            // Init with the first repetition, then fold: extend each path
            // by every solution of the next repetition at the path's end.
            let mut possibilities: Vec<Path> = self
                .solve_repetition(first, index, depth)?
                .into_iter()
                .map(|possibility| Path {
                    end: possibility.end,
                    children: vec![possibility],
                    matched_rule: None,
                    start: index,
                })
                .collect();

            for repetition in rest {
                let mut extended = Vec::new();
                for possibility in &possibilities {
                    for solution in self.solve_repetition(repetition, possibility.end, depth)? {
                        // An empty contribution carries the previous path
                        // forward unchanged instead of multiplying it.
                        if solution.is_empty_span() {
                            extended.push(possibility.clone());
                            continue;
                        }

                        // A trailing zero-length child is bookkeeping from
                        // an earlier empty repetition, not a match.
                        let mut children = possibility.children.clone();
                        if children.last().is_some_and(Path::is_empty_span) {
                            children.pop();
                        }
                        let end = solution.end;
                        children.push(solution);
                        extended.push(Path {
                            children,
                            matched_rule: None,
                            start: index,
                            end,
                        });
                    }
                }
                possibilities = extended;
            }

            out.extend(possibilities);
        }
        Ok(out)
    }

    fn solve_repetition(
        &self,
        repetition: &Repetition,
        index: usize,
        depth: usize,
    ) -> Result<Vec<Path>, Error> {
        // rounds[i] holds every path covering i+1 occurrences.
        let mut rounds: Vec<Vec<Path>> = Vec::new();
        if self.keep_going(repetition, index, 0) {
            let mut current = self.solve_element(&repetition.element, index, depth)?;
            let mut occurrences = 1u32;
            while !current.is_empty() && self.keep_going(repetition, index, occurrences) {
                let mut next = Vec::new();
                let mut progressed = false;
                for possibility in &current {
                    for solution in
                        self.solve_element(&repetition.element, possibility.end, depth)?
                    {
                        if solution.end > possibility.end {
                            progressed = true;
                        }
                        let mut children = if occurrences == 1 {
                            vec![possibility.clone()]
                        } else {
                            possibility.children.clone()
                        };
                        let end = solution.end;
                        children.push(solution);
                        next.push(Path {
                            children,
                            matched_rule: None,
                            start: possibility.start,
                            end,
                        });
                    }
                }
                // An unbounded repetition over zero-length matches would
                // keep producing the same spans forever; stop as soon as a
                // whole round makes no progress.
                if repetition.max.is_none() && !progressed {
                    next.clear();
                }
                rounds.push(std::mem::replace(&mut current, next));
                occurrences += 1;
            }
            rounds.push(current);
        }

        let lowest = repetition.min.max(1) as usize;
        let mut paths: Vec<Path> = rounds
            .into_iter()
            .enumerate()
            .filter(|(round, _)| round + 1 >= lowest)
            .flat_map(|(_, set)| set)
            .collect();

        // Taking the repetition zero times is itself a solution.
        if repetition.min == 0 {
            paths.push(Path::empty_at(index));
        }
        Ok(paths)
    }

    /// Lookahead guard: whether attempting one more occurrence can make
    /// sense at all, given the remaining input and the repetition bounds.
    fn keep_going(&self, repetition: &Repetition, index: usize, occurrences: u32) -> bool {
        let could_handle = match &repetition.element {
            Element::NumVal { .. } => index < self.input.len(),
            Element::CharVal { values, .. } => index + values.len() <= self.input.len(),
            _ => true,
        };
        match repetition.max {
            None => could_handle,
            Some(max) => could_handle && occurrences < max,
        }
    }

    fn solve_element(
        &self,
        element: &Element,
        index: usize,
        depth: usize,
    ) -> Result<Vec<Path>, Error> {
        if self
            .deepness_threshold
            .is_some_and(|threshold| depth >= threshold)
        {
            return Ok(Vec::new());
        }
        let depth = depth + 1;

        match element {
            Element::Rulename { name } => {
                let rule = self
                    .grammar
                    .get_rule(name)
                    .ok_or_else(|| Error::RuleNotFound {
                        rulename: name.clone(),
                    })?;
                let mut paths = self.solve_alternation(&rule.alternation, index, depth)?;
                for path in &mut paths {
                    path.matched_rule = Some(name.clone());
                }
                Ok(paths)
            }

            // An option is a 0*1 repetition of the equivalent group.
            Element::Option(alternation) => self.solve_repetition(
                &Repetition {
                    min: 0,
                    max: Some(1),
                    element: Element::Group(alternation.clone()),
                },
                index,
                depth,
            ),

            Element::Group(alternation) => self.solve_alternation(alternation, index, depth),

            Element::NumVal { base, kind, elems } => {
                let mut paths = Vec::new();
                match kind {
                    NumKind::Range => {
                        let (Some(lo), Some(hi)) = (elems.first(), elems.get(1)) else {
                            return Ok(paths);
                        };
                        let (Ok(lo), Ok(hi)) = (
                            numval_to_code_point(lo, *base),
                            numval_to_code_point(hi, *base),
                        ) else {
                            return Ok(paths);
                        };
                        if let Some((code_point, width)) = decode_code_point(self.input, index) {
                            if lo <= code_point && code_point <= hi {
                                paths.push(Path {
                                    children: Vec::new(),
                                    matched_rule: None,
                                    start: index,
                                    end: index + width,
                                });
                            }
                        }
                    }
                    NumKind::Series => {
                        let mut cursor = index;
                        let mut matches = true;
                        for elem in elems {
                            let Ok(expected) = numval_to_code_point(elem, *base) else {
                                matches = false;
                                break;
                            };
                            match decode_code_point(self.input, cursor) {
                                Some((code_point, width)) if code_point == expected => {
                                    cursor += width;
                                }
                                _ => {
                                    matches = false;
                                    break;
                                }
                            }
                        }
                        if matches {
                            paths.push(Path {
                                children: Vec::new(),
                                matched_rule: None,
                                start: index,
                                end: cursor,
                            });
                        }
                    }
                }
                Ok(paths)
            }

            Element::CharVal { sensitive, values } => {
                let mut cursor = index;
                let mut matches = true;
                for &value in values {
                    match decode_code_point(self.input, cursor) {
                        Some((code_point, width))
                            if code_points_equal(value as u32, code_point, *sensitive) =>
                        {
                            cursor += width;
                        }
                        _ => {
                            matches = false;
                            break;
                        }
                    }
                }
                let mut paths = Vec::new();
                if matches {
                    paths.push(Path {
                        children: Vec::new(),
                        matched_rule: None,
                        start: index,
                        end: cursor,
                    });
                }
                Ok(paths)
            }

            Element::ProseVal { .. } => Err(Error::HandlingProseVal),
        }
    }
}

/// RFC 7405 comparison: only ASCII letters fold, everything else compares
/// by code point.
fn code_points_equal(target: u32, actual: u32, sensitive: bool) -> bool {
    if sensitive {
        target == actual
    } else {
        fold_ascii(target) == fold_ascii(actual)
    }
}

fn fold_ascii(code_point: u32) -> u32 {
    match code_point {
        0x41..=0x5A => code_point + 0x20,
        _ => code_point,
    }
}
