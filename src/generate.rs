//! Seeded pseudo-random content generation.
//!
//! The walk is a pure function of the seed, the grammar, the rule and the
//! options: the PRNG is seeded ChaCha8, with no wall-clock or hash-seed
//! source anywhere. For a given seed the output is byte-exact, which makes
//! it a good corpus source for testing and fuzzing parsers.
//!
//! Termination rests on two mechanisms. A safety pre-check rejects rules
//! whose every expansion must re-enter a rule already in scope. During the
//! walk, branches are only picked among concatenations with a finite
//! minimal derivation height, and once the step budget is burnt the walk
//! turns deterministic and descends by strictly decreasing height, so even
//! avoidable recursion that emits nothing (`a = *a`) unwinds.

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::ast::{Alternation, Concatenation, Element, Grammar, NumKind};
use crate::numval::numval_to_code_point;
use crate::rules::CORE_RULES;
use crate::Error;

/// Knobs of the generator.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Cap applied to every repetition's maximum count.
    pub rep_max: u32,
    /// Once the output reaches this many bytes, optional content is
    /// skipped so generation stays bounded.
    pub threshold: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            rep_max: 16,
            threshold: 256,
        }
    }
}

/// Walk steps granted before choices become deterministic and minimal.
const WALK_STEP_LIMIT: usize = 65_536;

impl Grammar {
    /// Generates a pseudo-random input valid under `rulename`, with
    /// default options.
    pub fn generate(&self, seed: u64, rulename: &str) -> Result<Vec<u8>, Error> {
        self.generate_with(seed, rulename, &GenerateOptions::default())
    }

    /// Generates a pseudo-random input valid under `rulename`.
    ///
    /// Before emitting anything, a safety pre-check rejects rules that
    /// cannot be generated without unavoidable infinite recursion with
    /// [`Error::CyclicRule`]. Only mandatory paths count: a cycle behind a
    /// `min = 0` repetition or inside an option can always be avoided.
    pub fn generate_with(
        &self,
        seed: u64,
        rulename: &str,
        options: &GenerateOptions,
    ) -> Result<Vec<u8>, Error> {
        let rule = self.get_rule(rulename).ok_or_else(|| Error::RuleNotFound {
            rulename: rulename.to_string(),
        })?;

        let scope = vec![rulename.to_ascii_lowercase()];
        if !self.alternation_generable(&rule.alternation, &scope) {
            return Err(Error::CyclicRule {
                rulename: rulename.to_string(),
            });
        }

        tracing::trace!(seed, rule = rulename, "generating content");
        let mut walker = Walker {
            grammar: self,
            options,
            heights: self.derivation_heights(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            out: Vec::new(),
            steps: 0,
        };
        walker.walk_alternation(&rule.alternation)?;
        tracing::trace!(bytes = walker.out.len(), "generation complete");
        Ok(walker.out)
    }

    /// Whether at least one concatenation can be emitted without
    /// re-entering a rule already on the scope stack through a mandatory
    /// path.
    fn alternation_generable(&self, alternation: &Alternation, scope: &[String]) -> bool {
        alternation
            .concatenations
            .iter()
            .any(|concatenation| self.concatenation_generable(concatenation, scope))
    }

    fn concatenation_generable(&self, concatenation: &Concatenation, scope: &[String]) -> bool {
        concatenation.repetitions.iter().all(|repetition| {
            if repetition.min == 0 {
                return true;
            }
            match &repetition.element {
                Element::Option(_) => true,
                element => self.element_generable(element, scope),
            }
        })
    }

    fn element_generable(&self, element: &Element, scope: &[String]) -> bool {
        match element {
            Element::Rulename { name } => {
                let key = name.to_ascii_lowercase();
                if scope.contains(&key) {
                    return false;
                }
                let Some(rule) = self.get_rule(name) else {
                    return false;
                };
                let mut scope = scope.to_vec();
                scope.push(key);
                self.alternation_generable(&rule.alternation, &scope)
            }
            Element::Group(alternation) => self.alternation_generable(alternation, scope),
            Element::Option(_)
            | Element::CharVal { .. }
            | Element::NumVal { .. }
            | Element::ProseVal { .. } => true,
        }
    }

    /// Minimal derivation height per resolvable rule name, computed to a
    /// fixpoint. A rule that never terminates (or references a missing
    /// rule on every mandatory path) gets no entry.
    fn derivation_heights(&self) -> HashMap<String, u32> {
        let mut heights = HashMap::new();
        let names: Vec<&str> = CORE_RULES
            .keys()
            .chain(self.rulemap.keys())
            .map(String::as_str)
            .collect();

        loop {
            let mut changed = false;
            for name in &names {
                let Some(rule) = self.get_rule(name) else {
                    continue;
                };
                let Some(height) = alternation_height(&rule.alternation, &heights) else {
                    continue;
                };
                let height = height + 1;
                let entry = heights.entry(name.to_string()).or_insert(u32::MAX);
                if height < *entry {
                    *entry = height;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        heights
    }
}

fn alternation_height(alternation: &Alternation, heights: &HashMap<String, u32>) -> Option<u32> {
    alternation
        .concatenations
        .iter()
        .filter_map(|concatenation| concatenation_height(concatenation, heights))
        .min()
}

/// Height of a concatenation: its tallest mandatory element. `None` when a
/// mandatory element cannot derive anything finite.
fn concatenation_height(
    concatenation: &Concatenation,
    heights: &HashMap<String, u32>,
) -> Option<u32> {
    let mut height = 0;
    for repetition in &concatenation.repetitions {
        if repetition.min == 0 {
            continue;
        }
        height = height.max(element_height(&repetition.element, heights)?);
    }
    Some(height)
}

fn element_height(element: &Element, heights: &HashMap<String, u32>) -> Option<u32> {
    match element {
        Element::Rulename { name } => heights.get(&name.to_ascii_lowercase()).copied(),
        Element::Group(alternation) => alternation_height(alternation, heights),
        Element::Option(_)
        | Element::CharVal { .. }
        | Element::NumVal { .. }
        | Element::ProseVal { .. } => Some(0),
    }
}

struct Walker<'g> {
    grammar: &'g Grammar,
    options: &'g GenerateOptions,
    heights: HashMap<String, u32>,
    rng: ChaCha8Rng,
    out: Vec<u8>,
    steps: usize,
}

impl Walker<'_> {
    fn minimal(&self) -> bool {
        self.steps >= WALK_STEP_LIMIT
    }

    fn walk_alternation(&mut self, alternation: &Alternation) -> Result<(), Error> {
        // Only concatenations with a finite derivation are candidates: a
        // branch whose mandatory path cannot bottom out would make the
        // output underivable no matter what comes after.
        let candidates: Vec<(usize, u32)> = alternation
            .concatenations
            .iter()
            .enumerate()
            .filter_map(|(i, concatenation)| {
                concatenation_height(concatenation, &self.heights).map(|height| (i, height))
            })
            .collect();

        let pick = if candidates.is_empty() {
            // Unreachable for productive rules; stay defensive for
            // hand-built grammars.
            0
        } else if self.minimal() {
            // Deterministic unwind: the lowest concatenation descends
            // through strictly decreasing heights.
            candidates
                .iter()
                .min_by_key(|(_, height)| *height)
                .map(|(i, _)| *i)
                .unwrap_or(0)
        } else if candidates.len() == 1 {
            candidates[0].0
        } else {
            candidates[self.rng.gen_range(0..candidates.len())].0
        };

        self.walk_concatenation(&alternation.concatenations[pick])
    }

    fn walk_concatenation(&mut self, concatenation: &Concatenation) -> Result<(), Error> {
        for repetition in &concatenation.repetitions {
            if repetition.min == 0 {
                // Skippable content is skipped once the output is long
                // enough, and always when it could not derive anything.
                if self.out.len() >= self.options.threshold
                    || element_height(&repetition.element, &self.heights).is_none()
                {
                    continue;
                }
            }

            let low = repetition.min;
            let high = repetition
                .max
                .map_or(self.options.rep_max, |max| max.min(self.options.rep_max))
                .max(low);
            let count = if self.minimal() || low == high {
                low
            } else {
                self.rng.gen_range(low..=high)
            };

            for emitted in 0..count {
                // Optional surplus stops once the output is long enough.
                if emitted >= repetition.min && self.out.len() >= self.options.threshold {
                    break;
                }
                self.walk_element(&repetition.element)?;
            }
        }
        Ok(())
    }

    fn walk_element(&mut self, element: &Element) -> Result<(), Error> {
        self.steps += 1;
        match element {
            Element::Rulename { name } => {
                let rule = self
                    .grammar
                    .get_rule(name)
                    .ok_or_else(|| Error::RuleNotFound {
                        rulename: name.clone(),
                    })?;
                self.walk_alternation(&rule.alternation)
            }

            Element::Group(alternation) => self.walk_alternation(alternation),

            Element::Option(alternation) => {
                if self.out.len() >= self.options.threshold
                    || self.minimal()
                    || alternation_height(alternation, &self.heights).is_none()
                {
                    return Ok(());
                }
                if self.rng.gen_bool(0.5) {
                    self.walk_alternation(alternation)
                } else {
                    Ok(())
                }
            }

            Element::NumVal { base, kind, elems } => {
                match kind {
                    NumKind::Range => {
                        let (Some(low), Some(high)) = (elems.first(), elems.get(1)) else {
                            return Ok(());
                        };
                        let low = numval_to_code_point(low, *base)?;
                        let high = numval_to_code_point(high, *base)?;
                        // Re-roll picks landing in the surrogate gap: they
                        // are not Unicode scalar values.
                        let code_point = loop {
                            let pick = self.rng.gen_range(low..=high);
                            if let Some(code_point) = char::from_u32(pick) {
                                break code_point;
                            }
                        };
                        self.emit(code_point);
                    }
                    NumKind::Series => {
                        for elem in elems {
                            let code_point = numval_to_code_point(elem, *base)?;
                            if let Some(code_point) = char::from_u32(code_point) {
                                self.emit(code_point);
                            }
                        }
                    }
                }
                Ok(())
            }

            Element::CharVal { sensitive, values } => {
                for &value in values {
                    let emitted = if !sensitive && value.is_ascii_alphabetic() {
                        // Flip case with 50/50 probability.
                        if self.rng.gen_bool(0.5) {
                            if value.is_ascii_lowercase() {
                                value.to_ascii_uppercase()
                            } else {
                                value.to_ascii_lowercase()
                            }
                        } else {
                            value
                        }
                    } else {
                        value
                    };
                    self.emit(emitted);
                }
                Ok(())
            }

            Element::ProseVal { .. } => Err(Error::HandlingProseVal),
        }
    }

    fn emit(&mut self, code_point: char) {
        let mut buffer = [0u8; 4];
        self.out
            .extend_from_slice(code_point.encode_utf8(&mut buffer).as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_abnf;
    use crate::rules::ABNF;

    fn grammar(source: &str) -> Grammar {
        parse_abnf(source.as_bytes()).unwrap()
    }

    #[test]
    fn it_rejects_unavoidable_cycles() {
        for source in [
            "a = a\r\n",
            "a = b\r\nb = \"b\" a\r\n",
            "a = b\r\nb = b\r\n",
        ] {
            let err = grammar(source).generate(0, "a").unwrap_err();
            assert!(
                matches!(err, Error::CyclicRule { rulename } if rulename == "a"),
                "{source} should be rejected"
            );
        }
    }

    #[test]
    fn it_generates_through_avoidable_cycles() {
        let g = grammar("a = *a b\r\nb = \"b\" *a\r\n");
        // Small bounds: the grammar is highly ambiguous, and re-parsing a
        // long output would enumerate a combinatorial number of trees.
        let options = GenerateOptions {
            rep_max: 2,
            threshold: 4,
        };
        let out = g.generate_with(0, "a", &options).unwrap();
        assert!(!out.is_empty());
        assert!(g.is_valid("a", &out).unwrap());
    }

    #[test]
    fn it_avoids_branches_that_cannot_bottom_out() {
        // The first alternative requires r1, which can never terminate;
        // every seed must settle on the plain alternative.
        let g = grammar("root = r1 \"z\" / \"z\"\r\nr1 = r2\r\nr2 = r1\r\n");
        for seed in 0..16 {
            let out = g.generate(seed, "root").unwrap();
            assert!(out.eq_ignore_ascii_case(b"z"));
        }
    }

    #[test]
    fn it_unwinds_cycles_that_emit_nothing() {
        // Admitted by the pre-check, never grows the output; the step
        // budget has to unwind it.
        let g = grammar("a = *a\r\n");
        let out = g.generate(7, "a").unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn it_fails_on_unknown_rules() {
        let err = grammar("a = \"a\"\r\n").generate(0, "nope").unwrap_err();
        assert!(matches!(err, Error::RuleNotFound { rulename } if rulename == "nope"));
    }

    #[test]
    fn it_refuses_prose_vals() {
        let g = grammar("a = <free text>\r\n");
        assert!(matches!(g.generate(0, "a"), Err(Error::HandlingProseVal)));
    }

    #[test]
    fn it_is_reproducible_for_a_given_seed() {
        for seed in [0, 1, 64, 499] {
            let first = ABNF.generate(seed, "rule").unwrap();
            let second = ABNF.generate(seed, "rule").unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn it_generates_single_code_points_exactly() {
        for (source, expected) in [
            ("a=%x61\r\n", "a"),
            ("a=%x03C0\r\n", "\u{03C0}"),
            ("a=%x2603\r\n", "\u{2603}"),
            ("a=%x1F973\r\n", "\u{1F973}"),
        ] {
            let g = grammar(source);
            let out = g.generate(0, "a").unwrap();
            assert_eq!(out, expected.as_bytes());
            assert!(g.is_valid("a", &out).unwrap());
        }
    }

    #[test]
    fn it_generates_non_ascii_ranges_as_utf8() {
        let g = grammar("non-ascii = %xE000-10FFFF\r\n");
        for seed in 0..8 {
            let out = g.generate(seed, "non-ascii").unwrap();
            assert!((3..=4).contains(&out.len()), "got {} bytes", out.len());
            assert!(g.is_valid("non-ascii", &out).unwrap());
        }
    }

    #[test]
    fn it_generates_abnf_that_parses_back() {
        use crate::lexer::{parse_abnf_with, ParseAbnfOptions};

        for seed in [0, 1, 499] {
            let out = ABNF.generate(seed, "rulelist").unwrap();
            assert!(
                ABNF.is_valid("rulelist", &out).unwrap(),
                "seed {seed} generated an invalid rulelist: {:?}",
                String::from_utf8_lossy(&out)
            );
            // The meta-parse itself must never be the failure: the walk can
            // legitimately produce `=/` on a fresh name or colliding rule
            // names, which the lexer rejects by policy.
            match parse_abnf_with(
                &out,
                &ParseAbnfOptions {
                    validate: false,
                    ..Default::default()
                },
            ) {
                Ok(_)
                | Err(Error::RuleNotFound { .. })
                | Err(Error::DuplicatedRule { .. })
                | Err(Error::CoreRuleModify { .. }) => {}
                Err(err) => panic!("seed {seed}: unexpected failure: {err}"),
            }
        }
    }

    #[test]
    fn it_honors_the_repetition_cap_and_threshold() {
        let g = grammar("a = *\"x\"\r\n");
        let options = GenerateOptions {
            rep_max: 4,
            threshold: 16,
        };
        for seed in 0..16 {
            let out = g.generate_with(seed, "a", &options).unwrap();
            assert!(out.len() <= 4);
        }

        let g = grammar("a = 1*\"xyzw\"\r\n");
        for seed in 0..8 {
            let out = g.generate_with(seed, "a", &options).unwrap();
            // At least one instance, and the optional surplus stops once
            // the threshold is reached.
            assert!(!out.is_empty());
            assert!(out.len() <= options.threshold + 4);
        }
    }

    #[test]
    fn it_flips_case_only_when_insensitive() {
        let g = grammar("a = %s\"abc\"\r\n");
        for seed in 0..8 {
            assert_eq!(g.generate(seed, "a").unwrap(), b"abc");
        }

        let g = grammar("a = \"abc\"\r\n");
        for seed in 0..8 {
            let out = g.generate(seed, "a").unwrap();
            assert!(out.eq_ignore_ascii_case(b"abc"));
        }
    }
}
