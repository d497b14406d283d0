//! Transition-graph construction.
//!
//! Builds a directed multigraph for a rule: nodes carry elements, edges
//! the allowed successions, and the graph exposes the sets of entrypoints
//! and endpoints. A reserved *empty node* stands for a zero-cost bypass,
//! used whenever a repetition may be taken zero times; it disappears as
//! soon as the repetition is piped between neighbours.
//!
//! The builder refuses cyclic rules (the composition is recursive and
//! would not stop) and prose-vals. Rendering and traversal of the built
//! graph are intentionally not part of this module.

use std::collections::HashMap;

use crate::ast::{Alternation, Concatenation, Element, Grammar, NumKind, Repetition};
use crate::numval::{code_point_to_numval, numval_to_code_point};
use crate::validate::validate;
use crate::Error;

/// Identifier of a node inside its [`TransitionGraph`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, derive_more::Display)]
#[display("n{_0}")]
pub struct NodeId(usize);

impl NodeId {
    /// The reserved empty node: a bypass marker, not a real node.
    pub const EMPTY: NodeId = NodeId(usize::MAX);

    pub fn is_empty_node(self) -> bool {
        self == Self::EMPTY
    }
}

/// A node of a transition graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub element: Element,
    pub nexts: Vec<NodeId>,
}

/// A grammar transition graph: travel from the entrypoints along `nexts`
/// until an endpoint is reached.
#[derive(Debug, Clone)]
pub struct TransitionGraph {
    nodes: Vec<Node>,
    pub entrypoints: Vec<NodeId>,
    pub endpoints: Vec<NodeId>,
}

impl TransitionGraph {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }
}

/// Knobs of the transition-graph builder.
#[derive(Debug, Clone)]
pub struct TransitionGraphOptions {
    /// Recursively inline referenced rules instead of keeping one node per
    /// rulename. Requires the grammar to validate.
    pub deflate_rules: bool,
    /// Split a num-val into one node per code point.
    pub deflate_num_vals: bool,
    /// Split a char-val into chained per-character nodes, doubled for the
    /// two cases of insensitive ASCII letters.
    pub deflate_char_vals: bool,
    /// Upper bound on expanded repetition counts; above it the builder
    /// refuses instead of exhausting memory. It does not compose across
    /// nested repetitions.
    pub repetition_threshold: u32,
}

impl Default for TransitionGraphOptions {
    fn default() -> Self {
        Self {
            deflate_rules: false,
            deflate_num_vals: false,
            deflate_char_vals: false,
            repetition_threshold: 256,
        }
    }
}

impl Grammar {
    /// Builds the transition graph of `rulename` with default options.
    pub fn transition_graph(&self, rulename: &str) -> Result<TransitionGraph, Error> {
        self.transition_graph_with(rulename, &TransitionGraphOptions::default())
    }

    /// Builds the transition graph of `rulename`.
    pub fn transition_graph_with(
        &self,
        rulename: &str,
        options: &TransitionGraphOptions,
    ) -> Result<TransitionGraph, Error> {
        let rule = self.get_rule(rulename).ok_or_else(|| Error::RuleNotFound {
            rulename: rulename.to_string(),
        })?;

        // Inlining follows rule references, so they must all resolve.
        if options.deflate_rules {
            validate(self)?;
        }
        if self.rule_contains_cycle(rulename)? {
            return Err(Error::CyclicRule {
                rulename: rulename.to_string(),
            });
        }

        tracing::trace!(rule = rulename, "building transition graph");
        let mut builder = GraphBuilder {
            grammar: self,
            options,
            nodes: Vec::new(),
            deflated: HashMap::new(),
        };
        let (entrypoints, endpoints) = builder.alternation_graph(&rule.alternation)?;
        Ok(TransitionGraph {
            nodes: builder.nodes,
            entrypoints,
            endpoints,
        })
    }
}

struct GraphBuilder<'g> {
    grammar: &'g Grammar,
    options: &'g TransitionGraphOptions,
    nodes: Vec<Node>,
    /// Already-built sub-graphs of deflated rules, by lower-cased name.
    deflated: HashMap<String, (Vec<NodeId>, Vec<NodeId>)>,
}

impl GraphBuilder<'_> {
    fn new_node(&mut self, element: Element) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            element,
            nexts: Vec::new(),
        });
        id
    }

    fn alternation_graph(
        &mut self,
        alternation: &Alternation,
    ) -> Result<(Vec<NodeId>, Vec<NodeId>), Error> {
        let mut entrypoints = Vec::new();
        let mut endpoints = Vec::new();
        for concatenation in &alternation.concatenations {
            let (concat_i, concat_o) = self.concatenation_graph(concatenation)?;

            // Group the branch entry/endpoints, without duplicating the
            // empty node.
            let entry_has_empty = entrypoints.contains(&NodeId::EMPTY);
            for id in concat_i {
                if id.is_empty_node() && entry_has_empty {
                    continue;
                }
                entrypoints.push(id);
            }
            let end_has_empty = endpoints.contains(&NodeId::EMPTY);
            for id in concat_o {
                if id.is_empty_node() && end_has_empty {
                    continue;
                }
                endpoints.push(id);
            }
        }
        Ok((entrypoints, endpoints))
    }

    fn concatenation_graph(
        &mut self,
        concatenation: &Concatenation,
    ) -> Result<(Vec<NodeId>, Vec<NodeId>), Error> {
        let Some((first, rest)) = concatenation.repetitions.split_first() else {
            return Ok((Vec::new(), Vec::new()));
        };
        let (mut entrypoints, mut endpoints) = self.repetition_graph(first)?;
        for repetition in rest {
            let (rep_i, rep_o) = self.repetition_graph(repetition)?;
            (entrypoints, endpoints) = self.concat_io(entrypoints, endpoints, rep_i, rep_o);
        }
        Ok((entrypoints, endpoints))
    }

    /// Pipes a previous stage into the next one. When the next stage is
    /// skippable (its entrypoints hold the empty node) the previous
    /// endpoints remain endpoints; when the previous stage is skippable
    /// its bypass dissolves into the next stage's entrypoints.
    fn concat_io(
        &mut self,
        prev_i: Vec<NodeId>,
        prev_o: Vec<NodeId>,
        curr_i: Vec<NodeId>,
        curr_o: Vec<NodeId>,
    ) -> (Vec<NodeId>, Vec<NodeId>) {
        let entrypoints = if prev_i.contains(&NodeId::EMPTY) {
            let mut merged: Vec<NodeId> = prev_i
                .into_iter()
                .filter(|id| !id.is_empty_node())
                .collect();
            merged.extend(curr_i.iter().copied());
            merged
        } else {
            prev_i
        };

        for &from in &prev_o {
            if from.is_empty_node() {
                continue;
            }
            for &to in &curr_i {
                if to.is_empty_node() {
                    continue;
                }
                self.nodes[from.0].nexts.push(to);
            }
        }

        let mut endpoints = Vec::new();
        if curr_i.contains(&NodeId::EMPTY) {
            endpoints.extend(prev_o.iter().copied());
        }
        endpoints.extend(curr_o.into_iter().filter(|id| !id.is_empty_node()));

        (entrypoints, endpoints)
    }

    fn repetition_graph(
        &mut self,
        repetition: &Repetition,
    ) -> Result<(Vec<NodeId>, Vec<NodeId>), Error> {
        let (elem_i, elem_o) = self.element_graph(&repetition.element)?;
        let threshold = self.options.repetition_threshold;
        let mut entrypoints = Vec::new();
        let mut endpoints = Vec::new();

        if repetition.min == 0 {
            push_unique(&mut entrypoints, NodeId::EMPTY);
            push_unique(&mut endpoints, NodeId::EMPTY);

            match repetition.max {
                // Optional: the element or its bypass.
                Some(1) => {
                    extend_unique(&mut entrypoints, &elem_i);
                    extend_unique(&mut endpoints, &elem_o);
                }
                // Optional infinity: loop every endpoint back to every
                // entrypoint.
                None => {
                    let solid: Vec<NodeId> = elem_i
                        .iter()
                        .copied()
                        .filter(|id| !id.is_empty_node())
                        .collect();
                    for &from in &elem_o {
                        if from.is_empty_node() {
                            continue;
                        }
                        for &to in &solid {
                            push_unique(&mut self.nodes[from.0].nexts, to);
                        }
                    }
                    extend_unique(&mut entrypoints, &elem_i);
                    extend_unique(&mut endpoints, &elem_o);
                }
                // Optional up to n: a serial chain, every copy ending the
                // walk.
                Some(max) => {
                    if max > threshold {
                        return Err(Error::RepetitionThreshold { threshold });
                    }
                    let (copies, chain_i, _) = self.chain(&elem_i, &elem_o, max);
                    extend_unique(&mut entrypoints, &chain_i);
                    for (_, copy_o) in &copies {
                        extend_unique(&mut endpoints, copy_o);
                    }
                }
            }
        } else {
            match repetition.max {
                // n to m: a mandatory chain of n copies followed by m - n
                // optional tails.
                Some(max) => {
                    if repetition.min > max {
                        return Err(Error::SemanticRepetition {
                            repetition: repetition.to_string(),
                        });
                    }
                    if max > threshold {
                        return Err(Error::RepetitionThreshold { threshold });
                    }

                    let (first_i, last_o) = if repetition.min > 1 {
                        let (_, chain_i, chain_o) =
                            self.chain(&elem_i, &elem_o, repetition.min);
                        (chain_i, chain_o)
                    } else {
                        (elem_i.clone(), elem_o.clone())
                    };
                    extend_unique(&mut entrypoints, &first_i);
                    extend_unique(&mut endpoints, &last_o);

                    let remaining = max - repetition.min;
                    if remaining > 0 {
                        let (copies, tail_i, _) = self.chain(&elem_i, &elem_o, remaining);
                        for (_, copy_o) in &copies {
                            extend_unique(&mut endpoints, copy_o);
                        }
                        for &from in &last_o {
                            if from.is_empty_node() {
                                continue;
                            }
                            for &to in &tail_i {
                                if to.is_empty_node() {
                                    continue;
                                }
                                push_unique(&mut self.nodes[from.0].nexts, to);
                            }
                        }
                    }
                }
                // n to infinity: a mandatory chain whose last copy loops
                // onto itself.
                None => {
                    if repetition.min > threshold {
                        return Err(Error::RepetitionThreshold { threshold });
                    }
                    let (first_i, last_o, loop_i, loop_o) = if repetition.min > 1 {
                        let (copies, chain_i, chain_o) =
                            self.chain(&elem_i, &elem_o, repetition.min);
                        let (last_i, last_o_copy) = copies.last().cloned().unwrap_or_default();
                        (chain_i, chain_o, last_i, last_o_copy)
                    } else {
                        (
                            elem_i.clone(),
                            elem_o.clone(),
                            elem_i.clone(),
                            elem_o.clone(),
                        )
                    };
                    extend_unique(&mut entrypoints, &first_i);
                    extend_unique(&mut endpoints, &last_o);
                    for &from in &loop_o {
                        if from.is_empty_node() {
                            continue;
                        }
                        for &to in &loop_i {
                            if to.is_empty_node() {
                                continue;
                            }
                            push_unique(&mut self.nodes[from.0].nexts, to);
                        }
                    }
                }
            }
        }

        Ok((entrypoints, endpoints))
    }

    /// Clones the sub-graph `n` times and pipes the copies serially.
    /// Returns each copy's entry/endpoints plus the chain's overall ones.
    #[allow(clippy::type_complexity)]
    fn chain(
        &mut self,
        i: &[NodeId],
        o: &[NodeId],
        n: u32,
    ) -> (
        Vec<(Vec<NodeId>, Vec<NodeId>)>,
        Vec<NodeId>,
        Vec<NodeId>,
    ) {
        if n == 0 {
            return (Vec::new(), Vec::new(), Vec::new());
        }
        let mut copies = Vec::with_capacity(n as usize);
        let (mut entrypoints, mut endpoints) = self.clone_subgraph(i, o);
        copies.push((entrypoints.clone(), endpoints.clone()));

        for _ in 1..n {
            let (next_i, next_o) = self.clone_subgraph(i, o);
            copies.push((next_i.clone(), next_o.clone()));
            (entrypoints, endpoints) = self.concat_io(entrypoints, endpoints, next_i, next_o);
        }
        (copies, entrypoints, endpoints)
    }

    /// Deep-copies every node reachable from the entrypoints, rebuilding
    /// the links between the copies, and maps the given entry/endpoints
    /// onto their clones. The empty node clones to itself.
    fn clone_subgraph(&mut self, i: &[NodeId], o: &[NodeId]) -> (Vec<NodeId>, Vec<NodeId>) {
        let mut mapping: HashMap<NodeId, NodeId> = HashMap::new();
        let mut work: Vec<NodeId> = i
            .iter()
            .copied()
            .filter(|id| !id.is_empty_node())
            .collect();
        while let Some(origin) = work.pop() {
            if mapping.contains_key(&origin) {
                continue;
            }
            let element = self.nodes[origin.0].element.clone();
            let nexts = self.nodes[origin.0].nexts.clone();
            let clone = self.new_node(element);
            mapping.insert(origin, clone);
            work.extend(nexts.into_iter().filter(|next| !mapping.contains_key(next)));
        }

        let pairs: Vec<(NodeId, NodeId)> = mapping.iter().map(|(&a, &b)| (a, b)).collect();
        for (origin, clone) in pairs {
            let nexts: Vec<NodeId> = self.nodes[origin.0]
                .nexts
                .iter()
                .map(|next| mapping[next])
                .collect();
            self.nodes[clone.0].nexts = nexts;
        }

        let entrypoints = i
            .iter()
            .map(|&id| if id.is_empty_node() { id } else { mapping[&id] })
            .collect();
        let endpoints = o
            .iter()
            .map(|&id| {
                if id.is_empty_node() {
                    id
                } else {
                    *mapping
                        .get(&id)
                        .unwrap_or_else(|| panic!("endpoint {id} not reachable from entrypoints"))
                }
            })
            .collect();
        (entrypoints, endpoints)
    }

    fn element_graph(&mut self, element: &Element) -> Result<(Vec<NodeId>, Vec<NodeId>), Error> {
        match element {
            Element::CharVal { sensitive, values } => {
                if values.is_empty() {
                    return Ok((vec![NodeId::EMPTY], vec![NodeId::EMPTY]));
                }
                if !self.options.deflate_char_vals {
                    let node = self.new_node(element.clone());
                    return Ok((vec![node], vec![node]));
                }

                // One node per character, doubled when the character has
                // two acceptable cases, each layer wired to the next.
                let mut entrypoints = Vec::new();
                let mut previous: Vec<NodeId> = Vec::new();
                for &value in values {
                    let both_cases = value.is_ascii_alphabetic() && !sensitive;
                    let current: Vec<NodeId> = if both_cases {
                        vec![
                            self.new_char_node(value.to_ascii_lowercase()),
                            self.new_char_node(value.to_ascii_uppercase()),
                        ]
                    } else {
                        vec![self.new_char_node(value)]
                    };
                    if previous.is_empty() {
                        entrypoints.extend(&current);
                    }
                    for &from in &previous {
                        self.nodes[from.0].nexts.extend(&current);
                    }
                    previous = current;
                }
                Ok((entrypoints, previous))
            }

            Element::NumVal { base, kind, elems } => {
                if !self.options.deflate_num_vals {
                    let node = self.new_node(element.clone());
                    return Ok((vec![node], vec![node]));
                }
                let mut points = Vec::new();
                match kind {
                    NumKind::Range => {
                        let (Some(low), Some(high)) = (elems.first(), elems.get(1)) else {
                            return Ok((Vec::new(), Vec::new()));
                        };
                        let low = numval_to_code_point(low, *base)?;
                        let high = numval_to_code_point(high, *base)?;
                        for code_point in low..=high {
                            if char::from_u32(code_point).is_none() {
                                continue;
                            }
                            points.push(code_point_to_numval(code_point, *base));
                        }
                    }
                    NumKind::Series => points.extend(elems.iter().cloned()),
                }
                let mut nodes = Vec::new();
                for point in points {
                    nodes.push(self.new_node(Element::NumVal {
                        base: *base,
                        kind: NumKind::Series,
                        elems: vec![point],
                    }));
                }
                Ok((nodes.clone(), nodes))
            }

            Element::Rulename { name } => {
                if !self.options.deflate_rules {
                    let node = self.new_node(element.clone());
                    return Ok((vec![node], vec![node]));
                }
                let key = name.to_ascii_lowercase();
                if let Some((cached_i, cached_o)) = self.deflated.get(&key).cloned() {
                    return Ok(self.clone_subgraph(&cached_i, &cached_o));
                }
                let rule = self
                    .grammar
                    .get_rule(name)
                    .ok_or_else(|| Error::RuleNotFound {
                        rulename: name.clone(),
                    })?;
                let (rule_i, rule_o) = self.alternation_graph(&rule.alternation)?;
                let cached = self.clone_subgraph(&rule_i, &rule_o);
                self.deflated.insert(key, cached);
                Ok((rule_i, rule_o))
            }

            Element::Option(alternation) => {
                let (mut option_i, mut option_o) = self.alternation_graph(alternation)?;
                push_unique(&mut option_i, NodeId::EMPTY);
                push_unique(&mut option_o, NodeId::EMPTY);
                Ok((option_i, option_o))
            }

            Element::Group(alternation) => self.alternation_graph(alternation),

            Element::ProseVal { .. } => Err(Error::HandlingProseVal),
        }
    }

    fn new_char_node(&mut self, value: char) -> NodeId {
        self.new_node(Element::CharVal {
            sensitive: true,
            values: vec![value],
        })
    }
}

fn push_unique(list: &mut Vec<NodeId>, id: NodeId) {
    if !list.contains(&id) {
        list.push(id);
    }
}

fn extend_unique(list: &mut Vec<NodeId>, ids: &[NodeId]) {
    for &id in ids {
        push_unique(list, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{parse_abnf_with, ParseAbnfOptions};
    use crate::parse_abnf;

    fn unvalidated(source: &str) -> Grammar {
        parse_abnf_with(
            format!("{source}\r\n").as_bytes(),
            &ParseAbnfOptions {
                validate: false,
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn builder<'g>(
        grammar: &'g Grammar,
        options: &'g TransitionGraphOptions,
    ) -> GraphBuilder<'g> {
        GraphBuilder {
            grammar,
            options,
            nodes: Vec::new(),
            deflated: HashMap::new(),
        }
    }

    #[test]
    fn it_shapes_repetition_graphs() {
        // (source, expected entrypoints, expected endpoints)
        let cases = [
            ("a = 0*1b", 2, 2),
            ("a = 0*2b", 2, 3),
            ("a = 0*b", 2, 2),
            ("a = 1*1b", 1, 1),
            ("a = 1*3b", 1, 3),
            ("a = 2*3b", 1, 2),
            ("a = 1*b", 1, 1),
            ("a = 2*b", 1, 1),
            ("a = 3b", 1, 1),
            // An isomorphism of "a = *c".
            ("a = *(0*1c)", 2, 2),
        ];
        for (source, expected_entry, expected_end) in cases {
            let grammar = unvalidated(source);
            let options = TransitionGraphOptions::default();
            let mut builder = builder(&grammar, &options);
            let rule = grammar.get_rule("a").unwrap();
            let repetition = &rule.alternation.concatenations[0].repetitions[0];

            let (entry, end) = builder.repetition_graph(repetition).unwrap();
            assert_eq!(entry.len(), expected_entry, "{source} entrypoints");
            assert_eq!(end.len(), expected_end, "{source} endpoints");
        }
    }

    #[test]
    fn it_shapes_concatenation_graphs() {
        let cases = [
            ("a = b *1c", 1, 2),
            ("a = b *1c *1d", 1, 3),
            ("a = *1b c", 2, 1),
            ("a = b 2*c d", 1, 1),
            ("a = 1*3b c", 1, 1),
            ("a = *1b *1c", 3, 3),
            // The empty node and b.
            ("a = *b", 2, 2),
            // b and c enter, only c ends.
            ("a = *b c", 2, 1),
            // The empty node, b and c on both sides.
            ("a = *b *c", 3, 3),
        ];
        for (source, expected_entry, expected_end) in cases {
            let grammar = unvalidated(source);
            let options = TransitionGraphOptions::default();
            let mut builder = builder(&grammar, &options);
            let rule = grammar.get_rule("a").unwrap();

            let (entry, end) = builder
                .concatenation_graph(&rule.alternation.concatenations[0])
                .unwrap();
            assert_eq!(entry.len(), expected_entry, "{source} entrypoints");
            assert_eq!(end.len(), expected_end, "{source} endpoints");
        }
    }

    #[test]
    fn it_shapes_alternation_graphs() {
        let cases = [
            ("a = *a / b", 3, 3),
            ("a = \";\" *(b / c) d", 1, 1),
            ("a = b [c / \";\"] *d", 1, 4),
            ("a = [b [c / \";\"]]", 2, 4),
            // Entry/endpoints can reduce to the empty node alone.
            ("a = 1*(0(P))", 1, 1),
            // A skippable loop distributes the empty node and P as both
            // terminals.
            ("a = 1*(*P)", 2, 2),
            ("a = 1*3(*P)", 2, 4),
            // An empty char-val repetition collapses onto its neighbour.
            ("a = 2\"\" a", 1, 1),
        ];
        for (source, expected_entry, expected_end) in cases {
            let grammar = unvalidated(source);
            let options = TransitionGraphOptions {
                deflate_char_vals: true,
                ..Default::default()
            };
            let mut builder = builder(&grammar, &options);
            let rule = grammar.get_rule("a").unwrap();

            let (entry, end) = builder.alternation_graph(&rule.alternation).unwrap();
            assert_eq!(entry.len(), expected_entry, "{source} entrypoints");
            assert_eq!(end.len(), expected_end, "{source} endpoints");
        }
    }

    #[test]
    fn it_builds_the_option_scenario_graph() {
        let grammar = unvalidated("a = b [c / \";\"] *d");
        let graph = grammar.transition_graph("a").unwrap();
        assert_eq!(graph.entrypoints.len(), 1);
        assert_eq!(graph.endpoints.len(), 4);

        // The single entrypoint is the b reference, wired forward.
        let entry = graph.node(graph.entrypoints[0]).unwrap();
        assert_eq!(
            entry.element,
            Element::Rulename { name: "b".into() }
        );
        assert_eq!(entry.nexts.len(), 3);
    }

    #[test]
    fn it_refuses_cyclic_rules() {
        let grammar = parse_abnf(b"a = \"x\" a\r\n").unwrap();
        assert!(matches!(
            grammar.transition_graph("a"),
            Err(Error::CyclicRule { rulename }) if rulename == "a"
        ));
    }

    #[test]
    fn it_refuses_prose_vals() {
        let grammar = parse_abnf(b"a = <free text>\r\n").unwrap();
        assert!(matches!(
            grammar.transition_graph("a"),
            Err(Error::HandlingProseVal)
        ));
    }

    #[test]
    fn it_fails_on_unknown_rules() {
        let grammar = parse_abnf(b"a = \"a\"\r\n").unwrap();
        assert!(matches!(
            grammar.transition_graph("nope"),
            Err(Error::RuleNotFound { .. })
        ));
    }

    #[test]
    fn it_enforces_the_repetition_threshold() {
        let grammar = parse_abnf(b"a = 300\"x\"\r\n").unwrap();
        assert!(matches!(
            grammar.transition_graph("a"),
            Err(Error::RepetitionThreshold { threshold: 256 })
        ));

        let options = TransitionGraphOptions {
            repetition_threshold: 300,
            ..Default::default()
        };
        assert!(grammar.transition_graph_with("a", &options).is_ok());
    }

    #[test]
    fn it_deflates_rules_recursively() {
        let grammar = parse_abnf(b"a = b b\r\nb = \"x\"\r\n").unwrap();
        let options = TransitionGraphOptions {
            deflate_rules: true,
            ..Default::default()
        };
        let graph = grammar.transition_graph_with("a", &options).unwrap();
        assert_eq!(graph.entrypoints.len(), 1);
        assert_eq!(graph.endpoints.len(), 1);
        let entry = graph.node(graph.entrypoints[0]).unwrap();
        assert!(matches!(entry.element, Element::CharVal { .. }));

        // Inlining demands resolvable dependencies.
        let missing = parse_abnf_with(
            b"a = ghost\r\n",
            &ParseAbnfOptions {
                validate: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(matches!(
            missing.transition_graph_with("a", &options),
            Err(Error::DependencyNotFound { .. })
        ));
    }

    #[test]
    fn it_deflates_char_vals_with_case_doubling() {
        let grammar = parse_abnf(b"a = \"ab\"\r\n").unwrap();
        let options = TransitionGraphOptions {
            deflate_char_vals: true,
            ..Default::default()
        };
        let graph = grammar.transition_graph_with("a", &options).unwrap();
        assert_eq!(graph.entrypoints.len(), 2);
        assert_eq!(graph.endpoints.len(), 2);
        assert_eq!(graph.nodes().len(), 4);

        // A sensitive char-val keeps one node per character.
        let grammar = parse_abnf(b"a = %s\"ab\"\r\n").unwrap();
        let graph = grammar.transition_graph_with("a", &options).unwrap();
        assert_eq!(graph.entrypoints.len(), 1);
        assert_eq!(graph.endpoints.len(), 1);
        assert_eq!(graph.nodes().len(), 2);
    }

    #[test]
    fn it_deflates_num_vals() {
        let options = TransitionGraphOptions {
            deflate_num_vals: true,
            ..Default::default()
        };

        let grammar = parse_abnf(b"a = %x61-63\r\n").unwrap();
        let graph = grammar.transition_graph_with("a", &options).unwrap();
        assert_eq!(graph.entrypoints.len(), 3);
        assert_eq!(graph.endpoints.len(), 3);

        let grammar = parse_abnf(b"a = %x61.62\r\n").unwrap();
        let graph = grammar.transition_graph_with("a", &options).unwrap();
        assert_eq!(graph.entrypoints.len(), 2);
        assert_eq!(graph.endpoints.len(), 2);
    }
}
