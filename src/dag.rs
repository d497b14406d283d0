//! Rule dependency analyses: dependency graph, Tarjan SCC, cycle and
//! left-termination predicates.
//!
//! The data model is a tree — rule bodies reference each other by name
//! only — so cycles live in the separate directed graph built here, never
//! in the model itself.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::ast::{Alternation, Element, Grammar};
use crate::Error;

/// A node of the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepNode {
    /// Rule name as spelled in its definition.
    pub rulename: String,
    /// Lower-cased names of the rules referenced by the body, each listed
    /// once, in first-reference order.
    pub dependencies: Vec<String>,
}

/// Per-rule direct dependencies, keyed by lower-cased rule name.
pub type Depgraph = BTreeMap<String, DepNode>;

impl Grammar {
    /// Builds the dependency graph of this grammar, core rules included.
    pub fn dependency_graph(&self) -> Depgraph {
        let mut graph = Depgraph::new();
        for rule in crate::rules::CORE_RULES.values().chain(self.rules()) {
            graph.insert(
                rule.name.to_ascii_lowercase(),
                DepNode {
                    rulename: rule.name.clone(),
                    dependencies: dependencies(&rule.alternation),
                },
            );
        }
        graph
    }

    /// Whether no rule of this grammar can reach itself through its
    /// dependencies.
    pub fn is_dag(&self) -> bool {
        let graph = self.dependency_graph();
        let sccs = tarjan(&graph);
        sccs.iter().all(|scc| scc.len() <= 1)
            && graph
                .iter()
                .all(|(key, node)| !node.dependencies.contains(key))
    }

    /// Whether the rule can reach itself through its dependencies, or
    /// depends (transitively) on a rule that can.
    ///
    /// This is not [`Grammar::is_left_terminating`]: a rule may contain a
    /// cycle yet still be able to terminate on its leftmost element.
    pub fn rule_contains_cycle(&self, rulename: &str) -> Result<bool, Error> {
        if self.get_rule(rulename).is_none() {
            return Err(Error::RuleNotFound {
                rulename: rulename.to_string(),
            });
        }
        let graph = self.dependency_graph();
        let sccs = tarjan(&graph);
        Ok(contains_cycle(&graph, &sccs, rulename))
    }

    /// Whether the rule has some way to make progress on the input at its
    /// leftmost position without first recursing into itself.
    ///
    /// Every concatenation is scanned left to right: its first mandatory,
    /// non-optional repetition must be able to terminate. The outcome
    /// depends on alternation ordering, not just on the dependency graph.
    pub fn is_left_terminating(&self, rulename: &str) -> Result<bool, Error> {
        let rule = self.get_rule(rulename).ok_or_else(|| Error::RuleNotFound {
            rulename: rulename.to_string(),
        })?;
        let mut walked = HashSet::from([rulename.to_ascii_lowercase()]);
        Ok(self.alternation_terminates(&rule.alternation, &mut walked))
    }

    fn alternation_terminates(
        &self,
        alternation: &Alternation,
        walked: &mut HashSet<String>,
    ) -> bool {
        for concatenation in &alternation.concatenations {
            for repetition in &concatenation.repetitions {
                // Skippable repetitions cannot be required to terminate.
                if repetition.min == 0 || matches!(repetition.element, Element::Option(_)) {
                    continue;
                }
                if !self.element_terminates(&repetition.element, walked) {
                    return false;
                }
                break;
            }
        }
        true
    }

    fn element_terminates(&self, element: &Element, walked: &mut HashSet<String>) -> bool {
        match element {
            Element::Rulename { name } => {
                let key = name.to_ascii_lowercase();
                if walked.contains(&key) {
                    return false;
                }
                let Some(rule) = self.get_rule(name) else {
                    return false;
                };
                walked.insert(key);
                self.alternation_terminates(&rule.alternation, walked)
            }
            Element::Group(alternation) | Element::Option(alternation) => {
                self.alternation_terminates(alternation, walked)
            }
            Element::CharVal { values, .. } => !values.is_empty(),
            Element::ProseVal { segments } => !segments.is_empty(),
            Element::NumVal { .. } => true,
        }
    }
}

/// Direct dependencies of an alternation: lower-cased, deduplicated, in
/// first-reference order.
pub(crate) fn dependencies(alternation: &Alternation) -> Vec<String> {
    let mut deps = Vec::new();
    collect_dependencies(alternation, &mut deps);
    deps
}

fn collect_dependencies(alternation: &Alternation, deps: &mut Vec<String>) {
    for concatenation in &alternation.concatenations {
        for repetition in &concatenation.repetitions {
            match &repetition.element {
                Element::Rulename { name } => {
                    let key = name.to_ascii_lowercase();
                    if !deps.contains(&key) {
                        deps.push(key);
                    }
                }
                Element::Group(inner) | Element::Option(inner) => {
                    collect_dependencies(inner, deps)
                }
                _ => {}
            }
        }
    }
}

fn contains_cycle(graph: &Depgraph, sccs: &[Vec<String>], rulename: &str) -> bool {
    let key = rulename.to_ascii_lowercase();
    let Some(node) = graph.get(&key) else {
        // An undefined dependency cannot contribute a cycle.
        return false;
    };
    let Some(scc) = sccs.iter().find(|scc| scc.contains(&key)) else {
        return false;
    };

    if scc.len() > 1 || node.dependencies.contains(&key) {
        return true;
    }

    // Follow dependencies out of this SCC.
    node.dependencies
        .iter()
        .filter(|dependency| **dependency != key)
        .any(|dependency| contains_cycle(graph, sccs, dependency))
}

/// Tarjan's strongly connected components over the dependency graph.
/// Deterministic: roots are visited in key order.
fn tarjan(graph: &Depgraph) -> Vec<Vec<String>> {
    struct State<'g> {
        graph: &'g Depgraph,
        next_index: usize,
        indices: HashMap<&'g str, usize>,
        lowlinks: HashMap<&'g str, usize>,
        stack: Vec<&'g str>,
        on_stack: HashSet<&'g str>,
        sccs: Vec<Vec<String>>,
    }

    impl<'g> State<'g> {
        fn strongconnect(&mut self, v: &'g str) {
            self.indices.insert(v, self.next_index);
            self.lowlinks.insert(v, self.next_index);
            self.next_index += 1;
            self.stack.push(v);
            self.on_stack.insert(v);

            let graph = self.graph;
            if let Some(node) = graph.get(v) {
                for dependency in &node.dependencies {
                    let Some((w, _)) = graph.get_key_value(dependency) else {
                        // Undefined dependency: no edge to follow.
                        continue;
                    };
                    let w = w.as_str();
                    if !self.indices.contains_key(w) {
                        self.strongconnect(w);
                        let low = self.lowlinks[v].min(self.lowlinks[w]);
                        self.lowlinks.insert(v, low);
                    } else if self.on_stack.contains(w) {
                        let low = self.lowlinks[v].min(self.indices[w]);
                        self.lowlinks.insert(v, low);
                    }
                }
            }

            if self.lowlinks[v] == self.indices[v] {
                let mut scc = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack.remove(w);
                    scc.push(w.to_string());
                    if w == v {
                        break;
                    }
                }
                self.sccs.push(scc);
            }
        }
    }

    let mut state = State {
        graph,
        next_index: 0,
        indices: HashMap::new(),
        lowlinks: HashMap::new(),
        stack: Vec::new(),
        on_stack: HashSet::new(),
        sccs: Vec::new(),
    };
    for key in graph.keys() {
        if !state.indices.contains_key(key.as_str()) {
            state.strongconnect(key);
        }
    }
    state.sccs
}
