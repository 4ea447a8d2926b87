// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Plugin graph validation and ordering.
//!
//! The pipeline is resolved once, when the runtime is built, and never changes
//! afterwards. Validation runs in a fixed order so the reported errors make
//! sense:
//!
//! 1. plugin ids are unique
//! 2. every `depends_on` names a registered plugin
//! 3. no plugin depends on one of a later phase
//! 4. the graph is acyclic (DFS, reporting the cycle path)
//!
//! Steps 3 and 4 need a well-formed graph and are skipped when 1 or 2 fail.
//! Within a phase the order is a Kahn topological sort whose ready set pops the
//! lowest priority first, then the earliest registration.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::errors::ValidationError;
use crate::traits::ConversionPlugin;

/// Execution phases, in running order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Preparation,
    ProtocolParsing,
    ContentEnrichment,
}

impl Phase {
    pub const ALL: [Phase; 3] = [
        Phase::Preparation,
        Phase::ProtocolParsing,
        Phase::ContentEnrichment,
    ];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Entry in the Kahn ready set.
#[derive(Debug, PartialEq, Eq)]
struct ReadyPlugin {
    priority: i32,
    index: usize,
}

impl PartialOrd for ReadyPlugin {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReadyPlugin {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then(self.index.cmp(&other.index))
    }
}

/// Validated, totally ordered set of conversion plugins.
#[derive(Clone)]
pub struct PluginPipeline {
    ordered: Vec<Arc<dyn ConversionPlugin>>,
}

impl fmt::Debug for PluginPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

impl PluginPipeline {
    /// Validate the plugin graph and resolve the running order.
    ///
    /// All detectable errors are returned together.
    pub fn new(plugins: Vec<Arc<dyn ConversionPlugin>>) -> Result<Self, Vec<ValidationError>> {
        let mut errors = Vec::new();
        errors.extend(duplicate_ids(&plugins));
        errors.extend(unresolved_dependencies(&plugins));

        if errors.is_empty() {
            errors.extend(phase_inversions(&plugins));
            if let Some(cycle) = find_cycle(&plugins) {
                errors.push(ValidationError::CyclicDependency { cycle });
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let mut ordered = Vec::with_capacity(plugins.len());
        for phase in Phase::ALL {
            ordered.extend(order_phase(&plugins, phase));
        }
        Ok(Self { ordered })
    }

    /// Every plugin, phase by phase, in running order.
    pub fn plugins(&self) -> &[Arc<dyn ConversionPlugin>] {
        &self.ordered
    }

    pub fn phase(&self, phase: Phase) -> impl Iterator<Item = &Arc<dyn ConversionPlugin>> {
        self.ordered.iter().filter(move |p| p.phase() == phase)
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.ordered.iter().map(|p| p.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

fn duplicate_ids(plugins: &[Arc<dyn ConversionPlugin>]) -> Vec<ValidationError> {
    let mut seen = HashSet::new();
    plugins
        .iter()
        .filter(|p| !seen.insert(p.id()))
        .map(|p| ValidationError::DuplicatePluginId {
            plugin_id: p.id().to_string(),
        })
        .collect()
}

fn unresolved_dependencies(plugins: &[Arc<dyn ConversionPlugin>]) -> Vec<ValidationError> {
    let ids: HashSet<&str> = plugins.iter().map(|p| p.id()).collect();
    plugins
        .iter()
        .flat_map(|p| {
            p.depends_on()
                .iter()
                .filter(|dep| !ids.contains(*dep))
                .map(|dep| ValidationError::UnresolvedDependency {
                    plugin_id: p.id().to_string(),
                    missing_dependency: dep.to_string(),
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

fn phase_inversions(plugins: &[Arc<dyn ConversionPlugin>]) -> Vec<ValidationError> {
    let phases: HashMap<&str, Phase> = plugins.iter().map(|p| (p.id(), p.phase())).collect();
    let mut errors = Vec::new();
    for plugin in plugins {
        for dep in plugin.depends_on() {
            if let Some(&dependency_phase) = phases.get(dep) {
                if dependency_phase > plugin.phase() {
                    errors.push(ValidationError::PhaseInversion {
                        plugin_id: plugin.id().to_string(),
                        phase: plugin.phase(),
                        dependency: dep.to_string(),
                        dependency_phase,
                    });
                }
            }
        }
    }
    errors
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    White,
    Gray,
    Black,
}

/// Three-colour DFS over dependency edges; returns the first cycle found,
/// closed by repeating its first id.
fn find_cycle(plugins: &[Arc<dyn ConversionPlugin>]) -> Option<Vec<String>> {
    let index: HashMap<&str, usize> = plugins
        .iter()
        .enumerate()
        .map(|(i, p)| (p.id(), i))
        .collect();
    let mut marks = vec![Mark::White; plugins.len()];
    let mut path = Vec::new();

    fn visit(
        node: usize,
        plugins: &[Arc<dyn ConversionPlugin>],
        index: &HashMap<&str, usize>,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Option<Vec<String>> {
        marks[node] = Mark::Gray;
        path.push(node);
        for dep in plugins[node].depends_on() {
            let Some(&next) = index.get(dep) else { continue };
            match marks[next] {
                Mark::Gray => {
                    let start = path.iter().position(|&n| n == next).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..]
                        .iter()
                        .map(|&n| plugins[n].id().to_string())
                        .collect();
                    cycle.push(plugins[next].id().to_string());
                    return Some(cycle);
                }
                Mark::White => {
                    if let Some(cycle) = visit(next, plugins, index, marks, path) {
                        return Some(cycle);
                    }
                }
                Mark::Black => {}
            }
        }
        path.pop();
        marks[node] = Mark::Black;
        None
    }

    (0..plugins.len()).find_map(|node| {
        if marks[node] == Mark::White {
            visit(node, plugins, &index, &mut marks, &mut path)
        } else {
            None
        }
    })
}

/// Kahn's algorithm restricted to one phase. Dependencies on earlier phases are
/// already satisfied and ignored here.
fn order_phase(plugins: &[Arc<dyn ConversionPlugin>], phase: Phase) -> Vec<Arc<dyn ConversionPlugin>> {
    let members: Vec<usize> = (0..plugins.len())
        .filter(|&i| plugins[i].phase() == phase)
        .collect();
    let local: HashMap<&str, usize> = members.iter().map(|&i| (plugins[i].id(), i)).collect();

    let mut in_degree: HashMap<usize, usize> = HashMap::new();
    let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();
    for &i in &members {
        let deps: Vec<usize> = plugins[i]
            .depends_on()
            .iter()
            .filter_map(|dep| local.get(dep).copied())
            .collect();
        in_degree.insert(i, deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(i);
        }
    }

    let mut ready: BinaryHeap<Reverse<ReadyPlugin>> = members
        .iter()
        .filter(|i| in_degree.get(i) == Some(&0))
        .map(|&index| {
            Reverse(ReadyPlugin {
                priority: plugins[index].priority(),
                index,
            })
        })
        .collect();

    let mut ordered = Vec::with_capacity(members.len());
    while let Some(Reverse(next)) = ready.pop() {
        ordered.push(plugins[next.index].clone());
        for &dependent in dependents.get(&next.index).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(&dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse(ReadyPlugin {
                        priority: plugins[dependent].priority(),
                        index: dependent,
                    }));
                }
            }
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementRef;
    use crate::engine::ConversionContext;
    use crate::errors::ConversionError;
    use crate::traits::PluginOutcome;

    struct StubPlugin {
        id: &'static str,
        phase: Phase,
        priority: i32,
        depends_on: &'static [&'static str],
    }

    impl ConversionPlugin for StubPlugin {
        fn id(&self) -> &'static str {
            self.id
        }
        fn phase(&self) -> Phase {
            self.phase
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn depends_on(&self) -> &'static [&'static str] {
            self.depends_on
        }
        fn convert(
            &self,
            _element: &ElementRef,
            _ctx: &mut ConversionContext<'_>,
        ) -> Result<PluginOutcome, ConversionError> {
            Ok(PluginOutcome::NotApplicable)
        }
    }

    fn stub(
        id: &'static str,
        phase: Phase,
        priority: i32,
        depends_on: &'static [&'static str],
    ) -> Arc<dyn ConversionPlugin> {
        Arc::new(StubPlugin {
            id,
            phase,
            priority,
            depends_on,
        })
    }

    #[test]
    fn test_order_by_phase_priority_and_registration() {
        let pipeline = PluginPipeline::new(vec![
            stub("enrich", Phase::ContentEnrichment, -10, &[]),
            stub("late", Phase::ProtocolParsing, 5, &[]),
            stub("first", Phase::ProtocolParsing, 0, &[]),
            stub("second", Phase::ProtocolParsing, 0, &[]),
            stub("prep", Phase::Preparation, 100, &[]),
        ])
        .unwrap();

        assert_eq!(pipeline.ids(), vec!["prep", "first", "second", "late", "enrich"]);
    }

    #[test]
    fn test_dependency_overrides_priority() {
        let pipeline = PluginPipeline::new(vec![
            stub("uri", Phase::ProtocolParsing, -5, &["http"]),
            stub("http", Phase::ProtocolParsing, 10, &[]),
        ])
        .unwrap();

        assert_eq!(pipeline.ids(), vec!["http", "uri"]);
    }

    #[test]
    fn test_dependency_on_earlier_phase_is_allowed() {
        let pipeline = PluginPipeline::new(vec![
            stub("enrich", Phase::ContentEnrichment, 0, &["parse"]),
            stub("parse", Phase::ProtocolParsing, 0, &[]),
        ])
        .unwrap();

        assert_eq!(pipeline.phase(Phase::ContentEnrichment).count(), 1);
    }

    #[test]
    fn test_validation_errors() {
        struct TestCase {
            name: &'static str,
            plugins: Vec<Arc<dyn ConversionPlugin>>,
            expected: fn(&[ValidationError]) -> bool,
        }

        let cases = vec![
            TestCase {
                name: "duplicate id",
                plugins: vec![
                    stub("a", Phase::ProtocolParsing, 0, &[]),
                    stub("a", Phase::ProtocolParsing, 0, &[]),
                ],
                expected: |errors| {
                    matches!(&errors[0], ValidationError::DuplicatePluginId { plugin_id } if plugin_id == "a")
                },
            },
            TestCase {
                name: "unresolved dependency",
                plugins: vec![stub("a", Phase::ProtocolParsing, 0, &["ghost"])],
                expected: |errors| {
                    matches!(&errors[0], ValidationError::UnresolvedDependency { missing_dependency, .. } if missing_dependency == "ghost")
                },
            },
            TestCase {
                name: "phase inversion",
                plugins: vec![
                    stub("parse", Phase::ProtocolParsing, 0, &["enrich"]),
                    stub("enrich", Phase::ContentEnrichment, 0, &[]),
                ],
                expected: |errors| {
                    matches!(&errors[0], ValidationError::PhaseInversion { plugin_id, dependency_phase: Phase::ContentEnrichment, .. } if plugin_id == "parse")
                },
            },
            TestCase {
                name: "cycle",
                plugins: vec![
                    stub("a", Phase::ProtocolParsing, 0, &["b"]),
                    stub("b", Phase::ProtocolParsing, 0, &["c"]),
                    stub("c", Phase::ProtocolParsing, 0, &["a"]),
                ],
                expected: |errors| {
                    matches!(&errors[0], ValidationError::CyclicDependency { cycle } if cycle == &["a", "b", "c", "a"])
                },
            },
            TestCase {
                name: "self dependency",
                plugins: vec![stub("a", Phase::ProtocolParsing, 0, &["a"])],
                expected: |errors| {
                    matches!(&errors[0], ValidationError::CyclicDependency { cycle } if cycle.len() == 2)
                },
            },
        ];

        for case in cases {
            let errors = PluginPipeline::new(case.plugins).unwrap_err();
            assert!((case.expected)(&errors), "{}: {:?}", case.name, errors);
        }
    }
}
