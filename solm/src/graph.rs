use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap, HashSet};

use itertools::Itertools;
use petgraph::algo::{has_path_connecting, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;

use crate::error::SolutionError;
use crate::model::{ProjectEntry, ProjectId, SolutionModel};
use crate::msbuild::ProjectKind;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Edge {
    /// Declared dependency, becomes target dependency
    Hard,
    /// Ordering only, comes from solution folder dependencies
    Soft,
}

/// Result of dependency analysis. All projects are identified by their declared GUID
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectGraphPlan {
    /// Every non folder project, dependencies first. Ties keep declaration order
    pub build_order: Vec<String>,
    pub buildable: BTreeSet<String>,
    /// Project -> projects it explicitly depends on
    pub dependencies: BTreeMap<String, Vec<String>>,
    pub missing_references: Vec<String>,
    pub duplicate_names: Vec<String>,
    pub cycles: Vec<Vec<String>>,
}

impl ProjectGraphPlan {
    #[must_use]
    pub fn is_buildable(&self, guid: &str) -> bool {
        self.buildable.contains(guid)
    }

    #[must_use]
    pub fn dependencies_of(&self, guid: &str) -> &[String] {
        self.dependencies.get(guid).map_or(&[], Vec::as_slice)
    }

    /// Buildable projects in build order
    pub fn buildable_in_order(&self) -> impl Iterator<Item = &str> {
        self.build_order
            .iter()
            .filter(|g| self.buildable.contains(*g))
            .map(String::as_str)
    }

    /// Keeps only roots and everything they transitively depend on
    #[must_use]
    pub fn narrow(&self, roots: &[String]) -> ProjectGraphPlan {
        let mut keep = HashSet::new();
        let mut stack: Vec<&str> = roots.iter().map(String::as_str).collect();
        while let Some(guid) = stack.pop() {
            if keep.insert(guid) {
                stack.extend(self.dependencies_of(guid).iter().map(String::as_str));
            }
        }
        ProjectGraphPlan {
            build_order: self
                .build_order
                .iter()
                .filter(|g| keep.contains(g.as_str()))
                .cloned()
                .collect(),
            buildable: self
                .buildable
                .iter()
                .filter(|g| keep.contains(g.as_str()))
                .cloned()
                .collect(),
            dependencies: self
                .dependencies
                .iter()
                .filter(|(g, _)| keep.contains(g.as_str()))
                .map(|(g, d)| (g.clone(), d.clone()))
                .collect(),
            missing_references: self.missing_references.clone(),
            duplicate_names: self.duplicate_names.clone(),
            cycles: self.cycles.clone(),
        }
    }
}

/// Builds project dependency graph of a parsed solution
pub struct DependencyResolver<'a> {
    model: &'a SolutionModel,
}

impl<'a> DependencyResolver<'a> {
    #[must_use]
    pub fn new(model: &'a SolutionModel) -> Self {
        Self { model }
    }

    /// Fails on the first missing reference, duplicate name or dependency cycle
    pub fn resolve(&self) -> Result<ProjectGraphPlan, SolutionError> {
        let plan = self.analyze();
        if let Some(guid) = plan.missing_references.first() {
            let project = self
                .model
                .projects()
                .iter()
                .find(|p| p.dependency_guids.iter().any(|d| d == guid))
                .map(|p| p.display_name.clone())
                .unwrap_or_default();
            return Err(SolutionError::MissingDependency {
                project,
                guid: guid.clone(),
            });
        }
        if let Some(name) = plan.duplicate_names.first() {
            return Err(SolutionError::DuplicateProject { name: name.clone() });
        }
        if let Some(cycle) = plan.cycles.first() {
            return Err(SolutionError::DependencyCycle {
                guids: cycle.clone(),
            });
        }
        tracing::debug!(projects = plan.build_order.len(), "dependencies resolved");
        Ok(plan)
    }

    /// Never fails. Problems are reported inside the plan
    #[must_use]
    pub fn analyze(&self) -> ProjectGraphPlan {
        let projects = self.model.projects();
        let mut plan = ProjectGraphPlan::default();

        let mut graph = DiGraph::<ProjectId, Edge>::new();
        let nodes: HashMap<ProjectId, NodeIndex> = projects
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_solution_folder())
            .map(|(ix, _)| (ProjectId(ix), graph.add_node(ProjectId(ix))))
            .collect();

        let mut ordering = Vec::new();
        for (ix, entry) in projects.iter().enumerate() {
            let id = ProjectId(ix);
            let mut hard = Vec::new();
            for guid in &entry.dependency_guids {
                let Some(dep) = self.model.id_of(guid) else {
                    if !plan.missing_references.contains(guid) {
                        plan.missing_references.push(guid.clone());
                    }
                    continue;
                };
                if entry.is_solution_folder() {
                    for member in self.members(id) {
                        self.order_after(&mut ordering, member, dep);
                    }
                } else if projects[dep.0].is_solution_folder() {
                    ordering.extend(self.members(dep).into_iter().map(|m| (m, id)));
                } else {
                    add_edge(&mut graph, &nodes, dep, id, Edge::Hard);
                    hard.push(projects[dep.0].guid.clone());
                }
            }
            if !entry.is_solution_folder() {
                plan.dependencies.insert(entry.guid.clone(), hard);
                if is_buildable(entry) {
                    plan.buildable.insert(entry.guid.clone());
                }
            }
        }

        // Ordering edges go last and are dropped when they would close a cycle
        for (from, to) in ordering {
            add_edge(&mut graph, &nodes, from, to, Edge::Soft);
        }

        plan.duplicate_names = projects
            .iter()
            .filter(|p| !p.is_solution_folder())
            .map(|p| p.unique_name.to_lowercase())
            .duplicates()
            .collect();

        let (order, stalled) = topological_order(&graph);
        plan.build_order = order
            .iter()
            .chain(stalled.iter())
            .map(|n| projects[graph[*n].0].guid.clone())
            .collect();

        if !stalled.is_empty() {
            plan.cycles = tarjan_scc(&graph)
                .into_iter()
                .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
                .map(|scc| {
                    scc.into_iter()
                        .map(|n| graph[n])
                        .sorted()
                        .map(|id| projects[id.0].guid.clone())
                        .collect()
                })
                .collect();
        }

        tracing::trace!(
            buildable = plan.buildable.len(),
            missing = plan.missing_references.len(),
            cycles = plan.cycles.len(),
            "dependency graph analyzed"
        );
        plan
    }

    /// Non folder projects nested at any depth under folder
    fn members(&self, folder: ProjectId) -> Vec<ProjectId> {
        self.model
            .projects()
            .iter()
            .enumerate()
            .map(|(ix, _)| ProjectId(ix))
            .filter(|id| !self.model.project(*id).is_solution_folder())
            .filter(|id| {
                std::iter::successors(self.model.project(*id).parent, |p| {
                    self.model.project(*p).parent
                })
                .any(|p| p == folder)
            })
            .collect()
    }

    fn order_after(
        &self,
        ordering: &mut Vec<(ProjectId, ProjectId)>,
        member: ProjectId,
        dep: ProjectId,
    ) {
        if self.model.project(dep).is_solution_folder() {
            ordering.extend(self.members(dep).into_iter().map(|m| (m, member)));
        } else {
            ordering.push((dep, member));
        }
    }
}

fn is_buildable(entry: &ProjectEntry) -> bool {
    if entry.kind.is_container() || entry.etp_error.is_some() {
        return false;
    }
    entry.kind != ProjectKind::WebSite || entry.has_aspnet_configurations()
}

fn add_edge(
    graph: &mut DiGraph<ProjectId, Edge>,
    nodes: &HashMap<ProjectId, NodeIndex>,
    from: ProjectId,
    to: ProjectId,
    edge: Edge,
) {
    let (Some(a), Some(b)) = (nodes.get(&from), nodes.get(&to)) else {
        return;
    };
    if graph.contains_edge(*a, *b) {
        return;
    }
    if edge == Edge::Soft && (a == b || has_path_connecting(&*graph, *b, *a, None)) {
        tracing::debug!(
            from = from.index(),
            to = to.index(),
            "folder ordering edge closes a cycle and is dropped"
        );
        return;
    }
    graph.add_edge(*a, *b, edge);
}

/// Kahn's algorithm picking the earliest declared ready project first.
/// Returns ordered nodes and nodes left because they take part in cycles.
fn topological_order(graph: &DiGraph<ProjectId, Edge>) -> (Vec<NodeIndex>, Vec<NodeIndex>) {
    let mut in_degree: HashMap<NodeIndex, usize> = graph
        .node_indices()
        .map(|n| (n, graph.neighbors_directed(n, Direction::Incoming).count()))
        .collect();
    let mut ready: BinaryHeap<Reverse<(ProjectId, NodeIndex)>> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(n, _)| Reverse((graph[*n], *n)))
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse((_, node))) = ready.pop() {
        order.push(node);
        for next in graph.neighbors_directed(node, Direction::Outgoing) {
            if let Some(d) = in_degree.get_mut(&next) {
                *d -= 1;
                if *d == 0 {
                    ready.push(Reverse((graph[next], next)));
                }
            }
        }
    }

    let placed: HashSet<NodeIndex> = order.iter().copied().collect();
    let stalled = graph
        .node_indices()
        .filter(|n| !placed.contains(n))
        .sorted_by_key(|n| graph[*n])
        .collect();
    (order, stalled)
}
