use super::{PlanError, Result};
use crate::registry::ProfileRegistry;
use crate::routing::RouteTable;
use crate::types::SourceArtifact;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

/// Artifacts that one compiler profile builds in a single invocation.
#[derive(Debug, Clone, Serialize)]
pub struct CompilationBatch {
    pub profile_id: String,
    /// Imports come before their importers; ties are broken by path.
    pub artifacts: Vec<SourceArtifact>,
    /// Sources from other batches that the artifacts import, directly or
    /// transitively, sorted by path. The compiler reads them but produces no
    /// output for them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<SourceArtifact>,
}

impl CompilationBatch {
    pub fn paths(&self) -> Vec<&str> {
        self.artifacts.iter().map(|a| a.path.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildPlan {
    /// In profile declaration order. Empty batches are omitted.
    pub batches: Vec<CompilationBatch>,
}

impl BuildPlan {
    pub fn artifact_count(&self) -> usize {
        self.batches.iter().map(|b| b.artifacts.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

pub struct BuildPlanner<'a> {
    registry: &'a ProfileRegistry,
}

impl<'a> BuildPlanner<'a> {
    pub fn new(registry: &'a ProfileRegistry) -> Self {
        Self { registry }
    }

    pub fn plan(&self, routes: &RouteTable) -> Result<BuildPlan> {
        let mut grouped: BTreeMap<usize, Vec<&SourceArtifact>> = BTreeMap::new();
        for route in routes.values() {
            let position = self
                .registry
                .profile_position(&route.profile_id)
                .ok_or_else(|| PlanError::UnknownProfile {
                    artifact: route.artifact.path.clone(),
                    profile_id: route.profile_id.clone(),
                })?;
            grouped.entry(position).or_default().push(&route.artifact);
        }

        let mut batches = Vec::with_capacity(grouped.len());
        for (position, artifacts) in grouped {
            let profile_id = self.registry.compiler_profiles()[position].id.clone();
            let ordered = order_batch(&profile_id, &artifacts)?;
            let dependencies = external_dependencies(routes, &ordered);
            debug!(
                "Batch {} has {} artifacts and {} external dependencies",
                profile_id,
                ordered.len(),
                dependencies.len()
            );
            batches.push(CompilationBatch {
                profile_id,
                artifacts: ordered,
                dependencies,
            });
        }

        let plan = BuildPlan { batches };
        info!(
            "Planned {} batches covering {} artifacts",
            plan.batches.len(),
            plan.artifact_count()
        );
        Ok(plan)
    }
}

/// The import closure of `batch` minus the batch itself.
fn external_dependencies(routes: &RouteTable, batch: &[SourceArtifact]) -> Vec<SourceArtifact> {
    let members: BTreeSet<&str> = batch.iter().map(|a| a.path.as_str()).collect();
    let mut found: BTreeMap<&str, &SourceArtifact> = BTreeMap::new();
    let mut stack: Vec<&str> = batch
        .iter()
        .flat_map(|a| a.imports.iter().map(String::as_str))
        .collect();

    while let Some(path) = stack.pop() {
        if members.contains(path) || found.contains_key(path) {
            continue;
        }
        let Some(route) = routes.get(path) else {
            continue;
        };
        found.insert(route.artifact.path.as_str(), &route.artifact);
        stack.extend(route.artifact.imports.iter().map(String::as_str));
    }

    found.into_values().cloned().collect()
}

/// Orders one batch so that every artifact follows the artifacts it imports.
/// Only edges with both ends inside the batch count.
fn order_batch(profile_id: &str, artifacts: &[&SourceArtifact]) -> Result<Vec<SourceArtifact>> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
    for artifact in artifacts {
        nodes.insert(artifact.path.as_str(), graph.add_node(artifact.path.as_str()));
    }

    // importer -> import
    for artifact in artifacts {
        let from = nodes[artifact.path.as_str()];
        for import in &artifact.imports {
            if let Some(&to) = nodes.get(import.as_str()) {
                graph.update_edge(from, to, ());
            }
        }
    }

    if let Some(cycle) = find_cycle(&graph) {
        return Err(PlanError::DependencyCycle {
            profile_id: profile_id.to_string(),
            cycle,
        });
    }

    // Kahn over the reversed edges: an artifact is ready once all its
    // in-batch imports are placed.
    let mut pending: HashMap<NodeIndex, usize> = graph
        .node_indices()
        .map(|node| (node, graph.neighbors(node).count()))
        .collect();
    let mut ready: BTreeSet<&str> = pending
        .iter()
        .filter(|(_, &count)| count == 0)
        .map(|(&node, _)| graph[node])
        .collect();

    let by_path: HashMap<&str, &SourceArtifact> =
        artifacts.iter().map(|a| (a.path.as_str(), *a)).collect();
    let mut ordered = Vec::with_capacity(artifacts.len());

    while let Some(path) = ready.pop_first() {
        ordered.push(by_path[path].clone());
        let node = nodes[path];
        for importer in graph.neighbors_directed(node, petgraph::Direction::Incoming) {
            if let Some(count) = pending.get_mut(&importer) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(graph[importer]);
                }
            }
        }
    }

    Ok(ordered)
}

/// Returns the full path of one import cycle, starting and ending at the
/// lexicographically smallest artifact of the first cyclic component.
fn find_cycle(graph: &DiGraph<&str, ()>) -> Option<Vec<String>> {
    let mut components: Vec<Vec<NodeIndex>> = tarjan_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .collect();
    for component in &mut components {
        component.sort_by_key(|&node| graph[node]);
    }
    components.sort_by_key(|component| graph[component[0]]);

    let component = components.into_iter().next()?;
    let members: BTreeSet<NodeIndex> = component.iter().copied().collect();
    let start = component[0];

    let mut path = vec![start];
    if walk_back(graph, &members, start, start, &mut path) {
        Some(path.into_iter().map(|node| graph[node].to_string()).collect())
    } else {
        Some(vec![graph[start].to_string(), graph[start].to_string()])
    }
}

fn walk_back(
    graph: &DiGraph<&str, ()>,
    members: &BTreeSet<NodeIndex>,
    start: NodeIndex,
    current: NodeIndex,
    path: &mut Vec<NodeIndex>,
) -> bool {
    let mut next: Vec<NodeIndex> = graph
        .neighbors(current)
        .filter(|node| members.contains(node))
        .collect();
    next.sort_by_key(|&node| graph[node]);

    for node in next {
        if node == start {
            path.push(node);
            return true;
        }
        if path.contains(&node) {
            continue;
        }
        path.push(node);
        if walk_back(graph, members, start, node, path) {
            return true;
        }
        path.pop();
    }
    false
}
