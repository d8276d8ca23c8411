use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::{ExecutionPlan, TaskDefinition};

/// Service for resolving task dependencies into execution phases and
/// detecting circular dependencies
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver;

// Standalone helper for cycle detection (no self needed)
fn detect_cycle_util<'a>(
    node: &'a str,
    graph: &BTreeMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(neighbors) = graph.get(node) {
        for &neighbor in neighbors {
            if !visited.contains(neighbor) {
                if detect_cycle_util(neighbor, graph, visited, rec_stack, path) {
                    return true;
                }
            } else if rec_stack.contains(neighbor) {
                // Cycle detected; keep only the looping part and close it
                if let Some(cycle_start) = path.iter().position(|&n| n == neighbor) {
                    path.drain(0..cycle_start);
                    path.push(neighbor);
                    return true;
                }
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    false
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Validate that every dependency refers to a task in the set.
    pub fn validate_dependencies(&self, tasks: &[TaskDefinition]) -> DomainResult<()> {
        let names: HashSet<&str> = tasks.iter().map(|t| t.name.as_str()).collect();

        for task in tasks {
            for dep in &task.dependencies {
                if !names.contains(dep.as_str()) {
                    return Err(OrchestrationError::UnknownDependency {
                        task: task.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Detect circular dependencies among a set of tasks. Returns the cycle
    /// as a closed path (`a, b, a`). Only edges inside the set are followed.
    pub fn detect_cycle(&self, tasks: &[TaskDefinition]) -> Option<Vec<String>> {
        let names: HashSet<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
        let mut graph: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        // Build adjacency list (task -> its dependencies)
        for task in tasks {
            graph.entry(task.name.as_str()).or_default().extend(
                task.dependencies
                    .iter()
                    .map(String::as_str)
                    .filter(|d| names.contains(d)),
            );
        }

        // DFS-based cycle detection
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for &node in graph.keys() {
            if !visited.contains(node)
                && detect_cycle_util(node, &graph, &mut visited, &mut rec_stack, &mut path)
            {
                return Some(path.into_iter().map(str::to_string).collect());
            }
        }

        None
    }

    /// Resolve `task_set` into ordered phases using `definitions` (which may
    /// cover more tasks than requested).
    ///
    /// Each phase holds every remaining task whose dependencies all sit in
    /// earlier phases. Within a phase, names are sorted so the plan is
    /// reproducible.
    pub fn resolve_phases(
        &self,
        task_set: &[String],
        definitions: &[TaskDefinition],
    ) -> DomainResult<ExecutionPlan> {
        let by_name: HashMap<&str, &TaskDefinition> =
            definitions.iter().map(|d| (d.name.as_str(), d)).collect();

        let mut selected = Vec::with_capacity(task_set.len());
        let mut seen = HashSet::new();
        for name in task_set {
            if !seen.insert(name.as_str()) {
                continue;
            }
            let def = by_name
                .get(name.as_str())
                .ok_or_else(|| OrchestrationError::UnknownTask(name.clone()))?;
            selected.push((*def).clone());
        }

        self.resolve(&selected)
    }

    /// Resolve every task in `tasks` into ordered phases.
    pub fn resolve(&self, tasks: &[TaskDefinition]) -> DomainResult<ExecutionPlan> {
        self.validate_dependencies(tasks)?;

        let mut remaining: BTreeMap<&str, &TaskDefinition> =
            tasks.iter().map(|t| (t.name.as_str(), t)).collect();
        let mut completed: HashSet<&str> = HashSet::new();
        let mut phases = Vec::new();

        while !remaining.is_empty() {
            // BTreeMap iteration keeps each batch lexicographically ordered
            let batch: Vec<&str> = remaining
                .iter()
                .filter(|(_, def)| {
                    def.dependencies
                        .iter()
                        .all(|d| completed.contains(d.as_str()))
                })
                .map(|(&name, _)| name)
                .collect();

            if batch.is_empty() {
                let stuck: Vec<TaskDefinition> =
                    remaining.values().map(|&d| d.clone()).collect();
                let cycle = self.detect_cycle(&stuck).unwrap_or_else(|| {
                    remaining.keys().map(|n| (*n).to_string()).collect()
                });
                return Err(OrchestrationError::DependencyCycle(cycle));
            }

            for &name in &batch {
                remaining.remove(name);
                completed.insert(name);
            }
            phases.push(batch.into_iter().map(str::to_string).collect());
        }

        Ok(ExecutionPlan::new(phases))
    }
}
