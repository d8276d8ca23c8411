//! Execution plan: the resolved, ordered list of phases (waves).

use serde::{Deserialize, Serialize};

/// Ordered phases; each phase is a batch of task names that may run
/// concurrently. Immutable once resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    phases: Vec<Vec<String>>,
}

impl ExecutionPlan {
    pub fn new(phases: Vec<Vec<String>>) -> Self {
        Self { phases }
    }

    pub fn phases(&self) -> &[Vec<String>] {
        &self.phases
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    pub fn task_count(&self) -> usize {
        self.phases.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Index of the phase containing `task`.
    pub fn phase_of(&self, task: &str) -> Option<usize> {
        self.phases
            .iter()
            .position(|phase| phase.iter().any(|t| t == task))
    }

    /// All task names in phase order.
    pub fn flatten(&self) -> Vec<String> {
        self.phases.iter().flatten().cloned().collect()
    }

    /// Task names in phases after `phase_index`.
    pub fn tasks_after(&self, phase_index: usize) -> Vec<String> {
        self.phases
            .iter()
            .skip(phase_index + 1)
            .flatten()
            .cloned()
            .collect()
    }

    pub fn into_phases(self) -> Vec<Vec<String>> {
        self.phases
    }
}

impl std::fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self
            .phases
            .iter()
            .map(|phase| format!("[{}]", phase.join(", ")))
            .collect();
        write!(f, "[{}]", rendered.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> ExecutionPlan {
        ExecutionPlan::new(vec![
            vec!["a".into(), "b".into()],
            vec!["c".into()],
            vec!["d".into()],
        ])
    }

    #[test]
    fn test_lookup_helpers() {
        let plan = plan();
        assert_eq!(plan.phase_count(), 3);
        assert_eq!(plan.task_count(), 4);
        assert_eq!(plan.phase_of("b"), Some(0));
        assert_eq!(plan.phase_of("d"), Some(2));
        assert_eq!(plan.phase_of("z"), None);
        assert_eq!(plan.flatten(), vec!["a", "b", "c", "d"]);
        assert_eq!(plan.tasks_after(0), vec!["c", "d"]);
        assert!(plan.tasks_after(2).is_empty());
    }

    #[test]
    fn test_display() {
        assert_eq!(plan().to_string(), "[[a, b], [c], [d]]");
        assert_eq!(ExecutionPlan::default().to_string(), "[]");
    }
}
