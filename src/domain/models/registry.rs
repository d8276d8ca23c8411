//! Task registry: static declarations of each workflow type's tasks.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::config::Config;
use super::task::{Priority, TaskDefinition};
use crate::domain::errors::{DomainResult, OrchestrationError};

/// Name of the built-in content pipeline.
pub const CONTENT_WORKFLOW: &str = "content";

/// A named set of task definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowType {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Registration order is preserved.
    pub tasks: Vec<TaskDefinition>,
}

impl WorkflowType {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tasks: Vec::new(),
        }
    }

    pub fn with_task(mut self, task: TaskDefinition) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn task(&self, name: &str) -> Option<&TaskDefinition> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn task_names(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.name.clone()).collect()
    }

    fn validate(&self) -> DomainResult<()> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.name.as_str()) {
                return Err(OrchestrationError::DuplicateTask(task.name.clone()));
            }
        }
        Ok(())
    }

    /// The content pipeline: research and branding feed generation, which
    /// is checked for compliance, formatted per channel and delivered.
    pub fn content_pipeline() -> Self {
        Self::new(CONTENT_WORKFLOW, "Marketing content generation and delivery pipeline")
            .with_task(TaskDefinition::new("market-research").with_priority(Priority::High))
            .with_task(TaskDefinition::new("brand-guidelines").with_priority(Priority::Critical))
            .with_task(
                TaskDefinition::new("content-generation")
                    .with_dependencies(["market-research", "brand-guidelines"])
                    .with_priority(Priority::High),
            )
            .with_task(
                TaskDefinition::new("compliance-check")
                    .with_dependencies(["content-generation", "brand-guidelines"])
                    .with_priority(Priority::Critical),
            )
            .with_task(
                TaskDefinition::new("image-generation")
                    .with_dependencies(["content-generation"])
                    .with_priority(Priority::Medium),
            )
            .with_task(
                TaskDefinition::new("whatsapp-formatting")
                    .with_dependencies(["compliance-check"])
                    .with_priority(Priority::Medium),
            )
            .with_task(
                TaskDefinition::new("linkedin-formatting")
                    .with_dependencies(["compliance-check", "image-generation"])
                    .with_priority(Priority::Medium),
            )
            .with_task(
                TaskDefinition::new("delivery")
                    .with_dependencies(["whatsapp-formatting", "linkedin-formatting"])
                    .with_priority(Priority::High),
            )
            .with_task(
                TaskDefinition::new("housekeeping")
                    .with_dependencies(["delivery"])
                    .with_priority(Priority::Low),
            )
    }
}

/// Registered workflow types, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    workflow_types: BTreeMap<String, WorkflowType>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in workflow types.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.workflow_types.insert(
            CONTENT_WORKFLOW.to_string(),
            WorkflowType::content_pipeline(),
        );
        registry
    }

    /// Built-in types overlaid with the given ones. A configured type with
    /// the same name replaces the built-in.
    pub fn with_workflows(workflows: Vec<WorkflowType>) -> DomainResult<Self> {
        let mut registry = Self::builtin();
        for wf in workflows {
            registry.register(wf)?;
        }
        Ok(registry)
    }

    /// Registry for a loaded configuration.
    pub fn from_config(config: &Config) -> DomainResult<Self> {
        Self::with_workflows(config.workflows.clone())
    }

    pub fn register(&mut self, workflow_type: WorkflowType) -> DomainResult<()> {
        workflow_type.validate()?;
        self.workflow_types
            .insert(workflow_type.name.clone(), workflow_type);
        Ok(())
    }

    pub fn get(&self, name: &str) -> DomainResult<&WorkflowType> {
        self.workflow_types
            .get(name)
            .ok_or_else(|| OrchestrationError::UnknownWorkflowType(name.to_string()))
    }

    pub fn workflow_types(&self) -> impl Iterator<Item = &WorkflowType> {
        self.workflow_types.values()
    }

    /// Definitions for the requested subset of a workflow type, or all of
    /// them when no subset is given. Names not registered in the type are
    /// rejected.
    pub fn select(&self, workflow_type: &str, subset: Option<&[String]>) -> DomainResult<Vec<TaskDefinition>> {
        let wf = self.get(workflow_type)?;
        let Some(subset) = subset else {
            return Ok(wf.tasks.clone());
        };

        for name in subset {
            if wf.task(name).is_none() {
                return Err(OrchestrationError::UnknownTask(name.clone()));
            }
        }

        let wanted: HashSet<&str> = subset.iter().map(String::as_str).collect();
        Ok(wf
            .tasks
            .iter()
            .filter(|t| wanted.contains(t.name.as_str()))
            .cloned()
            .collect())
    }
}
