//! Execution plan: a DAG with one task per intent

use agent_core::{Entities, Error, IntentKind, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// How strongly a task depends on another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyStrength {
    /// The dependent cannot run if the dependency fails
    #[default]
    Hard,
    /// The dependent waits for the dependency but runs regardless of outcome
    Soft,
}

/// An edge from a task to one it depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub on: IntentKind,
    pub strength: DependencyStrength,
}

/// A node in the execution plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub intent: IntentKind,
    pub entities: Entities,
    /// Name of the agent that serves the intent
    pub agent: String,
    /// Whether the user asked for this intent or it was added as a dependency
    pub requested: bool,
    pub depends_on: Vec<Dependency>,
}

impl Task {
    pub fn new(intent: IntentKind, agent: impl Into<String>, entities: Entities, requested: bool) -> Self {
        Self {
            intent,
            entities,
            agent: agent.into(),
            requested,
            depends_on: Vec::new(),
        }
    }

    pub fn depends_on(mut self, on: IntentKind, strength: DependencyStrength) -> Self {
        self.add_dependency(on, strength);
        self
    }

    fn add_dependency(&mut self, on: IntentKind, strength: DependencyStrength) {
        match self.depends_on.iter_mut().find(|d| d.on == on) {
            // A hard edge wins over a soft one
            Some(existing) => {
                if strength == DependencyStrength::Hard {
                    existing.strength = strength;
                }
            }
            None => self.depends_on.push(Dependency { on, strength }),
        }
    }
}

/// Immutable, validated execution plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    id: Uuid,
    tasks: BTreeMap<IntentKind, Task>,
    /// Topological order, ties broken by intent priority
    order: Vec<IntentKind>,
}

impl ExecutionPlan {
    pub fn builder() -> PlanBuilder {
        PlanBuilder::default()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, intent: IntentKind) -> Option<&Task> {
        self.tasks.get(&intent)
    }

    /// Tasks in topological order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|intent| self.tasks.get(intent))
    }

    pub fn order(&self) -> &[IntentKind] {
        &self.order
    }

    /// Intents the user explicitly asked for
    pub fn requested(&self) -> Vec<IntentKind> {
        self.tasks().filter(|t| t.requested).map(|t| t.intent).collect()
    }

    /// Tasks without dependencies
    pub fn roots(&self) -> Vec<IntentKind> {
        self.tasks()
            .filter(|t| t.depends_on.is_empty())
            .map(|t| t.intent)
            .collect()
    }
}

/// Builder for [`ExecutionPlan`]
#[derive(Debug, Default)]
pub struct PlanBuilder {
    tasks: BTreeMap<IntentKind, Task>,
}

impl PlanBuilder {
    /// Add a task; a second task for the same intent is merged into the first
    pub fn task(mut self, task: Task) -> Self {
        self.add_task(task);
        self
    }

    pub fn add_task(&mut self, task: Task) {
        match self.tasks.get_mut(&task.intent) {
            Some(existing) => {
                existing.entities.merge(&task.entities);
                existing.requested |= task.requested;
                for dep in task.depends_on {
                    existing.add_dependency(dep.on, dep.strength);
                }
            }
            None => {
                self.tasks.insert(task.intent, task);
            }
        }
    }

    pub fn contains(&self, intent: IntentKind) -> bool {
        self.tasks.contains_key(&intent)
    }

    pub fn entities(&self, intent: IntentKind) -> Option<&Entities> {
        self.tasks.get(&intent).map(|task| &task.entities)
    }

    /// Add an edge between two tasks already in the builder
    pub fn add_dependency(&mut self, dependent: IntentKind, on: IntentKind, strength: DependencyStrength) -> Result<()> {
        let task = self.tasks.get_mut(&dependent).ok_or_else(|| {
            Error::InvalidPlan(format!("no task for intent '{dependent}'"))
        })?;
        task.add_dependency(on, strength);
        Ok(())
    }

    /// Validate edges and compute the topological order
    pub fn build(self) -> Result<ExecutionPlan> {
        if self.tasks.is_empty() {
            return Err(Error::InvalidPlan("plan has no tasks".to_string()));
        }

        let mut in_degree: BTreeMap<IntentKind, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<IntentKind, Vec<IntentKind>> = BTreeMap::new();
        for task in self.tasks.values() {
            in_degree.entry(task.intent).or_insert(0);
            for dep in &task.depends_on {
                if dep.on == task.intent {
                    return Err(Error::InvalidPlan(format!(
                        "task '{}' depends on itself",
                        task.intent
                    )));
                }
                if !self.tasks.contains_key(&dep.on) {
                    return Err(Error::InvalidPlan(format!(
                        "task '{}' depends on missing task '{}'",
                        task.intent, dep.on
                    )));
                }
                *in_degree.entry(task.intent).or_insert(0) += 1;
                dependents.entry(dep.on).or_default().push(task.intent);
            }
        }

        // Kahn's algorithm; the ordered set keeps ties in priority order
        let mut ready: BTreeSet<IntentKind> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(intent, _)| *intent)
            .collect();
        let mut order = Vec::with_capacity(self.tasks.len());

        while let Some(intent) = ready.pop_first() {
            order.push(intent);
            for dependent in dependents.get(&intent).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }

        if order.len() != self.tasks.len() {
            let cyclic: Vec<String> = in_degree
                .iter()
                .filter(|(_, degree)| **degree > 0)
                .map(|(intent, _)| intent.to_string())
                .collect();
            return Err(Error::InvalidPlan(format!(
                "dependency cycle among: {}",
                cyclic.join(", ")
            )));
        }

        Ok(ExecutionPlan {
            id: Uuid::new_v4(),
            tasks: self.tasks,
            order,
        })
    }
}
