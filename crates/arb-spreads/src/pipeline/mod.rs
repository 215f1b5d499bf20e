//! Declarative task graph.
//!
//! Each [`Task`] names the files it reads (`file_dep`) and writes (`targets`).
//! A task depends on the tasks listed in `task_dep` and, implicitly, on any
//! task whose target it reads. [`TaskGraph::run`] executes a selection plus
//! everything it depends on, in dependency order, skipping tasks whose outputs
//! are current:
//!
//! - a task with file dependencies or config values is current when all its
//!   targets exist and neither its dependencies nor its config values changed
//!   since its last successful run;
//! - a task with targets and nothing else is current when its targets exist;
//! - a task without targets always runs.

pub mod state;
pub mod tasks;

pub use state::{FileSignature, TaskState};
pub use tasks::default_graph;

use crate::{ArbError, Result, Settings};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use tracing::{info, warn};

/// Work performed by a task.
pub type Action = Box<dyn Fn(&Settings) -> Result<()> + Send + Sync>;

/// A node of the task graph.
pub struct Task {
    /// Unique name
    pub name: String,
    /// One-line description shown by `tasks`
    pub doc: String,
    /// Files read by the action
    pub file_dep: Vec<PathBuf>,
    /// Files written by the action
    pub targets: Vec<PathBuf>,
    /// Tasks that must run first
    pub task_dep: Vec<String>,
    /// Settings the output depends on, compared between runs
    pub config: BTreeMap<String, String>,
    action: Action,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("file_dep", &self.file_dep)
            .field("targets", &self.targets)
            .field("task_dep", &self.task_dep)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Task {
    /// Create a task with no dependencies or targets.
    pub fn new<F>(name: impl Into<String>, doc: impl Into<String>, action: F) -> Self
    where
        F: Fn(&Settings) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            doc: doc.into(),
            file_dep: Vec::new(),
            targets: Vec::new(),
            task_dep: Vec::new(),
            config: BTreeMap::new(),
            action: Box::new(action),
        }
    }

    /// Add files read by the task.
    pub fn with_file_dep(mut self, deps: impl IntoIterator<Item = PathBuf>) -> Self {
        self.file_dep.extend(deps);
        self
    }

    /// Add files written by the task.
    pub fn with_targets(mut self, targets: impl IntoIterator<Item = PathBuf>) -> Self {
        self.targets.extend(targets);
        self
    }

    /// Add tasks that must run first.
    pub fn with_task_dep<S: Into<String>>(mut self, deps: impl IntoIterator<Item = S>) -> Self {
        self.task_dep.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Add a config value; a change reruns the task.
    pub fn with_config(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.config.insert(key.into(), value.to_string());
        self
    }

    fn is_up_to_date(&self, state: &TaskState) -> bool {
        if self.targets.is_empty() || !self.targets.iter().all(|t| t.exists()) {
            return false;
        }
        (self.file_dep.is_empty() && self.config.is_empty())
            || state.unchanged(&self.name, &self.file_dep, &self.config)
    }
}

/// Options for [`TaskGraph::run`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Run every planned task even if it is up to date
    pub force: bool,
    /// Draw a progress bar on stderr
    pub progress: bool,
}

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Tasks whose action ran, in order
    pub executed: Vec<String>,
    /// Tasks skipped as up to date, in order
    pub skipped: Vec<String>,
}

/// A set of tasks.
#[derive(Debug, Default)]
pub struct TaskGraph {
    tasks: Vec<Task>,
}

impl TaskGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Add a task, replacing any task with the same name.
    pub fn register(&mut self, task: Task) {
        match self.tasks.iter().position(|t| t.name == task.name) {
            Some(idx) => self.tasks[idx] = task,
            None => self.tasks.push(task),
        }
    }

    /// Task names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    /// Look up a task.
    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Iterate tasks in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.tasks
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| ArbError::NotFound(format!("task {name}")))
    }

    /// Direct dependencies of the task at `idx`, as indices.
    fn dependencies_of(&self, idx: usize, producers: &HashMap<&PathBuf, usize>) -> Result<Vec<usize>> {
        let task = &self.tasks[idx];
        let mut deps = Vec::new();
        for name in &task.task_dep {
            deps.push(self.index_of(name)?);
        }
        for file in &task.file_dep {
            if let Some(&producer) = producers.get(file) {
                if producer != idx {
                    deps.push(producer);
                }
            }
        }
        deps.sort_unstable();
        deps.dedup();
        Ok(deps)
    }

    /// Tasks needed for `selected` (all tasks when empty), in execution order.
    ///
    /// Only tasks reachable from the selection are resolved, so a broken task
    /// elsewhere in the graph does not affect the plan.
    pub fn plan(&self, selected: &[String]) -> Result<Vec<&Task>> {
        let mut producers: HashMap<&PathBuf, usize> = HashMap::new();
        for (idx, task) in self.tasks.iter().enumerate() {
            for target in &task.targets {
                producers.insert(target, idx);
            }
        }

        let roots: Vec<usize> = if selected.is_empty() {
            (0..self.tasks.len()).collect()
        } else {
            selected
                .iter()
                .map(|name| self.index_of(name))
                .collect::<Result<_>>()?
        };

        let mut deps: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut stack = roots;
        while let Some(idx) = stack.pop() {
            if deps.contains_key(&idx) {
                continue;
            }
            let direct = self.dependencies_of(idx, &producers)?;
            stack.extend(&direct);
            deps.insert(idx, direct);
        }
        let needed: HashSet<usize> = deps.keys().copied().collect();

        let mut in_degree: HashMap<usize, usize> = needed.iter().map(|&i| (i, 0)).collect();
        let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();
        for (&idx, direct) in &deps {
            for &dep in direct {
                dependents.entry(dep).or_default().push(idx);
                if let Some(deg) = in_degree.get_mut(&idx) {
                    *deg += 1;
                }
            }
        }

        let mut ready: Vec<usize> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(&idx, _)| idx)
            .collect();
        ready.sort_unstable();
        let mut queue: VecDeque<usize> = ready.into();

        let mut order = Vec::with_capacity(needed.len());
        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            let mut unlocked = Vec::new();
            for &next in dependents.get(&idx).map(Vec::as_slice).unwrap_or_default() {
                if let Some(deg) = in_degree.get_mut(&next) {
                    *deg -= 1;
                    if *deg == 0 {
                        unlocked.push(next);
                    }
                }
            }
            unlocked.sort_unstable();
            queue.extend(unlocked);
        }

        if order.len() != needed.len() {
            let done: HashSet<usize> = order.iter().copied().collect();
            let mut stuck: Vec<String> = needed
                .difference(&done)
                .map(|&i| self.tasks[i].name.clone())
                .collect();
            stuck.sort();
            return Err(ArbError::TaskCycle(stuck));
        }

        Ok(order.into_iter().map(|i| &self.tasks[i]).collect())
    }

    /// Run `selected` (all tasks when empty) and their dependencies.
    ///
    /// Stops at the first failing task. State is saved after every success,
    /// so a rerun resumes where the failure happened.
    pub fn run(&self, settings: &Settings, selected: &[String], options: RunOptions) -> Result<RunSummary> {
        let plan = self.plan(selected)?;
        let state_path = settings.state_file();
        let mut state = TaskState::load(&state_path);
        let mut summary = RunSummary::default();

        let bar = if options.progress {
            let bar = ProgressBar::new(plan.len() as u64);
            if let Ok(style) = ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}") {
                bar.set_style(style);
            }
            bar
        } else {
            ProgressBar::hidden()
        };

        for task in plan {
            bar.set_message(task.name.clone());

            if !options.force && task.is_up_to_date(&state) {
                info!(task = %task.name, "up to date");
                summary.skipped.push(task.name.clone());
                bar.inc(1);
                continue;
            }

            info!(task = %task.name, "running");
            if let Err(e) = (task.action)(settings) {
                bar.abandon_with_message(format!("{} failed", task.name));
                state.forget(&task.name);
                state.save(&state_path)?;
                return Err(ArbError::TaskFailed {
                    task: task.name.clone(),
                    source: Box::new(e),
                });
            }

            for target in task.targets.iter().filter(|t| !t.exists()) {
                warn!(task = %task.name, target = %target.display(), "task did not create its target");
            }
            state.record(&task.name, &task.file_dep, &task.config);
            state.save(&state_path)?;
            summary.executed.push(task.name.clone());
            bar.inc(1);
        }

        bar.finish_and_clear();
        Ok(summary)
    }
}
