//! The per-platform task graph.
//!
//! Each task produces exactly one artifact from artifacts of earlier tasks
//! (plus the shared sources and the platform's overlays). The graph is
//! validated and ordered once; every platform runs an instance of it.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use crate::error::BuildError;

/// A file produced inside a platform's build directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Artifact {
    HookStartObject,
    HookObject,
    HookElf,
    HookFlat,
    HookWrapped,
    ShellcodeObject,
    SupportObject,
    ShellcodeElf,
    ShellcodeFlat,
}

impl Artifact {
    /// File name inside the build directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Artifact::HookStartObject => "hook_start.o",
            Artifact::HookObject => "hook.o",
            Artifact::HookElf => "hook.elf",
            Artifact::HookFlat => "hook.bin",
            Artifact::HookWrapped => "hook_bin.o",
            Artifact::ShellcodeObject => "shellcode.o",
            Artifact::SupportObject => "globals.o",
            Artifact::ShellcodeElf => "shellcode.elf",
            Artifact::ShellcodeFlat => "shellcode.bin",
        }
    }

    /// Whether this artifact is one of the run's deliverables.
    pub fn is_deliverable(self) -> bool {
        matches!(self, Artifact::HookFlat | Artifact::ShellcodeFlat)
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Progress of one platform's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Start,
    HookCompiled,
    HookLinked,
    HookExtracted,
    HookObjectBuilt,
    ShellcodeCompiled,
    ShellcodeLinked,
    ShellcodeExtracted,
    Done,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StageState::Start => "start",
            StageState::HookCompiled => "hook_compiled",
            StageState::HookLinked => "hook_linked",
            StageState::HookExtracted => "hook_extracted",
            StageState::HookObjectBuilt => "hook_object_built",
            StageState::ShellcodeCompiled => "shellcode_compiled",
            StageState::ShellcodeLinked => "shellcode_linked",
            StageState::ShellcodeExtracted => "shellcode_extracted",
            StageState::Done => "done",
        })
    }
}

/// What a task does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    CompileHookStart,
    CompileHook,
    LinkHook,
    ExtractHook,
    WrapHook,
    CompileShellcode,
    CompileSupport,
    LinkShellcode,
    ExtractShellcode,
}

impl TaskKind {
    /// State reached once every task of this state has finished.
    pub fn reaches(self) -> StageState {
        match self {
            TaskKind::CompileHookStart | TaskKind::CompileHook => StageState::HookCompiled,
            TaskKind::LinkHook => StageState::HookLinked,
            TaskKind::ExtractHook => StageState::HookExtracted,
            TaskKind::WrapHook => StageState::HookObjectBuilt,
            TaskKind::CompileShellcode | TaskKind::CompileSupport => {
                StageState::ShellcodeCompiled
            }
            TaskKind::LinkShellcode => StageState::ShellcodeLinked,
            TaskKind::ExtractShellcode => StageState::ShellcodeExtracted,
        }
    }
}

/// One node of the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub kind: TaskKind,
    /// Artifacts read, in the order the tool receives them.
    pub inputs: Vec<Artifact>,
    pub output: Artifact,
}

impl Task {
    pub fn new(kind: TaskKind, inputs: &[Artifact], output: Artifact) -> Self {
        Self {
            kind,
            inputs: inputs.to_vec(),
            output,
        }
    }
}

/// A validated execution order for a task graph.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Task indices in the order they run.
    pub order: Vec<usize>,
    /// Task indices grouped by dependency depth; tasks in one level are
    /// independent of each other.
    pub levels: Vec<Vec<usize>>,
    /// Number of levels.
    pub sequential_depth: usize,
    /// Largest level.
    pub max_parallelism: usize,
}

/// The tasks one platform runs.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    plan: ExecutionPlan,
}

impl TaskGraph {
    /// Validate `tasks` and compute their execution plan.
    ///
    /// Fails if an artifact has more than one producer, an input has no
    /// producer, or the dependencies form a cycle.
    pub fn new(tasks: Vec<Task>) -> Result<Self, BuildError> {
        let invalid = |message: String| BuildError::InvalidTaskGraph { message };

        let mut producers: HashMap<Artifact, usize> = HashMap::new();
        for (i, task) in tasks.iter().enumerate() {
            if let Some(previous) = producers.insert(task.output, i) {
                return Err(invalid(format!(
                    "{} is produced by both {:?} and {:?}",
                    task.output, tasks[previous].kind, task.kind
                )));
            }
        }

        let mut dependencies: Vec<Vec<usize>> = Vec::with_capacity(tasks.len());
        for task in &tasks {
            let mut deps = Vec::new();
            for input in &task.inputs {
                match producers.get(input) {
                    Some(&producer) => deps.push(producer),
                    None => {
                        return Err(invalid(format!(
                            "{:?} reads {input}, which no task produces",
                            task.kind
                        )))
                    }
                }
            }
            dependencies.push(deps);
        }

        let plan = plan(&tasks, &dependencies).map_err(invalid)?;
        Ok(Self { tasks, plan })
    }

    /// The hook-then-shellcode pipeline.
    pub fn standard() -> Result<Self, BuildError> {
        use Artifact::*;
        Self::new(vec![
            Task::new(TaskKind::CompileHookStart, &[], HookStartObject),
            Task::new(TaskKind::CompileHook, &[], HookObject),
            // The object defining the entry symbol goes first.
            Task::new(TaskKind::LinkHook, &[HookStartObject, HookObject], HookElf),
            Task::new(TaskKind::ExtractHook, &[HookElf], HookFlat),
            Task::new(TaskKind::WrapHook, &[HookFlat], HookWrapped),
            Task::new(TaskKind::CompileShellcode, &[], ShellcodeObject),
            Task::new(TaskKind::CompileSupport, &[], SupportObject),
            Task::new(
                TaskKind::LinkShellcode,
                &[ShellcodeObject, SupportObject, HookWrapped],
                ShellcodeElf,
            ),
            Task::new(TaskKind::ExtractShellcode, &[ShellcodeElf], ShellcodeFlat),
        ])
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    /// Tasks in execution order.
    pub fn ordered(&self) -> impl Iterator<Item = &Task> + '_ {
        self.plan.order.iter().map(|&i| &self.tasks[i])
    }

    /// Every artifact the graph produces, in execution order.
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.ordered().map(|t| t.output).collect()
    }
}

/// Topological order (ties broken by declaration order) and depth levels.
fn plan(tasks: &[Task], dependencies: &[Vec<usize>]) -> Result<ExecutionPlan, String> {
    let mut remaining: Vec<usize> = dependencies.iter().map(Vec::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
    for (task, deps) in dependencies.iter().enumerate() {
        for &dep in deps {
            dependents[dep].push(task);
        }
    }

    let mut ready: BTreeSet<usize> = (0..tasks.len()).filter(|&i| remaining[i] == 0).collect();
    let mut order = Vec::with_capacity(tasks.len());
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &dependent in &dependents[next] {
            remaining[dependent] -= 1;
            if remaining[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() != tasks.len() {
        let stuck: Vec<String> = (0..tasks.len())
            .filter(|i| !order.contains(i))
            .map(|i| format!("{:?}", tasks[i].kind))
            .collect();
        return Err(format!("dependency cycle among {}", stuck.join(", ")));
    }

    let mut level = vec![0usize; tasks.len()];
    for &task in &order {
        level[task] = dependencies[task]
            .iter()
            .map(|&dep| level[dep] + 1)
            .max()
            .unwrap_or(0);
    }

    let depth = level.iter().copied().max().map_or(0, |l| l + 1);
    let mut levels: Vec<Vec<usize>> = vec![Vec::new(); depth];
    for &task in &order {
        levels[level[task]].push(task);
    }
    let max_parallelism = levels.iter().map(Vec::len).max().unwrap_or(0);

    Ok(ExecutionPlan {
        order,
        levels,
        sequential_depth: depth,
        max_parallelism,
    })
}
