//! Pipeline orchestrator: runs the task graph for every platform in turn.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use stager_targets::parse::require_valid;
use stager_targets::{BuildConfig, Platform, PlatformConfigResolver, PlatformDirs, ToolchainConfig};

use crate::compile::{compile, CompileUnit};
use crate::error::BuildError;
use crate::extract::{extract_flat, wrap_flat};
use crate::graph::{Artifact, StageState, Task, TaskGraph, TaskKind};
use crate::invoke::ToolRunner;
use crate::link::{link, LinkJob};
use crate::report::{ArtifactRecord, BuildReport};
use crate::verify::check_embedding;

/// Drives the two-stage build for every configured platform.
pub struct PipelineOrchestrator<'a> {
    project_dir: PathBuf,
    config: &'a BuildConfig,
    toolchain: &'a ToolchainConfig,
    runner: &'a dyn ToolRunner,
    resolver: PlatformConfigResolver,
    graph: TaskGraph,
}

/// Mutable state of one platform's run.
struct PlatformRun {
    dirs: PlatformDirs,
    state: StageState,
    finished: HashSet<TaskKind>,
    hook_stem: Option<String>,
    hook_embedded_at: Option<u64>,
}

impl<'a> PipelineOrchestrator<'a> {
    /// Validate `config` and prepare the standard task graph.
    pub fn new(
        project_dir: impl Into<PathBuf>,
        config: &'a BuildConfig,
        toolchain: &'a ToolchainConfig,
        runner: &'a dyn ToolRunner,
    ) -> Result<Self, BuildError> {
        require_valid(config)?;
        let project_dir = project_dir.into();
        let resolver = PlatformConfigResolver::new(&project_dir, config);
        Ok(Self {
            project_dir,
            config,
            toolchain,
            runner,
            resolver,
            graph: TaskGraph::standard()?,
        })
    }

    /// Build every platform in order. Stops at the first failure; later
    /// platforms are not started.
    pub fn run(&self) -> Result<Vec<BuildReport>, BuildError> {
        let mut reports = Vec::with_capacity(self.config.platforms.len());
        for platform in &self.config.platforms {
            reports.push(self.run_platform(platform)?);
        }
        Ok(reports)
    }

    /// Build one platform from `start` to `done`.
    pub fn run_platform(&self, platform: &Platform) -> Result<BuildReport, BuildError> {
        let start = Instant::now();
        log::info!("{platform}: {}", StageState::Start);

        let fail = |state: StageState| {
            move |source: BuildError| BuildError::Platform {
                platform: platform.name.clone(),
                state,
                source: Box::new(source),
            }
        };

        let dirs = self
            .resolver
            .resolve(platform)
            .map_err(|e| fail(StageState::Start)(e.into()))?;
        let mut run = PlatformRun {
            dirs,
            state: StageState::Start,
            finished: HashSet::new(),
            hook_stem: None,
            hook_embedded_at: None,
        };

        for task in self.graph.ordered() {
            log::debug!("{platform}: {:?}", task.kind);
            self.execute(task, &mut run).map_err(fail(run.state))?;
            self.advance(task, &mut run);
        }
        run.state = StageState::Done;
        log::info!("{platform}: {}", run.state);

        let artifacts = self
            .graph
            .artifacts()
            .into_iter()
            .map(|artifact| ArtifactRecord::capture(artifact, &self.path(&run, artifact)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(fail(run.state))?;

        let report = BuildReport {
            platform: platform.name.clone(),
            final_state: run.state,
            duration_ms: start.elapsed().as_millis() as u64,
            layout: self.config.layout,
            hook_embedded_at: run.hook_embedded_at,
            artifacts,
        };
        report
            .write_json(&run.dirs.build_dir)
            .map_err(fail(run.state))?;
        Ok(report)
    }

    /// Record `task` as finished and move to its state once all of that
    /// state's tasks are done.
    fn advance(&self, task: &Task, run: &mut PlatformRun) {
        run.finished.insert(task.kind);
        let target = task.kind.reaches();
        let complete = self
            .graph
            .tasks()
            .iter()
            .filter(|t| t.kind.reaches() == target)
            .all(|t| run.finished.contains(&t.kind));
        if complete && target > run.state {
            run.state = target;
            log::info!("{}: {}", run.dirs.platform, run.state);
        }
    }

    fn source(&self, relative: &Path) -> PathBuf {
        self.project_dir.join(relative)
    }

    fn path(&self, run: &PlatformRun, artifact: Artifact) -> PathBuf {
        run.dirs.artifact(artifact.file_name())
    }

    fn inputs(&self, run: &PlatformRun, task: &Task) -> Vec<PathBuf> {
        task.inputs.iter().map(|&a| self.path(run, a)).collect()
    }

    fn execute(&self, task: &Task, run: &mut PlatformRun) -> Result<(), BuildError> {
        let sources = &self.config.sources;
        let flags = &self.config.flags;
        let layout = &self.config.layout;
        let output = self.path(run, task.output);

        match task.kind {
            TaskKind::CompileHookStart => {
                let unit = CompileUnit::new(self.source(&sources.hook_start), output);
                compile(self.runner, self.toolchain, flags, &unit)?;
            }
            TaskKind::CompileHook => {
                let unit = CompileUnit::new(self.source(&sources.hook), output)
                    .with_include(run.dirs.hook_header());
                compile(self.runner, self.toolchain, flags, &unit)?;
            }
            TaskKind::CompileShellcode => {
                let unit = CompileUnit::new(self.source(&sources.shellcode), output)
                    .with_include(run.dirs.config_asm());
                compile(self.runner, self.toolchain, flags, &unit)?;
            }
            TaskKind::CompileSupport => {
                let unit = CompileUnit::new(self.source(&sources.support), output)
                    .with_include(run.dirs.config_header());
                compile(self.runner, self.toolchain, flags, &unit)?;
            }
            TaskKind::LinkHook | TaskKind::LinkShellcode => {
                let load_address = if task.kind == TaskKind::LinkHook {
                    layout.hook_base
                } else {
                    layout.shellcode_base
                };
                let job = LinkJob {
                    objects: self.inputs(run, task),
                    load_address,
                    linker_script: self.source(&sources.linker_script),
                    output,
                };
                link(self.runner, self.toolchain, flags, &job)?;

                if task.kind == TaskKind::LinkShellcode {
                    let stem = run.hook_stem.as_deref().ok_or_else(|| BuildError::Config {
                        message: "shellcode linked before the hook was wrapped".into(),
                    })?;
                    let hook = self.path(run, Artifact::HookFlat);
                    run.hook_embedded_at = Some(check_embedding(&job.output, &hook, stem)?);
                }
            }
            TaskKind::ExtractHook | TaskKind::ExtractShellcode => {
                let elf = self.path(run, task.inputs[0]);
                extract_flat(self.runner, self.toolchain, &elf, &output)?;

                if task.kind == TaskKind::ExtractHook {
                    let size = std::fs::metadata(&output)
                        .map_err(|e| BuildError::io(&output, e))?
                        .len();
                    if !layout.hook_fits(size) {
                        return Err(BuildError::HookTooLarge {
                            size,
                            capacity: layout.hook_capacity(),
                        });
                    }
                }
            }
            TaskKind::WrapHook => {
                let flat = self.path(run, task.inputs[0]);
                let stem = wrap_flat(
                    self.runner,
                    self.toolchain,
                    &flags.object_format,
                    &flat,
                    &output,
                )?;
                run.hook_stem = Some(stem);
            }
        }
        Ok(())
    }
}
