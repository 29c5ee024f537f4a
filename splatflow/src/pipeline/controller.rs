//! Single-attempt pipeline execution.
//!
//! The controller decides per stage whether to skip, run, or reset and run,
//! based only on what is on disk, then drives the external tools in order.
//! It holds no state between runs; everything it learns is returned in a
//! [`ControllerReport`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;

use crate::core::{PipelineEvent, PipelineState, PurgeTarget, Stage, StageDecision};
use crate::errors::{ArtifactDiscoveryError, Result};
use crate::events::{EventSink, NoOpEventSink};
use crate::inspector::ArtifactInspector;
use crate::layout::JobLayout;
use crate::observability::SpanTimer;
use crate::runner::{run_checked, CommandRunner};
use crate::tools::{discover_training_config, DataSource, ToolCommands, ToolPrograms};

use super::JobSpec;

/// What happened to one stage during an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// The stage.
    pub stage: Stage,
    /// The decision taken.
    pub decision: StageDecision,
    /// Execution time, present only for executed stages.
    pub duration_ms: Option<f64>,
}

/// Result of one successful controller run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerReport {
    /// Terminal state of the attempt.
    pub state: PipelineState,
    /// Per-stage decisions in execution order.
    pub stages: Vec<StageRecord>,
    /// The exported point cloud.
    pub artifact: PathBuf,
    /// The training configuration used for export, when training ran.
    pub training_config: Option<PathBuf>,
    /// Wall-clock duration of the attempt.
    pub duration_ms: f64,
}

impl ControllerReport {
    /// The decision taken for `stage`.
    #[must_use]
    pub fn decision(&self, stage: Stage) -> Option<StageDecision> {
        self.stages
            .iter()
            .find(|record| record.stage == stage)
            .map(|record| record.decision)
    }

    /// Stages whose tools were invoked.
    #[must_use]
    pub fn executed_stages(&self) -> Vec<Stage> {
        self.stages
            .iter()
            .filter(|record| record.decision.executes())
            .map(|record| record.stage)
            .collect()
    }
}

/// Runs one pipeline attempt.
#[derive(Debug, Clone)]
pub struct PipelineController {
    runner: Arc<dyn CommandRunner>,
    programs: ToolPrograms,
    inspector: ArtifactInspector,
    sink: Arc<dyn EventSink>,
}

impl PipelineController {
    /// Creates a controller with default program names and no event sink.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            programs: ToolPrograms::default(),
            inspector: ArtifactInspector::new(),
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the external program names.
    #[must_use]
    pub fn with_programs(mut self, programs: ToolPrograms) -> Self {
        self.programs = programs;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The external program names.
    #[must_use]
    pub fn programs(&self) -> &ToolPrograms {
        &self.programs
    }

    /// Runs every stage of `job` once, in order.
    ///
    /// The first failing stage aborts the attempt; its error is returned
    /// unchanged.
    pub async fn run(&self, job: &JobSpec) -> Result<ControllerReport> {
        job.validate()?;
        let timer = SpanTimer::start("pipeline_attempt");
        let layout = job.layout();
        fs::create_dir_all(layout.frames_dir()).await?;

        tracing::info!(
            root = %layout.root().display(),
            start_over = job.start_over,
            only_training = job.only_training,
            "Starting pipeline attempt"
        );

        let mut state = PipelineState::NotStarted;
        let mut stages = Vec::with_capacity(Stage::ALL.len());
        let mut training_config = None;

        for stage in Stage::ALL {
            let decision = self.decide(job, &layout, stage);
            tracing::info!(stage = stage.as_str(), %decision, "Stage decision");
            self.sink.try_emit(PipelineEvent::decided(stage, decision));

            let duration_ms = match decision {
                StageDecision::Skip => {
                    self.sink
                        .try_emit(PipelineEvent::skipped(stage, "output already present"));
                    state.advance(stage);
                    None
                }
                StageDecision::Bypass => {
                    self.sink
                        .try_emit(PipelineEvent::skipped(stage, "not part of the training-only path"));
                    None
                }
                StageDecision::Run | StageDecision::ResetAndRun => {
                    let stage_timer = SpanTimer::start(stage.as_str());
                    match self.execute(job, &layout, stage, decision).await {
                        Ok(config) => {
                            if config.is_some() {
                                training_config = config;
                            }
                            let elapsed = stage_timer.finish();
                            self.sink.try_emit(PipelineEvent::completed(stage, elapsed));
                            state.advance(stage);
                            Some(elapsed)
                        }
                        Err(e) => {
                            state = PipelineState::Failed;
                            tracing::error!(stage = stage.as_str(), %state, error = %e, "Stage failed");
                            self.sink
                                .try_emit(PipelineEvent::failed(stage, state, &e.to_string()));
                            return Err(e);
                        }
                    }
                }
            };

            stages.push(StageRecord {
                stage,
                decision,
                duration_ms,
            });
        }

        let artifact = layout.export_file();
        if !artifact.is_file() {
            return Err(ArtifactDiscoveryError::missing_file(&artifact, "exported point cloud").into());
        }

        Ok(ControllerReport {
            state,
            stages,
            artifact,
            training_config,
            duration_ms: timer.finish(),
        })
    }

    fn decide(&self, job: &JobSpec, layout: &JobLayout, stage: Stage) -> StageDecision {
        if job.only_training && stage != Stage::NeuralTraining {
            return StageDecision::Bypass;
        }
        if job.start_over {
            return StageDecision::ResetAndRun;
        }
        StageDecision::decide(false, self.inspector.is_stage_complete(stage, layout))
    }

    async fn execute(
        &self,
        job: &JobSpec,
        layout: &JobLayout,
        stage: Stage,
        decision: StageDecision,
    ) -> Result<Option<PathBuf>> {
        if decision == StageDecision::ResetAndRun {
            self.sink.try_emit(PipelineEvent::reset(stage));
            self.purge(stage, layout, stage).await?;
        }
        for &downstream in stage.downstream() {
            self.purge(downstream, layout, stage).await?;
        }

        self.sink.try_emit(PipelineEvent::started(stage));
        let commands = ToolCommands::new(&self.programs, layout);

        match stage {
            Stage::FrameExtraction => {
                run_checked(
                    self.runner.as_ref(),
                    stage,
                    &commands.extract_frames(&job.video, job.frame_count),
                )
                .await?;
                self.ensure_complete(stage, layout, layout.frames_dir())?;
                Ok(None)
            }
            Stage::SceneReconstruction => {
                run_checked(self.runner.as_ref(), stage, &commands.reconstruct()).await?;
                self.ensure_complete(stage, layout, layout.sparse_model_dir())?;
                Ok(None)
            }
            Stage::NeuralTraining => self
                .train(job, layout, &commands, decision)
                .await
                .map(Some),
        }
    }

    async fn train(
        &self,
        job: &JobSpec,
        layout: &JobLayout,
        commands: &ToolCommands<'_>,
        decision: StageDecision,
    ) -> Result<PathBuf> {
        let stage = Stage::NeuralTraining;
        let options = job.training_options();

        if decision != StageDecision::ResetAndRun && self.inspector.is_training_data_prepared(layout) {
            tracing::info!("Training data already prepared, skipping data preparation");
        } else {
            let source = self.data_source(job, layout);
            run_checked(
                self.runner.as_ref(),
                stage,
                &commands.process_data(&source, options.num_downscales),
            )
            .await?;
            let calibration = layout.calibration_file();
            if !calibration.is_file() {
                return Err(ArtifactDiscoveryError::missing_file(&calibration, "calibration file").into());
            }
        }

        run_checked(self.runner.as_ref(), stage, &commands.train(&options)).await?;

        let config = discover_training_config(&layout.training_dir(), &options.model)?;
        run_checked(self.runner.as_ref(), stage, &commands.export(&config)).await?;

        let artifact = layout.export_file();
        if !artifact.is_file() {
            return Err(ArtifactDiscoveryError::missing_file(&artifact, "exported point cloud").into());
        }
        Ok(config)
    }

    fn data_source(&self, job: &JobSpec, layout: &JobLayout) -> DataSource {
        if !job.only_training {
            return DataSource::SparseModel(layout.frames_dir());
        }
        if self.inspector.is_stage_complete(Stage::FrameExtraction, layout) {
            DataSource::Images(layout.frames_dir())
        } else {
            DataSource::Video(job.video.clone())
        }
    }

    fn ensure_complete(&self, stage: Stage, layout: &JobLayout, dir: PathBuf) -> Result<()> {
        if self.inspector.is_stage_complete(stage, layout) {
            Ok(())
        } else {
            Err(ArtifactDiscoveryError::new(
                dir,
                format!("{stage} exited successfully but produced no valid output"),
            )
            .into())
        }
    }

    /// Deletes the artifacts of `target`, reporting deletions against `cause`.
    async fn purge(&self, target: Stage, layout: &JobLayout, cause: Stage) -> Result<()> {
        for purge in layout.artifacts(target).purge {
            for path in remove_target(&purge).await? {
                tracing::info!(
                    stage = cause.as_str(),
                    artifact_stage = target.as_str(),
                    path = %path.display(),
                    "Deleted stale artifact"
                );
                self.sink.try_emit(PipelineEvent::artifact_deleted(target, &path));
            }
        }
        Ok(())
    }
}

/// Removes a purge target, returning the paths actually deleted.
async fn remove_target(target: &PurgeTarget) -> Result<Vec<PathBuf>> {
    let paths = if target.keep_root {
        let mut entries = match fs::read_dir(&target.path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            paths.push(entry.path());
        }
        paths
    } else {
        vec![target.path.clone()]
    };

    let mut deleted = Vec::with_capacity(paths.len());
    for path in paths {
        let metadata = match fs::symlink_metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        if metadata.is_dir() {
            fs::remove_dir_all(&path).await?;
        } else {
            fs::remove_file(&path).await?;
        }
        deleted.push(path);
    }
    Ok(deleted)
}
