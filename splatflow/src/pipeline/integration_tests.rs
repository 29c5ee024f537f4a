//! End-to-end scenarios for the controller and the retry supervisor.

#[cfg(test)]
mod tests {
    use crate::core::{PipelineState, Stage, StageDecision};
    use crate::errors::SplatflowError;
    use crate::events::CollectingEventSink;
    use crate::layout::JobLayout;
    use crate::pipeline::{JobSpec, PipelineController, RetryPolicy, RetrySupervisor};
    use crate::testing::{write_sized_file, JobFixture, RecordingRunner};
    use crate::tools::ADVANCED_TRAINING_FLAGS;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn job(fixture: &JobFixture) -> JobSpec {
        JobSpec::new(fixture.write_video(), fixture.root())
    }

    fn supervisor(runner: &Arc<RecordingRunner>, sink: &Arc<CollectingEventSink>) -> RetrySupervisor {
        let controller = PipelineController::new(runner.clone()).with_event_sink(sink.clone());
        RetrySupervisor::new(controller)
            .with_policy(RetryPolicy::new(3, Duration::from_secs(180)))
            .with_event_sink(sink.clone())
    }

    fn stale_training_paths(layout: &JobLayout) -> Vec<std::path::PathBuf> {
        let mut paths = vec![
            layout.sparse_model_dir(),
            layout.calibration_file(),
            layout.derived_point_cloud(),
            layout.training_dir(),
            layout.export_dir(),
        ];
        paths.extend(layout.image_cache_dirs());
        paths
    }

    #[tokio::test]
    async fn test_second_run_does_no_work() {
        let fixture = JobFixture::new();
        let runner = Arc::new(RecordingRunner::simulating_defaults());
        let controller = PipelineController::new(runner.clone());
        let job = job(&fixture);

        let first = controller.run(&job).await.unwrap();
        runner.clear();
        let second = controller.run(&job).await.unwrap();

        assert!(runner.invocations().is_empty());
        assert_eq!(second.artifact, first.artifact);
        assert_eq!(second.state, PipelineState::TrainingComplete);
        for stage in Stage::ALL {
            assert_eq!(second.decision(stage), Some(StageDecision::Skip));
        }
        assert_eq!(second.training_config, None);
    }

    #[tokio::test]
    async fn test_resume_skips_extracted_frames() {
        let fixture = JobFixture::new();
        fixture.write_frames(5);
        let runner = Arc::new(RecordingRunner::simulating_defaults());

        let report = PipelineController::new(runner.clone())
            .run(&job(&fixture))
            .await
            .unwrap();

        assert_eq!(report.decision(Stage::FrameExtraction), Some(StageDecision::Skip));
        assert_eq!(report.decision(Stage::SceneReconstruction), Some(StageDecision::Run));
        assert_eq!(runner.calls_to("sfextract"), 0);
        assert_eq!(runner.programs()[0], "python");
    }

    #[tokio::test]
    async fn test_start_over_deletes_stale_output_before_reconstruction() {
        let fixture = JobFixture::new();
        fixture.write_complete_job();
        let layout = fixture.layout().clone();
        let clean_before_reconstruction = Arc::new(AtomicBool::new(false));

        let observed = clean_before_reconstruction.clone();
        let runner = Arc::new(RecordingRunner::simulating_defaults().with_effect(
            "python",
            move |_command| {
                let clean = stale_training_paths(&layout).iter().all(|path| !path.exists());
                observed.store(clean, Ordering::SeqCst);
                for name in ["cameras.bin", "images.bin", "points3D.bin"] {
                    write_sized_file(&layout.sparse_model_dir().join(name), 2048);
                }
            },
        ));
        let sink = Arc::new(CollectingEventSink::new());

        let report = PipelineController::new(runner.clone())
            .with_event_sink(sink.clone())
            .run(&job(&fixture).with_start_over(true))
            .await
            .unwrap();

        assert!(clean_before_reconstruction.load(Ordering::SeqCst));
        for stage in Stage::ALL {
            assert_eq!(report.decision(stage), Some(StageDecision::ResetAndRun));
        }
        assert_eq!(
            runner.programs(),
            vec!["sfextract", "python", "ns-process-data", "ns-train", "ns-export"]
        );

        let deleted: Vec<String> = sink
            .events_of_type("artifact.deleted")
            .iter()
            .map(|event| event.data["path"].as_str().unwrap_or_default().to_string())
            .collect();
        let calibration = fixture.layout().calibration_file().display().to_string();
        assert!(deleted.contains(&calibration));
        assert_eq!(sink.events_of_type("stage.reset").len(), Stage::ALL.len());
    }

    #[tokio::test]
    async fn test_rerun_of_reconstruction_invalidates_training() {
        let fixture = JobFixture::new();
        fixture.write_frames(3);
        fixture.write_prepared_data();
        fixture.write_export();
        let layout = fixture.layout().clone();
        let clean = Arc::new(AtomicBool::new(false));

        let observed = clean.clone();
        let runner = Arc::new(RecordingRunner::simulating_defaults().with_effect(
            "python",
            move |_command| {
                observed.store(
                    stale_training_paths(&layout).iter().all(|path| !path.exists()),
                    Ordering::SeqCst,
                );
                for name in ["cameras.bin", "images.bin", "points3D.bin"] {
                    write_sized_file(&layout.sparse_model_dir().join(name), 2048);
                }
            },
        ));

        let report = PipelineController::new(runner.clone())
            .run(&job(&fixture))
            .await
            .unwrap();

        assert!(clean.load(Ordering::SeqCst));
        assert_eq!(report.decision(Stage::SceneReconstruction), Some(StageDecision::Run));
        // Calibration was purged, so data preparation runs again.
        assert_eq!(runner.calls_to("ns-process-data"), 1);
    }

    #[tokio::test]
    async fn test_partial_reconstruction_is_rerun() {
        let fixture = JobFixture::new();
        fixture.write_frames(3);
        fixture.write_model_file("cameras.bin", 2048);
        fixture.write_model_file("images.bin", 2048);
        let runner = Arc::new(RecordingRunner::simulating_defaults());

        let report = PipelineController::new(runner.clone())
            .run(&job(&fixture))
            .await
            .unwrap();

        assert_eq!(report.decision(Stage::SceneReconstruction), Some(StageDecision::Run));
        assert_eq!(runner.calls_to("python"), 1);
    }

    #[tokio::test]
    async fn test_truncated_model_file_is_rerun() {
        let fixture = JobFixture::new();
        fixture.write_frames(3);
        fixture.write_model_file("cameras.bin", 2048);
        fixture.write_model_file("images.bin", 2048);
        fixture.write_model_file("points3D.bin", 1000);
        let runner = Arc::new(RecordingRunner::simulating_defaults());

        let report = PipelineController::new(runner.clone())
            .run(&job(&fixture))
            .await
            .unwrap();

        assert_eq!(report.decision(Stage::SceneReconstruction), Some(StageDecision::Run));
        assert_eq!(runner.calls_to("python"), 1);
    }

    #[tokio::test]
    async fn test_prepared_data_is_reused() {
        let fixture = JobFixture::new();
        fixture.write_frames(3);
        fixture.write_valid_reconstruction();
        fixture.write_prepared_data();
        let runner = Arc::new(RecordingRunner::simulating_defaults());

        let report = PipelineController::new(runner.clone())
            .run(&job(&fixture))
            .await
            .unwrap();

        assert_eq!(report.decision(Stage::NeuralTraining), Some(StageDecision::Run));
        assert_eq!(runner.programs(), vec!["ns-train", "ns-export"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound_and_cooldowns() {
        let fixture = JobFixture::new();
        let runner = Arc::new(RecordingRunner::simulating_defaults().fail_program("ns-train", 1));
        let sink = Arc::new(CollectingEventSink::new());

        let started = tokio::time::Instant::now();
        let err = supervisor(&runner, &sink).execute(&job(&fixture)).await.unwrap_err();
        let elapsed = started.elapsed();

        match &err {
            SplatflowError::RetryExhausted { attempts, last } => {
                assert_eq!(*attempts, 3);
                assert!(matches!(
                    **last,
                    SplatflowError::StageExecution {
                        stage: Stage::NeuralTraining,
                        exit_code: Some(1),
                        ..
                    }
                ));
            }
            other => panic!("expected RetryExhausted, got {other:?}"),
        }

        assert_eq!(runner.calls_to("ns-train"), 3);
        assert_eq!(sink.count("pipeline.attempt_started"), 3);
        assert_eq!(sink.count("pipeline.retry_scheduled"), 2);
        assert_eq!(sink.count("pipeline.exhausted"), 1);
        assert!(elapsed >= Duration::from_secs(360));
        assert!(elapsed < Duration::from_secs(540));

        // Retries resume from what earlier attempts left behind.
        assert_eq!(runner.calls_to("sfextract"), 1);
        assert_eq!(runner.calls_to("python"), 1);
        assert_eq!(runner.calls_to("ns-process-data"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_one_failure() {
        let fixture = JobFixture::new();
        let runner =
            Arc::new(RecordingRunner::simulating_defaults().fail_program_times("ns-export", 1, 1));
        let sink = Arc::new(CollectingEventSink::new());

        let outcome = supervisor(&runner, &sink).execute(&job(&fixture)).await.unwrap();

        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.artifact(), &fixture.layout().export_file());
        assert_eq!(sink.count("pipeline.retry_scheduled"), 1);
        assert_eq!(sink.count("pipeline.completed"), 1);
        assert_eq!(runner.calls_to("ns-train"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_over_applies_to_first_attempt_only() {
        let fixture = JobFixture::new();
        fixture.write_complete_job();
        let runner =
            Arc::new(RecordingRunner::simulating_defaults().fail_program_times("ns-train", 1, 1));
        let sink = Arc::new(CollectingEventSink::new());

        let outcome = supervisor(&runner, &sink)
            .execute(&job(&fixture).with_start_over(true))
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 2);
        assert_eq!(runner.calls_to("sfextract"), 1);
        assert_eq!(runner.calls_to("python"), 1);
        assert_eq!(
            outcome.report.decision(Stage::FrameExtraction),
            Some(StageDecision::Skip)
        );
        assert_eq!(
            outcome.report.decision(Stage::NeuralTraining),
            Some(StageDecision::Run)
        );
    }

    #[tokio::test]
    async fn test_zero_attempts_is_config_error() {
        let fixture = JobFixture::new();
        let runner = Arc::new(RecordingRunner::simulating_defaults());
        let sink = Arc::new(CollectingEventSink::new());

        let err = supervisor(&runner, &sink)
            .with_policy(RetryPolicy::new(0, Duration::ZERO))
            .execute(&job(&fixture))
            .await
            .unwrap_err();

        assert!(matches!(err, SplatflowError::Config(_)));
        assert!(runner.invocations().is_empty());
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_end_to_end_arguments() {
        let fixture = JobFixture::new();
        let runner = Arc::new(RecordingRunner::simulating_defaults());
        let job = job(&fixture)
            .with_frame_count(400)
            .with_max_iterations(100_000)
            .with_model("splatfacto-big")
            .with_advanced_training(true);

        let report = PipelineController::new(runner.clone()).run(&job).await.unwrap();
        let layout = fixture.layout();

        let extract = runner.last_call("sfextract").unwrap();
        assert_eq!(extract.value_of("--frame-count"), Some("400"));

        let train = runner.last_call("ns-train").unwrap();
        let root = layout.root().display().to_string();
        let models = layout.training_dir().display().to_string();
        let mut expected = vec![
            "splatfacto-big".to_string(),
            "--data".to_string(),
            root,
            "--output-dir".to_string(),
            models,
            "--max-num-iterations".to_string(),
            "100000".to_string(),
            "--viewer.quit-on-train-completion".to_string(),
            "True".to_string(),
            "--pipeline.model.strategy".to_string(),
            "mcmc".to_string(),
        ];
        for (flag, value) in ADVANCED_TRAINING_FLAGS {
            expected.push(flag.to_string());
            expected.push(value.to_string());
        }
        assert_eq!(train.args, expected);

        let export = runner.last_call("ns-export").unwrap();
        let config = std::path::PathBuf::from(export.value_of("--load-config").unwrap());
        assert!(config.is_file());
        let relative = config.strip_prefix(layout.training_dir()).unwrap();
        assert_eq!(relative.components().count(), 4);
        assert_eq!(report.training_config, Some(config));
    }

    #[tokio::test]
    async fn test_only_training_uses_frames_as_images() {
        let fixture = JobFixture::new();
        fixture.write_frames(4);
        let runner = Arc::new(RecordingRunner::simulating_defaults());

        let report = PipelineController::new(runner.clone())
            .run(&job(&fixture).with_only_training(true))
            .await
            .unwrap();

        assert_eq!(report.decision(Stage::FrameExtraction), Some(StageDecision::Bypass));
        assert_eq!(report.decision(Stage::SceneReconstruction), Some(StageDecision::Bypass));
        assert_eq!(runner.programs(), vec!["ns-process-data", "ns-train", "ns-export"]);

        let prepare = runner.last_call("ns-process-data").unwrap();
        assert_eq!(prepare.args[0], "images");
        assert!(!prepare.has_arg("--skip-colmap"));
        assert!(!prepare.has_arg("--colmap-model-path"));
    }

    #[tokio::test]
    async fn test_only_training_falls_back_to_video() {
        let fixture = JobFixture::new();
        let runner = Arc::new(RecordingRunner::simulating_defaults());
        let job = job(&fixture).with_only_training(true);

        PipelineController::new(runner.clone()).run(&job).await.unwrap();

        let prepare = runner.last_call("ns-process-data").unwrap();
        assert_eq!(prepare.args[0], "video");
        assert_eq!(
            prepare.value_of("--data"),
            Some(job.video.display().to_string().as_str())
        );
    }

    #[tokio::test]
    async fn test_missing_training_tree_is_descriptive() {
        let fixture = JobFixture::new();
        let runner = Arc::new(RecordingRunner::simulating_defaults().with_effect("ns-train", |_| {}));
        let sink = Arc::new(CollectingEventSink::new());

        let err = supervisor(&runner, &sink)
            .with_policy(RetryPolicy::new(1, Duration::ZERO))
            .execute(&job(&fixture))
            .await
            .unwrap_err();

        let last = err.last_error();
        assert!(matches!(last, SplatflowError::ArtifactDiscovery(_)));
        assert!(last.to_string().contains("only 0 of 3"));
        assert_eq!(runner.calls_to("ns-export"), 0);
        assert_eq!(sink.count("stage.failed"), 1);
    }

    #[tokio::test]
    async fn test_export_ignores_leftover_run_of_other_model() {
        let fixture = JobFixture::new();
        fixture.write_frames(3);
        fixture.write_valid_reconstruction();
        fixture.write_prepared_data();
        let leftover = fixture
            .layout()
            .training_dir()
            .join("unnamed/splatfacto-big/2024-06-01_000000/config.yml");
        write_sized_file(&leftover, 16);
        let runner = Arc::new(RecordingRunner::simulating_defaults());

        let report = PipelineController::new(runner.clone())
            .run(&job(&fixture).with_model("splatfacto"))
            .await
            .unwrap();

        let expected = fixture
            .layout()
            .training_dir()
            .join("unnamed/splatfacto/2024-01-01_000000/config.yml");
        let export = runner.last_call("ns-export").unwrap();
        assert_eq!(
            export.value_of("--load-config"),
            Some(expected.display().to_string().as_str())
        );
        assert_eq!(report.training_config, Some(expected));
    }

    #[tokio::test]
    async fn test_failed_stage_stops_pipeline() {
        let fixture = JobFixture::new();
        let runner = Arc::new(RecordingRunner::simulating_defaults().fail_program("python", 137));
        let sink = Arc::new(CollectingEventSink::new());

        let err = PipelineController::new(runner.clone())
            .with_event_sink(sink.clone())
            .run(&job(&fixture))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SplatflowError::StageExecution {
                stage: Stage::SceneReconstruction,
                exit_code: Some(137),
                ..
            }
        ));
        assert_eq!(runner.programs(), vec!["sfextract", "python"]);

        let failed = sink.events_of_type("stage.failed");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].data["stage"], "scene_reconstruction");
        assert_eq!(failed[0].data["state"], "failed");
    }
}
