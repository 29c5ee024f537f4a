//! A command runner that records invocations instead of spawning processes.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::fixtures::{write_sized_file, MODEL_FILE_NAMES};
use crate::errors::Result;
use crate::layout::{
    CALIBRATION_FILE, DERIVED_POINT_CLOUD, EXPORT_FILE, IMAGE_CACHE_DIRS, SPARSE_MODEL_DIR,
};
use crate::runner::{CommandRunner, CommandSpec, ExitReport};
use crate::tools::{ToolPrograms, TRAINING_CONFIG_FILE};

/// Side effect applied when a program "runs" successfully.
pub type ToolEffect = Arc<dyn Fn(&CommandSpec) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct FailurePlan {
    exit_code: i32,
    remaining: Option<u32>,
}

/// Records every command and answers with configurable exit codes.
///
/// Programs without a configured failure succeed. Effects registered for a
/// program run only on success, so a failing tool leaves no output behind.
pub struct RecordingRunner {
    invocations: Mutex<Vec<CommandSpec>>,
    failures: Mutex<HashMap<String, FailurePlan>>,
    effects: HashMap<String, ToolEffect>,
}

impl fmt::Debug for RecordingRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingRunner")
            .field("invocations", &self.invocations.lock().len())
            .field("failures", &*self.failures.lock())
            .field("effects", &self.effects.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for RecordingRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingRunner {
    /// Creates a runner where every program succeeds without side effects.
    #[must_use]
    pub fn new() -> Self {
        Self {
            invocations: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            effects: HashMap::new(),
        }
    }

    /// Creates a runner whose programs write the output the real tools
    /// would, at the paths given on their command lines.
    #[must_use]
    pub fn simulating(programs: &ToolPrograms) -> Self {
        let runs = Arc::new(AtomicUsize::new(0));

        Self::new()
            .with_effect(&programs.frame_extractor, |command| {
                if let Some(dir) = command.value_of("--output") {
                    for index in 1..=3 {
                        write_sized_file(&Path::new(dir).join(format!("frame_{index:05}.png")), 64);
                    }
                }
            })
            .with_effect(&programs.python, |command| {
                if let Some(root) = command.value_of("--output_dir") {
                    let model_dir = SPARSE_MODEL_DIR
                        .iter()
                        .fold(Path::new(root).to_path_buf(), |path, part| path.join(part));
                    for name in MODEL_FILE_NAMES {
                        write_sized_file(&model_dir.join(name), 4096);
                    }
                }
            })
            .with_effect(&programs.process_data, |command| {
                if let Some(root) = command.value_of("--output-dir") {
                    let root = Path::new(root);
                    write_sized_file(&root.join(CALIBRATION_FILE), 32);
                    write_sized_file(&root.join(DERIVED_POINT_CLOUD), 128);
                    for dir in IMAGE_CACHE_DIRS {
                        write_sized_file(&root.join(dir).join("frame_00001.png"), 32);
                    }
                }
            })
            .with_effect(&programs.train, move |command| {
                let run = runs.fetch_add(1, Ordering::SeqCst);
                if let (Some(models), Some(method)) =
                    (command.value_of("--output-dir"), command.args.first())
                {
                    let config = Path::new(models)
                        .join("unnamed")
                        .join(method)
                        .join(format!("2024-01-01_{run:06}"))
                        .join(TRAINING_CONFIG_FILE);
                    write_sized_file(&config, 16);
                }
            })
            .with_effect(&programs.export, |command| {
                if let Some(dir) = command.value_of("--output-dir") {
                    write_sized_file(&Path::new(dir).join(EXPORT_FILE), 512);
                }
            })
    }

    /// Convenience for [`RecordingRunner::simulating`] with default programs.
    #[must_use]
    pub fn simulating_defaults() -> Self {
        Self::simulating(&ToolPrograms::default())
    }

    /// Registers a side effect for `program`, replacing any previous one.
    #[must_use]
    pub fn with_effect<F>(mut self, program: &str, effect: F) -> Self
    where
        F: Fn(&CommandSpec) + Send + Sync + 'static,
    {
        self.effects.insert(program.to_string(), Arc::new(effect));
        self
    }

    /// Makes every run of `program` exit with `exit_code`.
    #[must_use]
    pub fn fail_program(self, program: &str, exit_code: i32) -> Self {
        self.set_failure(program, exit_code, None);
        self
    }

    /// Makes the next `times` runs of `program` exit with `exit_code`.
    #[must_use]
    pub fn fail_program_times(self, program: &str, exit_code: i32, times: u32) -> Self {
        self.set_failure(program, exit_code, Some(times));
        self
    }

    /// Changes the failure plan of `program` after construction.
    pub fn set_failure(&self, program: &str, exit_code: i32, times: Option<u32>) {
        self.failures.lock().insert(
            program.to_string(),
            FailurePlan {
                exit_code,
                remaining: times,
            },
        );
    }

    /// Removes any failure plan for `program`.
    pub fn clear_failure(&self, program: &str) {
        self.failures.lock().remove(program);
    }

    /// Returns all recorded invocations in order.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandSpec> {
        self.invocations.lock().clone()
    }

    /// Returns the programs invoked, in order.
    #[must_use]
    pub fn programs(&self) -> Vec<String> {
        self.invocations
            .lock()
            .iter()
            .map(|command| command.program.clone())
            .collect()
    }

    /// Returns the number of times `program` was invoked.
    #[must_use]
    pub fn calls_to(&self, program: &str) -> usize {
        self.invocations
            .lock()
            .iter()
            .filter(|command| command.program == program)
            .count()
    }

    /// Returns the most recent invocation of `program`.
    #[must_use]
    pub fn last_call(&self, program: &str) -> Option<CommandSpec> {
        self.invocations
            .lock()
            .iter()
            .rev()
            .find(|command| command.program == program)
            .cloned()
    }

    /// Forgets all recorded invocations.
    pub fn clear(&self) {
        self.invocations.lock().clear();
    }

    fn take_failure(&self, program: &str) -> Option<i32> {
        let mut failures = self.failures.lock();
        let plan = failures.get_mut(program)?;
        match plan.remaining.as_mut() {
            None => Some(plan.exit_code),
            Some(0) => None,
            Some(remaining) => {
                *remaining -= 1;
                Some(plan.exit_code)
            }
        }
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &CommandSpec) -> Result<ExitReport> {
        self.invocations.lock().push(command.clone());

        if let Some(exit_code) = self.take_failure(&command.program) {
            return Ok(ExitReport::failed(exit_code, 0.0));
        }
        if let Some(effect) = self.effects.get(&command.program) {
            effect(command);
        }
        Ok(ExitReport::ok(0.0))
    }
}
