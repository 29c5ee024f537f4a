//! Service configuration loaded from environment variables.
//!
//! Every field has a default suitable for a single-GPU host; deployments
//! override individual values via `SPLATFLOW_*` variables or a `.env` file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{Result, SplatflowError};
use crate::pipeline::{JobSpec, RetryPolicy};
use crate::tools::ToolPrograms;
use crate::utils::validate_model_variant;

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_lessons_root() -> PathBuf {
    PathBuf::from("/lessons")
}

fn default_true() -> bool {
    true
}

/// Pipeline settings applied to every job the service starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefaults {
    /// Frames to extract.
    pub frame_count: u32,
    /// Maximum training iterations.
    pub max_iterations: u32,
    /// Model variant.
    pub model: String,
    /// Advanced trainer flags.
    pub advanced_training: bool,
    /// MCMC densification.
    pub use_mcmc: bool,
    /// Downscaled image caches.
    pub num_downscales: u32,
}

impl Default for PipelineDefaults {
    fn default() -> Self {
        let job = JobSpec::new("", "");
        Self {
            frame_count: job.frame_count,
            max_iterations: job.max_iterations,
            model: job.model,
            advanced_training: job.advanced_training,
            use_mcmc: job.use_mcmc,
            num_downscales: job.num_downscales,
        }
    }
}

impl PipelineDefaults {
    /// Builds a job for `video` in `root` using these settings.
    #[must_use]
    pub fn job(&self, video: impl Into<PathBuf>, root: impl Into<PathBuf>) -> JobSpec {
        JobSpec::new(video, root)
            .with_frame_count(self.frame_count)
            .with_max_iterations(self.max_iterations)
            .with_model(self.model.clone())
            .with_advanced_training(self.advanced_training)
            .with_mcmc(self.use_mcmc)
            .with_num_downscales(self.num_downscales)
    }
}

/// Which object store the service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// S3-compatible HTTP endpoint.
    #[default]
    Http,
    /// Local directory.
    Local,
}

impl FromStr for StorageBackend {
    type Err = SplatflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" | "s3" | "minio" => Ok(Self::Http),
            "local" | "fs" => Ok(Self::Local),
            other => Err(SplatflowError::config(format!("unknown storage backend '{other}'"))),
        }
    }
}

/// Object storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend kind.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Endpoint URL of the HTTP backend.
    pub endpoint: String,
    /// Bucket name.
    pub bucket: String,
    /// Base URL returned to clients; empty means the bucket URL.
    #[serde(default)]
    pub public_base_url: String,
    /// Root directory of the local backend.
    pub local_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Http,
            endpoint: "http://localhost:9000".to_string(),
            bucket: "lessons".to_string(),
            public_base_url: String::new(),
            local_root: PathBuf::from("/var/lib/splatflow/objects"),
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins; `*` allows any.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    /// Directory under which per-lesson working directories are created.
    #[serde(default = "default_lessons_root")]
    pub lessons_root: PathBuf,
    /// External program names.
    #[serde(default)]
    pub programs: ToolPrograms,
    /// Pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineDefaults,
    /// Retry policy.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Object storage.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Delete a lesson's working directory after a successful upload.
    #[serde(default = "default_true")]
    pub cleanup_after_success: bool,
    /// Emit logs as JSON lines.
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            lessons_root: default_lessons_root(),
            programs: ToolPrograms::default(),
            pipeline: PipelineDefaults::default(),
            retry: RetryPolicy::default(),
            storage: StorageConfig::default(),
            cleanup_after_success: true,
            json_logs: false,
        }
    }
}

impl ServiceConfig {
    /// Loads configuration from the process environment, after reading a
    /// `.env` file if one exists.
    ///
    /// | Env Var                          | Default                  |
    /// |----------------------------------|--------------------------|
    /// | `SPLATFLOW_HOST`                 | `0.0.0.0`                |
    /// | `SPLATFLOW_PORT`                 | `8000`                   |
    /// | `SPLATFLOW_CORS_ORIGINS`         | `*`                      |
    /// | `SPLATFLOW_LESSONS_ROOT`         | `/lessons`               |
    /// | `SPLATFLOW_FRAME_COUNT`          | `400`                    |
    /// | `SPLATFLOW_MAX_ITERATIONS`       | `100000`                 |
    /// | `SPLATFLOW_MODEL`                | `splatfacto-big`         |
    /// | `SPLATFLOW_ADVANCED_TRAINING`    | `true`                   |
    /// | `SPLATFLOW_USE_MCMC`             | `true`                   |
    /// | `SPLATFLOW_NUM_DOWNSCALES`       | `2`                      |
    /// | `SPLATFLOW_RETRY_MAX_ATTEMPTS`   | `3`                      |
    /// | `SPLATFLOW_RETRY_COOLDOWN_SECS`  | `180`                    |
    /// | `SPLATFLOW_STORAGE_BACKEND`      | `http`                   |
    /// | `SPLATFLOW_STORAGE_ENDPOINT`     | `http://localhost:9000`  |
    /// | `SPLATFLOW_STORAGE_BUCKET`       | `lessons`                |
    /// | `SPLATFLOW_STORAGE_PUBLIC_URL`   | bucket URL               |
    /// | `SPLATFLOW_STORAGE_LOCAL_ROOT`   | `/var/lib/splatflow/objects` |
    /// | `SPLATFLOW_CLEANUP_AFTER_SUCCESS`| `true`                   |
    /// | `SPLATFLOW_LOG_JSON`             | `false`                  |
    /// | `SPLATFLOW_SFEXTRACT_BIN`        | `sfextract`              |
    /// | `SPLATFLOW_PYTHON_BIN`           | `python`                 |
    /// | `SPLATFLOW_MAST3R_SCRIPT`        | `mast3r_glomap_cli.py`   |
    /// | `SPLATFLOW_NS_PROCESS_DATA_BIN`  | `ns-process-data`        |
    /// | `SPLATFLOW_NS_TRAIN_BIN`         | `ns-train`               |
    /// | `SPLATFLOW_NS_EXPORT_BIN`        | `ns-export`              |
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let defaults = Self::default();

        let programs = ToolPrograms {
            frame_extractor: env.string("SPLATFLOW_SFEXTRACT_BIN", defaults.programs.frame_extractor),
            python: env.string("SPLATFLOW_PYTHON_BIN", defaults.programs.python),
            reconstruction_script: env.string("SPLATFLOW_MAST3R_SCRIPT", defaults.programs.reconstruction_script),
            reconstruction_model: env.string("SPLATFLOW_MAST3R_MODEL", defaults.programs.reconstruction_model),
            process_data: env.string("SPLATFLOW_NS_PROCESS_DATA_BIN", defaults.programs.process_data),
            train: env.string("SPLATFLOW_NS_TRAIN_BIN", defaults.programs.train),
            export: env.string("SPLATFLOW_NS_EXPORT_BIN", defaults.programs.export),
        };

        let pipeline = PipelineDefaults {
            frame_count: env.parse("SPLATFLOW_FRAME_COUNT", defaults.pipeline.frame_count)?,
            max_iterations: env.parse("SPLATFLOW_MAX_ITERATIONS", defaults.pipeline.max_iterations)?,
            model: env.string("SPLATFLOW_MODEL", defaults.pipeline.model),
            advanced_training: env.flag("SPLATFLOW_ADVANCED_TRAINING", defaults.pipeline.advanced_training)?,
            use_mcmc: env.flag("SPLATFLOW_USE_MCMC", defaults.pipeline.use_mcmc)?,
            num_downscales: env.parse("SPLATFLOW_NUM_DOWNSCALES", defaults.pipeline.num_downscales)?,
        };

        let cooldown_secs: u64 = env.parse(
            "SPLATFLOW_RETRY_COOLDOWN_SECS",
            defaults.retry.cooldown().as_secs(),
        )?;
        let retry = RetryPolicy::new(
            env.parse("SPLATFLOW_RETRY_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
            Duration::from_secs(cooldown_secs),
        );

        let storage = StorageConfig {
            backend: env.parse("SPLATFLOW_STORAGE_BACKEND", defaults.storage.backend)?,
            endpoint: env.string("SPLATFLOW_STORAGE_ENDPOINT", defaults.storage.endpoint),
            bucket: env.string("SPLATFLOW_STORAGE_BUCKET", defaults.storage.bucket),
            public_base_url: env.string("SPLATFLOW_STORAGE_PUBLIC_URL", defaults.storage.public_base_url),
            local_root: env
                .get("SPLATFLOW_STORAGE_LOCAL_ROOT")
                .map_or(defaults.storage.local_root, PathBuf::from),
        };

        let cors_origins = env
            .get("SPLATFLOW_CORS_ORIGINS")
            .map_or(defaults.cors_origins, |raw| {
                raw.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            });

        let config = Self {
            host: env.string("SPLATFLOW_HOST", defaults.host),
            port: env.parse("SPLATFLOW_PORT", defaults.port)?,
            cors_origins,
            lessons_root: env
                .get("SPLATFLOW_LESSONS_ROOT")
                .map_or(defaults.lessons_root, PathBuf::from),
            programs,
            pipeline,
            retry,
            storage,
            cleanup_after_success: env.flag("SPLATFLOW_CLEANUP_AFTER_SUCCESS", defaults.cleanup_after_success)?,
            json_logs: env.flag("SPLATFLOW_LOG_JSON", defaults.json_logs)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks values that would make every job fail.
    pub fn validate(&self) -> Result<()> {
        self.retry.validate()?;
        validate_model_variant(&self.pipeline.model)
            .map_err(|e| SplatflowError::config(e.to_string()))?;
        if self.pipeline.frame_count == 0 || self.pipeline.max_iterations == 0 {
            return Err(SplatflowError::config(
                "frame count and max iterations must be positive",
            ));
        }
        if self.lessons_root.as_os_str().is_empty() {
            return Err(SplatflowError::config("lessons root must not be empty"));
        }
        Ok(())
    }

    /// Working directory of a lesson: `<lessons_root>/<name>_<id>`.
    #[must_use]
    pub fn lesson_dir(&self, lesson_name: &str, lesson_id: &str) -> PathBuf {
        self.lessons_root.join(lesson_dir_name(lesson_name, lesson_id))
    }

    /// The lessons root.
    #[must_use]
    pub fn lessons_root(&self) -> &Path {
        &self.lessons_root
    }
}

/// Directory name of a lesson.
#[must_use]
pub fn lesson_dir_name(lesson_name: &str, lesson_id: &str) -> String {
    format!("{lesson_name}_{lesson_id}")
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    fn string(&self, key: &str, default: String) -> String {
        self.get(key).unwrap_or(default)
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| SplatflowError::config(format!("{key}: invalid value '{raw}': {e}"))),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key).map(|raw| raw.trim().to_ascii_lowercase()) {
            None => Ok(default),
            Some(raw) => match raw.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(SplatflowError::config(format!("{key}: expected a boolean, got '{raw}'"))),
            },
        }
    }
}
