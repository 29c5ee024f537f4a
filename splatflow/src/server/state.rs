use std::sync::Arc;

use crate::config::{ServiceConfig, StorageBackend, StorageConfig};
use crate::errors::Result;
use crate::events::LoggingEventSink;
use crate::pipeline::{PipelineController, RetrySupervisor};
use crate::runner::CommandRunner;
use crate::storage::{HttpObjectStore, LocalObjectStore, ObjectStore};
use crate::workspace::WorkspaceRegistry;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheap to clone; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Arc<ServiceConfig>,
    /// Runs jobs with retries.
    pub supervisor: Arc<RetrySupervisor>,
    /// Where videos come from and exports go.
    pub store: Arc<dyn ObjectStore>,
    /// Working directories currently in use.
    pub workspaces: WorkspaceRegistry,
}

impl AppState {
    /// Wires a supervisor around `runner` using the programs and retry policy
    /// from `config`.
    #[must_use]
    pub fn new(config: ServiceConfig, runner: Arc<dyn CommandRunner>, store: Arc<dyn ObjectStore>) -> Self {
        let sink = Arc::new(LoggingEventSink::info());
        let controller = PipelineController::new(runner)
            .with_programs(config.programs.clone())
            .with_event_sink(sink.clone());
        let supervisor = RetrySupervisor::new(controller)
            .with_policy(config.retry)
            .with_event_sink(sink);

        Self {
            config: Arc::new(config),
            supervisor: Arc::new(supervisor),
            store,
            workspaces: WorkspaceRegistry::new(),
        }
    }
}

/// Builds the object store selected by `config`.
///
/// # Errors
///
/// Returns [`crate::errors::SplatflowError::Storage`] if the HTTP client
/// cannot be created.
pub fn build_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.backend {
        StorageBackend::Http => Arc::new(HttpObjectStore::new(
            &config.endpoint,
            &config.bucket,
            &config.public_base_url,
        )?),
        StorageBackend::Local => {
            let public_base_url = if config.public_base_url.is_empty() {
                format!("file://{}", config.local_root.display())
            } else {
                config.public_base_url.clone()
            };
            Arc::new(LocalObjectStore::new(&config.local_root, public_base_url))
        }
    };
    tracing::info!(backend = ?config.backend, "Object store configured");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_store_defaults_to_file_url() {
        let config = StorageConfig {
            backend: StorageBackend::Local,
            local_root: "/srv/objects".into(),
            ..StorageConfig::default()
        };
        let store = build_store(&config).unwrap();
        assert_eq!(store.public_url("a/b.ply"), "file:///srv/objects/a/b.ply");
    }

    #[test]
    fn test_state_uses_configured_policy() {
        let mut config = ServiceConfig::default();
        config.retry = config.retry.with_max_attempts(5);
        let runner = Arc::new(crate::runner::ProcessRunner);
        let store = build_store(&StorageConfig::default()).unwrap();

        let state = AppState::new(config, runner, store);
        assert_eq!(state.supervisor.policy().max_attempts, 5);
        assert!(state.workspaces.is_empty());
    }
}
