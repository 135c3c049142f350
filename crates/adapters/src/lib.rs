//! Adapters - Infrastructure Implementations
//!
//! This crate contains the implementations of the ports defined in ibai-ports:
//! in-memory stores, the local process execution environment, and the unified
//! application configuration.

pub mod analysis;
pub mod artifact_store;
pub mod bus;
pub mod cache_store;
pub mod config;
pub mod environment;
pub mod publish_target;
pub mod repositories;
pub mod secret_store;

pub use crate::analysis::{PostedStatus, RecordingChangeRequestNotifier, StaticAnalysisStub};
pub use crate::artifact_store::InMemoryArtifactStore;
pub use crate::bus::InMemoryBus;
pub use crate::cache_store::LruCacheStore;
pub use crate::config::{
    AppConfig, CacheConfig, ConfigError, LoggingConfig, OrchestratorConfig, init_logging,
};
pub use crate::environment::{LocalProcessEnvironment, LocalProcessProvisioner};
pub use crate::publish_target::InMemoryPublishTarget;
pub use crate::repositories::{InMemoryRunRepository, InMemoryWorkflowRepository};
pub use crate::secret_store::{EnvSecretStore, StaticSecretStore};
