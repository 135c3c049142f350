//! Ports - Abstraction Layer
//!
//! This crate defines ports (traits) that represent the interfaces
//! needed by the application layer. These are implemented by adapters
//! in the infrastructure layer.

pub mod analysis;
pub mod artifact_store;
pub mod cache_store;
pub mod environment;
pub mod event_bus;
pub mod notifier;
pub mod publish_target;
pub mod repositories;
pub mod secret_store;

pub use crate::analysis::{AnalysisError, AnalysisService};
pub use crate::artifact_store::{ArtifactStore, ArtifactStoreError};
pub use crate::cache_store::{CacheStore, CacheStoreError};
pub use crate::environment::{
    CommandOutcome, EnvironmentError, EnvironmentProvisioner, ExecutionEnvironment,
};
pub use crate::event_bus::{
    EventBusError, EventPublisher, EventReceiver, EventSubscriber, SystemEvent,
};
pub use crate::notifier::{ChangeRequestNotifier, NotifyError};
pub use crate::publish_target::{LiveDeployment, PublishError, PublishTarget};
pub use crate::repositories::{RepositoryError, RunRepository, WorkflowRepository};
pub use crate::secret_store::{SecretStore, SecretStoreError, SecretValue};
