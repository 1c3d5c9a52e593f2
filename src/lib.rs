//! Storage E2E Harness
//!
//! End-to-end test harness for a Kubernetes-orchestrated storage platform
//! exposing block, file and object storage through a management API.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                     storage-e2e (CLI) / SuiteRunner                   │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │   BlockImageCreateSuite          SmokeSuite ──► StorageHarness        │
//! │            │                         │        (Kubernetes/StandAlone) │
//! │            └──────────┬──────────────┘                                │
//! │                       ▼                                               │
//! │                  TestClient (per platform)                            │
//! │   ┌──────────┬────────────┬──────────┬──────────┬──────────────────┐  │
//! │   │  Block   │ FileSystem │  Object  │   Pool   │    Transport     │  │
//! │   └────┬─────┴─────┬──────┴────┬─────┴────┬─────┴────────┬─────────┘  │
//! │        │   PodMounter          │          │              │            │
//! │        ▼           ▼           ▼          ▼              ▼            │
//! │   TrackingRestApi ─► RestApiClient   ClusterOperator   kubectl        │
//! │   (created-resource ledger)          (K8sHelper)       (exec)         │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  InstallHelper: install manifests, wait for pods, wait for the API    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`domain`]: Platform enum, value objects and port traits
//! - [`transport`]: Command execution on the host and inside pods
//! - [`cluster`]: Manifest application and cluster state polling
//! - [`clients`]: Management API client and per-platform operators
//! - [`installer`]: Install and uninstall the system under test
//! - [`suite`]: Suites, runner, assertions and cleanup
//! - [`config`]: Harness configuration
//! - [`error`]: Error types and handling

pub mod clients;
pub mod cluster;
pub mod config;
pub mod domain;
pub mod error;
pub mod installer;
pub mod suite;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use clients::{ConnectionContext, ResourceTracker, RestApiClient, TestClient};

pub use cluster::K8sHelper;

pub use config::{HarnessConfig, PollPolicy};

pub use domain::model::{
    BlockImage, CommandArgs, CommandResult, MountSpec, MountState, ObjectUser, Pool,
};
pub use domain::platform::PlatformType;
pub use domain::ports::{
    BlockOperator, ClusterOperator, FileSystemOperator, ObjectOperator, PoolOperator,
    RestApiOperator, TransportClient,
};

pub use error::{Error, Result};

pub use installer::InstallHelper;

pub use suite::{
    BlockImageCreateSuite, CleanupReport, SmokeSuite, Suite, SuiteReport, SuiteRunner,
};

pub use transport::K8sTransportClient;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
