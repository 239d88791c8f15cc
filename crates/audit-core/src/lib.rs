//! Multi-service resource enumeration and finding-generation engine: the
//! [`cloud`] capability interface, the [`store`]'s thread-safe finding
//! collector, the [`services`] auditor implementations, and the
//! [`orchestrator`] that fans them out and assembles a [`audit_proto::Report`].

#![forbid(unsafe_code)]

pub mod cloud;
pub mod context;
pub mod orchestrator;
pub mod services;
pub mod store;

pub use cloud::{CloudClient, CloudError, FakeCloudClient};
pub use context::{CancelToken, RunContext};
pub use orchestrator::AuditOrchestrator;
pub use services::ServiceAuditor;
pub use store::FindingStore;
