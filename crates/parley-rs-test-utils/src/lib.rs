//! Test helpers shared across Parley crates.

pub mod backend;
pub mod gateway;
pub mod services;

pub use backend::{FailingBackend, FixedBackend, RecordingBackend};
pub use gateway::RecordingGateway;
pub use services::{StubContent, StubRender};
