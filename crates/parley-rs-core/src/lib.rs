//! Conversation engine for Parley.
//!
//! This crate owns session settings, the model router, the command
//! dispatcher, and the assistant that ties them to a messaging platform.

pub mod assistant;
pub mod backends;
pub mod commands;
pub mod dedup;
pub mod dispatch;
pub mod error;
pub mod persistence;
pub mod router;
pub mod runtime;
pub mod sessions;

pub use assistant::{Assistant, AssistantBuilder, BroadcastReport, HandleOutcome};
pub use backends::OpenAiCompatibleBackend;
pub use dedup::DedupCache;
/// Command routing primitives.
pub use dispatch::{
    CommandContext, CommandDispatcher, CommandHandler, CommandInfo, CommandServices,
    DispatchOutcome, Reply,
};
pub use error::{AssistantError, CommandError};
pub use persistence::{FlushReason, FlushRequester, Persistence};
pub use router::ModelRouter;
pub use runtime::RuntimeState;
pub use sessions::{ModelDefaults, PromptChange, SessionRegistry, SessionSettings};
