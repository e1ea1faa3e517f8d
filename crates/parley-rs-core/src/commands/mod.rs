//! Built-in chat commands.

mod admin;
mod chat;
mod content;
mod history;
mod model;

pub use admin::{MenuCommand, PowerCommand};
pub use chat::{AskCommand, ImageAskCommand};
pub use content::{NewsCommand, TrendingCommand, VideoCommand, digest_markup, digest_text};
pub use history::{ClearCommand, HistoryCommand};
pub use model::{ModelCommand, PromptCommand, SwitchCommand};

use crate::dispatch::CommandDispatcher;
use crate::error::AssistantError;
use std::sync::Arc;

/// Token pattern for trending boards, e.g. `/weibo-trending`.
pub const TRENDING_PATTERN: &str = r"/(?P<platform>[A-Za-z]+)-trending";

/// Register every built-in command on `dispatcher`.
pub fn register_builtin(dispatcher: &mut CommandDispatcher) -> Result<(), AssistantError> {
    dispatcher.register(Arc::new(MenuCommand));
    dispatcher.register(Arc::new(ModelCommand));
    dispatcher.register(Arc::new(SwitchCommand));
    dispatcher.register(Arc::new(AskCommand));
    dispatcher.register(Arc::new(ImageAskCommand));
    dispatcher.register(Arc::new(ClearCommand));
    dispatcher.register(Arc::new(HistoryCommand));
    dispatcher.register(Arc::new(PromptCommand));
    dispatcher.register(Arc::new(PowerCommand::on()));
    dispatcher.register(Arc::new(PowerCommand::off()));
    dispatcher.register(Arc::new(NewsCommand));
    dispatcher.register(Arc::new(VideoCommand));
    dispatcher.register_pattern(TRENDING_PATTERN, Arc::new(TrendingCommand))?;
    Ok(())
}
