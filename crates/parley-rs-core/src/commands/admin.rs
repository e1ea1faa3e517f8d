use crate::dispatch::{CommandContext, CommandHandler, CommandInfo, Reply};
use crate::error::AssistantError;
use async_trait::async_trait;
use std::fmt::Write;

/// `/menu`: list commands and the bot's state.
pub struct MenuCommand;

#[async_trait]
impl CommandHandler for MenuCommand {
    fn info(&self) -> CommandInfo {
        CommandInfo::new("/menu", "/menu", "Show this menu")
    }

    async fn execute(&self, _args: &[String], ctx: &CommandContext) -> Result<Reply, AssistantError> {
        let services = &ctx.services;
        let settings = services.sessions.get_or_create(&ctx.key);
        let state = if services.runtime.is_enabled() { "on" } else { "off" };
        let mut text = format!(
            "{} ({state}, model: {})\n",
            services.bot_name, settings.current_model
        );
        for info in ctx.catalog.iter() {
            let owner = if info.master_only { " [owner]" } else { "" };
            let _ = writeln!(text, "{} - {}{owner}", info.usage, info.summary);
        }
        Ok(Reply::Text(text.trim_end().to_string()))
    }
}

/// `/on` and `/off`: owner-only power switch.
pub struct PowerCommand {
    enable: bool,
}

impl PowerCommand {
    pub fn on() -> Self {
        Self { enable: true }
    }

    pub fn off() -> Self {
        Self { enable: false }
    }
}

#[async_trait]
impl CommandHandler for PowerCommand {
    fn info(&self) -> CommandInfo {
        if self.enable {
            CommandInfo::new("/on", "/on", "Turn the bot on").master_only()
        } else {
            CommandInfo::new("/off", "/off", "Turn the bot off").master_only()
        }
    }

    async fn execute(&self, _args: &[String], ctx: &CommandContext) -> Result<Reply, AssistantError> {
        let action = if self.enable {
            "turn the bot on"
        } else {
            "turn the bot off"
        };
        ctx.require_master(action)?;
        let previous = ctx.services.runtime.set_enabled(self.enable);
        let text = match (previous, self.enable) {
            (true, true) => "Already on.",
            (false, false) => "Already off.",
            (_, true) => "Bot is on.",
            (_, false) => "Bot is off.",
        };
        Ok(Reply::text(text))
    }
}
