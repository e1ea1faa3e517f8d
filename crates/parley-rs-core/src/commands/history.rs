use crate::dispatch::{CommandContext, CommandHandler, CommandInfo, Reply};
use crate::error::AssistantError;
use async_trait::async_trait;
use parley_rs_protocol::Role;

/// `/clear`: forget the caller's conversation.
pub struct ClearCommand;

#[async_trait]
impl CommandHandler for ClearCommand {
    fn info(&self) -> CommandInfo {
        CommandInfo::new("/clear", "/clear", "Clear your chat history")
    }

    async fn execute(&self, _args: &[String], ctx: &CommandContext) -> Result<Reply, AssistantError> {
        let dropped = ctx.services.sessions.clear_history(&ctx.key);
        Ok(Reply::Text(format!(
            "History cleared ({dropped} messages removed)."
        )))
    }
}

/// `/history`: show the caller's conversation.
pub struct HistoryCommand;

#[async_trait]
impl CommandHandler for HistoryCommand {
    fn info(&self) -> CommandInfo {
        CommandInfo::new("/history", "/history", "Show your chat history")
    }

    async fn execute(&self, _args: &[String], ctx: &CommandContext) -> Result<Reply, AssistantError> {
        let entries = ctx.services.history.get(&ctx.key);
        if entries.is_empty() {
            return Ok(Reply::text("No history yet."));
        }
        let speaker = |role: Role| match role {
            Role::User => ctx
                .sender_name
                .clone()
                .unwrap_or_else(|| "You".to_string()),
            Role::Assistant => ctx.services.bot_name.clone(),
        };
        let lines: Vec<String> = entries
            .iter()
            .map(|entry| format!("{}: {}", speaker(entry.role), entry.content))
            .collect();
        Ok(Reply::Text(lines.join("\n")))
    }
}
