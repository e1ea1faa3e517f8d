use crate::dispatch::{CommandContext, CommandHandler, CommandInfo, Reply};
use crate::error::AssistantError;
use crate::sessions::PromptChange;
use async_trait::async_trait;
use std::fmt::Write;

/// `/model`: show status, or `/model <name> [prompt…]` to switch.
pub struct ModelCommand;

#[async_trait]
impl CommandHandler for ModelCommand {
    fn info(&self) -> CommandInfo {
        CommandInfo::new(
            "/model",
            "/model [name [prompt…]]",
            "Show models, or switch and optionally set a prompt",
        )
    }

    async fn execute(&self, args: &[String], ctx: &CommandContext) -> Result<Reply, AssistantError> {
        let sessions = &ctx.services.sessions;
        let Some(model) = args.first() else {
            return Ok(Reply::Text(model_status(ctx)));
        };
        sessions.set_model(&ctx.key, model)?;
        let mut text = format!("Switched to {model}.");
        let prompt = ctx.rest[model.len()..].trim();
        if !prompt.is_empty() {
            match sessions.set_system_prompt(&ctx.key, prompt) {
                PromptChange::Replaced => text.push_str(" Prompt updated, history cleared."),
                PromptChange::Unchanged => text.push_str(" Prompt unchanged."),
            }
        }
        Ok(Reply::Text(text))
    }
}

fn model_status(ctx: &CommandContext) -> String {
    let sessions = &ctx.services.sessions;
    let settings = sessions.get_or_create(&ctx.key);
    let mut text = String::from("Models:\n");
    for name in sessions.defaults().model_names() {
        let marker = if name == settings.current_model { '*' } else { ' ' };
        let _ = writeln!(text, "{marker} {name}");
    }
    let prompt = sessions.system_prompt(&ctx.key).unwrap_or_default();
    let _ = write!(
        text,
        "Prompt: {}",
        if prompt.is_empty() { "(none)" } else { prompt.as_str() }
    );
    text
}

/// `/switch <name>`: change the active model.
pub struct SwitchCommand;

#[async_trait]
impl CommandHandler for SwitchCommand {
    fn info(&self) -> CommandInfo {
        CommandInfo::new("/switch", "/switch <name>", "Switch the current model")
    }

    async fn execute(&self, args: &[String], ctx: &CommandContext) -> Result<Reply, AssistantError> {
        let Some(model) = args.first() else {
            let names = ctx.services.sessions.defaults().model_names().join(", ");
            return Err(AssistantError::Validation(format!(
                "Usage: /switch <name>. Available: {names}"
            )));
        };
        ctx.services.sessions.set_model(&ctx.key, model)?;
        Ok(Reply::Text(format!("Switched to {model}.")))
    }
}

/// `/prompt <text>`: set the system prompt for the current model.
pub struct PromptCommand;

#[async_trait]
impl CommandHandler for PromptCommand {
    fn info(&self) -> CommandInfo {
        CommandInfo::new(
            "/prompt",
            "/prompt <text>",
            "Set the system prompt (clears history)",
        )
    }

    async fn execute(&self, _args: &[String], ctx: &CommandContext) -> Result<Reply, AssistantError> {
        if ctx.rest.is_empty() {
            return Err(AssistantError::Validation(
                "Usage: /prompt <text>".to_string(),
            ));
        }
        let text = match ctx.services.sessions.set_system_prompt(&ctx.key, &ctx.rest) {
            PromptChange::Unchanged => "Prompt unchanged.",
            PromptChange::Replaced => "Prompt updated, history cleared.",
        };
        Ok(Reply::text(text))
    }
}
