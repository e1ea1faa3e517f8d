use crate::dispatch::{CommandContext, CommandHandler, CommandInfo, Reply};
use crate::error::AssistantError;
use async_trait::async_trait;
use html_escape::encode_text;

/// `/ask <question>`: one chat turn, answered as text.
pub struct AskCommand;

#[async_trait]
impl CommandHandler for AskCommand {
    fn info(&self) -> CommandInfo {
        CommandInfo::new("/ask", "/ask <question>", "Ask the current model")
    }

    async fn execute(&self, _args: &[String], ctx: &CommandContext) -> Result<Reply, AssistantError> {
        if ctx.rest.is_empty() {
            return Err(AssistantError::Validation(
                "Usage: /ask <question>".to_string(),
            ));
        }
        let reply = ctx
            .services
            .router
            .chat(&ctx.rest, ctx.user_id(), ctx.group_id())
            .await?;
        Ok(Reply::Text(reply))
    }
}

/// `/imgask <question>`: one chat turn, answered as a rendered image.
pub struct ImageAskCommand;

#[async_trait]
impl CommandHandler for ImageAskCommand {
    fn info(&self) -> CommandInfo {
        CommandInfo::new(
            "/imgask",
            "/imgask <question>",
            "Ask the current model, answer as an image",
        )
    }

    async fn execute(&self, _args: &[String], ctx: &CommandContext) -> Result<Reply, AssistantError> {
        if ctx.rest.is_empty() {
            return Err(AssistantError::Validation(
                "Usage: /imgask <question>".to_string(),
            ));
        }
        let reply = ctx
            .services
            .router
            .chat(&ctx.rest, ctx.user_id(), ctx.group_id())
            .await?;
        let markup = format!(
            "<article class=\"answer\"><h3>{}</h3><pre>{}</pre></article>",
            encode_text(&ctx.rest),
            encode_text(&reply)
        );
        Ok(Reply::Markup {
            markup,
            fallback: reply,
        })
    }
}
