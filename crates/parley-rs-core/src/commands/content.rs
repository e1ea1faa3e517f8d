use crate::dispatch::{CommandContext, CommandHandler, CommandInfo, Reply};
use crate::error::AssistantError;
use async_trait::async_trait;
use html_escape::{encode_double_quoted_attribute, encode_text};
use parley_rs_protocol::{Digest, TrendingItem, TrendingPlatform};
use std::fmt::Write;

/// Entries shown from a trending board.
const TRENDING_LIMIT: usize = 20;

/// `/news`: today's digest.
pub struct NewsCommand;

#[async_trait]
impl CommandHandler for NewsCommand {
    fn info(&self) -> CommandInfo {
        CommandInfo::new("/news", "/news", "Today's news digest")
    }

    async fn execute(&self, _args: &[String], ctx: &CommandContext) -> Result<Reply, AssistantError> {
        let digest = ctx.services.content()?.fetch_digest().await?;
        Ok(Reply::Markup {
            markup: digest_markup(&digest),
            fallback: digest_text(&digest),
        })
    }
}

/// Render markup for a digest.
pub fn digest_markup(digest: &Digest) -> String {
    let mut html = format!(
        "<section class=\"digest\"><h1>Daily news</h1><p>{}</p><ol>",
        encode_text(&digest.date)
    );
    for headline in &digest.headlines {
        match &headline.url {
            Some(url) => {
                let _ = write!(
                    html,
                    "<li><a href=\"{}\">{}</a></li>",
                    encode_double_quoted_attribute(url),
                    encode_text(&headline.title)
                );
            }
            None => {
                let _ = write!(html, "<li>{}</li>", encode_text(&headline.title));
            }
        }
    }
    html.push_str("</ol>");
    if !digest.on_this_day.is_empty() {
        html.push_str("<h2>On this day</h2><ul>");
        for event in &digest.on_this_day {
            let _ = write!(html, "<li>{}</li>", encode_text(event));
        }
        html.push_str("</ul>");
    }
    html.push_str("</section>");
    html
}

/// Plain text form of a digest.
pub fn digest_text(digest: &Digest) -> String {
    let mut text = format!("Daily news, {}\n", digest.date);
    for (idx, headline) in digest.headlines.iter().enumerate() {
        let _ = writeln!(text, "{}. {}", idx + 1, headline.title);
    }
    if !digest.on_this_day.is_empty() {
        text.push_str("On this day:\n");
        for event in &digest.on_this_day {
            let _ = writeln!(text, "- {event}");
        }
    }
    text.trim_end().to_string()
}

/// `/<platform>-trending`: top entries of a trending board.
pub struct TrendingCommand;

#[async_trait]
impl CommandHandler for TrendingCommand {
    fn info(&self) -> CommandInfo {
        CommandInfo::new(
            "/<platform>-trending",
            "/zhihu-trending, /weibo-trending",
            "Trending topics",
        )
    }

    async fn execute(&self, _args: &[String], ctx: &CommandContext) -> Result<Reply, AssistantError> {
        let platform: TrendingPlatform = ctx
            .capture("platform")
            .unwrap_or_default()
            .parse()
            .map_err(|_| {
                AssistantError::Validation(
                    "Unsupported platform. Try /zhihu-trending or /weibo-trending.".to_string(),
                )
            })?;
        let items = ctx.services.content()?.fetch_trending(platform).await?;
        let items: Vec<TrendingItem> = items.into_iter().take(TRENDING_LIMIT).collect();
        if items.is_empty() {
            return Ok(Reply::Text(format!("No trending topics on {platform} right now.")));
        }

        let mut markup = format!(
            "<section class=\"trending\"><h1>{} trending</h1><ol>",
            encode_text(platform.as_str())
        );
        let mut fallback = format!("{platform} trending\n");
        for (idx, item) in items.iter().enumerate() {
            let _ = write!(markup, "<li>{}</li>", encode_text(&item.title));
            let _ = writeln!(fallback, "{}. {}", idx + 1, item.title);
        }
        markup.push_str("</ol></section>");
        Ok(Reply::Markup {
            markup,
            fallback: fallback.trim_end().to_string(),
        })
    }
}

/// `/video <url>`: resolve a share link to a direct video url.
pub struct VideoCommand;

#[async_trait]
impl CommandHandler for VideoCommand {
    fn info(&self) -> CommandInfo {
        CommandInfo::new("/video", "/video <share link>", "Resolve a short-video link")
    }

    async fn execute(&self, args: &[String], ctx: &CommandContext) -> Result<Reply, AssistantError> {
        let Some(url) = args.iter().find(|arg| arg.starts_with("http")) else {
            return Err(AssistantError::Validation(
                "Usage: /video <share link>".to_string(),
            ));
        };
        let resolved = ctx.services.content()?.resolve_video_link(url).await?;
        Ok(Reply::Text(resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_rs_protocol::Headline;

    #[test]
    fn digest_markup_escapes_titles_and_links() {
        let digest = Digest {
            date: "2026-03-01".to_string(),
            headlines: vec![Headline {
                title: "rates <up> & bonds".to_string(),
                url: Some("https://news.example/a?x=1&q=\"b\"".to_string()),
            }],
            on_this_day: vec!["1872: <park> opened".to_string()],
        };

        let markup = digest_markup(&digest);

        assert!(markup.contains(
            "<a href=\"https://news.example/a?x=1&amp;q=&quot;b&quot;\">rates &lt;up&gt; &amp; bonds</a>"
        ));
        assert!(markup.contains("<li>1872: &lt;park&gt; opened</li>"));
    }
}
