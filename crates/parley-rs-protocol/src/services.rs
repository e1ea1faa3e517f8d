//! Rendering and content collaborators.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors returned by the render service.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Rendering ran but produced no usable image.
    #[error("render failed: {0}")]
    Failed(String),
    /// The renderer could not be reached.
    #[error("renderer unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
/// Turns HTML or markdown markup into image bytes.
pub trait RenderService: Send + Sync {
    async fn render(&self, markup: &str) -> Result<Vec<u8>, RenderError>;
}

/// Errors returned by content providers.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The upstream source failed or timed out.
    #[error("content source failed: {0}")]
    Upstream(String),
    /// The input could not be handled (bad url, unsupported platform).
    #[error("unsupported input: {0}")]
    Unsupported(String),
}

/// Platforms with a trending board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendingPlatform {
    Zhihu,
    Weibo,
}

impl TrendingPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendingPlatform::Zhihu => "zhihu",
            TrendingPlatform::Weibo => "weibo",
        }
    }
}

impl fmt::Display for TrendingPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendingPlatform {
    type Err = ProviderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "zhihu" => Ok(TrendingPlatform::Zhihu),
            "weibo" => Ok(TrendingPlatform::Weibo),
            other => Err(ProviderError::Unsupported(format!(
                "unknown trending platform: {other}"
            ))),
        }
    }
}

/// One entry of a trending board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrendingItem {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// A linked news headline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Headline {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Daily news digest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Digest {
    /// Human-readable date line.
    pub date: String,
    pub headlines: Vec<Headline>,
    /// "On this day" events.
    #[serde(default)]
    pub on_this_day: Vec<String>,
}

#[async_trait]
/// Source of news, trending topics and video links.
pub trait ContentProvider: Send + Sync {
    async fn fetch_digest(&self) -> Result<Digest, ProviderError>;

    async fn fetch_trending(
        &self,
        platform: TrendingPlatform,
    ) -> Result<Vec<TrendingItem>, ProviderError>;

    /// Resolve a share link into a direct video url.
    async fn resolve_video_link(&self, url: &str) -> Result<String, ProviderError>;
}
