use async_trait::async_trait;
use parking_lot::Mutex;
use parley_rs_protocol::{
    ContentProvider, Digest, Headline, ProviderError, RenderError, RenderService, TrendingItem,
    TrendingPlatform,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Renderer returning fixed bytes, or failing on every call.
#[derive(Debug, Clone)]
pub struct StubRender {
    image: Option<Vec<u8>>,
    markups: Arc<Mutex<Vec<String>>>,
}

impl StubRender {
    pub fn ok(image: Vec<u8>) -> Self {
        Self {
            image: Some(image),
            markups: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self {
            image: None,
            markups: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Markup passed to `render`, in call order.
    pub fn markups(&self) -> Vec<String> {
        self.markups.lock().clone()
    }
}

#[async_trait]
impl RenderService for StubRender {
    async fn render(&self, markup: &str) -> Result<Vec<u8>, RenderError> {
        self.markups.lock().push(markup.to_string());
        self.image
            .clone()
            .ok_or_else(|| RenderError::Unavailable("stub renderer offline".to_string()))
    }
}

/// Content provider serving canned data.
#[derive(Debug, Clone)]
pub struct StubContent {
    digest: Digest,
    trending: HashMap<TrendingPlatform, Vec<TrendingItem>>,
    failing: bool,
}

impl Default for StubContent {
    fn default() -> Self {
        Self {
            digest: Digest {
                date: "2026-03-01".to_string(),
                headlines: vec![
                    Headline {
                        title: "First headline".to_string(),
                        url: Some("https://news.example/1".to_string()),
                    },
                    Headline {
                        title: "Second headline".to_string(),
                        url: None,
                    },
                ],
                on_this_day: vec!["1872: a park opened".to_string()],
            },
            trending: HashMap::new(),
            failing: false,
        }
    }
}

impl StubContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_digest(mut self, digest: Digest) -> Self {
        self.digest = digest;
        self
    }

    pub fn with_trending<I, S>(mut self, platform: TrendingPlatform, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = titles
            .into_iter()
            .map(|title| TrendingItem {
                title: title.into(),
                url: None,
            })
            .collect();
        self.trending.insert(platform, items);
        self
    }

    /// Fail every call with an upstream error.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), ProviderError> {
        if self.failing {
            Err(ProviderError::Upstream("stub source down".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ContentProvider for StubContent {
    async fn fetch_digest(&self) -> Result<Digest, ProviderError> {
        self.check()?;
        Ok(self.digest.clone())
    }

    async fn fetch_trending(
        &self,
        platform: TrendingPlatform,
    ) -> Result<Vec<TrendingItem>, ProviderError> {
        self.check()?;
        Ok(self.trending.get(&platform).cloned().unwrap_or_default())
    }

    async fn resolve_video_link(&self, url: &str) -> Result<String, ProviderError> {
        self.check()?;
        Ok(format!("https://cdn.example/video?src={url}"))
    }
}
