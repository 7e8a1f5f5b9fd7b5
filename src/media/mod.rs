mod classify;
mod normalize;
mod source;
mod types;
mod vxtwitter;

pub use classify::extract_post_id;
pub use normalize::normalize_media;
pub use source::MetadataSource;
pub use types::{FetchResult, MediaItem, MediaKind, ResolvedPost};
pub use vxtwitter::VxMirror;

use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use serde_json::Value;
use tracing::{info, warn};

pub struct MediaResolver {
    sources: Vec<Box<dyn MetadataSource>>,
}

impl MediaResolver {
    /// One source per configured mirror, in the configured order.
    pub fn from_config(config: &UpstreamConfig, client: reqwest::Client) -> Result<Self> {
        let sources = config
            .mirrors
            .iter()
            .map(|base| {
                VxMirror::new(base, client.clone(), &config.user_agent)
                    .map(|m| Box::new(m) as Box<dyn MetadataSource>)
            })
            .collect::<Result<Vec<_>>>()?;

        info!("Media resolver initialized with {} mirror(s)", sources.len());
        Ok(Self::new(sources))
    }

    pub fn new(sources: Vec<Box<dyn MetadataSource>>) -> Self {
        Self { sources }
    }

    /// Raw metadata document from the first mirror that answers.
    pub async fn fetch_raw(&self, post_id: &str) -> Result<Value> {
        let mut errors = Vec::new();
        let mut last_status = None;

        for source in &self.sources {
            match source.fetch_status(post_id).await {
                Ok(body) => {
                    info!("Fetched metadata for {} from {}", post_id, source.name());
                    return Ok(body);
                }
                Err(e) => {
                    warn!("{} failed: {}", source.name(), e);
                    if let Error::UpstreamStatus(status) = &e {
                        last_status = Some(*status);
                    }
                    errors.push(format!("{}: {e}", source.name()));
                }
            }
        }

        match (last_status, errors.len()) {
            (Some(status), 1) => Err(Error::UpstreamStatus(status)),
            (_, 0) => Err(Error::UpstreamFetch("no metadata mirrors configured".into())),
            _ => Err(Error::UpstreamFetch(errors.join(". "))),
        }
    }

    /// Canonical media list of a post. An empty list is a valid answer here.
    pub async fn resolve(&self, post_id: &str) -> Result<FetchResult> {
        let body = self.fetch_raw(post_id).await?;
        Ok(normalize_media(&body))
    }

    /// Classifies a pasted URL, resolves it and rejects posts without media.
    pub async fn resolve_post(&self, post_url: &str) -> Result<ResolvedPost> {
        let post_id = extract_post_id(post_url)?;
        let medias = self.resolve(&post_id).await?;

        if medias.is_empty() {
            return Err(Error::NoMediaFound(post_id));
        }

        info!("Resolved {} media item(s) for post {}", medias.len(), post_id);
        Ok(ResolvedPost { post_id, medias })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Canned metadata source that counts how often it was asked.
    struct FakeSource {
        name: &'static str,
        answer: std::result::Result<Value, u16>,
        calls: Arc<AtomicUsize>,
    }

    impl FakeSource {
        fn ok(name: &'static str, body: Value) -> Self {
            Self {
                name,
                answer: Ok(body),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing(name: &'static str, status: u16) -> Self {
            Self {
                name,
                answer: Err(status),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl MetadataSource for FakeSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch_status(&self, _post_id: &str) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone().map_err(Error::UpstreamStatus)
        }
    }

    fn photo_body() -> Value {
        json!({
            "media_extended": [{"type": "photo", "url": "https://media.example/abc?name=small"}]
        })
    }

    #[tokio::test]
    async fn test_resolve_post_example() {
        let resolver = MediaResolver::new(vec![Box::new(FakeSource::ok("a", photo_body()))]);
        let post = resolver
            .resolve_post("https://x.example.com/user/status/42")
            .await
            .unwrap();

        assert_eq!(post.post_id, "42");
        assert_eq!(
            post.medias,
            vec![MediaItem {
                url: "https://media.example/abc?name=orig".into(),
                kind: MediaKind::Photo,
                thumbnail: Some("https://media.example/abc?name=orig".into()),
            }]
        );
    }

    #[tokio::test]
    async fn test_invalid_url_makes_no_network_call() {
        let source = FakeSource::ok("a", photo_body());
        let calls = source.calls.clone();
        let resolver = MediaResolver::new(vec![Box::new(source)]);

        for input in ["", "https://x.com/user", "https://x.com/u/status/abc"] {
            let err = resolver.resolve_post(input).await.unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_media_is_no_media_found() {
        let resolver = MediaResolver::new(vec![Box::new(FakeSource::ok(
            "a",
            json!({"text": "no attachments", "media_extended": []}),
        ))]);

        assert!(resolver.resolve("42").await.unwrap().is_empty());
        let err = resolver
            .resolve_post("https://x.com/u/status/42")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoMediaFound(id) if id == "42"));
    }

    #[tokio::test]
    async fn test_falls_back_to_next_mirror() {
        let first = FakeSource::failing("down", 503);
        let second = FakeSource::ok("up", photo_body());
        let second_calls = second.calls.clone();
        let resolver = MediaResolver::new(vec![Box::new(first), Box::new(second)]);

        let items = resolver.resolve("42").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_mirrors_failing() {
        let single = MediaResolver::new(vec![Box::new(FakeSource::failing("a", 502))]);
        assert!(matches!(
            single.resolve("42").await.unwrap_err(),
            Error::UpstreamStatus(502)
        ));

        let many = MediaResolver::new(vec![
            Box::new(FakeSource::failing("a", 502)),
            Box::new(FakeSource::failing("b", 500)),
        ]);
        match many.resolve("42").await.unwrap_err() {
            Error::UpstreamFetch(reason) => {
                assert!(reason.contains("a: upstream returned HTTP 502"));
                assert!(reason.contains("b: upstream returned HTTP 500"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let none = MediaResolver::new(vec![]);
        assert!(none.resolve("42").await.unwrap_err().is_upstream());
    }

    #[tokio::test]
    async fn test_from_config_against_mock_mirror() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/i/status/42")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(photo_body().to_string())
            .create_async()
            .await;

        let config = UpstreamConfig {
            mirrors: vec![server.url()],
            ..UpstreamConfig::default()
        };
        let resolver = MediaResolver::from_config(&config, reqwest::Client::new()).unwrap();
        let post = resolver
            .resolve_post("https://x.com/user/status/42")
            .await
            .unwrap();

        assert_eq!(post.medias[0].url, "https://media.example/abc?name=orig");
        mock.assert_async().await;
    }
}
