use super::source::MetadataSource;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

/// A vxtwitter-compatible metadata mirror (`GET {base}/i/status/{id}`).
pub struct VxMirror {
    base_url: Url,
    client: reqwest::Client,
    user_agent: String,
}

impl VxMirror {
    pub fn new(base_url: &str, client: reqwest::Client, user_agent: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Internal(format!("invalid mirror url {base_url}: {e}")))?;

        Ok(Self {
            base_url,
            client,
            user_agent: user_agent.to_string(),
        })
    }

    pub fn status_url(&self, post_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Internal(format!("mirror url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["i", "status", post_id]);
        Ok(url)
    }
}

#[async_trait]
impl MetadataSource for VxMirror {
    fn name(&self) -> &str {
        self.base_url.host_str().unwrap_or("mirror")
    }

    async fn fetch_status(&self, post_id: &str) -> Result<Value> {
        let url = self.status_url(post_id)?;
        debug!("Fetching post metadata from {}", url);

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            info!("Mirror {} answered HTTP {} for {}", self.name(), status, post_id);
            return Err(Error::UpstreamStatus(status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| Error::UpstreamFetch(format!("invalid metadata document: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mirror(base: &str) -> VxMirror {
        VxMirror::new(base, reqwest::Client::new(), "Mozilla/5.0").unwrap()
    }

    #[test]
    fn test_status_url() {
        assert_eq!(
            mirror("https://api.vxtwitter.com").status_url("42").unwrap().as_str(),
            "https://api.vxtwitter.com/i/status/42"
        );
        assert_eq!(
            mirror("http://127.0.0.1:1234/prefix/").status_url("7").unwrap().as_str(),
            "http://127.0.0.1:1234/prefix/i/status/7"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(VxMirror::new("not a url", reqwest::Client::new(), "ua").is_err());
    }

    #[tokio::test]
    async fn test_fetch_status_sends_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/i/status/42")
            .match_header("user-agent", "Mozilla/5.0")
            .match_header("accept", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"tweetID":"42","media_extended":[]}"#)
            .create_async()
            .await;

        let body = mirror(&server.url()).fetch_status("42").await.unwrap();
        assert_eq!(body["tweetID"], "42");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_status_non_success() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/i/status/42")
            .with_status(404)
            .with_body("not found")
            .create_async()
            .await;

        let err = mirror(&server.url()).fetch_status("42").await.unwrap_err();
        assert!(matches!(err, Error::UpstreamStatus(404)));
    }

    #[tokio::test]
    async fn test_fetch_status_bad_json() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/i/status/42")
            .with_status(200)
            .with_body("<html>rate limited</html>")
            .create_async()
            .await;

        let err = mirror(&server.url()).fetch_status("42").await.unwrap_err();
        assert!(matches!(err, Error::UpstreamFetch(_)));
    }
}
