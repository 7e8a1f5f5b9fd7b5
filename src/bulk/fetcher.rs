use super::ItemFetcher;
use crate::error::{Error, Result};
use crate::media::MediaItem;
use crate::utils::sanitize_filename;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::USER_AGENT;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

fn io_error(path: &Path, e: std::io::Error) -> Error {
    Error::Internal(format!("{}: {}", path.display(), e))
}

/// Saves items into a directory, either straight from the media host or
/// through a running download proxy.
pub struct HttpFetcher {
    client: reqwest::Client,
    output_dir: PathBuf,
    user_agent: String,
    proxy: Option<Url>,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, output_dir: PathBuf, user_agent: &str) -> Self {
        Self {
            client,
            output_dir,
            user_agent: user_agent.to_string(),
            proxy: None,
        }
    }

    pub fn with_proxy(mut self, proxy_base: &str) -> Result<Self> {
        let base = Url::parse(proxy_base)
            .map_err(|e| Error::invalid_input(format!("invalid proxy url {proxy_base}: {e}")))?;
        self.proxy = Some(base);
        Ok(self)
    }

    fn request_url(&self, item: &MediaItem, filename: &str) -> Result<Url> {
        match &self.proxy {
            Some(base) => {
                let mut url = base.clone();
                url.path_segments_mut()
                    .map_err(|_| Error::invalid_input(format!("proxy url cannot be a base: {base}")))?
                    .pop_if_empty()
                    .push("download");
                url.query_pairs_mut()
                    .append_pair("url", &item.url)
                    .append_pair("filename", filename);
                Ok(url)
            }
            None => Url::parse(&item.url)
                .map_err(|e| Error::invalid_input(format!("bad media url {}: {e}", item.url))),
        }
    }

    async fn save(&self, response: reqwest::Response, path: &Path) -> Result<u64> {
        let mut file = File::create(path).await.map_err(|e| io_error(path, e))?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::UpstreamFetch(format!("stream error: {e}")))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| io_error(path, e))?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| io_error(path, e))?;
        Ok(written)
    }
}

#[async_trait]
impl ItemFetcher for HttpFetcher {
    async fn fetch(&self, item: &MediaItem, filename: &str) -> Result<u64> {
        let url = self.request_url(item, filename)?;
        debug!("Fetching {} as {}", url, filename);

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpstreamStatus(status.as_u16()));
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| io_error(&self.output_dir, e))?;
        let path = self.output_dir.join(sanitize_filename(filename));

        match self.save(response, &path).await {
            Ok(written) => Ok(written),
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                Err(e)
            }
        }
    }
}
