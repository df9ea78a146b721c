//! Authenticated fallback fetches for assets the renderer did not capture

use crate::assets::cache::{CachedAsset, CaptureTier};
use crate::assets::mime::{self, MIN_ASSET_BYTES};
use crate::render::{cookie_header, SessionCookie};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Outcome of resolving one asset through a single tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The asset was obtained and can be embedded
    Found(CachedAsset),
    /// The server answered, but not with a usable image
    NotFound,
    /// The request itself failed
    FetchFailed(String),
}

/// Errors fetching stylesheet text
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },
}

/// Fetches assets with the rendering session's cookies
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Fetches an image; HTML documents and tiny bodies are `NotFound`
    async fn fetch_asset(&self, url: &Url, cookies: &[SessionCookie]) -> Resolution;

    /// Fetches a text resource such as a stylesheet
    async fn fetch_text(&self, url: &Url, cookies: &[SessionCookie])
        -> Result<String, FetchError>;
}

/// [`AssetFetcher`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpAssetFetcher {
    client: Client,
}

impl HttpAssetFetcher {
    /// Builds a fetcher presenting the given user agent
    ///
    /// `timeout` bounds each request end to end.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }

    fn get(&self, url: &Url, cookies: &[SessionCookie]) -> reqwest::RequestBuilder {
        let request = self.client.get(url.clone());
        match cookie_header(url, cookies) {
            Some(header) => request.header(COOKIE, header),
            None => request,
        }
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch_asset(&self, url: &Url, cookies: &[SessionCookie]) -> Resolution {
        let response = match self
            .get(url, cookies)
            .header(ACCEPT, "image/webp,image/apng,image/*,*/*;q=0.8")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Resolution::FetchFailed(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            return Resolution::FetchFailed(format!("HTTP status {}", status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if content_type
            .as_deref()
            .map(mime::is_html_content_type)
            .unwrap_or(false)
        {
            return Resolution::NotFound;
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return Resolution::FetchFailed(e.to_string()),
        };

        if body.len() <= MIN_ASSET_BYTES {
            return Resolution::NotFound;
        }

        let mime = mime::resolve_mime(url.as_str(), content_type.as_deref());
        Resolution::Found(CachedAsset::new(mime, body.to_vec(), CaptureTier::Fallback))
    }

    async fn fetch_text(
        &self,
        url: &Url,
        cookies: &[SessionCookie],
    ) -> Result<String, FetchError> {
        let response = self
            .get(url, cookies)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })
    }
}
