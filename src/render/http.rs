//! Plain HTTP renderer
//!
//! Fetches the page document only; no scripts run and no subresources are
//! loaded, so the document response is the only transport response offered
//! to the asset cache. Images are then resolved by the fallback tier.

use crate::assets::AssetCache;
use crate::render::{
    is_blocked_media, RenderError, RenderRequest, RenderSettings, RenderedPage, Renderer,
    SessionCookie,
};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Renderer backed by `reqwest` with a persistent session cookie jar
pub struct HttpRenderer {
    client: Client,
    jar: Arc<Jar>,
    cache: Arc<AssetCache>,
}

impl HttpRenderer {
    /// Builds the renderer's HTTP session
    pub fn new(settings: &RenderSettings, cache: Arc<AssetCache>) -> Result<Self, RenderError> {
        let jar = Arc::new(Jar::default());

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,*/*;q=0.8"),
        );
        if let Ok(language) = HeaderValue::from_str(&settings.locale) {
            headers.insert(ACCEPT_LANGUAGE, language);
        }

        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .default_headers(headers)
            .cookie_provider(Arc::clone(&jar))
            .timeout(settings.page_load_timeout)
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| RenderError::Unavailable(e.to_string()))?;

        Ok(Self { client, jar, cache })
    }

    /// Cookies the jar would send to `url`, attributed to its host
    fn session_cookies(&self, url: &Url) -> Vec<SessionCookie> {
        let Some(host) = url.host_str() else {
            return Vec::new();
        };

        let Some(header) = self.jar.cookies(url) else {
            return Vec::new();
        };

        header
            .to_str()
            .unwrap_or("")
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .map(|(name, value)| SessionCookie::new(name, value, host))
            .collect()
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn render(&mut self, request: &RenderRequest) -> Result<RenderedPage, RenderError> {
        let url = request.url.as_str();
        if is_blocked_media(&request.url) {
            return Err(RenderError::Blocked {
                url: url.to_string(),
            });
        }

        let response = self
            .client
            .get(request.url.clone())
            .send()
            .await
            .map_err(|source| {
                if source.is_timeout() {
                    RenderError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    RenderError::Http {
                        url: url.to_string(),
                        source,
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|source| RenderError::Http {
            url: url.to_string(),
            source,
        })?;

        self.cache
            .observe(final_url.as_str(), content_type.as_deref(), &body);

        let markup = String::from_utf8_lossy(&body).into_owned();
        let cookies = self.session_cookies(&final_url);
        debug!(
            url = %final_url,
            bytes = body.len(),
            cookies = cookies.len(),
            "Rendered page over HTTP"
        );

        Ok(RenderedPage {
            final_url,
            markup,
            cookies,
        })
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}
