//! Headless Chromium renderer
//!
//! Every image response the browser downloads is captured at the transport
//! layer through CDP network events, so images served only to the
//! authenticated session end up in the asset cache before the page's markup
//! is read back. The same events drive the network-idle wait after
//! navigation and after scrolling.

use crate::assets::{mime, AssetCache};
use crate::render::{
    RenderError, RenderRequest, RenderSettings, RenderedPage, Renderer, SessionCookie,
    BLOCKED_MEDIA_PATTERNS,
};
use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived,
    GetResponseBodyParams, SetBlockedUrLsParams, SetUserAgentOverrideParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Scrolls to the bottom in steps so lazy images start loading, then back
/// to the top. Resolves after `__LIMIT__` milliseconds at the latest.
const SCROLL_SCRIPT: &str = r#"
    () => new Promise(resolve => {
        let total = 0; const dist = 400;
        const t = setInterval(() => {
            window.scrollBy(0, dist); total += dist;
            if (total >= document.body.scrollHeight) {
                clearInterval(t); window.scrollTo(0, 0); resolve();
            }
        }, 80);
        setTimeout(() => { clearInterval(t); resolve(); }, __LIMIT__);
    })
"#;

/// Time without network events, and nothing in flight, for a page to count
/// as settled
const IDLE_QUIET: Duration = Duration::from_millis(500);

const IDLE_POLL: Duration = Duration::from_millis(100);

/// Extra time granted to the scroll script beyond its own limit
const SCROLL_GRACE: Duration = Duration::from_secs(2);

/// Network activity of the tab, shared with the capture listener
///
/// Each render starts a new page generation. Requests still in flight from
/// an earlier generation are forgotten, and a body that arrives after the
/// next page started is never written to the cache.
#[derive(Debug)]
struct NetworkActivity {
    state: Mutex<ActivityState>,
}

#[derive(Debug)]
struct ActivityState {
    generation: u64,
    in_flight: HashMap<String, u64>,
    last_event: Instant,
}

impl NetworkActivity {
    fn new() -> Self {
        Self {
            state: Mutex::new(ActivityState {
                generation: 0,
                in_flight: HashMap::new(),
                last_event: Instant::now(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ActivityState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Starts a new page generation and empties the capture cache
    ///
    /// Both happen under the activity lock, so a capture from the previous
    /// page cannot land in between.
    fn begin_page(&self, cache: &AssetCache) {
        let mut state = self.lock();
        state.generation += 1;
        state.in_flight.clear();
        state.last_event = Instant::now();
        cache.clear();
    }

    fn request_started(&self, request_id: String) {
        let mut state = self.lock();
        let generation = state.generation;
        state.in_flight.insert(request_id, generation);
        state.last_event = Instant::now();
    }

    /// Marks a request finished or failed
    ///
    /// Returns the generation it was sent in, or `None` for a request of an
    /// earlier page.
    fn request_ended(&self, request_id: &str) -> Option<u64> {
        let mut state = self.lock();
        state.last_event = Instant::now();
        state.in_flight.remove(request_id)
    }

    /// Runs `store` only while `generation` is still the current page
    fn store_if_current(&self, generation: u64, store: impl FnOnce()) -> bool {
        let state = self.lock();
        if state.generation != generation {
            return false;
        }
        store();
        true
    }

    fn is_idle(&self, quiet: Duration) -> bool {
        let state = self.lock();
        state.in_flight.is_empty() && state.last_event.elapsed() >= quiet
    }
}

/// Waits until the tab has been idle for `quiet`, at most `timeout`
///
/// Returns false when the timeout ran out first.
async fn wait_for_idle(activity: &NetworkActivity, quiet: Duration, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if activity.is_idle(quiet) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        tokio::time::sleep(IDLE_POLL.min(deadline - now)).await;
    }
}

/// Renderer driving a single long-lived Chromium tab
pub struct ChromiumRenderer {
    browser: Browser,
    page: Page,
    settings: RenderSettings,
    cache: Arc<AssetCache>,
    activity: Arc<NetworkActivity>,
    handler_task: JoinHandle<()>,
    capture_task: JoinHandle<()>,
}

fn browser_error(e: impl std::fmt::Display) -> RenderError {
    RenderError::Browser(e.to_string())
}

impl ChromiumRenderer {
    /// Launches Chromium and opens the tab used for every render
    pub async fn launch(
        settings: RenderSettings,
        cache: Arc<AssetCache>,
    ) -> Result<Self, RenderError> {
        info!("Launching headless Chromium");

        let config = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .window_size(1920, 1080)
            .request_timeout(settings.page_load_timeout)
            .build()
            .map_err(RenderError::Unavailable)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Unavailable(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(browser_error)?;

        let user_agent = SetUserAgentOverrideParams::builder()
            .user_agent(settings.user_agent.clone())
            .accept_language(settings.locale.clone())
            .build()
            .map_err(RenderError::Browser)?;
        page.execute(user_agent).await.map_err(browser_error)?;

        let blocked = BLOCKED_MEDIA_PATTERNS
            .iter()
            .map(|pattern| pattern.to_string())
            .collect::<Vec<_>>();
        page.execute(SetBlockedUrLsParams::new(blocked))
            .await
            .map_err(browser_error)?;

        let activity = Arc::new(NetworkActivity::new());
        let capture_task = tokio::spawn(capture_images(
            page.clone(),
            Arc::clone(&cache),
            Arc::clone(&activity),
        ));

        info!("Browser ready (image interception active)");

        Ok(Self {
            browser,
            page,
            settings,
            cache,
            activity,
            handler_task,
            capture_task,
        })
    }

    /// Waits for network idle, bounded by the settle timeout
    async fn settle(&self) {
        let timeout = self.settings.settle_timeout;
        if !wait_for_idle(&self.activity, IDLE_QUIET, timeout).await {
            debug!(timeout = ?timeout, "Settle timeout reached with requests in flight");
        }
    }

    async fn scroll_lazy_images(&self) {
        let limit = self.settings.scroll_timeout;
        let script = SCROLL_SCRIPT.replace("__LIMIT__", &limit.as_millis().to_string());

        match tokio::time::timeout(limit + SCROLL_GRACE, self.page.evaluate_function(script)).await
        {
            Ok(Ok(_)) => debug!("Lazy-load scroll finished"),
            Ok(Err(e)) => debug!(error = %e, "Lazy-load scroll failed"),
            Err(_) => debug!("Lazy-load scroll timed out"),
        }
    }

    async fn session_cookies(&self) -> Vec<SessionCookie> {
        match self.page.get_cookies().await {
            Ok(cookies) => cookies
                .into_iter()
                .map(|c| SessionCookie::new(c.name, c.value, c.domain))
                .collect(),
            Err(e) => {
                warn!(error = %e, "Failed to read browser cookies");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn render(&mut self, request: &RenderRequest) -> Result<RenderedPage, RenderError> {
        let url = request.url.as_str();
        self.activity.begin_page(&self.cache);

        match tokio::time::timeout(self.settings.page_load_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(browser_error(e)),
            Err(_) => {
                return Err(RenderError::Timeout {
                    url: url.to_string(),
                })
            }
        }

        self.settle().await;

        if request.scroll_lazy {
            self.scroll_lazy_images().await;
            self.settle().await;
        }

        let markup = self.page.content().await.map_err(browser_error)?;
        let final_url = self
            .page
            .url()
            .await
            .map_err(browser_error)?
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| request.url.clone());

        let cookies = self.session_cookies().await;

        Ok(RenderedPage {
            final_url,
            markup,
            cookies,
        })
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        self.capture_task.abort();
        let result = self.browser.close().await.map_err(browser_error);
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Browser process did not exit cleanly");
        }
        self.handler_task.abort();
        result.map(|_| ())
    }
}

/// Feeds image responses seen by the tab into the asset cache
///
/// Every request is reported to `activity`. An image response is remembered
/// when it is received and its body is read once loading has finished; it
/// is cached only if its page is still the one being rendered.
async fn capture_images(page: Page, cache: Arc<AssetCache>, activity: Arc<NetworkActivity>) {
    let listeners = async {
        Ok::<_, CdpError>((
            page.event_listener::<EventRequestWillBeSent>().await?,
            page.event_listener::<EventResponseReceived>().await?,
            page.event_listener::<EventLoadingFinished>().await?,
            page.event_listener::<EventLoadingFailed>().await?,
        ))
    };
    let (mut sent, mut responses, mut finished, mut failed) = match listeners.await {
        Ok(listeners) => listeners,
        Err(e) => {
            warn!(error = %e, "Response capture unavailable");
            return;
        }
    };

    let mut images: HashMap<String, (String, String)> = HashMap::new();

    loop {
        tokio::select! {
            Some(event) = sent.next() => {
                activity.request_started(event.request_id.inner().clone());
            }
            Some(event) = responses.next() => {
                let url = event.response.url.clone();
                let mime_type = event.response.mime_type.clone();
                if mime::is_image_mime(&mime_type) || mime::has_image_extension(&url) {
                    images.insert(event.request_id.inner().clone(), (url, mime_type));
                }
            }
            Some(event) = failed.next() => {
                let request_id = event.request_id.inner();
                activity.request_ended(request_id);
                images.remove(request_id);
            }
            Some(event) = finished.next() => {
                let request_id = event.request_id.inner();
                let generation = activity.request_ended(request_id);
                let Some((url, mime_type)) = images.remove(request_id) else {
                    continue;
                };
                let Some(generation) = generation else {
                    debug!(url = %url, "Dropping response of a previous page");
                    continue;
                };

                let params = GetResponseBodyParams::new(event.request_id.clone());
                match page.execute(params).await {
                    Ok(response) => {
                        let body = &response.result;
                        let bytes = if body.base64_encoded {
                            match base64::engine::general_purpose::STANDARD.decode(&body.body) {
                                Ok(bytes) => bytes,
                                Err(_) => continue,
                            }
                        } else {
                            body.body.clone().into_bytes()
                        };
                        let stored = activity.store_if_current(generation, || {
                            cache.observe(&url, Some(&mime_type), &bytes);
                        });
                        if !stored {
                            debug!(url = %url, "Dropping response of a previous page");
                        }
                    }
                    Err(e) => debug!(url = %url, error = %e, "Response body unavailable"),
                }
            }
            else => break,
        }
    }
}
