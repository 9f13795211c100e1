use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::target::{
    BrowserContextId, CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use hyperion_core::error::{AppError, FetchFailure};
use hyperion_core::models::{Document, FetchRequest, StrategyKind};
use hyperion_core::traits::Fetcher;
use tokio::task::JoinHandle;

use crate::fetcher::DEFAULT_USER_AGENT;
use crate::strategy::FetcherOptions;

/// Hides the common automation fingerprints before any page script runs.
const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined, configurable: true });
window.chrome = window.chrome || { runtime: {} };
"#;

/// Headless-browser fetcher using Chromium via the Chrome DevTools Protocol.
///
/// One Chromium process is shared by all clones. Every fetch runs in its own
/// incognito browser context bound to the request's proxy, so concurrent
/// fetches never share cookies or routing. The context is disposed on every
/// exit path, including timeouts and a caller dropping the fetch.
#[derive(Clone)]
pub struct BrowserFetcher {
    browser: Arc<Browser>,
    handler: Arc<JoinHandle<()>>,
    user_agent: String,
}

impl BrowserFetcher {
    /// Launches headless Chromium.
    ///
    /// Fails with [`AppError::UnsupportedStrategy`] when no browser can be started.
    pub async fn launch(options: &FetcherOptions) -> Result<Self, AppError> {
        let mut builder = BrowserConfig::builder().no_sandbox().disable_default_args();

        if let Some(bin) = options
            .chrome_executable
            .clone()
            .or_else(Self::find_chrome_binary)
        {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .build()
            .map_err(|e| AppError::UnsupportedStrategy(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            AppError::UnsupportedStrategy(format!("Failed to launch browser: {e}"))
        })?;

        // The CDP handler must be polled continuously for the connection to work.
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        Ok(Self {
            browser: Arc::new(browser),
            handler: Arc::new(handle),
            user_agent: options
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }

    /// Tries to locate the real Chrome/Chromium binary.
    ///
    /// The snap wrapper at `/snap/bin/chromium` strips unknown CLI flags, so the
    /// binary inside the snap is preferred. `None` lets `chromiumoxide` search.
    fn find_chrome_binary() -> Option<PathBuf> {
        let candidates: &[&str] = &[
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
            "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ];

        if let Ok(p) = std::env::var("CHROME_BIN") {
            let path = PathBuf::from(&p);
            if path.exists() {
                return Some(path);
            }
        }

        candidates.iter().map(PathBuf::from).find(|p| p.exists())
    }

    async fn open_context(&self, proxy_url: String) -> Result<BrowserContextId, FetchFailure> {
        let mut params = CreateBrowserContextParams::default();
        params.proxy_server = Some(proxy_url);
        params.dispose_on_detach = Some(true);

        let response = self
            .browser
            .execute(params)
            .await
            .map_err(|e| FetchFailure::Navigation(format!("Failed to create context: {e}")))?;
        Ok(response.result.browser_context_id)
    }

    async fn render(&self, context: BrowserContextId, url: &str) -> Result<String, FetchFailure> {
        let mut target = CreateTargetParams::new("about:blank");
        target.browser_context_id = Some(context);

        let page = self
            .browser
            .new_page(target)
            .await
            .map_err(|e| FetchFailure::Navigation(format!("Failed to open tab: {e}")))?;

        let rendered = self.navigate(&page, url).await;
        let _ = page.close().await;
        rendered
    }

    async fn navigate(&self, page: &Page, url: &str) -> Result<String, FetchFailure> {
        page.set_user_agent(SetUserAgentOverrideParams::new(self.user_agent.clone()))
            .await
            .map_err(|e| FetchFailure::Navigation(format!("Failed to set user agent: {e}")))?;

        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
            .await
            .map_err(|e| FetchFailure::Navigation(format!("Failed to inject script: {e}")))?;

        page.goto(url)
            .await
            .map_err(|e| FetchFailure::Navigation(format!("Failed to navigate to {url}: {e}")))?;

        // <body> present is the minimal signal that the main content rendered.
        page.find_element("body")
            .await
            .map_err(|e| FetchFailure::Navigation(format!("Page did not render body: {e}")))?;

        // Re-apply on the loaded document; pages may have reset the globals.
        let _ = page.evaluate(STEALTH_SCRIPT).await;

        page.content()
            .await
            .map_err(|e| FetchFailure::Navigation(format!("Failed to read page content: {e}")))
    }

}

/// Releases a browser context by id.
trait DisposeContext {
    type Id: Clone + Send + 'static;

    fn dispose(&self, id: Self::Id) -> impl Future<Output = ()> + Send + 'static;
}

impl DisposeContext for Arc<Browser> {
    type Id = BrowserContextId;

    fn dispose(&self, id: BrowserContextId) -> impl Future<Output = ()> + Send + 'static {
        let browser = Arc::clone(self);
        async move {
            if let Err(e) = browser.execute(DisposeBrowserContextParams::new(id)).await {
                tracing::debug!("Failed to dispose browser context: {e}");
            }
        }
    }
}

/// Owns an open browser context until it is disposed.
///
/// Dropping the guard before [`ContextGuard::dispose`] finishes hands the
/// disposal to a background task.
struct ContextGuard<D: DisposeContext> {
    disposer: D,
    id: Option<D::Id>,
}

impl<D: DisposeContext> ContextGuard<D> {
    fn new(disposer: D, id: D::Id) -> Self {
        Self {
            disposer,
            id: Some(id),
        }
    }

    async fn dispose(mut self) {
        if let Some(id) = self.id.clone() {
            self.disposer.dispose(id).await;
            self.id = None;
        }
    }
}

impl<D: DisposeContext> Drop for ContextGuard<D> {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(self.disposer.dispose(id));
            }
            Err(_) => tracing::debug!("No runtime left to dispose browser context"),
        }
    }
}

impl Fetcher for BrowserFetcher {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Rendered
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Document, AppError> {
        let url = request.url();
        let work = async {
            let context = self.open_context(request.proxy().url()).await?;
            let guard = ContextGuard::new(Arc::clone(&self.browser), context.clone());
            let rendered = self.render(context, url).await;
            guard.dispose().await;
            rendered
        };

        match tokio::time::timeout(request.timeout(), work).await {
            Ok(Ok(html)) => Ok(Document::new(url, StrategyKind::Rendered, html)),
            Ok(Err(reason)) => Err(AppError::fetch_failed(url, reason)),
            Err(_) => Err(AppError::fetch_failed(url, FetchFailure::Timeout)),
        }
    }

    async fn close(self) {
        match Arc::try_unwrap(self.browser) {
            Ok(mut browser) => {
                if let Err(e) = browser.close().await {
                    tracing::debug!("Browser close failed: {e}");
                }
                let _ = browser.wait().await;
            }
            Err(_) => tracing::debug!("Browser still shared; leaving shutdown to drop"),
        }
        self.handler.abort();
    }
}
