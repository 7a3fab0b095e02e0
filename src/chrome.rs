//! chromiumoxide-backed implementation of the browser seams
//!
//! Handles both connection modes: launching a local headless Chrome and
//! attaching to a remote browser over a secure websocket. Each session gets
//! its own browser context so cookies and storage never leak between scrapes.

use crate::browser::{
    BrowserConnection, BrowserLauncher, BrowsingContext, RequestLog, RequestRecord,
    ResourceCategory, ScrapePage,
};
use crate::scripts::{Capability, InjectedScript};
use crate::{
    create_browser_config, ConnectionMode, ContextOptions, DiagnosticSink, LogLevel, ScrapeError,
    ScraperConfig, Viewport,
};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, EventRequestWillBeSent, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, EventLifecycleEvent, NavigateParams, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::cdp::browser_protocol::target::{CreateBrowserContextParams, CreateTargetParams};
use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, EventConsoleApiCalled};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;

type HandlerTask = JoinHandle<Result<(), chromiumoxide::error::CdpError>>;

/// Launches or connects Chrome according to the connection mode.
pub struct ChromeLauncher {
    config: ScraperConfig,
    sink: Arc<dyn DiagnosticSink>,
}

impl ChromeLauncher {
    pub fn new(config: ScraperConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { config, sink }
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self, mode: &ConnectionMode) -> Result<Box<dyn BrowserConnection>, ScrapeError> {
        let (browser, mut handler) = match mode {
            ConnectionMode::Remote { ws_url } => {
                self.sink.log(LogLevel::Info, "Connecting to remote browser endpoint");
                Browser::connect(ws_url.clone())
                    .await
                    .map_err(|e| ScrapeError::Acquisition(e.to_string()))?
            }
            ConnectionMode::Local { args } => {
                self.sink.log(LogLevel::Info, "Launching local headless browser");
                let browser_config = create_browser_config(&self.config, args)?;
                Browser::launch(browser_config)
                    .await
                    .map_err(|e| ScrapeError::Acquisition(e.to_string()))?
            }
        };

        // The handler drives all CDP traffic and must be polled for the browser's lifetime
        let sink = self.sink.clone();
        let handler_task = tokio::spawn(async move {
            loop {
                match handler.next().await {
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        sink.log(LogLevel::Debug, &format!("Handler error: {}", e));
                        return Err(e);
                    }
                    None => {
                        sink.log(LogLevel::Debug, "Handler stream ended");
                        break;
                    }
                }
            }
            Ok(())
        });

        Ok(Box::new(ChromeConnection {
            browser: Arc::new(Mutex::new(browser)),
            handler: Some(handler_task),
            remote: mode.is_remote(),
            sink: self.sink.clone(),
        }))
    }
}

pub struct ChromeConnection {
    browser: Arc<Mutex<Browser>>,
    handler: Option<HandlerTask>,
    remote: bool,
    sink: Arc<dyn DiagnosticSink>,
}

#[async_trait]
impl BrowserConnection for ChromeConnection {
    async fn new_context(
        &mut self,
        options: &ContextOptions,
    ) -> Result<Box<dyn BrowsingContext>, ScrapeError> {
        let context_id = self
            .browser
            .lock()
            .await
            .create_browser_context(CreateBrowserContextParams::default())
            .await
            .map_err(|e| ScrapeError::Acquisition(format!("Failed to create browser context: {}", e)))?;

        Ok(Box::new(ChromeContext {
            browser: self.browser.clone(),
            context_id: Some(context_id),
            options: options.clone(),
            sink: self.sink.clone(),
        }))
    }

    async fn close(&mut self) -> Result<(), ScrapeError> {
        let Some(handler) = self.handler.take() else {
            return Ok(());
        };

        let result = {
            let mut browser = self.browser.lock().await;
            let closed = browser.close().await.map(|_| ());
            if !self.remote {
                // Reap the child process so no zombie Chrome outlives the session
                if let Err(e) = browser.wait().await {
                    log_reap_failure(self.sink.as_ref(), &e);
                }
            }
            closed
        };

        handler.abort();
        result.map_err(|e| ScrapeError::Cleanup(format!("browser: {}", e)))
    }
}

pub struct ChromeContext {
    browser: Arc<Mutex<Browser>>,
    context_id: Option<BrowserContextId>,
    options: ContextOptions,
    sink: Arc<dyn DiagnosticSink>,
}

#[async_trait]
impl BrowsingContext for ChromeContext {
    async fn new_page(&self) -> Result<Box<dyn ScrapePage>, ScrapeError> {
        let context_id = self.context_id.clone().ok_or(ScrapeError::ContextUnavailable)?;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id)
            .build()
            .map_err(ScrapeError::Page)?;

        let page = self.browser.lock().await.new_page(target).await?;

        page.execute(SetUserAgentOverrideParams::new(self.options.user_agent.clone()))
            .await?;
        apply_viewport(&page, &self.options.viewport).await?;

        Ok(Box::new(ChromePage::new(page, self.sink.clone()).await))
    }

    async fn close(&mut self) -> Result<(), ScrapeError> {
        let Some(context_id) = self.context_id.take() else {
            return Ok(());
        };

        self.browser
            .lock()
            .await
            .dispose_browser_context(context_id)
            .await
            .map_err(|e| ScrapeError::Cleanup(format!("context: {}", e)))
    }
}

fn log_reap_failure(sink: &dyn DiagnosticSink, err: &dyn std::fmt::Display) {
    sink.log(LogLevel::Warn, &format!("Failed to reap browser process: {}", err));
}

/// Matches the `networkIdle` lifecycle event of one document load in the
/// main frame. Events from subframes and earlier documents are ignored.
struct IdleWatch {
    frame_id: String,
    loader_id: String,
}

impl IdleWatch {
    fn new(frame_id: &str, loader_id: &str) -> Self {
        Self {
            frame_id: frame_id.to_string(),
            loader_id: loader_id.to_string(),
        }
    }

    fn observe(&self, frame_id: &str, loader_id: &str, name: &str) -> bool {
        name == "networkIdle" && frame_id == self.frame_id && loader_id == self.loader_id
    }
}

async fn apply_viewport(page: &Page, viewport: &Viewport) -> Result<(), ScrapeError> {
    let emulation_params = SetDeviceMetricsOverrideParams::builder()
        .width(viewport.width)
        .height(viewport.height)
        .device_scale_factor(1.0)
        .mobile(viewport.is_mobile())
        .build()
        .map_err(ScrapeError::Page)?;

    page.execute(emulation_params).await?;
    Ok(())
}

pub struct ChromePage {
    page: Page,
    listeners: std::sync::Mutex<Vec<JoinHandle<()>>>,
    sink: Arc<dyn DiagnosticSink>,
}

impl ChromePage {
    async fn new(page: Page, sink: Arc<dyn DiagnosticSink>) -> Self {
        let chrome_page = Self {
            page,
            listeners: std::sync::Mutex::new(Vec::new()),
            sink,
        };
        chrome_page.forward_console().await;
        chrome_page
    }

    fn track(&self, task: JoinHandle<()>) {
        match self.listeners.lock() {
            Ok(mut listeners) => listeners.push(task),
            Err(poisoned) => poisoned.into_inner().push(task),
        }
    }

    /// Relays page console output to the diagnostic sink.
    async fn forward_console(&self) {
        let mut events = match self.page.event_listener::<EventConsoleApiCalled>().await {
            Ok(events) => events,
            Err(e) => {
                self.sink.log(LogLevel::Debug, &format!("Console listener unavailable: {}", e));
                return;
            }
        };

        let sink = self.sink.clone();
        self.track(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let text = event
                    .args
                    .iter()
                    .filter_map(|arg| arg.value.as_ref())
                    .map(|value| match value {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                let source = event
                    .stack_trace
                    .as_ref()
                    .and_then(|trace| trace.call_frames.first())
                    .map(|frame| frame.url.clone())
                    .unwrap_or_default();
                sink.log(LogLevel::Info, &format!("SCRIPT LOG [{}]: {}", source, text));
            }
        }));
    }
}

#[async_trait]
impl ScrapePage for ChromePage {
    async fn observe_requests(&self, log: RequestLog) -> Result<(), ScrapeError> {
        self.page.execute(NetworkEnableParams::default()).await?;
        let mut events = self.page.event_listener::<EventRequestWillBeSent>().await?;

        self.track(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let category = event
                    .r#type
                    .as_ref()
                    .map(|kind| ResourceCategory::from_resource_type(&format!("{:?}", kind)))
                    .unwrap_or(ResourceCategory::Other);
                log.record(RequestRecord::new(
                    event.request.url.clone(),
                    category,
                    event.request.method.clone(),
                ));
            }
        }));

        Ok(())
    }

    async fn goto(&self, url: &str, limit: Duration) -> Result<(), ScrapeError> {
        self.page
            .execute(SetLifecycleEventsEnabledParams::new(true))
            .await?;
        let mut lifecycle = self.page.event_listener::<EventLifecycleEvent>().await?;

        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(ScrapeError::Navigation)?;

        let navigation = async {
            let navigated = self
                .page
                .execute(params)
                .await
                .map_err(|e| ScrapeError::Navigation(e.to_string()))?;
            if let Some(error_text) = &navigated.result.error_text {
                return Err(ScrapeError::Navigation(error_text.clone()));
            }
            // Same-document navigations load nothing new
            let Some(loader_id) = &navigated.result.loader_id else {
                return Ok(());
            };

            let watch = IdleWatch::new(navigated.result.frame_id.inner(), loader_id.inner());
            while let Some(event) = lifecycle.next().await {
                if watch.observe(event.frame_id.inner(), event.loader_id.inner(), &event.name) {
                    return Ok(());
                }
            }
            Err(ScrapeError::Navigation(
                "page closed before network went idle".to_string(),
            ))
        };

        match timeout(limit, navigation).await {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::NavigationTimeout(limit)),
        }
    }

    async fn inject_script(&self, script: &InjectedScript) -> Result<(), ScrapeError> {
        let params = EvaluateParams::builder()
            .expression(script.tagged_source())
            .build()
            .map_err(ScrapeError::Page)?;

        self.page.evaluate_expression(params).await?;
        Ok(())
    }

    async fn set_viewport(&self, viewport: &Viewport) -> Result<(), ScrapeError> {
        apply_viewport(&self.page, viewport).await
    }

    async fn screenshot_full_page(&self) -> Result<Vec<u8>, ScrapeError> {
        let screenshot_params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();

        Ok(self.page.screenshot(screenshot_params).await?)
    }

    async fn content(&self) -> Result<String, ScrapeError> {
        Ok(self.page.content().await?)
    }

    async fn invoke(&self, capability: Capability) -> Result<serde_json::Value, ScrapeError> {
        let params = EvaluateParams::builder()
            .expression(capability.call_expression())
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(ScrapeError::Page)?;

        let evaluation = self.page.evaluate_expression(params).await?;
        Ok(evaluation.into_value::<serde_json::Value>()?)
    }

    async fn close(&self) -> Result<(), ScrapeError> {
        let listeners = match self.listeners.lock() {
            Ok(mut listeners) => std::mem::take(&mut *listeners),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for listener in listeners {
            listener.abort();
        }

        self.page.clone().close().await?;
        Ok(())
    }
}
