#[cfg(test)]
mod integration_tests {
    use crate::normalize::{normalize_css, DEFAULT_PALETTE};
    use crate::{
        BatchScraper, BrowserConnection, BrowserLauncher, BrowsingContext, Capability,
        ConnectionMode, ContextOptions, InjectedScript, LogLevel, MemorySink, ProgressTracker,
        RequestLog, RequestRecord, ResourceCategory, RetryConfig, ScrapeError, ScrapePage,
        Scraper, ScraperConfig, ScriptBundle, Viewport,
    };
    use async_trait::async_trait;
    use base64::{engine::general_purpose, Engine as _};
    use serde_json::{json, Value};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    const SAMPLE_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Acme Studio</title>
  <style>.hero { color: red; }</style>
  <script src="https://www.googletagmanager.com/gtm.js"></script>
</head>
<body>
  <!-- build 42 -->
  <header class="site-header"><nav>Home</nav></header>
  <div id="analytics-beacon"></div>
  <main><h1>Acme Studio</h1><script>window.x = 1;</script></main>
</body>
</html>"#;

    /// What the fake page does when driven.
    #[derive(Clone, Default)]
    struct PagePlan {
        html: String,
        payloads: Vec<(Capability, Result<Value, String>)>,
        requests: Vec<RequestRecord>,
        navigation_error: Option<ScrapeError>,
        screenshot_failure_at: Option<usize>,
        fail_context_close: bool,
    }

    #[derive(Default)]
    struct Counters {
        launch_calls: AtomicUsize,
        browsers_opened: AtomicUsize,
        browsers_closed: AtomicUsize,
        contexts_opened: AtomicUsize,
        contexts_closed: AtomicUsize,
        pages_opened: AtomicUsize,
        pages_closed: AtomicUsize,
        scripts_injected: AtomicUsize,
    }

    impl Counters {
        fn get(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    struct FakeLauncher {
        plan: PagePlan,
        counters: Arc<Counters>,
        failing_launches: AtomicUsize,
    }

    impl FakeLauncher {
        fn new(plan: PagePlan) -> Self {
            Self {
                plan,
                counters: Arc::new(Counters::default()),
                failing_launches: AtomicUsize::new(0),
            }
        }

        fn failing_first(self, launches: usize) -> Self {
            self.failing_launches.store(launches, Ordering::SeqCst);
            self
        }
    }

    #[async_trait]
    impl BrowserLauncher for FakeLauncher {
        async fn launch(&self, _mode: &ConnectionMode) -> Result<Box<dyn BrowserConnection>, ScrapeError> {
            self.counters.launch_calls.fetch_add(1, Ordering::SeqCst);

            let remaining = self.failing_launches.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failing_launches.store(remaining - 1, Ordering::SeqCst);
                return Err(ScrapeError::Acquisition(format!(
                    "connection refused ({} left)",
                    remaining - 1
                )));
            }

            self.counters.browsers_opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeBrowser {
                plan: self.plan.clone(),
                counters: self.counters.clone(),
            }))
        }
    }

    struct FakeBrowser {
        plan: PagePlan,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl BrowserConnection for FakeBrowser {
        async fn new_context(&mut self, options: &ContextOptions) -> Result<Box<dyn BrowsingContext>, ScrapeError> {
            assert_eq!(options.viewport, Viewport::new(1920, 1080));
            self.counters.contexts_opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeContext {
                plan: self.plan.clone(),
                counters: self.counters.clone(),
            }))
        }

        async fn close(&mut self) -> Result<(), ScrapeError> {
            self.counters.browsers_closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeContext {
        plan: PagePlan,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl BrowsingContext for FakeContext {
        async fn new_page(&self) -> Result<Box<dyn ScrapePage>, ScrapeError> {
            self.counters.pages_opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakePage {
                plan: self.plan.clone(),
                counters: self.counters.clone(),
                observer: Mutex::new(None),
                shots: AtomicUsize::new(0),
            }))
        }

        async fn close(&mut self) -> Result<(), ScrapeError> {
            self.counters.contexts_closed.fetch_add(1, Ordering::SeqCst);
            if self.plan.fail_context_close {
                return Err(ScrapeError::Cleanup("target closed".to_string()));
            }
            Ok(())
        }
    }

    struct FakePage {
        plan: PagePlan,
        counters: Arc<Counters>,
        observer: Mutex<Option<RequestLog>>,
        shots: AtomicUsize,
    }

    #[async_trait]
    impl ScrapePage for FakePage {
        async fn observe_requests(&self, log: RequestLog) -> Result<(), ScrapeError> {
            *self.observer.lock().unwrap() = Some(log);
            Ok(())
        }

        async fn goto(&self, _url: &str, _timeout: Duration) -> Result<(), ScrapeError> {
            if let Some(error) = &self.plan.navigation_error {
                return Err(error.clone());
            }
            if let Some(log) = self.observer.lock().unwrap().as_ref() {
                for request in &self.plan.requests {
                    log.record(request.clone());
                }
            }
            Ok(())
        }

        async fn inject_script(&self, _script: &InjectedScript) -> Result<(), ScrapeError> {
            self.counters.scripts_injected.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn set_viewport(&self, _viewport: &Viewport) -> Result<(), ScrapeError> {
            Ok(())
        }

        async fn screenshot_full_page(&self) -> Result<Vec<u8>, ScrapeError> {
            let shot = self.shots.fetch_add(1, Ordering::SeqCst);
            if self.plan.screenshot_failure_at == Some(shot) {
                return Err(ScrapeError::Page("capture failed".to_string()));
            }
            Ok(PNG_MAGIC.to_vec())
        }

        async fn content(&self) -> Result<String, ScrapeError> {
            Ok(self.plan.html.clone())
        }

        async fn invoke(&self, capability: Capability) -> Result<Value, ScrapeError> {
            match self.plan.payloads.iter().find(|(c, _)| *c == capability) {
                Some((_, Ok(value))) => Ok(value.clone()),
                Some((_, Err(message))) => Err(ScrapeError::Page(message.clone())),
                None => Err(ScrapeError::Page(format!(
                    "ReferenceError: {} is not defined",
                    capability
                ))),
            }
        }

        async fn close(&self) -> Result<(), ScrapeError> {
            self.counters.pages_closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn sample_css() -> Value {
        json!({
            "body_styles": {
                "color": "rgb(51, 51, 51)",
                "font-family": "\"Inter\", sans-serif",
                "margin": "0px",
                "float": "none"
            },
            "header_styles": { "background-color": "rgb(255, 255, 255)" },
            "main_content_styles": {},
            "common_patterns": [
                { "selector": ".card", "styles": { "padding": "16px" }, "count": 4 },
                { "selector": ".ghost", "styles": { "display": "none" } }
            ],
            "responsive_breakpoints": ["(max-width: 768px)"],
            "animations": []
        })
    }

    fn sample_plan() -> PagePlan {
        PagePlan {
            html: SAMPLE_HTML.to_string(),
            payloads: vec![
                (Capability::CssInfo, Ok(sample_css())),
                (
                    Capability::ColorPalette,
                    Ok(json!(["#ffffff", "#333333", "#ffffff", "#0055ff"])),
                ),
                (
                    Capability::Typography,
                    Ok(json!({
                        "fonts": ["Inter"],
                        "headings": { "h1": { "font-size": "48px" } },
                        "body_text": { "font-size": "16px" }
                    })),
                ),
                (
                    Capability::LayoutInfo,
                    Ok(json!({ "structure": [{ "tag": "header" }], "grid_info": {} })),
                ),
                (
                    Capability::Assets,
                    Ok(json!({
                        "images": ["https://acme.test/logo.png", "https://acme.test/logo.png"],
                        "stylesheets": ["https://acme.test/main.css"],
                        "videos": ["https://acme.test/intro.mp4"]
                    })),
                ),
                (
                    Capability::Metadata,
                    Ok(json!({ "title": "Acme Studio", "description": "Design agency" })),
                ),
            ],
            requests: vec![
                RequestRecord::new("https://acme.test/logo.png", ResourceCategory::Image, "GET"),
                RequestRecord::new("https://acme.test/hero.jpg", ResourceCategory::Image, "GET"),
                RequestRecord::new("https://acme.test/main.css", ResourceCategory::Stylesheet, "GET"),
                RequestRecord::new("https://acme.test/inter.woff2", ResourceCategory::Font, "GET"),
                RequestRecord::new("https://acme.test/api/track", ResourceCategory::Other, "POST"),
            ],
            ..Default::default()
        }
    }

    fn test_config(base_delay: Duration) -> ScraperConfig {
        ScraperConfig {
            settle_delay: Duration::ZERO,
            reflow_delay: Duration::ZERO,
            retry: RetryConfig {
                max_attempts: 3,
                base_delay,
                multiplier: 2.0,
                max_jitter: Duration::from_millis(1),
            },
            ..Default::default()
        }
    }

    fn build_scraper(launcher: Arc<FakeLauncher>, sink: &MemorySink) -> Scraper {
        Scraper::new(
            test_config(Duration::from_millis(1)),
            launcher,
            ScriptBundle::builtin(),
            Arc::new(sink.clone()),
        )
    }

    fn assert_balanced(counters: &Counters) {
        assert_eq!(
            Counters::get(&counters.browsers_opened),
            Counters::get(&counters.browsers_closed)
        );
        assert_eq!(
            Counters::get(&counters.contexts_opened),
            Counters::get(&counters.contexts_closed)
        );
        assert_eq!(
            Counters::get(&counters.pages_opened),
            Counters::get(&counters.pages_closed)
        );
    }

    #[tokio::test]
    async fn test_end_to_end_success() {
        let launcher = Arc::new(FakeLauncher::new(sample_plan()));
        let sink = MemorySink::new();
        let scraper = build_scraper(launcher.clone(), &sink);

        let result = scraper.scrape("https://acme.test", 3).await;

        assert!(result.success, "unexpected failure: {:?}", result.error_message);
        assert!(result.error_message.is_none());
        assert_eq!(result.url, "https://acme.test");
        assert_eq!(result.attempts, 1);

        let keys: Vec<_> = result.screenshots.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["desktop", "mobile", "tablet"]);
        for encoded in result.screenshots.values() {
            assert_eq!(general_purpose::STANDARD.decode(encoded).unwrap(), PNG_MAGIC.to_vec());
        }

        assert!(!result.dom_structure.contains("<script"));
        assert!(!result.dom_structure.contains("<style"));
        assert!(!result.dom_structure.contains("build 42"));
        assert!(!result.dom_structure.contains("analytics-beacon"));
        assert!(result.dom_structure.contains("<h1>Acme Studio</h1>"));

        assert_eq!(result.extracted_css, normalize_css(&sample_css()).unwrap());
        assert_eq!(result.extracted_css.body_styles.get("color").unwrap(), "#333333");
        assert_eq!(result.extracted_css.body_styles.get("font-family").unwrap(), "Inter");
        assert!(!result.extracted_css.body_styles.contains_key("float"));
        assert_eq!(result.extracted_css.common_patterns.len(), 1);
        assert_eq!(result.extracted_css.common_patterns[0].count, 4);

        assert_eq!(result.color_palette, vec!["#ffffff", "#333333", "#0055ff"]);
        assert_eq!(result.typography["fonts"], json!(["Inter"]));
        assert_eq!(result.layout_info["structure"], json!([{ "tag": "header" }]));
        assert_eq!(result.metadata["title"], json!("Acme Studio"));

        assert_eq!(
            result.assets.images,
            vec!["https://acme.test/logo.png", "https://acme.test/hero.jpg"]
        );
        assert_eq!(result.assets.stylesheets, vec!["https://acme.test/main.css"]);
        assert_eq!(result.assets.fonts, vec!["https://acme.test/inter.woff2"]);
        assert!(result.assets.scripts.is_empty());
        assert!(result.assets.icons.is_empty());
        assert!(sink.contains("Ignoring unknown asset category 'videos'"));

        let counters = &launcher.counters;
        assert_eq!(Counters::get(&counters.browsers_opened), 1);
        assert_eq!(
            Counters::get(&counters.scripts_injected),
            ScriptBundle::builtin().len()
        );
        assert_balanced(counters);
        assert_eq!(scraper.metrics().snapshot().step_failures, 0);
    }

    #[tokio::test]
    async fn test_malformed_urls_never_acquire() {
        let launcher = Arc::new(FakeLauncher::new(sample_plan()));
        let sink = MemorySink::new();
        let scraper = build_scraper(launcher.clone(), &sink);

        for url in [
            "",
            "acme.test",
            "://acme.test",
            "https://",
            "just words",
            "http:acme.test",
            "https:/acme.test",
        ] {
            let result = scraper.scrape(url, 3).await;
            assert!(!result.success);
            assert_eq!(result.error(), Some("not valid"));
            assert!(result.screenshots.is_empty());
            assert!(result.color_palette.is_empty());
        }

        assert_eq!(Counters::get(&launcher.counters.launch_calls), 0);
    }

    #[tokio::test]
    async fn test_screenshots_are_all_or_nothing() {
        for failing_shot in 0..3 {
            let plan = PagePlan {
                screenshot_failure_at: Some(failing_shot),
                ..sample_plan()
            };
            let launcher = Arc::new(FakeLauncher::new(plan));
            let sink = MemorySink::new();
            let scraper = build_scraper(launcher, &sink);

            let result = scraper.scrape("https://acme.test", 3).await;
            assert!(result.success);
            assert!(result.screenshots.is_empty());
            assert!(sink.contains("screenshot extraction failed"));
        }
    }

    #[tokio::test]
    async fn test_palette_is_capped_deduped_or_defaulted() {
        let many: Vec<String> = (0..40).map(|i| format!("#0000{:02x}", i % 25)).collect();
        let cases = vec![
            (Ok(json!(many)), None),
            (Ok(json!([])), Some(DEFAULT_PALETTE.to_vec())),
            (Err("ReferenceError".to_string()), Some(DEFAULT_PALETTE.to_vec())),
        ];

        for (payload, expected) in cases {
            let mut plan = sample_plan();
            plan.payloads.retain(|(c, _)| *c != Capability::ColorPalette);
            plan.payloads.push((Capability::ColorPalette, payload));

            let launcher = Arc::new(FakeLauncher::new(plan));
            let scraper = build_scraper(launcher, &MemorySink::new());
            let result = scraper.scrape("https://acme.test", 1).await;

            assert!(result.color_palette.len() <= 15);
            let unique: HashSet<_> = result.color_palette.iter().collect();
            assert_eq!(unique.len(), result.color_palette.len());
            if let Some(expected) = expected {
                assert_eq!(result.color_palette, expected);
            } else {
                assert_eq!(result.color_palette.len(), 15);
            }
        }
    }

    #[tokio::test]
    async fn test_assets_are_capped_per_category() {
        let dom_images: Vec<String> = (0..30)
            .flat_map(|i| {
                let url = format!("https://acme.test/img/{i}.png");
                [url.clone(), url]
            })
            .collect();

        let mut plan = sample_plan();
        plan.payloads.retain(|(c, _)| *c != Capability::Assets);
        plan.payloads
            .push((Capability::Assets, Ok(json!({ "images": dom_images, "scripts": [] }))));
        plan.requests = (0..25)
            .map(|i| {
                RequestRecord::new(
                    format!("https://cdn.acme.test/{i}.js"),
                    ResourceCategory::Script,
                    "GET",
                )
            })
            .collect();

        let launcher = Arc::new(FakeLauncher::new(plan));
        let scraper = build_scraper(launcher, &MemorySink::new());
        let result = scraper.scrape("https://acme.test", 1).await;

        for category in crate::AssetCatalog::CATEGORIES {
            let bucket = result.assets.bucket(category).unwrap();
            assert!(bucket.len() <= 20, "{category} has {} entries", bucket.len());
            let unique: HashSet<_> = bucket.iter().collect();
            assert_eq!(unique.len(), bucket.len());
        }
        assert_eq!(result.assets.images.len(), 20);
        assert_eq!(result.assets.images[1], "https://acme.test/img/1.png");
        assert_eq!(result.assets.scripts.len(), 20);
    }

    #[tokio::test]
    async fn test_failed_steps_fall_back_to_defaults() {
        let plan = PagePlan {
            html: SAMPLE_HTML.to_string(),
            ..Default::default()
        };
        let launcher = Arc::new(FakeLauncher::new(plan));
        let sink = MemorySink::new();
        let scraper = build_scraper(launcher.clone(), &sink);

        let result = scraper.scrape("https://acme.test", 3).await;

        assert!(result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.screenshots.len(), 3);
        assert!(result.extracted_css.is_empty());
        assert_eq!(result.color_palette, DEFAULT_PALETTE.to_vec());
        assert_eq!(
            Value::Object(result.typography.clone()),
            json!({ "fonts": [], "headings": {}, "body_text": {} })
        );
        assert_eq!(
            Value::Object(result.layout_info.clone()),
            json!({ "structure": [], "grid_info": {} })
        );
        assert_eq!(result.assets.total(), 0);
        assert!(result.metadata.is_empty());

        assert_eq!(sink.count_at(LogLevel::Error), 6);
        assert!(sink.contains("CSS extraction failed: Page error: ReferenceError"));
        assert_eq!(scraper.metrics().snapshot().step_failures, 6);
        assert_balanced(&launcher.counters);
    }

    #[tokio::test]
    async fn test_acquisition_failure_exhausts_budget() {
        let launcher = Arc::new(FakeLauncher::new(sample_plan()).failing_first(usize::MAX));
        let sink = MemorySink::new();
        let config = test_config(Duration::from_millis(10));
        let scraper = Scraper::new(
            config.clone(),
            launcher.clone(),
            ScriptBundle::builtin(),
            Arc::new(sink.clone()),
        );

        let started = Instant::now();
        let result = scraper.scrape("https://acme.test", 3).await;
        let elapsed = started.elapsed();

        assert!(!result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(
            result.error(),
            Some(format!("Browser acquisition failed: connection refused ({} left)", usize::MAX - 3).as_str())
        );
        assert!(elapsed >= config.retry.base_backoff(0) + config.retry.base_backoff(1));
        assert_eq!(Counters::get(&launcher.counters.launch_calls), 3);
        assert_balanced(&launcher.counters);
        assert!(result.screenshots.is_empty());
        assert!(result.dom_structure.is_empty());
    }

    #[tokio::test]
    async fn test_navigation_failure_uses_fresh_session_per_attempt() {
        let plan = PagePlan {
            navigation_error: Some(ScrapeError::NavigationTimeout(Duration::from_secs(30))),
            ..sample_plan()
        };
        let launcher = Arc::new(FakeLauncher::new(plan));
        let sink = MemorySink::new();
        let scraper = build_scraper(launcher.clone(), &sink);

        let result = scraper.scrape("https://acme.test", 3).await;

        assert!(!result.success);
        assert_eq!(result.error(), Some("Navigation timed out after 30s"));
        assert_eq!(result.attempts, 3);

        let counters = &launcher.counters;
        assert_eq!(Counters::get(&counters.browsers_opened), 3);
        assert_eq!(Counters::get(&counters.contexts_opened), 3);
        assert_balanced(counters);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_launch_failures() {
        let launcher = Arc::new(FakeLauncher::new(sample_plan()).failing_first(2));
        let sink = MemorySink::new();
        let scraper = build_scraper(launcher.clone(), &sink);

        let result = scraper.scrape("https://acme.test", 3).await;

        assert!(result.success);
        assert_eq!(result.attempts, 3);
        assert!(sink.contains("Attempt 1 failed"));
        assert!(sink.contains("Attempt 2 failed"));
        assert_eq!(scraper.metrics().snapshot().scrape_retries, 2);
        assert_balanced(&launcher.counters);
    }

    #[tokio::test]
    async fn test_cleanup_failure_is_logged_only() {
        let plan = PagePlan {
            fail_context_close: true,
            ..sample_plan()
        };
        let launcher = Arc::new(FakeLauncher::new(plan));
        let sink = MemorySink::new();
        let scraper = build_scraper(launcher.clone(), &sink);

        let result = scraper.scrape("https://acme.test", 3).await;

        assert!(result.success);
        assert!(sink.contains("Browser cleanup failed"));
        assert_eq!(Counters::get(&launcher.counters.browsers_closed), 1);
        assert_eq!(scraper.metrics().snapshot().cleanup_failures, 1);
    }

    #[test]
    fn test_batch_keeps_input_order() {
        let launcher = Arc::new(FakeLauncher::new(sample_plan()));
        let scraper = Arc::new(build_scraper(launcher.clone(), &MemorySink::new()));
        let batch = BatchScraper::new(scraper, 2);

        let urls = vec![
            "https://a.acme.test".to_string(),
            "not a url".to_string(),
            "https://b.acme.test".to_string(),
        ];
        let tracker = Arc::new(ProgressTracker::new(urls.len()));

        let results = tokio_test::block_on(batch.run(urls, tracker.clone()));

        let order: Vec<_> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(order, vec!["https://a.acme.test", "not a url", "https://b.acme.test"]);
        assert!(results[0].success);
        assert_eq!(results[1].error(), Some("not valid"));
        assert!(results[2].success);

        let progress = tracker.get_progress();
        assert!(tracker.is_complete());
        assert_eq!(progress.success, 2);
        assert_eq!(progress.errors, 1);
        assert_balanced(&launcher.counters);
    }

    #[test]
    fn test_result_json_round_trips() {
        let launcher = Arc::new(FakeLauncher::new(sample_plan()));
        let scraper = build_scraper(launcher, &MemorySink::new());
        let result = tokio_test::block_on(scraper.scrape("https://acme.test", 1));

        let json = serde_json::to_string(&result).unwrap();
        let parsed: crate::ScrapingResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }
}
