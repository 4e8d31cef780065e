//! Browser session lifecycle and page loading.
//!
//! One isolated Chrome process per query: opened at the start of a search,
//! used for every page of that search, torn down unconditionally at the end.
//! Sessions are never pooled or shared between concurrent queries; cookies
//! and site state die with the process.

use std::ffi::OsStr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use headless_chrome::protocol::cdp::{Network, Page};
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{debug, info, warn};

use crate::error::ScrapeError;
use crate::stealth::{build_stealth_script, StealthConfig};

// Fixed scroll pass that forces lazily-rendered cards to materialize before
// the markup snapshot. Known trade-off: if the site's lazy-load threshold
// grows past 15 * 800px, the tail of a page is silently missed.
const SCROLL_STEPS: usize = 15;
const SCROLL_STEP_PX: u32 = 800;
const SCROLL_PAUSE: Duration = Duration::from_millis(300);

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

/// Exclusive handle to one headless Chrome instance.
///
/// Dropping the session kills the Chrome process, so release happens exactly
/// once on every exit path, including panics deeper in the pipeline.
pub struct BrowserSession {
    // Held for its Drop impl; all interaction goes through the tab.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl BrowserSession {
    /// Launch a fresh anti-detection-configured session.
    pub fn open(config: &StealthConfig) -> Result<Self, ScrapeError> {
        let launch_options = LaunchOptions {
            headless: true,
            sandbox: false,
            window_size: Some((1920, 1080)),
            args: vec![OsStr::new("--disable-dev-shm-usage")],
            ..Default::default()
        };

        let browser = Browser::new(launch_options)
            .map_err(|e| ScrapeError::SessionInit(format!("chrome launch failed: {e:#}")))?;
        let tab = browser
            .new_tab()
            .map_err(|e| ScrapeError::SessionInit(format!("tab creation failed: {e:#}")))?;

        tab.set_user_agent(USER_AGENT, Some(&config.accept_language()), Some(config.platform))
            .map_err(|e| ScrapeError::SessionInit(format!("user-agent override failed: {e:#}")))?;

        // The stealth script must be registered before the first navigation
        // so it runs ahead of any page script.
        tab.enable_debugger()
            .map_err(|e| ScrapeError::SessionInit(format!("debugger enable failed: {e:#}")))?;
        tab.call_method(Page::AddScriptToEvaluateOnNewDocument {
            source: build_stealth_script(config),
            world_name: None,
            include_command_line_api: None,
            run_immediately: None,
        })
        .map_err(|e| ScrapeError::SessionInit(format!("stealth injection failed: {e:#}")))?;

        debug!("🚀 browser session ready");
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    /// Navigate to `url`, force lazy content to render, and return the page
    /// markup as of the final scroll. No retry here; failures propagate to
    /// the pagination controller as fatal navigation errors.
    pub fn load_page(&self, url: &str) -> Result<String, ScrapeError> {
        info!("🌐 opening {url}");
        self.tab
            .navigate_to(url)
            .map_err(|e| ScrapeError::navigation(url, e))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| ScrapeError::navigation(url, e))?;

        let step = format!("window.scrollBy(0, {SCROLL_STEP_PX})");
        for _ in 0..SCROLL_STEPS {
            self.tab
                .evaluate(&step, false)
                .map_err(|e| ScrapeError::navigation(url, e))?;
            // The whole pipeline runs on a blocking worker, so pacing is a
            // plain sleep rather than a runtime suspension.
            thread::sleep(SCROLL_PAUSE);
        }

        self.tab
            .get_content()
            .map_err(|e| ScrapeError::navigation(url, e))
    }

    /// Tear the session down. Housekeeping failures are logged and absorbed;
    /// the Chrome process itself dies when the handle drops right after.
    pub fn close(self) {
        if let Err(e) = self.clear_state() {
            warn!("🧹 session cleanup failed (ignored): {e:#}");
        }
    }

    fn clear_state(&self) -> anyhow::Result<()> {
        self.tab.call_method(Network::ClearBrowserCookies(None))?;
        self.tab.navigate_to("about:blank")?;
        Ok(())
    }
}
