//! Browser lifecycle management using Chrome DevTools Protocol

use crate::locator::{js_str, ElementPath, Locator, PageElement};
use headless_chrome::{Browser, LaunchOptions, Tab};
use logocert_core::config::BrowserSettings;
use logocert_core::{CertError, Result};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Manual test steps can leave the browser untouched for a long time
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(4 * 60 * 60);

/// How often `wait_for` re-checks the page
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Configuration for browser launch
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// User agent string
    pub user_agent: Option<String>,
    /// Default element wait timeout in seconds
    pub timeout_seconds: u64,
    /// Chrome profile directory (keeps the test account signed in)
    pub user_data_dir: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            window_width: 1280,
            window_height: 1024,
            user_agent: None,
            timeout_seconds: 30,
            user_data_dir: None,
        }
    }
}

impl From<&BrowserSettings> for BrowserConfig {
    fn from(settings: &BrowserSettings) -> Self {
        Self {
            headless: settings.headless,
            window_width: settings.window_width,
            window_height: settings.window_height,
            user_agent: None,
            timeout_seconds: settings.timeout_seconds,
            user_data_dir: settings.user_data_dir.clone(),
        }
    }
}

/// Active browser session with Chrome DevTools Protocol
///
/// The active tab and iframe scope live behind mutexes so one session can be
/// shared (`Arc<BrowserSession>`) by the page helpers of a run.
pub struct BrowserSession {
    browser: Browser,
    tab: Mutex<Arc<Tab>>,
    /// Iframe that element lookups are scoped to, resolved from the top document
    frame: Mutex<Option<ElementPath>>,
    config: BrowserConfig,
}

impl BrowserSession {
    /// Launch a new browser instance with default configuration
    pub async fn launch() -> Result<Self> {
        Self::launch_with_config(BrowserConfig::default()).await
    }

    /// Launch browser with custom configuration
    pub async fn launch_with_config(config: BrowserConfig) -> Result<Self> {
        info!(
            "Launching browser (headless: {}, size: {}x{})",
            config.headless, config.window_width, config.window_height
        );

        let user_agent_arg: Option<String> = config
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));
        let args: Vec<&OsStr> = user_agent_arg.iter().map(OsStr::new).collect();

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((config.window_width, config.window_height)))
            .user_data_dir(config.user_data_dir.clone())
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .args(args)
            .build()
            .map_err(|e| CertError::Browser(format!("Invalid launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| CertError::Browser(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| CertError::Browser(format!("Failed to create tab: {}", e)))?;

        info!("Browser launched successfully");

        Ok(Self {
            browser,
            tab: Mutex::new(tab),
            frame: Mutex::new(None),
            config,
        })
    }

    /// Connect to an existing browser started with `--remote-debugging-port`
    pub async fn connect(port: u16) -> Result<Self> {
        info!("Connecting to existing browser on port {}", port);

        let version_url = format!("http://127.0.0.1:{}/json/version", port);
        let version: serde_json::Value = reqwest::get(&version_url)
            .await
            .map_err(|e| CertError::Browser(format!("DevTools endpoint unreachable: {}", e)))?
            .json()
            .await
            .map_err(|e| CertError::Browser(format!("Bad DevTools version response: {}", e)))?;
        let ws_url = version
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CertError::Browser("No webSocketDebuggerUrl advertised".to_string()))?
            .to_string();

        let browser = Browser::connect_with_timeout(ws_url, IDLE_BROWSER_TIMEOUT)
            .map_err(|e| CertError::Browser(format!("Failed to connect to browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| CertError::Browser(format!("Failed to create tab: {}", e)))?;

        info!("Connected to browser successfully");

        Ok(Self {
            browser,
            tab: Mutex::new(tab),
            frame: Mutex::new(None),
            config: BrowserConfig::default(),
        })
    }

    /// Launch or attach according to the run configuration
    pub async fn from_settings(settings: &BrowserSettings) -> Result<Self> {
        match settings.devtools_port {
            Some(port) => Self::connect(port).await,
            None => Self::launch_with_config(BrowserConfig::from(settings)).await,
        }
    }

    /// Currently active tab
    pub fn tab(&self) -> Arc<Tab> {
        Arc::clone(&lock(&self.tab))
    }

    /// Navigate to a URL and leave any iframe scope
    pub async fn navigate(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        self.switch_to_default_content();

        let tab = self.tab();
        tab.navigate_to(url)
            .map_err(|e| CertError::Navigation(format!("Failed to navigate to {}: {}", url, e)))?;
        tab.wait_until_navigated()
            .map_err(|e| CertError::Navigation(format!("Navigation timeout for {}: {}", url, e)))?;

        info!("Navigated to {}", url);
        Ok(())
    }

    /// Execute JavaScript in the page context
    pub async fn evaluate_script(&self, script: &str) -> Result<serde_json::Value> {
        debug!("Evaluating JavaScript ({} bytes)", script.len());

        let result = self
            .tab()
            .evaluate(script, false)
            .map_err(|e| CertError::Browser(format!("JavaScript evaluation failed: {}", e)))?;

        Ok(result.value.unwrap_or(serde_json::Value::Null))
    }

    /// Evaluate a script that returns `JSON.stringify(...)` and decode it
    async fn evaluate_json(&self, script: &str) -> Result<serde_json::Value> {
        match self.evaluate_script(script).await? {
            serde_json::Value::String(s) => Ok(serde_json::from_str(&s)?),
            other => Ok(other),
        }
    }

    /// Current page title
    pub async fn title(&self) -> Result<String> {
        self.tab()
            .get_title()
            .map_err(|e| CertError::Browser(format!("Failed to read title: {}", e)))
    }

    /// Current URL
    pub async fn url(&self) -> String {
        self.tab().get_url()
    }

    /// JS expression for the node lookups start from
    fn root_js(&self) -> String {
        match lock(&self.frame).as_ref() {
            Some(frame) => format!(
                "((f) => f ? (f.contentDocument || null) : null)({})",
                frame.resolve_js("document")
            ),
            None => "document".to_string(),
        }
    }

    /// All matches of `locator` below `parent`
    pub async fn find_all_in(&self, parent: &ElementPath, locator: &Locator) -> Result<Vec<PageElement>> {
        let script = format!(
            "(() => {{ const p = {}; if (!p) {{ return JSON.stringify(null); }} \
             return JSON.stringify({}.map(e => (e.innerText || e.textContent || '').trim())); }})()",
            parent.resolve_js(&self.root_js()),
            locator.query_js("p")
        );

        let texts: Option<Vec<String>> = serde_json::from_value(self.evaluate_json(&script).await?)?;
        let texts = texts.ok_or_else(|| CertError::not_found(parent.to_string()))?;

        Ok(texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| PageElement {
                path: parent.child(locator.clone(), index),
                text,
            })
            .collect())
    }

    /// All matches of `locator` in the current document or frame
    pub async fn find_all(&self, locator: &Locator) -> Result<Vec<PageElement>> {
        self.find_all_in(&ElementPath::root(), locator).await
    }

    /// First match of `locator` below `parent`
    pub async fn find_in(&self, parent: &ElementPath, locator: &Locator) -> Result<PageElement> {
        self.find_all_in(parent, locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CertError::not_found(parent.child(locator.clone(), 0).to_string()))
    }

    /// First match of `locator` in the current document or frame
    pub async fn find(&self, locator: &Locator) -> Result<PageElement> {
        self.find_in(&ElementPath::root(), locator).await
    }

    /// Whether at least one element matches right now
    pub async fn element_exists(&self, locator: &Locator) -> bool {
        matches!(self.find_all(locator).await, Ok(found) if !found.is_empty())
    }

    /// Element wait timeout from the launch configuration
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    /// Wait until `locator` matches, up to `timeout` (or the configured default)
    pub async fn wait_for(&self, locator: &Locator, timeout: Option<Duration>) -> Result<PageElement> {
        let timeout = timeout.unwrap_or_else(|| self.default_timeout());
        debug!("Waiting for element: {} (timeout: {:?})", locator, timeout);

        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(element) = self.find(locator).await {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(CertError::Timeout(format!("waiting for element {}", locator)));
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// Read an attribute of a previously found element
    pub async fn attribute(&self, element: &PageElement, name: &str) -> Result<Option<String>> {
        let script = format!(
            "(() => {{ const e = {}; if (!e) {{ return JSON.stringify({{ found: false }}); }} \
             return JSON.stringify({{ found: true, value: e.getAttribute({}) }}); }})()",
            element.path.resolve_js(&self.root_js()),
            js_str(name)
        );

        let result = self.evaluate_json(&script).await?;
        if !result.get("found").and_then(|v| v.as_bool()).unwrap_or(false) {
            return Err(CertError::not_found(element.path.to_string()));
        }
        Ok(result
            .get("value")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()))
    }

    /// Click a previously found element
    pub async fn click(&self, element: &PageElement) -> Result<()> {
        debug!("Clicking {}", element.path);
        let script = format!(
            "(() => {{ const e = {}; if (!e) {{ return false; }} \
             e.scrollIntoView({{ block: 'center' }}); e.click(); return true; }})()",
            element.path.resolve_js(&self.root_js())
        );

        match self.evaluate_script(&script).await? {
            serde_json::Value::Bool(true) => Ok(()),
            _ => Err(CertError::not_found(element.path.to_string())),
        }
    }

    /// Focus an element and type text into it with real key events
    pub async fn send_keys(&self, element: &PageElement, text: &str) -> Result<()> {
        debug!("Typing {} chars into {}", text.chars().count(), element.path);
        let script = format!(
            "(() => {{ const e = {}; if (!e) {{ return false; }} e.focus(); return true; }})()",
            element.path.resolve_js(&self.root_js())
        );

        if self.evaluate_script(&script).await? != serde_json::Value::Bool(true) {
            return Err(CertError::not_found(element.path.to_string()));
        }

        self.tab()
            .type_str(text)
            .map_err(|e| CertError::Browser(format!("Failed to type into {}: {}", element.path, e)))?;
        Ok(())
    }

    /// Scope subsequent lookups to the document of the iframe matching `locator`
    pub async fn switch_to_frame(&self, locator: &Locator) -> Result<()> {
        if lock(&self.frame).is_some() {
            return Err(CertError::Browser("Nested frames are not supported".to_string()));
        }
        let frame_path = self.find(locator).await?.path;

        let accessible = format!(
            "(() => {{ const f = {}; return !!(f && f.contentDocument); }})()",
            frame_path.resolve_js("document")
        );
        if self.evaluate_script(&accessible).await? != serde_json::Value::Bool(true) {
            return Err(CertError::Browser(format!(
                "Frame {} has no accessible document",
                frame_path
            )));
        }

        debug!("Switched to frame {}", frame_path);
        *lock(&self.frame) = Some(frame_path);
        Ok(())
    }

    /// Return lookups to the top-level document
    pub fn switch_to_default_content(&self) {
        *lock(&self.frame) = None;
    }

    /// Titles of all open tabs
    pub async fn window_titles(&self) -> Result<Vec<String>> {
        let tabs = self.browser.get_tabs().lock().map_err(|_| {
            CertError::Browser("Tab list lock poisoned".to_string())
        })?;
        Ok(tabs
            .iter()
            .map(|tab| tab.get_title().unwrap_or_default())
            .collect())
    }

    /// Make the first tab whose title contains `needle` the active tab
    pub async fn switch_to_window_titled(&self, needle: &str) -> Result<()> {
        let found = {
            let tabs = self.browser.get_tabs().lock().map_err(|_| {
                CertError::Browser("Tab list lock poisoned".to_string())
            })?;
            tabs.iter()
                .find(|tab| tab.get_title().map(|t| t.contains(needle)).unwrap_or(false))
                .cloned()
        };

        let tab = found.ok_or_else(|| CertError::Browser(format!("No window titled '{}'", needle)))?;
        tab.activate()
            .map_err(|e| CertError::Browser(format!("Failed to activate window: {}", e)))?;

        *lock(&self.tab) = tab;
        self.switch_to_default_content();
        info!("Switched to window '{}'", needle);
        Ok(())
    }

    /// Close the browser session
    pub async fn close(self) -> Result<()> {
        info!("Closing browser session");
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        debug!("BrowserSession dropped, browser will be cleaned up");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BrowserConfig::default();
        assert!(!config.headless);
        assert_eq!(config.window_width, 1280);
        assert_eq!(config.window_height, 1024);
        assert_eq!(config.timeout_seconds, 30);
        assert!(config.user_data_dir.is_none());
    }

    #[test]
    fn test_config_from_settings() {
        let settings = BrowserSettings {
            headless: true,
            window_width: 800,
            window_height: 600,
            timeout_seconds: 10,
            user_data_dir: Some(PathBuf::from("/tmp/profile")),
            devtools_port: None,
        };
        let config = BrowserConfig::from(&settings);
        assert!(config.headless);
        assert_eq!(config.window_width, 800);
        assert_eq!(config.timeout_seconds, 10);
        assert_eq!(config.user_data_dir, Some(PathBuf::from("/tmp/profile")));
    }
}
