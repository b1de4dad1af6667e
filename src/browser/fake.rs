//! Scripted in-memory driver for tests.
//!
//! Visibility is expressed as "becomes visible after N probes", which lets
//! tests exercise candidates that only appear near a timeout boundary
//! without waiting on real clocks. Every interaction is recorded.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{BrowserEngine, DriverError, LaunchOptions, LaunchProfile, PageDriver, WaitUntil};

/// Probe iterations a single `wait_visible` call performs before giving up.
const PROBES_PER_WAIT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Navigate(String),
    Click(String),
    Type { pattern: String, text: String },
    PressKey(String),
    Screenshot,
    Close,
}

#[derive(Default)]
struct Element {
    count: usize,
    visible_after: usize,
    probes: usize,
    dismiss_on_click: bool,
    dismissed: bool,
}

impl Element {
    fn is_visible(&self) -> bool {
        !self.dismissed && self.count > 0 && self.probes >= self.visible_after
    }
}

#[derive(Default)]
struct Inner {
    elements: HashMap<String, Element>,
    texts: HashMap<String, String>,
    url: String,
    redirects: HashMap<String, VecDeque<String>>,
    url_on_click: HashMap<String, String>,
    failing_clicks: HashMap<String, usize>,
    actions: Vec<Action>,
}

#[derive(Clone, Default)]
pub struct FakeDriver {
    inner: Arc<Mutex<Inner>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Element immediately visible.
    pub fn visible(&self, pattern: &str) -> &Self {
        self.add(pattern, 1, 0, false)
    }

    pub fn visible_many(&self, pattern: &str, count: usize) -> &Self {
        self.add(pattern, count, 0, false)
    }

    /// Element that only reports visible after `probes` visibility probes.
    pub fn visible_after(&self, pattern: &str, probes: usize) -> &Self {
        self.add(pattern, 1, probes, false)
    }

    /// Dismissible dialog: visible until clicked.
    pub fn popup(&self, pattern: &str) -> &Self {
        self.add(pattern, 1, 0, true)
    }

    fn add(&self, pattern: &str, count: usize, visible_after: usize, dismiss: bool) -> &Self {
        self.inner.lock().unwrap().elements.insert(
            pattern.to_string(),
            Element {
                count,
                visible_after,
                dismiss_on_click: dismiss,
                ..Element::default()
            },
        );
        self
    }

    pub fn text_of(&self, pattern: &str, text: &str) -> &Self {
        self.inner
            .lock()
            .unwrap()
            .texts
            .insert(pattern.to_string(), text.to_string());
        self
    }

    pub fn set_url(&self, url: &str) -> &Self {
        self.inner.lock().unwrap().url = url.to_string();
        self
    }

    /// The next navigation to `from` lands on `to` instead.
    pub fn redirect_once(&self, from: &str, to: &str) -> &Self {
        self.inner
            .lock()
            .unwrap()
            .redirects
            .entry(from.to_string())
            .or_default()
            .push_back(to.to_string());
        self
    }

    /// Clicking `pattern` changes the page URL (post-submit redirects).
    pub fn url_on_click(&self, pattern: &str, url: &str) -> &Self {
        self.inner
            .lock()
            .unwrap()
            .url_on_click
            .insert(pattern.to_string(), url.to_string());
        self
    }

    /// The next `n` clicks on `pattern` fail with a backend error.
    pub fn fail_clicks(&self, pattern: &str, n: usize) -> &Self {
        self.inner
            .lock()
            .unwrap()
            .failing_clicks
            .insert(pattern.to_string(), n);
        self
    }

    pub fn actions(&self) -> Vec<Action> {
        self.inner.lock().unwrap().actions.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                Action::Click(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Count of actions that touch the page (everything but Close).
    pub fn interaction_count(&self) -> usize {
        self.actions()
            .iter()
            .filter(|a| !matches!(a, Action::Close))
            .count()
    }

    fn record(&self, action: Action) {
        self.inner.lock().unwrap().actions.push(action);
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn navigate(&self, url: &str, _wait: WaitUntil) -> Result<(), DriverError> {
        let mut inner = self.inner.lock().unwrap();
        inner.actions.push(Action::Navigate(url.to_string()));
        let landed = inner
            .redirects
            .get_mut(url)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| url.to_string());
        inner.url = landed;
        Ok(())
    }

    async fn wait_for_idle(&self, _timeout: Duration) -> Result<(), DriverError> {
        Ok(())
    }

    async fn wait_visible(&self, pattern: &str, _timeout: Duration) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let Some(el) = inner.elements.get_mut(pattern) else {
            return false;
        };
        for _ in 0..PROBES_PER_WAIT {
            el.probes += 1;
            if el.is_visible() {
                return true;
            }
        }
        false
    }

    async fn count(&self, pattern: &str) -> Result<usize, DriverError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .elements
            .get(pattern)
            .map(|el| if el.dismissed { 0 } else { el.count })
            .unwrap_or(0))
    }

    async fn visible_count(&self, pattern: &str) -> Result<usize, DriverError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .elements
            .get(pattern)
            .map(|el| {
                if !el.dismissed && el.count > 0 && el.visible_after == 0 {
                    el.count
                } else {
                    0
                }
            })
            .unwrap_or(0))
    }

    async fn click(&self, pattern: &str, _timeout: Duration) -> Result<(), DriverError> {
        let mut inner = self.inner.lock().unwrap();
        inner.actions.push(Action::Click(pattern.to_string()));

        if let Some(remaining) = inner.failing_clicks.get_mut(pattern) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DriverError::Backend(format!(
                    "scripted click failure for `{pattern}`"
                )));
            }
        }

        if let Some(el) = inner.elements.get_mut(pattern) {
            if el.dismiss_on_click {
                el.dismissed = true;
            }
        }
        if let Some(url) = inner.url_on_click.get(pattern).cloned() {
            inner.url = url;
        }
        Ok(())
    }

    async fn type_sequentially(
        &self,
        pattern: &str,
        text: &str,
        _delay: Duration,
    ) -> Result<(), DriverError> {
        self.record(Action::Type {
            pattern: pattern.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn inner_text(&self, pattern: &str) -> Result<Option<String>, DriverError> {
        Ok(self.inner.lock().unwrap().texts.get(pattern).cloned())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.inner.lock().unwrap().url.clone())
    }

    async fn press_key(&self, combo: &str) -> Result<(), DriverError> {
        self.record(Action::PressKey(combo.to_string()));
        Ok(())
    }

    async fn screenshot(&self, _quality: u8) -> Result<Vec<u8>, DriverError> {
        self.record(Action::Screenshot);
        // Minimal JPEG magic so content-type checks hold.
        Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.record(Action::Close);
        Ok(())
    }
}

/// Engine whose first `failures` launches fail, recording the profile of
/// every attempt.
pub struct FakeEngine {
    driver: FakeDriver,
    failures_remaining: Mutex<usize>,
    launches: Mutex<Vec<LaunchProfile>>,
}

impl FakeEngine {
    pub fn new(driver: FakeDriver) -> Self {
        Self::failing(driver, 0)
    }

    pub fn failing(driver: FakeDriver, failures: usize) -> Self {
        Self {
            driver,
            failures_remaining: Mutex::new(failures),
            launches: Mutex::new(Vec::new()),
        }
    }

    pub fn always_failing(driver: FakeDriver) -> Self {
        Self::failing(driver, usize::MAX)
    }

    pub fn launch_profiles(&self) -> Vec<LaunchProfile> {
        self.launches.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn PageDriver>, DriverError> {
        self.launches.lock().unwrap().push(options.profile);
        let mut remaining = self.failures_remaining.lock().unwrap();
        if *remaining > 0 {
            *remaining = remaining.saturating_sub(1);
            return Err(DriverError::Launch("scripted launch failure".to_string()));
        }
        Ok(Box::new(self.driver.clone()))
    }
}
