use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{BrowserContextId, CloseParams};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::{BrowserSettings, Config, Selectors};
use crate::error::PaletteError;
use crate::pipeline::Mode;

use super::{DialogState, OracleBackend, OracleSession, SeedField};

/// Resource count must hold steady this long before the page counts as quiet.
const QUIET_WINDOW: Duration = Duration::from_millis(500);
const QUIET_POLL: Duration = Duration::from_millis(100);

/// Headless Chromium driven over CDP. One browser process is shared by every
/// session; each session gets its own browser context.
pub struct ChromiumBackend {
    url: String,
    selectors: Arc<Selectors>,
    settings: BrowserSettings,
    process: Mutex<Option<BrowserProcess>>,
}

struct BrowserProcess {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
}

impl ChromiumBackend {
    pub fn new(config: &Config) -> Self {
        Self {
            url: config.oracle.url.clone(),
            selectors: Arc::new(config.oracle.selectors.clone()),
            settings: config.browser.clone(),
            process: Mutex::new(None),
        }
    }

    /// The running browser, launching one if none is alive.
    async fn browser(&self) -> Result<Arc<Browser>> {
        let mut process = self.process.lock().await;
        if let Some(running) = process.as_ref() {
            if !running.handler.is_finished() {
                return Ok(running.browser.clone());
            }
            tracing::warn!("browser handler exited, relaunching");
        }

        let launched = launch(&self.settings).await?;
        let browser = launched.browser.clone();
        *process = Some(launched);
        Ok(browser)
    }
}

async fn launch(settings: &BrowserSettings) -> Result<BrowserProcess> {
    let mut builder = CdpBrowserConfig::builder();
    if !settings.headless {
        builder = builder.with_head();
    }
    if settings.no_sandbox {
        builder = builder.no_sandbox();
    }
    if let Some(path) = &settings.executable {
        builder = builder.chrome_executable(path);
    }
    let config = builder
        .build()
        .map_err(|e| anyhow!("invalid browser configuration: {e}"))?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| PaletteError::Browser(format!("failed to launch: {e}")))?;
    tracing::info!(headless = settings.headless, "browser launched");

    let handler = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(err) = event {
                tracing::debug!(error = %err, "browser connection closed");
                break;
            }
        }
    });

    Ok(BrowserProcess {
        browser: Arc::new(browser),
        handler,
    })
}

#[async_trait]
impl OracleBackend for ChromiumBackend {
    fn name(&self) -> &'static str {
        "chromium"
    }

    async fn open_session(&self, mode: Mode) -> Result<Box<dyn OracleSession>> {
        let browser = self.browser().await?;

        let context = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .context("failed to create browser context")?
            .result
            .browser_context_id;
        let guard = ContextGuard {
            browser: browser.clone(),
            context: Some(context.clone()),
        };

        let target = target_in_context(&self.url, context)?;
        let page = browser
            .new_page(target)
            .await
            .with_context(|| format!("failed to open {}", self.url))?;
        page.wait_for_navigation()
            .await
            .with_context(|| format!("navigation to {} failed", self.url))?;
        wait_for_quiet(&page).await?;

        tracing::debug!(%mode, url = %self.url, "oracle page ready");
        Ok(Box::new(ChromiumSession {
            page,
            selectors: self.selectors.clone(),
            guard,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let Some(process) = self.process.lock().await.take() else {
            return Ok(());
        };

        if let Err(err) = process.browser.execute(CloseParams::default()).await {
            tracing::debug!(error = %err, "browser close command failed");
        }
        process.handler.abort();
        tracing::info!("browser shut down");
        Ok(())
    }
}

/// Wait for `readyState == "complete"` and a resource count that has stopped
/// growing. The caller bounds this with the navigation timeout.
async fn wait_for_quiet(page: &Page) -> Result<()> {
    const PROBE: &str = "[document.readyState, performance.getEntriesByType('resource').length]";

    let mut last_count = None;
    let mut stable_for = Duration::ZERO;
    loop {
        let (state, count): (String, u64) = evaluate(page, PROBE.to_string()).await?;
        if state == "complete" && last_count == Some(count) {
            stable_for += QUIET_POLL;
            if stable_for >= QUIET_WINDOW {
                return Ok(());
            }
        } else {
            stable_for = Duration::ZERO;
        }
        last_count = Some(count);
        tokio::time::sleep(QUIET_POLL).await;
    }
}

async fn evaluate<T: DeserializeOwned>(page: &Page, script: String) -> Result<T> {
    let params = EvaluateParams::builder()
        .expression(script)
        .return_by_value(true)
        .await_promise(true)
        .build()
        .map_err(|e| anyhow!("invalid script parameters: {e}"))?;
    page.evaluate_expression(params)
        .await
        .context("script evaluation failed")?
        .into_value::<T>()
        .context("unexpected script result")
}

/// A new page at `url` inside the given browser context.
fn target_in_context(url: &str, context: BrowserContextId) -> Result<CreateTargetParams> {
    CreateTargetParams::builder()
        .url(url)
        .browser_context_id(context)
        .build()
        .map_err(|e| anyhow!("invalid target parameters: {e}"))
}

/// Quote a string as a JavaScript literal.
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Disposes the browser context when dropped without an explicit close, so a
/// cancelled extraction still releases its context.
struct ContextGuard {
    browser: Arc<Browser>,
    context: Option<BrowserContextId>,
}

impl ContextGuard {
    async fn dispose(mut self) -> Result<()> {
        if let Some(context) = self.context.take() {
            self.browser
                .execute(DisposeBrowserContextParams::new(context))
                .await
                .context("failed to dispose browser context")?;
        }
        Ok(())
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let Some(context) = self.context.take() else {
            return;
        };
        let browser = self.browser.clone();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                if let Err(err) = browser
                    .execute(DisposeBrowserContextParams::new(context))
                    .await
                {
                    tracing::debug!(error = %err, "late context disposal failed");
                }
            });
        }
    }
}

struct ChromiumSession {
    page: Page,
    selectors: Arc<Selectors>,
    guard: ContextGuard,
}

impl ChromiumSession {
    fn toggle_selector(&self, mode: Mode) -> &str {
        match mode {
            Mode::Light => &self.selectors.light_toggle,
            Mode::Dark => &self.selectors.dark_toggle,
        }
    }

    fn input_selector(&self, field: SeedField) -> &str {
        match field {
            SeedField::Accent => &self.selectors.accent_input,
            SeedField::Gray => &self.selectors.gray_input,
            SeedField::Background => &self.selectors.background_input,
        }
    }
}

#[async_trait]
impl OracleSession for ChromiumSession {
    async fn toggle_active(&mut self, mode: Mode) -> Result<bool> {
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); return el ? [true, el.getAttribute({attr}) || ''] : [false, '']; }})()",
            sel = js_string(self.toggle_selector(mode)),
            attr = js_string(&self.selectors.toggle_state_attribute),
        );
        let (found, state): (bool, String) = evaluate(&self.page, script).await?;
        if !found {
            bail!("{mode} toggle not found ({})", self.toggle_selector(mode));
        }
        Ok(state == self.selectors.toggle_on_value)
    }

    async fn click_toggle(&mut self, mode: Mode) -> Result<()> {
        let selector = self.toggle_selector(mode).to_string();
        self.page
            .find_element(selector.as_str())
            .await
            .with_context(|| format!("{mode} toggle not found ({selector})"))?
            .click()
            .await?;
        Ok(())
    }

    async fn clear_input(&mut self, field: SeedField) -> Result<()> {
        let selector = self.input_selector(field).to_string();
        let input = self
            .page
            .find_element(selector.as_str())
            .await
            .with_context(|| format!("{field:?} input not found ({selector})"))?;
        input.click().await?;
        // the native setter keeps framework-controlled inputs in sync
        input
            .call_js_fn(
                "function() { \
                    const setter = Object.getOwnPropertyDescriptor(HTMLInputElement.prototype, 'value').set; \
                    setter.call(this, ''); \
                    this.dispatchEvent(new Event('input', { bubbles: true })); \
                }",
                false,
            )
            .await?;
        Ok(())
    }

    async fn fill_input(&mut self, field: SeedField, digits: &str) -> Result<()> {
        let selector = self.input_selector(field).to_string();
        self.page
            .find_element(selector.as_str())
            .await
            .with_context(|| format!("{field:?} input not found ({selector})"))?
            .click()
            .await?
            .type_str(digits)
            .await?;
        Ok(())
    }

    async fn swatch_count(&mut self) -> Result<usize> {
        let script = format!(
            "document.querySelectorAll({}).length",
            js_string(&self.selectors.swatch)
        );
        evaluate(&self.page, script).await
    }

    async fn click_swatch(&mut self, index: usize) -> Result<()> {
        let swatches = self
            .page
            .find_elements(self.selectors.swatch.as_str())
            .await?;
        let Some(swatch) = swatches.get(index) else {
            bail!("swatch {index} not present ({} found)", swatches.len());
        };
        swatch.scroll_into_view().await?;
        swatch.click().await?;
        Ok(())
    }

    async fn dialog_state(&mut self) -> Result<DialogState> {
        let script = format!(
            "(() => {{ \
                const all = document.querySelectorAll({sel}); \
                if (all.length === 0) return 'absent'; \
                const dialog = all[all.length - 1]; \
                const rect = dialog.getBoundingClientRect(); \
                const style = getComputedStyle(dialog); \
                const shown = rect.width > 0 && rect.height > 0 \
                    && style.visibility !== 'hidden' && style.display !== 'none'; \
                return shown ? 'visible' : 'hidden'; \
            }})()",
            sel = js_string(&self.selectors.dialog),
        );
        evaluate(&self.page, script).await
    }

    async fn dialog_texts(&mut self) -> Result<Vec<String>> {
        let script = format!(
            "(() => {{ \
                const all = document.querySelectorAll({dialog}); \
                if (all.length === 0) return []; \
                const dialog = all[all.length - 1]; \
                return Array.from(dialog.querySelectorAll({control})).map(el => \
                    ((typeof el.value === 'string' && el.value) ? el.value : (el.textContent || '')).trim()); \
            }})()",
            dialog = js_string(&self.selectors.dialog),
            control = js_string(&self.selectors.hex_control),
        );
        evaluate(&self.page, script).await
    }

    async fn press_cancel(&mut self) -> Result<()> {
        let dialogs = self
            .page
            .find_elements(self.selectors.dialog.as_str())
            .await?;
        let target = match dialogs.into_iter().last() {
            Some(dialog) => dialog,
            None => self.page.find_element("body").await?,
        };
        target.press_key(self.selectors.cancel_key.as_str()).await?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromiumSession { page, guard, .. } = *self;
        if let Err(err) = page.close().await {
            tracing::debug!(error = %err, "page close failed");
        }
        guard.dispose().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_string_escapes_quotes() {
        assert_eq!(
            js_string(r#"button[aria-label="Light theme"]"#),
            r#""button[aria-label=\"Light theme\"]""#
        );
    }

    #[test]
    fn target_opens_inside_the_session_context() {
        let context = BrowserContextId::new("ctx-light");
        let target = target_in_context("https://example.test/colors", context.clone()).unwrap();
        assert_eq!(target.url, "https://example.test/colors");
        assert_eq!(target.browser_context_id, Some(context.clone()));

        let dispose = DisposeBrowserContextParams::new(context.clone());
        assert_eq!(dispose.browser_context_id, context);
    }

    #[test]
    fn backend_takes_oracle_settings() {
        let mut config = Config::default();
        config.oracle.url = "http://localhost:9999/custom".to_string();
        config.browser.keep_warm = true;
        let backend = ChromiumBackend::new(&config);
        assert_eq!(backend.name(), "chromium");
        assert_eq!(backend.url, "http://localhost:9999/custom");
        assert!(backend.settings.keep_warm);
    }

    #[tokio::test]
    async fn shutdown_without_launch_is_a_no_op() {
        let backend = ChromiumBackend::new(&Config::default());
        backend.shutdown().await.unwrap();
        backend.shutdown().await.unwrap();
    }
}
