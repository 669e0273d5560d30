//! Reads one swatch: open its dialog, read the hex value, dismiss the dialog.

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use regex::Regex;

use crate::backends::{DialogState, OracleSession};
use crate::color::HexColor;
use crate::config::Timings;
use crate::error::PaletteError;
use crate::pipeline::retry::{attempt, Attempt, RetryPolicy};
use crate::session::Session;

static HEX_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)#[0-9a-f]{3,6}\b").expect("hex pattern is valid"));

/// First hex-shaped value among the dialog's controls, in document order.
pub fn first_hex(texts: &[String]) -> Option<&str> {
    texts
        .iter()
        .find_map(|text| HEX_PATTERN.find(text).map(|m| m.as_str()))
}

/// Poll the last dialog until `done` holds or `limit` elapses.
async fn wait_for_dialog(
    oracle: &mut dyn OracleSession,
    limit: Duration,
    poll: Duration,
    done: fn(DialogState) -> bool,
) -> Result<()> {
    let polling = async {
        loop {
            let state = oracle.dialog_state().await?;
            if done(state) {
                return Ok::<(), anyhow::Error>(());
            }
            tokio::time::sleep(poll).await;
        }
    };
    match tokio::time::timeout(limit, polling).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!("timed out after {limit:?}")),
    }
}

/// Run one oracle call, giving up after `limit`.
pub(crate) async fn bounded<T>(
    limit: Duration,
    step: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!("{step} timed out after {limit:?}")),
    }
}

fn is_visible(state: DialogState) -> bool {
    state == DialogState::Visible
}

/// Gone, or left behind as a hidden node.
fn is_closed(state: DialogState) -> bool {
    state != DialogState::Visible
}

/// Dismiss a dialog left over from an earlier read. Best effort.
async fn dismiss_stale(oracle: &mut dyn OracleSession, timings: &Timings) {
    match bounded(timings.step, "dialog state", oracle.dialog_state()).await {
        Ok(DialogState::Absent | DialogState::Hidden) => {}
        Ok(DialogState::Visible) => {
            tracing::debug!("dismissing stale dialog");
            if let Err(err) = bounded(timings.step, "cancel", oracle.press_cancel()).await {
                tracing::debug!(error = %err, "stale dialog cancel failed");
            }
            if let Err(err) =
                wait_for_dialog(oracle, timings.dialog_close, timings.poll_interval, is_closed)
                    .await
            {
                tracing::debug!(error = %err, "stale dialog did not detach");
            }
        }
        Err(err) => tracing::debug!(error = %err, "could not inspect dialog state"),
    }
}

/// One pass of the read protocol.
async fn read_once(
    oracle: &mut dyn OracleSession,
    index: usize,
    timings: &Timings,
) -> Result<HexColor> {
    dismiss_stale(oracle, timings).await;

    bounded(timings.step, "click", oracle.click_swatch(index))
        .await
        .with_context(|| format!("clicking swatch {index}"))?;
    wait_for_dialog(oracle, timings.dialog_open, timings.poll_interval, is_visible)
        .await
        .context("dialog did not open")?;

    let texts = bounded(timings.step, "dialog read", oracle.dialog_texts())
        .await
        .context("reading dialog")?;
    let raw = first_hex(&texts).map(str::to_string);

    bounded(timings.step, "cancel", oracle.press_cancel())
        .await
        .context("dismissing dialog")?;
    wait_for_dialog(oracle, timings.dialog_close, timings.poll_interval, is_closed)
        .await
        .context("dialog did not detach")?;

    let raw = raw.ok_or_else(|| anyhow!("no hex value in dialog ({texts:?})"))?;
    HexColor::parse(&raw).map_err(|err| anyhow!(err))
}

/// Retry-wrapped read of one swatch.
pub struct SwatchRead<'s> {
    session: &'s mut Session,
    index: usize,
    timings: Timings,
}

impl<'s> SwatchRead<'s> {
    pub fn new(session: &'s mut Session, index: usize, timings: Timings) -> Self {
        Self {
            session,
            index,
            timings,
        }
    }
}

#[async_trait]
impl<'s> Attempt for SwatchRead<'s> {
    type Output = HexColor;

    fn describe(&self) -> String {
        format!("{} swatch {}", self.session.mode(), self.index)
    }

    async fn run(&mut self) -> Result<HexColor> {
        read_once(self.session.oracle(), self.index, &self.timings).await
    }
}

/// Read swatch `index`, or `None` once every attempt has failed. Substituting
/// a value for `None` is the caller's business.
pub async fn read_swatch(
    session: &mut Session,
    index: usize,
    policy: &RetryPolicy,
    timings: Timings,
) -> Option<HexColor> {
    let mode = session.mode();
    let mut read = SwatchRead::new(session, index, timings);
    match attempt(policy, &mut read).await {
        Ok(color) => {
            tracing::debug!(%mode, index, %color, "swatch read");
            Some(color)
        }
        Err(exhausted) => {
            let failure = PaletteError::SwatchReadFailure {
                index,
                attempts: exhausted.attempts,
                reason: format!("{:#}", exhausted.last_error),
            };
            tracing::warn!(%mode, error = %failure, "swatch read failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::scripted::{ModeScript, OracleScript, ScriptedBackend};
    use crate::backends::OracleBackend;
    use crate::pipeline::Mode;
    use crate::session::{ProcessPolicy, SessionManager};
    use std::sync::Arc;

    fn texts(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn first_hex_takes_first_match_in_order() {
        let found = texts(&["Copy", "Step 9", "#3b82f6", "#FFFFFF"]);
        assert_eq!(first_hex(&found), Some("#3b82f6"));
    }

    #[test]
    fn first_hex_accepts_shorthand() {
        assert_eq!(first_hex(&texts(&["value: #abc"])), Some("#abc"));
    }

    #[test]
    fn first_hex_ignores_overlong_values() {
        assert_eq!(first_hex(&texts(&["#12345678", "none"])), None);
    }

    #[test]
    fn first_hex_none_when_absent() {
        assert_eq!(first_hex(&texts(&["Close", ""])), None);
        assert_eq!(first_hex(&[]), None);
    }

    fn timings() -> Timings {
        crate::config::TimingConfig::default().timings()
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(150))
    }

    async fn session_for(script: OracleScript) -> (Arc<ScriptedBackend>, SessionManager, Session) {
        let backend = Arc::new(ScriptedBackend::new(script));
        let dyn_backend: Arc<dyn OracleBackend> = backend.clone();
        let manager =
            SessionManager::new(dyn_backend, ProcessPolicy::KeepWarm, Duration::from_secs(30));
        let session = manager.acquire(Mode::Light).await.unwrap();
        (backend, manager, session)
    }

    #[tokio::test(start_paused = true)]
    async fn reads_and_normalizes() {
        let (_backend, _manager, mut session) = session_for(OracleScript::default()).await;
        let color = read_swatch(&mut session, 3, &policy(), timings()).await;
        assert_eq!(color, Some(ModeScript::default().swatches[3]));
    }

    #[tokio::test(start_paused = true)]
    async fn flaky_swatch_recovers_within_attempts() {
        let mut script = OracleScript::default();
        script.light.flaky.insert(2, 2);
        let (backend, _manager, mut session) = session_for(script).await;

        let color = read_swatch(&mut session, 2, &policy(), timings()).await;
        assert_eq!(color, Some(ModeScript::default().swatches[2]));
        assert_eq!(backend.record().clicks_on(Mode::Light, 2), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dead_swatch_gives_none_after_three_clicks() {
        let mut script = OracleScript::default();
        script.light.dead_swatches.insert(5);
        let (backend, _manager, mut session) = session_for(script).await;

        assert_eq!(read_swatch(&mut session, 5, &policy(), timings()).await, None);
        assert_eq!(backend.record().clicks_on(Mode::Light, 5), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_click_times_out_each_attempt() {
        let mut script = OracleScript::default();
        script.light.hung_swatches.insert(4);
        let (backend, _manager, mut session) = session_for(script).await;

        assert_eq!(read_swatch(&mut session, 4, &policy(), timings()).await, None);
        assert_eq!(backend.record().clicks_on(Mode::Light, 4), 3);

        // The session is still usable for the next swatch.
        let next = read_swatch(&mut session, 6, &policy(), timings()).await;
        assert_eq!(next, Some(ModeScript::default().swatches[6]));
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_reports_the_step_that_hung() {
        let err = bounded(
            Duration::from_millis(20),
            "click",
            std::future::pending::<Result<()>>(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("click timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_dialog_is_dismissed_first() {
        let mut script = OracleScript::default();
        script.light.stale_dialog = true;
        let (backend, _manager, mut session) = session_for(script).await;

        let color = read_swatch(&mut session, 0, &policy(), timings()).await;
        assert_eq!(color, Some(ModeScript::default().swatches[0]));
        assert_eq!(backend.record().clicks_on(Mode::Light, 0), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_value_is_retried_then_dropped() {
        let mut script = OracleScript::default();
        script.light.garbled_swatches.insert(7);
        let (backend, _manager, mut session) = session_for(script).await;

        assert_eq!(read_swatch(&mut session, 7, &policy(), timings()).await, None);
        assert_eq!(backend.record().clicks_on(Mode::Light, 7), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_dialog_nodes_do_not_confuse_the_read() {
        let mut script = OracleScript::default();
        script.light.duplicate_dialogs = true;
        let (_backend, _manager, mut session) = session_for(script).await;

        let color = read_swatch(&mut session, 11, &policy(), timings()).await;
        assert_eq!(color, Some(ModeScript::default().swatches[11]));
    }
}
