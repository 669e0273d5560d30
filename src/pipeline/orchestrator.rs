//! Drives both modes against the oracle and assembles their ramps.
//!
//! Light and dark run concurrently, each in its own session. Within a mode
//! every step is sequential: toggle, fill inputs, wait for swatches, then read
//! swatch 0 through 23 in order. A swatch that cannot be read takes its
//! fallback value; a mode that cannot run at all takes the fallback ramps.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::backends::{OracleSession, SeedField};
use crate::color::HexColor;
use crate::config::{Config, Timings};
use crate::pipeline::harmony::SeedPalette;
use crate::pipeline::retry::{attempt_or, Attempt, RetryPolicy};
use crate::pipeline::swatch::{bounded, read_swatch};
use crate::pipeline::{fallback, Family, Mode, Ramp, STEPS, SWATCH_COUNT};
use crate::session::{Session, SessionManager};

/// Retry and timing knobs for one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionSettings {
    pub swatch_policy: RetryPolicy,
    pub session_policy: RetryPolicy,
    pub timings: Timings,
}

impl ExtractionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            swatch_policy: config.swatch_policy(),
            session_policy: config.session_policy(),
            timings: config.timing.timings(),
        }
    }
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Both ramps for one mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeResult {
    pub mode: Mode,
    pub accent: Ramp,
    pub gray: Ramp,
    /// Steps (out of 24) read from the oracle rather than synthesized.
    pub live_steps: usize,
    /// The whole mode fell back without reading anything.
    pub session_failed: bool,
}

impl ModeResult {
    /// Fully synthesized result for a mode whose session never ran.
    pub fn fallback(mode: Mode) -> Self {
        Self {
            mode,
            accent: fallback::ramp(Family::Accent),
            gray: fallback::ramp(Family::Gray),
            live_steps: 0,
            session_failed: true,
        }
    }

    /// Build from raw reads, indexed like the oracle's swatches. Missing
    /// entries take the fallback value for their family and step.
    pub fn from_reads(mode: Mode, reads: &[Option<HexColor>; SWATCH_COUNT]) -> Self {
        let mut accent = [None; STEPS];
        let mut gray = [None; STEPS];
        for (index, read) in reads.iter().enumerate() {
            match Family::locate(index) {
                Some((Family::Accent, step)) => accent[step] = *read,
                Some((Family::Gray, step)) => gray[step] = *read,
                None => {}
            }
        }

        for (index, _) in reads.iter().enumerate().filter(|(_, read)| read.is_none()) {
            if let Some((family, step)) = Family::locate(index) {
                tracing::warn!(%mode, family = family.name(), step, "using fallback value");
            }
        }

        Self {
            mode,
            accent: fallback::complete(Family::Accent, &accent),
            gray: fallback::complete(Family::Gray, &gray),
            live_steps: reads.iter().filter(|read| read.is_some()).count(),
            session_failed: false,
        }
    }

    pub fn fallback_steps(&self) -> usize {
        SWATCH_COUNT - self.live_steps
    }

    pub fn ramp(&self, family: Family) -> &Ramp {
        match family {
            Family::Accent => &self.accent,
            Family::Gray => &self.gray,
        }
    }
}

/// Results for both modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub light: ModeResult,
    pub dark: ModeResult,
}

impl Extraction {
    pub fn mode(&self, mode: Mode) -> &ModeResult {
        match mode {
            Mode::Light => &self.light,
            Mode::Dark => &self.dark,
        }
    }

    /// Any step in either mode is synthesized.
    pub fn degraded(&self) -> bool {
        self.light.fallback_steps() > 0 || self.dark.fallback_steps() > 0
    }
}

/// Make the oracle render in `mode`, clicking the toggle only when needed.
async fn ensure_mode(oracle: &mut dyn OracleSession, mode: Mode, timings: &Timings) -> Result<()> {
    if bounded(timings.step, "toggle state", oracle.toggle_active(mode))
        .await
        .context("reading mode toggle")?
    {
        return Ok(());
    }

    tracing::debug!(%mode, "switching mode toggle");
    bounded(timings.step, "toggle click", oracle.click_toggle(mode))
        .await
        .context("clicking mode toggle")?;
    tokio::time::sleep(timings.settle).await;

    if !bounded(timings.step, "toggle state", oracle.toggle_active(mode))
        .await
        .context("verifying mode toggle")?
    {
        bail!("{mode} toggle did not activate");
    }
    Ok(())
}

/// Clear then fill the three seed inputs, settling after each change.
async fn fill_seeds(
    oracle: &mut dyn OracleSession,
    seeds: &SeedPalette,
    mode: Mode,
    timings: &Timings,
) -> Result<()> {
    for field in SeedField::ALL {
        let value = match field {
            SeedField::Accent => seeds.accent,
            SeedField::Gray => seeds.gray,
            SeedField::Background => seeds.background(mode),
        };
        bounded(timings.step, "clear", oracle.clear_input(field))
            .await
            .with_context(|| format!("clearing {field:?} input"))?;
        bounded(timings.step, "fill", oracle.fill_input(field, &value.digits()))
            .await
            .with_context(|| format!("filling {field:?} input"))?;
        tokio::time::sleep(timings.settle).await;
    }
    Ok(())
}

/// Poll until all swatches are rendered or the wait runs out. Returns the
/// last count seen; a short count is logged, never fatal.
async fn wait_for_swatches(oracle: &mut dyn OracleSession, mode: Mode, timings: &Timings) -> usize {
    let deadline = tokio::time::Instant::now() + timings.swatch_presence;
    let mut found = 0;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match bounded(remaining, "swatch count", oracle.swatch_count()).await {
            Ok(count) => found = count,
            Err(err) => tracing::debug!(%mode, error = %err, "could not count swatches"),
        }
        if found >= SWATCH_COUNT || tokio::time::Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(timings.poll_interval).await;
    }

    if found < SWATCH_COUNT {
        tracing::warn!(%mode, found, expected = SWATCH_COUNT, "swatch count mismatch");
    } else if found > SWATCH_COUNT {
        tracing::debug!(%mode, found, "ignoring swatches past {SWATCH_COUNT}");
    }
    found
}

/// Configure a session and read every swatch it offers.
async fn extract_mode(
    session: &mut Session,
    seeds: &SeedPalette,
    settings: &ExtractionSettings,
) -> Result<ModeResult> {
    let mode = session.mode();
    let timings = settings.timings;

    ensure_mode(session.oracle(), mode, &timings).await?;
    fill_seeds(session.oracle(), seeds, mode, &timings).await?;
    let readable = wait_for_swatches(session.oracle(), mode, &timings)
        .await
        .min(SWATCH_COUNT);

    let mut reads = [None; SWATCH_COUNT];
    for (index, slot) in reads.iter_mut().enumerate().take(readable) {
        if index > 0 {
            tokio::time::sleep(timings.inter_swatch).await;
        }
        *slot = read_swatch(session, index, &settings.swatch_policy, timings).await;
    }

    Ok(ModeResult::from_reads(mode, &reads))
}

/// Acquire, extract, release. The session is released whether or not the
/// extraction succeeded.
struct ModeRun<'a> {
    sessions: &'a SessionManager,
    settings: &'a ExtractionSettings,
    seeds: &'a SeedPalette,
    mode: Mode,
}

#[async_trait]
impl<'a> Attempt for ModeRun<'a> {
    type Output = ModeResult;

    fn describe(&self) -> String {
        format!("{} extraction", self.mode)
    }

    async fn run(&mut self) -> Result<ModeResult> {
        let mut session = self.sessions.acquire(self.mode).await?;
        let result = extract_mode(&mut session, self.seeds, self.settings).await;
        self.sessions.release(session).await;
        result
    }
}

/// Runs both modes and merges their results.
pub struct Orchestrator<'m> {
    sessions: &'m SessionManager,
    settings: ExtractionSettings,
}

impl<'m> Orchestrator<'m> {
    pub fn new(sessions: &'m SessionManager, settings: ExtractionSettings) -> Self {
        Self { sessions, settings }
    }

    /// Extract light and dark concurrently. Never fails: anything that goes
    /// wrong degrades to fallback values.
    pub async fn extract(&self, seeds: &SeedPalette) -> Extraction {
        let (light, dark) = tokio::join!(
            self.run_mode(Mode::Light, seeds),
            self.run_mode(Mode::Dark, seeds)
        );
        Extraction { light, dark }
    }

    async fn run_mode(&self, mode: Mode, seeds: &SeedPalette) -> ModeResult {
        tracing::info!(%mode, "extraction started");
        let mut run = ModeRun {
            sessions: self.sessions,
            settings: &self.settings,
            seeds,
            mode,
        };
        let result = attempt_or(&self.settings.session_policy, &mut run, || {
            ModeResult::fallback(mode)
        })
        .await
        .into_inner();
        tracing::info!(
            %mode,
            live = result.live_steps,
            fallback = result.fallback_steps(),
            "extraction finished"
        );
        result
    }
}
