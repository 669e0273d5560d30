//! In-memory oracle with scriptable misbehaviour. Drives the pipeline in the
//! test suites without a browser.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::color::HexColor;
use crate::pipeline::{Mode, SWATCH_COUNT};

use super::{DialogState, OracleBackend, OracleSession, SeedField};

/// Behaviour of the page for one mode's session.
#[derive(Debug, Clone)]
pub struct ModeScript {
    /// Session cannot be opened.
    pub unavailable: bool,
    /// Values shown while the page is in this mode, in swatch order.
    pub swatches: Vec<HexColor>,
    /// Clicking these never opens a dialog.
    pub dead_swatches: HashSet<usize>,
    /// Swatch index -> number of initial clicks that open nothing.
    pub flaky: HashMap<usize, u32>,
    /// Dialog opens but shows no hex value.
    pub garbled_swatches: HashSet<usize>,
    /// A dialog is already open when the page loads.
    pub stale_dialog: bool,
    /// A hidden leftover dialog node stays in the document.
    pub duplicate_dialogs: bool,
    /// Toggle that is active when the page loads.
    pub starts_in: Mode,
    /// Clicking the toggle has no effect.
    pub stuck_toggle: bool,
    /// Each swatch click takes this long.
    pub click_delay: Duration,
    /// Clicking these never returns.
    pub hung_swatches: HashSet<usize>,
    /// Closing the page never returns.
    pub hung_close: bool,
}

impl ModeScript {
    /// 24 distinct values, different per mode.
    pub fn for_mode(mode: Mode) -> Self {
        let swatches = (0..SWATCH_COUNT)
            .map(|i| {
                let step = (i * 10) as u8;
                match mode {
                    Mode::Light => HexColor::new(step, 0x40, 0xC8),
                    Mode::Dark => HexColor::new(step, 0xC8, 0x40),
                }
            })
            .collect();
        Self {
            unavailable: false,
            swatches,
            dead_swatches: HashSet::new(),
            flaky: HashMap::new(),
            garbled_swatches: HashSet::new(),
            stale_dialog: false,
            duplicate_dialogs: false,
            starts_in: Mode::Light,
            stuck_toggle: false,
            click_delay: Duration::ZERO,
            hung_swatches: HashSet::new(),
            hung_close: false,
        }
    }
}

impl Default for ModeScript {
    fn default() -> Self {
        Self::for_mode(Mode::Light)
    }
}

#[derive(Debug, Clone)]
pub struct OracleScript {
    pub light: ModeScript,
    pub dark: ModeScript,
    /// How long opening a session takes.
    pub open_delay: Duration,
}

impl Default for OracleScript {
    fn default() -> Self {
        Self {
            light: ModeScript::for_mode(Mode::Light),
            dark: ModeScript::for_mode(Mode::Dark),
            open_delay: Duration::from_millis(100),
        }
    }
}

impl OracleScript {
    pub fn mode(&self, mode: Mode) -> &ModeScript {
        match mode {
            Mode::Light => &self.light,
            Mode::Dark => &self.dark,
        }
    }

    pub fn mode_mut(&mut self, mode: Mode) -> &mut ModeScript {
        match mode {
            Mode::Light => &mut self.light,
            Mode::Dark => &mut self.dark,
        }
    }
}

/// Everything the page saw.
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub opened: Vec<Mode>,
    pub closed: Vec<Mode>,
    pub clears: Vec<(Mode, SeedField)>,
    pub fills: Vec<(Mode, SeedField, String)>,
    pub toggle_clicks: Vec<Mode>,
    pub clicks: Vec<(Mode, usize)>,
    pub shutdowns: usize,
    pub live: usize,
    pub peak_live: usize,
}

impl Record {
    pub fn clicks_on(&self, mode: Mode, index: usize) -> usize {
        self.clicks
            .iter()
            .filter(|(m, i)| *m == mode && *i == index)
            .count()
    }

    /// Swatch indices clicked in `mode`, in click order.
    pub fn click_order(&self, mode: Mode) -> Vec<usize> {
        self.clicks
            .iter()
            .filter(|(m, _)| *m == mode)
            .map(|(_, i)| *i)
            .collect()
    }

    pub fn fills_for(&self, mode: Mode) -> Vec<(SeedField, String)> {
        self.fills
            .iter()
            .filter(|(m, _, _)| *m == mode)
            .map(|(_, field, value)| (*field, value.clone()))
            .collect()
    }
}

pub struct ScriptedBackend {
    script: OracleScript,
    record: Arc<Mutex<Record>>,
}

impl ScriptedBackend {
    pub fn new(script: OracleScript) -> Self {
        Self {
            script,
            record: Arc::new(Mutex::new(Record::default())),
        }
    }

    /// Snapshot of what has happened so far.
    pub fn record(&self) -> Record {
        lock(&self.record).clone()
    }
}

fn lock(record: &Mutex<Record>) -> MutexGuard<'_, Record> {
    record.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl OracleBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn open_session(&self, mode: Mode) -> Result<Box<dyn OracleSession>> {
        tokio::time::sleep(self.script.open_delay).await;
        let script = self.script.mode(mode).clone();
        if script.unavailable {
            bail!("{mode} page failed to load");
        }

        {
            let mut record = lock(&self.record);
            record.opened.push(mode);
            record.live += 1;
            record.peak_live = record.peak_live.max(record.live);
        }

        Ok(Box::new(ScriptedSession {
            mode,
            active: script.starts_in,
            open_dialog: script.stale_dialog.then_some(usize::MAX),
            clicks: HashMap::new(),
            script,
            record: self.record.clone(),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        lock(&self.record).shutdowns += 1;
        Ok(())
    }
}

struct ScriptedSession {
    mode: Mode,
    active: Mode,
    /// Swatch whose dialog is showing.
    open_dialog: Option<usize>,
    clicks: HashMap<usize, u32>,
    script: ModeScript,
    record: Arc<Mutex<Record>>,
}

impl ScriptedSession {
    fn displayed(&self, index: usize) -> Option<HexColor> {
        let color = *self.script.swatches.get(index)?;
        if self.active == self.mode {
            Some(color)
        } else {
            // wrong toggle state renders the other mode's values
            Some(HexColor::new(255 - color.r, 255 - color.g, 255 - color.b))
        }
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        lock(&self.record).live -= 1;
    }
}

#[async_trait]
impl OracleSession for ScriptedSession {
    async fn toggle_active(&mut self, mode: Mode) -> Result<bool> {
        Ok(self.active == mode)
    }

    async fn click_toggle(&mut self, mode: Mode) -> Result<()> {
        lock(&self.record).toggle_clicks.push(mode);
        if !self.script.stuck_toggle {
            self.active = mode;
        }
        Ok(())
    }

    async fn clear_input(&mut self, field: SeedField) -> Result<()> {
        lock(&self.record).clears.push((self.mode, field));
        Ok(())
    }

    async fn fill_input(&mut self, field: SeedField, digits: &str) -> Result<()> {
        lock(&self.record)
            .fills
            .push((self.mode, field, digits.to_string()));
        Ok(())
    }

    async fn swatch_count(&mut self) -> Result<usize> {
        Ok(self.script.swatches.len())
    }

    async fn click_swatch(&mut self, index: usize) -> Result<()> {
        tokio::time::sleep(self.script.click_delay).await;
        lock(&self.record).clicks.push((self.mode, index));
        if self.script.hung_swatches.contains(&index) {
            std::future::pending::<()>().await;
        }
        if index >= self.script.swatches.len() {
            bail!("swatch {index} not present");
        }
        if self.open_dialog.is_some() {
            // the click lands on the open modal's backdrop
            return Ok(());
        }

        let count = self.clicks.entry(index).or_insert(0);
        *count += 1;
        let flaky_for = self.script.flaky.get(&index).copied().unwrap_or(0);
        if self.script.dead_swatches.contains(&index) || *count <= flaky_for {
            return Ok(());
        }
        self.open_dialog = Some(index);
        Ok(())
    }

    async fn dialog_state(&mut self) -> Result<DialogState> {
        Ok(match self.open_dialog {
            Some(_) => DialogState::Visible,
            None if self.script.duplicate_dialogs => DialogState::Hidden,
            None => DialogState::Absent,
        })
    }

    async fn dialog_texts(&mut self) -> Result<Vec<String>> {
        let Some(index) = self.open_dialog else {
            return Ok(Vec::new());
        };
        let mut texts = vec![format!("Step {}", index % 12 + 1), "Copy".to_string()];
        if !self.script.garbled_swatches.contains(&index) {
            if let Some(color) = self.displayed(index) {
                texts.push(color.to_string().to_lowercase());
            }
        }
        Ok(texts)
    }

    async fn press_cancel(&mut self) -> Result<()> {
        self.open_dialog = None;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        if self.script.hung_close {
            std::future::pending::<()>().await;
        }
        lock(&self.record).closed.push(self.mode);
        Ok(())
    }
}
