pub mod chromium;
pub mod offline;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::pipeline::Mode;

pub use chromium::ChromiumBackend;
pub use offline::OfflineBackend;

/// One of the three seed inputs on the oracle page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeedField {
    Accent,
    Gray,
    Background,
}

impl SeedField {
    pub const ALL: [SeedField; 3] = [SeedField::Accent, SeedField::Gray, SeedField::Background];
}

/// State of the most recently opened dialog node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogState {
    /// No dialog node in the document.
    Absent,
    /// A dialog node exists but is not rendered yet (or is animating out).
    Hidden,
    Visible,
}

/// Something that can host isolated sessions against the oracle page.
#[async_trait]
pub trait OracleBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Open a fresh isolated context, navigate it to the oracle and wait
    /// until the page has gone quiet.
    async fn open_session(&self, mode: Mode) -> Result<Box<dyn OracleSession>>;

    /// Tear down the underlying process. Safe to call repeatedly; a later
    /// `open_session` starts a new process.
    async fn shutdown(&self) -> Result<()>;
}

/// DOM-level operations on one navigated oracle page.
///
/// Dialog queries always address the last dialog node in document order and
/// search only inside it.
#[async_trait]
pub trait OracleSession: Send {
    /// Whether the toggle for `mode` reports itself as active.
    async fn toggle_active(&mut self, mode: Mode) -> Result<bool>;

    async fn click_toggle(&mut self, mode: Mode) -> Result<()>;

    async fn clear_input(&mut self, field: SeedField) -> Result<()>;

    /// Type six hex digits (no `#`) into `field`.
    async fn fill_input(&mut self, field: SeedField, digits: &str) -> Result<()>;

    async fn swatch_count(&mut self) -> Result<usize>;

    /// Scroll swatch `index` into view and click it.
    async fn click_swatch(&mut self, index: usize) -> Result<()>;

    async fn dialog_state(&mut self) -> Result<DialogState>;

    /// Displayed text of each hex-candidate control inside the last dialog, in
    /// document order.
    async fn dialog_texts(&mut self) -> Result<Vec<String>>;

    /// Send the cancel key to the dialog.
    async fn press_cancel(&mut self) -> Result<()>;

    /// Close the page and dispose of its context.
    async fn close(self: Box<Self>) -> Result<()>;
}
