use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::pipeline::Mode;

use super::{OracleBackend, OracleSession};

/// Backend with no oracle behind it. Every session is unavailable, so every
/// ramp comes from the fallback synthesizer.
pub struct OfflineBackend;

#[async_trait]
impl OracleBackend for OfflineBackend {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn open_session(&self, mode: Mode) -> Result<Box<dyn OracleSession>> {
        bail!("offline backend has no {mode} session")
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
