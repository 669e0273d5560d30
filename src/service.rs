//! Request-level entry point: seed in, palette out.

use std::sync::Arc;
use std::time::Duration;

use crate::backends::{ChromiumBackend, OfflineBackend, OracleBackend};
use crate::color::HexColor;
use crate::config::Config;
use crate::error::PaletteError;
use crate::pipeline::harmony;
use crate::pipeline::orchestrator::{ExtractionSettings, Orchestrator};
use crate::pipeline::Scheme;
use crate::session::{ProcessPolicy, SessionManager};
use crate::theme::Palette;

/// Per-request switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Use the scheme-transformed accent instead of the raw seed.
    pub harmonized: bool,
}

/// Generates palettes, owning the session manager (and through it the
/// browser process) across requests.
pub struct PaletteService {
    sessions: SessionManager,
    settings: ExtractionSettings,
    request_timeout: Duration,
}

impl PaletteService {
    pub fn new(config: &Config, backend: Arc<dyn OracleBackend>) -> Result<Self, PaletteError> {
        config.validate()?;
        let policy = ProcessPolicy::from_keep_warm(config.browser.keep_warm);
        tracing::debug!(backend = backend.name(), ?policy, "palette service ready");
        Ok(Self {
            sessions: SessionManager::new(backend, policy, config.timing.navigation_timeout()),
            settings: ExtractionSettings::from_config(config),
            request_timeout: config.timing.request_timeout(),
        })
    }

    /// Service backed by a headless Chromium, launched on first use.
    pub fn from_config(config: &Config) -> Result<Self, PaletteError> {
        Self::new(config, Arc::new(ChromiumBackend::new(config)))
    }

    /// Service that never opens a session; every ramp is synthesized.
    pub fn offline(config: &Config) -> Result<Self, PaletteError> {
        Self::new(config, Arc::new(OfflineBackend))
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Derive a complete palette from `seed`.
    ///
    /// A malformed seed is replaced by the default seed. The only failure is
    /// [`PaletteError::RequestTimeout`]: no partial palette is returned.
    pub async fn generate_palette(
        &self,
        seed: &str,
        scheme: Scheme,
        options: GenerateOptions,
    ) -> Result<Palette, PaletteError> {
        let seed = HexColor::parse_or_default(Some(seed));
        let seeds = harmony::generate(seed, scheme, options.harmonized);
        tracing::info!(%seed, ?scheme, harmonized = options.harmonized, "generating palette");

        let orchestrator = Orchestrator::new(&self.sessions, self.settings);
        let outcome = tokio::time::timeout(self.request_timeout, orchestrator.extract(&seeds)).await;
        self.sessions.finish_request().await;

        match outcome {
            Ok(extraction) => {
                let palette = Palette::assemble(&seeds, scheme, &extraction);
                tracing::info!(degraded = palette.extraction.degraded, "palette ready");
                Ok(palette)
            }
            Err(_) => {
                tracing::error!(timeout = ?self.request_timeout, "palette extraction timed out");
                Err(PaletteError::RequestTimeout(self.request_timeout))
            }
        }
    }

    /// Stop the browser process. Later requests are refused a session and
    /// fall back entirely.
    pub async fn shutdown(&self) {
        self.sessions.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fallback;
    use crate::pipeline::{Family, Mode};

    #[tokio::test]
    async fn offline_palette_is_all_fallback() {
        let service = PaletteService::offline(&Config::default()).unwrap();
        let palette = service
            .generate_palette("#3B82F6", Scheme::Analogous, GenerateOptions::default())
            .await
            .unwrap();

        for mode in Mode::ALL {
            assert_eq!(palette.accent_scale.steps(mode), &fallback::ramp(Family::Accent));
            assert_eq!(palette.gray_scale.steps(mode), &fallback::ramp(Family::Gray));
        }
        assert!(palette.extraction.light.session_failed);
        assert!(palette.extraction.dark.session_failed);
    }

    #[tokio::test]
    async fn invalid_seed_uses_default() {
        let service = PaletteService::offline(&Config::default()).unwrap();
        let palette = service
            .generate_palette("not a color", Scheme::Triadic, GenerateOptions::default())
            .await
            .unwrap();
        assert_eq!(palette.accent, crate::color::DEFAULT_SEED);
        assert_eq!(palette.scheme, Scheme::Triadic);
    }

    #[tokio::test]
    async fn harmonized_replaces_seed() {
        let service = PaletteService::offline(&Config::default()).unwrap();
        let palette = service
            .generate_palette("#808080", Scheme::Monochromatic, GenerateOptions { harmonized: true })
            .await
            .unwrap();
        assert_ne!(palette.accent, HexColor::new(0x80, 0x80, 0x80));
        assert!(palette.accent.to_hsl().s >= 84);
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = Config::default();
        config.timing.request_timeout_secs = 0;
        assert!(matches!(
            PaletteService::offline(&config),
            Err(PaletteError::Config(_))
        ));
    }
}
