use std::time::Duration;

use thiserror::Error;

use crate::pipeline::Mode;

/// Errors produced while deriving a palette.
///
/// Only [`PaletteError::RequestTimeout`] and [`PaletteError::Config`] ever reach the
/// caller of `PaletteService::generate_palette`; the others are contained inside
/// the pipeline and masked with fallback values.
#[derive(Error, Debug)]
pub enum PaletteError {
    /// Seed was not a 3- or 6-digit hex color.
    #[error("invalid seed color: {0:?}")]
    InvalidSeed(String),

    /// A browsing session for a mode could not be created or navigated.
    #[error("{mode} session unavailable: {reason}")]
    SessionUnavailable { mode: Mode, reason: String },

    /// A single swatch could not be read after every attempt.
    #[error("swatch {index} unreadable after {attempts} attempts: {reason}")]
    SwatchReadFailure {
        index: usize,
        attempts: u32,
        reason: String,
    },

    /// The whole two-mode extraction exceeded its budget.
    #[error("palette extraction timed out after {0:?}")]
    RequestTimeout(Duration),

    /// Configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The browser process could not be started or controlled.
    #[error("browser error: {0}")]
    Browser(String),
}

impl PaletteError {
    /// Whether the caller may reasonably retry the same request.
    pub fn is_retriable(&self) -> bool {
        matches!(self, PaletteError::RequestTimeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = PaletteError::InvalidSeed("#zz".to_string());
        assert_eq!(err.to_string(), "invalid seed color: \"#zz\"");

        let err = PaletteError::SessionUnavailable {
            mode: Mode::Dark,
            reason: "navigation timed out".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "dark session unavailable: navigation timed out"
        );

        let err = PaletteError::SwatchReadFailure {
            index: 5,
            attempts: 3,
            reason: "dialog never opened".to_string(),
        };
        assert!(err.to_string().contains("swatch 5"));
        assert!(err.to_string().contains("3 attempts"));
    }

    #[test]
    fn only_timeouts_are_retriable() {
        assert!(PaletteError::RequestTimeout(Duration::from_secs(45)).is_retriable());
        assert!(!PaletteError::Config("bad".to_string()).is_retriable());
        assert!(!PaletteError::Browser("gone".to_string()).is_retriable());
    }
}
