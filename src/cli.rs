use std::path::PathBuf;

use clap::Parser;

use crate::pipeline::Scheme;

/// Generate 12-step accent and gray color ramps for light and dark mode from
/// a single seed color.
#[derive(Parser, Debug)]
#[command(name = "rampgen", version, about)]
pub struct Args {
    /// Seed color as #RGB or #RRGGBB (defaults to #3B82F6)
    pub seed: Option<String>,

    /// Harmony scheme used to derive gray and background seeds
    #[arg(short, long, value_enum, default_value_t = Scheme::Analogous)]
    pub scheme: Scheme,

    /// Use the scheme-transformed accent instead of the raw seed
    #[arg(long)]
    pub harmonized: bool,

    /// Skip the browser and emit the synthesized fallback ramps
    #[arg(long)]
    pub offline: bool,

    /// Write the palette JSON to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print a colored terminal preview of the ramps
    #[arg(long)]
    pub preview: bool,

    /// Config file (defaults to ~/.config/rampgen/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Overall per-request timeout in seconds
    #[arg(long, env = "RAMPGEN_TIMEOUT_SECS")]
    pub timeout: Option<u64>,

    /// Keep the browser process alive between requests
    #[arg(long, env = "RAMPGEN_KEEP_WARM")]
    pub keep_warm: bool,

    /// Show the browser window
    #[arg(long, env = "RAMPGEN_HEADED")]
    pub headed: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write a default config file and exit
    #[arg(long)]
    pub init_config: bool,

    /// Generate this many palettes through one service
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub count: u32,
}

impl Args {
    /// Fold command-line overrides into a loaded config.
    pub fn apply(&self, config: &mut crate::config::Config) {
        if let Some(secs) = self.timeout {
            config.timing.request_timeout_secs = secs;
        }
        if self.keep_warm {
            config.browser.keep_warm = true;
        }
        if self.headed {
            config.browser.headless = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["rampgen"]).unwrap();
        assert_eq!(args.seed, None);
        assert_eq!(args.scheme, Scheme::Analogous);
        assert_eq!(args.count, 1);
        assert!(!args.offline);
    }

    #[test]
    fn overrides_apply_to_config() {
        let args = Args::try_parse_from([
            "rampgen",
            "#abc",
            "--scheme",
            "triadic",
            "--timeout",
            "5",
            "--keep-warm",
            "--headed",
            "-vv",
        ])
        .unwrap();
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(args.seed.as_deref(), Some("#abc"));
        assert_eq!(args.scheme, Scheme::Triadic);
        assert_eq!(args.verbose, 2);
        assert_eq!(config.timing.request_timeout_secs, 5);
        assert!(config.browser.keep_warm);
        assert!(!config.browser.headless);
    }

    #[test]
    fn rejects_zero_count() {
        assert!(Args::try_parse_from(["rampgen", "--count", "0"]).is_err());
    }
}
