mod config;
mod display;
mod error;
mod headless;
mod lastfm;
mod layout;
mod lifecycle;
mod logging;
mod monitor;
mod theme;
mod track;

use clap::Parser;
use config::{Config, EnvCredentials, Overrides, Settings};
use logging::LogFormat;
use std::{path::PathBuf, process::ExitCode};
use tracing::{error, warn};

/// Show what you're scrobbling to Last.fm in a borderless, always-on-top window.
#[derive(Debug, Parser)]
#[command(name = "tunedisplay", version, about)]
struct Cli {
    /// Don't download or show album art
    #[arg(long)]
    no_art: bool,

    /// Seconds between polls
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Art placement: art_left, art_right, art_top or art_bottom
    #[arg(long)]
    layout: Option<String>,

    /// Start in a window even if the config asks for fullscreen
    #[arg(long)]
    windowed: bool,

    /// Log track changes without opening a window
    #[arg(long)]
    headless: bool,

    /// Open each downloaded cover in the default image viewer
    #[arg(long, requires = "headless")]
    open_art: bool,

    /// Path to a TOML config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            no_art: self.no_art,
            interval_secs: self.interval,
            layout: self.layout.clone(),
            windowed: self.windowed,
            headless: self.headless,
            open_art: self.open_art,
        }
    }
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.log_format);

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %format!("{err:#}"), "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let env = EnvCredentials::from_env();
    let settings = match Settings::resolve(&config, &env, &cli.overrides()) {
        Ok(settings) => settings,
        Err(err) => {
            error!(error = %err, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    for warning in &settings.warnings {
        warn!("{warning}");
    }

    match lifecycle::run(settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "TuneDisplay exited with an error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_documented_behaviour() {
        let cli = Cli::try_parse_from(["tunedisplay"]).unwrap();
        assert_eq!(cli.interval, 5);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(!cli.no_art && !cli.headless);
    }

    #[test]
    fn rejects_zero_interval_and_orphan_open_art() {
        assert!(Cli::try_parse_from(["tunedisplay", "--interval", "0"]).is_err());
        assert!(Cli::try_parse_from(["tunedisplay", "--open-art"]).is_err());
        let cli = Cli::try_parse_from([
            "tunedisplay",
            "--headless",
            "--open-art",
            "--log-format",
            "text",
        ])
        .unwrap();
        assert!(cli.overrides().open_art);
        assert_eq!(cli.log_format, LogFormat::Text);
    }
}
