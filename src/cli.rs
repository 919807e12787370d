use clap::Parser;
use clap::builder::styling::{AnsiColor, Effects, Styles};

use crate::config::Config;

fn get_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
        .usage(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Yellow.on_default())
        .error(AnsiColor::Red.on_default().effects(Effects::BOLD))
        .valid(AnsiColor::Green.on_default())
        .invalid(AnsiColor::Red.on_default())
}

/// Cartola FC data fetcher
///
/// Keeps a local SQLite copy of the Cartola FC market in sync: the live athlete
/// snapshot every cycle, reference data once, past rounds until no gaps remain
/// and the authenticated highlights once per round.
///
/// By default the fetcher runs one cycle immediately and then one every
/// `fetch_interval_minutes` until it receives SIGINT, SIGTERM or SIGHUP.
#[derive(Parser, Debug, Default)]
#[command(version, about, long_about = None)]
#[command(styles = get_styles())]
pub struct Args {
    /// Run a single cycle and exit. The exit status is 1 when the current
    /// round could not be resolved.
    #[arg(short, long)]
    pub once: bool,

    /// Minutes between cycles. Overrides `fetch_interval_minutes`.
    #[arg(short, long, value_name = "MINUTES", help_heading = "Scheduling")]
    pub interval: Option<u64>,

    /// Only look this many rounds back when searching for gaps.
    #[arg(long, value_name = "ROUNDS", help_heading = "Scheduling")]
    pub lookback: Option<u32>,

    /// Print the service status as JSON after the cycle (with --once).
    #[arg(long = "status-json", help_heading = "Scheduling")]
    pub status_json: bool,

    /// SQLite database URL, e.g. sqlite:///var/lib/cartola/cartola.db?mode=rwc
    #[arg(long = "database-url", value_name = "URL", help_heading = "Storage")]
    pub database_url: Option<String>,

    /// Credential account to use for authenticated endpoints.
    #[arg(long = "env-key", value_name = "KEY", help_heading = "Credentials")]
    pub env_key: Option<String>,

    /// Store the tokens from CARTOLA_ACCESS_TOKEN / CARTOLA_REFRESH_TOKEN /
    /// CARTOLA_ID_TOKEN (or CARTOLA_TOKEN_FILE) for the account, unless it
    /// already exists, and exit.
    #[arg(long = "bootstrap-credential", help_heading = "Credentials")]
    pub bootstrap_credential: bool,

    /// List current configuration settings
    #[arg(long = "list-config", short = 'l', help_heading = "Configuration")]
    pub list_config: bool,

    /// Write the effective configuration (file, environment and flags merged)
    /// to the config file and exit.
    #[arg(long = "write-config", help_heading = "Configuration")]
    pub write_config: bool,

    /// Enable debug logging on stdout, also in --once mode.
    #[arg(long = "debug", help_heading = "Debug")]
    pub debug: bool,

    /// Specify a custom log file path. If not provided, logs will be written to the default location.
    #[arg(long = "log-file", help_heading = "Debug")]
    pub log_file: Option<String>,
}

impl Args {
    /// Command-line values win over the config file and the environment.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(interval) = self.interval {
            config.fetch_interval_minutes = interval;
        }
        if let Some(lookback) = self.lookback {
            config.backfill_lookback = Some(lookback);
        }
        if let Some(url) = &self.database_url {
            config.database_url = url.clone();
        }
        if let Some(env_key) = &self.env_key {
            config.env_key = env_key.clone();
        }
        if let Some(log_file) = &self.log_file {
            config.log_file_path = Some(log_file.clone());
        }
    }
}

/// Whether log lines also go to stdout. A quiet `--once` run only logs to the file.
pub fn logs_to_stdout(args: &Args) -> bool {
    !args.once || args.debug
}
