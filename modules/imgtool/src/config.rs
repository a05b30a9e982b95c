//! Front-end configuration: built-in defaults, then environment, then flags.

use std::env;
use std::str::FromStr;

use imgfs::Timestamp;
use log::LevelFilter;

/// Environment variable holding the log level filter.
pub const LOG_ENV: &str = "IMGTOOL_LOG";
/// Environment variable that switches new timestamps to UTC.
pub const UTC_ENV: &str = "IMGTOOL_UTC";
/// Level used when neither the environment nor a flag chooses one.
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Warn;
/// Directory listed when `list` gets no path.
pub const DEFAULT_LIST_PATH: &str = "/";
/// Exit status for a command that failed.
pub const EXIT_FAILURE: u8 = 1;
/// Exit status for a malformed command line.
pub const EXIT_USAGE: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub log_level: LevelFilter,
    pub utc: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL,
            utc: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(
            env::var(LOG_ENV).ok().as_deref(),
            env::var(UTC_ENV).ok().as_deref(),
        )
    }

    /// Unparseable values fall back to the defaults.
    fn from_vars(log: Option<&str>, utc: Option<&str>) -> Self {
        let mut config = Self::default();
        if let Some(level) = log.and_then(|value| LevelFilter::from_str(value.trim()).ok()) {
            config.log_level = level;
        }
        if let Some(value) = utc {
            config.utc = matches!(value.trim(), "1" | "true" | "yes");
        }
        config
    }

    /// Each `-v` raises the level one step past info; `-q` silences everything.
    pub fn apply_verbosity(&mut self, verbose: u8, quiet: bool) {
        if quiet {
            self.log_level = LevelFilter::Off;
            return;
        }
        let requested = match verbose {
            0 => return,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        self.log_level = self.log_level.max(requested);
    }

    /// Timestamp for entries created now.
    pub fn now(&self) -> Timestamp {
        if self.utc {
            Timestamp::now_utc()
        } else {
            Timestamp::now()
        }
    }
}
