use std::fmt::Display;
use std::io::{self, Write};

use log::{Level, LevelFilter, Log, Metadata, Record};
use owo_colors::OwoColorize;

/// Diagnostics go to stderr; stdout carries command output.
struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

enum Color {
    Gray,
    BrightRed,
    BrightYellow,
    BrightBlue,
    BrightCyan,
    BrightMagenta,
}

fn colored(color: Color, text: impl Display) -> String {
    match color {
        Color::Gray => text.dimmed().to_string(),
        Color::BrightRed => text.bright_red().to_string(),
        Color::BrightYellow => text.bright_yellow().to_string(),
        Color::BrightBlue => text.bright_blue().to_string(),
        Color::BrightCyan => text.bright_cyan().to_string(),
        Color::BrightMagenta => text.bright_magenta().to_string(),
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = record.level();
        let tag = colored(
            match level {
                Level::Error => Color::BrightRed,
                Level::Warn => Color::BrightYellow,
                Level::Info => Color::BrightBlue,
                Level::Debug => Color::BrightCyan,
                Level::Trace => Color::BrightMagenta,
            },
            format_args!("{level:5}"),
        );
        let target = colored(Color::Gray, format_args!("[{}]", record.target()));
        let mut err = io::stderr().lock();
        // A closed stderr leaves nowhere to report to.
        let _ = writeln!(err, "{tag} {target} {}", record.args());
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
