mod cli;
mod commands;
mod config;
mod logger;

use std::env;
use std::io;
use std::process::ExitCode;

use cli::{Command, USAGE};
use config::{Config, EXIT_FAILURE, EXIT_USAGE};

fn main() -> ExitCode {
    let invocation = match cli::parse(env::args().skip(1)) {
        Ok(invocation) => invocation,
        Err(err) => {
            eprintln!("error: {err}");
            eprint!("{USAGE}");
            return ExitCode::from(EXIT_USAGE);
        }
    };
    let mut config = Config::from_env();
    config.apply_verbosity(invocation.verbose, invocation.quiet);
    if let Err(err) = logger::init(config.log_level) {
        eprintln!("warning: logging unavailable: {err}");
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = match invocation.command {
        Command::Help => {
            eprint!("{USAGE}");
            return ExitCode::from(EXIT_USAGE);
        }
        Command::Inspect { image } => commands::inspect(&image, &mut out),
        Command::List { image, path } => commands::list(&image, &path, &mut out),
        Command::Get {
            image,
            path,
            output,
        } => commands::get(&image, &path, &output).map(|_| ()),
        Command::Put {
            image,
            source,
            dest,
        } => commands::put(&image, &source, &dest, config.now()).map(|_| ()),
    };
    let result = commands::finish(result, &mut out);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::debug!("{err:?}");
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
