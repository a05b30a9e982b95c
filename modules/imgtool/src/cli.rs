//! Command line parsing.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::DEFAULT_LIST_PATH;

pub const USAGE: &str = "\
usage: imgtool [-v|-q] <command> [args]

commands:
  inspect <image>                    print superblock and FAT summary
  list    <image> [path]             list a directory (default /)
  get     <image> <path> <output>    copy a file out of the image
  put     <image> <source> <path>    copy a host file into the image

options:
  -v, --verbose    raise log level (repeatable)
  -q, --quiet      disable logging
";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Inspect {
        image: PathBuf,
    },
    List {
        image: PathBuf,
        path: String,
    },
    Get {
        image: PathBuf,
        path: String,
        output: PathBuf,
    },
    Put {
        image: PathBuf,
        source: PathBuf,
        dest: String,
    },
    Help,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Invocation {
    pub verbose: u8,
    pub quiet: bool,
    pub command: Command,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("unknown option {0:?}")]
    UnknownOption(String),
    #[error("{command}: missing <{what}>")]
    Missing {
        command: &'static str,
        what: &'static str,
    },
    #[error("{command}: unexpected argument {arg:?}")]
    Unexpected { command: &'static str, arg: String },
}

/// Parse arguments after the program name. Options must precede the command.
pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Invocation, UsageError> {
    let mut args = args.into_iter();
    let mut verbose = 0u8;
    let mut quiet = false;
    let name = loop {
        match args.next() {
            None => {
                return Ok(Invocation {
                    verbose,
                    quiet,
                    command: Command::Help,
                })
            }
            Some(arg) => match arg.as_str() {
                "-v" | "--verbose" => verbose = verbose.saturating_add(1),
                "-q" | "--quiet" => quiet = true,
                "-h" | "--help" => break "help".to_owned(),
                _ if arg.starts_with('-') && arg.len() > 1 => {
                    return Err(UsageError::UnknownOption(arg))
                }
                _ => break arg,
            },
        }
    };

    let mut operands = Operands {
        command: "",
        args: args.by_ref(),
    };
    let command = match name.as_str() {
        "help" => {
            operands.command = "help";
            Command::Help
        }
        "inspect" => {
            operands.command = "inspect";
            Command::Inspect {
                image: operands.required("image")?.into(),
            }
        }
        "list" => {
            operands.command = "list";
            Command::List {
                image: operands.required("image")?.into(),
                path: operands
                    .optional()
                    .unwrap_or_else(|| DEFAULT_LIST_PATH.to_owned()),
            }
        }
        "get" => {
            operands.command = "get";
            Command::Get {
                image: operands.required("image")?.into(),
                path: operands.required("path")?,
                output: operands.required("output")?.into(),
            }
        }
        "put" => {
            operands.command = "put";
            Command::Put {
                image: operands.required("image")?.into(),
                source: operands.required("source")?.into(),
                dest: operands.required("path")?,
            }
        }
        _ => return Err(UsageError::UnknownCommand(name)),
    };
    operands.finish()?;
    Ok(Invocation {
        verbose,
        quiet,
        command,
    })
}

struct Operands<I> {
    command: &'static str,
    args: I,
}

impl<I: Iterator<Item = String>> Operands<I> {
    fn required(&mut self, what: &'static str) -> Result<String, UsageError> {
        self.args.next().ok_or(UsageError::Missing {
            command: self.command,
            what,
        })
    }

    fn optional(&mut self) -> Option<String> {
        self.args.next()
    }

    fn finish(mut self) -> Result<(), UsageError> {
        match self.args.next() {
            Some(arg) => Err(UsageError::Unexpected {
                command: self.command,
                arg,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_owned).collect()
    }

    #[test]
    fn no_arguments_is_help() {
        assert_eq!(parse(args("")).unwrap().command, Command::Help);
        assert_eq!(parse(args("-v help")).unwrap().command, Command::Help);
        assert_eq!(parse(args("--help")).unwrap().command, Command::Help);
    }

    #[test]
    fn commands_and_operands() {
        let parsed = parse(args("-v -v put disk.img notes.txt /docs/notes.txt")).unwrap();
        assert_eq!(parsed.verbose, 2);
        assert!(!parsed.quiet);
        assert_eq!(
            parsed.command,
            Command::Put {
                image: "disk.img".into(),
                source: "notes.txt".into(),
                dest: "/docs/notes.txt".to_owned(),
            }
        );
        assert_eq!(
            parse(args("-q list disk.img")).unwrap(),
            Invocation {
                verbose: 0,
                quiet: true,
                command: Command::List {
                    image: "disk.img".into(),
                    path: "/".to_owned(),
                },
            }
        );
        assert_eq!(
            parse(args("get disk.img /a/b out.bin")).unwrap().command,
            Command::Get {
                image: "disk.img".into(),
                path: "/a/b".to_owned(),
                output: "out.bin".into(),
            }
        );
    }

    #[test]
    fn malformed_lines() {
        assert_eq!(
            parse(args("format disk.img")).unwrap_err(),
            UsageError::UnknownCommand("format".to_owned())
        );
        assert_eq!(
            parse(args("get disk.img /a")).unwrap_err(),
            UsageError::Missing {
                command: "get",
                what: "output",
            }
        );
        assert_eq!(
            parse(args("inspect disk.img extra")).unwrap_err(),
            UsageError::Unexpected {
                command: "inspect",
                arg: "extra".to_owned(),
            }
        );
        assert!(matches!(
            parse(args("-x inspect disk.img")),
            Err(UsageError::UnknownOption(_))
        ));
    }
}
