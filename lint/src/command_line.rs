//! Turning a configured command line into a spawnable [`Command`].
//!
//! Command lines come from the settings file as one string, the way a user
//! would type them in a shell. Script files need an explicit interpreter:
//! `.bat`/`.cmd` on Windows run as `cmd /c "<line>"`, and `.sh` runs as
//! `sh -c "<line>"` everywhere. The whole line is passed as a single
//! argument so the interpreter, not us, splits it. Everything else is
//! split into a program and its arguments.
//!
//! The file to lint is never spliced into a line an interpreter parses.
//! `sh` receives it as the positional `$1`, and `cmd` reads it from
//! [`FILE_ARG_VAR`], whose expanded value `cmd` does not parse again.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Carries the file argument to `cmd /c` lines.
pub const FILE_ARG_VAR: &str = "LINTER_FILE_ARG";

/// How a command line will be launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Run `program` directly with `args`.
    Direct { program: String, args: Vec<String> },
    /// Run `interpreter flag "<line>"`.
    Interpreter {
        interpreter: &'static str,
        flag: &'static str,
        line: String,
    },
}

impl Invocation {
    /// Classify a command line. Returns `None` for a blank line.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let mut words = split_command_line(line);
        if words.is_empty() {
            return None;
        }
        let program = words.remove(0);

        if let Some((interpreter, flag)) = script_interpreter(Path::new(&program)) {
            return Some(Self::Interpreter {
                interpreter,
                flag,
                line: line.to_string(),
            });
        }
        Some(Self::Direct {
            program,
            args: words,
        })
    }

    /// Build the [`Command`], resolving the program on `PATH` when possible.
    ///
    /// `file` becomes the last argument of the linter.
    #[must_use]
    pub fn to_command(&self, file: Option<&Path>) -> Command {
        match self {
            Self::Direct { program, args } => {
                let resolved = which::which(program).unwrap_or_else(|_| PathBuf::from(program));
                let mut cmd = Command::new(resolved);
                cmd.args(args);
                if let Some(file) = file {
                    cmd.arg(file);
                }
                cmd
            }
            Self::Interpreter {
                interpreter,
                flag,
                line,
            } => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(flag);
                #[cfg(windows)]
                {
                    use std::os::windows::process::CommandExt;
                    // cmd.exe strips one pair of outer quotes from /c input.
                    match file {
                        Some(file) => {
                            cmd.env(FILE_ARG_VAR, file);
                            cmd.raw_arg(format!("\"{line} \"%{FILE_ARG_VAR}%\"\""));
                        }
                        None => {
                            cmd.raw_arg(format!("\"{line}\""));
                        }
                    }
                }
                #[cfg(not(windows))]
                match file {
                    // `sh -c <script> <$0> <$1>`
                    Some(file) => {
                        cmd.arg(format!("{line} \"$1\"")).arg(interpreter).arg(file);
                    }
                    None => {
                        cmd.arg(line);
                    }
                }
                cmd
            }
        }
    }
}

fn script_interpreter(program: &Path) -> Option<(&'static str, &'static str)> {
    let ext = program.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "bat" | "cmd" if cfg!(windows) => Some(("cmd", "/c")),
        "sh" => Some(("sh", "-c")),
        _ => None,
    }
}

/// Split a command line into words.
///
/// Whitespace separates words, double quotes group (and are removed), and
/// `\"` is a literal quote. Other backslashes are kept so Windows paths
/// survive unchanged.
#[must_use]
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
                in_word = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                in_word = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

/// Quote a path for showing it appended to a command line.
#[must_use]
pub fn quote_arg(arg: &str) -> String {
    format!("\"{}\"", arg.replace('"', "\\\""))
}
