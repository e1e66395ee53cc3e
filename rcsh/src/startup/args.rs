// This file is part of rcsh, a Plan 9-style command shell for Unix.
// Copyright (C) 2024 rcsh contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Command line argument parser for the shell.

use rcsh_env::option::parse_short;
use rcsh_env::option::Option as ShellOption;
use rcsh_env::option::OptionSet;
use thiserror::Error;

/// Result of command line parsing.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Invocation {
    /// Options set by flags (and by a leading `-` in the invocation name,
    /// which means a login shell).
    pub options: OptionSet,
    /// The command string of `-c`.
    pub command: Option<String>,
    /// Name the shell was invoked as; stays `$0` even with `-c`.
    pub arg0: String,
    /// Script file operand, when neither `-c` nor `-s` consumed the
    /// operands.
    pub script: Option<String>,
    /// Positional parameters `$1`…
    pub params: Vec<String>,
}

/// Error in command line parsing.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    /// Flag letter that is not a shell option.
    #[error("bad option: -{0}")]
    BadOption(char),

    /// Option that is missing its argument.
    #[error("option requires an argument -- {0}")]
    MissingArgument(char),
}

/// Parses command line arguments, getopt style.
///
/// Flags combine freely (`-ex`); `-c` takes the rest of its cluster or the
/// next argument as the command string. A `-` or `--` argument ends flag
/// parsing. With `-c`, every operand becomes a positional parameter;
/// otherwise the first operand names a script and the rest are its
/// parameters.
pub fn parse<I, S>(args: I) -> Result<Invocation, Error>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut args = args.into_iter().map(Into::into).peekable();
    let mut result = Invocation::default();

    result.arg0 = args.next().unwrap_or_else(|| "rc".to_owned());
    if result.arg0.starts_with('-') {
        result.options.insert(ShellOption::Login);
    }

    while let Some(arg) = args.peek() {
        if arg == "-" || arg == "--" {
            args.next();
            break;
        }
        if !arg.starts_with('-') {
            break;
        }
        let arg = args.next().unwrap();
        let mut letters = arg[1..].chars();
        while let Some(letter) = letters.next() {
            if letter == 'c' {
                result.options.insert(ShellOption::CmdLine);
                let tail = letters.as_str();
                let command = if tail.is_empty() {
                    args.next().ok_or(Error::MissingArgument('c'))?
                } else {
                    tail.to_owned()
                };
                result.command = Some(command);
                break;
            }
            match parse_short(letter) {
                Some(option) => result.options.insert(option),
                None => return Err(Error::BadOption(letter)),
            };
        }
    }

    let mut operands = args;
    if result.command.is_none() && !result.options.contains(ShellOption::Stdin) {
        result.script = operands.next();
    }
    result.params = operands.collect();

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(args: &[&str]) -> Invocation {
        parse(args.iter().copied()).unwrap()
    }

    #[test]
    fn flags_combine_in_one_cluster() {
        let result = parse_ok(&["rc", "-ex"]);
        assert!(result.options.contains(ShellOption::ErrExit));
        assert!(result.options.contains(ShellOption::XTrace));
        assert_eq!(result.command, None);
        assert_eq!(result.script, None);
    }

    #[test]
    fn command_string_takes_the_next_argument() {
        let result = parse_ok(&["rc", "-c", "echo hi"]);
        assert!(result.options.contains(ShellOption::CmdLine));
        assert_eq!(result.command.as_deref(), Some("echo hi"));
    }

    #[test]
    fn command_string_may_share_its_cluster() {
        let result = parse_ok(&["rc", "-ec", "echo hi"]);
        assert!(result.options.contains(ShellOption::ErrExit));
        assert_eq!(result.command.as_deref(), Some("echo hi"));

        let result = parse_ok(&["rc", "-cecho hi"]);
        assert_eq!(result.command.as_deref(), Some("echo hi"));
    }

    #[test]
    fn operands_after_c_are_positional_parameters() {
        // rc deviates from POSIX sh here: $0 stays the shell name and all
        // operands become $1…$n.
        let result = parse_ok(&["rc", "-c", "echo $2", "a", "b", "c"]);
        assert_eq!(result.arg0, "rc");
        assert_eq!(result.script, None);
        assert_eq!(result.params, ["a", "b", "c"]);
    }

    #[test]
    fn first_operand_names_a_script_otherwise() {
        let result = parse_ok(&["rc", "build.rc", "target"]);
        assert_eq!(result.script.as_deref(), Some("build.rc"));
        assert_eq!(result.params, ["target"]);
    }

    #[test]
    fn stdin_option_keeps_operands_as_parameters() {
        let result = parse_ok(&["rc", "-s", "a", "b"]);
        assert!(result.options.contains(ShellOption::Stdin));
        assert_eq!(result.script, None);
        assert_eq!(result.params, ["a", "b"]);
    }

    #[test]
    fn leading_dash_in_arg0_means_login() {
        assert!(parse_ok(&["-rc"]).options.contains(ShellOption::Login));
        assert!(!parse_ok(&["rc"]).options.contains(ShellOption::Login));
    }

    #[test]
    fn double_dash_ends_flag_parsing() {
        let result = parse_ok(&["rc", "-e", "--", "-x"]);
        assert!(result.options.contains(ShellOption::ErrExit));
        assert!(!result.options.contains(ShellOption::XTrace));
        assert_eq!(result.script.as_deref(), Some("-x"));
    }

    #[test]
    fn unknown_flags_are_reported_with_their_letter() {
        assert_eq!(parse(["rc", "-q"]), Err(Error::BadOption('q')));
        assert_eq!(
            parse(["rc", "-q"]).unwrap_err().to_string(),
            "bad option: -q"
        );
    }

    #[test]
    fn missing_command_string_is_reported() {
        assert_eq!(parse(["rc", "-c"]), Err(Error::MissingArgument('c')));
        assert_eq!(
            parse(["rc", "-c"]).unwrap_err().to_string(),
            "option requires an argument -- c"
        );
    }
}
