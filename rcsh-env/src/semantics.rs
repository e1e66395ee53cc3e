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

//! Type definitions for command execution.
//!
//! This module defines the result type of every operation that can divert the
//! shell's control flow, and the per-pipeline-member [`Status`] value that the
//! status model is built from.

use crate::redir::Redir;
use nix::sys::wait::WaitStatus;
use std::ops::ControlFlow;

/// Wait status of one pipeline member.
///
/// A `Status` is a decoded `wait(2)` value. Unlike the raw integer encoding,
/// "no result" is a distinct variant rather than a magic bit pattern; it
/// behaves like an exit status of 1 wherever an integer or string form is
/// needed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    /// The process exited normally with the given code.
    Exited(i32),
    /// The process was terminated by a signal.
    Signaled {
        /// Raw signal number, which may name a signal unknown to the shell.
        signal: i32,
        /// Whether the process dumped core.
        core: bool,
    },
    /// No wait result was obtained for this member.
    NoResult,
}

impl Status {
    /// Whether this status counts as true (a normal exit with code 0).
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Exited(0))
    }

    /// Collapses this status to a single exit code.
    ///
    /// A signalled or absent status becomes 1; a normal exit yields its code.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Status::Exited(code) => *code,
            Status::Signaled { .. } | Status::NoResult => 1,
        }
    }
}

/// Decodes the result of a `wait` call.
///
/// Anything that is not a termination report (e.g. a stop notification)
/// decodes to [`Status::NoResult`].
impl From<WaitStatus> for Status {
    fn from(status: WaitStatus) -> Status {
        match status {
            WaitStatus::Exited(_, code) => Status::Exited(code),
            WaitStatus::Signaled(_, signal, core) => Status::Signaled {
                signal: signal as i32,
                core,
            },
            _ => Status::NoResult,
        }
    }
}

/// Result of interrupted command execution.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Divert {
    /// Abort the current command and return to the nearest reader loop.
    ///
    /// In an interactive shell this resumes prompting; otherwise, or when a
    /// successful `exec` has doomed the shell, it terminates the process.
    Interrupt,

    /// Exit from the shell.
    ///
    /// `None` means "exit with the current `$status`".
    Exit(Option<i32>),
}

/// Result of command execution.
///
/// A `Break` value carries a [`Divert`] specifying what to execute next.
pub type Result<T = ()> = ControlFlow<Divert, T>;

/// Entry point of the command reader, used to run a function body.
///
/// The dispatcher resolves function calls but does not interpret command
/// text itself; the reader installs this hook into
/// [`Env::interpreter`](crate::Env::interpreter) at startup.
pub type Interpreter = fn(&mut crate::Env, &str) -> Result;

/// One simple command as produced by the reader.
///
/// The word list has already been expanded; the redirections are applied by
/// the dispatcher in queue order before the command runs.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Command {
    /// Expanded command words. May be empty for a bare redirection.
    pub words: Vec<String>,
    /// Redirections staged for this command.
    pub redirs: Vec<Redir>,
    /// Variable assignments local to this command, pushed onto the variable
    /// stack for the duration of the command.
    pub locals: Vec<(String, Vec<String>)>,
}

/// One pipeline as produced by the reader.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Pipeline {
    /// Pipeline members, leftmost first. Never empty.
    pub commands: Vec<Command>,
    /// Whether the pipeline runs in the background (`&`).
    pub background: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use nix::sys::signal::Signal;
    use nix::unistd::Pid;

    #[test]
    fn status_from_wait_status() {
        let pid = Pid::from_raw(42);
        assert_eq!(Status::from(WaitStatus::Exited(pid, 3)), Status::Exited(3));
        assert_matches!(
            Status::from(WaitStatus::Signaled(pid, Signal::SIGQUIT, true)),
            Status::Signaled { signal, core: true } => {
                assert_eq!(signal, Signal::SIGQUIT as i32);
            }
        );
        assert_eq!(Status::from(WaitStatus::StillAlive), Status::NoResult);
    }

    #[test]
    fn status_code_collapses_signals_and_no_result() {
        assert_eq!(Status::Exited(0).code(), 0);
        assert_eq!(Status::Exited(42).code(), 42);
        assert_eq!(Status::Signaled { signal: 2, core: false }.code(), 1);
        assert_eq!(Status::NoResult.code(), 1);
    }

    #[test]
    fn only_zero_exit_is_success() {
        assert!(Status::Exited(0).is_success());
        assert!(!Status::Exited(1).is_success());
        assert!(!Status::Signaled { signal: 9, core: false }.is_success());
        assert!(!Status::NoResult.is_success());
    }
}
