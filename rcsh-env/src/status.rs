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

//! The status model.
//!
//! `$status` is the wait status vector of the last pipeline: one
//! [`Status`] per member. It is exposed three ways: as a truth value
//! ([`Env::istrue`]), as a single integer ([`Env::get_status`]), and as a
//! list of strings ([`Env::status_list`]). Storing a status may print a
//! report line and, under `-e`, exit the shell.

use crate::io;
use crate::option::Option as ShellOption;
use crate::semantics::Divert;
use crate::semantics::Result;
use crate::semantics::Status;
use crate::signal;
use crate::system;
use crate::Env;
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use std::ops::ControlFlow::{Break, Continue};

/// Upper bound on the number of statuses one pipeline can carry.
pub const MAX_PIPELINE: usize = 512;

impl Env {
    /// Whether the last pipeline was entirely successful.
    ///
    /// True if and only if every member exited with status zero.
    #[must_use]
    pub fn istrue(&self) -> bool {
        self.statuses.iter().all(Status::is_success)
    }

    /// Collapses `$status` to a single integer.
    ///
    /// For a pipeline this is 1 when any member failed, else 0. For a single
    /// command it is the exit code, with a signalled or absent status
    /// collapsed to 1.
    #[must_use]
    pub fn get_status(&self) -> i32 {
        if self.statuses.len() > 1 {
            return i32::from(!self.istrue());
        }
        self.statuses[0].code()
    }

    /// Stores a single-command status and prints a report if appropriate.
    ///
    /// `pid` is given only by the `wait` builtin, whose reports carry the
    /// process ID. Under `-e` a failed status exits the shell, unless
    /// execution is inside a condition.
    pub fn set_status(&mut self, pid: Option<Pid>, status: Status) -> Result {
        self.statuses.clear();
        self.statuses.push(status);
        self.print_status(pid, status)
    }

    /// Stores a plain true or false status.
    ///
    /// False is the "no result" status, which reads back as exit 1.
    pub fn set_status_bool(&mut self, success: bool) -> Result {
        let status = if success { Status::Exited(0) } else { Status::NoResult };
        self.set_status(None, status)
    }

    /// Stores the statuses of a whole pipeline, in member order, printing a
    /// report for each member as appropriate.
    pub fn set_pipe_status(&mut self, statuses: Vec<Status>) -> Result {
        debug_assert!(!statuses.is_empty());
        self.statuses = statuses;
        for i in 0..self.statuses.len() {
            self.print_status(None, self.statuses[i])?;
        }
        Continue(())
    }

    /// The `wait` builtin: waits for each named process and stores their
    /// statuses.
    ///
    /// Statuses are stored in reverse order of the argument list so that
    /// left-to-right arguments correspond to pipe member indices
    /// right-to-left. An unparsable argument stores "no result" and moves
    /// on; an interrupted wait stores a false status and returns early.
    pub fn set_wait_status(&mut self, args: &[String], cmd: &str) -> Result {
        if args.len() >= MAX_PIPELINE {
            io::note(&format!("too many arguments to {cmd}"));
            return self.set_status_bool(false);
        }

        let mut statuses = vec![Status::NoResult; args.len()];
        for (i, arg) in args.iter().enumerate() {
            let slot = args.len() - i - 1;
            let Some(pid) = parse_pid(arg) else {
                io::note(&format!("`{}' is a bad number", io::protect(arg)));
                continue;
            };
            match system::wait_pid(pid, true) {
                Ok(wait_status) => {
                    statuses[slot] = Status::from(wait_status);
                    self.print_status(Some(pid), statuses[slot])?;
                }
                Err(Errno::EINTR) => return self.set_status_bool(false),
                Err(_) => {}
            }
            self.sigchk()?;
        }
        if !statuses.is_empty() {
            self.statuses = statuses;
        }
        Continue(())
    }

    /// Renders `$status` as a list of strings, one per pipeline member, in
    /// the order stored.
    ///
    /// Each element is a decimal exit code, a signal name with an optional
    /// `+core` suffix, or `-N[+core]` for a signal outside the known table.
    #[must_use]
    pub fn status_list(&self) -> Vec<String> {
        self.statuses.iter().map(str_status).collect()
    }

    /// Sets `$status` from its string form, the reverse of
    /// [`status_list`](Self::status_list).
    ///
    /// Decimal strings become exit codes, known signal names (with optional
    /// `+core`) become signalled statuses, and anything else is accepted as
    /// exit 1 for cross-shell compatibility.
    pub fn set_status_from_strings(&mut self, args: &[String]) {
        if args.is_empty() {
            return;
        }
        let mut statuses = vec![Status::NoResult; args.len()];
        for (i, arg) in args.iter().enumerate() {
            statuses[args.len() - i - 1] = parse_status(arg);
        }
        self.statuses = statuses;
    }

    /// Runs the deferred signal check.
    ///
    /// If a signal has been caught since the last check, `$status` becomes
    /// the signalled form and execution unwinds to the reader loop.
    pub fn sigchk(&mut self) -> Result {
        match system::take_pending_signal() {
            Some(sig) => {
                self.statuses = vec![Status::Signaled { signal: sig as i32, core: false }];
                Break(Divert::Interrupt)
            }
            None => Continue(()),
        }
    }

    /// Prints a status report when called from the `wait` builtin in an
    /// interactive shell, or when a child was terminated by a noteworthy
    /// signal. Applies the `-e` discipline afterwards.
    fn print_status(&self, pid: Option<Pid>, status: Status) -> Result {
        let (signo, core) = match status {
            Status::Signaled { signal, core } => (signal, core),
            _ => (0, false),
        };
        let noteworthy = signo > 0
            && (core || (signo != Signal::SIGINT as i32 && signo != Signal::SIGPIPE as i32));
        if (self.interactive() && pid.is_some()) || noteworthy {
            let mut line = String::new();
            if let Some(pid) = pid {
                line.push_str(&format!("{pid}: "));
            }
            if signo == 0 {
                line.push_str(&format!("done ({})", status.code()));
            } else {
                match signal::lookup_number(signo) {
                    Some(entry) => line.push_str(entry.message),
                    None => line.push_str(&format!("unknown signal {signo}")),
                }
                if core {
                    line.push_str("--core dumped");
                }
            }
            line.push('\n');
            system::write_all(2, line.as_bytes());
        }

        if !status.is_success()
            && self.options.contains(ShellOption::ErrExit)
            && !self.in_condition
        {
            return Break(Divert::Exit(None));
        }
        Continue(())
    }
}

/// Parses an unsigned decimal process ID.
fn parse_pid(s: &str) -> Option<Pid> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<i32>().ok().map(Pid::from_raw)
}

/// Parses one `$status` element string.
fn parse_status(s: &str) -> Status {
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(code) = s.parse::<i32>() {
            return Status::Exited(code & 0xFF);
        }
    }
    let (name, core) = match s.strip_suffix("+core") {
        Some(name) => (name, true),
        None => (s, false),
    };
    if let Some(entry) = signal::lookup_name(name) {
        return Status::Signaled { signal: entry.signal as i32, core };
    }
    // Arbitrary strings are accepted for Plan 9 rc compatibility.
    Status::Exited(1)
}

/// Renders one status element as a string.
fn str_status(status: &Status) -> String {
    match *status {
        Status::Exited(code) => code.to_string(),
        Status::NoResult => "1".to_string(),
        Status::Signaled { signal: signo, core } => {
            let suffix = if core { "+core" } else { "" };
            match signal::lookup_number(signo) {
                Some(entry) => format!("{}{}", entry.name, suffix),
                // Unknown signals are negated.
                None => format!("-{signo}{suffix}"),
            }
        }
    }
}
