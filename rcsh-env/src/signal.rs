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

//! Signal names and messages.
//!
//! The shell spells signals the rc way: `$status` elements use the lowercase
//! name (`sigint`, `sigsegv+core`), and status reports on the terminal use
//! the human message (`interrupt`, `segmentation violation`). Signals outside
//! this table are rendered numerically.

use nix::sys::signal::Signal;

/// One known signal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SignalEntry {
    pub signal: Signal,
    /// Name as it appears in `$status`.
    pub name: &'static str,
    /// Message printed when a child is terminated by this signal.
    pub message: &'static str,
}

/// Signals known to the shell.
pub const SIGNALS: &[SignalEntry] = &[
    SignalEntry { signal: Signal::SIGHUP, name: "sighup", message: "hangup" },
    SignalEntry { signal: Signal::SIGINT, name: "sigint", message: "interrupt" },
    SignalEntry { signal: Signal::SIGQUIT, name: "sigquit", message: "quit" },
    SignalEntry { signal: Signal::SIGILL, name: "sigill", message: "illegal instruction" },
    SignalEntry { signal: Signal::SIGTRAP, name: "sigtrap", message: "trace trap" },
    SignalEntry { signal: Signal::SIGABRT, name: "sigabrt", message: "abort" },
    SignalEntry { signal: Signal::SIGBUS, name: "sigbus", message: "bus error" },
    SignalEntry { signal: Signal::SIGFPE, name: "sigfpe", message: "floating point exception" },
    SignalEntry { signal: Signal::SIGKILL, name: "sigkill", message: "killed" },
    SignalEntry { signal: Signal::SIGUSR1, name: "sigusr1", message: "user signal 1" },
    SignalEntry { signal: Signal::SIGSEGV, name: "sigsegv", message: "segmentation violation" },
    SignalEntry { signal: Signal::SIGUSR2, name: "sigusr2", message: "user signal 2" },
    SignalEntry { signal: Signal::SIGPIPE, name: "sigpipe", message: "broken pipe" },
    SignalEntry { signal: Signal::SIGALRM, name: "sigalrm", message: "alarm clock" },
    SignalEntry { signal: Signal::SIGTERM, name: "sigterm", message: "terminated" },
    SignalEntry { signal: Signal::SIGCHLD, name: "sigchld", message: "child stopped or exited" },
    SignalEntry { signal: Signal::SIGCONT, name: "sigcont", message: "continued" },
    SignalEntry { signal: Signal::SIGSTOP, name: "sigstop", message: "stopped (signal)" },
    SignalEntry { signal: Signal::SIGTSTP, name: "sigtstp", message: "stopped" },
    SignalEntry { signal: Signal::SIGTTIN, name: "sigttin", message: "background tty read" },
    SignalEntry { signal: Signal::SIGTTOU, name: "sigttou", message: "background tty write" },
    SignalEntry { signal: Signal::SIGURG, name: "sigurg", message: "urgent condition on i/o channel" },
    SignalEntry { signal: Signal::SIGXCPU, name: "sigxcpu", message: "cpu time limit exceeded" },
    SignalEntry { signal: Signal::SIGXFSZ, name: "sigxfsz", message: "file size limit exceeded" },
    SignalEntry { signal: Signal::SIGVTALRM, name: "sigvtalrm", message: "virtual time alarm" },
    SignalEntry { signal: Signal::SIGPROF, name: "sigprof", message: "profiling time alarm" },
    SignalEntry { signal: Signal::SIGWINCH, name: "sigwinch", message: "window size changed" },
    SignalEntry { signal: Signal::SIGSYS, name: "sigsys", message: "bad argument to system call" },
];

/// Finds a known signal by raw number.
#[must_use]
pub fn lookup_number(number: i32) -> Option<&'static SignalEntry> {
    SIGNALS.iter().find(|entry| entry.signal as i32 == number)
}

/// Finds a known signal by its `$status` name.
#[must_use]
pub fn lookup_name(name: &str) -> Option<&'static SignalEntry> {
    SIGNALS.iter().find(|entry| entry.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_number_and_name_agree() {
        let by_number = lookup_number(Signal::SIGINT as i32).unwrap();
        let by_name = lookup_name("sigint").unwrap();
        assert_eq!(by_number.signal, by_name.signal);
        assert_eq!(by_number.message, "interrupt");
    }

    #[test]
    fn unknown_signals_are_absent() {
        assert_eq!(lookup_number(0), None);
        assert_eq!(lookup_number(101), None);
        assert_eq!(lookup_name("sigbogus"), None);
    }

    #[test]
    fn names_match_the_signal_constants() {
        for entry in SIGNALS {
            assert_eq!(entry.name, entry.signal.as_str().to_lowercase());
        }
    }
}
