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

//! Signal-aware system interface.
//!
//! The shell may block in exactly three places: `read`, `write` and `wait`.
//! The wrappers here install no retry loop around those calls; the signal
//! handlers are registered without `SA_RESTART`, so a delivered signal makes
//! the call fail with `EINTR` and the caller's deferred signal check
//! ([`Env::sigchk`](crate::Env::sigchk)) turns the pending signal into a
//! shell-level interrupt. The handler itself only stores the signal number
//! into an atomic slot.

use nix::errno::Errno;
use nix::sys::signal::SaFlags;
use nix::sys::signal::SigAction;
use nix::sys::signal::SigHandler;
use nix::sys::signal::SigSet;
use nix::sys::signal::Signal;
use nix::sys::termios::tcgetattr;
use nix::sys::termios::tcsetattr;
use nix::sys::termios::SetArg;
use nix::sys::termios::Termios;
use nix::sys::wait::WaitStatus;
use nix::unistd::ForkResult;
use nix::unistd::Gid;
use nix::unistd::Pid;
use nix::unistd::Uid;
use std::os::raw::c_int;
use std::os::unix::io::RawFd;
use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering;

/// Most recently caught, not yet inspected signal number. 0 when none.
static PENDING_SIGNAL: AtomicI32 = AtomicI32::new(0);

/// Signal catching function.
///
/// Only stores the signal number; everything else is deferred to the next
/// [`take_pending_signal`] call.
extern "C" fn catch_signal(signal: c_int) {
    PENDING_SIGNAL.store(signal, Ordering::Relaxed);
}

/// Takes the pending signal, if any, clearing the slot.
pub fn take_pending_signal() -> Option<Signal> {
    let number = PENDING_SIGNAL.swap(0, Ordering::Relaxed);
    if number == 0 {
        return None;
    }
    Signal::try_from(number).ok()
}

/// Signals the shell catches instead of dying from.
///
/// `SIGINT` is always caught so that a slow call can be aborted; the others
/// only when the shell is interactive.
fn caught_signals(interactive: bool) -> &'static [Signal] {
    if interactive {
        &[Signal::SIGINT, Signal::SIGQUIT, Signal::SIGTERM]
    } else {
        &[Signal::SIGINT]
    }
}

fn set_handler(signal: Signal, handler: SigHandler) {
    // No SA_RESTART: a caught signal must abort a blocking call.
    let action = SigAction::new(handler, SaFlags::empty(), SigSet::empty());
    // SAFETY: catch_signal only touches an atomic.
    unsafe {
        nix::sys::signal::sigaction(signal, &action).ok();
    }
}

/// Installs the shell's signal handlers.
pub fn install_signal_handlers(interactive: bool) {
    for &signal in caught_signals(interactive) {
        set_handler(signal, SigHandler::Handler(catch_signal));
    }
}

/// Restores default signal dispositions in a forked child.
pub fn restore_default_signals() {
    for &signal in caught_signals(true) {
        set_handler(signal, SigHandler::SigDfl);
    }
}

/// Reads from a file descriptor, once.
///
/// An `EINTR` failure means a signal arrived during the call; run the
/// deferred signal check before retrying.
pub fn read(fd: RawFd, buffer: &mut [u8]) -> nix::Result<usize> {
    nix::unistd::read(fd, buffer)
}

/// Writes a whole buffer to a file descriptor.
///
/// Loops over short writes; an error aborts silently, including the `EINTR`
/// left by a caught signal. The caller runs the deferred signal check.
pub fn write_all(fd: RawFd, mut buffer: &[u8]) {
    while !buffer.is_empty() {
        match nix::unistd::write(fd, buffer) {
            Ok(0) | Err(_) => break,
            Ok(count) => buffer = &buffer[count..],
        }
    }
}

/// Waits for a specific child.
///
/// When `interruptible`, an `EINTR` failure is reported to the caller;
/// otherwise the wait is retried until the child terminates.
pub fn wait_pid(pid: Pid, interruptible: bool) -> nix::Result<WaitStatus> {
    loop {
        match nix::sys::wait::waitpid(pid, None) {
            Err(Errno::EINTR) if !interruptible => continue,
            other => return other,
        }
    }
}

/// Waits for any child.
pub fn wait_any() -> nix::Result<WaitStatus> {
    nix::sys::wait::wait()
}

/// Creates a child process.
pub fn fork() -> nix::Result<ForkResult> {
    // SAFETY: the shell is single-threaded; the child only runs
    // async-signal-safe code until it execs or exits.
    unsafe { nix::unistd::fork() }
}

/// Snapshots the terminal attributes of standard input.
#[must_use]
pub fn save_terminal() -> Option<Termios> {
    tcgetattr(0).ok()
}

/// Restores previously saved terminal attributes.
///
/// Used after a signalled child may have left the terminal in a raw state.
pub fn restore_terminal(saved: &Termios) {
    tcsetattr(0, SetArg::TCSANOW, saved).ok();
}

/// Identity the executability probe tests file modes against.
#[derive(Clone, Debug)]
pub struct AccessProfile {
    pub uid: Uid,
    pub gid: Gid,
    pub groups: Vec<Gid>,
}

impl AccessProfile {
    /// Captures the effective user, effective group and the supplementary
    /// group list of this process.
    #[must_use]
    pub fn current() -> Self {
        AccessProfile {
            uid: Uid::effective(),
            gid: Gid::effective(),
            groups: nix::unistd::getgroups().unwrap_or_default(),
        }
    }

    /// Whether `gid` is the effective group or in the supplementary list.
    #[must_use]
    pub fn in_groups(&self, gid: Gid) -> bool {
        self.gid == gid || self.groups.contains(&gid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // This test depends on the process-wide pending-signal slot, so it
    // exercises the whole protocol in one go.
    #[test]
    fn pending_signal_slot() {
        catch_signal(Signal::SIGINT as c_int);
        assert_eq!(take_pending_signal(), Some(Signal::SIGINT));
        assert_eq!(take_pending_signal(), None);

        catch_signal(Signal::SIGQUIT as c_int);
        catch_signal(Signal::SIGTERM as c_int);
        assert_eq!(take_pending_signal(), Some(Signal::SIGTERM));
        assert_eq!(take_pending_signal(), None);
    }

    #[test]
    fn access_profile_includes_effective_ids() {
        let profile = AccessProfile::current();
        assert_eq!(profile.uid, Uid::effective());
        assert!(profile.in_groups(profile.gid));
    }
}
