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

//! Built-in commands.
//!
//! Builtins report failures through `$status` and return `Continue`; only
//! `exit` diverts. The `exec` and `builtin` entries are prefix markers the
//! dispatcher recognizes by name and unwinds itself; their bodies only run
//! when the prefix was used incorrectly.

use nix::errno::Errno;
use nix::sys::stat::{umask, Mode};
use rcsh_env::io;
use rcsh_env::semantics::Divert;
use rcsh_env::semantics::Result;
use rcsh_env::system;
use rcsh_env::Env;
use std::ops::ControlFlow::{Break, Continue};

/// Entry point of a builtin body.
pub type Main = fn(&mut Env, &[String]) -> Result;

/// A builtin command.
#[derive(Clone, Copy, Debug)]
pub struct Builtin {
    pub name: &'static str,
    pub main: Main,
}

static BUILTINS: &[Builtin] = &[
    Builtin { name: "builtin", main: b_builtin },
    Builtin { name: "cd", main: b_cd },
    Builtin { name: "echo", main: b_echo },
    Builtin { name: "exec", main: b_exec },
    Builtin { name: "exit", main: b_exit },
    Builtin { name: "umask", main: b_umask },
    Builtin { name: "wait", main: b_wait },
];

/// Looks a builtin up by name.
#[must_use]
pub fn find(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

/// `exec` is handled entirely by the dispatcher; a stray invocation of the
/// body is a no-op.
fn b_exec(_env: &mut Env, _args: &[String]) -> Result {
    Continue(())
}

/// The body only runs when `builtin` did not end up prefixing a command,
/// i.e. `builtin builtin …`: the prefix applies to exactly one resolution
/// and does not stack.
fn b_builtin(env: &mut Env, _args: &[String]) -> Result {
    io::note("builtin does not stack");
    env.set_status_bool(false)
}

fn b_cd(env: &mut Env, args: &[String]) -> Result {
    let target = match args.len() {
        1 => match env.var("home").and_then(|home| home.first()) {
            Some(home) => home.clone(),
            None => {
                io::note("can't cd -- no home directory");
                return env.set_status_bool(false);
            }
        },
        2 => args[1].clone(),
        _ => {
            io::note("too many arguments to cd");
            return env.set_status_bool(false);
        }
    };
    match nix::unistd::chdir(target.as_str()) {
        Ok(()) => env.set_status_bool(true),
        Err(_) => {
            io::note(&format!("couldn't cd to {}", io::protect(&target)));
            env.set_status_bool(false)
        }
    }
}

fn b_echo(env: &mut Env, args: &[String]) -> Result {
    let mut rest = &args[1..];
    let mut newline = true;
    match rest.first().map(String::as_str) {
        Some("-n") => {
            newline = false;
            rest = &rest[1..];
        }
        Some("--") => rest = &rest[1..],
        _ => {}
    }
    let mut out = rest.join(" ");
    if newline {
        out.push('\n');
    }
    system::write_all(1, out.as_bytes());
    env.set_status_bool(true)
}

fn b_exit(env: &mut Env, args: &[String]) -> Result {
    if args.len() > 1 {
        env.set_status_from_strings(&args[1..]);
    }
    Break(Divert::Exit(None))
}

fn b_umask(env: &mut Env, args: &[String]) -> Result {
    match args.len() {
        1 => {
            let current = umask(Mode::empty());
            umask(current);
            let line = format!("{:03o}\n", current.bits());
            system::write_all(1, line.as_bytes());
            env.set_status_bool(true)
        }
        2 => match parse_octal(&args[1]) {
            Some(mask) => {
                umask(Mode::from_bits_truncate(mask));
                env.set_status_bool(true)
            }
            None => {
                io::note("bad umask");
                env.set_status_bool(false)
            }
        },
        _ => {
            io::note("too many arguments to umask");
            env.set_status_bool(false)
        }
    }
}

fn parse_octal(s: &str) -> Option<nix::sys::stat::mode_t> {
    if s.is_empty() || !s.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return None;
    }
    let value = u32::from_str_radix(s, 8).ok()?;
    if value > 0o777 {
        return None;
    }
    Some(value as nix::sys::stat::mode_t)
}

/// Waits for the named children, or for every child when none are named.
///
/// Successfully reaped process IDs are removed from `$apids`.
fn b_wait(env: &mut Env, args: &[String]) -> Result {
    if args.len() > 1 {
        env.set_wait_status(&args[1..], "wait")?;
        for pid in &args[1..] {
            remove_apid(env, pid);
        }
        return env.sigchk();
    }

    let mut reaped_any = false;
    loop {
        match system::wait_any() {
            Ok(wait_status) => {
                if let Some(pid) = wait_status.pid() {
                    env.set_status(Some(pid), wait_status.into())?;
                    remove_apid(env, &pid.to_string());
                    reaped_any = true;
                }
                env.sigchk()?;
            }
            Err(Errno::ECHILD) => {
                if !reaped_any {
                    env.set_status_bool(true)?;
                }
                return Continue(());
            }
            Err(_) => {
                env.set_status_bool(false)?;
                return env.sigchk();
            }
        }
    }
}

/// Drops one process ID from the `$apids` list.
fn remove_apid(env: &mut Env, pid: &str) {
    let Some(apids) = env.var("apids") else { return };
    if !apids.iter().any(|p| p == pid) {
        return;
    }
    let remaining: Vec<String> = apids.iter().filter(|p| *p != pid).cloned().collect();
    env.set_var("apids", remaining, false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcsh_env::option::OptionSet;

    fn env() -> Env {
        Env::new(OptionSet::new())
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn known_builtins_are_found() {
        for name in ["builtin", "cd", "echo", "exec", "exit", "umask", "wait"] {
            assert_eq!(find(name).map(|b| b.name), Some(name));
        }
        assert!(find("ls").is_none());
    }

    #[test]
    fn exit_diverts_with_the_parsed_status() {
        let mut env = env();
        assert_eq!(b_exit(&mut env, &args(&["exit", "3"])), Break(Divert::Exit(None)));
        assert_eq!(env.get_status(), 3);

        // A name that is neither numeric nor a signal exits 1.
        assert_eq!(b_exit(&mut env, &args(&["exit", "whatever"])), Break(Divert::Exit(None)));
        assert_eq!(env.get_status(), 1);

        let _ = env.set_status_bool(true);
        assert_eq!(b_exit(&mut env, &args(&["exit"])), Break(Divert::Exit(None)));
        assert_eq!(env.get_status(), 0);
    }

    #[test]
    fn cd_reports_failure_in_status() {
        let mut env = env();
        let result = b_cd(&mut env, &args(&["cd", "/no/such/directory/here"]));
        assert_eq!(result, Continue(()));
        assert_eq!(env.get_status(), 1);
    }

    #[test]
    fn cd_without_home_fails() {
        let mut env = env();
        assert_eq!(b_cd(&mut env, &args(&["cd"])), Continue(()));
        assert_eq!(env.get_status(), 1);
    }

    #[test]
    fn stacked_builtin_prefix_is_an_error() {
        let mut env = env();
        assert_eq!(b_builtin(&mut env, &args(&["builtin", "echo"])), Continue(()));
        assert_eq!(env.get_status(), 1);
    }

    #[test]
    fn wait_with_bad_pid_keeps_going() {
        let mut env = env();
        let result = b_wait(&mut env, &args(&["wait", "notapid"]));
        assert_eq!(result, Continue(()));
        assert_eq!(env.get_status(), 1);
    }

    #[test]
    fn remove_apid_filters_the_list() {
        let mut env = env();
        env.set_var("apids", args(&["10", "20", "30"]), false);
        remove_apid(&mut env, "20");
        assert_eq!(env.var("apids"), Some(&args(&["10", "30"])[..]));
        remove_apid(&mut env, "99");
        assert_eq!(env.var("apids"), Some(&args(&["10", "30"])[..]));
    }
}
