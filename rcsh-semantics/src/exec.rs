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

//! The execution dispatcher.
//!
//! [`exec`] takes an argument list and does the appropriate thing: calls a
//! builtin, calls a function, or runs an external command. It unwinds the
//! `exec` and `builtin` prefixes, decides whether to fork, applies the
//! staged redirections, reaps the child and stores its status, and keeps the
//! command path cache honest when an external command fails.

use crate::builtin;
use crate::builtin::Builtin;
use crate::command_search::is_absolute;
use crate::command_search::verify_cmd;
use crate::command_search::which;
use crate::execve::rc_execve;
use crate::redir::apply_redirs;
use itertools::Itertools;
use nix::sys::termios::Termios;
use nix::unistd::ForkResult;
use nix::unistd::Pid;
use rcsh_env::io;
use rcsh_env::option::Option as ShellOption;
use rcsh_env::semantics::Divert;
use rcsh_env::semantics::Result;
use rcsh_env::semantics::Status;
use rcsh_env::system;
use rcsh_env::Env;
use std::ffi::CString;
use std::ops::ControlFlow::{Break, Continue};
use std::process;
use std::rc::Rc;

/// What a command name resolved to.
enum Resolution {
    /// No builtin or function applies; the name (if any) is external.
    External,
    /// A call of the named function; the body is cloned out of the table so
    /// the call may redefine it.
    Function(Rc<str>),
    Builtin(&'static Builtin),
}

/// Raises a shell-level error.
///
/// Unwinds to the nearest reader loop, except where no reader owns this
/// process (a forked child, or a shell doomed by `exec`): there the process
/// terminates.
pub(crate) fn rc_error(env: &Env) -> Result {
    if env.owns_reader() {
        Break(Divert::Interrupt)
    } else {
        process::exit(1)
    }
}

/// Executes one argument list.
///
/// With `parent` set the caller survives the command: the dispatcher forks
/// for anything that would replace or disturb the process image. Without it
/// the command may take the process over.
pub fn exec(env: &mut Env, words: Vec<String>, mut parent: bool) -> Result {
    if env.options.contains(ShellOption::XTrace) && !words.is_empty() {
        trace(&words);
    }

    let mut start = 0;
    let mut saw_exec = false;
    let mut after_builtin = false;
    let resolution = loop {
        let resolution = resolve(env, words.get(start).map(String::as_str), after_builtin);
        // The builtin prefix applies only to the immediately following
        // resolution, e.g. `builtin exec echo hi`.
        let was_after_builtin = after_builtin;
        after_builtin = false;
        match resolution {
            Resolution::Builtin(b) if b.name == "exec" => {
                start += 1;
                saw_exec = true;
                parent = false;
            }
            Resolution::Builtin(b) if b.name == "builtin" && !was_after_builtin => {
                start += 1;
                after_builtin = true;
            }
            other => break other,
        }
    };

    // A null exec performs the redirections and returns: `exec >foo`.
    if words.get(start).is_none() && saw_exec {
        if apply_redirs(env).is_err() {
            env.set_status_bool(false)?;
            return rc_error(env);
        }
        return Continue(());
    }
    if saw_exec {
        // Any shell error from here on must terminate the process instead
        // of returning to the reader.
        env.owner = None;
    }

    let external = matches!(resolution, Resolution::External);
    let mut path = None;
    if external {
        path = which(env, words.get(start).map(String::as_str), true);
        if path.is_none() && words.get(start).is_some() {
            env.set_status_bool(false)?;
            env.redirs.clear();
            if parent {
                return Continue(());
            }
            process::exit(1);
        }
        // Warm the exported environment cache so the child finds it built.
        env.make_env();
    }

    // A parent with an external command or pending redirections has to
    // fork; outstanding command-argument producers force a fork no matter
    // what, since they must be drained in the child.
    let must_fork = (parent && (external || !env.redirs.is_empty())) || !env.cmdargs.is_empty();

    let terminal = if must_fork && env.interactive() {
        system::save_terminal()
    } else {
        None
    };

    if must_fork {
        match system::fork() {
            Ok(ForkResult::Parent { child }) => reap_child(env, child, terminal, path.as_deref()),
            Ok(ForkResult::Child) => {
                run_child(env, &words, start, resolution, path.as_deref(), true, parent)
            }
            Err(errno) => {
                io::sys_error("fork", errno);
                rc_error(env)
            }
        }
    } else {
        run_child(env, &words, start, resolution, path.as_deref(), false, parent)
    }
}

/// The child side of the dispatch; also the no-fork path.
fn run_child(
    env: &mut Env,
    words: &[String],
    start: usize,
    resolution: Resolution,
    path: Option<&str>,
    forked: bool,
    parent: bool,
) -> Result {
    let returning = !forked && parent;
    if !returning {
        system::restore_default_signals();
    }
    // Drain pending command-argument producers without waiting for them.
    env.cmdargs.clear();

    if apply_redirs(env).is_err() {
        if !returning {
            process::exit(1);
        }
        env.set_status_bool(false)?;
        return rc_error(env);
    }

    // Null commands are performed for their redirections.
    if words.get(start).is_none() || !matches!(resolution, Resolution::External) {
        let result = match resolution {
            Resolution::Function(body) => call_function(env, &body, &words[start..]),
            Resolution::Builtin(b) => (b.main)(env, &words[start..]),
            Resolution::External => Continue(()),
        };
        if returning {
            return result;
        }
        match result {
            Break(Divert::Exit(Some(code))) => process::exit(code),
            _ => process::exit(env.get_status()),
        }
    }

    let path = path.expect("external command was resolved before forking");
    let name = &words[start];
    let args: Vec<CString> = words[start..]
        .iter()
        .filter_map(|w| CString::new(w.as_bytes()).ok())
        .collect();
    let Ok(c_path) = CString::new(path) else {
        process::exit(1)
    };
    let envs = env.make_env();
    let errno = rc_execve(&c_path, &args, envs);
    io::sys_error(name, errno);
    process::exit(1);
}

/// The parent side: reap the child and account for its status.
fn reap_child(
    env: &mut Env,
    child: Pid,
    terminal: Option<Termios>,
    path: Option<&str>,
) -> Result {
    env.redirs.clear();
    let status = match system::wait_pid(child, false) {
        Ok(wait_status) => Status::from(wait_status),
        Err(_) => Status::NoResult,
    };
    if env.interactive() && matches!(status, Status::Signaled { .. }) {
        // The child may have died with the terminal in a raw state.
        if let Some(saved) = &terminal {
            system::restore_terminal(saved);
        }
    }
    env.set_status(None, status)?;

    // When rc and its child both process a SIGINT (the child has a catcher
    // installed), rc must not print a newline when the child finally exits:
    // think of `ed`, ^C, then `q`. Suppress the newline exactly when the
    // child exited normally.
    if matches!(status, Status::Exited(_)) {
        env.nl_on_intr = false;
    }
    let checked = env.sigchk();
    if checked.is_break() {
        return checked;
    }
    env.nl_on_intr = true;

    for pid in std::mem::take(&mut env.cmdargs) {
        system::wait_pid(pid, false).ok();
    }

    if let Some(path) = path {
        if !status.is_success() {
            verify_cmd(env, path);
        }
    }
    Continue(())
}

/// Resolves one command name.
///
/// An absent or absolute name is external. Otherwise functions are
/// consulted first (unless a `builtin` prefix suppressed them for this one
/// resolution), and then the builtin table.
fn resolve(env: &Env, name: Option<&str>, skip_functions: bool) -> Resolution {
    let Some(name) = name else {
        return Resolution::External;
    };
    if is_absolute(name) {
        return Resolution::External;
    }
    if !skip_functions {
        if let Some(function) = env.functions.get(name) {
            return Resolution::Function(Rc::clone(&function.body));
        }
    }
    match builtin::find(name) {
        Some(b) => Resolution::Builtin(b),
        None => Resolution::External,
    }
}

/// Calls a function: `$*` is stacked with the arguments for the duration of
/// the body.
fn call_function(env: &mut Env, body: &str, words: &[String]) -> Result {
    let Some(interpret) = env.interpreter else {
        io::note("no command interpreter installed");
        return env.set_status_bool(false);
    };
    let text = body.trim();
    let text = text
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .unwrap_or(text)
        .to_owned();
    env.set_var("*", words.get(1..).unwrap_or_default().to_vec(), true);
    let result = interpret(env, &text);
    env.delete_var("*", true);
    result
}

fn trace(words: &[String]) {
    let mut line = words
        .iter()
        .format_with(" ", |word, f| f(&format_args!("{word}")))
        .to_string();
    line.push('\n');
    system::write_all(2, line.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::close;
    use rcsh_env::function::Function;
    use rcsh_env::option::OptionSet;
    use rcsh_env::redir::{OpenKind, Redir};
    use std::fs;

    fn env() -> Env {
        Env::new(OptionSet::new())
    }

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn resolved_kind(env: &Env, name: &str, skip_functions: bool) -> &'static str {
        match resolve(env, Some(name), skip_functions) {
            Resolution::External => "external",
            Resolution::Function(_) => "function",
            Resolution::Builtin(_) => "builtin",
        }
    }

    #[test]
    fn functions_shadow_builtins_unless_suppressed() {
        let mut env = env();
        env.functions.define("echo", Function::new("{builtin echo shadowed}"));
        assert_eq!(resolved_kind(&env, "echo", false), "function");
        assert_eq!(resolved_kind(&env, "echo", true), "builtin");
        assert_eq!(resolved_kind(&env, "ls", false), "external");
    }

    #[test]
    fn absolute_names_are_always_external() {
        let mut env = env();
        env.functions.define("/bin/echo", Function::new("{}"));
        assert_eq!(resolved_kind(&env, "/bin/echo", false), "external");
        assert_eq!(resolved_kind(&env, "./echo", false), "external");
    }

    #[test]
    fn unresolvable_command_fails_without_forking() {
        let mut env = env();
        env.set_var("path", vec![], false);
        env.redirs.push(Redir::Close { fd: 19 });
        let result = exec(&mut env, words(&["no-such-command-at-all"]), true);
        assert_eq!(result, Continue(()));
        assert_eq!(env.get_status(), 1);
        // The staged redirections are discarded.
        assert!(env.redirs.is_empty());
    }

    #[test]
    fn null_exec_applies_redirections_and_leaves_the_shell_alive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        let mut env = env();
        env.redirs.push(Redir::Open {
            kind: OpenKind::Create,
            fd: 19,
            path: path.to_str().unwrap().to_owned(),
        });
        let result = exec(&mut env, words(&["exec"]), true);
        assert_eq!(result, Continue(()));
        assert!(path.exists());
        assert!(env.redirs.is_empty());
        // Still the same process, still owning the reader.
        assert!(env.owns_reader());
        close(19).ok();
        fs::remove_file(&path).ok();
    }

    #[test]
    fn builtin_prefix_consumes_exactly_one_resolution() {
        let mut env = env();
        // A function named echo must not be called through the prefix.
        env.functions.define("echo", Function::new("{exit 99}"));
        let result = exec(&mut env, words(&["builtin", "echo", "-n", ""]), true);
        assert_eq!(result, Continue(()));
        assert_eq!(env.get_status(), 0);
    }

    #[test]
    fn builtin_prefix_does_not_stack() {
        let mut env = env();
        let result = exec(&mut env, words(&["builtin", "builtin", "echo", "-n"]), true);
        assert_eq!(result, Continue(()));
        assert_eq!(env.get_status(), 1);
    }

    #[test]
    fn function_call_stacks_star_and_runs_the_body() {
        fn fake_interpreter(env: &mut Env, text: &str) -> Result {
            let mut record = vec![text.to_owned()];
            record.extend(env.var("*").unwrap_or_default().iter().cloned());
            env.set_var("ran", record, false);
            Continue(())
        }

        let mut env = env();
        env.interpreter = Some(fake_interpreter);
        env.functions.define("greet", Function::new("{echo hello $*}"));
        let result = exec(&mut env, words(&["greet", "a", "b"]), true);
        assert_eq!(result, Continue(()));
        assert_eq!(
            env.var("ran"),
            Some(&words(&["echo hello $*", "a", "b"])[..])
        );
        // The $* stack entry has been popped again.
        assert_eq!(env.var("*"), None);
    }

    #[test]
    fn exit_builtin_diverts_through_the_dispatcher() {
        let mut env = env();
        let result = exec(&mut env, words(&["exit", "7"]), true);
        assert_eq!(result, Break(Divert::Exit(None)));
        assert_eq!(env.get_status(), 7);
    }
}
