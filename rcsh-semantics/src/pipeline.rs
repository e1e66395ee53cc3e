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

//! Pipeline execution.
//!
//! Members are forked left to right, connected with pipes, and waited for
//! in member order; the resulting status vector has one element per member.
//! A background pipeline is wrapped in one more fork whose process ID
//! becomes `$apid` and joins the `$apids` list.

use crate::exec::exec;
use crate::exec::rc_error;
use nix::sys::signal::SigHandler;
use nix::sys::signal::Signal;
use nix::unistd::close;
use nix::unistd::dup2;
use nix::unistd::pipe;
use nix::unistd::ForkResult;
use nix::unistd::Pid;
use rcsh_env::io;
use rcsh_env::semantics::Command;
use rcsh_env::semantics::Divert;
use rcsh_env::semantics::Pipeline;
use rcsh_env::semantics::Result;
use rcsh_env::semantics::Status;
use rcsh_env::system;
use rcsh_env::Env;
use std::ops::ControlFlow::{Break, Continue};
use std::os::unix::io::RawFd;
use std::process;

/// Runs one pipeline and stores its status vector.
pub fn run_pipeline(env: &mut Env, pipeline: &Pipeline) -> Result {
    debug_assert!(!pipeline.commands.is_empty());
    if pipeline.background {
        return run_background(env, pipeline);
    }
    if pipeline.commands.len() == 1 {
        return run_member(env, &pipeline.commands[0], true);
    }

    let mut pids = Vec::with_capacity(pipeline.commands.len());
    let mut read_end: Option<RawFd> = None;
    let last = pipeline.commands.len() - 1;
    for (i, command) in pipeline.commands.iter().enumerate() {
        let next = if i < last {
            match pipe() {
                Ok(ends) => Some(ends),
                Err(errno) => {
                    io::sys_error("pipe", errno);
                    if let Some(fd) = read_end {
                        close(fd).ok();
                    }
                    reap_members(env, &pids)?;
                    return rc_error(env);
                }
            }
        } else {
            None
        };

        match system::fork() {
            Ok(ForkResult::Child) => {
                system::restore_default_signals();
                if let Some(fd) = read_end {
                    dup2(fd, 0).ok();
                    close(fd).ok();
                }
                if let Some((r, w)) = next {
                    dup2(w, 1).ok();
                    close(w).ok();
                    close(r).ok();
                }
                let result = run_member(env, command, false);
                exit_member(env, result);
            }
            Ok(ForkResult::Parent { child }) => {
                pids.push(child);
                if let Some(fd) = read_end {
                    close(fd).ok();
                }
                if let Some((r, w)) = next {
                    close(w).ok();
                    read_end = Some(r);
                } else {
                    read_end = None;
                }
            }
            Err(errno) => {
                io::sys_error("fork", errno);
                if let Some(fd) = read_end {
                    close(fd).ok();
                }
                if let Some((r, w)) = next {
                    close(r).ok();
                    close(w).ok();
                }
                reap_members(env, &pids)?;
                return rc_error(env);
            }
        }
    }

    reap_members(env, &pids)?;
    env.sigchk()
}

/// Runs one member in the current process role.
///
/// Local assignments are stacked around the command; in a forked member the
/// pop is moot but harmless.
fn run_member(env: &mut Env, command: &Command, parent: bool) -> Result {
    for (name, values) in &command.locals {
        env.set_var(name, values.clone(), true);
    }
    env.redirs = command.redirs.clone();
    let result = exec(env, command.words.clone(), parent);
    for (name, _) in command.locals.iter().rev() {
        env.delete_var(name, true);
    }
    result
}

/// Terminates a forked pipeline member.
fn exit_member(env: &Env, result: Result) -> ! {
    match result {
        Break(Divert::Exit(Some(code))) => process::exit(code),
        _ => process::exit(env.get_status()),
    }
}

/// Waits for every member, in order, and stores the status vector.
fn reap_members(env: &mut Env, pids: &[Pid]) -> Result {
    if pids.is_empty() {
        return Continue(());
    }
    let statuses = pids
        .iter()
        .map(|&pid| match system::wait_pid(pid, false) {
            Ok(wait_status) => Status::from(wait_status),
            Err(_) => Status::NoResult,
        })
        .collect();
    env.set_pipe_status(statuses)
}

/// Forks a subshell for `pipeline &`, recording `$apid` and `$apids`.
fn run_background(env: &mut Env, pipeline: &Pipeline) -> Result {
    match system::fork() {
        Ok(ForkResult::Child) => {
            // Background children do not see the keyboard's interrupts.
            let action = nix::sys::signal::SigAction::new(
                SigHandler::SigIgn,
                nix::sys::signal::SaFlags::empty(),
                nix::sys::signal::SigSet::empty(),
            );
            unsafe {
                nix::sys::signal::sigaction(Signal::SIGINT, &action).ok();
                nix::sys::signal::sigaction(Signal::SIGQUIT, &action).ok();
            }
            let foreground = Pipeline {
                commands: pipeline.commands.clone(),
                background: false,
            };
            let result = run_pipeline(env, &foreground);
            exit_member(env, result);
        }
        Ok(ForkResult::Parent { child }) => {
            let pid = child.to_string();
            let mut apids = env.var("apids").map(<[String]>::to_vec).unwrap_or_default();
            apids.push(pid.clone());
            env.set_var("apids", apids, false);
            env.set_var("apid", vec![pid], false);
            env.set_status(None, Status::Exited(0))
        }
        Err(errno) => {
            io::sys_error("fork", errno);
            rc_error(env)
        }
    }
}
