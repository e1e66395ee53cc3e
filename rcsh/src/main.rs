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

//! The rc binary: startup and the read-eval loop.

mod input;
mod lexer;
mod startup;

use nix::errno::Errno;
use rcsh_env::io;
use rcsh_env::option::Option as ShellOption;
use rcsh_env::semantics::Divert;
use rcsh_env::semantics::Result as ExecResult;
use rcsh_env::system;
use rcsh_env::Env;
use rcsh_semantics::run_pipeline;
use std::ops::ControlFlow::{Break, Continue};
use std::process;

fn main() {
    let invocation = match startup::args::parse(std::env::args()) {
        Ok(invocation) => invocation,
        Err(error) => {
            io::note(&error.to_string());
            process::exit(1);
        }
    };

    let mut options = invocation.options;
    let scripted = invocation.command.is_some()
        || invocation.script.is_some()
        || options.contains(ShellOption::Stdin);
    if !scripted && nix::unistd::isatty(0).unwrap_or(false) {
        options.insert(ShellOption::Interactive);
    }

    let mut env = Env::new(options);
    startup::prepare(&mut env, &invocation);
    env.interpreter = Some(run_text);
    system::install_signal_handlers(env.interactive());

    if env.options.contains(ShellOption::Login) {
        run_profile(&mut env);
    }

    let code = match &invocation.command {
        Some(command) => run_command_string(&mut env, command),
        None => match &invocation.script {
            Some(path) => run_script(&mut env, path),
            None => read_eval_loop(&mut env),
        },
    };
    process::exit(code);
}

/// Runs command text; installed as [`Env::interpreter`] so the dispatcher
/// can call function bodies through it.
fn run_text(env: &mut Env, text: &str) -> ExecResult {
    for (index, line) in text.lines().enumerate() {
        run_line(env, line, index + 1)?;
    }
    Continue(())
}

fn run_line(env: &mut Env, line: &str, line_number: usize) -> ExecResult {
    let statements = match lexer::parse_line(env, line) {
        Ok(statements) => statements,
        Err(error) => {
            io::note(&format!("line {line_number}: {error}"));
            env.set_status_bool(false)?;
            return Break(Divert::Interrupt);
        }
    };
    if env.options.contains(ShellOption::NoExec) {
        return Continue(());
    }
    for statement in statements {
        match statement {
            lexer::Stmt::Assign(assignments) => {
                for (name, values) in assignments {
                    env.set_var(&name, values, false);
                }
                env.set_status_bool(true)?;
            }
            lexer::Stmt::Run(pipeline) => run_pipeline(env, &pipeline)?,
        }
    }
    Continue(())
}

fn run_command_string(env: &mut Env, command: &str) -> i32 {
    match run_text(env, command) {
        Continue(()) => env.get_status(),
        Break(Divert::Exit(code)) => code.unwrap_or_else(|| env.get_status()),
        Break(Divert::Interrupt) => env.get_status(),
    }
}

fn run_script(env: &mut Env, path: &str) -> i32 {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) => {
            let errno = error.raw_os_error().map(Errno::from_i32).unwrap_or(Errno::EIO);
            io::sys_error(path, errno);
            return 1;
        }
    };
    run_command_string(env, &text)
}

/// Sources `$home/.rcrc` for a login shell. Absence is not an error.
fn run_profile(env: &mut Env) {
    let Some(home) = env.var("home").and_then(|h| h.first()).cloned() else {
        return;
    };
    let profile = format!("{home}/.rcrc");
    let Ok(text) = std::fs::read_to_string(&profile) else {
        return;
    };
    if let Break(Divert::Exit(code)) = run_text(env, &text) {
        process::exit(code.unwrap_or_else(|| env.get_status()));
    }
}

fn read_eval_loop(env: &mut Env) -> i32 {
    let mut reader = input::LineReader::new(0);
    let mut history_warned = false;
    let mut line_number = 0;
    loop {
        if env.interactive() {
            prompt(env);
        }
        match reader.next_line() {
            Ok(Some(line)) => {
                line_number += 1;
                if env.options.contains(ShellOption::Verbose) {
                    system::write_all(2, line.as_bytes());
                    system::write_all(2, b"\n");
                }
                if env.interactive() {
                    append_history(env, &line, &mut history_warned);
                }
                match run_line(env, &line, line_number) {
                    Continue(()) => {}
                    Break(Divert::Exit(code)) => {
                        return code.unwrap_or_else(|| env.get_status());
                    }
                    Break(Divert::Interrupt) => {
                        if !env.owns_reader() || !env.interactive() {
                            return env.get_status();
                        }
                        resume_prompt(env);
                    }
                }
            }
            Ok(None) => return env.get_status(),
            Err(Errno::EINTR) => {
                if env.sigchk().is_break() {
                    if !env.interactive() {
                        return env.get_status();
                    }
                    resume_prompt(env);
                }
            }
            Err(errno) => {
                io::sys_error("read", errno);
                return 1;
            }
        }
    }
}

/// Returns to the prompt after an interrupt, printing the separating
/// newline unless a just-reaped child already handled the keystroke.
fn resume_prompt(env: &mut Env) {
    if env.nl_on_intr {
        system::write_all(2, b"\n");
    }
    env.nl_on_intr = true;
}

fn prompt(env: &Env) {
    let text = env
        .var("prompt")
        .and_then(|prompt| prompt.first())
        .cloned()
        .unwrap_or_else(|| "; ".to_owned());
    system::write_all(2, text.as_bytes());
}

/// Appends one interactive command line to the `$history` file, if set.
/// Failure is reported once and otherwise ignored.
fn append_history(env: &Env, line: &str, warned: &mut bool) {
    use std::io::Write;

    let Some(file) = env.var("history").and_then(|h| h.first()) else {
        return;
    };
    let result = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(file)
        .and_then(|mut f| writeln!(f, "{line}"));
    if result.is_err() && !*warned {
        *warned = true;
        io::note(&format!("cannot write history file {}", io::protect(file)));
    }
}
