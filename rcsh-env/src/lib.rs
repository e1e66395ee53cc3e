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

//! Execution environment of the rcsh shell.
//!
//! An [`Env`] instance is the whole mutable state of a shell: the name
//! resolution tables (variables with their lexical stacks, functions, the
//! command path cache), the status vector of the last pipeline, the staged
//! redirection queue, and the option set. The shell is single-threaded; the
//! only concurrent actors are the kernel delivering signals (see
//! [`system`]) and child processes.

pub mod exports;
pub mod function;
pub mod htab;
pub mod io;
pub mod option;
pub mod pathcache;
pub mod redir;
pub mod semantics;
pub mod signal;
mod status;
pub mod system;
pub mod variable;

pub use crate::semantics::Status;
pub use crate::status::MAX_PIPELINE;

use crate::exports::Exports;
use crate::function::FunctionSet;
use crate::option::Option as ShellOption;
use crate::option::OptionSet;
use crate::pathcache::PathCache;
use crate::redir::Redir;
use crate::semantics::Status as PipeStatus;
use crate::system::AccessProfile;
use crate::variable::VariableSet;
use nix::unistd::Pid;
use std::ffi::CString;

/// Whole state of the shell execution environment.
#[derive(Clone, Debug)]
pub struct Env {
    /// Shell variables, with their lexical stacks.
    pub variables: VariableSet,

    /// Shell functions.
    pub functions: FunctionSet,

    /// Cache of resolved command locations.
    pub commands: PathCache,

    /// Exported environment materialization state.
    pub exports: Exports,

    /// Options currently in effect.
    pub options: OptionSet,

    /// Identity used by the executability probe.
    pub access: AccessProfile,

    /// Redirections staged for the next command, applied in order.
    pub redirs: Vec<Redir>,

    /// Children producing command arguments that still must be reaped.
    ///
    /// Whenever this is non-empty the dispatcher forks even for builtins, so
    /// the producers can be drained in the child.
    pub cmdargs: Vec<Pid>,

    /// Whether execution is inside a condition, where `-e` does not apply.
    pub in_condition: bool,

    /// Whether to print a newline before the next prompt after an interrupt.
    ///
    /// Cleared while reaping a child that exited normally: if the child
    /// caught the interrupt itself, the user should not see a blank line.
    pub nl_on_intr: bool,

    /// Process that owns the reader loop.
    ///
    /// A shell-level error unwinds to the reader only in this process. A
    /// successful `exec` with a command, and every forked child, clear the
    /// claim so that errors terminate the process instead.
    pub owner: Option<Pid>,

    /// Hook used to interpret the body of a called function.
    ///
    /// Installed by the reader at startup; `None` only in environments that
    /// never call functions (such as tests).
    pub interpreter: Option<semantics::Interpreter>,

    /// Wait statuses of the last pipeline, in member order. Never empty.
    pub(crate) statuses: Vec<PipeStatus>,
}

impl Env {
    /// Creates a fresh environment with the given option set.
    ///
    /// The status vector starts out true. Inherited environment entries are
    /// installed separately with [`exports::init_env`].
    #[must_use]
    pub fn new(options: OptionSet) -> Self {
        Env {
            variables: VariableSet::new(),
            functions: FunctionSet::new(),
            commands: PathCache::new(),
            exports: Exports::new(),
            options,
            access: AccessProfile::current(),
            redirs: Vec::new(),
            cmdargs: Vec::new(),
            in_condition: false,
            nl_on_intr: true,
            owner: Some(nix::unistd::getpid()),
            interpreter: None,
            statuses: vec![PipeStatus::Exited(0)],
        }
    }

    /// Whether the shell is interactive.
    #[must_use]
    pub fn interactive(&self) -> bool {
        self.options.contains(ShellOption::Interactive)
    }

    /// Whether a shell-level error may unwind to the reader loop here.
    ///
    /// False in forked children and once `exec` has doomed the shell; such
    /// an error must terminate the process.
    #[must_use]
    pub fn owns_reader(&self) -> bool {
        self.owner == Some(nix::unistd::getpid())
    }

    /// Looks up a variable's value.
    #[must_use]
    pub fn var(&self, name: &str) -> Option<&[String]> {
        self.variables.get(name)
    }

    /// Assigns a variable, maintaining the path-cache invariant.
    ///
    /// Any mutation of `path` flushes the whole command path cache: the
    /// cached directories name entries of the old `$path` value.
    pub fn set_var(&mut self, name: &str, values: Vec<String>, stack: bool) {
        if name == "path" {
            self.commands.clear();
        }
        self.variables.assign(name, values, stack);
        self.variables.set_exportable(name, true);
    }

    /// Deletes a variable (or pops one stacked entry), maintaining the
    /// path-cache invariant.
    pub fn delete_var(&mut self, name: &str, stack: bool) {
        if name == "path" {
            self.commands.clear();
        }
        self.variables.delete(name, stack);
    }

    /// Materializes the exported environment.
    ///
    /// The result is cached until the next mutation of the variable or
    /// function tables. This never blocks.
    pub fn make_env(&mut self) -> &[CString] {
        let Env { variables, functions, exports, .. } = self;
        exports.make_env(variables, functions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn assigning_path_flushes_the_command_cache() {
        let mut env = Env::new(OptionSet::new());
        env.commands.insert("ls", "/bin".to_string());
        env.set_var("path", words(&["/usr/bin", "/bin"]), false);
        assert!(env.commands.is_empty());
    }

    #[test]
    fn stacked_path_assignment_also_flushes() {
        let mut env = Env::new(OptionSet::new());
        env.set_var("path", words(&["/bin"]), false);
        env.commands.insert("ls", "/bin".to_string());
        env.set_var("path", words(&["/sbin"]), true);
        assert!(env.commands.is_empty());

        env.commands.insert("ls", "/sbin".to_string());
        env.delete_var("path", true);
        assert!(env.commands.is_empty());
        assert_eq!(env.var("path"), Some(&words(&["/bin"])[..]));
    }

    #[test]
    fn assigning_other_variables_keeps_the_cache() {
        let mut env = Env::new(OptionSet::new());
        env.commands.insert("ls", "/bin".to_string());
        env.set_var("x", words(&["y"]), false);
        assert_eq!(env.commands.get("ls"), Some("/bin"));
    }

    #[test]
    fn fresh_environment_owns_the_reader() {
        let env = Env::new(OptionSet::new());
        assert!(env.owns_reader());
        let mut doomed = env.clone();
        doomed.owner = None;
        assert!(!doomed.owns_reader());
    }
}
