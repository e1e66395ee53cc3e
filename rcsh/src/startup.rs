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

//! Shell startup: importing the environment and installing defaults.

pub mod args;

use rcsh_env::exports;
use rcsh_env::Env;
use std::os::unix::ffi::OsStringExt;

/// Default `$path` when neither `path` nor `PATH` is inherited.
const DEFAULT_PATH: [&str; 4] = ["/usr/local/bin", "/usr/bin", "/bin", "."];

/// Variables that never make sense in a child's environment.
const DEFAULT_NOEXPORT: [&str; 5] = ["*", "0", "apid", "apids", "pid"];

/// Imports the inherited environment and installs the defaulted variables.
///
/// Defaults are installed without marking them explicitly assigned, so
/// `prompt` and `version` stay out of the exported environment until the
/// user sets them.
pub fn prepare(env: &mut Env, invocation: &args::Invocation) {
    exports::init_env(env, environ());

    env.variables
        .install("0", vec![invocation.arg0.clone()], None);
    env.variables.install("*", invocation.params.clone(), None);
    env.variables
        .install("pid", vec![nix::unistd::getpid().to_string()], None);
    env.variables.install(
        "version",
        vec![format!("rcsh {}", env!("CARGO_PKG_VERSION"))],
        None,
    );
    if env.var("prompt").is_none() {
        env.variables
            .install("prompt", vec!["; ".to_owned(), String::new()], None);
    }
    if env.var("noexport").is_none() {
        let noexport = DEFAULT_NOEXPORT.iter().map(|s| s.to_string()).collect();
        env.variables.install("noexport", noexport, None);
    }
    if env.var("path").is_none() {
        let dirs = match env.var("PATH") {
            Some(inherited) => inherited
                .first()
                .map(|p| p.split(':').map(str::to_owned).collect())
                .unwrap_or_default(),
            None => DEFAULT_PATH.iter().map(|s| s.to_string()).collect(),
        };
        env.variables.install("path", dirs, None);
    }
    if env.var("home").is_none() {
        if let Some(home) = env.var("HOME").and_then(|h| h.first()).cloned() {
            env.variables.install("home", vec![home], None);
        }
    }
}

/// The inherited environment as raw `NAME=value` byte strings.
fn environ() -> impl Iterator<Item = Vec<u8>> {
    std::env::vars_os().map(|(name, value)| {
        let mut entry = name.into_vec();
        entry.push(b'=');
        entry.extend(value.into_vec());
        entry
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcsh_env::option::OptionSet;

    fn prepared(invocation: &args::Invocation) -> Env {
        let mut env = Env::new(OptionSet::new());
        prepare(&mut env, invocation);
        env
    }

    #[test]
    fn arg0_and_params_become_variables() {
        let invocation = args::Invocation {
            arg0: "rc".to_owned(),
            params: vec!["a".to_owned(), "b".to_owned()],
            ..Default::default()
        };
        let env = prepared(&invocation);
        assert_eq!(env.var("0"), Some(&["rc".to_owned()][..]));
        assert_eq!(env.var("*"), Some(&["a".to_owned(), "b".to_owned()][..]));
    }

    #[test]
    fn path_has_a_default() {
        let env = prepared(&args::Invocation::default());
        let path = env.var("path").unwrap();
        assert!(!path.is_empty());
    }

    #[test]
    fn prompt_defaults_but_stays_unexported() {
        let mut env = prepared(&args::Invocation::default());
        assert!(env.var("prompt").is_some());
        let exported: Vec<String> = env
            .make_env()
            .iter()
            .map(|s| s.to_string_lossy().into_owned())
            .collect();
        assert!(!exported.iter().any(|s| s.starts_with("prompt=")), "{exported:?}");
    }
}
