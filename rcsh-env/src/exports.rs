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

//! The exported environment.
//!
//! Variables and functions are kept in both internal and external form for
//! performance: an entry inherited from the parent and never touched is
//! passed on to children byte for byte. This matters most for functions,
//! where the external `fn_NAME={…}` form saves a reparse.
//!
//! [`init_env`] classifies inherited entries into functions, variables and
//! "bozo" strings (entries that are neither; preserved and re-exported
//! verbatim). [`Exports::make_env`] produces the sorted environment vector
//! for `execve`, rebuilding it only when a table has been mutated since the
//! last call; it never blocks.
//!
//! Names containing bytes unsafe in POSIX identifiers are escaped `__XX`
//! (two lowercase hex digits) on export; import applies the reverse mapping.

use crate::function::Function;
use crate::function::FunctionSet;
use crate::option::Option as ShellOption;
use crate::variable::VariableSet;
use crate::Env;
use std::ffi::CString;

/// Separator between list members in an exported variable value.
pub const LIST_SEPARATOR: u8 = 0x01;

/// Materialization state of the exported environment.
#[derive(Clone, Debug, Default)]
pub struct Exports {
    /// Inherited entries that parse as neither variable nor function.
    bozo: Vec<CString>,
    /// Cached result of the last [`make_env`](Self::make_env).
    cache: Vec<CString>,
}

impl Exports {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Produces the sorted environment vector.
    ///
    /// Rebuilt only when the variable or function table has been mutated
    /// since the last call.
    pub fn make_env<'a>(
        &'a mut self,
        variables: &mut VariableSet,
        functions: &mut FunctionSet,
    ) -> &'a [CString] {
        if variables.dirty || functions.dirty {
            let noexport = variables
                .get("noexport")
                .map(<[String]>::to_vec)
                .unwrap_or_default();
            let mut result = self.bozo.clone();
            result.extend(variables.export_strings(&noexport));
            result.extend(functions.export_strings());
            result.sort_unstable();
            self.cache = result;
            variables.dirty = false;
            functions.dirty = false;
        }
        &self.cache
    }
}

/// Installs the inherited environment into the tables.
///
/// Entries named `fn_<name>` become functions unless the `-p` option is on,
/// in which case they are dropped. Other `NAME=VALUE` entries become
/// variables; everything else is retained as a bozo string.
pub fn init_env<I>(env: &mut Env, entries: I)
where
    I: IntoIterator<Item = Vec<u8>>,
{
    for entry in entries {
        let Some(eq) = entry.iter().position(|&b| b == b'=') else {
            keep_bozo(env, entry);
            continue;
        };
        let (raw_name, raw_value) = (&entry[..eq], &entry[eq + 1..]);

        if let Some(fn_name) = raw_name.strip_prefix(b"fn_") {
            if env.options.contains(ShellOption::NoImport) {
                continue;
            }
            if !import_function(env, fn_name, raw_value, &entry) {
                keep_bozo(env, entry);
            }
        } else if !import_variable(env, raw_name, raw_value, &entry) {
            keep_bozo(env, entry);
        }
    }
}

fn keep_bozo(env: &mut Env, entry: Vec<u8>) {
    if let Ok(s) = CString::new(entry) {
        env.exports.bozo.push(s);
    }
}

fn import_function(env: &mut Env, raw_name: &[u8], raw_value: &[u8], entry: &[u8]) -> bool {
    if raw_name.is_empty() || !is_raw_name(raw_name) {
        return false;
    }
    let Ok(body) = std::str::from_utf8(raw_value) else { return false };
    let name = decode_name(raw_name);
    let mut function = Function::new(body);
    function.export_cache = CString::new(entry.to_vec()).ok();
    env.functions.define(&name, function);
    true
}

fn import_variable(env: &mut Env, raw_name: &[u8], raw_value: &[u8], entry: &[u8]) -> bool {
    if raw_name.is_empty() || !is_raw_name(raw_name) {
        return false;
    }
    let Ok(value) = std::str::from_utf8(raw_value) else { return false };
    let name = decode_name(raw_name);
    let values = value
        .split(LIST_SEPARATOR as char)
        .map(str::to_owned)
        .collect();
    let cache = CString::new(entry.to_vec()).ok();
    env.variables.install(&name, values, cache);
    true
}

/// Whether every byte of an inherited name is one an exported name could
/// contain: a POSIX identifier character (the `__XX` escape uses only
/// those).
fn is_raw_name(name: &[u8]) -> bool {
    name.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'_')
}

/// Escapes a name for export.
#[must_use]
pub fn encode_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for b in name.bytes() {
        if b.is_ascii_alphanumeric() || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("__{b:02x}"));
        }
    }
    out
}

/// Reverses [`encode_name`].
#[must_use]
pub fn decode_name(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'_'
            && raw.len() >= i + 4
            && raw[i + 1] == b'_'
            && raw[i + 2].is_ascii_hexdigit()
            && raw[i + 3].is_ascii_hexdigit()
        {
            let hex = std::str::from_utf8(&raw[i + 2..i + 4]).unwrap();
            out.push(u8::from_str_radix(hex, 16).unwrap());
            i += 4;
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::OptionSet;

    fn env() -> Env {
        Env::new(OptionSet::new())
    }

    fn entries(list: &[&str]) -> Vec<Vec<u8>> {
        list.iter().map(|s| s.as_bytes().to_vec()).collect()
    }

    fn exported(env: &mut Env) -> Vec<String> {
        env.make_env()
            .iter()
            .map(|s| s.to_str().unwrap().to_owned())
            .collect()
    }

    #[test]
    fn variables_round_trip_byte_identically() {
        let mut env = env();
        init_env(&mut env, entries(&["HOME=/home/u", "TERM=dumb"]));
        let out = exported(&mut env);
        assert!(out.contains(&"HOME=/home/u".to_string()), "{out:?}");
        assert!(out.contains(&"TERM=dumb".to_string()), "{out:?}");
    }

    #[test]
    fn list_variables_split_on_the_separator() {
        let mut env = env();
        init_env(&mut env, entries(&["path=/bin\u{1}/usr/bin"]));
        assert_eq!(
            env.var("path"),
            Some(&["/bin".to_string(), "/usr/bin".to_string()][..])
        );
    }

    #[test]
    fn functions_import_and_reexport_identically() {
        let mut env = env();
        init_env(&mut env, entries(&["fn_ll={ls -l $*}"]));
        assert_eq!(&*env.functions.get("ll").unwrap().body, "{ls -l $*}");
        let out = exported(&mut env);
        assert!(out.contains(&"fn_ll={ls -l $*}".to_string()), "{out:?}");
    }

    #[test]
    fn redefined_function_exports_its_new_body() {
        let mut env = env();
        init_env(&mut env, entries(&["fn_ll={ls -l}"]));
        env.functions.define("ll", Function::new("{ls -la}"));
        let out = exported(&mut env);
        assert!(out.contains(&"fn_ll={ls -la}".to_string()), "{out:?}");
    }

    #[test]
    fn noimport_drops_inherited_functions() {
        let mut env = Env::new(ShellOption::NoImport.into());
        init_env(&mut env, entries(&["fn_ll={ls -l}", "x=1"]));
        assert_eq!(env.functions.get("ll"), None);
        assert_eq!(env.var("x"), Some(&["1".to_string()][..]));
    }

    #[test]
    fn bozo_strings_pass_through() {
        let mut env = env();
        init_env(&mut env, entries(&["not-a-name=1", "nonsense"]));
        assert_eq!(env.var("not-a-name"), None);
        let out = exported(&mut env);
        assert!(out.contains(&"not-a-name=1".to_string()), "{out:?}");
        assert!(out.contains(&"nonsense".to_string()), "{out:?}");
    }

    #[test]
    fn environment_is_sorted_and_cached() {
        let mut env = env();
        init_env(&mut env, entries(&["b=2", "a=1"]));
        let first = exported(&mut env);
        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(first, sorted);

        // Unchanged tables reuse the cached vector.
        let before = env.make_env().as_ptr();
        let after = env.make_env().as_ptr();
        assert_eq!(before, after);
    }

    #[test]
    fn mutation_invalidates_the_cache() {
        let mut env = env();
        init_env(&mut env, entries(&["a=1"]));
        let _ = exported(&mut env);
        env.set_var("a", vec!["2".to_string()], false);
        assert!(exported(&mut env).contains(&"a=2".to_string()));
    }

    #[test]
    fn unsafe_names_are_hex_escaped() {
        assert_eq!(encode_name("plain_name9"), "plain_name9");
        assert_eq!(encode_name("a-b"), "a__2db");
        assert_eq!(decode_name(b"a__2db"), "a-b");
        let mut env = env();
        env.set_var("a-b", vec!["v".to_string()], false);
        assert!(exported(&mut env).contains(&"a__2db=v".to_string()));
    }

    #[test]
    fn escaped_names_import_back() {
        let mut env = env();
        init_env(&mut env, entries(&["a__2db=v"]));
        assert_eq!(env.var("a-b"), Some(&["v".to_string()][..]));
    }

    #[test]
    fn noexport_hides_variables_from_children() {
        let mut env = env();
        env.set_var("secret", vec!["x".to_string()], false);
        env.set_var("noexport", vec!["secret".to_string()], false);
        let out = exported(&mut env);
        assert!(!out.iter().any(|s| s.starts_with("secret=")), "{out:?}");
    }

    #[test]
    fn signal_functions_are_not_exported() {
        let mut env = env();
        env.functions.define("sigint", Function::new("{echo caught}"));
        env.functions.define("sigexit", Function::new("{echo bye}"));
        env.functions.define("normal", Function::new("{echo hi}"));
        let out = exported(&mut env);
        assert!(!out.iter().any(|s| s.starts_with("fn_sigint=")), "{out:?}");
        assert!(!out.iter().any(|s| s.starts_with("fn_sigexit=")), "{out:?}");
        assert!(out.iter().any(|s| s.starts_with("fn_normal=")), "{out:?}");
    }

    #[test]
    fn defaulted_prompt_is_not_exported_until_assigned() {
        let mut env = env();
        env.variables
            .install("prompt", vec!["; ".to_string(), String::new()], None);
        assert!(!exported(&mut env).iter().any(|s| s.starts_with("prompt=")));
        env.set_var("prompt", vec!["% ".to_string()], false);
        assert!(exported(&mut env).iter().any(|s| s.starts_with("prompt=")));
    }
}
