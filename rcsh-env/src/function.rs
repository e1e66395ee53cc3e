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

//! Type definitions for functions.
//!
//! Functions are kept in both parsed and textual form so that passing one to
//! a child through the environment does not need a reparse on export.
//! Functions do not stack.

use crate::htab::Htab;
use crate::signal;
use std::ffi::CString;
use std::rc::Rc;

/// Definition of a function.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Function {
    /// Body of the function, the brace block it was defined with.
    ///
    /// This is wrapped in `Rc` so that a function can be invoked without
    /// cloning the body even if the call redefines or deletes the function.
    pub body: Rc<str>,

    /// Cached exported `fn_NAME={…}` form.
    pub(crate) export_cache: Option<CString>,
}

impl Function {
    /// Creates a new function from its body text.
    #[must_use]
    pub fn new<B: Into<Rc<str>>>(body: B) -> Self {
        Function { body: body.into(), export_cache: None }
    }
}

/// Collection of functions.
#[derive(Clone, Debug, Default)]
pub struct FunctionSet {
    table: Htab<Function>,
    /// Whether the exported environment must be rebuilt.
    pub(crate) dirty: bool,
}

impl FunctionSet {
    pub fn new() -> Self {
        FunctionSet { table: Htab::new(), dirty: true }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Function> {
        self.table.get(name)
    }

    /// Defines a function, dropping any previous body under the same name.
    pub fn define(&mut self, name: &str, function: Function) {
        self.dirty = true;
        let entry = self.table.get_or_insert_with(name, || Function::new(""));
        *entry = function;
    }

    /// Removes a function definition.
    pub fn delete(&mut self, name: &str) {
        if self.table.remove(name).is_some() {
            self.dirty = true;
        }
    }

    /// Collects the exported `fn_NAME={…}` strings of all exportable
    /// functions, building and caching any missing external forms.
    pub(crate) fn export_strings(&mut self) -> Vec<CString> {
        let mut out = Vec::new();
        for (name, function) in self.table.iter_mut() {
            if !is_exportable(name) {
                continue;
            }
            if function.export_cache.is_none() {
                let mut bytes = b"fn_".to_vec();
                bytes.extend_from_slice(crate::exports::encode_name(name).as_bytes());
                bytes.push(b'=');
                bytes.extend_from_slice(function.body.as_bytes());
                function.export_cache = CString::new(bytes).ok();
            }
            if let Some(cached) = &function.export_cache {
                out.push(cached.clone());
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Function)> {
        self.table.iter()
    }
}

/// Whether a function of this name may be exported.
///
/// Signal handler functions (`sigint`, `sigexit`, …) are process-local state
/// and never appear in the environment.
#[must_use]
pub fn is_exportable(name: &str) -> bool {
    if let Some(rest) = name.strip_prefix("sig") {
        if rest == "exit" || signal::lookup_name(name).is_some() {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redefinition_replaces_the_body() {
        let mut fns = FunctionSet::new();
        fns.define("greet", Function::new("{echo hi}"));
        fns.define("greet", Function::new("{echo hello}"));
        assert_eq!(&*fns.get("greet").unwrap().body, "{echo hello}");
    }

    #[test]
    fn delete_removes_the_function() {
        let mut fns = FunctionSet::new();
        fns.define("f", Function::new("{true}"));
        fns.delete("f");
        assert_eq!(fns.get("f"), None);
    }

    #[test]
    fn signal_handler_functions_are_not_exportable() {
        assert!(!is_exportable("sigint"));
        assert!(!is_exportable("sigexit"));
        assert!(is_exportable("signify"));
        assert!(is_exportable("build"));
    }
}
