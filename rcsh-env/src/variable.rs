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

//! Type definitions for shell variables.
//!
//! A variable's value is a list of words. Local assignments push a new entry
//! in front of the previous one (*lexical stacking*); leaving the scope pops
//! it. At most one entry per name is reachable from the table; shadowed
//! entries are reached only through the [`Variable::shadow`] chain.

use crate::htab::Htab;
use std::ffi::CString;

/// Definition of a variable.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Variable {
    /// Value of the variable.
    ///
    /// `None` means the entry has been cleared while a shadowed entry below
    /// it is kept alive; such a variable looks unset to lookups.
    pub(crate) value: Option<Vec<String>>,

    /// Cached exported `NAME=value` form, invalidated on every mutation.
    pub(crate) export_cache: Option<CString>,

    /// Entry shadowed by this one, if any.
    pub(crate) shadow: Option<Box<Variable>>,
}

impl Variable {
    /// Value of this entry, or `None` if it has been cleared.
    #[must_use]
    pub fn value(&self) -> Option<&[String]> {
        self.value.as_deref()
    }
}

/// Variables that have a default value are exported only once they have been
/// explicitly assigned.
const MAYBE_EXPORT: [&str; 2] = ["prompt", "version"];

/// Collection of variables.
#[derive(Clone, Debug, Default)]
pub struct VariableSet {
    table: Htab<Variable>,
    /// Whether the exported environment must be rebuilt.
    pub(crate) dirty: bool,
    /// Explicit-assignment flags for the [`MAYBE_EXPORT`] names.
    explicit: [bool; MAYBE_EXPORT.len()],
}

impl VariableSet {
    pub fn new() -> Self {
        VariableSet { table: Htab::new(), dirty: true, explicit: [false; 2] }
    }

    /// Looks up the value of a variable.
    ///
    /// Returns `None` for both unknown names and cleared entries.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.table.get(name)?.value()
    }

    /// Assigns a value, optionally stacking it in front of the old one.
    ///
    /// Without `stack` the top entry is overwritten and its cached exported
    /// form dropped. With `stack` the old entry (if any) is shadowed and a
    /// scope exit can restore it with [`delete`](Self::delete).
    pub fn assign(&mut self, name: &str, values: Vec<String>, stack: bool) {
        self.dirty = true;
        let existed = self.table.get(name).is_some();
        let entry = self.table.get_or_insert_with(name, Variable::default);
        if existed && stack {
            let old = std::mem::take(entry);
            entry.shadow = Some(Box::new(old));
        }
        entry.value = Some(values);
        entry.export_cache = None;
    }

    /// Deletes a variable, or pops one stacked entry.
    ///
    /// If the top entry has a shadow and `stack` is set, the shadowed entry
    /// is restored. If it has a shadow and `stack` is not set, the top is
    /// cleared but the chain kept. Otherwise the name is removed from the
    /// table.
    pub fn delete(&mut self, name: &str, stack: bool) {
        let Some(entry) = self.table.get_mut(name) else { return };
        self.dirty = true;
        if let Some(shadow) = entry.shadow.take() {
            if stack {
                *entry = *shadow;
            } else {
                entry.shadow = Some(shadow);
                entry.value = None;
                entry.export_cache = None;
            }
        } else {
            self.table.remove(name);
        }
    }

    /// Records that a defaulted variable has been explicitly assigned and may
    /// now be exported.
    pub fn set_exportable(&mut self, name: &str, flag: bool) {
        for (maybe, explicit) in MAYBE_EXPORT.iter().zip(&mut self.explicit) {
            if *maybe == name {
                *explicit = flag;
                self.dirty = true;
            }
        }
    }

    /// Whether a name passes the defaulted-variable and `$noexport` filters.
    ///
    /// `noexport` is the current value of the `noexport` variable.
    #[must_use]
    pub fn is_exportable(&self, name: &str, noexport: &[String]) -> bool {
        for (maybe, explicit) in MAYBE_EXPORT.iter().zip(&self.explicit) {
            if !explicit && *maybe == name {
                return false;
            }
        }
        !noexport.iter().any(|n| n == name)
    }

    /// Installs an entry without affecting the explicit-assignment flags.
    ///
    /// Used for default values at startup and for imported entries; the
    /// cached exported form, if given, is kept so a round trip re-exports the
    /// inherited bytes untouched.
    pub fn install(&mut self, name: &str, values: Vec<String>, cache: Option<CString>) {
        self.dirty = true;
        let entry = self.table.get_or_insert_with(name, Variable::default);
        entry.value = Some(values);
        entry.export_cache = cache;
    }

    /// Collects the exported `NAME=value` strings of all exportable
    /// variables, building and caching any missing external forms.
    pub(crate) fn export_strings(&mut self, noexport: &[String]) -> Vec<CString> {
        let explicit = self.explicit;
        let mut out = Vec::new();
        for (name, var) in self.table.iter_mut() {
            let withheld = MAYBE_EXPORT
                .iter()
                .zip(&explicit)
                .any(|(maybe, explicit)| !explicit && *maybe == name);
            if withheld || noexport.iter().any(|n| n == name) {
                continue;
            }
            let Some(values) = &var.value else { continue };
            if var.export_cache.is_none() {
                let mut bytes = crate::exports::encode_name(name).into_bytes();
                bytes.push(b'=');
                bytes.extend_from_slice(
                    values.join("\u{1}").as_bytes(),
                );
                var.export_cache = CString::new(bytes).ok();
            }
            if let Some(cached) = &var.export_cache {
                out.push(cached.clone());
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.table.iter()
    }
}
