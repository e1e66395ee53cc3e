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

//! Type definitions for shell options.
//!
//! This module defines the [`OptionSet`] the shell carries: one bit per
//! command line flag. It only stores the state; acting on an option is the
//! caller's business.

use enumset::EnumSet;
use enumset::EnumSetType;

/// Shell option.
///
/// Every option corresponds to one command line flag letter.
#[derive(Clone, Copy, Debug, EnumSetType, Eq, Hash, PartialEq)]
#[enumset(no_super_impls)]
#[non_exhaustive]
pub enum Option {
    /// Runs the command given as an operand and exits (`-c`).
    CmdLine,
    /// Enables features for interactive use: prompts, job messages (`-i`).
    Interactive,
    /// Acts as a login shell (`-l`).
    Login,
    /// Reads commands from the standard input without implying
    /// interactivity (`-s`).
    Stdin,
    /// Parses input without executing it (`-n`).
    NoExec,
    /// Does not import functions from the environment (`-p`).
    NoImport,
    /// Exits as soon as a command reports a non-zero status (`-e`).
    ErrExit,
    /// Echoes input lines as they are read (`-v`).
    Verbose,
    /// Traces commands before executing them (`-x`).
    XTrace,
    /// Dumps parse trees when built with develop support (`-d`).
    Debug,
    /// Refuses to overwrite existing files with `>` (`-o`).
    NoClobber,
}

/// Set of options currently in effect.
pub type OptionSet = EnumSet<Option>;

/// Maps a flag letter to the option it controls.
#[must_use]
pub fn parse_short(letter: char) -> std::option::Option<self::Option> {
    use self::Option::*;
    match letter {
        'c' => Some(CmdLine),
        'i' => Some(Interactive),
        'l' => Some(Login),
        's' => Some(Stdin),
        'n' => Some(NoExec),
        'p' => Some(NoImport),
        'e' => Some(ErrExit),
        'v' => Some(Verbose),
        'x' => Some(XTrace),
        'd' => Some(Debug),
        'o' => Some(NoClobber),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_flag_letter_maps_to_a_distinct_option() {
        let letters = "cilsnpevxdo";
        let mut seen = OptionSet::new();
        for letter in letters.chars() {
            let option = parse_short(letter).unwrap();
            assert!(!seen.contains(option), "duplicate for -{letter}");
            seen.insert(option);
        }
        assert_eq!(seen.len(), letters.len());
    }

    #[test]
    fn unknown_letters_do_not_parse() {
        assert_eq!(parse_short('q'), None);
        assert_eq!(parse_short('C'), None);
    }
}
