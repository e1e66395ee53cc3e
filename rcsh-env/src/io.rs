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

//! Diagnostic output.
//!
//! Every diagnostic goes to file descriptor 2 through the slow-call safe
//! [`write_all`](crate::system::write_all) wrapper, prefixed `rc: `. Names
//! taken from user input are passed through [`protect`] first so that
//! non-printable bytes cannot reach the terminal.

use crate::system;
use nix::errno::Errno;

/// Prefix of every diagnostic.
pub const RC: &str = "rc: ";

/// Writes `rc: <message>` and a newline to standard error.
pub fn note(message: &str) {
    let mut line = String::with_capacity(RC.len() + message.len() + 1);
    line.push_str(RC);
    line.push_str(message);
    line.push('\n');
    system::write_all(2, line.as_bytes());
}

/// Reports a system call failure concerning `subject`.
pub fn sys_error(subject: &str, errno: Errno) {
    note(&format!("{}: {}", protect(subject), errno.desc()));
}

/// Replaces non-printable characters with question marks.
#[must_use]
pub fn protect(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protect_passes_printable_text_through() {
        assert_eq!(protect("ls -l"), "ls -l");
    }

    #[test]
    fn protect_masks_control_and_non_ascii_bytes() {
        assert_eq!(protect("a\x07b"), "a?b");
        assert_eq!(protect("tab\there"), "tab?here");
        assert_eq!(protect("café"), "caf?");
    }
}
