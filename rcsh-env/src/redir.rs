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

//! Type definitions for the redirection queue.
//!
//! Redirections are staged by the reader and applied in order by the
//! dispatcher just before a command runs. This module only defines the queued
//! form; applying it is execution-layer business.

use std::os::unix::io::RawFd;

/// How a file redirection opens its target.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpenKind {
    /// `<`: open for reading.
    Read,
    /// `>`: create or truncate for writing.
    Create,
    /// `>>`: create or append for writing.
    Append,
}

impl OpenKind {
    /// Default file descriptor this kind applies to when none is given.
    #[must_use]
    pub fn default_fd(self) -> RawFd {
        match self {
            OpenKind::Read => 0,
            OpenKind::Create | OpenKind::Append => 1,
        }
    }
}

/// One queued redirection.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Redir {
    /// Opens `path` and moves the resulting descriptor to `fd`.
    Open {
        kind: OpenKind,
        fd: RawFd,
        path: String,
    },
    /// Duplicates descriptor `from` onto `fd` (`>[fd=from]`).
    Dup { fd: RawFd, from: RawFd },
    /// Closes descriptor `fd` (`>[fd=]`).
    Close { fd: RawFd },
}
