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

//! Line input on a raw file descriptor.
//!
//! The reader pulls bytes through the slow-call wrapper so that a caught
//! signal aborts a blocking read with `EINTR` instead of being lost; the
//! reader loop turns that into an interrupt via the deferred signal check.

use rcsh_env::system;
use std::os::unix::io::RawFd;

const CHUNK: usize = 4096;

/// Buffered reader yielding one line at a time.
#[derive(Debug)]
pub struct LineReader {
    fd: RawFd,
    buffer: Vec<u8>,
    eof: bool,
}

impl LineReader {
    #[must_use]
    pub fn new(fd: RawFd) -> Self {
        LineReader { fd, buffer: Vec::new(), eof: false }
    }

    /// Reads the next line, without its newline.
    ///
    /// Returns `Ok(None)` at end of input. An `EINTR` failure is passed
    /// through for the caller's signal check.
    pub fn next_line(&mut self) -> nix::Result<Option<String>> {
        loop {
            if let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
                let rest = self.buffer.split_off(end + 1);
                let mut line = std::mem::replace(&mut self.buffer, rest);
                line.pop();
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }
            if self.eof {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                let line = std::mem::take(&mut self.buffer);
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }

            let mut chunk = [0u8; CHUNK];
            match system::read(self.fd, &mut chunk)? {
                0 => self.eof = true,
                count => self.buffer.extend_from_slice(&chunk[..count]),
            }
        }
    }
}
