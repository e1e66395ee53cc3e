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

//! An `execve` with `#!` emulation for systems whose kernel lacks it.
//!
//! When the plain `execve` fails with `ENOEXEC`, the first line of the file
//! is parsed for an interpreter and at most one argument, both of which are
//! prepended to the argument vector before a second attempt. The argv built
//! here keeps two free slots of head room for exactly this purpose, so the
//! retry allocates nothing after the first `execve` has failed.

use nix::errno::Errno;
use nix::fcntl::open;
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use nix::unistd::close;
use rcsh_env::system;
use std::ffi::CStr;
use std::ffi::CString;

/// Size limit of the `#!` line: interpreter, one argument and the newline
/// must fit.
const HEADER_LIMIT: usize = 256;

/// Replaces the current process image, emulating `#!` if necessary.
///
/// Returns the error of the final `execve` attempt; on success it does not
/// return at all.
pub fn rc_execve(path: &CStr, args: &[CString], envs: &[CString]) -> Errno {
    // Reserve the head room before the first attempt; the fallback path
    // must not allocate.
    let mut header = [0u8; HEADER_LIMIT];
    let mut argv: Vec<&CStr> = Vec::with_capacity(args.len() + 2);
    argv.push(path);
    argv.push(path);
    argv.extend(args.iter().map(CString::as_c_str));

    match nix::unistd::execve(path, &argv[2..], envs) {
        Err(Errno::ENOEXEC) => {}
        Err(errno) => return errno,
        Ok(infallible) => match infallible {},
    }

    let Ok(fd) = open(path, OFlag::O_RDONLY, Mode::empty()) else {
        return Errno::ENOEXEC;
    };
    let len = system::read(fd, &mut header).unwrap_or(0);
    close(fd).ok();

    let Some((interpreter, argument)) = parse_interpreter(&mut header[..len]) else {
        return Errno::ENOEXEC;
    };

    // Two slots precede the argument vector; fill them back to front. The
    // script name is replaced by its full path.
    argv[2] = path;
    let start = if let Some(argument) = argument {
        argv[1] = argument;
        argv[0] = interpreter;
        0
    } else {
        argv[1] = interpreter;
        1
    };
    match nix::unistd::execve(argv[start], &argv[start..], envs) {
        Err(errno) => errno,
        Ok(infallible) => match infallible {},
    }
}

fn is_blank(byte: u8) -> bool {
    byte == b' ' || byte == b'\t'
}

/// Parses a `#!` header in place, null-terminating the tokens.
///
/// Accepts an interpreter and at most one argument; the line must end in a
/// newline within the buffer. Returns `None` for anything else, including a
/// third token.
fn parse_interpreter(header: &mut [u8]) -> Option<(&CStr, Option<&CStr>)> {
    let len = header.len();
    if len < 2 || header[0] != b'#' || header[1] != b'!' {
        return None;
    }

    let mut first = 2;
    while first < len && is_blank(header[first]) {
        first += 1;
    }
    if first == len {
        return None;
    }
    let mut second = first;
    while second < len && !is_blank(header[second]) && header[second] != b'\n' {
        second += 1;
    }
    if second == len {
        return None;
    }
    let mut no_argument = header[second] == b'\n';
    header[second] = 0;
    second += 1;

    let mut arg_range = None;
    if !no_argument {
        while second < len && is_blank(header[second]) {
            second += 1;
        }
        if second == len {
            return None;
        }
        // Trailing blanks after the interpreter are allowed.
        no_argument = header[second] == b'\n';
        if !no_argument {
            let mut end = second;
            while end < len && !is_blank(header[end]) && header[end] != b'\n' {
                end += 1;
            }
            if end == len {
                return None;
            }
            if header[end] == b'\n' {
                header[end] = 0;
            } else {
                header[end] = 0;
                end += 1;
                while end < len && is_blank(header[end]) {
                    end += 1;
                }
                // A third token is an error.
                if end == len || header[end] != b'\n' {
                    return None;
                }
            }
            arg_range = Some(second);
        }
    }

    let interpreter = CStr::from_bytes_until_nul(&header[first..]).ok()?;
    let argument = match arg_range {
        Some(start) => Some(CStr::from_bytes_until_nul(&header[start..]).ok()?),
        None => None,
    };
    Some((interpreter, argument))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Option<(CString, Option<CString>)> {
        let mut buffer = text.as_bytes().to_vec();
        parse_interpreter(&mut buffer)
            .map(|(i, a)| (i.to_owned(), a.map(CStr::to_owned)))
    }

    #[test]
    fn plain_interpreter_line() {
        let (interpreter, argument) = parse("#!/bin/awk\n").unwrap();
        assert_eq!(interpreter.as_c_str(), c"/bin/awk");
        assert_eq!(argument, None);
    }

    #[test]
    fn interpreter_with_one_argument() {
        let (interpreter, argument) = parse("#!/bin/awk -f\nBEGIN {}\n").unwrap();
        assert_eq!(interpreter.as_c_str(), c"/bin/awk");
        assert_eq!(argument.unwrap().as_c_str(), c"-f");
    }

    #[test]
    fn blanks_around_the_tokens_are_skipped() {
        let (interpreter, argument) = parse("#! \t/bin/awk \t-f \t\nrest").unwrap();
        assert_eq!(interpreter.as_c_str(), c"/bin/awk");
        assert_eq!(argument.unwrap().as_c_str(), c"-f");

        let (interpreter, argument) = parse("#!/bin/awk   \n").unwrap();
        assert_eq!(interpreter.as_c_str(), c"/bin/awk");
        assert_eq!(argument, None);
    }

    #[test]
    fn two_arguments_are_rejected() {
        assert_eq!(parse("#!/bin/awk -f extra\n"), None);
    }

    #[test]
    fn missing_magic_is_rejected() {
        assert_eq!(parse("/bin/awk\n"), None);
        assert_eq!(parse("#%/bin/awk\n"), None);
        assert_eq!(parse(""), None);
        assert_eq!(parse("#"), None);
    }

    #[test]
    fn unterminated_lines_are_rejected() {
        // The first line must end within the buffer the kernel-free parser
        // gets to see.
        assert_eq!(parse("#!/bin/awk"), None);
        assert_eq!(parse("#!   "), None);
        assert_eq!(parse("#!/bin/awk -f"), None);
    }
}
