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

//! Application of the redirection queue.

use nix::fcntl::open;
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use nix::unistd::close;
use nix::unistd::dup2;
use rcsh_env::io;
use rcsh_env::option::Option as ShellOption;
use rcsh_env::redir::OpenKind;
use rcsh_env::redir::Redir;
use rcsh_env::Env;
use thiserror::Error;

/// Failure to apply one redirection. The offending operator has already
/// been reported; the queue is dropped.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("redirection failed")]
pub struct RedirError;

/// Applies and empties the staged redirection queue, in order.
///
/// Each failure is reported immediately; the first one aborts the rest of
/// the queue. With the `-o` option a `>` target that already exists is
/// refused instead of truncated.
pub fn apply_redirs(env: &mut Env) -> Result<(), RedirError> {
    let queue = std::mem::take(&mut env.redirs);
    for redir in queue {
        match redir {
            Redir::Open { kind, fd, path } => {
                let flags = match kind {
                    OpenKind::Read => OFlag::O_RDONLY,
                    OpenKind::Create if env.options.contains(ShellOption::NoClobber) => {
                        OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_EXCL
                    }
                    OpenKind::Create => OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
                    OpenKind::Append => OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_APPEND,
                };
                let mode = Mode::from_bits_truncate(0o666);
                let new = match open(path.as_str(), flags, mode) {
                    Ok(new) => new,
                    Err(errno) => {
                        io::sys_error(&path, errno);
                        return Err(RedirError);
                    }
                };
                if new != fd {
                    if let Err(errno) = dup2(new, fd) {
                        io::sys_error(&path, errno);
                        close(new).ok();
                        return Err(RedirError);
                    }
                    close(new).ok();
                }
            }
            Redir::Dup { fd, from } => {
                if let Err(errno) = dup2(from, fd) {
                    io::sys_error(&format!("fd {from}"), errno);
                    return Err(RedirError);
                }
            }
            Redir::Close { fd } => {
                close(fd).ok();
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcsh_env::option::OptionSet;
    use std::fs;

    // Applying to a fresh descriptor keeps the test away from the process's
    // real standard streams.
    #[test]
    fn create_truncates_and_noclobber_refuses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        fs::write(&path, "old contents").unwrap();

        let mut env = Env::new(OptionSet::new());
        env.redirs.push(Redir::Open {
            kind: OpenKind::Create,
            fd: 9,
            path: path.to_str().unwrap().to_owned(),
        });
        assert_eq!(apply_redirs(&mut env), Ok(()));
        close(9).ok();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        assert!(env.redirs.is_empty());

        fs::write(&path, "keep me").unwrap();
        let mut env = Env::new(ShellOption::NoClobber.into());
        env.redirs.push(Redir::Open {
            kind: OpenKind::Create,
            fd: 9,
            path: path.to_str().unwrap().to_owned(),
        });
        assert_eq!(apply_redirs(&mut env), Err(RedirError));
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep me");
    }

    #[test]
    fn missing_input_file_fails_and_drops_the_queue() {
        let mut env = Env::new(OptionSet::new());
        env.redirs.push(Redir::Open {
            kind: OpenKind::Read,
            fd: 9,
            path: "/no/such/input".to_owned(),
        });
        env.redirs.push(Redir::Close { fd: 9 });
        assert_eq!(apply_redirs(&mut env), Err(RedirError));
        assert!(env.redirs.is_empty());
    }
}
