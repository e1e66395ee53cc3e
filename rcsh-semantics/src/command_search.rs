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

//! Executability probe and path search.
//!
//! [`which`] resolves a command name to a full path using the `path`
//! variable and the command path cache, testing candidates with
//! [`rc_access`]. The probe does its own permission arithmetic instead of
//! calling `access(2)` so that a shell running setuid, or executing files
//! owned by a supplementary group, gets the right answer.

use nix::errno::Errno;
use nix::sys::stat::stat;
use nix::sys::stat::SFlag;
use nix::unistd::Gid;
use rcsh_env::io;
use rcsh_env::Env;

const X_USR: u32 = 0o100;
const X_GRP: u32 = 0o010;
const X_OTH: u32 = 0o001;
const X_ALL: u32 = X_USR | X_GRP | X_OTH;

/// Whether a name bypasses the path search.
///
/// Besides absolute paths, names explicitly anchored to the current or
/// parent directory count.
#[must_use]
pub fn is_absolute(name: &str) -> bool {
    name.starts_with('/') || name.starts_with("./") || name.starts_with("../")
}

/// Tests whether this shell could execute the file at `path`.
///
/// The mode bit tested is selected from the identity captured at startup:
/// root may use any execute bit, the owner the owner bit, a primary or
/// supplementary group member the group bit, anyone else the other bit. The
/// file must also be regular. On failure a diagnostic is printed when
/// `verbose` (set only for names that bypass the path search).
pub fn rc_access(env: &Env, path: &str, verbose: bool) -> bool {
    let st = match stat(path) {
        Ok(st) => st,
        Err(errno) => {
            if verbose {
                io::sys_error(path, errno);
            }
            return false;
        }
    };
    let mask = if env.access.uid.is_root() {
        X_ALL
    } else if env.access.uid.as_raw() == st.st_uid {
        X_USR
    } else if env.access.in_groups(Gid::from_raw(st.st_gid)) {
        X_GRP
    } else {
        X_OTH
    };
    let mode = st.st_mode as u32;
    if mode & SFlag::S_IFMT.bits() as u32 == SFlag::S_IFREG.bits() as u32 && mode & mask != 0 {
        return true;
    }
    if verbose {
        io::sys_error(path, Errno::EACCES);
    }
    false
}

/// Joins a directory and a command name.
///
/// An empty directory yields the bare name (`$path` may name the current
/// directory that way). A directory already ending in `/` gets no second
/// slash, which also preserves a leading `//`, special to POSIX.
#[must_use]
pub fn join(dir: &str, cmd: &str) -> String {
    if dir.is_empty() {
        return cmd.to_owned();
    }
    let mut full = String::with_capacity(dir.len() + cmd.len() + 1);
    full.push_str(dir);
    if !full.ends_with('/') {
        full.push('/');
    }
    full.push_str(cmd);
    full
}

/// Resolves a command name to a full path by searching `$path`.
///
/// A `None` name resolves to `None`; this is what makes a bare redirection
/// like `> foo` a command. An absolute name is probed directly. Otherwise
/// the cache is consulted first (a hit skips the probe entirely), and then
/// the directories of `$path` in order; the first directory that passes the
/// probe is recorded in the cache. When nothing matches and `verbose` is
/// set, the failure is reported with non-printable bytes masked.
pub fn which(env: &mut Env, name: Option<&str>, verbose: bool) -> Option<String> {
    let name = name?;
    if is_absolute(name) {
        return rc_access(env, name, verbose).then(|| name.to_owned());
    }
    if let Some(dir) = env.commands.get(name) {
        return Some(join(dir, name));
    }
    let dirs = env.var("path").map(<[String]>::to_vec).unwrap_or_default();
    for dir in dirs {
        let full = join(&dir, name);
        if rc_access(env, &full, false) {
            env.commands.insert(name, dir);
            return Some(full);
        }
    }
    if verbose {
        io::note(&format!("cannot find `{}'", io::protect(name)));
    }
    None
}

/// Drops a command from the cache if it is no longer executable.
///
/// Called after an external command exits non-zero; if the cached path has
/// gone stale, the next invocation walks `$path` again and may discover a
/// replacement elsewhere.
pub fn verify_cmd(env: &mut Env, fullpath: &str) {
    if rc_access(env, fullpath, false) {
        return;
    }
    if let Some(slash) = fullpath.rfind('/') {
        let cmd = &fullpath[slash + 1..];
        if !cmd.is_empty() {
            env.commands.delete(cmd);
        }
    }
}
