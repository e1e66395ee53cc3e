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

//! Runtime execution layer of the rcsh shell.
//!
//! Given an already-parsed command this crate decides how to run it: the
//! [dispatcher](exec::exec) resolves builtins and functions, unwinds the
//! `exec` and `builtin` prefixes, forks when it must, applies the staged
//! redirections and accounts for child statuses; [`command_search`] resolves
//! external command names against `$path` with a memoizing cache; and
//! [`execve`] emulates `#!` on systems whose kernel does not honour it.

pub mod builtin;
pub mod command_search;
pub mod exec;
pub mod execve;
pub mod pipeline;
pub mod redir;

pub use crate::command_search::which;
pub use crate::exec::exec;
pub use crate::pipeline::run_pipeline;
