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

//! The command reader.
//!
//! A deliberately small front end standing in for a full rc parser: it
//! splits a line into pipelines of simple commands, with `'…'` quoting,
//! `$name` and `$status` expansion, assignments (global and per-command),
//! the redirection operators `<`, `>`, `>>`, `>[n]`, `>[n=m]`, `>[n=]`,
//! pipes, `;` separators, comments and a trailing `&`. The execution layer
//! consumes its output; anything beyond this little language is out of its
//! reach by design.

use rcsh_env::redir::OpenKind;
use rcsh_env::redir::Redir;
use rcsh_env::semantics::Command;
use rcsh_env::semantics::Pipeline;
use rcsh_env::Env;
use thiserror::Error;

/// One statement of a line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Stmt {
    /// Global assignments, applied in order.
    Assign(Vec<(String, Vec<String>)>),
    /// A pipeline to run.
    Run(Pipeline),
}

/// Error in reading a line.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SyntaxError {
    #[error("syntax error near `{0}'")]
    Near(String),

    #[error("unterminated quote")]
    UnterminatedQuote,

    #[error("bad redirection")]
    BadRedirection,
}

/// Splits one line into statements, expanding variables as it goes.
pub fn parse_line(env: &Env, line: &str) -> Result<Vec<Stmt>, SyntaxError> {
    let mut parser = Parser { bytes: line.as_bytes(), pos: 0, env };
    parser.parse_statements()
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    env: &'a Env,
}

fn is_word_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b' ' | b'\t' | b'|' | b';' | b'&' | b'<' | b'>' | b'#' | b'(' | b')'
    )
}

fn is_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'*'
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.pos += 1;
        }
    }

    fn parse_statements(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut statements = Vec::new();
        loop {
            self.skip_blanks();
            match self.peek() {
                None | Some(b'#') => break,
                Some(b';') => {
                    self.pos += 1;
                    continue;
                }
                _ => statements.push(self.parse_job()?),
            }
        }
        Ok(statements)
    }

    fn parse_job(&mut self) -> Result<Stmt, SyntaxError> {
        let mut assignments = Vec::new();
        loop {
            self.skip_blanks();
            match self.try_assignment()? {
                Some(assignment) => assignments.push(assignment),
                None => break,
            }
        }

        let mut commands: Vec<Command> = Vec::new();
        let mut current = Command::default();
        let mut background = false;
        loop {
            self.skip_blanks();
            match self.peek() {
                None | Some(b'#') => break,
                Some(b';') => {
                    self.pos += 1;
                    break;
                }
                Some(b'&') => {
                    self.pos += 1;
                    background = true;
                    break;
                }
                Some(b'|') => {
                    self.pos += 1;
                    if current.words.is_empty() && current.redirs.is_empty() {
                        return Err(SyntaxError::Near("|".to_owned()));
                    }
                    commands.push(std::mem::take(&mut current));
                }
                Some(b'<') | Some(b'>') => {
                    let redir = self.parse_redir()?;
                    current.redirs.push(redir);
                }
                Some(b'(') | Some(b')') => {
                    let near = self.peek().unwrap() as char;
                    return Err(SyntaxError::Near(near.to_string()));
                }
                _ => {
                    let words = self.parse_word()?;
                    current.words.extend(words);
                }
            }
        }

        let current_is_empty = current.words.is_empty() && current.redirs.is_empty();
        if commands.is_empty() && current_is_empty {
            if assignments.is_empty() {
                return Err(SyntaxError::Near("&".to_owned()));
            }
            return Ok(Stmt::Assign(assignments));
        }
        if current_is_empty {
            return Err(SyntaxError::Near("|".to_owned()));
        }
        current.locals = assignments;
        if !commands.is_empty() {
            // The locals were collected before the first member.
            let locals = std::mem::take(&mut current.locals);
            commands[0].locals = locals;
        }
        commands.push(current);
        Ok(Stmt::Run(Pipeline { commands, background }))
    }

    /// Consumes `NAME=value` or `NAME=(words…)` if the input starts with
    /// one.
    fn try_assignment(&mut self) -> Result<Option<(String, Vec<String>)>, SyntaxError> {
        let saved = self.pos;
        let mut end = self.pos;
        while end < self.bytes.len() && is_name_byte(self.bytes[end]) {
            end += 1;
        }
        if end == self.pos || self.bytes.get(end) != Some(&b'=') {
            return Ok(None);
        }
        let name = String::from_utf8_lossy(&self.bytes[self.pos..end]).into_owned();
        self.pos = end + 1;

        if self.peek() == Some(b'(') {
            self.pos += 1;
            let mut values = Vec::new();
            loop {
                self.skip_blanks();
                match self.peek() {
                    Some(b')') => {
                        self.pos += 1;
                        break;
                    }
                    None => {
                        self.pos = saved;
                        return Err(SyntaxError::Near("(".to_owned()));
                    }
                    _ => values.extend(self.parse_word()?),
                }
            }
            return Ok(Some((name, values)));
        }

        let values = match self.peek() {
            None => Vec::new(),
            Some(b) if b == b' ' || b == b'\t' || b == b';' || b == b'&' || b == b'#' => Vec::new(),
            _ => self.parse_word()?,
        };
        Ok(Some((name, values)))
    }

    fn parse_redir(&mut self) -> Result<Redir, SyntaxError> {
        let mut kind = if self.peek() == Some(b'<') {
            OpenKind::Read
        } else {
            OpenKind::Create
        };
        self.pos += 1;
        if kind == OpenKind::Create && self.peek() == Some(b'>') {
            self.pos += 1;
            kind = OpenKind::Append;
        }

        let mut fd = kind.default_fd();
        if self.peek() == Some(b'[') {
            self.pos += 1;
            fd = self.parse_fd_number()?;
            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                }
                Some(b'=') => {
                    self.pos += 1;
                    if self.peek() == Some(b']') {
                        self.pos += 1;
                        return Ok(Redir::Close { fd });
                    }
                    let from = self.parse_fd_number()?;
                    if self.peek() != Some(b']') {
                        return Err(SyntaxError::BadRedirection);
                    }
                    self.pos += 1;
                    return Ok(Redir::Dup { fd, from });
                }
                _ => return Err(SyntaxError::BadRedirection),
            }
        }

        self.skip_blanks();
        let mut target = self.parse_word()?;
        if target.len() != 1 || target[0].is_empty() {
            return Err(SyntaxError::BadRedirection);
        }
        Ok(Redir::Open { kind, fd, path: target.remove(0) })
    }

    fn parse_fd_number(&mut self) -> Result<i32, SyntaxError> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(SyntaxError::BadRedirection);
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .unwrap()
            .parse()
            .map_err(|_| SyntaxError::BadRedirection)
    }

    /// Reads one word, expanding `'…'` quoting and `$` references.
    ///
    /// A word that is exactly one `$name` splices the variable's whole
    /// list, so it may produce zero or many fields; anything concatenated
    /// flattens into a single field.
    fn parse_word(&mut self) -> Result<Vec<String>, SyntaxError> {
        enum Segment {
            Literal(String),
            Expansion(Vec<String>),
        }

        let mut segments = Vec::new();
        loop {
            match self.peek() {
                None => break,
                Some(b) if is_word_delimiter(b) => break,
                Some(b'\'') => {
                    let text = self.parse_quoted()?;
                    segments.push(Segment::Literal(text));
                }
                Some(b'$') => {
                    self.pos += 1;
                    let start = self.pos;
                    while matches!(self.peek(), Some(b) if is_name_byte(b)) {
                        self.pos += 1;
                    }
                    if self.pos == start {
                        segments.push(Segment::Literal("$".to_owned()));
                        continue;
                    }
                    let name = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
                    let values = if name == "status" {
                        self.env.status_list()
                    } else if name != "0" && name.bytes().all(|b| b.is_ascii_digit()) {
                        // $n indexes the argument list $*, one-based.
                        let index: usize = name.parse().unwrap_or(0);
                        self.env
                            .var("*")
                            .and_then(|params| params.get(index.checked_sub(1)?))
                            .map(|value| vec![value.clone()])
                            .unwrap_or_default()
                    } else {
                        self.env.var(&name).map(<[String]>::to_vec).unwrap_or_default()
                    };
                    segments.push(Segment::Expansion(values));
                }
                Some(_) => {
                    let start = self.pos;
                    while let Some(b) = self.peek() {
                        if is_word_delimiter(b) || b == b'\'' || b == b'$' {
                            break;
                        }
                        self.pos += 1;
                    }
                    let text = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
                    segments.push(Segment::Literal(text));
                }
            }
        }

        match segments.as_slice() {
            [Segment::Expansion(values)] => return Ok(values.clone()),
            _ => {}
        }
        let mut word = String::new();
        for segment in segments {
            match segment {
                Segment::Literal(text) => word.push_str(&text),
                Segment::Expansion(values) => word.push_str(&values.join(" ")),
            }
        }
        Ok(vec![word])
    }

    /// Reads a `'…'` quote; a doubled `''` inside stands for one quote.
    fn parse_quoted(&mut self) -> Result<String, SyntaxError> {
        debug_assert_eq!(self.peek(), Some(b'\''));
        self.pos += 1;
        let mut text = Vec::new();
        loop {
            match self.peek() {
                None => return Err(SyntaxError::UnterminatedQuote),
                Some(b'\'') => {
                    self.pos += 1;
                    if self.peek() == Some(b'\'') {
                        text.push(b'\'');
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                Some(b) => {
                    text.push(b);
                    self.pos += 1;
                }
            }
        }
        Ok(String::from_utf8_lossy(&text).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcsh_env::option::OptionSet;

    fn env() -> Env {
        Env::new(OptionSet::new())
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn single_command(line: &str, env: &Env) -> Command {
        let stmts = parse_line(env, line).unwrap();
        assert_eq!(stmts.len(), 1, "{stmts:?}");
        match &stmts[0] {
            Stmt::Run(pipeline) => {
                assert_eq!(pipeline.commands.len(), 1);
                pipeline.commands[0].clone()
            }
            other => panic!("expected a pipeline: {other:?}"),
        }
    }

    #[test]
    fn words_split_on_blanks() {
        let cmd = single_command("echo  one\ttwo", &env());
        assert_eq!(cmd.words, strings(&["echo", "one", "two"]));
    }

    #[test]
    fn quotes_join_and_double_up() {
        let cmd = single_command("echo 'hello world' 'don''t'", &env());
        assert_eq!(cmd.words, strings(&["echo", "hello world", "don't"]));
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert_eq!(
            parse_line(&env(), "echo 'oops"),
            Err(SyntaxError::UnterminatedQuote)
        );
    }

    #[test]
    fn bare_variable_splices_its_list() {
        let mut env = env();
        env.set_var("x", strings(&["a", "b"]), false);
        let cmd = single_command("echo $x end", &env);
        assert_eq!(cmd.words, strings(&["echo", "a", "b", "end"]));
    }

    #[test]
    fn unset_variable_expands_to_nothing() {
        let cmd = single_command("echo $nothing here", &env());
        assert_eq!(cmd.words, strings(&["echo", "here"]));
    }

    #[test]
    fn embedded_variable_flattens_into_the_word() {
        let mut env = env();
        env.set_var("x", strings(&["a", "b"]), false);
        let cmd = single_command("echo pre$x", &env);
        assert_eq!(cmd.words, strings(&["echo", "prea b"]));
    }

    #[test]
    fn positional_parameters_index_the_argument_list() {
        let mut env = env();
        env.set_var("0", strings(&["rc"]), false);
        env.set_var("*", strings(&["a", "b", "c"]), false);
        let cmd = single_command("echo $0 $2 $4", &env);
        assert_eq!(cmd.words, strings(&["echo", "rc", "b"]));
    }

    #[test]
    fn status_expands_from_the_status_vector() {
        let mut env = env();
        env.set_status_from_strings(&strings(&["0"]));
        let cmd = single_command("echo $status", &env);
        assert_eq!(cmd.words, strings(&["echo", "0"]));
    }

    #[test]
    fn pipelines_split_into_members() {
        let stmts = parse_line(&env(), "a one | b | c two").unwrap();
        let Stmt::Run(pipeline) = &stmts[0] else { panic!() };
        assert_eq!(pipeline.commands.len(), 3);
        assert_eq!(pipeline.commands[0].words, strings(&["a", "one"]));
        assert_eq!(pipeline.commands[1].words, strings(&["b"]));
        assert_eq!(pipeline.commands[2].words, strings(&["c", "two"]));
        assert!(!pipeline.background);
    }

    #[test]
    fn trailing_ampersand_backgrounds_the_job() {
        let stmts = parse_line(&env(), "sleep 2 &").unwrap();
        let Stmt::Run(pipeline) = &stmts[0] else { panic!() };
        assert!(pipeline.background);
    }

    #[test]
    fn semicolons_separate_statements() {
        let stmts = parse_line(&env(), "a; b ;c").unwrap();
        assert_eq!(stmts.len(), 3);
    }

    #[test]
    fn comments_run_to_end_of_line() {
        let stmts = parse_line(&env(), "echo one # echo two").unwrap();
        assert_eq!(stmts.len(), 1);
        let Stmt::Run(pipeline) = &stmts[0] else { panic!() };
        assert_eq!(pipeline.commands[0].words, strings(&["echo", "one"]));
    }

    #[test]
    fn global_assignment_scalar_and_list() {
        let stmts = parse_line(&env(), "x=1; y=(a b c)").unwrap();
        assert_eq!(
            stmts,
            vec![
                Stmt::Assign(vec![("x".to_owned(), strings(&["1"]))]),
                Stmt::Assign(vec![("y".to_owned(), strings(&["a", "b", "c"]))]),
            ]
        );
    }

    #[test]
    fn command_local_assignment_attaches_to_the_command() {
        let cmd = single_command("x=1 echo hi", &env());
        assert_eq!(cmd.locals, vec![("x".to_owned(), strings(&["1"]))]);
        assert_eq!(cmd.words, strings(&["echo", "hi"]));
    }

    #[test]
    fn redirections_parse_with_fds_and_dups() {
        let cmd = single_command("cmd <in >out >>log", &env());
        assert_eq!(
            cmd.redirs,
            vec![
                Redir::Open { kind: OpenKind::Read, fd: 0, path: "in".to_owned() },
                Redir::Open { kind: OpenKind::Create, fd: 1, path: "out".to_owned() },
                Redir::Open { kind: OpenKind::Append, fd: 1, path: "log".to_owned() },
            ]
        );

        let cmd = single_command("cmd >[2]err >[2=1] >[3=]", &env());
        assert_eq!(
            cmd.redirs,
            vec![
                Redir::Open { kind: OpenKind::Create, fd: 2, path: "err".to_owned() },
                Redir::Dup { fd: 2, from: 1 },
                Redir::Close { fd: 3 },
            ]
        );
    }

    #[test]
    fn bare_redirection_makes_a_wordless_command() {
        let cmd = single_command("> foo", &env());
        assert!(cmd.words.is_empty());
        assert_eq!(
            cmd.redirs,
            vec![Redir::Open { kind: OpenKind::Create, fd: 1, path: "foo".to_owned() }]
        );
    }

    #[test]
    fn dangling_pipe_is_a_syntax_error() {
        assert!(parse_line(&env(), "a |").is_err());
        assert!(parse_line(&env(), "| a").is_err());
    }

    #[test]
    fn parentheses_outside_assignments_are_rejected() {
        assert!(parse_line(&env(), "echo (a b)").is_err());
    }
}
