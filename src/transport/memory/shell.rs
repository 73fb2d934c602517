// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A very small POSIX-ish shell used by in-memory hosts.
//!
//! Supported: `;`, `&&`, `||`, single and double quotes, `$?` and `$name`
//! expansion, `name=value` assignments, `exit`, `sudo` and the builtins
//! `true`, `false`, `echo`, `cat`, `test -e|-f|-d`, `cp`, `rm`, `mkdir -p`
//! and `chmod`. Anything else exits with 127.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::transport::CommandOutput;

/// Files and directories of one in-memory host.
#[derive(Debug, Default, Clone)]
pub(super) struct FileSystem {
    pub files: BTreeMap<String, Vec<u8>>,
    pub dirs: BTreeSet<String>,
    /// Paths the login user may write without `sudo`.
    pub writable_prefixes: Vec<String>,
}

impl FileSystem {
    pub fn is_writable(&self, path: &str) -> bool {
        self.writable_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path) || self.dirs.contains(path.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Var(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(Vec<Segment>),
    Seq,
    And,
    Or,
}

fn push_literal(word: &mut Vec<Segment>, c: char) {
    if let Some(Segment::Literal(text)) = word.last_mut() {
        text.push(c);
    } else {
        word.push(Segment::Literal(c.to_string()));
    }
}

fn read_var(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<String> {
    if chars.peek() == Some(&'?') {
        chars.next();
        return Some("?".to_string());
    }
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_alphanumeric() || c == '_' {
            name.push(c);
            chars.next();
        } else {
            break;
        }
    }
    (!name.is_empty()).then_some(name)
}

fn tokenize(command: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut word: Option<Vec<Segment>> = None;
    let mut chars = command.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' | '\n' => {
                if let Some(w) = word.take() {
                    tokens.push(Token::Word(w));
                }
            }
            ';' | '&' | '|' => {
                if let Some(w) = word.take() {
                    tokens.push(Token::Word(w));
                }
                let token = match c {
                    ';' => Token::Seq,
                    '&' if chars.next_if_eq(&'&').is_some() => Token::And,
                    '|' if chars.next_if_eq(&'|').is_some() => Token::Or,
                    other => return Err(format!("unsupported operator '{other}'")),
                };
                tokens.push(token);
            }
            '\'' => {
                let w = word.get_or_insert_with(Vec::new);
                // Empty quotes still produce a (possibly empty) word.
                if !matches!(w.last(), Some(Segment::Literal(_))) {
                    w.push(Segment::Literal(String::new()));
                }
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => push_literal(w, ch),
                        None => return Err("unterminated single quote".to_string()),
                    }
                }
            }
            '"' => {
                let w = word.get_or_insert_with(Vec::new);
                if !matches!(w.last(), Some(Segment::Literal(_))) {
                    w.push(Segment::Literal(String::new()));
                }
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch) => push_literal(w, ch),
                            None => return Err("unterminated double quote".to_string()),
                        },
                        Some('$') => match read_var(&mut chars) {
                            Some(name) => w.push(Segment::Var(name)),
                            None => push_literal(w, '$'),
                        },
                        Some(ch) => push_literal(w, ch),
                        None => return Err("unterminated double quote".to_string()),
                    }
                }
            }
            '\\' => {
                let w = word.get_or_insert_with(Vec::new);
                if let Some(ch) = chars.next() {
                    push_literal(w, ch);
                }
            }
            '$' => {
                let w = word.get_or_insert_with(Vec::new);
                match read_var(&mut chars) {
                    Some(name) => w.push(Segment::Var(name)),
                    None => push_literal(w, '$'),
                }
            }
            other => push_literal(word.get_or_insert_with(Vec::new), other),
        }
    }
    if let Some(w) = word.take() {
        tokens.push(Token::Word(w));
    }
    Ok(tokens)
}

struct Interpreter<'a> {
    fs: &'a mut FileSystem,
    vars: HashMap<String, String>,
    status: u32,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

enum Flow {
    Continue(u32),
    Exit(u32),
}

impl Interpreter<'_> {
    fn expand(&self, word: &[Segment]) -> String {
        word.iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.clone(),
                Segment::Var(name) if name == "?" => self.status.to_string(),
                Segment::Var(name) => self.vars.get(name).cloned().unwrap_or_default(),
            })
            .collect()
    }

    fn fail(&mut self, message: String, status: u32) -> Flow {
        self.stderr.extend_from_slice(message.as_bytes());
        self.stderr.push(b'\n');
        Flow::Continue(status)
    }

    fn run_simple(&mut self, words: &[Vec<Segment>]) -> Flow {
        let mut args: Vec<String> = words.iter().map(|w| self.expand(w)).collect();

        if args.len() == 1 {
            if let Some((name, value)) = args[0].split_once('=') {
                if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    self.vars.insert(name.to_string(), value.to_string());
                    return Flow::Continue(0);
                }
            }
        }

        let mut privileged = false;
        if args.first().map(String::as_str) == Some("sudo") {
            privileged = true;
            args.remove(0);
            while args.first().is_some_and(|a| a.starts_with('-')) {
                args.remove(0);
            }
        }

        let Some((program, rest)) = args.split_first() else {
            return Flow::Continue(self.status);
        };
        let rest: Vec<&str> = rest.iter().map(String::as_str).collect();

        match program.as_str() {
            "true" => Flow::Continue(0),
            "false" => Flow::Continue(1),
            "exit" => Flow::Exit(
                rest.first()
                    .and_then(|code| code.parse().ok())
                    .unwrap_or(self.status),
            ),
            "echo" => {
                self.stdout.extend_from_slice(rest.join(" ").as_bytes());
                self.stdout.push(b'\n');
                Flow::Continue(0)
            }
            "cat" => self.cat(&rest),
            "test" => self.test(&rest),
            "cp" => self.cp(&rest, privileged),
            "rm" => self.rm(&rest, privileged),
            "mkdir" => self.mkdir(&rest, privileged),
            "chmod" => self.chmod(&rest, privileged),
            other => self.fail(format!("sh: {other}: command not found"), 127),
        }
    }

    fn operands<'b>(args: &[&'b str]) -> (Vec<&'b str>, Vec<&'b str>) {
        let mut flags = Vec::new();
        let mut operands = Vec::new();
        let mut end_of_flags = false;
        for arg in args {
            if !end_of_flags && *arg == "--" {
                end_of_flags = true;
            } else if !end_of_flags && arg.starts_with('-') && arg.len() > 1 {
                flags.push(*arg);
            } else {
                operands.push(*arg);
            }
        }
        (flags, operands)
    }

    fn cat(&mut self, args: &[&str]) -> Flow {
        let (_, paths) = Self::operands(args);
        let mut status = 0;
        for path in paths {
            match self.fs.files.get(path) {
                Some(contents) => self.stdout.extend_from_slice(contents),
                None => {
                    self.fail(format!("cat: {path}: No such file or directory"), 1);
                    status = 1;
                }
            }
        }
        Flow::Continue(status)
    }

    fn test(&mut self, args: &[&str]) -> Flow {
        let found = match args {
            ["-e", path] => self.fs.exists(path),
            ["-f", path] => self.fs.files.contains_key(*path),
            ["-d", path] => self.fs.dirs.contains(path.trim_end_matches('/')),
            _ => return self.fail(format!("test: unsupported expression {args:?}"), 2),
        };
        Flow::Continue(if found { 0 } else { 1 })
    }

    fn deny_unless_writable(&mut self, program: &str, path: &str, privileged: bool) -> Option<Flow> {
        if privileged || self.fs.is_writable(path) {
            return None;
        }
        Some(self.fail(format!("{program}: cannot write '{path}': Permission denied"), 1))
    }

    fn cp(&mut self, args: &[&str], privileged: bool) -> Flow {
        let (_, operands) = Self::operands(args);
        let [source, dest] = operands.as_slice() else {
            return self.fail("cp: expected SOURCE DEST".to_string(), 1);
        };
        let Some(contents) = self.fs.files.get(*source).cloned() else {
            return self.fail(format!("cp: cannot stat '{source}': No such file or directory"), 1);
        };
        if dest.is_empty() {
            return self.fail("cp: cannot create regular file '': No such file or directory".to_string(), 1);
        }
        if let Some(denied) = self.deny_unless_writable("cp", dest, privileged) {
            return denied;
        }
        self.fs.files.insert(dest.to_string(), contents);
        Flow::Continue(0)
    }

    fn rm(&mut self, args: &[&str], privileged: bool) -> Flow {
        let (flags, paths) = Self::operands(args);
        let force = flags.iter().any(|flag| flag.contains('f'));
        let mut status = 0;
        for path in paths {
            if let Some(denied) = self.deny_unless_writable("rm", path, privileged) {
                return denied;
            }
            if self.fs.files.remove(path).is_none() && !force {
                self.fail(format!("rm: cannot remove '{path}': No such file or directory"), 1);
                status = 1;
            }
        }
        Flow::Continue(status)
    }

    fn mkdir(&mut self, args: &[&str], privileged: bool) -> Flow {
        let (_, paths) = Self::operands(args);
        for path in paths {
            if let Some(denied) = self.deny_unless_writable("mkdir", path, privileged) {
                return denied;
            }
            self.fs.dirs.insert(path.trim_end_matches('/').to_string());
        }
        Flow::Continue(0)
    }

    fn chmod(&mut self, args: &[&str], privileged: bool) -> Flow {
        let (_, operands) = Self::operands(args);
        let Some(paths) = operands.get(1..) else {
            return self.fail("chmod: missing operand".to_string(), 1);
        };
        for path in paths {
            if !self.fs.exists(path) {
                return self.fail(format!("chmod: cannot access '{path}': No such file or directory"), 1);
            }
            if let Some(denied) = self.deny_unless_writable("chmod", path, privileged) {
                return denied;
            }
        }
        Flow::Continue(0)
    }
}

/// Run `command` against `fs`.
pub(super) fn run(fs: &mut FileSystem, command: &str) -> CommandOutput {
    let tokens = match tokenize(command) {
        Ok(tokens) => tokens,
        Err(message) => {
            return CommandOutput {
                stdout: Vec::new(),
                stderr: format!("sh: syntax error: {message}\n").into_bytes(),
                exit_status: 2,
            }
        }
    };

    let mut interpreter = Interpreter {
        fs,
        vars: HashMap::new(),
        status: 0,
        stdout: Vec::new(),
        stderr: Vec::new(),
    };

    let mut pending = Token::Seq;
    let mut words: Vec<Vec<Segment>> = Vec::new();
    let mut tokens = tokens.into_iter().peekable();

    loop {
        let next = tokens.next();
        match next {
            Some(Token::Word(word)) => {
                words.push(word);
                continue;
            }
            _ => {
                let runs = match pending {
                    Token::And => interpreter.status == 0,
                    Token::Or => interpreter.status != 0,
                    _ => true,
                };
                if runs && !words.is_empty() {
                    match interpreter.run_simple(&words) {
                        Flow::Continue(status) => interpreter.status = status,
                        Flow::Exit(status) => {
                            interpreter.status = status;
                            break;
                        }
                    }
                }
                words.clear();
                match next {
                    Some(op) => pending = op,
                    None => break,
                }
            }
        }
    }

    CommandOutput {
        stdout: interpreter.stdout,
        stderr: interpreter.stderr,
        exit_status: interpreter.status,
    }
}
