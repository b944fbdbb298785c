//! Parsing and sourcing of staged assignment scripts.
//!
//! Only the subset of sh/csh that the cmt tool emits for environment changes is
//! understood. Everything else is reported as [`Statement::Unsupported`] and
//! skipped when sourcing.
//!
//! Expansion covers `$NAME`, `${NAME}` and `${NAME:-default}`, plus a leading
//! unquoted `~` taken from `$HOME`. Special parameters such as `$$` or `$?` are
//! not expanded; `$$` yields a literal `$`.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::environment::{Assignment, Environment, Shell};

static VARIABLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid variable name regex"));

static DEFAULT_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*):-([^}]*)\}").expect("valid default reference regex")
});

fn is_variable_name(name: &str) -> bool {
    VARIABLE_NAME.is_match(name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Unquoted text, subject to expansion
    Bare(String),
    /// Double-quoted text, subject to expansion
    Double(String),
    /// Single-quoted or escaped text, taken literally
    Literal(String),
}

/// One shell word made of differently quoted segments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Word {
    segments: Vec<Segment>,
}

impl Word {
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Literal(text.into())],
        }
    }

    fn push(&mut self, segment: Segment) {
        match (self.segments.last_mut(), segment) {
            (Some(Segment::Bare(last)), Segment::Bare(text))
            | (Some(Segment::Double(last)), Segment::Double(text))
            | (Some(Segment::Literal(last)), Segment::Literal(text)) => last.push_str(&text),
            (_, segment) => self.segments.push(segment),
        }
    }

    fn push_bare(&mut self, ch: char) {
        self.push(Segment::Bare(ch.to_string()));
    }

    /// The word's text when it is a single unquoted segment (e.g. a command name)
    fn bare(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [Segment::Bare(text)] => Some(text.as_str()),
            _ => None,
        }
    }

    /// Raw text with quoting removed and no expansion
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Bare(text) | Segment::Double(text) | Segment::Literal(text) => {
                    text.as_str()
                }
            })
            .collect()
    }

    /// Expand variable references against `env`
    ///
    /// Unset variables expand to the empty string, as in the shell.
    pub fn expand(&self, env: &Environment) -> String {
        let mut value = String::new();
        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Bare(text) if index == 0 && is_tilde_prefix(text) => {
                    let (head, rest) = text.split_at(text.find('/').unwrap_or(text.len()));
                    value.push_str(&shellexpand::tilde_with_context(head, || env.get("HOME")));
                    value.push_str(&expand_references(rest, env));
                }
                Segment::Bare(text) | Segment::Double(text) => {
                    value.push_str(&expand_references(text, env));
                }
                Segment::Literal(text) => value.push_str(text),
            }
        }
        value
    }

    /// Split a `NAME=value` word into its name and value parts
    fn split_assignment(&self) -> Option<(String, Word)> {
        let (first, rest) = self.segments.split_first()?;
        let Segment::Bare(text) = first else {
            return None;
        };
        let (name, value) = text.split_once('=')?;
        if !is_variable_name(name) {
            return None;
        }

        let mut word = Word::default();
        if !value.is_empty() {
            word.push(Segment::Bare(value.to_string()));
        }
        for segment in rest {
            word.push(segment.clone());
        }
        Some((name.to_string(), word))
    }
}

fn is_tilde_prefix(text: &str) -> bool {
    text == "~" || text.starts_with("~/")
}

fn expand_references(text: &str, env: &Environment) -> String {
    // `${NAME:-default}` applies to unset and empty variables alike
    let resolved = DEFAULT_REFERENCE.replace_all(text, |caps: &regex::Captures| {
        match env.get(&caps[1]).filter(|value| !value.is_empty()) {
            Some(_) => format!("${{{}}}", &caps[1]),
            None => caps[2].to_string(),
        }
    });
    shellexpand::env_with_context_no_errors(resolved.as_ref(), |name: &str| {
        Some(env.get(name).unwrap_or(""))
    })
    .into_owned()
}

/// A parsed statement from a staged script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Set { name: String, value: Word },
    Unset { name: String },
    Unsupported { command: String },
}

/// Parse a script written in the given dialect
pub fn parse(text: &str, shell: Shell) -> Vec<Statement> {
    lex(text)
        .into_iter()
        .flat_map(|words| statements(words, shell))
        .collect()
}

/// Apply statements to `env` in order, returning the assignments performed
///
/// Values are expanded against the environment as already modified by the
/// preceding statements.
pub fn source(env: &mut Environment, statements: &[Statement]) -> Vec<Assignment> {
    let mut applied = Vec::new();
    for statement in statements {
        let assignment = match statement {
            Statement::Set { name, value } => Assignment::set(name.clone(), value.expand(env)),
            Statement::Unset { name } => Assignment::unset(name.clone()),
            Statement::Unsupported { command } => {
                debug!(command = %command, "skipping unsupported statement");
                continue;
            }
        };
        env.apply(&assignment);
        applied.push(assignment);
    }
    applied
}

fn statements(words: Vec<Word>, shell: Shell) -> Vec<Statement> {
    let Some(head) = words.first() else {
        return Vec::new();
    };
    let args = &words[1..];

    match (shell, head.bare()) {
        (Shell::Sh, Some("export")) => args
            .iter()
            .filter_map(Word::split_assignment)
            .map(|(name, value)| Statement::Set { name, value })
            .collect(),
        (Shell::Sh, Some("unset")) | (Shell::Csh, Some("unsetenv")) => unset(args),
        (Shell::Csh, Some("setenv")) => setenv(args),
        (Shell::Sh, _) => {
            let assignments: Option<Vec<_>> = words.iter().map(Word::split_assignment).collect();
            match assignments {
                Some(assignments) => assignments
                    .into_iter()
                    .map(|(name, value)| Statement::Set { name, value })
                    .collect(),
                None => vec![unsupported(&words)],
            }
        }
        (Shell::Csh, _) => vec![unsupported(&words)],
    }
}

fn unset(args: &[Word]) -> Vec<Statement> {
    args.iter()
        .map(Word::text)
        .filter(|name| !name.starts_with('-'))
        .filter(|name| is_variable_name(name))
        .map(|name| Statement::Unset { name })
        .collect()
}

fn setenv(args: &[Word]) -> Vec<Statement> {
    match args {
        [name] | [name, _] if !is_variable_name(&name.text()) => {
            vec![Statement::Unsupported {
                command: format!("setenv {}", name.text()),
            }]
        }
        [name] => vec![Statement::Set {
            name: name.text(),
            value: Word::default(),
        }],
        [name, value] => vec![Statement::Set {
            name: name.text(),
            value: value.clone(),
        }],
        _ => {
            let mut words = vec![Word::literal("setenv")];
            words.extend(args.iter().cloned());
            vec![unsupported(&words)]
        }
    }
}

fn unsupported(words: &[Word]) -> Statement {
    Statement::Unsupported {
        command: words.iter().map(Word::text).collect::<Vec<_>>().join(" "),
    }
}

/// Split script text into commands of words
fn lex(text: &str) -> Vec<Vec<Word>> {
    let mut commands = Vec::new();
    let mut words = Vec::new();
    let mut word: Option<Word> = None;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            ' ' | '\t' | '\r' => {
                words.extend(word.take());
            }
            '\n' | ';' => {
                words.extend(word.take());
                if !words.is_empty() {
                    commands.push(std::mem::take(&mut words));
                }
            }
            '#' if word.is_none() => {
                while chars.next_if(|&c| c != '\n').is_some() {}
            }
            '\'' => {
                let mut literal = String::new();
                for c in chars.by_ref() {
                    if c == '\'' {
                        break;
                    }
                    literal.push(c);
                }
                word.get_or_insert_with(Word::default)
                    .push(Segment::Literal(literal));
            }
            '"' => {
                let current = word.get_or_insert_with(Word::default);
                let mut quoted = String::new();
                while let Some(c) = chars.next() {
                    match c {
                        '"' => break,
                        '\\' => match chars.next() {
                            Some('\n') => {}
                            Some(escaped @ ('"' | '\\' | '$' | '`')) => {
                                current.push(Segment::Double(std::mem::take(&mut quoted)));
                                current.push(Segment::Literal(escaped.to_string()));
                            }
                            Some(other) => {
                                quoted.push('\\');
                                quoted.push(other);
                            }
                            None => quoted.push('\\'),
                        },
                        other => quoted.push(other),
                    }
                }
                current.push(Segment::Double(quoted));
            }
            '\\' => match chars.next() {
                Some('\n') => {}
                Some(escaped) => word
                    .get_or_insert_with(Word::default)
                    .push(Segment::Literal(escaped.to_string())),
                None => word.get_or_insert_with(Word::default).push_bare('\\'),
            },
            other => word.get_or_insert_with(Word::default).push_bare(other),
        }
    }

    words.extend(word.take());
    if !words.is_empty() {
        commands.push(words);
    }
    commands
}
