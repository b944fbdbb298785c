use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Shell dialect for tool output and generated statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shell {
    Sh,
    Csh,
}

impl Shell {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "sh" | "bash" | "zsh" | "ksh" | "dash" => Some(Shell::Sh),
            "csh" | "tcsh" => Some(Shell::Csh),
            _ => None,
        }
    }

    /// Detect the dialect from `$SHELL`, falling back to POSIX sh
    pub fn detect(env: &Environment) -> Self {
        env.get("SHELL")
            .and_then(|shell| Path::new(shell).file_name())
            .and_then(|name| name.to_str())
            .and_then(Shell::from_name)
            .unwrap_or(Shell::Sh)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Shell::Sh => "sh",
            Shell::Csh => "csh",
        }
    }

    /// Dialect selector understood by the cmt executable
    pub fn tool_flag(self) -> &'static str {
        match self {
            Shell::Sh => "-sh",
            Shell::Csh => "-csh",
        }
    }

    pub fn script_extension(self) -> &'static str {
        self.as_str()
    }
}

/// A single change to an environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    Set { name: String, value: String },
    Unset { name: String },
}

impl Assignment {
    pub fn set(name: impl Into<String>, value: impl Into<String>) -> Self {
        Assignment::Set {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn unset(name: impl Into<String>) -> Self {
        Assignment::Unset { name: name.into() }
    }

    pub fn name(&self) -> &str {
        match self {
            Assignment::Set { name, .. } | Assignment::Unset { name } => name,
        }
    }

    /// Render as a statement the given shell can evaluate
    ///
    /// csh statements carry a trailing `;` since backquote substitution joins
    /// lines into one command.
    pub fn format_for_shell(&self, shell: Shell) -> String {
        match (self, shell) {
            (Assignment::Set { name, value }, Shell::Sh) => {
                format!("{name}={}; export {name}", quote(value))
            }
            (Assignment::Set { name, value }, Shell::Csh) => {
                format!("setenv {name} {};", quote(value))
            }
            (Assignment::Unset { name }, Shell::Sh) => format!("unset {name}"),
            (Assignment::Unset { name }, Shell::Csh) => format!("unsetenv {name};"),
        }
    }
}

/// Single-quote a value for sh and csh alike
pub(crate) fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Process environment model
///
/// The bootstrapper only ever reads and writes this mapping; the real process
/// environment is snapshotted once at the edge with [`Environment::from_process`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current process environment (non UTF-8 entries are skipped)
    pub fn from_process() -> Self {
        std::env::vars_os()
            .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn unset(&mut self, name: &str) {
        self.vars.remove(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn apply(&mut self, assignment: &Assignment) {
        match assignment {
            Assignment::Set { name, value } => self.set(name.clone(), value.clone()),
            Assignment::Unset { name } => self.unset(name),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Ordered record of the assignments applied during a bootstrap
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentDelta {
    assignments: Vec<Assignment>,
}

impl EnvironmentDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, assignment: Assignment) {
        self.assignments.push(assignment);
    }

    pub fn extend(&mut self, assignments: impl IntoIterator<Item = Assignment>) {
        self.assignments.extend(assignments);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Format the delta for the given shell, one statement per line
    pub fn format_for_shell(&self, shell: Shell) -> String {
        self.assignments
            .iter()
            .map(|assignment| assignment.format_for_shell(shell))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
