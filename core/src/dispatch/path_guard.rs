//! Sandbox choke point for every file path taken from free text.

use std::path::{Component, Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::TaskError;

lazy_static! {
    static ref EXTERNAL_RESOURCE: Regex =
        Regex::new(r"(?i)^(?:[a-z][a-z0-9+.-]*://|www\.|mailto:)").unwrap();
    static ref TRAILING_PARENTHETICAL: Regex = Regex::new(r"\s*\([^()]*\)\s*$").unwrap();
}

const STRAY_TRAILING: &[char] = &[',', ';', ':', '!', '?', ']', '}', '"', '\'', '`'];
const STRAY_LEADING: &[char] = &['"', '\'', '`', '(', '['];

/// Outcome of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardedPath {
    /// Absolute path inside the sandbox root.
    Local(PathBuf),
    /// URL or other non-local resource, passed through untouched.
    External(String),
}

#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// `root` should already be absolute and normalized (see
    /// `config::resolve_sandbox_root`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = normalize_lexically(&root).unwrap_or(root);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `None` means rejected.
    pub fn validate(&self, candidate: &str) -> Option<GuardedPath> {
        let cleaned = clean_candidate(candidate);
        if cleaned.is_empty() {
            return None;
        }

        if EXTERNAL_RESOURCE.is_match(&cleaned) {
            return Some(GuardedPath::External(cleaned));
        }

        let unified = cleaned.replace('\\', "/");
        let path = Path::new(&unified);
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        let resolved = normalize_lexically(&joined)?;
        if resolved.starts_with(&self.root) {
            Some(GuardedPath::Local(resolved))
        } else {
            tracing::warn!(
                target: "hive.dispatch",
                candidate = candidate,
                root = %self.root.display(),
                "path rejected: outside sandbox"
            );
            None
        }
    }

    /// Validate a path that must be local (writes, shell cwd).
    pub fn validate_local(&self, candidate: &str) -> Result<PathBuf, TaskError> {
        match self.validate(candidate) {
            Some(GuardedPath::Local(path)) => Ok(path),
            Some(GuardedPath::External(url)) => Err(TaskError::Validation(format!(
                "`{url}` is an external resource, not a sandbox path"
            ))),
            None => Err(TaskError::Validation(format!(
                "path `{}` is outside the sandbox root {}",
                candidate.trim(),
                self.root.display()
            ))),
        }
    }
}

/// Drop trailing parentheticals, wrapping quotes and stray punctuation that
/// free-text paths tend to drag along ("src/app.ts (entry point).").
pub fn clean_candidate(raw: &str) -> String {
    let mut current = raw.trim().to_string();
    loop {
        let before = current.clone();

        current = TRAILING_PARENTHETICAL.replace(&current, "").trim().to_string();
        if let Some(last) = current.chars().last() {
            if strip_trailing(&current, last) {
                current.pop();
            }
        }
        current = current.trim_start_matches(STRAY_LEADING).trim().to_string();

        if current == before {
            return current;
        }
    }
}

fn strip_trailing(current: &str, last: char) -> bool {
    match last {
        // "." and ".." are path components, not punctuation.
        '.' => {
            let rest = &current[..current.len() - 1];
            !rest.is_empty() && !rest.ends_with('.') && !rest.ends_with('/')
        }
        ')' => !current.contains('('),
        c => STRAY_TRAILING.contains(&c),
    }
}

/// Resolve `.` and `..` without touching the filesystem. `None` when `..`
/// climbs above the start of the path.
pub fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                ) {
                    return None;
                }
                out.pop();
            }
            Component::Normal(name) => out.push(name),
        }
    }
    Some(out)
}
