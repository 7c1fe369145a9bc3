//! Shell command policy and POSIX -> host-shell translation.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::error::TaskError;

/// Shell family of the machine running the commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Posix,
    Windows,
}

impl HostPlatform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }
}

lazy_static! {
    static ref DESTRUCTIVE: Regex = Regex::new(
        r"(?i)(?:^|[\s;&|(`])(?:rm|rmdir|del|erase|rd|format|mkfs(?:\.\w+)?|chmod|chown|shutdown|reboot|remove-item|invoke-expression|iex)(?:\s|$)"
    )
    .unwrap();

    static ref GREP_RECURSIVE: Regex =
        Regex::new(r#"^grep\s+-[a-zA-Z]*r[a-zA-Z]*\s+(?:"([^"]+)"|'([^']+)'|(\S+))(?:\s+(\S+))?$"#).unwrap();
    static ref LS: Regex = Regex::new(r"^ls(?:\s+-([a-zA-Z]+))?(?:\s+(\S+))?$").unwrap();
    static ref HEAD: Regex = Regex::new(r"^head(?:\s+-n\s*(\d+)|\s+-(\d+))?\s+(\S+)$").unwrap();
    static ref TAIL: Regex = Regex::new(r"^tail(?:\s+-n\s*(\d+)|\s+-(\d+))?\s+(\S+)$").unwrap();
    static ref WC_LINES: Regex = Regex::new(r"^wc\s+-l\s+(\S+)$").unwrap();
    static ref TEST_FILE: Regex =
        Regex::new(r"^(?:test\s+-([fde])\s+(\S+)|\[\s+-([fde])\s+(\S+)\s+\])$").unwrap();
    static ref CAT: Regex = Regex::new(r"^cat\s+(\S+)$").unwrap();
    static ref FIND_NAME: Regex =
        Regex::new(r#"^find\s+(\S+)\s+-name\s+(?:"([^"]+)"|'([^']+)'|(\S+))$"#).unwrap();
}

/// Pre-translation gate every command passes before reaching the shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandPolicy {
    allow_metacharacters: bool,
}

impl CommandPolicy {
    pub fn new(allow_metacharacters: bool) -> Self {
        Self {
            allow_metacharacters,
        }
    }

    pub fn check(&self, command: &str) -> Result<(), TaskError> {
        let command = command.trim();
        if command.is_empty() {
            return Err(TaskError::Validation("empty command".into()));
        }

        if let Some(found) = DESTRUCTIVE.find(command) {
            return Err(TaskError::Validation(format!(
                "command rejected: destructive pattern `{}`",
                found.as_str().trim()
            )));
        }

        if !self.allow_metacharacters && contains_shell_metacharacters(command) {
            return Err(TaskError::Validation(format!(
                "command rejected: shell metacharacters are not allowed in `{command}`"
            )));
        }

        Ok(())
    }
}

/// Chaining, substitution and redirection sequences.
pub fn contains_shell_metacharacters(cmd: &str) -> bool {
    const SEQUENCES: [&str; 3] = ["&&", "$(", "${"];
    const CHARS: [char; 8] = ['&', '|', ';', '`', '>', '<', '\n', '\r'];

    SEQUENCES.iter().any(|seq| cmd.contains(seq)) || cmd.contains(&CHARS[..])
}

/// Rewrites a fixed table of POSIX idioms for non-POSIX hosts.
#[derive(Debug, Clone, Copy)]
pub struct CommandTranslator {
    platform: HostPlatform,
}

impl Default for CommandTranslator {
    fn default() -> Self {
        Self::new(HostPlatform::current())
    }
}

impl CommandTranslator {
    pub fn new(platform: HostPlatform) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> HostPlatform {
        self.platform
    }

    /// Unknown commands come back unchanged. `rm`, `chmod` and friends are
    /// never rewritten; the policy rejects them instead.
    pub fn translate(&self, command: &str) -> String {
        let trimmed = command.trim();
        if self.platform == HostPlatform::Posix || DESTRUCTIVE.is_match(trimmed) {
            return command.to_string();
        }

        match translate_posix_idiom(trimmed) {
            Some(translated) => {
                tracing::debug!(
                    target: "hive.dispatch",
                    from = trimmed,
                    to = %translated,
                    "command translated"
                );
                translated
            }
            None => command.to_string(),
        }
    }
}

fn translate_posix_idiom(cmd: &str) -> Option<String> {
    if let Some(caps) = GREP_RECURSIVE.captures(cmd) {
        let pattern = first_group(&caps, &[1, 2, 3])?;
        let path = caps.get(4).map_or(".", |m| m.as_str());
        return Some(format!(
            "Get-ChildItem -Path {path} -Recurse -File | Select-String -Pattern '{pattern}'"
        ));
    }

    if let Some(caps) = LS.captures(cmd) {
        let path = caps.get(2).map_or(".", |m| m.as_str());
        let force = caps
            .get(1)
            .is_some_and(|flags| flags.as_str().contains('a'));
        return Some(if force {
            format!("Get-ChildItem -Force {path}")
        } else {
            format!("Get-ChildItem {path}")
        });
    }

    if let Some(caps) = HEAD.captures(cmd) {
        let count = first_group(&caps, &[1, 2]).unwrap_or("10");
        return Some(format!("Get-Content {} -TotalCount {count}", &caps[3]));
    }

    if let Some(caps) = TAIL.captures(cmd) {
        let count = first_group(&caps, &[1, 2]).unwrap_or("10");
        return Some(format!("Get-Content {} -Tail {count}", &caps[3]));
    }

    if let Some(caps) = WC_LINES.captures(cmd) {
        return Some(format!(
            "(Get-Content {} | Measure-Object -Line).Lines",
            &caps[1]
        ));
    }

    if let Some(caps) = TEST_FILE.captures(cmd) {
        let flag = first_group(&caps, &[1, 3])?;
        let path = first_group(&caps, &[2, 4])?;
        let path_type = match flag {
            "f" => " -PathType Leaf",
            "d" => " -PathType Container",
            _ => "",
        };
        return Some(format!("Test-Path{path_type} {path}"));
    }

    if let Some(caps) = CAT.captures(cmd) {
        return Some(format!("Get-Content {}", &caps[1]));
    }

    if let Some(caps) = FIND_NAME.captures(cmd) {
        let filter = first_group(&caps, &[2, 3, 4])?;
        return Some(format!(
            "Get-ChildItem -Path {} -Recurse -Filter '{filter}'",
            &caps[1]
        ));
    }

    None
}

fn first_group<'t>(caps: &Captures<'t>, groups: &[usize]) -> Option<&'t str> {
    groups
        .iter()
        .find_map(|idx| caps.get(*idx).map(|m| m.as_str()))
}
