//! Inline directive protocol embedded in reasoning output.
//!
//! # Format
//!
//! ```text
//! Some explanation.
//! EXEC: cargo test --workspace
//! [WRITE: src/lib.rs]
//! pub fn answer() -> u32 { 42 }
//! [/WRITE]
//! ```
//!
//! `EXEC:` lines and `[WRITE: path]` blocks become directives; everything
//! else is plain text. A write block without its closing marker is kept as
//! plain text and never written.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EXEC_LINE: Regex = Regex::new(r"^\s*(?:[-*]\s+)?EXEC:\s*(.+?)\s*$").unwrap();
    static ref WRITE_OPEN: Regex = Regex::new(r"^\s*\[WRITE:\s*([^\]]+?)\s*\]\s*$").unwrap();
}

const WRITE_CLOSE: &str = "[/WRITE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    ExecCommand(String),
    WriteFile { path: String, content: String },
    PlainText(String),
}

/// Split reasoning output into directives, preserving order. Consecutive
/// plain lines are merged into one `PlainText`.
pub fn parse_directives(input: &str) -> Vec<Directive> {
    let mut directives = Vec::new();
    let mut plain: Vec<&str> = Vec::new();
    let mut lines = input.lines();

    while let Some(line) = lines.next() {
        if let Some(caps) = EXEC_LINE.captures(line) {
            flush_plain(&mut plain, &mut directives);
            let command = strip_inline_code(&caps[1]);
            if !command.is_empty() {
                directives.push(Directive::ExecCommand(command.to_string()));
            }
            continue;
        }

        if let Some(caps) = WRITE_OPEN.captures(line) {
            let path = caps[1].to_string();
            let mut body: Vec<&str> = Vec::new();
            let mut closed = false;
            for inner in lines.by_ref() {
                if inner.trim() == WRITE_CLOSE {
                    closed = true;
                    break;
                }
                body.push(inner);
            }

            if closed {
                flush_plain(&mut plain, &mut directives);
                directives.push(Directive::WriteFile {
                    path,
                    content: strip_code_fence(&body.join("\n")),
                });
            } else {
                tracing::warn!(
                    target: "hive.dispatch",
                    path = %path,
                    "unterminated write block kept as text"
                );
                plain.push(line);
                plain.extend(body);
            }
            continue;
        }

        plain.push(line);
    }

    flush_plain(&mut plain, &mut directives);
    directives
}

/// True when the text carries at least one executable directive.
pub fn has_actions(directives: &[Directive]) -> bool {
    directives
        .iter()
        .any(|d| !matches!(d, Directive::PlainText(_)))
}

fn flush_plain(plain: &mut Vec<&str>, directives: &mut Vec<Directive>) {
    if plain.is_empty() {
        return;
    }
    let text = plain.join("\n");
    plain.clear();
    if !text.trim().is_empty() {
        directives.push(Directive::PlainText(text));
    }
}

fn strip_inline_code(command: &str) -> &str {
    let command = command.trim();
    command
        .strip_prefix('`')
        .and_then(|c| c.strip_suffix('`'))
        .unwrap_or(command)
        .trim()
}

/// Remove one surrounding markdown fence (with optional language tag).
pub fn strip_code_fence(content: &str) -> String {
    let trimmed = content.trim_matches('\n');
    let lines: Vec<&str> = trimmed.lines().collect();
    if lines.len() >= 2
        && lines[0].trim_start().starts_with("```")
        && lines[lines.len() - 1].trim() == "```"
    {
        let mut body = lines[1..lines.len() - 1].join("\n");
        body.push('\n');
        return body;
    }
    let mut body = trimmed.to_string();
    if !body.is_empty() && !body.ends_with('\n') {
        body.push('\n');
    }
    body
}
