//! Tool name normalization and per-tool parameter remapping.

use serde_json::{Map, Value};

/// Builtin tool names understood by the default tool registry.
pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const LIST_DIRECTORY: &str = "list_directory";
pub const RUN_COMMAND: &str = "run_command";

const NAME_ALIASES: &[(&str, &str)] = &[
    ("read", READ_FILE),
    ("readfile", READ_FILE),
    ("cat", READ_FILE),
    ("view_file", READ_FILE),
    ("write", WRITE_FILE),
    ("writefile", WRITE_FILE),
    ("create_file", WRITE_FILE),
    ("save_file", WRITE_FILE),
    ("ls", LIST_DIRECTORY),
    ("list", LIST_DIRECTORY),
    ("list_dir", LIST_DIRECTORY),
    ("listdir", LIST_DIRECTORY),
    ("list_files", LIST_DIRECTORY),
    ("exec", RUN_COMMAND),
    ("shell", RUN_COMMAND),
    ("bash", RUN_COMMAND),
    ("run", RUN_COMMAND),
    ("run_shell", RUN_COMMAND),
    ("execute_command", RUN_COMMAND),
];

/// Lowercase, drop an `mcp__<server>__` prefix, map `-` to `_`, resolve aliases.
pub fn normalize_tool_name(name: &str) -> String {
    let mut normalized = name.trim().to_lowercase();

    if let Some(rest) = normalized.strip_prefix("mcp__") {
        normalized = match rest.split_once("__") {
            Some((_server, tool)) => tool.to_string(),
            None => rest.to_string(),
        };
    }

    normalized = normalized.replace('-', "_");

    NAME_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(normalized)
}

/// Rename loosely-named parameters to the canonical keys a tool expects.
/// Keys already in canonical form are left alone.
pub fn remap_params(tool: &str, params: &Map<String, Value>) -> Map<String, Value> {
    let aliases: &[(&str, &str)] = match tool {
        READ_FILE | LIST_DIRECTORY => &[
            ("file", "path"),
            ("filename", "path"),
            ("filepath", "path"),
            ("file_path", "path"),
            ("dir", "path"),
            ("directory", "path"),
        ],
        WRITE_FILE => &[
            ("file", "path"),
            ("filename", "path"),
            ("filepath", "path"),
            ("file_path", "path"),
            ("text", "content"),
            ("data", "content"),
            ("body", "content"),
        ],
        RUN_COMMAND => &[("cmd", "command"), ("script", "command")],
        _ => &[],
    };

    let mut out = params.clone();
    for (alias, canonical) in aliases {
        if out.contains_key(*canonical) {
            continue;
        }
        if let Some(value) = out.remove(*alias) {
            out.insert((*canonical).to_string(), value);
        }
    }
    out
}
