//! Formatting helpers shared by the timeline and the CLI.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Format a timestamp relative to `now` (e.g., "2m ago").
pub fn format_relative_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(ts);

    if duration.num_seconds() < 0 {
        "just now".to_string()
    } else if duration.num_seconds() < 60 {
        format!("{}s ago", duration.num_seconds())
    } else if duration.num_minutes() < 60 {
        format!("{}m ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_days() < 7 {
        format!("{}d ago", duration.num_days())
    } else {
        ts.format("%b %d").to_string()
    }
}

/// Cut `s` to `max` characters, marking the cut with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push('…');
    out
}

/// First line of a thought, at most 100 characters.
pub fn truncate_thought(content: &str) -> String {
    truncate(content.lines().next().unwrap_or_default(), 100)
}

const PATH_ROOTS: &[&str] = &["src", "tools", "docs", "tests", ".claude"];

/// Shorten a path to roughly `max` characters, preferring the part from a
/// well-known project directory onwards, else the last two segments.
pub fn shorten_path(path: &str, max: usize) -> String {
    if path.chars().count() <= max {
        return path.to_string();
    }
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() <= 2 {
        return truncate(path, max);
    }
    if let Some(root) = parts.iter().position(|p| PATH_ROOTS.contains(p)) {
        let shortened = parts[root..].join("/");
        if shortened.chars().count() <= max {
            return shortened;
        }
    }
    format!(".../{}", parts[parts.len() - 2..].join("/"))
}

/// Tool input as an object; JSON-encoded strings are decoded.
fn normalize_input(input: Option<&Value>) -> Option<Map<String, Value>> {
    match input? {
        Value::Object(map) => Some(map.clone()),
        Value::String(raw) => match serde_json::from_str(raw) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}

fn field<'a>(input: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// One-line summary of a tool call, e.g. `Read src/config.rs` or `$ git status`.
pub fn tool_summary(tool_name: &str, tool_input: Option<&Value>) -> String {
    let Some(input) = normalize_input(tool_input) else {
        return tool_name.to_string();
    };
    let path = |key: &str| field(&input, key).map(|p| shorten_path(p, 45));

    let summary = match tool_name {
        "Read" | "Write" | "Edit" => path("file_path").map(|p| format!("{} {}", tool_name, p)),
        "Bash" => field(&input, "command").map(|cmd| {
            let first_line = cmd.lines().next().unwrap_or_default().trim();
            format!("$ {}", truncate(first_line, 60))
        }),
        "Grep" => match (field(&input, "pattern"), path("path")) {
            (Some(pattern), Some(path)) => {
                Some(format!("Grep \"{}\" in {}", truncate(pattern, 25), path))
            }
            (Some(pattern), None) => Some(format!("Grep \"{}\"", truncate(pattern, 40))),
            _ => None,
        },
        "Glob" => field(&input, "pattern").map(|p| format!("Glob {}", truncate(p, 50))),
        "Task" => field(&input, "description")
            .or_else(|| field(&input, "prompt"))
            .map(|label| format!("Task: {}", truncate(label, 50))),
        "WebFetch" => field(&input, "url").map(|url| format!("Fetch {}", truncate(url, 50))),
        "WebSearch" => field(&input, "query").map(|q| format!("Search \"{}\"", truncate(q, 45))),
        "NotebookEdit" => path("notebook_path").map(|p| format!("Notebook {}", p)),
        _ => None,
    };
    summary.unwrap_or_else(|| tool_name.to_string())
}

/// Short text rendering of a tool's output, if it has any.
pub fn tool_output_summary(output: Option<&Value>) -> Option<String> {
    match output? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(truncate(s, 300)),
        value => {
            let text = ["content", "output"]
                .iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str));
            match text {
                Some(text) => Some(truncate(text, 300)),
                None => {
                    let json = value.to_string();
                    (json.len() > 5).then(|| truncate(&json, 300))
                }
            }
        }
    }
}
