//! Output formatting utilities for the CLI.

use comfy_table::{presets, Attribute, Cell, ContentArrangement, Table};
use console::{style, StyledObject};
use serde::Serialize;

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
    fn to_json(&self) -> serde_json::Value;
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to a maximum number of characters, appending "..."
/// if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Table with the standard preset and a bold header row.
pub fn table<I, S>(headers: I) -> Table
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .into_iter()
                .map(|h| Cell::new(h.into()).add_attribute(Attribute::Bold)),
        );
    table
}

/// Colored status text for terminal output.
///
/// `console` drops the styling on its own when stdout is not a terminal or
/// `NO_COLOR` is set.
pub fn colorize_status(status: &str) -> StyledObject<&str> {
    match status {
        "completed" => style(status).green().bold(),
        "running" => style(status).yellow(),
        "pending" => style(status).blue(),
        "paused" => style(status).yellow().dim(),
        "failed" => style(status).red().bold(),
        "aborted" | "skipped" => style(status).dim(),
        _ => style(status),
    }
}

/// Colored priority text for terminal output.
pub fn colorize_priority(priority: &str) -> StyledObject<&str> {
    match priority {
        "critical" => style(priority).red().bold(),
        "high" => style(priority).red(),
        "low" => style(priority).dim(),
        _ => style(priority),
    }
}

/// Styled label for detail views.
pub fn label(name: &str) -> String {
    format!("{}{}", style(name).bold(), style(":").dim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer piece of text", 10), "a longe...");
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
    }

    #[test]
    fn test_table_renders_rows() {
        let mut t = table(["Task", "Status"]);
        t.add_row(vec!["market-research", "completed"]);
        let rendered = t.to_string();
        assert!(rendered.contains("Task"));
        assert!(rendered.contains("market-research"));
    }
}
