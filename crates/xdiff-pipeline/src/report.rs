//! The textual report renderer (§6.4): unified-diff blocks separated by a
//! literal `---` line, a trailing summary, and optional `console`-based
//! coloring. Grounded in the teacher's `DiffEngine::format_colored`.

use console::Style;

use xdiff_core::{ChangeType, ResourceDiff, SummaryCounts};

const BLOCK_SEPARATOR: &str = "---";

/// Render a sorted diff set as the §6.4 textual report. `diffs` may contain
/// `Unchanged` entries (the calculator emits them for matched-but-identical
/// resources); they are filtered out here, since they never reach the
/// renderer (§4.7: "never emit Unchanged").
pub fn render(diffs: &[ResourceDiff], use_color: bool) -> String {
    let mut counts = SummaryCounts::default();
    let mut blocks = Vec::new();

    for diff in diffs {
        counts.record(diff.change_type);
        if diff.change_type == ChangeType::Unchanged {
            continue;
        }
        blocks.push(render_block(diff, use_color));
    }

    let mut output = blocks.join(&format!("\n{BLOCK_SEPARATOR}\n"));
    if !blocks.is_empty() {
        output.push('\n');
    }
    output.push_str(&counts.summary_line());
    output.push('\n');
    output
}

fn render_block(diff: &ResourceDiff, use_color: bool) -> String {
    let header = diff.header();
    let mut out = String::new();

    if use_color {
        out.push_str(&header_style(diff.change_type).apply_to(&header).to_string());
    } else {
        out.push_str(&header);
    }
    out.push('\n');

    for line in diff.unified_diff_text.lines() {
        out.push_str(&render_line(line, use_color));
        out.push('\n');
    }

    out.trim_end_matches('\n').to_string()
}

fn header_style(change_type: ChangeType) -> Style {
    match change_type {
        ChangeType::Added => Style::new().green().bold(),
        ChangeType::Modified => Style::new().yellow().bold(),
        ChangeType::Removed => Style::new().red().bold(),
        ChangeType::Unchanged => Style::new(),
    }
}

/// Color one unified-diff line by its leading sigil (§6.4: "additions
/// green, removals red, context default").
fn render_line(line: &str, use_color: bool) -> String {
    if !use_color {
        return line.to_string();
    }
    match line.chars().next() {
        Some('+') => Style::new().green().apply_to(line).to_string(),
        Some('-') => Style::new().red().apply_to(line).to_string(),
        _ => line.to_string(),
    }
}
