//! Pipe-table conversion for the markdown renderer.
//!
//! A table starts at a line containing `|` whose next line is a separator
//! (pipes, dashes, colons, whitespace only). Every immediately following
//! line containing `|` is a body row; the first line without one ends the
//! block. Blocks that never collect two lines pass through verbatim.

use once_cell::sync::Lazy;
use regex::Regex;

static SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\|?[\s\-:|]+\|[\s\-:|]*$").unwrap());

/// Scan the text and replace recognized pipe-table blocks with table markup.
pub(crate) fn convert_tables(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if line.contains('|') && i + 1 < lines.len() && SEPARATOR.is_match(lines[i + 1]) {
            let mut block = vec![line];
            let mut j = i + 1;
            while j < lines.len() && lines[j].contains('|') {
                block.push(lines[j]);
                j += 1;
            }
            out.push(table_to_html(&block));
            i = j;
            continue;
        }
        out.push(line.to_string());
        i += 1;
    }

    out.join("\n")
}

/// Split a row on pipes and trim cells.
///
/// Outer empty cells produced by a leading/trailing pipe are discarded, but
/// a row that splits into two fields or fewer keeps them all; empty cells
/// are dropped either way.
fn parse_row(line: &str) -> Vec<&str> {
    let cells: Vec<&str> = line.split('|').map(str::trim).collect();
    let keep_all = cells.len() <= 2;
    cells
        .iter()
        .enumerate()
        .filter(|(idx, _)| keep_all || (*idx > 0 && *idx < cells.len() - 1))
        .map(|(_, cell)| *cell)
        .filter(|cell| !cell.is_empty())
        .collect()
}

fn table_to_html(lines: &[&str]) -> String {
    if lines.len() < 2 {
        return lines.join("\n");
    }

    let header = parse_row(lines[0]);
    // Line 1 is the separator; everything after is body.
    let body: Vec<Vec<&str>> = lines[2..].iter().map(|l| parse_row(l)).collect();

    let mut html = String::from(
        "<div class=\"overflow-x-auto my-4\"><table class=\"w-full border-collapse text-sm\">",
    );

    html.push_str("<thead><tr class=\"border-b border-border bg-secondary/50\">");
    for cell in &header {
        html.push_str(&format!(
            "<th class=\"px-3 py-2 text-left font-semibold text-foreground\">{cell}</th>"
        ));
    }
    html.push_str("</tr></thead>");

    html.push_str("<tbody>");
    for row in &body {
        html.push_str("<tr class=\"border-b border-border/50 hover:bg-secondary/30\">");
        for cell in row {
            html.push_str(&format!(
                "<td class=\"px-3 py-2 text-muted-foreground\">{cell}</td>"
            ));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table></div>");

    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_row_with_outer_pipes() {
        assert_eq!(parse_row("| a | b |"), vec!["a", "b"]);
        assert_eq!(parse_row("|x|y|z|"), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_parse_row_without_outer_pipes() {
        assert_eq!(parse_row("a | b"), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_row_drops_empty_cells() {
        assert_eq!(parse_row("| a |  | b |"), vec!["a", "b"]);
    }

    #[test]
    fn test_separator_patterns() {
        assert!(SEPARATOR.is_match("|---|---|"));
        assert!(SEPARATOR.is_match("| :--- | ---: |"));
        assert!(SEPARATOR.is_match("--- | ---"));
        assert!(!SEPARATOR.is_match("| a | b |"));
        assert!(!SEPARATOR.is_match("------"));
    }

    #[test]
    fn test_basic_table() {
        let text = "| h1 | h2 |\n|----|----|\n| a | b |";
        let html = convert_tables(text);
        assert!(html.starts_with("<div class=\"overflow-x-auto my-4\">"));
        assert_eq!(html.matches("<th class").count(), 2);
        assert_eq!(html.matches("<td class").count(), 2);
    }

    #[test]
    fn test_table_stops_at_first_line_without_pipe() {
        let text = "| h |\n|---|\n| a |\nafter the table";
        let html = convert_tables(text);
        assert!(html.contains("</table></div>\nafter the table"));
    }

    #[test]
    fn test_text_around_table_is_preserved() {
        let text = "before\n| h1 | h2 |\n|---|---|\n| a | b |\nafter";
        let html = convert_tables(text);
        assert!(html.starts_with("before\n<div"));
        assert!(html.ends_with("\nafter"));
    }

    #[test]
    fn test_header_without_separator_is_untouched() {
        let text = "| not | a table |\njust text";
        assert_eq!(convert_tables(text), text);
    }

    #[test]
    fn test_table_without_body_rows() {
        let text = "| h1 | h2 |\n|---|---|";
        let html = convert_tables(text);
        assert_eq!(html.matches("<th class").count(), 2);
        assert_eq!(html.matches("<td class").count(), 0);
    }
}
