//! Markdown rendering for chat messages.
//!
//! Converts a message's content into a sanitized HTML fragment plus the
//! ordered list of attached image URLs. The dialect is deliberately small:
//! fenced code, inline code, bold, italic, headers, horizontal rules, flat
//! lists and pipe tables. All input text is escaped before any substitution
//! runs, so author text cannot inject markup; the passes then re-introduce a
//! fixed set of pre-styled tags.
//!
//! The function is pure: same input, same output. Feeding its own output
//! back in is not supported since generated tags are not markdown-escaped.

mod table;

use once_cell::sync::Lazy;
use regex::Regex;
use verdant_engine::{ContentPart, MessageContent};

/// Rendered message content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    /// Sanitized HTML fragment.
    pub html: String,
    /// Image URLs extracted from the content, in order.
    pub images: Vec<String>,
}

/// Render a message's content to HTML, collecting attached images.
pub fn render(content: &MessageContent) -> Rendered {
    let (text, images) = flatten(content);
    Rendered {
        html: render_text(&text),
        images,
    }
}

/// Flatten content to plain text, pulling image URLs out.
fn flatten(content: &MessageContent) -> (String, Vec<String>) {
    match content {
        MessageContent::Text(text) => (text.clone(), Vec::new()),
        MessageContent::Parts(parts) => {
            let mut texts = Vec::new();
            let mut images = Vec::new();
            for part in parts {
                match part {
                    ContentPart::Text { text } => texts.push(text.as_str()),
                    ContentPart::ImageUrl { image_url } => images.push(image_url.url.clone()),
                }
            }
            (texts.join("\n"), images)
        }
    }
}

/// Map the five HTML-significant characters to their entity forms.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

static CODE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```(\w*)\n(.*?)```").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static H6: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^###### (.+)$").unwrap());
static H5: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^##### (.+)$").unwrap());
static H4: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#### (.+)$").unwrap());
static H3: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^### (.+)$").unwrap());
static H2: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^## (.+)$").unwrap());
static H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^# (.+)$").unwrap());
static HRULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^---$").unwrap());
static UL_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^- (.+)$").unwrap());
static OL_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\d+\. (.+)$").unwrap());

/// Run the fixed substitution chain over already-escaped text.
///
/// Pass order matters: fenced code before inline code, bold before italic,
/// headers longest-pattern-first, everything before tables, and line-break
/// insertion last.
fn render_text(text: &str) -> String {
    let mut html = escape_html(text);

    html = CODE_BLOCK
        .replace_all(
            &html,
            "<pre class=\"bg-secondary rounded-lg p-3 overflow-x-auto my-3\"><code class=\"font-mono text-xs\">${2}</code></pre>",
        )
        .into_owned();
    html = INLINE_CODE
        .replace_all(
            &html,
            "<code class=\"bg-secondary px-1.5 py-0.5 rounded text-xs font-mono\">${1}</code>",
        )
        .into_owned();
    html = BOLD.replace_all(&html, "<strong>${1}</strong>").into_owned();
    html = replace_italics(&html);

    html = H6
        .replace_all(
            &html,
            "<h6 class=\"text-xs font-bold mt-3 mb-1 text-muted-foreground\">${1}</h6>",
        )
        .into_owned();
    html = H5
        .replace_all(&html, "<h5 class=\"text-sm font-bold mt-3 mb-1\">${1}</h5>")
        .into_owned();
    html = H4
        .replace_all(&html, "<h4 class=\"text-sm font-bold mt-4 mb-2\">${1}</h4>")
        .into_owned();
    html = H3
        .replace_all(&html, "<h3 class=\"text-base font-bold mt-4 mb-2\">${1}</h3>")
        .into_owned();
    html = H2
        .replace_all(&html, "<h2 class=\"text-lg font-bold mt-4 mb-2\">${1}</h2>")
        .into_owned();
    html = H1
        .replace_all(&html, "<h1 class=\"text-xl font-bold mt-4 mb-2\">${1}</h1>")
        .into_owned();

    html = HRULE
        .replace_all(&html, "<hr class=\"border-border my-4\">")
        .into_owned();
    html = UL_ITEM
        .replace_all(&html, "<li class=\"ml-4 list-disc\">${1}</li>")
        .into_owned();
    html = OL_ITEM
        .replace_all(&html, "<li class=\"ml-4 list-decimal\">${1}</li>")
        .into_owned();

    html = table::convert_tables(&html);

    insert_line_breaks(&html)
}

/// Single-asterisk emphasis.
///
/// A span opens at a `*` not adjacent to another `*`, closes at the next `*`
/// also not followed by `*`, and cannot contain `*`. Done as a scan because
/// the equivalent pattern needs lookaround.
fn replace_italics(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let opens = chars[i] == '*'
            && (i == 0 || chars[i - 1] != '*')
            && (i + 1 < chars.len() && chars[i + 1] != '*');
        if opens {
            if let Some(rel) = chars[i + 1..].iter().position(|&c| c == '*') {
                let close = i + 1 + rel;
                if chars.get(close + 1).copied() != Some('*') {
                    out.push_str("<em>");
                    out.extend(&chars[i + 1..close]);
                    out.push_str("</em>");
                    i = close + 1;
                    continue;
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Closing fragments that suppress the line break after them.
const BLOCK_SUFFIXES: [&str; 8] = [
    "</li>", "</h1>", "</h2>", "</h3>", "</table>", "</div>", "</pre>", "</ul>",
];

static HR_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<hr[^>]*>$").unwrap());

/// Replace remaining newlines with `<br>`, except immediately after a
/// block-level element's closing tag.
fn insert_line_breaks(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    for (pos, _) in text.match_indices('\n') {
        out.push_str(&text[last..pos]);
        let before = &text[..pos];
        if ends_with_block_tag(before) {
            out.push('\n');
        } else {
            out.push_str("<br>");
        }
        last = pos + 1;
    }
    out.push_str(&text[last..]);
    out
}

fn ends_with_block_tag(before: &str) -> bool {
    BLOCK_SUFFIXES.iter().any(|suffix| before.ends_with(suffix)) || HR_TAG.is_match(before)
}
