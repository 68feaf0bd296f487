//! Renderer for the small markdown dialect used in AI replies.
//!
//! Supported syntax is `**bold**`, `*italic*`, `- ` list items and plain
//! paragraphs. Rendering runs in two passes: an inline pass over the whole
//! text, then a line-based block pass.

use once_cell::sync::Lazy;
use regex::Regex;

static BOLD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\*\*(.*?)\*\*").expect("bold regex"));
static ITALIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\*(.*?)\*").expect("italic regex"));

const LIST_MARKER: &str = "- ";
const EMPTY_PARAGRAPH: &str = "<p></p>";

/// Render reply text to an HTML fragment.
///
/// Never fails. Unmatched emphasis markers are kept as literal text.
pub fn render(text: &str) -> String {
    let html = block_transform(&inline_transform(text));
    html.replace(EMPTY_PARAGRAPH, "")
}

/// Replace `**..**` with `<strong>` and then `*..*` with `<em>`.
///
/// Matching is non-greedy and may cross line breaks.
pub fn inline_transform(text: &str) -> String {
    let bold = BOLD_RE.replace_all(text, "<strong>$1</strong>");
    ITALIC_RE.replace_all(&bold, "<em>$1</em>").into_owned()
}

/// Turn each line into a paragraph or list item, grouping runs of list items
/// into a single `<ul>`.
pub fn block_transform(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let state = text
        .split('\n')
        .fold(ListState::Outside, |state, line| state.advance(line, &mut out));
    state.finish(&mut out);
    out
}

/// A single input line as seen by the block pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// `- ` prefixed line, holding the text after the marker
    Item(&'a str),
    /// Any other non-empty line, whitespace-only included
    Text(&'a str),
    /// Zero-length line
    Blank,
}

impl<'a> Line<'a> {
    pub fn classify(line: &'a str) -> Self {
        if let Some(rest) = line.strip_prefix(LIST_MARKER) {
            Line::Item(rest)
        } else if line.is_empty() {
            Line::Blank
        } else {
            Line::Text(line)
        }
    }
}

/// Whether the block pass is currently inside a `<ul>` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListState {
    #[default]
    Outside,
    Inside,
}

impl ListState {
    /// Consume one line, appending its markup to `out`, and return the next state.
    pub fn advance(self, line: &str, out: &mut String) -> Self {
        match (self, Line::classify(line)) {
            (ListState::Outside, Line::Item(item)) => {
                out.push_str("<ul>");
                push_wrapped(out, "li", item);
                ListState::Inside
            }
            (ListState::Inside, Line::Item(item)) => {
                push_wrapped(out, "li", item);
                ListState::Inside
            }
            (state, Line::Text(text)) => {
                state.finish(out);
                push_wrapped(out, "p", text);
                ListState::Outside
            }
            (state, Line::Blank) => {
                state.finish(out);
                ListState::Outside
            }
        }
    }

    /// Close an open list run. Called once at end of input.
    pub fn finish(self, out: &mut String) {
        if self == ListState::Inside {
            out.push_str("</ul>");
        }
    }
}

fn push_wrapped(out: &mut String, tag: &str, content: &str) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
    out.push_str(content);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}
