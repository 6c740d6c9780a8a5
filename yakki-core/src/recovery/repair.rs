//! Text-level cleanup and structural repair of JSON-like output
//!
//! Every scanner here tracks whether it is inside a string literal, so
//! braces, brackets and commas in quoted text are never touched.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[A-Za-z]*").unwrap());
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").unwrap());

/// Remove code-fence markers and collapse runs of blank lines
pub fn strip_fences(raw: &str) -> String {
    let without = FENCE.replace_all(raw, "");
    BLANK_LINES.replace_all(&without, "\n\n").trim().to_string()
}

/// Lexer state shared by the scanners
#[derive(Default)]
struct StringState {
    in_string: bool,
    escaped: bool,
}

impl StringState {
    /// Feed one char; returns true when it is structural (outside a string)
    fn feed(&mut self, c: char) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.in_string = false;
            }
            false
        } else if c == '"' {
            self.in_string = true;
            false
        } else {
            true
        }
    }
}

/// From the first `{` to its matching `}`. Without a match, up to the
/// last `}` in the text.
pub fn outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut state = StringState::default();
    let mut depth = 0usize;

    for (offset, c) in text[start..].char_indices() {
        if !state.feed(c) {
            continue;
        }
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Everything from the first `{` on, or `None` when there is no brace
pub fn from_first_brace(text: &str) -> Option<&str> {
    text.find('{').map(|start| &text[start..])
}

/// Best-effort structural repair: close an unterminated string, drop
/// dangling commas, fill a dangling value and balance braces/brackets.
pub fn repair(text: &str) -> String {
    let text = close_odd_quote(text.trim());
    let text = drop_trailing_commas(&text);
    let text = fill_dangling_value(&text);
    let text = drop_trailing_commas(&text);
    balance(&text)
}

/// Count of `"` that are not escaped
fn unescaped_quotes(text: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            positions.push(i);
        }
    }
    positions
}

/// JSON strings cannot span lines, so a line with an odd number of quotes
/// holds an unterminated string. It is closed before the line's trailing
/// commas and closers. Single-line text that is still unbalanced gets its
/// last string closed at the nearest comma, brace, bracket or newline.
fn close_odd_quote(text: &str) -> String {
    let per_line: Vec<String> = text
        .split('\n')
        .map(|line| {
            if unescaped_quotes(line).len() % 2 == 0 {
                return line.to_string();
            }
            let body = line.trim_end();
            let cut = body.trim_end_matches([',', '}', ']']).trim_end().len();
            format!("{}\"{}", &body[..cut], &body[cut..])
        })
        .collect();
    let text = per_line.join("\n");

    let quotes = unescaped_quotes(&text);
    if quotes.len() % 2 == 0 {
        return text;
    }
    let Some(&last) = quotes.last() else {
        return text;
    };
    let after = last + 1;
    let insert_at = text[after..]
        .find([',', '}', ']', '\n'])
        .map(|offset| after + offset)
        .unwrap_or(text.len());

    let mut out = String::with_capacity(text.len() + 1);
    out.push_str(text[..insert_at].trim_end());
    out.push('"');
    out.push_str(&text[insert_at..]);
    out
}

/// Remove commas followed only by whitespace and a closer or the end
fn drop_trailing_commas(text: &str) -> String {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut state = StringState::default();
    let mut out = String::with_capacity(text.len());

    for (idx, &(_, c)) in chars.iter().enumerate() {
        let structural = state.feed(c);
        if structural && c == ',' {
            let next = chars[idx + 1..]
                .iter()
                .map(|(_, n)| *n)
                .find(|n| !n.is_whitespace());
            if matches!(next, None | Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// `{"key":` at the very end gets a null value
fn fill_dangling_value(text: &str) -> String {
    let trimmed = text.trim_end();
    if trimmed.ends_with(':') && !ends_inside_string(trimmed) {
        format!("{} null", trimmed)
    } else {
        text.to_string()
    }
}

fn ends_inside_string(text: &str) -> bool {
    let mut state = StringState::default();
    for c in text.chars() {
        state.feed(c);
    }
    state.in_string
}

/// Append the closers still open at the end, innermost first. Stray
/// closers without an opener are dropped.
fn balance(text: &str) -> String {
    let mut state = StringState::default();
    let mut stack = Vec::new();
    let mut out = String::with_capacity(text.len() + 8);

    for c in text.chars() {
        if state.feed(c) {
            match c {
                '{' => stack.push('}'),
                '[' => stack.push(']'),
                '}' | ']' => {
                    if stack.last() == Some(&c) {
                        stack.pop();
                    } else if stack.contains(&c) {
                        // Close whatever was left open inside
                        while let Some(open) = stack.pop() {
                            out.push(open);
                            if open == c {
                                break;
                            }
                        }
                        continue;
                    } else {
                        continue;
                    }
                }
                _ => {}
            }
        }
        out.push(c);
    }

    if state.in_string {
        out.push('"');
    }
    while let Some(close) = stack.pop() {
        out.push(close);
    }
    out
}

/// Every balanced `{...}` span, longest first
pub fn balanced_spans(text: &str) -> Vec<&str> {
    let mut spans = scan_spans(text, true);
    if spans.is_empty() {
        // An unterminated quote hides every brace after it
        spans = scan_spans(text, false);
    }
    spans.sort_by(|a, b| b.len().cmp(&a.len()).then(a.as_ptr().cmp(&b.as_ptr())));
    spans.dedup();
    spans
}

fn scan_spans(text: &str, string_aware: bool) -> Vec<&str> {
    let mut state = StringState::default();
    let mut starts = Vec::new();
    let mut spans = Vec::new();

    for (i, c) in text.char_indices() {
        if string_aware && !state.feed(c) {
            continue;
        }
        match c {
            '{' => starts.push(i),
            '}' => {
                if let Some(start) = starts.pop() {
                    spans.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    spans
}
