//! Lexical tokenizer producing one token per output line.
//!
//! Runs of ASCII word characters are single tokens, every character of
//! [`PUNCTUATION`] is a token of its own and everything else separates
//! tokens. For Python sources the leading indentation of each non-blank
//! line is kept as an extra token so that re-indenting shows up in blame.

use std::sync::LazyLock;

use regex::bytes::Regex;

/// Characters emitted as single-character tokens.
pub const PUNCTUATION: [char; 27] = [
    '{', '}', '[', ']', '"', '\'', '(', ')', '\\', '*', '#', '/', '.', '-', '<', '>', '&', '!',
    '+', '%', '^', '~', '?', ':', '=', '|', ';',
];

fn punctuation_alternatives() -> String {
    PUNCTUATION
        .iter()
        .map(|c| regex::escape(&c.to_string()))
        .collect::<Vec<_>>()
        .join("|")
}

static WORD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("[0-9A-Za-z_]+|{}", punctuation_alternatives()))
        .expect("word regex is valid")
});

// The indentation alternative comes first so it wins at the start of a line.
static INDENTED_WORD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "(?m)(?P<indent>^[ \t]+)|[0-9A-Za-z_]+|{}",
        punctuation_alternatives()
    ))
    .expect("indented word regex is valid")
});

fn is_indentation_sensitive(path: &str) -> bool {
    path.ends_with(".py")
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// Splits `content` into tokens, in the order they appear.
pub fn tokens<'a>(path: &str, content: &'a [u8]) -> Vec<&'a [u8]> {
    if !is_indentation_sensitive(path) {
        return WORD_REGEX
            .find_iter(content)
            .map(|m| m.as_bytes())
            .collect();
    }

    let mut tokens = Vec::new();
    for caps in INDENTED_WORD_REGEX.captures_iter(content) {
        if let Some(indent) = caps.name("indent") {
            // Indentation only counts when the line has something after it.
            match content.get(indent.end()) {
                Some(&next) if !is_whitespace(next) => tokens.push(indent.as_bytes()),
                _ => {}
            }
            continue;
        }
        if let Some(m) = caps.get(0) {
            tokens.push(m.as_bytes());
        }
    }
    tokens
}

/// Returns the tokenized form of `content`: every token followed by a newline.
pub fn tokenize(path: &str, content: &[u8]) -> Vec<u8> {
    let tokens = tokens(path, content);
    let mut out = Vec::with_capacity(content.len() + tokens.len());
    for token in tokens {
        out.extend_from_slice(token);
        out.push(b'\n');
    }
    out
}
