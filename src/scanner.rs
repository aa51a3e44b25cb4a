//! Lua string literal scanning: locate quoted and long-bracketed literals in
//! source text and decode their escape sequences.
//!
//! Operates byte-wise throughout (Lua source is conceptually Latin-1, and
//! Rust's `&str` UTF-8 invariant would otherwise get in the way of
//! arbitrary single-byte slicing).
//!
//! Note on the regex backend: Rust's `regex` crate is a finite-automaton
//! engine and deliberately does not support backreferences, so the
//! long-bracket alternative (`\1`-style "same `=` count on both ends")
//! cannot be expressed as a single compiled pattern the way it could with
//! a backtracking engine. The quoted-string alternative needs no
//! backreference (two fixed-quote-character patterns cover it) and stays
//! a single compiled, reused `Regex`; the long-bracket alternative is
//! scanned by hand instead, walking forward from each candidate `[`.

use once_cell::sync::Lazy;
use regex::bytes::Regex;

use crate::error::{Result, ShroudError};

/// Prefix that opts a literal into encryption even when global encryption
/// is disabled. Stripped from the decoded content before encryption.
pub const SENTINEL: &str = "[STR_ENCRYPT]";

/// Matches a single- or double-quoted Lua string literal, anchored to the
/// start of whatever slice it is run against.
static QUOTED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s-u)\A(?:'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*")"#)
        .expect("literal scanner regex is a compile-time constant")
});

/// A single matched string literal, with both its raw source span and its
/// decoded payload.
#[derive(Clone, Debug, PartialEq)]
pub struct LiteralMatch {
    /// Byte offset of the first character of the match (the opening quote
    /// or bracket) in the original source.
    pub start: usize,
    /// Byte offset one past the last character of the match.
    pub end: usize,
    /// Decoded content, with escapes resolved for quoted literals and taken
    /// verbatim for long-bracketed literals.
    pub content: Vec<u8>,
    /// True if `content` began with [`SENTINEL`] (already stripped).
    pub marked: bool,
}

/// Scan `source` for all Lua string literals, left to right.
pub fn scan(source: &str) -> Result<Vec<LiteralMatch>> {
    let bytes = source.as_bytes();
    let mut matches = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if let Some((whole_end, content_start, content_end)) = try_long_bracket(bytes, i) {
            let decoded = bytes[content_start..content_end].to_vec();
            let (marked, content) = strip_sentinel(decoded);
            matches.push(LiteralMatch { start: i, end: whole_end, content, marked });
            i = whole_end;
            continue;
        }

        if let Some(m) = QUOTED_RE.find(&bytes[i..]) {
            let whole_end = i + m.end();
            let inner = &bytes[i + 1..whole_end - 1];
            let decoded = unescape_lua_bytes(inner, i + 1)?;
            let (marked, content) = strip_sentinel(decoded);
            matches.push(LiteralMatch { start: i, end: whole_end, content, marked });
            i = whole_end;
            continue;
        }

        i += 1;
    }

    Ok(matches)
}

/// If a long-bracketed literal opens at `i`, return
/// `(end_of_whole_match, content_start, content_end)`.
fn try_long_bracket(bytes: &[u8], i: usize) -> Option<(usize, usize, usize)> {
    if bytes.get(i) != Some(&b'[') {
        return None;
    }
    let mut j = i + 1;
    while bytes.get(j) == Some(&b'=') {
        j += 1;
    }
    let level = j - (i + 1);
    if bytes.get(j) != Some(&b'[') {
        return None;
    }
    let content_start = j + 1;

    let mut k = content_start;
    while k < bytes.len() {
        if bytes[k] == b']' {
            let eq_start = k + 1;
            let eq_end = eq_start + level;
            if bytes.get(eq_start..eq_end).map(|s| s.iter().all(|&b| b == b'=')) == Some(true)
                && bytes.get(eq_end) == Some(&b']')
            {
                return Some((eq_end + 1, content_start, k));
            }
        }
        k += 1;
    }
    None
}

fn strip_sentinel(content: Vec<u8>) -> (bool, Vec<u8>) {
    let sentinel = SENTINEL.as_bytes();
    if content.starts_with(sentinel) {
        (true, content[sentinel.len()..].to_vec())
    } else {
        (false, content)
    }
}

/// True if `content` contains any of the case-insensitive "important"
/// substrings used by the `ImportantStrings` rewriter stage.
pub fn is_important(content: &[u8]) -> bool {
    const NEEDLES: &[&[u8]] = &[b"http", b"function", b"metatable", b"local"];
    let lower: Vec<u8> = content.iter().map(|b| b.to_ascii_lowercase()).collect();
    NEEDLES.iter().any(|needle| contains_subslice(&lower, needle))
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return needle.is_empty();
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Decode a Lua quoted-string body (the text between the quotes, escapes
/// intact) into its raw byte value. `base_pos` is the body's offset in the
/// original source, used only to report accurate error positions.
///
/// Recognizes `\a \b \f \n \r \t \v`, a backslash followed by any
/// non-digit (emitted literally), and a backslash followed by 1-3 decimal
/// digits (the longest such run, emitted as that numeric byte value).
pub fn unescape_lua_bytes(escaped: &[u8], base_pos: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(escaped.len());
    let mut i = 0;
    while i < escaped.len() {
        let b = escaped[i];
        if b != b'\\' {
            out.push(b);
            i += 1;
            continue;
        }
        i += 1;
        if i >= escaped.len() {
            return Err(ShroudError::TrailingBackslash { pos: base_pos + i - 1 });
        }
        let next = escaped[i];
        match next {
            b'a' => { out.push(0x07); i += 1; }
            b'b' => { out.push(0x08); i += 1; }
            b'f' => { out.push(0x0C); i += 1; }
            b'n' => { out.push(0x0A); i += 1; }
            b'r' => { out.push(0x0D); i += 1; }
            b't' => { out.push(0x09); i += 1; }
            b'v' => { out.push(0x0B); i += 1; }
            b'0'..=b'9' => {
                let start = i;
                let mut end = i;
                while end < escaped.len() && end < start + 3 && escaped[end].is_ascii_digit() {
                    end += 1;
                }
                let digits = std::str::from_utf8(&escaped[start..end]).expect("ASCII decimal digits");
                let value: u32 = digits.parse().expect("digits are ASCII decimal");
                if value > 255 {
                    return Err(ShroudError::MalformedEscape { pos: base_pos + start - 1 });
                }
                out.push(value as u8);
                i = end;
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    Ok(out)
}

/// Convenience wrapper over [`unescape_lua_bytes`] for callers working with
/// `&str` bodies directly (e.g. tests).
pub fn unescape_lua_string(escaped: &str) -> Result<Vec<u8>> {
    unescape_lua_bytes(escaped.as_bytes(), 0)
}
