//! String scanning for replies that do not parse as JSON.
//!
//! A truncated or otherwise broken reply often still contains intact
//! `"key": value` pairs.  These helpers locate a key by its quoted name and
//! read the value that follows, without building a tree.  They never fail:
//! a miss yields the sentinel text from [`sentinel`] or the caller's default.

use std::str::Chars;

/// Placeholder text used for a string field that could not be read.
pub fn sentinel(key: &str) -> String {
    format!("未能解析{key}")
}

/// Position just past `"key"` followed by optional whitespace and a colon,
/// for each occurrence in `body`.
fn value_starts<'a>(body: &'a str, key: &str) -> impl Iterator<Item = usize> + 'a {
    let needle = format!("\"{key}\"");
    let mut from = 0;
    std::iter::from_fn(move || {
        while let Some(pos) = body[from..].find(&needle) {
            let after = from + pos + needle.len();
            from = after;
            let rest = &body[after..];
            let trimmed = rest.trim_start();
            if let Some(value) = trimmed.strip_prefix(':') {
                let value = value.trim_start();
                return Some(body.len() - value.len());
            }
        }
        None
    })
}

/// Read a quoted string value starting at `start`, decoding JSON escapes.
///
/// A malformed `\u` escape is kept verbatim.
fn read_quoted(body: &str, start: usize) -> Option<String> {
    let mut chars = body[start..].strip_prefix('"')?.chars();
    let mut out = String::new();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(out),
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'b' => out.push('\u{8}'),
                'f' => out.push('\u{c}'),
                'u' => {
                    let mut lookahead = chars.clone();
                    match unicode_escape(&mut lookahead) {
                        Some(decoded) => {
                            out.push(decoded);
                            chars = lookahead;
                        }
                        None => out.push_str("\\u"),
                    }
                }
                other => out.push(other),
            },
            other => out.push(other),
        }
    }
    None
}

/// Decode the hex part of a `\uXXXX` escape, joining a surrogate pair.
fn unicode_escape(chars: &mut Chars<'_>) -> Option<char> {
    let high = hex4(chars)?;
    if !(0xD800..0xDC00).contains(&high) {
        return char::from_u32(high);
    }
    if chars.next()? != '\\' || chars.next()? != 'u' {
        return None;
    }
    let low = hex4(chars)?;
    if !(0xDC00..0xE000).contains(&low) {
        return None;
    }
    char::from_u32(0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00))
}

fn hex4(chars: &mut Chars<'_>) -> Option<u32> {
    let mut value = 0;
    for _ in 0..4 {
        value = value * 16 + chars.next()?.to_digit(16)?;
    }
    Some(value)
}

/// Scan for a string value under `key`.  Returns the [`sentinel`] on a miss.
pub fn scan_string(body: &str, key: &str) -> String {
    value_starts(body, key)
        .find_map(|start| read_quoted(body, start))
        .unwrap_or_else(|| sentinel(key))
}

/// Scan for an integer value under `key`, reading up to the next `,` or `}`.
/// Returns `default` on a miss or when the text is not an integer.
pub fn scan_int(body: &str, key: &str, default: i64) -> i64 {
    value_starts(body, key)
        .next()
        .and_then(|start| {
            let rest = &body[start..];
            let end = rest.find([',', '}']).unwrap_or(rest.len());
            rest[..end].trim().parse().ok()
        })
        .unwrap_or(default)
}
