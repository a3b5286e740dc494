//! Best-effort parsing of incomplete JSON.
//!
//! Used while tool-call arguments are still streaming in. Open strings are
//! closed, open arrays/objects are closed in nesting order, and anything that
//! cannot be completed (a dangling key, a half-written literal) is cut back to
//! the previous separator.

use serde_json::Value;

/// Result of scanning a JSON prefix.
#[derive(Debug, Default)]
struct Scan {
    /// Closers for every open container, innermost last.
    closers: Vec<char>,
    in_string: bool,
    /// A backslash is waiting for its escaped character.
    escaped: bool,
    /// Byte offset of an unfinished `\uXXXX` escape.
    open_unicode: Option<(usize, u8)>,
    /// Last offset the prefix can be truncated at while staying well-formed
    /// up to that point.
    last_cut: Option<usize>,
}

fn scan(input: &str) -> Scan {
    let mut state = Scan::default();

    for (pos, ch) in input.char_indices() {
        if state.in_string {
            if let Some((start, digits)) = state.open_unicode {
                if ch.is_ascii_hexdigit() && digits < 3 {
                    state.open_unicode = Some((start, digits + 1));
                } else {
                    state.open_unicode = None;
                }
                continue;
            }
            if state.escaped {
                state.escaped = false;
                if ch == 'u' {
                    state.open_unicode = Some((pos - 1, 0));
                }
                continue;
            }
            match ch {
                '\\' => state.escaped = true,
                '"' => state.in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => state.in_string = true,
            '{' => {
                state.closers.push('}');
                state.last_cut = Some(pos + 1);
            }
            '[' => {
                state.closers.push(']');
                state.last_cut = Some(pos + 1);
            }
            '}' | ']' => {
                state.closers.pop();
            }
            ',' => state.last_cut = Some(pos),
            _ => {}
        }
    }

    state
}

fn complete(input: &str, state: &Scan) -> String {
    let mut out = input.to_string();

    if state.in_string {
        if let Some((start, _)) = state.open_unicode {
            out.truncate(start);
        } else if state.escaped {
            out.pop();
        }
        out.push('"');
    } else {
        let keep = out
            .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ':'))
            .len();
        out.truncate(keep);
        trim_unfinished_number(&mut out);
    }

    for closer in state.closers.iter().rev() {
        out.push(*closer);
    }
    out
}

/// Strip a dangling sign, decimal point, or exponent marker from a number.
fn trim_unfinished_number(out: &mut String) {
    while let Some(last) = out.chars().last() {
        let before = out[..out.len() - last.len_utf8()].chars().last();
        let dangling = match last {
            '.' | '-' | '+' => true,
            'e' | 'E' => before.is_some_and(|c| c.is_ascii_digit() || c == '.'),
            _ => false,
        };
        if !dangling {
            break;
        }
        out.pop();
    }
}

/// Parse a possibly-incomplete JSON document.
///
/// Returns `None` when no prefix of the input can be completed into valid
/// JSON.
pub fn parse_partial(input: &str) -> Option<Value> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let mut candidate = trimmed.to_string();
    loop {
        let state = scan(&candidate);
        let completed = complete(&candidate, &state);
        if let Ok(value) = serde_json::from_str(&completed) {
            return Some(value);
        }
        match state.last_cut {
            Some(cut) if cut < candidate.len() => candidate.truncate(cut),
            _ => return None,
        }
    }
}
