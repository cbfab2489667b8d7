/*!
 * Python literal to JSON conversion.
 *
 * The PaddleOCR command line prints its result as a Python `repr`: single
 * quoted strings, `None`/`True`/`False`, NumPy `array(..., dtype=...)`
 * wrappers, tuples, `...` elisions in long arrays, and sometimes a tail cut
 * off by the process buffer. [`python_literal_to_json`] rewrites all of that
 * into text that `serde_json` accepts.
 */

use once_cell::sync::Lazy;
use regex::Regex;

static DTYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*dtype=[\w.]+").expect("valid regex"));
static SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*shape=\(\s*[\d,\s]*\)").expect("valid regex"));

/// Open bracket bookkeeping
#[derive(Debug, Clone, Copy, PartialEq)]
enum Frame {
    /// `[` or `(` rendered as a JSON array
    Array,
    Object,
    /// Call parentheses of a dropped wrapper such as `array(` or `np.float32(`
    Call,
}

/// Convert a Python literal (as printed by `repr`) into JSON text
pub fn python_literal_to_json(input: &str) -> String {
    let cleaned = DTYPE.replace_all(input, "");
    let cleaned = SHAPE.replace_all(&cleaned, "");
    let chars: Vec<char> = cleaned.chars().collect();

    let mut out = String::with_capacity(chars.len());
    let mut stack: Vec<Frame> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                let (literal, next, closed) = read_string(&chars, i);
                out.push('"');
                out.push_str(&literal);
                if closed {
                    out.push('"');
                } else {
                    // Truncated inside a string; close it and stop
                    out.push('"');
                    i = chars.len();
                    continue;
                }
                i = next;
            }
            '[' => {
                stack.push(Frame::Array);
                out.push('[');
                i += 1;
            }
            '(' => {
                stack.push(Frame::Array);
                out.push('[');
                i += 1;
            }
            '{' => {
                stack.push(Frame::Object);
                out.push('{');
                i += 1;
            }
            ']' | ')' | '}' => {
                match stack.pop() {
                    Some(Frame::Call) => {}
                    Some(Frame::Array) => close(&mut out, ']'),
                    Some(Frame::Object) => close(&mut out, '}'),
                    None => {}
                }
                i += 1;
            }
            '.' if chars[i..].starts_with(&['.', '.', '.']) => {
                i += 3;
                while i < chars.len() && chars[i].is_whitespace() {
                    i += 1;
                }
                if i < chars.len() && chars[i] == ',' {
                    i += 1;
                }
            }
            c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                let (number, next) = read_number(&chars, i);
                out.push_str(&number);
                i = next;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                let mut lookahead = i;
                while lookahead < chars.len() && chars[lookahead].is_whitespace() {
                    lookahead += 1;
                }
                if lookahead < chars.len() && chars[lookahead] == '(' {
                    stack.push(Frame::Call);
                    i = lookahead + 1;
                    continue;
                }
                out.push_str(&map_identifier(&ident));
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Array => close(&mut out, ']'),
            Frame::Object => close(&mut out, '}'),
            Frame::Call => {}
        }
    }
    out
}

/// Emit a closer after dropping a trailing comma or dangling separator
fn close(out: &mut String, closer: char) {
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    if out.ends_with(',') {
        out.pop();
    }
    if closer == '}' && out.ends_with(':') {
        out.push_str("null");
    }
    out.push(closer);
}

fn is_non_finite(ident: &str) -> bool {
    matches!(ident, "nan" | "NaN" | "inf" | "np.nan" | "np.inf" | "Infinity")
}

/// End index of a non-finite identifier starting at `start`, if there is one
fn non_finite_end(chars: &[char], start: usize) -> Option<usize> {
    let mut end = start;
    while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_' || chars[end] == '.') {
        end += 1;
    }
    let ident: String = chars[start..end].iter().collect();
    is_non_finite(&ident).then_some(end)
}

fn map_identifier(ident: &str) -> String {
    match ident {
        "None" => "null".to_string(),
        ident if is_non_finite(ident) => "null".to_string(),
        "True" => "true".to_string(),
        "False" => "false".to_string(),
        other => format!("\"{}\"", other),
    }
}

/// Read a quoted string starting at `start`; returns the JSON-escaped body,
/// the index after the closing quote, and whether the quote was closed
fn read_string(chars: &[char], start: usize) -> (String, usize, bool) {
    let quote = chars[start];
    let mut body = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            match chars.get(i + 1) {
                Some('\'') => body.push('\''),
                Some(&next) => {
                    body.push('\\');
                    body.push(next);
                }
                None => return (body, chars.len(), false),
            }
            i += 2;
            continue;
        }
        if c == quote {
            return (body, i + 1, true);
        }
        if c == '"' {
            body.push_str("\\\"");
        } else {
            body.push(c);
        }
        i += 1;
    }
    (body, chars.len(), false)
}

/// Read a numeric literal and make it valid JSON (`1.` -> `1.0`, `.5` -> `0.5`, `+1` -> `1`)
fn read_number(chars: &[char], start: usize) -> (String, usize) {
    let mut i = start;
    let mut raw = String::new();
    while i < chars.len() {
        let c = chars[i];
        let exponent_sign = (c == '-' || c == '+') && matches!(raw.chars().last(), Some('e' | 'E'));
        let leading_sign = (c == '-' || c == '+') && raw.is_empty();
        if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || exponent_sign || leading_sign {
            if c == '.' && chars[i..].starts_with(&['.', '.', '.']) {
                break;
            }
            raw.push(c);
            i += 1;
        } else {
            break;
        }
    }

    let mut number = raw.trim_start_matches('+').to_string();
    if number.starts_with('.') {
        number.insert(0, '0');
    } else if number.starts_with("-.") {
        number.insert(1, '0');
    }
    if number.ends_with('.') {
        number.push('0');
    }
    if number.is_empty() || number == "-" {
        // `-inf` and `-nan` have no JSON form; the sign goes with the value
        if let Some(end) = non_finite_end(chars, i) {
            return ("null".to_string(), end);
        }
        // A lone sign is not a number; keep the character so the JSON error is visible
        return (raw, i.max(start + 1));
    }
    (number.replace(".e", ".0e").replace(".E", ".0E"), i)
}
