//! Boundary matching for nested expression text
//!
//! Argument lists and sub-expressions are delimited by scanning for the
//! first closing token or comma at nesting depth zero. Parens and square
//! brackets both nest; quoted text is opaque.

/// Find the byte offset of the first `)`, `]` or `,` at depth zero,
/// scanning forward from `start`.
///
/// `(` and `[` increase the depth, `)` and `]` decrease it; a closer or a
/// comma seen at depth zero is the boundary. Commas inside nested groups
/// are not boundaries. Returns `None` when no boundary exists or `start`
/// is out of range.
pub fn find_boundary(text: &str, start: usize) -> Option<usize> {
    if start > text.len() {
        return None;
    }
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut pos = start;
    while pos < bytes.len() {
        let b = bytes[pos];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
        } else {
            match b {
                b'\'' | b'"' => quote = Some(b),
                b'(' | b'[' => depth += 1,
                b')' | b']' => {
                    if depth == 0 {
                        return Some(pos);
                    }
                    depth -= 1;
                }
                b',' => {
                    if depth == 0 {
                        return Some(pos);
                    }
                }
                _ => {}
            }
        }
        pos += 1;
    }
    None
}

/// Check that parens, brackets and braces nest properly and every quote is
/// closed.
pub fn is_balanced(text: &str) -> bool {
    let mut stack = Vec::new();
    let mut quote: Option<char> = None;
    for c in text.chars() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => stack.push(c),
            ')' => {
                if stack.pop() != Some('(') {
                    return false;
                }
            }
            ']' => {
                if stack.pop() != Some('[') {
                    return false;
                }
            }
            '}' => {
                if stack.pop() != Some('{') {
                    return false;
                }
            }
            _ => {}
        }
    }
    stack.is_empty() && quote.is_none()
}
