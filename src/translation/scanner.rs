/// Lexical state while walking SQL text.
#[derive(Clone)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// A parameter marker found outside literals and comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Marker<'a> {
    /// Bare `?`
    Anonymous,
    /// `?N` or `$N`; `sigil` is the leading byte.
    Numbered { sigil: u8, digits: &'a str },
    /// `:name`, `@name` or `$name`, sigil included.
    Named(&'a str),
}

/// Byte span of a marker in the scanned text.
#[derive(Debug, Clone, Copy)]
pub(super) struct Found<'a> {
    pub(super) start: usize,
    pub(super) end: usize,
    pub(super) marker: Marker<'a>,
}

/// Call `on_marker` for every parameter marker in `sql`, in text order.
///
/// Quoted strings, quoted identifiers, comments and `$tag$` blocks are
/// skipped. `::` (a cast) is never a marker.
pub(super) fn scan<'a>(sql: &'a str, mut on_marker: impl FnMut(Found<'a>)) {
    let bytes = sql.as_bytes();
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'-' if bytes.get(idx + 1) == Some(&b'-') => state = State::LineComment,
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' => {
                    if let Some((tag, close)) = dollar_quote_tag(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = close;
                    } else if let Some(end) = digits_end(bytes, idx + 1) {
                        on_marker(Found {
                            start: idx,
                            end,
                            marker: Marker::Numbered {
                                sigil: b'$',
                                digits: &sql[idx + 1..end],
                            },
                        });
                        idx = end - 1;
                    } else if let Some(end) = ident_end(bytes, idx + 1) {
                        on_marker(named(sql, idx, end));
                        idx = end - 1;
                    }
                }
                b'?' => {
                    if let Some(end) = digits_end(bytes, idx + 1) {
                        on_marker(Found {
                            start: idx,
                            end,
                            marker: Marker::Numbered {
                                sigil: b'?',
                                digits: &sql[idx + 1..end],
                            },
                        });
                        idx = end - 1;
                    } else {
                        on_marker(Found {
                            start: idx,
                            end: idx + 1,
                            marker: Marker::Anonymous,
                        });
                    }
                }
                b':' if bytes.get(idx + 1) == Some(&b':') => idx += 1,
                b':' | b'@' => {
                    if let Some(end) = ident_end(bytes, idx + 1) {
                        on_marker(named(sql, idx, end));
                        idx = end - 1;
                    }
                }
                _ => {}
            },
            State::SingleQuoted | State::DoubleQuoted => {
                let quote = if matches!(state, State::SingleQuoted) {
                    b'\''
                } else {
                    b'"'
                };
                if b == quote {
                    if bytes.get(idx + 1) == Some(&quote) {
                        idx += 1; // doubled quote is an escape
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if b == b'/' && bytes.get(idx + 1) == Some(&b'*') {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if b == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && closes_tag(bytes, idx, tag) {
                    idx += tag.len() + 1;
                    state = State::Normal;
                }
            }
        }
        idx += 1;
    }
}

fn named(sql: &str, start: usize, end: usize) -> Found<'_> {
    Found {
        start,
        end,
        marker: Marker::Named(&sql[start..end]),
    }
}

/// End of a run of ASCII digits starting at `start`, if any.
fn digits_end(bytes: &[u8], start: usize) -> Option<usize> {
    let end = start + bytes[start.min(bytes.len())..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    (end > start).then_some(end)
}

/// End of an identifier starting at `start`; must not start with a digit.
fn ident_end(bytes: &[u8], start: usize) -> Option<usize> {
    match bytes.get(start) {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
        _ => return None,
    }
    let end = start
        + bytes[start..]
            .iter()
            .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
            .count();
    Some(end)
}

/// `$tag$` opener at `start`: returns the tag and the index of its closing `$`.
fn dollar_quote_tag(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let mut idx = start + 1;
    while idx < bytes.len() && bytes[idx] != b'$' {
        let b = bytes[idx];
        if !(b.is_ascii_alphanumeric() || b == b'_') {
            return None;
        }
        idx += 1;
    }
    if idx >= bytes.len() {
        return None;
    }
    let tag = std::str::from_utf8(&bytes[start + 1..idx]).ok()?;
    // `$1` followed later by `$` is a numbered marker, not a quote.
    if tag.bytes().next().is_some_and(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((tag.to_string(), idx))
}

fn closes_tag(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let end = idx + 1 + tag.len();
    end < bytes.len() && &bytes[idx + 1..end] == tag.as_bytes() && bytes[end] == b'$'
}
