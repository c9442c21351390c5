use std::borrow::Cow;

mod scanner;

use scanner::{Found, Marker, scan};

/// Parameter marker style a backend compiles natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaceholderStyle {
    /// PostgreSQL-style placeholders like `$1`.
    Postgres,
    /// SQLite-style placeholders like `?1`.
    #[default]
    Sqlite,
}

/// Translate numbered placeholders between Postgres-style `$N` and SQLite-style `?N`.
///
/// Translation skips quoted strings, comments, and dollar-quoted blocks. Named
/// and anonymous markers are left untouched. Returns a borrowed `Cow` when no
/// changes are needed.
///
/// ```rust
/// use sql_plugins::prelude::*;
///
/// let sql = translate_placeholders("insert into t values($1, $2)", PlaceholderStyle::Sqlite, true);
/// assert_eq!(sql, "insert into t values(?1, ?2)");
/// ```
#[must_use]
pub fn translate_placeholders(sql: &str, target: PlaceholderStyle, enabled: bool) -> Cow<'_, str> {
    if !enabled {
        return Cow::Borrowed(sql);
    }

    let (from, to) = match target {
        PlaceholderStyle::Sqlite => (b'$', '?'),
        PlaceholderStyle::Postgres => (b'?', '$'),
    };

    let mut out: Option<String> = None;
    let mut copied = 0;
    scan(sql, |found| {
        if let Marker::Numbered { sigil, digits } = found.marker
            && sigil == from
        {
            let buf = out.get_or_insert_with(|| String::with_capacity(sql.len()));
            buf.push_str(&sql[copied..found.start]);
            buf.push(to);
            buf.push_str(digits);
            copied = found.end;
        }
    });

    match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(sql),
    }
}

/// Declared parameters of `sql`, one entry per parameter index.
///
/// Follows SQLite's numbering: an anonymous `?` takes the next index, `?N`
/// and `$N` take index `N`, and a named marker takes the next index the first
/// time its name appears. Entries are `Some(name)` for named and numbered
/// markers (as written, sigil included) and `None` for anonymous ones.
///
/// Backends without native parameter introspection can use this to fill
/// [`StatementShape`](crate::plugin::StatementShape).
#[must_use]
pub fn scan_markers(sql: &str) -> Vec<Option<String>> {
    let mut slots: Vec<Option<String>> = Vec::new();
    let mut next = 0usize;
    scan(sql, |Found { marker, .. }| match marker {
        Marker::Anonymous => {
            next += 1;
            assign(&mut slots, next, None);
        }
        Marker::Numbered { sigil, digits } => {
            let Ok(index) = digits.parse::<usize>() else {
                return;
            };
            if index == 0 {
                return;
            }
            let name = format!("{}{digits}", char::from(sigil));
            assign(&mut slots, index, Some(name));
            next = next.max(index);
        }
        Marker::Named(name) => {
            if !slots.iter().flatten().any(|seen| seen == name) {
                next += 1;
                assign(&mut slots, next, Some(name.to_string()));
            }
        }
    });
    slots
}

fn assign(slots: &mut Vec<Option<String>>, index: usize, name: Option<String>) {
    if slots.len() < index {
        slots.resize(index, None);
    }
    if name.is_some() {
        slots[index - 1] = name;
    }
}
