use crate::error::LineageError;

/// Remove one layer of `[...]` or `"..."` quoting from an identifier segment.
///
/// Opening and closing markers are stripped independently, so a segment cut
/// short by error recovery (`[Foo`) still loses its bracket.
pub fn unquote_segment(segment: &str) -> &str {
    let segment = segment.trim();
    if let Some(inner) = segment.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return inner;
    }
    let segment = segment.strip_prefix('[').unwrap_or(segment);
    segment.strip_suffix(']').unwrap_or(segment)
}

/// Split a qualified identifier on the dots that are not inside quotes.
///
/// Handles dots inside quoted identifiers, e.g. `[my.db].dbo.[t.1]`, and keeps
/// empty segments so `db..table` still reads as three parts.
pub fn split_qualified_name(name: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_brackets = false;
    let mut in_quotes = false;
    let mut start = 0usize;

    for (idx, ch) in name.char_indices() {
        match ch {
            '[' if !in_quotes => in_brackets = true,
            ']' if !in_quotes => in_brackets = false,
            '"' if !in_brackets => in_quotes = !in_quotes,
            '.' if !in_brackets && !in_quotes => {
                parts.push(name[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(name[start..].trim());
    parts
}

/// Map raw qualified-identifier text to its canonical table key.
///
/// - one or two segments: the last segment, unquoted
/// - three segments in `home_database`: the table segment alone, so
///   `BRS.dbo.Foo` and `Foo` collapse to the same key
/// - three segments elsewhere: all three unquoted segments joined with dots
///
/// Keys are uppercased. A segment that itself contains a dot keeps its
/// brackets in the key, so keys always split back into the same segments.
/// Empty input and more than three segments break the parser's capture
/// contract and are returned as fatal errors.
pub fn normalize_table_name(raw: &str, home_database: &str) -> Result<String, LineageError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(LineageError::EmptyQualifiedName);
    }

    let upper = raw.to_uppercase();
    let segments = split_qualified_name(&upper);
    match segments.as_slice() {
        [table] | [_, table] => Ok(key_segment(table)),
        [database, schema, table] => {
            if unquote_segment(database) == home_database.trim().to_uppercase() {
                Ok(key_segment(table))
            } else {
                Ok(format!(
                    "{}.{}.{}",
                    key_segment(database),
                    key_segment(schema),
                    key_segment(table)
                ))
            }
        }
        _ => Err(LineageError::UnhandledQualifiedName {
            raw: raw.to_string(),
            segments: segments.len(),
        }),
    }
}

/// Unquoted segment, re-bracketed when it contains a dot.
fn key_segment(segment: &str) -> String {
    let bare = unquote_segment(segment);
    if bare.contains('.') {
        format!("[{bare}]")
    } else {
        bare.to_string()
    }
}

/// True when a canonical key still carries a foreign database qualification.
///
/// Decided by segment count: `[NOT.LISTED]` is one bracketed segment, not a
/// qualified name.
pub fn is_cross_database(key: &str) -> bool {
    split_qualified_name(key).len() > 1
}

/// True when the key names a temp table (`#t`, `##t`).
pub fn is_temp_table(key: &str, temp_prefix: &str) -> bool {
    key.starts_with(temp_prefix)
}
