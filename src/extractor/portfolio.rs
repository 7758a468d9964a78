use std::collections::BTreeSet;

use crate::catalog::Catalog;

/// Catalog codes matched by a literal token.
///
/// - an exact catalog code always matches itself
/// - a trailing wildcard (`AA%`) matches every code starting with the stem
/// - a leading wildcard (`%ZZ`) matches every code ending with the stem
///
/// Both wildcard rules apply to the same token; the leading rule sees the
/// token with its trailing wildcard already removed, so `%ZZ%` matches codes
/// ending in `ZZ`.
pub fn match_portfolio_code(token: &str, catalog: &Catalog, wildcard: char) -> BTreeSet<String> {
    let mut matches = BTreeSet::new();
    if catalog.is_portfolio_code(token) {
        matches.insert(token.to_string());
    }

    let mut stem = token;
    if let Some(prefix) = token.strip_suffix(wildcard) {
        matches.extend(
            catalog
                .portfolio_codes_with_prefix(prefix)
                .map(ToString::to_string),
        );
        stem = prefix;
    }
    if let Some(suffix) = stem.strip_prefix(wildcard) {
        matches.extend(
            catalog
                .portfolio_codes()
                .filter(|code| code.ends_with(suffix))
                .map(ToString::to_string),
        );
    }
    matches
}

/// Strip one layer of single quotes from a literal, each side independently.
pub fn unquote_literal(literal: &str) -> &str {
    let literal = literal.trim();
    let literal = literal.strip_prefix('\'').unwrap_or(literal);
    literal.strip_suffix('\'').unwrap_or(literal)
}
