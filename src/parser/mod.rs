/// Parse events, syntax errors and the parser capability traits.
pub mod events;
/// Table-name normalization (qualified identifiers, bracket quoting, home database).
pub mod names;
/// Rewrites of T-SQL constructs the AST parser rejects.
pub mod shape;
/// T-SQL parser built on `sqlparser`'s MS SQL dialect.
pub mod sql_parser;
