use std::ops::Range;

use sqlparser::dialect::MsSqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Location, Token, TokenWithSpan, Tokenizer};

/// A batch rewritten into a form the AST parser accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapedBatch {
    /// Text for the parser. Line numbers match the input.
    pub text: String,
    /// Literals found in a blanked procedure parameter list (default values).
    pub header_literals: Vec<String>,
}

/// Rewrite T-SQL constructs the `sqlparser` MS SQL dialect rejects:
///
/// - the bare parameter list of `CREATE|ALTER PROCEDURE name @p T, ... AS`
///   (and any `WITH` options before `AS`) is blanked out, its literals kept
///   in [`ShapedBatch::header_literals`]
/// - `CREATE PROC` is spelled out as `CREATE PROCEDURE`
/// - `BEGIN TRY`, `END TRY`, `BEGIN CATCH` and `END CATCH` markers are
///   blanked, leaving their statements in the enclosing block
///
/// Blanking replaces characters with spaces and keeps line breaks, so parser
/// positions stay valid. Only the `PROC` rewrite shifts columns, on its own
/// line. A batch that cannot be tokenized is returned unchanged.
pub fn shape_batch(dialect: &MsSqlDialect, text: &str) -> ShapedBatch {
    let unchanged = || ShapedBatch {
        text: text.to_string(),
        header_literals: Vec::new(),
    };
    let Ok(tokens) = Tokenizer::new(dialect, text).tokenize_with_location() else {
        return unchanged();
    };
    let tokens: Vec<&TokenWithSpan> = tokens
        .iter()
        .filter(|t| !matches!(t.token, Token::Whitespace(_)))
        .collect();
    let offsets = LineOffsets::new(text);
    let mut edits = Edits::default();
    let mut header_literals = Vec::new();

    if let Some(header) = procedure_header(&tokens) {
        if let Some(at) = header.short_keyword_end.and_then(|loc| offsets.byte(loc)) {
            edits.inserts.push((at, "EDURE"));
        }
        if let Some(params) = header.params {
            header_literals = tokens[params.clone()]
                .iter()
                .filter_map(|t| token_literal(&t.token))
                .collect();
            let start = offsets.byte(tokens[params.start].span.start);
            let end = offsets.byte(tokens[params.end].span.start);
            if let (Some(start), Some(end)) = (start, end) {
                edits.blanks.push(start..end);
            }
        }
    }
    for (start, end) in try_catch_markers(&tokens) {
        if let (Some(start), Some(end)) = (offsets.byte(start), offsets.byte(end)) {
            edits.blanks.push(start..end);
        }
    }

    if edits.is_empty() {
        return unchanged();
    }
    ShapedBatch {
        text: edits.apply(text),
        header_literals,
    }
}

/// Literal text of a string or number token, strings keeping one layer of
/// quotes.
pub fn token_literal(token: &Token) -> Option<String> {
    match token {
        Token::SingleQuotedString(text) | Token::NationalStringLiteral(text) => {
            Some(format!("'{text}'"))
        }
        Token::Number(number, _) => Some(number.clone()),
        _ => None,
    }
}

struct ProcedureHeader {
    /// End of a `PROC` keyword that needs spelling out.
    short_keyword_end: Option<Location>,
    /// Token indices from the first parameter up to (excluding) `AS`.
    params: Option<Range<usize>>,
}

fn procedure_header(tokens: &[&TokenWithSpan]) -> Option<ProcedureHeader> {
    let first = tokens.first()?;
    if !is_keyword(first, Keyword::CREATE) && !is_keyword(first, Keyword::ALTER) {
        return None;
    }
    let mut pos = 1;
    if is_keyword(tokens.get(pos)?, Keyword::OR) {
        pos += 2;
    }
    let short_keyword_end = match &tokens.get(pos)?.token {
        Token::Word(word) if word.keyword == Keyword::PROCEDURE => None,
        Token::Word(word) if word.quote_style.is_none() && word.value.eq_ignore_ascii_case("PROC") => {
            Some(tokens[pos].span.end)
        }
        _ => return None,
    };
    pos += 1;

    if !matches!(tokens.get(pos)?.token, Token::Word(_)) {
        return None;
    }
    pos += 1;
    while matches!(tokens.get(pos).map(|t| &t.token), Some(Token::Period)) {
        pos += 1;
        if matches!(tokens.get(pos).map(|t| &t.token), Some(Token::Word(_))) {
            pos += 1;
        }
    }

    let params = match tokens.get(pos).map(|t| &t.token) {
        None | Some(Token::LParen) => None,
        Some(Token::Word(word)) if word.keyword == Keyword::AS => None,
        Some(_) => top_level_as(tokens, pos).map(|end| pos..end),
    };
    Some(ProcedureHeader {
        short_keyword_end,
        params,
    })
}

/// Index of the `AS` that opens the procedure body. `EXECUTE AS` options are
/// skipped.
fn top_level_as(tokens: &[&TokenWithSpan], from: usize) -> Option<usize> {
    let mut depth = 0usize;
    for idx in from..tokens.len() {
        match &tokens[idx].token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Word(word)
                if depth == 0
                    && word.keyword == Keyword::AS
                    && !is_keyword(tokens[idx - 1], Keyword::EXECUTE) =>
            {
                return Some(idx);
            }
            _ => {}
        }
    }
    None
}

/// Start and end of each `BEGIN|END TRY|CATCH` pair.
fn try_catch_markers(tokens: &[&TokenWithSpan]) -> Vec<(Location, Location)> {
    tokens
        .windows(2)
        .filter(|pair| {
            let block = is_keyword(pair[0], Keyword::BEGIN) || is_keyword(pair[0], Keyword::END);
            let marker = matches!(&pair[1].token, Token::Word(word)
                if word.quote_style.is_none()
                    && (word.value.eq_ignore_ascii_case("TRY")
                        || word.value.eq_ignore_ascii_case("CATCH")));
            block && marker
        })
        .map(|pair| (pair[0].span.start, pair[1].span.end))
        .collect()
}

fn is_keyword(token: &TokenWithSpan, keyword: Keyword) -> bool {
    matches!(&token.token, Token::Word(word) if word.keyword == keyword)
}

/// Maps tokenizer locations (1-based line and character column) to byte
/// offsets.
struct LineOffsets<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineOffsets<'a> {
    fn new(text: &'a str) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();
        Self { text, starts }
    }

    fn byte(&self, location: Location) -> Option<usize> {
        let line = usize::try_from(location.line).ok()?.checked_sub(1)?;
        let column = usize::try_from(location.column).ok()?.checked_sub(1)?;
        let start = *self.starts.get(line)?;
        Some(
            self.text[start..]
                .char_indices()
                .nth(column)
                .map_or(self.text.len(), |(idx, _)| start + idx),
        )
    }
}

#[derive(Default)]
struct Edits {
    blanks: Vec<Range<usize>>,
    inserts: Vec<(usize, &'static str)>,
}

impl Edits {
    fn is_empty(&self) -> bool {
        self.blanks.is_empty() && self.inserts.is_empty()
    }

    fn apply(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 8);
        for (idx, ch) in text.char_indices() {
            self.insert_at(idx, &mut out);
            let blanked = ch != '\n' && ch != '\r' && self.blanks.iter().any(|r| r.contains(&idx));
            out.push(if blanked { ' ' } else { ch });
        }
        self.insert_at(text.len(), &mut out);
        out
    }

    fn insert_at(&self, idx: usize, out: &mut String) {
        for (at, text) in &self.inserts {
            if *at == idx {
                out.push_str(text);
            }
        }
    }
}
