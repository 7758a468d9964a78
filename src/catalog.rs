use std::collections::{BTreeSet, HashSet};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::LineageError;

/// Read-only reference data consulted by every worker.
///
/// Built once before the pipeline starts and shared by reference afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    known_tables: HashSet<String>,
    known_portfolio_codes: BTreeSet<String>,
}

impl Catalog {
    /// Build a catalog from table names and portfolio codes.
    ///
    /// Table names are trimmed and uppercased so they compare against canonical
    /// keys. Codes are trimmed but keep their case. Blank entries are dropped.
    pub fn new<T, C>(tables: T, portfolio_codes: C) -> Self
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let known_tables = tables
            .into_iter()
            .map(|t| t.as_ref().trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .collect();
        let known_portfolio_codes = portfolio_codes
            .into_iter()
            .map(|c| c.as_ref().trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        Self {
            known_tables,
            known_portfolio_codes,
        }
    }

    /// True when the canonical key is a whitelisted table.
    pub fn is_known_table(&self, key: &str) -> bool {
        self.known_tables.contains(&key.to_uppercase())
    }

    /// True when `code` is exactly a catalog portfolio code.
    pub fn is_portfolio_code(&self, code: &str) -> bool {
        self.known_portfolio_codes.contains(code)
    }

    /// Portfolio codes in lexical order.
    pub fn portfolio_codes(&self) -> impl Iterator<Item = &str> {
        self.known_portfolio_codes.iter().map(String::as_str)
    }

    /// Codes starting with `prefix`, served from the ordered set.
    pub fn portfolio_codes_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.known_portfolio_codes
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |code| code.starts_with(prefix))
            .map(String::as_str)
    }

    /// Number of whitelisted tables.
    pub fn table_count(&self) -> usize {
        self.known_tables.len()
    }

    /// Number of portfolio codes.
    pub fn portfolio_code_count(&self) -> usize {
        self.known_portfolio_codes.len()
    }
}

/// Source of the reference catalog, consulted once per run.
pub trait CatalogLoader {
    /// Load the catalog. Failure aborts the run.
    fn load(&self) -> Result<Catalog, LineageError>;
}

/// Loads the catalog from two files.
///
/// The tables file holds one name per line; blank lines and `--` comments are
/// skipped. The portfolio file is a CSV with a header row where every
/// non-empty cell is a code (short names and numeric codes alike).
#[derive(Debug, Clone)]
pub struct FileCatalogLoader {
    /// Path to the table whitelist.
    pub tables_path: PathBuf,
    /// Path to the portfolio identifiers CSV.
    pub portfolios_path: PathBuf,
}

impl FileCatalogLoader {
    /// Create a loader for the given files.
    pub fn new(tables_path: impl Into<PathBuf>, portfolios_path: impl Into<PathBuf>) -> Self {
        Self {
            tables_path: tables_path.into(),
            portfolios_path: portfolios_path.into(),
        }
    }
}

impl CatalogLoader for FileCatalogLoader {
    fn load(&self) -> Result<Catalog, LineageError> {
        let tables = read_table_names(&self.tables_path)?;
        info!(count = tables.len(), "loaded table whitelist");
        let codes = read_portfolio_codes(&self.portfolios_path)?;
        let catalog = Catalog::new(tables, codes);
        info!(
            count = catalog.portfolio_code_count(),
            "loaded unique portfolio codes"
        );
        Ok(catalog)
    }
}

fn read_table_names(path: &Path) -> Result<Vec<String>, LineageError> {
    let content = std::fs::read_to_string(path).map_err(|e| LineageError::Catalog {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("--"))
        .map(ToString::to_string)
        .collect())
}

fn read_portfolio_codes(path: &Path) -> Result<Vec<String>, LineageError> {
    let catalog_err = |message: String| LineageError::Catalog {
        path: path.to_path_buf(),
        message,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| catalog_err(e.to_string()))?;

    let mut codes = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| catalog_err(e.to_string()))?;
        codes.extend(
            record
                .iter()
                .filter(|cell| !cell.is_empty())
                .map(ToString::to_string),
        );
    }
    Ok(codes)
}
