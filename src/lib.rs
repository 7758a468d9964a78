//! Mine SQL Server stored-procedure definitions for lineage: which tables each
//! routine touches, which portfolio codes it mentions, and how many syntax
//! errors its definition contains.
#![warn(missing_docs)]

/// Reference catalog of known tables and portfolio codes.
pub mod catalog;
/// Run settings.
pub mod config;
/// Crate error type.
pub mod error;
/// Event-driven extraction of facts from one routine.
pub mod extractor;
/// Facts published by extractors and the emitter seam.
pub mod facts;
/// CSV and markdown output.
pub mod output;
/// Parse events, table-name normalization and the T-SQL parser.
pub mod parser;
/// Worker pool, routine feeds and aggregation sinks.
pub mod pipeline;
