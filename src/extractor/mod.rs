/// Portfolio code matching (exact and wildcard).
pub mod portfolio;
/// Per-routine extraction state and the event-driven extractor.
pub mod routine;
