/// Routine tasks and the feeds that yield them.
pub mod feed;
/// Worker pool, join barrier and fatal-error abort.
pub mod orchestrator;
/// Aggregation sinks and their finalized reports.
pub mod sinks;
