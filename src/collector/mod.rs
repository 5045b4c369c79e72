/// Collector module
///
/// This module groups the provider-agnostic core of a run:
/// - Retrying fallible operations (fixed or exponential delay)
/// - Fetching one entity from a plan of provider reads
/// - Reading paginated feeds
/// - Processing entity lists in committed batches
/// - Running top-level jobs and the retention sweep
///
/// Design notes:
/// - Provider-specific logic MUST NOT live here (see `tasks`)
/// - Everything here reaches the network through injected traits
///   (`Fetcher`, `DocumentStore`, `Publisher`)
pub mod fetch;
pub mod orchestrator;
pub mod paginator;
pub mod retry;
pub mod runner;
