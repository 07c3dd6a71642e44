//! Test utilities for Breakwater crates.
//!
//! Hand-rolled mocks for the core seam traits plus fixture builders. These
//! record enough call history for tests to assert on call counts and
//! ordering without a real network.

pub mod builders;
pub mod cache_reader;
pub mod fetcher;

pub use builders::{data_request, json_response, ok_response, script_request, status_response};
pub use cache_reader::MapCacheReader;
pub use fetcher::{FetchOutcome, MockFetcher, StaticProbe};
