// Core modules implementing typing, matching, sorting, caching, and query execution.
pub mod cache;
pub mod cache_key;
pub mod coerce;
pub mod error;
pub mod executor;
pub mod predicate;
pub mod query;
pub mod sort;
pub mod store;
pub mod value;
