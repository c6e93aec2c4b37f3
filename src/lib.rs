//! Purpose: In-process query engine over tables stored as JSON documents.
//! Exports: `api` (engine, loaders, caches, values, errors), `core`, and `notice`.
//! Role: Library backing the `jsonquery` CLI and embeddable on its own.
//! Invariants: `api` is the stable surface; `core` modules may change shape.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
mod json;
pub mod notice;
mod table_paths;
