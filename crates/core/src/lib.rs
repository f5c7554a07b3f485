//! Core library for hnytools
//!
//! This crate implements the **Functional Core** of the hnytools application,
//! following the Functional Core - Imperative Shell architectural pattern.
//!
//! # Architecture Overview
//!
//! The hnytools project uses a two-crate architecture to enforce separation of
//! concerns:
//!
//! - **`hnytools_core`** (this crate): Pure transformation functions with zero I/O
//! - **`hnytools`**: I/O operations and orchestration (the Imperative Shell)
//!
//! All functions in this crate are pure: same input, same output, no side
//! effects, no network, no clock reads. Time-dependent logic takes `now` as an
//! argument. This keeps the pagination machinery testable with fixture data
//! and no mocking.
//!
//! # Module Organization
//!
//! - [`query`]: The query specification model (calculations, filters,
//!   breakdowns, time ranges) plus the string parsers the CLI and MCP
//!   surfaces share
//! - [`cursor`]: Pagination cursors (time window / sort key), their
//!   advancement rules, and per-page query derivation
//! - [`dedupe`]: Composite row keys and order-preserving deduplication
//! - [`convergence`]: The smart-stopping heuristic that ends a run once new
//!   pages are mostly duplicates
//! - [`page`]: Page results and the per-run [`page::PaginationState`]
//!
//! The imperative shell owns everything these modules deliberately lack: the
//! HTTP transport, the poll loop, the CLI, and the MCP server.

pub mod convergence;
pub mod cursor;
pub mod dedupe;
pub mod page;
pub mod query;
