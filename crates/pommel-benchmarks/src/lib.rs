//! Pommel benchmarking suite
//!
//! Criterion benchmarks for descriptor parsing, property interpolation,
//! version ordering and end-to-end resolution against a `file://`
//! repository.

pub mod common;

pub use common::*;
