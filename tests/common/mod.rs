//! Shared test utilities for stackdeck
//!
//! This module provides common helpers for integration tests:
//! - Deterministic session timelines and event ids
//! - Fake remote executors and history sources

pub mod determinism;
pub mod fakes;
