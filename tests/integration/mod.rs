//! Integration tests for stackdeck
//!
//! These tests verify that multiple components work together correctly.

#[path = "../common/mod.rs"]
pub mod common;

pub mod cli;
pub mod offline_queue;
pub mod session_replay;
