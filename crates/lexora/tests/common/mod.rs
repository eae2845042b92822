//! Shared test utilities for lexora integration tests.
//!
//! This module provides:
//! - `TestHarness` with a seeded in-memory database and a temporary upload root
//! - Mock speech and lip-sync providers with call counters

pub mod harness;
pub mod mocks;

pub use harness::{wait_for_terminal, TestHarness};
pub use mocks::{Behaviour, MockLipSync, MockSpeech};
