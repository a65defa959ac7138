// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Jeeravan integration tests.
//!
//! - [`MockProvider`]: generation backend replaying queued replies
//! - [`MockEmbedder`]: deterministic bag-of-words embeddings
//! - [`MockVectorIndex`]: in-memory vector index with call counters
//! - [`TestHarness`]: temp SQLite storage wired to the mocks

pub mod harness;
pub mod mock_provider;
pub mod mock_vector;

pub use harness::TestHarness;
pub use mock_provider::{MockEmbedder, MockProvider};
pub use mock_vector::MockVectorIndex;
