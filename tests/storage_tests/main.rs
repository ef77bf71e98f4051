//! Storage Tests
//!
//! Shard store behavior and the tar codec.

mod archive_tests;
